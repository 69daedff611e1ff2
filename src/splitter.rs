//! # Trail Splitter
//!
//! Detects where trails touch and cuts them so that no two output segments
//! cross in their interiors.
//!
//! ## Algorithm
//! 1. Drop invalid trails (counted), optionally simplify the rest
//! 2. Index trail bounding boxes in an R-tree, grown by the intersection tolerance
//! 3. For each candidate pair, collect single-point touches (collinear overlaps
//!    are counted but not cut) and near-miss T-junctions, where one trail's
//!    endpoint stops just short of another trail
//! 4. Cut every touched trail at all of its positions in one pass; touches at a
//!    trail's own endpoint are not cuts
//! 5. Closed trails without cuts are split at their middle vertex
//! 6. Emit each piece with a fresh id and recomputed stats

use log::{debug, info, warn};
use rstar::{RTree, RTreeObject, AABB};

use crate::geometry::{GeoOracle, GeometryOracle, LinePosition};
use crate::{GraphConfig, Trail, TrailId, TrailPoint};

/// A point where two or more trails meet or cross.
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionPoint {
    pub point: TrailPoint,
    /// Catalog ids of the trails meeting here, sorted
    pub connected_trail_ids: Vec<TrailId>,
    pub connected_trail_names: Vec<String>,
    /// Tolerance the point was detected with (meters)
    pub tolerance_m: f64,
}

/// Counters describing one splitting run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitStats {
    pub input_trails: usize,
    pub invalid_trails: usize,
    pub trails_split: usize,
    pub closed_trails_split: usize,
    pub passed_through: usize,
    pub segments_created: usize,
    pub invalid_pieces_dropped: usize,
    pub intersection_points: usize,
    pub near_miss_junctions: usize,
    pub overlaps_skipped: usize,
}

/// Output of the splitter.
#[derive(Debug, Clone, Default)]
pub struct SplitResult {
    /// Split segments plus untouched trails, in id order
    pub segments: Vec<Trail>,
    pub intersections: Vec<IntersectionPoint>,
    pub stats: SplitStats,
}

/// Trail bounding box for R-tree candidate search.
#[derive(Debug, Clone)]
struct TrailEnvelope {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for TrailEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Splits trails at their mutual intersections.
pub struct TrailSplitter<'a> {
    config: &'a GraphConfig,
    oracle: &'a dyn GeometryOracle,
}

impl<'a> TrailSplitter<'a> {
    pub fn new(config: &'a GraphConfig, oracle: &'a dyn GeometryOracle) -> Self {
        Self { config, oracle }
    }

    /// Split all trails against each other.
    pub fn split(&self, trails: &[Trail]) -> SplitResult {
        let tolerance = self.config.intersection_tolerance_m;
        let mut stats = SplitStats {
            input_trails: trails.len(),
            ..Default::default()
        };

        let mut valid: Vec<Trail> = Vec::with_capacity(trails.len());
        for trail in trails {
            if self.oracle.is_valid(&trail.points) {
                valid.push(trail.simplified(self.config.simplify_tolerance_deg));
            } else {
                warn!(
                    "[TrailSplitter] Skipping trail {} '{}': invalid geometry ({} points)",
                    trail.id,
                    trail.name,
                    trail.points.len()
                );
                stats.invalid_trails += 1;
            }
        }
        valid.sort_by_key(|t| t.id);

        let envelopes: Vec<TrailEnvelope> = valid
            .iter()
            .enumerate()
            .filter_map(|(index, trail)| {
                self.oracle
                    .envelope(&trail.points, tolerance)
                    .map(|b| TrailEnvelope {
                        index,
                        envelope: AABB::from_corners(
                            [b.min_lng, b.min_lat],
                            [b.max_lng, b.max_lat],
                        ),
                    })
            })
            .collect();
        let rtree = RTree::bulk_load(envelopes.clone());

        let mut cuts: Vec<Vec<LinePosition>> = vec![Vec::new(); valid.len()];
        let mut intersections: Vec<IntersectionPoint> = Vec::new();

        for env_a in &envelopes {
            let i = env_a.index;
            if valid[i].length_m() < self.config.min_trail_length_m {
                continue;
            }
            let mut neighbours: Vec<usize> = rtree
                .locate_in_envelope_intersecting(&env_a.envelope)
                .map(|e| e.index)
                .filter(|&j| j > i && valid[j].length_m() >= self.config.min_trail_length_m)
                .collect();
            neighbours.sort_unstable();

            for j in neighbours {
                let (a, b) = (&valid[i], &valid[j]);
                let found = self.oracle.intersections(&a.points, &b.points);
                stats.overlaps_skipped += found.overlaps;

                let mut touch_points: Vec<TrailPoint> = Vec::new();
                for touch in &found.touches {
                    cuts[i].push(touch.on_a);
                    cuts[j].push(touch.on_b);
                    touch_points.push(touch.point);
                    push_intersection(&mut intersections, touch.point, a, b, tolerance);
                }

                // Overlapping trails share a corridor, not a junction
                if found.overlaps > 0 {
                    continue;
                }

                // Endpoints that stop just short of the other trail
                for (from, to) in [(i, j), (j, i)] {
                    let endpoints = [valid[from].start(), valid[from].end()];
                    for endpoint in endpoints.into_iter().flatten() {
                        let already_touching = touch_points
                            .iter()
                            .any(|p| self.oracle.distance_m(p, endpoint) <= tolerance);
                        if already_touching {
                            continue;
                        }
                        if let Some(proj) =
                            self.oracle.project(endpoint, &valid[to].points, tolerance)
                        {
                            debug!(
                                "[TrailSplitter] Near-miss junction: trail {} ends {:.2}m from trail {}",
                                valid[from].id, proj.distance_m, valid[to].id
                            );
                            cuts[to].push(proj.position);
                            touch_points.push(proj.point);
                            stats.near_miss_junctions += 1;
                            push_intersection(
                                &mut intersections,
                                proj.point,
                                &valid[from],
                                &valid[to],
                                tolerance,
                            );
                        }
                    }
                }
            }
        }

        let mut next_id: TrailId = trails.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        let mut segments: Vec<Trail> = Vec::with_capacity(valid.len());

        for (trail, positions) in valid.iter().zip(cuts) {
            let mut interior = self.interior_cuts(trail, positions);

            if interior.is_empty() && trail.is_closed(tolerance) {
                interior.push(LinePosition::new(trail.points.len() / 2, 0.0));
                stats.closed_trails_split += 1;
            }

            if interior.is_empty() {
                segments.push(trail.clone());
                stats.passed_through += 1;
                continue;
            }

            let pieces = self.oracle.split_at(&trail.points, &interior);
            let mut emitted = 0;
            for piece in pieces {
                if !self.oracle.is_valid(&piece) || self.oracle.length_m(&piece) <= 0.0 {
                    stats.invalid_pieces_dropped += 1;
                    continue;
                }
                segments.push(trail.segment(next_id, piece));
                next_id += 1;
                emitted += 1;
            }
            debug!(
                "[TrailSplitter] Trail {} '{}' cut at {} positions into {} segments",
                trail.id,
                trail.name,
                interior.len(),
                emitted
            );
            stats.trails_split += 1;
            stats.segments_created += emitted;
        }

        stats.intersection_points = intersections.len();
        info!(
            "[TrailSplitter] {} trails -> {} segments ({} split, {} passed through, {} invalid, {} intersections)",
            stats.input_trails,
            segments.len(),
            stats.trails_split,
            stats.passed_through,
            stats.invalid_trails,
            stats.intersection_points
        );

        SplitResult {
            segments,
            intersections,
            stats,
        }
    }

    /// Cut positions that are not at (or within tolerance of) the trail's own ends.
    fn interior_cuts(&self, trail: &Trail, positions: Vec<LinePosition>) -> Vec<LinePosition> {
        let (Some(start), Some(end)) = (trail.start(), trail.end()) else {
            return Vec::new();
        };
        let tolerance = self.config.intersection_tolerance_m;
        positions
            .into_iter()
            .filter(|pos| {
                let p = self.oracle.interpolate(&trail.points, *pos);
                self.oracle.distance_m(&p, start) > tolerance
                    && self.oracle.distance_m(&p, end) > tolerance
            })
            .collect()
    }
}

fn push_intersection(
    intersections: &mut Vec<IntersectionPoint>,
    point: TrailPoint,
    a: &Trail,
    b: &Trail,
    tolerance_m: f64,
) {
    let mut members = vec![
        (a.catalog_id(), a.name.clone()),
        (b.catalog_id(), b.name.clone()),
    ];
    members.sort();
    members.dedup_by_key(|m| m.0);

    let exists = intersections.iter().any(|ip| {
        ip.point.same_position(&point)
            && ip.connected_trail_ids.len() == members.len()
            && ip.connected_trail_ids.iter().zip(&members).all(|(x, m)| *x == m.0)
    });
    if exists {
        return;
    }

    intersections.push(IntersectionPoint {
        point: point.to_2d(),
        connected_trail_ids: members.iter().map(|m| m.0).collect(),
        connected_trail_names: members.into_iter().map(|m| m.1).collect(),
        tolerance_m,
    });
}

/// Split trails with the default geometry oracle.
pub fn split_trails(trails: &[Trail], config: &GraphConfig) -> SplitResult {
    let oracle = GeoOracle::new();
    TrailSplitter::new(config, &oracle).split(trails)
}
