//! Geometry oracle: the spatial predicates and line operations the pipeline
//! stages depend on.
//!
//! Stages take a `&dyn GeometryOracle` so the geometry backend can be swapped
//! (e.g. for a database-side implementation). `GeoOracle` is the bundled
//! implementation: segment intersection via the `geo` crate, distances via
//! haversine, and projection in a local equirectangular frame.

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Coord, Line};

use crate::geo_utils::{haversine_distance, polyline_length, LocalProjection};
use crate::{distinct_point_count, Bounds, TrailPoint};

/// Fractions this close to a segment end are snapped onto the vertex.
const FRACTION_EPSILON: f64 = 1e-9;

/// A position along a polyline: segment index plus fraction within that segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinePosition {
    pub segment: usize,
    pub fraction: f64,
}

impl LinePosition {
    pub fn new(segment: usize, fraction: f64) -> Self {
        Self { segment, fraction }
    }

    /// Monotonic scalar for ordering positions along the same line.
    pub fn measure(&self) -> f64 {
        self.segment as f64 + self.fraction
    }

    /// Snap to a canonical form: fraction in [0, 1), except at the last vertex.
    pub fn normalized(&self, point_count: usize) -> Self {
        let last_segment = point_count.saturating_sub(2);
        let mut segment = self.segment.min(last_segment);
        let mut fraction = if self.segment > last_segment {
            1.0
        } else {
            self.fraction.clamp(0.0, 1.0)
        };
        if fraction < FRACTION_EPSILON {
            fraction = 0.0;
        }
        if fraction > 1.0 - FRACTION_EPSILON {
            if segment < last_segment {
                segment += 1;
                fraction = 0.0;
            } else {
                fraction = 1.0;
            }
        }
        Self { segment, fraction }
    }
}

/// A point where two lines touch, with its position on each line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineTouch {
    pub point: TrailPoint,
    pub on_a: LinePosition,
    pub on_b: LinePosition,
}

/// Result of an intersection query between two lines.
#[derive(Debug, Clone, Default)]
pub struct Intersections {
    /// Single-point touches and crossings
    pub touches: Vec<LineTouch>,
    /// Number of collinear overlapping segment pairs (not reported as touches)
    pub overlaps: usize,
}

/// Nearest point on a line to a query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub position: LinePosition,
    pub point: TrailPoint,
    pub distance_m: f64,
}

/// Spatial predicates and operations over trail polylines.
pub trait GeometryOracle: Send + Sync {
    /// At least 2 distinct points, all coordinates valid.
    fn is_valid(&self, line: &[TrailPoint]) -> bool;

    /// Horizontal length in meters.
    fn length_m(&self, line: &[TrailPoint]) -> f64;

    /// Distance between two points in meters.
    fn distance_m(&self, a: &TrailPoint, b: &TrailPoint) -> f64;

    /// All single-point touches between two lines.
    fn intersections(&self, a: &[TrailPoint], b: &[TrailPoint]) -> Intersections;

    /// Whether the lines touch at one or more points.
    fn intersects(&self, a: &[TrailPoint], b: &[TrailPoint]) -> bool {
        !self.intersections(a, b).touches.is_empty()
    }

    /// Nearest point on `line` to `point`, if within `max_distance_m`.
    fn project(
        &self,
        point: &TrailPoint,
        line: &[TrailPoint],
        max_distance_m: f64,
    ) -> Option<Projection>;

    /// Point (with interpolated elevation) at a position on the line.
    fn interpolate(&self, line: &[TrailPoint], position: LinePosition) -> TrailPoint;

    /// Cut a line at every position in one pass.
    ///
    /// Returns the pieces in line order; degenerate pieces are returned as-is
    /// so the caller can count them.
    fn split_at(&self, line: &[TrailPoint], positions: &[LinePosition]) -> Vec<Vec<TrailPoint>>;

    /// Bounding box grown by `buffer_m`.
    fn envelope(&self, line: &[TrailPoint], buffer_m: f64) -> Option<Bounds> {
        Bounds::from_points(line).map(|b| b.expand(buffer_m))
    }

    /// Drop elevation from every vertex.
    fn force_2d(&self, line: &[TrailPoint]) -> Vec<TrailPoint> {
        line.iter().map(TrailPoint::to_2d).collect()
    }
}

/// Geometry oracle backed by the `geo` crate and haversine distances.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoOracle;

impl GeoOracle {
    pub fn new() -> Self {
        Self
    }
}

impl GeometryOracle for GeoOracle {
    fn is_valid(&self, line: &[TrailPoint]) -> bool {
        line.iter().all(TrailPoint::is_valid) && distinct_point_count(line) >= 2
    }

    fn length_m(&self, line: &[TrailPoint]) -> f64 {
        polyline_length(line)
    }

    fn distance_m(&self, a: &TrailPoint, b: &TrailPoint) -> f64 {
        haversine_distance(a, b)
    }

    fn intersections(&self, a: &[TrailPoint], b: &[TrailPoint]) -> Intersections {
        let mut result = Intersections::default();
        if a.len() < 2 || b.len() < 2 {
            return result;
        }

        for (i, wa) in a.windows(2).enumerate() {
            let seg_a = Line::new(wa[0].coord(), wa[1].coord());
            for (j, wb) in b.windows(2).enumerate() {
                let seg_b = Line::new(wb[0].coord(), wb[1].coord());
                if !boxes_touch(&seg_a, &seg_b) {
                    continue;
                }
                match line_intersection(seg_a, seg_b) {
                    Some(LineIntersection::SinglePoint { intersection, .. }) => {
                        let on_a = LinePosition::new(i, segment_fraction(&seg_a, intersection))
                            .normalized(a.len());
                        let on_b = LinePosition::new(j, segment_fraction(&seg_b, intersection))
                            .normalized(b.len());
                        let point = TrailPoint::new(intersection.y, intersection.x);

                        // A crossing exactly on a shared vertex is reported by both adjacent segments
                        let duplicate = result.touches.iter().any(|t| {
                            t.point.same_position(&point) || (t.on_a == on_a && t.on_b == on_b)
                        });
                        if !duplicate {
                            result.touches.push(LineTouch { point, on_a, on_b });
                        }
                    }
                    Some(LineIntersection::Collinear { .. }) => {
                        result.overlaps += 1;
                    }
                    None => {}
                }
            }
        }

        result
            .touches
            .sort_by(|x, y| x.on_a.measure().total_cmp(&y.on_a.measure()));
        result
    }

    fn project(
        &self,
        point: &TrailPoint,
        line: &[TrailPoint],
        max_distance_m: f64,
    ) -> Option<Projection> {
        if line.len() < 2 {
            return None;
        }
        let proj = LocalProjection::around(point);
        let (px, py) = proj.to_xy(point);

        let mut best: Option<(f64, LinePosition)> = None;
        for (i, w) in line.windows(2).enumerate() {
            let (ax, ay) = proj.to_xy(&w[0]);
            let (bx, by) = proj.to_xy(&w[1]);
            let (dx, dy) = (bx - ax, by - ay);
            let len_sq = dx * dx + dy * dy;
            let t = if len_sq > 0.0 {
                (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let (cx, cy) = (ax + t * dx, ay + t * dy);
            let dist_sq = (px - cx).powi(2) + (py - cy).powi(2);
            if best.map_or(true, |(d, _)| dist_sq < d) {
                best = Some((dist_sq, LinePosition::new(i, t)));
            }
        }

        let (_, position) = best?;
        let position = position.normalized(line.len());
        let on_line = self.interpolate(line, position);
        let distance_m = haversine_distance(point, &on_line);
        if distance_m > max_distance_m {
            return None;
        }
        Some(Projection {
            position,
            point: on_line,
            distance_m,
        })
    }

    fn interpolate(&self, line: &[TrailPoint], position: LinePosition) -> TrailPoint {
        let position = position.normalized(line.len());
        let start = line[position.segment];
        if position.fraction == 0.0 || line.len() < 2 {
            return start;
        }
        let end = line[position.segment + 1];
        if position.fraction == 1.0 {
            return end;
        }
        let t = position.fraction;
        let latitude = start.latitude + t * (end.latitude - start.latitude);
        let longitude = start.longitude + t * (end.longitude - start.longitude);
        let elevation = match (start.elevation, end.elevation) {
            (Some(a), Some(b)) => Some(a + t * (b - a)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };
        TrailPoint {
            latitude,
            longitude,
            elevation,
        }
    }

    fn split_at(&self, line: &[TrailPoint], positions: &[LinePosition]) -> Vec<Vec<TrailPoint>> {
        if line.len() < 2 {
            return vec![line.to_vec()];
        }

        let mut cuts: Vec<LinePosition> = positions
            .iter()
            .map(|p| p.normalized(line.len()))
            .collect();
        cuts.sort_by(|a, b| a.measure().total_cmp(&b.measure()));
        cuts.dedup_by(|a, b| (a.measure() - b.measure()).abs() < FRACTION_EPSILON);

        let mut pieces = Vec::with_capacity(cuts.len() + 1);
        let mut current = vec![line[0]];
        let mut next_cut = 0;

        for k in 0..line.len() - 1 {
            while next_cut < cuts.len() && cuts[next_cut].segment == k && cuts[next_cut].fraction < 1.0
            {
                let cut_point = self.interpolate(line, cuts[next_cut]);
                push_distinct(&mut current, cut_point);
                pieces.push(std::mem::replace(&mut current, vec![cut_point]));
                next_cut += 1;
            }
            push_distinct(&mut current, line[k + 1]);
        }
        pieces.push(current);
        pieces
    }
}

fn push_distinct(points: &mut Vec<TrailPoint>, point: TrailPoint) {
    if points.last().map_or(true, |last| !last.same_position(&point)) {
        points.push(point);
    }
}

fn boxes_touch(a: &Line, b: &Line) -> bool {
    let (a_min_x, a_max_x) = min_max(a.start.x, a.end.x);
    let (a_min_y, a_max_y) = min_max(a.start.y, a.end.y);
    let (b_min_x, b_max_x) = min_max(b.start.x, b.end.x);
    let (b_min_y, b_max_y) = min_max(b.start.y, b.end.y);
    a_min_x <= b_max_x && a_max_x >= b_min_x && a_min_y <= b_max_y && a_max_y >= b_min_y
}

fn min_max(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Fraction of `point` along `segment`, measured in coordinate space.
fn segment_fraction(segment: &Line, point: Coord) -> f64 {
    let dx = segment.end.x - segment.start.x;
    let dy = segment.end.y - segment.start.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return 0.0;
    }
    (((point.x - segment.start.x) * dx + (point.y - segment.start.y) * dy) / len_sq).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn horizontal() -> Vec<TrailPoint> {
        vec![
            TrailPoint::with_elevation(40.0, -105.01, 1000.0),
            TrailPoint::with_elevation(40.0, -105.0, 1100.0),
            TrailPoint::with_elevation(40.0, -104.99, 1200.0),
        ]
    }

    fn vertical_at(lng: f64) -> Vec<TrailPoint> {
        vec![TrailPoint::new(39.99, lng), TrailPoint::new(40.01, lng)]
    }

    #[test]
    fn test_crossing_intersection() {
        let oracle = GeoOracle::new();
        let result = oracle.intersections(&horizontal(), &vertical_at(-105.005));
        assert_eq!(result.touches.len(), 1);
        let touch = result.touches[0];
        assert_eq!(touch.on_a.segment, 0);
        assert!((touch.on_a.fraction - 0.5).abs() < 1e-9);
        assert!((touch.on_b.fraction - 0.5).abs() < 1e-9);
        assert!((touch.point.latitude - 40.0).abs() < 1e-12);
    }

    #[test]
    fn test_crossing_on_shared_vertex_reported_once() {
        let oracle = GeoOracle::new();
        let result = oracle.intersections(&horizontal(), &vertical_at(-105.0));
        assert_eq!(result.touches.len(), 1);
        assert_eq!(result.touches[0].on_a, LinePosition::new(1, 0.0));
    }

    #[test]
    fn test_collinear_overlap_not_a_touch() {
        let oracle = GeoOracle::new();
        let other = vec![TrailPoint::new(40.0, -105.005), TrailPoint::new(40.0, -104.995)];
        let result = oracle.intersections(&horizontal(), &other);
        assert!(result.touches.is_empty());
        assert!(result.overlaps > 0);
        assert!(!oracle.intersects(&horizontal(), &other));
    }

    #[test]
    fn test_disjoint_lines() {
        let oracle = GeoOracle::new();
        assert!(!oracle.intersects(&horizontal(), &vertical_at(-104.0)));
    }

    #[test]
    fn test_project_within_radius() {
        let oracle = GeoOracle::new();
        // ~1.1m north of the line
        let p = TrailPoint::new(40.00001, -105.005);
        let proj = oracle.project(&p, &horizontal(), 5.0).unwrap();
        assert_eq!(proj.position.segment, 0);
        assert!((proj.position.fraction - 0.5).abs() < 1e-6);
        assert!(proj.distance_m > 1.0 && proj.distance_m < 1.2);
        assert_eq!(proj.point.elevation, Some(1050.0));

        assert!(oracle.project(&p, &horizontal(), 0.5).is_none());
    }

    #[test]
    fn test_split_at_multiple_positions() {
        let oracle = GeoOracle::new();
        let line = horizontal();
        let pieces = oracle.split_at(
            &line,
            &[LinePosition::new(1, 0.5), LinePosition::new(0, 0.5)],
        );
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[0].len(), 2);
        assert_eq!(pieces[1].len(), 3);
        assert_eq!(pieces[2].len(), 2);
        assert_eq!(pieces[0].last(), pieces[1].first());
        assert_eq!(pieces[1].last(), pieces[2].first());
        assert_eq!(pieces[1][1], line[1]);

        let total: f64 = pieces.iter().map(|p| oracle.length_m(p)).sum();
        assert!((total - oracle.length_m(&line)).abs() < 1e-6);
    }

    #[test]
    fn test_split_at_vertex() {
        let oracle = GeoOracle::new();
        let pieces = oracle.split_at(&horizontal(), &[LinePosition::new(0, 1.0)]);
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].len(), 2);
        assert_eq!(pieces[1].len(), 2);
    }

    #[test]
    fn test_validity() {
        let oracle = GeoOracle::new();
        assert!(oracle.is_valid(&horizontal()));
        assert!(!oracle.is_valid(&[TrailPoint::new(40.0, -105.0)]));
        assert!(!oracle.is_valid(&[
            TrailPoint::new(40.0, -105.0),
            TrailPoint::new(40.0, -105.0)
        ]));
    }

    #[test]
    fn test_force_2d() {
        let oracle = GeoOracle::new();
        assert!(oracle
            .force_2d(&horizontal())
            .iter()
            .all(|p| p.elevation.is_none()));
    }
}
