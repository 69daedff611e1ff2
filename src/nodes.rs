//! Routing node derivation.
//!
//! Every segment endpoint and every intersection point is a candidate node.
//! Candidates within `node_merge_tolerance_m` of each other (directly or
//! through a chain of neighbours) collapse into one node.

use std::cmp::Ordering;

use log::{debug, info};

use crate::geo_utils::PointIndex;
use crate::graph::{NodeType, RoutingNode};
use crate::splitter::IntersectionPoint;
use crate::union_find::UnionFind;
use crate::{GraphConfig, NodeId, Result, Trail, TrailGraphError, TrailId, TrailPoint};

/// Output of the node builder.
#[derive(Debug, Clone, Default)]
pub struct NodeBuildResult {
    /// Nodes ordered by id (1..n, coordinate order)
    pub nodes: Vec<RoutingNode>,
    pub candidate_points: usize,
    pub merged_points: usize,
    pub intersection_nodes: usize,
    pub endpoint_nodes: usize,
}

#[derive(Debug, Clone)]
struct Candidate {
    point: TrailPoint,
    node_type: NodeType,
    trails: Vec<TrailId>,
}

/// Derives deduplicated routing nodes from segments and intersection points.
pub struct NodeBuilder<'a> {
    config: &'a GraphConfig,
}

impl<'a> NodeBuilder<'a> {
    pub fn new(config: &'a GraphConfig) -> Self {
        Self { config }
    }

    pub fn build(
        &self,
        segments: &[Trail],
        intersections: &[IntersectionPoint],
    ) -> Result<NodeBuildResult> {
        let tolerance = self.config.node_merge_tolerance_m;
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(TrailGraphError::config(format!(
                "node_merge_tolerance_m must be a positive number, got {}",
                tolerance
            )));
        }

        let candidates = collect_candidates(segments, intersections);
        if candidates.is_empty() {
            info!("[NodeBuilder] No candidate points, graph has no nodes");
            return Ok(NodeBuildResult::default());
        }

        let index = PointIndex::new(candidates.iter().map(|c| c.point).collect());
        let mut uf = UnionFind::new(candidates.len());
        for (i, candidate) in candidates.iter().enumerate() {
            for (j, _) in index.within(&candidate.point, tolerance) {
                if j > i {
                    uf.union(i, j);
                }
            }
        }

        let mut nodes: Vec<RoutingNode> = uf
            .groups()
            .iter()
            .map(|group| merge_group(&candidates, group))
            .collect();
        nodes.sort_by(|a, b| coordinate_order(a.latitude, a.longitude, b.latitude, b.longitude));
        for (i, node) in nodes.iter_mut().enumerate() {
            node.id = i as NodeId + 1;
        }

        let intersection_nodes = nodes
            .iter()
            .filter(|n| n.node_type == NodeType::Intersection)
            .count();
        let result = NodeBuildResult {
            candidate_points: candidates.len(),
            merged_points: candidates.len() - nodes.len(),
            intersection_nodes,
            endpoint_nodes: nodes.len() - intersection_nodes,
            nodes,
        };

        info!(
            "[NodeBuilder] {} candidate points -> {} nodes ({} intersection, {} endpoint)",
            result.candidate_points,
            result.nodes.len(),
            result.intersection_nodes,
            result.endpoint_nodes
        );
        Ok(result)
    }
}

fn collect_candidates(segments: &[Trail], intersections: &[IntersectionPoint]) -> Vec<Candidate> {
    let mut candidates = Vec::with_capacity(segments.len() * 2 + intersections.len());
    for segment in segments {
        for point in [segment.start(), segment.end()].into_iter().flatten() {
            candidates.push(Candidate {
                point: *point,
                node_type: NodeType::Endpoint,
                trails: vec![segment.catalog_id()],
            });
        }
    }
    for ip in intersections {
        candidates.push(Candidate {
            point: ip.point,
            node_type: NodeType::Intersection,
            trails: ip.connected_trail_ids.clone(),
        });
    }
    candidates
}

/// Collapse one group of candidates into a node (id assigned later).
fn merge_group(candidates: &[Candidate], group: &[usize]) -> RoutingNode {
    let mut members: Vec<&Candidate> = group.iter().map(|&i| &candidates[i]).collect();
    members.sort_by(|a, b| {
        let a_int = a.node_type == NodeType::Intersection;
        let b_int = b.node_type == NodeType::Intersection;
        b_int
            .cmp(&a_int)
            .then(b.trails.len().cmp(&a.trails.len()))
            .then(coordinate_order(
                a.point.latitude,
                a.point.longitude,
                b.point.latitude,
                b.point.longitude,
            ))
    });
    let representative = members[0];

    let mut trails: Vec<TrailId> = members.iter().flat_map(|c| c.trails.iter().copied()).collect();
    trails.sort_unstable();
    trails.dedup();

    let elevation = representative
        .point
        .elevation
        .or_else(|| members.iter().find_map(|c| c.point.elevation))
        .unwrap_or(0.0);

    let node_type = if members.iter().any(|c| c.node_type == NodeType::Intersection) || trails.len() >= 2 {
        NodeType::Intersection
    } else {
        NodeType::Endpoint
    };

    if members.len() > 1 {
        debug!(
            "[NodeBuilder] Merged {} points at ({:.6}, {:.6}) trails {:?}",
            members.len(),
            representative.point.latitude,
            representative.point.longitude,
            trails
        );
    }

    RoutingNode {
        id: 0,
        latitude: representative.point.latitude,
        longitude: representative.point.longitude,
        elevation,
        node_type,
        connected_trails: trails,
    }
}

fn coordinate_order(lat_a: f64, lng_a: f64, lat_b: f64, lng_b: f64) -> Ordering {
    lat_a.total_cmp(&lat_b).then(lng_a.total_cmp(&lng_b))
}

/// Build routing nodes from split segments and their intersection points.
pub fn build_nodes(
    segments: &[Trail],
    intersections: &[IntersectionPoint],
    config: &GraphConfig,
) -> Result<NodeBuildResult> {
    NodeBuilder::new(config).build(segments, intersections)
}
