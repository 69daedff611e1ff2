//! Routing edge derivation.
//!
//! Each split segment becomes one edge between the nodes nearest its two
//! endpoints. Segments that cannot be bound to two distinct nodes are skipped
//! and counted rather than failing the stage.

use std::collections::HashSet;

use log::{info, warn};

use crate::geo_utils::PointIndex;
use crate::graph::{RoutingEdge, RoutingNode};
use crate::{EdgeId, GraphConfig, NodeId, Result, Trail, TrailGraphError};

/// Output of the edge builder.
#[derive(Debug, Clone, Default)]
pub struct EdgeBuildResult {
    pub edges: Vec<RoutingEdge>,
    /// Segments with an endpoint farther than the edge tolerance from any node
    pub skipped_segments: usize,
    /// Segments whose ends resolved to the same node
    pub self_loops: usize,
}

/// Binds segments to their end nodes.
pub struct EdgeBuilder<'a> {
    config: &'a GraphConfig,
}

impl<'a> EdgeBuilder<'a> {
    pub fn new(config: &'a GraphConfig) -> Self {
        Self { config }
    }

    pub fn build(&self, segments: &[Trail], nodes: &[RoutingNode]) -> Result<EdgeBuildResult> {
        let tolerance = self.config.edge_tolerance_m;
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(TrailGraphError::config(format!(
                "edge_tolerance_m must be a positive number, got {}",
                tolerance
            )));
        }

        let mut result = EdgeBuildResult::default();
        if segments.is_empty() {
            return Ok(result);
        }

        let index = PointIndex::new(nodes.iter().map(RoutingNode::point).collect());
        let nearest = |segment: &Trail, at_start: bool| -> Option<NodeId> {
            let point = if at_start { segment.start() } else { segment.end() }?;
            index
                .nearest_within(point, tolerance)
                .map(|(i, _)| nodes[i].id)
        };

        let mut next_id: EdgeId = 1;
        for segment in segments {
            let (Some(source), Some(target)) = (nearest(segment, true), nearest(segment, false))
            else {
                warn!(
                    "[EdgeBuilder] Skipping segment {} '{}': no node within {:.1}m of an endpoint",
                    segment.id, segment.name, tolerance
                );
                result.skipped_segments += 1;
                continue;
            };

            if source == target {
                warn!(
                    "[EdgeBuilder] Rejecting segment {} '{}': both ends resolve to node {}",
                    segment.id, segment.name, source
                );
                result.self_loops += 1;
                continue;
            }

            result.edges.push(RoutingEdge {
                id: next_id,
                source,
                target,
                trail_id: segment.id,
                catalog_trail_id: segment.catalog_id(),
                trail_name: segment.name.clone(),
                length_km: segment.stats.length_km,
                elevation_gain: segment.stats.elevation_gain,
                elevation_loss: segment.stats.elevation_loss,
                geometry: segment.points.clone(),
            });
            next_id += 1;
        }

        info!(
            "[EdgeBuilder] {} segments -> {} edges ({} skipped, {} self-loops)",
            segments.len(),
            result.edges.len(),
            result.skipped_segments,
            result.self_loops
        );
        Ok(result)
    }
}

/// Build routing edges from split segments and their nodes.
pub fn build_edges(
    segments: &[Trail],
    nodes: &[RoutingNode],
    config: &GraphConfig,
) -> Result<EdgeBuildResult> {
    EdgeBuilder::new(config).build(segments, nodes)
}

/// Ids of edges whose source or target is not among `nodes`.
pub fn dangling_edges(nodes: &[RoutingNode], edges: &[RoutingEdge]) -> Vec<EdgeId> {
    let node_ids: HashSet<NodeId> = nodes.iter().map(|n| n.id).collect();
    edges
        .iter()
        .filter(|e| !node_ids.contains(&e.source) || !node_ids.contains(&e.target))
        .map(|e| e.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeType;
    use crate::nodes::build_nodes;
    use crate::{TrailMetadata, TrailPoint};

    fn segment(id: i64, points: Vec<TrailPoint>) -> Trail {
        Trail::new(id, "Segment", TrailMetadata::default(), points)
    }

    fn node(id: NodeId, lat: f64, lng: f64) -> RoutingNode {
        RoutingNode {
            id,
            latitude: lat,
            longitude: lng,
            elevation: 0.0,
            node_type: NodeType::Endpoint,
            connected_trails: vec![1],
        }
    }

    #[test]
    fn test_isolated_trail_single_edge() {
        let seg = segment(
            1,
            vec![
                TrailPoint::with_elevation(40.0, -105.0, 1800.0),
                TrailPoint::with_elevation(40.009, -105.0, 1850.0),
                TrailPoint::with_elevation(40.018, -105.0, 1830.0),
            ],
        );
        let config = GraphConfig::default();
        let nodes = build_nodes(std::slice::from_ref(&seg), &[], &config).unwrap();
        let result = build_edges(&[seg], &nodes.nodes, &config).unwrap();

        assert_eq!(result.edges.len(), 1);
        let edge = &result.edges[0];
        assert_eq!(edge.source, 1);
        assert_eq!(edge.target, 2);
        assert!((edge.length_km - 2.0).abs() < 0.01);
        assert_eq!(edge.elevation_gain, 50.0);
        assert_eq!(edge.elevation_loss, 20.0);
    }

    #[test]
    fn test_binds_within_tolerance() {
        // Segment ends ~3m from the nodes
        let seg = segment(
            7,
            vec![TrailPoint::new(40.00003, -105.0), TrailPoint::new(40.01003, -105.0)],
        );
        let nodes = vec![node(1, 40.0, -105.0), node(2, 40.01, -105.0)];
        let result = build_edges(&[seg], &nodes, &GraphConfig::default()).unwrap();
        assert_eq!(result.edges.len(), 1);
        assert_eq!(result.edges[0].trail_id, 7);
    }

    #[test]
    fn test_skips_unbound_segment() {
        let seg = segment(1, vec![TrailPoint::new(40.0, -105.0), TrailPoint::new(40.01, -105.0)]);
        let nodes = vec![node(1, 40.0, -105.0)];
        let result = build_edges(&[seg], &nodes, &GraphConfig::default()).unwrap();
        assert!(result.edges.is_empty());
        assert_eq!(result.skipped_segments, 1);
    }

    #[test]
    fn test_rejects_self_loop() {
        // Both ends within tolerance of the same node
        let seg = segment(
            1,
            vec![
                TrailPoint::new(40.0, -105.0),
                TrailPoint::new(40.00001, -105.00001),
                TrailPoint::new(40.00002, -105.0),
            ],
        );
        let nodes = vec![node(1, 40.00001, -105.0)];
        let result = build_edges(&[seg], &nodes, &GraphConfig::default()).unwrap();
        assert!(result.edges.is_empty());
        assert_eq!(result.self_loops, 1);
    }

    #[test]
    fn test_edge_ids_sequential() {
        let segs = vec![
            segment(10, vec![TrailPoint::new(40.0, -105.0), TrailPoint::new(40.01, -105.0)]),
            segment(11, vec![TrailPoint::new(40.01, -105.0), TrailPoint::new(40.02, -105.0)]),
        ];
        let nodes = vec![
            node(1, 40.0, -105.0),
            node(2, 40.01, -105.0),
            node(3, 40.02, -105.0),
        ];
        let result = build_edges(&segs, &nodes, &GraphConfig::default()).unwrap();
        let ids: Vec<EdgeId> = result.edges.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(result.edges[1].source, 2);
    }

    #[test]
    fn test_dangling_edges_against_other_node_set() {
        let segs = vec![
            segment(10, vec![TrailPoint::new(40.0, -105.0), TrailPoint::new(40.01, -105.0)]),
            segment(11, vec![TrailPoint::new(40.01, -105.0), TrailPoint::new(40.02, -105.0)]),
        ];
        let nodes = vec![
            node(1, 40.0, -105.0),
            node(2, 40.01, -105.0),
            node(3, 40.02, -105.0),
        ];
        let result = build_edges(&segs, &nodes, &GraphConfig::default()).unwrap();
        assert!(dangling_edges(&nodes, &result.edges).is_empty());
        assert_eq!(dangling_edges(&nodes[..2], &result.edges), vec![2]);
    }

    #[test]
    fn test_binds_across_wide_latitude_span() {
        // Node ~4.5 m east of the segment end at 71N, other nodes at 58N
        let step = 4.5 / (111_320.0 * 71f64.to_radians().cos());
        let seg = segment(5, vec![TrailPoint::new(71.01, 10.0), TrailPoint::new(71.0, 10.0)]);
        let nodes = vec![
            node(1, 58.0, 10.0),
            node(2, 58.01, 10.0),
            node(3, 71.0, 10.0 + step),
            node(4, 71.01, 10.0),
        ];
        let result = build_edges(&[seg], &nodes, &GraphConfig::default()).unwrap();
        assert_eq!(result.skipped_segments, 0);
        assert_eq!(result.edges.len(), 1);
        assert_eq!((result.edges[0].source, result.edges[0].target), (4, 3));
    }
}
