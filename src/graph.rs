//! Routing graph value objects.
//!
//! A `RoutingGraph` is owned by one pipeline run and passed by reference
//! between stages. Edges are stored in segment direction (source → target)
//! but are walkable both ways; `HalfEdge` carries the per-direction cost.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::union_find::UnionFind;
use crate::{EdgeId, NodeId, TrailId, TrailPoint};

/// Kind of routing node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Two or more trails meet here
    Intersection,
    /// A trail ends here without meeting another
    Endpoint,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Intersection => "intersection",
            NodeType::Endpoint => "endpoint",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "intersection" => Some(NodeType::Intersection),
            "endpoint" => Some(NodeType::Endpoint),
            _ => None,
        }
    }
}

/// A vertex of the routing graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingNode {
    pub id: NodeId,
    pub latitude: f64,
    pub longitude: f64,
    /// Elevation in meters (0 when the source geometry had none)
    pub elevation: f64,
    pub node_type: NodeType,
    /// Catalog trail ids meeting at this node, sorted
    pub connected_trails: Vec<TrailId>,
}

impl RoutingNode {
    pub fn point(&self) -> TrailPoint {
        TrailPoint::with_elevation(self.latitude, self.longitude, self.elevation)
    }
}

/// An arc between two routing nodes, backed by one trail segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    /// Segment id the edge was built from
    pub trail_id: TrailId,
    /// Catalog trail the segment belongs to
    pub catalog_trail_id: TrailId,
    pub trail_name: String,
    pub length_km: f64,
    /// Climb when walking source → target (m)
    pub elevation_gain: f64,
    /// Descent when walking source → target (m)
    pub elevation_loss: f64,
    pub geometry: Vec<TrailPoint>,
}

impl RoutingEdge {
    /// The node at the other end, if `node` is one of the edge's ends.
    pub fn other_end(&self, node: NodeId) -> Option<NodeId> {
        if node == self.source {
            Some(self.target)
        } else if node == self.target {
            Some(self.source)
        } else {
            None
        }
    }

    /// Elevation gain when walking away from `from`.
    pub fn gain_from(&self, from: NodeId) -> f64 {
        if from == self.source {
            self.elevation_gain
        } else {
            self.elevation_loss
        }
    }

    /// Geometry oriented to start at `from`.
    pub fn geometry_from(&self, from: NodeId) -> Vec<TrailPoint> {
        if from == self.source {
            self.geometry.clone()
        } else {
            self.geometry.iter().rev().cloned().collect()
        }
    }
}

/// One traversal direction of an edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalfEdge {
    pub edge_id: EdgeId,
    pub to: NodeId,
    pub distance_km: f64,
    pub gain_m: f64,
}

/// Nodes and edges of one workspace's routing network.
#[derive(Debug, Clone, Default)]
pub struct RoutingGraph {
    nodes: Vec<RoutingNode>,
    edges: Vec<RoutingEdge>,
    node_index: HashMap<NodeId, usize>,
    edge_index: HashMap<EdgeId, usize>,
}

impl RoutingGraph {
    pub fn new(nodes: Vec<RoutingNode>, edges: Vec<RoutingEdge>) -> Self {
        let mut graph = Self {
            nodes,
            edges,
            node_index: HashMap::new(),
            edge_index: HashMap::new(),
        };
        graph.reindex();
        graph
    }

    fn reindex(&mut self) {
        self.node_index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id, i))
            .collect();
        self.edge_index = self
            .edges
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id, i))
            .collect();
    }

    pub fn nodes(&self) -> &[RoutingNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[RoutingEdge] {
        &self.edges
    }

    pub fn node(&self, id: NodeId) -> Option<&RoutingNode> {
        self.node_index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn edge(&self, id: EdgeId) -> Option<&RoutingEdge> {
        self.edge_index.get(&id).map(|&i| &self.edges[i])
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.node_index.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Keep only edges matching the predicate. Returns the number removed.
    pub fn retain_edges<F: FnMut(&RoutingEdge) -> bool>(&mut self, keep: F) -> usize {
        let before = self.edges.len();
        self.edges.retain(keep);
        self.reindex();
        before - self.edges.len()
    }

    /// Keep only nodes matching the predicate. Returns the number removed.
    pub fn retain_nodes<F: FnMut(&RoutingNode) -> bool>(&mut self, keep: F) -> usize {
        let before = self.nodes.len();
        self.nodes.retain(keep);
        self.reindex();
        before - self.nodes.len()
    }

    /// Walkable half-edges leaving each node, ordered by edge id.
    ///
    /// Edges whose ends are not both present are left out.
    pub fn adjacency(&self) -> HashMap<NodeId, Vec<HalfEdge>> {
        let mut adjacency: HashMap<NodeId, Vec<HalfEdge>> =
            self.nodes.iter().map(|n| (n.id, Vec::new())).collect();

        for edge in &self.edges {
            if edge.source == edge.target
                || !self.contains_node(edge.source)
                || !self.contains_node(edge.target)
            {
                continue;
            }
            for (from, to) in [(edge.source, edge.target), (edge.target, edge.source)] {
                if let Some(list) = adjacency.get_mut(&from) {
                    list.push(HalfEdge {
                        edge_id: edge.id,
                        to,
                        distance_km: edge.length_km,
                        gain_m: edge.gain_from(from),
                    });
                }
            }
        }

        for list in adjacency.values_mut() {
            list.sort_by_key(|h| (h.edge_id, h.to));
        }
        adjacency
    }

    /// Number of edges touching each node.
    pub fn degrees(&self) -> HashMap<NodeId, usize> {
        let mut degrees: HashMap<NodeId, usize> = self.nodes.iter().map(|n| (n.id, 0)).collect();
        for edge in &self.edges {
            for end in [edge.source, edge.target] {
                if let Some(d) = degrees.get_mut(&end) {
                    *d += 1;
                }
            }
        }
        degrees
    }

    /// Sizes (in nodes) of the connected components, largest first.
    pub fn component_sizes(&self) -> Vec<usize> {
        let mut uf = UnionFind::new(self.nodes.len());
        for edge in &self.edges {
            if let (Some(&a), Some(&b)) = (
                self.node_index.get(&edge.source),
                self.node_index.get(&edge.target),
            ) {
                uf.union(a, b);
            }
        }
        let mut sizes: Vec<usize> = uf.groups().iter().map(Vec::len).collect();
        sizes.sort_unstable_by(|a, b| b.cmp(a));
        sizes
    }
}
