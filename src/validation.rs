//! Graph cleanup and integrity checks.
//!
//! `cleanup_graph` repairs what can be repaired by deletion; `check_integrity`
//! only reports. Errors make a graph unusable for routing, warnings are
//! informational (near-duplicate nodes, for example, are legal).

use std::collections::HashSet;
use std::fmt;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::geo_utils::PointIndex;
use crate::geometry::{GeoOracle, GeometryOracle};
use crate::graph::{NodeType, RoutingGraph};
use crate::{GraphConfig, Trail, TrailPoint};

/// Counts of what `cleanup_graph` removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub self_loops_removed: usize,
    pub invalid_edges_removed: usize,
    pub dangling_edges_removed: usize,
    pub orphan_nodes_removed: usize,
}

impl CleanupReport {
    pub fn total_removed(&self) -> usize {
        self.self_loops_removed
            + self.invalid_edges_removed
            + self.dangling_edges_removed
            + self.orphan_nodes_removed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Error,
    Warning,
}

/// One finding of the integrity check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityIssue {
    pub severity: IssueSeverity,
    /// Stable machine-readable category, e.g. "dangling_edge"
    pub kind: String,
    pub message: String,
}

impl IntegrityIssue {
    fn error(kind: &str, message: String) -> Self {
        Self {
            severity: IssueSeverity::Error,
            kind: kind.to_string(),
            message,
        }
    }

    fn warning(kind: &str, message: String) -> Self {
        Self {
            severity: IssueSeverity::Warning,
            kind: kind.to_string(),
            message,
        }
    }
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            IssueSeverity::Error => "error",
            IssueSeverity::Warning => "warning",
        };
        write!(f, "[{}] {}: {}", level, self.kind, self.message)
    }
}

/// Result of `check_integrity`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub issues: Vec<IntegrityIssue>,
    pub trail_count: usize,
    pub node_count: usize,
    pub edge_count: usize,
    pub component_count: usize,
    pub largest_component: usize,
}

impl IntegrityReport {
    /// True when no error-level issue was found.
    pub fn is_valid(&self) -> bool {
        self.error_count() == 0
    }

    pub fn error_count(&self) -> usize {
        self.count(IssueSeverity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(IssueSeverity::Warning)
    }

    fn count(&self, severity: IssueSeverity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    /// Issues of one category.
    pub fn of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a IntegrityIssue> + 'a {
        self.issues.iter().filter(move |i| i.kind == kind)
    }
}

/// Remove self-loops, invalid and dangling edges, then nodes left without edges.
pub fn cleanup_graph(graph: &mut RoutingGraph) -> CleanupReport {
    let oracle = GeoOracle::new();
    let mut report = CleanupReport {
        self_loops_removed: graph.retain_edges(|e| e.source != e.target),
        invalid_edges_removed: graph.retain_edges(|e| oracle.is_valid(&e.geometry)),
        ..Default::default()
    };

    let node_ids: HashSet<_> = graph.nodes().iter().map(|n| n.id).collect();
    report.dangling_edges_removed =
        graph.retain_edges(|e| node_ids.contains(&e.source) && node_ids.contains(&e.target));

    let degrees = graph.degrees();
    report.orphan_nodes_removed =
        graph.retain_nodes(|n| degrees.get(&n.id).copied().unwrap_or(0) > 0);

    if report.total_removed() > 0 {
        warn!(
            "[GraphValidator] Cleanup removed {} self-loops, {} invalid edges, {} dangling edges, {} orphan nodes",
            report.self_loops_removed,
            report.invalid_edges_removed,
            report.dangling_edges_removed,
            report.orphan_nodes_removed
        );
    } else {
        info!("[GraphValidator] Cleanup found nothing to remove");
    }
    report
}

/// Check trails and graph against the topology invariants.
pub fn check_integrity(
    trails: &[Trail],
    graph: &RoutingGraph,
    config: &GraphConfig,
) -> IntegrityReport {
    let oracle = GeoOracle::new();
    let mut issues = Vec::new();

    // Trails
    let mut srids: Vec<i32> = trails.iter().map(|t| t.srid).collect();
    srids.sort_unstable();
    srids.dedup();
    if srids.len() > 1 {
        issues.push(IntegrityIssue::error(
            "mixed_srid",
            format!("trails use {} spatial reference ids: {:?}", srids.len(), srids),
        ));
    }
    for trail in trails {
        if trail.srid != config.srid {
            issues.push(IntegrityIssue::error(
                "unexpected_srid",
                format!("trail {} has srid {}, expected {}", trail.id, trail.srid, config.srid),
            ));
        }
        if !oracle.is_valid(&trail.points) {
            issues.push(IntegrityIssue::error(
                "invalid_trail_geometry",
                format!("trail {} '{}' has invalid geometry", trail.id, trail.name),
            ));
        }
        if trail.length_m() > config.max_trail_length_m {
            issues.push(IntegrityIssue::warning(
                "long_trail",
                format!(
                    "trail {} is {:.0}m long (limit {:.0}m)",
                    trail.id,
                    trail.length_m(),
                    config.max_trail_length_m
                ),
            ));
        }
        let implausible = trail.points.iter().filter_map(|p| p.elevation).any(|e| {
            e < config.min_elevation_m || e > config.max_elevation_m
        });
        if implausible {
            issues.push(IntegrityIssue::warning(
                "implausible_elevation",
                format!(
                    "trail {} has elevation outside [{}, {}]",
                    trail.id, config.min_elevation_m, config.max_elevation_m
                ),
            ));
        }
    }

    // Nodes
    for node in graph.nodes() {
        if !TrailPoint::new(node.latitude, node.longitude).is_valid() {
            issues.push(IntegrityIssue::error(
                "invalid_node_coordinates",
                format!("node {} at ({}, {})", node.id, node.latitude, node.longitude),
            ));
        }
        if node.node_type == NodeType::Intersection && node.connected_trails.len() < 2 {
            issues.push(IntegrityIssue::error(
                "underconnected_intersection",
                format!(
                    "intersection node {} connects {} trail(s)",
                    node.id,
                    node.connected_trails.len()
                ),
            ));
        }
    }
    let index = PointIndex::new(graph.nodes().iter().map(|n| n.point()).collect());
    for (i, node) in graph.nodes().iter().enumerate() {
        for (j, distance) in index.within(&node.point(), config.node_merge_tolerance_m) {
            if j > i {
                issues.push(IntegrityIssue::warning(
                    "near_duplicate_nodes",
                    format!(
                        "nodes {} and {} are {:.2}m apart",
                        node.id,
                        graph.nodes()[j].id,
                        distance
                    ),
                ));
            }
        }
    }

    // Edges
    for edge in graph.edges() {
        if edge.source == edge.target {
            issues.push(IntegrityIssue::error(
                "self_loop",
                format!("edge {} starts and ends at node {}", edge.id, edge.source),
            ));
        }
        for end in [edge.source, edge.target] {
            if !graph.contains_node(end) {
                issues.push(IntegrityIssue::error(
                    "dangling_edge",
                    format!("edge {} references missing node {}", edge.id, end),
                ));
            }
        }
        if !oracle.is_valid(&edge.geometry) {
            issues.push(IntegrityIssue::error(
                "invalid_edge_geometry",
                format!("edge {} has invalid geometry", edge.id),
            ));
        }
    }

    let components = graph.component_sizes();
    let report = IntegrityReport {
        issues,
        trail_count: trails.len(),
        node_count: graph.node_count(),
        edge_count: graph.edge_count(),
        component_count: components.len(),
        largest_component: components.first().copied().unwrap_or(0),
    };

    info!(
        "[GraphValidator] {} nodes, {} edges, {} components (largest {}): {} errors, {} warnings",
        report.node_count,
        report.edge_count,
        report.component_count,
        report.largest_component,
        report.error_count(),
        report.warning_count()
    );
    for issue in report.issues.iter().filter(|i| i.severity == IssueSeverity::Error) {
        warn!("[GraphValidator] {}", issue);
    }
    report
}
