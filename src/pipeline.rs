//! # Trail Pipeline
//!
//! Runs the stages against one workspace of a store:
//!
//! 1. `split_trails` - cut catalog trails at intersections, replace them with segments
//! 2. `build_routing_graph` - derive nodes and edges, save the graph
//! 3. `validate_graph` - remove invalid edges and orphans, check integrity
//! 4. `generate_recommendations` - search, score and store routes per pattern
//!
//! Every operation returns an `OperationResult`; errors from lower layers are
//! converted into a failed result and logged, never propagated.

use std::collections::HashMap;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::edges::{build_edges, dangling_edges};
use crate::graph::RoutingGraph;
use crate::nodes::build_nodes;
use crate::recommend::{RoutePattern, RouteRecommender};
use crate::splitter::{split_trails, IntersectionPoint};
use crate::validation::{check_integrity, cleanup_graph};
use crate::workspace::{WorkspaceId, WorkspaceStore};
use crate::{PipelineConfig, Result, TrailGraphError};

// ============================================================================
// Results
// ============================================================================

/// Outcome of one pipeline operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub operation: String,
    /// Items produced or examined by the operation
    pub count: usize,
    pub success: bool,
    pub message: String,
}

impl OperationResult {
    fn ok(operation: &str, count: usize, message: String) -> Self {
        Self {
            operation: operation.to_string(),
            count,
            success: true,
            message,
        }
    }

    fn failed(operation: &str, count: usize, message: String) -> Self {
        Self {
            operation: operation.to_string(),
            count,
            success: false,
            message,
        }
    }
}

/// Per-stage results of `TrailPipeline::run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub workspace: WorkspaceId,
    /// Stages in execution order; stops after the first failure
    pub stages: Vec<OperationResult>,
}

impl PipelineReport {
    /// True when every stage ran and succeeded.
    pub fn success(&self) -> bool {
        self.stages.len() == STAGE_COUNT && self.stages.iter().all(|s| s.success)
    }

    pub fn stage(&self, operation: &str) -> Option<&OperationResult> {
        self.stages.iter().find(|s| s.operation == operation)
    }
}

const STAGE_COUNT: usize = 4;

// ============================================================================
// Pipeline
// ============================================================================

/// Stage orchestration over a `WorkspaceStore`.
pub struct TrailPipeline<S: WorkspaceStore> {
    config: PipelineConfig,
    store: S,
    /// Intersections found by the last split, per workspace
    intersections: HashMap<WorkspaceId, Vec<IntersectionPoint>>,
}

impl<S: WorkspaceStore> TrailPipeline<S> {
    /// Create a pipeline. The configuration is validated once here.
    pub fn new(config: PipelineConfig, store: S) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            intersections: HashMap::new(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Split the workspace's trails and store the segments in their place.
    pub fn split_trails(&mut self, workspace: &WorkspaceId) -> OperationResult {
        let operation = "split_trails";
        self.try_split(workspace)
            .unwrap_or_else(|e| failure(operation, workspace, e))
    }

    /// Build nodes and edges from the stored segments and save the graph.
    pub fn build_routing_graph(&mut self, workspace: &WorkspaceId) -> OperationResult {
        let operation = "build_routing_graph";
        self.try_build_graph(workspace)
            .unwrap_or_else(|e| failure(operation, workspace, e))
    }

    /// Clean up the stored graph and check its integrity.
    pub fn validate_graph(&mut self, workspace: &WorkspaceId) -> OperationResult {
        let operation = "validate_graph";
        self.try_validate(workspace)
            .unwrap_or_else(|e| failure(operation, workspace, e))
    }

    /// Replace the workspace's recommendations with fresh ones for `patterns`.
    pub fn generate_recommendations(
        &mut self,
        workspace: &WorkspaceId,
        patterns: &[RoutePattern],
    ) -> OperationResult {
        let operation = "generate_recommendations";
        self.try_recommend(workspace, patterns)
            .unwrap_or_else(|e| failure(operation, workspace, e))
    }

    /// Run every stage in order, stopping at the first failure.
    pub fn run(&mut self, workspace: &WorkspaceId, patterns: &[RoutePattern]) -> PipelineReport {
        let mut report = PipelineReport {
            workspace: workspace.clone(),
            stages: Vec::with_capacity(STAGE_COUNT),
        };

        for stage in 0..STAGE_COUNT {
            let result = match stage {
                0 => self.split_trails(workspace),
                1 => self.build_routing_graph(workspace),
                2 => self.validate_graph(workspace),
                _ => self.generate_recommendations(workspace, patterns),
            };
            let stop = !result.success;
            report.stages.push(result);
            if stop {
                break;
            }
        }

        info!(
            "[TrailPipeline] {}: {}/{} stages succeeded",
            workspace,
            report.stages.iter().filter(|s| s.success).count(),
            STAGE_COUNT
        );
        report
    }

    fn try_split(&mut self, workspace: &WorkspaceId) -> Result<OperationResult> {
        let operation = "split_trails";
        let trails = self.store.load_trails(workspace)?;
        if trails.is_empty() {
            return Ok(OperationResult::failed(
                operation,
                0,
                "no trails in workspace".to_string(),
            ));
        }

        let split = split_trails(&trails, &self.config.graph);
        if split.segments.is_empty() {
            return Ok(OperationResult::failed(
                operation,
                0,
                format!(
                    "all {} trails were invalid",
                    split.stats.invalid_trails
                ),
            ));
        }

        self.store.replace_trails(workspace, &split.segments)?;
        let stats = &split.stats;
        let message = format!(
            "{} trails -> {} segments ({} split, {} intersections, {} invalid skipped)",
            stats.input_trails,
            split.segments.len(),
            stats.trails_split,
            stats.intersection_points,
            stats.invalid_trails
        );
        let count = split.segments.len();
        self.intersections
            .insert(workspace.clone(), split.intersections);
        Ok(OperationResult::ok(operation, count, message))
    }

    fn try_build_graph(&mut self, workspace: &WorkspaceId) -> Result<OperationResult> {
        let operation = "build_routing_graph";
        let segments = self.store.load_trails(workspace)?;
        if segments.is_empty() {
            return Ok(OperationResult::failed(
                operation,
                0,
                "no trail segments to build from".to_string(),
            ));
        }

        let intersections = self
            .intersections
            .get(workspace)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let nodes = build_nodes(&segments, intersections, &self.config.graph)?;
        let edges = build_edges(&segments, &nodes.nodes, &self.config.graph)?;

        let message = format!(
            "{} nodes ({} intersections, {} endpoints), {} edges, {} segments skipped, {} self-loops",
            nodes.nodes.len(),
            nodes.intersection_nodes,
            nodes.endpoint_nodes,
            edges.edges.len(),
            edges.skipped_segments,
            edges.self_loops
        );
        let graph = RoutingGraph::new(nodes.nodes, edges.edges);
        self.store.save_graph(workspace, &graph)?;

        let stored = self.store.load_graph(workspace)?;
        let dangling = dangling_edges(stored.nodes(), stored.edges());
        if let Some(first) = dangling.first() {
            return Err(TrailGraphError::topology(format!(
                "{} stored edges reference missing nodes (first: edge {})",
                dangling.len(),
                first
            )));
        }
        Ok(OperationResult::ok(operation, stored.edge_count(), message))
    }

    fn try_validate(&mut self, workspace: &WorkspaceId) -> Result<OperationResult> {
        let operation = "validate_graph";
        let trails = self.store.load_trails(workspace)?;
        let mut graph = self.store.load_graph(workspace)?;

        let cleanup = cleanup_graph(&mut graph);
        if cleanup.total_removed() > 0 {
            self.store.save_graph(workspace, &graph)?;
        }

        let report = check_integrity(&trails, &graph, &self.config.graph);
        let message = format!(
            "removed {} elements; {} errors, {} warnings, {} components (largest {} nodes)",
            cleanup.total_removed(),
            report.error_count(),
            report.warning_count(),
            report.component_count,
            report.largest_component
        );
        for issue in report.issues.iter().take(10) {
            warn!("[TrailPipeline] {}: {}", workspace, issue);
        }

        if report.is_valid() {
            Ok(OperationResult::ok(operation, report.issues.len(), message))
        } else {
            Ok(OperationResult::failed(operation, report.issues.len(), message))
        }
    }

    fn try_recommend(
        &mut self,
        workspace: &WorkspaceId,
        patterns: &[RoutePattern],
    ) -> Result<OperationResult> {
        let operation = "generate_recommendations";
        let graph = self.store.load_graph(workspace)?;
        if graph.edge_count() == 0 {
            return Ok(OperationResult::failed(
                operation,
                0,
                "routing graph has no edges".to_string(),
            ));
        }

        let region = self
            .store
            .load_trails(workspace)?
            .first()
            .map(|t| t.metadata.region.clone())
            .unwrap_or_default();

        let result = RouteRecommender::new(&graph, &self.config.route, &self.config.scoring)
            .with_region(&region)
            .recommend(patterns)?;

        self.store.clear_recommendations(workspace)?;
        let stored = self
            .store
            .append_recommendations(workspace, &result.recommendations)?;

        Ok(OperationResult::ok(
            operation,
            stored,
            format!(
                "{} routes for {}/{} patterns",
                stored,
                result.satisfied_patterns(),
                patterns.len()
            ),
        ))
    }
}

fn failure(operation: &str, workspace: &WorkspaceId, error: TrailGraphError) -> OperationResult {
    warn!("[TrailPipeline] {} failed for {}: {}", operation, workspace, error);
    OperationResult::failed(operation, 0, error.to_string())
}
