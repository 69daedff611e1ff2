//! # Route Search
//!
//! Bounded depth-first enumeration of paths whose distance and elevation gain
//! fall within a symmetric tolerance of a target.
//!
//! ## Algorithm
//! - Start from every node (or a caller-supplied subset), ascending id
//! - Extend along incident edges in either direction; a node already on the
//!   path is never revisited, except the start node, which closes a loop and
//!   ends that path
//! - Prune as soon as distance or gain exceeds `target × (1 + tolerance)`
//! - Accept paths of 2+ nodes with both metrics inside `target × (1 ± tolerance)`
//! - Deduplicate by edge set, so reversals and loop rotations count once
//!
//! A circuit breaker caps accepted candidates, path extensions and
//! (optionally) wall-clock time; tripping it sets `truncated`.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::validate_tolerance_percent;
use crate::graph::{HalfEdge, RoutingGraph};
use crate::scoring::{classify_shape, RouteShape};
use crate::{EdgeId, NodeId, Result, RouteConfig, TrailGraphError, TrailId};

/// Check the deadline every this many extensions.
const CLOCK_CHECK_INTERVAL: usize = 1024;

/// What to search for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub target_distance_km: f64,
    pub target_elevation_gain_m: f64,
    /// Symmetric tolerance, in percent of each target
    pub tolerance_percent: f64,
    /// Restrict starts to these nodes (default: all nodes)
    #[serde(default)]
    pub start_nodes: Option<Vec<NodeId>>,
}

impl SearchRequest {
    pub fn new(target_distance_km: f64, target_elevation_gain_m: f64, tolerance_percent: f64) -> Self {
        Self {
            target_distance_km,
            target_elevation_gain_m,
            tolerance_percent,
            start_nodes: None,
        }
    }

    pub fn with_start_nodes(mut self, start_nodes: Vec<NodeId>) -> Self {
        self.start_nodes = Some(start_nodes);
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_tolerance_percent(self.tolerance_percent)?;
        if !self.target_distance_km.is_finite() || self.target_distance_km <= 0.0 {
            return Err(TrailGraphError::config(format!(
                "target distance must be positive, got {} km",
                self.target_distance_km
            )));
        }
        if !self.target_elevation_gain_m.is_finite() || self.target_elevation_gain_m < 0.0 {
            return Err(TrailGraphError::config(format!(
                "target elevation gain must not be negative, got {} m",
                self.target_elevation_gain_m
            )));
        }
        Ok(())
    }

    fn factor(&self) -> f64 {
        self.tolerance_percent / 100.0
    }

    pub fn max_distance_km(&self) -> f64 {
        self.target_distance_km * (1.0 + self.factor())
    }

    pub fn min_distance_km(&self) -> f64 {
        self.target_distance_km * (1.0 - self.factor())
    }

    pub fn max_elevation_gain_m(&self) -> f64 {
        self.target_elevation_gain_m * (1.0 + self.factor())
    }

    pub fn min_elevation_gain_m(&self) -> f64 {
        self.target_elevation_gain_m * (1.0 - self.factor())
    }

    /// Both metrics inside the tolerance band.
    pub fn accepts(&self, distance_km: f64, elevation_gain_m: f64) -> bool {
        distance_km >= self.min_distance_km()
            && distance_km <= self.max_distance_km()
            && elevation_gain_m >= self.min_elevation_gain_m()
            && elevation_gain_m <= self.max_elevation_gain_m()
    }

    fn over_budget(&self, distance_km: f64, elevation_gain_m: f64) -> bool {
        distance_km > self.max_distance_km() || elevation_gain_m > self.max_elevation_gain_m()
    }
}

/// A path through the routing graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteCandidate {
    /// Visited nodes in order; a loop repeats the start at the end
    pub path: Vec<NodeId>,
    /// Edges walked, parallel to consecutive node pairs of `path`
    pub edges: Vec<EdgeId>,
    pub distance_km: f64,
    pub elevation_gain_m: f64,
    pub shape: RouteShape,
    /// Distinct catalog trails used
    pub trail_count: usize,
}

impl RouteCandidate {
    /// Sorted edge ids, the identity used for deduplication.
    pub fn edge_key(&self) -> Vec<EdgeId> {
        let mut key = self.edges.clone();
        key.sort_unstable();
        key
    }
}

/// Candidates found by one search, with budget diagnostics.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub candidates: Vec<RouteCandidate>,
    pub starts_searched: usize,
    pub expansions: usize,
    /// A search budget was exhausted; more candidates may exist
    pub truncated: bool,
    pub elapsed: Duration,
}

/// Counters shared by every budget of one search.
#[derive(Debug, Default)]
struct Tally {
    candidates: AtomicUsize,
    expansions: AtomicUsize,
}

#[derive(Debug)]
struct Budget {
    max_candidates: usize,
    max_expansions: usize,
    deadline: Option<Instant>,
    tally: Arc<Tally>,
    /// Extensions made under this budget alone, for the clock check
    expansions: usize,
    tripped: bool,
}

impl Budget {
    fn new(config: &RouteConfig, started: Instant) -> Self {
        Self {
            max_candidates: config.max_candidates,
            max_expansions: config.max_expansions,
            deadline: config.max_search_duration.map(|d| started + d),
            tally: Arc::new(Tally::default()),
            expansions: 0,
            tripped: false,
        }
    }

    /// A fresh budget drawing on the same search-wide counters.
    #[cfg(feature = "parallel")]
    fn share(&self) -> Self {
        Self {
            max_candidates: self.max_candidates,
            max_expansions: self.max_expansions,
            deadline: self.deadline,
            tally: Arc::clone(&self.tally),
            expansions: 0,
            tripped: false,
        }
    }

    fn candidates(&self) -> usize {
        self.tally.candidates.load(Ordering::Relaxed)
    }

    fn total_expansions(&self) -> usize {
        self.tally.expansions.load(Ordering::Relaxed)
    }

    fn add_candidate(&self) {
        self.tally.candidates.fetch_add(1, Ordering::Relaxed);
    }

    fn add_expansion(&mut self) {
        self.expansions += 1;
        self.tally.expansions.fetch_add(1, Ordering::Relaxed);
    }

    fn exhausted(&mut self) -> bool {
        if self.tripped {
            return true;
        }
        let out_of_time = self.expansions % CLOCK_CHECK_INTERVAL == 0
            && self.deadline.is_some_and(|d| Instant::now() >= d);
        if self.candidates() >= self.max_candidates
            || self.total_expansions() >= self.max_expansions
            || out_of_time
        {
            self.tripped = true;
        }
        self.tripped
    }
}

#[derive(Debug, Clone)]
struct Frame {
    path: Vec<NodeId>,
    edges: Vec<EdgeId>,
    distance_km: f64,
    elevation_gain_m: f64,
    closed: bool,
}

impl Frame {
    fn node(&self) -> NodeId {
        self.path[self.path.len() - 1]
    }
}

/// Enumerates candidate routes over one routing graph.
pub struct RouteSearcher<'a> {
    graph: &'a RoutingGraph,
    config: &'a RouteConfig,
    adjacency: HashMap<NodeId, Vec<HalfEdge>>,
}

impl<'a> RouteSearcher<'a> {
    pub fn new(graph: &'a RoutingGraph, config: &'a RouteConfig) -> Self {
        Self {
            graph,
            config,
            adjacency: graph.adjacency(),
        }
    }

    fn starts(&self, request: &SearchRequest) -> Vec<NodeId> {
        let mut starts: Vec<NodeId> = match &request.start_nodes {
            Some(ids) => ids
                .iter()
                .copied()
                .filter(|id| self.graph.contains_node(*id))
                .collect(),
            None => self.graph.nodes().iter().map(|n| n.id).collect(),
        };
        starts.sort_unstable();
        starts.dedup();
        starts
    }

    /// Search sequentially with one budget shared by all starts.
    pub fn search(&self, request: &SearchRequest) -> Result<SearchOutcome> {
        request.validate()?;
        let started = Instant::now();
        let starts = self.starts(request);

        let mut budget = Budget::new(self.config, started);
        let mut seen: HashSet<Vec<EdgeId>> = HashSet::new();
        let mut candidates = Vec::new();
        let mut starts_searched = 0;

        for &start in &starts {
            if budget.exhausted() {
                break;
            }
            self.search_from(start, request, &mut budget, &mut seen, &mut candidates);
            starts_searched += 1;
        }

        let outcome = SearchOutcome {
            candidates,
            starts_searched,
            expansions: budget.total_expansions(),
            truncated: budget.tripped,
            elapsed: started.elapsed(),
        };
        self.log_outcome(request, &outcome);
        Ok(outcome)
    }

    /// Search start nodes in parallel under one search-wide budget.
    ///
    /// Results are merged in start order and deduplicated, so the candidate
    /// list matches a sequential run whenever no budget trips. Starts racing
    /// past the candidate limit are cut back to it after the merge.
    #[cfg(feature = "parallel")]
    pub fn search_parallel(&self, request: &SearchRequest) -> Result<SearchOutcome> {
        use rayon::prelude::*;

        request.validate()?;
        let started = Instant::now();
        let starts = self.starts(request);
        let shared = Budget::new(self.config, started);

        let per_start: Vec<(Vec<RouteCandidate>, bool, bool)> = starts
            .par_iter()
            .map(|&start| {
                let mut budget = shared.share();
                if budget.exhausted() {
                    return (Vec::new(), true, false);
                }
                let mut seen = HashSet::new();
                let mut found = Vec::new();
                self.search_from(start, request, &mut budget, &mut seen, &mut found);
                (found, budget.tripped, true)
            })
            .collect();

        let mut seen: HashSet<Vec<EdgeId>> = HashSet::new();
        let mut outcome = SearchOutcome::default();
        for (found, tripped, searched) in per_start {
            outcome.truncated |= tripped;
            if searched {
                outcome.starts_searched += 1;
            }
            for candidate in found {
                if seen.insert(candidate.edge_key()) {
                    outcome.candidates.push(candidate);
                }
            }
        }
        if outcome.candidates.len() > self.config.max_candidates {
            outcome.candidates.truncate(self.config.max_candidates);
            outcome.truncated = true;
        }
        outcome.expansions = shared.total_expansions();
        outcome.elapsed = started.elapsed();
        self.log_outcome(request, &outcome);
        Ok(outcome)
    }

    fn search_from(
        &self,
        start: NodeId,
        request: &SearchRequest,
        budget: &mut Budget,
        seen: &mut HashSet<Vec<EdgeId>>,
        out: &mut Vec<RouteCandidate>,
    ) {
        let max_depth = self.config.max_search_depth as usize;
        let mut stack = vec![Frame {
            path: vec![start],
            edges: Vec::new(),
            distance_km: 0.0,
            elevation_gain_m: 0.0,
            closed: false,
        }];

        while let Some(frame) = stack.pop() {
            if budget.exhausted() {
                return;
            }

            if frame.path.len() >= 2 && request.accepts(frame.distance_km, frame.elevation_gain_m) {
                let key = {
                    let mut key = frame.edges.clone();
                    key.sort_unstable();
                    key
                };
                if seen.insert(key) {
                    out.push(self.candidate(&frame));
                    budget.add_candidate();
                }
            }

            if frame.closed || frame.edges.len() >= max_depth {
                continue;
            }

            let Some(neighbours) = self.adjacency.get(&frame.node()) else {
                continue;
            };
            // Reverse so the lowest edge id is explored first
            for half in neighbours.iter().rev() {
                let closing = half.to == start;
                if closing {
                    if frame.path.len() < 2 || frame.edges.last() == Some(&half.edge_id) {
                        continue;
                    }
                } else if frame.path.contains(&half.to) {
                    continue;
                }

                let distance_km = frame.distance_km + half.distance_km;
                let elevation_gain_m = frame.elevation_gain_m + half.gain_m;
                if request.over_budget(distance_km, elevation_gain_m) {
                    continue;
                }

                budget.add_expansion();
                let mut next = frame.clone();
                next.path.push(half.to);
                next.edges.push(half.edge_id);
                next.distance_km = distance_km;
                next.elevation_gain_m = elevation_gain_m;
                next.closed = closing;
                stack.push(next);
            }
        }
    }

    fn candidate(&self, frame: &Frame) -> RouteCandidate {
        let trails: HashSet<TrailId> = frame
            .edges
            .iter()
            .filter_map(|id| self.graph.edge(*id))
            .map(|e| e.catalog_trail_id)
            .collect();
        RouteCandidate {
            path: frame.path.clone(),
            edges: frame.edges.clone(),
            distance_km: frame.distance_km,
            elevation_gain_m: frame.elevation_gain_m,
            shape: classify_shape(&frame.path, self.graph, self.config.near_loop_tolerance_m),
            trail_count: trails.len(),
        }
    }

    fn log_outcome(&self, request: &SearchRequest, outcome: &SearchOutcome) {
        if outcome.truncated {
            warn!(
                "[RouteSearcher] Budget exhausted after {} expansions ({} candidates, {:?}); results truncated",
                outcome.expansions,
                outcome.candidates.len(),
                outcome.elapsed
            );
        }
        info!(
            "[RouteSearcher] {:.1}km/{:.0}m ±{:.0}%: {} candidates from {} starts in {:?}",
            request.target_distance_km,
            request.target_elevation_gain_m,
            request.tolerance_percent,
            outcome.candidates.len(),
            outcome.starts_searched,
            outcome.elapsed
        );
        debug!("[RouteSearcher] {} path extensions", outcome.expansions);
    }
}

/// Search the graph for routes near the requested target.
pub fn search_routes(
    graph: &RoutingGraph,
    request: &SearchRequest,
    config: &RouteConfig,
) -> Result<SearchOutcome> {
    RouteSearcher::new(graph, config).search(request)
}
