//! # Pattern-Driven Recommendation
//!
//! For each route pattern: search at the pattern's tolerance, keep candidates
//! of the pattern's shape inside the global bounds, and widen the tolerance
//! step by step while too few routes are found. Survivors are ranked by
//! preference cost and turned into named recommendations with a per-trail
//! breakdown.
//!
//! The routing graph is only read.

use chrono::{DateTime, Utc};
use log::{debug, info};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::graph::RoutingGraph;
use crate::scoring::{preference_cost, similarity_score, RouteShape};
use crate::search::{RouteCandidate, RouteSearcher, SearchOutcome, SearchRequest};
use crate::{
    EdgeId, NodeId, Result, RouteConfig, ScoringConfig, TrailGraphError, TrailId, TrailPoint,
};

/// A target the recommender tries to satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePattern {
    pub name: String,
    pub target_distance_km: f64,
    pub target_elevation_gain_m: f64,
    pub shape: RouteShape,
    /// Starting tolerance, in percent
    pub tolerance_percent: f64,
}

impl RoutePattern {
    pub fn new(
        name: &str,
        target_distance_km: f64,
        target_elevation_gain_m: f64,
        shape: RouteShape,
        tolerance_percent: f64,
    ) -> Self {
        Self {
            name: name.to_string(),
            target_distance_km,
            target_elevation_gain_m,
            shape,
            tolerance_percent,
        }
    }

    fn request(&self, tolerance_percent: f64) -> SearchRequest {
        SearchRequest::new(
            self.target_distance_km,
            self.target_elevation_gain_m,
            tolerance_percent,
        )
    }
}

/// Built-in pattern catalog.
pub static DEFAULT_PATTERNS: Lazy<Vec<RoutePattern>> = Lazy::new(|| {
    vec![
        RoutePattern::new("Short Loop", 5.0, 200.0, RouteShape::Loop, 20.0),
        RoutePattern::new("Medium Loop", 10.0, 400.0, RouteShape::Loop, 20.0),
        RoutePattern::new("Long Loop", 15.0, 700.0, RouteShape::Loop, 20.0),
        RoutePattern::new("Short Out-and-Back", 3.0, 100.0, RouteShape::OutAndBack, 30.0),
        RoutePattern::new("Medium Out-and-Back", 8.0, 300.0, RouteShape::OutAndBack, 20.0),
        RoutePattern::new("Point-to-Point", 8.0, 300.0, RouteShape::PointToPoint, 20.0),
        RoutePattern::new("Epic Point-to-Point", 20.0, 1000.0, RouteShape::PointToPoint, 20.0),
    ]
});

/// Owned copy of the built-in catalog.
pub fn default_patterns() -> Vec<RoutePattern> {
    DEFAULT_PATTERNS.clone()
}

/// A candidate with both of its scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteCandidateScored {
    pub candidate: RouteCandidate,
    /// 0-1, higher is better
    pub similarity: f64,
    /// 0-100, lower is better
    pub preference_cost: f64,
}

/// One run of consecutive edges on the same trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteTrailSegment {
    pub route_uuid: String,
    pub trail_id: TrailId,
    pub trail_name: String,
    /// Position in the route, from 1
    pub segment_order: u32,
    pub distance_km: f64,
    pub elevation_gain: f64,
    pub elevation_loss: f64,
}

/// A ranked route ready for storage and export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRecommendation {
    pub route_uuid: String,
    pub region: String,
    pub pattern_name: String,
    pub route_name: String,
    pub route_shape: RouteShape,
    pub input_distance_km: f64,
    pub input_elevation_gain: f64,
    pub recommended_distance_km: f64,
    pub recommended_elevation_gain: f64,
    /// 100 × similarity
    pub route_score: f64,
    pub preference_cost: f64,
    pub similarity_score: f64,
    pub trail_count: usize,
    pub route_path: Vec<NodeId>,
    pub route_edges: Vec<EdgeId>,
    /// Edge geometries oriented in walking order
    pub geometry: Vec<Vec<TrailPoint>>,
    pub tolerance_percent: f64,
    pub created_at: DateTime<Utc>,
    pub segments: Vec<RouteTrailSegment>,
}

/// How one pattern fared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternReport {
    pub pattern_name: String,
    pub routes: usize,
    pub iterations: u32,
    pub tolerance_used: f64,
    pub truncated: bool,
}

/// Output of a recommendation run.
#[derive(Debug, Clone, Default)]
pub struct RecommendationResult {
    pub recommendations: Vec<RouteRecommendation>,
    pub patterns: Vec<PatternReport>,
}

impl RecommendationResult {
    /// Patterns that produced at least one route.
    pub fn satisfied_patterns(&self) -> usize {
        self.patterns.iter().filter(|p| p.routes > 0).count()
    }
}

/// Turns search candidates into ranked recommendations.
pub struct RouteRecommender<'a> {
    graph: &'a RoutingGraph,
    route: &'a RouteConfig,
    scoring: &'a ScoringConfig,
    searcher: RouteSearcher<'a>,
    region: String,
}

impl<'a> RouteRecommender<'a> {
    pub fn new(graph: &'a RoutingGraph, route: &'a RouteConfig, scoring: &'a ScoringConfig) -> Self {
        Self {
            graph,
            route,
            scoring,
            searcher: RouteSearcher::new(graph, route),
            region: String::new(),
        }
    }

    /// Region label stamped on every recommendation.
    pub fn with_region(mut self, region: &str) -> Self {
        self.region = region.to_string();
        self
    }

    /// Recommend routes for every pattern.
    pub fn recommend(&self, patterns: &[RoutePattern]) -> Result<RecommendationResult> {
        let mut result = RecommendationResult::default();
        for pattern in patterns {
            let (routes, report) = self.recommend_pattern(pattern)?;
            result.recommendations.extend(routes);
            result.patterns.push(report);
        }
        info!(
            "[RouteRecommender] {} recommendations from {}/{} patterns",
            result.recommendations.len(),
            result.satisfied_patterns(),
            patterns.len()
        );
        Ok(result)
    }

    /// Search, filter, rank and materialise routes for one pattern.
    pub fn recommend_pattern(
        &self,
        pattern: &RoutePattern,
    ) -> Result<(Vec<RouteRecommendation>, PatternReport)> {
        if pattern.shape == RouteShape::Unknown {
            return Err(TrailGraphError::config(format!(
                "pattern '{}' must ask for a concrete shape",
                pattern.name
            )));
        }

        let mut tolerance = pattern.tolerance_percent;
        let mut scored: Vec<RouteCandidateScored> = Vec::new();
        let mut iterations = 0;
        let mut truncated = false;

        while iterations < self.route.max_tolerance_iterations {
            iterations += 1;
            let outcome = self.run_search(&pattern.request(tolerance))?;
            truncated |= outcome.truncated;
            scored = self.filter_and_score(pattern, outcome.candidates);
            debug!(
                "[RouteRecommender] '{}' at ±{:.0}%: {} matching candidates",
                pattern.name,
                tolerance,
                scored.len()
            );
            if scored.len() >= self.route.min_routes_per_pattern
                || iterations >= self.route.max_tolerance_iterations
            {
                break;
            }
            tolerance += self.route.tolerance_step_percent;
        }

        rank(&mut scored);
        scored.truncate(self.route.max_routes_per_pattern);

        let created_at = Utc::now();
        let routes: Vec<RouteRecommendation> = scored
            .iter()
            .map(|s| self.materialise(pattern, s, tolerance, created_at))
            .collect();

        info!(
            "[RouteRecommender] '{}': {} routes after {} iteration(s), tolerance ±{:.0}%",
            pattern.name,
            routes.len(),
            iterations,
            tolerance
        );
        let report = PatternReport {
            pattern_name: pattern.name.clone(),
            routes: routes.len(),
            iterations,
            tolerance_used: tolerance,
            truncated,
        };
        Ok((routes, report))
    }

    #[cfg(not(feature = "parallel"))]
    fn run_search(&self, request: &SearchRequest) -> Result<SearchOutcome> {
        self.searcher.search(request)
    }

    #[cfg(feature = "parallel")]
    fn run_search(&self, request: &SearchRequest) -> Result<SearchOutcome> {
        self.searcher.search_parallel(request)
    }

    /// Keep candidates of the pattern's shape inside the global bounds, and score them.
    pub fn filter_and_score(
        &self,
        pattern: &RoutePattern,
        candidates: Vec<RouteCandidate>,
    ) -> Vec<RouteCandidateScored> {
        candidates
            .into_iter()
            .filter(|c| c.shape == pattern.shape)
            .filter(|c| {
                c.distance_km >= self.route.min_route_distance_km
                    && c.distance_km <= self.route.max_route_distance_km
                    && c.elevation_gain_m >= self.route.min_elevation_gain_m
                    && c.elevation_gain_m <= self.route.max_elevation_gain_m
            })
            .filter_map(|candidate| {
                let similarity = similarity_score(candidate.distance_km, pattern.target_distance_km);
                if similarity < self.route.min_similarity_score {
                    return None;
                }
                let cost = preference_cost(
                    candidate.distance_km,
                    candidate.elevation_gain_m,
                    candidate.shape,
                    pattern.target_distance_km,
                    pattern.target_elevation_gain_m,
                    self.scoring,
                );
                Some(RouteCandidateScored {
                    candidate,
                    similarity,
                    preference_cost: cost,
                })
            })
            .collect()
    }

    fn materialise(
        &self,
        pattern: &RoutePattern,
        scored: &RouteCandidateScored,
        tolerance_percent: f64,
        created_at: DateTime<Utc>,
    ) -> RouteRecommendation {
        let candidate = &scored.candidate;
        let route_uuid = route_uuid(&pattern.name, &candidate.edges);
        let segments = self.trail_segments(&route_uuid, candidate);

        let mut names: Vec<&str> = Vec::new();
        for segment in &segments {
            if !names.contains(&segment.trail_name.as_str()) {
                names.push(segment.trail_name.as_str());
            }
        }

        let geometry = candidate
            .edges
            .iter()
            .zip(&candidate.path)
            .filter_map(|(id, from)| self.graph.edge(*id).map(|e| e.geometry_from(*from)))
            .collect();

        RouteRecommendation {
            route_name: generate_route_name(&names, candidate.shape),
            route_uuid,
            region: self.region.clone(),
            pattern_name: pattern.name.clone(),
            route_shape: candidate.shape,
            input_distance_km: pattern.target_distance_km,
            input_elevation_gain: pattern.target_elevation_gain_m,
            recommended_distance_km: candidate.distance_km,
            recommended_elevation_gain: candidate.elevation_gain_m,
            route_score: 100.0 * scored.similarity,
            preference_cost: scored.preference_cost,
            similarity_score: scored.similarity,
            trail_count: candidate.trail_count,
            route_path: candidate.path.clone(),
            route_edges: candidate.edges.clone(),
            geometry,
            tolerance_percent,
            created_at,
            segments,
        }
    }

    /// Collapse consecutive edges of the same catalog trail.
    fn trail_segments(&self, route_uuid: &str, candidate: &RouteCandidate) -> Vec<RouteTrailSegment> {
        let mut segments: Vec<RouteTrailSegment> = Vec::new();
        for (id, from) in candidate.edges.iter().zip(&candidate.path) {
            let Some(edge) = self.graph.edge(*id) else {
                continue;
            };
            let gain = edge.gain_from(*from);
            let loss = if *from == edge.source {
                edge.elevation_loss
            } else {
                edge.elevation_gain
            };
            match segments.last_mut() {
                Some(last) if last.trail_id == edge.catalog_trail_id => {
                    last.distance_km += edge.length_km;
                    last.elevation_gain += gain;
                    last.elevation_loss += loss;
                }
                _ => segments.push(RouteTrailSegment {
                    route_uuid: route_uuid.to_string(),
                    trail_id: edge.catalog_trail_id,
                    trail_name: edge.trail_name.clone(),
                    segment_order: segments.len() as u32 + 1,
                    distance_km: edge.length_km,
                    elevation_gain: gain,
                    elevation_loss: loss,
                }),
            }
        }
        segments
    }
}

/// Preference cost ascending, then similarity descending, then edge ids.
fn rank(scored: &mut [RouteCandidateScored]) {
    scored.sort_by(|a, b| {
        a.preference_cost
            .total_cmp(&b.preference_cost)
            .then(b.similarity.total_cmp(&a.similarity))
            .then_with(|| a.candidate.edges.cmp(&b.candidate.edges))
    });
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Stable id from the pattern name and edge list (64-bit FNV-1a).
///
/// 0xff never occurs in UTF-8, so it separates the name from the edge bytes.
fn route_uuid(pattern_name: &str, edges: &[EdgeId]) -> String {
    let bytes = pattern_name
        .bytes()
        .chain(std::iter::once(0xff))
        .chain(edges.iter().flat_map(|e| e.to_le_bytes()));
    let hash = bytes.fold(FNV_OFFSET, |h, b| (h ^ u64::from(b)).wrapping_mul(FNV_PRIME));
    format!("route-{:016x}", hash)
}

/// Display name from the distinct trail names of a route, in walking order.
///
/// One trail gives its name, two give "A/B Route", more give "First/Last Route".
/// The shape word is appended unless the name already contains it.
pub fn generate_route_name(trail_names: &[&str], shape: RouteShape) -> String {
    let base = match trail_names {
        [] => "Unnamed Route".to_string(),
        [only] => only.to_string(),
        [first, second] => format!("{}/{} Route", first, second),
        [first, .., last] => format!("{}/{} Route", first, last),
    };
    let shape_word = match shape {
        RouteShape::Loop => "Loop",
        RouteShape::OutAndBack => "Out-and-Back",
        RouteShape::PointToPoint => "Point-to-Point",
        RouteShape::Unknown => return base,
    };
    if base.to_lowercase().contains(&shape_word.to_lowercase()) {
        base
    } else {
        format!("{} {}", base, shape_word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeType, RoutingEdge, RoutingNode};

    fn node(id: NodeId, lat: f64, lng: f64) -> RoutingNode {
        RoutingNode {
            id,
            latitude: lat,
            longitude: lng,
            elevation: 0.0,
            node_type: NodeType::Intersection,
            connected_trails: vec![1, 2],
        }
    }

    fn edge(id: EdgeId, source: NodeId, target: NodeId, trail: TrailId, name: &str) -> RoutingEdge {
        RoutingEdge {
            id,
            source,
            target,
            trail_id: 100 + id,
            catalog_trail_id: trail,
            trail_name: name.to_string(),
            length_km: 1.5,
            elevation_gain: 60.0,
            elevation_loss: 20.0,
            geometry: vec![TrailPoint::new(0.0, 0.0), TrailPoint::new(0.0, 0.01)],
        }
    }

    /// Square loop of four 1.5 km edges over two trails.
    fn square() -> RoutingGraph {
        RoutingGraph::new(
            vec![
                node(1, 40.0, -105.0),
                node(2, 40.0, -104.98),
                node(3, 40.0135, -104.98),
                node(4, 40.0135, -105.0),
            ],
            vec![
                edge(1, 1, 2, 10, "Mesa"),
                edge(2, 2, 3, 10, "Mesa"),
                edge(3, 3, 4, 20, "Bluebell"),
                edge(4, 4, 1, 20, "Bluebell"),
            ],
        )
    }

    #[test]
    fn test_route_names() {
        assert_eq!(generate_route_name(&["Mesa Trail"], RouteShape::Loop), "Mesa Trail Loop");
        assert_eq!(generate_route_name(&["Lake Loop"], RouteShape::Loop), "Lake Loop");
        assert_eq!(
            generate_route_name(&["Mesa", "Bluebell"], RouteShape::OutAndBack),
            "Mesa/Bluebell Route Out-and-Back"
        );
        assert_eq!(
            generate_route_name(&["Mesa", "Bluebell", "Royal Arch"], RouteShape::PointToPoint),
            "Mesa/Royal Arch Route Point-to-Point"
        );
        assert_eq!(generate_route_name(&[], RouteShape::Unknown), "Unnamed Route");
    }

    #[test]
    fn test_recommends_loop_with_segments() {
        let graph = square();
        let route = RouteConfig::default();
        let scoring = ScoringConfig::default();
        let recommender = RouteRecommender::new(&graph, &route, &scoring).with_region("boulder");
        let pattern = RoutePattern::new("Test Loop", 6.0, 240.0, RouteShape::Loop, 10.0);

        let (routes, report) = recommender.recommend_pattern(&pattern).unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(report.routes, 1);

        let r = &routes[0];
        assert_eq!(r.route_shape, RouteShape::Loop);
        assert_eq!(r.region, "boulder");
        assert_eq!(r.route_name, "Mesa/Bluebell Route Loop");
        assert_eq!(r.trail_count, 2);
        assert_eq!(r.segments.len(), 2);
        assert_eq!(r.segments[0].segment_order, 1);
        assert!((r.segments[0].distance_km - 3.0).abs() < 1e-9);
        assert!((r.route_score - 100.0).abs() < 1e-9);
        assert_eq!(r.geometry.len(), 4);
        assert!(r.route_uuid.starts_with("route-"));
    }

    #[test]
    fn test_route_uuid_is_fixed() {
        assert_eq!(route_uuid("Test Loop", &[1, 2, 3, 4]), "route-e026f4a03efdb91a");
        assert_eq!(route_uuid("", &[]), "route-af64724c8602eb6e");
        assert_ne!(route_uuid("Test Loop", &[1, 2, 4, 3]), route_uuid("Test Loop", &[1, 2, 3, 4]));
        assert_ne!(route_uuid("Test Loo", &[1, 2, 3, 4]), route_uuid("Test Loop", &[1, 2, 3, 4]));
    }

    #[test]
    fn test_tolerance_widens_until_enough_routes() {
        let graph = square();
        let route = RouteConfig {
            min_routes_per_pattern: 1,
            ..Default::default()
        };
        let scoring = ScoringConfig::default();
        let recommender = RouteRecommender::new(&graph, &route, &scoring);
        // Loop is 6 km; 7 km ±5% misses, ±15% catches it
        let pattern = RoutePattern::new("Wide", 7.0, 240.0, RouteShape::Loop, 5.0);

        let (routes, report) = recommender.recommend_pattern(&pattern).unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(report.iterations, 2);
        assert_eq!(report.tolerance_used, 15.0);
        assert_eq!(routes[0].tolerance_percent, 15.0);
    }

    #[test]
    fn test_iteration_cap() {
        let graph = square();
        let route = RouteConfig {
            max_tolerance_iterations: 3,
            ..Default::default()
        };
        let scoring = ScoringConfig::default();
        let recommender = RouteRecommender::new(&graph, &route, &scoring);
        let pattern = RoutePattern::new("Impossible", 40.0, 2000.0, RouteShape::Loop, 10.0);

        let (routes, report) = recommender.recommend_pattern(&pattern).unwrap();
        assert!(routes.is_empty());
        assert_eq!(report.iterations, 3);
    }

    #[test]
    fn test_ranking_prefers_lower_cost() {
        let graph = square();
        let route = RouteConfig::default();
        let scoring = ScoringConfig::default();
        let recommender = RouteRecommender::new(&graph, &route, &scoring);
        let pattern = RoutePattern::new("P2P", 3.0, 120.0, RouteShape::PointToPoint, 60.0);

        let (routes, _) = recommender.recommend_pattern(&pattern).unwrap();
        assert!(!routes.is_empty());
        for pair in routes.windows(2) {
            assert!(pair[0].preference_cost <= pair[1].preference_cost);
        }
        assert!(routes.iter().all(|r| r.route_shape == RouteShape::PointToPoint));
    }

    #[test]
    fn test_graph_not_mutated() {
        let graph = square();
        let before = graph.clone();
        let route = RouteConfig::default();
        let scoring = ScoringConfig::default();
        RouteRecommender::new(&graph, &route, &scoring)
            .recommend(&default_patterns())
            .unwrap();
        assert_eq!(graph.nodes(), before.nodes());
        assert_eq!(graph.edges(), before.edges());
    }

    #[test]
    fn test_default_catalog() {
        assert!(!DEFAULT_PATTERNS.is_empty());
        assert!(DEFAULT_PATTERNS.iter().all(|p| p.shape != RouteShape::Unknown));
        assert_eq!(default_patterns(), *DEFAULT_PATTERNS);
    }
}
