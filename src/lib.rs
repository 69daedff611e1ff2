//! # Trailgraph
//!
//! Trail network topology building and hiking route recommendation.
//!
//! This library provides:
//! - Trail splitting at intersections (including near-miss T-junctions)
//! - Routing node and edge derivation with tolerance-based deduplication
//! - Graph integrity validation and cleanup
//! - Bounded route search with a candidate/expansion circuit breaker
//! - Similarity and preference-cost scoring
//! - Pattern-driven route recommendation with adaptive tolerance widening
//! - Workspace storage (in-memory and SQLite) and GeoJSON export
//!
//! ## Features
//!
//! - **`persistence`** - SQLite workspace storage (default)
//! - **`parallel`** - Fan out route search across start nodes with rayon
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use trailgraph::{Trail, TrailMetadata, TrailPoint, GraphConfig};
//! use trailgraph::{split_trails, build_nodes, build_edges};
//!
//! let horizontal = Trail::new(
//!     1,
//!     "Mesa Trail",
//!     TrailMetadata::in_region("boulder"),
//!     vec![TrailPoint::new(40.0, -105.006), TrailPoint::new(40.0, -104.994)],
//! );
//! let vertical = Trail::new(
//!     2,
//!     "Bluebell Trail",
//!     TrailMetadata::in_region("boulder"),
//!     vec![TrailPoint::new(39.9955, -105.0), TrailPoint::new(40.0045, -105.0)],
//! );
//!
//! let config = GraphConfig::default();
//! let split = split_trails(&[horizontal, vertical], &config);
//! let nodes = build_nodes(&split.segments, &split.intersections, &config).unwrap();
//! let edges = build_edges(&split.segments, &nodes.nodes, &config).unwrap();
//!
//! assert_eq!(split.segments.len(), 4);
//! assert_eq!(nodes.nodes.len(), 5);
//! assert_eq!(edges.edges.len(), 4);
//! ```

use geo::{Coord, LineString, SimplifyIdx};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{Result, TrailGraphError};

// Immutable configuration threaded through every stage
pub mod config;
pub use config::{GraphConfig, PipelineConfig, RouteConfig, ScoringConfig};

// Geographic utilities (distance, bounds, elevation statistics)
pub mod geo_utils;

// Geometry oracle: spatial predicates and line operations
pub mod geometry;
pub use geometry::{GeoOracle, GeometryOracle, LinePosition, LineTouch, Projection};

// Union-Find for grouping near-duplicate points
pub mod union_find;
pub use union_find::UnionFind;

// Routing graph value objects
pub mod graph;
pub use graph::{NodeType, RoutingEdge, RoutingGraph, RoutingNode};

// Stage 1: intersection detection and trail splitting
pub mod splitter;
pub use splitter::{split_trails, IntersectionPoint, SplitResult, SplitStats, TrailSplitter};

// Stage 2: routing node derivation
pub mod nodes;
pub use nodes::{build_nodes, NodeBuildResult, NodeBuilder};

// Stage 3: routing edge derivation
pub mod edges;
pub use edges::{build_edges, dangling_edges, EdgeBuildResult, EdgeBuilder};

// Graph cleanup and integrity checks
pub mod validation;
pub use validation::{
    check_integrity, cleanup_graph, CleanupReport, IntegrityIssue, IntegrityReport, IssueSeverity,
};

// Stage 4: bounded route search
pub mod search;
pub use search::{search_routes, RouteCandidate, RouteSearcher, SearchOutcome, SearchRequest};

// Stage 5: classification and scoring
pub mod scoring;
pub use scoring::{classify_shape, preference_cost, similarity_score, RouteShape};

// Pattern-driven recommendation
pub mod recommend;
pub use recommend::{
    default_patterns, generate_route_name, RecommendationResult, RouteCandidateScored,
    RoutePattern, RouteRecommendation, RouteRecommender, RouteTrailSegment, DEFAULT_PATTERNS,
};

// Workspace handles and storage
pub mod workspace;
pub use workspace::{InMemoryStore, WorkspaceId, WorkspaceStore};

// SQLite workspace storage
#[cfg(feature = "persistence")]
pub mod persistence;
#[cfg(feature = "persistence")]
pub use persistence::SqliteStore;

// Named pipeline operations
pub mod pipeline;
pub use pipeline::{OperationResult, PipelineReport, TrailPipeline};

// GeoJSON export and validation
pub mod export;
pub use export::{graph_to_geojson, recommendations_to_geojson, validate_geojson, GeoJsonReport};

// ============================================================================
// Core Types
// ============================================================================

/// Identifier of a trail or split segment.
pub type TrailId = i64;
/// Identifier of a routing node.
pub type NodeId = i64;
/// Identifier of a routing edge.
pub type EdgeId = i64;

/// Spatial reference id for WGS84 longitude/latitude.
pub const WGS84_SRID: i32 = 4326;

/// A trail vertex: WGS84 latitude/longitude with optional elevation.
///
/// # Example
/// ```
/// use trailgraph::TrailPoint;
/// let point = TrailPoint::with_elevation(39.9975, -105.2920, 1776.3);
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Elevation in meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
}

impl TrailPoint {
    /// Create a new point without elevation.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation: None,
        }
    }

    /// Create a new point with elevation.
    pub fn with_elevation(latitude: f64, longitude: f64, elevation: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation: Some(elevation),
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
            && self.elevation.map_or(true, f64::is_finite)
    }

    /// Elevation in meters, 0 when unknown.
    pub fn elevation_or_zero(&self) -> f64 {
        self.elevation.unwrap_or(0.0)
    }

    /// Drop the elevation component.
    pub fn to_2d(&self) -> Self {
        Self::new(self.latitude, self.longitude)
    }

    /// Same horizontal position (elevation ignored).
    pub fn same_position(&self, other: &TrailPoint) -> bool {
        self.latitude == other.latitude && self.longitude == other.longitude
    }

    pub(crate) fn coord(&self) -> Coord {
        Coord {
            x: self.longitude,
            y: self.latitude,
        }
    }
}

/// Bounding box of a geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from points.
    pub fn from_points(points: &[TrailPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.latitude);
            max_lat = max_lat.max(p.latitude);
            min_lng = min_lng.min(p.longitude);
            max_lng = max_lng.max(p.longitude);
        }

        Some(Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        })
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> TrailPoint {
        TrailPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }

    /// Grow the box by `meters` on every side.
    pub fn expand(&self, meters: f64) -> Self {
        let ref_lat = (self.min_lat + self.max_lat) / 2.0;
        let (lat_buf, lng_buf) = geo_utils::meters_to_degrees(meters, ref_lat);
        Self {
            min_lat: self.min_lat - lat_buf,
            max_lat: self.max_lat + lat_buf,
            min_lng: self.min_lng - lng_buf,
            max_lng: self.max_lng + lng_buf,
        }
    }
}

/// Descriptive trail attributes inherited by every split segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrailMetadata {
    pub region: String,
    pub trail_type: Option<String>,
    pub surface: Option<String>,
    pub difficulty: Option<String>,
    /// Catalog the trail was loaded from (e.g. "osm", "cotrex")
    pub source: Option<String>,
    /// Identifier in the source catalog
    pub source_id: Option<String>,
}

impl TrailMetadata {
    /// Metadata with only the region set.
    pub fn in_region(region: &str) -> Self {
        Self {
            region: region.to_string(),
            ..Default::default()
        }
    }
}

/// Derived statistics of a trail geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailStats {
    pub bounds: Bounds,
    pub length_km: f64,
    pub elevation_gain: f64,
    pub elevation_loss: f64,
    pub min_elevation: f64,
    pub max_elevation: f64,
    pub avg_elevation: f64,
}

impl TrailStats {
    /// Compute bbox, length and elevation statistics. Missing elevation yields zeros.
    pub fn from_points(points: &[TrailPoint]) -> Self {
        let elevation = geo_utils::elevation_stats(points);
        Self {
            bounds: geo_utils::compute_bounds(points),
            length_km: geo_utils::polyline_length(points) / 1000.0,
            elevation_gain: elevation.gain,
            elevation_loss: elevation.loss,
            min_elevation: elevation.min.unwrap_or(0.0),
            max_elevation: elevation.max.unwrap_or(0.0),
            avg_elevation: elevation.avg.unwrap_or(0.0),
        }
    }
}

/// A named trail geometry, either from the source catalog or a split segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trail {
    pub id: TrailId,
    pub name: String,
    pub metadata: TrailMetadata,
    /// Spatial reference id of `points`
    pub srid: i32,
    pub points: Vec<TrailPoint>,
    pub stats: TrailStats,
    /// Catalog trail this segment was cut from (None for unsplit trails)
    pub original_id: Option<TrailId>,
}

impl Trail {
    /// Create a WGS84 trail and compute its statistics.
    pub fn new(id: TrailId, name: &str, metadata: TrailMetadata, points: Vec<TrailPoint>) -> Self {
        let stats = TrailStats::from_points(&points);
        Self {
            id,
            name: name.to_string(),
            metadata,
            srid: WGS84_SRID,
            points,
            stats,
            original_id: None,
        }
    }

    /// Create a trail after validating its geometry.
    ///
    /// Returns an error if fewer than 2 distinct valid points are present.
    pub fn from_points(
        id: TrailId,
        name: &str,
        metadata: TrailMetadata,
        points: Vec<TrailPoint>,
    ) -> Result<Self> {
        if let Some(bad) = points.iter().find(|p| !p.is_valid()) {
            return Err(TrailGraphError::InvalidGeometry {
                trail_id: id,
                message: format!("invalid coordinate ({}, {})", bad.latitude, bad.longitude),
            });
        }
        let distinct = distinct_point_count(&points);
        if distinct < 2 {
            return Err(TrailGraphError::InsufficientPoints {
                trail_id: id,
                point_count: distinct,
                minimum_required: 2,
            });
        }
        Ok(Self::new(id, name, metadata, points))
    }

    /// Build a segment of this trail with a fresh id and recomputed stats.
    pub fn segment(&self, id: TrailId, points: Vec<TrailPoint>) -> Self {
        let stats = TrailStats::from_points(&points);
        Self {
            id,
            name: self.name.clone(),
            metadata: self.metadata.clone(),
            srid: self.srid,
            points,
            stats,
            original_id: Some(self.catalog_id()),
        }
    }

    /// Id of the catalog trail this geometry belongs to.
    pub fn catalog_id(&self) -> TrailId {
        self.original_id.unwrap_or(self.id)
    }

    /// First vertex.
    pub fn start(&self) -> Option<&TrailPoint> {
        self.points.first()
    }

    /// Last vertex.
    pub fn end(&self) -> Option<&TrailPoint> {
        self.points.last()
    }

    /// Length in meters.
    pub fn length_m(&self) -> f64 {
        self.stats.length_km * 1000.0
    }

    /// Start and end within `tolerance_m` of each other.
    pub fn is_closed(&self, tolerance_m: f64) -> bool {
        match (self.start(), self.end()) {
            (Some(s), Some(e)) if self.points.len() > 2 => {
                geo_utils::haversine_distance(s, e) <= tolerance_m
            }
            _ => false,
        }
    }

    /// Douglas-Peucker simplification that keeps the elevation of retained vertices.
    ///
    /// `tolerance_deg` of 0 or less returns the trail unchanged.
    pub fn simplified(&self, tolerance_deg: f64) -> Self {
        if tolerance_deg <= 0.0 || self.points.len() <= 2 {
            return self.clone();
        }
        let line = LineString::new(self.points.iter().map(TrailPoint::coord).collect());
        let kept: Vec<TrailPoint> = line
            .simplify_idx(&tolerance_deg)
            .into_iter()
            .map(|i| self.points[i])
            .collect();
        if kept.len() < 2 {
            return self.clone();
        }
        let mut simplified = self.clone();
        simplified.stats = TrailStats::from_points(&kept);
        simplified.points = kept;
        simplified
    }
}

/// Number of points remaining after collapsing consecutive duplicates.
pub(crate) fn distinct_point_count(points: &[TrailPoint]) -> usize {
    if points.is_empty() {
        return 0;
    }
    1 + points
        .windows(2)
        .filter(|w| !w[0].same_position(&w[1]))
        .count()
}

// ============================================================================
// Tests
// ============================================================================
