//! Pipeline configuration.
//!
//! Every stage receives an immutable reference to one of these structs.
//! Defaults live here and nowhere else; `validate` rejects values that would
//! make a stage meaningless (zero or negative tolerances, empty weight sets).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{Result, TrailGraphError, WGS84_SRID};

/// Topology construction parameters (splitting, node merging, edge binding).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Distance within which two trails are considered to touch (meters).
    /// Also the radius for snapping near-miss T-junctions.
    /// Default: 2.0
    pub intersection_tolerance_m: f64,

    /// Points closer than this collapse into one routing node (meters).
    /// Default: 2.0
    pub node_merge_tolerance_m: f64,

    /// Maximum distance from a segment endpoint to its bound node (meters).
    /// Default: 5.0
    pub edge_tolerance_m: f64,

    /// Douglas-Peucker tolerance applied before splitting (degrees).
    /// 0 disables simplification. Default: 0.0
    pub simplify_tolerance_deg: f64,

    /// Trails shorter than this are not split (meters). Default: 1.0
    pub min_trail_length_m: f64,

    /// Trails longer than this are flagged by the integrity check (meters).
    /// Default: 100000.0
    pub max_trail_length_m: f64,

    /// Plausible elevation range; vertices outside it are flagged (meters).
    pub min_elevation_m: f64,
    pub max_elevation_m: f64,

    /// Expected spatial reference id of all geometry. Default: 4326
    pub srid: i32,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            intersection_tolerance_m: 2.0,
            node_merge_tolerance_m: 2.0,
            edge_tolerance_m: 5.0,
            simplify_tolerance_deg: 0.0,
            min_trail_length_m: 1.0,
            max_trail_length_m: 100_000.0,
            min_elevation_m: -500.0,
            max_elevation_m: 9_000.0,
            srid: WGS84_SRID,
        }
    }
}

impl GraphConfig {
    pub fn validate(&self) -> Result<()> {
        positive("intersection_tolerance_m", self.intersection_tolerance_m)?;
        positive("node_merge_tolerance_m", self.node_merge_tolerance_m)?;
        positive("edge_tolerance_m", self.edge_tolerance_m)?;
        non_negative("simplify_tolerance_deg", self.simplify_tolerance_deg)?;
        non_negative("min_trail_length_m", self.min_trail_length_m)?;
        if self.max_trail_length_m <= self.min_trail_length_m {
            return Err(TrailGraphError::config(format!(
                "max_trail_length_m ({}) must exceed min_trail_length_m ({})",
                self.max_trail_length_m, self.min_trail_length_m
            )));
        }
        if self.max_elevation_m <= self.min_elevation_m {
            return Err(TrailGraphError::config(
                "max_elevation_m must exceed min_elevation_m",
            ));
        }
        Ok(())
    }
}

/// Route search and recommendation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Maximum number of edges in a route. Default: 8
    pub max_search_depth: u32,

    /// Stop a search after this many accepted candidates. Default: 5000
    pub max_candidates: usize,

    /// Stop a search after this many path extensions. Default: 2_000_000
    pub max_expansions: usize,

    /// Optional wall-clock budget per search.
    pub max_search_duration: Option<Duration>,

    /// Routes kept per pattern after ranking. Default: 10
    pub max_routes_per_pattern: usize,

    /// Fewer routes than this triggers tolerance widening. Default: 3
    pub min_routes_per_pattern: usize,

    /// Candidates with a lower similarity score are discarded. Default: 0.3
    pub min_similarity_score: f64,

    /// Global bounds on recommended routes.
    pub min_route_distance_km: f64,
    pub max_route_distance_km: f64,
    pub min_elevation_gain_m: f64,
    pub max_elevation_gain_m: f64,

    /// Search attempts per pattern, including the first. Default: 5
    pub max_tolerance_iterations: u32,

    /// Percentage points added to the tolerance on each retry. Default: 10.0
    pub tolerance_step_percent: f64,

    /// Open paths whose ends are this close are classified as loops (meters).
    /// 0 disables the check. Default: 25.0
    pub near_loop_tolerance_m: f64,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            max_search_depth: 8,
            max_candidates: 5_000,
            max_expansions: 2_000_000,
            max_search_duration: None,
            max_routes_per_pattern: 10,
            min_routes_per_pattern: 3,
            min_similarity_score: 0.3,
            min_route_distance_km: 1.0,
            max_route_distance_km: 50.0,
            min_elevation_gain_m: 0.0,
            max_elevation_gain_m: 3_000.0,
            max_tolerance_iterations: 5,
            tolerance_step_percent: 10.0,
            near_loop_tolerance_m: 25.0,
        }
    }
}

impl RouteConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_search_depth == 0 {
            return Err(TrailGraphError::config("max_search_depth must be at least 1"));
        }
        if self.max_candidates == 0 || self.max_expansions == 0 {
            return Err(TrailGraphError::config(
                "max_candidates and max_expansions must be at least 1",
            ));
        }
        if self.max_tolerance_iterations == 0 {
            return Err(TrailGraphError::config(
                "max_tolerance_iterations must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.min_similarity_score) {
            return Err(TrailGraphError::config(
                "min_similarity_score must be within [0, 1]",
            ));
        }
        non_negative("tolerance_step_percent", self.tolerance_step_percent)?;
        non_negative("near_loop_tolerance_m", self.near_loop_tolerance_m)?;
        non_negative("min_route_distance_km", self.min_route_distance_km)?;
        non_negative("min_elevation_gain_m", self.min_elevation_gain_m)?;
        if self.max_route_distance_km <= self.min_route_distance_km {
            return Err(TrailGraphError::config(
                "max_route_distance_km must exceed min_route_distance_km",
            ));
        }
        if self.max_elevation_gain_m < self.min_elevation_gain_m {
            return Err(TrailGraphError::config(
                "max_elevation_gain_m must not be below min_elevation_gain_m",
            ));
        }
        Ok(())
    }
}

/// Preference-cost weights and exponents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Axis priority weights. Only their ratios matter.
    pub elevation_weight: f64,
    pub distance_weight: f64,
    pub shape_weight: f64,

    /// Exponent applied to the fractional deviation on each axis.
    pub elevation_exponent: f64,
    pub distance_exponent: f64,

    /// Split of an axis cost between deviation and terrain desirability.
    pub deviation_share: f64,
    pub desirability_share: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            elevation_weight: 0.4,
            distance_weight: 0.4,
            shape_weight: 0.2,
            elevation_exponent: 1.5,
            distance_exponent: 1.5,
            deviation_share: 0.7,
            desirability_share: 0.3,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        non_negative("elevation_weight", self.elevation_weight)?;
        non_negative("distance_weight", self.distance_weight)?;
        non_negative("shape_weight", self.shape_weight)?;
        if self.elevation_weight + self.distance_weight + self.shape_weight <= 0.0 {
            return Err(TrailGraphError::config("at least one axis weight must be positive"));
        }
        positive("elevation_exponent", self.elevation_exponent)?;
        positive("distance_exponent", self.distance_exponent)?;
        non_negative("deviation_share", self.deviation_share)?;
        non_negative("desirability_share", self.desirability_share)?;
        if (self.deviation_share + self.desirability_share - 1.0).abs() > 1e-9 {
            return Err(TrailGraphError::config(
                "deviation_share and desirability_share must sum to 1",
            ));
        }
        Ok(())
    }

    /// Sum of the axis weights.
    pub fn total_weight(&self) -> f64 {
        self.elevation_weight + self.distance_weight + self.shape_weight
    }
}

/// Complete configuration for one pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub graph: GraphConfig,
    pub route: RouteConfig,
    pub scoring: ScoringConfig,
}

impl PipelineConfig {
    /// Parse from JSON. Missing keys take their defaults; the result is validated.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.graph.validate()?;
        self.route.validate()?;
        self.scoring.validate()
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(TrailGraphError::config(format!(
            "{} must be a positive number, got {}",
            name, value
        )))
    }
}

fn non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(TrailGraphError::config(format!(
            "{} must be a non-negative number, got {}",
            name, value
        )))
    }
}

/// Check a route tolerance percentage at point of use.
pub(crate) fn validate_tolerance_percent(tolerance_percent: f64) -> Result<()> {
    positive("tolerance_percent", tolerance_percent)
}
