//! Route classification and scoring.
//!
//! Two scores with opposite polarity live here and are never combined:
//! - similarity (0-1, higher is better), a pure distance-deviation measure
//! - preference cost (0-100, lower is better), blending elevation intensity,
//!   distance and shape against the hiker's target

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geo_utils::haversine_distance;
use crate::graph::RoutingGraph;
use crate::{NodeId, ScoringConfig};

/// Geometric shape of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteShape {
    Loop,
    OutAndBack,
    PointToPoint,
    Unknown,
}

impl RouteShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteShape::Loop => "loop",
            RouteShape::OutAndBack => "out-and-back",
            RouteShape::PointToPoint => "point-to-point",
            RouteShape::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "loop" => Some(RouteShape::Loop),
            "out-and-back" => Some(RouteShape::OutAndBack),
            "point-to-point" => Some(RouteShape::PointToPoint),
            "unknown" => Some(RouteShape::Unknown),
            _ => None,
        }
    }

    /// Fixed shape cost used by the preference score.
    pub fn cost(&self) -> f64 {
        match self {
            RouteShape::Loop => 0.0,
            RouteShape::OutAndBack => 0.1,
            RouteShape::PointToPoint => 0.3,
            RouteShape::Unknown => 0.5,
        }
    }
}

impl fmt::Display for RouteShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a node path.
///
/// Closed paths are loops, single edges are out-and-backs, and open paths
/// whose ends lie within `near_loop_tolerance_m` of each other also count as
/// loops. Paths with fewer than 2 nodes are `Unknown`.
pub fn classify_shape(path: &[NodeId], graph: &RoutingGraph, near_loop_tolerance_m: f64) -> RouteShape {
    let (Some(&first), Some(&last)) = (path.first(), path.last()) else {
        return RouteShape::Unknown;
    };
    if path.len() < 2 {
        return RouteShape::Unknown;
    }
    if first == last {
        return RouteShape::Loop;
    }
    if path.len() == 2 {
        return RouteShape::OutAndBack;
    }
    if near_loop_tolerance_m > 0.0 {
        if let (Some(a), Some(b)) = (graph.node(first), graph.node(last)) {
            if haversine_distance(&a.point(), &b.point()) <= near_loop_tolerance_m {
                return RouteShape::Loop;
            }
        }
    }
    RouteShape::PointToPoint
}

/// Legacy similarity: `max(0, 1 - |actual - target| / target)`.
///
/// A non-positive target yields 0.
pub fn similarity_score(actual_distance_km: f64, target_distance_km: f64) -> f64 {
    if target_distance_km <= 0.0 {
        return 0.0;
    }
    (1.0 - (actual_distance_km - target_distance_km).abs() / target_distance_km).max(0.0)
}

/// Elevation gain per kilometre. Zero distance yields 0.
pub fn gain_rate(elevation_gain_m: f64, distance_km: f64) -> f64 {
    if distance_km > 0.0 {
        elevation_gain_m / distance_km
    } else {
        0.0
    }
}

/// Terrain desirability penalty for a gain rate (m/km). Moderate terrain is free.
pub fn elevation_desirability(gain_rate_m_per_km: f64) -> f64 {
    match gain_rate_m_per_km {
        r if r < 20.0 => 0.2,
        r if r < 40.0 => 0.1,
        r if r < 80.0 => 0.0,
        r if r < 120.0 => 0.2,
        r if r < 200.0 => 0.5,
        _ => 1.0,
    }
}

/// Distance desirability penalty (km). 5-15 km is free.
pub fn distance_desirability(distance_km: f64) -> f64 {
    match distance_km {
        d if d < 2.0 => 0.5,
        d if d < 5.0 => 0.2,
        d if d < 15.0 => 0.0,
        d if d < 25.0 => 0.2,
        _ => 0.5,
    }
}

fn deviation_cost(deviation: f64, exponent: f64) -> f64 {
    deviation.clamp(0.0, 1.0).powf(exponent)
}

/// Elevation-axis cost in [0, 1].
pub fn elevation_cost(
    actual_gain_m: f64,
    actual_distance_km: f64,
    target_gain_m: f64,
    target_distance_km: f64,
    config: &ScoringConfig,
) -> f64 {
    let actual_rate = gain_rate(actual_gain_m, actual_distance_km);
    let target_rate = gain_rate(target_gain_m, target_distance_km);
    let deviation = (actual_rate - target_rate).abs() / target_rate.max(1.0);
    let desirability =
        elevation_desirability(target_rate).max(elevation_desirability(actual_rate));
    config.deviation_share * deviation_cost(deviation, config.elevation_exponent)
        + config.desirability_share * desirability
}

/// Distance-axis cost in [0, 1].
pub fn distance_cost(actual_km: f64, target_km: f64, config: &ScoringConfig) -> f64 {
    let deviation = if target_km > 0.0 {
        (actual_km - target_km).abs() / target_km
    } else {
        1.0
    };
    let desirability = distance_desirability(target_km).max(distance_desirability(actual_km));
    config.deviation_share * deviation_cost(deviation, config.distance_exponent)
        + config.desirability_share * desirability
}

/// Preference cost in [0, 100]; lower is a better fit.
pub fn preference_cost(
    distance_km: f64,
    elevation_gain_m: f64,
    shape: RouteShape,
    target_distance_km: f64,
    target_elevation_gain_m: f64,
    config: &ScoringConfig,
) -> f64 {
    let total_weight = config.total_weight();
    if total_weight <= 0.0 {
        return 100.0;
    }
    let weighted = config.elevation_weight
        * elevation_cost(
            elevation_gain_m,
            distance_km,
            target_elevation_gain_m,
            target_distance_km,
            config,
        )
        + config.distance_weight * distance_cost(distance_km, target_distance_km, config)
        + config.shape_weight * shape.cost();
    (100.0 * weighted / total_weight).clamp(0.0, 100.0)
}
