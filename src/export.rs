//! GeoJSON export of routing graphs and recommendations, plus a rendering check.
//!
//! Coordinates are written as `[longitude, latitude]`, with elevation as a
//! third ordinate when the vertex has one.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::geo_utils::polyline_length_3d;
use crate::graph::RoutingGraph;
use crate::recommend::RouteRecommendation;
use crate::{Trail, TrailPoint};

/// Two-point LineStrings shorter than this (in degrees) may not render.
const MIN_RENDERABLE_SPAN_DEG: f64 = 0.0001;

fn position(point: &TrailPoint) -> Value {
    match point.elevation {
        Some(e) => json!([point.longitude, point.latitude, e]),
        None => json!([point.longitude, point.latitude]),
    }
}

fn line(points: &[TrailPoint]) -> Value {
    Value::Array(points.iter().map(position).collect())
}

fn feature(geometry: Value, properties: Value) -> Value {
    json!({
        "type": "Feature",
        "geometry": geometry,
        "properties": properties,
    })
}

fn collection(features: Vec<Value>) -> Value {
    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

/// Routes as MultiLineString features, best route score first.
pub fn recommendations_to_geojson(recommendations: &[RouteRecommendation]) -> Value {
    let mut sorted: Vec<&RouteRecommendation> = recommendations.iter().collect();
    sorted.sort_by(|a, b| {
        b.route_score
            .partial_cmp(&a.route_score)
            .unwrap_or(Ordering::Equal)
    });

    let features = sorted
        .into_iter()
        .filter(|r| !r.geometry.is_empty())
        .map(|r| {
            let length_3d_m: f64 = r.geometry.iter().map(|part| polyline_length_3d(part)).sum();
            let parts: Vec<Value> = r.geometry.iter().map(|part| line(part)).collect();
            feature(
                json!({ "type": "MultiLineString", "coordinates": parts }),
                json!({
                    "id": r.route_uuid,
                    "route_uuid": r.route_uuid,
                    "route_name": r.route_name,
                    "pattern_name": r.pattern_name,
                    "region": r.region,
                    "route_score": r.route_score,
                    "preference_cost": r.preference_cost,
                    "route_shape": r.route_shape.as_str(),
                    "recommended_length_km": r.recommended_distance_km,
                    "recommended_elevation_gain": r.recommended_elevation_gain,
                    "path_length_3d_km": length_3d_m / 1000.0,
                    "trail_count": r.trail_count,
                    "created_at": r.created_at.to_rfc3339(),
                    "type": "route",
                    "layer": "routes",
                }),
            )
        })
        .collect();
    collection(features)
}

/// Trails, nodes and edges as one layered collection.
pub fn graph_to_geojson(trails: &[Trail], graph: &RoutingGraph) -> Value {
    let mut features = Vec::with_capacity(trails.len() + graph.node_count() + graph.edge_count());

    for trail in trails {
        features.push(feature(
            json!({ "type": "LineString", "coordinates": line(&trail.points) }),
            json!({
                "id": trail.id,
                "original_id": trail.original_id,
                "name": trail.name,
                "region": trail.metadata.region,
                "trail_type": trail.metadata.trail_type,
                "surface": trail.metadata.surface,
                "difficulty": trail.metadata.difficulty,
                "length_km": trail.stats.length_km,
                "elevation_gain": trail.stats.elevation_gain,
                "elevation_loss": trail.stats.elevation_loss,
                "type": "trail",
                "layer": "trails",
            }),
        ));
    }

    for node in graph.nodes() {
        features.push(feature(
            json!({ "type": "Point", "coordinates": position(&node.point()) }),
            json!({
                "id": node.id,
                "node_type": node.node_type.as_str(),
                "connected_trails": node.connected_trails,
                "type": "node",
                "layer": "nodes",
            }),
        ));
    }

    for edge in graph.edges() {
        features.push(feature(
            json!({ "type": "LineString", "coordinates": line(&edge.geometry) }),
            json!({
                "id": edge.id,
                "source": edge.source,
                "target": edge.target,
                "trail_id": edge.catalog_trail_id,
                "trail_name": edge.trail_name,
                "length_km": edge.length_km,
                "elevation_gain": edge.elevation_gain,
                "elevation_loss": edge.elevation_loss,
                "type": "edge",
                "layer": "edges",
            }),
        ));
    }

    collection(features)
}

/// Findings of `validate_geojson`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoJsonReport {
    pub feature_count: usize,
    /// Count per `properties.type` value ("unknown" when absent)
    pub feature_types: BTreeMap<String, usize>,
    /// Count per geometry type
    pub geometry_types: BTreeMap<String, usize>,
    /// Rendering problems, one line per finding
    pub issues: Vec<String>,
}

impl GeoJsonReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

fn coordinate_pair(value: &Value) -> Option<(f64, f64)> {
    let pos = value.as_array()?;
    Some((pos.first()?.as_f64()?, pos.get(1)?.as_f64()?))
}

/// Structural and rendering check of a FeatureCollection.
pub fn validate_geojson(value: &Value) -> GeoJsonReport {
    let mut report = GeoJsonReport::default();

    if value.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
        report.issues.push("root is not a FeatureCollection".to_string());
    }
    let Some(features) = value.get("features").and_then(Value::as_array) else {
        report.issues.push("missing features array".to_string());
        return report;
    };
    report.feature_count = features.len();

    let empty = Map::new();
    for (i, feature) in features.iter().enumerate() {
        let properties = feature
            .get("properties")
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        let feature_type = properties
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        *report.feature_types.entry(feature_type.to_string()).or_default() += 1;

        let Some(geometry) = feature.get("geometry").and_then(Value::as_object) else {
            report.issues.push(format!("Feature {}: missing geometry", i));
            continue;
        };
        let geom_type = geometry.get("type").and_then(Value::as_str).unwrap_or("unknown");
        *report.geometry_types.entry(geom_type.to_string()).or_default() += 1;

        let coords = geometry
            .get("coordinates")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        match geom_type {
            "LineString" => check_line(i, coords, &mut report.issues),
            "MultiLineString" => {
                for part in coords {
                    let part = part.as_array().map(Vec::as_slice).unwrap_or_default();
                    check_line(i, part, &mut report.issues);
                }
            }
            "Point" => {
                if !(coords.len() == 2 || coords.len() == 3) {
                    report
                        .issues
                        .push(format!("Feature {}: Point with {} coordinates", i, coords.len()));
                }
            }
            _ => {}
        }
    }
    report
}

fn check_line(index: usize, coords: &[Value], issues: &mut Vec<String>) {
    if coords.len() < 2 {
        issues.push(format!("Feature {}: LineString with < 2 points", index));
        return;
    }
    if coords.len() == 2 {
        if let (Some((x1, y1)), Some((x2, y2))) = (coordinate_pair(&coords[0]), coordinate_pair(&coords[1])) {
            let span = ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt();
            if span < MIN_RENDERABLE_SPAN_DEG {
                issues.push(format!(
                    "Feature {}: Very short LineString ({:.6} degrees)",
                    index, span
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeType, RoutingEdge, RoutingNode};
    use crate::TrailMetadata;

    fn small_graph() -> (Vec<Trail>, RoutingGraph) {
        let a = TrailPoint::with_elevation(40.0, -105.0, 1700.0);
        let b = TrailPoint::with_elevation(40.01, -105.0, 1750.0);
        let trail = Trail::new(1, "Mesa", TrailMetadata::in_region("boulder"), vec![a, b]);
        let node = |id, p: TrailPoint| RoutingNode {
            id,
            latitude: p.latitude,
            longitude: p.longitude,
            elevation: p.elevation_or_zero(),
            node_type: NodeType::Endpoint,
            connected_trails: vec![1],
        };
        let edge = RoutingEdge {
            id: 1,
            source: 1,
            target: 2,
            trail_id: 1,
            catalog_trail_id: 1,
            trail_name: "Mesa".to_string(),
            length_km: trail.stats.length_km,
            elevation_gain: 50.0,
            elevation_loss: 0.0,
            geometry: vec![a, b],
        };
        let graph = RoutingGraph::new(vec![node(1, a), node(2, b)], vec![edge]);
        (vec![trail], graph)
    }

    #[test]
    fn test_graph_export_is_layered() {
        let (trails, graph) = small_graph();
        let value = graph_to_geojson(&trails, &graph);
        let report = validate_geojson(&value);

        assert!(report.is_clean(), "{:?}", report.issues);
        assert_eq!(report.feature_count, 4);
        assert_eq!(report.feature_types.get("node"), Some(&2));
        assert_eq!(report.geometry_types.get("LineString"), Some(&2));
        assert_eq!(
            value["features"][0]["geometry"]["coordinates"][0],
            json!([-105.0, 40.0, 1700.0])
        );
    }

    #[test]
    fn test_validation_findings() {
        let value = json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": {},
                  "geometry": { "type": "LineString", "coordinates": [[-105.0, 40.0]] } },
                { "type": "Feature", "properties": { "type": "edge" },
                  "geometry": { "type": "LineString",
                                "coordinates": [[-105.0, 40.0], [-105.00001, 40.00001]] } },
                { "type": "Feature", "properties": { "type": "node" },
                  "geometry": { "type": "Point", "coordinates": [-105.0] } },
            ]
        });
        let report = validate_geojson(&value);
        assert_eq!(report.feature_count, 3);
        assert_eq!(report.issues.len(), 3);
        assert!(report.issues[0].contains("< 2 points"));
        assert!(report.issues[1].contains("Very short"));
        assert!(report.issues[2].contains("Point with 1 coordinates"));
        assert_eq!(report.feature_types.get("unknown"), Some(&1));
    }

    #[test]
    fn test_not_a_collection() {
        let report = validate_geojson(&json!({ "type": "Feature" }));
        assert_eq!(report.feature_count, 0);
        assert_eq!(report.issues.len(), 2);
    }
}
