//! End-to-end pipeline scenarios on small synthetic trail networks.
//!
//! Run with: `cargo test --test pipeline`

use trailgraph::{
    build_edges, build_nodes, dangling_edges, preference_cost, recommendations_to_geojson,
    similarity_score, split_trails, validate_geojson, GraphConfig, InMemoryStore, NodeType,
    PipelineConfig, RoutePattern, RouteShape, ScoringConfig, SearchRequest, Trail, TrailMetadata,
    TrailPipeline, TrailPoint, WorkspaceId, WorkspaceStore,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn trail(id: i64, name: &str, points: Vec<TrailPoint>) -> Trail {
    Trail::new(id, name, TrailMetadata::in_region("boulder"), points)
}

fn crossing() -> Vec<Trail> {
    vec![
        trail(1, "Mesa", vec![TrailPoint::new(40.0, -105.006), TrailPoint::new(40.0, -104.994)]),
        trail(2, "Bluebell", vec![TrailPoint::new(39.9955, -105.0), TrailPoint::new(40.0045, -105.0)]),
    ]
}

/// Four 1.5 km trails around a square with 30 m of climb on the east side.
fn square() -> Vec<Trail> {
    let dlat = 0.013490;
    let dlng = 0.017600;
    let a = TrailPoint::with_elevation(40.0, -105.0, 1700.0);
    let b = TrailPoint::with_elevation(40.0, -105.0 + dlng, 1700.0);
    let c = TrailPoint::with_elevation(40.0 + dlat, -105.0 + dlng, 1730.0);
    let d = TrailPoint::with_elevation(40.0 + dlat, -105.0, 1730.0);
    vec![
        trail(10, "South Rim", vec![a, b]),
        trail(11, "East Climb", vec![b, c]),
        trail(12, "North Rim", vec![c, d]),
        trail(13, "West Descent", vec![d, a]),
    ]
}

#[test]
fn test_crossing_trails_build_a_star() {
    init_logging();
    let config = GraphConfig::default();
    let split = split_trails(&crossing(), &config);
    assert_eq!(split.segments.len(), 4);
    assert_eq!(split.intersections.len(), 1);

    let nodes = build_nodes(&split.segments, &split.intersections, &config).unwrap();
    assert_eq!(nodes.nodes.len(), 5);
    assert_eq!(nodes.intersection_nodes, 1);
    assert_eq!(nodes.endpoint_nodes, 4);

    let hub = nodes
        .nodes
        .iter()
        .find(|n| n.node_type == NodeType::Intersection)
        .unwrap();
    assert_eq!(hub.connected_trails, vec![1, 2]);

    let edges = build_edges(&split.segments, &nodes.nodes, &config).unwrap();
    assert!(dangling_edges(&nodes.nodes, &edges.edges).is_empty());
    assert_eq!(edges.edges.len(), 4);
    assert!(edges
        .edges
        .iter()
        .all(|e| e.source == hub.id || e.target == hub.id));
}

#[test]
fn test_isolated_trail_is_one_edge() {
    init_logging();
    let config = GraphConfig::default();
    let input = vec![trail(1, "Lonely", vec![TrailPoint::new(40.0, -105.0), TrailPoint::new(40.018, -105.0)])];

    let split = split_trails(&input, &config);
    let nodes = build_nodes(&split.segments, &split.intersections, &config).unwrap();
    let edges = build_edges(&split.segments, &nodes.nodes, &config).unwrap();

    assert_eq!(nodes.nodes.len(), 2);
    assert_eq!(edges.edges.len(), 1);
    assert!((edges.edges[0].length_km - 2.0).abs() < 0.01);
}

#[test]
fn test_near_miss_spur_joins_the_network() {
    init_logging();
    let config = GraphConfig::default();
    let input = vec![
        trail(1, "Through", vec![TrailPoint::new(40.0, -105.01), TrailPoint::new(40.0, -104.99)]),
        trail(2, "Spur", vec![TrailPoint::new(40.00001, -105.0), TrailPoint::new(40.01, -105.0)]),
    ];

    let split = split_trails(&input, &config);
    let nodes = build_nodes(&split.segments, &split.intersections, &config).unwrap();
    let edges = build_edges(&split.segments, &nodes.nodes, &config).unwrap();

    assert_eq!(split.segments.len(), 3);
    assert_eq!(nodes.nodes.len(), 4);
    assert_eq!(edges.edges.len(), 3);
    assert_eq!(edges.skipped_segments, 0);
}

#[test]
fn test_node_building_is_repeatable() {
    let config = GraphConfig::default();
    let split = split_trails(&square(), &config);
    let first = build_nodes(&split.segments, &split.intersections, &config).unwrap();
    let second = build_nodes(&split.segments, &split.intersections, &config).unwrap();
    assert_eq!(first.nodes, second.nodes);
}

#[test]
fn test_tolerance_band() {
    let request = SearchRequest::new(5.0, 0.0, 20.0);
    assert!(request.accepts(4.2, 0.0));
    assert!(request.accepts(6.0, 0.0));
    assert!(!request.accepts(3.5, 0.0));
    assert!(!request.accepts(6.1, 0.0));
}

#[test]
fn test_scoring_properties() {
    let scoring = ScoringConfig::default();
    let looped = preference_cost(10.0, 500.0, RouteShape::Loop, 10.0, 500.0, &scoring);
    let p2p = preference_cost(10.0, 500.0, RouteShape::PointToPoint, 10.0, 500.0, &scoring);
    assert!(looped < p2p);

    // Similarity falls as the distance moves away from the target
    let mut previous = similarity_score(10.0, 10.0);
    for step in 1..20 {
        let current = similarity_score(10.0 + step as f64 * 0.5, 10.0);
        assert!(current <= previous);
        previous = current;
    }
}

#[test]
fn test_full_pipeline_in_memory() {
    init_logging();
    let ws = WorkspaceId::new("boulder").unwrap();
    let mut store = InMemoryStore::new();
    store.insert_trails(&ws, &square()).unwrap();

    let mut pipeline = TrailPipeline::new(PipelineConfig::default(), store).unwrap();
    let patterns = vec![RoutePattern::new("Square Loop", 6.0, 30.0, RouteShape::Loop, 20.0)];
    let report = pipeline.run(&ws, &patterns);
    assert!(report.success(), "{:?}", report.stages);

    let store = pipeline.into_store();
    let graph = store.load_graph(&ws).unwrap();
    assert_eq!(graph.node_count(), 4);
    assert_eq!(graph.edge_count(), 4);

    let routes = store.load_recommendations(&ws).unwrap();
    assert_eq!(routes.len(), 1);
    let route = &routes[0];
    assert_eq!(route.route_shape, RouteShape::Loop);
    assert_eq!(route.trail_count, 4);
    assert!((route.recommended_elevation_gain - 30.0).abs() < 1e-6);
    assert!(route.similarity_score > 0.9);
    assert!((route.route_score - 100.0 * route.similarity_score).abs() < 1e-9);
    assert!(route.route_name.ends_with(" Loop"));
    assert_eq!(route.segments.len(), route.route_edges.len());

    let geojson = recommendations_to_geojson(&routes);
    let check = validate_geojson(&geojson);
    assert!(check.is_clean(), "{:?}", check.issues);
    assert_eq!(check.geometry_types.get("MultiLineString"), Some(&1));
}
