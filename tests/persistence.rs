//! SQLite workspace storage round trips on a real database file.
//!
//! Run with: `cargo test --test persistence`

use tempfile::TempDir;
use trailgraph::{
    InMemoryStore, PipelineConfig, RoutePattern, RouteShape, SqliteStore, Trail, TrailMetadata,
    TrailPipeline, TrailPoint, WorkspaceId, WorkspaceStore,
};

fn square() -> Vec<Trail> {
    let dlat = 0.013490;
    let dlng = 0.017600;
    let a = TrailPoint::with_elevation(40.0, -105.0, 1700.0);
    let b = TrailPoint::with_elevation(40.0, -105.0 + dlng, 1710.0);
    let c = TrailPoint::with_elevation(40.0 + dlat, -105.0 + dlng, 1760.0);
    let d = TrailPoint::new(40.0 + dlat, -105.0);
    let mut meta = TrailMetadata::in_region("boulder");
    meta.source = Some("osm".to_string());
    vec![
        Trail::new(1, "South", meta.clone(), vec![a, b]),
        Trail::new(2, "East", meta.clone(), vec![b, c]),
        Trail::new(3, "North", meta.clone(), vec![c, d]),
        Trail::new(4, "West", meta, vec![d, a]),
    ]
}

fn open(dir: &TempDir) -> SqliteStore {
    SqliteStore::open(dir.path().join("trails.db")).expect("failed to open store")
}

#[test]
fn test_pipeline_output_survives_reopen() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new().expect("failed to create temp dir");
    let ws = WorkspaceId::new("boulder-2024").unwrap();

    let mut store = open(&dir);
    store.insert_trails(&ws, &square()).unwrap();
    let mut pipeline = TrailPipeline::new(PipelineConfig::default(), store).unwrap();
    let patterns = vec![RoutePattern::new("Square Loop", 6.0, 0.0, RouteShape::Loop, 20.0)];
    let report = pipeline.run(&ws, &patterns);
    assert!(report.success(), "{:?}", report.stages);

    let store = pipeline.into_store();
    let trails = store.load_trails(&ws).unwrap();
    let graph = store.load_graph(&ws).unwrap();
    let routes = store.load_recommendations(&ws).unwrap();
    assert!(!routes.is_empty());
    drop(store);

    let reopened = open(&dir);
    assert_eq!(reopened.load_trails(&ws).unwrap(), trails);
    let graph_again = reopened.load_graph(&ws).unwrap();
    assert_eq!(graph_again.nodes(), graph.nodes());
    assert_eq!(graph_again.edges(), graph.edges());
    assert_eq!(reopened.load_recommendations(&ws).unwrap(), routes);
}

#[test]
fn test_recommendations_cleared_per_workspace() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let a = WorkspaceId::new("a").unwrap();
    let b = WorkspaceId::new("b").unwrap();
    let patterns = vec![RoutePattern::new("Square Loop", 6.0, 0.0, RouteShape::Loop, 20.0)];

    let mut store = open(&dir);
    store.insert_trails(&a, &square()).unwrap();
    store.insert_trails(&b, &square()).unwrap();
    let mut pipeline = TrailPipeline::new(PipelineConfig::default(), store).unwrap();
    assert!(pipeline.run(&a, &patterns).success());
    assert!(pipeline.run(&b, &patterns).success());

    let mut store = pipeline.into_store();
    let in_b = store.load_recommendations(&b).unwrap().len();
    assert!(store.clear_recommendations(&a).unwrap() > 0);
    assert!(store.load_recommendations(&a).unwrap().is_empty());
    assert_eq!(store.load_recommendations(&b).unwrap().len(), in_b);
}

#[test]
fn test_repeated_route_ids_store_alike_in_both_backends() {
    let ws = WorkspaceId::new("dupes").unwrap();
    let patterns = vec![RoutePattern::new("Square Loop", 6.0, 0.0, RouteShape::Loop, 20.0)];

    let mut memory = InMemoryStore::new();
    memory.insert_trails(&ws, &square()).unwrap();
    let mut pipeline = TrailPipeline::new(PipelineConfig::default(), memory).unwrap();
    assert!(pipeline.run(&ws, &patterns).success());
    let mut memory = pipeline.into_store();
    let first = memory.load_recommendations(&ws).unwrap().remove(0);
    memory.clear_recommendations(&ws).unwrap();

    let mut other = first.clone();
    other.route_uuid = "route-other".to_string();
    for segment in &mut other.segments {
        segment.route_uuid = other.route_uuid.clone();
    }
    let mut renamed = first.clone();
    renamed.route_name = "Renamed Loop".to_string();
    let batch = vec![first, other, renamed];

    let dir = TempDir::new().expect("failed to create temp dir");
    let mut sqlite = open(&dir);
    assert_eq!(sqlite.append_recommendations(&ws, &batch).unwrap(), 2);
    assert_eq!(memory.append_recommendations(&ws, &batch).unwrap(), 2);

    let from_sqlite = sqlite.load_recommendations(&ws).unwrap();
    let from_memory = memory.load_recommendations(&ws).unwrap();
    assert_eq!(from_sqlite, from_memory);
    let names: Vec<&str> = from_memory.iter().map(|r| r.route_name.as_str()).collect();
    assert_eq!(names[1], "Renamed Loop");
    assert_eq!(from_memory[0].route_uuid, "route-other");
}

#[test]
fn test_hostile_workspace_id_never_reaches_sql() {
    assert!(WorkspaceId::new("x; DROP TABLE trails").is_err());
    assert!("trails--".parse::<WorkspaceId>().is_ok());
}
