//! # SQLite Workspace Store
//!
//! Durable `WorkspaceStore` backed by a single SQLite file.
//!
//! ## Layout
//!
//! Every table carries a `workspace` column that is part of its primary key,
//! so any number of workspaces share one database. The workspace id is always
//! a bound parameter.
//!
//! - Geometries are MessagePack blobs (`rmp-serde`, named fields so optional
//!   elevation survives)
//! - Node/edge/trail id lists are JSON text
//! - Derived trail statistics are stored as plain columns
//! - Every multi-row write runs in one transaction

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info};
use rusqlite::{params, Connection, Transaction};

use crate::graph::{NodeType, RoutingEdge, RoutingGraph, RoutingNode};
use crate::recommend::{RouteRecommendation, RouteTrailSegment};
use crate::scoring::RouteShape;
use crate::workspace::{WorkspaceId, WorkspaceStore};
use crate::{
    Bounds, EdgeId, NodeId, Result, Trail, TrailGraphError, TrailId, TrailMetadata, TrailPoint,
    TrailStats,
};

const SCHEMA: &str = r#"
    -- Trails and split segments
    CREATE TABLE IF NOT EXISTS trails (
        workspace TEXT NOT NULL,
        id INTEGER NOT NULL,
        original_id INTEGER,
        name TEXT NOT NULL,
        region TEXT NOT NULL,
        trail_type TEXT,
        surface TEXT,
        difficulty TEXT,
        source TEXT,
        source_id TEXT,
        srid INTEGER NOT NULL,
        length_km REAL NOT NULL,
        elevation_gain REAL NOT NULL,
        elevation_loss REAL NOT NULL,
        min_elevation REAL NOT NULL,
        max_elevation REAL NOT NULL,
        avg_elevation REAL NOT NULL,
        bbox_min_lat REAL NOT NULL,
        bbox_max_lat REAL NOT NULL,
        bbox_min_lng REAL NOT NULL,
        bbox_max_lng REAL NOT NULL,
        geometry BLOB NOT NULL,
        PRIMARY KEY (workspace, id)
    );

    CREATE TABLE IF NOT EXISTS routing_nodes (
        workspace TEXT NOT NULL,
        id INTEGER NOT NULL,
        lat REAL NOT NULL,
        lng REAL NOT NULL,
        elevation REAL NOT NULL,
        node_type TEXT NOT NULL,
        connected_trails TEXT NOT NULL,
        PRIMARY KEY (workspace, id)
    );

    CREATE TABLE IF NOT EXISTS routing_edges (
        workspace TEXT NOT NULL,
        id INTEGER NOT NULL,
        source INTEGER NOT NULL,
        target INTEGER NOT NULL,
        trail_id INTEGER NOT NULL,
        catalog_trail_id INTEGER NOT NULL,
        trail_name TEXT NOT NULL,
        length_km REAL NOT NULL,
        elevation_gain REAL NOT NULL,
        elevation_loss REAL NOT NULL,
        geometry BLOB NOT NULL,
        PRIMARY KEY (workspace, id)
    );

    CREATE TABLE IF NOT EXISTS route_recommendations (
        workspace TEXT NOT NULL,
        route_uuid TEXT NOT NULL,
        region TEXT NOT NULL,
        pattern_name TEXT NOT NULL,
        route_name TEXT NOT NULL,
        route_shape TEXT NOT NULL,
        input_length_km REAL NOT NULL,
        input_elevation_gain REAL NOT NULL,
        recommended_length_km REAL NOT NULL,
        recommended_elevation_gain REAL NOT NULL,
        route_score REAL NOT NULL,
        preference_cost REAL NOT NULL,
        similarity_score REAL NOT NULL,
        trail_count INTEGER NOT NULL,
        route_path TEXT NOT NULL,
        route_edges TEXT NOT NULL,
        geometry BLOB NOT NULL,
        tolerance_percent REAL NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (workspace, route_uuid)
    );

    CREATE TABLE IF NOT EXISTS route_trails (
        workspace TEXT NOT NULL,
        route_uuid TEXT NOT NULL,
        segment_order INTEGER NOT NULL,
        trail_id INTEGER NOT NULL,
        trail_name TEXT NOT NULL,
        distance_km REAL NOT NULL,
        elevation_gain REAL NOT NULL,
        elevation_loss REAL NOT NULL,
        PRIMARY KEY (workspace, route_uuid, segment_order)
    );

    CREATE INDEX IF NOT EXISTS idx_trails_original ON trails(workspace, original_id);
    CREATE INDEX IF NOT EXISTS idx_edges_nodes ON routing_edges(workspace, source, target);
    CREATE INDEX IF NOT EXISTS idx_routes_shape ON route_recommendations(workspace, route_shape);
"#;

/// Workspace store backed by SQLite.
pub struct SqliteStore {
    db: Connection,
}

impl SqliteStore {
    /// Open (or create) a database file and ensure the schema exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Connection::open(path.as_ref())?;
        db.execute_batch(SCHEMA)?;
        info!("[SqliteStore] Opened {}", path.as_ref().display());
        Ok(Self { db })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let db = Connection::open_in_memory()?;
        db.execute_batch(SCHEMA)?;
        Ok(Self { db })
    }

    /// Delete everything stored for a workspace.
    pub fn drop_workspace(&mut self, workspace: &WorkspaceId) -> Result<()> {
        let tx = self.db.transaction()?;
        for table in [
            "trails",
            "routing_nodes",
            "routing_edges",
            "route_recommendations",
            "route_trails",
        ] {
            tx.execute(
                &format!("DELETE FROM {} WHERE workspace = ?1", table),
                params![workspace.as_str()],
            )?;
        }
        tx.commit()?;
        info!("[SqliteStore] Dropped workspace {}", workspace);
        Ok(())
    }

    /// Number of trails stored for a workspace.
    pub fn trail_count(&self, workspace: &WorkspaceId) -> Result<usize> {
        let count: i64 = self.db.query_row(
            "SELECT COUNT(*) FROM trails WHERE workspace = ?1",
            params![workspace.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn write_trails(tx: &Transaction, workspace: &WorkspaceId, trails: &[Trail]) -> Result<usize> {
    let mut stmt = tx.prepare(
        "INSERT OR REPLACE INTO trails (
            workspace, id, original_id, name, region, trail_type, surface, difficulty,
            source, source_id, srid, length_km, elevation_gain, elevation_loss,
            min_elevation, max_elevation, avg_elevation,
            bbox_min_lat, bbox_max_lat, bbox_min_lng, bbox_max_lng, geometry
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                  ?18, ?19, ?20, ?21, ?22)",
    )?;
    for trail in trails {
        let geometry = rmp_serde::to_vec_named(&trail.points)?;
        let s = &trail.stats;
        stmt.execute(params![
            workspace.as_str(),
            trail.id,
            trail.original_id,
            trail.name,
            trail.metadata.region,
            trail.metadata.trail_type,
            trail.metadata.surface,
            trail.metadata.difficulty,
            trail.metadata.source,
            trail.metadata.source_id,
            trail.srid,
            s.length_km,
            s.elevation_gain,
            s.elevation_loss,
            s.min_elevation,
            s.max_elevation,
            s.avg_elevation,
            s.bounds.min_lat,
            s.bounds.max_lat,
            s.bounds.min_lng,
            s.bounds.max_lng,
            geometry,
        ])?;
    }
    Ok(trails.len())
}

fn decode_node_type(workspace: &WorkspaceId, value: &str) -> Result<NodeType> {
    NodeType::parse(value).ok_or_else(|| TrailGraphError::Workspace {
        workspace: workspace.to_string(),
        message: format!("unknown node type '{}'", value),
    })
}

fn decode_shape(workspace: &WorkspaceId, value: &str) -> Result<RouteShape> {
    RouteShape::parse(value).ok_or_else(|| TrailGraphError::Workspace {
        workspace: workspace.to_string(),
        message: format!("unknown route shape '{}'", value),
    })
}

fn decode_timestamp(workspace: &WorkspaceId, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| TrailGraphError::Workspace {
            workspace: workspace.to_string(),
            message: format!("bad timestamp '{}': {}", value, e),
        })
}

impl WorkspaceStore for SqliteStore {
    fn load_trails(&self, workspace: &WorkspaceId) -> Result<Vec<Trail>> {
        let mut stmt = self.db.prepare(
            "SELECT id, original_id, name, region, trail_type, surface, difficulty, source,
                    source_id, srid, length_km, elevation_gain, elevation_loss, min_elevation,
                    max_elevation, avg_elevation, bbox_min_lat, bbox_max_lat, bbox_min_lng,
                    bbox_max_lng, geometry
             FROM trails WHERE workspace = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![workspace.as_str()], |row| {
            let trail = Trail {
                id: row.get(0)?,
                original_id: row.get(1)?,
                name: row.get(2)?,
                metadata: TrailMetadata {
                    region: row.get(3)?,
                    trail_type: row.get(4)?,
                    surface: row.get(5)?,
                    difficulty: row.get(6)?,
                    source: row.get(7)?,
                    source_id: row.get(8)?,
                },
                srid: row.get(9)?,
                points: Vec::new(),
                stats: TrailStats {
                    length_km: row.get(10)?,
                    elevation_gain: row.get(11)?,
                    elevation_loss: row.get(12)?,
                    min_elevation: row.get(13)?,
                    max_elevation: row.get(14)?,
                    avg_elevation: row.get(15)?,
                    bounds: Bounds {
                        min_lat: row.get(16)?,
                        max_lat: row.get(17)?,
                        min_lng: row.get(18)?,
                        max_lng: row.get(19)?,
                    },
                },
            };
            let geometry: Vec<u8> = row.get(20)?;
            Ok((trail, geometry))
        })?;

        let mut trails = Vec::new();
        for row in rows {
            let (mut trail, geometry) = row?;
            trail.points = rmp_serde::from_slice(&geometry)?;
            trails.push(trail);
        }
        debug!("[SqliteStore] Loaded {} trails for {}", trails.len(), workspace);
        Ok(trails)
    }

    fn insert_trails(&mut self, workspace: &WorkspaceId, trails: &[Trail]) -> Result<usize> {
        let tx = self.db.transaction()?;
        let written = write_trails(&tx, workspace, trails)?;
        tx.commit()?;
        Ok(written)
    }

    fn replace_trails(&mut self, workspace: &WorkspaceId, trails: &[Trail]) -> Result<usize> {
        let tx = self.db.transaction()?;
        let removed = tx.execute(
            "DELETE FROM trails WHERE workspace = ?1",
            params![workspace.as_str()],
        )?;
        let written = write_trails(&tx, workspace, trails)?;
        tx.commit()?;
        info!(
            "[SqliteStore] Replaced {} trails with {} in {}",
            removed, written, workspace
        );
        Ok(written)
    }

    fn save_graph(&mut self, workspace: &WorkspaceId, graph: &RoutingGraph) -> Result<()> {
        let tx = self.db.transaction()?;
        tx.execute(
            "DELETE FROM routing_nodes WHERE workspace = ?1",
            params![workspace.as_str()],
        )?;
        tx.execute(
            "DELETE FROM routing_edges WHERE workspace = ?1",
            params![workspace.as_str()],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO routing_nodes (workspace, id, lat, lng, elevation, node_type, connected_trails)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for node in graph.nodes() {
                stmt.execute(params![
                    workspace.as_str(),
                    node.id,
                    node.latitude,
                    node.longitude,
                    node.elevation,
                    node.node_type.as_str(),
                    serde_json::to_string(&node.connected_trails)?,
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO routing_edges (workspace, id, source, target, trail_id, catalog_trail_id,
                                            trail_name, length_km, elevation_gain, elevation_loss, geometry)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for edge in graph.edges() {
                stmt.execute(params![
                    workspace.as_str(),
                    edge.id,
                    edge.source,
                    edge.target,
                    edge.trail_id,
                    edge.catalog_trail_id,
                    edge.trail_name,
                    edge.length_km,
                    edge.elevation_gain,
                    edge.elevation_loss,
                    rmp_serde::to_vec_named(&edge.geometry)?,
                ])?;
            }
        }
        tx.commit()?;
        info!(
            "[SqliteStore] Saved graph for {}: {} nodes, {} edges",
            workspace,
            graph.node_count(),
            graph.edge_count()
        );
        Ok(())
    }

    fn load_graph(&self, workspace: &WorkspaceId) -> Result<RoutingGraph> {
        let mut stmt = self.db.prepare(
            "SELECT id, lat, lng, elevation, node_type, connected_trails
             FROM routing_nodes WHERE workspace = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![workspace.as_str()], |row| {
            Ok((
                row.get::<_, NodeId>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;
        let mut nodes = Vec::new();
        for row in rows {
            let (id, latitude, longitude, elevation, node_type, trails) = row?;
            nodes.push(RoutingNode {
                id,
                latitude,
                longitude,
                elevation,
                node_type: decode_node_type(workspace, &node_type)?,
                connected_trails: serde_json::from_str(&trails)?,
            });
        }

        let mut stmt = self.db.prepare(
            "SELECT id, source, target, trail_id, catalog_trail_id, trail_name, length_km,
                    elevation_gain, elevation_loss, geometry
             FROM routing_edges WHERE workspace = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![workspace.as_str()], |row| {
            let edge = RoutingEdge {
                id: row.get(0)?,
                source: row.get(1)?,
                target: row.get(2)?,
                trail_id: row.get(3)?,
                catalog_trail_id: row.get(4)?,
                trail_name: row.get(5)?,
                length_km: row.get(6)?,
                elevation_gain: row.get(7)?,
                elevation_loss: row.get(8)?,
                geometry: Vec::new(),
            };
            let geometry: Vec<u8> = row.get(9)?;
            Ok((edge, geometry))
        })?;
        let mut edges = Vec::new();
        for row in rows {
            let (mut edge, geometry) = row?;
            edge.geometry = rmp_serde::from_slice(&geometry)?;
            edges.push(edge);
        }

        Ok(RoutingGraph::new(nodes, edges))
    }

    fn append_recommendations(
        &mut self,
        workspace: &WorkspaceId,
        recommendations: &[RouteRecommendation],
    ) -> Result<usize> {
        let mut written = HashSet::new();
        let tx = self.db.transaction()?;
        {
            let mut route_stmt = tx.prepare(
                "INSERT OR REPLACE INTO route_recommendations (
                    workspace, route_uuid, region, pattern_name, route_name, route_shape,
                    input_length_km, input_elevation_gain, recommended_length_km,
                    recommended_elevation_gain, route_score, preference_cost, similarity_score,
                    trail_count, route_path, route_edges, geometry, tolerance_percent, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                          ?17, ?18, ?19)",
            )?;
            let mut clear_segments = tx.prepare(
                "DELETE FROM route_trails WHERE workspace = ?1 AND route_uuid = ?2",
            )?;
            let mut segment_stmt = tx.prepare(
                "INSERT INTO route_trails (workspace, route_uuid, segment_order, trail_id, trail_name,
                                           distance_km, elevation_gain, elevation_loss)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;

            for r in recommendations {
                route_stmt.execute(params![
                    workspace.as_str(),
                    r.route_uuid,
                    r.region,
                    r.pattern_name,
                    r.route_name,
                    r.route_shape.as_str(),
                    r.input_distance_km,
                    r.input_elevation_gain,
                    r.recommended_distance_km,
                    r.recommended_elevation_gain,
                    r.route_score,
                    r.preference_cost,
                    r.similarity_score,
                    r.trail_count as i64,
                    serde_json::to_string(&r.route_path)?,
                    serde_json::to_string(&r.route_edges)?,
                    rmp_serde::to_vec_named(&r.geometry)?,
                    r.tolerance_percent,
                    r.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
                ])?;
                written.insert(r.route_uuid.as_str());
                clear_segments.execute(params![workspace.as_str(), r.route_uuid])?;
                for segment in &r.segments {
                    segment_stmt.execute(params![
                        workspace.as_str(),
                        r.route_uuid,
                        segment.segment_order,
                        segment.trail_id,
                        segment.trail_name,
                        segment.distance_km,
                        segment.elevation_gain,
                        segment.elevation_loss,
                    ])?;
                }
            }
        }
        tx.commit()?;
        debug!(
            "[SqliteStore] Stored {} recommendations for {}",
            written.len(),
            workspace
        );
        Ok(written.len())
    }

    fn load_recommendations(&self, workspace: &WorkspaceId) -> Result<Vec<RouteRecommendation>> {
        let mut segments: HashMap<String, Vec<RouteTrailSegment>> = HashMap::new();
        {
            let mut stmt = self.db.prepare(
                "SELECT route_uuid, segment_order, trail_id, trail_name, distance_km,
                        elevation_gain, elevation_loss
                 FROM route_trails WHERE workspace = ?1 ORDER BY route_uuid, segment_order",
            )?;
            let rows = stmt.query_map(params![workspace.as_str()], |row| {
                Ok(RouteTrailSegment {
                    route_uuid: row.get(0)?,
                    segment_order: row.get(1)?,
                    trail_id: row.get::<_, TrailId>(2)?,
                    trail_name: row.get(3)?,
                    distance_km: row.get(4)?,
                    elevation_gain: row.get(5)?,
                    elevation_loss: row.get(6)?,
                })
            })?;
            for row in rows {
                let segment = row?;
                segments
                    .entry(segment.route_uuid.clone())
                    .or_default()
                    .push(segment);
            }
        }

        let mut stmt = self.db.prepare(
            "SELECT route_uuid, region, pattern_name, route_name, route_shape, input_length_km,
                    input_elevation_gain, recommended_length_km, recommended_elevation_gain,
                    route_score, preference_cost, similarity_score, trail_count, route_path,
                    route_edges, geometry, tolerance_percent, created_at
             FROM route_recommendations WHERE workspace = ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![workspace.as_str()], |row| {
            Ok(RecommendationRow {
                route_uuid: row.get(0)?,
                region: row.get(1)?,
                pattern_name: row.get(2)?,
                route_name: row.get(3)?,
                route_shape: row.get(4)?,
                input_distance_km: row.get(5)?,
                input_elevation_gain: row.get(6)?,
                recommended_distance_km: row.get(7)?,
                recommended_elevation_gain: row.get(8)?,
                route_score: row.get(9)?,
                preference_cost: row.get(10)?,
                similarity_score: row.get(11)?,
                trail_count: row.get(12)?,
                route_path: row.get(13)?,
                route_edges: row.get(14)?,
                geometry: row.get(15)?,
                tolerance_percent: row.get(16)?,
                created_at: row.get(17)?,
            })
        })?;

        let mut recommendations = Vec::new();
        for row in rows {
            let row = row?;
            let route_segments = segments.remove(&row.route_uuid).unwrap_or_default();
            recommendations.push(row.into_recommendation(workspace, route_segments)?);
        }
        Ok(recommendations)
    }

    fn clear_recommendations(&mut self, workspace: &WorkspaceId) -> Result<usize> {
        let tx = self.db.transaction()?;
        let removed = tx.execute(
            "DELETE FROM route_recommendations WHERE workspace = ?1",
            params![workspace.as_str()],
        )?;
        tx.execute(
            "DELETE FROM route_trails WHERE workspace = ?1",
            params![workspace.as_str()],
        )?;
        tx.commit()?;
        Ok(removed)
    }
}

/// Raw column values of one `route_recommendations` row.
struct RecommendationRow {
    route_uuid: String,
    region: String,
    pattern_name: String,
    route_name: String,
    route_shape: String,
    input_distance_km: f64,
    input_elevation_gain: f64,
    recommended_distance_km: f64,
    recommended_elevation_gain: f64,
    route_score: f64,
    preference_cost: f64,
    similarity_score: f64,
    trail_count: i64,
    route_path: String,
    route_edges: String,
    geometry: Vec<u8>,
    tolerance_percent: f64,
    created_at: String,
}

impl RecommendationRow {
    fn into_recommendation(
        self,
        workspace: &WorkspaceId,
        segments: Vec<RouteTrailSegment>,
    ) -> Result<RouteRecommendation> {
        let route_path: Vec<NodeId> = serde_json::from_str(&self.route_path)?;
        let route_edges: Vec<EdgeId> = serde_json::from_str(&self.route_edges)?;
        let geometry: Vec<Vec<TrailPoint>> = rmp_serde::from_slice(&self.geometry)?;
        Ok(RouteRecommendation {
            route_shape: decode_shape(workspace, &self.route_shape)?,
            created_at: decode_timestamp(workspace, &self.created_at)?,
            route_uuid: self.route_uuid,
            region: self.region,
            pattern_name: self.pattern_name,
            route_name: self.route_name,
            input_distance_km: self.input_distance_km,
            input_elevation_gain: self.input_elevation_gain,
            recommended_distance_km: self.recommended_distance_km,
            recommended_elevation_gain: self.recommended_elevation_gain,
            route_score: self.route_score,
            preference_cost: self.preference_cost,
            similarity_score: self.similarity_score,
            trail_count: self.trail_count.max(0) as usize,
            route_path,
            route_edges,
            geometry,
            tolerance_percent: self.tolerance_percent,
            segments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ws(id: &str) -> WorkspaceId {
        WorkspaceId::new(id).unwrap()
    }

    fn trail(id: TrailId) -> Trail {
        let mut meta = TrailMetadata::in_region("boulder");
        meta.surface = Some("dirt".to_string());
        Trail::new(
            id,
            "Mesa Trail",
            meta,
            vec![
                TrailPoint::with_elevation(40.0, -105.0, 1800.0),
                TrailPoint::with_elevation(40.005, -105.001, 1850.5),
                TrailPoint::new(40.01, -105.0),
            ],
        )
    }

    #[test]
    fn test_trail_round_trip() {
        let mut store = SqliteStore::in_memory().unwrap();
        let w = ws("boulder");
        let mut segment = trail(1).segment(5, trail(1).points[..2].to_vec());
        segment.metadata.difficulty = Some("moderate".to_string());

        store.insert_trails(&w, &[trail(1), segment.clone()]).unwrap();
        let loaded = store.load_trails(&w).unwrap();
        assert_eq!(loaded, vec![trail(1), segment]);
        assert_eq!(store.trail_count(&w).unwrap(), 2);
    }

    #[test]
    fn test_workspaces_are_isolated() {
        let mut store = SqliteStore::in_memory().unwrap();
        store.insert_trails(&ws("a"), &[trail(1)]).unwrap();
        store.insert_trails(&ws("b"), &[trail(1), trail(2)]).unwrap();

        store.replace_trails(&ws("a"), &[trail(7)]).unwrap();
        let a: Vec<TrailId> = store.load_trails(&ws("a")).unwrap().iter().map(|t| t.id).collect();
        assert_eq!(a, vec![7]);
        assert_eq!(store.trail_count(&ws("b")).unwrap(), 2);

        store.drop_workspace(&ws("b")).unwrap();
        assert_eq!(store.trail_count(&ws("b")).unwrap(), 0);
        assert_eq!(store.trail_count(&ws("a")).unwrap(), 1);
    }

    #[test]
    fn test_empty_workspace_loads_empty() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.load_graph(&ws("none")).unwrap().is_empty());
        assert!(store.load_recommendations(&ws("none")).unwrap().is_empty());
    }
}
