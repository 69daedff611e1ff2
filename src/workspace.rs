//! Workspace handles and storage.
//!
//! A workspace is one isolated set of trails, routing graph and
//! recommendations. Its id is validated once and afterwards used only as a
//! partition key or bound query parameter.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::graph::RoutingGraph;
use crate::recommend::RouteRecommendation;
use crate::{Result, Trail, TrailGraphError};

/// Maximum workspace id length.
pub const MAX_WORKSPACE_ID_LEN: usize = 64;

/// Validated workspace identifier: 1-64 characters of `[A-Za-z0-9_-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkspaceId(String);

impl WorkspaceId {
    pub fn new(id: &str) -> Result<Self> {
        if id.is_empty() || id.len() > MAX_WORKSPACE_ID_LEN {
            return Err(TrailGraphError::Workspace {
                workspace: id.to_string(),
                message: format!("id must be 1-{} characters", MAX_WORKSPACE_ID_LEN),
            });
        }
        if let Some(bad) = id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(TrailGraphError::Workspace {
                workspace: id.to_string(),
                message: format!("invalid character {:?}", bad),
            });
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for WorkspaceId {
    type Err = TrailGraphError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for WorkspaceId {
    type Error = TrailGraphError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<WorkspaceId> for String {
    fn from(id: WorkspaceId) -> Self {
        id.0
    }
}

/// Persistence for one or more workspaces.
pub trait WorkspaceStore {
    /// All trails of the workspace, ordered by id.
    fn load_trails(&self, workspace: &WorkspaceId) -> Result<Vec<Trail>>;

    /// Add trails, replacing any with the same id. Returns the number written.
    fn insert_trails(&mut self, workspace: &WorkspaceId, trails: &[Trail]) -> Result<usize>;

    /// Remove every trail of the workspace and write `trails` in their place.
    fn replace_trails(&mut self, workspace: &WorkspaceId, trails: &[Trail]) -> Result<usize>;

    /// Overwrite the routing graph.
    fn save_graph(&mut self, workspace: &WorkspaceId, graph: &RoutingGraph) -> Result<()>;

    /// The stored routing graph (empty when none was saved).
    fn load_graph(&self, workspace: &WorkspaceId) -> Result<RoutingGraph>;

    /// Add recommendations with their trail segments.
    ///
    /// A route whose `route_uuid` is already stored is replaced and moves to
    /// the end of the insertion order. Returns the number of distinct routes
    /// written.
    fn append_recommendations(
        &mut self,
        workspace: &WorkspaceId,
        recommendations: &[RouteRecommendation],
    ) -> Result<usize>;

    /// Stored recommendations in insertion order.
    fn load_recommendations(&self, workspace: &WorkspaceId) -> Result<Vec<RouteRecommendation>>;

    /// Remove all recommendations. Returns the number removed.
    fn clear_recommendations(&mut self, workspace: &WorkspaceId) -> Result<usize>;
}

#[derive(Debug, Clone, Default)]
struct WorkspaceData {
    trails: Vec<Trail>,
    graph: RoutingGraph,
    recommendations: Vec<RouteRecommendation>,
}

/// Process-local store, keyed by workspace.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    workspaces: HashMap<WorkspaceId, WorkspaceData>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Workspaces that hold any data.
    pub fn workspaces(&self) -> Vec<&WorkspaceId> {
        let mut ids: Vec<&WorkspaceId> = self.workspaces.keys().collect();
        ids.sort();
        ids
    }

    fn data_mut(&mut self, workspace: &WorkspaceId) -> &mut WorkspaceData {
        self.workspaces.entry(workspace.clone()).or_default()
    }
}

impl WorkspaceStore for InMemoryStore {
    fn load_trails(&self, workspace: &WorkspaceId) -> Result<Vec<Trail>> {
        Ok(self
            .workspaces
            .get(workspace)
            .map(|w| w.trails.clone())
            .unwrap_or_default())
    }

    fn insert_trails(&mut self, workspace: &WorkspaceId, trails: &[Trail]) -> Result<usize> {
        let data = self.data_mut(workspace);
        for trail in trails {
            data.trails.retain(|t| t.id != trail.id);
            data.trails.push(trail.clone());
        }
        data.trails.sort_by_key(|t| t.id);
        Ok(trails.len())
    }

    fn replace_trails(&mut self, workspace: &WorkspaceId, trails: &[Trail]) -> Result<usize> {
        self.data_mut(workspace).trails.clear();
        self.insert_trails(workspace, trails)
    }

    fn save_graph(&mut self, workspace: &WorkspaceId, graph: &RoutingGraph) -> Result<()> {
        self.data_mut(workspace).graph = graph.clone();
        Ok(())
    }

    fn load_graph(&self, workspace: &WorkspaceId) -> Result<RoutingGraph> {
        Ok(self
            .workspaces
            .get(workspace)
            .map(|w| w.graph.clone())
            .unwrap_or_default())
    }

    fn append_recommendations(
        &mut self,
        workspace: &WorkspaceId,
        recommendations: &[RouteRecommendation],
    ) -> Result<usize> {
        let stored = &mut self.data_mut(workspace).recommendations;
        let mut written = HashSet::new();
        for r in recommendations {
            stored.retain(|s| s.route_uuid != r.route_uuid);
            stored.push(r.clone());
            written.insert(r.route_uuid.as_str());
        }
        Ok(written.len())
    }

    fn load_recommendations(&self, workspace: &WorkspaceId) -> Result<Vec<RouteRecommendation>> {
        Ok(self
            .workspaces
            .get(workspace)
            .map(|w| w.recommendations.clone())
            .unwrap_or_default())
    }

    fn clear_recommendations(&mut self, workspace: &WorkspaceId) -> Result<usize> {
        let data = self.data_mut(workspace);
        let removed = data.recommendations.len();
        data.recommendations.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TrailMetadata, TrailPoint};

    fn trail(id: i64) -> Trail {
        Trail::new(
            id,
            "T",
            TrailMetadata::default(),
            vec![TrailPoint::new(40.0, -105.0), TrailPoint::new(40.01, -105.0)],
        )
    }

    #[test]
    fn test_workspace_id_validation() {
        assert!(WorkspaceId::new("boulder_2024-v1").is_ok());
        assert!(WorkspaceId::new("").is_err());
        assert!(WorkspaceId::new("a b").is_err());
        assert!(WorkspaceId::new("x'; DROP TABLE trails; --").is_err());
        assert!(WorkspaceId::new(&"a".repeat(64)).is_ok());
        assert!(WorkspaceId::new(&"a".repeat(65)).is_err());
        assert!("staging".parse::<WorkspaceId>().is_ok());
    }

    #[test]
    fn test_workspace_id_serde_validates() {
        let id: WorkspaceId = serde_json::from_str("\"boulder\"").unwrap();
        assert_eq!(id.as_str(), "boulder");
        assert!(serde_json::from_str::<WorkspaceId>("\"bad id\"").is_err());
    }

    #[test]
    fn test_in_memory_isolation() {
        let mut store = InMemoryStore::new();
        let a = WorkspaceId::new("a").unwrap();
        let b = WorkspaceId::new("b").unwrap();

        store.insert_trails(&a, &[trail(2), trail(1)]).unwrap();
        assert_eq!(store.load_trails(&a).unwrap().len(), 2);
        assert!(store.load_trails(&b).unwrap().is_empty());

        // Upsert by id keeps order by id
        store.insert_trails(&a, &[trail(1)]).unwrap();
        let ids: Vec<i64> = store.load_trails(&a).unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2]);

        store.replace_trails(&a, &[trail(9)]).unwrap();
        let ids: Vec<i64> = store.load_trails(&a).unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![9]);
        assert_eq!(store.workspaces().len(), 1);
    }
}
