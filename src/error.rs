//! Unified error handling for the trailgraph library.
//!
//! Stage-level operations report partial success through their result structs;
//! this type covers the failures that stop an operation outright.

use thiserror::Error;

use crate::TrailId;

/// Unified error type for trailgraph operations.
#[derive(Debug, Error)]
pub enum TrailGraphError {
    /// Trail geometry has too few usable points
    #[error("Trail {trail_id} has {point_count} points, minimum {minimum_required} required")]
    InsufficientPoints {
        trail_id: TrailId,
        point_count: usize,
        minimum_required: usize,
    },

    /// Trail geometry is malformed (non-finite or out-of-range coordinates)
    #[error("Trail {trail_id} has invalid geometry: {message}")]
    InvalidGeometry { trail_id: TrailId, message: String },

    /// Rejected configuration value
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Graph topology violation, such as edges referencing missing nodes
    #[error("Topology error: {message}")]
    Topology { message: String },

    /// Workspace handle or workspace contents problem
    #[error("Workspace '{workspace}': {message}")]
    Workspace { workspace: String, message: String },

    /// Storage engine failure
    #[cfg(feature = "persistence")]
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Geometry blob encoding failure
    #[cfg(feature = "persistence")]
    #[error("Geometry encoding error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Geometry blob decoding failure
    #[cfg(feature = "persistence")]
    #[error("Geometry decoding error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

impl TrailGraphError {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        TrailGraphError::Config {
            message: message.into(),
        }
    }

    /// Shorthand for a topology error.
    pub fn topology(message: impl Into<String>) -> Self {
        TrailGraphError::Topology {
            message: message.into(),
        }
    }
}

/// Result type alias for trailgraph operations.
pub type Result<T> = std::result::Result<T, TrailGraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrailGraphError::InsufficientPoints {
            trail_id: 42,
            point_count: 1,
            minimum_required: 2,
        };
        assert!(err.to_string().contains("42"));
        assert!(err.to_string().contains("1 points"));
    }

    #[test]
    fn test_config_shorthand() {
        let err = TrailGraphError::config("tolerance must be positive");
        assert_eq!(
            err.to_string(),
            "Configuration error: tolerance must be positive"
        );
    }

    #[test]
    fn test_topology_shorthand() {
        let err = TrailGraphError::topology("1 stored edges reference missing nodes");
        assert!(matches!(err, TrailGraphError::Topology { .. }));
        assert!(err.to_string().starts_with("Topology error: 1 stored edges"));
    }
}
