//! Error types for the search coordinator.

use crate::node::NodeHandle;
use crate::types::{Depth, Score};

/// Misuse of the node API. These indicate a kernel bug rather than a
/// recoverable runtime condition.
#[derive(thiserror::Error, Debug)]
pub enum NodeError {
    #[error("Invalid search window: alpha {alpha} >= beta {beta}")]
    InvalidWindow { alpha: Score, beta: Score },

    #[error("Node height {height} exceeds the configured maximum {max}")]
    TooDeep { height: usize, max: usize },

    #[error("Node arena exhausted (capacity {capacity})")]
    ArenaExhausted { capacity: usize },

    #[error("Node handle {0:?} does not refer to a slot of this arena")]
    InvalidHandle(NodeHandle),

    #[error("Node handle {0:?} is stale")]
    StaleHandle(NodeHandle),

    #[error("Move iteration already started on {0:?}")]
    AlreadyStarted(NodeHandle),

    #[error("Cannot destroy {0:?} while a helper is attached")]
    HelperAttached(NodeHandle),

    #[error("No helper assignment pending on {0:?}")]
    HelperNotAssigned(NodeHandle),
}

/// Configuration loading and validation errors.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Errors surfaced by the coordinator.
#[derive(thiserror::Error, Debug)]
pub enum SearchError {
    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to spawn search worker {id}: {source}")]
    ThreadSpawn {
        id: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Search worker {id} panicked")]
    WorkerPanicked { id: usize },

    #[error("Root position has no legal moves")]
    NoLegalMoves,

    #[error("Invalid search depth: {0}")]
    InvalidDepth(Depth),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_errors_convert_into_search_errors() {
        let err: SearchError = NodeError::InvalidWindow { alpha: 5, beta: 5 }.into();
        assert!(matches!(err, SearchError::Node(NodeError::InvalidWindow { .. })));
        assert_eq!(err.to_string(), "Invalid search window: alpha 5 >= beta 5");
    }

    #[test]
    fn config_error_reports_field() {
        let err = ConfigError::Invalid {
            field: "threads",
            reason: "must be at least 1".to_string(),
        };
        assert!(err.to_string().contains("'threads'"));
    }
}
