// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for graph traversal and persistence.

use crate::connection::ConnectionId;
use thiserror::Error;

/// Errors raised while driving or (de)serializing a graph.
///
/// Lookups and edit checks never produce one of these; they answer with
/// `Option`/`bool` instead. The only structural failure is
/// [`GraphError::InfiniteLoop`].
#[derive(Debug, Error)]
pub enum GraphError {
    /// A node was activated twice inside the loop guard window
    #[error(
        "Infinite loop detected in graph '{graph}': node '{node}' was re-activated \
         (previous node: {prev}, connection: {via})",
        prev = .previous.as_deref().unwrap_or("none"),
        via = display_connection(.connection)
    )]
    InfiniteLoop {
        /// Name of the graph the transition happened in
        graph: String,
        /// Name of the node that closed the loop
        node: String,
        /// Name of the node that was active before the transition
        previous: Option<String>,
        /// Connection the transition was following, if any
        connection: Option<ConnectionId>,
    },

    /// A node behavior hook failed
    #[error("Node behavior failed: {0}")]
    Behavior(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialize(#[from] ron::error::SpannedError),
}

impl GraphError {
    /// Check if this error is the loop guard firing
    pub fn is_infinite_loop(&self) -> bool {
        matches!(self, Self::InfiniteLoop { .. })
    }
}

fn display_connection(connection: &Option<ConnectionId>) -> String {
    match connection {
        Some(id) => id.to_string(),
        None => "none".to_string(),
    }
}

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infinite_loop_message_names_everything() {
        let connection = ConnectionId::new();
        let err = GraphError::InfiniteLoop {
            graph: "Main Menu".to_string(),
            node: "Show Popup".to_string(),
            previous: Some("Hide Popup".to_string()),
            connection: Some(connection),
        };

        let message = err.to_string();
        assert!(message.contains("Main Menu"));
        assert!(message.contains("Show Popup"));
        assert!(message.contains("Hide Popup"));
        assert!(message.contains(&connection.to_string()));
        assert!(err.is_infinite_loop());
    }

    #[test]
    fn test_infinite_loop_message_without_context() {
        let err = GraphError::InfiniteLoop {
            graph: "G".to_string(),
            node: "A".to_string(),
            previous: None,
            connection: None,
        };
        assert!(err.to_string().contains("previous node: none"));
        assert!(!GraphError::Behavior("boom".into()).is_infinite_loop());
    }
}
