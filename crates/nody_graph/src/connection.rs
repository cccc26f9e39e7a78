// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions for the graph.

use crate::node::NodeId;
use crate::socket::{Socket, SocketId};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An edge from one output socket to one input socket.
///
/// Both endpoint sockets keep a copy of the same record (same `id`), so a
/// connection is only ever removed from both sides together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Unique connection ID
    pub id: ConnectionId,
    /// Node owning the output socket
    pub output_node: NodeId,
    /// Output socket ID
    pub output_socket: SocketId,
    /// Node owning the input socket
    pub input_node: NodeId,
    /// Input socket ID
    pub input_socket: SocketId,
}

impl Connection {
    /// Create a connection between two sockets.
    ///
    /// Whichever socket is an output becomes the output side; the other
    /// becomes the input side.
    pub fn new(a: &Socket, b: &Socket) -> Self {
        let (output, input) = if a.is_output() { (a, b) } else { (b, a) };
        Self {
            id: ConnectionId::new(),
            output_node: output.node,
            output_socket: output.id,
            input_node: input.node,
            input_socket: input.id,
        }
    }

    /// Check if this connection involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.output_node == node_id || self.input_node == node_id
    }

    /// Check if this connection involves a specific socket
    pub fn involves_socket(&self, socket_id: SocketId) -> bool {
        self.output_socket == socket_id || self.input_socket == socket_id
    }

    /// The socket at the far end, seen from `socket_id`
    pub fn other_socket(&self, socket_id: SocketId) -> Option<SocketId> {
        if self.output_socket == socket_id {
            Some(self.input_socket)
        } else if self.input_socket == socket_id {
            Some(self.output_socket)
        } else {
            None
        }
    }

    /// The node at the far end, seen from `socket_id`
    pub fn other_node(&self, socket_id: SocketId) -> Option<NodeId> {
        if self.output_socket == socket_id {
            Some(self.input_node)
        } else if self.input_socket == socket_id {
            Some(self.output_node)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::{ConnectionMode, SocketDirection, ValueType};

    fn socket(node: NodeId, direction: SocketDirection) -> Socket {
        Socket::new(node, "Socket", direction, ConnectionMode::Multiple, ValueType::Passthrough)
    }

    #[test]
    fn test_direction_is_resolved_from_sockets() {
        let a = NodeId::new();
        let b = NodeId::new();
        let input = socket(a, SocketDirection::Input);
        let output = socket(b, SocketDirection::Output);

        for connection in [Connection::new(&input, &output), Connection::new(&output, &input)] {
            assert_eq!(connection.output_node, b);
            assert_eq!(connection.output_socket, output.id);
            assert_eq!(connection.input_node, a);
            assert_eq!(connection.input_socket, input.id);
        }
    }

    #[test]
    fn test_other_end_lookup() {
        let input = socket(NodeId::new(), SocketDirection::Input);
        let output = socket(NodeId::new(), SocketDirection::Output);
        let connection = Connection::new(&output, &input);

        assert_eq!(connection.other_socket(input.id), Some(output.id));
        assert_eq!(connection.other_node(output.id), Some(input.node));
        assert_eq!(connection.other_socket(SocketId::new()), None);
        assert!(connection.involves_node(input.node));
        assert!(connection.involves_socket(output.id));
    }

    #[test]
    fn test_copy_keeps_identity() {
        let input = socket(NodeId::new(), SocketDirection::Input);
        let output = socket(NodeId::new(), SocketDirection::Output);
        let connection = Connection::new(&output, &input);
        let copy = connection.clone();
        assert_eq!(copy, connection);
        assert_ne!(Connection::new(&output, &input).id, connection.id);
    }
}
