// SPDX-License-Identifier: MIT OR Apache-2.0
//! Socket definitions for node inputs/outputs.

use crate::connection::{Connection, ConnectionId};
use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SocketId(pub Uuid);

impl SocketId {
    /// Create a new random socket ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SocketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Socket direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SocketDirection {
    /// Input socket
    Input,
    /// Output socket
    Output,
}

impl SocketDirection {
    /// The opposite direction
    pub fn opposite(self) -> Self {
        match self {
            Self::Input => Self::Output,
            Self::Output => Self::Input,
        }
    }

    /// Prefix used for generated socket names
    pub fn default_name(self) -> &'static str {
        match self {
            Self::Input => "InputSocket",
            Self::Output => "OutputSocket",
        }
    }
}

/// How many connections a socket accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionMode {
    /// Any number of connections
    #[default]
    Multiple,
    /// At most one connection; a new one replaces the old
    Override,
}

/// Value-type family carried by a socket
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ValueType {
    /// Pure control flow; connects to any family
    #[default]
    Passthrough,
    /// Event/signal payload
    Signal,
    /// Boolean value
    Bool,
    /// Integer value
    Int,
    /// Floating point value
    Float,
    /// String value
    String,
    /// Host-defined family
    Custom(String),
}

impl ValueType {
    /// Check if this is the wildcard family
    pub fn is_passthrough(&self) -> bool {
        matches!(self, Self::Passthrough)
    }

    /// Check if this type can connect to another type
    pub fn can_connect_to(&self, other: &ValueType) -> bool {
        self.is_passthrough() || other.is_passthrough() || self == other
    }
}

/// A connection point on a node.
///
/// A socket only knows its owner by ID. Its `connections` list holds the
/// socket's half of every edge; the other half lives on the socket at the
/// far end and must be kept in step by the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Socket {
    /// Unique socket ID
    pub id: SocketId,
    /// Owning node
    pub node: NodeId,
    /// Socket name, unique among sockets of the same direction on a node
    pub name: String,
    /// Socket direction
    pub direction: SocketDirection,
    /// Connection policy
    pub connection_mode: ConnectionMode,
    /// Value-type family
    pub value_type: ValueType,
    /// Whether the editor may delete this socket
    pub can_be_deleted: bool,
    /// Connections attached to this socket
    connections: Vec<Connection>,
}

impl Socket {
    /// Create a new, unconnected socket
    pub fn new(
        node: NodeId,
        name: impl Into<String>,
        direction: SocketDirection,
        connection_mode: ConnectionMode,
        value_type: ValueType,
    ) -> Self {
        Self {
            id: SocketId::new(),
            node,
            name: name.into(),
            direction,
            connection_mode,
            value_type,
            can_be_deleted: true,
            connections: Vec::new(),
        }
    }

    /// Mark the socket as non-deletable
    pub fn locked(mut self) -> Self {
        self.can_be_deleted = false;
        self
    }

    /// Check if this is an input socket
    pub fn is_input(&self) -> bool {
        self.direction == SocketDirection::Input
    }

    /// Check if this is an output socket
    pub fn is_output(&self) -> bool {
        self.direction == SocketDirection::Output
    }

    /// Check if this socket accepts a single connection only
    pub fn is_override(&self) -> bool {
        self.connection_mode == ConnectionMode::Override
    }

    /// All connections on this socket
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Check if the socket has any connection
    pub fn is_connected(&self) -> bool {
        !self.connections.is_empty()
    }

    /// Check if a connection already links this socket with `socket_id`
    pub fn is_connected_to(&self, socket_id: SocketId) -> bool {
        self.connections
            .iter()
            .any(|c| c.other_socket(self.id) == Some(socket_id))
    }

    /// Check if the socket holds the given connection
    pub fn contains_connection(&self, connection_id: ConnectionId) -> bool {
        self.connections.iter().any(|c| c.id == connection_id)
    }

    /// Get a connection by ID
    pub fn connection(&self, connection_id: ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == connection_id)
    }

    /// The oldest connection on this socket
    pub fn first_connection(&self) -> Option<&Connection> {
        self.connections.first()
    }

    /// Sockets at the far end of every connection
    pub fn connected_sockets(&self) -> impl Iterator<Item = SocketId> + '_ {
        self.connections
            .iter()
            .filter_map(move |c| c.other_socket(self.id))
    }

    /// Nodes at the far end of every connection
    pub fn connected_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.connections.iter().map(move |c| self.far_node(c))
    }

    /// Check if a connection to another socket is valid.
    ///
    /// With `ignore_value_type` set, only identity, ownership and direction
    /// are checked.
    pub fn can_connect(&self, other: Option<&Socket>, ignore_value_type: bool) -> bool {
        let Some(other) = other else {
            return false;
        };

        if other.id == self.id || other.node == self.node {
            return false;
        }

        // Must be opposite directions
        if self.direction == other.direction {
            return false;
        }

        if self.is_connected_to(other.id) || other.is_connected_to(self.id) {
            return false;
        }

        ignore_value_type || self.value_type.can_connect_to(&other.value_type)
    }

    /// Drop every connection on this socket.
    ///
    /// The far-end sockets are left untouched.
    pub fn disconnect(&mut self) -> Vec<Connection> {
        std::mem::take(&mut self.connections)
    }

    /// Drop the connections leading to `node_id`
    pub fn disconnect_from_node(&mut self, node_id: NodeId) -> Vec<Connection> {
        let direction = self.direction;
        let (removed, kept): (Vec<Connection>, Vec<Connection>) = std::mem::take(&mut self.connections)
            .into_iter()
            .partition(|c| match direction {
                SocketDirection::Input => c.output_node == node_id,
                SocketDirection::Output => c.input_node == node_id,
            });
        self.connections = kept;
        removed
    }

    /// Remove a single connection, if present
    pub fn remove_connection(&mut self, connection_id: ConnectionId) -> Option<Connection> {
        let index = self.connections.iter().position(|c| c.id == connection_id)?;
        Some(self.connections.remove(index))
    }

    /// Attach this socket's half of a connection.
    ///
    /// Under `Override` any previous connection is dropped from this side;
    /// the graph clears the far ends before calling this.
    pub(crate) fn add_connection(&mut self, connection: Connection) {
        if self.is_override() {
            self.connections.clear();
        }
        self.connections.push(connection);
    }

    fn far_node(&self, connection: &Connection) -> NodeId {
        match self.direction {
            SocketDirection::Input => connection.output_node,
            SocketDirection::Output => connection.input_node,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(node: NodeId, value_type: ValueType) -> Socket {
        Socket::new(node, "In", SocketDirection::Input, ConnectionMode::Multiple, value_type)
    }

    fn output(node: NodeId, value_type: ValueType) -> Socket {
        Socket::new(node, "Out", SocketDirection::Output, ConnectionMode::Multiple, value_type)
    }

    fn link(a: &mut Socket, b: &mut Socket) -> Connection {
        let connection = Connection::new(a, b);
        a.add_connection(connection.clone());
        b.add_connection(connection.clone());
        connection
    }

    #[test]
    fn test_can_connect_rejects_missing_and_self() {
        let socket = output(NodeId::new(), ValueType::Passthrough);
        assert!(!socket.can_connect(None, false));
        assert!(!socket.can_connect(Some(&socket), true));
    }

    #[test]
    fn test_can_connect_rejects_same_node() {
        let node = NodeId::new();
        let in0 = input(node, ValueType::Passthrough);
        let out0 = output(node, ValueType::Passthrough);
        assert!(!in0.can_connect(Some(&out0), false));
        assert!(!out0.can_connect(Some(&in0), true));
    }

    #[test]
    fn test_can_connect_requires_opposite_directions() {
        let a = input(NodeId::new(), ValueType::Passthrough);
        let b = input(NodeId::new(), ValueType::Passthrough);
        let c = output(NodeId::new(), ValueType::Passthrough);
        let d = output(NodeId::new(), ValueType::Passthrough);
        assert!(!a.can_connect(Some(&b), true));
        assert!(!c.can_connect(Some(&d), true));
        assert!(a.can_connect(Some(&c), false));
    }

    #[test]
    fn test_can_connect_value_types() {
        let float_in = input(NodeId::new(), ValueType::Float);
        let bool_out = output(NodeId::new(), ValueType::Bool);
        let float_out = output(NodeId::new(), ValueType::Float);
        let any_out = output(NodeId::new(), ValueType::Passthrough);

        assert!(!float_in.can_connect(Some(&bool_out), false));
        assert!(float_in.can_connect(Some(&bool_out), true));
        assert!(float_in.can_connect(Some(&float_out), false));
        assert!(float_in.can_connect(Some(&any_out), false));
        assert!(any_out.can_connect(Some(&float_in), false));
    }

    #[test]
    fn test_can_connect_is_symmetric() {
        let node = NodeId::new();
        let sockets = [
            input(NodeId::new(), ValueType::Int),
            input(node, ValueType::Passthrough),
            output(node, ValueType::Int),
            output(NodeId::new(), ValueType::String),
            output(NodeId::new(), ValueType::Custom("Panel".into())),
            input(NodeId::new(), ValueType::Custom("Panel".into())),
        ];

        for a in &sockets {
            for b in &sockets {
                for ignore in [false, true] {
                    assert_eq!(
                        a.can_connect(Some(b), ignore),
                        b.can_connect(Some(a), ignore),
                        "{} vs {}",
                        a.name,
                        b.name
                    );
                }
            }
        }
    }

    #[test]
    fn test_can_connect_rejects_existing_connection() {
        let mut a = output(NodeId::new(), ValueType::Passthrough);
        let mut b = input(NodeId::new(), ValueType::Passthrough);
        assert!(a.can_connect(Some(&b), false));

        link(&mut a, &mut b);
        assert!(!a.can_connect(Some(&b), false));
        assert!(!b.can_connect(Some(&a), false));
        assert!(a.is_connected_to(b.id));
        assert_eq!(b.connected_nodes().collect::<Vec<_>>(), vec![a.node]);
        assert_eq!(a.connected_sockets().collect::<Vec<_>>(), vec![b.id]);
        assert_eq!(b.connected_sockets().collect::<Vec<_>>(), vec![a.id]);
    }

    #[test]
    fn test_direction_helpers() {
        assert_eq!(SocketDirection::Input.opposite(), SocketDirection::Output);
        assert_eq!(SocketDirection::Output.opposite(), SocketDirection::Input);
        let socket = input(NodeId::new(), ValueType::Passthrough);
        assert!(socket.is_input());
        assert!(!socket.is_output());
        assert_eq!(socket.direction.opposite().default_name(), "OutputSocket");
    }

    #[test]
    fn test_disconnect_is_one_sided() {
        let mut a = output(NodeId::new(), ValueType::Passthrough);
        let mut b = input(NodeId::new(), ValueType::Passthrough);
        link(&mut a, &mut b);

        assert_eq!(a.disconnect().len(), 1);
        assert!(!a.is_connected());
        assert!(b.is_connected());
    }

    #[test]
    fn test_disconnect_from_node_respects_direction() {
        let target = NodeId::new();
        let mut hub_out = output(NodeId::new(), ValueType::Passthrough);
        let mut to_target = input(target, ValueType::Passthrough);
        let mut to_other = input(NodeId::new(), ValueType::Passthrough);
        link(&mut hub_out, &mut to_target);
        link(&mut hub_out, &mut to_other);

        let removed = hub_out.disconnect_from_node(target);
        assert_eq!(removed.len(), 1);
        assert_eq!(hub_out.connections().len(), 1);
        assert_eq!(hub_out.connected_nodes().next(), Some(to_other.node));

        // An input compares against the output side only
        let own_node = to_other.node;
        assert!(to_other.disconnect_from_node(own_node).is_empty());
        assert!(to_other.is_connected());
    }

    #[test]
    fn test_remove_connection() {
        let mut a = output(NodeId::new(), ValueType::Passthrough);
        let mut b = input(NodeId::new(), ValueType::Passthrough);
        let connection = link(&mut a, &mut b);

        assert!(a.remove_connection(ConnectionId::new()).is_none());
        assert_eq!(a.remove_connection(connection.id), Some(connection));
        assert!(!a.is_connected());
    }

    #[test]
    fn test_override_keeps_single_connection() {
        let mut a = output(NodeId::new(), ValueType::Passthrough);
        a.connection_mode = ConnectionMode::Override;
        let mut b = input(NodeId::new(), ValueType::Passthrough);
        let mut c = input(NodeId::new(), ValueType::Passthrough);

        link(&mut a, &mut b);
        let second = link(&mut a, &mut c);
        assert_eq!(a.connections().len(), 1);
        assert_eq!(a.first_connection().map(|c| c.id), Some(second.id));
    }
}
