// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph state machine.

use crate::behavior::Tick;
use crate::connection::{Connection, ConnectionId};
use crate::graph::GraphId;
use crate::socket::{ConnectionMode, Socket, SocketDirection, SocketId, ValueType};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What role a node plays in its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NodeKind {
    /// Ordinary state
    #[default]
    General,
    /// Entry state of a top-level graph
    Start,
    /// Entry state of a sub-graph
    Enter,
    /// Final state of a sub-graph
    Exit,
    /// Always-on node, ticked independently of the active node
    Global,
    /// State that runs a nested graph while active
    SubGraph {
        /// The nested graph instance, owned by the parent graph
        graph: GraphId,
    },
}

impl NodeKind {
    /// Display name for this kind
    pub fn name(&self) -> &'static str {
        match self {
            Self::General => "General",
            Self::Start => "Start",
            Self::Enter => "Enter",
            Self::Exit => "Exit",
            Self::Global => "Global",
            Self::SubGraph { .. } => "SubGraph",
        }
    }

    /// Minimum `(inputs, outputs)` for a fresh node of this kind
    pub fn default_socket_counts(&self) -> (usize, usize) {
        match self {
            Self::Start | Self::Enter | Self::Global => (0, 1),
            Self::Exit => (1, 0),
            Self::General | Self::SubGraph { .. } => (1, 1),
        }
    }

    /// Whether the editor may delete nodes of this kind
    pub fn is_deletable(&self) -> bool {
        !matches!(self, Self::Start | Self::Enter | Self::Exit)
    }

    /// Check if this kind only exists once per graph
    pub fn is_unique(&self) -> bool {
        matches!(self, Self::Start | Self::Enter | Self::Exit)
    }

    /// The nested graph, for `SubGraph` nodes
    pub fn sub_graph(&self) -> Option<GraphId> {
        match self {
            Self::SubGraph { graph } => Some(*graph),
            _ => None,
        }
    }
}

/// A state in the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Display name
    pub name: String,
    /// Node role
    pub kind: NodeKind,
    /// Graph this node was initialized for
    pub graph_id: Option<GraphId>,
    /// Position in the editor (opaque to the runtime)
    pub position: [f32; 2],
    /// Input sockets
    inputs: Vec<Socket>,
    /// Output sockets
    outputs: Vec<Socket>,
    /// Input sockets never drop below this count
    pub min_inputs: usize,
    /// Output sockets never drop below this count
    pub min_outputs: usize,
    /// Receive `on_update` while active
    pub use_update: bool,
    /// Receive `on_fixed_update` while active
    pub use_fixed_update: bool,
    /// Receive `on_late_update` while active
    pub use_late_update: bool,
    /// Whether the editor may delete this node
    pub can_be_deleted: bool,
    /// Graph this node is currently active in
    #[serde(skip)]
    active_graph: Option<GraphId>,
    /// Global activation state
    #[serde(skip)]
    active: bool,
}

impl Node {
    /// Create a node with the default sockets for its kind
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        let (min_inputs, min_outputs) = kind.default_socket_counts();
        let mut node = Self {
            id: NodeId::new(),
            name: name.into(),
            kind,
            graph_id: None,
            position: [0.0, 0.0],
            inputs: Vec::new(),
            outputs: Vec::new(),
            min_inputs,
            min_outputs,
            use_update: false,
            use_fixed_update: false,
            use_late_update: false,
            can_be_deleted: kind.is_deletable(),
            active_graph: None,
            active: false,
        };
        node.fill_minimum_sockets();
        node
    }

    /// Create a general state node
    pub fn general(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::General)
    }

    /// Create a node running the given sub-graph
    pub fn sub_graph(name: impl Into<String>, graph: GraphId) -> Self {
        Self::new(name, NodeKind::SubGraph { graph })
    }

    /// Bind the node to a graph, place it, and set socket minimums.
    ///
    /// Missing sockets are added until both minimums are met; existing
    /// sockets are kept.
    pub fn init_node(
        &mut self,
        graph: GraphId,
        position: [f32; 2],
        min_inputs: usize,
        min_outputs: usize,
    ) {
        self.graph_id = Some(graph);
        self.position = position;
        self.min_inputs = min_inputs;
        self.min_outputs = min_outputs;
        self.fill_minimum_sockets();
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Opt in to `on_update`
    pub fn with_update(mut self) -> Self {
        self.use_update = true;
        self
    }

    /// Opt in to `on_fixed_update`
    pub fn with_fixed_update(mut self) -> Self {
        self.use_fixed_update = true;
        self
    }

    /// Opt in to `on_late_update`
    pub fn with_late_update(mut self) -> Self {
        self.use_late_update = true;
        self
    }

    /// Check if the node wants the given tick
    pub fn uses(&self, tick: Tick) -> bool {
        match tick {
            Tick::Update => self.use_update,
            Tick::FixedUpdate => self.use_fixed_update,
            Tick::LateUpdate => self.use_late_update,
        }
    }

    fn fill_minimum_sockets(&mut self) {
        while self.inputs.len() < self.min_inputs {
            self.add_input_socket(ConnectionMode::Multiple, ValueType::Passthrough);
        }
        while self.outputs.len() < self.min_outputs {
            self.add_output_socket(ConnectionMode::Override, ValueType::Passthrough);
        }
    }

    /// Add an input socket with a generated name
    pub fn add_input_socket(&mut self, mode: ConnectionMode, value_type: ValueType) -> SocketId {
        self.add_socket(SocketDirection::Input, None, mode, value_type)
    }

    /// Add an output socket with a generated name
    pub fn add_output_socket(&mut self, mode: ConnectionMode, value_type: ValueType) -> SocketId {
        self.add_socket(SocketDirection::Output, None, mode, value_type)
    }

    /// Add a named input socket; the name is made unique among inputs
    pub fn add_named_input_socket(
        &mut self,
        name: &str,
        mode: ConnectionMode,
        value_type: ValueType,
    ) -> SocketId {
        self.add_socket(SocketDirection::Input, Some(name), mode, value_type)
    }

    /// Add a named output socket; the name is made unique among outputs
    pub fn add_named_output_socket(
        &mut self,
        name: &str,
        mode: ConnectionMode,
        value_type: ValueType,
    ) -> SocketId {
        self.add_socket(SocketDirection::Output, Some(name), mode, value_type)
    }

    /// Add a socket in either direction
    pub fn add_socket(
        &mut self,
        direction: SocketDirection,
        name: Option<&str>,
        mode: ConnectionMode,
        value_type: ValueType,
    ) -> SocketId {
        let name = self.unique_socket_name(direction, name);
        let socket = Socket::new(self.id, name, direction, mode, value_type);
        let id = socket.id;
        self.sockets_mut(direction).push(socket);
        id
    }

    /// Pick a socket name not used by any socket of `direction`.
    ///
    /// Unnamed sockets get `InputSocket_{n}`/`OutputSocket_{n}`; a taken
    /// name gets `{name}_{n}`. In both cases `n` counts up from 0.
    pub fn unique_socket_name(&self, direction: SocketDirection, name: Option<&str>) -> String {
        let taken = |candidate: &str| self.socket_by_name(direction, candidate).is_some();

        let base = match name {
            Some(name) if !taken(name) => return name.to_string(),
            Some(name) => name,
            None => direction.default_name(),
        };

        let mut counter = 0usize;
        loop {
            let candidate = format!("{base}_{counter}");
            if !taken(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Sockets of one direction
    pub fn sockets(&self, direction: SocketDirection) -> &[Socket] {
        match direction {
            SocketDirection::Input => &self.inputs,
            SocketDirection::Output => &self.outputs,
        }
    }

    fn sockets_mut(&mut self, direction: SocketDirection) -> &mut Vec<Socket> {
        match direction {
            SocketDirection::Input => &mut self.inputs,
            SocketDirection::Output => &mut self.outputs,
        }
    }

    /// Input sockets
    pub fn inputs(&self) -> &[Socket] {
        &self.inputs
    }

    /// Output sockets
    pub fn outputs(&self) -> &[Socket] {
        &self.outputs
    }

    /// Get an input socket by index
    pub fn input(&self, index: usize) -> Option<&Socket> {
        self.inputs.get(index)
    }

    /// Get an output socket by index
    pub fn output(&self, index: usize) -> Option<&Socket> {
        self.outputs.get(index)
    }

    /// First input socket
    pub fn first_input(&self) -> Option<&Socket> {
        self.inputs.first()
    }

    /// First output socket
    pub fn first_output(&self) -> Option<&Socket> {
        self.outputs.first()
    }

    /// Get all sockets, inputs first
    pub fn all_sockets(&self) -> impl Iterator<Item = &Socket> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    fn all_sockets_mut(&mut self) -> impl Iterator<Item = &mut Socket> {
        self.inputs.iter_mut().chain(self.outputs.iter_mut())
    }

    /// Get a socket by ID
    pub fn socket(&self, socket_id: SocketId) -> Option<&Socket> {
        self.all_sockets().find(|s| s.id == socket_id)
    }

    /// Get a mutable socket by ID
    pub fn socket_mut(&mut self, socket_id: SocketId) -> Option<&mut Socket> {
        self.all_sockets_mut().find(|s| s.id == socket_id)
    }

    /// Get a socket by direction and name
    pub fn socket_by_name(&self, direction: SocketDirection, name: &str) -> Option<&Socket> {
        self.sockets(direction).iter().find(|s| s.name == name)
    }

    /// Check if the node owns a socket
    pub fn contains_socket(&self, socket_id: SocketId) -> bool {
        self.socket(socket_id).is_some()
    }

    /// Check if any socket has a connection
    pub fn is_connected(&self) -> bool {
        self.all_sockets().any(Socket::is_connected)
    }

    /// Check if a socket may be removed without breaking the minimums
    pub fn can_delete_socket(&self, socket: &Socket) -> bool {
        if !socket.can_be_deleted {
            return false;
        }

        match socket.direction {
            SocketDirection::Input => self.inputs.len() > self.min_inputs,
            SocketDirection::Output => self.outputs.len() > self.min_outputs,
        }
    }

    /// Remove a socket if [`Node::can_delete_socket`] allows it.
    ///
    /// The socket is returned with its connections still attached so the
    /// caller can clear the far ends.
    pub fn remove_socket(&mut self, socket_id: SocketId) -> Option<Socket> {
        let socket = self.socket(socket_id)?;
        if !self.can_delete_socket(socket) {
            return None;
        }

        let direction = socket.direction;
        let sockets = self.sockets_mut(direction);
        let index = sockets.iter().position(|s| s.id == socket_id)?;
        Some(sockets.remove(index))
    }

    /// Clear the connections of every socket.
    ///
    /// Only this node's halves are removed; returns them so the caller can
    /// clear the far ends.
    pub fn disconnect(&mut self) -> Vec<Connection> {
        self.all_sockets_mut().flat_map(Socket::disconnect).collect()
    }

    /// Clear every connection leading to `node_id`
    pub fn disconnect_from_node(&mut self, node_id: NodeId) -> Vec<Connection> {
        self.all_sockets_mut()
            .flat_map(|s| s.disconnect_from_node(node_id))
            .collect()
    }

    /// Remove this node's half of a connection
    pub fn remove_connection(&mut self, connection_id: ConnectionId) -> Option<Connection> {
        self.all_sockets_mut()
            .find_map(|s| s.remove_connection(connection_id))
    }

    /// Graph this node is currently active in
    pub fn active_graph(&self) -> Option<GraphId> {
        self.active_graph
    }

    pub(crate) fn set_active_graph(&mut self, graph: Option<GraphId>) {
        self.active_graph = graph;
    }

    /// Check if a global node is activated
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Activate a global node; returns `false` if it already was
    pub fn activate(&mut self, graph: GraphId) -> bool {
        if self.active {
            return false;
        }
        self.active = true;
        self.active_graph = Some(graph);
        true
    }

    /// Deactivate a global node; returns `false` if it already was
    pub fn deactivate(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.active_graph = None;
        true
    }

    /// Deep copy with fresh node and socket IDs and no connections
    pub fn duplicate(&self) -> Self {
        let mut copy = self.clone();
        copy.id = NodeId::new();
        copy.active_graph = None;
        copy.active = false;
        let node_id = copy.id;
        for socket in copy.all_sockets_mut() {
            socket.id = SocketId::new();
            socket.node = node_id;
            socket.disconnect();
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(sockets: &[Socket]) -> Vec<&str> {
        sockets.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_default_sockets_per_kind() {
        let start = Node::new("Start", NodeKind::Start);
        assert!(start.inputs().is_empty());
        assert_eq!(start.outputs().len(), 1);
        assert!(!start.can_be_deleted);

        let exit = Node::new("Exit", NodeKind::Exit);
        assert_eq!((exit.inputs().len(), exit.outputs().len()), (1, 0));

        let general = Node::general("Menu");
        assert_eq!((general.inputs().len(), general.outputs().len()), (1, 1));
        assert!(general.can_be_deleted);
        assert!(general.all_sockets().all(|s| s.node == general.id));
    }

    #[test]
    fn test_unnamed_socket_names() {
        let mut node = Node::new("Global", NodeKind::Global);
        for _ in 0..3 {
            node.add_input_socket(ConnectionMode::Multiple, ValueType::Passthrough);
        }
        assert_eq!(names(node.inputs()), ["InputSocket_0", "InputSocket_1", "InputSocket_2"]);

        node.add_output_socket(ConnectionMode::Override, ValueType::Passthrough);
        assert_eq!(names(node.outputs()), ["OutputSocket_0", "OutputSocket_1"]);
    }

    #[test]
    fn test_named_socket_collisions() {
        let mut node = Node::general("Menu");
        node.add_named_output_socket("Next", ConnectionMode::Override, ValueType::Passthrough);
        node.add_named_output_socket("Next", ConnectionMode::Override, ValueType::Passthrough);
        node.add_named_output_socket("Next", ConnectionMode::Override, ValueType::Passthrough);
        assert_eq!(names(node.outputs()), ["OutputSocket_0", "Next", "Next_0", "Next_1"]);

        // Opposite directions may share a name
        node.add_named_input_socket("Next", ConnectionMode::Multiple, ValueType::Passthrough);
        assert_eq!(names(node.inputs()), ["InputSocket_0", "Next"]);

        // A generated name skips over taken ones
        node.add_named_input_socket("InputSocket_1", ConnectionMode::Multiple, ValueType::Passthrough);
        node.add_input_socket(ConnectionMode::Multiple, ValueType::Passthrough);
        assert_eq!(names(node.inputs())[3], "InputSocket_2");
    }

    #[test]
    fn test_can_delete_socket_honors_minimums() {
        let mut node = Node::general("Menu");
        let first = node.outputs()[0].id;
        assert!(!node.can_delete_socket(&node.outputs()[0]));
        assert!(node.remove_socket(first).is_none());

        let extra = node.add_output_socket(ConnectionMode::Override, ValueType::Passthrough);
        assert!(node.can_delete_socket(&node.outputs()[0]));
        assert!(node.remove_socket(extra).is_some());
        assert_eq!(node.outputs().len(), 1);
    }

    #[test]
    fn test_indexed_socket_lookup() {
        let mut node = Node::general("Menu");
        let second = node.add_named_output_socket("Back", ConnectionMode::Override, ValueType::Signal);

        assert_eq!(node.input(0).map(|s| s.id), node.first_input().map(|s| s.id));
        assert!(node.input(1).is_none());
        assert_eq!(node.output(1).map(|s| s.id), Some(second));
        assert_eq!(node.output(1).map(|s| s.name.as_str()), Some("Back"));
        assert!(node.output(2).is_none());
    }

    #[test]
    fn test_locked_socket_cannot_be_deleted() {
        let mut node = Node::general("Menu");
        node.add_output_socket(ConnectionMode::Override, ValueType::Passthrough);
        node.add_output_socket(ConnectionMode::Override, ValueType::Passthrough);
        let socket = node.outputs()[2].clone().locked();
        assert!(!node.can_delete_socket(&socket));
    }

    #[test]
    fn test_init_node_fills_minimums() {
        let mut node = Node::general("Menu");
        let graph = GraphId::new();
        node.init_node(graph, [10.0, 20.0], 2, 3);

        assert_eq!(node.graph_id, Some(graph));
        assert_eq!(node.position, [10.0, 20.0]);
        assert_eq!(node.inputs().len(), 2);
        assert_eq!(node.outputs().len(), 3);
    }

    #[test]
    fn test_activation_is_idempotent() {
        let mut node = Node::new("Global", NodeKind::Global);
        let graph = GraphId::new();

        assert!(node.activate(graph));
        assert!(!node.activate(graph));
        assert_eq!(node.active_graph(), Some(graph));
        assert!(node.deactivate());
        assert!(!node.deactivate());
        assert!(!node.is_active());
    }

    #[test]
    fn test_duplicate_gets_fresh_identity() {
        let node = Node::general("Menu").with_position(5.0, 5.0).with_update();
        let copy = node.duplicate();

        assert_ne!(copy.id, node.id);
        assert_eq!(copy.name, node.name);
        assert!(copy.use_update);
        assert_eq!(copy.inputs().len(), node.inputs().len());
        assert_ne!(copy.inputs()[0].id, node.inputs()[0].id);
        assert!(copy.all_sockets().all(|s| s.node == copy.id && !s.is_connected()));
    }

    #[test]
    fn test_clone_keeps_identity() {
        let node = Node::general("Menu");
        let copy = node.clone();
        assert_eq!(copy.id, node.id);
        assert_eq!(copy.outputs()[0].id, node.outputs()[0].id);
    }

    #[test]
    fn test_kind_helpers() {
        let graph = GraphId::new();
        assert_eq!(NodeKind::SubGraph { graph }.sub_graph(), Some(graph));
        assert_eq!(NodeKind::General.sub_graph(), None);
        assert!(NodeKind::Enter.is_unique());
        assert!(!NodeKind::Global.is_unique());
        assert_eq!(NodeKind::Exit.name(), "Exit");
    }
}
