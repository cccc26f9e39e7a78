// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph state machine containing nodes and their sub-graphs.

use crate::behavior::{NodeBehavior, Tick};
use crate::connection::{Connection, ConnectionId};
use crate::error::{GraphError, Result};
use crate::loop_guard::{Clock, LoopGuard};
use crate::node::{Node, NodeId, NodeKind};
use crate::settings::GraphSettings;
use crate::socket::{Socket, SocketDirection, SocketId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphId(pub Uuid);

impl GraphId {
    /// Create a new random graph ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GraphId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A node graph run as a state machine.
///
/// At most one node is active at a time. Global nodes are switched on and
/// off as a group and tick alongside the active node. A `SubGraph` node
/// runs one of the graph's nested instances while it is active.
///
/// Runtime state (active pointers, activation, loop guard) is not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    /// Unique graph ID
    pub id: GraphId,
    /// Graph name
    pub name: String,
    /// Whether this graph runs inside a `SubGraph` node
    pub is_sub_graph: bool,
    /// Disabled graphs ignore ticks
    pub enabled: bool,
    /// Nodes in the graph
    nodes: IndexMap<NodeId, Node>,
    /// Nested graph instances, referenced by `SubGraph` nodes
    sub_graphs: IndexMap<GraphId, Graph>,
    #[serde(skip)]
    active_node: Option<NodeId>,
    #[serde(skip)]
    previous_active_node: Option<NodeId>,
    #[serde(skip)]
    active_sub_graph: Option<GraphId>,
    /// Global nodes currently switched on, in activation order
    #[serde(skip)]
    global_nodes: Vec<NodeId>,
    /// Set when an `Exit` node is entered, cleared when the parent resumes
    #[serde(skip)]
    exit_reached: bool,
    #[serde(skip)]
    loop_guard: LoopGuard,
}

impl Graph {
    /// Create a new empty top-level graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: GraphId::new(),
            name: name.into(),
            is_sub_graph: false,
            enabled: true,
            nodes: IndexMap::new(),
            sub_graphs: IndexMap::new(),
            active_node: None,
            previous_active_node: None,
            active_sub_graph: None,
            global_nodes: Vec::new(),
            exit_reached: false,
            loop_guard: LoopGuard::default(),
        }
    }

    /// Create a new empty sub-graph
    pub fn new_sub_graph(name: impl Into<String>) -> Self {
        Self {
            is_sub_graph: true,
            ..Self::new(name)
        }
    }

    /// Apply runtime settings
    pub fn with_settings(mut self, settings: &GraphSettings) -> Self {
        self.enabled = settings.enabled;
        self.loop_guard.set_window(settings.loop_window());
        self
    }

    /// Use a different clock for loop detection, here and in all sub-graphs
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.set_clock(clock);
        self
    }

    /// Replace the loop guard clock, here and in all sub-graphs
    pub fn set_clock(&mut self, clock: Arc<dyn Clock>) {
        for sub in self.sub_graphs.values_mut() {
            sub.set_clock(Arc::clone(&clock));
        }
        self.loop_guard.set_clock(clock);
    }

    /// The loop guard
    pub fn loop_guard(&self) -> &LoopGuard {
        &self.loop_guard
    }

    // ---- Nodes ----

    /// Add a node to the graph.
    ///
    /// Returns `None` when the node would break the graph's shape: a
    /// duplicate ID, a `Start` node in a sub-graph, an `Enter`/`Exit` node
    /// in a top-level graph, or a second node of a unique kind.
    pub fn add_node(&mut self, mut node: Node) -> Option<NodeId> {
        if self.nodes.contains_key(&node.id) {
            return None;
        }

        let fits = match node.kind {
            NodeKind::Start => !self.is_sub_graph,
            NodeKind::Enter | NodeKind::Exit => self.is_sub_graph,
            NodeKind::General | NodeKind::Global | NodeKind::SubGraph { .. } => true,
        };
        if !fits || (node.kind.is_unique() && self.node_of_kind(node.kind).is_some()) {
            tracing::debug!(
                "Graph '{}' refused {} node '{}'",
                self.name,
                node.kind.name(),
                node.name
            );
            return None;
        }

        // Connections and activation belong to the graph the node came from
        let dropped = node.disconnect();
        if !dropped.is_empty() {
            tracing::debug!(
                "Graph '{}': dropped {} foreign connection(s) of '{}'",
                self.name,
                dropped.len(),
                node.name
            );
        }
        node.deactivate();
        node.set_active_graph(None);

        node.graph_id = Some(self.id);
        let id = node.id;
        self.nodes.insert(id, node);
        Some(id)
    }

    /// Remove a node, clearing its connections on both ends.
    ///
    /// Removing the node that runs a sub-graph parks that sub-graph and
    /// switches its globals off without calling any hooks.
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let mut node = self.nodes.shift_remove(&node_id)?;
        node.disconnect();
        for other in self.nodes.values_mut() {
            other.disconnect_from_node(node_id);
        }

        if self.active_node == Some(node_id) {
            self.active_node = None;
        }
        if self.previous_active_node == Some(node_id) {
            self.previous_active_node = None;
        }
        self.global_nodes.retain(|id| *id != node_id);
        if let Some(graph_id) = node.kind.sub_graph() {
            if self.active_sub_graph == Some(graph_id) {
                self.active_sub_graph = None;
                if let Some(sub) = self.sub_graphs.get_mut(&graph_id) {
                    sub.park();
                }
            }
        }
        Some(node)
    }

    /// Stop without hooks: globals off, no active node, nested graphs too
    fn park(&mut self) {
        if let Some(graph_id) = self.active_sub_graph.take() {
            if let Some(sub) = self.sub_graphs.get_mut(&graph_id) {
                sub.park();
            }
        }
        for id in std::mem::take(&mut self.global_nodes) {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.deactivate();
            }
        }
        if let Some(node) = self.active_node.take().and_then(|id| self.nodes.get_mut(&id)) {
            node.set_active_graph(None);
        }
        self.previous_active_node = None;
        self.exit_reached = false;
        tracing::debug!("Graph '{}' parked without hooks", self.name);
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Get the first node with the given name
    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.values().find(|n| n.name == name)
    }

    /// Check if the graph contains a node
    pub fn contains_node(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// Check if the graph contains a node with the given name
    pub fn contains_node_name(&self, name: &str) -> bool {
        self.node_by_name(name).is_some()
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn node_of_kind(&self, kind: NodeKind) -> Option<&Node> {
        self.nodes.values().find(|n| n.kind == kind)
    }

    /// The `Start` node
    pub fn start_node(&self) -> Option<&Node> {
        self.node_of_kind(NodeKind::Start)
    }

    /// The `Enter` node
    pub fn enter_node(&self) -> Option<&Node> {
        self.node_of_kind(NodeKind::Enter)
    }

    /// The `Exit` node
    pub fn exit_node(&self) -> Option<&Node> {
        self.node_of_kind(NodeKind::Exit)
    }

    /// The initial state: `Enter` for sub-graphs, `Start` otherwise
    pub fn start_or_enter_node(&self) -> Option<&Node> {
        if self.is_sub_graph {
            self.enter_node()
        } else {
            self.start_node()
        }
    }

    /// All nodes of `Global` kind
    pub fn global_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(|n| n.kind == NodeKind::Global)
    }

    /// Global nodes currently switched on
    pub fn active_global_nodes(&self) -> &[NodeId] {
        &self.global_nodes
    }

    // ---- Sockets and connections ----

    /// Get a socket by ID from any node
    pub fn socket(&self, socket_id: SocketId) -> Option<&Socket> {
        self.nodes.values().find_map(|n| n.socket(socket_id))
    }

    /// Get a mutable socket by ID from any node
    pub fn socket_mut(&mut self, socket_id: SocketId) -> Option<&mut Socket> {
        self.nodes.values_mut().find_map(|n| n.socket_mut(socket_id))
    }

    /// Get a connection by ID
    pub fn connection(&self, connection_id: ConnectionId) -> Option<&Connection> {
        self.connections().find(|c| c.id == connection_id)
    }

    /// Get all connections, once each
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.nodes
            .values()
            .flat_map(Node::outputs)
            .flat_map(Socket::connections)
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections().count()
    }

    /// Check if two sockets of this graph may be connected
    pub fn can_connect(&self, a: SocketId, b: SocketId, ignore_value_type: bool) -> bool {
        self.socket(a)
            .is_some_and(|socket| socket.can_connect(self.socket(b), ignore_value_type))
    }

    /// Connect two sockets, in either order.
    ///
    /// Returns `None` if [`Graph::can_connect`] refuses. An `Override`
    /// socket on either side loses its previous connection first, on both
    /// of that connection's ends.
    pub fn connect(
        &mut self,
        a: SocketId,
        b: SocketId,
        ignore_value_type: bool,
    ) -> Option<ConnectionId> {
        let first = self.socket(a)?;
        let second = self.socket(b);
        if !first.can_connect(second, ignore_value_type) {
            return None;
        }
        let connection = Connection::new(first, second?);

        for socket_id in [a, b] {
            if self.socket(socket_id).is_some_and(Socket::is_override) {
                self.disconnect_socket(socket_id);
            }
        }

        self.socket_mut(connection.output_socket)?
            .add_connection(connection.clone());
        self.socket_mut(connection.input_socket)?
            .add_connection(connection.clone());

        tracing::debug!(
            "Graph '{}': connected {} -> {}",
            self.name,
            self.node_name(connection.output_node),
            self.node_name(connection.input_node)
        );
        Some(connection.id)
    }

    /// Remove a connection from both of its sockets
    pub fn remove_connection(&mut self, connection_id: ConnectionId) -> Option<Connection> {
        let mut removed = None;
        for node in self.nodes.values_mut() {
            if let Some(connection) = node.remove_connection(connection_id) {
                removed = Some(connection);
            }
        }
        removed
    }

    /// Clear a socket's connections on both ends
    pub fn disconnect_socket(&mut self, socket_id: SocketId) -> Vec<Connection> {
        let removed = self
            .socket_mut(socket_id)
            .map(Socket::disconnect)
            .unwrap_or_default();
        self.clear_far_ends(socket_id, &removed);
        removed
    }

    /// Delete a socket if its node allows it, clearing its connections
    pub fn delete_socket(&mut self, socket_id: SocketId) -> bool {
        let Some(node) = self.nodes.values_mut().find(|n| n.contains_socket(socket_id)) else {
            return false;
        };
        let Some(socket) = node.remove_socket(socket_id) else {
            return false;
        };
        self.clear_far_ends(socket_id, socket.connections());
        true
    }

    fn clear_far_ends(&mut self, socket_id: SocketId, connections: &[Connection]) {
        for connection in connections {
            if let Some(far) = connection.other_socket(socket_id) {
                if let Some(socket) = self.socket_mut(far) {
                    socket.remove_connection(connection.id);
                }
            }
        }
    }

    /// The node and connection reached by following an output socket
    pub fn next_node_through(&self, socket_id: SocketId) -> Option<(NodeId, ConnectionId)> {
        let socket = self.socket(socket_id)?;
        if socket.direction != SocketDirection::Output {
            return None;
        }
        socket
            .first_connection()
            .map(|connection| (connection.input_node, connection.id))
    }

    // ---- Sub-graphs ----

    /// Add a nested graph instance; `SubGraph` nodes refer to it by ID
    pub fn add_sub_graph(&mut self, mut graph: Graph) -> GraphId {
        graph.is_sub_graph = true;
        graph.set_clock(self.loop_guard.clock());
        let id = graph.id;
        self.sub_graphs.insert(id, graph);
        id
    }

    /// Get a nested graph by ID
    pub fn sub_graph(&self, graph_id: GraphId) -> Option<&Graph> {
        self.sub_graphs.get(&graph_id)
    }

    /// Get a mutable nested graph by ID
    pub fn sub_graph_mut(&mut self, graph_id: GraphId) -> Option<&mut Graph> {
        self.sub_graphs.get_mut(&graph_id)
    }

    /// The nested graph currently running
    pub fn active_sub_graph(&self) -> Option<&Graph> {
        self.active_sub_graph.and_then(|id| self.sub_graphs.get(&id))
    }

    // ---- State machine ----

    /// The active node
    pub fn active_node(&self) -> Option<NodeId> {
        self.active_node
    }

    /// The node that was active before the last transition
    pub fn previous_active_node(&self) -> Option<NodeId> {
        self.previous_active_node
    }

    /// Check if an `Exit` node was entered since the graph last started
    pub fn exit_reached(&self) -> bool {
        self.exit_reached
    }

    fn take_exit_reached(&mut self) -> bool {
        std::mem::take(&mut self.exit_reached)
    }

    fn node_name(&self, node_id: NodeId) -> String {
        self.nodes
            .get(&node_id)
            .map_or_else(|| node_id.to_string(), |n| n.name.clone())
    }

    /// Make the `Start` (or `Enter`) node active.
    ///
    /// There is no previous node: no `on_exit` runs and the loop guard is
    /// not consulted. The node's `on_enter` gets neither a previous node nor
    /// a connection.
    pub fn activate_start_or_enter_node(&mut self, behavior: &mut dyn NodeBehavior) -> Result<()> {
        let Some(node_id) = self.start_or_enter_node().map(|n| n.id) else {
            tracing::warn!(
                "Graph '{}' has no {} node",
                self.name,
                if self.is_sub_graph { "Enter" } else { "Start" }
            );
            return Ok(());
        };

        self.exit_reached = false;
        self.active_node = Some(node_id);
        let graph_id = self.id;
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.set_active_graph(Some(graph_id));
        }

        tracing::debug!("Graph '{}' started at '{}'", self.name, self.node_name(node_id));
        behavior.on_enter(self, node_id, None, None)
    }

    /// Transition to `next`, or park the graph with `None`.
    ///
    /// The current node's `on_exit` runs first, then the loop guard is
    /// consulted. If `next` was already activated inside the guard window
    /// the transition is abandoned with [`GraphError::InfiniteLoop`] and the
    /// active node is left unchanged. Otherwise `next` becomes active;
    /// entering an `Exit` node switches off the global nodes before the
    /// node's `on_enter` runs.
    ///
    /// Hooks may start another transition before this one returns. A node
    /// ID that is not part of the graph is ignored.
    pub fn set_active_node(
        &mut self,
        next: Option<NodeId>,
        connection: Option<ConnectionId>,
        behavior: &mut dyn NodeBehavior,
    ) -> Result<()> {
        if let Some(next_id) = next {
            if !self.nodes.contains_key(&next_id) {
                tracing::warn!("Graph '{}' has no node {}", self.name, next_id);
                return Ok(());
            }
        }

        if let Some(current) = self.active_node {
            behavior.on_exit(self, current, next, connection)?;
            if let Some(node) = self.nodes.get_mut(&current) {
                node.set_active_graph(None);
            }
            self.leave_sub_graph(current, behavior)?;
        }

        self.previous_active_node = self.active_node;

        if let Some(next_id) = next {
            if self.loop_guard.check(next_id) {
                let err = GraphError::InfiniteLoop {
                    graph: self.name.clone(),
                    node: self.node_name(next_id),
                    previous: self.previous_active_node.map(|id| self.node_name(id)),
                    connection,
                };
                tracing::error!("{}", err);
                return Err(err);
            }
        }

        self.active_node = next;
        let Some(next_id) = next else {
            tracing::debug!("Graph '{}' parked", self.name);
            return Ok(());
        };
        let Some(kind) = self.nodes.get(&next_id).map(|n| n.kind) else {
            // Removed by a hook while exiting
            self.active_node = None;
            return Ok(());
        };

        if kind == NodeKind::Exit {
            self.exit_reached = true;
            self.deactivate_global_nodes(behavior)?;
        }

        let graph_id = self.id;
        if let Some(node) = self.nodes.get_mut(&next_id) {
            node.set_active_graph(Some(graph_id));
        }

        tracing::debug!(
            "Graph '{}': {} -> {}",
            self.name,
            self.previous_active_node
                .map_or_else(|| "none".to_string(), |id| self.node_name(id)),
            self.node_name(next_id)
        );
        behavior.on_enter(self, next_id, self.previous_active_node, connection)?;

        if let NodeKind::SubGraph { graph } = kind {
            if self.active_node == Some(next_id) {
                self.enter_sub_graph(graph, behavior)?;
            }
        }
        Ok(())
    }

    /// Follow the first connection out of an output socket.
    ///
    /// Returns `Ok(false)` when the socket has nowhere to go.
    pub fn go_to_next_node(
        &mut self,
        socket_id: SocketId,
        behavior: &mut dyn NodeBehavior,
    ) -> Result<bool> {
        let Some((node, connection)) = self.next_node_through(socket_id) else {
            return Ok(false);
        };
        self.set_active_node(Some(node), Some(connection), behavior)?;
        Ok(true)
    }

    fn enter_sub_graph(&mut self, graph_id: GraphId, behavior: &mut dyn NodeBehavior) -> Result<()> {
        let Some(sub) = self.sub_graphs.get_mut(&graph_id) else {
            tracing::warn!("Graph '{}' has no sub-graph {}", self.name, graph_id);
            return Ok(());
        };

        tracing::debug!("Graph '{}' entering sub-graph '{}'", self.name, sub.name);
        // Set before any nested hook runs
        self.active_sub_graph = Some(graph_id);
        sub.activate_global_nodes(behavior)?;
        sub.activate_start_or_enter_node(behavior)?;
        self.resume_after_sub_graph(behavior)
    }

    fn leave_sub_graph(&mut self, node_id: NodeId, behavior: &mut dyn NodeBehavior) -> Result<()> {
        let owned = self.nodes.get(&node_id).and_then(|n| n.kind.sub_graph());
        let Some(graph_id) = owned.filter(|id| self.active_sub_graph == Some(*id)) else {
            return Ok(());
        };

        self.active_sub_graph = None;
        if let Some(sub) = self.sub_graphs.get_mut(&graph_id) {
            tracing::debug!("Graph '{}' leaving sub-graph '{}'", self.name, sub.name);
            sub.deactivate_global_nodes(behavior)?;
            sub.set_active_node(None, None, behavior)?;
            sub.exit_reached = false;
        }
        Ok(())
    }

    /// Continue past the `SubGraph` node once its graph reached `Exit`
    fn resume_after_sub_graph(&mut self, behavior: &mut dyn NodeBehavior) -> Result<()> {
        let Some(graph_id) = self.active_sub_graph else {
            return Ok(());
        };
        let finished = self
            .sub_graphs
            .get_mut(&graph_id)
            .is_some_and(Graph::take_exit_reached);
        if !finished {
            return Ok(());
        }

        let next = self
            .active_node
            .and_then(|id| self.nodes.get(&id))
            .filter(|n| n.kind.sub_graph() == Some(graph_id))
            .and_then(Node::first_output)
            .and_then(Socket::first_connection)
            .map(|c| (c.input_node, c.id));

        match next {
            Some((node, connection)) => self.set_active_node(Some(node), Some(connection), behavior),
            None => {
                tracing::debug!("Graph '{}': sub-graph finished with nowhere to go", self.name);
                Ok(())
            }
        }
    }

    /// Switch on every `Global` node that is not already on
    pub fn activate_global_nodes(&mut self, behavior: &mut dyn NodeBehavior) -> Result<()> {
        let ids: Vec<NodeId> = self.global_nodes().map(|n| n.id).collect();
        let graph_id = self.id;
        for id in ids {
            let switched = self.nodes.get_mut(&id).is_some_and(|n| n.activate(graph_id));
            if switched {
                self.global_nodes.push(id);
                tracing::debug!("Graph '{}': global '{}' on", self.name, self.node_name(id));
                behavior.on_activate(self, id)?;
            }
        }
        Ok(())
    }

    /// Switch off every `Global` node, starting with the running sub-graph
    pub fn deactivate_global_nodes(&mut self, behavior: &mut dyn NodeBehavior) -> Result<()> {
        if let Some(graph_id) = self.active_sub_graph {
            if let Some(sub) = self.sub_graphs.get_mut(&graph_id) {
                sub.deactivate_global_nodes(behavior)?;
            }
        }

        let ids: Vec<NodeId> = self.global_nodes().map(|n| n.id).collect();
        for id in ids {
            let switched = self.nodes.get_mut(&id).is_some_and(Node::deactivate);
            if switched {
                self.global_nodes.retain(|g| *g != id);
                tracing::debug!("Graph '{}': global '{}' off", self.name, self.node_name(id));
                behavior.on_deactivate(self, id)?;
            }
        }
        Ok(())
    }

    /// Run one tick phase: active node, running sub-graph, then global nodes
    pub fn tick(&mut self, tick: Tick, behavior: &mut dyn NodeBehavior) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if let Some(active) = self.active_node {
            if self.nodes.get(&active).is_some_and(|n| n.uses(tick)) {
                tracing::trace!("Graph '{}': {} '{}'", self.name, tick.name(), self.node_name(active));
                behavior.on_tick(self, active, tick)?;
            }
        }

        if let Some(graph_id) = self.active_sub_graph {
            if let Some(sub) = self.sub_graphs.get_mut(&graph_id) {
                sub.tick(tick, behavior)?;
            }
            self.resume_after_sub_graph(behavior)?;
        }

        let globals = self.global_nodes.clone();
        for id in globals {
            if self.nodes.get(&id).is_some_and(|n| n.is_active() && n.uses(tick)) {
                behavior.on_tick(self, id, tick)?;
            }
        }
        Ok(())
    }

    /// Frame update
    pub fn update(&mut self, behavior: &mut dyn NodeBehavior) -> Result<()> {
        self.tick(Tick::Update, behavior)
    }

    /// Fixed-rate update
    pub fn fixed_update(&mut self, behavior: &mut dyn NodeBehavior) -> Result<()> {
        self.tick(Tick::FixedUpdate, behavior)
    }

    /// Late update
    pub fn late_update(&mut self, behavior: &mut dyn NodeBehavior) -> Result<()> {
        self.tick(Tick::LateUpdate, behavior)
    }

    // ---- Persistence ----

    /// Serialize to RON
    pub fn to_ron(&self) -> Result<String> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Deserialize from RON
    pub fn from_ron(s: &str) -> Result<Self> {
        Ok(ron::from_str(s)?)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}
