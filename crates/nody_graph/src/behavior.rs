// SPDX-License-Identifier: MIT OR Apache-2.0
//! Lifecycle hooks supplied by the host.

use crate::connection::ConnectionId;
use crate::error::Result;
use crate::graph::Graph;
use crate::node::NodeId;

/// Per-frame tick phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tick {
    /// Variable-rate frame update
    Update,
    /// Fixed-rate update
    FixedUpdate,
    /// Update after all frame updates ran
    LateUpdate,
}

impl Tick {
    /// Hook name, for logging
    pub fn name(self) -> &'static str {
        match self {
            Self::Update => "on_update",
            Self::FixedUpdate => "on_fixed_update",
            Self::LateUpdate => "on_late_update",
        }
    }
}

/// Hook table for node behavior.
///
/// The graph decides *when* a hook runs and with which neighbours; the
/// implementation decides *what* happens, usually by matching on the node's
/// kind or name. Every hook gets the graph the node lives in (a sub-graph
/// for nodes of a nested graph) and may call [`Graph::set_active_node`] on
/// it before returning.
pub trait NodeBehavior {
    /// The node became the active node
    fn on_enter(
        &mut self,
        graph: &mut Graph,
        node: NodeId,
        previous: Option<NodeId>,
        connection: Option<ConnectionId>,
    ) -> Result<()> {
        let _ = (graph, node, previous, connection);
        Ok(())
    }

    /// The node is about to stop being the active node
    fn on_exit(
        &mut self,
        graph: &mut Graph,
        node: NodeId,
        next: Option<NodeId>,
        connection: Option<ConnectionId>,
    ) -> Result<()> {
        let _ = (graph, node, next, connection);
        Ok(())
    }

    /// A tick reached a node that opted in to it
    fn on_tick(&mut self, graph: &mut Graph, node: NodeId, tick: Tick) -> Result<()> {
        match tick {
            Tick::Update => self.on_update(graph, node),
            Tick::FixedUpdate => self.on_fixed_update(graph, node),
            Tick::LateUpdate => self.on_late_update(graph, node),
        }
    }

    /// Frame update
    fn on_update(&mut self, graph: &mut Graph, node: NodeId) -> Result<()> {
        let _ = (graph, node);
        Ok(())
    }

    /// Fixed-rate update
    fn on_fixed_update(&mut self, graph: &mut Graph, node: NodeId) -> Result<()> {
        let _ = (graph, node);
        Ok(())
    }

    /// Late update
    fn on_late_update(&mut self, graph: &mut Graph, node: NodeId) -> Result<()> {
        let _ = (graph, node);
        Ok(())
    }

    /// A global node was switched on
    fn on_activate(&mut self, graph: &mut Graph, node: NodeId) -> Result<()> {
        let _ = (graph, node);
        Ok(())
    }

    /// A global node was switched off
    fn on_deactivate(&mut self, graph: &mut Graph, node: NodeId) -> Result<()> {
        let _ = (graph, node);
        Ok(())
    }
}

/// Behavior that does nothing; the graph still tracks state
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBehavior;

impl NodeBehavior for NoBehavior {}
