// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node graph state machine for scripting UI flow.
//!
//! Every node in a [`Graph`] is a state. One node per graph is active at a
//! time; a host driver starts the graph once and then ticks it every frame,
//! while node behaviors move the graph along by following connections.
//!
//! ## Architecture
//!
//! The model is an arena of IDs rather than a web of references:
//! - A [`Graph`] owns its [`Node`]s and any nested sub-graph instances
//! - A [`Node`] owns its input/output [`Socket`]s
//! - A [`Socket`] owns its half of every [`Connection`]
//! - All cross-links are UUID-based IDs, so graphs serialize without cycles
//!
//! Node behavior is supplied by the host through the [`NodeBehavior`] hook
//! table. Hooks receive the graph mutably and may start another transition
//! before they return; the [`LoopGuard`] catches zero-duration cycles.

pub mod behavior;
pub mod connection;
pub mod error;
pub mod graph;
pub mod loop_guard;
pub mod node;
pub mod settings;
pub mod socket;

pub use behavior::{NoBehavior, NodeBehavior, Tick};
pub use connection::{Connection, ConnectionId};
pub use error::{GraphError, Result};
pub use graph::{Graph, GraphId};
pub use loop_guard::{Clock, LoopGuard, ManualClock, SystemClock};
pub use node::{Node, NodeId, NodeKind};
pub use settings::GraphSettings;
pub use socket::{ConnectionMode, Socket, SocketDirection, SocketId, ValueType};
