// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runtime detection of zero-duration transition cycles.
//!
//! The guard keeps a rolling window of real time. Every node activated
//! inside the window is remembered; activating one of them again before the
//! window rolls over is reported as a loop. Slow cycles pass, and so would
//! a legitimate sequence that revisits a node within the window.

use crate::node::NodeId;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// Default length of the detection window
pub const DEFAULT_LOOP_WINDOW: Duration = Duration::from_millis(100);

/// Monotonic time source for the loop guard
pub trait Clock: fmt::Debug + Send + Sync {
    /// Time elapsed since an arbitrary, fixed origin
    fn now(&self) -> Duration;
}

/// Unscaled wall-clock time since the first read in this process
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        static ORIGIN: OnceLock<Instant> = OnceLock::new();
        ORIGIN.get_or_init(Instant::now).elapsed()
    }
}

/// Hand-driven clock, shared between clones
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock reading zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(nanos, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Relaxed))
    }
}

/// Rolling-window loop detector owned by a graph
#[derive(Debug, Clone)]
pub struct LoopGuard {
    clock: Arc<dyn Clock>,
    window: Duration,
    window_start: Option<Duration>,
    history: Vec<NodeId>,
}

impl LoopGuard {
    /// Create a guard with the given window length
    pub fn new(window: Duration) -> Self {
        Self {
            clock: Arc::new(SystemClock),
            window,
            window_start: None,
            history: Vec::new(),
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.set_clock(clock);
        self
    }

    /// Replace the time source and forget the current window
    pub fn set_clock(&mut self, clock: Arc<dyn Clock>) {
        self.clock = clock;
        self.reset();
    }

    /// The time source
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Window length
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Change the window length
    pub fn set_window(&mut self, window: Duration) {
        self.window = window;
    }

    /// Nodes activated in the current window, oldest first
    pub fn history(&self) -> &[NodeId] {
        &self.history
    }

    /// Forget the current window
    pub fn reset(&mut self) {
        self.window_start = None;
        self.history.clear();
    }

    /// Record an activation of `node`.
    ///
    /// Returns `true` when `node` was already activated in the current
    /// window; the history is left unchanged in that case.
    pub fn check(&mut self, node: NodeId) -> bool {
        let now = self.clock.now();
        let expired = match self.window_start {
            Some(start) => now.saturating_sub(start) >= self.window,
            None => true,
        };

        if expired {
            self.window_start = Some(now);
            self.history.clear();
        }

        if self.history.contains(&node) {
            return true;
        }

        self.history.push(node);
        false
    }
}

impl Default for LoopGuard {
    fn default() -> Self {
        Self::new(DEFAULT_LOOP_WINDOW)
    }
}
