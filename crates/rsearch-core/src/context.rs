//! Per-thread search context.

use std::sync::Arc;
use std::time::Instant;

use crate::kernel::SearchKernel;
use crate::stop::{StopSignal, StopState};

/// One thread's private view of the search.
///
/// Contexts are created when the coordinator starts (the master's, one per
/// worker slot, plus one spare per thread for borrowed tasks) and reused for
/// every task. Exactly one context is active on a thread at any time.
pub struct SearchContext<K: SearchKernel> {
    pub position: K::Position,
    pub eval: K::Evaluator,
    /// Nodes visited by this context, including those merged from joined
    /// helpers.
    pub nodes: u64,
    pub(crate) signal: Arc<StopSignal>,
    /// Signal of the spawning context; `None` for the root context.
    pub(crate) spawner: Option<Arc<StopSignal>>,
    pub(crate) thread_id: usize,
    pub(crate) borrowed: bool,
    pub(crate) deadline: Option<Instant>,
    poll_countdown: u32,
}

/// Copy of the parts of a context a helper needs to continue from a node.
pub(crate) struct ContextSnapshot<K: SearchKernel> {
    position: K::Position,
    eval: K::Evaluator,
    deadline: Option<Instant>,
}

impl<K: SearchKernel> SearchContext<K> {
    pub(crate) fn new(thread_id: usize, signal: Arc<StopSignal>, borrowed: bool) -> Self {
        Self {
            position: K::Position::default(),
            eval: K::Evaluator::default(),
            nodes: 0,
            signal,
            spawner: None,
            thread_id,
            borrowed,
            deadline: None,
            poll_countdown: 0,
        }
    }

    #[inline]
    pub fn thread_id(&self) -> usize {
        self.thread_id
    }

    #[inline]
    pub fn stop_state(&self) -> StopState {
        self.signal.state()
    }

    /// Whether this context runs a task borrowed while its thread waits.
    #[inline]
    pub fn is_borrowed(&self) -> bool {
        self.borrowed
    }

    pub(crate) fn snapshot(&self) -> ContextSnapshot<K> {
        ContextSnapshot {
            position: self.position.clone(),
            eval: self.eval.clone(),
            deadline: self.deadline,
        }
    }

    /// Prepare a worker context for an assigned task. The signal was already
    /// attached to `spawner` by the splitting thread.
    pub(crate) fn load(&mut self, snapshot: ContextSnapshot<K>, spawner: Arc<StopSignal>) {
        self.position = snapshot.position;
        self.eval = snapshot.eval;
        self.deadline = snapshot.deadline;
        self.spawner = Some(spawner);
        self.nodes = 0;
        self.poll_countdown = 0;
    }

    /// Prepare the master context for a root search.
    pub(crate) fn start_root(&mut self, position: K::Position, deadline: Option<Instant>) {
        self.signal.reset();
        self.position = position;
        self.eval = K::Evaluator::default();
        self.deadline = deadline;
        self.spawner = None;
        self.nodes = 0;
        self.poll_countdown = 0;
    }

    /// Count down to the next deadline check. Returns `true` when the
    /// deadline should be checked now.
    #[inline]
    pub(crate) fn poll_due(&mut self, interval: u32) -> bool {
        if self.deadline.is_none() {
            return false;
        }
        if self.poll_countdown == 0 {
            self.poll_countdown = interval;
            true
        } else {
            self.poll_countdown -= 1;
            false
        }
    }
}
