//! Thread-side search API, helper tasks and the worker main loop.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, trace};
use parking_lot::MutexGuard;

use crate::context::SearchContext;
use crate::coordinator::Shared;
use crate::error::{NodeError, SearchError};
use crate::kernel::SearchKernel;
use crate::node::{
    HelperLink, NewNode, NodeHandle, NodeInfo, NodeSummary, RecordOutcome, Window,
};
use crate::pool::Assignment;
use crate::stop::{StopSignal, StopState};
use crate::types::{Depth, Move, Score};

/// Result of [`SearchThread::search_node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeResult {
    pub best_move: Option<Move>,
    pub best_score: Score,
}

/// A search context bound to its coordinator, as seen by the kernel.
///
/// Kernels receive a `SearchThread` in [`SearchKernel::search_move`] and use
/// it to read and update the position (`ctx`), to poll for stops, and to
/// create and drive child nodes.
pub struct SearchThread<'a, K: SearchKernel> {
    pub(crate) shared: &'a Shared<K>,
    pub ctx: &'a mut SearchContext<K>,
    /// Context for a borrowed task; `None` while running one.
    spare: Option<&'a mut SearchContext<K>>,
}

impl<'a, K: SearchKernel> SearchThread<'a, K> {
    pub(crate) fn new(
        shared: &'a Shared<K>,
        ctx: &'a mut SearchContext<K>,
        spare: Option<&'a mut SearchContext<K>>,
    ) -> Self {
        Self { shared, ctx, spare }
    }

    pub fn kernel(&self) -> &'a K {
        &self.shared.kernel
    }

    /// Poll for a stop. Checks the search deadline every
    /// `time_poll_interval` calls and raises a timeout on the root.
    pub fn is_stopped(&mut self) -> bool {
        if self.ctx.poll_due(self.shared.config.time_poll_interval) {
            if let Some(deadline) = self.ctx.deadline {
                if Instant::now() >= deadline {
                    self.shared.root_signal().stop(StopState::StoppedByTimeout);
                }
            }
        }
        !self.ctx.signal.is_running()
    }

    pub fn stop_state(&self) -> StopState {
        self.ctx.signal.state()
    }

    /// Create a node for the current position of `ctx`. `parent` is `None`
    /// only for the root node.
    pub fn create_node(
        &mut self,
        alpha: Score,
        beta: Score,
        depth: Depth,
        moves: &[Move],
        parent: Option<NodeHandle>,
    ) -> Result<NodeHandle, NodeError> {
        self.shared.arena.create(NewNode {
            alpha,
            beta,
            depth,
            moves,
            parent,
            owner_thread: self.ctx.thread_id,
            owner_signal: &self.ctx.signal,
            borrowed: self.ctx.borrowed,
        })
    }

    pub fn first_move(&mut self, node: NodeHandle) -> Result<Option<Move>, NodeError> {
        self.shared.arena.first_move(node, &self.ctx.signal)
    }

    pub fn next_move(&mut self, node: NodeHandle) -> Result<Option<Move>, NodeError> {
        self.shared.arena.next_move(node, &self.ctx.signal)
    }

    pub fn record_result(
        &mut self,
        node: NodeHandle,
        mv: Move,
        score: Score,
    ) -> Result<RecordOutcome, NodeError> {
        let observer = self.shared.observer.read();
        let outcome =
            self.shared
                .arena
                .record_result(node, mv, score, &self.ctx.signal, observer.as_ref())?;
        if let RecordOutcome::Cutoff {
            helper_stopped: true,
        } = outcome
        {
            self.shared.stats.on_parallel_cutoff();
        }
        Ok(outcome)
    }

    pub fn window(&self, node: NodeHandle) -> Result<Window, NodeError> {
        self.shared.arena.window(node)
    }

    pub fn inspect(&self, node: NodeHandle) -> Result<NodeInfo, NodeError> {
        self.shared.arena.inspect(node)
    }

    /// Wait for the helper of `node`, if any.
    ///
    /// Stops the helper first when the node is already cut off or this
    /// thread is stopped. While waiting, a task borrowed for a descendant
    /// node is executed in the spare context. Returns without blocking when
    /// no helper is attached.
    pub fn join_helper(&mut self, node: NodeHandle) -> Result<(), NodeError> {
        let shared = self.shared;
        let (mut st, cond) = shared.arena.lock(node)?;
        if st.helper.is_live() {
            if st.alpha >= st.beta || !self.ctx.signal.is_running() {
                if let Some(helper) = st.helper.signal() {
                    helper.stop(StopState::StoppedByParallelCutoff);
                }
            }
            st.is_waiting = true;
            loop {
                if st.borrow_pending {
                    st.borrow_pending = false;
                    MutexGuard::unlocked(&mut st, || self.run_borrowed());
                    st.is_acting_as_helper = false;
                    continue;
                }
                if !st.helper.is_live() && !st.is_acting_as_helper {
                    break;
                }
                cond.wait(&mut st);
            }
            st.is_waiting = false;
        }
        self.ctx.nodes += std::mem::take(&mut st.helper_nodes);
        if st.stop_point {
            st.stop_point = false;
            self.ctx.signal.resume(st.height);
        }
        Ok(())
    }

    pub fn destroy_node(&mut self, node: NodeHandle) -> Result<NodeSummary, NodeError> {
        let summary = self.shared.arena.destroy(node)?;
        self.ctx.nodes += summary.helper_nodes;
        Ok(summary)
    }

    /// Search every move of a new node with the YBWC loop: the first move
    /// sequentially, the rest either here or on a helper, then join.
    pub fn search_node(
        &mut self,
        alpha: Score,
        beta: Score,
        depth: Depth,
        moves: &[Move],
        parent: Option<NodeHandle>,
    ) -> Result<NodeResult, SearchError> {
        let node = self.create_node(alpha, beta, depth, moves, parent)?;
        let driven = self.drive(node);
        let joined = self.join_helper(node);
        let summary = self.destroy_node(node);
        driven?;
        joined?;
        let summary = summary?;
        Ok(NodeResult {
            best_move: summary.best_move,
            best_score: summary.best_score,
        })
    }

    fn drive(&mut self, node: NodeHandle) -> Result<(), SearchError> {
        let shared = self.shared;
        let mut next = self.first_move(node)?;
        while let Some(mv) = next {
            if !self.try_split(node, mv)? {
                let w = shared.arena.window(node)?;
                let score = shared.kernel.search_move(self, mv, w.alpha, w.beta, w.depth, node)?;
                self.record_result(node, mv, score)?;
            }
            next = self.next_move(node)?;
        }
        Ok(())
    }

    /// Run the task waiting in this thread's mailbox, if any.
    fn run_borrowed(&mut self) {
        let shared = self.shared;
        let Some(spare) = self.spare.as_deref_mut() else {
            error!(
                "Borrowed task delivered to thread {} without a spare context",
                self.ctx.thread_id
            );
            return;
        };
        let assignment = shared.pool.slot(self.ctx.thread_id).mailbox.lock().take();
        if let Some(assignment) = assignment {
            run_assignment(shared, spare, None, assignment);
        }
    }

    /// Helper side of a split: keep taking moves of `node` until none remain.
    fn run_task(&mut self, node: NodeHandle, first: Move) -> Result<(), SearchError> {
        let shared = self.shared;
        shared.arena.mark_helper_running(node)?;
        let mut next = Some(first);
        while let Some(mv) = next {
            if self.is_stopped() {
                break;
            }
            let w = shared.arena.window(node)?;
            if w.alpha >= w.beta {
                break;
            }
            let score = shared.kernel.search_move(self, mv, w.alpha, w.beta, w.depth, node)?;
            self.record_result(node, mv, score)?;
            next = self.next_move(node)?;
        }
        Ok(())
    }
}

/// Execute one assignment in `ctx`, then hand the node back to its owner.
fn task_search<K: SearchKernel>(
    shared: &Shared<K>,
    ctx: &mut SearchContext<K>,
    spare: Option<&mut SearchContext<K>>,
    assignment: Assignment<K>,
) {
    let Assignment {
        node,
        first_move,
        snapshot,
        spawner,
    } = assignment;
    ctx.load(snapshot, Arc::clone(&spawner));
    let result = SearchThread::new(shared, ctx, spare).run_task(node, first_move);
    if let Err(e) = result {
        shared.report_failure(e);
    }
    release_node(shared, ctx, node, &spawner);
}

/// Detach the helper context from its spawner and clear the node's helper
/// link. The node may be destroyed by its owner right after this returns.
fn release_node<K: SearchKernel>(
    shared: &Shared<K>,
    ctx: &mut SearchContext<K>,
    node: NodeHandle,
    spawner: &Arc<StopSignal>,
) {
    spawner.detach(&ctx.signal);
    ctx.spawner = None;
    match shared.arena.lock(node) {
        Ok((mut st, cond)) => {
            st.helper_nodes += ctx.nodes;
            st.helper = HelperLink::None;
            cond.notify_all();
        }
        Err(e) => error!("Helper of thread {} lost its node: {e}", ctx.thread_id),
    }
    ctx.nodes = 0;
}

/// [`task_search`] with a panic guard: a panicking kernel must still hand
/// the node back, otherwise its owner waits forever.
fn run_assignment<K: SearchKernel>(
    shared: &Shared<K>,
    ctx: &mut SearchContext<K>,
    spare: Option<&mut SearchContext<K>>,
    assignment: Assignment<K>,
) {
    let node = assignment.node;
    let spawner = Arc::clone(&assignment.spawner);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        task_search(shared, &mut *ctx, spare, assignment)
    }));
    if outcome.is_err() {
        let id = ctx.thread_id;
        error!("Worker {id} panicked; requesting graceful stop");
        shared.report_failure(SearchError::WorkerPanicked { id });
        release_node(shared, ctx, node, &spawner);
    }
}

/// Main loop of a pooled worker thread.
pub(crate) fn slot_main_loop<K: SearchKernel>(shared: Arc<Shared<K>>, id: usize) {
    if shared.config.cpu_affinity {
        crate::affinity::pin_current_thread(id);
    }
    let slot = shared.pool.slot(id);
    let mut ctx = SearchContext::<K>::new(id, Arc::clone(&slot.signal), false);
    let mut spare = SearchContext::<K>::new(id, Arc::clone(&slot.borrow_signal), true);
    if log::log_enabled!(log::Level::Debug) {
        debug!("Worker {id} started");
    }
    while let Some(assignment) = shared.pool.wait_for_work(id) {
        trace!("Worker {id} running task");
        run_assignment(&shared, &mut ctx, Some(&mut spare), assignment);
        shared.pool.release(id);
    }
    if log::log_enabled!(log::Level::Debug) {
        debug!("Worker {id} exiting");
    }
}
