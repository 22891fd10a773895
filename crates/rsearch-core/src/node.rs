//! Shared search nodes.
//!
//! A node is created when a context enters an internal position and
//! destroyed when it leaves it. After a split the node's move list is shared
//! by its owner and one helper, so every field lives behind the slot's mutex.
//! Nodes are stored in a fixed [`NodeArena`] and addressed by generation
//! checked [`NodeHandle`]s, so a handle that outlives its node is detected
//! instead of silently reading a reused slot.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::queue::ArrayQueue;
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::NodeError;
use crate::kernel::{RootObserver, RootUpdate};
use crate::stop::{StopSignal, StopState};
use crate::types::{Depth, Move, SCORE_INF, Score};

/// Handle to a live node of a [`NodeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    index: u32,
    generation: u32,
}

impl NodeHandle {
    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }
}

/// Lifecycle of a node's helper link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelperPhase {
    NoHelper,
    Assigned,
    Running,
}

/// Link from a node to the stop signal of its live helper.
#[derive(Default)]
pub(crate) enum HelperLink {
    #[default]
    None,
    Assigned(Arc<StopSignal>),
    Running(Arc<StopSignal>),
}

impl HelperLink {
    #[inline]
    pub(crate) fn is_live(&self) -> bool {
        !matches!(self, HelperLink::None)
    }

    pub(crate) fn signal(&self) -> Option<&Arc<StopSignal>> {
        match self {
            HelperLink::None => None,
            HelperLink::Assigned(sig) | HelperLink::Running(sig) => Some(sig),
        }
    }

    pub(crate) fn phase(&self) -> HelperPhase {
        match self {
            HelperLink::None => HelperPhase::NoHelper,
            HelperLink::Assigned(_) => HelperPhase::Assigned,
            HelperLink::Running(_) => HelperPhase::Running,
        }
    }
}

pub(crate) struct NodeState {
    generation: u32,
    live: bool,
    started: bool,
    pub(crate) alpha: Score,
    pub(crate) beta: Score,
    pub(crate) depth: Depth,
    pub(crate) height: usize,
    best_move: Option<Move>,
    best_score: Score,
    moves: Vec<Move>,
    cursor: usize,
    pub(crate) n_done: usize,
    pub(crate) n_todo: usize,
    pub(crate) helper: HelperLink,
    /// Owner is blocked in `join_helper` on this node.
    pub(crate) is_waiting: bool,
    /// A borrowed task is reserved for the waiting owner of this node.
    pub(crate) is_acting_as_helper: bool,
    /// Node of a borrowed task; its owner never lends itself again.
    pub(crate) borrowed: bool,
    /// A borrowed task was posted to the owner's mailbox and not yet taken.
    pub(crate) borrow_pending: bool,
    /// This node paused its owner's context on a parallel cutoff.
    pub(crate) stop_point: bool,
    pub(crate) parent: Option<NodeHandle>,
    pub(crate) owner_thread: usize,
    owner_signal: Option<Arc<StopSignal>>,
    /// Node counts merged back by finished helpers.
    pub(crate) helper_nodes: u64,
}

impl NodeState {
    fn vacant() -> Self {
        Self {
            generation: 1,
            live: false,
            started: false,
            alpha: -SCORE_INF,
            beta: SCORE_INF,
            depth: 0,
            height: 0,
            best_move: None,
            best_score: -SCORE_INF,
            moves: Vec::new(),
            cursor: 0,
            n_done: 0,
            n_todo: 0,
            helper: HelperLink::None,
            is_waiting: false,
            is_acting_as_helper: false,
            borrowed: false,
            borrow_pending: false,
            stop_point: false,
            parent: None,
            owner_thread: 0,
            owner_signal: None,
            helper_nodes: 0,
        }
    }
}

pub(crate) struct NodeSlot {
    state: Mutex<NodeState>,
    pub(crate) cond: Condvar,
    /// Mirror of `alpha >= beta` for the unlocked fast path of `next_move`.
    cutoff: AtomicBool,
}

/// Parameters of [`NodeArena::create`].
pub(crate) struct NewNode<'a> {
    pub alpha: Score,
    pub beta: Score,
    pub depth: Depth,
    pub moves: &'a [Move],
    pub parent: Option<NodeHandle>,
    pub owner_thread: usize,
    pub owner_signal: &'a Arc<StopSignal>,
    /// Created inside a borrowed task; such nodes never lend their owner.
    pub borrowed: bool,
}

/// Search window of a node as seen at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub alpha: Score,
    pub beta: Score,
    pub depth: Depth,
}

/// Effect of [`NodeArena::record_result`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Stopped caller, closed node, or no improvement.
    Ignored,
    Improved,
    /// Improved and closed the node (alpha >= beta). `helper_stopped` is set
    /// when a live helper had to be stopped.
    Cutoff { helper_stopped: bool },
}

impl RecordOutcome {
    #[inline]
    pub fn improved(self) -> bool {
        !matches!(self, RecordOutcome::Ignored)
    }
}

/// Final values of a destroyed node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeSummary {
    pub best_move: Option<Move>,
    pub best_score: Score,
    pub helper_nodes: u64,
}

/// Point-in-time copy of a node's state, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub alpha: Score,
    pub beta: Score,
    pub depth: Depth,
    pub height: usize,
    pub best_move: Option<Move>,
    pub best_score: Score,
    pub n_moves: usize,
    pub n_done: usize,
    pub n_todo: usize,
    pub helper: HelperPhase,
    pub is_waiting: bool,
    pub is_acting_as_helper: bool,
    pub stop_point: bool,
    pub parent: Option<NodeHandle>,
    pub owner_thread: usize,
}

pub struct NodeArena {
    slots: Box<[NodeSlot]>,
    free: ArrayQueue<u32>,
    max_height: usize,
}

impl NodeArena {
    pub(crate) fn new(capacity: usize, max_height: usize) -> Self {
        let capacity = capacity.max(1);
        let slots: Box<[NodeSlot]> = (0..capacity)
            .map(|_| NodeSlot {
                state: Mutex::new(NodeState::vacant()),
                cond: Condvar::new(),
                cutoff: AtomicBool::new(false),
            })
            .collect();
        let free = ArrayQueue::new(capacity);
        for index in 0..capacity as u32 {
            let _ = free.push(index);
        }
        Self {
            slots,
            free,
            max_height,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live nodes.
    pub fn in_use(&self) -> usize {
        self.capacity() - self.free.len()
    }

    fn slot(&self, h: NodeHandle) -> Result<&NodeSlot, NodeError> {
        self.slots.get(h.index()).ok_or(NodeError::InvalidHandle(h))
    }

    fn lock_slot<'a>(
        &self,
        slot: &'a NodeSlot,
        h: NodeHandle,
    ) -> Result<MutexGuard<'a, NodeState>, NodeError> {
        let st = slot.state.lock();
        if !st.live || st.generation != h.generation {
            return Err(NodeError::StaleHandle(h));
        }
        Ok(st)
    }

    /// Lock a live node. No caller may hold another node lock.
    pub(crate) fn lock(
        &self,
        h: NodeHandle,
    ) -> Result<(MutexGuard<'_, NodeState>, &Condvar), NodeError> {
        let slot = self.slot(h)?;
        let st = self.lock_slot(slot, h)?;
        Ok((st, &slot.cond))
    }

    pub(crate) fn create(&self, params: NewNode<'_>) -> Result<NodeHandle, NodeError> {
        if params.alpha >= params.beta {
            return Err(NodeError::InvalidWindow {
                alpha: params.alpha,
                beta: params.beta,
            });
        }
        let height = match params.parent {
            Some(parent) => self.lock(parent)?.0.height + 1,
            None => 0,
        };
        if height > self.max_height {
            return Err(NodeError::TooDeep {
                height,
                max: self.max_height,
            });
        }
        let index = self.free.pop().ok_or(NodeError::ArenaExhausted {
            capacity: self.capacity(),
        })?;
        let slot = &self.slots[index as usize];
        let mut st = slot.state.lock();
        debug_assert!(!st.live, "free list handed out a live node");
        st.live = true;
        st.started = false;
        st.alpha = params.alpha;
        st.beta = params.beta;
        st.depth = params.depth;
        st.height = height;
        st.best_move = None;
        st.best_score = -SCORE_INF;
        st.moves.clear();
        st.moves.extend_from_slice(params.moves);
        st.cursor = 0;
        st.n_done = 0;
        st.n_todo = params.moves.len();
        st.helper = HelperLink::None;
        st.is_waiting = false;
        st.is_acting_as_helper = false;
        st.borrowed = params.borrowed;
        st.borrow_pending = false;
        st.stop_point = false;
        st.parent = params.parent;
        st.owner_thread = params.owner_thread;
        st.owner_signal = Some(Arc::clone(params.owner_signal));
        st.helper_nodes = 0;
        slot.cutoff.store(false, Ordering::Release);
        Ok(NodeHandle {
            index,
            generation: st.generation,
        })
    }

    /// Start move iteration. Returns the first move, or `None` when the
    /// caller is stopped, the node is already cut off, or there are no moves.
    pub(crate) fn first_move(
        &self,
        h: NodeHandle,
        caller: &StopSignal,
    ) -> Result<Option<Move>, NodeError> {
        let (mut st, _) = self.lock(h)?;
        if st.started {
            return Err(NodeError::AlreadyStarted(h));
        }
        st.started = true;
        if !caller.is_running() || st.alpha >= st.beta {
            return Ok(None);
        }
        Ok(st.moves.first().copied())
    }

    /// Hand out the next queued move.
    pub(crate) fn next_move(
        &self,
        h: NodeHandle,
        caller: &StopSignal,
    ) -> Result<Option<Move>, NodeError> {
        let slot = self.slot(h)?;
        if slot.cutoff.load(Ordering::Acquire) {
            return Ok(None);
        }
        let mut st = self.lock_slot(slot, h)?;
        if !st.started || st.alpha >= st.beta || !caller.is_running() {
            return Ok(None);
        }
        if st.cursor + 1 >= st.moves.len() {
            return Ok(None);
        }
        st.cursor += 1;
        st.n_done += 1;
        st.n_todo -= 1;
        Ok(Some(st.moves[st.cursor]))
    }

    /// Record the score of a move searched at `h`.
    ///
    /// A result from a stopped caller, or arriving after the node was cut
    /// off, is dropped.
    pub(crate) fn record_result(
        &self,
        h: NodeHandle,
        mv: Move,
        score: Score,
        caller: &StopSignal,
        observer: Option<&RootObserver>,
    ) -> Result<RecordOutcome, NodeError> {
        let slot = self.slot(h)?;
        let mut st = self.lock_slot(slot, h)?;
        if !caller.is_running() || st.alpha >= st.beta || score <= st.best_score {
            return Ok(RecordOutcome::Ignored);
        }
        st.best_score = score;
        st.best_move = Some(mv);
        if st.height == 0 {
            if let Some(observer) = observer {
                observer(&RootUpdate {
                    best_move: mv,
                    score,
                    depth: st.depth,
                });
            }
        }
        if score > st.alpha {
            st.alpha = score;
        }
        if st.alpha < st.beta {
            return Ok(RecordOutcome::Improved);
        }
        slot.cutoff.store(true, Ordering::Release);
        let mut helper_stopped = false;
        if let Some(helper) = st.helper.signal() {
            helper.stop(StopState::StoppedByParallelCutoff);
            helper_stopped = true;
            // the owner may already be paused by a deeper node; its helpers
            // below this node are cut either way
            let height = st.height;
            let owner_paused = st.owner_signal.as_ref().is_some_and(|owner| {
                let paused = owner.try_pause(height);
                owner.stop_children_from(height);
                paused
            });
            if owner_paused {
                st.stop_point = true;
            }
        }
        Ok(RecordOutcome::Cutoff { helper_stopped })
    }

    pub(crate) fn mark_helper_running(&self, h: NodeHandle) -> Result<(), NodeError> {
        let (mut st, _) = self.lock(h)?;
        match std::mem::take(&mut st.helper) {
            HelperLink::Assigned(sig) => {
                st.helper = HelperLink::Running(sig);
                Ok(())
            }
            other => {
                st.helper = other;
                Err(NodeError::HelperNotAssigned(h))
            }
        }
    }

    pub fn window(&self, h: NodeHandle) -> Result<Window, NodeError> {
        let (st, _) = self.lock(h)?;
        Ok(Window {
            alpha: st.alpha,
            beta: st.beta,
            depth: st.depth,
        })
    }

    pub fn inspect(&self, h: NodeHandle) -> Result<NodeInfo, NodeError> {
        let (st, _) = self.lock(h)?;
        Ok(NodeInfo {
            alpha: st.alpha,
            beta: st.beta,
            depth: st.depth,
            height: st.height,
            best_move: st.best_move,
            best_score: st.best_score,
            n_moves: st.moves.len(),
            n_done: st.n_done,
            n_todo: st.n_todo,
            helper: st.helper.phase(),
            is_waiting: st.is_waiting,
            is_acting_as_helper: st.is_acting_as_helper,
            stop_point: st.stop_point,
            parent: st.parent,
            owner_thread: st.owner_thread,
        })
    }

    /// Destroy a node whose helper (if any) has been joined.
    pub(crate) fn destroy(&self, h: NodeHandle) -> Result<NodeSummary, NodeError> {
        let (mut st, _) = self.lock(h)?;
        if st.helper.is_live() || st.borrow_pending {
            return Err(NodeError::HelperAttached(h));
        }
        let summary = NodeSummary {
            best_move: st.best_move,
            best_score: st.best_score,
            helper_nodes: st.helper_nodes,
        };
        st.live = false;
        st.generation = st.generation.wrapping_add(1);
        st.owner_signal = None;
        st.parent = None;
        st.moves.clear();
        drop(st);
        let pushed = self.free.push(h.index);
        debug_assert!(pushed.is_ok(), "node free list overflow");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn moves(n: u32) -> Vec<Move> {
        (1..=n).map(Move::from_u32).collect()
    }

    fn create(
        arena: &NodeArena,
        sig: &Arc<StopSignal>,
        mv: &[Move],
        parent: Option<NodeHandle>,
    ) -> NodeHandle {
        arena
            .create(NewNode {
                alpha: -100,
                beta: 100,
                depth: 6,
                moves: mv,
                parent,
                owner_thread: 0,
                owner_signal: sig,
                borrowed: false,
            })
            .unwrap()
    }

    #[test]
    fn create_rejects_empty_window() {
        let arena = NodeArena::new(4, 8);
        let sig = Arc::new(StopSignal::new());
        let err = arena
            .create(NewNode {
                alpha: 10,
                beta: 10,
                depth: 1,
                moves: &moves(2),
                parent: None,
                owner_thread: 0,
                owner_signal: &sig,
                borrowed: false,
            })
            .unwrap_err();
        assert!(matches!(err, NodeError::InvalidWindow { alpha: 10, beta: 10 }));
        assert_eq!(arena.in_use(), 0);
    }

    #[test]
    fn heights_follow_parents_and_are_bounded() {
        let arena = NodeArena::new(8, 1);
        let sig = Arc::new(StopSignal::new());
        let root = create(&arena, &sig, &moves(2), None);
        let child = create(&arena, &sig, &moves(2), Some(root));
        assert_eq!(arena.inspect(root).unwrap().height, 0);
        assert_eq!(arena.inspect(child).unwrap().height, 1);
        let err = arena
            .create(NewNode {
                alpha: -1,
                beta: 1,
                depth: 1,
                moves: &moves(2),
                parent: Some(child),
                owner_thread: 0,
                owner_signal: &sig,
                borrowed: false,
            })
            .unwrap_err();
        assert!(matches!(err, NodeError::TooDeep { height: 2, max: 1 }));
    }

    #[test]
    fn stale_handles_are_detected() {
        let arena = NodeArena::new(1, 8);
        let sig = Arc::new(StopSignal::new());
        let first = create(&arena, &sig, &moves(2), None);
        arena.destroy(first).unwrap();
        let second = create(&arena, &sig, &moves(3), None);
        assert_eq!(first.index(), second.index());
        assert!(matches!(arena.window(first), Err(NodeError::StaleHandle(_))));
        assert_eq!(arena.inspect(second).unwrap().n_moves, 3);
    }

    #[test]
    fn arena_exhaustion_is_reported() {
        let arena = NodeArena::new(1, 8);
        let sig = Arc::new(StopSignal::new());
        let _held = create(&arena, &sig, &moves(2), None);
        let err = arena
            .create(NewNode {
                alpha: -1,
                beta: 1,
                depth: 1,
                moves: &moves(2),
                parent: None,
                owner_thread: 0,
                owner_signal: &sig,
                borrowed: false,
            })
            .unwrap_err();
        assert!(matches!(err, NodeError::ArenaExhausted { capacity: 1 }));
    }

    #[test]
    fn move_iteration_tracks_counters() {
        let arena = NodeArena::new(2, 8);
        let sig = Arc::new(StopSignal::new());
        let node = create(&arena, &sig, &moves(3), None);
        assert_eq!(arena.first_move(node, &sig).unwrap(), Some(Move::from_u32(1)));
        assert!(matches!(arena.first_move(node, &sig), Err(NodeError::AlreadyStarted(_))));
        assert_eq!(arena.next_move(node, &sig).unwrap(), Some(Move::from_u32(2)));
        assert_eq!(arena.next_move(node, &sig).unwrap(), Some(Move::from_u32(3)));
        assert_eq!(arena.next_move(node, &sig).unwrap(), None);
        let info = arena.inspect(node).unwrap();
        assert_eq!((info.n_done, info.n_todo), (2, 1));
    }

    #[test]
    fn empty_move_list_yields_nothing() {
        let arena = NodeArena::new(2, 8);
        let sig = Arc::new(StopSignal::new());
        let node = create(&arena, &sig, &[], None);
        assert_eq!(arena.first_move(node, &sig).unwrap(), None);
        assert_eq!(arena.next_move(node, &sig).unwrap(), None);
    }

    #[test]
    fn stopped_caller_gets_no_moves_and_records_nothing() {
        let arena = NodeArena::new(2, 8);
        let sig = Arc::new(StopSignal::new());
        let node = create(&arena, &sig, &moves(3), None);
        assert!(arena.first_move(node, &sig).unwrap().is_some());
        sig.stop(StopState::StoppedByUser);
        assert_eq!(arena.next_move(node, &sig).unwrap(), None);
        assert_eq!(
            arena.record_result(node, Move::from_u32(1), 50, &sig, None).unwrap(),
            RecordOutcome::Ignored
        );
        assert_eq!(arena.inspect(node).unwrap().best_move, None);
    }

    #[test]
    fn fail_high_closes_the_node() {
        let arena = NodeArena::new(2, 8);
        let sig = Arc::new(StopSignal::new());
        let node = create(&arena, &sig, &moves(4), None);
        arena.first_move(node, &sig).unwrap();
        assert_eq!(
            arena.record_result(node, Move::from_u32(1), 20, &sig, None).unwrap(),
            RecordOutcome::Improved
        );
        assert_eq!(arena.window(node).unwrap().alpha, 20);
        assert_eq!(
            arena.record_result(node, Move::from_u32(1), 150, &sig, None).unwrap(),
            RecordOutcome::Cutoff { helper_stopped: false }
        );
        // no further moves and no further updates once alpha >= beta
        assert_eq!(arena.next_move(node, &sig).unwrap(), None);
        assert_eq!(
            arena.record_result(node, Move::from_u32(2), 500, &sig, None).unwrap(),
            RecordOutcome::Ignored
        );
        let info = arena.inspect(node).unwrap();
        assert_eq!(info.best_score, 150);
        assert_eq!(info.best_move, Some(Move::from_u32(1)));
        // without a helper the owner is not paused
        assert!(sig.is_running());
        assert!(!info.stop_point);
    }

    #[test]
    fn fail_high_with_helper_stops_helper_and_pauses_owner() {
        let arena = NodeArena::new(2, 8);
        let owner = Arc::new(StopSignal::new());
        let helper = Arc::new(StopSignal::new());
        let node = create(&arena, &owner, &moves(4), None);
        arena.first_move(node, &owner).unwrap();
        owner.attach(&helper, 0);
        arena.lock(node).unwrap().0.helper = HelperLink::Assigned(Arc::clone(&helper));

        assert_eq!(
            arena.record_result(node, Move::from_u32(2), 100, &helper, None).unwrap(),
            RecordOutcome::Cutoff { helper_stopped: true }
        );
        assert_eq!(helper.state(), StopState::StoppedByParallelCutoff);
        assert_eq!(owner.state(), StopState::StoppedByParallelCutoff);
        assert!(arena.inspect(node).unwrap().stop_point);
        assert!(owner.resume(0));
    }

    /// Attach a running helper to `node`, as a split would.
    fn attach_helper(arena: &NodeArena, owner: &StopSignal, node: NodeHandle) -> Arc<StopSignal> {
        let helper = Arc::new(StopSignal::new());
        let height = arena.inspect(node).unwrap().height;
        owner.attach(&helper, height);
        arena.lock(node).unwrap().0.helper = HelperLink::Running(Arc::clone(&helper));
        helper
    }

    #[test]
    fn ancestor_cutoff_reaches_helpers_of_an_already_paused_owner() {
        let arena = NodeArena::new(4, 8);
        let owner = Arc::new(StopSignal::new());
        let a = create(&arena, &owner, &moves(4), None);
        let b = create(&arena, &owner, &moves(4), Some(a));
        let d = create(&arena, &owner, &moves(4), Some(b));
        for node in [a, b, d] {
            arena.first_move(node, &owner).unwrap();
        }
        let ha = attach_helper(&arena, &owner, a);
        let hb = attach_helper(&arena, &owner, b);
        let hd = attach_helper(&arena, &owner, d);

        // the owner fails high at D first
        assert_eq!(
            arena.record_result(d, Move::from_u32(1), 100, &owner, None).unwrap(),
            RecordOutcome::Cutoff { helper_stopped: true }
        );
        assert!(!hd.is_running());
        assert!(hb.is_running());
        assert!(arena.inspect(d).unwrap().stop_point);

        // then A's helper fails high at A while the owner is still paused
        assert_eq!(
            arena.record_result(a, Move::from_u32(2), 100, &ha, None).unwrap(),
            RecordOutcome::Cutoff { helper_stopped: true }
        );
        assert_eq!(hb.state(), StopState::StoppedByParallelCutoff);
        assert!(arena.inspect(a).unwrap().stop_point);

        // leaving D keeps the owner paused; leaving A resumes it
        assert!(!owner.resume(2));
        assert_eq!(owner.state(), StopState::StoppedByParallelCutoff);
        assert!(!owner.resume(1));
        assert!(owner.resume(0));
        assert!(owner.is_running());
    }

    #[test]
    fn root_improvements_reach_the_observer() {
        use std::sync::Mutex as StdMutex;
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observer: RootObserver = Arc::new(move |u: &RootUpdate| {
            sink.lock().unwrap().push((u.best_move, u.score));
        });
        let arena = NodeArena::new(2, 8);
        let sig = Arc::new(StopSignal::new());
        let node = create(&arena, &sig, &moves(3), None);
        arena.record_result(node, Move::from_u32(1), 5, &sig, Some(&observer)).unwrap();
        arena.record_result(node, Move::from_u32(2), 3, &sig, Some(&observer)).unwrap();
        arena.record_result(node, Move::from_u32(3), 9, &sig, Some(&observer)).unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(Move::from_u32(1), 5), (Move::from_u32(3), 9)]
        );
    }

    #[test]
    fn destroy_requires_joined_helper() {
        let arena = NodeArena::new(2, 8);
        let sig = Arc::new(StopSignal::new());
        let node = create(&arena, &sig, &moves(2), None);
        arena.lock(node).unwrap().0.helper = HelperLink::Running(Arc::new(StopSignal::new()));
        assert!(matches!(arena.destroy(node), Err(NodeError::HelperAttached(_))));
        arena.lock(node).unwrap().0.helper = HelperLink::None;
        arena.destroy(node).unwrap();
        assert_eq!(arena.in_use(), 0);
    }

    #[test]
    fn helper_phase_transitions_in_order() {
        let arena = NodeArena::new(2, 8);
        let sig = Arc::new(StopSignal::new());
        let node = create(&arena, &sig, &moves(2), None);
        assert!(matches!(arena.mark_helper_running(node), Err(NodeError::HelperNotAssigned(_))));
        arena.lock(node).unwrap().0.helper = HelperLink::Assigned(Arc::new(StopSignal::new()));
        assert_eq!(arena.inspect(node).unwrap().helper, HelperPhase::Assigned);
        arena.mark_helper_running(node).unwrap();
        assert_eq!(arena.inspect(node).unwrap().helper, HelperPhase::Running);
    }

    proptest! {
        #[test]
        fn counters_are_conserved(
            n in 1u32..12,
            scores in proptest::collection::vec(-200i32..200, 0..16),
        ) {
            let arena = NodeArena::new(2, 8);
            let sig = Arc::new(StopSignal::new());
            let mv = moves(n);
            let node = create(&arena, &sig, &mv, None);
            let mut current = arena.first_move(node, &sig).unwrap();
            let mut last_done = 0;
            let mut last_alpha = -100;
            for score in scores {
                let Some(m) = current else { break };
                arena.record_result(node, m, score, &sig, None).unwrap();
                current = arena.next_move(node, &sig).unwrap();
                let info = arena.inspect(node).unwrap();
                prop_assert_eq!(info.n_done + info.n_todo, n as usize);
                prop_assert!(info.n_done >= last_done);
                prop_assert!(info.alpha >= last_alpha);
                prop_assert!(info.alpha < info.beta || current.is_none());
                last_done = info.n_done;
                last_alpha = info.alpha;
            }
        }
    }
}
