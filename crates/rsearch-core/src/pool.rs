//! Fixed pool of reusable task slots.
//!
//! Slot `i` describes search thread `i`. Slot 0 is the master (the thread
//! that runs the root search) and is never handed out; slots `1..size` are
//! pooled and each is served by one worker thread for the coordinator's
//! whole lifetime. Every slot also carries its thread's borrow mailbox: a
//! thread waiting in a join can be handed one task for a descendant node
//! without going through the pool.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Condvar, Mutex};

use crate::context::ContextSnapshot;
use crate::kernel::SearchKernel;
use crate::node::NodeHandle;
use crate::spinlock::SpinLock;
use crate::stop::StopSignal;
use crate::types::Move;

/// Work handed to a helper: continue the move loop of `node`, starting
/// with `first_move`.
pub(crate) struct Assignment<K: SearchKernel> {
    pub node: NodeHandle,
    pub first_move: Move,
    pub snapshot: ContextSnapshot<K>,
    /// Signal of the splitting context; the helper's signal is attached to it.
    pub spawner: Arc<StopSignal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPhase {
    Idle,
    Assigned,
    Running,
}

pub(crate) struct SlotState<K: SearchKernel> {
    pub run: bool,
    pub phase: SlotPhase,
    pub assignment: Option<Assignment<K>>,
}

pub(crate) struct TaskSlot<K: SearchKernel> {
    pub state: Mutex<SlotState<K>>,
    pub cond: Condvar,
    /// Signal of the thread's main context.
    pub signal: Arc<StopSignal>,
    /// Signal of the thread's spare context used for borrowed tasks.
    pub borrow_signal: Arc<StopSignal>,
    pub mailbox: Mutex<Option<Assignment<K>>>,
}

impl<K: SearchKernel> TaskSlot<K> {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                run: false,
                phase: SlotPhase::Idle,
                assignment: None,
            }),
            cond: Condvar::new(),
            signal: Arc::new(StopSignal::new()),
            borrow_signal: Arc::new(StopSignal::new()),
            mailbox: Mutex::new(None),
        }
    }

    pub fn phase(&self) -> SlotPhase {
        self.state.lock().phase
    }
}

pub(crate) struct TaskPool<K: SearchKernel> {
    slots: Box<[TaskSlot<K>]>,
    idle: SpinLock<Vec<usize>>,
    shutdown: AtomicBool,
}

impl<K: SearchKernel> TaskPool<K> {
    /// Pool for `size` threads; slots `1..size` start idle.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let slots: Box<[TaskSlot<K>]> = (0..size).map(|_| TaskSlot::new()).collect();
        // popped from the back: hand out low ids first
        let idle: Vec<usize> = (1..size).rev().collect();
        Self {
            slots,
            idle: SpinLock::new(idle),
            shutdown: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn slot(&self, id: usize) -> &TaskSlot<K> {
        &self.slots[id]
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    /// Take an idle slot, or `None` when every worker is busy.
    pub fn acquire(&self) -> Option<usize> {
        self.idle.lock().pop()
    }

    /// Return a slot to the idle stack. Called exactly once per acquire,
    /// by the slot's own thread when its task has finished.
    pub fn release(&self, id: usize) {
        debug_assert_ne!(id, 0, "master slot is never pooled");
        {
            let mut st = self.slots[id].state.lock();
            st.run = false;
            st.phase = SlotPhase::Idle;
            st.assignment = None;
        }
        let mut idle = self.idle.lock();
        debug_assert!(!idle.contains(&id), "slot {id} released twice");
        idle.push(id);
    }

    /// Hand an assignment to an acquired slot and wake its thread.
    pub fn assign(&self, id: usize, assignment: Assignment<K>) {
        let slot = &self.slots[id];
        let mut st = slot.state.lock();
        debug_assert_eq!(st.phase, SlotPhase::Idle, "slot {id} assigned while busy");
        st.assignment = Some(assignment);
        st.phase = SlotPhase::Assigned;
        st.run = true;
        slot.cond.notify_one();
    }

    /// Block until the slot is assigned work. Returns `None` on shutdown.
    pub fn wait_for_work(&self, id: usize) -> Option<Assignment<K>> {
        let slot = &self.slots[id];
        let mut st = slot.state.lock();
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                return None;
            }
            if st.run {
                st.phase = SlotPhase::Running;
                if let Some(assignment) = st.assignment.take() {
                    return Some(assignment);
                }
                // run without an assignment cannot happen through `assign`
                st.run = false;
                st.phase = SlotPhase::Idle;
            }
            slot.cond.wait(&mut st);
        }
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        for slot in self.slots.iter() {
            let _st = slot.state.lock();
            slot.cond.notify_all();
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}
