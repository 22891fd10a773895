//! Hierarchical stop signals.
//!
//! Every search context owns one [`StopSignal`]. When a context spawns a
//! helper, the helper's signal is attached as a child of the spawner's signal;
//! a stop request then reaches the whole helper subtree. The signals form a
//! tree that mirrors the spawner -> helper relation of live tasks.
//!
//! Internally a signal is a small bit set rather than a single state value,
//! so that a context paused by its own parallel cutoff can be resumed without
//! losing a user stop, a timeout, or a cutoff inherited from an ancestor that
//! arrived meanwhile. The pause remembers the height of the node that owns
//! it: a cutoff at a shallower node of the same context takes the pause over,
//! and only the join at that node resumes the context.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::Mutex;
use smallvec::SmallVec;

const USER: u8 = 1 << 0;
const TIMEOUT: u8 = 1 << 1;
const END: u8 = 1 << 2;
/// Cutoff raised by an ancestor context; stays until the task ends.
const CUTOFF_INHERITED: u8 = 1 << 3;
/// Cutoff raised at one of this context's own nodes; cleared by its join.
const CUTOFF_LOCAL: u8 = 1 << 4;

/// Observable stop state of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopState {
    Running,
    StoppedByUser,
    StoppedByTimeout,
    StoppedByParallelCutoff,
    StoppedAtEnd,
}

impl StopState {
    #[inline]
    pub fn is_running(self) -> bool {
        matches!(self, StopState::Running)
    }

    fn from_bits(bits: u8) -> Self {
        if bits == 0 {
            StopState::Running
        } else if bits & USER != 0 {
            StopState::StoppedByUser
        } else if bits & TIMEOUT != 0 {
            StopState::StoppedByTimeout
        } else if bits & END != 0 {
            StopState::StoppedAtEnd
        } else {
            StopState::StoppedByParallelCutoff
        }
    }

    fn to_bit(self) -> u8 {
        match self {
            StopState::Running => 0,
            StopState::StoppedByUser => USER,
            StopState::StoppedByTimeout => TIMEOUT,
            StopState::StoppedAtEnd => END,
            StopState::StoppedByParallelCutoff => CUTOFF_INHERITED,
        }
    }
}

/// Bits a child receives from its parent. Any cutoff becomes an inherited one.
#[inline]
fn inherited(bits: u8) -> u8 {
    let mut out = bits & (USER | TIMEOUT | END);
    if bits & (CUTOFF_INHERITED | CUTOFF_LOCAL) != 0 {
        out |= CUTOFF_INHERITED;
    }
    out
}

struct ChildLink {
    height: usize,
    signal: Arc<StopSignal>,
}

/// Stop signal of one search context.
pub struct StopSignal {
    bits: AtomicU8,
    /// Height of the node holding the local pause. `Some` iff `CUTOFF_LOCAL`
    /// is set.
    paused_at: Mutex<Option<usize>>,
    children: Mutex<SmallVec<[ChildLink; 4]>>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StopSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopSignal")
            .field("state", &self.state())
            .field("children", &self.child_count())
            .finish()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        Self {
            bits: AtomicU8::new(0),
            paused_at: Mutex::new(None),
            children: Mutex::new(SmallVec::new()),
        }
    }

    #[inline]
    pub fn state(&self) -> StopState {
        StopState::from_bits(self.bits.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.bits.load(Ordering::Acquire) == 0
    }

    /// Stop this context and every attached descendant with `reason`.
    ///
    /// `StopState::Running` is ignored; use [`StopSignal::reset`] at the start
    /// of a fresh search instead.
    pub fn stop(&self, reason: StopState) {
        let bit = reason.to_bit();
        if bit != 0 {
            self.raise(bit);
        }
    }

    fn raise(&self, bit: u8) {
        self.bits.fetch_or(bit, Ordering::AcqRel);
        let children = self.children.lock();
        for child in children.iter() {
            child.signal.raise(inherited(bit));
        }
    }

    /// Stop the children spawned from nodes at `height` or deeper.
    pub(crate) fn stop_children_from(&self, height: usize) {
        let children = self.children.lock();
        for child in children.iter().filter(|c| c.height >= height) {
            child.signal.raise(CUTOFF_INHERITED);
        }
    }

    /// Pause this context for a cutoff raised at its node of `height`.
    ///
    /// Succeeds when the context is running, or when it is already paused
    /// by a deeper node; the pause then moves up to `height`. Returns whether
    /// the node at `height` now holds the pause.
    pub(crate) fn try_pause(&self, height: usize) -> bool {
        let mut paused_at = self.paused_at.lock();
        match *paused_at {
            None => {
                let paused = self
                    .bits
                    .compare_exchange(0, CUTOFF_LOCAL, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok();
                if paused {
                    *paused_at = Some(height);
                }
                paused
            }
            Some(current) if height < current => {
                *paused_at = Some(height);
                true
            }
            Some(_) => false,
        }
    }

    /// Clear the pause held by the node at `height`. Returns whether the
    /// context is running again: `false` when the pause moved to a shallower
    /// node, or when another stop arrived while paused.
    pub(crate) fn resume(&self, height: usize) -> bool {
        let mut paused_at = self.paused_at.lock();
        if *paused_at != Some(height) {
            return false;
        }
        *paused_at = None;
        self.bits.fetch_and(!CUTOFF_LOCAL, Ordering::AcqRel) == CUTOFF_LOCAL
    }

    /// Attach `child` as the signal of a helper spawned at a node of
    /// `height`. The child inherits the current stop state.
    pub(crate) fn attach(&self, child: &Arc<StopSignal>, height: usize) {
        let mut children = self.children.lock();
        let bits = inherited(self.bits.load(Ordering::Acquire));
        *child.paused_at.lock() = None;
        child.bits.store(bits, Ordering::Release);
        children.push(ChildLink {
            height,
            signal: Arc::clone(child),
        });
    }

    pub(crate) fn detach(&self, child: &Arc<StopSignal>) {
        let mut children = self.children.lock();
        if let Some(pos) = children.iter().position(|c| Arc::ptr_eq(&c.signal, child)) {
            children.swap_remove(pos);
        }
    }

    /// Reset to Running. Only valid while no helper is attached.
    pub(crate) fn reset(&self) {
        debug_assert_eq!(self.child_count(), 0, "reset with attached helpers");
        *self.paused_at.lock() = None;
        self.bits.store(0, Ordering::Release);
    }

    pub fn child_count(&self) -> usize {
        self.children.lock().len()
    }
}

/// Handle for requesting a user stop from another thread.
#[derive(Clone, Debug)]
pub struct StopHandle {
    signal: Arc<StopSignal>,
}

impl StopHandle {
    pub(crate) fn new(signal: Arc<StopSignal>) -> Self {
        Self { signal }
    }

    pub fn request_stop(&self) {
        log::debug!("User stop requested");
        self.signal.stop(StopState::StoppedByUser);
    }

    pub fn state(&self) -> StopState {
        self.signal.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_stop_reaches_grandchildren() {
        let root = Arc::new(StopSignal::new());
        let child = Arc::new(StopSignal::new());
        let grandchild = Arc::new(StopSignal::new());
        root.attach(&child, 0);
        child.attach(&grandchild, 3);

        root.stop(StopState::StoppedByUser);
        assert_eq!(child.state(), StopState::StoppedByUser);
        assert_eq!(grandchild.state(), StopState::StoppedByUser);
    }

    #[test]
    fn attach_inherits_current_state() {
        let root = Arc::new(StopSignal::new());
        root.stop(StopState::StoppedByTimeout);
        let child = Arc::new(StopSignal::new());
        root.attach(&child, 1);
        assert_eq!(child.state(), StopState::StoppedByTimeout);
    }

    #[test]
    fn local_pause_is_inherited_as_cutoff() {
        let root = Arc::new(StopSignal::new());
        assert!(root.try_pause(2));
        let child = Arc::new(StopSignal::new());
        root.attach(&child, 2);
        assert_eq!(child.state(), StopState::StoppedByParallelCutoff);
        // the child cannot clear a cutoff it did not raise
        assert!(!child.resume(2));
        assert!(root.resume(2));
        assert!(root.is_running());
        assert!(!child.is_running());
    }

    #[test]
    fn resume_fails_after_user_stop() {
        let sig = StopSignal::new();
        assert!(sig.try_pause(1));
        sig.stop(StopState::StoppedByUser);
        assert!(!sig.resume(1));
        assert_eq!(sig.state(), StopState::StoppedByUser);
    }

    #[test]
    fn pause_fails_when_already_stopped() {
        let sig = StopSignal::new();
        sig.stop(StopState::StoppedByUser);
        assert!(!sig.try_pause(1));
        assert_eq!(sig.state(), StopState::StoppedByUser);
    }

    #[test]
    fn shallower_cutoff_takes_over_the_pause() {
        let sig = StopSignal::new();
        assert!(sig.try_pause(5));
        assert!(sig.try_pause(2));
        // a deeper cutoff leaves the shallower pause in place
        assert!(!sig.try_pause(4));
        // the join at the deep node does not resume the context
        assert!(!sig.resume(5));
        assert_eq!(sig.state(), StopState::StoppedByParallelCutoff);
        assert!(sig.resume(2));
        assert!(sig.is_running());
        assert!(sig.try_pause(3));
        assert!(sig.resume(3));
    }

    #[test]
    fn attach_clears_a_stale_pause() {
        let root = Arc::new(StopSignal::new());
        let worker = Arc::new(StopSignal::new());
        assert!(worker.try_pause(3));
        root.attach(&worker, 0);
        assert!(worker.is_running());
        assert!(!worker.resume(3));
        assert!(worker.try_pause(6));
        assert!(worker.resume(6));
    }

    #[test]
    fn stop_children_from_respects_height() {
        let root = Arc::new(StopSignal::new());
        let shallow = Arc::new(StopSignal::new());
        let deep = Arc::new(StopSignal::new());
        root.attach(&shallow, 1);
        root.attach(&deep, 4);

        root.stop_children_from(3);
        assert!(shallow.is_running());
        assert_eq!(deep.state(), StopState::StoppedByParallelCutoff);
        assert!(root.is_running());
    }

    #[test]
    fn detach_stops_propagation() {
        let root = Arc::new(StopSignal::new());
        let child = Arc::new(StopSignal::new());
        root.attach(&child, 0);
        root.detach(&child);
        assert_eq!(root.child_count(), 0);
        root.stop(StopState::StoppedAtEnd);
        assert!(child.is_running());
    }

    #[test]
    fn user_stop_dominates_cutoff() {
        let sig = StopSignal::new();
        sig.stop(StopState::StoppedByParallelCutoff);
        sig.stop(StopState::StoppedByUser);
        assert_eq!(sig.state(), StopState::StoppedByUser);
    }
}
