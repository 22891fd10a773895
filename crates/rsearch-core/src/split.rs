//! Split decision and helper routing.
//!
//! After the first move of a node has been searched, the remaining moves may
//! be shared with one helper. A helper is preferably a thread that is blocked
//! in a join on one of the node's ancestors: it would otherwise sleep until
//! the subtree it waits for is finished, and the split node belongs to that
//! subtree. Only when no such thread exists is a pooled worker used.

use std::sync::Arc;

use log::trace;

use crate::coordinator::Shared;
use crate::error::NodeError;
use crate::kernel::SearchKernel;
use crate::node::{HelperLink, NodeHandle};
use crate::pool::Assignment;
use crate::types::Move;
use crate::worker::SearchThread;

/// Where a split's helper comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HelperSource {
    /// The owner of `host`, currently waiting in `join_helper` on it.
    Borrowed { host: NodeHandle, thread: usize },
    /// An idle pooled worker.
    Pooled(usize),
}

impl<K: SearchKernel> Shared<K> {
    /// Find a helper for a split whose node has parent `start`.
    ///
    /// Walks the ancestors nearest first. A qualifying ancestor is reserved
    /// (`is_acting_as_helper`) under its lock, so two splits cannot borrow
    /// the same waiting thread.
    pub(crate) fn get_helper(&self, start: Option<NodeHandle>) -> Option<HelperSource> {
        let mut cursor = start;
        while let Some(h) = cursor {
            let Ok((mut st, _)) = self.arena.lock(h) else {
                break;
            };
            if st.is_waiting && !st.is_acting_as_helper && !st.borrow_pending && !st.borrowed {
                st.is_acting_as_helper = true;
                return Some(HelperSource::Borrowed {
                    host: h,
                    thread: st.owner_thread,
                });
            }
            cursor = st.parent;
        }
        self.pool.acquire().map(HelperSource::Pooled)
    }
}

impl<K: SearchKernel> SearchThread<'_, K> {
    /// Offer `mv` and the moves after it at `node` to a helper.
    ///
    /// Returns `false` when the node is not eligible or no helper is
    /// available; the caller then searches `mv` itself. On `true` the helper
    /// owns `mv` and the caller continues with [`SearchThread::next_move`].
    pub fn try_split(&mut self, node: NodeHandle, mv: Move) -> Result<bool, NodeError> {
        let shared = self.shared;
        if !shared.splitting_enabled() {
            return Ok(false);
        }
        let (parent, height) = {
            let (st, _) = shared.arena.lock(node)?;
            let eligible = st.depth >= shared.config.split_min_depth
                && st.n_done > 0
                && !st.helper.is_live()
                && st.n_todo >= shared.config.split_min_moves_todo
                && st.alpha < st.beta;
            if !eligible {
                return Ok(false);
            }
            (st.parent, st.height)
        };
        if !self.ctx.signal.is_running() {
            return Ok(false);
        }

        shared.stats.on_attempt();
        let Some(source) = shared.get_helper(parent) else {
            shared.stats.on_exhausted();
            return Ok(false);
        };
        let helper_signal = match source {
            HelperSource::Borrowed { thread, .. } => {
                Arc::clone(&shared.pool.slot(thread).borrow_signal)
            }
            HelperSource::Pooled(id) => Arc::clone(&shared.pool.slot(id).signal),
        };

        shared.arena.lock(node)?.0.helper = HelperLink::Assigned(Arc::clone(&helper_signal));
        self.ctx.signal.attach(&helper_signal, height);

        let assignment = Assignment {
            node,
            first_move: mv,
            snapshot: self.ctx.snapshot(),
            spawner: Arc::clone(&self.ctx.signal),
        };
        match source {
            HelperSource::Pooled(id) => {
                shared.stats.on_pooled();
                shared.pool.assign(id, assignment);
                trace!("split at height {height}: {mv} -> worker {id}");
            }
            HelperSource::Borrowed { host, thread } => {
                shared.stats.on_borrowed();
                *shared.pool.slot(thread).mailbox.lock() = Some(assignment);
                let (mut st, cond) = shared.arena.lock(host)?;
                st.borrow_pending = true;
                cond.notify_all();
                trace!("split at height {height}: {mv} -> waiting thread {thread}");
            }
        }
        Ok(true)
    }
}
