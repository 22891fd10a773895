//! Split statistics.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct SplitStats {
    attempts: AtomicU64,
    pooled: AtomicU64,
    borrowed: AtomicU64,
    pool_exhausted: AtomicU64,
    parallel_cutoffs: AtomicU64,
}

/// Counters of one root search.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SplitStatsSnapshot {
    /// Eligible split points that asked for a helper.
    pub attempts: u64,
    /// Splits served by an idle pooled worker.
    pub pooled: u64,
    /// Splits served by a thread waiting on an ancestor node.
    pub borrowed: u64,
    /// Eligible split points that found no helper.
    pub pool_exhausted: u64,
    /// Fail-highs that had to stop a live helper.
    pub parallel_cutoffs: u64,
}

impl SplitStatsSnapshot {
    pub fn splits(&self) -> u64 {
        self.pooled + self.borrowed
    }
}

impl SplitStats {
    #[inline]
    pub fn on_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn on_pooled(&self) {
        self.pooled.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn on_borrowed(&self) {
        self.borrowed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn on_exhausted(&self) {
        self.pool_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn on_parallel_cutoff(&self) {
        self.parallel_cutoffs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.attempts.store(0, Ordering::Relaxed);
        self.pooled.store(0, Ordering::Relaxed);
        self.borrowed.store(0, Ordering::Relaxed);
        self.pool_exhausted.store(0, Ordering::Relaxed);
        self.parallel_cutoffs.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SplitStatsSnapshot {
        SplitStatsSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            pooled: self.pooled.load(Ordering::Relaxed),
            borrowed: self.borrowed.load(Ordering::Relaxed),
            pool_exhausted: self.pool_exhausted.load(Ordering::Relaxed),
            parallel_cutoffs: self.parallel_cutoffs.load(Ordering::Relaxed),
        }
    }
}
