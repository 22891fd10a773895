//! Coordinator: owns the worker threads, the node arena and the master
//! context, and runs root searches.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info};
use parking_lot::{Mutex, RwLock};

use crate::config::SearchConfig;
use crate::context::SearchContext;
use crate::error::SearchError;
use crate::kernel::{RootObserver, SearchKernel};
use crate::node::NodeArena;
use crate::pool::{SlotPhase, TaskPool};
use crate::stats::{SplitStats, SplitStatsSnapshot};
use crate::stop::{StopHandle, StopSignal, StopState};
use crate::types::{Depth, Move, SCORE_INF, Score};
use crate::worker::{SearchThread, slot_main_loop};

/// State shared by every search thread.
pub(crate) struct Shared<K: SearchKernel> {
    pub kernel: K,
    pub config: SearchConfig,
    pub arena: NodeArena,
    pub pool: TaskPool<K>,
    pub stats: SplitStats,
    pub observer: RwLock<Option<RootObserver>>,
    splitting: AtomicBool,
    failure: Mutex<Option<SearchError>>,
}

impl<K: SearchKernel> Shared<K> {
    #[inline]
    pub fn splitting_enabled(&self) -> bool {
        self.pool.size() > 1 && self.splitting.load(Ordering::Relaxed)
    }

    /// Signal of the master context, root of the signal tree.
    #[inline]
    pub fn root_signal(&self) -> &Arc<StopSignal> {
        &self.pool.slot(0).signal
    }

    /// Record the first failure of a search and stop it everywhere.
    pub fn report_failure(&self, err: SearchError) {
        error!("Search task failed: {err}");
        {
            let mut failure = self.failure.lock();
            if failure.is_none() {
                *failure = Some(err);
            }
        }
        self.root_signal().stop(StopState::StoppedAtEnd);
    }

    fn take_failure(&self) -> Option<SearchError> {
        self.failure.lock().take()
    }
}

/// Outcome of [`Coordinator::root_search`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootResult {
    pub best_move: Move,
    /// Score of `best_move`. Meaningless when `depth` is 0 and no move was
    /// scored before the search stopped.
    pub score: Score,
    /// Last completed iteration.
    pub depth: Depth,
    pub nodes: u64,
    pub elapsed: Duration,
    /// `Running` when every iteration completed, otherwise the reason the
    /// search was stopped.
    pub stop: StopState,
}

struct MasterContexts<K: SearchKernel> {
    main: SearchContext<K>,
    spare: SearchContext<K>,
}

/// Parallel YBWC search coordinator.
///
/// All worker threads are started by [`Coordinator::new`] and live until the
/// coordinator is dropped; no thread is created while searching.
pub struct Coordinator<K: SearchKernel> {
    shared: Arc<Shared<K>>,
    master: Mutex<MasterContexts<K>>,
    handles: Vec<JoinHandle<()>>,
}

impl<K: SearchKernel> Coordinator<K> {
    pub fn new(kernel: K, config: SearchConfig) -> Result<Self, SearchError> {
        config.validate()?;
        let threads = config.threads;
        let pool = TaskPool::new(threads);
        let master = MasterContexts {
            main: SearchContext::new(0, Arc::clone(&pool.slot(0).signal), false),
            spare: SearchContext::new(0, Arc::clone(&pool.slot(0).borrow_signal), true),
        };
        let shared = Arc::new(Shared {
            kernel,
            arena: NodeArena::new(config.arena_capacity(), config.max_height),
            pool,
            stats: SplitStats::default(),
            observer: RwLock::new(None),
            splitting: AtomicBool::new(config.allow_splitting),
            failure: Mutex::new(None),
            config,
        });

        let mut handles = Vec::with_capacity(threads.saturating_sub(1));
        for id in 1..threads {
            let mut builder = thread::Builder::new().name(format!("ybwc-worker-{id}"));
            if let Some(mb) = shared.config.worker_stack_mb {
                builder = builder.stack_size(mb * 1024 * 1024);
            }
            let worker_shared = Arc::clone(&shared);
            match builder.spawn(move || slot_main_loop(worker_shared, id)) {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    error!("Failed to spawn search worker {id}: {source}");
                    shared.pool.shutdown();
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(SearchError::ThreadSpawn { id, source });
                }
            }
        }
        info!(
            "YBWC coordinator ready: {threads} thread(s), split_min_depth={}, \
             split_min_moves_todo={}, arena={}",
            shared.config.split_min_depth,
            shared.config.split_min_moves_todo,
            shared.arena.capacity()
        );

        Ok(Self {
            shared,
            master: Mutex::new(master),
            handles,
        })
    }

    pub fn kernel(&self) -> &K {
        &self.shared.kernel
    }

    pub fn config(&self) -> &SearchConfig {
        &self.shared.config
    }

    pub fn threads(&self) -> usize {
        self.shared.pool.size()
    }

    /// Number of pooled workers currently idle.
    pub fn idle_workers(&self) -> usize {
        self.shared.pool.idle_count()
    }

    /// Lifecycle phase of every pooled worker, in slot order.
    pub fn worker_phases(&self) -> Vec<SlotPhase> {
        (1..self.shared.pool.size())
            .map(|id| self.shared.pool.slot(id).phase())
            .collect()
    }

    /// Number of live search nodes.
    pub fn live_nodes(&self) -> usize {
        self.shared.arena.in_use()
    }

    pub fn set_splitting(&self, enabled: bool) {
        self.shared.splitting.store(enabled, Ordering::Relaxed);
    }

    pub fn set_observer(&self, observer: Option<RootObserver>) {
        *self.shared.observer.write() = observer;
    }

    /// Handle for stopping a running search from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle::new(Arc::clone(self.shared.root_signal()))
    }

    pub fn stats(&self) -> SplitStatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Iterative deepening search of `position` up to `depth`.
    ///
    /// Returns the result of the last completed iteration. When a stop
    /// interrupts the first iteration, the best move found so far (or the
    /// first legal move) is returned with `depth == 0`.
    pub fn root_search(
        &self,
        position: K::Position,
        depth: Depth,
        time_limit: Option<Duration>,
    ) -> Result<RootResult, SearchError> {
        if depth < 1 {
            return Err(SearchError::InvalidDepth(depth));
        }
        let shared = &*self.shared;
        let mut master = self.master.lock();
        let MasterContexts { main, spare } = &mut *master;

        let start = Instant::now();
        shared.take_failure();
        shared.stats.reset();
        main.start_root(position, time_limit.map(|limit| start + limit));

        let mut moves = Vec::new();
        shared.kernel.generate_moves(&main.position, &mut moves);
        if moves.is_empty() {
            return Err(SearchError::NoLegalMoves);
        }

        let mut best: Option<(Move, Score)> = None;
        let mut completed = 0;
        for d in 1..=depth {
            let outcome = SearchThread::new(shared, &mut *main, Some(&mut *spare)).search_node(
                -SCORE_INF,
                SCORE_INF,
                d,
                &moves,
                None,
            );
            if let Some(err) = shared.take_failure() {
                main.signal.stop(StopState::StoppedAtEnd);
                return Err(err);
            }
            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(err) => {
                    main.signal.stop(StopState::StoppedAtEnd);
                    return Err(err);
                }
            };
            let stopped = !main.signal.is_running();
            if let Some(mv) = outcome.best_move {
                if !stopped || best.is_none() {
                    best = Some((mv, outcome.best_score));
                }
                if let Some(pos) = moves.iter().position(|&m| m == mv) {
                    moves[..=pos].rotate_right(1);
                }
            }
            if stopped {
                debug!("iteration {d} interrupted: {:?}", main.signal.state());
                break;
            }
            completed = d;
            if log::log_enabled!(log::Level::Debug) {
                let (mv, score) = best.unwrap_or((moves[0], outcome.best_score));
                debug!(
                    "iteration {d}: best {mv} score {score} nodes {} splits {}",
                    main.nodes,
                    shared.stats.snapshot().splits()
                );
            }
        }

        let stop = main.signal.state();
        main.signal.stop(StopState::StoppedAtEnd);
        let (best_move, score) = best.unwrap_or((moves[0], 0));
        Ok(RootResult {
            best_move,
            score,
            depth: completed,
            nodes: main.nodes,
            elapsed: start.elapsed(),
            stop,
        })
    }

    /// Run `f` with the master thread positioned at `position`, for
    /// driving nodes by hand.
    pub fn enter<R>(
        &self,
        position: K::Position,
        f: impl FnOnce(&mut SearchThread<'_, K>) -> R,
    ) -> R {
        let mut master = self.master.lock();
        let MasterContexts { main, spare } = &mut *master;
        main.start_root(position, None);
        let mut thread = SearchThread::new(&self.shared, main, Some(spare));
        f(&mut thread)
    }
}

impl<K: SearchKernel> Drop for Coordinator<K> {
    fn drop(&mut self) {
        self.shared.pool.shutdown();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                error!("Search worker terminated by panic");
            }
        }
    }
}
