//! Seam between the coordinator and the sequential search kernel.

use std::sync::Arc;

use crate::error::SearchError;
use crate::node::NodeHandle;
use crate::types::{Depth, Move, Score};
use crate::worker::SearchThread;

/// The game-specific part of the search.
///
/// Board representation, move generation, evaluation and the sequential
/// negamax/PVS recursion live behind this trait. The coordinator calls
/// [`SearchKernel::search_move`] for every move it hands out, from whichever
/// thread owns the move at that moment; implementations must therefore be
/// safe to call concurrently from distinct [`SearchThread`]s against the same
/// node.
pub trait SearchKernel: Send + Sync + Sized + 'static {
    type Position: Clone + Default + Send + 'static;
    type Evaluator: Clone + Default + Send + 'static;

    /// Legal moves of `position`. Only used at the root; internal nodes
    /// generate their own moves inside `search_move`.
    fn generate_moves(&self, position: &Self::Position, moves: &mut Vec<Move>);

    /// Search `mv` at `node`: play it on `thread.ctx.position`, search the
    /// resulting position to `depth - 1` with the negated window, undo it,
    /// and return the score from the side to move at `node`.
    ///
    /// The returned score is ignored when the thread was stopped, so a
    /// kernel may return any value once [`SearchThread::is_stopped`] fires.
    fn search_move(
        &self,
        thread: &mut SearchThread<'_, Self>,
        mv: Move,
        alpha: Score,
        beta: Score,
        depth: Depth,
        node: NodeHandle,
    ) -> Result<Score, SearchError>;
}

/// Improvement of the root node's best move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootUpdate {
    pub best_move: Move,
    pub score: Score,
    pub depth: Depth,
}

/// Callback fired once per improved root best move. Called while the root
/// node is locked, so it must not call back into the coordinator.
pub type RootObserver = Arc<dyn Fn(&RootUpdate) + Send + Sync>;
