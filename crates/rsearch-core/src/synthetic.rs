//! Deterministic synthetic game for tests, benches and tools.
//!
//! Positions are 64-bit hashes. The branching factor and the static score
//! of a position are derived from its hash, so the whole tree is a pure
//! function of the root seed and can be searched by any number of threads
//! with identical results.

use rand::{RngCore, SeedableRng};
use rand_xoshiro::SplitMix64;

use crate::error::SearchError;
use crate::kernel::SearchKernel;
use crate::node::NodeHandle;
use crate::types::{Depth, Move, SCORE_INF, Score};
use crate::worker::SearchThread;

const BRANCH_SALT: u64 = 0x5DEE_CE66_D1CE_4E5B;
const EVAL_SALT: u64 = 0x2545_F491_4F6C_DD1D;

#[inline]
fn mix(x: u64) -> u64 {
    SplitMix64::seed_from_u64(x).next_u64()
}

/// A position of the synthetic game with play/undo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyntheticPosition {
    hash: u64,
    history: Vec<u64>,
}

impl SyntheticPosition {
    pub fn new(seed: u64) -> Self {
        Self {
            hash: mix(seed),
            history: Vec::new(),
        }
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn ply(&self) -> usize {
        self.history.len()
    }

    pub fn play(&mut self, mv: Move) {
        self.history.push(self.hash);
        self.hash = mix(self.hash ^ u64::from(mv.to_u32()).rotate_left(17));
    }

    pub fn undo(&mut self) {
        if let Some(prev) = self.history.pop() {
            self.hash = prev;
        }
    }
}

/// Evaluator state of one context.
#[derive(Debug, Clone, Default)]
pub struct SyntheticEval {
    pub evaluations: u64,
}

/// Negamax/PVS kernel over the synthetic game.
#[derive(Debug, Clone)]
pub struct SyntheticKernel {
    pub min_branching: u32,
    pub max_branching: u32,
    /// Extra work per leaf evaluation, to make leaves expensive enough for
    /// splits to pay off.
    pub leaf_cost: u32,
}

impl Default for SyntheticKernel {
    fn default() -> Self {
        Self {
            min_branching: 2,
            max_branching: 6,
            leaf_cost: 0,
        }
    }
}

impl SyntheticKernel {
    pub fn new(min_branching: u32, max_branching: u32) -> Self {
        let min_branching = min_branching.max(1);
        Self {
            min_branching,
            max_branching: max_branching.max(min_branching),
            leaf_cost: 0,
        }
    }

    pub fn with_leaf_cost(mut self, leaf_cost: u32) -> Self {
        self.leaf_cost = leaf_cost;
        self
    }

    fn branching(&self, position: &SyntheticPosition) -> u32 {
        let span = u64::from(self.max_branching - self.min_branching + 1);
        self.min_branching + (mix(position.hash ^ BRANCH_SALT) % span) as u32
    }

    /// Static score of `position` from the side to move's point of view.
    pub fn static_score(&self, position: &SyntheticPosition) -> Score {
        if self.leaf_cost > 0 {
            self.burn(position.hash);
        }
        // 29 significant bits, centered on zero
        ((mix(position.hash ^ EVAL_SALT) >> 35) as Score) - (1 << 28)
    }

    fn burn(&self, seed: u64) {
        let mut h = seed;
        for i in 0..self.leaf_cost {
            h = mix(h ^ u64::from(i));
        }
        std::hint::black_box(h);
    }

    /// Plain minimax without pruning or threads. Reference for tests.
    pub fn minimax(&self, position: &mut SyntheticPosition, depth: Depth) -> (Option<Move>, Score) {
        if depth <= 0 {
            return (None, self.static_score(position));
        }
        let mut moves = Vec::new();
        self.generate_moves(position, &mut moves);
        let mut best = (None, -SCORE_INF);
        for mv in moves {
            position.play(mv);
            let score = -self.minimax(position, depth - 1).1;
            position.undo();
            if score > best.1 {
                best = (Some(mv), score);
            }
        }
        best
    }

    fn negamax(
        &self,
        thread: &mut SearchThread<'_, Self>,
        alpha: Score,
        beta: Score,
        depth: Depth,
        parent: NodeHandle,
    ) -> Result<Score, SearchError> {
        thread.ctx.nodes += 1;
        if thread.is_stopped() {
            return Ok(0);
        }
        if depth <= 0 {
            thread.ctx.eval.evaluations += 1;
            return Ok(self.static_score(&thread.ctx.position));
        }
        let mut moves = Vec::new();
        self.generate_moves(&thread.ctx.position, &mut moves);
        if moves.len() == 1 {
            return self.search_move(thread, moves[0], alpha, beta, depth, parent);
        }
        Ok(thread
            .search_node(alpha, beta, depth, &moves, Some(parent))?
            .best_score)
    }
}

impl SearchKernel for SyntheticKernel {
    type Position = SyntheticPosition;
    type Evaluator = SyntheticEval;

    fn generate_moves(&self, position: &SyntheticPosition, moves: &mut Vec<Move>) {
        moves.clear();
        moves.extend((1..=self.branching(position)).map(Move::from_u32));
    }

    fn search_move(
        &self,
        thread: &mut SearchThread<'_, Self>,
        mv: Move,
        alpha: Score,
        beta: Score,
        depth: Depth,
        node: NodeHandle,
    ) -> Result<Score, SearchError> {
        thread.ctx.position.play(mv);
        let score = self.pvs(thread, alpha, beta, depth, node);
        thread.ctx.position.undo();
        score
    }
}

impl SyntheticKernel {
    /// Null-window scout of the played move, re-searched with the full
    /// window when it lands strictly inside it.
    fn pvs(
        &self,
        thread: &mut SearchThread<'_, Self>,
        alpha: Score,
        beta: Score,
        depth: Depth,
        node: NodeHandle,
    ) -> Result<Score, SearchError> {
        if alpha > -SCORE_INF && beta - alpha > 1 {
            let scout = -self.negamax(thread, -alpha - 1, -alpha, depth - 1, node)?;
            if scout > alpha && scout < beta {
                return Ok(-self.negamax(thread, -beta, -alpha, depth - 1, node)?);
            }
            return Ok(scout);
        }
        Ok(-self.negamax(thread, -beta, -alpha, depth - 1, node)?)
    }
}
