//! Parallel alpha-beta search coordinator based on the Young Brothers Wait
//! Concept (YBWC).
//!
//! The first move of every node is searched by the node's owner alone. Once
//! it has returned, the remaining moves may be shared with one helper: either
//! an idle pooled worker or a thread that is blocked waiting on an ancestor
//! node. Fail-highs stop the helper subtree through a tree of
//! [`StopSignal`]s, and the owner joins its helper before leaving the node.
//!
//! The game itself (positions, move generation, evaluation, the sequential
//! recursion) is supplied through the [`SearchKernel`] trait. A deterministic
//! synthetic game lives in [`synthetic`].

mod affinity;
pub mod config;
pub mod context;
pub mod coordinator;
#[cfg(feature = "deadlock_detection")]
pub mod deadlock;
pub mod error;
pub mod kernel;
pub mod node;
mod pool;
mod spinlock;
mod split;
pub mod stats;
pub mod stop;
pub mod synthetic;
pub mod types;
pub mod worker;

pub use config::SearchConfig;
pub use context::SearchContext;
pub use coordinator::{Coordinator, RootResult};
pub use error::{ConfigError, NodeError, SearchError};
pub use kernel::{RootObserver, RootUpdate, SearchKernel};
pub use node::{HelperPhase, NodeHandle, NodeInfo, NodeSummary, RecordOutcome, Window};
pub use pool::SlotPhase;
pub use stats::SplitStatsSnapshot;
pub use stop::{StopHandle, StopSignal, StopState};
pub use types::{Depth, Move, SCORE_INF, Score};
pub use worker::{NodeResult, SearchThread};
