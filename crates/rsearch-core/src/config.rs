//! Coordinator configuration.
//!
//! Read once when a [`crate::Coordinator`] is built. Values can come from
//! code, from a TOML file, or be overridden by environment variables.

use std::num::NonZeroUsize;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{DEFAULT_MAX_HEIGHT, Depth};

/// Environment override for [`SearchConfig::threads`].
pub const ENV_THREADS: &str = "RSEARCH_THREADS";
/// Environment override for [`SearchConfig::worker_stack_mb`].
pub const ENV_WORKER_STACK_MB: &str = "RSEARCH_WORKER_STACK_MB";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Total number of search threads including the master.
    pub threads: usize,
    /// Pin each worker thread to one CPU.
    pub cpu_affinity: bool,
    /// Master switch for splitting. When off every node is searched
    /// sequentially even with several threads.
    pub allow_splitting: bool,
    /// Minimum remaining depth at which a node may be split.
    pub split_min_depth: Depth,
    /// Minimum number of moves still queued at a node for a split.
    pub split_min_moves_todo: usize,
    /// Maximum node height. Bounds the node arena.
    pub max_height: usize,
    /// Worker thread stack size in MiB. `None` keeps the platform default.
    pub worker_stack_mb: Option<usize>,
    /// Number of stop polls between two deadline checks.
    pub time_poll_interval: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            threads: std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
            cpu_affinity: false,
            allow_splitting: true,
            split_min_depth: 5,
            split_min_moves_todo: 2,
            max_height: DEFAULT_MAX_HEIGHT,
            worker_stack_mb: None,
            time_poll_interval: 1024,
        }
    }
}

impl SearchConfig {
    /// Single-threaded configuration with otherwise default values.
    pub fn single_threaded() -> Self {
        Self {
            threads: 1,
            ..Self::default()
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_split_thresholds(mut self, min_depth: Depth, min_moves_todo: usize) -> Self {
        self.split_min_depth = min_depth;
        self.split_min_moves_todo = min_moves_todo;
        self
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SearchConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Apply `RSEARCH_*` environment overrides. Unparsable values are logged
    /// and ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(threads) = env_usize(ENV_THREADS) {
            self.threads = threads;
        }
        if let Some(mb) = env_usize(ENV_WORKER_STACK_MB) {
            self.worker_stack_mb = Some(mb);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(invalid("threads", "must be at least 1"));
        }
        if self.split_min_depth < 1 {
            return Err(invalid("split_min_depth", "must be at least 1"));
        }
        if self.split_min_moves_todo == 0 {
            return Err(invalid("split_min_moves_todo", "must be at least 1"));
        }
        if self.max_height == 0 {
            return Err(invalid("max_height", "must be at least 1"));
        }
        if self.time_poll_interval == 0 {
            return Err(invalid("time_poll_interval", "must be at least 1"));
        }
        if self.worker_stack_mb == Some(0) {
            return Err(invalid("worker_stack_mb", "must be positive when set"));
        }
        Ok(())
    }

    /// Node arena capacity: every thread's own path plus one borrowed path.
    pub(crate) fn arena_capacity(&self) -> usize {
        self.threads.max(1) * 2 * (self.max_height + 1)
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

fn env_usize(key: &str) -> Option<usize> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<usize>() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("Ignoring {key}={raw:?}: not a non-negative integer");
            None
        }
    }
}
