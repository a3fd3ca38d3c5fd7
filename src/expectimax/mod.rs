//! Expectimax search policy (single-threaded and parallel) for 2048.
//!
//! This module provides two policy implementations:
//! - [`Expectimax`]: single-threaded expectimax, the reference behavior.
//! - [`ExpectimaxParallel`]: the four root branches on rayon workers, each
//!   with its own value cache.
//!
//! The search alternates a max node (pick the best of the four directions)
//! with a chance node (average over every possible "2"/"4" spawn). Its depth
//! comes from the board's sparsity and shrinks further on boards that score
//! well below the best candidate seen so far.
//!
//! Quick start
//! ```
//! use cell_weight_2048::engine::{Board, Move};
//! use cell_weight_2048::expectimax::Expectimax;
//!
//! let board = Board::from_rows([[1, 1, 0, 0], [2, 0, 0, 0], [0; 4], [0; 4]]).unwrap();
//! let mut ex = Expectimax::new();
//! let choice = ex.choose_move(board);
//! assert!(choice.is_some());
//! ```

use serde::{Deserialize, Serialize};

use crate::engine::{self, Move};

mod cache;
mod heuristic;
mod search;
mod search_par;
mod search_seq;

pub use cache::{board_hash, CacheStats, KeyPolicy, ValueCache, DEFAULT_TABLE_SIZE};
pub use heuristic::evaluate;
pub use search_par::ExpectimaxParallel;
pub use search_seq::Expectimax;

/// Which candidate boards raise the bound before a max node descends.
///
/// `FirstCandidate` scores the left-move candidate four times, which is
/// what the tuned player always did; `EachCandidate` scores all four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoundRefresh {
    #[default]
    FirstCandidate,
    EachCandidate,
}

/// Errors from an invalid [`ExpectimaxConfig`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cache table size must be at least 1")]
    EmptyTable,
    #[error("depth cap must be at least 1, got {0}")]
    DepthCap(i32),
}

/// Configurable knobs for Expectimax. Defaults reproduce the tuned player.
///
/// - `table_size`: number of value-cache buckets.
/// - `key_policy`: whether a cache hit also requires board equality.
/// - `sample_rate`: visit only every n-th empty cell at chance nodes (0 = all).
/// - `bound_refresh`: see [`BoundRefresh`].
/// - `depth_cap`: optional hard cap on the root depth.
/// - `cache_enabled`: enable/disable the value cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpectimaxConfig {
    pub table_size: usize,
    pub key_policy: KeyPolicy,
    pub sample_rate: u32,
    pub bound_refresh: BoundRefresh,
    pub depth_cap: Option<i32>,
    pub cache_enabled: bool,
}

impl Default for ExpectimaxConfig {
    fn default() -> Self {
        Self {
            table_size: DEFAULT_TABLE_SIZE,
            key_policy: KeyPolicy::WeakHash,
            sample_rate: 0,
            bound_refresh: BoundRefresh::FirstCandidate,
            depth_cap: None,
            cache_enabled: true,
        }
    }
}

impl ExpectimaxConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table_size == 0 {
            return Err(ConfigError::EmptyTable);
        }
        match self.depth_cap {
            Some(cap) if cap < 1 => Err(ConfigError::DepthCap(cap)),
            _ => Ok(()),
        }
    }
}

/// Per-branch expected value at the root.
///
/// - `ev` is the expected value for taking `dir` from the current board.
/// - `legal` is false when the move is a no-op for the current board.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchEval {
    pub dir: Move,
    pub ev: f64,
    pub legal: bool,
}

impl BranchEval {
    fn illegal(dir: Move) -> Self { Self { dir, ev: 0.0, legal: false } }
}

/// Everything one root search produced.
///
/// `choice` is `None` exactly when no direction is legal (game over); the
/// value is then 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOutcome {
    pub choice: Option<Move>,
    pub value: f64,
    /// Root depth the search started from.
    pub depth: i32,
    /// Branch values in [`Move::ALL`] order.
    pub branches: [BranchEval; 4],
}

/// Basic search stats for a single evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub nodes: u64,
    pub peak_nodes: u64,
    pub cache_lookups: u64,
    pub cache_misses: u64,
}

/// Common helper for constructors to ensure tables are initialized.
fn warm_engine() {
    // Safe to call multiple times.
    engine::new();
}
