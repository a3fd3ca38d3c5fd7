use std::time::Instant;

use log::debug;

use crate::engine::{Board, Move};
use crate::stats::DepthTimings;

use super::search::SearchContext;
use super::{warm_engine, BranchEval, CacheStats, ConfigError, ExpectimaxConfig, SearchOutcome, SearchStats, ValueCache};

/// Single-threaded Expectimax search.
///
/// Owns its value cache and sampling counter, so separate instances never
/// interfere. The cache persists across calls and is only superseded by
/// later writes.
pub struct Expectimax {
    cfg: ExpectimaxConfig,
    ctx: SearchContext,
    stats: SearchStats,
}

impl Expectimax {
    pub fn new() -> Self { Self::build(ExpectimaxConfig::default()) }

    /// Construct with custom knobs, rejecting invalid ones.
    pub fn with_config(cfg: ExpectimaxConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self::build(cfg))
    }

    fn build(cfg: ExpectimaxConfig) -> Self {
        warm_engine();
        let ctx = SearchContext::new(&cfg);
        Self { cfg, ctx, stats: SearchStats::default() }
    }

    #[inline]
    pub fn config(&self) -> &ExpectimaxConfig { &self.cfg }

    /// Pick the move with the best expected value, or `None` when the game is over.
    ///
    /// Example
    /// ```
    /// use cell_weight_2048::engine::Board;
    /// use cell_weight_2048::expectimax::Expectimax;
    /// use rand::{SeedableRng, rngs::StdRng};
    /// let mut rng = StdRng::seed_from_u64(7);
    /// let b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    /// let mut ex = Expectimax::new();
    /// assert!(ex.choose_move(b).is_some());
    /// ```
    #[inline]
    pub fn choose_move(&mut self, board: Board) -> Option<Move> { self.search(board).choice }

    /// Back-compat shim.
    ///
    /// Equivalent to [`Self::choose_move`].
    #[inline]
    pub fn get_next_move(&mut self, board: Board) -> Option<Move> { self.choose_move(board) }

    /// [`Self::choose_move`], recording the elapsed time under the root depth.
    pub fn choose_move_timed(&mut self, board: Board, timings: &mut DepthTimings) -> Option<Move> {
        let start = Instant::now();
        let outcome = self.search(board);
        timings.record(outcome.depth, start.elapsed());
        outcome.choice
    }

    /// Run a root search and return the full outcome.
    ///
    /// ```
    /// use cell_weight_2048::engine::{Board, Move};
    /// use cell_weight_2048::expectimax::Expectimax;
    /// let b = Board::from_rows([[1, 2, 3, 4], [0; 4], [0; 4], [0; 4]]).unwrap();
    /// let mut ex = Expectimax::new();
    /// let out = ex.search(b);
    /// // left and up are blocked
    /// assert!(!out.branches[Move::Left.index()].legal);
    /// assert!(out.branches[Move::Down.index()].legal);
    /// assert_eq!(out.depth, 4);
    /// ```
    pub fn search(&mut self, board: Board) -> SearchOutcome {
        let before = self.ctx.cache.stats();
        self.ctx.nodes = 0;
        let outcome = self.ctx.search(&self.cfg, board);
        self.record_stats(before);
        debug!(
            "search depth={} choice={:?} value={:.1} nodes={} cache_misses={}/{}",
            outcome.depth,
            outcome.choice,
            outcome.value,
            self.stats.nodes,
            self.stats.cache_misses,
            self.stats.cache_lookups
        );
        outcome
    }

    /// Compute EV for each direction.
    ///
    /// Returns a fixed array in [`Move::ALL`] order and marks illegal moves
    /// as `legal=false`.
    pub fn branch_evals(&mut self, board: Board) -> [BranchEval; 4] { self.search(board).branches }

    /// EV at the root, equivalent to the best branch EV (0 when no move is legal).
    pub fn state_value(&mut self, board: Board) -> f64 { self.search(board).value }

    /// Statistics collected from the last search.
    #[inline]
    pub fn last_stats(&self) -> SearchStats { self.stats }

    /// Reset accumulated stats to zero.
    #[inline]
    pub fn reset_stats(&mut self) {
        self.stats = SearchStats::default();
        self.ctx.cache.reset_stats();
    }

    /// The value cache, for diagnostics.
    #[inline]
    pub fn cache(&self) -> &ValueCache { &self.ctx.cache }

    /// Forget every cached value.
    pub fn clear_cache(&mut self) { self.ctx.cache.clear(); }

    fn record_stats(&mut self, before: CacheStats) {
        let after = self.ctx.cache.stats();
        self.stats.nodes = self.ctx.nodes;
        self.stats.peak_nodes = self.stats.peak_nodes.max(self.ctx.nodes);
        self.stats.cache_lookups = after.lookups - before.lookups;
        self.stats.cache_misses = after.misses - before.misses;
    }
}

impl Default for Expectimax { fn default() -> Self { Self::new() } }
