use log::debug;
use rayon::prelude::*;

use crate::engine::{Board, Move};

use super::search::{candidates, prelude, refresh_bound, root_depth, Prelude, SearchContext, Selection};
use super::{warm_engine, BranchEval, ConfigError, ExpectimaxConfig, SearchOutcome, SearchStats};

/// Parallel Expectimax: the four root branches run on rayon workers.
///
/// Each branch owns a separate [`SearchContext`], so caches and sampling
/// counters are partitioned per worker and no bucket ever sees concurrent
/// writers. Every branch descends with the root's refreshed bound; unlike
/// the sequential search, an improving branch cannot raise the bound for
/// its siblings, so the two can disagree on close calls. The root value is
/// cached in the context of the chosen branch.
pub struct ExpectimaxParallel {
    cfg: ExpectimaxConfig,
    contexts: Vec<SearchContext>,
    stats: SearchStats,
}

impl ExpectimaxParallel {
    pub fn new() -> Self { Self::build(ExpectimaxConfig::default()) }

    pub fn with_config(cfg: ExpectimaxConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self::build(cfg))
    }

    fn build(cfg: ExpectimaxConfig) -> Self {
        warm_engine();
        let contexts = Move::ALL.iter().map(|_| SearchContext::new(&cfg)).collect();
        Self { cfg, contexts, stats: SearchStats::default() }
    }

    /// Compute the best move using parallel expectimax.
    #[inline]
    pub fn choose_move(&mut self, board: Board) -> Option<Move> { self.search(board).choice }

    /// Back-compat shim.
    ///
    /// Equivalent to [`Self::choose_move`].
    #[inline]
    pub fn get_next_move(&mut self, board: Board) -> Option<Move> { self.choose_move(board) }

    /// Compute EV for each direction in parallel, in [`Move::ALL`] order.
    pub fn branch_evals(&mut self, board: Board) -> [BranchEval; 4] { self.search(board).branches }

    /// Root search with one worker per direction.
    ///
    /// ```
    /// use cell_weight_2048::engine::Board;
    /// use cell_weight_2048::expectimax::ExpectimaxParallel;
    /// let b = Board::from_rows([[2, 1, 0, 0], [1, 0, 0, 0], [0; 4], [0; 4]]).unwrap();
    /// let mut ex = ExpectimaxParallel::new();
    /// let out = ex.search(b);
    /// assert!(out.choice.is_some());
    /// // left and up are blocked
    /// assert_eq!(out.branches.iter().filter(|b| b.legal).count(), 2);
    /// ```
    pub fn search(&mut self, board: Board) -> SearchOutcome {
        let depth = root_depth(&self.cfg, board);
        let before: Vec<_> = self.contexts.iter().map(|ctx| ctx.cache.stats()).collect();
        self.contexts.iter_mut().for_each(|ctx| ctx.nodes = 0);

        let best = match prelude(board, depth, 0.0) {
            Prelude::Leaf(estimate) => Selection { value: estimate, ..Selection::new() },
            Prelude::Expand { depth, next_depth } => {
                let moves = candidates(board);
                let max = if depth > 2 { refresh_bound(self.cfg.bound_refresh, &moves, 0.0) } else { 0.0 };
                let cfg = &self.cfg;
                let evs: Vec<Option<f64>> = self
                    .contexts
                    .par_iter_mut()
                    .enumerate()
                    .map(|(i, ctx)| {
                        let (candidate, status) = moves[i];
                        if status.is_legal() { Some(ctx.chance_node(cfg, candidate, next_depth, max)) } else { None }
                    })
                    .collect();
                let mut best = Selection::new();
                for (&dir, ev) in Move::ALL.iter().zip(evs) {
                    if let Some(ev) = ev {
                        best.offer(dir, ev);
                    }
                }
                if cfg.cache_enabled {
                    // the root entry goes to the chosen branch's worker
                    let owner = best.choice.map_or(0, Move::index);
                    self.contexts[owner].cache.store(board, depth, best.value);
                }
                best
            }
        };

        self.stats.nodes = 1 + self.contexts.iter().map(|ctx| ctx.nodes).sum::<u64>();
        self.stats.peak_nodes = self.stats.peak_nodes.max(self.stats.nodes);
        let (lookups, misses) = self.contexts.iter().zip(before).fold((0, 0), |(lookups, misses), (ctx, before)| {
            let after = ctx.cache.stats();
            (lookups + after.lookups - before.lookups, misses + after.misses - before.misses)
        });
        self.stats.cache_lookups = lookups;
        self.stats.cache_misses = misses;
        debug!(
            "parallel search depth={} choice={:?} value={:.1} nodes={}",
            depth, best.choice, best.value, self.stats.nodes
        );
        best.into_outcome(depth)
    }

    /// EV at the root (0 when no move is legal).
    pub fn state_value(&mut self, board: Board) -> f64 { self.search(board).value }

    /// Statistics collected from the last search.
    #[inline]
    pub fn last_stats(&self) -> SearchStats { self.stats }

    /// Reset accumulated stats to zero.
    #[inline]
    pub fn reset_stats(&mut self) { self.stats = SearchStats::default(); }

    /// Forget every cached value in every worker.
    pub fn clear_cache(&mut self) { self.contexts.iter_mut().for_each(|ctx| ctx.cache.clear()); }
}

impl Default for ExpectimaxParallel { fn default() -> Self { Self::new() } }
