use crate::engine::{Board, Move, MoveStatus};
use crate::tables::depth_for_empty;

use super::cache::ValueCache;
use super::heuristic::evaluate;
use super::{BoundRefresh, BranchEval, ExpectimaxConfig, SearchOutcome};

/// Boards scoring below this fraction of the running bound lose one ply.
const WEAK_BOARD_RATIO: f64 = 0.7;
/// Spawn weights: a "2" is nine times as likely as a "4".
const TWO_WEIGHT: u32 = 9;
const FOUR_WEIGHT: u32 = 1;
/// "4" spawns are only expanded with at least this much depth left.
const FOUR_MIN_DEPTH: i32 = 5;

/// Mutable state of one search thread: the value cache and the spawn-sampling
/// counter live here rather than in globals.
pub(crate) struct SearchContext {
    pub(crate) cache: ValueCache,
    pub(crate) sample_counter: u64,
    pub(crate) nodes: u64,
}

/// How a max node proceeds after its depth adjustments.
pub(crate) enum Prelude {
    /// Depth ran out: the positional estimate is the value.
    Leaf(f64),
    Expand { depth: i32, next_depth: i32 },
}

/// Running best direction at a max node. Ties keep the earliest direction.
pub(crate) struct Selection {
    pub(crate) value: f64,
    pub(crate) choice: Option<Move>,
    pub(crate) branches: [BranchEval; 4],
}

impl Selection {
    pub(crate) fn new() -> Self {
        Self { value: 0.0, choice: None, branches: Move::ALL.map(BranchEval::illegal) }
    }

    /// Record a legal branch; true if it became the new best.
    pub(crate) fn offer(&mut self, dir: Move, ev: f64) -> bool {
        self.branches[dir.index()] = BranchEval { dir, ev, legal: true };
        if ev > self.value {
            self.value = ev;
            self.choice = Some(dir);
            true
        } else {
            // a legal move is still a move even when every outcome scores 0
            if self.choice.is_none() {
                self.choice = Some(dir);
            }
            false
        }
    }

    pub(crate) fn into_outcome(self, depth: i32) -> SearchOutcome {
        SearchOutcome { choice: self.choice, value: self.value, depth, branches: self.branches }
    }
}

/// Starting depth for a root search on `board`.
pub(crate) fn root_depth(cfg: &ExpectimaxConfig, board: Board) -> i32 {
    let depth = depth_for_empty(board.count_empty());
    cfg.depth_cap.map_or(depth, |cap| depth.min(cap))
}

/// Depth bookkeeping shared by every max node.
pub(crate) fn prelude(board: Board, depth: i32, max: f64) -> Prelude {
    let estimate = evaluate(board) as f64;
    let mut depth = depth;
    if estimate < max * WEAK_BOARD_RATIO {
        depth -= 1;
    }
    if depth <= 0 {
        return Prelude::Leaf(estimate);
    }
    let mut next_depth = depth - 1;
    if depth > 3 && next_depth > depth_for_empty(board.count_empty()) {
        next_depth -= 1;
    }
    Prelude::Expand { depth, next_depth }
}

/// Slide `board` in every direction, in [`Move::ALL`] order.
#[inline]
pub(crate) fn candidates(board: Board) -> [(Board, MoveStatus); 4] {
    Move::ALL.map(|dir| board.slide(dir))
}

/// Raise `max` to the best positional score among the candidates.
pub(crate) fn refresh_bound(mode: BoundRefresh, candidates: &[(Board, MoveStatus); 4], max: f64) -> f64 {
    (0..candidates.len()).fold(max, |max, i| {
        let board = match mode {
            BoundRefresh::FirstCandidate => candidates[0].0,
            BoundRefresh::EachCandidate => candidates[i].0,
        };
        max.max(evaluate(board) as f64)
    })
}

impl SearchContext {
    pub(crate) fn new(cfg: &ExpectimaxConfig) -> Self {
        Self { cache: ValueCache::new(cfg.table_size, cfg.key_policy), sample_counter: 0, nodes: 0 }
    }

    /// Full root search: the direction with the best expected value.
    pub(crate) fn search(&mut self, cfg: &ExpectimaxConfig, board: Board) -> SearchOutcome {
        let depth = root_depth(cfg, board);
        self.max_node(cfg, board, depth, true, 0.0).into_outcome(depth)
    }

    /// Value of `board` when it is the player's turn.
    ///
    /// Non-root nodes (`want_choice == false`) may be answered from the cache;
    /// every expanded node is written back.
    pub(crate) fn max_node(
        &mut self,
        cfg: &ExpectimaxConfig,
        board: Board,
        depth: i32,
        want_choice: bool,
        max: f64,
    ) -> Selection {
        self.nodes += 1;
        let (depth, next_depth) = match prelude(board, depth, max) {
            Prelude::Leaf(estimate) => return Selection { value: estimate, ..Selection::new() },
            Prelude::Expand { depth, next_depth } => (depth, next_depth),
        };
        if !want_choice && cfg.cache_enabled {
            if let Some(value) = self.cache.lookup(board, depth) {
                return Selection { value, ..Selection::new() };
            }
        }

        let moves = candidates(board);
        let mut max = max;
        if depth > 2 {
            max = refresh_bound(cfg.bound_refresh, &moves, max);
        }

        let mut best = Selection::new();
        for (&dir, &(candidate, status)) in Move::ALL.iter().zip(moves.iter()) {
            if !status.is_legal() {
                continue;
            }
            let ev = self.chance_node(cfg, candidate, next_depth, max);
            if best.offer(dir, ev) {
                max = ev;
            }
        }

        if cfg.cache_enabled {
            self.cache.store(board, depth, best.value);
        }
        best
    }

    /// Expected value of `board` over every possible tile spawn.
    pub(crate) fn chance_node(&mut self, cfg: &ExpectimaxConfig, board: Board, depth: i32, max: f64) -> f64 {
        let mut sum = 0.0;
        let mut weight = 0;
        for idx in board.empty_cells() {
            if cfg.sample_rate > 0 {
                self.sample_counter += 1;
                if self.sample_counter % cfg.sample_rate as u64 != 0 {
                    continue;
                }
            }
            weight += TWO_WEIGHT;
            sum += TWO_WEIGHT as f64 * self.max_node(cfg, board.with_cell(idx, 1), depth, false, max).value;
            if depth >= FOUR_MIN_DEPTH {
                weight += FOUR_WEIGHT;
                sum += FOUR_WEIGHT as f64 * self.max_node(cfg, board.with_cell(idx, 2), depth, false, max).value;
            }
        }
        if weight == 0 {
            // every empty cell was sampled away
            return evaluate(board) as f64;
        }
        sum / weight as f64
    }
}
