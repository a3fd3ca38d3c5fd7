use crate::engine::Board;
use crate::tables::{CELL_WEIGHT, VALUE_WEIGHT};

/// Positional score of a board: every tile's exponent weight scaled by its
/// cell's weight, so large tiles stacked toward the top-left corner score best.
#[inline]
pub fn evaluate(board: Board) -> u64 {
    (0..16).fold(0, |score, idx| {
        let weight = VALUE_WEIGHT[board.cell(idx) as usize] as u64;
        score + weight * CELL_WEIGHT[idx / 4][idx % 4] as u64
    })
}
