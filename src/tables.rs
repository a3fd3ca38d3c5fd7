//! Static tables shared by the move engine, the evaluator and the cache.
//!
//! Everything here is computed at compile time and never changes.

/// Number of distinct cell exponents (0 = empty, 15 = 32768).
pub const EXPONENTS: usize = 16;

/// Heuristic weight of an exponent: `3^(k-1)` for `k >= 1`, `0` for empty.
pub const VALUE_WEIGHT: [u32; EXPONENTS] = value_weight_table();

/// Displayed tile value of an exponent: `2^k` for `k >= 1`, `0` for empty.
pub const VALUE_REAL: [u32; EXPONENTS] = value_real_table();

/// Positional bias, decreasing away from the top-left corner.
pub const CELL_WEIGHT: [[u32; 4]; 4] = [
    [17, 13, 11, 10],
    [13, 10, 9, 9],
    [11, 9, 8, 8],
    [10, 9, 8, 8],
];

/// Distinct primes used to fingerprint a board for the value cache.
pub const PRIMES: [[u32; 4]; 4] = [
    [22189, 28813, 37633, 43201],
    [47629, 60493, 63949, 65713],
    [69313, 73009, 76801, 84673],
    [106033, 108301, 112909, 115249],
];

/// Baseline search depth indexed by the number of empty cells.
///
/// Index 16 only occurs for the empty board.
pub const DEPTH_MAP: [i32; EXPONENTS + 1] = [6, 6, 6, 6, 5, 5, 5, 5, 5, 5, 4, 4, 4, 4, 4, 4, 4];

/// Recommended root depth for a board with `empty` empty cells.
#[inline]
pub fn depth_for_empty(empty: u32) -> i32 {
    DEPTH_MAP[(empty as usize).min(EXPONENTS)]
}

const fn value_weight_table() -> [u32; EXPONENTS] {
    let mut table = [0u32; EXPONENTS];
    let mut weight = 1u32;
    let mut k = 1;
    while k < EXPONENTS {
        table[k] = weight;
        weight *= 3;
        k += 1;
    }
    table
}

const fn value_real_table() -> [u32; EXPONENTS] {
    let mut table = [0u32; EXPONENTS];
    let mut k = 1;
    while k < EXPONENTS {
        table[k] = 1 << k;
        k += 1;
    }
    table
}
