use serde::{Deserialize, Serialize};

use crate::engine::Board;
use crate::tables::PRIMES;

/// Default number of buckets (a prime).
pub const DEFAULT_TABLE_SIZE: usize = 35_317;

/// How a cache slot decides that it holds the queried board.
///
/// - `WeakHash`: only the positional hash is compared. Two different boards
///   with the same hash share a value. Fast and small.
/// - `FullBoard`: the stored board must also be equal, so collisions miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyPolicy {
    #[default]
    WeakHash,
    FullBoard,
}

/// Lookup counters, mirroring what the host prints in its diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub lookups: u64,
    pub misses: u64,
}

impl CacheStats {
    #[inline]
    pub fn hits(&self) -> u64 { self.lookups - self.misses }
}

#[derive(Clone, Copy)]
struct Slot {
    hash: u32,
    depth: i32,
    value: f64,
}

/// Cheap positional fingerprint: `Σ exponent × prime[cell]`.
#[inline]
pub fn board_hash(board: Board) -> u32 {
    (0..16).fold(0, |hash, idx| hash + board.cell(idx) as u32 * PRIMES[idx / 4][idx % 4])
}

/// Fixed-size, direct-mapped value cache keyed by [`board_hash`].
///
/// Writes overwrite whatever occupied the bucket; there is no chaining.
/// Boards themselves are only kept under [`KeyPolicy::FullBoard`].
///
/// ```
/// use cell_weight_2048::engine::Board;
/// use cell_weight_2048::expectimax::{KeyPolicy, ValueCache};
/// let mut cache = ValueCache::new(35_317, KeyPolicy::WeakHash);
/// let b = Board::EMPTY.with_tile(0, 0, 3);
/// cache.store(b, 4, 12.5);
/// assert_eq!(cache.lookup(b, 3), Some(12.5));
/// assert_eq!(cache.lookup(b, 5), None);
/// assert_eq!(cache.stats().misses, 1);
/// ```
pub struct ValueCache {
    slots: Box<[Option<Slot>]>,
    boards: Option<Box<[Board]>>,
    policy: KeyPolicy,
    stats: CacheStats,
}

impl ValueCache {
    /// A cache with `table_size` buckets (at least one).
    pub fn new(table_size: usize, policy: KeyPolicy) -> Self {
        let table_size = table_size.max(1);
        let boards = match policy {
            KeyPolicy::WeakHash => None,
            KeyPolicy::FullBoard => Some(vec![Board::EMPTY; table_size].into_boxed_slice()),
        };
        Self {
            slots: vec![None; table_size].into_boxed_slice(),
            boards,
            policy,
            stats: CacheStats::default(),
        }
    }

    /// Number of buckets.
    #[inline]
    pub fn capacity(&self) -> usize { self.slots.len() }

    #[inline]
    pub fn policy(&self) -> KeyPolicy { self.policy }

    /// Record `value` for `board` searched to `depth`, evicting the bucket's occupant.
    #[inline]
    pub fn store(&mut self, board: Board, depth: i32, value: f64) {
        let hash = board_hash(board);
        let index = self.bucket(hash);
        self.slots[index] = Some(Slot { hash, depth, value });
        if let Some(boards) = self.boards.as_mut() {
            boards[index] = board;
        }
    }

    /// Cached value for `board` if its bucket was stored with a depth of at least `min_depth`.
    #[inline]
    pub fn lookup(&mut self, board: Board, min_depth: i32) -> Option<f64> {
        let hash = board_hash(board);
        let index = self.bucket(hash);
        self.stats.lookups += 1;
        let occupant = self.slots[index];
        match occupant {
            Some(slot) if slot.hash == hash && slot.depth >= min_depth && self.matches(index, board) => {
                Some(slot.value)
            }
            _ => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    #[inline]
    pub fn stats(&self) -> CacheStats { self.stats }

    pub fn reset_stats(&mut self) { self.stats = CacheStats::default(); }

    #[inline]
    fn bucket(&self, hash: u32) -> usize { hash as usize % self.slots.len() }

    #[inline]
    fn matches(&self, index: usize, board: Board) -> bool {
        self.boards.as_ref().map_or(true, |boards| boards[index] == board)
    }
}

impl Default for ValueCache {
    fn default() -> Self { Self::new(DEFAULT_TABLE_SIZE, KeyPolicy::default()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 12 * 22189 + 1 * 108301 == 13 * 28813
    fn colliding_pair() -> (Board, Board) {
        let a = Board::EMPTY.with_cell(0, 12).with_cell(13, 1);
        let b = Board::EMPTY.with_cell(1, 13);
        (a, b)
    }

    #[test]
    fn it_board_hash() {
        assert_eq!(board_hash(Board::EMPTY), 0);
        assert_eq!(board_hash(Board::EMPTY.with_tile(0, 0, 1)), 22189);
        assert_eq!(board_hash(Board::EMPTY.with_tile(3, 3, 2)), 2 * 115249);
        let (a, b) = colliding_pair();
        assert_ne!(a, b);
        assert_eq!(board_hash(a), board_hash(b));
    }

    #[test]
    fn hit_requires_enough_depth() {
        let mut cache = ValueCache::default();
        let b = Board::from_raw(0x1200_0300_0000_0001);
        assert_eq!(cache.lookup(b, 1), None);
        cache.store(b, 4, 99.0);
        for d in 0..=4 {
            assert_eq!(cache.lookup(b, d), Some(99.0));
        }
        assert_eq!(cache.lookup(b, 5), None);
        assert_eq!(cache.stats(), CacheStats { lookups: 7, misses: 2 });
        assert_eq!(cache.stats().hits(), 5);
    }

    #[test]
    fn store_overwrites_bucket() {
        let mut cache = ValueCache::new(1, KeyPolicy::WeakHash);
        let a = Board::EMPTY.with_tile(0, 0, 1);
        let b = Board::EMPTY.with_tile(0, 1, 1);
        cache.store(a, 3, 1.0);
        cache.store(b, 1, 2.0);
        assert_eq!(cache.lookup(a, 1), None);
        assert_eq!(cache.lookup(b, 1), Some(2.0));
        cache.store(b, 5, 3.0);
        assert_eq!(cache.lookup(b, 5), Some(3.0));
    }

    #[test]
    fn weak_hash_shares_values_between_colliding_boards() {
        let (a, b) = colliding_pair();
        let mut cache = ValueCache::new(DEFAULT_TABLE_SIZE, KeyPolicy::WeakHash);
        cache.store(a, 3, 42.0);
        assert_eq!(cache.lookup(b, 3), Some(42.0));
    }

    #[test]
    fn full_board_policy_rejects_collisions() {
        let (a, b) = colliding_pair();
        let mut cache = ValueCache::new(DEFAULT_TABLE_SIZE, KeyPolicy::FullBoard);
        cache.store(a, 3, 42.0);
        assert_eq!(cache.lookup(b, 3), None);
        assert_eq!(cache.lookup(a, 3), Some(42.0));
    }

    #[test]
    fn weak_hash_slots_carry_no_board() {
        assert_eq!(std::mem::size_of::<Slot>(), 16);
        assert!(ValueCache::new(11, KeyPolicy::WeakHash).boards.is_none());
        let full = ValueCache::new(11, KeyPolicy::FullBoard);
        assert_eq!(full.boards.as_ref().map(|b| b.len()), Some(11));
    }

    #[test]
    fn full_board_policy_tracks_bucket_owner() {
        let (a, b) = colliding_pair();
        let mut cache = ValueCache::new(1, KeyPolicy::FullBoard);
        cache.store(a, 2, 1.0);
        assert_eq!(cache.lookup(a, 2), Some(1.0));
        cache.store(b, 2, 2.0);
        assert_eq!(cache.lookup(a, 2), None);
        assert_eq!(cache.lookup(b, 2), Some(2.0));
    }

    #[test]
    fn clear_and_reset() {
        let mut cache = ValueCache::new(7, KeyPolicy::WeakHash);
        let b = Board::EMPTY.with_tile(2, 2, 4);
        cache.store(b, 2, 8.0);
        assert_eq!(cache.lookup(b, 2), Some(8.0));
        cache.clear();
        assert_eq!(cache.lookup(b, 0), None);
        assert_eq!(cache.stats().lookups, 2);
        cache.reset_stats();
        assert_eq!(cache.stats(), CacheStats::default());
        assert_eq!(ValueCache::new(0, KeyPolicy::WeakHash).capacity(), 1);
    }
}
