use rand::Rng;
use std::fmt;
use std::sync::OnceLock;

use crate::tables::VALUE_REAL;

/// A direction to move/merge tiles.
///
/// The declaration order is the search order, so ties at the root resolve
/// to the earliest direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    Left,
    Right,
    Up,
    Down,
}

impl Move {
    /// All directions in search order.
    pub const ALL: [Move; 4] = [Move::Left, Move::Right, Move::Up, Move::Down];

    /// Position of this direction in [`Move::ALL`].
    #[inline]
    pub fn index(self) -> usize { self as usize }

    #[inline]
    fn orientation(self) -> (Axis, bool) {
        match self {
            Move::Left => (Axis::Rows, false),
            Move::Right => (Axis::Rows, true),
            Move::Up => (Axis::Columns, false),
            Move::Down => (Axis::Columns, true),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Move::Left => "Left",
            Move::Right => "Right",
            Move::Up => "Up",
            Move::Down => "Down",
        };
        f.write_str(name)
    }
}

/// Which lines a move compresses: rows for left/right, columns for up/down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Rows,
    Columns,
}

/// Largest exponent a cell can hold.
pub const MAX_EXPONENT: u8 = 15;

const LINE_TABLE_SIZE: usize = 0x1_0000; // 65,536 possible 16-bit lines

type BoardRaw = u64;
type Line = u16;

/// Result of compressing one packed line toward position 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct LineShift {
    line: Line,
    score: u32,
    moved: bool,
}

static LINE_TABLE: OnceLock<Box<[LineShift]>> = OnceLock::new();

/// Outcome of sliding a board in one direction.
///
/// Encodes both legality and the score earned:
/// - `0`: nothing changed, the move is illegal;
/// - `1`: tiles moved but nothing merged;
/// - anything else: the sum of the merged tiles' values (always at least 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MoveStatus(u32);

impl MoveStatus {
    /// The direction is fully blocked.
    pub const BLOCKED: MoveStatus = MoveStatus(0);
    /// Tiles were compacted without any merge.
    pub const SHIFTED: MoveStatus = MoveStatus(1);

    #[inline]
    pub fn from_raw(raw: u32) -> Self { MoveStatus(raw) }

    #[inline]
    pub fn raw(self) -> u32 { self.0 }

    /// True if the move changed the board.
    #[inline]
    pub fn is_legal(self) -> bool { self.0 != 0 }

    /// Points earned by the move (0 for blocked or merge-free moves).
    #[inline]
    pub fn score(self) -> u32 {
        if self.0 == 1 { 0 } else { self.0 }
    }
}

/// Errors raised when building a board from untrusted cell values.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("cell ({row}, {col}) holds exponent {exponent}, above the maximum of 15")]
    ExponentOutOfRange { row: usize, col: usize, exponent: u8 },
}

/// Packed 4x4 2048 board as 16 4-bit exponents in a `u64`.
///
/// Cell `(0, 0)` (top-left) lives in the most significant nibble, rows
/// follow each other top to bottom. A nibble `k > 0` displays as `2^k`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board(BoardRaw);

impl Board {
    /// A constant empty board (all zeros).
    pub const EMPTY: Board = Board(0);

    /// Construct a `Board` from its raw packed representation.
    #[inline]
    pub fn from_raw(raw: BoardRaw) -> Self { Board(raw) }

    /// Borrow the raw packed `u64` for this `Board`.
    #[inline]
    pub fn raw(&self) -> BoardRaw { self.0 }

    /// Build a board from a grid of exponents, rejecting values above 15.
    ///
    /// ```
    /// use cell_weight_2048::engine::Board;
    /// let b = Board::from_rows([[1, 1, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
    /// assert_eq!(b.get(0, 1), 1);
    /// assert!(Board::from_rows([[16, 0, 0, 0], [0; 4], [0; 4], [0; 4]]).is_err());
    /// ```
    pub fn from_rows(rows: [[u8; 4]; 4]) -> Result<Self, BoardError> {
        let mut board = Board::EMPTY;
        for (row, cells) in rows.iter().enumerate() {
            for (col, &exponent) in cells.iter().enumerate() {
                if exponent > MAX_EXPONENT {
                    return Err(BoardError::ExponentOutOfRange { row, col, exponent });
                }
                board = board.with_tile(row, col, exponent);
            }
        }
        Ok(board)
    }

    /// The board as a grid of exponents.
    pub fn rows(self) -> [[u8; 4]; 4] {
        let mut rows = [[0u8; 4]; 4];
        for (row, cells) in rows.iter_mut().enumerate() {
            for (col, cell) in cells.iter_mut().enumerate() {
                *cell = self.get(row, col);
            }
        }
        rows
    }

    /// Exponent at row-major index `idx` (0..16).
    #[inline]
    pub fn cell(self, idx: usize) -> u8 {
        debug_assert!(idx < 16);
        ((self.0 >> (60 - 4 * idx)) & 0xf) as u8
    }

    /// Exponent at `(row, col)`.
    #[inline]
    pub fn get(self, row: usize, col: usize) -> u8 { self.cell(row * 4 + col) }

    /// Copy of this board with the cell at row-major index `idx` set to `exponent`.
    #[inline]
    pub fn with_cell(self, idx: usize, exponent: u8) -> Self {
        debug_assert!(idx < 16 && exponent <= MAX_EXPONENT);
        let shift = 60 - 4 * idx;
        Board((self.0 & !(0xf << shift)) | (((exponent & 0xf) as BoardRaw) << shift))
    }

    /// Copy of this board with `(row, col)` set to `exponent`.
    #[inline]
    pub fn with_tile(self, row: usize, col: usize, exponent: u8) -> Self {
        self.with_cell(row * 4 + col, exponent)
    }

    /// Slide/merge tiles in `dir`, returning the new board and the move status.
    ///
    /// The source board is never modified; no random tile is inserted.
    ///
    /// ```
    /// use cell_weight_2048::engine::{Board, Move};
    /// let b = Board::from_rows([[1, 1, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
    /// let (moved, status) = b.slide(Move::Left);
    /// assert_eq!(moved.rows()[0], [2, 0, 0, 0]);
    /// assert_eq!(status.raw(), 4);
    /// ```
    pub fn slide(self, dir: Move) -> (Self, MoveStatus) {
        let table = line_table();
        let (axis, reverse) = dir.orientation();
        let mut out = Board::EMPTY;
        let mut score = 0;
        let mut moved = false;
        for line_idx in 0..4 {
            let entry = table[self.line(axis, reverse, line_idx) as usize];
            out = out.or_line(axis, reverse, line_idx, entry.line);
            score += entry.score;
            moved |= entry.moved;
        }
        let status = if score > 0 { score } else { moved as u32 };
        (out, MoveStatus(status))
    }

    /// Return the board resulting from sliding/merging tiles in `dir`.
    #[inline]
    pub fn shift(self, dir: Move) -> Self { self.slide(dir).0 }

    /// Insert a random 2 (90%) or 4 (10%) tile into a random empty cell.
    ///
    /// A full board is returned unchanged.
    ///
    /// ```
    /// use cell_weight_2048::engine::Board;
    /// use rand::{rngs::StdRng, SeedableRng};
    /// let mut rng = StdRng::seed_from_u64(123);
    /// let b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    /// assert_eq!(b.count_empty(), 14);
    /// ```
    pub fn with_random_tile<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        let empty = self.count_empty();
        if empty == 0 {
            return self;
        }
        let target = rng.gen_range(0..empty) as usize;
        let tile = generate_random_tile(rng);
        match self.empty_cells().nth(target) {
            Some(idx) => self.with_cell(idx, tile),
            None => self,
        }
    }

    /// Perform a move, then insert a random tile if the move changed the board.
    pub fn make_move<R: Rng + ?Sized>(self, dir: Move, rng: &mut R) -> (Self, MoveStatus) {
        let (moved, status) = self.slide(dir);
        if status.is_legal() { (moved.with_random_tile(rng), status) } else { (self, status) }
    }

    /// Row-major indices of the empty cells.
    pub fn empty_cells(self) -> impl Iterator<Item = usize> {
        (0..16).filter(move |&idx| self.cell(idx) == 0)
    }

    // https://stackoverflow.com/questions/38225571/count-number-of-zero-nibbles-in-an-unsigned-64-bit-integer
    /// Count the number of empty cells.
    #[inline]
    pub fn count_empty(self) -> u32 {
        let mut x = self.0;
        x |= x >> 1;
        x |= x >> 2;
        x &= 0x1111_1111_1111_1111;
        16 - x.count_ones()
    }

    /// True if no direction changes the board.
    ///
    /// ```
    /// use cell_weight_2048::engine::Board;
    /// assert!(Board::EMPTY.is_game_over());
    /// ```
    pub fn is_game_over(self) -> bool {
        Move::ALL.iter().all(|&dir| !self.slide(dir).1.is_legal())
    }

    /// Highest displayed tile value (0 for the empty board).
    pub fn highest_tile(self) -> u32 {
        let max = (0..16).map(|idx| self.cell(idx)).max().unwrap_or(0);
        VALUE_REAL[max as usize]
    }

    /// Sum of the displayed values of every tile.
    pub fn tile_sum(self) -> u64 {
        (0..16).map(|idx| VALUE_REAL[self.cell(idx) as usize] as u64).sum()
    }

    /// Swap rows and columns.
    // Credit to Nneonneo
    pub fn transpose(self) -> Self {
        let x = self.0;
        let a1 = x & 0xF0F00F0FF0F00F0F;
        let a2 = x & 0x0000F0F00000F0F0;
        let a3 = x & 0x0F0F00000F0F0000;
        let a = a1 | (a2 << 12) | (a3 >> 12);
        let b1 = a & 0xFF00FF0000FF00FF;
        let b2 = a & 0x00FF00FF00000000;
        let b3 = a & 0x00000000FF00FF00;
        Board(b1 | (b2 >> 24) | (b3 << 24))
    }

    /// Reverse the order of the cells within each row.
    pub fn mirror_horizontal(self) -> Self {
        let x = self.0;
        let a = ((x & 0xFF00FF00FF00FF00) >> 8) | ((x & 0x00FF00FF00FF00FF) << 8);
        Board(((a & 0xF0F0F0F0F0F0F0F0) >> 4) | ((a & 0x0F0F0F0F0F0F0F0F) << 4))
    }

    /// Pack line `line_idx` so that position 0 (the edge tiles move toward)
    /// lands in the most significant nibble.
    #[inline]
    fn line(self, axis: Axis, reverse: bool, line_idx: usize) -> Line {
        (0..4).fold(0, |acc, pos| {
            let idx = cell_index(axis, reverse, line_idx, pos);
            acc | ((self.cell(idx) as Line) << (12 - 4 * pos))
        })
    }

    /// Inverse of [`Board::line`], OR-ing into a board whose line is still empty.
    #[inline]
    fn or_line(self, axis: Axis, reverse: bool, line_idx: usize, line: Line) -> Self {
        (0..4).fold(self, |board, pos| {
            let idx = cell_index(axis, reverse, line_idx, pos);
            let exponent = (line >> (12 - 4 * pos)) & 0xf;
            Board(board.0 | ((exponent as BoardRaw) << (60 - 4 * idx)))
        })
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:#018x})", self.0)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const RULE: &str = "---------------------------------";
        writeln!(f, "{}", RULE)?;
        for row in self.rows() {
            for exponent in row {
                write!(f, "|{}", format_val(exponent))?;
            }
            writeln!(f, "|")?;
            writeln!(f, "{}", RULE)?;
        }
        Ok(())
    }
}

impl From<BoardRaw> for Board { fn from(v: BoardRaw) -> Self { Board::from_raw(v) } }
impl From<Board> for BoardRaw { fn from(b: Board) -> Self { b.raw() } }

/// Initialize the line table on first use. Safe to call multiple times.
pub fn new() {
    let _ = line_table();
}

#[inline(always)]
fn line_table() -> &'static [LineShift] {
    LINE_TABLE
        .get_or_init(|| {
            let table: Vec<LineShift> = (0..LINE_TABLE_SIZE).map(|line| compress_line(line as Line)).collect();
            table.into_boxed_slice()
        })
        .as_ref()
}

/// Row-major index of position `pos` on line `line_idx`, counted from the
/// edge the tiles move toward.
#[inline(always)]
fn cell_index(axis: Axis, reverse: bool, line_idx: usize, pos: usize) -> usize {
    let pos = if reverse { 3 - pos } else { pos };
    match axis {
        Axis::Rows => line_idx * 4 + pos,
        Axis::Columns => pos * 4 + line_idx,
    }
}

fn unpack_line(line: Line) -> [u8; 4] {
    [(line >> 12) as u8 & 0xf, (line >> 8) as u8 & 0xf, (line >> 4) as u8 & 0xf, line as u8 & 0xf]
}

fn pack_line(tiles: [u8; 4]) -> Line {
    tiles.iter().fold(0, |acc, &t| (acc << 4) | t as Line)
}

/// Compress one line toward position 0.
///
/// Empty cells are skipped, a tile equal to the previously placed unmerged
/// tile merges into it, everything else packs into the next free slot.
/// Exponent-15 tiles never merge.
fn compress_line(line: Line) -> LineShift {
    let tiles = unpack_line(line);
    let mut out = [0u8; 4];
    let mut filled = 0;
    let mut last = 0;
    let mut score = 0;
    let mut moved = false;
    for (pos, &tile) in tiles.iter().enumerate() {
        if tile == 0 {
            continue;
        }
        if tile == last && tile < MAX_EXPONENT {
            last = 0;
            out[filled - 1] = tile + 1;
            score += VALUE_REAL[(tile + 1) as usize];
        } else {
            if filled < pos {
                moved = true;
            }
            last = tile;
            out[filled] = tile;
            filled += 1;
        }
    }
    LineShift { line: pack_line(out), score, moved }
}

fn generate_random_tile<R: Rng + ?Sized>(rng: &mut R) -> u8 { if rng.gen_range(0..10) < 9 { 1 } else { 2 } }

fn format_val(exponent: u8) -> String {
    match exponent {
        0 => String::from("       "),
        x => format!("{:^7}", VALUE_REAL[x as usize]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn row(tiles: [u8; 4]) -> Board {
        Board::from_rows([tiles, [0; 4], [0; 4], [0; 4]]).unwrap()
    }

    fn random_board(rng: &mut StdRng) -> Board {
        let mut board = Board::EMPTY;
        for idx in 0..16 {
            if rng.gen_range(0..3) > 0 {
                board = board.with_cell(idx, rng.gen_range(1..6));
            }
        }
        board
    }

    #[test]
    fn it_compress_line() {
        assert_eq!(compress_line(0x0000), LineShift { line: 0x0000, score: 0, moved: false });
        assert_eq!(compress_line(0x1212), LineShift { line: 0x1212, score: 0, moved: false });
        assert_eq!(compress_line(0x1122), LineShift { line: 0x2300, score: 4 + 8, moved: true });
        assert_eq!(compress_line(0x1001), LineShift { line: 0x2000, score: 4, moved: false });
        assert_eq!(compress_line(0x0012), LineShift { line: 0x1200, score: 0, moved: true });
        assert_eq!(compress_line(0x2220), LineShift { line: 0x3200, score: 8, moved: true });
        assert_eq!(compress_line(0xff00), LineShift { line: 0xff00, score: 0, moved: false });
    }

    #[test]
    fn merge_pair_scores_new_tile() {
        let (moved, status) = row([1, 1, 0, 0]).slide(Move::Left);
        assert_eq!(moved.rows()[0], [2, 0, 0, 0]);
        assert_eq!(status.raw(), 4);
        assert_eq!(status.score(), 4);
    }

    #[test]
    fn alternating_row_is_blocked() {
        let b = row([1, 2, 1, 2]);
        let (moved, status) = b.slide(Move::Left);
        assert_eq!(moved, b);
        assert_eq!(status, MoveStatus::BLOCKED);
        assert!(!status.is_legal());
    }

    #[test]
    fn compaction_without_merge_reports_one() {
        let (moved, status) = row([0, 0, 1, 2]).slide(Move::Left);
        assert_eq!(moved.rows()[0], [1, 2, 0, 0]);
        assert_eq!(status, MoveStatus::SHIFTED);
        assert_eq!(status.score(), 0);
    }

    #[test]
    fn merged_tile_does_not_merge_twice() {
        let (moved, status) = row([2, 1, 1, 0]).slide(Move::Left);
        assert_eq!(moved.rows()[0], [2, 2, 0, 0]);
        assert_eq!(status.raw(), 4);
    }

    #[test]
    fn top_exponent_saturates() {
        let b = row([15, 15, 0, 0]);
        assert_eq!(b.slide(Move::Left).1, MoveStatus::BLOCKED);
        let (moved, status) = b.slide(Move::Right);
        assert_eq!(moved.rows()[0], [0, 0, 15, 15]);
        assert_eq!(status, MoveStatus::SHIFTED);
    }

    #[test]
    fn test_move_left() {
        let game = Board::from_raw(0x1234133220021002);
        let (game, status) = game.slide(Move::Left);
        assert_eq!(game, Board::from_raw(0x1234142030001200));
        assert_eq!(status.raw(), 16 + 8);
    }

    #[test]
    fn test_move_right() {
        let game = Board::from_raw(0x1234133220021002);
        assert_eq!(game.shift(Move::Right), Board::from_raw(0x1234014200030012));
    }

    #[test]
    fn test_move_up() {
        let game = Board::from_raw(0x1121230033004222);
        assert_eq!(game.shift(Move::Up), Board::from_raw(0x1131240232004000));
    }

    #[test]
    fn test_move_down() {
        let game = Board::from_raw(0x1121230033004222);
        assert_eq!(game.shift(Move::Down), Board::from_raw(0x1000210034014232));
    }

    #[test]
    fn status_is_zero_iff_board_unchanged() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..500 {
            let b = random_board(&mut rng);
            for dir in Move::ALL {
                let (moved, status) = b.slide(dir);
                assert_eq!(status.is_legal(), moved != b, "{:?} {}", b, dir);
            }
        }
    }

    #[test]
    fn slide_conserves_tile_sum_and_scores_merges() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..500 {
            let b = random_board(&mut rng);
            for dir in Move::ALL {
                let (moved, status) = b.slide(dir);
                assert_eq!(moved.tile_sum(), b.tile_sum());
                // every merge removes one tile and scores the new tile's value
                let merges = moved.count_empty() - b.count_empty();
                if merges == 0 {
                    assert!(status.raw() <= 1);
                } else {
                    assert!(status.raw() >= 4 * merges);
                }
            }
        }
    }

    #[test]
    fn merge_score_equals_new_tile_value() {
        for k in 1..15u8 {
            let (moved, status) = row([k, k, 0, 0]).slide(Move::Left);
            assert_eq!(moved.get(0, 0), k + 1);
            assert_eq!(status.raw(), VALUE_REAL[(k + 1) as usize]);
        }
    }

    #[test]
    fn mirror_symmetry() {
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..300 {
            let b = random_board(&mut rng);
            let (right, right_status) = b.slide(Move::Right);
            let (left, left_status) = b.mirror_horizontal().slide(Move::Left);
            assert_eq!(right, left.mirror_horizontal());
            assert_eq!(right_status, left_status);

            let (up, up_status) = b.slide(Move::Up);
            let (t_left, t_status) = b.transpose().slide(Move::Left);
            assert_eq!(up, t_left.transpose());
            assert_eq!(up_status, t_status);

            let (down, down_status) = b.slide(Move::Down);
            let (t_right, t_right_status) = b.transpose().slide(Move::Right);
            assert_eq!(down, t_right.transpose());
            assert_eq!(down_status, t_right_status);
        }
    }

    #[test]
    fn transpose_and_mirror_are_involutions() {
        let b = Board::from_raw(0x0123456789abcdef);
        assert_eq!(b.transpose().transpose(), b);
        assert_eq!(b.mirror_horizontal().mirror_horizontal(), b);
        assert_eq!(b.mirror_horizontal().rows()[0], [3, 2, 1, 0]);
        assert_eq!(b.transpose().rows()[0], [0, 4, 8, 12]);
    }

    #[test]
    fn it_count_empty() {
        assert_eq!(Board::from_raw(0x1111000011110000).count_empty(), 8);
        assert_eq!(Board::from_raw(0x1100000000000000).count_empty(), 14);
        assert_eq!(Board::EMPTY.count_empty(), 16);
        assert_eq!(Board::from_raw(0x0123456789abcdef).empty_cells().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn it_insert_random_tile() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut game = Board::EMPTY;
        for _ in 0..16 {
            game = game.with_random_tile(&mut rng);
        }
        assert_eq!(game.count_empty(), 0);
        assert!((0..16).all(|idx| matches!(game.cell(idx), 1 | 2)));
        assert_eq!(game.with_random_tile(&mut rng), game);
    }

    #[test]
    fn make_move_ignores_blocked_direction() {
        let mut rng = StdRng::seed_from_u64(8);
        let b = row([1, 2, 0, 0]);
        let (after, status) = b.make_move(Move::Left, &mut rng);
        assert_eq!(after, b);
        assert!(!status.is_legal());
        let (after, status) = b.make_move(Move::Right, &mut rng);
        assert!(status.is_legal());
        assert_eq!(after.count_empty(), b.count_empty() - 1);
    }

    #[test]
    fn full_board_without_pairs_is_game_over() {
        let b = Board::from_rows([[1, 2, 1, 2], [2, 1, 2, 1], [1, 2, 1, 2], [2, 1, 2, 1]]).unwrap();
        assert!(b.is_game_over());
        assert!(!b.with_tile(0, 1, 1).is_game_over());
    }

    #[test]
    fn from_rows_rejects_large_exponent() {
        let err = Board::from_rows([[0; 4], [0, 0, 16, 0], [0; 4], [0; 4]]).unwrap_err();
        assert_eq!(err, BoardError::ExponentOutOfRange { row: 1, col: 2, exponent: 16 });
    }

    #[test]
    fn it_highest_tile_and_sum() {
        let game = Board::from_raw(0x0123456789abcdef);
        assert_eq!(game.highest_tile(), 32768);
        assert_eq!(row([1, 1, 3, 0]).tile_sum(), 12);
        assert_eq!(Board::EMPTY.highest_tile(), 0);
    }

    #[test]
    fn display_shows_tile_values() {
        let shown = row([1, 11, 0, 0]).to_string();
        assert!(shown.contains("2048"));
        assert!(shown.contains("   2   "));
        assert_eq!(shown.lines().count(), 9);
    }
}
