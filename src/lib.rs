//! cell-weight-2048: a 2048 move engine + depth-adaptive Expectimax advisor
//!
//! This crate provides:
//! - A compact `Board` type with a single parameterized slide/merge routine
//!   (`slide`, `shift`, `make_move`, ...) shared by the host and the search
//! - Static heuristic tables (`tables` module)
//! - An Expectimax advisor (`expectimax` module) scoring boards with a
//!   positional cell-weight heuristic and memoizing values in a small,
//!   lossy hash-indexed cache
//! - Per-depth timing buckets for diagnostics (`stats` module)
//!
//! Quick start:
//! ```
//! use cell_weight_2048::engine::{self as GameEngine, Board, Move};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // One-time table init (optional, done lazily otherwise)
//! GameEngine::new();
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let b0 = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
//! let (b1, status) = b0.slide(Move::Left);
//! assert_eq!(status.is_legal(), b1 != b0);
//! ```
//!
//! Full loop (simplest possible)
//! ```
//! use cell_weight_2048::engine::Board;
//! use cell_weight_2048::expectimax::Expectimax;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut policy = Expectimax::new();
//! let mut rng = StdRng::seed_from_u64(123);
//! let mut b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
//! let mut score = 0;
//! let mut moves = 0u32;
//!
//! // keep doctests fast
//! while moves < 4 {
//!     let Some(dir) = policy.choose_move(b) else { break };
//!     let (next, status) = b.make_move(dir, &mut rng);
//!     score += status.score();
//!     b = next;
//!     moves += 1;
//! }
//! assert!(moves > 0);
//! let _ = score;
//! ```
//!
pub mod engine;
pub mod expectimax;
pub mod stats;
pub mod tables;
