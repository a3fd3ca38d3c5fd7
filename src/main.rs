use anyhow::Context;
use cell_weight_2048::engine::{self as GameEngine, Board, Move};
use cell_weight_2048::expectimax::{
    BoundRefresh, Expectimax, ExpectimaxConfig, ExpectimaxParallel, KeyPolicy, SearchOutcome, SearchStats,
};
use cell_weight_2048::stats::DepthTimings;
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rand::{rngs::StdRng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let cfg = build_config(&args)?;
    info!("search config: {:?}", cfg);
    GameEngine::new();

    let mut policy = if args.parallel {
        Policy::Parallel(ExpectimaxParallel::with_config(cfg)?)
    } else {
        Policy::Sequential(Expectimax::with_config(cfg)?)
    };
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let pb = if args.quiet {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner} {elapsed_precise} | Moves: {pos} | {msg}")?
                .tick_chars("⠁⠃⠇⠧⠷⠿⠻⠟⠯⠷⠧⠇⠃"),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };

    let mut timings = DepthTimings::default();
    let mut board = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    let mut score: u64 = 0;
    let mut move_count: u64 = 0;
    let mut total_states: u64 = 0;
    if pb.is_none() {
        println!("{}", board);
    }

    loop {
        let start = Instant::now();
        let outcome = policy.search(board);
        timings.record(outcome.depth, start.elapsed());
        total_states = total_states.saturating_add(policy.last_stats().nodes);
        let Some(direction) = outcome.choice else { break };

        let (next, status) = board.make_move(direction, &mut rng);
        if !status.is_legal() {
            break;
        }
        board = next;
        score += status.score() as u64;
        move_count += 1;

        match &pb {
            Some(pb) => {
                pb.set_position(move_count);
                pb.set_message(format!("score: {} | max tile: {}", score, board.highest_tile()));
            }
            None => print_step(move_count, direction, score, board),
        }
        if args.steps.is_some_and(|limit| move_count >= limit) {
            break;
        }
    }

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    println!("{}", board);
    println!(
        "Game over. Moves: {}, score: {}, highest tile: {}, states considered: {}",
        move_count,
        score,
        board.highest_tile(),
        total_states
    );
    println!("Performance Stat");
    print!("{}", timings);
    let stats = policy.last_stats();
    info!("last search: {} nodes, {} cache lookups, {} misses", stats.nodes, stats.cache_lookups, stats.cache_misses);
    Ok(())
}

#[derive(Debug, Parser)]
#[command(name = "autoplay", about = "Let the expectimax advisor play 2048")]
struct Args {
    /// Seed for the tile-spawn RNG (random if omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many moves
    #[arg(long)]
    steps: Option<u64>,

    /// Show a spinner instead of printing every board
    #[arg(long)]
    quiet: bool,

    /// Search the four root moves on separate threads
    #[arg(long)]
    parallel: bool,

    /// TOML file with search settings; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of value-cache buckets
    #[arg(long)]
    table_size: Option<usize>,

    /// Visit only every n-th empty cell at chance nodes (0 = all)
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Hard cap on the root search depth
    #[arg(long)]
    depth_cap: Option<i32>,

    /// Which candidate boards raise the bound before descending
    #[arg(long, value_enum)]
    bound_refresh: Option<BoundRefreshArg>,

    /// Cache key: weak positional hash or full board comparison
    #[arg(long, value_enum)]
    key_policy: Option<KeyPolicyArg>,

    /// Disable the value cache
    #[arg(long)]
    no_cache: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BoundRefreshArg {
    First,
    Each,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KeyPolicyArg {
    Weak,
    Full,
}

enum Policy {
    Sequential(Expectimax),
    Parallel(ExpectimaxParallel),
}

impl Policy {
    fn search(&mut self, board: Board) -> SearchOutcome {
        match self {
            Policy::Sequential(ex) => ex.search(board),
            Policy::Parallel(ex) => ex.search(board),
        }
    }

    fn last_stats(&self) -> SearchStats {
        match self {
            Policy::Sequential(ex) => ex.last_stats(),
            Policy::Parallel(ex) => ex.last_stats(),
        }
    }
}

fn build_config(args: &Args) -> anyhow::Result<ExpectimaxConfig> {
    let mut cfg = match &args.config {
        Some(path) => load_config(path)?,
        None => ExpectimaxConfig::default(),
    };
    if let Some(size) = args.table_size {
        cfg.table_size = size;
    }
    if let Some(rate) = args.sample_rate {
        cfg.sample_rate = rate;
    }
    if args.depth_cap.is_some() {
        cfg.depth_cap = args.depth_cap;
    }
    if let Some(mode) = args.bound_refresh {
        cfg.bound_refresh = match mode {
            BoundRefreshArg::First => BoundRefresh::FirstCandidate,
            BoundRefreshArg::Each => BoundRefresh::EachCandidate,
        };
    }
    if let Some(policy) = args.key_policy {
        cfg.key_policy = match policy {
            KeyPolicyArg::Weak => KeyPolicy::WeakHash,
            KeyPolicyArg::Full => KeyPolicy::FullBoard,
        };
    }
    if args.no_cache {
        cfg.cache_enabled = false;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn load_config(path: &Path) -> anyhow::Result<ExpectimaxConfig> {
    let text = fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn print_step(move_count: u64, direction: Move, score: u64, board: Board) {
    println!("Move #{} {}, score: {}", move_count, direction, score);
    println!("{}", board);
}
