//! Speedup benchmark of the YBWC coordinator on the synthetic game.
//!
//! Searches the same set of positions with each requested thread count and
//! reports nodes, NPS, speedup over the first thread count and split
//! counters. Without a time limit every run must agree on best move and
//! score with the first thread count.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{info, warn};
use rsearch_core::synthetic::{SyntheticKernel, SyntheticPosition};
use rsearch_core::{Coordinator, Depth, Move, RootResult, Score, SearchConfig, SplitStatsSnapshot};

#[derive(Parser, Debug)]
#[command(author, version, about = "YBWC parallel search speedup benchmark")]
struct Args {
    /// Thread counts to compare, e.g. "1,2,4,8"
    #[arg(long, value_delimiter = ',', default_values_t = vec![1usize, 2, 4])]
    threads: Vec<usize>,

    /// Iterative deepening limit
    #[arg(long, default_value_t = 7)]
    depth: Depth,

    /// Number of root positions (seeds `seed..seed+positions`)
    #[arg(long, default_value_t = 4)]
    positions: u64,

    /// First root seed
    #[arg(long, default_value_t = 1)]
    seed: u64,

    #[arg(long, default_value_t = 4)]
    min_branching: u32,

    #[arg(long, default_value_t = 8)]
    max_branching: u32,

    /// Extra hashing rounds per leaf evaluation
    #[arg(long, default_value_t = 100)]
    leaf_cost: u32,

    /// Per-position time limit in milliseconds
    #[arg(long)]
    time_limit_ms: Option<u64>,

    /// TOML file with coordinator settings; `threads` is overridden
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override split_min_depth
    #[arg(long)]
    split_min_depth: Option<Depth>,

    /// Override split_min_moves_todo
    #[arg(long)]
    split_min_moves_todo: Option<usize>,

    /// Pin worker threads to CPUs
    #[arg(long)]
    affinity: bool,

    /// Exit with an error when a run disagrees with the first thread count
    #[arg(long)]
    strict: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Debug, Default)]
struct RunTotals {
    nodes: u64,
    elapsed: Duration,
    splits: u64,
    borrowed: u64,
    exhausted: u64,
    parallel_cutoffs: u64,
}

impl RunTotals {
    fn add(&mut self, result: &RootResult, stats: &SplitStatsSnapshot) {
        self.nodes += result.nodes;
        self.elapsed += result.elapsed;
        self.splits += stats.splits();
        self.borrowed += stats.borrowed;
        self.exhausted += stats.pool_exhausted;
        self.parallel_cutoffs += stats.parallel_cutoffs;
    }

    fn nps(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 { (self.nodes as f64 / secs) as u64 } else { 0 }
    }
}

fn main() {
    let args = Args::parse();

    use std::io::Write;
    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, log_level),
    )
    .format(|buf, record| {
        writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args())
    })
    .write_style(env_logger::WriteStyle::Never)
    .target(env_logger::Target::Stderr)
    .init();

    #[cfg(feature = "deadlock_detection")]
    rsearch_core::deadlock::install_deadlock_detector(Duration::from_secs(1), false);

    if let Err(e) = run(&args) {
        log::error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

fn base_config(args: &Args) -> Result<SearchConfig> {
    let mut config = match &args.config {
        Some(path) => SearchConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => SearchConfig::default(),
    };
    config.apply_env_overrides();
    if let Some(depth) = args.split_min_depth {
        config.split_min_depth = depth;
    }
    if let Some(todo) = args.split_min_moves_todo {
        config.split_min_moves_todo = todo;
    }
    if args.affinity {
        config.cpu_affinity = true;
    }
    Ok(config)
}

fn run(args: &Args) -> Result<()> {
    if args.threads.is_empty() {
        bail!("no thread counts given");
    }
    if args.positions == 0 {
        bail!("--positions must be at least 1");
    }
    let base = base_config(args)?;
    let kernel =
        SyntheticKernel::new(args.min_branching, args.max_branching).with_leaf_cost(args.leaf_cost);
    let time_limit = args.time_limit_ms.map(Duration::from_millis);
    let seeds: Vec<u64> = (args.seed..args.seed + args.positions).collect();
    info!(
        "depth={} positions={} branching={}..={} leaf_cost={} split_min_depth={} \
         split_min_moves_todo={}",
        args.depth,
        args.positions,
        kernel.min_branching,
        kernel.max_branching,
        args.leaf_cost,
        base.split_min_depth,
        base.split_min_moves_todo
    );

    let mut reference: Option<Vec<(Move, Score)>> = None;
    let mut reference_elapsed = None;
    let mut mismatches = 0usize;

    println!(
        "{:>7} {:>12} {:>10} {:>12} {:>8} {:>8} {:>8} {:>9} {:>8}",
        "threads", "nodes", "time_ms", "nps", "speedup", "splits", "borrow", "exhausted", "cutoffs"
    );
    for &threads in &args.threads {
        let config = base.clone().with_threads(threads);
        let coord = Coordinator::new(kernel.clone(), config)
            .with_context(|| format!("failed to start {threads} thread(s)"))?;

        let mut totals = RunTotals::default();
        let mut answers = Vec::with_capacity(seeds.len());
        for &seed in &seeds {
            let result = coord
                .root_search(SyntheticPosition::new(seed), args.depth, time_limit)
                .with_context(|| format!("search failed (seed {seed}, {threads} thread(s))"))?;
            totals.add(&result, &coord.stats());
            answers.push((result.best_move, result.score));
        }

        match (&reference, time_limit) {
            (None, _) => reference = Some(answers),
            (Some(expected), None) => {
                for (seed, (got, want)) in seeds.iter().zip(answers.iter().zip(expected)) {
                    if got != want {
                        mismatches += 1;
                        warn!(
                            "seed {seed}: {threads} thread(s) found {} {} but reference is {} {}",
                            got.0, got.1, want.0, want.1
                        );
                    }
                }
            }
            // timed runs stop at different depths
            (Some(_), Some(_)) => {}
        }

        let base_elapsed = *reference_elapsed.get_or_insert(totals.elapsed);
        let speedup = if totals.elapsed.is_zero() {
            0.0
        } else {
            base_elapsed.as_secs_f64() / totals.elapsed.as_secs_f64()
        };
        println!(
            "{:>7} {:>12} {:>10} {:>12} {:>8.2} {:>8} {:>8} {:>9} {:>8}",
            threads,
            totals.nodes,
            totals.elapsed.as_millis(),
            totals.nps(),
            speedup,
            totals.splits,
            totals.borrowed,
            totals.exhausted,
            totals.parallel_cutoffs
        );
    }

    if mismatches > 0 {
        if args.strict {
            bail!("{mismatches} result(s) differ from the reference run");
        }
        warn!("{mismatches} result(s) differ from the reference run");
    }
    Ok(())
}
