//! Headless orchard runner.
//!
//! # Usage
//!
//! ```bash
//! # Play a single session and print a summary
//! cargo run -p orchard_headless -- run --seed 42
//!
//! # Same, but as JSON on stdout
//! cargo run -p orchard_headless -- run --seed 42 --json
//!
//! # Run a batch for balance checks
//! cargo run -p orchard_headless -- batch --count 500 --seed 1000 --output results/batch.json
//!
//! # Verify determinism
//! cargo run -p orchard_headless -- verify --seed 12345 --runs 5
//!
//! # Print a generated map
//! cargo run -p orchard_headless -- map --seed 42
//! ```
//!
//! Logs go to stderr. Set `RUST_LOG` to override `--verbose`.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use orchard_core::data::{Difficulty, GameRules};
use orchard_core::session::{Session, SessionConfig};
use orchard_headless::{
    ascii_map::{render_map, AsciiConfig},
    batch::{run_batch, verify_determinism, BatchConfig},
    rules_file::load_rules_or_default,
    runner::{run_session, GameReport, RunConfig},
};

#[derive(Parser)]
#[command(name = "orchard_headless")]
#[command(about = "Headless orchard session runner for balance checks and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// RON rules file to use instead of the built-in defaults
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a single session with the scripted player
    Run {
        /// Session seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Opponent difficulty: easy, normal or hard
        #[arg(short, long, default_value = "normal")]
        difficulty: String,

        /// Maximum game duration in minutes (game time, not wall clock)
        #[arg(short, long, default_value = "10")]
        minutes: u32,

        /// Print the report as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Run many seeds in parallel
    Batch {
        /// Number of games to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Starting random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Maximum parallel games (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Opponent difficulty: easy, normal or hard
        #[arg(short, long, default_value = "normal")]
        difficulty: String,

        /// Maximum game duration in minutes
        #[arg(short, long, default_value = "10")]
        minutes: u32,

        /// Write the full results to this JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify determinism by running the same seed multiple times
    Verify {
        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Game minutes per run
        #[arg(short, long, default_value = "5")]
        minutes: u32,
    },

    /// Print a generated map as ASCII
    Map {
        /// Map seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Blank out tiles the player has not seen
        #[arg(long)]
        fog: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs on stderr; stdout carries reports and maps
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let registry = tracing_subscriber::registry().with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true),
    );
    match EnvFilter::try_from_default_env() {
        Ok(filter) => registry.with(filter).init(),
        Err(_) => registry.with(LevelFilter::from_level(level)).init(),
    }

    let rules = match load_rules_or_default(cli.rules.as_deref()) {
        Ok(rules) => rules,
        Err(e) => {
            eprintln!("FATAL: {e}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Run {
            seed,
            difficulty,
            minutes,
            json,
        } => cmd_run(&rules, seed, &difficulty, minutes, json),
        Commands::Batch {
            count,
            seed,
            parallel,
            difficulty,
            minutes,
            output,
        } => cmd_batch(&rules, count, seed, parallel, &difficulty, minutes, output),
        Commands::Verify { seed, runs, minutes } => cmd_verify(&rules, seed, runs, minutes),
        Commands::Map { seed, fog } => cmd_map(rules, seed, fog),
    }
}

fn parse_difficulty(name: &str) -> Difficulty {
    Difficulty::from_str(name).unwrap_or_else(|e| {
        eprintln!("FATAL: {e}");
        std::process::exit(2);
    })
}

fn print_report(report: &GameReport) {
    eprintln!("=== Session {} ({:?}) ===", report.seed, report.difficulty);
    eprintln!("  Winner:   {}", report.winner_label());
    eprintln!("  Ticks:    {} ({:.1}s game time)", report.ticks, report.elapsed_secs);
    eprintln!("  Waves:    {}", report.waves);
    eprintln!(
        "  Player:   {} apples, {} gathered, {} income, {} agents, {} structures, {} lost",
        report.player.economy.apples,
        report.player.economy.gathered,
        report.player.economy.income,
        report.player.agents,
        report.player.structures,
        report.player.losses,
    );
    eprintln!(
        "  Opponent: {} apples, {} gathered, {} agents, {} structures, {} lost",
        report.enemy.economy.apples,
        report.enemy.economy.gathered,
        report.enemy.agents,
        report.enemy.structures,
        report.enemy.losses,
    );
    eprintln!("  Hash:     {:016x}", report.final_hash);
}

/// Play one session
fn cmd_run(rules: &GameRules, seed: u64, difficulty: &str, minutes: u32, json: bool) {
    let config = RunConfig::new(seed)
        .with_difficulty(parse_difficulty(difficulty))
        .with_minutes(minutes);

    let report = match run_session(rules, &config) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("FATAL: {e}");
            std::process::exit(1);
        }
    };

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("FATAL: cannot encode report: {e}");
                std::process::exit(1);
            }
        }
    } else {
        print_report(&report);
    }
}

/// Run a batch of sessions
fn cmd_batch(
    rules: &GameRules,
    count: u32,
    seed: u64,
    parallel: u32,
    difficulty: &str,
    minutes: u32,
    output: Option<PathBuf>,
) {
    let config = BatchConfig {
        game_count: count,
        seed_start: seed,
        parallel_games: parallel,
        difficulty: parse_difficulty(difficulty),
        output: output.clone(),
        ..BatchConfig::default()
    }
    .with_minutes(minutes);

    let results = run_batch(rules, config);
    let summary = &results.summary;

    eprintln!("=== Batch Results ===");
    eprintln!("  Games:        {}", summary.total_games);
    eprintln!(
        "  Player wins:  {} ({:.1}%)",
        summary.player_wins,
        summary.player_win_rate() * 100.0
    );
    eprintln!("  Enemy wins:   {}", summary.enemy_wins);
    eprintln!("  Draws:        {}", summary.draws);
    eprintln!("  Mean ticks:   {:.0}", summary.mean_ticks);
    eprintln!("  Mean waves:   {:.2}", summary.mean_waves);
    eprintln!("  Errors:       {}", results.errors.len());
    eprintln!("  Wall time:    {:.1}s", results.duration_seconds);

    if let Some(path) = output {
        if let Err(e) = results.save(&path) {
            tracing::error!(error = %e, path = %path.display(), "failed to save results");
            eprintln!("FATAL: Cannot write results to '{}': {}", path.display(), e);
            std::process::exit(1);
        }
        eprintln!("  Saved to:     {}", path.display());
    }

    if !results.errors.is_empty() {
        std::process::exit(1);
    }
}

/// Verify determinism
fn cmd_verify(rules: &GameRules, seed: u64, runs: u32, minutes: u32) {
    tracing::info!("Verifying determinism: seed {} ({} runs, {} min)", seed, runs, minutes);

    let config = RunConfig::new(seed).with_minutes(minutes);
    match verify_determinism(rules, &config, runs) {
        Ok(true) => eprintln!("PASS: All {runs} runs produced identical results"),
        Ok(false) => {
            eprintln!("FAIL: Non-determinism detected!");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("FATAL: {e}");
            std::process::exit(1);
        }
    }
}

/// Print a generated map
fn cmd_map(rules: GameRules, seed: u64, fog: bool) {
    let session = match Session::new(rules, SessionConfig::with_seed(seed)) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("FATAL: {e}");
            std::process::exit(1);
        }
    };
    let config = AsciiConfig {
        show_fog: fog,
        ..AsciiConfig::default()
    };
    print!("{}", render_map(&session, config));
}
