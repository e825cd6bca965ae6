//! Batch runner for balance testing.
//!
//! Plays many seeds in parallel with rayon and aggregates the outcomes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use orchard_core::data::{Difficulty, GameRules};
use orchard_core::factions::Faction;

use crate::runner::{run_session, GameReport, RunConfig, TICKS_PER_MINUTE};

/// Configuration for a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of games to run
    pub game_count: u32,
    /// Seed of the first game; game `i` uses `seed_start + i`
    pub seed_start: u64,
    /// Maximum parallel games (0 = use rayon default)
    pub parallel_games: u32,
    /// Opponent difficulty for every game
    pub difficulty: Difficulty,
    /// Maximum ticks per game (0 = unlimited)
    pub max_ticks: u64,
    /// Where to write results, if anywhere
    pub output: Option<PathBuf>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            game_count: 100,
            seed_start: 0,
            parallel_games: 0,
            difficulty: Difficulty::Normal,
            max_ticks: 10 * TICKS_PER_MINUTE,
            output: None,
        }
    }
}

impl BatchConfig {
    /// Create config for `game_count` games
    #[must_use]
    pub fn new(game_count: u32) -> Self {
        Self {
            game_count,
            ..Default::default()
        }
    }

    /// Set seed start
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set the tick cap from game minutes
    #[must_use]
    pub fn with_minutes(mut self, minutes: u32) -> Self {
        self.max_ticks = u64::from(minutes) * TICKS_PER_MINUTE;
        self
    }

    fn run_config(&self, index: u32) -> RunConfig {
        RunConfig {
            seed: self.seed_start.wrapping_add(u64::from(index)),
            difficulty: self.difficulty,
            max_ticks: self.max_ticks,
            ..RunConfig::default()
        }
    }
}

/// Aggregate outcome of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Games completed.
    pub total_games: u32,
    /// Games the player won.
    pub player_wins: u32,
    /// Games the opponent won.
    pub enemy_wins: u32,
    /// Games that hit the tick cap.
    pub draws: u32,
    /// Mean game length in ticks.
    pub mean_ticks: f64,
    /// Mean apples the player gathered.
    pub mean_player_gathered: f64,
    /// Mean attack waves per game.
    pub mean_waves: f64,
}

impl BatchSummary {
    /// Summarise a set of reports.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_games(games: &[GameReport]) -> Self {
        if games.is_empty() {
            return Self::default();
        }
        let count = games.len() as f64;
        let wins = |side: Faction| {
            let n = games.iter().filter(|g| g.winner == Some(side)).count();
            u32::try_from(n).unwrap_or(u32::MAX)
        };
        let player_wins = wins(Faction::Player);
        let enemy_wins = wins(Faction::Enemy);
        let total_games = u32::try_from(games.len()).unwrap_or(u32::MAX);

        Self {
            total_games,
            player_wins,
            enemy_wins,
            draws: total_games - player_wins - enemy_wins,
            mean_ticks: games.iter().map(|g| g.ticks as f64).sum::<f64>() / count,
            mean_player_gathered: games
                .iter()
                .map(|g| g.player.economy.gathered as f64)
                .sum::<f64>()
                / count,
            mean_waves: games.iter().map(|g| f64::from(g.waves)).sum::<f64>() / count,
        }
    }

    /// Fraction of games the player won.
    #[must_use]
    pub fn player_win_rate(&self) -> f64 {
        f64::from(self.player_wins) / f64::from(self.total_games.max(1))
    }
}

/// Error during batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Game index
    pub game_index: u32,
    /// Seed used
    pub seed: u64,
    /// Error message
    pub message: String,
}

/// Results from a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used
    pub config: BatchConfig,
    /// Individual game reports, in seed order
    pub games: Vec<GameReport>,
    /// Aggregate summary
    pub summary: BatchSummary,
    /// Total runtime
    pub duration_seconds: f64,
    /// Errors encountered
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Progress tracking for batch runs
#[derive(Debug)]
pub struct BatchProgress {
    /// Total games
    pub total: u32,
    completed: AtomicU32,
    start_time: Instant,
}

impl BatchProgress {
    /// Create new progress tracker
    #[must_use]
    pub fn new(total: u32) -> Self {
        Self {
            total,
            completed: AtomicU32::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a completed game, returning the new count
    pub fn record_completion(&self) -> u32 {
        self.completed.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Get current completion count
    #[must_use]
    pub fn current(&self) -> u32 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Get completion percentage
    #[must_use]
    pub fn percentage(&self) -> f64 {
        f64::from(self.current()) / f64::from(self.total.max(1)) * 100.0
    }

    /// Get estimated time remaining
    #[must_use]
    pub fn eta(&self) -> Duration {
        let completed = self.current();
        if completed == 0 {
            return Duration::from_secs(0);
        }
        let per_game = self.start_time.elapsed().as_secs_f64() / f64::from(completed);
        let remaining = self.total.saturating_sub(completed);
        Duration::from_secs_f64(per_game * f64::from(remaining))
    }
}

/// Run a batch of games
#[allow(clippy::cast_precision_loss)]
pub fn run_batch(rules: &GameRules, config: BatchConfig) -> BatchResults {
    let start = Instant::now();
    let progress = BatchProgress::new(config.game_count);

    info!(
        games = config.game_count,
        seed = config.seed_start,
        difficulty = ?config.difficulty,
        "starting batch"
    );

    let play = || -> Vec<Result<GameReport, BatchError>> {
        (0..config.game_count)
            .into_par_iter()
            .map(|i| {
                let run = config.run_config(i);
                let result = run_session(rules, &run).map_err(|e| BatchError {
                    game_index: i,
                    seed: run.seed,
                    message: e.to_string(),
                });

                let completed = progress.record_completion();
                if completed % 10 == 0 {
                    debug!(
                        completed,
                        total = progress.total,
                        percent = progress.percentage(),
                        eta_secs = progress.eta().as_secs(),
                        "batch progress"
                    );
                }
                if let Err(e) = &result {
                    warn!(game = i, seed = e.seed, error = %e.message, "game failed");
                }
                result
            })
            .collect()
    };

    let results = if config.parallel_games > 0 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_games as usize)
            .build()
        {
            Ok(pool) => pool.install(play),
            Err(e) => {
                warn!(error = %e, "could not build thread pool, using the global one");
                play()
            }
        }
    } else {
        play()
    };

    let (games, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let games: Vec<GameReport> = games.into_iter().filter_map(Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(Result::err).collect();

    let summary = BatchSummary::from_games(&games);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} games in {:.1}s ({:.1} games/sec)",
        games.len(),
        duration_seconds,
        games.len() as f64 / duration_seconds.max(f64::EPSILON)
    );

    BatchResults {
        config,
        games,
        summary,
        duration_seconds,
        errors,
    }
}

/// Play the same seed `runs` times and check every run ends in the same
/// state hash after the same number of ticks.
///
/// # Errors
///
/// Fails if the rules are invalid.
pub fn verify_determinism(
    rules: &GameRules,
    config: &RunConfig,
    runs: u32,
) -> orchard_core::error::Result<bool> {
    let reports = (0..runs.max(1))
        .map(|_| run_session(rules, config))
        .collect::<orchard_core::error::Result<Vec<_>>>()?;

    let first = &reports[0];
    let same = reports
        .iter()
        .all(|r| r.final_hash == first.final_hash && r.ticks == first.ticks && r.winner == first.winner);
    if !same {
        let hashes: Vec<String> = reports.iter().map(|r| format!("{:016x}", r.final_hash)).collect();
        warn!(seed = config.seed, ?hashes, "runs diverged");
    }
    Ok(same)
}
