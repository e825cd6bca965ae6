//! Headless session runner for balance checks and CI verification.
//!
//! Drives orchard sessions without a renderer. The player side is played
//! by a small scripted policy so whole matches can run unattended:
//!
//! - **Single runs**: play one seed and print or dump a [`GameReport`]
//! - **Batches**: many seeds in parallel, aggregated into a summary
//! - **Determinism checks**: replay a seed and compare state hashes
//! - **Map dumps**: ASCII rendering of a generated map
//!
//! # Example
//!
//! ```bash
//! # Play seed 7 against a hard opponent for 15 minutes of game time
//! cargo run -p orchard_headless -- run --seed 7 --difficulty hard --minutes 15
//!
//! # 200 seeds in parallel, results as JSON
//! cargo run -p orchard_headless -- batch --count 200 --output results/batch.json
//!
//! # Verify determinism
//! cargo run -p orchard_headless -- verify --seed 12345 --runs 5
//! ```

pub mod ascii_map;
pub mod batch;
pub mod rules_file;
pub mod runner;

pub use ascii_map::{render_map, AsciiConfig};
pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults, BatchSummary};
pub use rules_file::{load_rules, load_rules_or_default, save_rules, RulesFileError};
pub use runner::{run_session, GameReport, RunConfig, ScriptedPlayer, SideReport};
