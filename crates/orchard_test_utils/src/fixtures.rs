//! Test fixtures and helpers.
//!
//! Pre-built sessions and scenario helpers for consistent testing.

use fixed::types::I32F32;
use orchard_core::agent::UnitKind;
use orchard_core::components::{EntityId, TilePos};
use orchard_core::data::{Difficulty, GameRules};
use orchard_core::factions::Faction;
use orchard_core::grid::GridMap;
use orchard_core::session::{Session, SessionConfig, TickEvents};

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// The step used by fixture runs: 1/16 s, exact in fixed point.
#[must_use]
pub fn step() -> I32F32 {
    I32F32::from_bits(1 << 28)
}

/// A session on a generated map at normal difficulty.
///
/// # Panics
///
/// Panics if the default rules fail validation.
#[must_use]
pub fn generated_session(seed: u64) -> Session {
    generated_session_at(seed, Difficulty::Normal)
}

/// A session on a generated map at the given difficulty.
///
/// # Panics
///
/// Panics if the default rules fail validation.
#[must_use]
pub fn generated_session_at(seed: u64, difficulty: Difficulty) -> Session {
    Session::new(GameRules::default(), SessionConfig { seed, difficulty })
        .expect("default rules are valid")
}

/// A session on an all-grass map with no resource nodes.
///
/// With the default rules the nest sits at (4, 4), the geese on row 5
/// and the den near `(width - 8, height - 8)`.
///
/// # Panics
///
/// Panics if the default rules fail validation.
#[must_use]
pub fn open_session(width: u32, height: u32) -> Session {
    let map = GridMap::new(width, height, 32);
    Session::with_map(GameRules::default(), map, SessionConfig::with_seed(1))
        .expect("default rules are valid")
}

/// Place `geese` geese and `wolves` wolves on adjacent columns of an open
/// 24x24 map, far from both homes. Returns the session and the ids.
///
/// # Panics
///
/// Panics if the default rules fail validation.
#[must_use]
pub fn skirmish(geese: u32, wolves: u32) -> (Session, Vec<EntityId>, Vec<EntityId>) {
    let mut session = open_session(24, 24);
    let goose_ids = (0..geese)
        .filter_map(|i| session.spawn_agent(Faction::Player, UnitKind::Goose, TilePos::new(3, 10 + i as i32)))
        .collect();
    let wolf_ids = (0..wolves)
        .filter_map(|i| session.spawn_agent(Faction::Enemy, UnitKind::Wolf, TilePos::new(4, 10 + i as i32)))
        .collect();
    (session, goose_ids, wolf_ids)
}

/// Advance `ticks` fixture steps, collecting every tick's events.
pub fn run_ticks(session: &mut Session, ticks: u32) -> Vec<TickEvents> {
    (0..ticks).map(|_| session.advance(step())).collect()
}

/// Advance until the match ends or `max_ticks` pass. Returns the ticks run.
pub fn run_until_over(session: &mut Session, max_ticks: u32) -> u32 {
    let mut ran = 0;
    while ran < max_ticks && !session.is_over() {
        session.advance(step());
        ran += 1;
    }
    ran
}
