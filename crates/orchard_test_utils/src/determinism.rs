//! Determinism testing utilities.
//!
//! Provides a harness for verifying that a session produces identical
//! results given identical inputs.
//!
//! # Testing Strategy
//!
//! Sources of non-determinism include:
//!
//! - **Floating-point math**: we use fixed-point arithmetic via
//!   [`orchard_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: entities live in `Vec`s kept in
//!   creation order, and every tie is broken by id.
//!
//! - **System randomness**: the only RNG is the session's seeded
//!   ChaCha stream.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual modules (pathfinding, combat, the
//!    opponent) are deterministic on their own
//! 2. **Property tests**: random seeds and command scripts still produce
//!    reproducible runs
//! 3. **Parallel tests**: running N sessions on separate threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use orchard_core::commands::PlayerCommand;
use orchard_core::session::Session;

use crate::fixtures::step;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic session).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the runs were deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Session is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial state
/// * `step` - Function to advance the state by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```
/// use orchard_test_utils::determinism::verify_determinism;
/// use orchard_test_utils::fixtures::{generated_session, step};
///
/// let result = verify_determinism(
///     3,
///     50,
///     || generated_session(7),
///     |s| { s.advance(step()); },
///     |s| s.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run a session twice from identical setup and compare final hashes.
pub fn verify_session_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Session,
{
    verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |session| {
            session.advance(step());
        },
        Session::state_hash,
    )
    .is_deterministic
}

/// Play a command script: each `(tick, command)` is queued just before
/// that tick is advanced. Commands for ticks past `num_ticks` are dropped.
pub fn play_script(session: &mut Session, script: &[(u64, PlayerCommand)], num_ticks: u64) {
    let mut pending = script.iter().peekable();
    for tick in 0..num_ticks {
        while let Some((_, command)) = pending.next_if(|(at, _)| *at <= tick) {
            session.queue_command(*command);
        }
        session.advance(step());
    }
}

/// Run N sessions on scoped threads and collect final hashes.
///
/// Catches non-determinism that only shows up under thread scheduling
/// or memory layout differences.
///
/// # Panics
///
/// Panics if a worker thread panics.
pub fn run_parallel_sessions<F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> DeterminismResult
where
    F: Fn() -> Session + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut session = setup_fn();
                    for _ in 0..num_ticks {
                        session.advance(step());
                    }
                    session.state_hash()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks: num_ticks,
    }
}

/// Compare two session runs tick-by-tick, finding first divergence.
///
/// # Returns
///
/// `None` if the sessions stay identical, `Some(tick)` if they diverge
/// at that tick.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Session,
{
    let mut a = setup_fn();
    let mut b = setup_fn();

    if a.state_hash() != b.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        a.advance(step());
        b.advance(step());

        if a.state_hash() != b.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for determinism testing.
pub mod strategies {
    use orchard_core::commands::PlayerCommand;
    use orchard_core::components::TilePos;
    use orchard_core::data::Difficulty;
    use orchard_core::math::{Fixed, Vec2Fixed};
    use orchard_core::structure::StructureKind;
    use proptest::prelude::*;

    /// Any session seed.
    pub fn arb_seed() -> impl Strategy<Value = u64> {
        any::<u64>()
    }

    /// Any difficulty level.
    pub fn arb_difficulty() -> impl Strategy<Value = Difficulty> {
        prop_oneof![
            Just(Difficulty::Easy),
            Just(Difficulty::Normal),
            Just(Difficulty::Hard),
        ]
    }

    /// A tile on a `width` x `height` map.
    pub fn arb_tile(width: i32, height: i32) -> impl Strategy<Value = TilePos> {
        (0..width, 0..height).prop_map(|(x, y)| TilePos::new(x, y))
    }

    /// A tile that may lie up to two tiles off a `width` x `height` map.
    pub fn arb_any_tile(width: i32, height: i32) -> impl Strategy<Value = TilePos> {
        (-2..width + 2, -2..height + 2).prop_map(|(x, y)| TilePos::new(x, y))
    }

    /// A pixel point on a map of `width` x `height` 32 px tiles.
    pub fn arb_point(width: i32, height: i32) -> impl Strategy<Value = Vec2Fixed> {
        (0..width * 32, 0..height * 32).prop_map(|(x, y)| Vec2Fixed::from_ints(x, y))
    }

    /// A frame time between 0 and 0.2 s, in 1/64 s steps.
    pub fn arb_dt() -> impl Strategy<Value = Fixed> {
        (0i64..=12).prop_map(|n| Fixed::from_bits(n << 26))
    }

    /// A buildable structure kind.
    pub fn arb_buildable() -> impl Strategy<Value = StructureKind> {
        prop_oneof![
            Just(StructureKind::Granary),
            Just(StructureKind::Barracks),
            Just(StructureKind::Tower),
        ]
    }

    /// Any player command against a `width` x `height` map.
    ///
    /// Entity ids are drawn from a small range so some hit real entities.
    pub fn arb_player_command(width: i32, height: i32) -> impl Strategy<Value = PlayerCommand> {
        prop_oneof![
            (arb_point(width, height), any::<bool>())
                .prop_map(|(point, additive)| PlayerCommand::SelectAt { point, additive }),
            (arb_point(width, height), arb_point(width, height), any::<bool>())
                .prop_map(|(from, to, additive)| PlayerCommand::SelectBox { from, to, additive }),
            Just(PlayerCommand::ClearSelection),
            Just(PlayerCommand::SelectAll),
            arb_any_tile(width, height).prop_map(|tile| PlayerCommand::Move { tile }),
            (1u64..40).prop_map(|node| PlayerCommand::Gather { node }),
            (arb_any_tile(width, height), arb_buildable())
                .prop_map(|(tile, kind)| PlayerCommand::PlaceStructure { tile, kind }),
            (1u64..40).prop_map(|structure| PlayerCommand::Train { structure }),
        ]
    }

    /// A command script sorted by tick, with ticks below `max_tick`.
    pub fn arb_command_script(
        width: i32,
        height: i32,
        max_tick: u64,
        max_len: usize,
    ) -> impl Strategy<Value = Vec<(u64, PlayerCommand)>> {
        proptest::collection::vec((0..max_tick, arb_player_command(width, height)), 0..max_len).prop_map(
            |mut script| {
                script.sort_by_key(|(tick, _)| *tick);
                script
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{generated_session, generated_session_at, skirmish};
    use orchard_core::data::Difficulty;
    use proptest::prelude::*;

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n| *n += 1, |n| *n);

        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![100, 100, 100]);
    }

    #[test]
    fn test_unique_hashes_reports_divergence() {
        let result = DeterminismResult {
            is_deterministic: false,
            hashes: vec![3, 1, 3],
            ticks: 1,
        };
        assert_eq!(result.unique_hashes(), vec![1, 3]);
    }

    #[test]
    #[should_panic(expected = "non-deterministic")]
    fn test_assert_deterministic_panics() {
        DeterminismResult {
            is_deterministic: false,
            hashes: vec![1, 2],
            ticks: 1,
        }
        .assert_deterministic();
    }

    #[test]
    fn test_generated_session_determinism() {
        assert!(verify_session_determinism(|| generated_session(42), 400));
    }

    #[test]
    fn test_hard_session_determinism() {
        let result = verify_determinism(
            3,
            600,
            || generated_session_at(5, Difficulty::Hard),
            |s| {
                s.advance(step());
            },
            Session::state_hash,
        );
        result.assert_deterministic();
    }

    #[test]
    fn test_skirmish_damage_is_exact() {
        let (mut a, _, _) = skirmish(3, 3);
        let (mut b, _, _) = skirmish(3, 3);

        for tick in 0..200 {
            let ea = a.advance(step());
            let eb = b.advance(step());
            assert_eq!(ea.damage, eb.damage, "damage differs at tick {tick}");
            assert_eq!(ea.deaths, eb.deaths, "deaths differ at tick {tick}");
        }
    }

    #[test]
    fn test_no_divergence_with_commands() {
        let setup = || {
            let mut session = generated_session(11);
            session.select_all();
            session.issue_move(orchard_core::components::TilePos::new(20, 12));
            session
        };
        assert_eq!(find_first_divergence(setup, 300), None);
    }

    #[test]
    fn test_parallel_sessions_match() {
        let result = run_parallel_sessions(|| generated_session(3), 4, 300);
        result.assert_deterministic();
        assert_eq!(result.hashes.len(), 4);
    }

    #[test]
    fn test_compute_hash_is_stable() {
        assert_eq!(compute_hash(&(1u32, "goose")), compute_hash(&(1u32, "goose")));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_scripted_sessions_are_reproducible(
            seed in strategies::arb_seed(),
            script in strategies::arb_command_script(64, 44, 200, 20),
        ) {
            let run = || {
                let mut session = generated_session(seed);
                play_script(&mut session, &script, 200);
                session.state_hash()
            };
            prop_assert_eq!(run(), run());
        }
    }
}
