//! Property tests for invariants that must hold across whole sessions.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use orchard_core::components::{IdAllocator, TilePos};
use orchard_core::data::GameRules;
use orchard_core::grid::{Fog, GridMap, Terrain};
use orchard_core::math::{Fixed, Vec2Fixed, SQRT_2};
use orchard_core::map_generation::{generate_map, seeded_rng};
use orchard_core::pathfinding::find_path;
use orchard_core::session::{Session, SessionConfig};
use orchard_test_utils::determinism::strategies::{arb_command_script, arb_difficulty, arb_dt, arb_seed, arb_tile};
use orchard_test_utils::fixtures::step;
use proptest::prelude::*;

fn generated(seed: u64) -> GridMap {
    let rules = GameRules::default();
    generate_map(&rules.map, &mut seeded_rng(seed), &mut IdAllocator::new())
}

// =============================================================================
// Pathfinding
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every waypoint is walkable, each step moves to a neighbouring tile,
    /// and the path ends on the goal.
    #[test]
    fn prop_paths_are_walkable_and_connected(
        seed in arb_seed(),
        start in arb_tile(64, 44),
        goal in arb_tile(64, 44),
    ) {
        let map = generated(seed);
        prop_assume!(map.is_walkable(start));

        let path = find_path(&map, start, goal, 2000);
        if path.is_empty() {
            return Ok(());
        }

        prop_assert!(map.is_walkable(goal));
        prop_assert_eq!(*path.last().unwrap(), map.tile_center(goal));

        let mut prev = start;
        for point in &path {
            let tile = map.tile_of(*point);
            prop_assert!(map.is_walkable(tile));
            prop_assert_eq!(prev.chebyshev(tile), 1);
            prev = tile;
        }
    }

    /// A path never needs more steps than expansions allowed.
    #[test]
    fn prop_path_respects_budget(
        seed in arb_seed(),
        start in arb_tile(64, 44),
        goal in arb_tile(64, 44),
        budget in 1u32..200,
    ) {
        let map = generated(seed);
        let path = find_path(&map, start, goal, budget);
        prop_assert!(path.len() <= budget as usize);
    }
}

/// Length of a tile walk, one for a straight step and `SQRT_2` for a
/// diagonal one.
fn walk_cost(map: &GridMap, start: TilePos, path: &[Vec2Fixed]) -> Fixed {
    let mut prev = start;
    let mut total = Fixed::ZERO;
    for point in path {
        let tile = map.tile_of(*point);
        total += if tile.x != prev.x && tile.y != prev.y { SQRT_2 } else { Fixed::ONE };
        prev = tile;
    }
    total
}

/// Exhaustive Dijkstra over the same 8-way move set.
fn shortest_cost(map: &GridMap, start: TilePos, goal: TilePos) -> Option<Fixed> {
    let mut best: HashMap<TilePos, Fixed> = HashMap::new();
    let mut open = BinaryHeap::new();
    best.insert(start, Fixed::ZERO);
    open.push(Reverse((Fixed::ZERO, start)));

    while let Some(Reverse((cost, tile))) = open.pop() {
        if tile == goal {
            return Some(cost);
        }
        if best.get(&tile).is_some_and(|&known| known < cost) {
            continue;
        }
        for dx in -1..=1 {
            for dy in -1..=1 {
                let next = TilePos::new(tile.x + dx, tile.y + dy);
                if (dx == 0 && dy == 0) || !map.is_walkable(next) {
                    continue;
                }
                let step = if dx != 0 && dy != 0 { SQRT_2 } else { Fixed::ONE };
                let candidate = cost + step;
                if best.get(&next).map_or(true, |&known| candidate < known) {
                    best.insert(next, candidate);
                    open.push(Reverse((candidate, next)));
                }
            }
        }
    }
    None
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// The Manhattan heuristic overestimates against `SQRT_2` diagonals by
    /// at most a factor of `SQRT_2`, so a found path is never shorter than
    /// the optimum and never longer than `SQRT_2` times it. With a budget
    /// above the tile count, A* and the exhaustive search agree on which
    /// goals are reachable.
    #[test]
    fn prop_path_length_within_heuristic_bound(
        water in prop::collection::vec(prop::bool::weighted(0.3), 144),
        start in arb_tile(12, 12),
        goal in arb_tile(12, 12),
    ) {
        prop_assume!(start != goal);
        let mut map = GridMap::new(12, 12, 32);
        for (i, wet) in water.iter().enumerate() {
            if *wet {
                map.set_terrain(TilePos::new(i as i32 % 12, i as i32 / 12), Terrain::Water);
            }
        }

        let path = find_path(&map, start, goal, 2000);
        let optimal = if map.is_walkable(goal) { shortest_cost(&map, start, goal) } else { None };

        match optimal {
            None => prop_assert!(path.is_empty()),
            Some(optimal) => {
                prop_assert!(!path.is_empty());
                let length = walk_cost(&map, start, &path);
                prop_assert!(length >= optimal, "{} shorter than optimum {}", length, optimal);
                let bound = optimal * SQRT_2 + Fixed::from_num(0.001);
                prop_assert!(length <= bound, "{} exceeds bound {}", length, bound);
            }
        }
    }
}

// =============================================================================
// Session invariants
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    /// Fog never returns to unseen, node supply never grows, no agent
    /// carries more than its capacity, and every apple is accounted for.
    #[test]
    fn prop_session_invariants_hold(
        seed in arb_seed(),
        difficulty in arb_difficulty(),
        script in arb_command_script(64, 44, 300, 24),
    ) {
        let mut session = Session::new(GameRules::default(), SessionConfig { seed, difficulty }).unwrap();
        let mut pending = script.iter().peekable();

        for tick in 0..300u64 {
            while let Some((_, command)) = pending.next_if(|(at, _)| *at <= tick) {
                session.queue_command(*command);
            }

            let fog_before = session.map().fog_tiles().to_vec();
            let supply_before: Vec<u32> = session.map().nodes().iter().map(|n| n.supply).collect();

            session.advance(step());

            for (before, after) in fog_before.iter().zip(session.map().fog_tiles()) {
                prop_assert!(*before == Fog::Unseen || *after != Fog::Unseen);
            }
            for (before, node) in supply_before.iter().zip(session.map().nodes()) {
                prop_assert!(node.supply <= *before);
            }
            for agent in session.agents().iter().chain(session.enemy().agents()) {
                prop_assert!(agent.carried() <= agent.def.capacity());
                prop_assert!(agent.is_alive());
            }
            let ledger = session.supply_ledger();
            prop_assert!(ledger.is_balanced(), "unbalanced at tick {}: {:?}", tick, ledger);
        }
    }

    /// Frame time never advances the clock past the maximum step.
    #[test]
    fn prop_elapsed_is_sum_of_clamped_steps(
        seed in arb_seed(),
        steps in proptest::collection::vec(arb_dt(), 1..40),
    ) {
        let mut session = Session::new(GameRules::default(), SessionConfig::with_seed(seed)).unwrap();
        let max = session.rules().simulation.max_step();
        let mut expected = Fixed::ZERO;
        for dt in steps {
            session.advance(dt);
            expected += dt.min(max);
        }
        prop_assert_eq!(session.elapsed(), expected);
    }
}
