//! Procedural map generation.
//!
//! Generates a playable field from [`MapRules`]:
//! - Circular water lakes away from the edges
//! - Meandering dirt walks (cosmetic, walkable)
//! - Walkable safe zones at both starting corners
//! - Resource nodes scattered with a minimum separation
//!
//! Every random draw comes from the caller's seeded RNG, so the same seed
//! always yields the same map.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::components::{IdAllocator, TilePos};
use crate::data::MapRules;
use crate::grid::{GridMap, Terrain};

/// The simulation's random number generator.
pub type SimRng = ChaCha8Rng;

/// Create the simulation RNG for a seed.
#[must_use]
pub fn seeded_rng(seed: u64) -> SimRng {
    SimRng::seed_from_u64(seed)
}

/// Uniform draw from `lo..hi`, or `lo` when the range is empty.
fn pick(rng: &mut SimRng, lo: i32, hi: i32) -> i32 {
    if hi > lo {
        rng.gen_range(lo..hi)
    } else {
        lo
    }
}

/// Generate a map. Resource node ids are drawn from `ids`.
///
/// Fewer nodes than requested are placed when the attempt budget runs out;
/// that is a normal outcome.
#[must_use]
pub fn generate_map(rules: &MapRules, rng: &mut SimRng, ids: &mut IdAllocator) -> GridMap {
    let mut map = GridMap::new(rules.width, rules.height, rules.tile_size);

    carve_lakes(rules, &mut map, rng);
    lay_dirt_paths(rules, &mut map, rng);
    clear_safe_zones(rules, &mut map);
    let placed = place_nodes(rules, &mut map, rng, ids);

    tracing::debug!(
        width = rules.width,
        height = rules.height,
        nodes = placed,
        "map generated"
    );
    map
}

fn carve_lakes(rules: &MapRules, map: &mut GridMap, rng: &mut SimRng) {
    let w = rules.width as i32;
    let h = rules.height as i32;
    let (mx, my) = (rules.lake_margin_x as i32, rules.lake_margin_y as i32);

    for _ in 0..rules.lakes {
        let cx = pick(rng, mx, w - mx);
        let cy = pick(rng, my, h - my);
        let r = pick(rng, rules.lake_radius.0 as i32, rules.lake_radius.1 as i32);

        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy <= r * r {
                    map.set_terrain(TilePos::new(cx + dx, cy + dy), Terrain::Water);
                }
            }
        }
    }
}

fn lay_dirt_paths(rules: &MapRules, map: &mut GridMap, rng: &mut SimRng) {
    let w = rules.width as i32;
    let h = rules.height as i32;

    for _ in 0..rules.dirt_paths {
        let mut tile = TilePos::new(pick(rng, 0, w), pick(rng, 0, h));
        let len = pick(
            rng,
            rules.dirt_path_length.0 as i32,
            rules.dirt_path_length.1 as i32,
        );

        for _ in 0..len {
            // Walks may leave the map and come back; off-map steps paint nothing.
            if map.in_bounds(tile) && map.terrain(tile) == Terrain::Grass {
                map.set_terrain(tile, Terrain::Dirt);
            }
            tile.x += rng.gen_range(-1..=1);
            tile.y += rng.gen_range(-1..=1);
        }
    }
}

fn clear_safe_zones(rules: &MapRules, map: &mut GridMap) {
    let w = rules.width as i32;
    let h = rules.height as i32;
    let safe = rules.safe_zone as i32;

    let player = (1..safe).flat_map(|y| (1..safe).map(move |x| TilePos::new(x, y)));
    let enemy = ((h - safe)..h).flat_map(|y| ((w - safe)..w).map(move |x| TilePos::new(x, y)));

    for tile in player.chain(enemy) {
        if map.terrain(tile) == Terrain::Water {
            map.set_terrain(tile, Terrain::Grass);
        }
    }
}

/// Whether a tile lies in either corner kept free of resource nodes.
fn in_start_zone(rules: &MapRules, tile: TilePos) -> bool {
    let safe = rules.safe_zone as i32;
    let near_player = tile.x < safe && tile.y < safe;
    let near_enemy = tile.x >= rules.width as i32 - safe && tile.y >= rules.height as i32 - safe;
    near_player || near_enemy
}

fn place_nodes(rules: &MapRules, map: &mut GridMap, rng: &mut SimRng, ids: &mut IdAllocator) -> u32 {
    let w = rules.width as i32;
    let h = rules.height as i32;
    let margin = rules.node_margin as i32;
    let min_sep = i64::from(rules.node_min_separation_sq);

    let mut placed: Vec<TilePos> = Vec::new();
    let mut attempts = 0;

    while (placed.len() as u32) < rules.resource_nodes && attempts < rules.node_attempts {
        attempts += 1;
        let tile = TilePos::new(pick(rng, margin, w - margin), pick(rng, margin, h - margin));

        if map.terrain(tile) != Terrain::Grass || !map.in_bounds(tile) {
            continue;
        }
        if in_start_zone(rules, tile) {
            continue;
        }
        if placed.iter().any(|other| other.distance_squared(tile) < min_sep) {
            continue;
        }

        let supply = pick(rng, rules.node_supply.0 as i32, rules.node_supply.1 as i32).max(0) as u32;
        map.add_node(ids.allocate(), tile, supply, rules.node_radius);
        placed.push(tile);
    }

    if (placed.len() as u32) < rules.resource_nodes {
        tracing::debug!(
            placed = placed.len(),
            wanted = rules.resource_nodes,
            attempts,
            "node placement budget exhausted"
        );
    }
    placed.len() as u32
}
