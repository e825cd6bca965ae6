//! Grid-based pathfinding using a bounded A* search.
//!
//! All calculations use fixed-point math for deterministic results
//! across different platforms.
//!
//! An empty path is a normal answer, not an error: it means "already
//! there" or "cannot get there within budget". Callers branch on it.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::components::TilePos;
use crate::grid::GridMap;
use crate::math::{Fixed, Vec2Fixed, SQRT_2};

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct AStarNode {
    tile: TilePos,
    /// g + h
    f_score: Fixed,
    /// Heuristic alone; among equal `f`, the node nearer the goal wins.
    h_score: Fixed,
    /// Row-major position, for fully deterministic ordering.
    tie_breaker: u64,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap, so compare reversed for min-heap behavior.
        other
            .f_score
            .cmp(&self.f_score)
            .then_with(|| other.h_score.cmp(&self.h_score))
            .then_with(|| other.tie_breaker.cmp(&self.tie_breaker))
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Direction offsets for 8-directional movement.
const DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),   // East
    (1, 1),   // Southeast
    (0, 1),   // South
    (-1, 1),  // Southwest
    (-1, 0),  // West
    (-1, -1), // Northwest
    (0, -1),  // North
    (1, -1),  // Northeast
];

/// Manhattan distance in tiles.
#[inline]
fn manhattan_heuristic(a: TilePos, b: TilePos) -> Fixed {
    Fixed::from_num(a.x.abs_diff(b.x) + a.y.abs_diff(b.y))
}

#[inline]
fn tie_breaker(tile: TilePos) -> u64 {
    ((tile.y as u32 as u64) << 32) | (tile.x as u32 as u64)
}

/// Find a path from `start` to `goal`.
///
/// Returns the pixel centres of every tile after `start`, ending at
/// `goal`. Returns an empty path when the goal is not walkable, equals the
/// start, lies off the map, cannot be reached, or when more than
/// `max_iterations` expansions would be needed.
///
/// # Example
///
/// ```
/// use orchard_core::components::TilePos;
/// use orchard_core::grid::GridMap;
/// use orchard_core::pathfinding::find_path;
///
/// let map = GridMap::new(8, 8, 32);
/// let path = find_path(&map, TilePos::new(0, 0), TilePos::new(3, 0), 2000);
/// assert_eq!(path.len(), 3);
/// assert_eq!(path[2], map.tile_center(TilePos::new(3, 0)));
/// ```
#[must_use]
pub fn find_path(map: &GridMap, start: TilePos, goal: TilePos, max_iterations: u32) -> Vec<Vec2Fixed> {
    if start == goal || !map.is_walkable(goal) || !map.in_bounds(start) {
        return Vec::new();
    }

    let mut open_set: BinaryHeap<AStarNode> = BinaryHeap::new();
    let mut closed: HashSet<TilePos> = HashSet::new();
    let mut came_from: HashMap<TilePos, TilePos> = HashMap::new();
    let mut g_score: HashMap<TilePos, Fixed> = HashMap::new();

    let start_h = manhattan_heuristic(start, goal);
    g_score.insert(start, Fixed::ZERO);
    open_set.push(AStarNode {
        tile: start,
        f_score: start_h,
        h_score: start_h,
        tie_breaker: tie_breaker(start),
    });

    let mut iterations = 0u32;

    while let Some(current) = open_set.pop() {
        if !closed.insert(current.tile) {
            // Stale heap entry for a tile already expanded.
            continue;
        }

        if current.tile == goal {
            return reconstruct_path(map, &came_from, start, goal);
        }

        if iterations >= max_iterations {
            tracing::debug!(?start, ?goal, max_iterations, "path search exceeded budget");
            return Vec::new();
        }
        iterations += 1;

        let current_g = g_score.get(&current.tile).copied().unwrap_or(Fixed::MAX);

        for &(dx, dy) in &DIRECTIONS {
            let next = TilePos::new(current.tile.x + dx, current.tile.y + dy);

            // Diagonals only look at the tile they land on.
            if !map.is_walkable(next) || closed.contains(&next) {
                continue;
            }

            let step = if dx != 0 && dy != 0 { SQRT_2 } else { Fixed::ONE };
            let tentative_g = current_g + step;
            let known_g = g_score.get(&next).copied().unwrap_or(Fixed::MAX);

            if tentative_g < known_g {
                came_from.insert(next, current.tile);
                g_score.insert(next, tentative_g);

                let h = manhattan_heuristic(next, goal);
                open_set.push(AStarNode {
                    tile: next,
                    f_score: tentative_g + h,
                    h_score: h,
                    tie_breaker: tie_breaker(next),
                });
            }
        }
    }

    Vec::new()
}

/// Walk `came_from` back from the goal, dropping the start tile.
fn reconstruct_path(
    map: &GridMap,
    came_from: &HashMap<TilePos, TilePos>,
    start: TilePos,
    goal: TilePos,
) -> Vec<Vec2Fixed> {
    let mut path = Vec::new();
    let mut current = goal;

    while current != start {
        path.push(map.tile_center(current));
        match came_from.get(&current) {
            Some(&prev) => current = prev,
            None => break,
        }
    }

    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Terrain;

    const BUDGET: u32 = 2000;

    fn tile(x: i32, y: i32) -> TilePos {
        TilePos::new(x, y)
    }

    fn tiles_of(map: &GridMap, path: &[Vec2Fixed]) -> Vec<TilePos> {
        path.iter().map(|p| map.tile_of(*p)).collect()
    }

    #[test]
    fn test_same_tile_is_empty() {
        let map = GridMap::new(10, 10, 32);
        assert!(find_path(&map, tile(3, 3), tile(3, 3), BUDGET).is_empty());
    }

    #[test]
    fn test_unwalkable_goal_is_empty() {
        let mut map = GridMap::new(10, 10, 32);
        map.set_terrain(tile(5, 5), Terrain::Water);
        assert!(find_path(&map, tile(0, 0), tile(5, 5), BUDGET).is_empty());
        assert!(find_path(&map, tile(0, 0), tile(10, 0), BUDGET).is_empty());
    }

    #[test]
    fn test_straight_path_excludes_start() {
        let map = GridMap::new(10, 10, 32);
        let path = find_path(&map, tile(0, 0), tile(4, 0), BUDGET);
        assert_eq!(
            tiles_of(&map, &path),
            vec![tile(1, 0), tile(2, 0), tile(3, 0), tile(4, 0)]
        );
    }

    #[test]
    fn test_diagonal_path_uses_diagonals() {
        let map = GridMap::new(10, 10, 32);
        let path = find_path(&map, tile(0, 0), tile(4, 4), BUDGET);
        assert_eq!(path.len(), 4);
        assert_eq!(*path.last().unwrap(), map.tile_center(tile(4, 4)));
    }

    #[test]
    fn test_path_around_wall() {
        let mut map = GridMap::new(10, 10, 32);
        for y in 0..8 {
            map.set_terrain(tile(5, y), Terrain::Water);
        }

        let path = find_path(&map, tile(2, 2), tile(8, 2), BUDGET);
        assert!(!path.is_empty());
        for t in tiles_of(&map, &path) {
            assert!(map.is_walkable(t), "{t:?} is water");
        }
        assert_eq!(map.tile_of(*path.last().unwrap()), tile(8, 2));
    }

    #[test]
    fn test_diagonal_squeezes_between_water() {
        let mut map = GridMap::new(4, 4, 32);
        map.set_terrain(tile(1, 0), Terrain::Water);
        map.set_terrain(tile(0, 1), Terrain::Water);

        let path = find_path(&map, tile(0, 0), tile(1, 1), BUDGET);
        assert_eq!(tiles_of(&map, &path), vec![tile(1, 1)]);

        let back = find_path(&map, tile(1, 1), tile(0, 0), BUDGET);
        assert_eq!(tiles_of(&map, &back), vec![tile(0, 0)]);
    }

    #[test]
    fn test_enclosed_goal_is_unreachable() {
        let mut map = GridMap::new(10, 10, 32);
        for (x, y) in [(6, 6), (7, 6), (8, 6), (6, 7), (8, 7), (6, 8), (7, 8), (8, 8)] {
            map.set_terrain(tile(x, y), Terrain::Water);
        }
        assert!(find_path(&map, tile(0, 0), tile(7, 7), BUDGET).is_empty());
    }

    #[test]
    fn test_iteration_cap_returns_empty() {
        let map = GridMap::new(64, 44, 32);
        assert!(find_path(&map, tile(0, 0), tile(63, 43), 5).is_empty());
        assert!(!find_path(&map, tile(0, 0), tile(63, 43), BUDGET).is_empty());
    }

    #[test]
    fn test_start_on_water_can_leave() {
        let mut map = GridMap::new(6, 6, 32);
        map.set_terrain(tile(2, 2), Terrain::Water);
        let path = find_path(&map, tile(2, 2), tile(4, 2), BUDGET);
        assert_eq!(tiles_of(&map, &path), vec![tile(3, 2), tile(4, 2)]);
    }

    #[test]
    fn test_path_is_deterministic() {
        let mut map = GridMap::new(20, 20, 32);
        for y in 3..17 {
            map.set_terrain(tile(10, y), Terrain::Water);
        }
        let a = find_path(&map, tile(2, 10), tile(18, 10), BUDGET);
        let b = find_path(&map, tile(2, 10), tile(18, 10), BUDGET);
        assert_eq!(a, b);
    }
}
