//! Records shared by every entity type.
//!
//! Agents, structures and resource nodes each embed a [`Body`] instead of
//! inheriting from a common base, so spatial queries can treat them
//! uniformly through `{id, position}`.

use serde::{Deserialize, Serialize};

use crate::math::{Fixed, Vec2Fixed};

/// Unique identifier for simulation entities.
pub type EntityId = u64;

/// Hands out entity ids for one session. Ids are never reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdAllocator {
    next: EntityId,
}

impl IdAllocator {
    /// Start a fresh id sequence at 1.
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 1 }
    }

    /// Create an allocator whose first id is `next`.
    #[must_use]
    pub const fn starting_at(next: EntityId) -> Self {
        Self { next }
    }

    /// Allocate the next id.
    pub fn allocate(&mut self) -> EntityId {
        let id = self.next;
        self.next += 1;
        id
    }

    /// The id the next call to [`allocate`](Self::allocate) returns.
    #[must_use]
    pub const fn peek(&self) -> EntityId {
        self.next
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Tile coordinates on the grid map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct TilePos {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl TilePos {
    /// Create a tile position.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance: number of 8-directional steps between tiles.
    #[must_use]
    pub const fn chebyshev(self, other: Self) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        if dx > dy {
            dx
        } else {
            dy
        }
    }

    /// Squared euclidean distance in tiles.
    #[must_use]
    pub const fn distance_squared(self, other: Self) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }

    /// True when `other` is this tile or one of its eight neighbours.
    #[must_use]
    pub const fn touches(self, other: Self) -> bool {
        self.chebyshev(other) <= 1
    }
}

/// Identity and position embedded in every entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Body {
    /// Entity id.
    pub id: EntityId,
    /// Position in pixels.
    pub position: Vec2Fixed,
}

impl Body {
    /// Create a body.
    #[must_use]
    pub const fn new(id: EntityId, position: Vec2Fixed) -> Self {
        Self { id, position }
    }

    /// True when `point` lies within `radius` pixels of this body.
    #[must_use]
    pub fn contains(&self, point: Vec2Fixed, radius: Fixed) -> bool {
        self.position.distance_squared(point) <= radius * radius
    }
}

/// Copy of an entity's identity and location, taken at the start of a
/// phase so other entities can be queried while one is mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Contact {
    /// Entity id.
    pub id: EntityId,
    /// Tile under the entity.
    pub tile: TilePos,
    /// Pixel position.
    pub position: Vec2Fixed,
    /// Structure rather than agent.
    pub is_structure: bool,
}

/// Health for damageable entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Health {
    /// Current health points.
    pub current: u32,
    /// Maximum health points.
    pub max: u32,
}

impl Health {
    /// Create new health at full.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Check if entity is dead (health == 0).
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.current == 0
    }

    /// Apply damage, returning actual damage dealt.
    /// Uses saturating subtraction to prevent underflow.
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        let actual = amount.min(self.current);
        self.current -= actual;
        actual
    }
}
