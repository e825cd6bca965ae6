//! Tile grid, terrain, resource nodes and fog of war.
//!
//! The map is the sole owner of resource nodes. Everything else refers
//! to a node by id and re-checks its supply on every access.

use serde::{Deserialize, Serialize};

use crate::components::{EntityId, TilePos};
use crate::economy::ResourceNode;
use crate::math::{Fixed, Vec2Fixed};

/// Terrain of a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Terrain {
    /// Open ground.
    #[default]
    Grass,
    /// Worn paths. Walkable, purely cosmetic.
    Dirt,
    /// Impassable.
    Water,
}

impl Terrain {
    /// Returns true if units can stand on this terrain.
    #[must_use]
    pub const fn is_walkable(self) -> bool {
        !matches!(self, Self::Water)
    }
}

/// Player knowledge of a tile.
///
/// Once a tile leaves `Unseen` it never returns there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Fog {
    /// Never seen.
    #[default]
    Unseen,
    /// Seen before, not currently in view.
    Explored,
    /// In view this tick.
    Visible,
}

/// The playing field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridMap {
    width: u32,
    height: u32,
    tile_size: u32,
    /// Terrain in row-major order.
    tiles: Vec<Terrain>,
    /// Fog in row-major order.
    fog: Vec<Fog>,
    /// Resource nodes in id order.
    nodes: Vec<ResourceNode>,
}

impl GridMap {
    /// Create an all-grass, fully unseen map with no resource nodes.
    ///
    /// Zero dimensions are raised to one tile.
    #[must_use]
    pub fn new(width: u32, height: u32, tile_size: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let count = (width as usize) * (height as usize);
        Self {
            width,
            height,
            tile_size: tile_size.max(1),
            tiles: vec![Terrain::Grass; count],
            fog: vec![Fog::Unseen; count],
            nodes: Vec::new(),
        }
    }

    /// Width in tiles.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in tiles.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Tile edge length in pixels.
    #[must_use]
    pub fn tile_size(&self) -> Fixed {
        Fixed::from_num(self.tile_size)
    }

    /// Map extent in pixels.
    #[must_use]
    pub fn pixel_size(&self) -> Vec2Fixed {
        Vec2Fixed::new(
            Fixed::from_num(self.width) * self.tile_size(),
            Fixed::from_num(self.height) * self.tile_size(),
        )
    }

    #[inline]
    fn index(&self, tile: TilePos) -> Option<usize> {
        if self.in_bounds(tile) {
            Some(tile.y as usize * self.width as usize + tile.x as usize)
        } else {
            None
        }
    }

    /// Check if a tile lies on the map.
    #[must_use]
    pub fn in_bounds(&self, tile: TilePos) -> bool {
        tile.x >= 0 && tile.y >= 0 && (tile.x as u32) < self.width && (tile.y as u32) < self.height
    }

    /// Terrain at a tile. Off-map tiles read as grass.
    #[must_use]
    pub fn terrain(&self, tile: TilePos) -> Terrain {
        self.index(tile).map_or(Terrain::Grass, |i| self.tiles[i])
    }

    /// Set terrain at a tile. Returns `false` if out of bounds.
    pub fn set_terrain(&mut self, tile: TilePos, terrain: Terrain) -> bool {
        match self.index(tile) {
            Some(i) => {
                self.tiles[i] = terrain;
                true
            }
            None => false,
        }
    }

    /// Terrain in row-major order.
    #[must_use]
    pub fn terrain_tiles(&self) -> &[Terrain] {
        &self.tiles
    }

    /// False outside the map and on water.
    #[must_use]
    pub fn is_walkable(&self, tile: TilePos) -> bool {
        self.index(tile).is_some_and(|i| self.tiles[i].is_walkable())
    }

    /// Tile containing a pixel position. May lie off the map.
    #[must_use]
    pub fn tile_of(&self, position: Vec2Fixed) -> TilePos {
        let size = self.tile_size();
        TilePos::new(
            (position.x / size).floor().saturating_to_num::<i32>(),
            (position.y / size).floor().saturating_to_num::<i32>(),
        )
    }

    /// Pixel centre of a tile.
    #[must_use]
    pub fn tile_center(&self, tile: TilePos) -> Vec2Fixed {
        let size = self.tile_size();
        let half = size / Fixed::from_num(2);
        Vec2Fixed::new(
            Fixed::from_num(tile.x) * size + half,
            Fixed::from_num(tile.y) * size + half,
        )
    }

    /// Clamp a pixel position into the map, one pixel inside the far edges.
    #[must_use]
    pub fn clamp_position(&self, position: Vec2Fixed) -> Vec2Fixed {
        let far = self.pixel_size() - Vec2Fixed::from_ints(1, 1);
        position.clamp(Vec2Fixed::ZERO, far)
    }

    /// Clamp a tile into the map.
    #[must_use]
    pub fn clamp_tile(&self, tile: TilePos) -> TilePos {
        TilePos::new(
            tile.x.clamp(0, self.width as i32 - 1),
            tile.y.clamp(0, self.height as i32 - 1),
        )
    }

    /// Fog at a tile. Off-map tiles read as unseen.
    #[must_use]
    pub fn fog(&self, tile: TilePos) -> Fog {
        self.index(tile).map_or(Fog::Unseen, |i| self.fog[i])
    }

    /// Fog in row-major order.
    #[must_use]
    pub fn fog_tiles(&self) -> &[Fog] {
        &self.fog
    }

    /// Recompute the player's view.
    ///
    /// Visible tiles drop to explored, then every tile within a viewer's
    /// radius (inclusive, circular) becomes visible. Unseen and explored
    /// tiles outside every radius are left alone.
    pub fn recompute_vision<I>(&mut self, viewers: I)
    where
        I: IntoIterator<Item = (TilePos, u32)>,
    {
        for cell in &mut self.fog {
            if *cell == Fog::Visible {
                *cell = Fog::Explored;
            }
        }

        for (center, radius) in viewers {
            let r = radius as i32;
            let r_sq = i64::from(radius) * i64::from(radius);
            for dy in -r..=r {
                for dx in -r..=r {
                    if i64::from(dx * dx + dy * dy) > r_sq {
                        continue;
                    }
                    let tile = TilePos::new(center.x + dx, center.y + dy);
                    if let Some(i) = self.index(tile) {
                        self.fog[i] = Fog::Visible;
                    }
                }
            }
        }
    }

    /// Place a resource node. The id must be fresh.
    pub fn add_node(&mut self, id: EntityId, tile: TilePos, supply: u32, radius: u32) {
        let node = ResourceNode::new(id, tile, self.tile_center(tile), supply, radius);
        let at = self.nodes.partition_point(|n| n.body.id < id);
        self.nodes.insert(at, node);
    }

    /// All resource nodes, exhausted ones included, in id order.
    #[must_use]
    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: EntityId) -> Option<&ResourceNode> {
        self.nodes
            .binary_search_by_key(&id, |n| n.body.id)
            .ok()
            .map(|i| &self.nodes[i])
    }

    /// Look up a node by id for mutation.
    pub fn node_mut(&mut self, id: EntityId) -> Option<&mut ResourceNode> {
        match self.nodes.binary_search_by_key(&id, |n| n.body.id) {
            Ok(i) => Some(&mut self.nodes[i]),
            Err(_) => None,
        }
    }

    /// Supply left at a node; zero for unknown ids.
    #[must_use]
    pub fn supply(&self, id: EntityId) -> u32 {
        self.node(id).map_or(0, |n| n.supply)
    }

    /// Nearest node with supply left, by squared pixel distance.
    /// Ties go to the lower id.
    #[must_use]
    pub fn nearest_node_with_supply(&self, from: Vec2Fixed) -> Option<EntityId> {
        self.nodes
            .iter()
            .filter(|n| !n.is_exhausted())
            .min_by_key(|n| (n.body.position.distance_squared(from), n.body.id))
            .map(|n| n.body.id)
    }

    /// Total supply remaining on the map.
    #[must_use]
    pub fn total_supply(&self) -> u64 {
        self.nodes.iter().map(|n| u64::from(n.supply)).sum()
    }
}
