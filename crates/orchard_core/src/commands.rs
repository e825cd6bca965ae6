//! The player's command surface.
//!
//! Input layers translate pointer and keyboard events into
//! [`PlayerCommand`]s. Commands are either applied at once or queued and
//! drained at the start of the next tick.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::components::{EntityId, TilePos};
use crate::math::Vec2Fixed;
use crate::structure::StructureKind;

/// One player instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerCommand {
    /// Select the entity under a point.
    SelectAt {
        /// Pixel position.
        point: Vec2Fixed,
        /// Keep the current selection.
        additive: bool,
    },
    /// Select every player agent inside a rectangle.
    SelectBox {
        /// One corner, in pixels.
        from: Vec2Fixed,
        /// The opposite corner, in pixels.
        to: Vec2Fixed,
        /// Keep the current selection.
        additive: bool,
    },
    /// Deselect everything.
    ClearSelection,
    /// Select every player agent.
    SelectAll,
    /// Move the selected agents in formation.
    Move {
        /// Target tile.
        tile: TilePos,
    },
    /// Send the selected gatherers to a node.
    Gather {
        /// Resource node id.
        node: EntityId,
    },
    /// Build a structure.
    PlaceStructure {
        /// Tile to build on.
        tile: TilePos,
        /// What to build.
        kind: StructureKind,
    },
    /// Start training at a structure.
    Train {
        /// Structure id.
        structure: EntityId,
    },
}

/// Commands waiting for the next tick, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandQueue {
    commands: VecDeque<PlayerCommand>,
}

impl CommandQueue {
    /// Create an empty command queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command to the back of the queue.
    pub fn push(&mut self, command: PlayerCommand) {
        self.commands.push_back(command);
    }

    /// Take every pending command, oldest first.
    pub fn drain(&mut self) -> Vec<PlayerCommand> {
        self.commands.drain(..).collect()
    }

    /// Number of pending commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Check if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// What the player has selected: any number of agents and at most one
/// structure.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Selection {
    agents: Vec<EntityId>,
    structure: Option<EntityId>,
}

impl Selection {
    /// Selected agents, in selection order.
    #[must_use]
    pub fn agents(&self) -> &[EntityId] {
        &self.agents
    }

    /// Selected structure.
    #[must_use]
    pub const fn structure(&self) -> Option<EntityId> {
        self.structure
    }

    /// Nothing selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty() && self.structure.is_none()
    }

    /// Whether an entity is selected.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.structure == Some(id) || self.agents.contains(&id)
    }

    /// Deselect everything.
    pub fn clear(&mut self) {
        self.agents.clear();
        self.structure = None;
    }

    /// Add an agent, ignoring duplicates.
    pub fn add_agent(&mut self, id: EntityId) {
        if !self.agents.contains(&id) {
            self.agents.push(id);
        }
    }

    /// Select a structure, replacing any selected structure.
    pub fn set_structure(&mut self, id: EntityId) {
        self.structure = Some(id);
    }

    /// Drop every id for which `keep` is false.
    pub fn retain(&mut self, mut keep: impl FnMut(EntityId) -> bool) {
        self.agents.retain(|id| keep(*id));
        if self.structure.is_some_and(|id| !keep(id)) {
            self.structure = None;
        }
    }
}

/// Destination tiles for `count` agents moving to `target`.
///
/// Agents fill a square grid of `ceil(sqrt(count))` columns around the
/// target, row by row. Slots are not checked against the map.
#[must_use]
pub fn formation_slots(target: TilePos, count: usize) -> Vec<TilePos> {
    let cols = (1..).find(|c: &usize| c * c >= count).unwrap_or(1).max(1);
    let half = (cols / 2) as i32;
    (0..count)
        .map(|i| {
            let ox = (i % cols) as i32 - half;
            let oy = (i / cols) as i32 - half;
            TilePos::new(target.x + ox, target.y + oy)
        })
        .collect()
}
