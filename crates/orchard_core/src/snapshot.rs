//! Read-only views of a session for renderers and reports.

use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentState, UnitKind};
use crate::components::{EntityId, Health, TilePos};
use crate::economy::{Economy, ResourceNode};
use crate::factions::Faction;
use crate::grid::{Fog, GridMap};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::session::{Outcome, Session};
use crate::structure::{Structure, StructureKind};

/// What a renderer needs to draw an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentView {
    /// Entity id.
    pub id: EntityId,
    /// Owning side.
    pub faction: Faction,
    /// Unit kind.
    pub kind: UnitKind,
    /// Pixel position.
    pub position: Vec2Fixed,
    /// Tile under the agent.
    pub tile: TilePos,
    /// Hit points.
    pub health: Health,
    /// Behaviour state.
    pub state: AgentState,
    /// Apples carried.
    pub carried: u32,
    /// Most apples the agent can carry.
    pub capacity: u32,
    /// In the player's selection.
    pub selected: bool,
}

impl AgentView {
    fn of(agent: &Agent, map: &GridMap, selected: bool) -> Self {
        Self {
            id: agent.id(),
            faction: agent.faction,
            kind: agent.kind(),
            position: agent.position(),
            tile: agent.tile(map),
            health: agent.health,
            state: agent.state(),
            carried: agent.carried(),
            capacity: agent.def.capacity(),
            selected,
        }
    }
}

/// What a renderer needs to draw a structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureView {
    /// Entity id.
    pub id: EntityId,
    /// Owning side.
    pub faction: Faction,
    /// Structure kind.
    pub kind: StructureKind,
    /// Occupied tile.
    pub tile: TilePos,
    /// Pixel centre.
    pub position: Vec2Fixed,
    /// Hit points.
    pub health: Health,
    /// Unit in training, if any.
    pub training: Option<UnitKind>,
    /// Training progress in `[0, 1]`.
    #[serde(with = "fixed_serde")]
    pub progress: Fixed,
    /// In the player's selection.
    pub selected: bool,
}

impl StructureView {
    fn of(structure: &Structure, selected: bool) -> Self {
        let progress = structure.training_progress();
        Self {
            id: structure.id(),
            faction: structure.faction,
            kind: structure.kind(),
            tile: structure.tile,
            position: structure.body.position,
            health: structure.health,
            training: progress.map(|(unit, _)| unit),
            progress: progress.map_or(Fixed::ZERO, |(_, p)| p),
            selected,
        }
    }
}

/// What a renderer needs to draw a resource node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceView {
    /// Entity id.
    pub id: EntityId,
    /// Occupied tile.
    pub tile: TilePos,
    /// Pixel centre.
    pub position: Vec2Fixed,
    /// Apples left.
    pub supply: u32,
    /// Apples at generation.
    pub max_supply: u32,
    /// Render radius in pixels.
    pub radius: u32,
}

impl From<&ResourceNode> for ResourceView {
    fn from(node: &ResourceNode) -> Self {
        Self {
            id: node.body.id,
            tile: node.tile,
            position: node.body.position,
            supply: node.supply,
            max_supply: node.max_supply,
            radius: node.radius,
        }
    }
}

/// A full frame of session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Ticks simulated so far.
    pub tick: u64,
    /// Game time in seconds.
    #[serde(with = "fixed_serde")]
    pub elapsed: Fixed,
    /// Map width in tiles.
    pub width: u32,
    /// Map height in tiles.
    pub height: u32,
    /// The player's economy.
    pub player_economy: Economy,
    /// The opponent's economy.
    pub enemy_economy: Economy,
    /// Agents of both sides, player first.
    pub agents: Vec<AgentView>,
    /// Structures of both sides, player first.
    pub structures: Vec<StructureView>,
    /// Resource nodes that still hold supply.
    pub resources: Vec<ResourceView>,
    /// The player's fog, row-major.
    pub fog: Vec<Fog>,
    /// Match result, once decided.
    pub outcome: Option<Outcome>,
}

impl SessionSnapshot {
    /// Capture the current state of a session.
    #[must_use]
    pub fn capture(session: &Session) -> Self {
        let map = session.map();
        let selection = session.selection();
        let enemy = session.enemy();

        let agents = session
            .agents()
            .iter()
            .map(|a| AgentView::of(a, map, selection.contains(a.id())))
            .chain(enemy.agents().iter().map(|a| AgentView::of(a, map, false)))
            .collect();
        let structures = session
            .structures()
            .iter()
            .map(|s| StructureView::of(s, selection.contains(s.id())))
            .chain(enemy.structures().iter().map(|s| StructureView::of(s, false)))
            .collect();

        Self {
            tick: session.tick(),
            elapsed: session.elapsed(),
            width: map.width(),
            height: map.height(),
            player_economy: *session.economy(),
            enemy_economy: enemy.economy,
            agents,
            structures,
            resources: map
                .nodes()
                .iter()
                .filter(|n| !n.is_exhausted())
                .map(ResourceView::from)
                .collect(),
            fog: map.fog_tiles().to_vec(),
            outcome: session.outcome(),
        }
    }
}
