//! Structure definitions.

use serde::{Deserialize, Serialize};

use crate::agent::UnitKind;
use crate::factions::Faction;
use crate::structure::StructureKind;

/// Data-driven structure definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructureDef {
    /// Which structure this defines.
    pub kind: StructureKind,
    /// Side that owns this structure.
    pub faction: Faction,
    /// Maximum health points.
    pub max_health: u32,
    /// Apples charged on placement.
    pub cost: u32,
    /// Unit kinds this structure can train, in preference order.
    #[serde(default)]
    pub trains: Vec<UnitKind>,
    /// Training duration for every unit trained here. Falls back to the
    /// unit's own training time when absent.
    #[serde(default)]
    pub train_time_ms: Option<u32>,
    /// Apples paid into the faction economy per income interval.
    #[serde(default)]
    pub income: u32,
    /// Workers drop their cargo here.
    #[serde(default)]
    pub depot: bool,
    /// Losing every home structure loses the match.
    #[serde(default)]
    pub home: bool,
    /// The player may place this structure.
    #[serde(default)]
    pub buildable: bool,
    /// Vision radius in tiles.
    pub vision: u32,
}

impl StructureDef {
    /// Whether this structure can train anything.
    #[must_use]
    pub fn can_train(&self) -> bool {
        !self.trains.is_empty()
    }

    /// Whether this structure can train `unit`.
    #[must_use]
    pub fn can_produce(&self, unit: UnitKind) -> bool {
        self.trains.contains(&unit)
    }
}
