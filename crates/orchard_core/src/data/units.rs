//! Unit definitions.

use serde::{Deserialize, Serialize};

use crate::agent::UnitKind;
use crate::factions::Faction;
use crate::math::{seconds_from_millis, Fixed};

/// Harvesting capability of a unit type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GatherDef {
    /// Apples moved per pulse before the difficulty multiplier.
    pub amount: u32,
    /// Time between pulses.
    pub interval_ms: u32,
    /// Maximum apples carried at once.
    pub capacity: u32,
}

impl GatherDef {
    /// Pulse interval in seconds.
    #[must_use]
    pub fn interval(&self) -> Fixed {
        seconds_from_millis(self.interval_ms)
    }
}

/// Combat capability of a unit type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttackDef {
    /// Damage dealt per hit.
    pub damage: u32,
}

/// Data-driven unit definition.
///
/// # Example RON
///
/// ```ron
/// (
///     kind: Fox,
///     faction: Enemy,
///     max_health: 60,
///     speed: 72,
///     radius: 9,
///     vision: 5,
///     cost: 20,
///     train_time_ms: 10000,
///     gather: Some((amount: 5, interval_ms: 1000, capacity: 10)),
///     attack: None,
///     pursues: false,
///     auto_gather: true,
/// )
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitDef {
    /// Which unit this defines.
    pub kind: UnitKind,
    /// Side that fields this unit.
    pub faction: Faction,
    /// Maximum health points.
    pub max_health: u32,
    /// Movement speed in pixels per second.
    pub speed: u32,
    /// Selection and render radius in pixels.
    pub radius: u32,
    /// Vision radius in tiles.
    pub vision: u32,
    /// Apples charged when training starts.
    pub cost: u32,
    /// Training duration unless the producing structure overrides it.
    pub train_time_ms: u32,
    /// Harvesting capability (None for units that cannot gather).
    #[serde(default)]
    pub gather: Option<GatherDef>,
    /// Combat capability (None for non-combatants).
    #[serde(default)]
    pub attack: Option<AttackDef>,
    /// Chases targets that leave range and retreats home when none remain.
    #[serde(default)]
    pub pursues: bool,
    /// Looks for work on its own while idle.
    #[serde(default)]
    pub auto_gather: bool,
}

impl UnitDef {
    /// Movement speed as fixed-point pixels per second.
    #[must_use]
    pub fn speed(&self) -> Fixed {
        Fixed::from_num(self.speed)
    }

    /// Carry capacity (0 for non-gatherers).
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.gather.map_or(0, |g| g.capacity)
    }

    /// Whether this unit can harvest resource nodes.
    #[must_use]
    pub const fn can_gather(&self) -> bool {
        self.gather.is_some()
    }

    /// Whether this unit can fight.
    #[must_use]
    pub const fn can_attack(&self) -> bool {
        self.attack.is_some()
    }
}
