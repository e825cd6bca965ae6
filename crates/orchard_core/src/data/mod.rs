//! Rule data for a match.
//!
//! Every tunable number lives in [`GameRules`]. The built-in defaults are
//! the canonical balance; a RON document with the same shape can replace
//! them (see `assets/rules.ron`).
//!
//! **Note:** This module contains no IO - it only defines data types and
//! parses strings. Reading files is left to the caller.

mod structures;
mod units;

pub use structures::StructureDef;
pub use units::{AttackDef, GatherDef, UnitDef};

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::agent::UnitKind;
use crate::components::TilePos;
use crate::error::{GameError, Result};
use crate::factions::Faction;
use crate::math::{seconds_from_millis, Fixed};
use crate::structure::StructureKind;

/// Map size and procedural generation parameters.
///
/// Ranges are `(min, max)` with `max` exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapRules {
    /// Width in tiles.
    pub width: u32,
    /// Height in tiles.
    pub height: u32,
    /// Edge length of one tile in pixels.
    pub tile_size: u32,
    /// Number of water lakes carved.
    pub lakes: u32,
    /// Lake radius in tiles.
    pub lake_radius: (u32, u32),
    /// Lake centres stay this many tiles away from the left and right edges.
    pub lake_margin_x: u32,
    /// Lake centres stay this many tiles away from the top and bottom edges.
    pub lake_margin_y: u32,
    /// Number of dirt walks.
    pub dirt_paths: u32,
    /// Steps per dirt walk.
    pub dirt_path_length: (u32, u32),
    /// Edge length of the walkable square at each starting corner.
    pub safe_zone: u32,
    /// Resource nodes to place.
    pub resource_nodes: u32,
    /// Placement attempts before giving up on the remaining nodes.
    pub node_attempts: u32,
    /// Nodes stay this many tiles away from every edge.
    pub node_margin: u32,
    /// Minimum squared tile distance between two nodes.
    pub node_min_separation_sq: u32,
    /// Initial supply of a node.
    pub node_supply: (u32, u32),
    /// Render radius of a node in pixels.
    pub node_radius: u32,
}

/// Timing and distance constants used every tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationRules {
    /// Longest step a single `advance` call simulates.
    pub max_step_ms: u32,
    /// Node expansions allowed per path search.
    pub max_path_iterations: u32,
    /// Distance in pixels at which a waypoint counts as reached.
    pub arrival_epsilon: u32,
    /// Melee range as a percentage of the tile size.
    pub combat_range_percent: u32,
    /// Time between hits.
    pub attack_cooldown_ms: u32,
    /// Time between repaths while chasing.
    pub repath_interval_ms: u32,
    /// Time an idle autonomous worker waits before looking for work.
    pub idle_seek_interval_ms: u32,
    /// Time between passive income payments.
    pub income_interval_ms: u32,
    /// Distance of freshly trained units from their structure, as a
    /// percentage of the tile size.
    pub spawn_ring_percent: u32,
    /// Pick radius used by point selection, in pixels.
    pub select_radius: u32,
}

impl SimulationRules {
    /// Largest `dt` accepted by a single tick.
    #[must_use]
    pub fn max_step(&self) -> Fixed {
        seconds_from_millis(self.max_step_ms)
    }

    /// Attack cooldown in seconds.
    #[must_use]
    pub fn attack_cooldown(&self) -> Fixed {
        seconds_from_millis(self.attack_cooldown_ms)
    }

    /// Chase repath interval in seconds.
    #[must_use]
    pub fn repath_interval(&self) -> Fixed {
        seconds_from_millis(self.repath_interval_ms)
    }

    /// Idle re-seek interval in seconds.
    #[must_use]
    pub fn idle_seek_interval(&self) -> Fixed {
        seconds_from_millis(self.idle_seek_interval_ms)
    }

    /// Income interval in seconds.
    #[must_use]
    pub fn income_interval(&self) -> Fixed {
        seconds_from_millis(self.income_interval_ms)
    }

    /// Waypoint arrival distance in pixels.
    #[must_use]
    pub fn arrival_epsilon(&self) -> Fixed {
        Fixed::from_num(self.arrival_epsilon)
    }
}

/// How the player's side starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStart {
    /// Starting apples.
    pub apples: u32,
    /// Home structure kind.
    pub home: StructureKind,
    /// Tile of the home structure.
    pub home_tile: TilePos,
    /// Kind of the starting agents.
    pub worker: UnitKind,
    /// Number of starting agents.
    pub workers: u32,
    /// Tile of the first starting agent.
    pub first_worker_tile: TilePos,
    /// Columns between consecutive starting agents.
    pub worker_spacing: i32,
}

/// A target that grows by one every `step_secs` of game time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrowthRule {
    /// Target at time zero.
    pub base: u32,
    /// Seconds per increment.
    pub step_secs: u32,
    /// Hard cap before difficulty scaling.
    pub max: u32,
}

impl GrowthRule {
    /// Unscaled target after `elapsed_secs` whole seconds.
    #[must_use]
    pub fn at(&self, elapsed_secs: u32) -> u32 {
        let steps = elapsed_secs.checked_div(self.step_secs).unwrap_or(0);
        self.base.saturating_add(steps)
    }
}

/// How the opposing side starts and grows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyRules {
    /// Starting apples.
    pub apples: u32,
    /// Home structure kind.
    pub home: StructureKind,
    /// The home search starts this many tiles in from the far corner.
    pub home_corner_offset: i32,
    /// Largest ring searched for a walkable home tile.
    pub home_search_radius: i32,
    /// Worker kind trained for the economy.
    pub worker: UnitKind,
    /// Combat kind trained for the army.
    pub soldier: UnitKind,
    /// Workers spawned next to the home structure.
    pub initial_workers: u32,
    /// Desired worker count over time.
    pub worker_growth: GrowthRule,
    /// Desired army size over time, before the difficulty multiplier.
    pub army_growth: GrowthRule,
}

/// Opponent strength levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Difficulty {
    /// Slower decisions, smaller army, later attacks.
    Easy,
    /// Baseline.
    #[default]
    Normal,
    /// Faster decisions, larger army, earlier attacks.
    Hard,
}

impl Difficulty {
    /// Every level, easiest first.
    pub const ALL: [Self; 3] = [Self::Easy, Self::Normal, Self::Hard];
}

impl FromStr for Difficulty {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "normal" => Ok(Self::Normal),
            "hard" => Ok(Self::Hard),
            _ => Err(GameError::UnknownDifficulty(s.to_string())),
        }
    }
}

/// Multipliers applied to the opponent for one difficulty level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DifficultyPreset {
    /// Level these numbers apply to.
    pub level: Difficulty,
    /// Gather pulse multiplier, in percent.
    pub gather_percent: u32,
    /// Time between strategic decisions.
    pub decision_interval_ms: u32,
    /// Army size multiplier, in percent.
    pub army_percent: u32,
    /// Idle army needed before attacking, as a percentage of the desired army.
    pub attack_threshold_percent: u32,
}

impl DifficultyPreset {
    /// Decision interval in seconds.
    #[must_use]
    pub fn decision_interval(&self) -> Fixed {
        seconds_from_millis(self.decision_interval_ms)
    }
}

/// The complete rule set for a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRules {
    /// Map size and generation.
    pub map: MapRules,
    /// Per-tick constants.
    pub simulation: SimulationRules,
    /// Player start.
    pub player: PlayerStart,
    /// Opponent start and growth.
    pub enemy: EnemyRules,
    /// Unit definitions.
    pub units: Vec<UnitDef>,
    /// Structure definitions.
    pub structures: Vec<StructureDef>,
    /// Opponent difficulty presets.
    pub difficulties: Vec<DifficultyPreset>,
}

impl GameRules {
    /// Parse rules from a RON document.
    ///
    /// The result is not validated; call [`validate`](Self::validate).
    pub fn from_ron_str(source: &str) -> Result<Self> {
        Ok(ron::from_str(source)?)
    }

    /// Get a unit definition by kind.
    #[must_use]
    pub fn unit(&self, kind: UnitKind) -> Option<&UnitDef> {
        self.units.iter().find(|u| u.kind == kind)
    }

    /// Get a structure definition by kind.
    #[must_use]
    pub fn structure(&self, kind: StructureKind) -> Option<&StructureDef> {
        self.structures.iter().find(|s| s.kind == kind)
    }

    /// Get the preset for a difficulty level.
    #[must_use]
    pub fn difficulty(&self, level: Difficulty) -> Option<&DifficultyPreset> {
        self.difficulties.iter().find(|d| d.level == level)
    }

    /// Melee range in pixels, squared.
    #[must_use]
    pub fn combat_range_sq(&self) -> Fixed {
        let range = self.percent_of_tile(self.simulation.combat_range_percent);
        range * range
    }

    /// Spawn ring radius in pixels.
    #[must_use]
    pub fn spawn_ring(&self) -> Fixed {
        self.percent_of_tile(self.simulation.spawn_ring_percent)
    }

    fn percent_of_tile(&self, percent: u32) -> Fixed {
        Fixed::from_num(self.map.tile_size) * Fixed::from_num(percent) / Fixed::from_num(100)
    }

    /// Collect every problem with this rule set.
    #[must_use]
    pub fn problems(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let map = &self.map;
        let sim = &self.simulation;

        if map.width == 0 || map.height == 0 || map.tile_size == 0 {
            errors.push(format!(
                "Map must be non-empty (got {}x{} tiles of {} px)",
                map.width, map.height, map.tile_size
            ));
        }
        for (name, (min, max)) in [
            ("lake_radius", map.lake_radius),
            ("dirt_path_length", map.dirt_path_length),
            ("node_supply", map.node_supply),
        ] {
            if min >= max {
                errors.push(format!("Range '{name}' is empty: ({min}, {max})"));
            }
        }
        if map.width <= 2 * map.lake_margin_x || map.height <= 2 * map.lake_margin_y {
            errors.push("Lake margins leave no room for lake centres".to_string());
        }
        if map.width <= 2 * map.node_margin || map.height <= 2 * map.node_margin {
            errors.push("Node margin leaves no room for resource nodes".to_string());
        }

        for (name, value) in [
            ("max_step_ms", sim.max_step_ms),
            ("attack_cooldown_ms", sim.attack_cooldown_ms),
            ("repath_interval_ms", sim.repath_interval_ms),
            ("idle_seek_interval_ms", sim.idle_seek_interval_ms),
            ("income_interval_ms", sim.income_interval_ms),
        ] {
            if value == 0 {
                errors.push(format!("Interval '{name}' must be positive"));
            }
        }

        for kind in UnitKind::ALL {
            match self.unit(kind) {
                None => errors.push(format!("Unit {kind:?} has no definition")),
                Some(def) => {
                    if def.max_health == 0 {
                        errors.push(format!("Unit {kind:?} has zero health"));
                    }
                    if def.gather.is_some_and(|g| g.interval_ms == 0 || g.capacity == 0) {
                        errors.push(format!("Unit {kind:?} gathers with a zero interval or capacity"));
                    }
                }
            }
        }
        for kind in StructureKind::ALL {
            match self.structure(kind) {
                None => errors.push(format!("Structure {kind:?} has no definition")),
                Some(def) => {
                    for unit in &def.trains {
                        if self.unit(*unit).is_none() {
                            errors.push(format!("Structure {kind:?} trains unknown unit {unit:?}"));
                        }
                    }
                }
            }
        }
        for level in Difficulty::ALL {
            match self.difficulty(level) {
                None => errors.push(format!("Difficulty {level:?} has no preset")),
                Some(preset) if preset.decision_interval_ms == 0 => {
                    errors.push(format!("Difficulty {level:?} has a zero decision interval"));
                }
                Some(_) => {}
            }
        }

        self.check_side(
            &mut errors,
            Faction::Player,
            self.player.home,
            &[self.player.worker],
        );
        self.check_side(
            &mut errors,
            Faction::Enemy,
            self.enemy.home,
            &[self.enemy.worker, self.enemy.soldier],
        );
        if self.unit(self.enemy.worker).is_some_and(|u| !u.can_gather()) {
            errors.push(format!("Enemy worker {:?} cannot gather", self.enemy.worker));
        }
        if self.unit(self.enemy.soldier).is_some_and(|u| !u.can_attack()) {
            errors.push(format!("Enemy soldier {:?} cannot attack", self.enemy.soldier));
        }

        errors
    }

    fn check_side(
        &self,
        errors: &mut Vec<String>,
        faction: Faction,
        home: StructureKind,
        units: &[UnitKind],
    ) {
        if let Some(def) = self.structure(home) {
            if def.faction != faction || !def.home {
                errors.push(format!("{home:?} is not a {faction:?} home structure"));
            }
        }
        for unit in units {
            if self.unit(*unit).is_some_and(|u| u.faction != faction) {
                errors.push(format!("{unit:?} does not belong to {faction:?}"));
            }
        }
    }

    /// Fail with every problem found, if any.
    pub fn validate(&self) -> Result<()> {
        let problems = self.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(GameError::InvalidRules(problems))
        }
    }
}

impl Default for GameRules {
    fn default() -> Self {
        let gatherer = Some(GatherDef {
            amount: 5,
            interval_ms: 1000,
            capacity: 10,
        });

        Self {
            map: MapRules {
                width: 64,
                height: 44,
                tile_size: 32,
                lakes: 4,
                lake_radius: (2, 5),
                lake_margin_x: 12,
                lake_margin_y: 8,
                dirt_paths: 5,
                dirt_path_length: (10, 24),
                safe_zone: 10,
                resource_nodes: 18,
                node_attempts: 1000,
                node_margin: 3,
                node_min_separation_sq: 16,
                node_supply: (40, 80),
                node_radius: 12,
            },
            simulation: SimulationRules {
                max_step_ms: 100,
                max_path_iterations: 2000,
                arrival_epsilon: 2,
                combat_range_percent: 180,
                attack_cooldown_ms: 1000,
                repath_interval_ms: 2000,
                idle_seek_interval_ms: 1000,
                income_interval_ms: 1000,
                spawn_ring_percent: 180,
                select_radius: 16,
            },
            player: PlayerStart {
                apples: 50,
                home: StructureKind::Nest,
                home_tile: TilePos::new(4, 4),
                worker: UnitKind::Goose,
                workers: 3,
                first_worker_tile: TilePos::new(5, 5),
                worker_spacing: 2,
            },
            enemy: EnemyRules {
                apples: 0,
                home: StructureKind::Den,
                home_corner_offset: 8,
                home_search_radius: 6,
                worker: UnitKind::Fox,
                soldier: UnitKind::Wolf,
                initial_workers: 3,
                worker_growth: GrowthRule {
                    base: 3,
                    step_secs: 60,
                    max: 8,
                },
                army_growth: GrowthRule {
                    base: 3,
                    step_secs: 45,
                    max: 10,
                },
            },
            units: vec![
                UnitDef {
                    kind: UnitKind::Goose,
                    faction: Faction::Player,
                    max_health: 50,
                    speed: 72,
                    radius: 9,
                    vision: 5,
                    cost: 20,
                    train_time_ms: 10_000,
                    gather: gatherer,
                    attack: Some(AttackDef { damage: 10 }),
                    pursues: false,
                    auto_gather: false,
                },
                UnitDef {
                    kind: UnitKind::Gander,
                    faction: Faction::Player,
                    max_health: 90,
                    speed: 64,
                    radius: 11,
                    vision: 5,
                    cost: 20,
                    train_time_ms: 5_000,
                    gather: None,
                    attack: Some(AttackDef { damage: 15 }),
                    pursues: false,
                    auto_gather: false,
                },
                UnitDef {
                    kind: UnitKind::Fox,
                    faction: Faction::Enemy,
                    max_health: 60,
                    speed: 72,
                    radius: 9,
                    vision: 5,
                    cost: 20,
                    train_time_ms: 10_000,
                    gather: gatherer,
                    attack: None,
                    pursues: false,
                    auto_gather: true,
                },
                UnitDef {
                    kind: UnitKind::Wolf,
                    faction: Faction::Enemy,
                    max_health: 80,
                    speed: 72,
                    radius: 11,
                    vision: 5,
                    cost: 25,
                    train_time_ms: 8_000,
                    gather: None,
                    attack: Some(AttackDef { damage: 15 }),
                    pursues: true,
                    auto_gather: false,
                },
            ],
            structures: vec![
                StructureDef {
                    kind: StructureKind::Nest,
                    faction: Faction::Player,
                    max_health: 200,
                    cost: 0,
                    trains: vec![UnitKind::Goose],
                    train_time_ms: Some(10_000),
                    income: 0,
                    depot: true,
                    home: true,
                    buildable: false,
                    vision: 7,
                },
                StructureDef {
                    kind: StructureKind::Granary,
                    faction: Faction::Player,
                    max_health: 150,
                    cost: 40,
                    trains: Vec::new(),
                    train_time_ms: None,
                    income: 2,
                    depot: false,
                    home: false,
                    buildable: true,
                    vision: 7,
                },
                StructureDef {
                    kind: StructureKind::Barracks,
                    faction: Faction::Player,
                    max_health: 180,
                    cost: 50,
                    trains: vec![UnitKind::Gander],
                    train_time_ms: Some(5_000),
                    income: 0,
                    depot: false,
                    home: false,
                    buildable: true,
                    vision: 7,
                },
                StructureDef {
                    kind: StructureKind::Tower,
                    faction: Faction::Player,
                    max_health: 120,
                    cost: 30,
                    trains: Vec::new(),
                    train_time_ms: None,
                    income: 0,
                    depot: false,
                    home: false,
                    buildable: true,
                    vision: 7,
                },
                StructureDef {
                    kind: StructureKind::Den,
                    faction: Faction::Enemy,
                    max_health: 300,
                    cost: 0,
                    trains: vec![UnitKind::Fox, UnitKind::Wolf],
                    train_time_ms: None,
                    income: 0,
                    depot: true,
                    home: true,
                    buildable: false,
                    vision: 7,
                },
            ],
            difficulties: vec![
                DifficultyPreset {
                    level: Difficulty::Easy,
                    gather_percent: 80,
                    decision_interval_ms: 5000,
                    army_percent: 70,
                    attack_threshold_percent: 130,
                },
                DifficultyPreset {
                    level: Difficulty::Normal,
                    gather_percent: 100,
                    decision_interval_ms: 3000,
                    army_percent: 100,
                    attack_threshold_percent: 100,
                },
                DifficultyPreset {
                    level: Difficulty::Hard,
                    gather_percent: 120,
                    decision_interval_ms: 2000,
                    army_percent: 140,
                    attack_threshold_percent: 75,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_are_valid() {
        let rules = GameRules::default();
        assert!(rules.problems().is_empty(), "{:?}", rules.problems());
    }

    #[test]
    fn test_shipped_rules_match_defaults() {
        let shipped = include_str!("../../../../assets/rules.ron");
        let rules = GameRules::from_ron_str(shipped).expect("shipped rules parse");
        assert_eq!(rules, GameRules::default());
    }

    #[test]
    fn test_validate_reports_missing_definitions() {
        let mut rules = GameRules::default();
        rules.units.retain(|u| u.kind != UnitKind::Wolf);
        rules.difficulties.retain(|d| d.level != Difficulty::Hard);

        let problems = rules.problems();
        assert!(problems.iter().any(|p| p.contains("Wolf")));
        assert!(problems.iter().any(|p| p.contains("Hard")));
        assert!(matches!(rules.validate(), Err(GameError::InvalidRules(_))));
    }

    #[test]
    fn test_validate_rejects_wrong_faction_home() {
        let mut rules = GameRules::default();
        rules.player.home = StructureKind::Den;
        assert!(rules.problems().iter().any(|p| p.contains("home structure")));
    }

    #[test]
    fn test_combat_range_is_tile_fraction() {
        let rules = GameRules::default();
        // 32 px * 1.8 = 57.6 px
        let range_sq = rules.combat_range_sq();
        assert!(range_sq > Fixed::from_num(3317));
        assert!(range_sq < Fixed::from_num(3318));
    }

    #[test]
    fn test_growth_rule() {
        let growth = GrowthRule {
            base: 3,
            step_secs: 60,
            max: 8,
        };
        assert_eq!(growth.at(0), 3);
        assert_eq!(growth.at(59), 3);
        assert_eq!(growth.at(120), 5);
    }

    #[test]
    fn test_difficulty_from_str() {
        assert_eq!("Hard".parse::<Difficulty>().ok(), Some(Difficulty::Hard));
        assert!("brutal".parse::<Difficulty>().is_err());
    }
}
