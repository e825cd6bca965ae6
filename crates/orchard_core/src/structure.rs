//! Buildings: training and passive income.
//!
//! A structure is either idle or training exactly one unit. Income
//! accrues on its own timer regardless of training.

use serde::{Deserialize, Serialize};

use crate::agent::UnitKind;
use crate::components::{Body, Contact, EntityId, Health, TilePos};
use crate::data::{GameRules, StructureDef};
use crate::economy::Economy;
use crate::factions::Faction;
use crate::grid::GridMap;
use crate::map_generation::SimRng;
use crate::math::{fixed_serde, seconds_from_millis, Fixed, Vec2Fixed, SQRT_2};

use rand::Rng;

/// Building types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StructureKind {
    /// Player home and depot. Trains geese.
    Nest,
    /// Passive apple income.
    Granary,
    /// Trains ganders.
    Barracks,
    /// Lookout with a wide view.
    Tower,
    /// Opponent home and depot. Trains foxes and wolves.
    Den,
}

impl StructureKind {
    /// Every structure kind.
    pub const ALL: [Self; 5] = [Self::Nest, Self::Granary, Self::Barracks, Self::Tower, Self::Den];
}

/// Training progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StructureState {
    /// Nothing in production.
    #[default]
    Idle,
    /// Producing one unit.
    Training {
        /// Unit being trained.
        unit: UnitKind,
        /// Seconds spent so far.
        #[serde(with = "fixed_serde")]
        elapsed: Fixed,
        /// Seconds needed.
        #[serde(with = "fixed_serde")]
        duration: Fixed,
    },
}

/// Output of a structure's tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StructureOutput {
    /// A unit finished training and should be placed.
    pub spawn: Option<UnitKind>,
    /// Apples paid to the economy this tick.
    pub income: u32,
}

/// A building on the map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Structure {
    /// Identity and pixel centre.
    pub body: Body,
    /// Tile the structure occupies.
    pub tile: TilePos,
    /// Owning side.
    pub faction: Faction,
    /// Stats for this structure's kind.
    pub def: StructureDef,
    /// Hit points.
    pub health: Health,
    state: StructureState,
    #[serde(with = "fixed_serde")]
    income_timer: Fixed,
}

impl Structure {
    /// Create an idle structure at full health, centred on `tile`.
    #[must_use]
    pub fn new(id: EntityId, faction: Faction, def: StructureDef, tile: TilePos, position: Vec2Fixed) -> Self {
        Self {
            body: Body::new(id, position),
            tile,
            faction,
            health: Health::new(def.max_health),
            def,
            state: StructureState::Idle,
            income_timer: Fixed::ZERO,
        }
    }

    /// Entity id.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.body.id
    }

    /// Structure kind.
    #[must_use]
    pub const fn kind(&self) -> StructureKind {
        self.def.kind
    }

    /// Training state.
    #[must_use]
    pub const fn state(&self) -> StructureState {
        self.state
    }

    /// Health above zero.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        !self.health.is_dead()
    }

    /// Whether a new training order would be accepted (ignoring cost).
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state == StructureState::Idle && self.is_alive()
    }

    /// Snapshot of this structure's identity and location.
    #[must_use]
    pub const fn contact(&self) -> Contact {
        Contact {
            id: self.body.id,
            tile: self.tile,
            position: self.body.position,
            is_structure: true,
        }
    }

    /// Training progress in `[0, 1]`, if training.
    #[must_use]
    pub fn training_progress(&self) -> Option<(UnitKind, Fixed)> {
        match self.state {
            StructureState::Idle => None,
            StructureState::Training {
                unit,
                elapsed,
                duration,
            } => {
                let progress = if duration > Fixed::ZERO {
                    (elapsed / duration).min(Fixed::ONE)
                } else {
                    Fixed::ONE
                };
                Some((unit, progress))
            }
        }
    }

    /// Point `index` of the eight compass points `ring` pixels from the
    /// centre, starting east and turning clockwise. Clamped into the map.
    #[must_use]
    pub fn ring_point(&self, map: &GridMap, ring: Fixed, index: usize) -> Vec2Fixed {
        let diagonal = ring / SQRT_2;
        let (dx, dy) = match index % 8 {
            0 => (ring, Fixed::ZERO),
            1 => (diagonal, diagonal),
            2 => (Fixed::ZERO, ring),
            3 => (-diagonal, diagonal),
            4 => (-ring, Fixed::ZERO),
            5 => (-diagonal, -diagonal),
            6 => (Fixed::ZERO, -ring),
            _ => (diagonal, -diagonal),
        };
        map.clamp_position(self.body.position + Vec2Fixed::new(dx, dy))
    }

    /// A random compass point on the spawn ring.
    pub fn spawn_point(&self, map: &GridMap, ring: Fixed, rng: &mut SimRng) -> Vec2Fixed {
        let index = rng.gen_range(0..8);
        self.ring_point(map, ring, index)
    }

    /// Start training `unit`, paying its cost up front.
    ///
    /// Returns `false` and changes nothing if this structure cannot train
    /// that unit, is already training, or the economy cannot afford it.
    pub fn start_training(&mut self, unit: UnitKind, rules: &GameRules, economy: &mut Economy) -> bool {
        if !self.is_idle() || !self.def.can_produce(unit) {
            return false;
        }
        let Some(unit_def) = rules.unit(unit) else {
            return false;
        };
        if !economy.spend(unit_def.cost) {
            return false;
        }

        let duration = seconds_from_millis(self.def.train_time_ms.unwrap_or(unit_def.train_time_ms));
        self.state = StructureState::Training {
            unit,
            elapsed: Fixed::ZERO,
            duration,
        };
        tracing::debug!(structure = self.body.id, ?unit, cost = unit_def.cost, "training started");
        true
    }

    /// Advance training and income by `dt` seconds.
    pub fn update(&mut self, dt: Fixed, income_interval: Fixed, economy: &mut Economy) -> StructureOutput {
        let mut output = StructureOutput::default();

        if let StructureState::Training {
            unit,
            elapsed,
            duration,
        } = self.state
        {
            let elapsed = elapsed + dt;
            if elapsed >= duration {
                self.state = StructureState::Idle;
                output.spawn = Some(unit);
            } else {
                self.state = StructureState::Training {
                    unit,
                    elapsed,
                    duration,
                };
            }
        }

        if self.def.income > 0 && income_interval > Fixed::ZERO {
            self.income_timer += dt;
            while self.income_timer >= income_interval {
                self.income_timer -= income_interval;
                economy.pay_income(self.def.income);
                output.income += self.def.income;
            }
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(kind: StructureKind) -> (GameRules, Structure) {
        let rules = GameRules::default();
        let def = rules.structure(kind).unwrap().clone();
        let faction = def.faction;
        let structure = Structure::new(1, faction, def, TilePos::new(4, 4), Vec2Fixed::from_ints(144, 144));
        (rules, structure)
    }

    #[test]
    fn test_start_training_deducts_cost() {
        let (rules, mut nest) = build(StructureKind::Nest);
        let mut economy = Economy::new(50);

        assert!(nest.start_training(UnitKind::Goose, &rules, &mut economy));
        assert_eq!(economy.apples, 30);
        assert!(!nest.is_idle());
    }

    #[test]
    fn test_one_training_at_a_time() {
        let (rules, mut nest) = build(StructureKind::Nest);
        let mut economy = Economy::new(100);

        assert!(nest.start_training(UnitKind::Goose, &rules, &mut economy));
        assert!(!nest.start_training(UnitKind::Goose, &rules, &mut economy));
        assert_eq!(economy.apples, 80);
    }

    #[test]
    fn test_training_rejected_when_unaffordable_or_untrainable() {
        let (rules, mut nest) = build(StructureKind::Nest);
        let mut economy = Economy::new(19);
        assert!(!nest.start_training(UnitKind::Goose, &rules, &mut economy));
        assert_eq!(economy.apples, 19);

        let (rules, mut tower) = build(StructureKind::Tower);
        let mut rich = Economy::new(500);
        assert!(!tower.start_training(UnitKind::Goose, &rules, &mut rich));

        let (rules, mut nest) = build(StructureKind::Nest);
        assert!(!nest.start_training(UnitKind::Gander, &rules, &mut rich));
        assert_eq!(rich.apples, 500);
    }

    #[test]
    fn test_training_completes_once() {
        let (rules, mut barracks) = build(StructureKind::Barracks);
        let mut economy = Economy::new(20);
        assert!(barracks.start_training(UnitKind::Gander, &rules, &mut economy));

        let interval = Fixed::ONE;
        let mut spawned = Vec::new();
        for _ in 0..24 {
            // 0.25 s steps, 6 s total against a 5 s training time
            let out = barracks.update(Fixed::from_num(0.25), interval, &mut economy);
            spawned.extend(out.spawn);
        }

        assert_eq!(spawned, vec![UnitKind::Gander]);
        assert!(barracks.is_idle());
    }

    #[test]
    fn test_den_uses_unit_training_time() {
        let (rules, mut den) = build(StructureKind::Den);
        let mut economy = Economy::new(25);
        assert!(den.start_training(UnitKind::Wolf, &rules, &mut economy));
        assert_eq!(economy.apples, 0);

        let out = den.update(Fixed::from_num(7.5), Fixed::ONE, &mut economy);
        assert_eq!(out.spawn, None);
        let out = den.update(Fixed::from_num(0.5), Fixed::ONE, &mut economy);
        assert_eq!(out.spawn, Some(UnitKind::Wolf));
    }

    #[test]
    fn test_income_every_full_second() {
        let (_, mut granary) = build(StructureKind::Granary);
        let mut economy = Economy::new(0);

        let mut total = 0;
        for _ in 0..10 {
            total += granary.update(Fixed::from_num(0.25), Fixed::ONE, &mut economy).income;
        }
        // 2.5 s elapsed: two full intervals at 2 apples each
        assert_eq!(total, 4);
        assert_eq!(economy.apples, 4);
        assert_eq!(economy.income, 4);
    }

    #[test]
    fn test_ring_points_stay_on_map() {
        let (rules, mut nest) = build(StructureKind::Nest);
        let map = GridMap::new(64, 44, 32);
        let ring = rules.spawn_ring();

        let east = nest.ring_point(&map, ring, 0);
        assert!(east.x > nest.body.position.x);
        assert_eq!(east.y, nest.body.position.y);

        nest.body.position = Vec2Fixed::from_ints(4, 4);
        for i in 0..8 {
            let p = nest.ring_point(&map, ring, i);
            assert!(p.x >= Fixed::ZERO && p.y >= Fixed::ZERO, "point {i}: {p:?}");
        }
    }

    #[test]
    fn test_income_continues_while_training() {
        let (rules, mut nest) = build(StructureKind::Nest);
        nest.def.income = 3;
        let mut economy = Economy::new(20);

        assert!(nest.start_training(UnitKind::Goose, &rules, &mut economy));
        let out = nest.update(Fixed::ONE, Fixed::ONE, &mut economy);
        assert_eq!(out.income, 3);
        assert_eq!(out.spawn, None);
        assert!(nest.training_progress().is_some());
        assert_eq!(economy.apples, 3);
    }
}
