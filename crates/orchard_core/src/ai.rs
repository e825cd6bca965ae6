//! The opposing side's controller.
//!
//! The opponent plays by the same rules as the player: it owns an economy,
//! trains units at its structures and runs the shared agent state machine.
//! Instead of clicks it makes a strategic decision on a fixed interval
//! that depends on the difficulty:
//!
//! 1. Below the desired worker count: train a worker.
//! 2. Otherwise, below the desired army size: train a soldier.
//! 3. Independently: with enough idle soldiers, attack the first hostile
//!    structure with all of them.

use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentContext, AgentEvent, AgentState, UnitKind};
use crate::components::{Contact, EntityId, IdAllocator, TilePos};
use crate::data::{DifficultyPreset, EnemyRules, GameRules};
use crate::economy::Economy;
use crate::error::{GameError, Result};
use crate::factions::Faction;
use crate::grid::GridMap;
use crate::map_generation::SimRng;
use crate::math::{scale_ceil, scale_round, Fixed};
use crate::structure::Structure;

/// What the controller does with a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AiDecision {
    /// Started a worker at a structure.
    TrainWorker {
        /// Training structure.
        structure: EntityId,
    },
    /// Started a soldier at a structure.
    TrainSoldier {
        /// Training structure.
        structure: EntityId,
    },
    /// Sent every idle soldier at a hostile structure.
    LaunchAttack {
        /// Structure under attack.
        target: EntityId,
        /// Soldiers sent.
        attackers: u32,
    },
}

/// The world as the controller sees it during its update.
pub struct AiContext<'a> {
    /// Shared map.
    pub map: &'a mut GridMap,
    /// Match rules.
    pub rules: &'a GameRules,
    /// Session id counter.
    pub ids: &'a mut IdAllocator,
    /// Session RNG, for spawn offsets.
    pub rng: &'a mut SimRng,
    /// Live hostile structures, in id order.
    pub hostile_structures: &'a [Contact],
}

/// Everything the controller did in one update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AiReport {
    /// Units that finished training.
    pub spawned: Vec<EntityId>,
    /// Worker deliveries.
    pub deposits: Vec<AgentEvent>,
    /// Decisions taken this update.
    pub decisions: Vec<AiDecision>,
}

/// The opposing faction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AiController {
    /// Opponent apples.
    pub economy: Economy,
    pub(crate) agents: Vec<Agent>,
    pub(crate) structures: Vec<Structure>,
    preset: DifficultyPreset,
    home_tile: TilePos,
    #[serde(with = "crate::math::fixed_serde")]
    elapsed: Fixed,
    #[serde(with = "crate::math::fixed_serde")]
    decision_timer: Fixed,
    waves: u32,
}

impl AiController {
    /// Place the home structure and the initial workers.
    ///
    /// # Errors
    ///
    /// Fails if the rules lack the home structure or worker definition.
    pub fn new(rules: &GameRules, preset: DifficultyPreset, map: &GridMap, ids: &mut IdAllocator) -> Result<Self> {
        let enemy = &rules.enemy;
        let home_def = rules
            .structure(enemy.home)
            .cloned()
            .ok_or_else(|| GameError::InvalidRules(vec![format!("Structure {:?} has no definition", enemy.home)]))?;
        let worker_def = rules
            .unit(enemy.worker)
            .copied()
            .ok_or_else(|| GameError::InvalidRules(vec![format!("Unit {:?} has no definition", enemy.worker)]))?;

        let home_tile = find_home_tile(map, enemy);
        let home = Structure::new(
            ids.allocate(),
            Faction::Enemy,
            home_def,
            home_tile,
            map.tile_center(home_tile),
        );

        let ring = rules.spawn_ring();
        let count = enemy.initial_workers as usize;
        let agents = (0..count)
            .map(|i| {
                let position = home.ring_point(map, ring, i * 8 / count);
                Agent::new(ids.allocate(), Faction::Enemy, worker_def, position)
                    .with_gather_percent(preset.gather_percent)
                    .with_home(home_tile)
            })
            .collect();

        tracing::info!(?home_tile, workers = count, difficulty = ?preset.level, "opponent placed");

        Ok(Self {
            economy: Economy::new(enemy.apples),
            agents,
            structures: vec![home],
            preset,
            home_tile,
            elapsed: Fixed::ZERO,
            decision_timer: Fixed::ZERO,
            waves: 0,
        })
    }

    /// Opponent agents, including any killed since the last cleanup.
    #[must_use]
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Opponent structures, including any destroyed since the last cleanup.
    #[must_use]
    pub fn structures(&self) -> &[Structure] {
        &self.structures
    }

    /// Difficulty preset in force.
    #[must_use]
    pub const fn preset(&self) -> DifficultyPreset {
        self.preset
    }

    /// Tile of the home structure.
    #[must_use]
    pub const fn home_tile(&self) -> TilePos {
        self.home_tile
    }

    /// Attack waves launched so far.
    #[must_use]
    pub const fn waves(&self) -> u32 {
        self.waves
    }

    /// Whether a live home structure remains.
    #[must_use]
    pub fn has_home(&self) -> bool {
        self.structures.iter().any(|s| s.def.home && s.is_alive())
    }

    fn elapsed_secs(&self) -> u32 {
        self.elapsed.saturating_to_num::<u32>()
    }

    /// Workers wanted at the current game time.
    #[must_use]
    pub fn desired_workers(&self, rules: &GameRules) -> u32 {
        let growth = rules.enemy.worker_growth;
        growth.at(self.elapsed_secs()).min(growth.max)
    }

    /// Soldiers wanted at the current game time, difficulty applied.
    #[must_use]
    pub fn desired_army(&self, rules: &GameRules) -> u32 {
        let growth = rules.enemy.army_growth;
        let percent = self.preset.army_percent;
        scale_round(growth.max, percent).min(scale_round(growth.at(self.elapsed_secs()), percent))
    }

    /// Idle soldiers needed before an attack is launched.
    #[must_use]
    pub fn attack_threshold(&self, rules: &GameRules) -> u32 {
        scale_ceil(self.desired_army(rules), self.preset.attack_threshold_percent).max(1)
    }

    fn count_alive(&self, kind: UnitKind) -> u32 {
        self.agents.iter().filter(|a| a.is_alive() && a.kind() == kind).count() as u32
    }

    /// Advance the opponent by `dt` seconds: structures, then agents,
    /// then a decision if the interval has elapsed.
    pub fn update(&mut self, dt: Fixed, ctx: &mut AiContext<'_>) -> AiReport {
        let mut report = AiReport::default();
        self.elapsed += dt;

        let income_interval = ctx.rules.simulation.income_interval();
        let mut trained = Vec::new();
        for (index, structure) in self.structures.iter_mut().enumerate() {
            if !structure.is_alive() {
                continue;
            }
            if let Some(kind) = structure.update(dt, income_interval, &mut self.economy).spawn {
                trained.push((index, kind));
            }
        }
        for (index, kind) in trained {
            report.spawned.extend(self.spawn(index, kind, ctx));
        }

        let depots: Vec<Contact> = self
            .structures
            .iter()
            .filter(|s| s.is_alive() && s.def.depot)
            .map(Structure::contact)
            .collect();
        let mut agent_ctx = AgentContext {
            map: &mut *ctx.map,
            economy: &mut self.economy,
            depots: &depots,
            rules: &ctx.rules.simulation,
        };
        for agent in self.agents.iter_mut().filter(|a| a.is_alive()) {
            report.deposits.extend(agent.update(dt, &mut agent_ctx));
        }

        self.decision_timer += dt;
        if self.decision_timer >= self.preset.decision_interval() {
            self.decision_timer = Fixed::ZERO;
            report.decisions = self.decide(ctx);
        }
        report
    }

    fn spawn(&mut self, index: usize, kind: UnitKind, ctx: &mut AiContext<'_>) -> Option<EntityId> {
        let Some(def) = ctx.rules.unit(kind).copied() else {
            tracing::warn!(?kind, "trained unit has no definition");
            return None;
        };
        let position = self.structures[index].spawn_point(ctx.map, ctx.rules.spawn_ring(), ctx.rng);
        let id = ctx.ids.allocate();
        self.agents.push(
            Agent::new(id, Faction::Enemy, def, position)
                .with_gather_percent(self.preset.gather_percent)
                .with_home(self.home_tile),
        );
        tracing::debug!(id, ?kind, "opponent unit trained");
        Some(id)
    }

    /// Take one strategic decision.
    pub fn decide(&mut self, ctx: &mut AiContext<'_>) -> Vec<AiDecision> {
        let rules = ctx.rules;
        let enemy = &rules.enemy;
        let mut decisions = Vec::new();

        // A worker that cannot be trained yet leaves the turn to the army.
        let trained_worker = if self.count_alive(enemy.worker) < self.desired_workers(rules) {
            self.try_train(enemy.worker, rules)
        } else {
            None
        };
        if let Some(structure) = trained_worker {
            decisions.push(AiDecision::TrainWorker { structure });
        } else if self.count_alive(enemy.soldier) < self.desired_army(rules) {
            if let Some(structure) = self.try_train(enemy.soldier, rules) {
                decisions.push(AiDecision::TrainSoldier { structure });
            }
        }

        let idle: Vec<usize> = self
            .agents
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_alive() && a.kind() == enemy.soldier && a.state() == AgentState::Idle)
            .map(|(i, _)| i)
            .collect();

        if idle.len() as u32 >= self.attack_threshold(rules) {
            if let Some(target) = ctx.hostile_structures.first() {
                let max = rules.simulation.max_path_iterations;
                for &i in &idle {
                    self.agents[i].attack_move(ctx.map, target.tile, max);
                }
                self.waves += 1;
                tracing::info!(
                    wave = self.waves,
                    attackers = idle.len(),
                    target = target.id,
                    "opponent attack launched"
                );
                decisions.push(AiDecision::LaunchAttack {
                    target: target.id,
                    attackers: idle.len() as u32,
                });
            }
        }

        decisions
    }

    /// Start `kind` at the first idle structure that produces it, if affordable.
    fn try_train(&mut self, kind: UnitKind, rules: &GameRules) -> Option<EntityId> {
        let cost = rules.unit(kind)?.cost;
        if !self.economy.can_afford(cost) {
            return None;
        }
        let structure = self
            .structures
            .iter_mut()
            .find(|s| s.is_idle() && s.def.can_produce(kind))?;
        if structure.start_training(kind, rules, &mut self.economy) {
            tracing::info!(structure = structure.id(), ?kind, "opponent training");
            Some(structure.id())
        } else {
            None
        }
    }
}

/// First walkable tile in growing squares around the far corner. Falls
/// back to the map centre.
fn find_home_tile(map: &GridMap, enemy: &EnemyRules) -> TilePos {
    let corner = TilePos::new(
        map.width() as i32 - enemy.home_corner_offset,
        map.height() as i32 - enemy.home_corner_offset,
    );
    for r in 0..=enemy.home_search_radius {
        for dy in -r..=r {
            for dx in -r..=r {
                let tile = TilePos::new(corner.x + dx, corner.y + dy);
                if map.is_walkable(tile) {
                    return tile;
                }
            }
        }
    }
    let centre = TilePos::new(map.width() as i32 / 2, map.height() as i32 / 2);
    tracing::warn!(?corner, ?centre, "no walkable home tile near the corner");
    centre
}
