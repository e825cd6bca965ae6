//! A single match: the orchestrator that owns every entity.
//!
//! # Tick order
//!
//! Each [`Session::advance`] runs these phases, with no interleaving:
//!
//! 1. **Commands** - drain the player's command queue
//! 2. **Structures** - player training and income
//! 3. **Agents** - player agent state machines
//! 4. **Opponent** - the [`AiController`] mirrors 2 and 3, then decides
//! 5. **Combat** - simultaneous melee between the factions
//! 6. **Cleanup** - remove everything with zero health
//! 7. **Terminal check** - a faction without a home structure has lost
//! 8. **Vision** - recompute the player's fog
//!
//! # Determinism
//!
//! All state is fixed-point and every random draw comes from the
//! session's seeded RNG, so the same seed and the same command stream
//! always reach the same [`state_hash`](Session::state_hash).
//!
//! # Example
//!
//! ```
//! use orchard_core::prelude::*;
//!
//! let mut session = Session::new(GameRules::default(), SessionConfig::default()).unwrap();
//! session.select_all();
//! let events = session.advance(Fixed::from_num(0.05));
//! assert!(events.outcome.is_none());
//! assert_eq!(session.tick(), 1);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentContext, AgentEvent, UnitKind};
use crate::ai::{AiContext, AiController, AiDecision};
use crate::combat::{self, DamageEvent, Side};
use crate::commands::{formation_slots, CommandQueue, PlayerCommand, Selection};
use crate::components::{Contact, EntityId, IdAllocator, TilePos};
use crate::data::{Difficulty, GameRules};
use crate::economy::Economy;
use crate::error::{GameError, Result};
use crate::factions::Faction;
use crate::grid::GridMap;
use crate::map_generation::{generate_map, seeded_rng, SimRng};
use crate::math::{Fixed, Vec2Fixed};
use crate::snapshot::SessionSnapshot;
use crate::structure::{Structure, StructureKind};

/// How to start a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Seed for map generation and spawn offsets.
    pub seed: u64,
    /// Opponent strength.
    pub difficulty: Difficulty,
}

impl SessionConfig {
    /// Config with the given seed at normal difficulty.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }
}

/// How a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Outcome {
    /// The side that still has its home.
    pub winner: Faction,
}

/// Anything the player can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityRef {
    /// A player agent.
    Agent(EntityId),
    /// A player structure.
    Structure(EntityId),
    /// A resource node with supply left.
    Resource(EntityId),
}

/// Events generated during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvents {
    /// Agents created this tick, both sides.
    pub spawned: Vec<EntityId>,
    /// Entities removed by cleanup this tick.
    pub deaths: Vec<EntityId>,
    /// Hits landed in the combat pass.
    pub damage: Vec<DamageEvent>,
    /// Cargo delivered, both sides.
    pub deposits: Vec<AgentEvent>,
    /// Opponent decisions.
    pub decisions: Vec<AiDecision>,
    /// Set on the tick the match ends.
    pub outcome: Option<Outcome>,
}

/// Where every apple taken from the map has gone.
///
/// `extracted == delivered + carried + lost` holds after every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SupplyLedger {
    /// Apples removed from resource nodes.
    pub extracted: u64,
    /// Apples deposited into either economy.
    pub delivered: u64,
    /// Apples held by living agents.
    pub carried: u64,
    /// Apples held by agents when they died.
    pub lost: u64,
}

impl SupplyLedger {
    /// Check that every extracted apple is accounted for.
    #[must_use]
    pub const fn is_balanced(&self) -> bool {
        self.extracted == self.delivered + self.carried + self.lost
    }
}

/// A running match.
#[derive(Debug, Clone)]
pub struct Session {
    rules: GameRules,
    seed: u64,
    map: GridMap,
    rng: SimRng,
    ids: IdAllocator,
    agents: Vec<Agent>,
    structures: Vec<Structure>,
    economy: Economy,
    enemy: AiController,
    selection: Selection,
    commands: CommandQueue,
    elapsed: Fixed,
    tick: u64,
    outcome: Option<Outcome>,
    lost_cargo: u64,
}

impl Session {
    /// Start a match on a generated map.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidRules`] if the rules fail validation.
    pub fn new(rules: GameRules, config: SessionConfig) -> Result<Self> {
        rules.validate()?;
        let mut rng = seeded_rng(config.seed);
        let mut ids = IdAllocator::new();
        let map = generate_map(&rules.map, &mut rng, &mut ids);
        Self::assemble(rules, config, map, rng, ids)
    }

    /// Start a match on a prepared map. Ids continue after the map's
    /// highest node id.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidRules`] if the rules fail validation.
    pub fn with_map(rules: GameRules, map: GridMap, config: SessionConfig) -> Result<Self> {
        rules.validate()?;
        let next = map.nodes().iter().map(|n| n.body.id).max().map_or(1, |id| id + 1);
        Self::assemble(rules, config, map, seeded_rng(config.seed), IdAllocator::starting_at(next))
    }

    fn assemble(rules: GameRules, config: SessionConfig, map: GridMap, rng: SimRng, mut ids: IdAllocator) -> Result<Self> {
        let missing = |what: String| GameError::InvalidRules(vec![what]);
        let preset = *rules
            .difficulty(config.difficulty)
            .ok_or_else(|| missing(format!("Difficulty {:?} has no preset", config.difficulty)))?;
        let start = &rules.player;
        let home_def = rules
            .structure(start.home)
            .cloned()
            .ok_or_else(|| missing(format!("Structure {:?} has no definition", start.home)))?;
        let worker_def = rules
            .unit(start.worker)
            .copied()
            .ok_or_else(|| missing(format!("Unit {:?} has no definition", start.worker)))?;

        let home_tile = map.clamp_tile(start.home_tile);
        let home = Structure::new(
            ids.allocate(),
            Faction::Player,
            home_def,
            home_tile,
            map.tile_center(home_tile),
        );
        let agents = (0..start.workers as i32)
            .map(|i| {
                let tile = map.clamp_tile(TilePos::new(
                    start.first_worker_tile.x + i * start.worker_spacing,
                    start.first_worker_tile.y,
                ));
                Agent::new(ids.allocate(), Faction::Player, worker_def, map.tile_center(tile))
            })
            .collect();

        let enemy = AiController::new(&rules, preset, &map, &mut ids)?;

        let mut session = Self {
            economy: Economy::new(start.apples),
            rules,
            seed: config.seed,
            map,
            rng,
            ids,
            agents,
            structures: vec![home],
            enemy,
            selection: Selection::default(),
            commands: CommandQueue::new(),
            elapsed: Fixed::ZERO,
            tick: 0,
            outcome: None,
            lost_cargo: 0,
        };
        session.update_fog();

        tracing::info!(
            seed = config.seed,
            difficulty = ?config.difficulty,
            nodes = session.map.nodes().len(),
            "session started"
        );
        Ok(session)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Rules in force.
    #[must_use]
    pub const fn rules(&self) -> &GameRules {
        &self.rules
    }

    /// Seed the session was started with.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// The map, with resource nodes and the player's fog.
    #[must_use]
    pub const fn map(&self) -> &GridMap {
        &self.map
    }

    /// Player agents.
    #[must_use]
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Player structures.
    #[must_use]
    pub fn structures(&self) -> &[Structure] {
        &self.structures
    }

    /// The player's economy.
    #[must_use]
    pub const fn economy(&self) -> &Economy {
        &self.economy
    }

    /// The opponent.
    #[must_use]
    pub const fn enemy(&self) -> &AiController {
        &self.enemy
    }

    /// The player's selection.
    #[must_use]
    pub const fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Ticks simulated so far.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Game time in seconds.
    #[must_use]
    pub const fn elapsed(&self) -> Fixed {
        self.elapsed
    }

    /// Match result, once decided.
    #[must_use]
    pub const fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// True once either home structure has fallen.
    #[must_use]
    pub const fn is_over(&self) -> bool {
        self.outcome.is_some()
    }

    /// Look up an agent of either side.
    #[must_use]
    pub fn agent(&self, id: EntityId) -> Option<&Agent> {
        self.agents.iter().chain(self.enemy.agents.iter()).find(|a| a.id() == id)
    }

    /// Look up a structure of either side.
    #[must_use]
    pub fn structure(&self, id: EntityId) -> Option<&Structure> {
        self.structures
            .iter()
            .chain(self.enemy.structures.iter())
            .find(|s| s.id() == id)
    }

    /// Mutable access to an agent of either side, for scenario setup.
    pub fn agent_mut(&mut self, id: EntityId) -> Option<&mut Agent> {
        self.agents
            .iter_mut()
            .chain(self.enemy.agents.iter_mut())
            .find(|a| a.id() == id)
    }

    /// Mutable access to a structure of either side, for scenario setup.
    pub fn structure_mut(&mut self, id: EntityId) -> Option<&mut Structure> {
        self.structures
            .iter_mut()
            .chain(self.enemy.structures.iter_mut())
            .find(|s| s.id() == id)
    }

    /// Capture a read-only frame.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::capture(self)
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Advance the match by `dt` seconds, clamped to the maximum step.
    ///
    /// Once the match is over this is a no-op returning no events.
    pub fn advance(&mut self, dt: Fixed) -> TickEvents {
        if self.is_over() {
            return TickEvents::default();
        }
        let dt = dt.clamp(Fixed::ZERO, self.rules.simulation.max_step());
        let mut events = TickEvents::default();

        for command in self.commands.drain() {
            self.apply_command(command);
        }

        self.tick += 1;
        self.elapsed += dt;

        self.update_structures(dt, &mut events);
        self.update_agents(dt, &mut events);
        self.update_enemy(dt, &mut events);
        events.damage = self.resolve_combat(dt);
        self.cleanup(&mut events);
        self.check_outcome(&mut events);
        self.update_fog();

        #[cfg(debug_assertions)]
        tracing::trace!(tick = self.tick, hash = self.state_hash(), "tick complete");

        #[cfg(feature = "debug-validation")]
        self.check_invariants();

        events
    }

    fn update_structures(&mut self, dt: Fixed, events: &mut TickEvents) {
        let interval = self.rules.simulation.income_interval();
        let ring = self.rules.spawn_ring();

        let mut trained = Vec::new();
        for structure in self.structures.iter_mut().filter(|s| s.is_alive()) {
            if let Some(kind) = structure.update(dt, interval, &mut self.economy).spawn {
                let at = structure.spawn_point(&self.map, ring, &mut self.rng);
                trained.push((kind, at));
            }
        }
        for (kind, at) in trained {
            events.spawned.extend(self.insert_agent(Faction::Player, kind, at));
        }
    }

    fn update_agents(&mut self, dt: Fixed, events: &mut TickEvents) {
        let depots: Vec<Contact> = self
            .structures
            .iter()
            .filter(|s| s.is_alive() && s.def.depot)
            .map(Structure::contact)
            .collect();
        let mut ctx = AgentContext {
            map: &mut self.map,
            economy: &mut self.economy,
            depots: &depots,
            rules: &self.rules.simulation,
        };
        for agent in self.agents.iter_mut().filter(|a| a.is_alive()) {
            events.deposits.extend(agent.update(dt, &mut ctx));
        }
    }

    fn update_enemy(&mut self, dt: Fixed, events: &mut TickEvents) {
        let hostiles: Vec<Contact> = self
            .structures
            .iter()
            .filter(|s| s.is_alive())
            .map(Structure::contact)
            .collect();
        let mut ctx = AiContext {
            map: &mut self.map,
            rules: &self.rules,
            ids: &mut self.ids,
            rng: &mut self.rng,
            hostile_structures: &hostiles,
        };
        let report = self.enemy.update(dt, &mut ctx);
        events.spawned.extend(report.spawned);
        events.deposits.extend(report.deposits);
        events.decisions = report.decisions;
    }

    fn resolve_combat(&mut self, dt: Fixed) -> Vec<DamageEvent> {
        combat::resolve_combat(
            dt,
            &self.rules,
            &self.map,
            Side {
                agents: &mut self.agents,
                structures: &mut self.structures,
            },
            Side {
                agents: &mut self.enemy.agents,
                structures: &mut self.enemy.structures,
            },
        )
    }

    fn cleanup(&mut self, events: &mut TickEvents) {
        let mut dead = Vec::new();
        let mut lost = 0u64;

        for agents in [&mut self.agents, &mut self.enemy.agents] {
            agents.retain(|a| {
                if a.is_alive() {
                    return true;
                }
                lost += u64::from(a.carried());
                dead.push(a.id());
                false
            });
        }
        for structures in [&mut self.structures, &mut self.enemy.structures] {
            structures.retain(|s| {
                if s.is_alive() {
                    return true;
                }
                dead.push(s.id());
                false
            });
        }

        if !dead.is_empty() {
            dead.sort_unstable();
            self.lost_cargo += lost;
            self.selection.retain(|id| dead.binary_search(&id).is_err());
            tracing::debug!(tick = self.tick, removed = ?dead, "cleanup");
        }
        events.deaths = dead;
    }

    fn check_outcome(&mut self, events: &mut TickEvents) {
        let player_home = self.structures.iter().any(|s| s.def.home && s.is_alive());
        let winner = if !player_home {
            Some(Faction::Enemy)
        } else if !self.enemy.has_home() {
            Some(Faction::Player)
        } else {
            None
        };

        if let Some(winner) = winner {
            let outcome = Outcome { winner };
            tracing::info!(tick = self.tick, winner = %winner, "session over");
            self.outcome = Some(outcome);
            events.outcome = Some(outcome);
        }
    }

    fn update_fog(&mut self) {
        let map = &self.map;
        let viewers: Vec<(TilePos, u32)> = self
            .agents
            .iter()
            .map(|a| (a.tile(map), a.def.vision))
            .chain(self.structures.iter().map(|s| (s.tile, s.def.vision)))
            .collect();
        self.map.recompute_vision(viewers);
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Queue a command for the start of the next tick.
    pub fn queue_command(&mut self, command: PlayerCommand) {
        self.commands.push(command);
    }

    /// Commands waiting for the next tick.
    #[must_use]
    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    /// Apply a command now. Returns whether it had any effect.
    pub fn apply_command(&mut self, command: PlayerCommand) -> bool {
        match command {
            PlayerCommand::SelectAt { point, additive } => self.select_at(point, additive),
            PlayerCommand::SelectBox { from, to, additive } => self.select_box(from, to, additive) > 0,
            PlayerCommand::ClearSelection => {
                self.selection.clear();
                true
            }
            PlayerCommand::SelectAll => self.select_all() > 0,
            PlayerCommand::Move { tile } => self.issue_move(tile),
            PlayerCommand::Gather { node } => self.issue_gather(node),
            PlayerCommand::PlaceStructure { tile, kind } => self.place_structure(tile, kind).is_some(),
            PlayerCommand::Train { structure } => self.start_training(structure),
        }
    }

    /// The first player agent, then player structure, then resource node
    /// with supply whose centre lies within `radius` pixels of `point`.
    #[must_use]
    pub fn entity_at(&self, point: Vec2Fixed, radius: Fixed) -> Option<EntityRef> {
        if let Some(agent) = self
            .agents
            .iter()
            .find(|a| a.is_alive() && a.body.contains(point, radius))
        {
            return Some(EntityRef::Agent(agent.id()));
        }
        if let Some(structure) = self
            .structures
            .iter()
            .find(|s| s.is_alive() && s.body.contains(point, radius))
        {
            return Some(EntityRef::Structure(structure.id()));
        }
        self.map
            .nodes()
            .iter()
            .find(|n| !n.is_exhausted() && n.body.contains(point, radius))
            .map(|n| EntityRef::Resource(n.body.id))
    }

    /// Select whatever player entity lies under `point`.
    ///
    /// Without `additive` the previous selection is cleared first, even
    /// if nothing is hit. Returns whether something was selected.
    pub fn select_at(&mut self, point: Vec2Fixed, additive: bool) -> bool {
        if !additive {
            self.selection.clear();
        }
        let radius = Fixed::from_num(self.rules.simulation.select_radius);
        match self.entity_at(point, radius) {
            Some(EntityRef::Agent(id)) => {
                self.selection.add_agent(id);
                true
            }
            Some(EntityRef::Structure(id)) => {
                self.selection.set_structure(id);
                true
            }
            Some(EntityRef::Resource(_)) | None => false,
        }
    }

    /// Select every player agent inside the rectangle spanned by two
    /// corners, edges included. Returns how many agents were added.
    pub fn select_box(&mut self, from: Vec2Fixed, to: Vec2Fixed, additive: bool) -> usize {
        if !additive {
            self.selection.clear();
        }
        let min = Vec2Fixed::new(from.x.min(to.x), from.y.min(to.y));
        let max = Vec2Fixed::new(from.x.max(to.x), from.y.max(to.y));

        let mut count = 0;
        for agent in self.agents.iter().filter(|a| a.is_alive()) {
            let p = agent.position();
            if p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y {
                self.selection.add_agent(agent.id());
                count += 1;
            }
        }
        count
    }

    /// Select every player agent, replacing the selection.
    pub fn select_all(&mut self) -> usize {
        self.selection.clear();
        for agent in self.agents.iter().filter(|a| a.is_alive()) {
            self.selection.add_agent(agent.id());
        }
        self.selection.agents().len()
    }

    /// Select one player agent by id, as a roster click would.
    pub fn select_agent(&mut self, id: EntityId, additive: bool) -> bool {
        if !additive {
            self.selection.clear();
        }
        let found = self.agents.iter().any(|a| a.id() == id && a.is_alive());
        if found {
            self.selection.add_agent(id);
        }
        found
    }

    /// Move the selected agents to `tile` in formation.
    ///
    /// No-op when the tile is not walkable. A formation slot that is off
    /// the map or not walkable falls back to `tile` itself. Returns
    /// whether any agent started moving.
    pub fn issue_move(&mut self, tile: TilePos) -> bool {
        if !self.map.is_walkable(tile) {
            return false;
        }
        let selected = self.selection.agents().to_vec();
        let max = self.rules.simulation.max_path_iterations;

        let mut moved = false;
        for (id, slot) in selected.iter().zip(formation_slots(tile, selected.len())) {
            let slot = self.map.clamp_tile(slot);
            let dest = if self.map.is_walkable(slot) { slot } else { tile };
            if let Some(agent) = self.agents.iter_mut().find(|a| a.id() == *id && a.is_alive()) {
                moved |= agent.send_to(&self.map, dest, max);
            }
        }
        moved
    }

    /// Send the selected gatherers to a node. Returns whether any agent
    /// accepted the order.
    pub fn issue_gather(&mut self, node: EntityId) -> bool {
        if self.map.supply(node) == 0 {
            return false;
        }
        let selected = self.selection.agents().to_vec();
        let max = self.rules.simulation.max_path_iterations;

        let mut accepted = false;
        for id in selected {
            if let Some(agent) = self.agents.iter_mut().find(|a| a.id() == id && a.is_alive()) {
                accepted |= agent.gather_from(&self.map, node, max);
            }
        }
        accepted
    }

    /// Whether the player could build `kind` on `tile` right now.
    #[must_use]
    pub fn can_place_structure(&self, tile: TilePos, kind: StructureKind) -> bool {
        let Some(def) = self.rules.structure(kind) else {
            return false;
        };
        def.buildable
            && def.faction == Faction::Player
            && self.map.is_walkable(tile)
            && !self
                .structures
                .iter()
                .chain(self.enemy.structures.iter())
                .any(|s| s.tile == tile)
            && self.economy.can_afford(def.cost)
    }

    /// Build `kind` on `tile`, paying its cost.
    pub fn place_structure(&mut self, tile: TilePos, kind: StructureKind) -> Option<EntityId> {
        if !self.can_place_structure(tile, kind) {
            return None;
        }
        let def = self.rules.structure(kind)?.clone();
        if !self.economy.spend(def.cost) {
            return None;
        }
        let id = self.ids.allocate();
        let position = self.map.tile_center(tile);
        self.structures
            .push(Structure::new(id, Faction::Player, def, tile, position));
        tracing::debug!(id, ?kind, ?tile, "structure placed");
        Some(id)
    }

    /// Start training at a player structure. Returns whether training
    /// started.
    pub fn start_training(&mut self, structure: EntityId) -> bool {
        let rules = &self.rules;
        let Some(target) = self
            .structures
            .iter_mut()
            .find(|s| s.id() == structure && s.is_alive())
        else {
            return false;
        };
        let Some(&unit) = target.def.trains.first() else {
            return false;
        };
        target.start_training(unit, rules, &mut self.economy)
    }

    // ------------------------------------------------------------------
    // Scenario setup
    // ------------------------------------------------------------------

    /// Place a new agent on a tile's centre, for scenarios and tests.
    pub fn spawn_agent(&mut self, faction: Faction, kind: UnitKind, tile: TilePos) -> Option<EntityId> {
        if !self.map.in_bounds(tile) {
            return None;
        }
        let position = self.map.tile_center(tile);
        self.insert_agent(faction, kind, position)
    }

    /// Place a new structure on a tile, free of charge, for scenarios and
    /// tests.
    pub fn spawn_structure(&mut self, faction: Faction, kind: StructureKind, tile: TilePos) -> Option<EntityId> {
        if !self.map.in_bounds(tile) {
            return None;
        }
        let def = self.rules.structure(kind)?.clone();
        let id = self.ids.allocate();
        let structure = Structure::new(id, faction, def, tile, self.map.tile_center(tile));
        match faction {
            Faction::Player => self.structures.push(structure),
            Faction::Enemy => self.enemy.structures.push(structure),
        }
        Some(id)
    }

    fn insert_agent(&mut self, faction: Faction, kind: UnitKind, position: Vec2Fixed) -> Option<EntityId> {
        let Some(def) = self.rules.unit(kind).copied() else {
            tracing::warn!(?kind, "unit has no definition, not spawned");
            return None;
        };
        let id = self.ids.allocate();
        let agent = Agent::new(id, faction, def, position);
        match faction {
            Faction::Player => self.agents.push(agent),
            Faction::Enemy => {
                let agent = agent
                    .with_home(self.enemy.home_tile())
                    .with_gather_percent(self.enemy.preset().gather_percent);
                self.enemy.agents.push(agent);
            }
        }
        tracing::debug!(id, ?faction, ?kind, "agent spawned");
        Some(id)
    }

    // ------------------------------------------------------------------
    // Checks
    // ------------------------------------------------------------------

    /// Where every extracted apple has gone.
    #[must_use]
    pub fn supply_ledger(&self) -> SupplyLedger {
        let extracted = self
            .map
            .nodes()
            .iter()
            .map(|n| u64::from(n.max_supply - n.supply))
            .sum();
        let carried = self
            .agents
            .iter()
            .chain(self.enemy.agents.iter())
            .map(|a| u64::from(a.carried()))
            .sum();
        SupplyLedger {
            extracted,
            delivered: self.economy.gathered + self.enemy.economy.gathered,
            carried,
            lost: self.lost_cargo,
        }
    }

    /// Hash of all simulation state, for determinism checks.
    ///
    /// Two sessions with identical state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.elapsed.to_bits().hash(&mut hasher);
        self.ids.peek().hash(&mut hasher);
        self.rng.get_word_pos().hash(&mut hasher);

        self.map.hash(&mut hasher);
        self.agents.hash(&mut hasher);
        self.structures.hash(&mut hasher);
        self.economy.hash(&mut hasher);
        self.enemy.hash(&mut hasher);

        self.lost_cargo.hash(&mut hasher);
        self.outcome.hash(&mut hasher);

        hasher.finish()
    }

    #[cfg(feature = "debug-validation")]
    fn check_invariants(&self) {
        let ledger = self.supply_ledger();
        assert!(ledger.is_balanced(), "apples unaccounted for: {ledger:?}");
        for agent in self.agents.iter().chain(self.enemy.agents.iter()) {
            assert!(agent.is_alive(), "dead agent {} survived cleanup", agent.id());
            assert!(
                agent.carried() <= agent.def.capacity(),
                "agent {} over capacity",
                agent.id()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentState;
    use crate::grid::{Fog, Terrain};

    fn session(seed: u64) -> Session {
        Session::new(GameRules::default(), SessionConfig::with_seed(seed)).unwrap()
    }

    /// An open 20x20 map: nest at (4,4), geese on row 5, den at (12,12).
    fn open_session() -> Session {
        let map = GridMap::new(20, 20, 32);
        Session::with_map(GameRules::default(), map, SessionConfig::with_seed(1)).unwrap()
    }

    fn run(session: &mut Session, dt: f64, ticks: u32) -> Vec<TickEvents> {
        (0..ticks).map(|_| session.advance(Fixed::from_num(dt))).collect()
    }

    #[test]
    fn test_fresh_session() {
        let mut s = session(7);
        assert_eq!(s.agents().len(), 3);
        assert_eq!(s.structures().len(), 1);
        assert_eq!(s.economy().apples, 50);
        assert_eq!(s.enemy().structures().len(), 1);
        assert_eq!(s.enemy().agents().len(), 3);

        s.advance(Fixed::from_num(0.05));

        for tile in [(4, 4), (5, 5), (7, 5), (9, 5)] {
            assert_eq!(s.map().fog(TilePos::new(tile.0, tile.1)), Fog::Visible);
        }
        assert!(!s.is_over());
        assert_eq!(s.tick(), 1);
    }

    #[test]
    fn test_step_is_clamped() {
        let mut s = session(1);
        s.advance(Fixed::from_num(5));
        assert_eq!(s.elapsed(), s.rules().simulation.max_step());
        s.advance(Fixed::from_num(-1));
        assert_eq!(s.elapsed(), s.rules().simulation.max_step());
    }

    #[test]
    fn test_with_map_ids_follow_nodes() {
        let mut map = GridMap::new(20, 20, 32);
        map.add_node(40, TilePos::new(15, 3), 50, 12);
        let s = Session::with_map(GameRules::default(), map, SessionConfig::default()).unwrap();
        assert_eq!(s.structures()[0].id(), 41);
    }

    #[test]
    fn test_invalid_rules_rejected() {
        let mut rules = GameRules::default();
        rules.units.clear();
        assert!(matches!(
            Session::new(rules, SessionConfig::default()),
            Err(GameError::InvalidRules(_))
        ));
    }

    #[test]
    fn test_exchange_and_cleanup() {
        let mut s = open_session();
        let goose = s.spawn_agent(Faction::Player, UnitKind::Goose, TilePos::new(15, 15)).unwrap();
        let wolf = s.spawn_agent(Faction::Enemy, UnitKind::Wolf, TilePos::new(16, 15)).unwrap();

        let events = run(&mut s, 0.0625, 16);
        let hits: Vec<_> = events.iter().flat_map(|e| e.damage.iter()).collect();
        assert_eq!(hits.len(), 2);
        assert_eq!(s.agent(goose).unwrap().health.current, 35);
        assert_eq!(s.agent(wolf).unwrap().health.current, 70);

        // Zero health stays visible until the next cleanup pass.
        s.agent_mut(goose).unwrap().health.current = 0;
        assert!(s.agent(goose).is_some());
        let events = s.advance(Fixed::from_num(0.0625));
        assert!(events.deaths.contains(&goose));
        assert!(s.agent(goose).is_none());
    }

    #[test]
    fn test_dead_agent_leaves_selection() {
        let mut s = open_session();
        s.select_all();
        let victim = s.selection().agents()[0];
        s.agent_mut(victim).unwrap().health.current = 0;
        s.advance(Fixed::from_num(0.05));
        assert!(!s.selection().contains(victim));
        assert_eq!(s.selection().agents().len(), 2);
    }

    #[test]
    fn test_destroying_den_wins() {
        let mut s = open_session();
        let den = s.enemy().structures()[0].id();
        s.structure_mut(den).unwrap().health.current = 0;

        let events = s.advance(Fixed::from_num(0.05));
        assert_eq!(events.outcome, Some(Outcome { winner: Faction::Player }));
        assert!(s.is_over());

        let tick = s.tick();
        assert_eq!(s.advance(Fixed::from_num(0.05)), TickEvents::default());
        assert_eq!(s.tick(), tick);
    }

    #[test]
    fn test_losing_nest_checked_first() {
        let mut s = open_session();
        let nest = s.structures()[0].id();
        let den = s.enemy().structures()[0].id();
        s.structure_mut(nest).unwrap().health.current = 0;
        s.structure_mut(den).unwrap().health.current = 0;

        s.advance(Fixed::from_num(0.05));
        assert_eq!(s.outcome(), Some(Outcome { winner: Faction::Enemy }));
    }

    #[test]
    fn test_select_and_move_in_formation() {
        let mut s = open_session();
        let first = s.agents()[0].position();
        assert!(s.select_at(first, false));
        assert_eq!(s.selection().agents().len(), 1);

        let from = Vec2Fixed::ZERO;
        let to = s.map().pixel_size();
        assert_eq!(s.select_box(to, from, false), 3);

        assert!(s.issue_move(TilePos::new(10, 10)));
        assert!(s
            .agents()
            .iter()
            .all(|a| matches!(a.state(), AgentState::Moving(_))));

        run(&mut s, 0.1, 100);
        let mut tiles: Vec<_> = s.agents().iter().map(|a| a.tile(s.map())).collect();
        tiles.sort_by_key(|t| (t.y, t.x));
        assert_eq!(
            tiles,
            vec![TilePos::new(9, 9), TilePos::new(10, 9), TilePos::new(9, 10)]
        );
    }

    #[test]
    fn test_move_to_water_is_ignored() {
        let mut map = GridMap::new(20, 20, 32);
        map.set_terrain(TilePos::new(10, 10), Terrain::Water);
        let mut s = Session::with_map(GameRules::default(), map, SessionConfig::default()).unwrap();
        s.select_all();
        assert!(!s.issue_move(TilePos::new(10, 10)));
        assert!(s.agents().iter().all(|a| a.state() == AgentState::Idle));
    }

    #[test]
    fn test_queued_commands_run_next_tick() {
        let mut s = open_session();
        s.queue_command(PlayerCommand::SelectAll);
        s.queue_command(PlayerCommand::Move {
            tile: TilePos::new(12, 4),
        });
        assert_eq!(s.pending_commands(), 2);
        assert!(s.selection().is_empty());

        s.advance(Fixed::from_num(0.05));
        assert_eq!(s.pending_commands(), 0);
        assert_eq!(s.selection().agents().len(), 3);
        assert!(s.agents().iter().all(|a| a.state() != AgentState::Idle));
    }

    #[test]
    fn test_gather_order_and_delivery() {
        let mut map = GridMap::new(20, 20, 32);
        map.add_node(1, TilePos::new(8, 7), 60, 12);
        let mut s = Session::with_map(GameRules::default(), map, SessionConfig::default()).unwrap();
        s.select_all();
        assert!(s.issue_gather(1));
        assert!(!s.issue_gather(99));

        run(&mut s, 0.1, 300);
        assert!(s.economy().gathered > 0);
        assert_eq!(s.economy().apples, 50 + s.economy().gathered as u32);
        assert!(s.supply_ledger().is_balanced());
    }

    #[test]
    fn test_entity_at_priority() {
        let mut map = GridMap::new(20, 20, 32);
        map.add_node(1, TilePos::new(5, 5), 60, 12);
        let s = Session::with_map(GameRules::default(), map, SessionConfig::default()).unwrap();
        let point = s.map().tile_center(TilePos::new(5, 5));
        let radius = Fixed::from_num(16);

        // A goose starts on the node's tile and wins over the node.
        assert!(matches!(s.entity_at(point, radius), Some(EntityRef::Agent(_))));
        let nest = s.map().tile_center(TilePos::new(4, 4));
        assert!(matches!(s.entity_at(nest, radius), Some(EntityRef::Structure(_))));
        let empty = s.map().tile_center(TilePos::new(15, 2));
        assert_eq!(s.entity_at(empty, radius), None);
    }

    #[test]
    fn test_place_structure() {
        let mut s = open_session();
        let tile = TilePos::new(6, 7);
        assert!(s.can_place_structure(tile, StructureKind::Granary));
        assert!(!s.can_place_structure(tile, StructureKind::Nest));
        assert!(!s.can_place_structure(TilePos::new(4, 4), StructureKind::Tower));
        assert!(!s.can_place_structure(TilePos::new(30, 30), StructureKind::Tower));

        let id = s.place_structure(tile, StructureKind::Granary).unwrap();
        assert_eq!(s.economy().apples, 10);
        assert_eq!(s.structure(id).map(Structure::kind), Some(StructureKind::Granary));
        assert!(!s.can_place_structure(tile, StructureKind::Tower));
        assert!(!s.can_place_structure(TilePos::new(6, 8), StructureKind::Barracks));
    }

    #[test]
    fn test_training_spawns_near_nest() {
        let mut s = open_session();
        let nest = s.structures()[0].id();
        assert!(s.start_training(nest));
        assert!(!s.start_training(nest));
        assert_eq!(s.economy().apples, 30);

        let events = run(&mut s, 0.0625, 160);
        let spawned: Vec<_> = events.iter().flat_map(|e| e.spawned.iter().copied()).collect();
        let geese: Vec<_> = spawned
            .iter()
            .filter(|id| s.agents().iter().any(|a| a.id() == **id))
            .collect();
        assert_eq!(geese.len(), 1);
        assert_eq!(s.agents().len(), 4);
    }

    #[test]
    fn test_same_seed_same_hash() {
        let mut a = session(99);
        let mut b = session(99);
        assert_eq!(a.state_hash(), b.state_hash());
        run(&mut a, 0.05, 200);
        run(&mut b, 0.05, 200);
        assert_eq!(a.state_hash(), b.state_hash());

        let c = session(100);
        assert_ne!(session(99).state_hash(), c.state_hash());
    }
}
