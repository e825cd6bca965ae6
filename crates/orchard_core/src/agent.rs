//! Mobile agents and their behaviour state machine.
//!
//! Every unit of both factions runs the same machine:
//!
//! ```text
//! Idle ──send_to──▶ Moving(Destination) ──arrive──▶ Idle
//! Idle ──gather_from──▶ Moving(Gather) ──arrive──▶ Gathering
//! Gathering ──full/exhausted──▶ ReturningToDrop ──arrive──▶ Depositing
//! Depositing ──node has supply──▶ Moving(Gather)   (else Idle)
//! Idle/Moving(Attack) ──hostile in range──▶ Fighting
//! ```
//!
//! Orders overwrite whatever the agent was doing. References to nodes are
//! ids into the map and are re-checked at the top of each state handler,
//! so a node depleted by someone else simply sends the agent to a safe
//! state on its next update.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::components::{Body, Contact, EntityId, Health, TilePos};
use crate::data::{SimulationRules, UnitDef};
use crate::economy::Economy;
use crate::factions::Faction;
use crate::grid::GridMap;
use crate::math::{scale_round, Fixed, Vec2Fixed};
use crate::pathfinding::find_path;

/// Unit types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitKind {
    /// Player worker. Gathers and pecks at intruders.
    Goose,
    /// Player fighter trained at the Barracks.
    Gander,
    /// Opponent worker.
    Fox,
    /// Opponent raider.
    Wolf,
}

impl UnitKind {
    /// Every unit kind.
    pub const ALL: [Self; 4] = [Self::Goose, Self::Gander, Self::Fox, Self::Wolf];
}

/// Why an agent is walking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveGoal {
    /// A plain move order.
    Destination,
    /// Walking to the gather target.
    Gather,
    /// Walking to attack; engages anything met on the way.
    Attack,
    /// Walking home after running out of targets.
    Retreat,
}

/// Behavioural state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AgentState {
    /// Waiting for orders.
    #[default]
    Idle,
    /// Following a path.
    Moving(MoveGoal),
    /// Harvesting the gather target.
    Gathering,
    /// Carrying apples to a depot.
    ReturningToDrop,
    /// At a depot, about to hand over the cargo.
    Depositing,
    /// Engaged with a hostile.
    Fighting,
}

/// Things an agent reports from its own update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentEvent {
    /// Cargo handed to the faction economy.
    Deposited {
        /// Worker that delivered.
        agent: EntityId,
        /// Apples delivered.
        amount: u32,
    },
}

/// What an agent needs from the rest of the world while it updates.
pub struct AgentContext<'a> {
    /// The map, for paths and node supply.
    pub map: &'a mut GridMap,
    /// The agent's faction economy.
    pub economy: &'a mut Economy,
    /// Live depot structures of the agent's faction.
    pub depots: &'a [Contact],
    /// Tick constants.
    pub rules: &'a SimulationRules,
}

/// A unit on the map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Agent {
    /// Identity and pixel position.
    pub body: Body,
    /// Owning side.
    pub faction: Faction,
    /// Stats for this unit's kind.
    pub def: UnitDef,
    /// Hit points.
    pub health: Health,
    state: AgentState,
    path: VecDeque<Vec2Fixed>,
    carried: u32,
    gather_target: Option<EntityId>,
    return_node: Option<EntityId>,
    home: Option<TilePos>,
    gather_percent: u32,
    #[serde(with = "crate::math::fixed_serde")]
    gather_timer: Fixed,
    #[serde(with = "crate::math::fixed_serde")]
    attack_timer: Fixed,
    #[serde(with = "crate::math::fixed_serde")]
    repath_timer: Fixed,
    chase_blocked: bool,
    #[serde(with = "crate::math::fixed_serde")]
    idle_timer: Fixed,
}

impl Agent {
    /// Create an idle agent at full health.
    #[must_use]
    pub fn new(id: EntityId, faction: Faction, def: UnitDef, position: Vec2Fixed) -> Self {
        Self {
            body: Body::new(id, position),
            faction,
            health: Health::new(def.max_health),
            def,
            state: AgentState::Idle,
            path: VecDeque::new(),
            carried: 0,
            gather_target: None,
            return_node: None,
            home: None,
            gather_percent: 100,
            gather_timer: Fixed::ZERO,
            attack_timer: Fixed::ZERO,
            repath_timer: Fixed::ZERO,
            chase_blocked: false,
            idle_timer: Fixed::ZERO,
        }
    }

    /// Scale gather pulses by a percentage.
    #[must_use]
    pub fn with_gather_percent(mut self, percent: u32) -> Self {
        self.gather_percent = percent;
        self
    }

    /// Set the tile this agent retreats to.
    #[must_use]
    pub fn with_home(mut self, home: TilePos) -> Self {
        self.home = Some(home);
        self
    }

    /// Entity id.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.body.id
    }

    /// Unit kind.
    #[must_use]
    pub const fn kind(&self) -> UnitKind {
        self.def.kind
    }

    /// Pixel position.
    #[must_use]
    pub const fn position(&self) -> Vec2Fixed {
        self.body.position
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> AgentState {
        self.state
    }

    /// Apples being carried.
    #[must_use]
    pub const fn carried(&self) -> u32 {
        self.carried
    }

    /// Node being harvested or walked to.
    #[must_use]
    pub const fn gather_target(&self) -> Option<EntityId> {
        self.gather_target
    }

    /// Node to resume after the current delivery.
    #[must_use]
    pub const fn return_node(&self) -> Option<EntityId> {
        self.return_node
    }

    /// Remaining waypoints.
    pub fn path(&self) -> impl Iterator<Item = &Vec2Fixed> {
        self.path.iter()
    }

    /// Health above zero.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        !self.health.is_dead()
    }

    /// Tile under the agent.
    #[must_use]
    pub fn tile(&self, map: &GridMap) -> TilePos {
        map.tile_of(self.body.position)
    }

    /// Place cargo directly, for scenario setup. Clamped to capacity.
    pub fn set_carried(&mut self, amount: u32) {
        self.carried = amount.min(self.def.capacity());
    }

    /// Snapshot of this agent's identity and location.
    #[must_use]
    pub fn contact(&self, map: &GridMap) -> Contact {
        Contact {
            id: self.body.id,
            tile: self.tile(map),
            position: self.body.position,
            is_structure: false,
        }
    }

    fn set_path(&mut self, path: Vec<Vec2Fixed>) {
        self.path = path.into();
    }

    fn become_idle(&mut self) {
        self.state = AgentState::Idle;
        self.path.clear();
        self.idle_timer = Fixed::ZERO;
    }

    // ------------------------------------------------------------------
    // Orders
    // ------------------------------------------------------------------

    /// Walk to a tile, dropping any gather work.
    ///
    /// Returns `false` (and leaves the agent idle) when no path exists.
    pub fn send_to(&mut self, map: &GridMap, tile: TilePos, max_iterations: u32) -> bool {
        self.gather_target = None;
        self.return_node = None;
        self.walk(map, tile, MoveGoal::Destination, max_iterations)
    }

    /// Walk to a tile on an attack order.
    pub fn attack_move(&mut self, map: &GridMap, tile: TilePos, max_iterations: u32) -> bool {
        self.gather_target = None;
        self.return_node = None;
        self.walk(map, tile, MoveGoal::Attack, max_iterations)
    }

    /// Walk back to the home tile, or go idle if there is none.
    pub fn retreat(&mut self, map: &GridMap, max_iterations: u32) -> bool {
        match self.home {
            Some(home) => self.walk(map, home, MoveGoal::Retreat, max_iterations),
            None => {
                self.become_idle();
                false
            }
        }
    }

    fn walk(&mut self, map: &GridMap, tile: TilePos, goal: MoveGoal, max_iterations: u32) -> bool {
        let path = find_path(map, self.tile(map), tile, max_iterations);
        if path.is_empty() {
            self.become_idle();
            return false;
        }
        self.set_path(path);
        self.state = AgentState::Moving(goal);
        true
    }

    /// Harvest a resource node.
    ///
    /// No-op returning `false` if this unit cannot gather or the node is
    /// gone or empty. An unreachable node leaves the agent idle.
    pub fn gather_from(&mut self, map: &GridMap, node: EntityId, max_iterations: u32) -> bool {
        if !self.def.can_gather() {
            return false;
        }
        let Some(target) = map.node(node).filter(|n| !n.is_exhausted()) else {
            return false;
        };
        let node_tile = target.tile;
        let here = self.tile(map);

        self.gather_target = Some(node);
        self.return_node = None;
        self.gather_timer = Fixed::ZERO;

        let path = find_path(map, here, node_tile, max_iterations);
        if !path.is_empty() {
            self.set_path(path);
            self.state = AgentState::Moving(MoveGoal::Gather);
            true
        } else if here.touches(node_tile) {
            self.path.clear();
            self.state = AgentState::Gathering;
            true
        } else {
            self.gather_target = None;
            self.become_idle();
            false
        }
    }

    // ------------------------------------------------------------------
    // Per-tick behaviour
    // ------------------------------------------------------------------

    /// Advance this agent by `dt` seconds.
    pub fn update(&mut self, dt: Fixed, ctx: &mut AgentContext<'_>) -> Option<AgentEvent> {
        match self.state {
            AgentState::Idle => {
                if self.def.auto_gather && self.def.can_gather() {
                    self.idle_timer += dt;
                    if self.idle_timer >= ctx.rules.idle_seek_interval() {
                        self.idle_timer = Fixed::ZERO;
                        self.seek_work(ctx);
                    }
                }
                None
            }
            AgentState::Moving(goal) => {
                if goal == MoveGoal::Gather && !self.gather_target_has_supply(ctx.map) {
                    return self.on_gather_target_lost(ctx);
                }
                self.follow_path(dt, ctx.rules.arrival_epsilon());
                if self.path.is_empty() {
                    self.arrive(goal);
                }
                None
            }
            AgentState::Gathering => self.gather(dt, ctx),
            AgentState::ReturningToDrop => {
                self.follow_path(dt, ctx.rules.arrival_epsilon());
                if self.path.is_empty() {
                    self.state = AgentState::Depositing;
                }
                None
            }
            AgentState::Depositing => Some(self.deposit(ctx)),
            AgentState::Fighting => {
                self.follow_path(dt, ctx.rules.arrival_epsilon());
                None
            }
        }
    }

    fn arrive(&mut self, goal: MoveGoal) {
        match goal {
            MoveGoal::Destination | MoveGoal::Retreat => self.become_idle(),
            MoveGoal::Gather => {
                self.gather_timer = Fixed::ZERO;
                self.state = AgentState::Gathering;
            }
            MoveGoal::Attack => self.engage(),
        }
        tracing::trace!(agent = self.body.id, ?goal, "path exhausted");
    }

    /// Spend `speed * dt` of movement along the path. Each segment moves
    /// at most the distance to its waypoint, and whatever is left after
    /// reaching one carries on toward the next. The final waypoint is
    /// never overshot.
    fn follow_path(&mut self, dt: Fixed, epsilon: Fixed) {
        let mut budget = self.def.speed() * dt;
        while let Some(&waypoint) = self.path.front() {
            let dist_sq = self.body.position.distance_squared(waypoint);
            if dist_sq < epsilon * epsilon {
                self.body.position = waypoint;
                self.path.pop_front();
                continue;
            }
            if budget <= Fixed::ZERO {
                break;
            }
            let dist = self.body.position.distance(waypoint);
            let step = budget.min(dist);
            self.body.position = self.body.position.step_toward(waypoint, step);
            budget -= step;
            if self.body.position == waypoint {
                self.path.pop_front();
            }
        }
    }

    fn gather_target_has_supply(&self, map: &GridMap) -> bool {
        self.gather_target.is_some_and(|id| map.supply(id) > 0)
    }

    fn gather(&mut self, dt: Fixed, ctx: &mut AgentContext<'_>) -> Option<AgentEvent> {
        let Some(gather) = self.def.gather else {
            self.become_idle();
            return None;
        };
        let Some(node_id) = self.gather_target.filter(|id| ctx.map.supply(*id) > 0) else {
            return self.on_gather_target_lost(ctx);
        };

        self.gather_timer += dt;
        if self.gather_timer < gather.interval() {
            return None;
        }
        self.gather_timer = Fixed::ZERO;

        let pulse = scale_round(gather.amount, self.gather_percent).max(1);
        let room = gather.capacity.saturating_sub(self.carried);
        let (taken, exhausted) = match ctx.map.node_mut(node_id) {
            Some(node) => (node.extract(pulse.min(room)), node.is_exhausted()),
            None => (0, true),
        };
        self.carried += taken;

        if self.carried >= gather.capacity || exhausted {
            return self.begin_return(ctx);
        }
        None
    }

    /// The gather target vanished or ran dry.
    fn on_gather_target_lost(&mut self, ctx: &mut AgentContext<'_>) -> Option<AgentEvent> {
        self.gather_target = None;
        if self.carried > 0 {
            return self.begin_return(ctx);
        }
        self.become_idle();
        if self.def.auto_gather {
            self.seek_work(ctx);
        }
        None
    }

    fn begin_return(&mut self, ctx: &mut AgentContext<'_>) -> Option<AgentEvent> {
        self.return_node = self.gather_target.take().filter(|id| ctx.map.supply(*id) > 0);
        self.path.clear();

        let here = self.body.position;
        let nearest = ctx
            .depots
            .iter()
            .min_by_key(|d| (d.position.distance_squared(here), d.id));

        let Some(depot) = nearest else {
            return Some(self.deposit(ctx));
        };

        let from = self.tile(ctx.map);
        let path = find_path(ctx.map, from, depot.tile, ctx.rules.max_path_iterations);
        if !path.is_empty() {
            self.set_path(path);
            self.state = AgentState::ReturningToDrop;
            None
        } else if from.touches(depot.tile) {
            Some(self.deposit(ctx))
        } else {
            tracing::debug!(agent = self.body.id, depot = depot.id, "no route to depot");
            self.become_idle();
            None
        }
    }

    fn deposit(&mut self, ctx: &mut AgentContext<'_>) -> AgentEvent {
        let amount = self.carried;
        ctx.economy.deposit(amount);
        self.carried = 0;

        let resume = self.return_node.take().filter(|id| ctx.map.supply(*id) > 0);
        let resumed =
            resume.is_some_and(|id| self.gather_from(ctx.map, id, ctx.rules.max_path_iterations));
        if !resumed {
            self.become_idle();
        }

        AgentEvent::Deposited {
            agent: self.body.id,
            amount,
        }
    }

    /// Autonomous workers look for the nearest node with supply.
    fn seek_work(&mut self, ctx: &mut AgentContext<'_>) {
        if let Some(node) = ctx.map.nearest_node_with_supply(self.body.position) {
            self.gather_from(ctx.map, node, ctx.rules.max_path_iterations);
        }
    }

    // ------------------------------------------------------------------
    // Combat hooks, driven by the combat pass
    // ------------------------------------------------------------------

    /// Whether this agent may pick a fight right now.
    #[must_use]
    pub fn can_engage(&self) -> bool {
        self.def.can_attack()
            && self.is_alive()
            && matches!(
                self.state,
                AgentState::Idle | AgentState::Fighting | AgentState::Moving(MoveGoal::Attack)
            )
    }

    /// Enter `Fighting`, stopping in place. No-op if already fighting.
    pub fn engage(&mut self) {
        if self.state != AgentState::Fighting {
            self.state = AgentState::Fighting;
            self.path.clear();
            self.attack_timer = Fixed::ZERO;
            self.repath_timer = Fixed::ZERO;
            self.chase_blocked = false;
        }
    }

    /// Wind up an attack. Returns the damage when the cooldown elapses.
    pub fn tick_attack(&mut self, dt: Fixed, cooldown: Fixed) -> Option<u32> {
        let attack = self.def.attack?;
        self.attack_timer += dt;
        if self.attack_timer >= cooldown {
            self.attack_timer = Fixed::ZERO;
            Some(attack.damage)
        } else {
            None
        }
    }

    /// Leave `Fighting` for `Idle`.
    pub fn disengage(&mut self) {
        self.become_idle();
    }

    /// Follow a target that is out of range, repathing periodically.
    ///
    /// An exhausted path is replaced at once. After a search that found
    /// no route the agent waits out the full repath interval.
    pub fn chase(&mut self, map: &GridMap, target: TilePos, dt: Fixed, rules: &SimulationRules) {
        self.repath_timer += dt;
        let exhausted = self.path.is_empty() && !self.chase_blocked;
        if self.repath_timer >= rules.repath_interval() || exhausted {
            self.repath_timer = Fixed::ZERO;
            let path = find_path(map, self.tile(map), target, rules.max_path_iterations);
            self.chase_blocked = path.is_empty();
            if self.chase_blocked {
                tracing::trace!(agent = self.body.id, ?target, "chase target unreachable");
            }
            self.set_path(path);
        }
    }
}
