//! Single-session runner with a scripted player.
//!
//! The player side has no human behind it here, so a small fixed policy
//! stands in: idle geese gather the nearest node, the Nest keeps training
//! geese, one Granary and then one Barracks go up next to the Nest, and
//! ganders hold a rally point by the Nest.

use serde::{Deserialize, Serialize};

use orchard_core::agent::AgentState;
use orchard_core::components::{EntityId, TilePos};
use orchard_core::data::{Difficulty, GameRules};
use orchard_core::economy::Economy;
use orchard_core::error::Result;
use orchard_core::factions::Faction;
use orchard_core::math::Fixed;
use orchard_core::session::{Session, SessionConfig};
use orchard_core::structure::{Structure, StructureKind};

/// Simulation ticks per game second.
pub const TICKS_PER_SECOND: u64 = 16;

/// Ticks in one game minute.
pub const TICKS_PER_MINUTE: u64 = 60 * TICKS_PER_SECOND;

/// Fixed frame time: 1/16 s, exact in fixed point.
#[must_use]
pub fn tick_dt() -> Fixed {
    Fixed::from_bits(1 << 28)
}

/// Settings for one headless run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Session seed.
    pub seed: u64,
    /// Opponent difficulty.
    pub difficulty: Difficulty,
    /// Give up and call a draw after this many ticks (0 = unlimited).
    pub max_ticks: u64,
    /// Ticks between scripted player decisions.
    pub policy_interval: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            difficulty: Difficulty::Normal,
            max_ticks: 10 * TICKS_PER_MINUTE,
            policy_interval: TICKS_PER_SECOND / 2,
        }
    }
}

impl RunConfig {
    /// Config for a seed with default settings.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Set the difficulty.
    #[must_use]
    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Cap the run at `minutes` of game time.
    #[must_use]
    pub fn with_minutes(mut self, minutes: u32) -> Self {
        self.max_ticks = u64::from(minutes) * TICKS_PER_MINUTE;
        self
    }
}

/// End-of-run figures for one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SideReport {
    /// Final economy, including lifetime totals.
    pub economy: Economy,
    /// Living agents at the end.
    pub agents: usize,
    /// Standing structures at the end.
    pub structures: usize,
    /// Agents lost over the run.
    pub losses: u32,
}

/// Result of one headless run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameReport {
    /// Session seed.
    pub seed: u64,
    /// Opponent difficulty.
    pub difficulty: Difficulty,
    /// Ticks simulated.
    pub ticks: u64,
    /// Game seconds simulated.
    pub elapsed_secs: f64,
    /// Winner, or None when the tick cap was reached first.
    pub winner: Option<Faction>,
    /// Session state hash after the last tick.
    pub final_hash: u64,
    /// Player side.
    pub player: SideReport,
    /// Opponent side.
    pub enemy: SideReport,
    /// Attack waves the opponent launched.
    pub waves: u32,
}

impl GameReport {
    /// Human-readable winner.
    #[must_use]
    pub fn winner_label(&self) -> String {
        self.winner
            .map_or_else(|| "draw (tick cap)".to_string(), |f| f.to_string())
    }
}

/// Scripted stand-in for the human player.
#[derive(Debug, Clone)]
pub struct ScriptedPlayer {
    build_order: Vec<StructureKind>,
    max_workers: usize,
}

impl Default for ScriptedPlayer {
    fn default() -> Self {
        Self {
            build_order: vec![StructureKind::Granary, StructureKind::Barracks],
            max_workers: 8,
        }
    }
}

impl ScriptedPlayer {
    /// Take one round of decisions.
    pub fn act(&self, session: &mut Session) {
        let Some(nest_tile) = home_structure(session).map(|s| s.tile) else {
            self.gather_idle(session);
            return;
        };

        if let Some(kind) = self.next_build(session) {
            if let Some(tile) = build_site(session, nest_tile, kind) {
                session.place_structure(tile, kind);
            }
        }
        let reserve = self
            .next_build(session)
            .and_then(|kind| session.rules().structure(kind))
            .map_or(0, |def| def.cost);

        self.train(session, reserve);
        self.gather_idle(session);
        rally_fighters(session, nest_tile);
    }

    /// First structure in the build order that is not standing yet.
    fn next_build(&self, session: &Session) -> Option<StructureKind> {
        self.build_order
            .iter()
            .copied()
            .find(|kind| !session.structures().iter().any(|s| s.kind() == *kind))
    }

    fn train(&self, session: &mut Session, reserve: u32) {
        let workers = session
            .agents()
            .iter()
            .filter(|a| a.is_alive() && a.def.can_gather())
            .count();

        let idle: Vec<(EntityId, bool, u32)> = session
            .structures()
            .iter()
            .filter(|s| s.is_alive() && s.is_idle())
            .filter_map(|s| {
                let unit = *s.def.trains.first()?;
                let def = session.rules().unit(unit)?;
                Some((s.id(), def.can_gather(), def.cost))
            })
            .collect();

        for (id, trains_workers, cost) in idle {
            if trains_workers && workers >= self.max_workers {
                continue;
            }
            let needed = if trains_workers { cost + reserve } else { cost };
            if session.economy().can_afford(needed) && session.start_training(id) {
                tracing::debug!(structure = id, "policy started training");
            }
        }
    }

    fn gather_idle(&self, session: &mut Session) {
        let orders: Vec<(EntityId, EntityId)> = session
            .agents()
            .iter()
            .filter(|a| a.is_alive() && a.def.can_gather() && a.state() == AgentState::Idle)
            .filter_map(|a| {
                let node = session.map().nearest_node_with_supply(a.position())?;
                Some((a.id(), node))
            })
            .collect();

        for (agent, node) in orders {
            if session.select_agent(agent, false) {
                session.issue_gather(node);
            }
        }
    }
}

fn home_structure(session: &Session) -> Option<&Structure> {
    session
        .structures()
        .iter()
        .find(|s| s.def.home && s.is_alive())
}

/// First placeable tile on the rings around `center`, scanning row by row.
fn build_site(session: &Session, center: TilePos, kind: StructureKind) -> Option<TilePos> {
    ring_tiles(center, 2..=6).find(|tile| {
        session.can_place_structure(*tile, kind)
            && !session.map().nodes().iter().any(|n| n.tile == *tile)
    })
}

fn ring_tiles(center: TilePos, radii: std::ops::RangeInclusive<i32>) -> impl Iterator<Item = TilePos> {
    radii.flat_map(move |r| {
        (-r..=r).flat_map(move |dy| {
            (-r..=r)
                .filter(move |dx| dx.abs() == r || dy.abs() == r)
                .map(move |dx| TilePos::new(center.x + dx, center.y + dy))
        })
    })
}

/// Walk idle fighters back to a walkable tile beside the home structure.
fn rally_fighters(session: &mut Session, nest_tile: TilePos) {
    let Some(rally) = ring_tiles(nest_tile, 2..=4).find(|t| session.map().is_walkable(*t)) else {
        return;
    };
    let map = session.map();
    let stragglers: Vec<EntityId> = session
        .agents()
        .iter()
        .filter(|a| {
            a.is_alive()
                && !a.def.can_gather()
                && a.state() == AgentState::Idle
                && a.tile(map).chebyshev(rally) > 2
        })
        .map(|a| a.id())
        .collect();

    if stragglers.is_empty() {
        return;
    }
    for (i, id) in stragglers.iter().enumerate() {
        session.select_agent(*id, i > 0);
    }
    session.issue_move(rally);
}

fn side_report(economy: Economy, agents: usize, structures: usize, losses: u32) -> SideReport {
    SideReport {
        economy,
        agents,
        structures,
        losses,
    }
}

/// Build a session from `rules` and play it out with the scripted player.
///
/// # Errors
///
/// Fails if the rules are invalid.
pub fn run_session(rules: &GameRules, config: &RunConfig) -> Result<GameReport> {
    let session_config = SessionConfig {
        seed: config.seed,
        difficulty: config.difficulty,
    };
    let mut session = Session::new(rules.clone(), session_config)?;
    Ok(play(&mut session, config))
}

/// Play an existing session until it ends or hits the tick cap.
pub fn play(session: &mut Session, config: &RunConfig) -> GameReport {
    let policy = ScriptedPlayer::default();
    let dt = tick_dt();
    let interval = config.policy_interval.max(1);
    let mut player_losses = 0u32;
    let mut enemy_losses = 0u32;

    while !session.is_over() && (config.max_ticks == 0 || session.tick() < config.max_ticks) {
        if session.tick() % interval == 0 {
            policy.act(session);
        }

        let player_before: Vec<EntityId> = session.agents().iter().map(|a| a.id()).collect();
        let enemy_before: Vec<EntityId> = session.enemy().agents().iter().map(|a| a.id()).collect();
        let events = session.advance(dt);
        for id in &events.deaths {
            if player_before.contains(id) {
                player_losses += 1;
            } else if enemy_before.contains(id) {
                enemy_losses += 1;
            }
        }
    }

    let report = GameReport {
        seed: session.seed(),
        difficulty: config.difficulty,
        ticks: session.tick(),
        elapsed_secs: session.elapsed().to_num::<f64>(),
        winner: session.outcome().map(|o| o.winner),
        final_hash: session.state_hash(),
        player: side_report(
            *session.economy(),
            session.agents().len(),
            session.structures().len(),
            player_losses,
        ),
        enemy: side_report(
            session.enemy().economy,
            session.enemy().agents().len(),
            session.enemy().structures().len(),
            enemy_losses,
        ),
        waves: session.enemy().waves(),
    };

    tracing::info!(
        seed = report.seed,
        ticks = report.ticks,
        winner = %report.winner_label(),
        hash = %format!("{:016x}", report.final_hash),
        "session finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchard_core::agent::UnitKind;
    use orchard_core::grid::GridMap;

    #[test]
    fn test_tick_dt_is_a_sixteenth() {
        assert_eq!(tick_dt() * Fixed::from_num(16), Fixed::ONE);
    }

    #[test]
    fn test_run_config_minutes() {
        let config = RunConfig::new(3).with_minutes(2);
        assert_eq!(config.max_ticks, 2 * 60 * 16);
        assert_eq!(config.seed, 3);
    }

    #[test]
    fn test_ring_tiles_cover_the_ring_only() {
        let tiles: Vec<TilePos> = ring_tiles(TilePos::new(10, 10), 2..=2).collect();
        assert_eq!(tiles.len(), 16);
        assert!(tiles.iter().all(|t| t.chebyshev(TilePos::new(10, 10)) == 2));
    }

    fn orchard_session() -> Session {
        let mut map = GridMap::new(20, 20, 32);
        map.add_node(100, TilePos::new(9, 9), 80, 12);
        Session::with_map(GameRules::default(), map, SessionConfig::default()).unwrap()
    }

    #[test]
    fn test_policy_sends_idle_geese_to_gather() {
        let mut session = orchard_session();
        ScriptedPlayer::default().act(&mut session);

        let gathering = session
            .agents()
            .iter()
            .filter(|a| a.gather_target() == Some(100))
            .count();
        assert_eq!(gathering, 3);
    }

    #[test]
    fn test_policy_builds_granary_first() {
        let mut session = orchard_session();
        ScriptedPlayer::default().act(&mut session);

        let granary = session
            .structures()
            .iter()
            .find(|s| s.kind() == StructureKind::Granary)
            .unwrap();
        assert_eq!(granary.tile, TilePos::new(2, 2));
        // 10 apples left, and the Barracks is still pending.
        assert_eq!(session.economy().apples, 10);
        assert!(session.structures()[0].is_idle());
    }

    #[test]
    fn test_policy_rallies_ganders() {
        let mut session = orchard_session();
        let gander = session
            .spawn_agent(Faction::Player, UnitKind::Gander, TilePos::new(15, 2))
            .unwrap();
        ScriptedPlayer::default().act(&mut session);

        let agent = session.agent(gander).unwrap();
        assert!(matches!(agent.state(), AgentState::Moving(_)));
    }

    #[test]
    fn test_run_is_reproducible() {
        let rules = GameRules::default();
        let config = RunConfig {
            max_ticks: 600,
            ..RunConfig::new(99)
        };
        let a = run_session(&rules, &config).unwrap();
        let b = run_session(&rules, &config).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.ticks, 600);
        assert!(a.player.economy.income > 0);
    }
}
