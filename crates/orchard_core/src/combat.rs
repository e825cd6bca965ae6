//! Melee resolution between the two factions.
//!
//! Each pass works in two steps:
//! 1. Every eligible attacker picks the nearest live hostile from a
//!    snapshot taken before the pass and, if in range, winds its attack.
//! 2. All damage produced in step 1 is applied.
//!
//! Exchanges are therefore simultaneous: an agent killed this pass still
//! lands a blow that was ready this pass. Dead entities stay in their
//! collections until the session's cleanup pass.

use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentState};
use crate::components::{Contact, EntityId};
use crate::data::GameRules;
use crate::grid::GridMap;
use crate::math::{Fixed, Vec2Fixed};
use crate::structure::Structure;

/// One faction's combatants.
pub struct Side<'a> {
    /// The faction's agents.
    pub agents: &'a mut [Agent],
    /// The faction's structures.
    pub structures: &'a mut [Structure],
}

impl Side<'_> {
    /// Live agents then live structures, as targets for the other side.
    fn targets(&self, map: &GridMap) -> Vec<Contact> {
        let agents = self.agents.iter().filter(|a| a.is_alive()).map(|a| a.contact(map));
        let structures = self.structures.iter().filter(|s| s.is_alive()).map(Structure::contact);
        agents.chain(structures).collect()
    }

    fn damage(&mut self, target: EntityId, amount: u32) -> Option<(u32, bool)> {
        if let Some(agent) = self.agents.iter_mut().find(|a| a.id() == target) {
            let dealt = agent.health.apply_damage(amount);
            return Some((dealt, agent.health.is_dead()));
        }
        if let Some(structure) = self.structures.iter_mut().find(|s| s.id() == target) {
            let dealt = structure.health.apply_damage(amount);
            return Some((dealt, structure.health.is_dead()));
        }
        None
    }
}

/// A single hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageEvent {
    /// The entity dealing damage.
    pub attacker: EntityId,
    /// The entity receiving damage.
    pub target: EntityId,
    /// Damage actually removed from the target's health.
    pub damage: u32,
    /// The hit brought the target to zero.
    pub killed: bool,
}

/// Nearest contact by squared distance. Agents win ties over structures,
/// then the lower id wins.
#[must_use]
pub fn nearest_hostile(from: Vec2Fixed, hostiles: &[Contact]) -> Option<(Fixed, Contact)> {
    hostiles
        .iter()
        .map(|c| (c.position.distance_squared(from), *c))
        .min_by_key(|(dist_sq, c)| (*dist_sq, c.is_structure, c.id))
}

/// Run one combat pass for both sides and apply the resulting damage.
pub fn resolve_combat(
    dt: Fixed,
    rules: &GameRules,
    map: &GridMap,
    mut player: Side<'_>,
    mut enemy: Side<'_>,
) -> Vec<DamageEvent> {
    let player_targets = player.targets(map);
    let enemy_targets = enemy.targets(map);

    let mut hits: Vec<(EntityId, EntityId, u32)> = Vec::new();
    for agent in player.agents.iter_mut() {
        hits.extend(fight(agent, &enemy_targets, dt, rules, map));
    }
    for agent in enemy.agents.iter_mut() {
        hits.extend(fight(agent, &player_targets, dt, rules, map));
    }

    let mut events = Vec::with_capacity(hits.len());
    for (attacker, target, amount) in hits {
        let applied = enemy
            .damage(target, amount)
            .or_else(|| player.damage(target, amount));
        if let Some((damage, killed)) = applied {
            if killed && damage > 0 {
                tracing::debug!(attacker, target, "killed");
            }
            events.push(DamageEvent {
                attacker,
                target,
                damage,
                killed: killed && damage > 0,
            });
        }
    }
    events
}

/// Drive one agent's combat behaviour. Returns a hit as
/// `(attacker, target, damage)` when its cooldown elapses in range.
fn fight(
    agent: &mut Agent,
    hostiles: &[Contact],
    dt: Fixed,
    rules: &GameRules,
    map: &GridMap,
) -> Option<(EntityId, EntityId, u32)> {
    if !agent.can_engage() {
        return None;
    }
    let fighting = agent.state() == AgentState::Fighting;
    let sim = &rules.simulation;

    match nearest_hostile(agent.position(), hostiles) {
        Some((dist_sq, target)) if dist_sq <= rules.combat_range_sq() => {
            agent.engage();
            agent
                .tick_attack(dt, sim.attack_cooldown())
                .map(|damage| (agent.id(), target.id, damage))
        }
        Some((_, target)) if fighting => {
            if agent.def.pursues {
                agent.chase(map, target.tile, dt, sim);
            } else {
                agent.disengage();
            }
            None
        }
        None if fighting => {
            if agent.def.pursues {
                tracing::debug!(agent = agent.id(), "no hostiles left, retreating");
                agent.retreat(map, sim.max_path_iterations);
            } else {
                agent.disengage();
            }
            None
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentContext, MoveGoal, UnitKind};
    use crate::components::TilePos;
    use crate::economy::Economy;
    use crate::factions::Faction;
    use crate::structure::StructureKind;

    fn unit(rules: &GameRules, map: &GridMap, id: EntityId, kind: UnitKind, tile: TilePos) -> Agent {
        let def = *rules.unit(kind).unwrap();
        Agent::new(id, def.faction, def, map.tile_center(tile))
    }

    fn pass(rules: &GameRules, map: &GridMap, geese: &mut [Agent], wolves: &mut [Agent], dt: f64) -> Vec<DamageEvent> {
        resolve_combat(
            Fixed::from_num(dt),
            rules,
            map,
            Side {
                agents: geese,
                structures: &mut [],
            },
            Side {
                agents: wolves,
                structures: &mut [],
            },
        )
    }

    #[test]
    fn test_exchange_is_simultaneous_each_cooldown() {
        let rules = GameRules::default();
        let map = GridMap::new(10, 10, 32);
        let mut geese = vec![unit(&rules, &map, 1, UnitKind::Goose, TilePos::new(3, 3))];
        let mut wolves = vec![unit(&rules, &map, 2, UnitKind::Wolf, TilePos::new(4, 3))];

        for _ in 0..3 {
            assert!(pass(&rules, &map, &mut geese, &mut wolves, 0.25).is_empty());
        }
        assert_eq!(geese[0].state(), AgentState::Fighting);
        assert_eq!(wolves[0].state(), AgentState::Fighting);

        let events = pass(&rules, &map, &mut geese, &mut wolves, 0.25);
        assert_eq!(events.len(), 2);
        assert_eq!(geese[0].health.current, 35);
        assert_eq!(wolves[0].health.current, 70);
    }

    #[test]
    fn test_out_of_range_does_nothing() {
        let rules = GameRules::default();
        let map = GridMap::new(10, 10, 32);
        let mut geese = vec![unit(&rules, &map, 1, UnitKind::Goose, TilePos::new(1, 1))];
        let mut wolves = vec![unit(&rules, &map, 2, UnitKind::Wolf, TilePos::new(8, 8))];

        assert!(pass(&rules, &map, &mut geese, &mut wolves, 0.1).is_empty());
        assert_eq!(geese[0].state(), AgentState::Idle);
        assert_eq!(wolves[0].state(), AgentState::Idle);
    }

    #[test]
    fn test_kill_reaches_zero_and_stays_listed() {
        let rules = GameRules::default();
        let map = GridMap::new(10, 10, 32);
        let mut geese = vec![unit(&rules, &map, 1, UnitKind::Goose, TilePos::new(3, 3))];
        let mut wolves = vec![unit(&rules, &map, 2, UnitKind::Wolf, TilePos::new(3, 4))];
        geese[0].health.current = 15;

        pass(&rules, &map, &mut geese, &mut wolves, 0.5);
        let events = pass(&rules, &map, &mut geese, &mut wolves, 0.5);

        assert!(events.iter().any(|e| e.target == 1 && e.killed));
        assert_eq!(geese[0].health.current, 0);
        assert_eq!(geese.len(), 1);
    }

    #[test]
    fn test_nearest_prefers_agents_on_ties() {
        let map = GridMap::new(10, 10, 32);
        let here = map.tile_center(TilePos::new(5, 5));
        let spot = map.tile_center(TilePos::new(6, 5));
        let hostiles = [
            Contact {
                id: 1,
                tile: TilePos::new(6, 5),
                position: spot,
                is_structure: true,
            },
            Contact {
                id: 9,
                tile: TilePos::new(6, 5),
                position: spot,
                is_structure: false,
            },
        ];
        assert_eq!(nearest_hostile(here, &hostiles).map(|(_, c)| c.id), Some(9));
    }

    #[test]
    fn test_non_pursuer_disengages_when_target_leaves() {
        let rules = GameRules::default();
        let map = GridMap::new(12, 12, 32);
        let mut geese = vec![unit(&rules, &map, 1, UnitKind::Goose, TilePos::new(3, 3))];
        let mut wolves = vec![unit(&rules, &map, 2, UnitKind::Wolf, TilePos::new(4, 3))];

        pass(&rules, &map, &mut geese, &mut wolves, 0.1);
        assert_eq!(geese[0].state(), AgentState::Fighting);

        wolves[0].body.position = map.tile_center(TilePos::new(10, 10));
        pass(&rules, &map, &mut geese, &mut wolves, 0.1);
        assert_eq!(geese[0].state(), AgentState::Idle);
        // The wolf pursues instead.
        assert_eq!(wolves[0].state(), AgentState::Fighting);
        assert!(wolves[0].path().next().is_some());
    }

    #[test]
    fn test_pursuer_retreats_when_no_hostiles_remain() {
        let rules = GameRules::default();
        let map = GridMap::new(12, 12, 32);
        let mut geese = vec![unit(&rules, &map, 1, UnitKind::Goose, TilePos::new(3, 3))];
        let mut wolves =
            vec![unit(&rules, &map, 2, UnitKind::Wolf, TilePos::new(4, 3)).with_home(TilePos::new(10, 10))];

        pass(&rules, &map, &mut geese, &mut wolves, 0.1);
        assert_eq!(wolves[0].state(), AgentState::Fighting);

        geese[0].health.current = 0;
        pass(&rules, &map, &mut geese, &mut wolves, 0.1);
        assert_eq!(wolves[0].state(), AgentState::Moving(MoveGoal::Retreat));
    }

    #[test]
    fn test_attack_move_engages_structure() {
        let rules = GameRules::default();
        let mut map = GridMap::new(12, 12, 32);
        let def = rules.structure(StructureKind::Nest).unwrap().clone();
        let tile = TilePos::new(2, 2);
        let mut nests = vec![Structure::new(5, Faction::Player, def, tile, map.tile_center(tile))];
        let mut wolves = vec![unit(&rules, &map, 2, UnitKind::Wolf, TilePos::new(9, 9))];
        assert!(wolves[0].attack_move(&map, tile, 2000));

        let sim = rules.simulation.clone();
        let mut economy = Economy::default();
        let mut dealt = 0;
        for _ in 0..200 {
            let mut ctx = AgentContext {
                map: &mut map,
                economy: &mut economy,
                depots: &[],
                rules: &sim,
            };
            wolves[0].update(Fixed::from_num(0.1), &mut ctx);
            let events = resolve_combat(
                Fixed::from_num(0.1),
                &rules,
                &map,
                Side {
                    agents: &mut [],
                    structures: &mut nests,
                },
                Side {
                    agents: &mut wolves,
                    structures: &mut [],
                },
            );
            dealt += events.iter().map(|e| e.damage).sum::<u32>();
        }

        assert!(dealt > 0);
        assert_eq!(nests[0].health.current, 200 - dealt);
    }
}
