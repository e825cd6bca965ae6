//! End-to-end session scenarios.

use orchard_core::prelude::*;
use orchard_test_utils::fixtures::{generated_session, open_session, run_ticks, run_until_over, skirmish, step};

// =============================================================================
// Setup
// =============================================================================

mod setup {
    use super::*;

    #[test]
    fn test_generated_session_layout() {
        let session = generated_session(2024);
        let map = session.map();

        assert_eq!((map.width(), map.height()), (64, 44));
        assert!(!map.nodes().is_empty());
        assert!(map.nodes().len() <= 18);

        let nest = &session.structures()[0];
        assert_eq!(nest.kind(), StructureKind::Nest);
        assert_eq!(nest.tile, TilePos::new(4, 4));
        assert_eq!(map.fog(nest.tile), Fog::Visible);

        let den = &session.enemy().structures()[0];
        assert_eq!(den.kind(), StructureKind::Den);
        assert!(map.is_walkable(den.tile));
        assert!(den.tile.x >= 50 && den.tile.y >= 30);
    }

    #[test]
    fn test_ids_are_unique() {
        let session = generated_session(8);
        let mut ids: Vec<EntityId> = session
            .map()
            .nodes()
            .iter()
            .map(|n| n.body.id)
            .chain(session.agents().iter().map(Agent::id))
            .chain(session.structures().iter().map(Structure::id))
            .chain(session.enemy().agents().iter().map(Agent::id))
            .chain(session.enemy().structures().iter().map(Structure::id))
            .collect();
        let count = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), count);
    }
}

// =============================================================================
// Economy
// =============================================================================

mod economy {
    use super::*;

    #[test]
    fn test_granary_pays_income() {
        let mut session = open_session(20, 20);
        session
            .place_structure(TilePos::new(8, 8), StructureKind::Granary)
            .unwrap();
        assert_eq!(session.economy().apples, 10);

        run_ticks(&mut session, 80);
        assert_eq!(session.economy().income, 10);
        assert_eq!(session.economy().apples, 20);
    }

    #[test]
    fn test_opponent_workers_gather_on_their_own() {
        let mut map = GridMap::new(30, 30, 32);
        map.add_node(1, TilePos::new(19, 22), 80, 12);
        let mut session = Session::with_map(GameRules::default(), map, SessionConfig::default()).unwrap();

        run_ticks(&mut session, 320);

        assert!(session.enemy().economy.gathered > 0);
        assert_eq!(session.economy().gathered, 0);
        assert!(session.supply_ledger().is_balanced());
    }

    #[test]
    fn test_queued_training_spends_and_spawns() {
        let mut session = open_session(20, 20);
        let nest = session.structures()[0].id();
        session.queue_command(PlayerCommand::Train { structure: nest });

        session.advance(step());
        assert_eq!(session.economy().apples, 30);
        assert_eq!(session.economy().spent, 20);

        run_ticks(&mut session, 160);
        assert_eq!(session.agents().len(), 4);
        assert_eq!(session.structures()[0].state(), StructureState::Idle);
    }
}

// =============================================================================
// Combat
// =============================================================================

mod combat {
    use super::*;

    #[test]
    fn test_three_geese_kill_a_wolf() {
        let (mut session, geese, wolves) = skirmish(3, 1);
        let wolf = wolves[0];

        let events = run_ticks(&mut session, 160);

        let died = events.iter().any(|e| e.deaths.contains(&wolf));
        assert!(died, "wolf should fall within 10 s");
        assert!(session.agent(wolf).is_none());

        // The third goose is out of reach; the front goose trades its
        // last blow with the wolf.
        assert!(session.agent(geese[0]).is_none());
        assert!(session.agent(geese[1]).is_some());
        assert!(session.agent(geese[2]).is_some());
    }

    #[test]
    fn test_damage_events_match_health_lost() {
        let (mut session, geese, wolves) = skirmish(1, 1);
        let events = run_ticks(&mut session, 48);

        let to_goose: u32 = events
            .iter()
            .flat_map(|e| &e.damage)
            .filter(|d| d.target == geese[0])
            .map(|d| d.damage)
            .sum();
        let to_wolf: u32 = events
            .iter()
            .flat_map(|e| &e.damage)
            .filter(|d| d.target == wolves[0])
            .map(|d| d.damage)
            .sum();

        assert_eq!(to_goose, 45);
        assert_eq!(to_wolf, 30);
        assert_eq!(session.agent(geese[0]).unwrap().health.current, 5);
        assert_eq!(session.agent(wolves[0]).unwrap().health.current, 50);
    }
}

// =============================================================================
// Opponent
// =============================================================================

mod opponent {
    use super::*;

    #[test]
    fn test_idle_wolves_attack_and_win() {
        let mut session = open_session(20, 20);
        let nest = session.structures()[0].id();
        for x in 13..16 {
            session
                .spawn_agent(Faction::Enemy, UnitKind::Wolf, TilePos::new(x, 14))
                .unwrap();
        }

        let events = run_ticks(&mut session, 48);
        let launched = events.iter().flat_map(|e| &e.decisions).any(|d| {
            *d == AiDecision::LaunchAttack {
                target: nest,
                attackers: 3,
            }
        });
        assert!(launched);
        assert!(session.enemy().waves() >= 1);

        run_until_over(&mut session, 4000);
        assert_eq!(session.outcome(), Some(Outcome { winner: Faction::Enemy }));
        assert!(session.structures().iter().all(|s| s.id() != nest));
    }

    #[test]
    fn test_harder_opponent_wants_a_bigger_army() {
        let rules = GameRules::default();
        let easy = orchard_test_utils::fixtures::generated_session_at(1, Difficulty::Easy);
        let hard = orchard_test_utils::fixtures::generated_session_at(1, Difficulty::Hard);
        assert!(easy.enemy().desired_army(&rules) < hard.enemy().desired_army(&rules));
    }
}

// =============================================================================
// Snapshot
// =============================================================================

mod snapshot {
    use super::*;

    #[test]
    fn test_snapshot_reflects_selection_and_fog() {
        let mut session = open_session(20, 20);
        session.select_all();
        session.advance(step());

        let frame = session.snapshot();
        assert_eq!(frame.tick, 1);
        assert_eq!(frame.fog.len(), 400);
        assert_eq!(frame.agents.len(), 6);
        assert_eq!(frame.agents.iter().filter(|a| a.selected).count(), 3);
        assert!(frame
            .agents
            .iter()
            .filter(|a| a.faction == Faction::Enemy)
            .all(|a| !a.selected));
        assert_eq!(frame.structures.len(), 2);
        assert_eq!(frame.player_economy.apples, 50);
        assert!(frame.resources.is_empty());
        assert_eq!(frame.outcome, None);
    }

    #[test]
    fn test_snapshot_shows_training_progress() {
        let mut session = open_session(20, 20);
        let nest = session.structures()[0].id();
        assert!(session.start_training(nest));
        run_ticks(&mut session, 80);

        let frame = session.snapshot();
        let view = frame.structures.iter().find(|s| s.id == nest).unwrap();
        assert_eq!(view.training, Some(UnitKind::Goose));
        assert_eq!(view.progress, Fixed::from_num(0.5));
    }
}
