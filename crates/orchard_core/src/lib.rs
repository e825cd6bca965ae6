//! # Orchard Core
//!
//! Deterministic simulation core for the orchard RTS: geese defend their
//! nest and gather apples while a computer-controlled fox den grows an
//! army and attacks.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO beyond parsing rules from a string
//! - No system randomness (every draw comes from a seeded RNG)
//! - No floating-point math (uses fixed-point)
//!
//! ## Crate Structure
//!
//! - [`grid`] - Tile map, terrain and the player's fog
//! - [`map_generation`] - Seeded lakes, dirt paths and apple trees
//! - [`pathfinding`] - Bounded 8-way A*
//! - [`economy`] - Resource nodes and apple accounts
//! - [`agent`] - Unit state machine (moving, gathering, fighting)
//! - [`structure`] - Structure state machine (training, income)
//! - [`combat`] - Simultaneous melee resolution
//! - [`ai`] - The opposing faction's controller
//! - [`session`] - The match orchestrator and player command surface
//! - [`snapshot`] - Read-only frames for renderers and reports
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod agent;
pub mod ai;
pub mod combat;
pub mod commands;
pub mod components;
pub mod data;
pub mod economy;
pub mod error;
pub mod factions;
pub mod grid;
pub mod map_generation;
pub mod math;
pub mod pathfinding;
pub mod session;
pub mod snapshot;
pub mod structure;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::agent::{Agent, AgentEvent, AgentState, MoveGoal, UnitKind};
    pub use crate::ai::{AiController, AiDecision};
    pub use crate::combat::DamageEvent;
    pub use crate::commands::{CommandQueue, PlayerCommand, Selection};
    pub use crate::components::*;
    pub use crate::data::{Difficulty, DifficultyPreset, GameRules};
    pub use crate::economy::{Economy, ResourceNode};
    pub use crate::error::{GameError, Result};
    pub use crate::factions::Faction;
    pub use crate::grid::{Fog, GridMap, Terrain};
    pub use crate::map_generation::{generate_map, seeded_rng, SimRng};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::pathfinding::find_path;
    pub use crate::session::{EntityRef, Outcome, Session, SessionConfig, SupplyLedger, TickEvents};
    pub use crate::snapshot::SessionSnapshot;
    pub use crate::structure::{Structure, StructureKind, StructureState};
}
