//! # Rampart Core
//!
//! Deterministic tower-defense battle engine.
//!
//! This crate contains **only** battle logic:
//! - No rendering
//! - No networking
//! - No system randomness
//! - No floating-point math in the simulation (uses fixed-point)
//!
//! The host owns a [`session::Session`], calls [`session::Session::tick`]
//! once per frame and issues commands (build, cast, call wave) between
//! ticks. Identical levels and commands always produce identical battles,
//! which makes headless agents, CI balance runs and determinism checks
//! straightforward.
//!
//! ## Crate Structure
//!
//! - [`timer`] - Pausable, speed-scaled timer registry
//! - [`components`] - Entity types and their resolved profiles
//! - [`systems`] - Movement, combat, hazards, objectives and waves
//! - [`session`] - Battle lifecycle and host operations
//! - [`data`] - Stat tables, wave plans and level definitions
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod components;
pub mod data;
pub mod error;
pub mod events;
pub mod geometry;
pub mod math;
pub mod outcome;
pub mod session;
pub mod snapshot;
pub mod systems;
pub mod timer;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::components::{EntityId, Health, Producer};
    pub use crate::data::{
        Branch, EnemyKind, GameData, HeroKind, LevelDefinition, SpellKind, TowerKind, TowerTier,
        TroopKind, WavePlan,
    };
    pub use crate::error::{GameError, Result};
    pub use crate::events::{TickEvents, WaveEvent};
    pub use crate::geometry::GridPoint;
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::outcome::{BattleResult, Outcome};
    pub use crate::session::{ResetOptions, RunState, Session, StartOutcome};
    pub use crate::snapshot::SessionSnapshot;
    pub use crate::systems::waves::WavePhase;
    pub use crate::timer::SimTime;
}
