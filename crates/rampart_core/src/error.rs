//! Error types for the battle engine.
//!
//! Only configuration problems and rejected host actions surface as errors.
//! A target vanishing mid-tick is resolved locally and never reaches here.

use thiserror::Error;

use crate::components::EntityId;
use crate::data::{EnemyKind, HeroKind, SpellKind, TowerKind, TroopKind};

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all engine errors.
///
/// Every variant doubles as the reason code handed back to the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// Level definition failed validation.
    #[error("Invalid level '{level}': {reason}")]
    InvalidLevel {
        /// Level identifier.
        level: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Level references a wave template that does not exist.
    #[error("Unknown wave template: {0}")]
    UnknownWaveTemplate(String),

    /// A wave group routes enemies onto a secondary path the level lacks.
    #[error("Wave {wave} group {group} uses the secondary route but the level has none")]
    MissingSecondaryPath {
        /// Wave index.
        wave: usize,
        /// Group index within the wave.
        group: usize,
    },

    /// A data table lacks an entry the engine needs.
    #[error("Missing stats for {0}")]
    MissingStats(String),

    /// Data file parsing error.
    #[error("Failed to parse data '{path}': {message}")]
    DataParse {
        /// Path or label of the source that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Not enough gold for the requested action.
    #[error("Insufficient gold: need {required}, have {available}")]
    InsufficientGold {
        /// Gold required.
        required: u32,
        /// Gold available.
        available: u32,
    },

    /// Spell is still recharging.
    #[error("Spell {spell:?} is on cooldown for another {remaining_ms} ms")]
    SpellOnCooldown {
        /// Spell that was cast.
        spell: SpellKind,
        /// Remaining cooldown in milliseconds.
        remaining_ms: u64,
    },

    /// Position is not a legal build spot, or lies off the field.
    #[error("Position ({x}, {y}) is not a legal placement")]
    InvalidPlacement {
        /// World x (whole units).
        x: i32,
        /// World y (whole units).
        y: i32,
    },

    /// Build slot already holds a tower.
    #[error("Build slot already occupied by tower {0}")]
    SlotOccupied(EntityId),

    /// Tower cannot be upgraded along the requested line.
    #[error("Tower {id} ({kind:?}) cannot be upgraded: {reason}")]
    NotUpgradable {
        /// Tower identifier.
        id: EntityId,
        /// Tower kind.
        kind: TowerKind,
        /// Why the upgrade is refused.
        reason: &'static str,
    },

    /// Action requires a running battle.
    #[error("Battle is not running")]
    BattleNotRunning,

    /// No level has been started on this session.
    #[error("No level loaded")]
    NoLevelLoaded,

    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Hero is dead or was never spawned.
    #[error("Hero is not on the field")]
    HeroUnavailable,

    /// Hero ability is still recharging.
    #[error("Hero ability is on cooldown for another {remaining_ms} ms")]
    AbilityOnCooldown {
        /// Remaining cooldown in milliseconds.
        remaining_ms: u64,
    },

    /// Wave plan has no further waves to call.
    #[error("No further waves to call")]
    NoWavesRemaining,

    /// The next wave can only be called during an intermission.
    #[error("Wave {0} is still in progress")]
    WaveInProgress(usize),
}

impl GameError {
    /// Build a missing-stats error for an enemy kind.
    #[must_use]
    pub fn missing_enemy(kind: EnemyKind) -> Self {
        Self::MissingStats(format!("enemy {kind:?}"))
    }

    /// Build a missing-stats error for a tower kind.
    #[must_use]
    pub fn missing_tower(kind: TowerKind) -> Self {
        Self::MissingStats(format!("tower {kind:?}"))
    }

    /// Build a missing-stats error for a troop kind.
    #[must_use]
    pub fn missing_troop(kind: TroopKind) -> Self {
        Self::MissingStats(format!("troop {kind:?}"))
    }

    /// Build a missing-stats error for a hero kind.
    #[must_use]
    pub fn missing_hero(kind: HeroKind) -> Self {
        Self::MissingStats(format!("hero {kind:?}"))
    }

    /// Build a missing-stats error for a spell kind.
    #[must_use]
    pub fn missing_spell(kind: SpellKind) -> Self {
        Self::MissingStats(format!("spell {kind:?}"))
    }

    /// Whether this error belongs to the configuration class (rejects `start`).
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidLevel { .. }
                | Self::UnknownWaveTemplate(_)
                | Self::MissingSecondaryPath { .. }
                | Self::MissingStats(_)
                | Self::DataParse { .. }
        )
    }
}
