//! Timer payloads and per-tick event reports.

use serde::{Deserialize, Serialize};

use crate::components::{EntityId, ShrinePhase};
use crate::data::{EnemyKind, PathKey, SpellKind};
use crate::outcome::BattleResult;
use crate::timer::SimTime;

/// Deferred work scheduled on the session's timer registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// Spawn the `index`-th enemy of a wave group.
    SpawnEnemy {
        /// Wave index.
        wave: usize,
        /// Group index within the wave.
        group: usize,
        /// Spawn index within the group.
        index: u32,
    },
    /// Activate the next wave after an intermission.
    StartWave,
    /// Bring the hero back.
    RespawnHero,
    /// Replace a fallen troop of a barracks tower.
    RespawnTroop {
        /// Producing tower.
        tower: EntityId,
        /// Formation slot to fill.
        slot: usize,
    },
    /// Pay out a mine.
    Income {
        /// Paying tower.
        tower: EntityId,
    },
}

/// Where damage came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DamageSource {
    /// A tower attack or projectile.
    Tower(EntityId),
    /// A troop.
    Troop(EntityId),
    /// The hero.
    Hero(EntityId),
    /// An enemy striking back.
    Enemy(EntityId),
    /// Burn pulse.
    Burn,
    /// Hazard pulse.
    Hazard,
    /// Spell.
    Spell(SpellKind),
}

/// A single application of damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageEvent {
    /// Attacker.
    pub source: DamageSource,
    /// Damaged entity.
    pub target: EntityId,
    /// Hit points actually removed.
    pub amount: u32,
}

/// An enemy entering the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnRecord {
    /// New enemy.
    pub id: EntityId,
    /// Type.
    pub kind: EnemyKind,
    /// Wave index.
    pub wave: usize,
    /// Route.
    pub path: PathKey,
    /// Scheduled clock time of the spawn.
    pub at: SimTime,
}

/// An enemy killed this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kill {
    /// Enemy.
    pub id: EntityId,
    /// Type.
    pub kind: EnemyKind,
    /// Gold credited, bonuses included.
    pub bounty: u32,
}

/// Wave scheduler transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "wave", rename_all = "snake_case")]
pub enum WaveEvent {
    /// Wave activated.
    Started(usize),
    /// Last spawn of the wave fired.
    SpawnsFinished(usize),
    /// Wave population reached zero.
    Cleared(usize),
    /// No waves remain.
    AllComplete,
}

/// Objective transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectiveEvent {
    /// Beacon power stage changed.
    BeaconStage(u8),
    /// Vault took damage.
    VaultDamaged {
        /// Hit points left.
        remaining: u32,
    },
    /// Vault fell.
    VaultDestroyed,
    /// Shrine phase changed.
    ShrinePhase(ShrinePhase),
    /// Barracks deployed a squad.
    BarracksDeployed(Vec<EntityId>),
}

/// Everything that happened during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickEvents {
    /// Enemies spawned.
    pub spawned: Vec<SpawnRecord>,
    /// Damage applied.
    pub damage: Vec<DamageEvent>,
    /// Enemies killed.
    pub kills: Vec<Kill>,
    /// Enemies that reached the goal.
    pub escaped: Vec<EntityId>,
    /// Lives lost to escapes.
    pub lives_lost: u32,
    /// Troops that fell.
    pub troops_lost: Vec<EntityId>,
    /// Hero fell this tick.
    pub hero_died: bool,
    /// Wave transitions.
    pub waves: Vec<WaveEvent>,
    /// Objective transitions.
    pub objective: Vec<ObjectiveEvent>,
    /// Gold earned from bounties and income.
    pub gold_earned: u32,
    /// Terminal result, emitted once.
    pub outcome: Option<BattleResult>,
}

impl TickEvents {
    /// Whether nothing happened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
