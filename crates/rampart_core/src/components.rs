//! Entity definitions.
//!
//! Entities are plain data. Behavior lives in [`crate::systems`]. Every
//! type-dependent stat is resolved once at creation into a profile of
//! fixed-point values, so hot loops never consult the data tables.

use std::collections::BTreeMap;

use crate::data::{
    AttackStats, EnemyKind, EnemyStats, HeroKind, HeroStats, ObjectiveKind, OnHitEffect, PathKey,
    TauntStats, TowerKind, TowerTier, TowerTierStats, TroopKind, UnitStats,
};
use crate::math::{percent, Fixed, Vec2Fixed};
use crate::timer::SimTime;

/// Unique identifier for entities.
pub type EntityId = u64;

/// Session-wide id source shared by every collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdAllocator {
    next: EntityId,
}

impl IdAllocator {
    /// Allocator whose first id is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 1 }
    }

    /// Hand out the next id.
    pub fn allocate(&mut self) -> EntityId {
        let id = self.next;
        self.next += 1;
        id
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordered storage for one entity collection.
///
/// Backed by a `BTreeMap`, so iteration is always in id order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityStorage<T> {
    entities: BTreeMap<EntityId, T>,
}

impl<T> EntityStorage<T> {
    /// Create empty storage.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
        }
    }

    /// Insert an entity under `id`, returning any entity it replaced.
    pub fn insert(&mut self, id: EntityId, entity: T) -> Option<T> {
        self.entities.insert(id, entity)
    }

    /// Remove an entity by ID.
    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        self.entities.remove(&id)
    }

    /// Get an entity by ID.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.entities.get(&id)
    }

    /// Get a mutable reference to an entity by ID.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        self.entities.get_mut(&id)
    }

    /// Check if an entity exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Get the number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entity IDs in ascending order.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    /// Iterate in id order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.entities.iter().map(|(id, e)| (*id, e))
    }

    /// Iterate mutably in id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> {
        self.entities.iter_mut().map(|(id, e)| (*id, e))
    }

    /// Iterate over entities in id order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entities.values()
    }

    /// Iterate mutably over entities in id order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entities.values_mut()
    }

    /// Keep only entities matching `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(EntityId, &mut T) -> bool) {
        self.entities.retain(|id, e| keep(*id, e));
    }

    /// Drop every entity.
    pub fn clear(&mut self) {
        self.entities.clear();
    }
}

impl<T> Default for EntityStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Shared state
// ============================================================================

/// Health component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Health {
    /// Current health points.
    pub current: u32,
    /// Maximum health points.
    pub max: u32,
}

impl Health {
    /// Create new health component at full health.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Check if entity is dead (health == 0).
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.current == 0
    }

    /// Check if entity is at full health.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.current >= self.max
    }

    /// Apply damage, returning actual damage dealt.
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        let actual = amount.min(self.current);
        self.current -= actual;
        actual
    }

    /// Heal up to max, returning actual amount healed.
    pub fn heal(&mut self, amount: u32) -> u32 {
        let headroom = self.max.saturating_sub(self.current);
        let actual = amount.min(headroom);
        self.current += actual;
        actual
    }

    /// Force `current` back into `[0, max]`. Returns true if it was out of range.
    pub fn clamp(&mut self) -> bool {
        if self.current > self.max {
            self.current = self.max;
            return true;
        }
        false
    }
}

/// Active slow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slow {
    /// Speed multiplier, `(0, 1]`.
    pub factor: Fixed,
    /// Expiry.
    pub until: SimTime,
}

/// Active burn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Burn {
    /// Stack count.
    pub stacks: u32,
    /// Damage per second per stack.
    pub dps: u32,
    /// Expiry.
    pub until: SimTime,
    /// Next damage pulse.
    pub next_pulse: SimTime,
}

/// Status effects on an enemy.
///
/// Only the strongest instance of each kind is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusEffects {
    /// Strongest active slow.
    pub slow: Option<Slow>,
    /// Frozen while the clock is before this.
    pub frozen_until: SimTime,
    /// Stunned while the clock is before this.
    pub stunned_until: SimTime,
    /// Burn stacks.
    pub burn: Option<Burn>,
}

impl StatusEffects {
    /// Whether movement and attacks are suspended.
    #[must_use]
    pub fn is_frozen(&self, now: SimTime) -> bool {
        now < self.frozen_until
    }

    /// Whether attacks are suspended.
    #[must_use]
    pub fn is_stunned(&self, now: SimTime) -> bool {
        now < self.stunned_until
    }

    /// Whether the enemy may attack this tick.
    #[must_use]
    pub fn can_attack(&self, now: SimTime) -> bool {
        !self.is_frozen(now) && !self.is_stunned(now)
    }

    /// Speed multiplier from the active slow.
    #[must_use]
    pub fn slow_factor(&self, now: SimTime) -> Fixed {
        match self.slow {
            Some(slow) if now < slow.until => slow.factor,
            _ => Fixed::ONE,
        }
    }

    /// Apply a slow. A stronger slow replaces the current one; an equal one
    /// extends it; a weaker one is ignored while the current one lasts.
    pub fn apply_slow(&mut self, factor: Fixed, until: SimTime, now: SimTime) {
        match self.slow {
            Some(current) if now < current.until && current.factor < factor => {}
            Some(current) if now < current.until && current.factor == factor => {
                self.slow = Some(Slow {
                    factor,
                    until: current.until.max(until),
                });
            }
            _ => self.slow = Some(Slow { factor, until }),
        }
    }

    /// Freeze until `until` (longest wins).
    pub fn apply_freeze(&mut self, until: SimTime) {
        self.frozen_until = self.frozen_until.max(until);
    }

    /// Stun until `until` (longest wins).
    pub fn apply_stun(&mut self, until: SimTime) {
        self.stunned_until = self.stunned_until.max(until);
    }

    /// Add a burn stack, refreshing its duration.
    pub fn apply_burn(&mut self, dps: u32, until: SimTime, first_pulse: SimTime, max_stacks: u32) {
        self.burn = Some(match self.burn {
            Some(burn) => Burn {
                stacks: (burn.stacks + 1).min(max_stacks.max(1)),
                dps: burn.dps.max(dps),
                until: burn.until.max(until),
                next_pulse: burn.next_pulse,
            },
            None => Burn {
                stacks: 1,
                dps,
                until,
                next_pulse: first_pulse,
            },
        });
    }

    /// Drop effects that have run out.
    pub fn expire(&mut self, now: SimTime) {
        if self.slow.is_some_and(|s| now >= s.until) {
            self.slow = None;
        }
        if self.burn.is_some_and(|b| now >= b.until) {
            self.burn = None;
        }
    }
}

// ============================================================================
// Profiles
// ============================================================================

fn armor(pct: u32) -> Fixed {
    percent(pct.min(99))
}

fn millis(ms: u32) -> SimTime {
    SimTime::from_millis(u64::from(ms))
}

/// Enemy attack against defenders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackProfile {
    /// Damage per strike.
    pub damage: u32,
    /// Reach.
    pub range: Fixed,
    /// Time between strikes.
    pub cooldown: SimTime,
}

impl From<&AttackStats> for AttackProfile {
    fn from(stats: &AttackStats) -> Self {
        Self {
            damage: stats.damage,
            range: Fixed::from_num(stats.range),
            cooldown: millis(stats.cooldown_ms),
        }
    }
}

/// Resolved enemy stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnemyProfile {
    /// Maximum hit points after wave scaling.
    pub max_hp: u32,
    /// Base speed in world units per second.
    pub speed: Fixed,
    /// Fraction of damage absorbed, `[0, 1)`.
    pub armor: Fixed,
    /// Gold on kill.
    pub bounty: u32,
    /// Lives lost on escape.
    pub lives_cost: u32,
    /// Exempt from ground-only towers and hazards.
    pub flying: bool,
    /// Attack against defenders.
    pub attack: Option<AttackProfile>,
    /// Attack can damage objectives.
    pub hits_objectives: bool,
}

impl EnemyProfile {
    /// Resolve stats with a hit point scale in percent.
    #[must_use]
    pub fn new(stats: &EnemyStats, hp_pct: u32) -> Self {
        let max_hp = (u64::from(stats.hp) * u64::from(hp_pct) / 100).max(1);
        Self {
            max_hp: u32::try_from(max_hp).unwrap_or(u32::MAX),
            speed: Fixed::from_num(stats.speed),
            armor: armor(stats.armor_pct),
            bounty: stats.bounty,
            lives_cost: stats.lives_cost,
            flying: stats.flying,
            attack: stats.attack.as_ref().map(AttackProfile::from),
            hits_objectives: stats.hits_objectives,
        }
    }
}

/// Resolved troop or hero stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitProfile {
    /// Maximum hit points.
    pub max_hp: u32,
    /// Damage per attack.
    pub damage: u32,
    /// Attack range.
    pub range: Fixed,
    /// Time between attacks.
    pub cooldown: SimTime,
    /// Engagement radius.
    pub sight: Fixed,
    /// World units per second.
    pub speed: Fixed,
    /// Fraction of damage absorbed.
    pub armor: Fixed,
    /// Can hit flying enemies.
    pub ranged: bool,
}

impl From<&UnitStats> for UnitProfile {
    fn from(stats: &UnitStats) -> Self {
        Self {
            max_hp: stats.hp.max(1),
            damage: stats.damage,
            range: Fixed::from_num(stats.range),
            cooldown: millis(stats.cooldown_ms),
            sight: Fixed::from_num(stats.sight),
            speed: Fixed::from_num(stats.speed),
            armor: armor(stats.armor_pct),
            ranged: stats.ranged,
        }
    }
}

/// Splash area of a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplashProfile {
    /// Radius.
    pub radius: Fixed,
    /// Damage multiplier at the edge.
    pub edge: Fixed,
}

/// Chain jumps of a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainProfile {
    /// Extra targets after the first.
    pub max_hops: u32,
    /// Jump distance.
    pub hop_radius: Fixed,
    /// Damage multiplier per hop.
    pub falloff: Fixed,
}

/// Everything a single hit carries, whether instant or in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitPayload {
    /// Raw damage before armor, including buffs.
    pub damage: Fixed,
    /// Whether flying enemies can be caught by splash and chains.
    pub targets_air: bool,
    /// Splash area.
    pub splash: Option<SplashProfile>,
    /// Chain jumps.
    pub chain: Option<ChainProfile>,
    /// Status effect applied to every enemy hit.
    pub on_hit: Option<OnHitEffect>,
}

/// Resolved tower tier stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TowerProfile {
    /// Damage per attack.
    pub damage: u32,
    /// Attack range.
    pub range: Fixed,
    /// Time between attacks.
    pub cooldown: SimTime,
    /// Whether flying enemies are targetable.
    pub targets_air: bool,
    /// Projectile speed, or `None` for instant hits.
    pub projectile_speed: Option<Fixed>,
    /// Splash area.
    pub splash: Option<SplashProfile>,
    /// Chain jumps.
    pub chain: Option<ChainProfile>,
    /// Status effect.
    pub on_hit: Option<OnHitEffect>,
}

impl TowerProfile {
    /// Whether the tower attacks on its own.
    #[must_use]
    pub fn is_offensive(&self) -> bool {
        self.damage > 0 && self.cooldown > SimTime::ZERO
    }

    /// Payload of one attack with the given damage multiplier.
    #[must_use]
    pub fn payload(&self, damage_multiplier: Fixed) -> HitPayload {
        HitPayload {
            damage: Fixed::from_num(self.damage) * damage_multiplier,
            targets_air: self.targets_air,
            splash: self.splash,
            chain: self.chain,
            on_hit: self.on_hit,
        }
    }
}

impl From<&TowerTierStats> for TowerProfile {
    fn from(stats: &TowerTierStats) -> Self {
        use crate::data::Delivery;

        Self {
            damage: stats.damage,
            range: Fixed::from_num(stats.range),
            cooldown: millis(stats.cooldown_ms),
            targets_air: stats.targets_air,
            projectile_speed: match stats.delivery {
                Delivery::Instant => None,
                Delivery::Projectile { speed } => Some(Fixed::from_num(speed.max(1))),
            },
            splash: stats.splash.map(|s| SplashProfile {
                radius: Fixed::from_num(s.radius),
                edge: percent(s.edge_pct.min(100)),
            }),
            chain: stats.chain.map(|c| ChainProfile {
                max_hops: c.max_hops,
                hop_radius: Fixed::from_num(c.hop_radius),
                falloff: percent(c.falloff_pct.min(100)),
            }),
            on_hit: stats.on_hit,
        }
    }
}

/// Resolved hero taunt stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TauntProfile {
    /// Radius around the hero.
    pub radius: Fixed,
    /// Active time.
    pub duration: SimTime,
    /// Recharge.
    pub cooldown: SimTime,
    /// Maximum displacement.
    pub pull: Fixed,
}

impl From<&TauntStats> for TauntProfile {
    fn from(stats: &TauntStats) -> Self {
        Self {
            radius: Fixed::from_num(stats.radius),
            duration: millis(stats.duration_ms),
            cooldown: millis(stats.cooldown_ms),
            pull: Fixed::from_num(stats.pull),
        }
    }
}

// ============================================================================
// Entities
// ============================================================================

/// Taunt displacement of an enemy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Taunt {
    /// Hero that taunted it.
    pub source: EntityId,
    /// Offset added to the on-path position.
    pub offset: Vec2Fixed,
}

/// An attacker walking a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enemy {
    /// Identity.
    pub id: EntityId,
    /// Type.
    pub kind: EnemyKind,
    /// Resolved stats.
    pub profile: EnemyProfile,
    /// Hit points.
    pub health: Health,
    /// Route, fixed for life.
    pub path: PathKey,
    /// Progress in segment units.
    pub progress: Fixed,
    /// Drawn position: on-path point plus taunt and knockback offsets.
    pub position: Vec2Fixed,
    /// Wave scaling of speed.
    pub speed_modifier: Fixed,
    /// Status effects.
    pub status: StatusEffects,
    /// Speed multiplier from hazards this tick.
    pub hazard_slow: Fixed,
    /// Taunt displacement.
    pub taunt: Option<Taunt>,
    /// Decaying push from hazards.
    pub knockback: Vec2Fixed,
    /// Wave that spawned it.
    pub wave: usize,
    /// Set once when it reaches the goal.
    pub reached_goal: bool,
    /// Next attack allowed at.
    pub next_attack: SimTime,
}

impl Enemy {
    /// Create an enemy at the start of its route.
    #[must_use]
    pub fn new(
        id: EntityId,
        kind: EnemyKind,
        profile: EnemyProfile,
        path: PathKey,
        origin: Vec2Fixed,
        speed_pct: u32,
        wave: usize,
    ) -> Self {
        Self {
            id,
            kind,
            profile,
            health: Health::new(profile.max_hp),
            path,
            progress: Fixed::ZERO,
            position: origin,
            speed_modifier: percent(speed_pct),
            status: StatusEffects::default(),
            hazard_slow: Fixed::ONE,
            taunt: None,
            knockback: Vec2Fixed::ZERO,
            wave,
            reached_goal: false,
            next_attack: SimTime::ZERO,
        }
    }

    /// Still on the field and fightable.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.health.is_dead() && !self.reached_goal
    }
}

/// Who owns a troop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Producer {
    /// A barracks-type tower.
    Tower(EntityId),
    /// The level's barracks objective.
    Objective,
    /// A spell; the troop vanishes at `expires`.
    Spell {
        /// Expiry.
        expires: SimTime,
    },
}

/// A friendly mobile unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Troop {
    /// Identity.
    pub id: EntityId,
    /// Type.
    pub kind: TroopKind,
    /// Resolved stats.
    pub profile: UnitProfile,
    /// Hit points.
    pub health: Health,
    /// Current position.
    pub position: Vec2Fixed,
    /// Formation slot it returns to.
    pub rally: Vec2Fixed,
    /// Owner.
    pub producer: Producer,
    /// Slot index within the producer's formation.
    pub slot: usize,
    /// Enemy it is moving to engage.
    pub engaged: Option<EntityId>,
    /// Next attack allowed at.
    pub next_attack: SimTime,
    /// Creation time, used to retire the oldest.
    pub spawned_at: SimTime,
}

impl Troop {
    /// Create a troop standing on its slot.
    #[must_use]
    pub fn new(
        id: EntityId,
        kind: TroopKind,
        profile: UnitProfile,
        rally: Vec2Fixed,
        producer: Producer,
        slot: usize,
        now: SimTime,
    ) -> Self {
        Self {
            id,
            kind,
            profile,
            health: Health::new(profile.max_hp),
            position: rally,
            rally,
            producer,
            slot,
            engaged: None,
            next_attack: now,
            spawned_at: now,
        }
    }
}

/// The player's hero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hero {
    /// Identity.
    pub id: EntityId,
    /// Type.
    pub kind: HeroKind,
    /// Resolved stats.
    pub profile: UnitProfile,
    /// Hit points.
    pub health: Health,
    /// Current position.
    pub position: Vec2Fixed,
    /// Point it holds when not engaging.
    pub rally: Vec2Fixed,
    /// Enemy it is moving to engage.
    pub engaged: Option<EntityId>,
    /// Next attack allowed at.
    pub next_attack: SimTime,
    /// Taunt ability.
    pub taunt: TauntProfile,
    /// Ability usable again at.
    pub ability_ready_at: SimTime,
    /// Taunt active while the clock is before this.
    pub taunt_until: SimTime,
    /// Regeneration per second.
    pub regen_per_sec: Fixed,
    /// Fractional regeneration carried between ticks.
    pub regen_carry: Fixed,
}

impl Hero {
    /// Create a hero at `spawn`.
    #[must_use]
    pub fn new(id: EntityId, kind: HeroKind, stats: &HeroStats, spawn: Vec2Fixed, now: SimTime) -> Self {
        let profile = UnitProfile::from(&stats.unit);
        Self {
            id,
            kind,
            profile,
            health: Health::new(profile.max_hp),
            position: spawn,
            rally: spawn,
            engaged: None,
            next_attack: now,
            taunt: TauntProfile::from(&stats.taunt),
            ability_ready_at: now,
            taunt_until: SimTime::ZERO,
            regen_per_sec: Fixed::from_num(stats.regen_per_sec),
            regen_carry: Fixed::ZERO,
        }
    }

    /// Whether the taunt aura is up.
    #[must_use]
    pub fn taunt_active(&self, now: SimTime) -> bool {
        now < self.taunt_until
    }
}

/// Beacon aura bonus on a tower.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuraBuff {
    /// Damage multiplier.
    pub damage: Fixed,
    /// Cooldown multiplier.
    pub cooldown: Fixed,
}

impl Default for AuraBuff {
    fn default() -> Self {
        Self {
            damage: Fixed::ONE,
            cooldown: Fixed::ONE,
        }
    }
}

/// A stationary structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tower {
    /// Identity.
    pub id: EntityId,
    /// Type.
    pub kind: TowerKind,
    /// Upgrade level.
    pub tier: TowerTier,
    /// Fixed position.
    pub position: Vec2Fixed,
    /// Resolved stats of the current tier.
    pub profile: TowerProfile,
    /// Next attack allowed at.
    pub next_attack: SimTime,
    /// Gold spent on building and upgrades.
    pub invested: u32,
    /// Beacon bonus this tick.
    pub aura: AuraBuff,
    /// Rally point for produced troops.
    pub rally: Vec2Fixed,
}

impl Tower {
    /// Create a tower of tier one.
    #[must_use]
    pub fn new(
        id: EntityId,
        kind: TowerKind,
        position: Vec2Fixed,
        stats: &TowerTierStats,
        rally: Vec2Fixed,
        now: SimTime,
    ) -> Self {
        Self {
            id,
            kind,
            tier: TowerTier::One,
            position,
            profile: TowerProfile::from(stats),
            next_attack: now,
            invested: stats.cost,
            aura: AuraBuff::default(),
            rally,
        }
    }
}

/// A hit in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projectile {
    /// Identity.
    pub id: EntityId,
    /// Firing tower.
    pub source: EntityId,
    /// Target enemy; may vanish before impact.
    pub target: EntityId,
    /// Current position.
    pub position: Vec2Fixed,
    /// Last known target position.
    pub aim: Vec2Fixed,
    /// World units per second.
    pub speed: Fixed,
    /// What lands on impact.
    pub payload: HitPayload,
}

/// Kind of ongoing area modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    /// Slows every enemy inside.
    SlowField {
        /// Speed multiplier.
        factor: Fixed,
        /// Radius.
        radius: Fixed,
    },
}

/// A timed area modifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Effect {
    /// Identity.
    pub id: EntityId,
    /// Behavior.
    pub kind: EffectKind,
    /// Center.
    pub position: Vec2Fixed,
    /// Expiry.
    pub until: SimTime,
}

/// Cosmetic particle kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticleKind {
    /// Enemy entered the field.
    Spawn,
    /// Single-target hit.
    Impact,
    /// Splash or meteor.
    Explosion,
    /// Chain jump.
    Arc,
    /// Something died.
    Death,
    /// Shrine pulse.
    Heal,
}

/// Purely cosmetic; never read by gameplay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Particle {
    /// Identity.
    pub id: EntityId,
    /// Look.
    pub kind: ParticleKind,
    /// Where.
    pub position: Vec2Fixed,
    /// Culled at.
    pub expires: SimTime,
}

/// Shrine cycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShrinePhase {
    /// Charging.
    Idle,
    /// Healing allies in range.
    Healing,
}

/// Barracks cycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarracksPhase {
    /// Waiting.
    Idle,
    /// About to deploy.
    Preparing,
    /// Deploying a squad this tick.
    Spawning,
}

/// Vault condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VaultState {
    /// Standing; bounty bonus applies.
    Intact,
    /// Terminal; bonus lost for the session.
    Destroyed,
}

/// Evolving objective state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectiveState {
    /// Derived from towers in range.
    Beacon {
        /// Power stage, 0 to 3.
        stage: u8,
        /// Towers inside the aura.
        towers_in_range: usize,
    },
    /// Destroyable store.
    Vault {
        /// Hit points.
        health: Health,
        /// Condition.
        state: VaultState,
    },
    /// Cyclic healer.
    Shrine {
        /// Current phase.
        phase: ShrinePhase,
        /// Start of the current cycle.
        cycle_start: SimTime,
        /// Fractional healing carried between ticks.
        heal_carry: Fixed,
    },
    /// Cyclic troop producer.
    Barracks {
        /// Current phase.
        phase: BarracksPhase,
        /// Start of the current phase.
        phase_start: SimTime,
    },
}

/// The level's special objective.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Objective {
    /// Type.
    pub kind: ObjectiveKind,
    /// Position.
    pub position: Vec2Fixed,
    /// Evolving state.
    pub state: ObjectiveState,
}
