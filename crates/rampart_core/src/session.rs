//! Battle session: lifecycle, host operations and the tick driver.
//!
//! A [`Session`] owns every piece of mutable battle state. The host drives
//! it by calling [`Session::tick`] once per frame and issues commands
//! through the public operations, each of which either succeeds or is
//! rejected with a [`GameError`] reason code and no state change.
//!
//! # Tick order
//!
//! 1. Clock advance (scaled by game speed), particle and effect expiry
//! 2. Movement
//! 3. Combat: hero auto-ability, towers, projectiles, defenders, enemy
//!    attacks, burns
//! 4. Hazards
//! 5. Objective
//! 6. Casualties: bounties, escapes, fallen defenders
//! 7. Timers and the wave scheduler
//! 8. Win/loss evaluation
//! 9. Invariant sweep

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::components::{
    Effect, EffectKind, Enemy, EnemyProfile, EntityId, Hero, HitPayload, Objective,
    ObjectiveState, ParticleKind, Producer, SplashProfile, Tower, TowerProfile, UnitProfile,
};
use crate::data::{
    Branch, GameData, LevelDefinition, SpellEffect, SpellKind, TowerKind, TowerTier, Tuning,
    WavePlan,
};
use crate::error::{GameError, Result};
use crate::events::{DamageSource, Kill, SpawnRecord, TickEvents, TimerEvent};
use crate::geometry::{formation_offsets, in_world_bounds, GridPoint};
use crate::math::{percent, Fixed, Vec2Fixed};
use crate::outcome::{star_rating, BattleResult, BattleStats, Camera, Outcome, RunHistory};
use crate::systems::hazards::HazardClock;
use crate::systems::waves::{WavePhase, WaveScheduler};
use crate::systems::{combat, hazards, movement, objectives, TickContext};
use crate::timer::{Fired, SimTime, TimerRegistry};
use crate::world::{Battlefield, LoadedLevel};

/// Session run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Level loaded; the player builds before calling the first wave.
    Building,
    /// Waves are running.
    Active,
    /// Frozen by the host.
    Paused,
    /// Every wave cleared.
    Won,
    /// Lives ran out.
    Lost,
}

impl RunState {
    /// Whether the battle has ended.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

/// Which presentation-adjacent fields a reset also clears.
///
/// The default keeps both, which is the "retry same level" flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetOptions {
    /// Re-frame the camera on the level.
    pub reset_camera: bool,
    /// Forget attempts and results on this level.
    pub reset_history: bool,
}

impl ResetOptions {
    /// Start fresh: clear camera and history too.
    #[must_use]
    pub const fn fresh() -> Self {
        Self {
            reset_camera: true,
            reset_history: true,
        }
    }

    /// Retry: keep camera and history.
    #[must_use]
    pub const fn retry() -> Self {
        Self {
            reset_camera: false,
            reset_history: false,
        }
    }
}

/// Result of a successful [`Session::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    /// Waves are ready to be called.
    Ready,
    /// The level has no wave content. The scheduler reports all waves
    /// complete, but the battle can never be won.
    NoWaveContent,
}

// ============================================================================
// Battle state
// ============================================================================

fn millis(ms: u32) -> SimTime {
    SimTime::from_millis(u64::from(ms))
}

fn hazard_interval(tuning: &Tuning) -> SimTime {
    millis(tuning.hazard_pulse_ms.max(1))
}

/// Everything a reset rebuilds.
#[derive(Debug, Clone)]
struct Battle {
    field: Battlefield,
    timers: TimerRegistry<TimerEvent>,
    scheduler: WaveScheduler,
    hazard_clock: HazardClock,
    gold: u32,
    lives: u32,
    stats: BattleStats,
    spell_ready_at: BTreeMap<SpellKind, SimTime>,
    /// Events produced by host operations between ticks.
    carry: TickEvents,
}

impl Battle {
    fn empty() -> Self {
        Self {
            field: Battlefield::new(),
            timers: TimerRegistry::new(),
            scheduler: WaveScheduler::new(WavePlan::default()),
            hazard_clock: HazardClock::default(),
            gold: 0,
            lives: 0,
            stats: BattleStats::default(),
            spell_ready_at: BTreeMap::new(),
            carry: TickEvents::default(),
        }
    }

    /// Rebuild for `level`. Timers are cancelled before anything else is
    /// cleared. Returns the number of cancelled timers.
    fn reset(&mut self, level: &LoadedLevel, data: &GameData) -> usize {
        let cancelled = self.timers.reset();
        self.field.clear();
        self.scheduler = WaveScheduler::new(level.plan.clone());
        self.hazard_clock = HazardClock::starting_at(SimTime::ZERO, hazard_interval(&data.tuning));
        self.gold = level.definition.starting_gold;
        self.lives = level.definition.starting_lives;
        self.stats = BattleStats::default();
        self.spell_ready_at.clear();
        self.carry = TickEvents::default();

        self.field.objective = level
            .definition
            .objective
            .as_ref()
            .map(|placement| Objective::new(placement, &data.tuning, SimTime::ZERO));
        if let Some(kind) = level.definition.hero {
            match data.hero(kind) {
                Ok(stats) => {
                    let id = self.field.allocate_id();
                    self.field.hero = Some(Hero::new(id, kind, stats, level.hero_spawn, SimTime::ZERO));
                }
                Err(error) => tracing::warn!(%error, "Hero not spawned"),
            }
        }
        if self.scheduler.has_no_content() {
            self.scheduler.begin(&mut self.timers);
        }
        cancelled
    }

    fn spend(&mut self, cost: u32) -> Result<()> {
        if self.gold < cost {
            return Err(GameError::InsufficientGold {
                required: cost,
                available: self.gold,
            });
        }
        self.gold -= cost;
        self.stats.gold_spent += cost;
        Ok(())
    }

    fn earn(&mut self, amount: u32, events: &mut TickEvents) {
        self.gold = self.gold.saturating_add(amount);
        self.stats.gold_earned += amount;
        events.gold_earned += amount;
    }

    /// Run one tick of every system.
    fn step(&mut self, ctx: &TickContext<'_>, events: &mut TickEvents) {
        let now = ctx.now;
        self.field.particles.retain(|_, p| p.expires > now);
        self.field.effects.retain(|_, e| e.until > now);
        self.field
            .troops
            .retain(|_, t| !matches!(t.producer, Producer::Spell { expires } if expires <= now));
        self.regenerate_hero(ctx);

        let escaped = movement::move_enemies(&mut self.field, ctx);
        movement::move_defenders(&mut self.field, ctx);

        combat::auto_cast(&mut self.field, ctx);
        combat::run_towers(&mut self.field, ctx, events);
        combat::run_projectiles(&mut self.field, ctx, events);
        combat::run_defenders(&mut self.field, ctx, events);
        combat::run_enemy_attacks(&mut self.field, ctx, events);
        combat::run_burns(&mut self.field, ctx, events);

        let pulses = self.hazard_clock.pulses_due(now, hazard_interval(ctx.tuning()));
        hazards::apply_hazards(&mut self.field, ctx, pulses, events);

        objectives::update_objective(&mut self.field, ctx, events);

        self.resolve_casualties(ctx, &escaped, events);
        self.run_waves(ctx, events);
    }

    fn regenerate_hero(&mut self, ctx: &TickContext<'_>) {
        let Some(hero) = self.field.hero.as_mut() else {
            return;
        };
        if hero.engaged.is_some() || hero.health.is_full() {
            hero.regen_carry = Fixed::ZERO;
            return;
        }
        hero.regen_carry += hero.regen_per_sec * ctx.dt;
        let whole = hero.regen_carry.to_num::<u32>();
        if whole > 0 {
            let _ = hero.health.heal(whole);
            hero.regen_carry -= Fixed::from_num(whole);
        }
    }

    fn resolve_casualties(&mut self, ctx: &TickContext<'_>, escaped: &[EntityId], events: &mut TickEvents) {
        let tuning = ctx.tuning();
        for enemy in combat::reap_enemies(&mut self.field) {
            let bonus = self
                .field
                .objective
                .as_ref()
                .map_or(0, |o| o.bounty_bonus_pct(tuning));
            let bounty = enemy.profile.bounty * (100 + bonus) / 100;
            self.earn(bounty, events);
            self.stats.kills += 1;
            self.scheduler.on_enemy_resolved(enemy.wave);
            events.kills.push(Kill {
                id: enemy.id,
                kind: enemy.kind,
                bounty,
            });
        }

        for &id in escaped {
            let Some(enemy) = self.field.enemies.remove(id) else {
                continue;
            };
            let cost = enemy.profile.lives_cost;
            self.lives = self.lives.saturating_sub(cost);
            self.stats.escaped += 1;
            self.scheduler.on_enemy_resolved(enemy.wave);
            events.escaped.push(id);
            events.lives_lost += cost;
            tracing::debug!(enemy = id, lives = self.lives, "Enemy escaped");
        }

        let (troops, hero) = combat::reap_defenders(&mut self.field);
        for troop in troops {
            events.troops_lost.push(troop.id);
            self.field
                .emit_particle(ParticleKind::Death, troop.position, ctx.after_ms(tuning.particle_ms));
            let Producer::Tower(tower) = troop.producer else {
                continue;
            };
            let respawn = self
                .field
                .towers
                .get(tower)
                .and_then(|t| ctx.data.tower(t.kind, t.tier).ok())
                .and_then(|stats| stats.production);
            if let Some(production) = respawn {
                let _ = self.timers.schedule_ms(
                    u64::from(production.respawn_ms),
                    TimerEvent::RespawnTroop {
                        tower,
                        slot: troop.slot,
                    },
                );
            }
        }
        if let Some(hero) = hero {
            events.hero_died = true;
            self.field
                .emit_particle(ParticleKind::Death, hero.position, ctx.after_ms(tuning.particle_ms));
            let respawn_ms = ctx.data.hero(hero.kind).map_or(0, |stats| stats.respawn_ms);
            let _ = self
                .timers
                .schedule_ms(u64::from(respawn_ms), TimerEvent::RespawnHero);
            tracing::info!(respawn_ms, "Hero fell");
        }
    }

    /// Fire due timers and advance the scheduler until both are quiet.
    fn run_waves(&mut self, ctx: &TickContext<'_>, events: &mut TickEvents) {
        let gap = millis(ctx.level.definition.wave_gap_ms);
        loop {
            let fired = self.timers.drain_due();
            let timers_quiet = fired.is_empty();
            for timer in fired {
                let payload = timer.payload;
                if let Err(error) = self.handle_timer(ctx, timer, events) {
                    tracing::warn!(timer = ?payload, %error, "Timer handler failed");
                }
            }
            let transitions = self.scheduler.update(&mut self.timers, gap);
            let scheduler_quiet = transitions.is_empty();
            events.waves.extend(transitions);
            if timers_quiet && scheduler_quiet {
                break;
            }
        }
    }

    fn handle_timer(&mut self, ctx: &TickContext<'_>, timer: Fired<TimerEvent>, events: &mut TickEvents) -> Result<()> {
        match timer.payload {
            TimerEvent::SpawnEnemy { wave, group, index } => {
                let spawned = self.spawn_enemy(ctx, timer.due, wave, group, index, events);
                self.scheduler.on_spawn_fired(wave, spawned.is_ok());
                spawned
            }
            TimerEvent::StartWave => {
                self.scheduler.on_start_timer(&mut self.timers);
                Ok(())
            }
            TimerEvent::RespawnHero => self.respawn_hero(ctx),
            TimerEvent::RespawnTroop { tower, slot } => self.respawn_troop(ctx, tower, slot),
            TimerEvent::Income { tower } => {
                let Some(income) = self
                    .field
                    .towers
                    .get(tower)
                    .map(|t| ctx.data.tower(t.kind, t.tier))
                    .transpose()?
                    .and_then(|stats| stats.income)
                else {
                    return Ok(());
                };
                self.earn(income.amount, events);
                let _ = self
                    .timers
                    .schedule_ms(u64::from(income.interval_ms.max(1)), TimerEvent::Income { tower });
                Ok(())
            }
        }
    }

    fn spawn_enemy(
        &mut self,
        ctx: &TickContext<'_>,
        due: SimTime,
        wave: usize,
        group: usize,
        index: u32,
        events: &mut TickEvents,
    ) -> Result<()> {
        let entry = self
            .scheduler
            .group(wave, group)
            .ok_or_else(|| GameError::InvalidLevel {
                level: ctx.level.definition.id.clone(),
                reason: format!("wave {wave} has no group {group}"),
            })?;
        let (kind, route, hp_pct, speed_pct) = (entry.enemy, entry.route, entry.hp_pct, entry.speed_pct);
        let stats = ctx.data.enemy(kind)?;
        let path = route.path_for(index);
        let origin = ctx.level.path(path).origin();

        let id = self.field.allocate_id();
        let profile = EnemyProfile::new(stats, hp_pct);
        let _ = self
            .field
            .enemies
            .insert(id, Enemy::new(id, kind, profile, path, origin, speed_pct, wave));
        self.field
            .emit_particle(ParticleKind::Spawn, origin, ctx.after_ms(ctx.tuning().particle_ms));
        events.spawned.push(SpawnRecord {
            id,
            kind,
            wave,
            path,
            at: due,
        });
        tracing::debug!(enemy = id, ?kind, wave, ?path, "Enemy spawned");
        Ok(())
    }

    fn respawn_hero(&mut self, ctx: &TickContext<'_>) -> Result<()> {
        let Some(kind) = ctx.level.definition.hero else {
            return Ok(());
        };
        if self.field.hero.is_some() {
            return Ok(());
        }
        let stats = ctx.data.hero(kind)?;
        let id = self.field.allocate_id();
        let spawn = ctx.level.hero_spawn;
        self.field.hero = Some(Hero::new(id, kind, stats, spawn, ctx.now));
        self.field
            .emit_particle(ParticleKind::Spawn, spawn, ctx.after_ms(ctx.tuning().particle_ms));
        tracing::info!(hero = id, "Hero respawned");
        Ok(())
    }

    fn respawn_troop(&mut self, ctx: &TickContext<'_>, tower: EntityId, slot: usize) -> Result<()> {
        // A sold tower leaves its respawn timers behind; they do nothing.
        if !self.field.towers.contains(tower) {
            return Ok(());
        }
        let _ = fill_squad(&mut self.field, ctx.data, tower, ctx.now, Some(slot))?;
        Ok(())
    }
}

/// Deploy troops for the empty formation slots of a producing tower.
///
/// With `only` set, at most that slot is filled.
fn fill_squad(
    field: &mut Battlefield,
    data: &GameData,
    tower: EntityId,
    now: SimTime,
    only: Option<usize>,
) -> Result<Vec<EntityId>> {
    let Some(owner) = field.towers.get(tower) else {
        return Err(GameError::EntityNotFound(tower));
    };
    let Some(production) = data.tower(owner.kind, owner.tier)?.production else {
        return Ok(Vec::new());
    };
    let rally = owner.rally;
    let profile = UnitProfile::from(data.troop(production.troop)?);
    let squad = usize::try_from(production.squad_size).unwrap_or(1);
    let cap = usize::try_from(production.cap.max(production.squad_size)).unwrap_or(squad);
    let offsets = formation_offsets(squad, Fixed::from_num(data.tuning.formation_spacing));

    let producer = Producer::Tower(tower);
    let occupied: BTreeSet<usize> = field
        .troops
        .values()
        .filter(|t| t.producer == producer)
        .map(|t| t.slot)
        .collect();
    let mut deployed = Vec::new();
    for (slot, offset) in offsets.into_iter().enumerate() {
        if occupied.contains(&slot) || only.is_some_and(|s| s != slot) {
            continue;
        }
        deployed.push(field.deploy_troop(production.troop, profile, rally + offset, producer, slot, cap, now));
    }
    Ok(deployed)
}

/// Nearest point on any route, where produced troops gather.
fn rally_point(level: &LoadedLevel, position: Vec2Fixed) -> Vec2Fixed {
    let primary = level.primary.closest_point(position);
    match &level.secondary {
        Some(path) => {
            let secondary = path.closest_point(position);
            if secondary.distance_squared(position) < primary.distance_squared(position) {
                secondary
            } else {
                primary
            }
        }
        None => primary,
    }
}

/// Reject positions off the playable square.
fn on_field(position: Vec2Fixed) -> Result<()> {
    if in_world_bounds(position) {
        Ok(())
    } else {
        Err(GameError::InvalidPlacement {
            x: position.x.to_num(),
            y: position.y.to_num(),
        })
    }
}

fn rejected<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    if let Err(error) = &result {
        tracing::warn!(operation, %error, "Operation rejected");
    }
    result
}

// ============================================================================
// Session
// ============================================================================

/// One battle, owned by the host.
#[derive(Debug, Clone)]
pub struct Session {
    data: GameData,
    level: Option<LoadedLevel>,
    battle: Battle,
    run_state: RunState,
    paused_from: RunState,
    tick: u64,
    history: RunHistory,
    camera: Camera,
    result: Option<BattleResult>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(GameData::builtin())
    }
}

impl Session {
    /// Session with no level loaded.
    #[must_use]
    pub fn new(data: GameData) -> Self {
        Self {
            data,
            level: None,
            battle: Battle::empty(),
            run_state: RunState::Building,
            paused_from: RunState::Building,
            tick: 0,
            history: RunHistory::default(),
            camera: Camera::default(),
            result: None,
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Load a level and reset to its starting condition.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the level fails validation. The
    /// session is left exactly as it was.
    pub fn start(&mut self, definition: LevelDefinition) -> Result<StartOutcome> {
        let level = rejected("start", LoadedLevel::load(definition, &self.data))?;
        tracing::info!(level = %level.definition.id, "Level loaded");
        self.level = Some(level);
        self.reset(ResetOptions::fresh())?;
        if self.battle.scheduler.has_no_content() {
            tracing::warn!("Level has no wave content");
            Ok(StartOutcome::NoWaveContent)
        } else {
            Ok(StartOutcome::Ready)
        }
    }

    /// Return the loaded level to its starting condition.
    ///
    /// Cancels every timer, empties every collection and restores gold,
    /// lives and the wave index. Calling it twice in a row is the same as
    /// calling it once.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::NoLevelLoaded`] before the first `start`.
    pub fn reset(&mut self, options: ResetOptions) -> Result<()> {
        let Some(level) = self.level.as_ref() else {
            return rejected("reset", Err(GameError::NoLevelLoaded));
        };
        let cancelled = self.battle.reset(level, &self.data);
        self.run_state = RunState::Building;
        self.paused_from = RunState::Building;
        self.tick = 0;
        self.result = None;
        if options.reset_camera {
            self.camera = Camera::framing(level.primary.waypoints());
        }
        if options.reset_history {
            self.history = RunHistory::default();
        }
        tracing::info!(level = %level.definition.id, cancelled, "Session reset");
        Ok(())
    }

    /// Freeze the battle. Timers keep their remaining time exactly.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::BattleNotRunning`] unless the battle is active.
    pub fn pause(&mut self) -> Result<()> {
        if self.run_state != RunState::Active {
            return rejected("pause", Err(GameError::BattleNotRunning));
        }
        self.paused_from = self.run_state;
        self.run_state = RunState::Paused;
        self.battle.timers.pause_all();
        tracing::info!(tick = self.tick, "Paused");
        Ok(())
    }

    /// Continue after [`pause`](Self::pause).
    ///
    /// # Errors
    ///
    /// Returns [`GameError::BattleNotRunning`] unless paused.
    pub fn resume(&mut self) -> Result<()> {
        if self.run_state != RunState::Paused {
            return rejected("resume", Err(GameError::BattleNotRunning));
        }
        self.run_state = self.paused_from;
        self.battle.timers.resume_all();
        tracing::info!(tick = self.tick, "Resumed");
        Ok(())
    }

    /// Set the game speed. Returns the clamped multiplier now in effect.
    pub fn set_speed(&mut self, multiplier: Fixed) -> Fixed {
        let speed = self.battle.timers.set_speed(multiplier);
        tracing::info!(speed = %speed, "Game speed set");
        speed
    }

    // ------------------------------------------------------------------
    // Host operations
    // ------------------------------------------------------------------

    /// Build a tier one tower.
    ///
    /// # Errors
    ///
    /// Rejected when the battle is over, the tile is off the field or not a
    /// free build slot (or too close to another tower on free-placement
    /// levels), or gold is short.
    pub fn place_tower(&mut self, kind: TowerKind, at: GridPoint) -> Result<EntityId> {
        let result = self.try_place_tower(kind, at);
        rejected("place_tower", result)
    }

    fn try_place_tower(&mut self, kind: TowerKind, at: GridPoint) -> Result<EntityId> {
        let level = self.level.as_ref().ok_or(GameError::NoLevelLoaded)?;
        if self.run_state.is_terminal() {
            return Err(GameError::BattleNotRunning);
        }
        let stats = self.data.tower(kind, TowerTier::One)?;
        let position = at.to_world();
        if !at.in_bounds() {
            return Err(GameError::InvalidPlacement {
                x: position.x.to_num(),
                y: position.y.to_num(),
            });
        }
        let field = &self.battle.field;

        if level.build_slots.is_empty() {
            let spacing = Fixed::from_num(self.data.tuning.tower_spacing);
            if let Some(other) = field.towers.values().find(|t| t.position.distance(position) < spacing) {
                return Err(GameError::SlotOccupied(other.id));
            }
        } else {
            if !level.build_slots.contains(&position) {
                return Err(GameError::InvalidPlacement {
                    x: position.x.to_num(),
                    y: position.y.to_num(),
                });
            }
            if let Some(other) = field.towers.values().find(|t| t.position == position) {
                return Err(GameError::SlotOccupied(other.id));
            }
        }
        self.battle.spend(stats.cost)?;

        let now = self.battle.timers.now();
        let id = self.battle.field.allocate_id();
        let tower = Tower::new(id, kind, position, stats, rally_point(level, position), now);
        let _ = self.battle.field.towers.insert(id, tower);
        self.battle.stats.towers_built += 1;
        if let Some(income) = stats.income {
            let _ = self
                .battle
                .timers
                .schedule_ms(u64::from(income.interval_ms.max(1)), TimerEvent::Income { tower: id });
        }
        if let Err(error) = fill_squad(&mut self.battle.field, &self.data, id, now, None) {
            tracing::warn!(tower = id, %error, "Squad not deployed");
        }
        tracing::info!(tower = id, ?kind, x = at.x, y = at.y, gold = self.battle.gold, "Tower placed");
        Ok(id)
    }

    /// Upgrade a tower one tier. `branch` is required from tier three and
    /// refused below it. Returns the new tier.
    ///
    /// # Errors
    ///
    /// Rejected for unknown towers, illegal tier steps, or short gold.
    pub fn upgrade_tower(&mut self, id: EntityId, branch: Option<Branch>) -> Result<TowerTier> {
        let result = self.try_upgrade_tower(id, branch);
        rejected("upgrade_tower", result)
    }

    fn try_upgrade_tower(&mut self, id: EntityId, branch: Option<Branch>) -> Result<TowerTier> {
        if self.level.is_none() {
            return Err(GameError::NoLevelLoaded);
        }
        if self.run_state.is_terminal() {
            return Err(GameError::BattleNotRunning);
        }
        let tower = self
            .battle
            .field
            .towers
            .get(id)
            .ok_or(GameError::EntityNotFound(id))?;
        let (kind, tier) = (tower.kind, tower.tier);
        let Some(next) = tier.next(branch) else {
            let reason = if tier.is_final() {
                "already at the final tier"
            } else if tier == TowerTier::Three {
                "a branch must be chosen"
            } else {
                "branches unlock at tier three"
            };
            return Err(GameError::NotUpgradable { id, kind, reason });
        };
        let current = self.data.tower(kind, tier)?;
        let target = self.data.tower(kind, next)?;
        let cost = target.cost.saturating_sub(current.cost);
        self.battle.spend(cost)?;

        if let Some(tower) = self.battle.field.towers.get_mut(id) {
            tower.tier = next;
            tower.profile = TowerProfile::from(target);
            tower.invested += cost;
        }
        let now = self.battle.timers.now();
        if let Err(error) = fill_squad(&mut self.battle.field, &self.data, id, now, None) {
            tracing::warn!(tower = id, %error, "Squad not refilled");
        }
        tracing::info!(tower = id, ?kind, tier = ?next, "Tower upgraded");
        Ok(next)
    }

    /// Sell a tower for part of the gold invested in it. Its troops leave
    /// with it. Returns the refund.
    ///
    /// # Errors
    ///
    /// Rejected for unknown towers or after the battle ended.
    pub fn sell_tower(&mut self, id: EntityId) -> Result<u32> {
        let result = self.try_sell_tower(id);
        rejected("sell_tower", result)
    }

    fn try_sell_tower(&mut self, id: EntityId) -> Result<u32> {
        if self.level.is_none() {
            return Err(GameError::NoLevelLoaded);
        }
        if self.run_state.is_terminal() {
            return Err(GameError::BattleNotRunning);
        }
        let tower = self
            .battle
            .field
            .towers
            .remove(id)
            .ok_or(GameError::EntityNotFound(id))?;
        let refund_pct = u64::from(self.data.tuning.sell_refund_pct.min(100));
        let refund = u32::try_from(u64::from(tower.invested) * refund_pct / 100).unwrap_or(u32::MAX);
        self.battle.gold = self.battle.gold.saturating_add(refund);
        self.battle
            .field
            .troops
            .retain(|_, t| t.producer != Producer::Tower(id));
        tracing::info!(tower = id, refund, "Tower sold");
        Ok(refund)
    }

    /// Cast a spell at a world position.
    ///
    /// # Errors
    ///
    /// Rejected unless the battle is active, the target is on the field,
    /// the spell is ready and gold covers its cost.
    pub fn cast_spell(&mut self, kind: SpellKind, at: Vec2Fixed) -> Result<()> {
        let result = self.try_cast_spell(kind, at);
        rejected("cast_spell", result)
    }

    fn try_cast_spell(&mut self, kind: SpellKind, at: Vec2Fixed) -> Result<()> {
        let level = self.level.as_ref().ok_or(GameError::NoLevelLoaded)?;
        if self.run_state != RunState::Active {
            return Err(GameError::BattleNotRunning);
        }
        on_field(at)?;
        let spell = self.data.spell(kind)?;
        let now = self.battle.timers.now();
        if let Some(ready) = self.battle.spell_ready_at.get(&kind).filter(|r| **r > now) {
            return Err(GameError::SpellOnCooldown {
                spell: kind,
                remaining_ms: ready.saturating_sub(now).as_millis(),
            });
        }
        let summon = match spell.effect {
            SpellEffect::Summon { troop, .. } => Some(UnitProfile::from(self.data.troop(troop)?)),
            _ => None,
        };
        self.battle.spend(spell.cost)?;
        self.battle.stats.spells_cast += 1;
        let _ = self
            .battle
            .spell_ready_at
            .insert(kind, now + millis(spell.cooldown_ms));

        let radius = Fixed::from_num(spell.radius);
        let ctx = TickContext {
            now,
            dt: Fixed::ZERO,
            level,
            data: &self.data,
        };
        let field = &mut self.battle.field;
        match spell.effect {
            SpellEffect::Damage { amount } => {
                let payload = HitPayload {
                    damage: Fixed::from_num(amount),
                    targets_air: true,
                    splash: Some(SplashProfile {
                        radius,
                        edge: Fixed::ONE,
                    }),
                    chain: None,
                    on_hit: None,
                };
                combat::resolve_hit(
                    field,
                    &ctx,
                    DamageSource::Spell(kind),
                    None,
                    at,
                    &payload,
                    &mut self.battle.carry,
                );
            }
            SpellEffect::SlowField { pct, duration_ms } => {
                let id = field.allocate_id();
                let _ = field.effects.insert(
                    id,
                    Effect {
                        id,
                        kind: EffectKind::SlowField {
                            factor: Fixed::ONE - percent(pct.min(95)),
                            radius,
                        },
                        position: at,
                        until: now + millis(duration_ms),
                    },
                );
            }
            SpellEffect::Summon {
                troop,
                count,
                lifetime_ms,
            } => {
                if let Some(profile) = summon {
                    let expires = now + millis(lifetime_ms);
                    let squad = usize::try_from(count).unwrap_or(1);
                    let spacing = Fixed::from_num(self.data.tuning.formation_spacing);
                    for (slot, offset) in formation_offsets(squad, spacing).into_iter().enumerate() {
                        let _ = field.deploy_troop(troop, profile, at + offset, Producer::Spell { expires }, slot, squad, now);
                    }
                }
            }
        }
        tracing::info!(spell = ?kind, gold = self.battle.gold, "Spell cast");
        Ok(())
    }

    /// Start the first wave, or call the next one early during an
    /// intermission. Returns the wave index started.
    ///
    /// # Errors
    ///
    /// Rejected when no waves remain, a wave is still running, or the
    /// battle is paused or over.
    pub fn call_wave(&mut self) -> Result<usize> {
        let result = self.try_call_wave();
        rejected("call_wave", result)
    }

    fn try_call_wave(&mut self) -> Result<usize> {
        if self.level.is_none() {
            return Err(GameError::NoLevelLoaded);
        }
        let scheduler = &mut self.battle.scheduler;
        if scheduler.has_no_content() {
            return Err(GameError::NoWavesRemaining);
        }
        match self.run_state {
            RunState::Building => {
                scheduler.begin(&mut self.battle.timers);
                self.run_state = RunState::Active;
                self.history.attempts += 1;
                tracing::info!(attempt = self.history.attempts, "Battle started");
                scheduler.current_wave().ok_or(GameError::NoWavesRemaining)
            }
            RunState::Active => {
                if scheduler.waves_started() >= scheduler.total_waves() {
                    return Err(GameError::NoWavesRemaining);
                }
                scheduler
                    .call_early(&mut self.battle.timers)
                    .ok_or_else(|| GameError::WaveInProgress(scheduler.current_wave().unwrap_or_default()))
            }
            RunState::Paused | RunState::Won | RunState::Lost => Err(GameError::BattleNotRunning),
        }
    }

    /// Send the hero to hold a new point.
    ///
    /// # Errors
    ///
    /// Rejected for points off the field, while the hero is dead, or after
    /// the battle ended.
    pub fn move_hero(&mut self, to: Vec2Fixed) -> Result<()> {
        let result = self.try_move_hero(to);
        rejected("move_hero", result)
    }

    fn try_move_hero(&mut self, to: Vec2Fixed) -> Result<()> {
        if self.run_state.is_terminal() {
            return Err(GameError::BattleNotRunning);
        }
        on_field(to)?;
        let hero = self.battle.field.hero.as_mut().ok_or(GameError::HeroUnavailable)?;
        hero.rally = to;
        hero.engaged = None;
        Ok(())
    }

    /// Trigger the hero's taunt. Returns how many enemies were taunted.
    ///
    /// # Errors
    ///
    /// Rejected unless the battle is active, the hero is alive and the
    /// ability has recharged.
    pub fn hero_ability(&mut self) -> Result<usize> {
        let result = self.try_hero_ability();
        rejected("hero_ability", result)
    }

    fn try_hero_ability(&mut self) -> Result<usize> {
        if self.run_state != RunState::Active {
            return Err(GameError::BattleNotRunning);
        }
        let now = self.battle.timers.now();
        let hero = self.battle.field.hero.as_ref().ok_or(GameError::HeroUnavailable)?;
        if hero.ability_ready_at > now {
            return Err(GameError::AbilityOnCooldown {
                remaining_ms: hero.ability_ready_at.saturating_sub(now).as_millis(),
            });
        }
        combat::activate_taunt(&mut self.battle.field, now).ok_or(GameError::HeroUnavailable)
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Advance the battle by one frame.
    ///
    /// Does nothing unless the battle is active. Events produced by host
    /// operations since the previous tick are included.
    pub fn tick(&mut self) -> TickEvents {
        if self.run_state != RunState::Active {
            return TickEvents::default();
        }
        let Some(level) = self.level.as_ref() else {
            return TickEvents::default();
        };

        let scaled = self.battle.timers.advance(SimTime::FRAME);
        let ctx = TickContext {
            now: self.battle.timers.now(),
            dt: scaled.as_seconds(),
            level,
            data: &self.data,
        };
        let mut events = std::mem::take(&mut self.battle.carry);
        self.battle.step(&ctx, &mut events);

        let dealt: u64 = events
            .damage
            .iter()
            .filter(|d| !matches!(d.source, DamageSource::Enemy(_)))
            .map(|d| u64::from(d.amount))
            .sum();
        self.battle.stats.damage_dealt += dealt;
        self.tick += 1;

        self.evaluate_outcome(&mut events);
        self.enforce_invariants();

        #[cfg(any(debug_assertions, feature = "debug-validation"))]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "Session state hash");
        }

        events
    }

    /// Run up to `frames` ticks, stopping early once the battle ends.
    pub fn advance(&mut self, frames: u32) -> Vec<TickEvents> {
        let mut all = Vec::new();
        for _ in 0..frames {
            if self.run_state != RunState::Active {
                break;
            }
            all.push(self.tick());
        }
        all
    }

    fn evaluate_outcome(&mut self, events: &mut TickEvents) {
        let Some(level) = self.level.as_ref() else {
            return;
        };
        let battle = &self.battle;
        let outcome = if battle.lives == 0 {
            Outcome::Defeat
        } else if battle.scheduler.is_complete()
            && !battle.scheduler.has_no_content()
            && battle.field.enemies.is_empty()
        {
            Outcome::Victory
        } else {
            return;
        };

        let starting_lives = level.definition.starting_lives;
        let result = BattleResult {
            level: level.definition.id.clone(),
            outcome,
            stars: star_rating(outcome, battle.lives, starting_lives),
            elapsed_ms: battle.timers.now().as_millis(),
            kills: battle.stats.kills,
            escaped: battle.stats.escaped,
            gold_earned: battle.stats.gold_earned,
            lives_remaining: battle.lives,
        };
        self.run_state = match outcome {
            Outcome::Victory => RunState::Won,
            Outcome::Defeat => RunState::Lost,
        };
        self.battle.timers.pause_all();
        self.history.record(&result);
        tracing::info!(
            level = %result.level,
            outcome = ?result.outcome,
            stars = result.stars,
            elapsed_ms = result.elapsed_ms,
            "Battle over"
        );
        self.result = Some(result.clone());
        events.outcome = Some(result);
    }

    /// Correct hit points outside `[0, max]` and report entities owned by
    /// more than one collection.
    fn enforce_invariants(&mut self) {
        let field = &mut self.battle.field;
        for enemy in field.enemies.values_mut() {
            if enemy.health.clamp() {
                tracing::error!(enemy = enemy.id, "Enemy hp above max; clamped");
            }
        }
        for troop in field.troops.values_mut() {
            if troop.health.clamp() {
                tracing::error!(troop = troop.id, "Troop hp above max; clamped");
            }
        }
        if let Some(hero) = field.hero.as_mut() {
            if hero.health.clamp() {
                tracing::error!(hero = hero.id, "Hero hp above max; clamped");
            }
        }
        if let Some(Objective {
            state: ObjectiveState::Vault { health, .. },
            ..
        }) = field.objective.as_mut()
        {
            if health.clamp() {
                tracing::error!("Vault hp above max; clamped");
            }
        }

        if cfg!(any(debug_assertions, feature = "debug-validation")) {
            let mut seen = BTreeSet::new();
            let ids = field
                .enemies
                .sorted_ids()
                .into_iter()
                .chain(field.troops.sorted_ids())
                .chain(field.towers.sorted_ids())
                .chain(field.projectiles.sorted_ids())
                .chain(field.effects.sorted_ids())
                .chain(field.hero.as_ref().map(|h| h.id));
            for id in ids {
                if !seen.insert(id) {
                    tracing::error!(entity = id, "Entity owned by more than one collection");
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Static tables.
    #[must_use]
    pub const fn data(&self) -> &GameData {
        &self.data
    }

    /// Loaded level.
    #[must_use]
    pub const fn level(&self) -> Option<&LoadedLevel> {
        self.level.as_ref()
    }

    /// Entity collections.
    #[must_use]
    pub const fn field(&self) -> &Battlefield {
        &self.battle.field
    }

    /// Run state.
    #[must_use]
    pub const fn run_state(&self) -> RunState {
        self.run_state
    }

    /// Gold on hand.
    #[must_use]
    pub const fn gold(&self) -> u32 {
        self.battle.gold
    }

    /// Lives left.
    #[must_use]
    pub const fn lives(&self) -> u32 {
        self.battle.lives
    }

    /// Ticks run since the last reset.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Battle clock.
    #[must_use]
    pub const fn now(&self) -> SimTime {
        self.battle.timers.now()
    }

    /// Game speed multiplier.
    #[must_use]
    pub const fn speed(&self) -> Fixed {
        self.battle.timers.speed()
    }

    /// Outstanding timers.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.battle.timers.len()
    }

    /// Wave scheduler.
    #[must_use]
    pub const fn waves(&self) -> &WaveScheduler {
        &self.battle.scheduler
    }

    /// Wave scheduler phase.
    #[must_use]
    pub const fn wave_phase(&self) -> WavePhase {
        self.battle.scheduler.phase()
    }

    /// Battle counters.
    #[must_use]
    pub const fn stats(&self) -> &BattleStats {
        &self.battle.stats
    }

    /// Attempts and results on this level.
    #[must_use]
    pub const fn history(&self) -> &RunHistory {
        &self.history
    }

    /// Camera framing.
    #[must_use]
    pub const fn camera(&self) -> Camera {
        self.camera
    }

    /// Replace the camera framing.
    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    /// Result of the finished battle.
    #[must_use]
    pub const fn result(&self) -> Option<&BattleResult> {
        self.result.as_ref()
    }

    /// Remaining cooldown of a spell.
    #[must_use]
    pub fn spell_cooldown(&self, kind: SpellKind) -> SimTime {
        self.battle
            .spell_ready_at
            .get(&kind)
            .map_or(SimTime::ZERO, |ready| ready.saturating_sub(self.now()))
    }

    /// Hash of all gameplay state. Particles are cosmetic and left out.
    ///
    /// Two sessions fed the same level and commands produce equal hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        let battle = &self.battle;
        let field = &battle.field;

        self.tick.hash(&mut hasher);
        self.run_state.hash(&mut hasher);
        battle.timers.now().units().hash(&mut hasher);
        battle.timers.len().hash(&mut hasher);
        battle.gold.hash(&mut hasher);
        battle.lives.hash(&mut hasher);
        battle.scheduler.phase().hash(&mut hasher);
        battle.scheduler.current_wave().hash(&mut hasher);
        battle.scheduler.remaining_spawns().hash(&mut hasher);
        battle.scheduler.population().hash(&mut hasher);

        field.enemies.len().hash(&mut hasher);
        for enemy in field.enemies.values() {
            enemy.id.hash(&mut hasher);
            enemy.kind.hash(&mut hasher);
            enemy.path.hash(&mut hasher);
            enemy.health.current.hash(&mut hasher);
            enemy.progress.to_bits().hash(&mut hasher);
            enemy.position.x.to_bits().hash(&mut hasher);
            enemy.position.y.to_bits().hash(&mut hasher);
            enemy.status.frozen_until.hash(&mut hasher);
            enemy.status.slow.as_ref().map(|s| s.factor.to_bits()).hash(&mut hasher);
            enemy.status.burn.as_ref().map(|b| b.stacks).hash(&mut hasher);
        }

        field.troops.len().hash(&mut hasher);
        for troop in field.troops.values() {
            troop.id.hash(&mut hasher);
            troop.kind.hash(&mut hasher);
            troop.health.current.hash(&mut hasher);
            troop.position.x.to_bits().hash(&mut hasher);
            troop.position.y.to_bits().hash(&mut hasher);
        }

        field.towers.len().hash(&mut hasher);
        for tower in field.towers.values() {
            tower.id.hash(&mut hasher);
            tower.kind.hash(&mut hasher);
            tower.tier.hash(&mut hasher);
            tower.next_attack.hash(&mut hasher);
        }

        if let Some(hero) = &field.hero {
            hero.id.hash(&mut hasher);
            hero.health.current.hash(&mut hasher);
            hero.position.x.to_bits().hash(&mut hasher);
            hero.position.y.to_bits().hash(&mut hasher);
        }

        field.projectiles.len().hash(&mut hasher);
        for projectile in field.projectiles.values() {
            projectile.id.hash(&mut hasher);
            projectile.target.hash(&mut hasher);
            projectile.position.x.to_bits().hash(&mut hasher);
            projectile.position.y.to_bits().hash(&mut hasher);
        }

        field.effects.len().hash(&mut hasher);
        for effect in field.effects.values() {
            effect.id.hash(&mut hasher);
            effect.until.hash(&mut hasher);
        }

        if let Some(objective) = &field.objective {
            match &objective.state {
                ObjectiveState::Beacon { stage, .. } => stage.hash(&mut hasher),
                ObjectiveState::Vault { health, .. } => health.current.hash(&mut hasher),
                ObjectiveState::Shrine { phase, .. } => phase.hash(&mut hasher),
                ObjectiveState::Barracks { phase, .. } => phase.hash(&mut hasher),
            }
        }

        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{EnemyKind, Route, WaveGroup, WavePlan, WaveSource};

    fn level(waves: Option<WaveSource>) -> LevelDefinition {
        LevelDefinition {
            id: "session".to_string(),
            name: "Session".to_string(),
            primary_path: vec![GridPoint::new(0, 2), GridPoint::new(30, 2)],
            secondary_path: None,
            hero_spawn: GridPoint::new(10, 3),
            hero: None,
            objective: None,
            hazards: Vec::new(),
            starting_gold: 300,
            starting_lives: 10,
            waves,
            build_slots: Vec::new(),
            wave_gap_ms: 0,
        }
    }

    fn frosh_wave(count: u32) -> Option<WaveSource> {
        Some(WaveSource::Custom(WavePlan::single(WaveGroup {
            enemy: EnemyKind::Frosh,
            count,
            interval_ms: 600,
            delay_ms: 0,
            route: Route::Primary,
            hp_pct: 100,
            speed_pct: 100,
        })))
    }

    #[test]
    fn test_rejected_start_leaves_session_untouched() {
        let mut session = Session::default();
        let mut broken = level(frosh_wave(1));
        broken.primary_path.truncate(1);
        assert!(session.start(broken).is_err());
        assert!(session.level().is_none());
        assert_eq!(session.run_state(), RunState::Building);
    }

    #[test]
    fn test_empty_plan_reports_no_content() {
        let mut session = Session::default();
        assert_eq!(session.start(level(None)), Ok(StartOutcome::NoWaveContent));
        assert_eq!(session.wave_phase(), WavePhase::AllWavesComplete);
        assert_eq!(session.call_wave(), Err(GameError::NoWavesRemaining));
        assert!(session.advance(60).is_empty());
        assert_eq!(session.run_state(), RunState::Building);
    }

    #[test]
    fn test_placement_rules() {
        let mut session = Session::default();
        session.start(level(frosh_wave(1))).expect("start");
        let first = session.place_tower(TowerKind::Archer, GridPoint::new(5, 4)).expect("place");
        assert_eq!(session.gold(), 230);
        assert_eq!(
            session.place_tower(TowerKind::Archer, GridPoint::new(5, 4)),
            Err(GameError::SlotOccupied(first))
        );
        assert!(session.place_tower(TowerKind::Cannon, GridPoint::new(9, 4)).is_ok());
        assert_eq!(
            session.place_tower(TowerKind::Cannon, GridPoint::new(13, 4)),
            Err(GameError::InsufficientGold {
                required: 120,
                available: 110
            })
        );
        assert_eq!(session.gold(), 110);
    }

    #[test]
    fn test_upgrade_requires_branch_at_tier_three() {
        let mut session = Session::default();
        let mut def = level(frosh_wave(1));
        def.starting_gold = 1000;
        session.start(def).expect("start");
        let id = session.place_tower(TowerKind::Archer, GridPoint::new(5, 4)).expect("place");
        assert!(matches!(
            session.upgrade_tower(id, Some(Branch::A)),
            Err(GameError::NotUpgradable { .. })
        ));
        assert_eq!(session.upgrade_tower(id, None), Ok(TowerTier::Two));
        assert_eq!(session.upgrade_tower(id, None), Ok(TowerTier::Three));
        assert!(session.upgrade_tower(id, None).is_err());
        assert_eq!(session.upgrade_tower(id, Some(Branch::B)), Ok(TowerTier::FourB));
        // 70 + 40 + 50 + 90 spent.
        assert_eq!(session.gold(), 750);
        assert_eq!(session.sell_tower(id), Ok(150));
    }

    #[test]
    fn test_pause_requires_active_battle() {
        let mut session = Session::default();
        session.start(level(frosh_wave(3))).expect("start");
        assert_eq!(session.pause(), Err(GameError::BattleNotRunning));
        assert_eq!(session.call_wave(), Ok(0));
        assert!(session.pause().is_ok());
        let hash = session.state_hash();
        assert!(session.tick().is_empty());
        assert_eq!(session.state_hash(), hash);
        assert!(session.resume().is_ok());
        assert_eq!(session.run_state(), RunState::Active);
    }

    #[test]
    fn test_barracks_deploys_and_sell_retires_troops() {
        let mut session = Session::default();
        session.start(level(frosh_wave(1))).expect("start");
        let id = session.place_tower(TowerKind::Barracks, GridPoint::new(5, 4)).expect("place");
        assert_eq!(session.field().troops_of(Producer::Tower(id)).len(), 3);
        let refund = session.sell_tower(id).expect("sell");
        assert_eq!(refund, 48);
        assert!(session.field().troops.is_empty());
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut session = Session::default();
        session.start(level(frosh_wave(5))).expect("start");
        let _ = session.place_tower(TowerKind::Archer, GridPoint::new(5, 4));
        let _ = session.call_wave();
        let _ = session.advance(90);
        session.reset(ResetOptions::retry()).expect("reset");
        let once = session.state_hash();
        session.reset(ResetOptions::retry()).expect("reset");
        assert_eq!(session.state_hash(), once);
        assert_eq!(session.pending_timers(), 0);
        assert_eq!(session.gold(), 300);
        assert_eq!(session.history().attempts, 1);
    }
}
