//! Special objective state machines.
//!
//! - Beacon: stage derived every tick from the number of towers in its aura.
//! - Vault: hit points; `Destroyed` is terminal for the session.
//! - Shrine: `Idle` then `Healing` for the tail of every cycle.
//! - Barracks: `Idle -> Preparing -> Spawning -> Idle`, deploying a squad
//!   on entering `Spawning`.

use crate::components::{
    AuraBuff, BarracksPhase, EntityId, Health, Objective, ObjectiveState, ParticleKind, Producer,
    ShrinePhase, UnitProfile, VaultState,
};
use crate::data::{ObjectiveKind, ObjectivePlacement, Tuning};
use crate::events::{ObjectiveEvent, TickEvents};
use crate::geometry::formation_offsets;
use crate::math::{percent, Fixed};
use crate::timer::SimTime;
use crate::world::Battlefield;

use super::TickContext;

/// Beacon power stage for a tower count: 0, 1-2, 3-4, 5+.
#[must_use]
pub const fn beacon_stage(towers: usize) -> u8 {
    match towers {
        0 => 0,
        1 | 2 => 1,
        3 | 4 => 2,
        _ => 3,
    }
}

fn millis(ms: u32) -> SimTime {
    SimTime::from_millis(u64::from(ms))
}

impl Objective {
    /// Objective in its initial state.
    #[must_use]
    pub fn new(placement: &ObjectivePlacement, tuning: &Tuning, now: SimTime) -> Self {
        let state = match placement.kind {
            ObjectiveKind::Beacon => ObjectiveState::Beacon {
                stage: 0,
                towers_in_range: 0,
            },
            ObjectiveKind::Vault => ObjectiveState::Vault {
                health: Health::new(placement.hp.unwrap_or(tuning.vault_hp).max(1)),
                state: VaultState::Intact,
            },
            ObjectiveKind::Shrine => ObjectiveState::Shrine {
                phase: ShrinePhase::Idle,
                cycle_start: now,
                heal_carry: Fixed::ZERO,
            },
            ObjectiveKind::Barracks => ObjectiveState::Barracks {
                phase: BarracksPhase::Idle,
                phase_start: now,
            },
        };
        Self {
            kind: placement.kind,
            position: placement.position.to_world(),
            state,
        }
    }

    /// Current beacon stage, 0 for other kinds.
    #[must_use]
    pub const fn beacon_stage(&self) -> u8 {
        match self.state {
            ObjectiveState::Beacon { stage, .. } => stage,
            _ => 0,
        }
    }

    /// Whether this is a vault that still stands.
    #[must_use]
    pub const fn is_vault_intact(&self) -> bool {
        matches!(
            self.state,
            ObjectiveState::Vault {
                state: VaultState::Intact,
                ..
            }
        )
    }

    /// Vault hit points.
    #[must_use]
    pub const fn vault_health(&self) -> Option<Health> {
        match self.state {
            ObjectiveState::Vault { health, .. } => Some(health),
            _ => None,
        }
    }

    /// Bounty bonus granted while an intact vault stands, in percent.
    #[must_use]
    pub const fn bounty_bonus_pct(&self, tuning: &Tuning) -> u32 {
        if self.is_vault_intact() {
            tuning.vault_bounty_bonus_pct
        } else {
            0
        }
    }

    /// Damage a vault. Other objectives and destroyed vaults ignore it.
    ///
    /// Returns `VaultDestroyed` on the hit that empties it, `VaultDamaged`
    /// otherwise.
    pub fn damage(&mut self, amount: u32) -> Option<ObjectiveEvent> {
        let ObjectiveState::Vault { health, state } = &mut self.state else {
            return None;
        };
        if *state == VaultState::Destroyed {
            return None;
        }
        let _ = health.apply_damage(amount);
        if health.is_dead() {
            *state = VaultState::Destroyed;
            tracing::info!("Vault destroyed");
            Some(ObjectiveEvent::VaultDestroyed)
        } else {
            Some(ObjectiveEvent::VaultDamaged {
                remaining: health.current,
            })
        }
    }
}

/// Advance the level objective by one tick.
pub fn update_objective(field: &mut Battlefield, ctx: &TickContext<'_>, events: &mut TickEvents) {
    let Some(kind) = field.objective.as_ref().map(|o| o.kind) else {
        return;
    };
    match kind {
        ObjectiveKind::Beacon => update_beacon(field, ctx, events),
        ObjectiveKind::Shrine => update_shrine(field, ctx, events),
        ObjectiveKind::Barracks => update_barracks(field, ctx, events),
        ObjectiveKind::Vault => {}
    }
}

fn update_beacon(field: &mut Battlefield, ctx: &TickContext<'_>, events: &mut TickEvents) {
    let tuning = ctx.tuning();
    let Some(objective) = field.objective.as_mut() else {
        return;
    };
    let radius = Fixed::from_num(tuning.beacon_radius);
    let center = objective.position;

    let in_range = field
        .towers
        .values()
        .filter(|t| center.within(t.position, radius))
        .count();
    let stage = beacon_stage(in_range);
    if let ObjectiveState::Beacon {
        stage: current,
        towers_in_range,
    } = &mut objective.state
    {
        if *current != stage {
            tracing::debug!(from = *current, to = stage, "Beacon stage changed");
            events.objective.push(ObjectiveEvent::BeaconStage(stage));
        }
        *current = stage;
        *towers_in_range = in_range;
    }

    let bonus = percent(tuning.beacon_stage_bonus_pct) * Fixed::from_num(stage);
    let buff = AuraBuff {
        damage: Fixed::ONE + bonus,
        cooldown: (Fixed::ONE - bonus / 2).max(percent(50)),
    };
    for tower in field.towers.values_mut() {
        tower.aura = if stage > 0 && center.within(tower.position, radius) {
            buff
        } else {
            AuraBuff::default()
        };
    }
}

fn update_shrine(field: &mut Battlefield, ctx: &TickContext<'_>, events: &mut TickEvents) {
    let tuning = ctx.tuning();
    let cycle = millis(tuning.shrine_cycle_ms.max(1));
    let heal_window = millis(tuning.shrine_heal_ms.min(tuning.shrine_cycle_ms));
    let Some(objective) = field.objective.as_mut() else {
        return;
    };
    let center = objective.position;
    let ObjectiveState::Shrine {
        phase,
        cycle_start,
        heal_carry,
    } = &mut objective.state
    else {
        return;
    };

    while ctx.now.saturating_sub(*cycle_start) >= cycle {
        *cycle_start += cycle;
    }
    let elapsed = ctx.now.saturating_sub(*cycle_start);
    let next = if elapsed.units() + heal_window.units() >= cycle.units() {
        ShrinePhase::Healing
    } else {
        ShrinePhase::Idle
    };
    let entered_healing = next == ShrinePhase::Healing && *phase != ShrinePhase::Healing;
    if next != *phase {
        events.objective.push(ObjectiveEvent::ShrinePhase(next));
        *phase = next;
    }
    if next == ShrinePhase::Idle {
        *heal_carry = Fixed::ZERO;
        return;
    }

    *heal_carry += Fixed::from_num(tuning.shrine_heal_per_sec) * ctx.dt;
    let whole = heal_carry.to_num::<u32>();
    *heal_carry -= Fixed::from_num(whole);

    let radius = Fixed::from_num(tuning.shrine_radius);
    if whole > 0 {
        for troop in field.troops.values_mut() {
            if center.within(troop.position, radius) {
                let _ = troop.health.heal(whole);
            }
        }
        if let Some(hero) = field.hero.as_mut().filter(|h| center.within(h.position, radius)) {
            let _ = hero.health.heal(whole);
        }
    }
    if entered_healing {
        field.emit_particle(ParticleKind::Heal, center, ctx.after_ms(tuning.particle_ms));
    }
}

fn update_barracks(field: &mut Battlefield, ctx: &TickContext<'_>, events: &mut TickEvents) {
    let tuning = ctx.tuning();
    let Some(objective) = field.objective.as_mut() else {
        return;
    };
    let center = objective.position;
    let ObjectiveState::Barracks { phase, phase_start } = &mut objective.state else {
        return;
    };

    let elapsed = ctx.now.saturating_sub(*phase_start);
    let next = match *phase {
        BarracksPhase::Idle if elapsed >= millis(tuning.barracks_idle_ms) => BarracksPhase::Preparing,
        BarracksPhase::Preparing if elapsed >= millis(tuning.barracks_prepare_ms) => BarracksPhase::Spawning,
        BarracksPhase::Spawning => BarracksPhase::Idle,
        current => current,
    };
    if next == *phase {
        return;
    }
    *phase = next;
    *phase_start = ctx.now;
    if next != BarracksPhase::Spawning {
        return;
    }

    let Ok(stats) = ctx.data.troop(tuning.barracks_troop) else {
        tracing::warn!(troop = ?tuning.barracks_troop, "Barracks troop has no stats");
        return;
    };
    let profile = UnitProfile::from(stats);
    let squad = usize::try_from(tuning.barracks_squad.max(1)).unwrap_or(1);
    let cap = usize::try_from(tuning.barracks_cap).unwrap_or(squad);
    let offsets = formation_offsets(squad, Fixed::from_num(tuning.formation_spacing));
    let deployed: Vec<EntityId> = offsets
        .into_iter()
        .enumerate()
        .map(|(slot, offset)| {
            field.deploy_troop(
                tuning.barracks_troop,
                profile,
                center + offset,
                Producer::Objective,
                slot,
                cap,
                ctx.now,
            )
        })
        .collect();
    tracing::debug!(count = deployed.len(), "Barracks deployed squad");
    events.objective.push(ObjectiveEvent::BarracksDeployed(deployed));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Tower;
    use crate::data::{GameData, LevelDefinition, TowerKind, TowerTier};
    use crate::geometry::GridPoint;
    use crate::world::LoadedLevel;

    fn placement(kind: ObjectiveKind, hp: Option<u32>) -> ObjectivePlacement {
        ObjectivePlacement {
            kind,
            position: GridPoint::new(5, 5),
            hp,
        }
    }

    fn level(data: &GameData) -> LoadedLevel {
        let definition = LevelDefinition {
            id: "objectives".to_string(),
            name: String::new(),
            primary_path: vec![GridPoint::new(0, 0), GridPoint::new(10, 0)],
            secondary_path: None,
            hero_spawn: GridPoint::new(1, 1),
            hero: None,
            objective: None,
            hazards: Vec::new(),
            starting_gold: 0,
            starting_lives: 5,
            waves: None,
            build_slots: Vec::new(),
            wave_gap_ms: 0,
        };
        LoadedLevel::load(definition, data).expect("load")
    }

    fn ctx<'a>(level: &'a LoadedLevel, data: &'a GameData, now_ms: u64) -> TickContext<'a> {
        TickContext {
            now: SimTime::from_millis(now_ms),
            dt: SimTime::FRAME.as_seconds(),
            level,
            data,
        }
    }

    #[test]
    fn test_beacon_stage_table() {
        let stages: Vec<u8> = (0..7).map(beacon_stage).collect();
        assert_eq!(stages, vec![0, 1, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn test_vault_destroyed_exactly_on_fifth_hit() {
        let tuning = Tuning::default();
        let mut vault = Objective::new(&placement(ObjectiveKind::Vault, Some(800)), &tuning, SimTime::ZERO);
        for hit in 1..=4 {
            assert_eq!(
                vault.damage(200),
                Some(ObjectiveEvent::VaultDamaged {
                    remaining: 800 - 200 * hit
                })
            );
            assert!(vault.is_vault_intact());
        }
        assert_eq!(vault.damage(200), Some(ObjectiveEvent::VaultDestroyed));
        assert!(!vault.is_vault_intact());
        assert_eq!(vault.damage(200), None);
        assert_eq!(vault.bounty_bonus_pct(&tuning), 0);
    }

    #[test]
    fn test_beacon_buffs_towers_in_range() {
        let data = GameData::builtin();
        let level = level(&data);
        let mut field = Battlefield::new();
        field.objective = Some(Objective::new(&placement(ObjectiveKind::Beacon, None), &data.tuning, SimTime::ZERO));
        let stats = data.tower(TowerKind::Archer, TowerTier::One).expect("stats");
        let near = GridPoint::new(6, 5).to_world();
        let far = GridPoint::new(30, 30).to_world();
        for position in [near, near, near, far] {
            let id = field.allocate_id();
            let _ = field
                .towers
                .insert(id, Tower::new(id, TowerKind::Archer, position, stats, position, SimTime::ZERO));
        }

        let mut events = TickEvents::default();
        update_objective(&mut field, &ctx(&level, &data, 0), &mut events);
        assert_eq!(field.objective.as_ref().map(Objective::beacon_stage), Some(2));
        assert_eq!(events.objective, vec![ObjectiveEvent::BeaconStage(2)]);
        let buffed = field.towers.values().filter(|t| t.aura.damage > Fixed::ONE).count();
        assert_eq!(buffed, 3);
    }

    #[test]
    fn test_shrine_cycles_and_heals() {
        let data = GameData::builtin();
        let level = level(&data);
        let tuning = &data.tuning;
        let mut field = Battlefield::new();
        let shrine = Objective::new(&placement(ObjectiveKind::Shrine, None), tuning, SimTime::ZERO);
        let center = shrine.position;
        field.objective = Some(shrine);
        let profile = UnitProfile::from(data.troop(tuning.barracks_troop).expect("stats"));
        let troop = field.deploy_troop(tuning.barracks_troop, profile, center, Producer::Objective, 0, 4, SimTime::ZERO);
        if let Some(t) = field.troops.get_mut(troop) {
            t.health.current = 1;
        }

        let heal_start = u64::from(tuning.shrine_cycle_ms - tuning.shrine_heal_ms);
        let mut events = TickEvents::default();
        update_objective(&mut field, &ctx(&level, &data, heal_start - 1), &mut events);
        assert!(events.objective.is_empty());

        // One simulated second of healing.
        for frame in 0..60 {
            update_objective(&mut field, &ctx(&level, &data, heal_start + frame * 16), &mut events);
        }
        assert_eq!(events.objective, vec![ObjectiveEvent::ShrinePhase(ShrinePhase::Healing)]);
        let healed = field.troops.get(troop).map(|t| t.health.current).unwrap_or_default();
        assert!(healed > 1 && healed <= 1 + tuning.shrine_heal_per_sec);

        update_objective(&mut field, &ctx(&level, &data, u64::from(tuning.shrine_cycle_ms)), &mut events);
        assert_eq!(events.objective.last(), Some(&ObjectiveEvent::ShrinePhase(ShrinePhase::Idle)));
    }

    #[test]
    fn test_barracks_cycle_respects_cap() {
        let data = GameData::builtin();
        let level = level(&data);
        let tuning = &data.tuning;
        let mut field = Battlefield::new();
        field.objective = Some(Objective::new(&placement(ObjectiveKind::Barracks, None), tuning, SimTime::ZERO));

        let idle = u64::from(tuning.barracks_idle_ms);
        let prepare = u64::from(tuning.barracks_prepare_ms);
        let mut events = TickEvents::default();
        let mut now = 0;
        for _ in 0..5 {
            now += idle;
            update_objective(&mut field, &ctx(&level, &data, now), &mut events);
            now += prepare;
            update_objective(&mut field, &ctx(&level, &data, now), &mut events);
            now += 16;
            update_objective(&mut field, &ctx(&level, &data, now), &mut events);
        }
        let deployments = events
            .objective
            .iter()
            .filter(|e| matches!(e, ObjectiveEvent::BarracksDeployed(_)))
            .count();
        assert_eq!(deployments, 5);
        let cap = usize::try_from(tuning.barracks_cap).expect("cap");
        assert_eq!(field.troops_of(Producer::Objective).len(), cap);
    }
}
