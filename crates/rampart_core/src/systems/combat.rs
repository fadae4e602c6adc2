//! Targeting and combat resolution.
//!
//! Every attacker keeps a cooldown timestamp and acts on ticks where
//! `now >= next_attack`. Cross-entity references (projectile to target,
//! taunt to hero) are ids; a referent that vanished is a silent no-op.

use std::collections::BTreeSet;

use crate::components::{
    EntityId, EntityStorage, Enemy, Hero, HitPayload, ParticleKind, Projectile, Taunt, Troop,
};
use crate::data::OnHitEffect;
use crate::events::{DamageEvent, DamageSource, TickEvents};
use crate::math::{percent, Fixed, Vec2Fixed};
use crate::timer::SimTime;
use crate::world::Battlefield;

use super::TickContext;

/// Damage after armor: `raw * (1 - armor)`, truncated.
///
/// A positive raw hit always deals at least 1.
#[must_use]
pub fn effective_damage(raw: Fixed, armor: Fixed) -> u32 {
    if raw <= Fixed::ZERO {
        return 0;
    }
    let reduced = raw * (Fixed::ONE - armor.clamp(Fixed::ZERO, Fixed::ONE));
    reduced.saturating_to_num::<u32>().max(1)
}

/// Best enemy in range of `origin`.
///
/// Highest path progress wins, then lowest remaining hp, then lowest id.
/// Flying enemies are only candidates when `targets_air` is set. The range
/// check is inclusive.
#[must_use]
pub fn select_target(
    enemies: &EntityStorage<Enemy>,
    origin: Vec2Fixed,
    range: Fixed,
    targets_air: bool,
) -> Option<EntityId> {
    let mut best: Option<(Fixed, u32, EntityId)> = None;
    for enemy in enemies.values() {
        if !enemy.is_active()
            || (enemy.profile.flying && !targets_air)
            || !origin.within(enemy.position, range)
        {
            continue;
        }
        let better = match best {
            None => true,
            Some((progress, hp, _)) => {
                enemy.progress > progress
                    || (enemy.progress == progress && enemy.health.current < hp)
            }
        };
        if better {
            best = Some((enemy.progress, enemy.health.current, enemy.id));
        }
    }
    best.map(|(_, _, id)| id)
}

fn apply_on_hit(enemy: &mut Enemy, effect: OnHitEffect, ctx: &TickContext<'_>) {
    let tuning = ctx.tuning();
    match effect {
        OnHitEffect::Slow { pct, duration_ms } => {
            let factor = Fixed::ONE - percent(pct.min(95));
            enemy.status.apply_slow(factor, ctx.after_ms(duration_ms), ctx.now);
        }
        OnHitEffect::Freeze { duration_ms } => enemy.status.apply_freeze(ctx.after_ms(duration_ms)),
        OnHitEffect::Stun { duration_ms } => enemy.status.apply_stun(ctx.after_ms(duration_ms)),
        OnHitEffect::Burn { dps, duration_ms } => enemy.status.apply_burn(
            dps,
            ctx.after_ms(duration_ms),
            ctx.after_ms(tuning.burn_interval_ms.max(1)),
            tuning.burn_max_stacks,
        ),
    }
}

/// Apply one hit to one enemy. Returns hp actually removed.
fn strike_enemy(
    field: &mut Battlefield,
    ctx: &TickContext<'_>,
    source: DamageSource,
    target: EntityId,
    raw: Fixed,
    on_hit: Option<OnHitEffect>,
    events: &mut TickEvents,
) -> u32 {
    let Some(enemy) = field.enemies.get_mut(target).filter(|e| e.is_active()) else {
        return 0;
    };
    let amount = effective_damage(raw, enemy.profile.armor);
    let dealt = enemy.health.apply_damage(amount);
    if let Some(effect) = on_hit {
        apply_on_hit(enemy, effect, ctx);
    }
    let died_at = enemy.health.is_dead().then_some(enemy.position);
    events.damage.push(DamageEvent {
        source,
        target,
        amount: dealt,
    });
    if let Some(position) = died_at {
        let expires = ctx.after_ms(ctx.tuning().particle_ms);
        field.emit_particle(ParticleKind::Death, position, expires);
    }
    dealt
}

/// Resolve a hit landing at `impact`.
///
/// Candidates are enumerated once, before any damage is applied, and each
/// enemy is hit at most once per resolution. Splash damage falls off
/// linearly from full at the center to the edge multiplier at the radius.
/// Chains start at `primary` (even when this blow killed it) and jump to
/// the nearest unhit enemy, multiplying damage by the falloff per hop.
/// A `None` primary means the target vanished; only splash still applies.
pub fn resolve_hit(
    field: &mut Battlefield,
    ctx: &TickContext<'_>,
    source: DamageSource,
    primary: Option<EntityId>,
    impact: Vec2Fixed,
    payload: &HitPayload,
    events: &mut TickEvents,
) {
    let candidates: Vec<(EntityId, Vec2Fixed, bool)> = field
        .enemies
        .values()
        .filter(|e| e.is_active())
        .map(|e| (e.id, e.position, e.profile.flying))
        .collect();
    let primary = primary.filter(|id| candidates.iter().any(|c| c.0 == *id));
    let reachable = |id: EntityId, flying: bool| Some(id) == primary || !flying || payload.targets_air;

    let mut hits: Vec<(EntityId, Fixed)> = Vec::new();
    if let Some(splash) = payload.splash {
        for &(id, position, flying) in &candidates {
            if !reachable(id, flying) {
                continue;
            }
            let distance = position.distance(impact);
            if distance > splash.radius {
                continue;
            }
            let falloff = (Fixed::ONE - splash.edge) * distance / splash.radius.max(Fixed::ONE);
            hits.push((id, payload.damage * (Fixed::ONE - falloff)));
        }
        field.emit_particle(ParticleKind::Explosion, impact, ctx.after_ms(ctx.tuning().particle_ms));
    } else if let Some(id) = primary {
        hits.push((id, payload.damage));
        field.emit_particle(ParticleKind::Impact, impact, ctx.after_ms(ctx.tuning().particle_ms));
    }

    let mut struck = BTreeSet::new();
    for (id, raw) in hits {
        if struck.insert(id) {
            let _ = strike_enemy(field, ctx, source, id, raw, payload.on_hit, events);
        }
    }

    let (Some(chain), Some(start)) = (payload.chain, primary) else {
        return;
    };
    let Some(mut cursor) = candidates.iter().find(|c| c.0 == start).map(|c| c.1) else {
        return;
    };
    let _ = struck.insert(start);
    let mut raw = payload.damage;
    for _ in 0..chain.max_hops {
        raw *= chain.falloff;
        let next = candidates
            .iter()
            .filter(|(id, position, flying)| {
                !struck.contains(id)
                    && (!flying || payload.targets_air)
                    && cursor.within(*position, chain.hop_radius)
            })
            .min_by_key(|(id, position, _)| (cursor.distance_squared(*position), *id));
        let Some(&(id, position, _)) = next else {
            break;
        };
        let _ = struck.insert(id);
        let _ = strike_enemy(field, ctx, source, id, raw, payload.on_hit, events);
        field.emit_particle(ParticleKind::Arc, position, ctx.after_ms(ctx.tuning().particle_ms));
        cursor = position;
    }
}

fn scaled_cooldown(cooldown: SimTime, multiplier: Fixed) -> SimTime {
    let units = Fixed::from_num(cooldown.units()) * multiplier;
    SimTime::from_units(units.saturating_to_num::<u64>().max(1))
}

/// Towers acquire targets and fire.
///
/// A tower with no target in range stays ready and fires the moment one
/// enters. Instant towers resolve the hit now; others launch a projectile.
pub fn run_towers(field: &mut Battlefield, ctx: &TickContext<'_>, events: &mut TickEvents) {
    for id in field.towers.sorted_ids() {
        let Some(tower) = field.towers.get(id) else {
            continue;
        };
        if !tower.profile.is_offensive() || ctx.now < tower.next_attack {
            continue;
        }
        let Some(target) = select_target(
            &field.enemies,
            tower.position,
            tower.profile.range,
            tower.profile.targets_air,
        ) else {
            continue;
        };
        let Some(target_position) = field.enemy_position(target) else {
            continue;
        };
        let payload = tower.profile.payload(tower.aura.damage);
        let origin = tower.position;
        let speed = tower.profile.projectile_speed;
        let cooldown = scaled_cooldown(tower.profile.cooldown, tower.aura.cooldown);
        if let Some(tower) = field.towers.get_mut(id) {
            tower.next_attack = ctx.now + cooldown;
        }

        match speed {
            None => resolve_hit(
                field,
                ctx,
                DamageSource::Tower(id),
                Some(target),
                target_position,
                &payload,
                events,
            ),
            Some(speed) => {
                let projectile_id = field.allocate_id();
                let _ = field.projectiles.insert(
                    projectile_id,
                    Projectile {
                        id: projectile_id,
                        source: id,
                        target,
                        position: origin,
                        aim: target_position,
                        speed,
                        payload,
                    },
                );
            }
        }
    }
}

/// Projectiles home on their target and resolve on arrival.
///
/// If the target is gone, splash projectiles continue to the last known
/// position and detonate there; single-target projectiles fizzle.
pub fn run_projectiles(field: &mut Battlefield, ctx: &TickContext<'_>, events: &mut TickEvents) {
    for id in field.projectiles.sorted_ids() {
        let Some(mut projectile) = field.projectiles.remove(id) else {
            continue;
        };
        let live_target = field.enemy_position(projectile.target);
        match live_target {
            Some(position) => projectile.aim = position,
            None if projectile.payload.splash.is_none() => continue,
            None => {}
        }

        let step = projectile.speed * ctx.dt;
        if projectile.position.within(projectile.aim, step) {
            let primary = live_target.map(|_| projectile.target);
            resolve_hit(
                field,
                ctx,
                DamageSource::Tower(projectile.source),
                primary,
                projectile.aim,
                &projectile.payload,
                events,
            );
        } else {
            projectile.position = projectile.position.move_towards(projectile.aim, step);
            let _ = field.projectiles.insert(id, projectile);
        }
    }
}

fn defender_target(
    enemies: &EntityStorage<Enemy>,
    position: Vec2Fixed,
    range: Fixed,
    ranged: bool,
    engaged: Option<EntityId>,
) -> Option<EntityId> {
    let preferred = engaged.and_then(|id| enemies.get(id)).filter(|e| {
        e.is_active() && (ranged || !e.profile.flying) && position.within(e.position, range)
    });
    preferred
        .map(|e| e.id)
        .or_else(|| select_target(enemies, position, range, ranged))
}

/// Troops and the hero strike enemies in range.
///
/// The engaged enemy is preferred; otherwise the usual tie-break applies.
/// Melee defenders cannot reach flying enemies.
pub fn run_defenders(field: &mut Battlefield, ctx: &TickContext<'_>, events: &mut TickEvents) {
    for id in field.troops.sorted_ids() {
        let Some(troop) = field.troops.get(id) else {
            continue;
        };
        if ctx.now < troop.next_attack || troop.profile.damage == 0 {
            continue;
        }
        let Troop {
            position,
            profile,
            engaged,
            ..
        } = troop;
        let Some(target) = defender_target(&field.enemies, *position, profile.range, profile.ranged, *engaged)
        else {
            continue;
        };
        let raw = Fixed::from_num(profile.damage);
        let cooldown = profile.cooldown;
        if let Some(troop) = field.troops.get_mut(id) {
            troop.next_attack = ctx.now + cooldown;
        }
        let _ = strike_enemy(field, ctx, DamageSource::Troop(id), target, raw, None, events);
    }

    let Some(Hero {
        id,
        position,
        profile,
        engaged,
        next_attack,
        ..
    }) = field.hero.clone()
    else {
        return;
    };
    if ctx.now < next_attack {
        return;
    }
    let Some(target) = defender_target(&field.enemies, position, profile.range, profile.ranged, engaged) else {
        return;
    };
    if let Some(hero) = field.hero.as_mut() {
        hero.next_attack = ctx.now + profile.cooldown;
    }
    let raw = Fixed::from_num(profile.damage);
    let _ = strike_enemy(field, ctx, DamageSource::Hero(id), target, raw, None, events);
}

/// Enemies with an attack strike back.
///
/// Objective-hitters go for an intact vault in reach first. Otherwise the
/// nearest troop or hero in range is hit, ties to the lowest id. Frozen or
/// stunned enemies do not attack.
pub fn run_enemy_attacks(field: &mut Battlefield, ctx: &TickContext<'_>, events: &mut TickEvents) {
    for id in field.enemies.sorted_ids() {
        let Some(enemy) = field.enemies.get(id) else {
            continue;
        };
        let Some(attack) = enemy.profile.attack else {
            continue;
        };
        if !enemy.is_active() || ctx.now < enemy.next_attack || !enemy.status.can_attack(ctx.now) {
            continue;
        }
        let position = enemy.position;
        let hits_objectives = enemy.profile.hits_objectives;

        let mut struck = false;
        if hits_objectives {
            if let Some(objective) = field
                .objective
                .as_mut()
                .filter(|o| o.is_vault_intact() && position.within(o.position, attack.range))
            {
                if let Some(event) = objective.damage(attack.damage) {
                    events.objective.push(event);
                }
                struck = true;
            }
        }

        if !struck {
            let troop_target = field
                .troops
                .values()
                .filter(|t| !t.health.is_dead() && position.within(t.position, attack.range))
                .map(|t| (position.distance_squared(t.position), t.id, t.profile.armor));
            let hero_target = field
                .hero
                .as_ref()
                .filter(|h| !h.health.is_dead() && position.within(h.position, attack.range))
                .map(|h| (position.distance_squared(h.position), h.id, h.profile.armor));
            let target = troop_target
                .chain(hero_target)
                .min_by_key(|(dist, target_id, _)| (*dist, *target_id));
            if let Some((_, target_id, armor)) = target {
                let amount = effective_damage(Fixed::from_num(attack.damage), armor);
                let dealt = if let Some(troop) = field.troops.get_mut(target_id) {
                    troop.health.apply_damage(amount)
                } else if let Some(hero) = field.hero.as_mut().filter(|h| h.id == target_id) {
                    hero.health.apply_damage(amount)
                } else {
                    0
                };
                events.damage.push(DamageEvent {
                    source: DamageSource::Enemy(id),
                    target: target_id,
                    amount: dealt,
                });
                struck = true;
            }
        }

        if struck {
            if let Some(enemy) = field.enemies.get_mut(id) {
                enemy.next_attack = ctx.now + attack.cooldown;
            }
        }
    }
}

/// Burn pulses at a fixed interval, independent of any attacker cooldown.
///
/// Each pulse deals `stacks * dps * interval` and ignores armor.
pub fn run_burns(field: &mut Battlefield, ctx: &TickContext<'_>, events: &mut TickEvents) {
    let interval_ms = ctx.tuning().burn_interval_ms.max(1);
    let interval = SimTime::from_millis(u64::from(interval_ms));
    let pulse_seconds = interval.as_seconds();
    for enemy in field.enemies.values_mut() {
        if !enemy.is_active() {
            continue;
        }
        let Some(mut burn) = enemy.status.burn else {
            continue;
        };
        while burn.next_pulse <= ctx.now && burn.next_pulse <= burn.until && !enemy.health.is_dead() {
            let raw = Fixed::from_num(burn.dps.saturating_mul(burn.stacks)) * pulse_seconds;
            let amount = raw.saturating_to_num::<u32>().max(1);
            let dealt = enemy.health.apply_damage(amount);
            events.damage.push(DamageEvent {
                source: DamageSource::Burn,
                target: enemy.id,
                amount: dealt,
            });
            burn.next_pulse += interval;
        }
        enemy.status.burn = Some(burn);
        enemy.status.expire(ctx.now);
    }
}

/// Start the hero's taunt: ground enemies in radius are pulled toward the
/// hero and hold their path progress until it ends.
///
/// Returns how many enemies were taunted, or `None` without a hero.
pub fn activate_taunt(field: &mut Battlefield, now: SimTime) -> Option<usize> {
    let hero = field.hero.as_mut()?;
    hero.taunt_until = now + hero.taunt.duration;
    hero.ability_ready_at = now + hero.taunt.cooldown;
    let (hero_id, position, radius) = (hero.id, hero.position, hero.taunt.radius);

    let mut taunted = 0;
    for enemy in field.enemies.values_mut() {
        if enemy.is_active() && !enemy.profile.flying && position.within(enemy.position, radius) {
            if enemy.taunt.is_none() {
                enemy.taunt = Some(Taunt {
                    source: hero_id,
                    offset: Vec2Fixed::ZERO,
                });
            }
            taunted += 1;
        }
    }
    tracing::debug!(hero = hero_id, taunted, "Taunt activated");
    Some(taunted)
}

/// Cast the taunt automatically when it is ready and a ground enemy is close.
pub fn auto_cast(field: &mut Battlefield, ctx: &TickContext<'_>) {
    if !ctx.tuning().hero_auto_ability {
        return;
    }
    let Some(hero) = &field.hero else {
        return;
    };
    if ctx.now < hero.ability_ready_at {
        return;
    }
    let (position, radius) = (hero.position, hero.taunt.radius);
    let threatened = field
        .enemies
        .values()
        .any(|e| e.is_active() && !e.profile.flying && position.within(e.position, radius));
    if threatened {
        let _ = activate_taunt(field, ctx.now);
    }
}

/// Remove enemies whose hp reached zero.
pub fn reap_enemies(field: &mut Battlefield) -> Vec<Enemy> {
    let dead: Vec<EntityId> = field
        .enemies
        .values()
        .filter(|e| e.health.is_dead())
        .map(|e| e.id)
        .collect();
    dead.into_iter()
        .filter_map(|id| field.enemies.remove(id))
        .collect()
}

/// Remove fallen troops, and the hero if it fell.
pub fn reap_defenders(field: &mut Battlefield) -> (Vec<Troop>, Option<Hero>) {
    let dead: Vec<EntityId> = field
        .troops
        .values()
        .filter(|t| t.health.is_dead())
        .map(|t| t.id)
        .collect();
    let troops = dead
        .into_iter()
        .filter_map(|id| field.troops.remove(id))
        .collect();
    let hero = if field.hero.as_ref().is_some_and(|h| h.health.is_dead()) {
        field.hero.take()
    } else {
        None
    };
    (troops, hero)
}
