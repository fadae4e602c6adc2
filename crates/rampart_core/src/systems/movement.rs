//! Movement of enemies along their routes and of defenders around the field.

use std::collections::BTreeMap;

use crate::components::{EffectKind, EntityId};
use crate::geometry::separation_push;
use crate::math::{Fixed, Vec2Fixed};
use crate::world::Battlefield;

use super::TickContext;

/// Advances every enemy along its route.
///
/// Progress grows by `speed * speed_modifier * slow * dt` where `slow` is the
/// strongest of the status slow, the hazard slow and any slow field covering
/// the enemy. Frozen and taunted enemies hold their progress. The drawn
/// position is the on-path point plus the taunt and knockback offsets.
///
/// Returns enemies that reached the goal this tick. Each enemy is reported
/// once: the `reached_goal` flag guards against double counting.
pub fn move_enemies(field: &mut Battlefield, ctx: &TickContext<'_>) -> Vec<EntityId> {
    let now = ctx.now;
    let taunter = field
        .hero
        .as_ref()
        .filter(|h| h.taunt_active(now))
        .map(|h| (h.id, h.position, h.taunt.pull, h.profile.speed));
    let slow_fields: Vec<(Vec2Fixed, Fixed, Fixed)> = field
        .effects
        .values()
        .filter(|e| now < e.until)
        .map(|e| match e.kind {
            EffectKind::SlowField { factor, radius } => (e.position, radius, factor),
        })
        .collect();
    let decay = Fixed::from_num(ctx.tuning().knockback_decay) * ctx.dt;

    let mut escaped = Vec::new();
    for enemy in field.enemies.values_mut() {
        if !enemy.is_active() {
            continue;
        }
        enemy.status.expire(now);
        let path = ctx.level.path(enemy.path);

        if let Some(taunt) = enemy.taunt {
            if taunter.map(|t| t.0) != Some(taunt.source) {
                enemy.taunt = None;
            }
        }

        let held = enemy.status.is_frozen(now) || enemy.taunt.is_some();
        if !held {
            let field_slow = slow_fields
                .iter()
                .filter(|(center, radius, _)| center.within(enemy.position, *radius))
                .map(|(_, _, factor)| *factor)
                .min()
                .unwrap_or(Fixed::ONE);
            let slow = enemy
                .status
                .slow_factor(now)
                .min(enemy.hazard_slow)
                .min(field_slow);
            let distance = enemy.profile.speed * enemy.speed_modifier * slow * ctx.dt;
            enemy.progress = path.advance(enemy.progress, distance);
        }

        let on_path = path.position_at(enemy.progress);
        if let (Some(taunt), Some((_, hero_position, pull, speed))) = (enemy.taunt.as_mut(), taunter) {
            let desired = (hero_position - on_path).clamp_length(pull);
            taunt.offset = taunt.offset.move_towards(desired, speed * ctx.dt);
        }

        let knockback_len = enemy.knockback.length();
        enemy.knockback = if knockback_len <= decay {
            Vec2Fixed::ZERO
        } else {
            enemy.knockback.clamp_length(knockback_len - decay)
        };

        let taunt_offset = enemy.taunt.map_or(Vec2Fixed::ZERO, |t| t.offset);
        enemy.position = on_path + taunt_offset + enemy.knockback;

        if path.is_complete(enemy.progress) && !enemy.reached_goal {
            enemy.reached_goal = true;
            escaped.push(enemy.id);
        }
    }
    escaped
}

#[derive(Debug, Clone, Copy)]
struct Defender {
    id: EntityId,
    position: Vec2Fixed,
    rally: Vec2Fixed,
    sight: Fixed,
    range: Fixed,
    speed: Fixed,
    ranged: bool,
}

/// Moves troops and the hero.
///
/// Each defender picks the nearest enemy within sight of its rally point.
/// When several pick the same enemy only the closest engages and the rest
/// return to their formation slots. An engaged defender closes to a firing
/// offset and stops once the enemy is in attack range. Finally every pair of
/// defenders closer than the minimum separation is pushed apart; this pass
/// is quadratic in the defender count.
pub fn move_defenders(field: &mut Battlefield, ctx: &TickContext<'_>) {
    let enemies: Vec<(EntityId, Vec2Fixed, bool)> = field
        .enemies
        .values()
        .filter(|e| e.is_active())
        .map(|e| (e.id, e.position, e.profile.flying))
        .collect();

    let mut defenders: Vec<Defender> = field
        .troops
        .values()
        .map(|t| Defender {
            id: t.id,
            position: t.position,
            rally: t.rally,
            sight: t.profile.sight,
            range: t.profile.range,
            speed: t.profile.speed,
            ranged: t.profile.ranged,
        })
        .collect();
    if let Some(hero) = &field.hero {
        defenders.push(Defender {
            id: hero.id,
            position: hero.position,
            rally: hero.rally,
            sight: hero.profile.sight,
            range: hero.profile.range,
            speed: hero.profile.speed,
            ranged: hero.profile.ranged,
        });
    }
    defenders.sort_by_key(|d| d.id);

    let picks: Vec<Option<(EntityId, Vec2Fixed, Fixed)>> = defenders
        .iter()
        .map(|d| {
            enemies
                .iter()
                .filter(|(_, pos, flying)| (!flying || d.ranged) && d.rally.within(*pos, d.sight))
                .map(|(id, pos, _)| (*id, *pos, d.position.distance_squared(*pos)))
                .min_by_key(|(id, _, dist)| (*dist, *id))
        })
        .collect();

    // Closest claimant per enemy; ties go to the lower defender id.
    let mut claims: BTreeMap<EntityId, (Fixed, EntityId)> = BTreeMap::new();
    for (defender, pick) in defenders.iter().zip(&picks) {
        if let Some((enemy, _, dist)) = pick {
            let entry = claims.entry(*enemy).or_insert((*dist, defender.id));
            if *dist < entry.0 {
                *entry = (*dist, defender.id);
            }
        }
    }

    let mut engaged: Vec<Option<EntityId>> = Vec::with_capacity(defenders.len());
    for (defender, pick) in defenders.iter_mut().zip(&picks) {
        let step = defender.speed * ctx.dt;
        let target = pick.filter(|(enemy, _, _)| claims.get(enemy).map(|c| c.1) == Some(defender.id));
        match target {
            Some((enemy, enemy_position, _)) => {
                if !defender.position.within(enemy_position, defender.range) {
                    let standoff = defender.range * Fixed::from_num(4) / Fixed::from_num(5);
                    let approach = enemy_position
                        + (defender.position - enemy_position).normalize().scale(standoff);
                    defender.position = defender.position.move_towards(approach, step);
                }
                engaged.push(Some(enemy));
            }
            None => {
                defender.position = defender.position.move_towards(defender.rally, step);
                engaged.push(None);
            }
        }
    }

    let min_separation = Fixed::from_num(ctx.tuning().min_separation);
    let mut pushes = vec![Vec2Fixed::ZERO; defenders.len()];
    for i in 0..defenders.len() {
        for j in (i + 1)..defenders.len() {
            let push = separation_push(defenders[i].position, defenders[j].position, min_separation, true);
            pushes[i] += push;
            pushes[j] += -push;
        }
    }

    for ((defender, push), target) in defenders.iter().zip(pushes).zip(engaged) {
        let position = defender.position + push;
        if let Some(troop) = field.troops.get_mut(defender.id) {
            troop.position = position;
            troop.engaged = target;
        } else if let Some(hero) = field.hero.as_mut().filter(|h| h.id == defender.id) {
            hero.position = position;
            hero.engaged = target;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Enemy, EnemyProfile, Producer, UnitProfile};
    use crate::data::{EnemyKind, GameData, LevelDefinition, PathKey, TroopKind};
    use crate::geometry::GridPoint;
    use crate::timer::SimTime;
    use crate::world::LoadedLevel;

    fn level(data: &GameData) -> LoadedLevel {
        let definition = LevelDefinition {
            id: "move".to_string(),
            name: String::new(),
            primary_path: vec![GridPoint::new(0, 0), GridPoint::new(20, 0)],
            secondary_path: None,
            hero_spawn: GridPoint::new(5, 2),
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

    fn spawn_enemy(field: &mut Battlefield, data: &GameData, level: &LoadedLevel) -> EntityId {
        let id = field.allocate_id();
        let profile = EnemyProfile::new(data.enemy(EnemyKind::Frosh).expect("stats"), 100);
        let enemy = Enemy::new(id, EnemyKind::Frosh, profile, PathKey::Primary, level.primary.origin(), 100, 0);
        let _ = field.enemies.insert(id, enemy);
        id
    }

    fn ctx<'a>(level: &'a LoadedLevel, data: &'a GameData, now_ms: u64) -> TickContext<'a> {
        TickContext {
            now: SimTime::from_millis(now_ms),
            dt: Fixed::ONE,
            level,
            data,
        }
    }

    #[test]
    fn test_enemy_advances_by_speed() {
        let data = GameData::builtin();
        let level = level(&data);
        let mut field = Battlefield::new();
        let id = spawn_enemy(&mut field, &data, &level);

        let escaped = move_enemies(&mut field, &ctx(&level, &data, 1000));
        assert!(escaped.is_empty());
        let enemy = field.enemies.get(id).expect("enemy");
        // 60 units/s over a 960-unit segment.
        assert_eq!(enemy.progress, Fixed::from_num(60) / Fixed::from_num(960));
        assert_eq!(enemy.position, Vec2Fixed::from_ints(84, 24));
    }

    #[test]
    fn test_frozen_enemy_holds_progress() {
        let data = GameData::builtin();
        let level = level(&data);
        let mut field = Battlefield::new();
        let id = spawn_enemy(&mut field, &data, &level);
        if let Some(enemy) = field.enemies.get_mut(id) {
            enemy.status.apply_freeze(SimTime::from_millis(5000));
        }
        let _ = move_enemies(&mut field, &ctx(&level, &data, 1000));
        assert_eq!(field.enemies.get(id).map(|e| e.progress), Some(Fixed::ZERO));
    }

    #[test]
    fn test_escape_reported_once() {
        let data = GameData::builtin();
        let level = level(&data);
        let mut field = Battlefield::new();
        let id = spawn_enemy(&mut field, &data, &level);
        if let Some(enemy) = field.enemies.get_mut(id) {
            enemy.progress = Fixed::from_num(0.99);
        }
        assert_eq!(move_enemies(&mut field, &ctx(&level, &data, 1000)), vec![id]);
        assert!(move_enemies(&mut field, &ctx(&level, &data, 2000)).is_empty());
    }

    #[test]
    fn test_only_closest_defender_engages() {
        let data = GameData::builtin();
        let level = level(&data);
        let mut field = Battlefield::new();
        let enemy = spawn_enemy(&mut field, &data, &level);
        let profile = UnitProfile::from(data.troop(TroopKind::Militia).expect("stats"));
        let near = field.deploy_troop(
            TroopKind::Militia,
            profile,
            Vec2Fixed::from_ints(60, 24),
            Producer::Objective,
            0,
            5,
            SimTime::ZERO,
        );
        let far = field.deploy_troop(
            TroopKind::Militia,
            profile,
            Vec2Fixed::from_ints(100, 24),
            Producer::Objective,
            1,
            5,
            SimTime::ZERO,
        );

        move_defenders(&mut field, &ctx(&level, &data, 0));
        assert_eq!(field.troops.get(near).and_then(|t| t.engaged), Some(enemy));
        assert_eq!(field.troops.get(far).and_then(|t| t.engaged), None);
    }

    #[test]
    fn test_separation_pushes_overlapping_units_apart() {
        let data = GameData::builtin();
        let level = level(&data);
        let mut field = Battlefield::new();
        let profile = UnitProfile::from(data.troop(TroopKind::Militia).expect("stats"));
        let spot = Vec2Fixed::from_ints(200, 200);
        let a = field.deploy_troop(TroopKind::Militia, profile, spot, Producer::Objective, 0, 5, SimTime::ZERO);
        let b = field.deploy_troop(TroopKind::Militia, profile, spot, Producer::Objective, 1, 5, SimTime::ZERO);

        move_defenders(&mut field, &ctx(&level, &data, 0));
        let pa = field.troops.get(a).map(|t| t.position).expect("a");
        let pb = field.troops.get(b).map(|t| t.position).expect("b");
        let gap = pa.distance(pb) - Fixed::from_num(data.tuning.min_separation);
        assert!(gap.abs() < Fixed::from_num(0.01));
    }
}
