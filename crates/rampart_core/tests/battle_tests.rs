//! End-to-end battle scenarios driven through the public session API.

use std::collections::BTreeMap;

use rampart_core::components::{Enemy, EntityId, Producer};
use rampart_core::data::{
    EnemyKind, GameData, HeroKind, LevelDefinition, ObjectiveKind, ObjectivePlacement, PathKey,
    Route, SpellKind, TowerKind, TroopKind, Wave, WaveGroup, WavePlan,
};
use rampart_core::error::GameError;
use rampart_core::events::{DamageSource, ObjectiveEvent, TickEvents, WaveEvent};
use rampart_core::geometry::{GridPoint, WORLD_EXTENT};
use rampart_core::math::{Fixed, Vec2Fixed};
use rampart_core::outcome::Outcome;
use rampart_core::session::{ResetOptions, RunState, Session};
use rampart_core::systems::waves::WavePhase;
use rampart_core::timer::SimTime;
use rampart_test_utils::fixtures::{battling, forked_level, frosh_wave, group, started, straight_level};

fn run_to_end(session: &mut Session, max_ticks: u32) -> Vec<TickEvents> {
    let mut all = Vec::new();
    for _ in 0..max_ticks {
        if session.run_state().is_terminal() {
            break;
        }
        all.push(session.tick());
    }
    all
}

// =============================================================================
// Wave timing
// =============================================================================

#[test]
fn five_frosh_spawn_600ms_apart_then_clear() {
    let mut session = battling(straight_level(frosh_wave()));
    let mut spawn_times = Vec::new();
    let mut phase_after = Vec::new();

    for _ in 0..150 {
        let events = session.tick();
        spawn_times.extend(events.spawned.iter().map(|s| s.at.as_millis()));
        phase_after.push(session.wave_phase());
    }

    assert_eq!(spawn_times, vec![0, 600, 1200, 1800, 2400]);
    // Tick 144 ends exactly at 2400 ms.
    assert_eq!(phase_after[142], WavePhase::WaveActive);
    assert_eq!(phase_after[143], WavePhase::WaveClearing);
}

#[test]
fn undefended_road_ends_in_two_star_victory() {
    let mut session = battling(straight_level(frosh_wave()));
    let events = run_to_end(&mut session, 3000);

    assert_eq!(session.run_state(), RunState::Won);
    assert_eq!(session.lives(), 15);
    let result = session.result().expect("battle result");
    assert_eq!(result.outcome, Outcome::Victory);
    assert_eq!(result.stars, 2);
    assert_eq!(result.escaped, 5);

    let outcomes: Vec<_> = events.iter().filter_map(|e| e.outcome.as_ref()).collect();
    assert_eq!(outcomes.len(), 1);
    let waves: Vec<WaveEvent> = events.iter().flat_map(|e| e.waves.clone()).collect();
    assert_eq!(
        waves,
        vec![
            WaveEvent::Started(0),
            WaveEvent::SpawnsFinished(0),
            WaveEvent::Cleared(0),
            WaveEvent::AllComplete
        ]
    );
    assert_eq!(session.history().best_stars, 2);
}

#[test]
fn next_wave_waits_for_previous_population() {
    let plan = WavePlan {
        waves: vec![
            Wave {
                groups: vec![group(EnemyKind::Frosh, 3, 300)],
            },
            Wave {
                groups: vec![group(EnemyKind::Sprinter, 3, 300)],
            },
        ],
    };
    let mut session = battling(straight_level(plan));
    let mut first_wave_ids = Vec::new();
    let mut second_wave_seen = false;

    for _ in 0..4000 {
        if session.run_state().is_terminal() {
            break;
        }
        let events = session.tick();
        for record in &events.spawned {
            if record.wave == 0 {
                first_wave_ids.push(record.id);
            } else {
                second_wave_seen = true;
            }
        }
        if second_wave_seen {
            assert!(first_wave_ids
                .iter()
                .all(|id| !session.field().enemies.contains(*id)));
        }
    }

    assert!(second_wave_seen);
    assert_eq!(first_wave_ids.len(), 3);
    assert_eq!(session.run_state(), RunState::Won);
}

// =============================================================================
// Pause, speed and reset
// =============================================================================

#[test]
fn pause_freezes_the_clock() {
    let mut session = battling(straight_level(frosh_wave()));
    let _ = session.advance(10);
    session.pause().expect("pause");
    let frozen_at = session.now();

    for _ in 0..100 {
        assert!(session.tick().is_empty());
    }
    assert_eq!(session.now(), frozen_at);

    session.resume().expect("resume");
    let mut second_spawn_tick = None;
    for _ in 0..40 {
        let events = session.tick();
        if events.spawned.iter().any(|s| s.at == SimTime::from_millis(600)) {
            second_spawn_tick = Some(session.tick_count());
        }
    }
    assert_eq!(second_spawn_tick, Some(36));
}

#[test]
fn double_speed_halves_spawn_ticks() {
    let mut session = started(straight_level(frosh_wave()));
    assert_eq!(session.set_speed(Fixed::from_num(2)), Fixed::from_num(2));
    session.call_wave().expect("call");

    let mut spawn_ticks = Vec::new();
    for _ in 0..80 {
        let events = session.tick();
        if !events.spawned.is_empty() {
            spawn_ticks.push(session.tick_count());
        }
    }
    assert_eq!(spawn_ticks, vec![1, 18, 36, 54, 72]);
}

#[test]
fn reset_mid_wave_cancels_pending_spawns() {
    let mut session = battling(straight_level(frosh_wave()));
    let spawned: usize = session.advance(50).iter().map(|e| e.spawned.len()).sum();
    assert_eq!(spawned, 2);

    session.reset(ResetOptions::retry()).expect("reset");
    assert_eq!(session.pending_timers(), 0);
    assert!(session.field().enemies.is_empty());
    assert_eq!(session.wave_phase(), WavePhase::Idle);

    let after: usize = (0..200).map(|_| session.tick().spawned.len()).sum();
    assert_eq!(after, 0);

    // A fresh call spawns the whole wave exactly once.
    session.call_wave().expect("call");
    let recalled: usize = session.advance(200).iter().map(|e| e.spawned.len()).sum();
    assert_eq!(recalled, 5);
    assert_eq!(session.history().attempts, 2);
}

#[test]
fn fresh_reset_clears_history() {
    let mut session = battling(straight_level(frosh_wave()));
    let _ = run_to_end(&mut session, 3000);
    assert_eq!(session.history().attempts, 1);

    session.reset(ResetOptions::fresh()).expect("reset");
    assert_eq!(session.history().attempts, 0);
    assert_eq!(session.run_state(), RunState::Building);
    assert!(session.result().is_none());
}

// =============================================================================
// Host operations in battle
// =============================================================================

#[test]
fn meteor_kills_a_pair_of_frosh() {
    let mut session = battling(straight_level(frosh_wave()));
    let _ = session.advance(37);
    let positions: Vec<_> = session.field().enemies.values().map(|e| e.position).collect();
    assert_eq!(positions.len(), 2);
    let center = positions[0].lerp(positions[1], Fixed::from_num(0.5));

    session.cast_spell(SpellKind::Meteor, center).expect("cast");
    let events = session.tick();
    let meteor_hits = events
        .damage
        .iter()
        .filter(|d| d.source == DamageSource::Spell(SpellKind::Meteor))
        .count();
    assert_eq!(meteor_hits, 2);
    assert_eq!(events.kills.len(), 2);
    assert_eq!(session.gold(), 512);

    assert!(matches!(
        session.cast_spell(SpellKind::Meteor, center),
        Err(GameError::SpellOnCooldown { .. })
    ));
}

#[test]
fn bounties_match_kills() {
    let mut session = battling(straight_level(frosh_wave()));
    session
        .place_tower(TowerKind::Archer, GridPoint::new(6, 4))
        .expect("archer");
    session
        .place_tower(TowerKind::Archer, GridPoint::new(10, 6))
        .expect("archer");
    let _ = run_to_end(&mut session, 3000);

    let stats = session.stats();
    assert_eq!(stats.kills + stats.escaped, 5);
    assert_eq!(session.gold(), 500 - 140 + 6 * stats.kills);
    assert_eq!(session.lives(), 20 - stats.escaped);
}

#[test]
fn commands_rejected_after_battle_ends() {
    let mut session = battling(straight_level(frosh_wave()));
    let _ = run_to_end(&mut session, 3000);
    assert!(session.run_state().is_terminal());

    assert_eq!(
        session.place_tower(TowerKind::Archer, GridPoint::new(2, 2)),
        Err(GameError::BattleNotRunning)
    );
    assert_eq!(session.call_wave(), Err(GameError::BattleNotRunning));
    assert!(session.tick().is_empty());
}

#[test]
fn off_field_positions_are_rejected() {
    let mut level = straight_level(frosh_wave());
    level.hero = Some(HeroKind::Warden);
    let mut session = battling(level);
    let _ = session.advance(40);
    let gold = session.gold();
    let far = Vec2Fixed::from_ints(100_000, 0);

    assert_eq!(
        session.cast_spell(SpellKind::Meteor, far),
        Err(GameError::InvalidPlacement { x: 100_000, y: 0 })
    );
    assert_eq!(session.spell_cooldown(SpellKind::Meteor), SimTime::ZERO);
    assert!(matches!(session.move_hero(far), Err(GameError::InvalidPlacement { .. })));
    for tile in [GridPoint::new(100_000, 0), GridPoint::new(-3, 4), GridPoint::new(i32::MAX, i32::MAX)] {
        assert!(matches!(
            session.place_tower(TowerKind::Archer, tile),
            Err(GameError::InvalidPlacement { .. })
        ));
    }
    assert_eq!(session.gold(), gold);
    assert!(session.field().towers.is_empty());

    // The far edge of the field is still a legal destination.
    let edge = Vec2Fixed::from_ints(WORLD_EXTENT, 0);
    session.move_hero(edge).expect("edge of the field");
    assert_eq!(session.field().hero.as_ref().map(|h| h.rally), Some(edge));
    let _ = session.advance(600);
}

// =============================================================================
// Hero, troops and enemies that fight back
// =============================================================================

/// Builtin tables with one-hit defenders, a longer-reaching brute and the
/// automatic taunt switched off.
fn fragile_data() -> GameData {
    let mut data = GameData::builtin();
    data.tuning.hero_auto_ability = false;
    if let Some(warden) = data.heroes.get_mut(&HeroKind::Warden) {
        warden.unit.hp = 5;
    }
    if let Some(militia) = data.troops.get_mut(&TroopKind::Militia) {
        militia.hp = 5;
    }
    if let Some(attack) = data
        .enemies
        .get_mut(&EnemyKind::Brute)
        .and_then(|brute| brute.attack.as_mut())
    {
        attack.range = 48;
    }
    data
}

/// The straight road stretched to forty tiles.
fn long_road(plan: WavePlan) -> LevelDefinition {
    let mut level = straight_level(plan);
    level.primary_path[1] = GridPoint::new(40, 5);
    level
}

fn session_on(data: GameData, level: LevelDefinition) -> Session {
    let mut session = Session::new(data);
    session.start(level).expect("start");
    session
}

fn only_enemy(session: &Session) -> &Enemy {
    session.field().enemies.values().next().expect("enemy on the field")
}

#[test]
fn taunt_holds_progress_until_it_expires() {
    let mut data = GameData::builtin();
    data.tuning.hero_auto_ability = false;
    if let Some(warden) = data.heroes.get_mut(&HeroKind::Warden) {
        warden.unit.sight = 0;
        warden.unit.damage = 0;
    }
    let mut level = straight_level(WavePlan::single(group(EnemyKind::Frosh, 1, 0)));
    level.hero = Some(HeroKind::Warden);
    let road_y = GridPoint::new(0, 5).to_world().y;

    let mut session = session_on(data, level);
    session.call_wave().expect("call");
    let hero_at = session.field().hero.as_ref().map(|h| h.position).expect("hero");
    let mut in_reach = false;
    for _ in 0..600 {
        let _ = session.tick();
        if session
            .field()
            .enemies
            .values()
            .any(|e| e.position.within(hero_at, Fixed::from_num(100)))
        {
            in_reach = true;
            break;
        }
    }
    assert!(in_reach);

    assert_eq!(session.hero_ability(), Ok(1));
    assert!(matches!(session.hero_ability(), Err(GameError::AbilityOnCooldown { .. })));
    let held = only_enemy(&session).progress;

    // Three seconds of taunt is 180 frames; the last held frame is 179.
    for _ in 0..179 {
        let _ = session.tick();
        let enemy = only_enemy(&session);
        assert_eq!(enemy.progress, held);
        assert!(enemy.taunt.is_some());
    }
    assert!(only_enemy(&session).position.y > road_y);

    let _ = session.tick();
    let enemy = only_enemy(&session);
    assert!(enemy.taunt.is_none());
    assert!(enemy.progress > held);
    assert_eq!(enemy.position.y, road_y);
}

#[test]
fn fallen_hero_returns_after_respawn_delay() {
    let mut level = long_road(WavePlan::single(group(EnemyKind::Brute, 1, 0)));
    level.hero = Some(HeroKind::Warden);
    let spawn = level.hero_spawn.to_world();
    let mut session = session_on(fragile_data(), level);
    session.call_wave().expect("call");
    let first_hero = session.field().hero.as_ref().map(|h| h.id).expect("hero");

    let mut fell = false;
    for _ in 0..2000 {
        let events = session.tick();
        if events.hero_died {
            assert!(events
                .damage
                .iter()
                .any(|d| matches!(d.source, DamageSource::Enemy(_)) && d.target == first_hero));
            fell = true;
            break;
        }
    }
    assert!(fell);
    assert!(session.field().hero.is_none());
    assert_eq!(session.hero_ability(), Err(GameError::HeroUnavailable));
    assert_eq!(
        session.move_hero(Vec2Fixed::from_ints(100, 100)),
        Err(GameError::HeroUnavailable)
    );

    // Fifteen seconds is 900 frames.
    let _ = session.advance(899);
    assert!(session.field().hero.is_none());
    let _ = session.tick();
    let hero = session.field().hero.as_ref().expect("hero respawned");
    assert_ne!(hero.id, first_hero);
    assert_eq!(hero.position, spawn);
    assert!(hero.health.is_full());
}

/// Tick until a troop falls; returns the formation slot it held.
fn first_fallen_slot(session: &mut Session) -> usize {
    for _ in 0..2000 {
        let slots: BTreeMap<EntityId, usize> = session
            .field()
            .troops
            .values()
            .map(|t| (t.id, t.slot))
            .collect();
        let events = session.tick();
        if let Some(id) = events.troops_lost.first() {
            assert!(events
                .damage
                .iter()
                .any(|d| matches!(d.source, DamageSource::Enemy(_)) && d.target == *id));
            return slots[id];
        }
    }
    panic!("no troop fell");
}

#[test]
fn fallen_troop_is_replaced_in_its_slot() {
    let mut session = session_on(
        fragile_data(),
        long_road(WavePlan::single(group(EnemyKind::Brute, 1, 0))),
    );
    let tower = session
        .place_tower(TowerKind::Barracks, GridPoint::new(8, 4))
        .expect("barracks");
    assert_eq!(session.field().troops.len(), 3);
    session.call_wave().expect("call");

    let slot = first_fallen_slot(&mut session);
    let holds_slot = |s: &Session| s.field().troops.values().any(|t| t.slot == slot);
    assert!(!holds_slot(&session));

    // Tier one barracks respawn after ten seconds, 600 frames.
    let _ = session.advance(599);
    assert!(!holds_slot(&session));
    let _ = session.tick();
    let replacement = session
        .field()
        .troops
        .values()
        .find(|t| t.slot == slot)
        .expect("slot refilled");
    assert_eq!(replacement.producer, Producer::Tower(tower));
    assert!(replacement.health.is_full());
}

#[test]
fn respawn_after_sale_does_nothing() {
    let mut session = session_on(
        fragile_data(),
        long_road(WavePlan::single(group(EnemyKind::Brute, 1, 0))),
    );
    let tower = session
        .place_tower(TowerKind::Barracks, GridPoint::new(8, 4))
        .expect("barracks");
    session.call_wave().expect("call");

    let _ = first_fallen_slot(&mut session);
    assert_eq!(session.sell_tower(tower), Ok(48));
    assert!(session.field().troops.is_empty());

    let _ = session.advance(700);
    assert_eq!(session.run_state(), RunState::Active);
    assert!(session.field().troops.is_empty());
}

#[test]
fn warlord_breaks_the_vault_while_passing() {
    let mut level = straight_level(WavePlan::single(group(EnemyKind::Warlord, 1, 0)));
    level.objective = Some(ObjectivePlacement {
        kind: ObjectiveKind::Vault,
        position: GridPoint::new(10, 5),
        hp: Some(60),
    });
    let mut session = battling(level);
    let events = run_to_end(&mut session, 4000);

    let vault_events: Vec<ObjectiveEvent> = events.iter().flat_map(|e| e.objective.clone()).collect();
    assert_eq!(
        vault_events,
        vec![ObjectiveEvent::VaultDamaged { remaining: 20 }, ObjectiveEvent::VaultDestroyed]
    );
    let vault = session.field().objective.as_ref().expect("vault");
    assert!(!vault.is_vault_intact());
    assert_eq!(vault.vault_health().map(|h| h.current), Some(0));

    // The warlord walked on and cost five lives.
    assert_eq!(session.run_state(), RunState::Won);
    assert_eq!(session.lives(), 15);
}

// =============================================================================
// Income and spells
// =============================================================================

#[test]
fn mine_pays_every_five_seconds_until_sold() {
    let mut session = started(straight_level(frosh_wave()));
    let mine = session
        .place_tower(TowerKind::Mine, GridPoint::new(2, 2))
        .expect("mine");
    assert_eq!(session.gold(), 380);
    session.call_wave().expect("call");

    let _ = session.advance(299);
    assert_eq!(session.gold(), 380);
    let payout = session.tick();
    assert_eq!(payout.gold_earned, 8);
    assert_eq!(session.gold(), 388);

    let _ = session.advance(300);
    assert_eq!(session.gold(), 396);

    assert_eq!(session.sell_tower(mine), Ok(72));
    let _ = session.advance(300);
    assert_eq!(session.gold(), 468);
    assert_eq!(session.stats().gold_earned, 16);
}

#[test]
fn blizzard_slows_then_melts() {
    let plan = || WavePlan::single(group(EnemyKind::Frosh, 1, 0));
    let mut slowed = battling(straight_level(plan()));
    let mut free = battling(straight_level(plan()));
    let _ = slowed.advance(30);
    let _ = free.advance(30);
    let start = only_enemy(&free).progress;
    assert_eq!(only_enemy(&slowed).progress, start);

    let center = only_enemy(&slowed).position;
    slowed.cast_spell(SpellKind::Blizzard, center).expect("cast");
    assert_eq!(slowed.gold(), 450);
    assert_eq!(slowed.field().effects.len(), 1);

    let _ = slowed.advance(60);
    let _ = free.advance(60);
    let slow_moved = only_enemy(&slowed).progress - start;
    let free_moved = only_enemy(&free).progress - start;
    // Half speed, give or take fixed-point rounding.
    assert!(slow_moved * Fixed::from_num(5) > free_moved * Fixed::from_num(2));
    assert!(slow_moved * Fixed::from_num(5) < free_moved * Fixed::from_num(3));

    // Four seconds is 240 frames after the cast.
    let _ = slowed.advance(179);
    assert_eq!(slowed.field().effects.len(), 1);
    let _ = slowed.tick();
    assert!(slowed.field().effects.is_empty());
}

#[test]
fn reinforcements_leave_when_their_time_is_up() {
    let mut session = battling(straight_level(frosh_wave()));
    // Well away from the road so they never engage.
    session
        .cast_spell(SpellKind::Reinforcements, Vec2Fixed::from_ints(504, 600))
        .expect("cast");
    let summoned = |s: &Session| {
        s.field()
            .troops
            .values()
            .filter(|t| matches!(t.producer, Producer::Spell { .. }))
            .count()
    };
    assert_eq!(summoned(&session), 2);

    // Fifteen seconds is 900 frames.
    let _ = session.advance(899);
    assert_eq!(summoned(&session), 2);
    let _ = session.tick();
    assert_eq!(summoned(&session), 0);
    assert!(session.field().troops.is_empty());
}

// =============================================================================
// Routes
// =============================================================================

#[test]
fn groups_follow_their_routes() {
    let plan = WavePlan {
        waves: vec![Wave {
            groups: vec![
                WaveGroup {
                    route: Route::Alternate,
                    ..group(EnemyKind::Frosh, 4, 300)
                },
                WaveGroup {
                    route: Route::Secondary,
                    ..group(EnemyKind::Sprinter, 2, 300)
                },
            ],
        }],
    };
    let mut level = forked_level(plan);
    level.hero = None;
    let fork_y = GridPoint::new(4, 6).to_world().y;
    let mut session = battling(level);

    let events = session.advance(300);
    let paths = |kind: EnemyKind| -> Vec<PathKey> {
        events
            .iter()
            .flat_map(|e| &e.spawned)
            .filter(|s| s.kind == kind)
            .map(|s| s.path)
            .collect()
    };
    assert_eq!(
        paths(EnemyKind::Frosh),
        vec![PathKey::Primary, PathKey::Secondary, PathKey::Primary, PathKey::Secondary]
    );
    assert_eq!(paths(EnemyKind::Sprinter), vec![PathKey::Secondary; 2]);

    // Past the fork the primary branch runs north and the secondary south.
    assert_eq!(session.field().enemies.len(), 6);
    for enemy in session.field().enemies.values() {
        match enemy.path {
            PathKey::Primary => assert!(enemy.position.y < fork_y),
            PathKey::Secondary => assert!(enemy.position.y > fork_y),
        }
    }
}
