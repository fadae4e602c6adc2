//! Test fixtures and helpers.
//!
//! Canned levels and sessions for consistent testing.

use fixed::types::I32F32;
use rampart_core::data::{
    EnemyKind, GameData, HeroKind, LevelDefinition, Route, WaveGroup, WavePlan, WaveSource,
};
use rampart_core::geometry::GridPoint;
use rampart_core::session::Session;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// A group of `count` enemies on the primary route.
#[must_use]
pub fn group(enemy: EnemyKind, count: u32, interval_ms: u32) -> WaveGroup {
    WaveGroup {
        enemy,
        count,
        interval_ms,
        delay_ms: 0,
        route: Route::Primary,
        hp_pct: 100,
        speed_pct: 100,
    }
}

/// Five frosh, 600 ms apart.
#[must_use]
pub fn frosh_wave() -> WavePlan {
    WavePlan::single(group(EnemyKind::Frosh, 5, 600))
}

/// A straight east-west road twenty tiles long with free tower placement.
///
/// No hero, no objective, no hazards, 20 lives and 500 gold.
#[must_use]
pub fn straight_level(plan: WavePlan) -> LevelDefinition {
    LevelDefinition {
        id: "straight".to_string(),
        name: "Straight Road".to_string(),
        primary_path: vec![GridPoint::new(0, 5), GridPoint::new(20, 5)],
        secondary_path: None,
        hero_spawn: GridPoint::new(10, 6),
        hero: None,
        objective: None,
        hazards: Vec::new(),
        starting_gold: 500,
        starting_lives: 20,
        waves: Some(WaveSource::Custom(plan)),
        build_slots: Vec::new(),
        wave_gap_ms: 0,
    }
}

/// A road that forks after four tiles, with a hero and fixed build slots.
#[must_use]
pub fn forked_level(plan: WavePlan) -> LevelDefinition {
    LevelDefinition {
        id: "fork".to_string(),
        name: "The Fork".to_string(),
        primary_path: vec![
            GridPoint::new(0, 6),
            GridPoint::new(4, 6),
            GridPoint::new(4, 2),
            GridPoint::new(16, 2),
        ],
        secondary_path: Some(vec![
            GridPoint::new(0, 6),
            GridPoint::new(4, 6),
            GridPoint::new(4, 10),
            GridPoint::new(16, 10),
        ]),
        hero_spawn: GridPoint::new(5, 6),
        hero: Some(HeroKind::Warden),
        objective: None,
        hazards: Vec::new(),
        starting_gold: 400,
        starting_lives: 20,
        waves: Some(WaveSource::Custom(plan)),
        build_slots: vec![
            GridPoint::new(3, 4),
            GridPoint::new(6, 4),
            GridPoint::new(6, 8),
            GridPoint::new(10, 4),
            GridPoint::new(10, 8),
        ],
        wave_gap_ms: 2000,
    }
}

/// Session on the builtin tables with `level` started.
///
/// # Panics
///
/// Panics if the level fails validation.
#[must_use]
pub fn started(level: LevelDefinition) -> Session {
    let mut session = Session::new(GameData::builtin());
    session.start(level).expect("fixture level must load");
    session
}

/// Started session with the first wave already called.
///
/// # Panics
///
/// Panics if the level fails validation or has no waves.
#[must_use]
pub fn battling(level: LevelDefinition) -> Session {
    let mut session = started(level);
    session.call_wave().expect("fixture level must have waves");
    session
}
