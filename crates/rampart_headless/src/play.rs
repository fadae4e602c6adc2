//! Scripted battles: place a fixed build order, run every wave, report.
//!
//! Used by CI balance checks and for quick manual runs of a level:
//!
//! ```bash
//! cargo run -p rampart_headless -- play --level levels/meadow.ron \
//!     --build archer@6,4 --build cannon@10,6 --speed 4
//! ```

use std::fmt;
use std::str::FromStr;

use rampart_core::data::{GameData, LevelDefinition, TowerKind, Wave, WavePlan};
use rampart_core::error::Result;
use rampart_core::geometry::GridPoint;
use rampart_core::math::Fixed;
use rampart_core::outcome::{BattleResult, BattleStats};
use rampart_core::session::{RunState, Session, StartOutcome};
use rampart_core::systems::waves::WavePhase;
use rampart_core::timer::{MIN_SPEED, TICK_RATE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One tower in a build order, written `kind@x,y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStep {
    /// Tower to build.
    pub tower: TowerKind,
    /// Tile to build on.
    pub at: GridPoint,
}

/// Error parsing a [`BuildStep`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BuildStepError {
    /// Not of the form `kind@x,y`.
    #[error("Expected kind@x,y, got '{0}'")]
    Malformed(String),
    /// Unknown tower kind.
    #[error("Unknown tower kind '{0}'")]
    UnknownTower(String),
}

impl FromStr for BuildStep {
    type Err = BuildStepError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let malformed = || BuildStepError::Malformed(s.to_string());
        let (kind, tile) = s.split_once('@').ok_or_else(malformed)?;
        let (x, y) = tile.split_once(',').ok_or_else(malformed)?;
        let x = x.trim().parse().map_err(|_| malformed())?;
        let y = y.trim().parse().map_err(|_| malformed())?;
        let kind = kind.trim();
        let tower = serde_json::from_value(serde_json::Value::String(kind.to_string()))
            .map_err(|_| BuildStepError::UnknownTower(kind.to_string()))?;
        Ok(Self {
            tower,
            at: GridPoint::new(x, y),
        })
    }
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = serde_json::to_value(self.tower)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_else(|| format!("{:?}", self.tower));
        write!(f, "{kind}@{},{}", self.at.x, self.at.y)
    }
}

/// How a scripted battle is played.
#[derive(Debug, Clone)]
pub struct PlayConfig {
    /// Towers placed before the first wave, in order.
    pub build_order: Vec<BuildStep>,
    /// Game speed multiplier.
    pub speed: Fixed,
    /// Give up after this many ticks.
    pub max_ticks: u64,
    /// Call each wave as soon as the intermission starts.
    pub call_early: bool,
}

impl Default for PlayConfig {
    fn default() -> Self {
        Self {
            build_order: Vec::new(),
            speed: Fixed::ONE,
            max_ticks: 60 * 60 * 30,
            call_early: false,
        }
    }
}

/// Summary of a scripted battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayReport {
    /// Level identifier.
    pub level: String,
    /// Terminal result; `None` when the tick limit was hit first or the
    /// level has no waves.
    pub result: Option<BattleResult>,
    /// Ticks simulated.
    pub ticks: u64,
    /// Final state hash.
    pub state_hash: u64,
    /// Counters at the end.
    pub stats: BattleStats,
    /// Build steps the session refused, with the reason.
    pub rejected: Vec<String>,
}

/// Ticks until the last spawn of `plan` at the earliest, with every wave
/// started one gap after the previous one's final spawn.
#[must_use]
pub fn spawn_schedule_ticks(plan: &WavePlan, wave_gap_ms: u32, speed: Fixed) -> u64 {
    let waves = u64::try_from(plan.len()).unwrap_or(u64::MAX);
    let gaps = u64::from(wave_gap_ms).saturating_mul(waves.saturating_sub(1));
    let ms = plan
        .waves
        .iter()
        .map(Wave::duration_ms)
        .fold(gaps, u64::saturating_add);
    let frames = ms.saturating_mul(u64::from(TICK_RATE)) / 1000;
    Fixed::saturating_from_num(frames)
        .saturating_div(speed.max(MIN_SPEED))
        .saturating_to_num()
}

/// Play `level` with the given script until it ends or the tick limit hits.
///
/// # Errors
///
/// Returns a configuration error if the level fails validation.
pub fn play_level(data: GameData, level: LevelDefinition, config: &PlayConfig) -> Result<PlayReport> {
    let id = level.id.clone();
    let mut session = Session::new(data);
    let status = session.start(level)?;
    let _ = session.set_speed(config.speed);

    let mut rejected = Vec::new();
    for step in &config.build_order {
        if let Err(e) = session.place_tower(step.tower, step.at) {
            rejected.push(format!("{step}: {e}"));
        }
    }

    let mut ticks = 0;
    if status == StartOutcome::Ready {
        let schedule = session
            .level()
            .map(|l| -> Result<u64> {
                let plan = l.definition.wave_plan(session.data())?;
                Ok(spawn_schedule_ticks(&plan, l.definition.wave_gap_ms, session.speed()))
            })
            .transpose()?
            .unwrap_or(0);
        if config.max_ticks < schedule {
            tracing::warn!(level = %id, max_ticks = config.max_ticks, schedule, "Tick limit ends before the last spawn");
        }
        let _ = session.call_wave()?;
        while !session.run_state().is_terminal() && ticks < config.max_ticks {
            let _ = session.tick();
            ticks += 1;
            if config.call_early
                && session.run_state() == RunState::Active
                && session.wave_phase() == WavePhase::Idle
            {
                let _ = session.call_wave();
            }
        }
    }

    if session.result().is_none() {
        tracing::warn!(level = %id, ticks, "Battle did not finish");
    }
    Ok(PlayReport {
        level: id,
        result: session.result().cloned(),
        ticks,
        state_hash: session.state_hash(),
        stats: *session.stats(),
        rejected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rampart_core::outcome::Outcome;
    use rampart_test_utils::fixtures::{frosh_wave, straight_level};

    #[test]
    fn test_parse_build_step() {
        let step: BuildStep = "archer@6,4".parse().unwrap();
        assert_eq!(step.tower, TowerKind::Archer);
        assert_eq!(step.at, GridPoint::new(6, 4));
        assert_eq!(step.to_string(), "archer@6,4");
    }

    #[test]
    fn test_parse_build_step_errors() {
        assert_eq!(
            "archer".parse::<BuildStep>(),
            Err(BuildStepError::Malformed("archer".to_string()))
        );
        assert_eq!(
            "archer@x,4".parse::<BuildStep>(),
            Err(BuildStepError::Malformed("archer@x,4".to_string()))
        );
        assert_eq!(
            "ballista@1,1".parse::<BuildStep>(),
            Err(BuildStepError::UnknownTower("ballista".to_string()))
        );
    }

    #[test]
    fn test_undefended_play_reaches_victory() {
        let report = play_level(
            GameData::builtin(),
            straight_level(frosh_wave()),
            &PlayConfig::default(),
        )
        .unwrap();
        let result = report.result.unwrap();
        assert_eq!(result.outcome, Outcome::Victory);
        assert_eq!(result.escaped, 5);
        assert!(report.rejected.is_empty());
    }

    #[test]
    fn test_spawn_schedule_scales_with_speed() {
        // Five frosh 600 ms apart: the last spawns 2400 ms in.
        let plan = frosh_wave();
        assert_eq!(spawn_schedule_ticks(&plan, 2000, Fixed::ONE), 144);
        assert_eq!(spawn_schedule_ticks(&plan, 2000, Fixed::from_num(2)), 72);

        let twice = WavePlan {
            waves: vec![plan.waves[0].clone(), plan.waves[0].clone()],
        };
        assert_eq!(spawn_schedule_ticks(&twice, 2000, Fixed::ONE), 408);
        assert_eq!(spawn_schedule_ticks(&WavePlan::default(), 2000, Fixed::ONE), 0);
    }

    #[test]
    fn test_short_tick_limit_stops_early() {
        let config = PlayConfig {
            max_ticks: 100,
            ..PlayConfig::default()
        };
        let report = play_level(GameData::builtin(), straight_level(frosh_wave()), &config).unwrap();
        assert_eq!(report.ticks, 100);
        assert!(report.result.is_none());
    }

    #[test]
    fn test_rejected_steps_are_reported() {
        let config = PlayConfig {
            build_order: vec![
                "archer@6,4".parse().unwrap(),
                "archer@6,4".parse().unwrap(),
            ],
            ..PlayConfig::default()
        };
        let report = play_level(GameData::builtin(), straight_level(frosh_wave()), &config).unwrap();
        assert_eq!(report.rejected.len(), 1);
        assert!(report.rejected[0].starts_with("archer@6,4"));
        assert_eq!(report.stats.towers_built, 1);
    }

    #[test]
    fn test_same_script_same_hash() {
        let config = PlayConfig {
            build_order: vec!["cannon@8,4".parse().unwrap()],
            speed: Fixed::from_num(2),
            ..PlayConfig::default()
        };
        let first = play_level(GameData::builtin(), straight_level(frosh_wave()), &config).unwrap();
        let second = play_level(GameData::builtin(), straight_level(frosh_wave()), &config).unwrap();
        assert_eq!(first, second);
    }
}
