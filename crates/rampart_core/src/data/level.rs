//! Level definitions as produced by the level editor.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::kinds::HeroKind;
use super::waves::{WavePlan, WaveSource};
use super::GameData;
use crate::error::{GameError, Result};
use crate::geometry::{GridPoint, Path, GRID_EXTENT, WORLD_EXTENT};

/// Special objective type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveKind {
    /// Buffs nearby towers, stronger with more towers around it.
    Beacon,
    /// Periodically heals nearby defenders.
    Shrine,
    /// Destroyable; boosts bounty while standing.
    Vault,
    /// Periodically deploys a squad of troops.
    Barracks,
}

/// Objective placement in a level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectivePlacement {
    /// Objective type.
    pub kind: ObjectiveKind,
    /// Tile it stands on.
    pub position: GridPoint,
    /// Hit points (vault only); falls back to the tuning default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hp: Option<u32>,
}

/// Environmental hazard type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardKind {
    /// Periodic damage.
    PoisonFog {
        /// Damage per second.
        dps: u32,
    },
    /// Movement slow.
    Quicksand {
        /// Speed reduction in percent.
        slow_pct: u32,
    },
    /// Periodic push away from the center.
    Geyser {
        /// Displacement in world units.
        push: u32,
    },
}

/// Hazard placement in a level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardPlacement {
    /// Hazard type.
    pub kind: HazardKind,
    /// Center tile.
    pub position: GridPoint,
    /// Radius in world units.
    pub radius: u32,
}

/// A complete level.
///
/// # Example RON
///
/// ```ron
/// LevelDefinition(
///     id: "meadow",
///     name: "Meadow",
///     primary_path: [(x: 0, y: 5), (x: 19, y: 5)],
///     hero_spawn: (x: 17, y: 4),
///     starting_gold: 250,
///     starting_lives: 20,
///     waves: Some(template("standard")),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelDefinition {
    /// Stable identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Main enemy route.
    pub primary_path: Vec<GridPoint>,
    /// Optional diverging route.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_path: Option<Vec<GridPoint>>,
    /// Where the hero appears.
    pub hero_spawn: GridPoint,
    /// Hero type; no hero when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hero: Option<HeroKind>,
    /// Optional special objective.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<ObjectivePlacement>,
    /// Static hazards.
    #[serde(default)]
    pub hazards: Vec<HazardPlacement>,
    /// Gold at battle start.
    pub starting_gold: u32,
    /// Lives at battle start.
    pub starting_lives: u32,
    /// Wave content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waves: Option<WaveSource>,
    /// Allowed tower positions; free placement when empty.
    #[serde(default)]
    pub build_slots: Vec<GridPoint>,
    /// Intermission between a cleared wave and the next.
    #[serde(default = "default_wave_gap")]
    pub wave_gap_ms: u32,
}

const fn default_wave_gap() -> u32 {
    5000
}

impl LevelDefinition {
    fn invalid(&self, reason: impl Into<String>) -> GameError {
        GameError::InvalidLevel {
            level: self.id.clone(),
            reason: reason.into(),
        }
    }

    /// Every authored tile must lie on the playable square.
    fn check_bounds(&self) -> Result<()> {
        let off_field = |what: &str, p: GridPoint| {
            self.invalid(format!(
                "{what} ({}, {}) lies outside the {GRID_EXTENT}x{GRID_EXTENT} field",
                p.x, p.y
            ))
        };
        let routes = self.primary_path.iter().chain(self.secondary_path.iter().flatten());
        if let Some(p) = routes.copied().find(|p| !p.in_bounds()) {
            return Err(off_field("path point", p));
        }
        if !self.hero_spawn.in_bounds() {
            return Err(off_field("hero spawn", self.hero_spawn));
        }
        if let Some(p) = self.build_slots.iter().copied().find(|p| !p.in_bounds()) {
            return Err(off_field("build slot", p));
        }
        if let Some(objective) = self.objective.as_ref().filter(|o| !o.position.in_bounds()) {
            return Err(off_field("objective", objective.position));
        }
        for (i, hazard) in self.hazards.iter().enumerate() {
            if !hazard.position.in_bounds() {
                return Err(off_field(&format!("hazard {i}"), hazard.position));
            }
            if hazard.radius > WORLD_EXTENT.unsigned_abs() {
                return Err(self.invalid(format!("hazard {i} radius {} exceeds the field", hazard.radius)));
            }
        }
        Ok(())
    }

    /// Resolve the wave source into a concrete plan.
    ///
    /// A missing source yields an empty plan.
    pub fn wave_plan(&self, data: &GameData) -> Result<WavePlan> {
        match &self.waves {
            None => Ok(WavePlan::default()),
            Some(WaveSource::Custom(plan)) => Ok(plan.clone()),
            Some(WaveSource::Template(name)) => data
                .wave_templates
                .get(name)
                .cloned()
                .ok_or_else(|| GameError::UnknownWaveTemplate(name.clone())),
        }
    }

    /// Check the level against the data tables.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found.
    pub fn validate(&self, data: &GameData) -> Result<()> {
        if self.id.is_empty() {
            return Err(self.invalid("level id is empty"));
        }
        self.check_bounds()?;
        if Path::from_grid(&self.primary_path).is_none() {
            return Err(self.invalid(
                "primary path needs at least two points and no zero-length segments",
            ));
        }
        if let Some(secondary) = &self.secondary_path {
            if Path::from_grid(secondary).is_none() {
                return Err(self.invalid(
                    "secondary path needs at least two points and no zero-length segments",
                ));
            }
        }
        if self.starting_lives == 0 {
            return Err(self.invalid("starting lives must be positive"));
        }
        if let Some(hero) = self.hero {
            let _ = data.hero(hero)?;
        }
        if let Some(objective) = &self.objective {
            if objective.hp == Some(0) {
                return Err(self.invalid("objective hit points must be positive"));
            }
        }
        for (i, hazard) in self.hazards.iter().enumerate() {
            if hazard.radius == 0 {
                return Err(self.invalid(format!("hazard {i} has zero radius")));
            }
            if let HazardKind::Quicksand { slow_pct } = hazard.kind {
                if slow_pct >= 100 {
                    return Err(self.invalid(format!("hazard {i} slows by {slow_pct}%")));
                }
            }
        }
        let mut slots = BTreeSet::new();
        for slot in &self.build_slots {
            if !slots.insert(*slot) {
                return Err(self.invalid(format!("duplicate build slot ({}, {})", slot.x, slot.y)));
            }
        }

        let plan = self.wave_plan(data)?;
        for (w, wave) in plan.waves.iter().enumerate() {
            for (g, group) in wave.groups.iter().enumerate() {
                let _ = data.enemy(group.enemy)?;
                if group.count == 0 {
                    return Err(self.invalid(format!("wave {w} group {g} spawns nothing")));
                }
                if group.hp_pct == 0 || group.speed_pct == 0 {
                    return Err(self.invalid(format!("wave {w} group {g} has a zero scale")));
                }
                if group.route.needs_secondary() && self.secondary_path.is_none() {
                    return Err(GameError::MissingSecondaryPath { wave: w, group: g });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{EnemyKind, Route, Wave, WaveGroup};

    fn level() -> LevelDefinition {
        LevelDefinition {
            id: "test".to_string(),
            name: "Test".to_string(),
            primary_path: vec![GridPoint::new(0, 0), GridPoint::new(10, 0)],
            secondary_path: None,
            hero_spawn: GridPoint::new(5, 1),
            hero: None,
            objective: None,
            hazards: Vec::new(),
            starting_gold: 100,
            starting_lives: 10,
            waves: None,
            build_slots: Vec::new(),
            wave_gap_ms: 0,
        }
    }

    fn group(route: Route) -> WaveGroup {
        WaveGroup {
            enemy: EnemyKind::Frosh,
            count: 2,
            interval_ms: 100,
            delay_ms: 0,
            route,
            hp_pct: 100,
            speed_pct: 100,
        }
    }

    #[test]
    fn test_valid_level() {
        let data = GameData::builtin();
        assert!(level().validate(&data).is_ok());
        assert!(level().wave_plan(&data).expect("plan").is_empty());
    }

    #[test]
    fn test_short_path_rejected() {
        let data = GameData::builtin();
        let mut def = level();
        def.primary_path.truncate(1);
        let err = def.validate(&data).expect_err("invalid");
        assert!(err.is_configuration());
    }

    #[test]
    fn test_off_field_tiles_rejected() {
        let data = GameData::builtin();
        let far = GridPoint::new(GRID_EXTENT, 0);

        let mut def = level();
        def.primary_path.push(GridPoint::new(3_000_000, 0));
        assert!(matches!(def.validate(&data), Err(GameError::InvalidLevel { .. })));

        let mut def = level();
        def.build_slots.push(far);
        assert!(def.validate(&data).is_err());

        let mut def = level();
        def.hero_spawn = GridPoint::new(-1, 0);
        assert!(def.validate(&data).is_err());

        let mut def = level();
        def.hazards.push(HazardPlacement {
            kind: HazardKind::Geyser { push: 10 },
            position: GridPoint::new(2, 2),
            radius: u32::MAX,
        });
        assert!(def.validate(&data).is_err());
    }

    #[test]
    fn test_unknown_template() {
        let data = GameData::builtin();
        let mut def = level();
        def.waves = Some(WaveSource::Template("nope".to_string()));
        assert_eq!(
            def.validate(&data),
            Err(GameError::UnknownWaveTemplate("nope".to_string()))
        );
    }

    #[test]
    fn test_secondary_route_requires_path() {
        let data = GameData::builtin();
        let mut def = level();
        def.waves = Some(WaveSource::Custom(WavePlan {
            waves: vec![Wave {
                groups: vec![group(Route::Primary), group(Route::Alternate)],
            }],
        }));
        assert_eq!(
            def.validate(&data),
            Err(GameError::MissingSecondaryPath { wave: 0, group: 1 })
        );

        def.secondary_path = Some(vec![GridPoint::new(0, 4), GridPoint::new(10, 4)]);
        assert!(def.validate(&data).is_ok());
    }

    #[test]
    fn test_parse_from_ron() {
        let src = r#"LevelDefinition(
            id: "meadow",
            primary_path: [(x: 0, y: 5), (x: 19, y: 5)],
            hero_spawn: (x: 17, y: 4),
            hero: Some(warden),
            starting_gold: 250,
            starting_lives: 20,
            waves: Some(template("standard")),
            hazards: [(kind: quicksand(slow_pct: 40), position: (x: 8, y: 5), radius: 60)],
        )"#;
        let def: LevelDefinition = ron::from_str(src).expect("parse level");
        assert_eq!(def.wave_gap_ms, 5000);
        assert!(def.validate(&GameData::builtin()).is_ok());
    }
}
