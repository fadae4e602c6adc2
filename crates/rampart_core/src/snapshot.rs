//! Presentation view of a session.
//!
//! A [`SessionSnapshot`] is what a renderer or an agent needs to draw one
//! frame. Positions are converted to `f32` here and nowhere else.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::components::{EffectKind, EntityId, Health, ObjectiveState, ParticleKind, Producer};
use crate::data::{EnemyKind, HeroKind, ObjectiveKind, TowerKind, TowerTier, TroopKind};
use crate::math::{Fixed, Vec2Fixed};
use crate::session::{RunState, Session};
use crate::systems::waves::WavePhase;

fn point(v: Vec2Fixed) -> (f32, f32) {
    (v.x.to_num(), v.y.to_num())
}

fn fraction(health: Health) -> f32 {
    if health.max == 0 {
        return 0.0;
    }
    (Fixed::from_num(health.current) / Fixed::from_num(health.max)).to_num()
}

/// Visual state of an enemy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyView {
    pub id: EntityId,
    pub kind: EnemyKind,
    pub position: (f32, f32),
    pub hp: u32,
    pub health_percent: f32,
    pub flying: bool,
    pub slowed: bool,
    pub frozen: bool,
    pub taunted: bool,
}

/// Visual state of a tower.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TowerView {
    pub id: EntityId,
    pub kind: TowerKind,
    pub tier: TowerTier,
    pub position: (f32, f32),
    pub range: f32,
    pub rally_point: (f32, f32),
    pub buffed: bool,
}

/// Visual state of a troop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TroopView {
    pub id: EntityId,
    pub kind: TroopKind,
    pub position: (f32, f32),
    pub health_percent: f32,
    pub summoned: bool,
}

/// Visual state of the hero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeroView {
    pub id: EntityId,
    pub kind: HeroKind,
    pub position: (f32, f32),
    pub health_percent: f32,
    pub taunting: bool,
    pub ability_ready: bool,
}

/// Visual state of a projectile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileView {
    pub id: EntityId,
    pub position: (f32, f32),
    pub aim: (f32, f32),
}

/// Visual state of an area effect or particle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectView {
    pub kind: String,
    pub position: (f32, f32),
    pub radius: f32,
}

/// Visual state of the special objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveView {
    pub kind: ObjectiveKind,
    pub position: (f32, f32),
    /// Phase or condition name.
    pub state: String,
    /// Beacon stage; zero for other kinds.
    pub stage: u8,
    /// Vault hit points.
    pub hp: Option<u32>,
}

/// Complete visual state of one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub tick: u64,
    pub elapsed_ms: u64,
    pub run_state: RunState,
    pub wave_phase: WavePhase,
    /// Index of the wave in progress, counted from zero.
    pub current_wave: Option<usize>,
    pub total_waves: usize,
    pub gold: u32,
    pub lives: u32,
    pub speed: f32,
    pub enemies: Vec<EnemyView>,
    pub towers: Vec<TowerView>,
    pub troops: Vec<TroopView>,
    pub hero: Option<HeroView>,
    pub projectiles: Vec<ProjectileView>,
    pub effects: Vec<EffectView>,
    pub objective: Option<ObjectiveView>,
}

impl Session {
    /// Presentation view of the current state.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let field = self.field();
        let now = self.now();

        let enemies = field
            .enemies
            .values()
            .map(|e| EnemyView {
                id: e.id,
                kind: e.kind,
                position: point(e.position),
                hp: e.health.current,
                health_percent: fraction(e.health),
                flying: e.profile.flying,
                slowed: e.status.slow_factor(now) < Fixed::ONE || e.hazard_slow < Fixed::ONE,
                frozen: e.status.is_frozen(now),
                taunted: e.taunt.is_some(),
            })
            .collect();

        let towers = field
            .towers
            .values()
            .map(|t| TowerView {
                id: t.id,
                kind: t.kind,
                tier: t.tier,
                position: point(t.position),
                range: t.profile.range.to_num(),
                rally_point: point(t.rally),
                buffed: t.aura.damage > Fixed::ONE,
            })
            .collect();

        let troops = field
            .troops
            .values()
            .map(|t| TroopView {
                id: t.id,
                kind: t.kind,
                position: point(t.position),
                health_percent: fraction(t.health),
                summoned: matches!(t.producer, Producer::Spell { .. }),
            })
            .collect();

        let hero = field.hero.as_ref().map(|h| HeroView {
            id: h.id,
            kind: h.kind,
            position: point(h.position),
            health_percent: fraction(h.health),
            taunting: h.taunt_active(now),
            ability_ready: h.ability_ready_at <= now,
        });

        let projectiles = field
            .projectiles
            .values()
            .map(|p| ProjectileView {
                id: p.id,
                position: point(p.position),
                aim: point(p.aim),
            })
            .collect();

        let areas = field.effects.values().map(|e| match e.kind {
            EffectKind::SlowField { radius, .. } => EffectView {
                kind: "slow_field".to_string(),
                position: point(e.position),
                radius: radius.to_num(),
            },
        });
        let particles = field.particles.values().map(|p| EffectView {
            kind: match p.kind {
                ParticleKind::Spawn => "spawn",
                ParticleKind::Impact => "impact",
                ParticleKind::Explosion => "explosion",
                ParticleKind::Arc => "arc",
                ParticleKind::Death => "death",
                ParticleKind::Heal => "heal",
            }
            .to_string(),
            position: point(p.position),
            radius: 0.0,
        });
        let effects = areas.chain(particles).collect();

        let objective = field.objective.as_ref().map(|o| {
            let (state, hp) = match &o.state {
                ObjectiveState::Beacon { .. } => ("active".to_string(), None),
                ObjectiveState::Vault { health, state } => {
                    (format!("{state:?}").to_lowercase(), Some(health.current))
                }
                ObjectiveState::Shrine { phase, .. } => (format!("{phase:?}").to_lowercase(), None),
                ObjectiveState::Barracks { phase, .. } => (format!("{phase:?}").to_lowercase(), None),
            };
            ObjectiveView {
                kind: o.kind,
                position: point(o.position),
                state,
                stage: o.beacon_stage(),
                hp,
            }
        });

        SessionSnapshot {
            tick: self.tick_count(),
            elapsed_ms: now.as_millis(),
            run_state: self.run_state(),
            wave_phase: self.wave_phase(),
            current_wave: self.waves().current_wave(),
            total_waves: self.waves().total_waves(),
            gold: self.gold(),
            lives: self.lives(),
            speed: self.speed().to_num(),
            enemies,
            towers,
            troops,
            hero,
            projectiles,
            effects,
            objective,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::data::{GameData, TowerKind};
    use crate::geometry::GridPoint;
    use crate::session::Session;

    #[test]
    fn test_snapshot_reflects_towers() {
        let data = GameData::builtin();
        let definition = crate::data::LevelDefinition {
            id: "snap".to_string(),
            name: String::new(),
            primary_path: vec![GridPoint::new(0, 0), GridPoint::new(10, 0)],
            secondary_path: None,
            hero_spawn: GridPoint::new(2, 1),
            hero: Some(crate::data::HeroKind::Warden),
            objective: None,
            hazards: Vec::new(),
            starting_gold: 200,
            starting_lives: 5,
            waves: None,
            build_slots: Vec::new(),
            wave_gap_ms: 0,
        };
        let mut session = Session::new(data);
        session.start(definition).expect("start");
        let id = session
            .place_tower(TowerKind::Archer, GridPoint::new(3, 2))
            .expect("place");

        let snapshot = session.snapshot();
        assert_eq!(snapshot.gold, 130);
        assert_eq!(snapshot.towers.len(), 1);
        assert_eq!(snapshot.towers[0].id, id);
        assert!((snapshot.towers[0].range - 240.0).abs() < 0.01);
        assert!(snapshot.hero.is_some());
        assert!(snapshot.enemies.is_empty());
    }
}
