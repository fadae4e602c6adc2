//! Loaded level geometry and the mutable entity collections of a battle.

use crate::components::{
    EntityId, EntityStorage, Effect, Enemy, Hero, IdAllocator, Objective, Particle, ParticleKind,
    Producer, Projectile, Tower, Troop, UnitProfile,
};
use crate::data::{GameData, HazardKind, LevelDefinition, PathKey, TroopKind, WavePlan};
use crate::error::{GameError, Result};
use crate::geometry::Path;
use crate::math::{Fixed, Vec2Fixed};
use crate::timer::SimTime;

/// Static hazard zone. Never created, moved or destroyed during a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hazard {
    /// Effect.
    pub kind: HazardKind,
    /// Center.
    pub position: Vec2Fixed,
    /// Radius.
    pub radius: Fixed,
}

/// A validated level converted to world space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedLevel {
    /// Source definition.
    pub definition: LevelDefinition,
    /// Primary route.
    pub primary: Path,
    /// Secondary route.
    pub secondary: Option<Path>,
    /// Hazard zones.
    pub hazards: Vec<Hazard>,
    /// Build slot centers.
    pub build_slots: Vec<Vec2Fixed>,
    /// Hero spawn point.
    pub hero_spawn: Vec2Fixed,
    /// Resolved wave plan.
    pub plan: WavePlan,
}

impl LoadedLevel {
    /// Validate `definition` and convert it to world space.
    ///
    /// # Errors
    ///
    /// Returns any configuration error found by
    /// [`LevelDefinition::validate`].
    pub fn load(definition: LevelDefinition, data: &GameData) -> Result<Self> {
        definition.validate(data)?;
        let invalid = |reason: &str| GameError::InvalidLevel {
            level: definition.id.clone(),
            reason: reason.to_string(),
        };
        let primary = Path::from_grid(&definition.primary_path).ok_or_else(|| invalid("primary path"))?;
        let secondary = match &definition.secondary_path {
            Some(points) => Some(Path::from_grid(points).ok_or_else(|| invalid("secondary path"))?),
            None => None,
        };
        let hazards = definition
            .hazards
            .iter()
            .map(|h| Hazard {
                kind: h.kind,
                position: h.position.to_world(),
                radius: Fixed::from_num(h.radius),
            })
            .collect();
        let build_slots = definition.build_slots.iter().map(|s| s.to_world()).collect();
        let hero_spawn = definition.hero_spawn.to_world();
        let plan = definition.wave_plan(data)?;

        Ok(Self {
            definition,
            primary,
            secondary,
            hazards,
            build_slots,
            hero_spawn,
            plan,
        })
    }

    /// Path for a route key. Falls back to the primary path.
    #[must_use]
    pub fn path(&self, key: PathKey) -> &Path {
        match (key, &self.secondary) {
            (PathKey::Secondary, Some(path)) => path,
            _ => &self.primary,
        }
    }
}

/// Every mutable entity collection of one battle.
#[derive(Debug, Clone, Default)]
pub struct Battlefield {
    /// Attackers.
    pub enemies: EntityStorage<Enemy>,
    /// Friendly mobile units.
    pub troops: EntityStorage<Troop>,
    /// Structures.
    pub towers: EntityStorage<Tower>,
    /// The hero, while alive.
    pub hero: Option<Hero>,
    /// Hits in flight.
    pub projectiles: EntityStorage<Projectile>,
    /// Timed area modifiers.
    pub effects: EntityStorage<Effect>,
    /// Cosmetic particles.
    pub particles: EntityStorage<Particle>,
    /// Special objective.
    pub objective: Option<Objective>,
    ids: IdAllocator,
}

impl Battlefield {
    /// Empty battlefield.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Next entity id.
    pub fn allocate_id(&mut self) -> EntityId {
        self.ids.allocate()
    }

    /// Empty every collection and restart id allocation.
    pub fn clear(&mut self) {
        self.enemies.clear();
        self.troops.clear();
        self.towers.clear();
        self.hero = None;
        self.projectiles.clear();
        self.effects.clear();
        self.particles.clear();
        self.objective = None;
        self.ids = IdAllocator::new();
    }

    /// Emit a cosmetic particle.
    pub fn emit_particle(&mut self, kind: ParticleKind, position: Vec2Fixed, expires: SimTime) {
        let id = self.allocate_id();
        let _ = self.particles.insert(
            id,
            Particle {
                id,
                kind,
                position,
                expires,
            },
        );
    }

    /// Troops owned by `producer`, oldest first.
    #[must_use]
    pub fn troops_of(&self, producer: Producer) -> Vec<EntityId> {
        let mut owned: Vec<(SimTime, EntityId)> = self
            .troops
            .values()
            .filter(|t| same_producer(t.producer, producer))
            .map(|t| (t.spawned_at, t.id))
            .collect();
        owned.sort_unstable();
        owned.into_iter().map(|(_, id)| id).collect()
    }

    /// Add a troop for `producer`, retiring its oldest troop first when
    /// `cap` would be exceeded. Returns the new troop id.
    pub fn deploy_troop(
        &mut self,
        kind: TroopKind,
        profile: UnitProfile,
        rally: Vec2Fixed,
        producer: Producer,
        slot: usize,
        cap: usize,
        now: SimTime,
    ) -> EntityId {
        let owned = self.troops_of(producer);
        let excess = (owned.len() + 1).saturating_sub(cap.max(1));
        for id in owned.into_iter().take(excess) {
            let _ = self.troops.remove(id);
            tracing::debug!(troop = id, "Retired oldest troop to respect cap");
        }
        let id = self.allocate_id();
        let _ = self
            .troops
            .insert(id, Troop::new(id, kind, profile, rally, producer, slot, now));
        id
    }

    /// Position of a live enemy.
    #[must_use]
    pub fn enemy_position(&self, id: EntityId) -> Option<Vec2Fixed> {
        self.enemies
            .get(id)
            .filter(|e| e.is_active())
            .map(|e| e.position)
    }
}

/// Spell troops all share one producer regardless of expiry.
fn same_producer(a: Producer, b: Producer) -> bool {
    match (a, b) {
        (Producer::Spell { .. }, Producer::Spell { .. }) => true,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{TroopKind, UnitStats};
    use crate::geometry::GridPoint;

    fn profile() -> UnitProfile {
        UnitProfile::from(&UnitStats {
            hp: 50,
            damage: 5,
            range: 20,
            cooldown_ms: 1000,
            sight: 100,
            speed: 60,
            armor_pct: 0,
            ranged: false,
        })
    }

    #[test]
    fn test_deploy_retires_oldest_at_cap() {
        let mut field = Battlefield::new();
        let producer = Producer::Tower(99);
        let mut ids = Vec::new();
        for i in 0..3u64 {
            ids.push(field.deploy_troop(
                TroopKind::Militia,
                profile(),
                Vec2Fixed::ZERO,
                producer,
                0,
                2,
                SimTime::from_millis(i * 100),
            ));
        }
        assert_eq!(field.troops.len(), 2);
        assert!(!field.troops.contains(ids[0]));
        assert_eq!(field.troops_of(producer), vec![ids[1], ids[2]]);
    }

    #[test]
    fn test_clear_restarts_ids() {
        let mut field = Battlefield::new();
        let first = field.allocate_id();
        field.emit_particle(ParticleKind::Spawn, Vec2Fixed::ZERO, SimTime::FRAME);
        field.clear();
        assert!(field.particles.is_empty());
        assert_eq!(field.allocate_id(), first);
    }

    #[test]
    fn test_secondary_falls_back_to_primary() {
        let data = GameData::builtin();
        let definition = LevelDefinition {
            id: "fallback".to_string(),
            name: String::new(),
            primary_path: vec![GridPoint::new(0, 0), GridPoint::new(4, 0)],
            secondary_path: None,
            hero_spawn: GridPoint::new(2, 1),
            hero: None,
            objective: None,
            hazards: Vec::new(),
            starting_gold: 0,
            starting_lives: 1,
            waves: None,
            build_slots: Vec::new(),
            wave_gap_ms: 0,
        };
        let level = LoadedLevel::load(definition, &data).expect("load");
        assert_eq!(level.path(PathKey::Secondary), &level.primary);
    }
}
