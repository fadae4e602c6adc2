//! Static configuration: stat tables, wave templates and level definitions.
//!
//! Everything here is pure data designed to be deserialized from RON.
//! [`GameData::builtin`] provides the default tables.

mod builtin;
mod kinds;
mod level;
mod stats;
mod waves;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use kinds::{Branch, EnemyKind, HeroKind, SpellKind, TowerKind, TowerTier, TroopKind};
pub use level::{HazardKind, HazardPlacement, LevelDefinition, ObjectiveKind, ObjectivePlacement};
pub use stats::{
    AttackStats, ChainStats, Delivery, EnemyStats, HeroStats, IncomeStats, OnHitEffect,
    ProductionStats, SpellEffect, SpellStats, SplashStats, TauntStats, TowerTierStats, Tuning,
    UnitStats,
};
pub use waves::{PathKey, Route, Wave, WaveGroup, WavePlan, WaveSource};

use crate::error::{GameError, Result};

/// All static tables the engine reads.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GameData {
    /// Enemy stats by kind.
    pub enemies: BTreeMap<EnemyKind, EnemyStats>,
    /// Tower stats by kind and tier.
    pub towers: BTreeMap<TowerKind, BTreeMap<TowerTier, TowerTierStats>>,
    /// Troop stats by kind.
    pub troops: BTreeMap<TroopKind, UnitStats>,
    /// Hero stats by kind.
    pub heroes: BTreeMap<HeroKind, HeroStats>,
    /// Spell stats by kind.
    pub spells: BTreeMap<SpellKind, SpellStats>,
    /// Named wave plans shared across levels.
    #[serde(default)]
    pub wave_templates: BTreeMap<String, WavePlan>,
    /// Engine constants.
    #[serde(default)]
    pub tuning: Tuning,
}

impl GameData {
    /// Parse tables from RON source. `label` names the source in errors.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DataParse`] when the source is not valid RON for
    /// these tables.
    pub fn from_ron_str(source: &str, label: &str) -> Result<Self> {
        ron::from_str(source).map_err(|e| GameError::DataParse {
            path: label.to_string(),
            message: e.to_string(),
        })
    }

    /// Read and parse tables from a RON file.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DataParse`] when the file cannot be read or parsed.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let source = std::fs::read_to_string(path).map_err(|e| GameError::DataParse {
            path: label.clone(),
            message: e.to_string(),
        })?;
        Self::from_ron_str(&source, &label)
    }

    /// Stats for an enemy kind.
    pub fn enemy(&self, kind: EnemyKind) -> Result<&EnemyStats> {
        self.enemies
            .get(&kind)
            .ok_or_else(|| GameError::missing_enemy(kind))
    }

    /// Stats for one tier of a tower kind.
    pub fn tower(&self, kind: TowerKind, tier: TowerTier) -> Result<&TowerTierStats> {
        self.towers
            .get(&kind)
            .and_then(|tiers| tiers.get(&tier))
            .ok_or_else(|| GameError::MissingStats(format!("tower {kind:?} tier {tier:?}")))
    }

    /// Stats for a troop kind.
    pub fn troop(&self, kind: TroopKind) -> Result<&UnitStats> {
        self.troops
            .get(&kind)
            .ok_or_else(|| GameError::missing_troop(kind))
    }

    /// Stats for a hero kind.
    pub fn hero(&self, kind: HeroKind) -> Result<&HeroStats> {
        self.heroes
            .get(&kind)
            .ok_or_else(|| GameError::missing_hero(kind))
    }

    /// Stats for a spell kind.
    pub fn spell(&self, kind: SpellKind) -> Result<&SpellStats> {
        self.spells
            .get(&kind)
            .ok_or_else(|| GameError::missing_spell(kind))
    }

    /// Check the tables for values the engine cannot use.
    ///
    /// # Errors
    ///
    /// Returns the first problem found as a configuration error.
    pub fn validate(&self) -> Result<()> {
        for (kind, stats) in &self.enemies {
            if stats.hp == 0 || stats.armor_pct >= 100 {
                return Err(GameError::MissingStats(format!(
                    "enemy {kind:?} needs positive hp and armor below 100%"
                )));
            }
        }
        for (kind, tiers) in &self.towers {
            if let Some(missing) = TowerTier::ALL.iter().find(|t| !tiers.contains_key(t)) {
                return Err(GameError::MissingStats(format!("tower {kind:?} tier {missing:?}")));
            }
            for stats in tiers.values() {
                if let Some(production) = stats.production {
                    let _ = self.troop(production.troop)?;
                }
                if let Some(OnHitEffect::Slow { pct, .. }) = stats.on_hit {
                    if pct >= 100 {
                        return Err(GameError::MissingStats(format!(
                            "tower {kind:?} slow of {pct}% would stop enemies"
                        )));
                    }
                }
            }
        }
        for stats in self.spells.values() {
            if let SpellEffect::Summon { troop, .. } = stats.effect {
                let _ = self.troop(troop)?;
            }
        }
        let _ = self.troop(self.tuning.barracks_troop)?;
        for plan in self.wave_templates.values() {
            for group in plan.waves.iter().flat_map(|w| &w.groups) {
                let _ = self.enemy(group.enemy)?;
            }
        }
        if self.tuning.shrine_heal_ms > self.tuning.shrine_cycle_ms {
            return Err(GameError::MissingStats(
                "tuning shrine_heal_ms exceeds shrine_cycle_ms".to_string(),
            ));
        }
        Ok(())
    }
}
