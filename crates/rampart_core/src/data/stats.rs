//! Static per-type stat tables.
//!
//! Authored in whole numbers: world units, percentages and milliseconds.
//! They are converted to fixed-point profiles once, when an entity is created.

use serde::{Deserialize, Serialize};

use super::kinds::TroopKind;

/// Attack an enemy makes against troops, heroes and objectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackStats {
    /// Damage per strike.
    pub damage: u32,
    /// Reach in world units.
    pub range: u32,
    /// Time between strikes.
    pub cooldown_ms: u32,
}

/// Enemy type stats.
///
/// # Example RON
///
/// ```ron
/// EnemyStats(
///     hp: 60,
///     speed: 60,
///     armor_pct: 0,
///     bounty: 6,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyStats {
    /// Maximum hit points.
    pub hp: u32,
    /// Base speed in world units per second.
    pub speed: u32,
    /// Armor as a percentage of damage absorbed, `0..100`.
    #[serde(default)]
    pub armor_pct: u32,
    /// Gold credited on kill.
    pub bounty: u32,
    /// Lives lost when it reaches the goal.
    #[serde(default = "default_lives_cost")]
    pub lives_cost: u32,
    /// Flying units ignore ground-only towers and hazards.
    #[serde(default)]
    pub flying: bool,
    /// Melee or ranged attack against defenders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack: Option<AttackStats>,
    /// Whether its attack can damage objectives.
    #[serde(default)]
    pub hits_objectives: bool,
}

const fn default_lives_cost() -> u32 {
    1
}

/// Status effect applied by a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnHitEffect {
    /// Reduce speed by `pct` percent.
    Slow {
        /// Speed reduction in percent.
        pct: u32,
        /// Duration.
        duration_ms: u32,
    },
    /// Stop movement and attacks.
    Freeze {
        /// Duration.
        duration_ms: u32,
    },
    /// Stop attacks; movement continues.
    Stun {
        /// Duration.
        duration_ms: u32,
    },
    /// Add a burn stack dealing `dps` per stack.
    Burn {
        /// Damage per second per stack.
        dps: u32,
        /// Duration refreshed by each application.
        duration_ms: u32,
    },
}

/// Splash around the impact point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplashStats {
    /// Radius in world units.
    pub radius: u32,
    /// Damage percentage left at the edge of the radius.
    pub edge_pct: u32,
}

/// Chain jumping from the primary target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStats {
    /// Extra targets after the first.
    pub max_hops: u32,
    /// Maximum jump distance.
    pub hop_radius: u32,
    /// Damage percentage kept per hop.
    pub falloff_pct: u32,
}

/// Troop production of a barracks-type tower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionStats {
    /// Troop produced.
    pub troop: TroopKind,
    /// Troops deployed when built.
    pub squad_size: u32,
    /// Maximum concurrent troops from this producer.
    pub cap: u32,
    /// Delay before a fallen troop is replaced.
    pub respawn_ms: u32,
}

/// Gold generation of a mine-type tower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeStats {
    /// Gold per payout.
    pub amount: u32,
    /// Time between payouts.
    pub interval_ms: u32,
}

/// How an attack reaches its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// Damage lands on the attack tick.
    #[default]
    Instant,
    /// A projectile flies to the target.
    Projectile {
        /// World units per second.
        speed: u32,
    },
}

/// Stats of one tower tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TowerTierStats {
    /// Price of this tier (build price for tier 1, upgrade price otherwise).
    pub cost: u32,
    /// Damage per attack (0 for non-offensive towers).
    #[serde(default)]
    pub damage: u32,
    /// Attack or aura range in world units.
    #[serde(default)]
    pub range: u32,
    /// Time between attacks.
    #[serde(default)]
    pub cooldown_ms: u32,
    /// Whether flying enemies are valid targets.
    #[serde(default)]
    pub targets_air: bool,
    /// Hit delivery.
    #[serde(default)]
    pub delivery: Delivery,
    /// Splash area.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub splash: Option<SplashStats>,
    /// Chain jumps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<ChainStats>,
    /// Status effect carried by each hit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_hit: Option<OnHitEffect>,
    /// Troop production.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production: Option<ProductionStats>,
    /// Gold production.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income: Option<IncomeStats>,
}

impl TowerTierStats {
    /// Whether this tier attacks on its own.
    #[must_use]
    pub const fn is_offensive(&self) -> bool {
        self.damage > 0 && self.cooldown_ms > 0
    }
}

/// Stats shared by troops and heroes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStats {
    /// Maximum hit points.
    pub hp: u32,
    /// Damage per attack.
    pub damage: u32,
    /// Attack range.
    pub range: u32,
    /// Time between attacks.
    pub cooldown_ms: u32,
    /// Engagement radius.
    pub sight: u32,
    /// Movement speed in world units per second.
    pub speed: u32,
    /// Armor percentage.
    #[serde(default)]
    pub armor_pct: u32,
    /// Ranged units can hit flying enemies.
    #[serde(default)]
    pub ranged: bool,
}

/// Taunt ability of a hero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TauntStats {
    /// Radius around the hero.
    pub radius: u32,
    /// How long taunted enemies stay displaced.
    pub duration_ms: u32,
    /// Recharge after activation.
    pub cooldown_ms: u32,
    /// Maximum displacement from the path.
    pub pull: u32,
}

/// Hero type stats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroStats {
    /// Combat stats.
    pub unit: UnitStats,
    /// Delay before a fallen hero returns.
    pub respawn_ms: u32,
    /// Hit points regenerated per second while alive.
    #[serde(default)]
    pub regen_per_sec: u32,
    /// Taunt ability.
    pub taunt: TauntStats,
}

/// What a spell does at its target point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpellEffect {
    /// Instant damage to every enemy in the radius.
    Damage {
        /// Raw damage before armor.
        amount: u32,
    },
    /// Slowing field lasting `duration_ms`.
    SlowField {
        /// Speed reduction in percent.
        pct: u32,
        /// Field lifetime.
        duration_ms: u32,
    },
    /// Temporary troops.
    Summon {
        /// Troop type.
        troop: TroopKind,
        /// Number summoned.
        count: u32,
        /// Time before they vanish.
        lifetime_ms: u32,
    },
}

/// Spell stats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellStats {
    /// Gold per cast.
    pub cost: u32,
    /// Recharge after a cast.
    pub cooldown_ms: u32,
    /// Area radius.
    pub radius: u32,
    /// Effect at the target point.
    pub effect: SpellEffect,
}

/// Engine-wide constants that are data rather than code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Closest two friendly units may stand.
    pub min_separation: u32,
    /// Spacing between formation slots.
    pub formation_spacing: u32,
    /// Interval between burn damage pulses.
    pub burn_interval_ms: u32,
    /// Cap on burn stacks per enemy.
    pub burn_max_stacks: u32,
    /// Interval between hazard damage and push pulses.
    pub hazard_pulse_ms: u32,
    /// Knockback decay in world units per second.
    pub knockback_decay: u32,
    /// Percentage of invested gold refunded on sale.
    pub sell_refund_pct: u32,
    /// Minimum distance between freely placed towers.
    pub tower_spacing: u32,
    /// Beacon aura radius.
    pub beacon_radius: u32,
    /// Damage and attack-rate bonus per beacon stage, percent.
    pub beacon_stage_bonus_pct: u32,
    /// Vault hit points when the level does not override them.
    pub vault_hp: u32,
    /// Bounty bonus while the vault stands, percent.
    pub vault_bounty_bonus_pct: u32,
    /// Shrine full cycle.
    pub shrine_cycle_ms: u32,
    /// Healing part of the shrine cycle.
    pub shrine_heal_ms: u32,
    /// Shrine heal radius.
    pub shrine_radius: u32,
    /// Hit points per second restored while healing.
    pub shrine_heal_per_sec: u32,
    /// Barracks idle phase.
    pub barracks_idle_ms: u32,
    /// Barracks preparing phase.
    pub barracks_prepare_ms: u32,
    /// Troops per barracks squad.
    pub barracks_squad: u32,
    /// Maximum barracks troops alive at once.
    pub barracks_cap: u32,
    /// Troop type deployed by the barracks objective.
    pub barracks_troop: TroopKind,
    /// Hero casts its taunt automatically when enemies are close.
    pub hero_auto_ability: bool,
    /// Lifetime of cosmetic particles.
    pub particle_ms: u32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            min_separation: 16,
            formation_spacing: 20,
            burn_interval_ms: 500,
            burn_max_stacks: 3,
            hazard_pulse_ms: 500,
            knockback_decay: 120,
            sell_refund_pct: 60,
            tower_spacing: 48,
            beacon_radius: 160,
            beacon_stage_bonus_pct: 10,
            vault_hp: 800,
            vault_bounty_bonus_pct: 25,
            shrine_cycle_ms: 8000,
            shrine_heal_ms: 3000,
            shrine_radius: 140,
            shrine_heal_per_sec: 12,
            barracks_idle_ms: 6000,
            barracks_prepare_ms: 2000,
            barracks_squad: 2,
            barracks_cap: 4,
            barracks_troop: TroopKind::Militia,
            hero_auto_ability: true,
            particle_ms: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enemy_stats_defaults() {
        let stats: EnemyStats =
            ron::from_str("(hp: 60, speed: 60, bounty: 6)").expect("parse enemy stats");
        assert_eq!(stats.lives_cost, 1);
        assert_eq!(stats.armor_pct, 0);
        assert!(!stats.flying);
        assert!(stats.attack.is_none());
    }

    #[test]
    fn test_tier_offensive() {
        let stats: TowerTierStats = ron::from_str(
            "(cost: 70, damage: 8, range: 240, cooldown_ms: 800, on_hit: Some(slow(pct: 30, duration_ms: 1000)))",
        )
        .expect("parse tier");
        assert!(stats.is_offensive());
        assert_eq!(stats.on_hit, Some(OnHitEffect::Slow { pct: 30, duration_ms: 1000 }));

        let mine: TowerTierStats = ron::from_str(
            "(cost: 100, income: Some((amount: 10, interval_ms: 5000)))",
        )
        .expect("parse mine");
        assert!(!mine.is_offensive());
    }

    #[test]
    fn test_tuning_partial_override() {
        let tuning: Tuning = ron::from_str("(vault_hp: 500)").expect("parse tuning");
        assert_eq!(tuning.vault_hp, 500);
        assert_eq!(tuning.sell_refund_pct, Tuning::default().sell_refund_pct);
    }
}
