//! Closed sets of unit, tower and spell kinds.
//!
//! Authored data names kinds in snake_case (`frosh`, `tesla`, `four_a`).

use serde::{Deserialize, Serialize};

/// Attacker type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnemyKind {
    /// Basic walker.
    Frosh,
    /// Fast and fragile.
    Sprinter,
    /// Slow, heavy hitter that fights troops.
    Brute,
    /// Flying; ignores ground-only towers and hazards.
    Gargoyle,
    /// High armor.
    Armored,
    /// Boss that also batters objectives.
    Warlord,
}

impl EnemyKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Frosh,
        Self::Sprinter,
        Self::Brute,
        Self::Gargoyle,
        Self::Armored,
        Self::Warlord,
    ];
}

/// Stationary structure type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TowerKind {
    /// Fast single-target shots, hits air.
    Archer,
    /// Slow magic projectile, hits air.
    Mage,
    /// Slows or freezes what it hits.
    Frost,
    /// Ground-only splash shells.
    Cannon,
    /// Chain lightning.
    Tesla,
    /// Produces troops; no direct attack.
    Barracks,
    /// Produces gold; no direct attack.
    Mine,
}

impl TowerKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Archer,
        Self::Mage,
        Self::Frost,
        Self::Cannon,
        Self::Tesla,
        Self::Barracks,
        Self::Mine,
    ];
}

/// Tower upgrade level: 1 -> 2 -> 3 -> 4A | 4B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TowerTier {
    /// Freshly built.
    One,
    /// First upgrade.
    Two,
    /// Second upgrade; branch point.
    Three,
    /// Branch A specialization.
    FourA,
    /// Branch B specialization.
    FourB,
}

impl TowerTier {
    /// Every tier.
    pub const ALL: [Self; 5] = [Self::One, Self::Two, Self::Three, Self::FourA, Self::FourB];

    /// Tier reached by upgrading with an optional branch choice.
    ///
    /// Returns `None` when the combination is not a legal upgrade.
    #[must_use]
    pub const fn next(self, branch: Option<Branch>) -> Option<Self> {
        match (self, branch) {
            (Self::One, None) => Some(Self::Two),
            (Self::Two, None) => Some(Self::Three),
            (Self::Three, Some(Branch::A)) => Some(Self::FourA),
            (Self::Three, Some(Branch::B)) => Some(Self::FourB),
            _ => None,
        }
    }

    /// Whether no further upgrade exists.
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::FourA | Self::FourB)
    }
}

/// Specialization chosen when upgrading from tier 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    /// Leads to tier 4A.
    A,
    /// Leads to tier 4B.
    B,
}

/// Friendly mobile unit type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TroopKind {
    /// Melee footman.
    Militia,
    /// Ranged skirmisher.
    Ranger,
}

/// Hero type selected by the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeroKind {
    /// Melee tank with a taunt.
    Warden,
    /// Ranged hero with a short taunt.
    Huntress,
}

/// Castable spell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpellKind {
    /// Instant area damage.
    Meteor,
    /// Timed slowing field.
    Blizzard,
    /// Temporary troops at the target point.
    Reinforcements,
}
