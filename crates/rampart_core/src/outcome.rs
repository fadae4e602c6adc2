//! Battle results, scoring and the presentation-adjacent session fields.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// How a battle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// All waves cleared with lives left.
    Victory,
    /// Lives ran out.
    Defeat,
}

/// Record handed to the progress layer on the terminal tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleResult {
    /// Level identifier.
    pub level: String,
    /// Victory or defeat.
    pub outcome: Outcome,
    /// Star rating, 0 to 3.
    pub stars: u8,
    /// Battle clock at the end.
    pub elapsed_ms: u64,
    /// Enemies killed.
    pub kills: u32,
    /// Enemies that escaped.
    pub escaped: u32,
    /// Gold earned from bounties and income.
    pub gold_earned: u32,
    /// Lives left.
    pub lives_remaining: u32,
}

/// Star rating for a finished battle.
///
/// Three stars with at least 90% of lives left, two with at least half,
/// otherwise one. A defeat earns none.
#[must_use]
pub fn star_rating(outcome: Outcome, lives_remaining: u32, starting_lives: u32) -> u8 {
    if outcome == Outcome::Defeat || starting_lives == 0 {
        return 0;
    }
    let kept = u64::from(lives_remaining) * 100;
    let total = u64::from(starting_lives);
    if kept >= total * 90 {
        3
    } else if kept >= total * 50 {
        2
    } else {
        1
    }
}

/// Counters accumulated over one battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BattleStats {
    /// Enemies killed.
    pub kills: u32,
    /// Enemies that escaped.
    pub escaped: u32,
    /// Gold earned.
    pub gold_earned: u32,
    /// Gold spent on towers and spells.
    pub gold_spent: u32,
    /// Total damage dealt to enemies.
    pub damage_dealt: u64,
    /// Towers built.
    pub towers_built: u32,
    /// Spells cast.
    pub spells_cast: u32,
}

/// Attempts on the current level.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunHistory {
    /// Times the battle was (re)started.
    pub attempts: u32,
    /// Best star rating achieved.
    pub best_stars: u8,
    /// Fastest victory.
    pub best_time_ms: Option<u64>,
    /// Most recent result.
    pub last: Option<BattleResult>,
}

impl RunHistory {
    /// Fold a finished battle into the history.
    pub fn record(&mut self, result: &BattleResult) {
        self.best_stars = self.best_stars.max(result.stars);
        if result.outcome == Outcome::Victory {
            self.best_time_ms = Some(
                self.best_time_ms
                    .map_or(result.elapsed_ms, |best| best.min(result.elapsed_ms)),
            );
        }
        self.last = Some(result.clone());
    }
}

/// View framing kept alongside battle state for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Camera {
    /// World point at the view center.
    pub center: Vec2Fixed,
    /// Zoom factor.
    #[serde(with = "fixed_serde")]
    pub zoom: Fixed,
}

impl Camera {
    /// Camera centered on `center` at 1x zoom.
    #[must_use]
    pub const fn centered(center: Vec2Fixed) -> Self {
        Self {
            center,
            zoom: Fixed::ONE,
        }
    }

    /// Frame the bounding box of `points`.
    #[must_use]
    pub fn framing(points: &[Vec2Fixed]) -> Self {
        let Some(first) = points.first() else {
            return Self::centered(Vec2Fixed::ZERO);
        };
        let (mut min, mut max) = (*first, *first);
        for p in points {
            min = Vec2Fixed::new(min.x.min(p.x), min.y.min(p.y));
            max = Vec2Fixed::new(max.x.max(p.x), max.y.max(p.y));
        }
        Self::centered(min.lerp(max, Fixed::from_num(0.5)))
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::centered(Vec2Fixed::ZERO)
    }
}
