//! Wave plans: ordered waves of spawn groups.

use serde::{Deserialize, Serialize};

use super::kinds::EnemyKind;

/// Which route a group's enemies follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// The level's primary path.
    #[default]
    Primary,
    /// The level's secondary path.
    Secondary,
    /// Even spawns take the primary path, odd spawns the secondary.
    Alternate,
}

/// Path a single enemy is bound to for its whole life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathKey {
    /// Primary path.
    Primary,
    /// Secondary path.
    Secondary,
}

impl Route {
    /// Path taken by the `index`-th enemy of a group.
    #[must_use]
    pub const fn path_for(self, index: u32) -> PathKey {
        match self {
            Self::Primary => PathKey::Primary,
            Self::Secondary => PathKey::Secondary,
            Self::Alternate if index % 2 == 0 => PathKey::Primary,
            Self::Alternate => PathKey::Secondary,
        }
    }

    /// Whether this route needs a secondary path.
    #[must_use]
    pub const fn needs_secondary(self) -> bool {
        !matches!(self, Self::Primary)
    }
}

/// A run of identical enemies spawned at a fixed interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveGroup {
    /// Enemy type.
    pub enemy: EnemyKind,
    /// Number spawned.
    pub count: u32,
    /// Time between consecutive spawns.
    #[serde(default)]
    pub interval_ms: u32,
    /// Delay after wave activation before the first spawn.
    #[serde(default)]
    pub delay_ms: u32,
    /// Route taken.
    #[serde(default)]
    pub route: Route,
    /// Hit point scaling in percent.
    #[serde(default = "default_pct")]
    pub hp_pct: u32,
    /// Speed scaling in percent.
    #[serde(default = "default_pct")]
    pub speed_pct: u32,
}

const fn default_pct() -> u32 {
    100
}

impl WaveGroup {
    /// Offset from wave activation of the `index`-th spawn.
    #[must_use]
    pub const fn spawn_offset_ms(&self, index: u32) -> u64 {
        self.delay_ms as u64 + index as u64 * self.interval_ms as u64
    }
}

/// One wave: groups activated together.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Wave {
    /// Spawn groups.
    pub groups: Vec<WaveGroup>,
}

impl Wave {
    /// Total enemies this wave spawns.
    #[must_use]
    pub fn enemy_count(&self) -> u32 {
        self.groups.iter().map(|g| g.count).sum()
    }

    /// Offset of the last spawn from activation.
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.groups
            .iter()
            .filter(|g| g.count > 0)
            .map(|g| g.spawn_offset_ms(g.count - 1))
            .max()
            .unwrap_or(0)
    }
}

/// Ordered list of waves.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WavePlan {
    /// Waves in activation order.
    pub waves: Vec<Wave>,
}

impl WavePlan {
    /// Plan with a single wave of a single group.
    #[must_use]
    pub fn single(group: WaveGroup) -> Self {
        Self {
            waves: vec![Wave {
                groups: vec![group],
            }],
        }
    }

    /// Whether the plan spawns nothing at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waves.iter().all(|w| w.enemy_count() == 0)
    }

    /// Number of waves.
    #[must_use]
    pub fn len(&self) -> usize {
        self.waves.len()
    }
}

/// Where a level's waves come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveSource {
    /// A named template from the shared data tables.
    Template(String),
    /// A plan authored for this level.
    Custom(WavePlan),
}
