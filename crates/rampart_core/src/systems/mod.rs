//! Per-tick systems.
//!
//! Each system is a set of free functions over the [`Battlefield`]. The
//! session calls them in a fixed order every tick:
//!
//! 1. [`movement`] - enemies along routes, defenders toward targets or slots
//! 2. [`combat`] - targeting, attacks, projectiles, burns, enemy strikes
//! 3. [`hazards`] - static zone effects
//! 4. [`objectives`] - beacon, vault, shrine and barracks state
//! 5. [`waves`] - spawn scheduling and wave completion
//!
//! [`Battlefield`]: crate::world::Battlefield

pub mod combat;
pub mod hazards;
pub mod movement;
pub mod objectives;
pub mod waves;

use crate::data::{GameData, Tuning};
use crate::math::Fixed;
use crate::timer::SimTime;
use crate::world::LoadedLevel;

/// Read-only inputs shared by every system during one tick.
#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    /// Clock time after this tick's advance.
    pub now: SimTime,
    /// Scaled seconds elapsed this tick.
    pub dt: Fixed,
    /// Level geometry.
    pub level: &'a LoadedLevel,
    /// Stat tables.
    pub data: &'a GameData,
}

impl<'a> TickContext<'a> {
    /// Engine constants.
    #[must_use]
    pub fn tuning(&self) -> &'a Tuning {
        &self.data.tuning
    }

    /// Clock time `ms` milliseconds from now.
    #[must_use]
    pub fn after_ms(&self, ms: u32) -> SimTime {
        self.now + SimTime::from_millis(u64::from(ms))
    }
}
