//! Static hazard zones.
//!
//! Only ground enemies are affected. Overlapping zones of the same kind do
//! not stack: the strongest one an enemy stands in applies.

use crate::data::HazardKind;
use crate::events::{DamageEvent, DamageSource, TickEvents};
use crate::math::{percent, Fixed, Vec2Fixed};
use crate::timer::SimTime;
use crate::world::{Battlefield, Hazard};

use super::TickContext;

/// Cadence of periodic hazard effects (fog damage, geyser pushes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HazardClock {
    next_pulse: SimTime,
}

impl HazardClock {
    /// Clock whose first pulse is one interval after `now`.
    #[must_use]
    pub fn starting_at(now: SimTime, interval: SimTime) -> Self {
        Self {
            next_pulse: now + interval,
        }
    }

    /// Number of pulses due by `now`, advancing the clock past them.
    pub fn pulses_due(&mut self, now: SimTime, interval: SimTime) -> u32 {
        let interval = interval.max(SimTime::FRAME);
        let mut pulses = 0;
        while self.next_pulse <= now {
            self.next_pulse += interval;
            pulses += 1;
        }
        pulses
    }

    /// Next pulse time.
    #[must_use]
    pub const fn next_pulse(&self) -> SimTime {
        self.next_pulse
    }
}

#[derive(Debug, Default)]
struct Exposure {
    slow: Option<Fixed>,
    dps: u32,
    push: Option<(Fixed, Vec2Fixed)>,
}

fn exposure(hazards: &[Hazard], position: Vec2Fixed) -> Exposure {
    let mut exposure = Exposure::default();
    for hazard in hazards {
        if !hazard.position.within(position, hazard.radius) {
            continue;
        }
        match hazard.kind {
            HazardKind::Quicksand { slow_pct } => {
                let factor = Fixed::ONE - percent(slow_pct.min(95));
                exposure.slow = Some(exposure.slow.map_or(factor, |s| s.min(factor)));
            }
            HazardKind::PoisonFog { dps } => exposure.dps = exposure.dps.max(dps),
            HazardKind::Geyser { push } => {
                let strength = Fixed::from_num(push);
                if exposure.push.map_or(true, |(current, _)| strength > current) {
                    exposure.push = Some((strength, hazard.position));
                }
            }
        }
    }
    exposure
}

/// Apply hazard effects for this tick.
///
/// Quicksand is refreshed every tick into the enemy's hazard slow, so it
/// ends as soon as the enemy leaves the zone. Fog damage and geyser pushes
/// happen once per pulse. Fog damage ignores armor. A push replaces the
/// enemy's current knockback only when it is stronger.
pub fn apply_hazards(
    field: &mut Battlefield,
    ctx: &TickContext<'_>,
    pulses: u32,
    events: &mut TickEvents,
) {
    let hazards = &ctx.level.hazards;
    let interval = SimTime::from_millis(u64::from(ctx.tuning().hazard_pulse_ms.max(1)));
    let pulse_seconds = interval.as_seconds();

    for enemy in field.enemies.values_mut() {
        enemy.hazard_slow = Fixed::ONE;
        if !enemy.is_active() || enemy.profile.flying || hazards.is_empty() {
            continue;
        }
        let exposure = exposure(hazards, enemy.position);
        if let Some(slow) = exposure.slow {
            enemy.hazard_slow = slow;
        }
        if pulses == 0 {
            continue;
        }

        if exposure.dps > 0 {
            let raw = Fixed::from_num(exposure.dps) * pulse_seconds * Fixed::from_num(pulses);
            let dealt = enemy
                .health
                .apply_damage(raw.saturating_to_num::<u32>().max(1));
            events.damage.push(DamageEvent {
                source: DamageSource::Hazard,
                target: enemy.id,
                amount: dealt,
            });
        }

        if let Some((strength, center)) = exposure.push {
            if strength > enemy.knockback.length() {
                let mut away = (enemy.position - center).normalize();
                if away == Vec2Fixed::ZERO {
                    away = Vec2Fixed::new(Fixed::ONE, Fixed::ZERO);
                }
                enemy.knockback = away.scale(strength);
            }
        }
    }
}
