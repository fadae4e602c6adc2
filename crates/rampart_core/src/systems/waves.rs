//! Wave spawn scheduling.
//!
//! `Idle -> WaveActive -> WaveClearing -> (Idle | WaveActive | AllWavesComplete)`.
//!
//! Activating a wave schedules one spawn timer per enemy at
//! `delay + n * interval`. The wave moves to `WaveClearing` once its last
//! spawn fired, and the next wave only activates once every enemy the wave
//! spawned is dead or escaped. `Idle` covers both the time before the first
//! wave and the intermission between waves.

use serde::{Deserialize, Serialize};

use crate::data::{WaveGroup, WavePlan};
use crate::events::{TimerEvent, WaveEvent};
use crate::timer::{SimTime, TimerId, TimerRegistry};

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WavePhase {
    /// Waiting for the first wave or for the intermission to end.
    Idle,
    /// Spawns of the current wave are still pending.
    WaveActive,
    /// All spawned; waiting for the population to resolve.
    WaveClearing,
    /// No waves remain.
    AllWavesComplete,
}

/// Turns a wave plan into timed spawn events.
#[derive(Debug, Clone)]
pub struct WaveScheduler {
    plan: WavePlan,
    phase: WavePhase,
    current: Option<usize>,
    next_wave: usize,
    remaining_spawns: u32,
    population: u32,
    start_timer: Option<TimerId>,
    outbox: Vec<WaveEvent>,
}

impl WaveScheduler {
    /// Scheduler for `plan`, idle before its first wave.
    #[must_use]
    pub fn new(plan: WavePlan) -> Self {
        Self {
            plan,
            phase: WavePhase::Idle,
            current: None,
            next_wave: 0,
            remaining_spawns: 0,
            population: 0,
            start_timer: None,
            outbox: Vec::new(),
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> WavePhase {
        self.phase
    }

    /// Most recently activated wave.
    #[must_use]
    pub const fn current_wave(&self) -> Option<usize> {
        self.current
    }

    /// Number of waves in the plan.
    #[must_use]
    pub fn total_waves(&self) -> usize {
        self.plan.len()
    }

    /// Waves activated so far.
    #[must_use]
    pub const fn waves_started(&self) -> usize {
        self.next_wave
    }

    /// The plan has nothing to spawn.
    #[must_use]
    pub fn has_no_content(&self) -> bool {
        self.plan.is_empty()
    }

    /// Spawns of the current wave not yet fired.
    #[must_use]
    pub const fn remaining_spawns(&self) -> u32 {
        self.remaining_spawns
    }

    /// Live enemies of the current wave.
    #[must_use]
    pub const fn population(&self) -> u32 {
        self.population
    }

    /// Whether every wave is done.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == WavePhase::AllWavesComplete
    }

    /// Whether an intermission timer is pending.
    #[must_use]
    pub const fn intermission_pending(&self) -> bool {
        self.start_timer.is_some()
    }

    /// Group definition of a spawn.
    #[must_use]
    pub fn group(&self, wave: usize, group: usize) -> Option<&WaveGroup> {
        self.plan.waves.get(wave)?.groups.get(group)
    }

    /// Start the battle's wave sequence.
    ///
    /// An empty plan completes immediately; callers must check
    /// [`has_no_content`](Self::has_no_content) rather than treat that as a
    /// victory.
    pub fn begin(&mut self, timers: &mut TimerRegistry<TimerEvent>) {
        if self.phase != WavePhase::Idle || self.current.is_some() {
            return;
        }
        if self.plan.is_empty() {
            tracing::warn!("Wave plan has no content");
            self.phase = WavePhase::AllWavesComplete;
            self.outbox.push(WaveEvent::AllComplete);
            return;
        }
        let _ = self.activate_next(timers);
    }

    /// Activate the next wave now. Returns its index.
    pub fn activate_next(&mut self, timers: &mut TimerRegistry<TimerEvent>) -> Option<usize> {
        let index = self.next_wave;
        let wave = self.plan.waves.get(index)?;
        for (group_index, group) in wave.groups.iter().enumerate() {
            for n in 0..group.count {
                let _ = timers.schedule_ms(
                    group.spawn_offset_ms(n),
                    TimerEvent::SpawnEnemy {
                        wave: index,
                        group: group_index,
                        index: n,
                    },
                );
            }
        }
        if let Some(id) = self.start_timer.take() {
            let _ = timers.cancel(id);
        }
        self.remaining_spawns = wave.enemy_count();
        self.population = 0;
        self.current = Some(index);
        self.next_wave += 1;
        self.phase = WavePhase::WaveActive;
        self.outbox.push(WaveEvent::Started(index));
        tracing::info!(wave = index, enemies = self.remaining_spawns, "Wave started");
        Some(index)
    }

    /// A spawn timer of the current wave fired; `created` is whether an
    /// enemy actually entered the field.
    pub fn on_spawn_fired(&mut self, wave: usize, created: bool) {
        if Some(wave) != self.current {
            return;
        }
        self.remaining_spawns = self.remaining_spawns.saturating_sub(1);
        if created {
            self.population += 1;
        }
    }

    /// An enemy of `wave` died or escaped.
    pub fn on_enemy_resolved(&mut self, wave: usize) {
        if Some(wave) == self.current {
            self.population = self.population.saturating_sub(1);
        }
    }

    /// The intermission timer fired.
    pub fn on_start_timer(&mut self, timers: &mut TimerRegistry<TimerEvent>) {
        self.start_timer = None;
        if self.phase == WavePhase::Idle {
            let _ = self.activate_next(timers);
        }
    }

    /// Skip the rest of the intermission and start the next wave.
    ///
    /// Only possible while idle with waves left.
    pub fn call_early(&mut self, timers: &mut TimerRegistry<TimerEvent>) -> Option<usize> {
        if self.phase != WavePhase::Idle {
            return None;
        }
        self.activate_next(timers)
    }

    /// Advance phase transitions and return the events since the last call.
    ///
    /// `gap` is the intermission after a cleared wave; zero starts the next
    /// wave in the same tick.
    pub fn update(&mut self, timers: &mut TimerRegistry<TimerEvent>, gap: SimTime) -> Vec<WaveEvent> {
        if let Some(index) = self.current {
            if self.phase == WavePhase::WaveActive && self.remaining_spawns == 0 {
                self.phase = WavePhase::WaveClearing;
                self.outbox.push(WaveEvent::SpawnsFinished(index));
            }
            if self.phase == WavePhase::WaveClearing && self.population == 0 {
                self.outbox.push(WaveEvent::Cleared(index));
                tracing::info!(wave = index, "Wave cleared");
                if self.next_wave >= self.plan.len() {
                    self.phase = WavePhase::AllWavesComplete;
                    self.outbox.push(WaveEvent::AllComplete);
                    tracing::info!("All waves complete");
                } else if gap == SimTime::ZERO {
                    self.phase = WavePhase::Idle;
                    let _ = self.activate_next(timers);
                } else {
                    self.phase = WavePhase::Idle;
                    self.start_timer = Some(timers.schedule(gap, TimerEvent::StartWave));
                }
            }
        }
        std::mem::take(&mut self.outbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{EnemyKind, Route, Wave};

    fn group(count: u32, interval_ms: u32, delay_ms: u32) -> WaveGroup {
        WaveGroup {
            enemy: EnemyKind::Frosh,
            count,
            interval_ms,
            delay_ms,
            route: Route::Primary,
            hp_pct: 100,
            speed_pct: 100,
        }
    }

    /// Fire everything due, counting each spawn as a created enemy.
    fn fire(scheduler: &mut WaveScheduler, timers: &mut TimerRegistry<TimerEvent>) -> Vec<(u64, TimerEvent)> {
        let mut fired = Vec::new();
        for timer in timers.drain_due() {
            match timer.payload {
                TimerEvent::SpawnEnemy { wave, .. } => scheduler.on_spawn_fired(wave, true),
                TimerEvent::StartWave => scheduler.on_start_timer(timers),
                _ => {}
            }
            fired.push((timer.due.as_millis(), timer.payload));
        }
        fired
    }

    #[test]
    fn test_spawn_times_follow_interval() {
        let mut timers = TimerRegistry::new();
        let mut scheduler = WaveScheduler::new(WavePlan::single(group(5, 600, 0)));
        scheduler.begin(&mut timers);
        assert_eq!(scheduler.update(&mut timers, SimTime::ZERO), vec![WaveEvent::Started(0)]);

        let mut spawn_times = Vec::new();
        while scheduler.phase() == WavePhase::WaveActive {
            let _ = timers.advance(SimTime::FRAME);
            spawn_times.extend(fire(&mut scheduler, &mut timers).into_iter().map(|(at, _)| at));
            let _ = scheduler.update(&mut timers, SimTime::ZERO);
        }
        assert_eq!(spawn_times, vec![0, 600, 1200, 1800, 2400]);
        assert_eq!(scheduler.phase(), WavePhase::WaveClearing);
        assert_eq!(timers.now().as_millis(), 2400);
    }

    #[test]
    fn test_next_wave_waits_for_population() {
        let mut timers = TimerRegistry::new();
        let plan = WavePlan {
            waves: vec![
                Wave {
                    groups: vec![group(2, 100, 0)],
                },
                Wave {
                    groups: vec![group(1, 0, 0)],
                },
            ],
        };
        let mut scheduler = WaveScheduler::new(plan);
        scheduler.begin(&mut timers);
        let _ = timers.advance(SimTime::from_millis(200));
        let _ = fire(&mut scheduler, &mut timers);
        let events = scheduler.update(&mut timers, SimTime::ZERO);
        assert!(events.contains(&WaveEvent::SpawnsFinished(0)));
        assert_eq!(scheduler.population(), 2);

        // Long after, the second wave still has not started.
        let _ = timers.advance(SimTime::from_millis(60_000));
        assert!(fire(&mut scheduler, &mut timers).is_empty());
        assert!(scheduler.update(&mut timers, SimTime::ZERO).is_empty());

        scheduler.on_enemy_resolved(0);
        assert!(scheduler.update(&mut timers, SimTime::ZERO).is_empty());
        scheduler.on_enemy_resolved(0);
        assert_eq!(
            scheduler.update(&mut timers, SimTime::ZERO),
            vec![WaveEvent::Cleared(0), WaveEvent::Started(1)]
        );
    }

    #[test]
    fn test_intermission_and_early_call() {
        let mut timers = TimerRegistry::new();
        let plan = WavePlan {
            waves: vec![
                Wave {
                    groups: vec![group(1, 0, 0)],
                },
                Wave {
                    groups: vec![group(1, 0, 0)],
                },
                Wave {
                    groups: vec![group(1, 0, 0)],
                },
            ],
        };
        let gap = SimTime::from_millis(5000);
        let mut scheduler = WaveScheduler::new(plan);
        scheduler.begin(&mut timers);
        let _ = fire(&mut scheduler, &mut timers);
        scheduler.on_enemy_resolved(0);
        let _ = scheduler.update(&mut timers, gap);
        assert_eq!(scheduler.phase(), WavePhase::Idle);
        assert!(scheduler.intermission_pending());

        let _ = timers.advance(gap);
        let _ = fire(&mut scheduler, &mut timers);
        assert_eq!(scheduler.current_wave(), Some(1));
        let _ = fire(&mut scheduler, &mut timers);
        scheduler.on_enemy_resolved(1);
        let _ = scheduler.update(&mut timers, gap);

        assert_eq!(scheduler.call_early(&mut timers), Some(2));
        assert!(!scheduler.intermission_pending());
        assert_eq!(scheduler.call_early(&mut timers), None);
        // The cancelled intermission timer never restarts anything.
        let _ = timers.advance(gap);
        let _ = fire(&mut scheduler, &mut timers);
        assert_eq!(scheduler.waves_started(), 3);
    }

    #[test]
    fn test_empty_plan_signals_no_content() {
        let mut timers = TimerRegistry::new();
        let mut scheduler = WaveScheduler::new(WavePlan::default());
        scheduler.begin(&mut timers);
        assert!(scheduler.has_no_content());
        assert!(scheduler.is_complete());
        assert_eq!(scheduler.update(&mut timers, SimTime::ZERO), vec![WaveEvent::AllComplete]);
        assert!(timers.is_empty());
    }
}
