//! Simulation clock and pausable timer registry.
//!
//! Deferred work (spawn events, respawns, income) is scheduled as plain data
//! keyed by due time in a min-heap and polled once per frame. The registry
//! owns the session clock, so pausing is simply not advancing it and game
//! speed scales the same clock that movement and cooldowns read.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use serde::{Deserialize, Serialize};

use crate::math::Fixed;

/// Frames per second of the fixed update loop.
pub const TICK_RATE: u32 = 60;

/// Clock units per millisecond.
const UNITS_PER_MS: u64 = TICK_RATE as u64;

/// Slowest accepted game speed.
pub const MIN_SPEED: Fixed = Fixed::from_bits(1 << 30); // 0.25
/// Fastest accepted game speed.
pub const MAX_SPEED: Fixed = Fixed::from_bits(4 << 32);

/// A point or span on the simulation clock.
///
/// Counted in `1 / (1000 * TICK_RATE)` seconds: one frame at 1x speed is
/// exactly 1000 units and every whole millisecond is representable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct SimTime(u64);

impl SimTime {
    /// Start of the battle clock.
    pub const ZERO: Self = Self(0);

    /// Duration of one frame at 1x speed.
    pub const FRAME: Self = Self(1000);

    /// Build from raw clock units.
    #[must_use]
    pub const fn from_units(units: u64) -> Self {
        Self(units)
    }

    /// Build from whole milliseconds.
    #[must_use]
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms * UNITS_PER_MS)
    }

    /// Raw clock units.
    #[must_use]
    pub const fn units(self) -> u64 {
        self.0
    }

    /// Whole milliseconds, truncated.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0 / UNITS_PER_MS
    }

    /// Span in seconds as fixed-point (intended for per-frame deltas).
    #[must_use]
    pub fn as_seconds(self) -> Fixed {
        Fixed::from_num(self.0) / Fixed::from_num(1000 * UNITS_PER_MS)
    }

    /// Span between `earlier` and `self`, zero if `earlier` is later.
    #[must_use]
    pub const fn saturating_sub(self, earlier: Self) -> Self {
        Self(self.0.saturating_sub(earlier.0))
    }
}

impl std::ops::Add for SimTime {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for SimTime {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

/// Handle returned by [`TimerRegistry::schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimerId(u64);

impl TimerId {
    /// Raw identifier value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// A timer that came due during a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<T> {
    /// Handle the timer was scheduled under.
    pub id: TimerId,
    /// Clock time the timer was due (not the time it was polled).
    pub due: SimTime,
    /// Scheduled payload.
    pub payload: T,
}

#[derive(Debug, Clone)]
struct Pending<T> {
    due: SimTime,
    payload: T,
}

/// Min-heap of deferred payloads sharing one pausable, speed-scaled clock.
///
/// Ties on due time fire in scheduling order.
#[derive(Debug, Clone)]
pub struct TimerRegistry<T> {
    now: SimTime,
    speed: Fixed,
    paused: bool,
    next_id: u64,
    queue: BinaryHeap<Reverse<(SimTime, u64)>>,
    pending: HashMap<u64, Pending<T>>,
}

impl<T> TimerRegistry<T> {
    /// Create an empty registry at clock zero, running at 1x.
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: SimTime::ZERO,
            speed: Fixed::ONE,
            paused: false,
            next_id: 0,
            queue: BinaryHeap::new(),
            pending: HashMap::new(),
        }
    }

    /// Current clock time.
    #[must_use]
    pub const fn now(&self) -> SimTime {
        self.now
    }

    /// Current speed multiplier.
    #[must_use]
    pub const fn speed(&self) -> Fixed {
        self.speed
    }

    /// Whether the clock is frozen.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Number of live (not cancelled, not fired) timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no timers are outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Schedule `payload` to fire after `delay` of clock time.
    pub fn schedule(&mut self, delay: SimTime, payload: T) -> TimerId {
        self.schedule_at(self.now + delay, payload)
    }

    /// Schedule `payload` to fire after `delay_ms` milliseconds of clock time.
    pub fn schedule_ms(&mut self, delay_ms: u64, payload: T) -> TimerId {
        self.schedule(SimTime::from_millis(delay_ms), payload)
    }

    /// Schedule `payload` at an absolute clock time.
    pub fn schedule_at(&mut self, due: SimTime, payload: T) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        self.queue.push(Reverse((due, id)));
        self.pending.insert(id, Pending { due, payload });
        TimerId(id)
    }

    /// Cancel a timer. Unknown or already fired ids are a no-op.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        // Heap entry is dropped lazily when it reaches the top.
        self.pending.remove(&id.0).is_some()
    }

    /// Clock time left before `id` fires, if it is still pending.
    #[must_use]
    pub fn remaining(&self, id: TimerId) -> Option<SimTime> {
        self.pending
            .get(&id.0)
            .map(|pending| pending.due.saturating_sub(self.now))
    }

    /// Stop the clock for every timer.
    pub fn pause_all(&mut self) {
        self.paused = true;
    }

    /// Restart the clock. Remaining times are exactly what they were at pause.
    pub fn resume_all(&mut self) {
        self.paused = false;
    }

    /// Set the speed multiplier, clamped to `[MIN_SPEED, MAX_SPEED]`.
    ///
    /// Returns the multiplier actually applied.
    pub fn set_speed(&mut self, multiplier: Fixed) -> Fixed {
        self.speed = multiplier.clamp(MIN_SPEED, MAX_SPEED);
        self.speed
    }

    /// Clock time that elapses for `real` host time at the current speed.
    #[must_use]
    pub fn scaled(&self, real: SimTime) -> SimTime {
        if self.paused {
            return SimTime::ZERO;
        }
        let units = Fixed::from_num(real.units()) * self.speed;
        SimTime::from_units(units.to_num::<u64>())
    }

    /// Advance the clock by `real` host time. Returns the clock time elapsed.
    pub fn advance(&mut self, real: SimTime) -> SimTime {
        let elapsed = self.scaled(real);
        self.now += elapsed;
        elapsed
    }

    /// Remove and return every timer due at or before the current clock time.
    pub fn drain_due(&mut self) -> Vec<Fired<T>> {
        let mut fired = Vec::new();
        while let Some(Reverse((due, id))) = self.queue.peek().copied() {
            if due > self.now {
                break;
            }
            let _ = self.queue.pop();
            if let Some(pending) = self.pending.remove(&id) {
                fired.push(Fired {
                    id: TimerId(id),
                    due: pending.due,
                    payload: pending.payload,
                });
            }
        }
        fired
    }

    /// Cancel every outstanding timer. Returns how many were cancelled.
    pub fn clear(&mut self) -> usize {
        let cancelled = self.pending.len();
        self.pending.clear();
        self.queue.clear();
        cancelled
    }

    /// Cancel everything and rewind to clock zero, running, at 1x.
    pub fn reset(&mut self) -> usize {
        let cancelled = self.clear();
        self.now = SimTime::ZERO;
        self.speed = Fixed::ONE;
        self.paused = false;
        cancelled
    }
}

impl<T> Default for TimerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
