//! Determinism testing utilities.
//!
//! Provides a harness for verifying that a battle produces identical
//! results given an identical level and identical host commands.
//!
//! # Testing Strategy
//!
//! Agents and CI balance runs replay battles and compare outcomes, so the
//! engine must be 100% deterministic. Sources of non-determinism include:
//!
//! - **Floating-point math**: Different CPUs can produce different results.
//!   We use fixed-point arithmetic via [`rampart_core::math::Fixed`]
//!   throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Entity collections are ordered maps and iterate in id order.
//!
//! - **Wall-clock timers**: Deferred work runs on the session's own
//!   simulated clock, never on host time.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual system determinism (movement, combat, etc.)
//! 2. **Property tests**: Random build orders still produce deterministic
//!    outcomes
//! 3. **Integration tests**: Full battles are reproducible
//! 4. **Parallel tests**: Running N sessions on N threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use rampart_core::session::Session;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic battle).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the battle was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Battle is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create the initial state
/// * `step` - Function to advance by one tick
/// * `hash` - Function to compute the state hash
///
/// # Example
///
/// ```ignore
/// use rampart_test_utils::determinism::verify_determinism;
///
/// let result = verify_determinism(
///     5,   // Run 5 times
///     600, // 600 ticks each
///     || battling(straight_level(frosh_wave())),
///     |session| { session.tick(); },
///     |session| session.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run a session twice from identical setup and compare final hashes.
pub fn verify_session_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Session,
{
    let result = verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |session| {
            let _ = session.tick();
        },
        Session::state_hash,
    );
    result.is_deterministic
}

/// Run N sessions on scoped threads and collect their final hashes.
///
/// # Panics
///
/// Panics if a worker thread panics.
pub fn run_parallel_sessions<F>(setup_fn: F, num_sessions: usize, num_ticks: u64) -> Vec<u64>
where
    F: Fn() -> Session + Sync,
{
    thread::scope(|s| {
        let handles: Vec<_> = (0..num_sessions)
            .map(|_| {
                s.spawn(|| {
                    let mut session = setup_fn();
                    for _ in 0..num_ticks {
                        let _ = session.tick();
                    }
                    session.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("session thread panicked"))
            .collect()
    })
}

/// Compare two runs tick-by-tick, finding the first divergence.
///
/// Useful for debugging non-determinism by finding exactly when
/// sessions start to differ.
///
/// # Returns
///
/// `None` if the runs are identical, `Some(tick)` if they diverge at that
/// tick.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Session,
{
    let mut first = setup_fn();
    let mut second = setup_fn();

    if first.state_hash() != second.state_hash() {
        tracing::debug!(tick = 0, "Sessions differ before the first tick");
        return Some(0);
    }

    for tick in 1..=num_ticks {
        let _ = first.tick();
        let _ = second.tick();

        let (a, b) = (first.state_hash(), second.state_hash());
        if a != b {
            tracing::debug!(tick, first = a, second = b, "Sessions diverged");
            return Some(tick);
        }
    }

    None
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for battle inputs.
///
/// These strategies generate random but reproducible build orders and
/// wave groups for property-based testing.
pub mod strategies {
    use proptest::prelude::*;
    use rampart_core::data::{EnemyKind, Route, TowerKind, WaveGroup};
    use rampart_core::geometry::GridPoint;
    use rampart_core::math::Fixed;

    /// Any tower kind.
    pub fn arb_tower_kind() -> impl Strategy<Value = TowerKind> {
        prop::sample::select(TowerKind::ALL.to_vec())
    }

    /// Any ground enemy kind.
    pub fn arb_ground_enemy() -> impl Strategy<Value = EnemyKind> {
        prop::sample::select(vec![
            EnemyKind::Frosh,
            EnemyKind::Sprinter,
            EnemyKind::Brute,
            EnemyKind::Armored,
        ])
    }

    /// A tile beside the straight fixture road (rows 3-4 and 6-7).
    pub fn arb_roadside_tile() -> impl Strategy<Value = GridPoint> {
        (0i32..20, prop::sample::select(vec![3, 4, 6, 7])).prop_map(|(x, y)| GridPoint::new(x, y))
    }

    /// A build order of up to `max_len` towers.
    pub fn arb_build_order(max_len: usize) -> impl Strategy<Value = Vec<(TowerKind, GridPoint)>> {
        proptest::collection::vec((arb_tower_kind(), arb_roadside_tile()), 0..max_len)
    }

    /// Game speed multipliers, including out-of-range values.
    pub fn arb_speed() -> impl Strategy<Value = Fixed> {
        (0i32..=24).prop_map(|quarters| Fixed::from_num(quarters) / 4)
    }

    /// A primary-route wave group.
    pub fn arb_wave_group() -> impl Strategy<Value = WaveGroup> {
        (arb_ground_enemy(), 1u32..6, 200u32..1200, 50u32..200).prop_map(
            |(enemy, count, interval_ms, hp_pct)| WaveGroup {
                enemy,
                count,
                interval_ms,
                delay_ms: 0,
                route: Route::Primary,
                hp_pct,
                speed_pct: 100,
            },
        )
    }
}
