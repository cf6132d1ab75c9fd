//! Retrieval degradation tracker: a sliding window of end-to-end
//! latencies decides whether the engine should shed optional work
//! (spec §4.6 "Degradation"). Grounded directly on
//! `examples/original_source/src/core/system/circuit_breaker.py`'s
//! `CircuitBreaker`.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tracing::{info, warn};

/// Sliding-window latency monitor deciding retrieval degraded mode.
/// Not to be confused with the per-provider `CircuitBreaker` in
/// `amber-providers` (open/closed/half-open over call failures); this
/// one tracks end-to-end latency, not failures.
pub struct DegradationTracker {
    window_size: usize,
    latency_threshold_ms: u64,
    enter_fraction: f32,
    exit_fraction: f32,
    state: Mutex<State>,
}

struct State {
    latencies: VecDeque<u64>,
    is_degraded: bool,
}

impl DegradationTracker {
    #[must_use]
    pub fn new(window_size: usize, latency_threshold_ms: u64, enter_fraction: f32, exit_fraction: f32) -> Self {
        Self {
            window_size,
            latency_threshold_ms,
            enter_fraction,
            exit_fraction,
            state: Mutex::new(State { latencies: VecDeque::with_capacity(window_size), is_degraded: false }),
        }
    }

    /// Records an observed end-to-end retrieval latency and updates
    /// degraded status. Enters degraded mode once the fraction of
    /// recent latencies above the threshold reaches `enter_fraction`;
    /// only exits once it falls below `exit_fraction` (half the enter
    /// fraction by the original's default of 0.5/0.25 — kept
    /// configurable here rather than hard-coded).
    pub fn record_latency(&self, latency_ms: u64) {
        let mut state = self.state.lock();
        if state.latencies.len() == self.window_size {
            state.latencies.pop_front();
        }
        state.latencies.push_back(latency_ms);

        if state.latencies.len() < self.window_size / 2 {
            state.is_degraded = false;
            return;
        }

        let exceed_count = state.latencies.iter().filter(|&&l| l > self.latency_threshold_ms).count();
        let ratio = exceed_count as f32 / state.latencies.len() as f32;

        if !state.is_degraded && ratio >= self.enter_fraction {
            warn!(ratio, "retrieval engine entering degraded mode");
            state.is_degraded = true;
        } else if state.is_degraded && ratio < self.exit_fraction {
            info!("retrieval engine exiting degraded mode");
            state.is_degraded = false;
        }
    }

    #[must_use]
    pub fn should_degrade(&self) -> bool {
        self.state.lock().is_degraded
    }

    /// Snapshot for the owning process to log/export (original's
    /// `CircuitBreaker.get_stats`).
    #[must_use]
    pub fn stats(&self) -> DegradationStats {
        let state = self.state.lock();
        let avg_latency_ms = if state.latencies.is_empty() {
            0.0
        } else {
            state.latencies.iter().sum::<u64>() as f64 / state.latencies.len() as f64
        };
        DegradationStats { avg_latency_ms, window_count: state.latencies.len(), is_degraded: state.is_degraded }
    }
}

/// Point-in-time snapshot of a [`DegradationTracker`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DegradationStats {
    pub avg_latency_ms: f64,
    pub window_count: usize,
    pub is_degraded: bool,
}
