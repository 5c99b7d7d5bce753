//! Time sources for stack timers and the warp budget
//!
//! Timers are measured in wall/monotonic time, never in ticks, so "wait 2.5
//! seconds" lasts 2.5 seconds at any framerate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin; never decreases
    fn now_ms(&self) -> f64;
}

/// Real monotonic time
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    micros: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_ms(&self, ms: f64) {
        let delta = (ms.max(0.0) * 1000.0).round() as u64;
        self.micros.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.micros.load(Ordering::SeqCst) as f64 / 1000.0
    }
}

/// Timer armed by a waiting construct, stored on its stack frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StackTimer {
    pub start_ms: f64,
    pub duration_ms: f64,
}

impl StackTimer {
    pub fn start(now_ms: f64, duration_ms: f64) -> Self {
        Self {
            start_ms: now_ms,
            duration_ms,
        }
    }

    pub fn finished(&self, now_ms: f64) -> bool {
        now_ms - self.start_ms >= self.duration_ms
    }
}
