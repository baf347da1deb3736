// src/worker/clock.rs

//! Time sources inside a worker.
//!
//! Test code sees a replaceable [`Clock`]; it may swap in a [`FakeClock`]
//! and move time wherever it likes. Test durations are taken with a
//! [`Stopwatch`], which reads `Instant` directly and never goes through the
//! replaceable clock.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::debug;

pub trait Clock: Send + Sync + Debug {
    /// Milliseconds since the Unix epoch, as this clock sees it.
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_millis() as u64,
            Err(e) => {
                debug!(error = %e, "system clock is before the Unix epoch; reporting 0");
                0
            }
        }
    }
}

/// Synthetic clock that jumps `step_ms` forward on every read.
#[derive(Debug)]
pub struct FakeClock {
    now_ms: AtomicU64,
    step_ms: u64,
}

impl FakeClock {
    pub fn new(start_ms: u64, step_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(start_ms),
            step_ms,
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.fetch_add(self.step_ms, Ordering::SeqCst) + self.step_ms
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_moves_on_every_read() {
        let clock = FakeClock::new(1_000, 500);
        assert_eq!(clock.now_ms(), 1_500);
        assert_eq!(clock.now_ms(), 2_000);
        clock.advance(10_000);
        assert_eq!(clock.now_ms(), 12_500);
    }

    #[test]
    fn system_clock_reports_wall_time() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now_ms() > 1_577_836_800_000);
    }

    #[test]
    fn stopwatch_ignores_fake_time() {
        let watch = Stopwatch::start();
        let clock = FakeClock::new(0, 0);
        clock.advance(3_600_000);
        assert!(watch.elapsed_ms() < 1_000);
    }
}
