//! Fixed inter-request delay shared by provider clients.
//!
//! The public statistical APIs ask for courtesy spacing between calls. The
//! pacer sleeps just long enough that consecutive requests start at least
//! `interval` apart. It never retries and never backs off.

use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

pub struct RequestPacer {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RequestPacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    /// A pacer that never sleeps (tests, local mocks).
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Block until the next request may start, then mark it as started.
    pub fn wait(&self) {
        let mut last = self.last.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.interval {
                let pause = self.interval - elapsed;
                debug!(pause_ms = pause.as_millis() as u64, "pacing request");
                std::thread::sleep(pause);
            }
        }
        *last = Some(Instant::now());
    }
}

impl Default for RequestPacer {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
