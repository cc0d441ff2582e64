use std::hint;
use std::thread;
use std::time::{Duration, Instant};

/// Adaptive backoff for polling state in the shared segment.
///
/// Progressively increases wait time: spin with PAUSE → yield to OS → sleep.
#[derive(Debug)]
pub struct Backoff {
    step: u32,
}

impl Backoff {
    const SPIN_LIMIT: u32 = 6; // 2^6 = 64 spins max before yielding
    const YIELD_LIMIT: u32 = 10; // Then sleep
    const SLEEP: Duration = Duration::from_millis(1);

    /// Creates a new backoff instance.
    #[inline]
    pub fn new() -> Self {
        Self { step: 0 }
    }

    /// Light spin with PAUSE hints.
    #[inline]
    pub fn spin(&mut self) {
        let spins = 1 << self.step.min(Self::SPIN_LIMIT);
        for _ in 0..spins {
            hint::spin_loop();
        }
        if self.step <= Self::SPIN_LIMIT {
            self.step += 1;
        }
    }

    /// Heavier backoff: spin, then yield, then sleep in short naps.
    #[inline]
    pub fn snooze(&mut self) {
        if self.step <= Self::SPIN_LIMIT {
            self.spin();
        } else if self.step <= Self::YIELD_LIMIT {
            thread::yield_now();
            self.step += 1;
        } else {
            thread::sleep(Self::SLEEP);
        }
    }

    /// Snoozes until `ready` holds or `deadline` passes. Returns the last
    /// value of `ready`.
    pub fn wait_until<F>(&mut self, deadline: Instant, mut ready: F) -> bool
    where
        F: FnMut() -> bool,
    {
        loop {
            if ready() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            self.snooze();
        }
    }

    /// Check if we've moved on to sleeping.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.step > Self::YIELD_LIMIT
    }

    /// Reset for next wait cycle.
    #[inline]
    pub fn reset(&mut self) {
        self.step = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}
