//! A throttle guard matching the source's `OnceInInterval` helper: lets a
//! background loop call `should_run()` on every tick without re-running
//! its body more often than the configured interval.

use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct OnceInInterval {
    interval: Duration,
    last_run: Option<Instant>,
}

impl OnceInInterval {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_run: None,
        }
    }

    /// Returns `true` (and resets the clock) if `interval` has elapsed
    /// since the last time this returned `true`.
    pub fn should_run(&mut self) -> bool {
        let now = Instant::now();
        match self.last_run {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last_run = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_per_interval() {
        let mut guard = OnceInInterval::new(Duration::from_millis(50));
        assert!(guard.should_run());
        assert!(!guard.should_run());
        std::thread::sleep(Duration::from_millis(60));
        assert!(guard.should_run());
    }
}
