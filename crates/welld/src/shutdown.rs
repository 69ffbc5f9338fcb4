//! Shutdown flag shared between the signal handler and the scheduler thread.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use well_core::Clock;

#[derive(Debug, Default)]
pub struct Shutdown {
    requested: Mutex<bool>,
    wake: Condvar,
}

impl Shutdown {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn request(&self) {
        *self.requested.lock().unwrap_or_else(|e| e.into_inner()) = true;
        self.wake.notify_all();
    }

    pub fn is_requested(&self) -> bool {
        *self.requested.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sleep up to `duration`, returning early once shutdown is requested.
    pub fn wait(&self, duration: Duration) {
        let guard = self.requested.lock().unwrap_or_else(|e| e.into_inner());
        let _ = self
            .wake
            .wait_timeout_while(guard, duration, |requested| !*requested);
    }
}

/// Wall clock whose sleep is cut short by shutdown.
#[derive(Debug, Clone)]
pub struct ShutdownClock {
    shutdown: Arc<Shutdown>,
}

impl ShutdownClock {
    pub fn new(shutdown: Arc<Shutdown>) -> Self {
        Self { shutdown }
    }
}

impl Clock for ShutdownClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        self.shutdown.wait(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sleep_runs_full_duration() {
        let clock = ShutdownClock::new(Shutdown::new());
        let start = Instant::now();
        clock.sleep(Duration::from_millis(50));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_request_wakes_sleeper() {
        let shutdown = Shutdown::new();
        let clock = ShutdownClock::new(Arc::clone(&shutdown));
        let sleeper = std::thread::spawn(move || {
            let start = Instant::now();
            clock.sleep(Duration::from_secs(30));
            start.elapsed()
        });

        std::thread::sleep(Duration::from_millis(50));
        shutdown.request();
        let slept = sleeper.join().unwrap();
        assert!(slept < Duration::from_secs(5));
        assert!(shutdown.is_requested());
    }

    #[test]
    fn test_sleep_after_request_returns_immediately() {
        let shutdown = Shutdown::new();
        shutdown.request();
        let start = Instant::now();
        shutdown.wait(Duration::from_secs(30));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
