//! Rolling-window rate limiter shared by all worker threads

use std::collections::VecDeque;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// Permits at most `max_per_window` acquisitions within any rolling window.
///
/// The timestamp queue is only touched while the lock is held, including
/// the sleep, so waiting callers queue behind each other in lock order.
#[derive(Debug)]
pub struct RateLimiter {
    max_per_window: usize,
    window: Duration,
    granted: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Limiter over a one-second window. A limit of 0 is treated as 1.
    pub fn per_second(max_per_second: usize) -> Self {
        Self::with_window(max_per_second, Duration::from_secs(1))
    }

    pub fn with_window(max_per_window: usize, window: Duration) -> Self {
        let max_per_window = max_per_window.max(1);
        Self {
            max_per_window,
            window,
            granted: Mutex::new(VecDeque::with_capacity(max_per_window)),
        }
    }

    pub fn max_per_window(&self) -> usize {
        self.max_per_window
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Block until a slot is free, then record the acquisition. Never fails.
    pub fn acquire(&self) {
        // Nothing here can leave the queue inconsistent, so a poisoned lock is still usable
        let mut granted = self.granted.lock().unwrap_or_else(|e| e.into_inner());

        let now = Instant::now();
        Self::prune(&mut granted, now, self.window);

        if granted.len() >= self.max_per_window {
            if let Some(&oldest) = granted.front() {
                let sleep_time = self.window.saturating_sub(now.duration_since(oldest));
                if !sleep_time.is_zero() {
                    log::debug!("Rate limiting: sleeping for {:.3}s", sleep_time.as_secs_f64());
                    thread::sleep(sleep_time);
                }
            }
            Self::prune(&mut granted, Instant::now(), self.window);
        }

        granted.push_back(Instant::now());
    }

    /// Drop acquisitions that have left the window
    fn prune(granted: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(&oldest) = granted.front() {
            if now.duration_since(oldest) >= window {
                granted.pop_front();
            } else {
                break;
            }
        }
    }

    /// Acquisitions currently inside the window
    pub fn in_flight(&self) -> usize {
        let mut granted = self.granted.lock().unwrap_or_else(|e| e.into_inner());
        Self::prune(&mut granted, Instant::now(), self.window);
        granted.len()
    }
}
