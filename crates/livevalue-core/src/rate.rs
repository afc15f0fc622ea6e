//! Peak event-rate meter
//!
//! A [`RateMeterLeaf`] counts events and publishes the highest events-per-
//! second rate observed so far. It does not own a timer: a shared sampler
//! calls [`RateMeterLeaf::sample`] periodically for every meter.

use crate::leaf::{Leaf, OwnerSlot, Refresh};
use crate::{Literal, Timestamp};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Sliding observation window between two samples
#[derive(Debug, Clone, Copy)]
pub struct RateWindow {
    prev_count: i64,
    prev_at: Instant,
}

impl RateWindow {
    pub fn new(count: i64, at: Instant) -> Self {
        Self {
            prev_count: count,
            prev_at: at,
        }
    }

    /// Close the window at `(count, at)` and start the next one
    ///
    /// Returns the normalized per-second rate when the window lasted longer
    /// than `min_window`; shorter windows yield `None`.
    pub fn observe(&mut self, count: i64, at: Instant, min_window: Duration) -> Option<i64> {
        let elapsed = at.saturating_duration_since(self.prev_at);
        let delta = count - self.prev_count;
        self.prev_count = count;
        self.prev_at = at;

        if elapsed <= min_window {
            return None;
        }
        let millis = elapsed.as_millis().max(1) as i64;
        Some(delta.saturating_mul(1000) / millis)
    }
}

/// Leaf publishing the peak events-per-second rate as an `xsd:integer`
#[derive(Debug)]
pub struct RateMeterLeaf {
    name: String,
    count: AtomicI64,
    max: AtomicI64,
    min_window: Duration,
    window: Mutex<RateWindow>,
    updated_at: Mutex<Option<Timestamp>>,
    owner: OwnerSlot,
}

impl RateMeterLeaf {
    /// Default minimum window length for a sample to count
    pub const DEFAULT_MIN_WINDOW: Duration = Duration::from_millis(500);

    pub fn new(name: impl Into<String>) -> Self {
        Self::with_min_window(name, Self::DEFAULT_MIN_WINDOW)
    }

    pub fn with_min_window(name: impl Into<String>, min_window: Duration) -> Self {
        Self {
            name: name.into(),
            count: AtomicI64::new(0),
            max: AtomicI64::new(0),
            min_window,
            window: Mutex::new(RateWindow::new(0, Instant::now())),
            updated_at: Mutex::new(None),
            owner: OwnerSlot::default(),
        }
    }

    /// Record one event
    pub fn increment(&self) -> i64 {
        self.count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Take back one event
    pub fn decrement(&self) -> i64 {
        self.count.fetch_sub(1, Ordering::AcqRel) - 1
    }

    /// Total events recorded
    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Acquire)
    }

    /// Highest rate observed since the last reset
    pub fn peak(&self) -> i64 {
        self.max.load(Ordering::Acquire)
    }

    /// Sample the event count at `now`
    ///
    /// Raises the recorded peak and refreshes the owning hub when the rate of
    /// the window ending at `now` beats it. Returns whether the peak moved.
    pub fn sample(&self, now: Instant) -> bool {
        let rate = {
            let mut window = self.window.lock();
            window.observe(self.count(), now, self.min_window)
        };
        let Some(rate) = rate else {
            return false;
        };
        if self.max.fetch_max(rate, Ordering::AcqRel) >= rate {
            return false;
        }

        let at = chrono::Utc::now();
        *self.updated_at.lock() = Some(at);
        tracing::debug!(leaf = %self.name, peak = rate, "new peak rate");
        self.owner.refresh(at);
        true
    }

    fn reset(&self, at: Timestamp) {
        self.max.store(0, Ordering::Release);
        *self.updated_at.lock() = Some(at);
    }
}

/// Writing any value resets the recorded peak to zero. The owning hub is
/// already part of the writing transaction, so no refresh is triggered here.
impl Leaf for RateMeterLeaf {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_current_value(&self, _value: Literal, at: Timestamp) {
        self.reset(at);
    }

    fn set_current_values(&self, _values: &[Literal], at: Timestamp) {
        self.reset(at);
    }

    fn current_value(&self) -> Arc<[Literal]> {
        Arc::from(vec![Literal::integer(self.peak())])
    }

    fn is_array(&self) -> bool {
        false
    }

    fn updated_at(&self) -> Option<Timestamp> {
        *self.updated_at.lock()
    }

    fn attach(&self, owner: Weak<dyn Refresh>) {
        self.owner.set(owner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_normalizes_to_per_second() {
        let start = Instant::now();
        let mut window = RateWindow::new(0, start);
        let rate = window.observe(50, start + Duration::from_secs(2), Duration::from_millis(500));
        assert_eq!(rate, Some(25));
    }

    #[test]
    fn test_short_window_is_skipped_but_advances() {
        let start = Instant::now();
        let mut window = RateWindow::new(0, start);
        let min = Duration::from_millis(500);
        assert_eq!(window.observe(10, start + Duration::from_millis(200), min), None);
        // The next window starts from the skipped sample
        let rate = window.observe(20, start + Duration::from_millis(1200), min);
        assert_eq!(rate, Some(10));
    }

    #[test]
    fn test_peak_only_rises() {
        let meter = RateMeterLeaf::new("leaf#send");
        let start = Instant::now();
        *meter.window.lock() = RateWindow::new(0, start);

        for _ in 0..30 {
            meter.increment();
        }
        assert!(meter.sample(start + Duration::from_secs(1)));
        assert_eq!(meter.peak(), 30);

        for _ in 0..5 {
            meter.increment();
        }
        assert!(!meter.sample(start + Duration::from_secs(2)));
        assert_eq!(meter.peak(), 30);
        assert_eq!(&*meter.current_value(), &[Literal::integer(30)]);
    }

    #[test]
    fn test_write_resets_peak() {
        let meter = RateMeterLeaf::new("leaf#send");
        let start = Instant::now();
        *meter.window.lock() = RateWindow::new(0, start);
        for _ in 0..10 {
            meter.increment();
        }
        meter.sample(start + Duration::from_secs(1));
        assert_eq!(meter.peak(), 10);

        meter.set_current_value(Literal::int(123), chrono::Utc::now());
        assert_eq!(meter.peak(), 0);
        assert_eq!(meter.count(), 10);
    }
}
