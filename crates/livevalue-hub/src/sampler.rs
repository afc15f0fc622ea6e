//! Shared scheduler for rate-meter leaves
//!
//! All [`RateMeterLeaf`]s of a broker are tracked in one [`RateMeters`] set
//! and sampled together by a single [`RateSampler`] thread.

use crate::Result;
use livevalue_core::RateMeterLeaf;
use parking_lot::Mutex;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Set of meters sampled on every tick
///
/// Meters are held weakly; dropped meters fall out on the next sample.
#[derive(Debug, Default)]
pub struct RateMeters {
    meters: Mutex<Vec<Weak<RateMeterLeaf>>>,
}

impl RateMeters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start sampling `meter`
    pub fn track(&self, meter: &Arc<RateMeterLeaf>) {
        self.meters.lock().push(Arc::downgrade(meter));
    }

    pub fn len(&self) -> usize {
        self.meters.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample every live meter at `now`; returns how many raised their peak
    pub fn sample_all(&self, now: Instant) -> usize {
        let live: Vec<Arc<RateMeterLeaf>> = {
            let mut meters = self.meters.lock();
            meters.retain(|m| m.strong_count() > 0);
            meters.iter().filter_map(Weak::upgrade).collect()
        };
        live.iter().filter(|m| m.sample(now)).count()
    }
}

/// Background thread driving a [`RateMeters`] set
///
/// The thread stops when the sampler is dropped.
#[derive(Debug)]
pub struct RateSampler {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RateSampler {
    /// Spawn the sampler thread, ticking every `interval`
    pub fn spawn(meters: Arc<RateMeters>, interval: Duration) -> Result<Self> {
        let (stop, stopped) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("livevalue-rate-sampler".to_string())
            .spawn(move || loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        meters.sample_all(Instant::now());
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;
        tracing::debug!(interval_ms = interval.as_millis() as u64, "rate sampler started");
        Ok(Self {
            stop: Some(stop),
            handle: Some(handle),
        })
    }
}

impl Drop for RateSampler {
    fn drop(&mut self) {
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("rate sampler thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropped_meters_are_forgotten() {
        let meters = RateMeters::new();
        let kept = Arc::new(RateMeterLeaf::new("kept"));
        {
            let gone = Arc::new(RateMeterLeaf::new("gone"));
            meters.track(&gone);
        }
        meters.track(&kept);
        assert_eq!(meters.len(), 2);

        meters.sample_all(Instant::now());
        assert_eq!(meters.len(), 1);
    }

    #[test]
    fn test_sample_all_raises_peaks() {
        let meters = RateMeters::new();
        let meter = Arc::new(RateMeterLeaf::with_min_window("m", Duration::from_millis(10)));
        meters.track(&meter);

        for _ in 0..100 {
            meter.increment();
        }
        let later = Instant::now() + Duration::from_secs(1);
        assert_eq!(meters.sample_all(later), 1);
        assert!(meter.peak() > 0);
    }

    #[test]
    fn test_sampler_thread_stops_on_drop() {
        let meters = Arc::new(RateMeters::new());
        let meter = Arc::new(RateMeterLeaf::with_min_window("m", Duration::from_millis(1)));
        meters.track(&meter);

        let sampler = RateSampler::spawn(Arc::clone(&meters), Duration::from_millis(5)).unwrap();
        for _ in 0..50 {
            meter.increment();
        }
        std::thread::sleep(Duration::from_millis(100));
        drop(sampler);

        assert!(meter.peak() > 0);
        assert_eq!(Arc::strong_count(&meters), 1);
    }
}
