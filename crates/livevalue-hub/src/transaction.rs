//! Update Transaction - Batched leaf writes committed once per hub
//!
//! ## Lifecycle
//!
//! ```text
//! Idle --prepare_update--> Open --finish_update--> Committing --> Idle
//! ```
//!
//! - **Open**: the process-wide write lock is held and the commit timestamp
//!   is fixed. Leaf writes go through their hub and apply immediately; the
//!   hub is recorded in the touched set.
//! - **Committing**: every touched hub is published with the commit
//!   timestamp, exactly once, then the lock is released.
//!
//! A transaction dropped without [`finish`](UpdateTransaction::finish)
//! releases the lock without publishing anything. A transaction that is
//! leaked instead (`std::mem::forget`) keeps the lock forever and blocks
//! every later writer.

use crate::Hub;
use indexmap::IndexMap;
use livevalue_core::Timestamp;
use parking_lot::RwLockWriteGuard;
use std::sync::Arc;

/// Producer class of a transaction
///
/// Both kinds follow the same locking discipline; the kind is carried for
/// diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// Single-triple write coming from the graph engine
    Triple,
    /// Multi-value write from a transport or producer
    Batch,
}

/// An open write transaction
///
/// Created by [`Broker::prepare_update`](crate::Broker::prepare_update) and
/// consumed by [`Broker::finish_update`](crate::Broker::finish_update).
pub struct UpdateTransaction<'a> {
    guard: Option<RwLockWriteGuard<'a, ()>>,
    at: Timestamp,
    kind: UpdateKind,
    workers: usize,
    touched: IndexMap<String, Arc<Hub>>,
    finished: bool,
}

impl<'a> UpdateTransaction<'a> {
    pub(crate) fn new(guard: RwLockWriteGuard<'a, ()>, kind: UpdateKind, workers: usize) -> Self {
        Self {
            guard: Some(guard),
            at: chrono::Utc::now(),
            kind,
            workers: workers.max(1),
            touched: IndexMap::new(),
            finished: false,
        }
    }

    /// Commit timestamp shared by every hub published by this transaction
    pub fn at(&self) -> Timestamp {
        self.at
    }

    pub fn kind(&self) -> UpdateKind {
        self.kind
    }

    /// Record `hub` as touched; a hub is recorded once however often it is written
    pub fn touch(&mut self, hub: Arc<Hub>) {
        if !self.touched.contains_key(hub.name()) {
            self.touched.insert(hub.name().to_string(), hub);
        }
    }

    /// Number of distinct hubs written so far
    pub fn touched_count(&self) -> usize {
        self.touched.len()
    }

    /// Whether `hub_name` has been written in this transaction
    pub fn is_touched(&self, hub_name: &str) -> bool {
        self.touched.contains_key(hub_name)
    }

    /// Publish every touched hub and release the write lock
    ///
    /// Returns the number of hubs published.
    pub(crate) fn finish(mut self) -> usize {
        let hubs: Vec<Arc<Hub>> = std::mem::take(&mut self.touched).into_values().collect();
        let at = self.at;

        if self.workers > 1 && hubs.len() > 1 {
            let chunk = hubs.len().div_ceil(self.workers);
            std::thread::scope(|scope| {
                for part in hubs.chunks(chunk) {
                    scope.spawn(move || {
                        for hub in part {
                            hub.update(at);
                        }
                    });
                }
            });
        } else {
            for hub in &hubs {
                hub.update(at);
            }
        }

        self.finished = true;
        self.guard.take();
        tracing::debug!(kind = ?self.kind, hubs = hubs.len(), "update committed");
        hubs.len()
    }
}

impl Drop for UpdateTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                kind = ?self.kind,
                touched = self.touched.len(),
                "update transaction dropped without finish, changes not published"
            );
        }
    }
}

impl std::fmt::Debug for UpdateTransaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateTransaction")
            .field("at", &self.at)
            .field("kind", &self.kind)
            .field("touched", &self.touched.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Broker, BrokerConfig};
    use livevalue_core::names;
    use livevalue_core::{Literal, ValueCell};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn broker(workers: usize) -> (tempfile::TempDir, Arc<Broker>) {
        let dir = tempfile::tempdir().unwrap();
        let broker = Broker::new(
            BrokerConfig::default()
                .with_history_dir(dir.path())
                .with_commit_workers(workers)
                .with_sampler(false),
        )
        .unwrap();
        (dir, broker)
    }

    fn counted_hub(broker: &Broker, id: &str, updates: &Arc<AtomicUsize>) -> Arc<Hub> {
        let hub = broker.get_or_create_hub(&names::hub_name(id)).unwrap();
        hub.add_leaf("http://x/a", Arc::new(ValueCell::scalar(format!("{id}-a"))));
        hub.add_leaf("http://x/b", Arc::new(ValueCell::scalar(format!("{id}-b"))));
        let seen = Arc::clone(updates);
        hub.add_consumer(Arc::new(move |_: &Hub| {
            seen.fetch_add(1, Ordering::SeqCst);
            true
        }));
        hub
    }

    #[test]
    fn test_hub_updated_once_per_transaction() {
        let (_dir, broker) = broker(1);
        let updates = Arc::new(AtomicUsize::new(0));
        let hub = counted_hub(&broker, "once", &updates);

        let mut tx = broker.prepare_update(UpdateKind::Batch);
        hub.set_value(&mut tx, "http://x/a", Literal::int(1));
        hub.set_value(&mut tx, "http://x/b", Literal::int(2));
        hub.set_value(&mut tx, "http://x/a", Literal::int(3));
        assert_eq!(tx.touched_count(), 1);
        assert_eq!(broker.finish_update(tx), 1);

        assert_eq!(updates.load(Ordering::SeqCst), 1);
        assert_eq!(hub.time_series().unwrap().tail(0).len(), 1);
        assert!(hub.formatted().ends_with(r#""b":2,"a":3}"#));
    }

    #[test]
    fn test_parallel_commit_updates_every_hub_once() {
        let (_dir, broker) = broker(4);
        let updates = Arc::new(AtomicUsize::new(0));
        let hubs: Vec<Arc<Hub>> = (0..16)
            .map(|i| counted_hub(&broker, &format!("p{i}"), &updates))
            .collect();

        let mut tx = broker.prepare_update(UpdateKind::Batch);
        let at = tx.at();
        for hub in &hubs {
            hub.set_value(&mut tx, "http://x/a", Literal::int(7));
            hub.set_value(&mut tx, "http://x/b", Literal::int(8));
        }
        assert_eq!(broker.finish_update(tx), 16);

        assert_eq!(updates.load(Ordering::SeqCst), 16);
        for hub in &hubs {
            assert_eq!(hub.current_value().unwrap().taken_at(), at);
        }
    }

    #[test]
    fn test_undefined_leaf_does_not_touch() {
        let (_dir, broker) = broker(1);
        let updates = Arc::new(AtomicUsize::new(0));
        let hub = counted_hub(&broker, "undef", &updates);

        let mut tx = broker.prepare_update(UpdateKind::Batch);
        hub.set_value(&mut tx, "http://x/a", Literal::int(1));
        broker.finish_update(tx);
        let before = hub.formatted();

        let mut tx = broker.prepare_update(UpdateKind::Triple);
        assert!(!hub.set_value(&mut tx, "http://x/missing", Literal::int(9)));
        assert!(!hub.set_values(&mut tx, "http://x/missing", &[Literal::int(9)]));
        assert!(!tx.is_touched(hub.name()));
        assert_eq!(broker.finish_update(tx), 0);

        assert_eq!(hub.formatted(), before);
        assert_eq!(updates.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropped_transaction_releases_lock() {
        let (_dir, broker) = broker(1);
        let updates = Arc::new(AtomicUsize::new(0));
        let hub = counted_hub(&broker, "dropped", &updates);

        {
            let mut tx = broker.prepare_update(UpdateKind::Batch);
            hub.set_value(&mut tx, "http://x/a", Literal::int(1));
        }
        assert_eq!(updates.load(Ordering::SeqCst), 0);
        assert!(hub.current_value().is_none());

        let tx = broker.prepare_update(UpdateKind::Batch);
        assert_eq!(broker.finish_update(tx), 0);
    }

    #[test]
    fn test_writers_are_serialized() {
        let (_dir, broker) = broker(1);
        let tx = broker.prepare_update(UpdateKind::Batch);

        let other = Arc::clone(&broker);
        let started = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&started);
        let handle = std::thread::spawn(move || {
            let tx = other.prepare_update(UpdateKind::Batch);
            flag.store(1, Ordering::SeqCst);
            other.finish_update(tx);
        });

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(started.load(Ordering::SeqCst), 0);
        broker.finish_update(tx);
        handle.join().unwrap();
        assert_eq!(started.load(Ordering::SeqCst), 1);
    }
}
