//! Push sessions
//!
//! A push session is the broker-side half of a streaming connection (a
//! WebSocket in practice). It subscribes to its target hubs and queues the
//! wrapped JSON of every update for the transport to send. The broker's
//! system hub counts open sessions and tracks the peak send rate.

use crate::target::TargetOperation;
use livevalue_core::{CounterLeaf, RateMeterLeaf};
use livevalue_hub::{Broker, Hub, ValueConsumer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;

/// Default outbound queue length per session
pub const DEFAULT_QUEUE: usize = 256;

/// Subscriber streaming hub updates to one connection
#[derive(Debug)]
pub struct PushSession {
    alive: AtomicBool,
    outbound: SyncSender<Arc<str>>,
    targets: Vec<Arc<Hub>>,
    connections: Arc<CounterLeaf>,
    sent: Arc<RateMeterLeaf>,
}

impl PushSession {
    /// Open a session on the targets of `op`
    ///
    /// Returns the session and the receiving end of its outbound queue.
    /// Dropping the receiver closes the session on its next update.
    pub fn connect(
        broker: &Broker,
        op: &TargetOperation,
        queue: usize,
    ) -> (Arc<Self>, Receiver<Arc<str>>) {
        let (outbound, inbound) = mpsc::sync_channel(queue.max(1));
        let session = Arc::new(Self {
            alive: AtomicBool::new(true),
            outbound,
            targets: op.targets().to_vec(),
            connections: Arc::clone(broker.connection_counter()),
            sent: Arc::clone(broker.send_meter()),
        });
        for hub in &session.targets {
            hub.add_consumer(session.clone());
        }
        let open = session.connections.increment();
        tracing::debug!(targets = session.targets.len(), open, "push session connected");
        (session, inbound)
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn targets(&self) -> &[Arc<Hub>] {
        &self.targets
    }

    /// Mark the session closed; every hub drops it on its next update
    pub fn close(&self) {
        if self.alive.swap(false, Ordering::AcqRel) {
            let open = self.connections.decrement();
            tracing::debug!(open, "push session closed");
        }
    }
}

impl ValueConsumer for PushSession {
    fn inform_value_update(&self, hub: &Hub) -> bool {
        if !self.is_alive() {
            return false;
        }
        match self.outbound.try_send(hub.to_json()) {
            Ok(()) => {
                self.sent.increment();
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(hub = %hub.name(), "push queue full, dropping update");
                true
            }
            Err(TrySendError::Disconnected(_)) => {
                self.close();
                false
            }
        }
    }
}

impl Drop for PushSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Params;
    use crate::path::NoResolver;
    use crate::target::find_targets;
    use livevalue_core::{names, Literal, ValueCell};
    use livevalue_hub::{BrokerConfig, UpdateKind};

    const TEMP: &str = "http://bizar.aitc.jp/ns/fos/0.1/temp";

    fn setup() -> (tempfile::TempDir, Arc<Broker>, Arc<Hub>) {
        let dir = tempfile::tempdir().unwrap();
        let broker = Broker::new(
            BrokerConfig::default()
                .with_history_dir(dir.path())
                .with_sampler(false),
        )
        .unwrap();
        let hub = broker.get_or_create_hub(&names::hub_name("room1")).unwrap();
        hub.add_leaf(TEMP, Arc::new(ValueCell::scalar("room1-temp")));
        (dir, broker, hub)
    }

    fn publish(broker: &Broker, hub: &Hub, value: i64) {
        let mut tx = broker.prepare_update(UpdateKind::Batch);
        hub.set_value(&mut tx, TEMP, Literal::int(value));
        broker.finish_update(tx);
    }

    fn connect(broker: &Broker) -> (Arc<PushSession>, Receiver<Arc<str>>) {
        let op = find_targets("/fos/ds/read/id/room1", &Params::new(), broker, &NoResolver).unwrap();
        PushSession::connect(broker, &op, 4)
    }

    #[test]
    fn test_session_receives_updates() {
        let (_dir, broker, hub) = setup();
        let (session, updates) = connect(&broker);
        assert_eq!(broker.connection_counter().get(), 1);
        assert_eq!(hub.consumer_count(), 1);

        publish(&broker, &hub, 7);
        let message = updates.try_recv().unwrap();
        assert!(message.starts_with(r#"["room1",{"#));
        assert!(message.contains(r#""temp":7"#));
        assert_eq!(broker.send_meter().count(), 1);
        assert!(session.is_alive());
    }

    #[test]
    fn test_close_unsubscribes_on_next_update() {
        let (_dir, broker, hub) = setup();
        let (session, updates) = connect(&broker);

        session.close();
        session.close();
        assert_eq!(broker.connection_counter().get(), 0);

        publish(&broker, &hub, 1);
        assert!(updates.try_recv().is_err());
        assert_eq!(hub.consumer_count(), 0);
    }

    #[test]
    fn test_dropped_receiver_closes_session() {
        let (_dir, broker, hub) = setup();
        let (session, updates) = connect(&broker);
        drop(updates);

        publish(&broker, &hub, 1);
        assert!(!session.is_alive());
        assert_eq!(hub.consumer_count(), 0);
        assert_eq!(broker.connection_counter().get(), 0);
    }

    #[test]
    fn test_system_hub_reports_connections() {
        let (_dir, broker, _hub) = setup();
        let (_a, _rx_a) = connect(&broker);
        let (_b, _rx_b) = connect(&broker);
        assert!(broker
            .system_hub()
            .formatted()
            .contains(r#""connections":2"#));
    }
}
