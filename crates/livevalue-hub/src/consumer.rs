//! Consumer fan-out
//!
//! A consumer is told about every published update of the hubs it subscribed
//! to. Returning `false` from the callback unsubscribes it; the hub removes
//! such consumers only after the whole notification pass.
//!
//! Notification runs synchronously on the publishing thread. A consumer that
//! blocks stalls the commit that published the hub, so transports should
//! hand updates off quickly; [`ChannelConsumer`] does exactly that.

use crate::Hub;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;

/// Receiver of hub updates
pub trait ValueConsumer: Send + Sync {
    /// Inform the consumer of `hub`'s new value; return `false` to unsubscribe
    fn inform_value_update(&self, hub: &Hub) -> bool;
}

impl<F> ValueConsumer for F
where
    F: Fn(&Hub) -> bool + Send + Sync,
{
    fn inform_value_update(&self, hub: &Hub) -> bool {
        self(hub)
    }
}

/// Identity comparison for consumers, ignoring vtables
pub(crate) fn same_consumer(a: &Arc<dyn ValueConsumer>, b: &Arc<dyn ValueConsumer>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Consumer that queues each update's wrapped JSON on a bounded channel
///
/// Delivery never blocks the publisher: when the queue is full the update is
/// dropped for this consumer. Once the receiving side is gone the consumer
/// unsubscribes itself.
#[derive(Debug)]
pub struct ChannelConsumer {
    sender: SyncSender<Arc<str>>,
}

impl ChannelConsumer {
    /// Create a consumer and the receiver its updates arrive on
    pub fn bounded(capacity: usize) -> (Arc<Self>, Receiver<Arc<str>>) {
        let (sender, receiver) = mpsc::sync_channel(capacity);
        (Arc::new(Self { sender }), receiver)
    }
}

impl ValueConsumer for ChannelConsumer {
    fn inform_value_update(&self, hub: &Hub) -> bool {
        match self.sender.try_send(hub.to_json()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(hub = %hub.name(), "consumer queue full, dropping update");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livevalue_core::names;

    #[test]
    fn test_channel_consumer_delivers_wrapped_json() {
        let hub = Hub::new(names::hub_name("ch"), None);
        let (consumer, updates) = ChannelConsumer::bounded(4);
        hub.add_consumer(consumer);

        hub.update(chrono::Utc::now());
        let message = updates.try_recv().unwrap();
        assert_eq!(message, hub.to_json());
        assert!(message.starts_with(r#"["ch",{"#));
    }

    #[test]
    fn test_channel_consumer_drops_when_full() {
        let hub = Hub::new(names::hub_name("full"), None);
        let (consumer, updates) = ChannelConsumer::bounded(1);
        hub.add_consumer(consumer);

        hub.update(chrono::Utc::now());
        hub.update(chrono::Utc::now());
        assert_eq!(hub.consumer_count(), 1);
        assert!(updates.try_recv().is_ok());
        assert!(updates.try_recv().is_err());
    }

    #[test]
    fn test_channel_consumer_unsubscribes_when_receiver_dropped() {
        let hub = Hub::new(names::hub_name("gone"), None);
        let (consumer, updates) = ChannelConsumer::bounded(1);
        hub.add_consumer(consumer);
        drop(updates);

        hub.update(chrono::Utc::now());
        assert_eq!(hub.consumer_count(), 0);
    }
}
