//! Broker - Process-wide registries, commit lock and system statistics
//!
//! The broker owns every hub and globally registered leaf, the write lock
//! that serializes update transactions, and the `_system` hub publishing
//! push-connection statistics.
//!
//! ## Initialization order
//!
//! 1. configuration
//! 2. hub and leaf registries
//! 3. the volatile system hub and its counter and rate-meter leaves
//! 4. the shared rate sampler thread, when enabled
//!
//! ## Triples
//!
//! The graph engine hands every added triple to
//! [`classify_triple`](Broker::classify_triple). A triple whose subject is a
//! hub name and whose object is a leaf or array name registers the leaf on
//! the hub under the triple's predicate. A triple whose subject is a known
//! hub and whose object is a literal writes that value. Everything else is
//! left to the graph store.

use crate::config::BrokerConfig;
use crate::sampler::{RateMeters, RateSampler};
use crate::scope::ReadContext;
use crate::transaction::{UpdateKind, UpdateTransaction};
use crate::{Error, Hub, Result};
use dashmap::DashMap;
use livevalue_core::names::{self, LeafKind};
use livevalue_core::{CounterLeaf, Leaf, Literal, RateMeterLeaf, ValueCell};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Instant;

/// Object position of a triple offered to the broker
#[derive(Debug, Clone, PartialEq)]
pub enum TripleObject {
    Iri(String),
    Literal(Literal),
}

/// What the broker did with a triple
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripleDisposition {
    /// A leaf was registered on a hub; the triple also belongs in the graph
    Registered,
    /// The literal was consumed as a live value write
    ValueWritten,
    /// Not broker vocabulary
    Ignored,
}

/// The realtime value broker
pub struct Broker {
    config: BrokerConfig,
    commit_lock: RwLock<()>,
    hubs: DashMap<String, Arc<Hub>>,
    hubs_by_id: DashMap<String, Arc<Hub>>,
    leaves: DashMap<String, Arc<dyn Leaf>>,
    rate_meters: Arc<RateMeters>,
    system: Arc<Hub>,
    connections: Arc<CounterLeaf>,
    send_meter: Arc<RateMeterLeaf>,
    sampler: Mutex<Option<RateSampler>>,
}

impl Broker {
    /// Create a broker and its system hub
    ///
    /// Fails only if the rate sampler thread cannot be spawned.
    pub fn new(config: BrokerConfig) -> Result<Arc<Self>> {
        let system = Hub::new(names::hub_name(names::SYSTEM_ID), Some(config.history_dir.as_path()));
        system.set_volatile();

        let connections = Arc::new(CounterLeaf::new(names::CONNECTIONS_LEAF));
        let send_meter = Arc::new(RateMeterLeaf::with_min_window(
            names::PEAK_SEND_RATE_LEAF,
            config.rate_min_window(),
        ));
        system.add_leaf(names::CONNECTIONS_PREDICATE, connections.clone());
        system.add_leaf(names::PEAK_SEND_RATE_PREDICATE, send_meter.clone());

        let rate_meters = Arc::new(RateMeters::new());
        rate_meters.track(&send_meter);

        let broker = Self {
            commit_lock: RwLock::new(()),
            hubs: DashMap::new(),
            hubs_by_id: DashMap::new(),
            leaves: DashMap::new(),
            rate_meters,
            system: Arc::clone(&system),
            connections: Arc::clone(&connections),
            send_meter: Arc::clone(&send_meter),
            sampler: Mutex::new(None),
            config,
        };
        broker.insert_hub(system);
        broker
            .leaves
            .insert(connections.name().to_string(), connections);
        broker.leaves.insert(send_meter.name().to_string(), send_meter);

        if broker.config.start_sampler {
            let sampler = RateSampler::spawn(
                Arc::clone(&broker.rate_meters),
                broker.config.rate_sample_interval(),
            )?;
            *broker.sampler.lock() = Some(sampler);
        }

        tracing::debug!(
            history_dir = %broker.config.history_dir.display(),
            commit_workers = broker.config.commit_workers(),
            "broker initialized"
        );
        Ok(Arc::new(broker))
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    // ========================================================================
    // Registries
    // ========================================================================

    /// Hub registered under its full name
    pub fn hub(&self, name: &str) -> Option<Arc<Hub>> {
        self.hubs.get(name).map(|h| Arc::clone(h.value()))
    }

    /// Hub registered under its local id
    pub fn hub_by_id(&self, id: &str) -> Option<Arc<Hub>> {
        self.hubs_by_id.get(id).map(|h| Arc::clone(h.value()))
    }

    /// Like [`hub`](Self::hub), failing with [`Error::UnknownHub`]
    pub fn require_hub(&self, name: &str) -> Result<Arc<Hub>> {
        self.hub(name).ok_or_else(|| Error::UnknownHub(name.to_string()))
    }

    /// Existing hub named `name`, or a new one bound to the history directory
    pub fn get_or_create_hub(&self, name: &str) -> Result<Arc<Hub>> {
        if names::hub_local_id(name).is_none() {
            return Err(livevalue_core::Error::IllegalHubName(name.to_string()).into());
        }
        if let Some(hub) = self.hub(name) {
            return Ok(hub);
        }
        let hub = Hub::new(name, Some(self.config.history_dir.as_path()));
        tracing::debug!(hub = %name, "hub created");
        Ok(self.insert_hub(hub))
    }

    fn insert_hub(&self, hub: Arc<Hub>) -> Arc<Hub> {
        let hub = Arc::clone(
            self.hubs
                .entry(hub.name().to_string())
                .or_insert(hub)
                .value(),
        );
        self.hubs_by_id
            .insert(hub.id().to_string(), Arc::clone(&hub));
        hub
    }

    /// All registered hubs, in no particular order
    pub fn hubs(&self) -> Vec<Arc<Hub>> {
        self.hubs.iter().map(|h| Arc::clone(h.value())).collect()
    }

    /// Existing leaf named `name`, or a new value cell of the kind its name encodes
    pub fn register_leaf(&self, name: &str) -> Result<Arc<dyn Leaf>> {
        let array = match names::leaf_kind(name) {
            Some(LeafKind::Scalar) => false,
            Some(LeafKind::Array) => true,
            None => return Err(livevalue_core::Error::IllegalLeafName(name.to_string()).into()),
        };
        let leaf = self
            .leaves
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ValueCell::new(name, array)) as Arc<dyn Leaf>);
        Ok(Arc::clone(leaf.value()))
    }

    /// Globally registered leaf
    pub fn leaf(&self, name: &str) -> Option<Arc<dyn Leaf>> {
        self.leaves.get(name).map(|l| Arc::clone(l.value()))
    }

    /// Register a peak-rate meter on `hub` and schedule it for sampling
    pub fn add_rate_meter(&self, hub: &Hub, predicate: &str, name: &str) -> Arc<RateMeterLeaf> {
        let meter = Arc::new(RateMeterLeaf::with_min_window(
            name,
            self.config.rate_min_window(),
        ));
        if hub.add_leaf(predicate, meter.clone()) {
            self.leaves.insert(name.to_string(), meter.clone());
            self.rate_meters.track(&meter);
        }
        meter
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Open an update transaction, blocking until no other one is open
    pub fn prepare_update(&self, kind: UpdateKind) -> UpdateTransaction<'_> {
        UpdateTransaction::new(self.commit_lock.write(), kind, self.config.commit_workers())
    }

    /// Publish every hub touched by `tx` and release the write lock
    ///
    /// Returns the number of hubs published.
    pub fn finish_update(&self, tx: UpdateTransaction<'_>) -> usize {
        tx.finish()
    }

    /// Offer a triple to the broker
    ///
    /// Registration creates the hub and leaf on first reference. A value
    /// write goes through `tx` and only applies to an existing hub.
    pub fn classify_triple(
        &self,
        tx: &mut UpdateTransaction<'_>,
        subject: &str,
        predicate: &str,
        object: &TripleObject,
    ) -> TripleDisposition {
        if names::hub_local_id(subject).is_none() {
            return TripleDisposition::Ignored;
        }
        match object {
            TripleObject::Iri(iri) => {
                if names::leaf_kind(iri).is_none() {
                    return TripleDisposition::Ignored;
                }
                let registered = self
                    .get_or_create_hub(subject)
                    .and_then(|hub| Ok((hub, self.register_leaf(iri)?)));
                match registered {
                    Ok((hub, leaf)) => {
                        hub.add_leaf(predicate, leaf);
                        tracing::debug!(hub = %subject, predicate, leaf = %iri, "registered");
                        TripleDisposition::Registered
                    }
                    Err(e) => {
                        tracing::error!(hub = %subject, leaf = %iri, error = %e, "registration failed");
                        TripleDisposition::Ignored
                    }
                }
            }
            TripleObject::Literal(value) => match self.hub(subject) {
                Some(hub) => {
                    hub.set_value(tx, predicate, value.clone());
                    TripleDisposition::ValueWritten
                }
                None => TripleDisposition::Ignored,
            },
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// A read context with a scope already open
    pub fn freeze(&self) -> ReadContext {
        let mut ctx = ReadContext::new();
        ctx.freeze();
        ctx
    }

    /// Value of `predicate` on hub `subject` as pinned in `ctx`
    ///
    /// `None` outside a scope, for an unknown hub or predicate, and for a
    /// hub that has not been committed yet.
    pub fn proxy2value(
        &self,
        ctx: &mut ReadContext,
        subject: &str,
        predicate: &str,
    ) -> Option<Arc<[Literal]>> {
        if !ctx.is_frozen() {
            return None;
        }
        let hub = self.hub(subject)?;
        ctx.snapshot(&hub)?.value(predicate)
    }

    /// Live current value of a globally registered leaf
    pub fn leaf_value(&self, name: &str) -> Option<Arc<[Literal]>> {
        self.leaf(name).map(|leaf| leaf.current_value())
    }

    // ========================================================================
    // System statistics
    // ========================================================================

    /// The `_system` hub
    pub fn system_hub(&self) -> &Arc<Hub> {
        &self.system
    }

    /// Counter of open push connections
    pub fn connection_counter(&self) -> &Arc<CounterLeaf> {
        &self.connections
    }

    /// Meter counting pushed messages
    pub fn send_meter(&self) -> &Arc<RateMeterLeaf> {
        &self.send_meter
    }

    /// Sample every rate meter once; returns how many raised their peak
    pub fn sample_rates(&self) -> usize {
        self.rate_meters.sample_all(Instant::now())
    }

    /// Stop the background sampler, if running
    pub fn stop_sampler(&self) {
        self.sampler.lock().take();
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("hubs", &self.hubs.len())
            .field("leaves", &self.leaves.len())
            .field("rate_meters", &self.rate_meters.len())
            .finish()
    }
}
