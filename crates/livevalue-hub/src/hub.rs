//! Hub - Named aggregate of leaves published as one value
//!
//! A hub owns a set of leaves keyed by predicate name, the reserved
//! `instant`/`datetime` slots it stamps on every update, a short-name index
//! used as the keys of its formatted snapshot, its subscribers, and its time
//! series.
//!
//! ## Formatted snapshot
//!
//! ```text
//! {"instant":1700000000000,"datetime":"2023-11-14T22:13:20.000Z","temp":21.5,"tags":["a","b"]}
//! ```
//!
//! Keys after the reserved ones come from the short-name index: each
//! predicate's trailing segment, or the full predicate name when two
//! predicates share a trailing segment. Entries are sorted descending.

use crate::consumer::{same_consumer, ValueConsumer};
use crate::snapshot::HubSnapshot;
use crate::transaction::UpdateTransaction;
use chrono::SecondsFormat;
use indexmap::IndexMap;
use livevalue_core::names::{self, Vocab};
use livevalue_core::{escape, Datatype, Leaf, Literal, Refresh, Timestamp, ValueCell};
use livevalue_series::TimeSeries;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// One entry of the short-name index
#[derive(Debug, Clone)]
struct ShortName {
    key: String,
    predicate: String,
    leaf: Arc<dyn Leaf>,
}

#[derive(Debug)]
struct LeafTable {
    by_predicate: IndexMap<String, Arc<dyn Leaf>>,
    instant: Arc<dyn Leaf>,
    datetime: Arc<dyn Leaf>,
    short_names: Vec<ShortName>,
}

impl LeafTable {
    fn is_reserved(&self, leaf: &Arc<dyn Leaf>) -> bool {
        same_leaf(leaf, &self.instant) || same_leaf(leaf, &self.datetime)
    }

    /// Rebuild the short-name index from scratch
    ///
    /// Trailing segments are used when unique; every leaf sharing a trailing
    /// segment with another is listed under its full predicate name instead.
    fn rebuild_short_names(&mut self) {
        let mut by_tag: IndexMap<&str, Vec<(&String, &Arc<dyn Leaf>)>> = IndexMap::new();
        for (predicate, leaf) in &self.by_predicate {
            if self.is_reserved(leaf) {
                continue;
            }
            by_tag
                .entry(names::local_name(predicate))
                .or_default()
                .push((predicate, leaf));
        }

        let mut short_names = Vec::with_capacity(self.by_predicate.len());
        for (tag, leaves) in by_tag {
            let unique = leaves.len() == 1;
            for (predicate, leaf) in leaves {
                short_names.push(ShortName {
                    key: if unique { tag.to_string() } else { predicate.clone() },
                    predicate: predicate.clone(),
                    leaf: Arc::clone(leaf),
                });
            }
        }
        short_names.sort_by(|a, b| b.key.cmp(&a.key));
        self.short_names = short_names;
    }

    /// Capture every leaf's current value, reserved slots included
    fn capture(&self, at: Timestamp) -> HubSnapshot {
        let mut values = IndexMap::with_capacity(self.by_predicate.len() + 2);
        for vocab in [Vocab::Instant, Vocab::Datetime] {
            if !self.by_predicate.contains_key(vocab.predicate()) {
                values.insert(vocab.predicate().to_string(), self.slot(vocab).current_value());
            }
        }
        for (predicate, leaf) in &self.by_predicate {
            values.insert(predicate.clone(), leaf.current_value());
        }
        HubSnapshot::new(at, values)
    }

    fn slot(&self, vocab: Vocab) -> &Arc<dyn Leaf> {
        match vocab {
            Vocab::Instant => &self.instant,
            Vocab::Datetime => &self.datetime,
        }
    }

    /// Render a snapshot taken from this table
    fn format(&self, snapshot: &HubSnapshot) -> String {
        let mut out = String::from("{");
        let mut first = true;
        for vocab in [Vocab::Instant, Vocab::Datetime] {
            let leaf = self.slot(vocab);
            let values = snapshot.get(vocab.predicate()).map(|v| &**v).unwrap_or(&[]);
            write_entry(&mut out, &mut first, vocab.short_label(), leaf.is_array(), values);
        }
        for entry in &self.short_names {
            let values = snapshot.get(&entry.predicate).map(|v| &**v).unwrap_or(&[]);
            write_entry(&mut out, &mut first, &entry.key, entry.leaf.is_array(), values);
        }
        out.push('}');
        out
    }
}

fn write_entry(out: &mut String, first: &mut bool, key: &str, array: bool, values: &[Literal]) {
    if !*first {
        out.push(',');
    }
    *first = false;
    out.push('"');
    out.push_str(&escape(key));
    out.push_str("\":");
    if array {
        out.push('[');
    }
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        value.write_json(out);
    }
    if array {
        out.push(']');
    }
}

fn same_leaf(a: &Arc<dyn Leaf>, b: &Arc<dyn Leaf>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Outputs of the last update
#[derive(Debug, Default)]
struct Published {
    formatted: Option<Arc<str>>,
    wrapped: Option<Arc<str>>,
    snapshot: Option<Arc<HubSnapshot>>,
}

/// A node identity aggregating named leaves
///
/// Hubs are always handled through `Arc<Hub>`; they live as long as the
/// broker that created them.
pub struct Hub {
    name: String,
    id: String,
    this: Weak<Hub>,
    leaves: RwLock<LeafTable>,
    consumers: RwLock<Arc<Vec<Arc<dyn ValueConsumer>>>>,
    published: Mutex<Published>,
    volatile: AtomicBool,
    series: Option<TimeSeries>,
}

impl Hub {
    /// Create a hub, binding its time series under `history_dir`
    ///
    /// The hub's id is the local id of `name`, the same id its time series
    /// uses. A name outside the hub namespace or an unusable history
    /// directory leaves the hub without history; the failure is logged.
    pub fn new(name: impl Into<String>, history_dir: Option<&Path>) -> Arc<Self> {
        let name = name.into();
        let id = names::hub_id(&name).to_string();
        let series = history_dir.and_then(|dir| match TimeSeries::open(dir, &name) {
            Ok(series) => Some(series),
            Err(e) => {
                tracing::error!(hub = %name, error = %e, "can't register time series storage");
                None
            }
        });

        let instant: Arc<dyn Leaf> = Arc::new(ValueCell::scalar(Vocab::Instant.predicate()));
        let datetime: Arc<dyn Leaf> = Arc::new(ValueCell::scalar(Vocab::Datetime.predicate()));

        Arc::new_cyclic(|this| Self {
            name,
            id,
            this: this.clone(),
            leaves: RwLock::new(LeafTable {
                by_predicate: IndexMap::new(),
                instant,
                datetime,
                short_names: Vec::new(),
            }),
            consumers: RwLock::new(Arc::new(Vec::new())),
            published: Mutex::new(Published::default()),
            volatile: AtomicBool::new(false),
            series,
        })
    }

    /// Full node name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Local id, see [`names::hub_id`]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// This hub's time series, if history storage could be bound
    pub fn time_series(&self) -> Option<&TimeSeries> {
        self.series.as_ref()
    }

    /// Recompute formatted output on every read instead of once per update
    pub fn set_volatile(&self) {
        self.volatile.store(true, Ordering::Release);
    }

    pub fn is_volatile(&self) -> bool {
        self.volatile.load(Ordering::Acquire)
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register `leaf` under `predicate`
    ///
    /// The reserved `instant`/`datetime` predicates also take over the
    /// corresponding slot. A predicate that is already registered keeps its
    /// first leaf; the duplicate is logged and `false` is returned.
    pub fn add_leaf(&self, predicate: &str, leaf: Arc<dyn Leaf>) -> bool {
        {
            let mut table = self.leaves.write();
            if table.by_predicate.contains_key(predicate) {
                tracing::error!(
                    hub = %self.name,
                    predicate,
                    leaf = %leaf.name(),
                    "can't append leaf, predicate already registered"
                );
                return false;
            }
            match Vocab::from_predicate(predicate) {
                Some(Vocab::Instant) => table.instant = Arc::clone(&leaf),
                Some(Vocab::Datetime) => table.datetime = Arc::clone(&leaf),
                None => {}
            }
            table
                .by_predicate
                .insert(predicate.to_string(), Arc::clone(&leaf));
            table.rebuild_short_names();
        }

        let owner: Weak<dyn Refresh> = self.this.clone();
        leaf.attach(owner);

        let mut published = self.published.lock();
        published.formatted = None;
        published.wrapped = None;
        tracing::debug!(hub = %self.name, predicate, leaf = %leaf.name(), "leaf registered");
        true
    }

    /// Leaf registered under `predicate`
    pub fn leaf(&self, predicate: &str) -> Option<Arc<dyn Leaf>> {
        self.leaves.read().by_predicate.get(predicate).cloned()
    }

    /// Registered predicate names, in registration order
    pub fn predicates(&self) -> Vec<String> {
        self.leaves.read().by_predicate.keys().cloned().collect()
    }

    /// Short-name index as `(key, predicate)` pairs, sorted descending by key
    pub fn short_names(&self) -> Vec<(String, String)> {
        self.leaves
            .read()
            .short_names
            .iter()
            .map(|e| (e.key.clone(), e.predicate.clone()))
            .collect()
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Set a scalar value within `tx`
    ///
    /// Unknown predicates are logged and skipped without touching the hub.
    /// Returns whether a leaf was written.
    pub fn set_value(&self, tx: &mut UpdateTransaction<'_>, predicate: &str, value: Literal) -> bool {
        let Some(leaf) = self.leaf(predicate) else {
            tracing::warn!(hub = %self.name, predicate, value = %value, "undefined leaf");
            return false;
        };
        leaf.set_current_value(value, tx.at());
        self.touch(tx);
        true
    }

    /// Replace a leaf's full value sequence within `tx`
    ///
    /// Returns `false` without touching the hub when the predicate is unknown.
    pub fn set_values(&self, tx: &mut UpdateTransaction<'_>, predicate: &str, values: &[Literal]) -> bool {
        let Some(leaf) = self.leaf(predicate) else {
            tracing::warn!(hub = %self.name, predicate, count = values.len(), "undefined leaf");
            return false;
        };
        leaf.set_current_values(values, tx.at());
        self.touch(tx);
        true
    }

    fn touch(&self, tx: &mut UpdateTransaction<'_>) {
        if let Some(this) = self.this.upgrade() {
            tx.touch(this);
        }
    }

    // ========================================================================
    // Publication
    // ========================================================================

    /// Publish the hub as of `at`
    ///
    /// Stamps the reserved leaves, captures the snapshot, re-formats, appends
    /// the formatted value to the time series and finally notifies consumers.
    /// Called at commit time for every touched hub, and by live-computed
    /// leaves through [`Refresh`].
    pub fn update(&self, at: Timestamp) {
        {
            let mut published = self.published.lock();
            let table = self.leaves.read();

            table.instant.set_current_value(
                Literal::new(at.timestamp_millis().to_string(), Datatype::UnsignedLong),
                at,
            );
            table.datetime.set_current_value(
                Literal::new(at.to_rfc3339_opts(SecondsFormat::Millis, true), Datatype::DateTime),
                at,
            );

            let snapshot = table.capture(at);
            let formatted: Arc<str> = Arc::from(table.format(&snapshot));
            drop(table);

            if let Some(series) = &self.series {
                series.write(&formatted);
            }
            published.wrapped = Some(self.wrap(&formatted));
            published.formatted = Some(formatted);
            published.snapshot = Some(Arc::new(snapshot));
        }
        self.notify();
    }

    fn notify(&self) {
        let consumers = Arc::clone(&self.consumers.read());
        let gone: Vec<Arc<dyn ValueConsumer>> = consumers
            .iter()
            .filter(|c| !c.inform_value_update(self))
            .cloned()
            .collect();

        if !gone.is_empty() {
            let mut set = self.consumers.write();
            Arc::make_mut(&mut set).retain(|c| !gone.iter().any(|g| same_consumer(c, g)));
            tracing::debug!(hub = %self.name, removed = gone.len(), "consumers unsubscribed");
        }
    }

    /// Snapshot taken at the last update, `None` before the first one
    pub fn current_value(&self) -> Option<Arc<HubSnapshot>> {
        self.published.lock().snapshot.clone()
    }

    /// Formatted snapshot
    ///
    /// Cached until the next update, or recomputed from the live leaves on
    /// every call for volatile hubs.
    pub fn formatted(&self) -> Arc<str> {
        if self.is_volatile() {
            return self.render_live();
        }
        let mut published = self.published.lock();
        if let Some(formatted) = &published.formatted {
            return Arc::clone(formatted);
        }
        let formatted = self.render_live();
        published.formatted = Some(Arc::clone(&formatted));
        formatted
    }

    /// Id and formatted snapshot wrapped as `["<id>",{...}]`
    pub fn to_json(&self) -> Arc<str> {
        if self.is_volatile() {
            return self.wrap(&self.render_live());
        }
        if let Some(wrapped) = &self.published.lock().wrapped {
            return Arc::clone(wrapped);
        }
        let wrapped = self.wrap(&self.formatted());
        self.published.lock().wrapped = Some(Arc::clone(&wrapped));
        wrapped
    }

    /// The hub id as a quoted JSON string
    pub fn id_json(&self) -> String {
        format!("\"{}\"", escape(&self.id))
    }

    fn wrap(&self, formatted: &str) -> Arc<str> {
        Arc::from(format!("[{},{}]", self.id_json(), formatted))
    }

    fn render_live(&self) -> Arc<str> {
        let table = self.leaves.read();
        let snapshot = table.capture(chrono::Utc::now());
        Arc::from(table.format(&snapshot))
    }

    // ========================================================================
    // Consumers
    // ========================================================================

    /// Subscribe a consumer; subscribing the same consumer twice is a no-op
    pub fn add_consumer(&self, consumer: Arc<dyn ValueConsumer>) {
        let mut set = self.consumers.write();
        if set.iter().any(|c| same_consumer(c, &consumer)) {
            return;
        }
        Arc::make_mut(&mut set).push(consumer);
    }

    /// Unsubscribe a consumer
    pub fn remove_consumer(&self, consumer: &Arc<dyn ValueConsumer>) {
        let mut set = self.consumers.write();
        Arc::make_mut(&mut set).retain(|c| !same_consumer(c, consumer));
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.read().len()
    }
}

impl Refresh for Hub {
    fn refresh(&self, at: Timestamp) {
        self.update(at);
    }
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub")
            .field("name", &self.name)
            .field("leaves", &self.leaves.read().by_predicate.len())
            .field("consumers", &self.consumer_count())
            .field("volatile", &self.is_volatile())
            .finish()
    }
}

impl fmt::Display for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json())
    }
}
