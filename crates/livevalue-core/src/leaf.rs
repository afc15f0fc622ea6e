//! Leaf value cells
//!
//! A [`Leaf`] holds the current value(s) of one named quantity. Scalar leaves
//! always hold exactly one literal, array leaves zero or more. Whether a leaf
//! is an array is fixed when it is constructed.
//!
//! Variants:
//! - [`ValueCell`]: plain settable scalar or array cell
//! - [`CounterLeaf`]: integer counter that re-publishes its hub on every change
//! - [`RateMeterLeaf`](crate::RateMeterLeaf): peak events-per-second meter

use crate::{Literal, Timestamp};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Weak};

/// Capability to re-publish a hub outside of a transaction
///
/// Hubs hand this to their leaves on registration so live-computed leaves
/// can trigger an update as soon as their value changes.
pub trait Refresh: Send + Sync {
    /// Re-format, log and notify as of `at`
    fn refresh(&self, at: Timestamp);
}

/// A current-value cell owned by a hub
pub trait Leaf: Send + Sync + fmt::Debug {
    /// Stable name of this leaf
    fn name(&self) -> &str;

    /// Replace the content with a single value
    fn set_current_value(&self, value: Literal, at: Timestamp);

    /// Replace the full content
    fn set_current_values(&self, values: &[Literal], at: Timestamp);

    /// Current value sequence, never empty for scalar leaves
    fn current_value(&self) -> Arc<[Literal]>;

    /// Whether this leaf holds an array
    fn is_array(&self) -> bool;

    /// Time of the last mutation
    fn updated_at(&self) -> Option<Timestamp>;

    /// Called by a hub when this leaf is registered on it
    fn attach(&self, _owner: Weak<dyn Refresh>) {}
}

/// Back-reference from a live-computed leaf to the hub that publishes it
#[derive(Default)]
pub(crate) struct OwnerSlot(RwLock<Option<Weak<dyn Refresh>>>);

impl OwnerSlot {
    pub(crate) fn set(&self, owner: Weak<dyn Refresh>) {
        *self.0.write() = Some(owner);
    }

    pub(crate) fn refresh(&self, at: Timestamp) {
        let owner = self.0.read().as_ref().and_then(Weak::upgrade);
        if let Some(owner) = owner {
            owner.refresh(at);
        }
    }
}

impl fmt::Debug for OwnerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let attached = self.0.read().as_ref().is_some_and(|w| w.strong_count() > 0);
        f.debug_struct("OwnerSlot")
            .field("attached", &attached)
            .finish()
    }
}

#[derive(Debug)]
struct CellState {
    values: Arc<[Literal]>,
    updated_at: Option<Timestamp>,
}

/// Plain settable leaf, scalar or array
#[derive(Debug)]
pub struct ValueCell {
    name: String,
    array: bool,
    state: RwLock<CellState>,
}

impl ValueCell {
    /// Create a scalar cell holding the placeholder literal
    pub fn scalar(name: impl Into<String>) -> Self {
        Self::new(name, false)
    }

    /// Create an empty array cell
    pub fn array(name: impl Into<String>) -> Self {
        Self::new(name, true)
    }

    /// Create a cell, choosing array-ness explicitly
    pub fn new(name: impl Into<String>, array: bool) -> Self {
        let values: Arc<[Literal]> = if array {
            Arc::from(Vec::new())
        } else {
            Arc::from(vec![Literal::placeholder()])
        };
        Self {
            name: name.into(),
            array,
            state: RwLock::new(CellState {
                values,
                updated_at: None,
            }),
        }
    }
}

impl Leaf for ValueCell {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_current_value(&self, value: Literal, at: Timestamp) {
        let mut state = self.state.write();
        state.values = Arc::from(vec![value]);
        state.updated_at = Some(at);
    }

    /// On a scalar cell only the first value is kept; an empty slice resets
    /// the cell to the placeholder.
    fn set_current_values(&self, values: &[Literal], at: Timestamp) {
        let values: Arc<[Literal]> = if self.array {
            Arc::from(values)
        } else {
            if values.len() > 1 {
                tracing::warn!(
                    leaf = %self.name,
                    supplied = values.len(),
                    "multiple values for scalar leaf, keeping the first"
                );
            }
            let first = values.first().cloned().unwrap_or_else(Literal::placeholder);
            Arc::from(vec![first])
        };
        let mut state = self.state.write();
        state.values = values;
        state.updated_at = Some(at);
    }

    fn current_value(&self) -> Arc<[Literal]> {
        Arc::clone(&self.state.read().values)
    }

    fn is_array(&self) -> bool {
        self.array
    }

    fn updated_at(&self) -> Option<Timestamp> {
        self.state.read().updated_at
    }
}

/// Integer counter published as an `xsd:integer`
///
/// Direct value replacement is ignored; the count only moves through
/// [`increment`](Self::increment) and [`decrement`](Self::decrement), each of
/// which refreshes the owning hub before returning, on the caller's thread.
/// The refresh does not wait for a transaction, but the hub's log write and
/// consumer callbacks run inline. Subscribers of such hubs that may be slow
/// should queue their deliveries (`livevalue_hub::ChannelConsumer`).
#[derive(Debug)]
pub struct CounterLeaf {
    name: String,
    value: AtomicI64,
    updated_at: Mutex<Option<Timestamp>>,
    owner: OwnerSlot,
}

impl CounterLeaf {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: AtomicI64::new(0),
            updated_at: Mutex::new(None),
            owner: OwnerSlot::default(),
        }
    }

    /// Add one and re-publish; returns the new count
    pub fn increment(&self) -> i64 {
        let count = self.value.fetch_add(1, Ordering::AcqRel) + 1;
        self.changed();
        count
    }

    /// Subtract one and re-publish; returns the new count
    pub fn decrement(&self) -> i64 {
        let count = self.value.fetch_sub(1, Ordering::AcqRel) - 1;
        self.changed();
        count
    }

    /// Current count
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    fn changed(&self) {
        let now = chrono::Utc::now();
        *self.updated_at.lock() = Some(now);
        self.owner.refresh(now);
    }
}

impl Leaf for CounterLeaf {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_current_value(&self, _value: Literal, _at: Timestamp) {
        tracing::debug!(leaf = %self.name, "ignoring direct write to counter");
    }

    fn set_current_values(&self, _values: &[Literal], _at: Timestamp) {
        tracing::debug!(leaf = %self.name, "ignoring direct write to counter");
    }

    fn current_value(&self) -> Arc<[Literal]> {
        Arc::from(vec![Literal::integer(self.get())])
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
