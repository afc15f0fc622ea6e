//! HubSnapshot - Immutable capture of a hub's leaf values
//!
//! A snapshot is taken on every hub update and handed out behind an `Arc`,
//! so readers never block writers and never observe a half-applied commit.

use indexmap::IndexMap;
use livevalue_core::{Literal, Timestamp};
use std::sync::Arc;

/// Every leaf value of a hub at one point in time, indexed by predicate name
///
/// Leaf value sequences are themselves `Arc<[Literal]>`, so capturing a
/// snapshot copies no literal data.
#[derive(Debug, Clone)]
pub struct HubSnapshot {
    taken_at: Timestamp,
    values: IndexMap<String, Arc<[Literal]>>,
}

impl HubSnapshot {
    pub(crate) fn new(taken_at: Timestamp, values: IndexMap<String, Arc<[Literal]>>) -> Self {
        Self { taken_at, values }
    }

    /// Time of the update that produced this snapshot
    pub fn taken_at(&self) -> Timestamp {
        self.taken_at
    }

    /// Value sequence of a predicate
    pub fn get(&self, predicate: &str) -> Option<&Arc<[Literal]>> {
        self.values.get(predicate)
    }

    /// Value sequence of a predicate, as an owned handle
    pub fn value(&self, predicate: &str) -> Option<Arc<[Literal]>> {
        self.values.get(predicate).cloned()
    }

    /// Iterate over `(predicate, values)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Literal])> {
        self.values.iter().map(|(k, v)| (k.as_str(), &**v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
