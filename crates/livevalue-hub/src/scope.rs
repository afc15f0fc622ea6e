//! Read scope with per-scope snapshot cache
//!
//! While a [`ReadContext`] is frozen, the first read of a hub pins that
//! hub's last committed snapshot for the rest of the scope. Commits that
//! land later are not visible until the context is released and frozen
//! again.

use crate::snapshot::HubSnapshot;
use crate::Hub;
use std::collections::HashMap;
use std::sync::Arc;

/// Caller-owned read scope
#[derive(Debug, Default)]
pub struct ReadContext {
    frozen: Option<HashMap<String, Option<Arc<HubSnapshot>>>>,
}

impl ReadContext {
    /// A context with no scope open
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a scope with an empty cache, discarding any previous one
    pub fn freeze(&mut self) {
        self.frozen = Some(HashMap::new());
    }

    /// Close the scope
    pub fn release(&mut self) {
        self.frozen = None;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.is_some()
    }

    /// Number of hubs pinned in the current scope
    pub fn pinned(&self) -> usize {
        self.frozen.as_ref().map_or(0, HashMap::len)
    }

    /// Snapshot of `hub` pinned in this scope
    ///
    /// `None` outside a scope, or when the hub had no committed snapshot
    /// at its first access within the scope.
    pub fn snapshot(&mut self, hub: &Hub) -> Option<Arc<HubSnapshot>> {
        let frozen = self.frozen.as_mut()?;
        frozen
            .entry(hub.name().to_string())
            .or_insert_with(|| hub.current_value())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livevalue_core::names;
    use livevalue_core::{Leaf, Literal, ValueCell};

    const TEMP: &str = "http://x/temp";

    fn hub_with_value(value: i64) -> Arc<Hub> {
        let hub = Hub::new(names::hub_name("scoped"), None);
        let leaf: Arc<dyn Leaf> = Arc::new(ValueCell::scalar("t"));
        hub.add_leaf(TEMP, Arc::clone(&leaf));
        leaf.set_current_value(Literal::int(value), chrono::Utc::now());
        hub.update(chrono::Utc::now());
        hub
    }

    #[test]
    fn test_outside_scope_reads_nothing() {
        let hub = hub_with_value(1);
        let mut ctx = ReadContext::new();
        assert!(ctx.snapshot(&hub).is_none());
        assert_eq!(ctx.pinned(), 0);
    }

    #[test]
    fn test_snapshot_pinned_for_scope() {
        let hub = hub_with_value(1);
        let mut ctx = ReadContext::new();
        ctx.freeze();

        let first = ctx.snapshot(&hub).unwrap();

        hub.leaf(TEMP)
            .unwrap()
            .set_current_value(Literal::int(2), chrono::Utc::now());
        hub.update(chrono::Utc::now());

        let second = ctx.snapshot(&hub).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.get(TEMP).unwrap()[0].lexical(), "1");

        ctx.release();
        ctx.freeze();
        let fresh = ctx.snapshot(&hub).unwrap();
        assert_eq!(fresh.get(TEMP).unwrap()[0].lexical(), "2");
    }

    #[test]
    fn test_uncommitted_hub_pins_none() {
        let hub = Hub::new(names::hub_name("empty"), None);
        let mut ctx = ReadContext::new();
        ctx.freeze();
        assert!(ctx.snapshot(&hub).is_none());
        assert_eq!(ctx.pinned(), 1);

        hub.update(chrono::Utc::now());
        assert!(ctx.snapshot(&hub).is_none());
    }
}
