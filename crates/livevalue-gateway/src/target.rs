//! Request path resolution
//!
//! ```text
//! /<root>/<dataset>/<read|update>/id/<hub id>
//! /<root>/<dataset>/<read|update>/path/<tag>/.../<leaf tag>
//! /<root>/<dataset>/<read|update>/query            (with -query=...)
//! ```

use crate::params::{self, Params};
use crate::path::{is_iri_safe, PathResolver, TagPath};
use crate::{Error, Result};
use livevalue_core::names;
use livevalue_hub::{Broker, Hub};
use percent_encoding::percent_decode_str;
use std::sync::Arc;

/// Requested operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Update,
}

impl Operation {
    fn parse(segment: &str) -> Option<Self> {
        match segment.to_ascii_lowercase().as_str() {
            "read" => Some(Operation::Read),
            "update" => Some(Operation::Update),
            _ => None,
        }
    }
}

/// Resolved request: the operation, its hubs and its control parameters
#[derive(Debug, Clone)]
pub struct TargetOperation {
    operation: Operation,
    dataset: String,
    targets: Vec<Arc<Hub>>,
    history: Option<usize>,
    latest: bool,
    property_ns: Option<String>,
}

impl TargetOperation {
    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Resolved hubs, in resolution order
    pub fn targets(&self) -> &[Arc<Hub>] {
        &self.targets
    }

    /// Target with local id `id`
    pub fn target_by_id(&self, id: &str) -> Option<&Arc<Hub>> {
        self.targets.iter().find(|h| h.id() == id)
    }

    /// Requested number of history lines; `Some(0)` asks for all of them
    pub fn history(&self) -> Option<usize> {
        self.history
    }

    /// Whether the current value was requested even when history is given
    pub fn latest(&self) -> bool {
        self.latest
    }

    /// Namespace given with `-propertyns`
    pub fn property_ns(&self) -> Option<&str> {
        self.property_ns.as_deref()
    }
}

/// Resolve a request path and its parameters to hubs
///
/// The path is percent-decoded before splitting. Hubs named by the resolver
/// but not known to the broker are skipped.
pub fn find_targets(
    path: &str,
    params: &Params,
    broker: &Broker,
    resolver: &dyn PathResolver,
) -> Result<TargetOperation> {
    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map_err(|_| Error::IllegalPath(path.to_string()))?;

    let history = match params.first(params::HISTORY) {
        Some(text) => Some(text.trim().parse::<usize>().map_err(|_| Error::InvalidParam {
            name: params::HISTORY.to_string(),
            value: text.to_string(),
        })?),
        None => None,
    };
    let latest = match params.first(params::LATEST) {
        Some(text) => {
            text.trim().parse::<i64>().map_err(|_| Error::InvalidParam {
                name: params::LATEST.to_string(),
                value: text.to_string(),
            })? != 0
        }
        None => false,
    };
    let property_ns = params.first(params::PROPERTY_NS).map(str::to_string);

    let mut parts: Vec<&str> = decoded.split('/').collect();
    while parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
    if parts.len() < 5 {
        return Err(Error::IllegalPath(decoded.to_string()));
    }
    let dataset = parts[2];
    let operation =
        Operation::parse(parts[3]).ok_or_else(|| Error::UnknownOperation(parts[3].to_string()))?;
    let selector = parts[4];
    let rest = &parts[5..];

    let targets = match selector {
        "id" => {
            let [id] = rest else {
                return Err(Error::MissingId(decoded.to_string()));
            };
            let hub = broker
                .hub(&names::hub_name(id))
                .ok_or_else(|| Error::UnknownId(id.to_string()))?;
            vec![hub]
        }
        "path" => {
            let tag_path = TagPath::parse(rest, params.first(params::LINK))?;
            let ns = property_ns.as_deref().unwrap_or(names::TAG_BASE);
            if !is_iri_safe(ns) {
                return Err(Error::InvalidParam {
                    name: params::PROPERTY_NS.to_string(),
                    value: ns.to_string(),
                });
            }
            let found = resolver.resolve_path(dataset, &tag_path, ns);
            if found.is_empty() {
                return Err(Error::NoPathFound);
            }
            known_hubs(broker, found)
        }
        "query" => {
            if !rest.is_empty() {
                return Err(Error::TooManyPathElements(decoded.to_string()));
            }
            let query = match params.get(params::QUERY) {
                None => return Err(Error::MissingQuery),
                Some([query]) => query,
                Some(_) => return Err(Error::DuplicateQuery),
            };
            let rows = resolver.resolve_query(dataset, query);
            if rows.is_empty() {
                return Err(Error::NoPathFound);
            }
            let mut found = Vec::with_capacity(rows.len());
            for row in rows {
                match <[String; 1]>::try_from(row) {
                    Ok([name]) => found.push(name),
                    Err(row) => return Err(Error::MultipleColumns(row.len())),
                }
            }
            known_hubs(broker, found)
        }
        other => return Err(Error::UndefinedSelector(other.to_string())),
    };

    tracing::debug!(
        path = %decoded,
        operation = ?operation,
        targets = targets.len(),
        "targets resolved"
    );
    Ok(TargetOperation {
        operation,
        dataset: dataset.to_string(),
        targets,
        history,
        latest,
        property_ns,
    })
}

fn known_hubs(broker: &Broker, found: Vec<String>) -> Vec<Arc<Hub>> {
    found
        .into_iter()
        .filter_map(|name| {
            let hub = broker.hub(&name);
            if hub.is_none() {
                tracing::debug!(hub = %name, "unknown id");
            }
            hub
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::NoResolver;
    use livevalue_hub::BrokerConfig;
    use std::cell::RefCell;

    /// Resolver answering from fixed tables and recording what it was asked
    #[derive(Default)]
    struct FixedResolver {
        hubs: Vec<String>,
        rows: Vec<Vec<String>>,
        asked: RefCell<Vec<String>>,
    }

    impl PathResolver for FixedResolver {
        fn resolve_path(&self, dataset: &str, path: &TagPath, property_ns: &str) -> Vec<String> {
            self.asked
                .borrow_mut()
                .push(format!("{dataset}:{}", path.select_query(property_ns)));
            self.hubs.clone()
        }

        fn resolve_query(&self, dataset: &str, query: &str) -> Vec<Vec<String>> {
            self.asked.borrow_mut().push(format!("{dataset}:{query}"));
            self.rows.clone()
        }
    }

    fn broker() -> (tempfile::TempDir, Arc<Broker>) {
        let dir = tempfile::tempdir().unwrap();
        let broker = Broker::new(
            BrokerConfig::default()
                .with_history_dir(dir.path())
                .with_sampler(false),
        )
        .unwrap();
        for id in ["room1", "room2"] {
            broker.get_or_create_hub(&names::hub_name(id)).unwrap();
        }
        (dir, broker)
    }

    #[test]
    fn test_id_selector() {
        let (_dir, broker) = broker();
        let op = find_targets(
            "/fos/ds/read/id/room1",
            &Params::parse("-history=5&-latest=1"),
            &broker,
            &NoResolver,
        )
        .unwrap();
        assert_eq!(op.operation(), Operation::Read);
        assert_eq!(op.dataset(), "ds");
        assert_eq!(op.targets().len(), 1);
        assert!(op.target_by_id("room1").is_some());
        assert_eq!(op.history(), Some(5));
        assert!(op.latest());
        assert_eq!(op.property_ns(), None);
    }

    #[test]
    fn test_path_is_decoded() {
        let (_dir, broker) = broker();
        broker.get_or_create_hub(&names::hub_name("部屋")).unwrap();
        let op = find_targets(
            "/fos/ds/UPDATE/id/%E9%83%A8%E5%B1%8B",
            &Params::new(),
            &broker,
            &NoResolver,
        )
        .unwrap();
        assert_eq!(op.operation(), Operation::Update);
        assert_eq!(op.targets()[0].id(), "部屋");
    }

    #[test]
    fn test_path_errors() {
        let (_dir, broker) = broker();
        let none = Params::new();
        let cases = [
            ("/fos/ds/read", "IllegalPath"),
            ("/fos/ds/delete/id/room1", "UnknownOperation"),
            ("/fos/ds/read/name/room1", "UndefinedSelector"),
            ("/fos/ds/read/id", "MissingId"),
            ("/fos/ds/read/id/a/b", "MissingId"),
            ("/fos/ds/read/id/nope", "UnknownId"),
            ("/fos/ds/read/query/x", "TooManyPathElements"),
            ("/fos/ds/read/query", "MissingQuery"),
            ("/fos/ds/read/path", "NoPathSpecified"),
            ("/fos/ds/read/path/a/temp", "NoPathFound"),
            ("/fos/ds/read/path/a/temp%3E%20%3Fx", "IllegalTag"),
        ];
        for (path, expected) in cases {
            let err = find_targets(path, &none, &broker, &NoResolver).unwrap_err();
            assert_eq!(variant(&err), expected, "{path}: {err}");
        }
    }

    fn variant(err: &Error) -> &'static str {
        match err {
            Error::IllegalPath(_) => "IllegalPath",
            Error::UnknownOperation(_) => "UnknownOperation",
            Error::UndefinedSelector(_) => "UndefinedSelector",
            Error::MissingId(_) => "MissingId",
            Error::UnknownId(_) => "UnknownId",
            Error::NoPathSpecified => "NoPathSpecified",
            Error::IllegalTag(_) => "IllegalTag",
            Error::NoPathFound => "NoPathFound",
            Error::TooManyPathElements(_) => "TooManyPathElements",
            Error::MissingQuery => "MissingQuery",
            Error::DuplicateQuery => "DuplicateQuery",
            Error::MultipleColumns(_) => "MultipleColumns",
            Error::InvalidParam { .. } => "InvalidParam",
            Error::Hub(_) => "Hub",
        }
    }

    #[test]
    fn test_invalid_history() {
        let (_dir, broker) = broker();
        for value in ["-1", "abc"] {
            let params = Params::new().with(params::HISTORY, value);
            let err = find_targets("/fos/ds/read/id/room1", &params, &broker, &NoResolver).unwrap_err();
            assert!(matches!(err, Error::InvalidParam { .. }));
        }
    }

    #[test]
    fn test_path_selector_uses_resolver() {
        let (_dir, broker) = broker();
        let resolver = FixedResolver {
            hubs: vec![names::hub_name("room1"), names::hub_name("ghost"), names::hub_name("room2")],
            ..Default::default()
        };
        let params = Params::new().with(params::PROPERTY_NS, "http://p/");
        let op = find_targets("/fos/ds/read/path/building/room/temp", &params, &broker, &resolver).unwrap();

        let ids: Vec<&str> = op.targets().iter().map(|h| h.id()).collect();
        assert_eq!(ids, vec!["room1", "room2"]);
        let asked = resolver.asked.borrow();
        assert!(asked[0].starts_with("ds:SELECT ?hub"));
        assert!(asked[0].contains("<http://p/temp> ?hub"));
    }

    #[test]
    fn test_path_selector_rejects_unsafe_namespace() {
        let (_dir, broker) = broker();
        let resolver = FixedResolver {
            hubs: vec![names::hub_name("room1")],
            ..Default::default()
        };
        let params = Params::new().with(params::PROPERTY_NS, "http://p/> } #");
        let err = find_targets("/fos/ds/read/path/a/temp", &params, &broker, &resolver).unwrap_err();
        assert!(matches!(err, Error::InvalidParam { .. }));
        assert!(resolver.asked.borrow().is_empty());
    }

    #[test]
    fn test_query_selector() {
        let (_dir, broker) = broker();
        let resolver = FixedResolver {
            rows: vec![vec![names::hub_name("room2")]],
            ..Default::default()
        };
        let params = Params::new().with(params::QUERY, "SELECT ?h WHERE { ?h ?p ?o }");
        let op = find_targets("/fos/ds/read/query", &params, &broker, &resolver).unwrap();
        assert_eq!(op.targets()[0].id(), "room2");

        let duplicate = params.clone().with(params::QUERY, "SELECT 2");
        assert!(matches!(
            find_targets("/fos/ds/read/query", &duplicate, &broker, &resolver),
            Err(Error::DuplicateQuery)
        ));

        let wide = FixedResolver {
            rows: vec![vec!["a".into(), "b".into()]],
            ..Default::default()
        };
        assert!(matches!(
            find_targets("/fos/ds/read/query", &params, &broker, &wide),
            Err(Error::MultipleColumns(2))
        ));
    }
}
