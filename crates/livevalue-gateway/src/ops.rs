//! Read and update operations over resolved targets

use crate::params::{self, Params};
use crate::path::PathResolver;
use crate::target::{find_targets, Operation, TargetOperation};
use crate::Result;
use livevalue_core::names;
use livevalue_hub::{Broker, Hub, Literal, UpdateKind};

/// Outcome of [`handle`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Body of a read
    Values(String),
    /// Number of hubs published by an update
    Updated(usize),
}

/// Resolve `path` and run the operation it names
pub fn handle(
    broker: &Broker,
    resolver: &dyn PathResolver,
    path: &str,
    params: &Params,
) -> Result<Response> {
    let op = find_targets(path, params, broker, resolver)?;
    Ok(match op.operation() {
        Operation::Read => Response::Values(read(&op)),
        Operation::Update => Response::Updated(write(broker, &op, params)),
    })
}

/// Render the targets of `op` as a JSON array, one target per line
///
/// Each target is its wrapped current value, or with `-history=N` (and no
/// `-latest`) `["<id>",[<line>,...]]` holding the last `N` logged values.
pub fn read(op: &TargetOperation) -> String {
    let entries: Vec<String> = op
        .targets()
        .iter()
        .map(|hub| match op.history() {
            Some(limit) if !op.latest() => history_json(hub, limit),
            _ => hub.to_json().to_string(),
        })
        .collect();
    format!("[\n{}\n]", entries.join(",\n"))
}

fn history_json(hub: &Hub, limit: usize) -> String {
    let lines = hub
        .time_series()
        .map(|series| series.tail(limit))
        .unwrap_or_default();
    format!("[{},[{}]]", hub.id_json(), lines.join(","))
}

/// Value assignments carried by `params`
///
/// Control parameters are skipped. Each remaining key names a predicate
/// local to `property_ns` and must carry exactly one value; keys given more
/// than once are logged and skipped.
pub fn assignments(params: &Params, property_ns: &str) -> Vec<(String, Literal)> {
    params
        .iter()
        .filter(|(key, _)| !key.is_empty() && !params::is_escape(key))
        .filter_map(|(key, values)| match values {
            [value] => Some((format!("{property_ns}{key}"), Literal::infer(value))),
            _ => {
                tracing::error!(key, count = values.len(), "duplicate param");
                None
            }
        })
        .collect()
}

/// Apply the value assignments in `params` to every target of `op`
///
/// All writes share one batch transaction. Predicates default to the broker
/// namespace unless `-propertyns` is given. Returns the number of hubs
/// published.
pub fn write(broker: &Broker, op: &TargetOperation, params: &Params) -> usize {
    let values = assignments(params, op.property_ns().unwrap_or(names::NAME_BASE));
    let mut tx = broker.prepare_update(UpdateKind::Batch);
    for hub in op.targets() {
        for (predicate, value) in &values {
            hub.set_value(&mut tx, predicate, value.clone());
        }
    }
    broker.finish_update(tx)
}
