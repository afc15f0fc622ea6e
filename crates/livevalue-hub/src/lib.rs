//! Livevalue Hub - Realtime value broker
//!
//! This crate keeps a live mirror of telemetry values grouped into hubs,
//! commits multi-value writes atomically, serves consistent snapshots to
//! concurrent readers, and pushes every commit to subscribed consumers while
//! appending it to the hub's time series.
//!
//! ## Architecture
//!
//! ```text
//! Broker (process-wide state, passed by Arc)
//!  │
//!  ├── commit lock ← one UpdateTransaction at a time
//!  ├── hub registry ── Hub
//!  │                    ├── leaves (predicate → Leaf), short-name index
//!  │                    ├── published snapshot + formatted/wrapped forms
//!  │                    ├── consumers
//!  │                    └── TimeSeries
//!  ├── leaf registry
//!  └── rate meters ← RateSampler thread
//! ```
//!
//! ## Write path
//!
//! ```rust,ignore
//! let mut tx = broker.prepare_update(UpdateKind::Batch);
//! hub.set_value(&mut tx, TEMP, Literal::double(21.5));
//! hub.set_values(&mut tx, TAGS, &[Literal::string("a"), Literal::string("b")]);
//! broker.finish_update(tx); // each touched hub: update → log → notify, once
//! ```
//!
//! ## Read path
//!
//! ```rust,ignore
//! let mut ctx = broker.freeze();
//! let temp = broker.proxy2value(&mut ctx, &hub_name, TEMP);
//! // ... later reads in ctx see the same snapshot
//! ctx.release();
//! ```

mod broker;
mod config;
mod consumer;
mod error;
mod hub;
mod sampler;
mod scope;
mod snapshot;
mod transaction;

pub use broker::{Broker, TripleDisposition, TripleObject};
pub use config::{max_workers, BrokerConfig};
pub use consumer::{ChannelConsumer, ValueConsumer};
pub use error::{Error, Result};
pub use hub::Hub;
pub use sampler::{RateMeters, RateSampler};
pub use scope::ReadContext;
pub use snapshot::HubSnapshot;
pub use transaction::{UpdateKind, UpdateTransaction};

pub use livevalue_core::{Literal, Timestamp};
