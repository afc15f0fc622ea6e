//! Livevalue Core - Value model for the realtime value broker
//!
//! This crate provides the building blocks shared by every other livevalue crate:
//! - Typed literal values (`Literal`, `Datatype`) and their wire rendering
//! - The broker vocabulary: hub/leaf namespaces and reserved predicates
//! - Leaf value cells: plain scalar/array cells, counters and peak-rate meters
//!
//! ## Leaves and Hubs
//!
//! A leaf is the smallest addressable current-value cell. Leaves never know
//! which hub owns them by type; a hub hands them a [`Refresh`] capability on
//! registration so that live-computed leaves (counters, rate meters) can ask
//! for a re-publish without waiting for a transaction.

mod error;
pub mod leaf;
mod literal;
pub mod names;
pub mod rate;

pub use error::{Error, Result};
pub use leaf::{CounterLeaf, Leaf, Refresh, ValueCell};
pub use literal::{escape, Datatype, Literal, Number};
pub use rate::{RateMeterLeaf, RateWindow};

/// Commit timestamp type used throughout the broker
pub type Timestamp = chrono::DateTime<chrono::Utc>;
