//! Livevalue Gateway - Transport-facing operations for the broker
//!
//! HTTP and WebSocket servers stay outside this crate. It provides what they
//! delegate to:
//! - [`find_targets`]: request path + parameters → operation and hubs
//! - [`read`] / [`write`] / [`handle`]: the read and update operations
//! - [`PushSession`]: a streaming subscriber for one connection
//! - [`PathResolver`]: the seam to the graph store for tag-path and query
//!   lookups
//!
//! ```rust,ignore
//! let params = Params::parse("temp=21.5");
//! match handle(&broker, &NoResolver, "/fos/ds/update/id/room1", &params)? {
//!     Response::Updated(n) => tracing::info!(hubs = n, "updated"),
//!     Response::Values(body) => send(body),
//! }
//! ```

mod error;
mod ops;
pub mod params;
mod path;
mod push;
mod target;

pub use error::{Error, Result};
pub use ops::{assignments, handle, read, write, Response};
pub use params::Params;
pub use path::{Link, NoResolver, PathResolver, TagPath, TagStep, LINK_ANY};
pub use push::{PushSession, DEFAULT_QUEUE};
pub use target::{find_targets, Operation, TargetOperation};
