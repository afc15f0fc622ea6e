//! Livevalue Series - Append-only history log per hub
//!
//! Every hub commit appends its formatted snapshot as one line to a file named
//! after the hub's local id. The log is never rewritten or compacted.
//!
//! # Example
//!
//! ```rust,ignore
//! use livevalue_series::TimeSeries;
//!
//! let series = TimeSeries::open("./run/timeseries", &hub_name)?;
//! series.write(r#"{"temp":21.5}"#);
//!
//! // Last 10 snapshots, oldest first
//! for line in series.tail(10) {
//!     println!("{}", line);
//! }
//! ```

mod error;
mod series;
mod tail;

pub use error::{Error, Result};
pub use series::{History, TimeSeries};
pub use tail::TailBuffer;
