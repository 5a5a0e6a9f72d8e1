//! Shared utilities.

mod timestamps;

pub use timestamps::{compact_timestamp, iso_timestamp, now_utc, Timestamp};
