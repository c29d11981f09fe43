//! Runtime components: sensor-tree lookup, fetching with retries, snapshot
//! extraction, publishing and the poll scheduler.

pub mod backoff;
pub mod error;
pub mod executor;
pub mod extractor;
pub mod fetcher;
pub mod publisher;
pub mod sensors;
