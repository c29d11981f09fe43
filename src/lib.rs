//! hwpulse — hardware sensor poller and Redis publisher
//!
//! This crate polls a local hardware-monitor HTTP endpoint that exposes its
//! sensor tree (temperatures, power draw, clocks, ...) as nested JSON, pulls a
//! configured set of scalar metrics out of that tree, and writes the result to
//! a Redis-compatible store for dashboards and alerting.
//!
//! ## Modules
//!
//! * `config` — Application settings (TOML + environment overrides) and the
//!   JSON metric catalog, validated with the `validator` crate.
//!
//! * `core` — Runtime components:
//!   - Sensor tree model, pattern matcher, path extractor and value parser
//!   - Snapshot extraction
//!   - HTTP fetching with a per-cycle fixed-delay retry budget
//!   - Latest-value and bounded-stream publishers over a store abstraction
//!   - The executor that sequences fetch → extract → publish → sleep
//!
//! * `logger` — `tracing` subscriber setup: console output in compact, pretty
//!   or JSON form and optional systemd journald output.

pub mod config;
pub mod core;
pub mod logger;
