//! `hatlink-runtime` – the bridge controller.
//!
//! Ties the parent pipe (`hatlink-middleware`) to the board
//! (`hatlink-hal`).
//!
//! # Modules
//!
//! - [`grammar`] – [`parse`][grammar::parse]: turns one control line into a
//!   [`Command`][hatlink_types::Command] or the error to report.
//! - [`dispatcher`] – [`Dispatcher`][dispatcher::Dispatcher]: executes parsed
//!   commands against the [`HardwareRegistry`][hatlink_hal::HardwareRegistry]
//!   and reports failures as `ERROR:` lines.
//! - [`debounce`] – [`DebounceFilter`][debounce::DebounceFilter]: per-channel
//!   novelty filter with a fixed 0.1 threshold and 1 s heartbeat.
//! - [`bridge`] – [`Bridge`][bridge::Bridge]: the poll/dispatch/sleep loop,
//!   sensor subscriptions and orderly shutdown.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: stderr
//!   logging with an optional OTLP span exporter.

pub mod bridge;
pub mod debounce;
pub mod dispatcher;
pub mod grammar;
pub mod telemetry;

pub use bridge::{Bridge, BridgeConfig, GOODBYE, StopHandle};
pub use debounce::DebounceFilter;
pub use dispatcher::{Dispatcher, Flow};
pub use telemetry::{TracerProviderGuard, init_tracing};
