//! `hatlink-middleware` – the two ends of the parent pipe.
//!
//! # Modules
//!
//! - [`line_source`] – [`LineSource`]: background reader turning the
//!   blocking control channel into a timeout-bounded `read_line`.
//! - [`emitter`] – [`EventEmitter`]: the single serialized writer every
//!   producer shares for the output channel.

pub mod emitter;
pub mod line_source;

pub use emitter::{CaptureSink, EventEmitter};
pub use line_source::LineSource;
