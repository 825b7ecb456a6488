//! [`Dispatcher`] – turns control lines into hardware calls.
//!
//! Every line goes through [`grammar::parse`](crate::grammar::parse). Valid
//! actuations are forwarded to the [`HardwareRegistry`]; grammar errors and
//! driver faults are reported to the parent as `ERROR:` lines. The
//! dispatcher never fails: whatever happens to one line, the bridge keeps
//! serving the next.

use hatlink_hal::HardwareRegistry;
use hatlink_middleware::EventEmitter;
use hatlink_types::{Command, LinkError};
use tracing::{debug, warn};

use crate::grammar;

/// What the control loop should do after a line has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

pub struct Dispatcher {
    registry: HardwareRegistry,
    emitter: EventEmitter,
}

impl Dispatcher {
    pub fn new(registry: HardwareRegistry, emitter: EventEmitter) -> Self {
        Self { registry, emitter }
    }

    /// Parse and execute one control line.
    pub fn handle_line(&mut self, line: &str) -> Flow {
        match grammar::parse(line) {
            Ok(Command::Stop) => {
                debug!("stop command received");
                Flow::Stop
            }
            Ok(Command::Actuate(actuation)) => {
                if let Err(e) = self.registry.dispatch(actuation) {
                    warn!(error = %e, ?actuation, "actuation failed");
                    self.report(&e);
                }
                Flow::Continue
            }
            Ok(Command::Unrecognized) => {
                debug!(line, "ignoring unrecognised line");
                Flow::Continue
            }
            Err(e) => {
                self.report(&e);
                Flow::Continue
            }
        }
    }

    pub fn registry(&self) -> &HardwareRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut HardwareRegistry {
        &mut self.registry
    }

    fn report(&self, err: &LinkError) {
        if let Err(write_err) = self.emitter.error(err) {
            warn!(error = %write_err, report = %err, "could not report error to parent");
        }
    }
}
