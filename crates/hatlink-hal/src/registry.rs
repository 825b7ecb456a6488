//! [`HardwareRegistry`] – board driver registry and actuation dispatcher.
//!
//! The registry stores every registered light, digital output and motor
//! driver in channel order, so the zero-based index carried by an
//! [`Actuation`] selects the driver directly.

use hatlink_types::{Actuation, LinkError};
use tracing::debug;

use crate::motor::Motor;
use crate::switch::Switch;

/// Board driver registry and [`Actuation`] dispatcher.
///
/// Construct with [`HardwareRegistry::new`], register drivers in channel
/// order, then call [`HardwareRegistry::dispatch`] to translate actuations
/// into driver calls.
#[derive(Default)]
pub struct HardwareRegistry {
    lights: Vec<Box<dyn Switch>>,
    outputs: Vec<Box<dyn Switch>>,
    motors: Vec<Box<dyn Motor>>,
}

impl HardwareRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the next light channel.
    pub fn register_light(&mut self, light: Box<dyn Switch>) {
        self.lights.push(light);
    }

    /// Register the next digital output channel.
    pub fn register_output(&mut self, output: Box<dyn Switch>) {
        self.outputs.push(output);
    }

    /// Register the next motor channel.
    pub fn register_motor(&mut self, motor: Box<dyn Motor>) {
        self.motors.push(motor);
    }

    pub fn light(&self, index: usize) -> Option<&dyn Switch> {
        self.lights.get(index).map(|b| b.as_ref())
    }

    pub fn output(&self, index: usize) -> Option<&dyn Switch> {
        self.outputs.get(index).map(|b| b.as_ref())
    }

    pub fn motor(&self, index: usize) -> Option<&dyn Motor> {
        self.motors.get(index).map(|b| b.as_ref())
    }

    /// Dispatch an [`Actuation`] to the driver registered at its index.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::HardwareFault`] when no driver is registered at
    /// the target index or when the driver call fails.
    pub fn dispatch(&mut self, actuation: Actuation) -> Result<(), LinkError> {
        debug!(?actuation, "dispatching actuation");
        match actuation {
            Actuation::Light { index, on } => {
                switch_at(&mut self.lights, "light", index)?.set_state(on)
            }
            Actuation::Output { index, on } => {
                switch_at(&mut self.outputs, "output", index)?.set_state(on)
            }
            Actuation::Motor { index, speed } => match self.motors.get_mut(index) {
                Some(motor) => motor.set_speed(speed),
                None => Err(not_registered("motor", index)),
            },
        }
    }

    /// Switch every light and output off and stop every motor.
    ///
    /// Every driver is commanded even when an earlier one fails.
    ///
    /// # Errors
    ///
    /// Returns the first [`LinkError::HardwareFault`] encountered.
    pub fn all_stop(&mut self) -> Result<(), LinkError> {
        let mut first_err = None;
        let switches = self.lights.iter_mut().chain(self.outputs.iter_mut());
        for result in switches.map(|s| s.set_state(false)) {
            if let Err(e) = result {
                first_err.get_or_insert(e);
            }
        }
        for motor in &mut self.motors {
            if let Err(e) = motor.set_speed(0) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn switch_at<'a>(
    switches: &'a mut [Box<dyn Switch>],
    kind: &str,
    index: usize,
) -> Result<&'a mut Box<dyn Switch>, LinkError> {
    switches
        .get_mut(index)
        .ok_or_else(|| not_registered(kind, index))
}

fn not_registered(kind: &str, index: usize) -> LinkError {
    LinkError::HardwareFault {
        component: format!("{kind}.{}", index + 1),
        details: format!("no {kind} driver registered at index {index}"),
    }
}
