//! In-process simulated board for running the bridge without hardware.
//!
//! [`SimBoard`] builds a [`HardwareRegistry`] populated with stub drivers
//! that record commands, and [`SimSensors`] is a [`SensorHub`] whose inputs
//! are driven programmatically. Together they let the full bridge run in
//! tests, CI and on a development machine.
//!
//! # Example
//!
//! ```rust
//! use hatlink_hal::sim::SimBoard;
//! use hatlink_types::Actuation;
//!
//! let mut registry = SimBoard::standard().build();
//!
//! registry
//!     .dispatch(Actuation::Motor { index: 0, speed: 50 })
//!     .expect("sim motor must accept speed");
//! assert_eq!(registry.motor(0).unwrap().speed(), 50);
//! ```

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use hatlink_types::{
    ANALOG_CHANNELS, LIGHT_COUNT, LinkError, MOTOR_COUNT, MOTOR_SPEED_LIMIT, OUTPUT_COUNT,
    TouchState,
};
use tracing::info;

use crate::motor::Motor;
use crate::registry::HardwareRegistry;
use crate::sensors::{AnalogHandler, InputHandler, SensorHub, TouchHandler};
use crate::switch::Switch;

// ────────────────────────────────────────────────────────────────────────────
// Stub switch
// ────────────────────────────────────────────────────────────────────────────

/// A simulated light or digital output that records its current state.
/// Always succeeds.
pub struct SimSwitch {
    id: String,
    on: bool,
}

impl SimSwitch {
    pub fn new(id: impl Into<String>) -> Box<Self> {
        Box::new(Self {
            id: id.into(),
            on: false,
        })
    }
}

impl Switch for SimSwitch {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_state(&mut self, on: bool) -> Result<(), LinkError> {
        info!(id = %self.id, on, "sim switch");
        self.on = on;
        Ok(())
    }

    fn state(&self) -> bool {
        self.on
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stub motor
// ────────────────────────────────────────────────────────────────────────────

/// A simulated motor that records the most recent commanded speed.
///
/// Rejects speeds outside `-100..=100` the way a real driver would.
pub struct SimMotor {
    id: String,
    speed: i8,
}

impl SimMotor {
    pub fn new(id: impl Into<String>) -> Box<Self> {
        Box::new(Self {
            id: id.into(),
            speed: 0,
        })
    }
}

impl Motor for SimMotor {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_speed(&mut self, speed: i8) -> Result<(), LinkError> {
        if !(-MOTOR_SPEED_LIMIT..=MOTOR_SPEED_LIMIT).contains(&speed) {
            return Err(LinkError::HardwareFault {
                component: self.id.clone(),
                details: format!("speed {speed} out of range"),
            });
        }
        info!(id = %self.id, speed, "sim motor");
        self.speed = speed;
        Ok(())
    }

    fn speed(&self) -> i8 {
        self.speed
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimBoard builder
// ────────────────────────────────────────────────────────────────────────────

/// Builder that constructs a [`HardwareRegistry`] from simulated drivers.
///
/// Channels are registered in the order the `with_*` methods are called.
#[derive(Default)]
pub struct SimBoard {
    lights: Vec<Box<dyn Switch>>,
    outputs: Vec<Box<dyn Switch>>,
    motors: Vec<Box<dyn Motor>>,
}

impl SimBoard {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder pre-populated with the standard board layout: four lights,
    /// four outputs and two motors.
    pub fn standard() -> Self {
        let mut board = Self::new();
        for n in 1..=LIGHT_COUNT {
            board.lights.push(SimSwitch::new(format!("light.{n}")));
        }
        for n in 1..=OUTPUT_COUNT {
            board.outputs.push(SimSwitch::new(format!("output.{n}")));
        }
        for n in 1..=MOTOR_COUNT {
            board.motors.push(SimMotor::new(format!("motor.{n}")));
        }
        board
    }

    /// Append a custom light driver.
    pub fn with_light(mut self, light: Box<dyn Switch>) -> Self {
        self.lights.push(light);
        self
    }

    /// Append a custom output driver.
    pub fn with_output(mut self, output: Box<dyn Switch>) -> Self {
        self.outputs.push(output);
        self
    }

    /// Append a custom motor driver.
    pub fn with_motor(mut self, motor: Box<dyn Motor>) -> Self {
        self.motors.push(motor);
        self
    }

    /// Consume the builder and return a fully configured [`HardwareRegistry`].
    pub fn build(self) -> HardwareRegistry {
        let mut registry = HardwareRegistry::new();
        for l in self.lights {
            registry.register_light(l);
        }
        for o in self.outputs {
            registry.register_output(o);
        }
        for m in self.motors {
            registry.register_motor(m);
        }
        registry
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated sensors
// ────────────────────────────────────────────────────────────────────────────

struct AnalogSubscription {
    threshold: f64,
    handler: AnalogHandler,
    last: Mutex<[Option<f64>; ANALOG_CHANNELS]>,
}

#[derive(Default)]
struct Handlers {
    touch: RwLock<Vec<TouchHandler>>,
    input: RwLock<Vec<InputHandler>>,
    analog: RwLock<Vec<Arc<AnalogSubscription>>>,
}

/// A [`SensorHub`] driven from code.
///
/// Clones share the same registrations. The `press`, `release`,
/// `set_input` and `set_analog` methods invoke the registered handlers on
/// the calling thread, so several threads driving different channels
/// reproduce the concurrent delivery of real hardware.
#[derive(Clone, Default)]
pub struct SimSensors {
    handlers: Arc<Handlers>,
}

impl SimSensors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate touch pad `channel` being pressed.
    pub fn press(&self, channel: u8) {
        self.touch(channel, TouchState::Press);
    }

    /// Simulate touch pad `channel` being released.
    pub fn release(&self, channel: u8) {
        self.touch(channel, TouchState::Release);
    }

    fn touch(&self, channel: u8, state: TouchState) {
        let handlers = read(&self.handlers.touch).clone();
        for handler in handlers {
            handler(channel, state);
        }
    }

    /// Simulate digital input `pin_name` changing to `value`.
    pub fn set_input(&self, pin_name: &str, value: u8) {
        let handlers = read(&self.handlers.input).clone();
        for handler in handlers {
            handler(pin_name, value);
        }
    }

    /// Simulate a new analog reading on `channel`.
    ///
    /// Each subscription is notified only when the reading differs from the
    /// last value it was handed by at least its registration threshold.
    pub fn set_analog(&self, channel: usize, value: f64) {
        let subscriptions = read(&self.handlers.analog).clone();
        for sub in subscriptions {
            let notify = {
                let mut last = sub.last.lock().unwrap_or_else(PoisonError::into_inner);
                match last.get_mut(channel) {
                    Some(slot) => {
                        let changed = slot.is_none_or(|prev| (value - prev).abs() >= sub.threshold);
                        if changed {
                            *slot = Some(value);
                        }
                        changed
                    }
                    None => false,
                }
            };
            if notify {
                (sub.handler)(channel, value);
            }
        }
    }
}

impl SensorHub for SimSensors {
    fn on_touch(&mut self, handler: TouchHandler) {
        write(&self.handlers.touch).push(handler);
    }

    fn on_input_change(&mut self, handler: InputHandler) {
        write(&self.handlers.input).push(handler);
    }

    fn on_analog_change(&mut self, threshold: f64, handler: AnalogHandler) {
        write(&self.handlers.analog).push(Arc::new(AnalogSubscription {
            threshold,
            handler,
            last: Mutex::new([None; ANALOG_CHANNELS]),
        }));
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
