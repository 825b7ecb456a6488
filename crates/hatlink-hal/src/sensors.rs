//! Input-side capability contract: callback registration for touch pads,
//! digital inputs and analog sensors.
//!
//! The hardware layer delivers callbacks on its own schedule, from any
//! thread, and callbacks for different channels may run concurrently with
//! each other. Handlers must therefore be `Send + Sync` and must not assume
//! they run on the thread that registered them.

use std::sync::Arc;

use hatlink_types::TouchState;

/// Called with `(channel, state)` when a touch pad is pressed or released.
pub type TouchHandler = Arc<dyn Fn(u8, TouchState) + Send + Sync>;

/// Called with `(pin_name, raw_value)` when a digital input changes.
pub type InputHandler = Arc<dyn Fn(&str, u8) + Send + Sync>;

/// Called with `(channel, value)` when an analog reading changes by at least
/// the threshold given at registration.
pub type AnalogHandler = Arc<dyn Fn(usize, f64) + Send + Sync>;

/// Source of asynchronous hardware input events.
pub trait SensorHub {
    /// Register a handler for touch press and release events.
    fn on_touch(&mut self, handler: TouchHandler);

    /// Register a handler for digital input changes.
    fn on_input_change(&mut self, handler: InputHandler);

    /// Register a handler for analog changes of at least `threshold`
    /// (absolute units) since the last value delivered to this handler.
    fn on_analog_change(&mut self, threshold: f64, handler: AnalogHandler);
}
