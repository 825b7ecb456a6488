//! Generic `Motor` trait for speed-controlled DC motors.

use hatlink_types::LinkError;

/// A bidirectional speed-controlled motor.
///
/// Speed is a signed percentage: `-100` is full reverse, `0` is stopped and
/// `100` is full forward.
pub trait Motor: Send + Sync {
    /// Stable identifier for this motor, e.g. `"motor.1"`.
    fn id(&self) -> &str;

    /// Command the motor to run at `speed` percent.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::HardwareFault`] if the command cannot be applied
    /// (e.g. the driver is in a fault state or `speed` is outside
    /// `-100..=100`).
    fn set_speed(&mut self, speed: i8) -> Result<(), LinkError>;

    /// Return the most recently commanded speed.
    fn speed(&self) -> i8;
}
