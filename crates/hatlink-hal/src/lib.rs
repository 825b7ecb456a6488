//! `hatlink-hal` – hardware capability contract.
//!
//! The bridge never touches registers directly. It drives outputs through
//! the [`Switch`] and [`Motor`] traits, collected per channel in a
//! [`HardwareRegistry`], and receives inputs through callbacks registered on
//! a [`SensorHub`]. Real board drivers implement these traits; [`sim`]
//! provides in-process stand-ins.

pub mod motor;
pub mod registry;
pub mod sensors;
pub mod sim;
pub mod switch;

pub use motor::Motor;
pub use registry::HardwareRegistry;
pub use sensors::{AnalogHandler, InputHandler, SensorHub, TouchHandler};
pub use sim::{SimBoard, SimSensors};
pub use switch::Switch;
