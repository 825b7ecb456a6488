//! Generic `Switch` trait for discrete on/off hardware (lights, digital
//! outputs, relays, …).

use hatlink_types::LinkError;

/// A discrete on/off hardware channel.
///
/// Lights and digital outputs both implement this trait and are registered
/// with a [`HardwareRegistry`][crate::registry::HardwareRegistry] in channel
/// order.
pub trait Switch: Send + Sync {
    /// Stable identifier for this channel, e.g. `"light.1"`.
    fn id(&self) -> &str;

    /// Drive the channel `on` (`true`) or off (`false`).
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::HardwareFault`] if the command cannot be applied.
    fn set_state(&mut self, on: bool) -> Result<(), LinkError>;

    /// Return the channel's current state (`true` = on).
    fn state(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockSwitch {
        id: String,
        on: bool,
    }

    impl Switch for MockSwitch {
        fn id(&self) -> &str {
            &self.id
        }

        fn set_state(&mut self, on: bool) -> Result<(), LinkError> {
            self.on = on;
            Ok(())
        }

        fn state(&self) -> bool {
            self.on
        }
    }

    #[test]
    fn mock_switch_toggle() {
        let mut light = MockSwitch {
            id: "light.1".to_string(),
            on: false,
        };
        assert_eq!(light.id(), "light.1");
        assert!(!light.state());

        light.set_state(true).unwrap();
        assert!(light.state());

        light.set_state(false).unwrap();
        assert!(!light.state());
    }
}
