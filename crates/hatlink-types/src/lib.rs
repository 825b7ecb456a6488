//! `hatlink-types` – shared protocol vocabulary.
//!
//! Board geometry and channel alias tables, the parsed [`Command`] and
//! [`Actuation`] forms of control lines, the [`Event`] lines written back to
//! the parent, and the [`LinkError`] taxonomy whose `Display` text is the
//! exact `ERROR:` message on the wire.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of addressable lights on the board.
pub const LIGHT_COUNT: usize = 4;
/// Number of addressable digital outputs on the board.
pub const OUTPUT_COUNT: usize = 4;
/// Number of addressable motors on the board.
pub const MOTOR_COUNT: usize = 2;
/// Number of analog sensor channels.
pub const ANALOG_CHANNELS: usize = 4;
/// Largest absolute motor speed accepted on the control channel.
pub const MOTOR_SPEED_LIMIT: i8 = 100;

/// Human-readable light names, in channel order.
pub const LIGHT_ALIASES: [&str; LIGHT_COUNT] = ["blue", "yellow", "red", "green"];
/// Human-readable output names, in channel order.
pub const OUTPUT_ALIASES: [&str; OUTPUT_COUNT] = ["one", "two", "three", "four"];
/// Human-readable motor names, in channel order.
pub const MOTOR_ALIASES: [&str; MOTOR_COUNT] = ["one", "two"];
/// Digital input pin names, in channel order.
pub const INPUT_ALIASES: [&str; 4] = ["one", "two", "three", "four"];

/// Addressable output resources in the command grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Light,
    Motor,
    Output,
}

impl Resource {
    /// Look up a resource by its command keyword (`"light"`, `"motor"`,
    /// `"output"`).
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "light" => Some(Resource::Light),
            "motor" => Some(Resource::Motor),
            "output" => Some(Resource::Output),
            _ => None,
        }
    }

    /// The keyword used for this resource on the control channel.
    pub fn keyword(self) -> &'static str {
        match self {
            Resource::Light => "light",
            Resource::Motor => "motor",
            Resource::Output => "output",
        }
    }

    /// Number of channels the board exposes for this resource.
    pub fn channel_count(self) -> usize {
        self.aliases().len()
    }

    /// Alias table for this resource, indexed by zero-based channel.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Resource::Light => &LIGHT_ALIASES,
            Resource::Motor => &MOTOR_ALIASES,
            Resource::Output => &OUTPUT_ALIASES,
        }
    }

    /// Resolve a channel token to a zero-based index.
    ///
    /// The token is first looked up in the alias table; otherwise it is read
    /// as a 1-based decimal channel number.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::InvalidChannel`] carrying the token as written
    /// when it neither names an alias nor a channel in range.
    pub fn resolve_channel(self, token: &str) -> Result<usize, LinkError> {
        if let Some(index) = self.aliases().iter().position(|alias| *alias == token) {
            return Ok(index);
        }
        match token.parse::<usize>() {
            Ok(n) if (1..=self.channel_count()).contains(&n) => Ok(n - 1),
            _ => Err(LinkError::InvalidChannel(token.to_string())),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// 1-based index reported for a digital input pin name, if the pin is known.
pub fn input_index(pin_name: &str) -> Option<usize> {
    INPUT_ALIASES
        .iter()
        .position(|alias| *alias == pin_name)
        .map(|i| i + 1)
}

/// A validated request to drive one hardware output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload")]
pub enum Actuation {
    /// Switch a light on or off.
    Light { index: usize, on: bool },
    /// Switch a digital output on or off.
    Output { index: usize, on: bool },
    /// Run a motor at `speed` percent, `-100..=100`.
    Motor { index: usize, speed: i8 },
}

impl Actuation {
    /// The resource this actuation targets.
    pub fn resource(&self) -> Resource {
        match self {
            Actuation::Light { .. } => Resource::Light,
            Actuation::Output { .. } => Resource::Output,
            Actuation::Motor { .. } => Resource::Motor,
        }
    }

    /// Zero-based channel index of the target.
    pub fn index(&self) -> usize {
        match *self {
            Actuation::Light { index, .. }
            | Actuation::Output { index, .. }
            | Actuation::Motor { index, .. } => index,
        }
    }
}

/// A single parsed control-channel line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Drive a hardware output.
    Actuate(Actuation),
    /// Shut the bridge down.
    Stop,
    /// Anything the grammar does not recognise. Ignored.
    Unrecognized,
}

/// Touch pad transition reported by the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TouchState {
    Press,
    Release,
}

/// A single output-channel line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Event {
    /// `touch.<channel>:<0|1>`
    Touch { channel: u8, pressed: bool },
    /// `input.<1-based index>:<raw value>`
    Input { index: usize, value: u8 },
    /// `analog.<0-based channel>:<value>`
    Analog { channel: usize, value: f64 },
    /// `ERROR: <message>`
    Error { message: String },
}

impl Event {
    pub fn touch(channel: u8, state: TouchState) -> Self {
        Event::Touch {
            channel,
            pressed: state == TouchState::Press,
        }
    }

    pub fn error(err: &LinkError) -> Self {
        Event::Error {
            message: err.to_string(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Touch { channel, pressed } => {
                write!(f, "touch.{channel}:{}", u8::from(*pressed))
            }
            Event::Input { index, value } => write!(f, "input.{index}:{value}"),
            Event::Analog { channel, value } => write!(f, "analog.{channel}:{value}"),
            Event::Error { message } => write!(f, "ERROR: {message}"),
        }
    }
}

/// Returned by [`Event::from_str`] for lines that are not a protocol event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognised event line: {0:?}")]
pub struct EventParseError(pub String);

impl FromStr for Event {
    type Err = EventParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if let Some(message) = line.strip_prefix("ERROR: ") {
            return Ok(Event::Error {
                message: message.to_string(),
            });
        }

        let bad = || EventParseError(line.to_string());
        let (head, value) = line.split_once(':').ok_or_else(bad)?;
        let (kind, channel) = head.split_once('.').ok_or_else(bad)?;

        match kind {
            "touch" => {
                let pressed = match value {
                    "1" => true,
                    "0" => false,
                    _ => return Err(bad()),
                };
                Ok(Event::Touch {
                    channel: channel.parse().map_err(|_| bad())?,
                    pressed,
                })
            }
            "input" => Ok(Event::Input {
                index: channel.parse().map_err(|_| bad())?,
                value: value.parse().map_err(|_| bad())?,
            }),
            "analog" => Ok(Event::Analog {
                channel: channel.parse().map_err(|_| bad())?,
                value: value.parse().map_err(|_| bad())?,
            }),
            _ => Err(bad()),
        }
    }
}

/// Errors raised anywhere in the bridge.
///
/// The `Display` text of the command-validation variants is exactly the
/// message reported to the parent after `ERROR: `.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Invalid channel: {0}")]
    InvalidChannel(String),

    #[error("Unhandled value: '{0}'")]
    UnhandledValue(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Hardware fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_channel_by_alias() {
        assert_eq!(Resource::Light.resolve_channel("blue").unwrap(), 0);
        assert_eq!(Resource::Light.resolve_channel("green").unwrap(), 3);
        assert_eq!(Resource::Motor.resolve_channel("two").unwrap(), 1);
        assert_eq!(Resource::Output.resolve_channel("three").unwrap(), 2);
    }

    #[test]
    fn resolve_channel_by_number() {
        assert_eq!(Resource::Output.resolve_channel("3").unwrap(), 2);
        assert_eq!(Resource::Motor.resolve_channel("1").unwrap(), 0);
    }

    #[test]
    fn resolve_channel_rejects_out_of_range() {
        for (resource, token) in [
            (Resource::Light, "5"),
            (Resource::Light, "0"),
            (Resource::Motor, "3"),
            (Resource::Output, "-1"),
            (Resource::Light, "purple"),
            (Resource::Motor, "three"),
        ] {
            let err = resource.resolve_channel(token).unwrap_err();
            assert!(
                matches!(&err, LinkError::InvalidChannel(t) if t == token),
                "{resource}.{token} gave {err:?}"
            );
        }
    }

    #[test]
    fn input_pins_report_one_based() {
        assert_eq!(input_index("one"), Some(1));
        assert_eq!(input_index("four"), Some(4));
        assert_eq!(input_index("five"), None);
    }

    #[test]
    fn event_display_formats() {
        assert_eq!(Event::touch(3, TouchState::Press).to_string(), "touch.3:1");
        assert_eq!(Event::touch(8, TouchState::Release).to_string(), "touch.8:0");
        assert_eq!(Event::Input { index: 2, value: 1 }.to_string(), "input.2:1");
        assert_eq!(
            Event::Analog { channel: 0, value: 3.3 }.to_string(),
            "analog.0:3.3"
        );
        let err = LinkError::InvalidChannel("5".to_string());
        assert_eq!(Event::error(&err).to_string(), "ERROR: Invalid channel: 5");
    }

    #[test]
    fn event_lines_parse_back() {
        for line in ["touch.4:1", "input.1:0", "analog.2:1.25", "ERROR: Invalid value: 150"] {
            let event: Event = line.parse().unwrap();
            assert_eq!(event.to_string(), line);
        }
    }

    #[test]
    fn event_parse_rejects_garbage() {
        for line in ["Goodbye", "touch.1:2", "analog.x:1.0", "light.1:on", ""] {
            assert!(line.parse::<Event>().is_err(), "{line:?} should not parse");
        }
    }

    #[test]
    fn command_error_messages() {
        assert_eq!(
            LinkError::UnhandledValue("dim".to_string()).to_string(),
            "Unhandled value: 'dim'"
        );
        assert_eq!(
            LinkError::InvalidValue("150".to_string()).to_string(),
            "Invalid value: 150"
        );
        let fault = LinkError::HardwareFault {
            component: "motor.1".to_string(),
            details: "stalled".to_string(),
        };
        assert!(fault.to_string().contains("motor.1"));
    }

    #[test]
    fn actuation_serialization_roundtrip() {
        let act = Actuation::Motor { index: 1, speed: -40 };
        let json = serde_json::to_string(&act).unwrap();
        let back: Actuation = serde_json::from_str(&json).unwrap();
        assert_eq!(act, back);
        assert_eq!(back.resource(), Resource::Motor);
        assert_eq!(back.index(), 1);
    }
}
