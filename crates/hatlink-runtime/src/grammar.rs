//! Control-channel grammar.
//!
//! ```text
//! line     := resource "." channel ":" payload | "stop"
//! resource := "light" | "motor" | "output"
//! channel  := alias | 1-based decimal
//! ```
//!
//! Lines that do not have this shape parse to [`Command::Unrecognized`].
//! Lines that have the shape but carry a bad channel or payload produce the
//! [`LinkError`] to report to the parent.

use hatlink_types::{Actuation, Command, LinkError, MOTOR_SPEED_LIMIT, Resource};

/// Parse one control line.
///
/// # Errors
///
/// * [`LinkError::InvalidChannel`] – the channel token is neither an alias
///   nor a channel number in range.
/// * [`LinkError::UnhandledValue`] – a light/output payload other than
///   `1`, `on`, `0`, `off`.
/// * [`LinkError::InvalidValue`] – a motor payload that is not an integer in
///   `-100..=100`.
pub fn parse(line: &str) -> Result<Command, LinkError> {
    let line = line.trim();
    if line == "stop" {
        return Ok(Command::Stop);
    }

    let Some((target, payload)) = line.split_once(':') else {
        return Ok(Command::Unrecognized);
    };
    let Some((keyword, token)) = target.split_once('.') else {
        return Ok(Command::Unrecognized);
    };
    let Some(resource) = Resource::from_keyword(keyword) else {
        return Ok(Command::Unrecognized);
    };

    let index = resource.resolve_channel(token)?;
    let actuation = match resource {
        Resource::Light => Actuation::Light {
            index,
            on: parse_switch(payload)?,
        },
        Resource::Output => Actuation::Output {
            index,
            on: parse_switch(payload)?,
        },
        Resource::Motor => Actuation::Motor {
            index,
            speed: parse_speed(payload)?,
        },
    };
    Ok(Command::Actuate(actuation))
}

fn parse_switch(payload: &str) -> Result<bool, LinkError> {
    match payload {
        "1" | "on" => Ok(true),
        "0" | "off" => Ok(false),
        other => Err(LinkError::UnhandledValue(other.to_string())),
    }
}

fn parse_speed(payload: &str) -> Result<i8, LinkError> {
    let speed: i32 = payload
        .parse()
        .map_err(|_| LinkError::InvalidValue(payload.to_string()))?;
    let limit = i32::from(MOTOR_SPEED_LIMIT);
    if !(-limit..=limit).contains(&speed) {
        return Err(LinkError::InvalidValue(speed.to_string()));
    }
    i8::try_from(speed).map_err(|_| LinkError::InvalidValue(speed.to_string()))
}
