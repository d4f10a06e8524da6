// src/blocks/lower.rs

//! Raw editor blocks → typed [`Block`] tree.
//!
//! Every supported block kind is a variant of [`Block`]; the code generator
//! matches on it exhaustively, so adding a kind means adding a variant here
//! and an arm there. Anything else is rejected with
//! [`CompileError::UnsupportedBlock`].

use crate::robot::{Motor, MoveDirection};

use super::CompileError;
use super::raw::RawBlock;

/// Upper bound on `controls_repeat` counts; repeats are unrolled into the
/// command list.
pub const MAX_REPEAT: u32 = 1000;

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    SetMotorPower { motor: Motor, power: i32 },
    Move { direction: MoveDirection, seconds: f64 },
    StopMotors,
    SetServoAngle { servo: u8, angle: f64 },
    Wait { seconds: f64 },
    /// Expression only: contributes text, never a command.
    ReadSensor { sensor: String },
    Repeat { times: u32, body: Vec<Block> },
}

/// Lower a statement chain starting at `first` (following `next` links).
pub fn lower_chain(first: &RawBlock) -> Result<Vec<Block>, CompileError> {
    let mut out = Vec::new();
    let mut cursor = Some(first);
    while let Some(raw) = cursor {
        out.push(lower_block(raw)?);
        cursor = raw.next_block();
    }
    Ok(out)
}

pub fn lower_block(raw: &RawBlock) -> Result<Block, CompileError> {
    match raw.kind.as_str() {
        "motor_set_power" => Ok(Block::SetMotorPower {
            motor: motor(raw, "MOTOR")?,
            power: integer_in(raw, "POWER", -100, 100)? as i32,
        }),
        "motor_move" => Ok(Block::Move {
            direction: direction(raw, "DIRECTION")?,
            seconds: seconds(raw, "DURATION")?,
        }),
        "motor_stop" => Ok(Block::StopMotors),
        "servo_set_angle" => Ok(Block::SetServoAngle {
            servo: integer_in(raw, "SERVO", 0, i64::from(u8::MAX))? as u8,
            angle: number_in(raw, "ANGLE", 0.0, 180.0)?,
        }),
        "wait_seconds" => Ok(Block::Wait {
            seconds: seconds(raw, "SECONDS")?,
        }),
        "sensor_read" => Ok(Block::ReadSensor {
            sensor: sensor_name(raw, "SENSOR")?,
        }),
        "controls_repeat" | "controls_repeat_ext" => {
            let times = integer_in(raw, "TIMES", 0, i64::from(MAX_REPEAT))? as u32;
            let body = match raw.statement("DO") {
                Some(first) => lower_chain(first)?,
                None => Vec::new(),
            };
            Ok(Block::Repeat { times, body })
        }
        other => Err(CompileError::UnsupportedBlock {
            block_type: other.to_string(),
        }),
    }
}

fn motor(raw: &RawBlock, name: &str) -> Result<Motor, CompileError> {
    let value = raw.text(name)?;
    match value.to_ascii_lowercase().as_str() {
        "left" => Ok(Motor::Left),
        "right" => Ok(Motor::Right),
        _ => Err(raw.invalid(name, format!("unknown motor '{value}'"))),
    }
}

fn direction(raw: &RawBlock, name: &str) -> Result<MoveDirection, CompileError> {
    let value = raw.text(name)?;
    match value.to_ascii_lowercase().as_str() {
        "forward" => Ok(MoveDirection::Forward),
        "backward" => Ok(MoveDirection::Backward),
        "left" => Ok(MoveDirection::Left),
        "right" => Ok(MoveDirection::Right),
        _ => Err(raw.invalid(name, format!("unknown direction '{value}'"))),
    }
}

fn seconds(raw: &RawBlock, name: &str) -> Result<f64, CompileError> {
    // One day is plenty for a classroom robot.
    number_in(raw, name, 0.0, 86_400.0)
}

fn number_in(raw: &RawBlock, name: &str, min: f64, max: f64) -> Result<f64, CompileError> {
    let value = raw.number(name)?;
    if !value.is_finite() || value < min || value > max {
        return Err(raw.invalid(name, format!("{value} is outside {min}..={max}")));
    }
    Ok(value)
}

fn integer_in(raw: &RawBlock, name: &str, min: i64, max: i64) -> Result<i64, CompileError> {
    let value = number_in(raw, name, min as f64, max as f64)?;
    if value.fract() != 0.0 {
        return Err(raw.invalid(name, format!("{value} is not a whole number")));
    }
    Ok(value as i64)
}

/// Sensor names end up inside generated source, so keep them to identifiers.
fn sensor_name(raw: &RawBlock, name: &str) -> Result<String, CompileError> {
    let value = raw.text(name)?;
    if value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(value)
    } else {
        Err(raw.invalid(name, format!("'{value}' is not a valid sensor name")))
    }
}
