// src/robot/command.rs

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Milliseconds since the UNIX epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Motor {
    Left,
    Right,
}

/// Direction of a `move` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Forward,
    Backward,
    Left,
    Right,
}

impl MoveDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            MoveDirection::Forward => "forward",
            MoveDirection::Backward => "backward",
            MoveDirection::Left => "left",
            MoveDirection::Right => "right",
        }
    }
}

/// Rotation reported for a single motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotorDirection {
    Forward,
    Backward,
    #[default]
    Stop,
}

/// One instruction for the robot.
///
/// Serialized with a `type` tag, e.g.
/// `{"type":"move","direction":"forward","duration":1000,"timestamp":...}`.
/// Durations are milliseconds. Tags this build does not know decode to
/// [`RobotCommand::Unknown`], which the executor skips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RobotCommand {
    SetMotorPower {
        motor: Motor,
        /// -100..=100; the sign selects the rotation direction.
        power: i32,
        #[serde(default)]
        timestamp: u64,
    },
    Move {
        direction: MoveDirection,
        #[serde(rename = "duration")]
        duration_ms: u64,
        #[serde(default)]
        timestamp: u64,
    },
    StopMotors {
        #[serde(default)]
        timestamp: u64,
    },
    SetServoAngle {
        servo: u8,
        /// Degrees, 0..=180.
        angle: f64,
        #[serde(default)]
        timestamp: u64,
    },
    Wait {
        #[serde(rename = "duration")]
        duration_ms: u64,
        #[serde(default)]
        timestamp: u64,
    },
    #[serde(other)]
    Unknown,
}

impl RobotCommand {
    pub fn set_motor_power(motor: Motor, power: i32) -> Self {
        RobotCommand::SetMotorPower {
            motor,
            power,
            timestamp: now_millis(),
        }
    }

    pub fn move_for(direction: MoveDirection, duration: Duration) -> Self {
        RobotCommand::Move {
            direction,
            duration_ms: duration_to_millis(duration),
            timestamp: now_millis(),
        }
    }

    pub fn stop_motors() -> Self {
        RobotCommand::StopMotors {
            timestamp: now_millis(),
        }
    }

    pub fn set_servo_angle(servo: u8, angle: f64) -> Self {
        RobotCommand::SetServoAngle {
            servo,
            angle,
            timestamp: now_millis(),
        }
    }

    pub fn wait(duration: Duration) -> Self {
        RobotCommand::Wait {
            duration_ms: duration_to_millis(duration),
            timestamp: now_millis(),
        }
    }

    /// Wire tag of this command (`"unknown"` for unrecognised ones).
    pub fn kind(&self) -> &'static str {
        match self {
            RobotCommand::SetMotorPower { .. } => "set_motor_power",
            RobotCommand::Move { .. } => "move",
            RobotCommand::StopMotors { .. } => "stop_motors",
            RobotCommand::SetServoAngle { .. } => "set_servo_angle",
            RobotCommand::Wait { .. } => "wait",
            RobotCommand::Unknown => "unknown",
        }
    }

    pub fn timestamp(&self) -> Option<u64> {
        match self {
            RobotCommand::SetMotorPower { timestamp, .. }
            | RobotCommand::Move { timestamp, .. }
            | RobotCommand::StopMotors { timestamp }
            | RobotCommand::SetServoAngle { timestamp, .. }
            | RobotCommand::Wait { timestamp, .. } => Some(*timestamp),
            RobotCommand::Unknown => None,
        }
    }

    /// Copy of this command with its timestamp zeroed, for comparisons that
    /// should ignore when a command was created.
    pub fn without_timestamp(&self) -> Self {
        let mut copy = self.clone();
        match &mut copy {
            RobotCommand::SetMotorPower { timestamp, .. }
            | RobotCommand::Move { timestamp, .. }
            | RobotCommand::StopMotors { timestamp }
            | RobotCommand::SetServoAngle { timestamp, .. }
            | RobotCommand::Wait { timestamp, .. } => *timestamp = 0,
            RobotCommand::Unknown => {}
        }
        copy
    }
}

fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
