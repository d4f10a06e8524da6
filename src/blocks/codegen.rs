// src/blocks/codegen.rs

//! One traversal over typed blocks producing both outputs: Python source
//! for the editor's code view, and the robot command list.

use std::fmt::Write as _;
use std::time::Duration;

use crate::robot::{Motor, RobotCommand};

use super::lower::Block;

const INDENT: &str = "    ";

pub(crate) const PROLOGUE: &str = "import time\nfrom robot import Robot\n\nrobot = Robot()\n\n";
pub(crate) const EPILOGUE: &str = "\nif __name__ == \"__main__\":\n    main()\n";

/// Accumulates the two outputs.
pub(crate) struct Emitter {
    body: String,
    commands: Vec<RobotCommand>,
    timestamp: u64,
}

impl Emitter {
    /// All commands of one compilation share `timestamp`.
    pub(crate) fn new(timestamp: u64) -> Self {
        Self {
            body: String::new(),
            commands: Vec::new(),
            timestamp,
        }
    }

    pub(crate) fn emit_all(&mut self, blocks: &[Block], depth: usize) {
        for block in blocks {
            self.emit(block, depth);
        }
    }

    fn emit(&mut self, block: &Block, depth: usize) {
        let timestamp = self.timestamp;
        match block {
            Block::SetMotorPower { motor, power } => {
                let name = match motor {
                    Motor::Left => "left",
                    Motor::Right => "right",
                };
                self.line(depth, format!("robot.set_motor_power(\"{name}\", {power})"));
                self.commands.push(RobotCommand::SetMotorPower {
                    motor: *motor,
                    power: *power,
                    timestamp,
                });
            }
            Block::Move { direction, seconds } => {
                self.line(
                    depth,
                    format!("robot.move(\"{}\", {})", direction.as_str(), number(*seconds)),
                );
                self.commands.push(RobotCommand::Move {
                    direction: *direction,
                    duration_ms: millis(*seconds),
                    timestamp,
                });
            }
            Block::StopMotors => {
                self.line(depth, "robot.stop_motors()".to_string());
                self.commands.push(RobotCommand::StopMotors { timestamp });
            }
            Block::SetServoAngle { servo, angle } => {
                self.line(
                    depth,
                    format!("robot.set_servo_angle({servo}, {})", number(*angle)),
                );
                self.commands.push(RobotCommand::SetServoAngle {
                    servo: *servo,
                    angle: *angle,
                    timestamp,
                });
            }
            Block::Wait { seconds } => {
                self.line(depth, format!("time.sleep({})", number(*seconds)));
                self.commands.push(RobotCommand::Wait {
                    duration_ms: millis(*seconds),
                    timestamp,
                });
            }
            Block::ReadSensor { sensor } => {
                self.line(depth, format!("print(robot.read_sensor(\"{sensor}\"))"));
            }
            Block::Repeat { times, body } => {
                self.line(depth, format!("for _ in range({times}):"));
                if body.is_empty() {
                    self.line(depth + 1, "pass".to_string());
                    return;
                }

                // The source keeps the loop; the command list is unrolled.
                let start = self.commands.len();
                self.emit_all(body, depth + 1);
                let once = self.commands.split_off(start);
                for _ in 0..*times {
                    self.commands.extend(once.iter().cloned());
                }
            }
        }
    }

    fn line(&mut self, depth: usize, text: String) {
        for _ in 0..depth {
            self.body.push_str(INDENT);
        }
        self.body.push_str(&text);
        self.body.push('\n');
    }

    /// Wrap the emitted statements into a runnable module.
    pub(crate) fn finish(self) -> (String, Vec<RobotCommand>) {
        let mut code = String::from(PROLOGUE);
        code.push_str("def main():\n");
        if self.body.is_empty() {
            let _ = writeln!(code, "{INDENT}pass");
        } else {
            for line in self.body.lines() {
                let _ = writeln!(code, "{INDENT}{line}");
            }
        }
        code.push_str(EPILOGUE);
        (code, self.commands)
    }
}

/// Python literal for a number: whole values without a fraction.
fn number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn millis(seconds: f64) -> u64 {
    u64::try_from(Duration::from_secs_f64(seconds).as_millis()).unwrap_or(u64::MAX)
}
