#![allow(dead_code)]

use std::path::PathBuf;

use blockbot::blocks::{BlockProgram, RawBlock, RawInput, RawNext};
use blockbot::config::{ConfigFile, RawConfigFile};
use serde_json::{json, Value};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigBuilder {
    config: RawConfigFile,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn listen(mut self, addr: &str) -> Self {
        self.config.server.listen = addr.to_string();
        self
    }

    pub fn exec_timeout_ms(mut self, ms: u64) -> Self {
        self.config.execution.default_timeout_ms = ms;
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.execution.temp_dir = Some(dir.into());
        self
    }

    pub fn python(mut self, interpreter: &str) -> Self {
        self.config.execution.python = Some(interpreter.to_string());
        self
    }

    pub fn requirements_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.packages.requirements_file = path.into();
        self
    }

    pub fn terminal_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.terminal.default_dir = Some(dir.into());
        self
    }

    pub fn move_power(mut self, power: u8) -> Self {
        self.config.robot.move_power = power;
        self
    }

    /// The raw config, for tests exercising validation failures.
    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Shorthand for a raw block with the given fields.
///
/// `block("motor_move", json!({"DIRECTION": "forward", "DURATION": 1}))`
pub fn block(kind: &str, fields: Value) -> RawBlock {
    let mut raw = RawBlock::new(kind);
    if let Value::Object(map) = fields {
        raw.fields = map.into_iter().collect();
    }
    raw
}

/// Builder for a single-stack `BlockProgram`: each pushed block is chained
/// onto the previous one through `next`, the way the editor saves them.
pub struct BlockProgramBuilder {
    stack: Vec<RawBlock>,
}

impl BlockProgramBuilder {
    pub fn new() -> Self {
        Self { stack: Vec::new() }
    }

    pub fn push(mut self, block: RawBlock) -> Self {
        self.stack.push(block);
        self
    }

    pub fn set_power(self, motor: &str, power: i32) -> Self {
        self.push(block("motor_set_power", json!({"MOTOR": motor, "POWER": power})))
    }

    pub fn move_for(self, direction: &str, seconds: f64) -> Self {
        self.push(block(
            "motor_move",
            json!({"DIRECTION": direction, "DURATION": seconds}),
        ))
    }

    pub fn stop(self) -> Self {
        self.push(block("motor_stop", json!({})))
    }

    pub fn servo(self, servo: u8, angle: f64) -> Self {
        self.push(block("servo_set_angle", json!({"SERVO": servo, "ANGLE": angle})))
    }

    pub fn wait(self, seconds: f64) -> Self {
        self.push(block("wait_seconds", json!({"SECONDS": seconds})))
    }

    pub fn read_sensor(self, sensor: &str) -> Self {
        self.push(block("sensor_read", json!({"SENSOR": sensor})))
    }

    /// `controls_repeat` whose body is the stack built by `body`.
    pub fn repeat(self, times: u32, body: BlockProgramBuilder) -> Self {
        let mut raw = block("controls_repeat", json!({"TIMES": times}));
        if let Some(first) = body.chain() {
            raw.inputs.insert(
                "DO".to_string(),
                RawInput {
                    block: Some(Box::new(first)),
                    shadow: None,
                },
            );
        }
        self.push(raw)
    }

    /// Fold the stack into one `next`-linked chain.
    fn chain(self) -> Option<RawBlock> {
        self.stack.into_iter().rev().fold(None, |next, mut raw| {
            if let Some(next) = next {
                raw.next = Some(RawNext {
                    block: Box::new(next),
                });
            }
            Some(raw)
        })
    }

    pub fn build(self) -> BlockProgram {
        BlockProgram::new(self.chain().into_iter().collect())
    }

    /// The program as the JSON body the editor would post.
    pub fn into_json(self) -> Value {
        serde_json::to_value(self.build()).expect("program should serialize")
    }
}

impl Default for BlockProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}
