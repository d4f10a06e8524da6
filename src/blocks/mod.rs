// src/blocks/mod.rs

//! Visual block program compiler.
//!
//! A program posted by the block editor is compiled into two outputs from a
//! single traversal:
//!
//! - Python source shown in the editor's code view (fixed prologue, a
//!   `main()` with one line per statement, `pass` when empty);
//! - the ordered [`RobotCommand`] list the sequential executor runs.
//!
//! Compilation never panics. An unsupported block or malformed field yields
//! a single diagnostic comment as the source and an empty command list.
//! Compiling the same program twice gives identical source; commands differ
//! only in their timestamps.

pub mod codegen;
pub mod lower;
pub mod raw;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::robot::{RobotCommand, now_millis};

pub use lower::{Block, MAX_REPEAT};
pub use raw::{BlockProgram, RawBlock, RawInput, RawNext};

/// Upper bound on the unrolled command list of one program.
pub const MAX_COMMANDS: u64 = 10_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("Unsupported block type: {block_type}")]
    UnsupportedBlock { block_type: String },

    #[error("Invalid field {field} in block {block_type}: {reason}")]
    InvalidField {
        block_type: String,
        field: String,
        reason: String,
    },

    #[error("Program too large: {count} commands after unrolling (limit {MAX_COMMANDS})")]
    TooManyCommands { count: u64 },
}

/// Result of compiling a block program.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Compiled {
    pub code: String,
    pub commands: Vec<RobotCommand>,
}

impl Compiled {
    /// Diagnostic output for a program that could not be compiled.
    pub fn diagnostic(err: &CompileError) -> Self {
        let message = err.to_string().replace(['\r', '\n'], " ");
        Self {
            code: format!("# Error: {message}\n"),
            commands: Vec::new(),
        }
    }
}

/// Lower the whole program into typed top-level statements.
pub fn lower_program(program: &BlockProgram) -> Result<Vec<Block>, CompileError> {
    let mut statements = Vec::new();
    for top in &program.blocks {
        statements.extend(lower::lower_chain(top)?);
    }

    let count = command_count(&statements);
    if count > MAX_COMMANDS {
        return Err(CompileError::TooManyCommands { count });
    }
    Ok(statements)
}

/// Compile, surfacing the error instead of a diagnostic comment.
pub fn try_compile(program: &BlockProgram) -> Result<Compiled, CompileError> {
    let statements = lower_program(program)?;

    let mut emitter = codegen::Emitter::new(now_millis());
    emitter.emit_all(&statements, 0);
    let (code, commands) = emitter.finish();

    debug!(
        statements = statements.len(),
        commands = commands.len(),
        "compiled block program"
    );
    Ok(Compiled { code, commands })
}

pub fn compile(program: &BlockProgram) -> Compiled {
    try_compile(program).unwrap_or_else(|err| {
        warn!(error = %err, "block program did not compile");
        Compiled::diagnostic(&err)
    })
}

fn command_count(blocks: &[Block]) -> u64 {
    blocks.iter().fold(0u64, |total, block| {
        let own = match block {
            Block::ReadSensor { .. } => 0,
            Block::Repeat { times, body } => u64::from(*times).saturating_mul(command_count(body)),
            _ => 1,
        };
        total.saturating_add(own)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn program(value: serde_json::Value) -> BlockProgram {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn empty_program_is_a_runnable_placeholder() {
        let compiled = compile(&BlockProgram::default());
        assert!(compiled.code.contains("def main():\n    pass\n"));
        assert!(compiled.code.starts_with("import time\n"));
        assert!(compiled.commands.is_empty());
    }

    #[test]
    fn unsupported_block_yields_one_diagnostic_line() {
        let compiled = compile(&program(json!({
            "blocks": [{"type": "motor_stop", "next": {"block": {"type": "play\ntone"}}}]
        })));
        assert_eq!(compiled.code, "# Error: Unsupported block type: play tone\n");
        assert!(compiled.commands.is_empty());
    }

    #[test]
    fn nested_repeats_are_bounded() {
        let inner = json!({"type": "controls_repeat", "fields": {"TIMES": 1000},
            "inputs": {"DO": {"block": {"type": "motor_stop"}}}});
        let outer = json!({"type": "controls_repeat", "fields": {"TIMES": 1000},
            "inputs": {"DO": {"block": inner}}});

        let err = try_compile(&program(json!({"blocks": [outer]}))).unwrap_err();
        assert_eq!(err, CompileError::TooManyCommands { count: 1_000_000 });
    }
}
