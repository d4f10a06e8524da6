// src/exec/mod.rs

//! Process execution layer.
//!
//! Every operation that leaves the server process (running submitted code,
//! pip installs, terminal commands) goes through here, using
//! `tokio::process::Command`.
//!
//! - [`outcome`] defines [`ExecutionResult`], the normalized record every
//!   execution-style operation returns.
//! - [`runner`] spawns one child per call, captures its output, enforces the
//!   timeout and resolves exactly once with an `ExecutionResult`.
//! - [`backend`] provides the `ProcessBackend` trait and the production
//!   `RealProcessBackend`; tests replace it with a fake that never spawns.

pub mod backend;
pub mod outcome;
pub mod runner;

pub use backend::{ProcessBackend, RealProcessBackend};
pub use outcome::ExecutionResult;
pub use runner::{run_process, ProcessSpec};

/// Environment forced onto every child: unbuffered, UTF-8 interpreter output.
///
/// Applied identically to code execution, package installs and terminal
/// delegation, since terminal commands frequently invoke the same interpreter.
pub const CHILD_ENV: [(&str, &str); 3] = [
    ("PYTHONUNBUFFERED", "1"),
    ("PYTHONIOENCODING", "utf-8"),
    ("PYTHONUTF8", "1"),
];
