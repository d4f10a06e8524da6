// src/service/mod.rs

//! Request-level services built on the process runner.
//!
//! - [`code`]: run submitted source under its interpreter.
//! - [`packages`]: pip install / list.
//! - [`terminal`]: stateless terminal emulation with a few local built-ins.

pub mod code;
pub mod packages;
pub mod terminal;

pub use code::{CodeExecutionService, ExecutionRequest};
pub use packages::{PackageInstallRequest, PackageInstaller, PackageResult};
pub use terminal::{TerminalEmulator, TerminalRequest, TerminalResult};
