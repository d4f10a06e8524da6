// src/service/terminal.rs

//! Terminal emulator.
//!
//! The server keeps no session state: the caller sends the directory it
//! believes it is in, and gets back the directory it is in afterwards.
//! `clear`, `pwd` and `cd <dir>` are answered locally; everything else runs
//! in a fresh shell, so a `cd` buried inside a compound command does not
//! carry over to the next request.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::TerminalSection;
use crate::exec::{CHILD_ENV, ExecutionResult, ProcessBackend, ProcessSpec};
use crate::fs::{FileSystem, resolve_lexically};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalRequest {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub working_directory: Option<PathBuf>,
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl TerminalRequest {
    pub fn new(command: impl Into<String>, working_directory: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            working_directory: Some(working_directory.into()),
            timeout: None,
        }
    }
}

/// Wire shape `{success, output, error, exitCode, workingDirectory}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalResult {
    pub success: bool,
    pub output: Vec<String>,
    pub error: Option<String>,
    pub exit_code: Option<i32>,
    /// Directory the caller should send with its next command.
    pub working_directory: String,
}

impl TerminalResult {
    fn new(result: ExecutionResult, working_directory: &Path) -> Self {
        Self {
            success: result.success,
            output: result.output,
            error: result.error,
            exit_code: result.exit_code,
            working_directory: working_directory.display().to_string(),
        }
    }
}

/// Built-ins answered without spawning a process.
#[derive(Debug, PartialEq, Eq)]
enum Builtin<'a> {
    Clear,
    Pwd,
    Cd(&'a str),
}

impl<'a> Builtin<'a> {
    fn parse(command: &'a str) -> Option<Self> {
        match command {
            "clear" => Some(Builtin::Clear),
            "pwd" => Some(Builtin::Pwd),
            _ => command.strip_prefix("cd ").map(|rest| Builtin::Cd(rest.trim())),
        }
    }
}

pub struct TerminalEmulator {
    config: TerminalSection,
    fs: Arc<dyn FileSystem>,
    backend: Arc<dyn ProcessBackend>,
}

impl TerminalEmulator {
    pub fn new(
        config: TerminalSection,
        fs: Arc<dyn FileSystem>,
        backend: Arc<dyn ProcessBackend>,
    ) -> Self {
        Self { config, fs, backend }
    }

    pub async fn run(&self, request: TerminalRequest) -> TerminalResult {
        let cwd = request
            .working_directory
            .clone()
            .unwrap_or_else(|| self.default_dir());
        let command = request.command.trim();

        if command.is_empty() {
            return TerminalResult::new(ExecutionResult::rejected("No command provided"), &cwd);
        }

        if let Some(builtin) = Builtin::parse(command) {
            debug!(?builtin, cwd = %cwd.display(), "handling terminal built-in");
            return self.run_builtin(builtin, &cwd);
        }

        if !self.fs.is_dir(&cwd) {
            return TerminalResult::new(
                ExecutionResult::local_failure(
                    format!("Working directory not found: {}", cwd.display()),
                    1,
                ),
                &cwd,
            );
        }

        let timeout = Duration::from_millis(
            request
                .timeout
                .filter(|ms| *ms > 0)
                .unwrap_or(self.config.default_timeout_ms),
        );
        // Built-ins match on the trimmed text; the shell gets it verbatim.
        let spec = self.shell_spec(&request.command, timeout).cwd(&cwd);

        info!(command, cwd = %cwd.display(), "delegating terminal command to shell");
        let result = self.backend.run(spec).await;
        TerminalResult::new(result, &cwd)
    }

    fn run_builtin(&self, builtin: Builtin<'_>, cwd: &Path) -> TerminalResult {
        match builtin {
            Builtin::Clear => TerminalResult::new(
                ExecutionResult::local_success(vec!["Terminal cleared".to_string()]),
                cwd,
            ),
            Builtin::Pwd => TerminalResult::new(
                ExecutionResult::local_success(vec![cwd.display().to_string()]),
                cwd,
            ),
            Builtin::Cd(target) => {
                let resolved = resolve_lexically(cwd, Path::new(target));
                if self.fs.is_dir(&resolved) {
                    TerminalResult::new(ExecutionResult::local_success(Vec::new()), &resolved)
                } else {
                    let attempted = cwd.join(target);
                    TerminalResult::new(
                        ExecutionResult::local_failure(
                            format!("Directory not found: {}", attempted.display()),
                            1,
                        ),
                        cwd,
                    )
                }
            }
        }
    }

    fn shell_spec(&self, command: &str, timeout: Duration) -> ProcessSpec {
        let (default_shell, flag) = if cfg!(windows) {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };
        let shell = self.config.shell.as_deref().unwrap_or(default_shell);

        ProcessSpec::new(shell, timeout)
            .arg(flag)
            .arg(command)
            .envs(&CHILD_ENV)
    }

    fn default_dir(&self) -> PathBuf {
        self.config
            .default_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_builtins_only_in_exact_form() {
        assert_eq!(Builtin::parse("clear"), Some(Builtin::Clear));
        assert_eq!(Builtin::parse("pwd"), Some(Builtin::Pwd));
        assert_eq!(Builtin::parse("cd  ../src "), Some(Builtin::Cd("../src")));
        assert_eq!(Builtin::parse("pwd -P"), None);
        assert_eq!(Builtin::parse("cdrom"), None);
        assert_eq!(Builtin::parse("clear && ls"), None);
    }
}
