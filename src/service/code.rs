// src/service/code.rs

//! Code execution service: run a submitted source file under its interpreter.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tempfile::TempPath;
use tracing::{debug, info, warn};

use crate::config::ExecutionSection;
use crate::exec::{CHILD_ENV, ExecutionResult, ProcessBackend, ProcessSpec};
use crate::types::Language;

/// Body of a code execution request.
///
/// `code` and `language` default so that a body missing them is reported as
/// an ordinary validation failure rather than a malformed request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub working_directory: Option<PathBuf>,
    /// Milliseconds; falls back to `[execution].default_timeout_ms`.
    #[serde(default)]
    pub timeout: Option<u64>,
}

fn default_language() -> String {
    Language::Python.to_string()
}

impl ExecutionRequest {
    pub fn new(code: impl Into<String>, language: Language) -> Self {
        Self {
            code: code.into(),
            language: language.to_string(),
            working_directory: None,
            timeout: None,
        }
    }
}

pub struct CodeExecutionService {
    config: ExecutionSection,
    backend: Arc<dyn ProcessBackend>,
}

impl CodeExecutionService {
    pub fn new(config: ExecutionSection, backend: Arc<dyn ProcessBackend>) -> Self {
        Self { config, backend }
    }

    /// Write `request.code` to a temp file, run it, delete the file.
    ///
    /// `execution_time` covers the whole write → run → cleanup sequence.
    /// Nothing is spawned for empty code or an unsupported language.
    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        let started = Instant::now();

        if request.code.trim().is_empty() {
            debug!("rejecting execution request with empty code");
            return ExecutionResult::rejected("No code provided");
        }

        let language = match request.language.parse::<Language>() {
            Ok(language) => language,
            Err(e) => return ExecutionResult::rejected(e),
        };

        let timeout = Duration::from_millis(
            request
                .timeout
                .filter(|ms| *ms > 0)
                .unwrap_or(self.config.default_timeout_ms),
        );

        let source = match write_source(&self.config.temp_dir(), language, &request.code) {
            Ok(path) => path,
            Err(e) => {
                warn!(%language, error = %e, "failed to write temporary source file");
                return ExecutionResult::rejected(format!(
                    "Failed to write temporary source file: {e}"
                ))
                .with_elapsed(started.elapsed());
            }
        };

        let mut spec = ProcessSpec::new(self.config.interpreter_for(language), timeout)
            .arg(source.to_string_lossy())
            .envs(&CHILD_ENV);
        if let Some(dir) = request.working_directory {
            spec = spec.cwd(dir);
        }

        info!(%language, file = %source.display(), "executing submitted code");
        let result = self.backend.run(spec).await;

        remove_source(source);

        result.with_elapsed(started.elapsed())
    }
}

/// Persist `code` to a uniquely named file in `dir`.
///
/// The returned `TempPath` deletes the file when dropped, so the file is
/// removed even if the surrounding future is cancelled mid-run.
fn write_source(dir: &Path, language: Language, code: &str) -> std::io::Result<TempPath> {
    let suffix = format!(".{}", language.extension());
    let mut file = tempfile::Builder::new()
        .prefix("blockbot-")
        .suffix(&suffix)
        .tempfile_in(dir)?;
    file.write_all(code.as_bytes())?;
    file.flush()?;
    Ok(file.into_temp_path())
}

fn remove_source(source: TempPath) {
    let path = source.to_path_buf();
    if let Err(e) = source.close() {
        warn!(file = %path.display(), error = %e, "failed to delete temporary source file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_file_gets_language_extension_and_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), Language::JavaScript, "console.log(1)").unwrap();
        let path = source.to_path_buf();

        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("js"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "console.log(1)");

        remove_source(source);
        assert!(!path.exists());
    }

    #[test]
    fn request_defaults_to_python() {
        let request: ExecutionRequest = serde_json::from_str(r#"{"code":"print(1)"}"#).unwrap();
        assert_eq!(request.language, "python");
        assert_eq!(request.timeout, None);
    }
}
