// src/exec/outcome.rs

use std::time::Duration;

use serde::Serialize;

/// Normalized outcome of one execution-style operation.
///
/// Serializes to the wire shape
/// `{success, output, error, executionTime, exitCode}`.
///
/// Invariant: `success == (exit_code == Some(0))`. All constructors go through
/// [`ExecutionResult::finished`] or leave `exit_code` non-zero/absent, so the
/// flag can never disagree with the code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    pub output: Vec<String>,
    pub error: Option<String>,
    /// Wall-clock milliseconds.
    pub execution_time: u64,
    pub exit_code: Option<i32>,
    /// Whether the child was killed by its timeout.
    #[serde(skip)]
    pub timed_out: bool,
}

/// Exit code reported when the child could not be started at all.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = -1;

impl ExecutionResult {
    /// A request rejected before anything was spawned (empty code, no
    /// packages, bad temp dir...).
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: Vec::new(),
            error: Some(error.into()),
            execution_time: 0,
            exit_code: None,
            timed_out: false,
        }
    }

    /// The child could not be spawned (interpreter missing, permission denied...).
    pub fn spawn_failure(error: impl Into<String>) -> Self {
        Self {
            exit_code: Some(SPAWN_FAILURE_EXIT_CODE),
            ..Self::rejected(error)
        }
    }

    /// The child ran and exited (possibly killed) with `exit_code`.
    pub fn finished(output: Vec<String>, error: Option<String>, exit_code: Option<i32>) -> Self {
        Self {
            success: exit_code == Some(0),
            output,
            error,
            execution_time: 0,
            exit_code,
            timed_out: false,
        }
    }

    /// A built-in that completed locally without spawning.
    pub fn local_success(output: Vec<String>) -> Self {
        Self::finished(output, None, Some(0))
    }

    /// A built-in that failed locally with a specific exit code.
    pub fn local_failure(error: impl Into<String>, exit_code: i32) -> Self {
        Self::finished(Vec::new(), Some(error.into()), Some(exit_code))
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.execution_time = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_timed_out(mut self, timed_out: bool) -> Self {
        self.timed_out = timed_out;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_tracks_exit_code() {
        assert!(ExecutionResult::finished(vec![], None, Some(0)).success);
        assert!(!ExecutionResult::finished(vec![], None, Some(2)).success);
        assert!(!ExecutionResult::finished(vec![], None, None).success);
        assert!(!ExecutionResult::spawn_failure("nope").success);
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let result = ExecutionResult::finished(vec!["2".into()], None, Some(0))
            .with_elapsed(Duration::from_millis(12))
            .with_timed_out(false);
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "success": true,
                "output": ["2"],
                "error": null,
                "executionTime": 12,
                "exitCode": 0
            })
        );
    }
}
