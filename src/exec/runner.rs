// src/exec/runner.rs

//! Single child process runner.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::outcome::ExecutionResult;

/// How long to keep draining stdout/stderr after the child has exited.
///
/// A grandchild that inherited the pipes can keep them open indefinitely;
/// after this grace period whatever was captured so far is used.
const READER_GRACE: Duration = Duration::from_millis(250);

/// Everything needed to launch one child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Overlay on top of the server's own environment.
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn envs<'a, I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = &'a (&'a str, &'a str)>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.to_string(), v.to_string())));
        self
    }
}

impl fmt::Display for ProcessSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Run `spec` to completion and return its normalized result.
///
/// Never fails: spawn errors, timeouts and non-zero exits all come back as
/// an `ExecutionResult`.
///
/// - stdout lines become `output`; stderr lines are joined with `\n` into
///   `error`. Empty and whitespace-only lines are dropped from both.
/// - On timeout the child is killed and `error` carries an explicit timeout
///   message after any stderr captured so far.
/// - If the program cannot be started, `exit_code` is `-1` and `error` says
///   whether the executable was missing or something else went wrong.
pub async fn run_process(spec: &ProcessSpec) -> ExecutionResult {
    let started = Instant::now();

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(ref cwd) = spec.cwd {
        cmd.current_dir(cwd);
    }

    debug!(command = %spec, cwd = ?spec.cwd, "spawning process");

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            let message = describe_spawn_error(spec, &err).await;
            warn!(command = %spec, error = %err, "failed to spawn process");
            return ExecutionResult::spawn_failure(message).with_elapsed(started.elapsed());
        }
    };

    // Nothing is ever written to the child; closing stdin lets programs that
    // read it see EOF instead of blocking until the timeout.
    drop(child.stdin.take());

    let stdout_lines = Arc::new(Mutex::new(Vec::new()));
    let stderr_lines = Arc::new(Mutex::new(Vec::new()));
    let stdout_reader = child
        .stdout
        .take()
        .map(|out| spawn_line_reader(out, Arc::clone(&stdout_lines)));
    let stderr_reader = child
        .stderr
        .take()
        .map(|err| spawn_line_reader(err, Arc::clone(&stderr_lines)));

    let (status, timed_out) = match tokio::time::timeout(spec.timeout, child.wait()).await {
        Ok(status) => (status, false),
        Err(_elapsed) => {
            warn!(
                command = %spec,
                timeout_ms = spec.timeout.as_millis() as u64,
                "process exceeded its timeout; killing"
            );
            if let Err(e) = child.start_kill() {
                warn!(command = %spec, error = %e, "failed to kill timed-out process");
            }
            (child.wait().await, true)
        }
    };

    for reader in [stdout_reader, stderr_reader].into_iter().flatten() {
        drain_reader(reader).await;
    }

    let output = take_lines(&stdout_lines);
    let stderr = take_lines(&stderr_lines);

    let mut error = (!stderr.is_empty()).then(|| stderr.join("\n"));
    if timed_out {
        let message = timeout_message(spec.timeout);
        error = Some(match error {
            Some(stderr) => format!("{stderr}\n{message}"),
            None => message,
        });
    }

    let exit_code = match status {
        Ok(status) => exit_code_of(&status),
        Err(e) => {
            warn!(command = %spec, error = %e, "failed to wait for process");
            let message = format!("Failed to wait for process '{}': {e}", spec.program);
            error = Some(match error {
                Some(existing) => format!("{existing}\n{message}"),
                None => message,
            });
            None
        }
    };

    let result = ExecutionResult::finished(output, error, exit_code)
        .with_timed_out(timed_out)
        .with_elapsed(started.elapsed());

    info!(
        command = %spec,
        exit_code = ?result.exit_code,
        elapsed_ms = result.execution_time,
        timed_out,
        "process finished"
    );

    result
}

/// The message placed in `error` when a child is killed by its timeout.
pub fn timeout_message(timeout: Duration) -> String {
    format!(
        "Execution timed out after {} ms (terminated due to timeout)",
        timeout.as_millis()
    )
}

/// `NotFound` from spawn covers both a missing executable and a missing
/// working directory; tell them apart.
async fn describe_spawn_error(spec: &ProcessSpec, err: &io::Error) -> String {
    let program = &spec.program;
    if err.kind() != io::ErrorKind::NotFound {
        return format!("Failed to start process '{program}': {err}");
    }
    if let Some(ref cwd) = spec.cwd {
        let is_dir = tokio::fs::metadata(cwd)
            .await
            .is_ok_and(|meta| meta.is_dir());
        if !is_dir {
            return format!("Working directory not found: {}", cwd.display());
        }
    }
    format!("Interpreter not found: '{program}'. Make sure it is installed and available on PATH.")
}

/// Exit code of a finished child.
///
/// On Unix a child terminated by a signal has no code; report it the way
/// shells do (`128 + signal`) so a kill is still visible to the caller.
fn exit_code_of(status: &ExitStatus) -> Option<i32> {
    if let Some(code) = status.code() {
        return Some(code);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Some(128 + signal);
        }
    }

    None
}

fn spawn_line_reader<R>(stream: R, sink: Arc<Mutex<Vec<String>>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut segments = BufReader::new(stream).split(b'\n');
        loop {
            match segments.next_segment().await {
                Ok(Some(bytes)) => {
                    let line = String::from_utf8_lossy(&bytes);
                    let line = line.trim_end_matches('\r');
                    if line.trim().is_empty() {
                        continue;
                    }
                    if let Ok(mut lines) = sink.lock() {
                        lines.push(line.to_string());
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(error = %e, "stopped reading child output");
                    break;
                }
            }
        }
    })
}

async fn drain_reader(mut reader: JoinHandle<()>) {
    if tokio::time::timeout(READER_GRACE, &mut reader).await.is_err() {
        debug!("output pipe still open after exit; abandoning reader");
        reader.abort();
    }
}

fn take_lines(lines: &Mutex<Vec<String>>) -> Vec<String> {
    lines
        .lock()
        .map(|mut guard| std::mem::take(&mut *guard))
        .unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str, timeout_ms: u64) -> ProcessSpec {
        ProcessSpec::new("sh", Duration::from_millis(timeout_ms))
            .arg("-c")
            .arg(script)
    }

    #[tokio::test]
    async fn captures_stdout_lines_and_drops_blank_ones() {
        let result = run_process(&sh("printf 'a\\n\\n   \\nb\\n'", 5_000)).await;

        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.output, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(result.error, None);
    }

    #[tokio::test]
    async fn joins_stderr_and_reports_nonzero_exit() {
        let result = run_process(&sh("echo one >&2; echo two >&2; exit 3", 5_000)).await;

        assert!(!result.success);
        assert_eq!(result.exit_code, Some(3));
        assert_eq!(result.error.as_deref(), Some("one\ntwo"));
        assert!(!result.timed_out);
    }

    #[tokio::test]
    async fn kills_process_after_timeout() {
        let spec = ProcessSpec::new("sleep", Duration::from_millis(200)).arg("5");
        let started = Instant::now();
        let result = run_process(&spec).await;

        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(result.timed_out);
        assert!(!result.success);
        // SIGKILL
        assert_eq!(result.exit_code, Some(137));
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn missing_program_is_reported_as_not_found() {
        let spec = ProcessSpec::new("definitely-not-a-real-binary-4711", Duration::from_secs(1));
        let result = run_process(&spec).await;

        assert_eq!(result.exit_code, Some(-1));
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Interpreter not found"));
    }

    #[tokio::test]
    async fn missing_cwd_is_reported_as_such() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("gone");
        let result = run_process(&sh("true", 5_000).cwd(&gone)).await;

        assert_eq!(result.exit_code, Some(-1));
        assert_eq!(
            result.error.unwrap(),
            format!("Working directory not found: {}", gone.display())
        );
    }

    #[tokio::test]
    async fn applies_env_overlay_and_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let spec = sh("echo \"$PYTHONUTF8\"; pwd", 5_000)
            .envs(&crate::exec::CHILD_ENV)
            .cwd(dir.path());
        let result = run_process(&spec).await;

        assert!(result.success);
        assert_eq!(result.output[0], "1");
        let reported = std::fs::canonicalize(&result.output[1]).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn spec_displays_as_command_line() {
        let spec = ProcessSpec::new("python3", Duration::from_secs(1))
            .args(["-m", "pip", "list"]);
        assert_eq!(spec.to_string(), "python3 -m pip list");
    }
}
