// src/exec/backend.rs

//! Pluggable process backend abstraction.
//!
//! The services talk to a `ProcessBackend` instead of calling
//! [`run_process`] directly. This makes it easy to swap in a fake backend in
//! tests (to assert that validation failures never spawn anything, or to
//! script a particular outcome) while production uses `RealProcessBackend`.

use std::future::Future;
use std::pin::Pin;

use super::outcome::ExecutionResult;
use super::runner::{run_process, ProcessSpec};

/// Trait abstracting how a process spec gets executed.
pub trait ProcessBackend: Send + Sync {
    /// Run `spec` to completion.
    ///
    /// Implementations must resolve exactly once and never panic on
    /// ordinary failures; everything is reported through the result.
    fn run(
        &self,
        spec: ProcessSpec,
    ) -> Pin<Box<dyn Future<Output = ExecutionResult> + Send + '_>>;
}

/// Real backend used in production: spawns OS processes via
/// [`run_process`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RealProcessBackend;

impl ProcessBackend for RealProcessBackend {
    fn run(
        &self,
        spec: ProcessSpec,
    ) -> Pin<Box<dyn Future<Output = ExecutionResult> + Send + '_>> {
        Box::pin(async move { run_process(&spec).await })
    }
}
