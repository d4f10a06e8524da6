use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use blockbot::exec::{ExecutionResult, ProcessBackend, ProcessSpec};

/// A fake process backend that:
/// - records every spec it is asked to run (nothing is spawned)
/// - answers with scripted results in order, then a plain success.
#[derive(Clone, Default)]
pub struct FakeBackend {
    specs: Arc<Mutex<Vec<ProcessSpec>>>,
    scripted: Arc<Mutex<VecDeque<ExecutionResult>>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result returned by the next `run`.
    pub fn respond_with(self, result: ExecutionResult) -> Self {
        self.scripted.lock().unwrap().push_back(result);
        self
    }

    pub fn specs(&self) -> Vec<ProcessSpec> {
        self.specs.lock().unwrap().clone()
    }

    pub fn spawn_count(&self) -> usize {
        self.specs.lock().unwrap().len()
    }

    pub fn arc(&self) -> Arc<dyn ProcessBackend> {
        Arc::new(self.clone())
    }
}

impl ProcessBackend for FakeBackend {
    fn run(
        &self,
        spec: ProcessSpec,
    ) -> Pin<Box<dyn Future<Output = ExecutionResult> + Send + '_>> {
        self.specs.lock().unwrap().push(spec);
        let result = self
            .scripted
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ExecutionResult::finished(Vec::new(), None, Some(0)));
        Box::pin(async move { result })
    }
}
