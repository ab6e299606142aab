use std::sync::{Arc, Mutex};

use dagflow::engine::RunEvent;
use dagflow::exec::{ExecutorBackend, TaskJob, TokioBackend};
use tokio::sync::mpsc;

/// Backend that records the order in which tasks are dispatched and then
/// runs them with the default tokio backend.
#[derive(Default)]
pub struct RecordingBackend {
    dispatched: Arc<Mutex<Vec<String>>>,
    inner: TokioBackend,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared view of the dispatch log.
    pub fn log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.dispatched)
    }
}

impl ExecutorBackend for RecordingBackend {
    fn spawn_job(&mut self, job: TaskJob, events: mpsc::UnboundedSender<RunEvent>) {
        self.dispatched
            .lock()
            .unwrap()
            .push(job.task_name().to_string());
        self.inner.spawn_job(job, events);
    }
}
