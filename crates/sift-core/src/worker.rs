/// Events emitted by workers for monitoring/logging.
#[derive(Debug, Clone)]
pub enum WorkerEvent<'a> {
    Started {
        worker_id: &'a str,
        queue: &'a str,
    },
    JobStarted {
        url: &'a str,
    },
    /// Dedup hit: a terminal record already exists for this key.
    JobSkipped {
        url: &'a str,
    },
    /// Malformed message, acked and dropped.
    JobInvalid {
        reason: &'a str,
    },
    JobCompleted {
        url: &'a str,
    },
    JobFailed {
        url: &'a str,
        error: &'a str,
    },
    Stopped {
        worker_id: &'a str,
    },
}

/// Trait for receiving worker events (decoupled logging).
pub trait WorkerReporter: Send + Sync {
    fn report(&self, event: WorkerEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWorkerReporter;

impl WorkerReporter for TracingWorkerReporter {
    fn report(&self, event: WorkerEvent<'_>) {
        match event {
            WorkerEvent::Started { worker_id, queue } => {
                tracing::info!(%worker_id, %queue, "Worker started");
            }
            WorkerEvent::JobStarted { url } => {
                tracing::info!(%url, "Processing job");
            }
            WorkerEvent::JobSkipped { url } => {
                tracing::info!(%url, "Skipped: terminal record already exists");
            }
            WorkerEvent::JobInvalid { reason } => {
                tracing::warn!(%reason, "Invalid message dropped");
            }
            WorkerEvent::JobCompleted { url } => {
                tracing::info!(%url, "Job completed");
            }
            WorkerEvent::JobFailed { url, error } => {
                tracing::warn!(%url, %error, "Job failed (not requeued)");
            }
            WorkerEvent::Stopped { worker_id } => {
                tracing::info!(%worker_id, "Worker stopped");
            }
        }
    }
}

/// How a successfully handled job terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Work done, terminal record persisted.
    Completed,
    /// Dedup hit, nothing to do.
    Skipped,
}
