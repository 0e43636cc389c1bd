use thiserror::Error;

/// Pipeline-wide error types.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Broker connection, publish, or consume failure.
    ///
    /// Fatal to the worker that hit it, not to the pool: other workers
    /// keep their own connections and continue.
    #[error("Broker unavailable: {0}")]
    Broker(String),

    /// Malformed job message. Acked and dropped, never redelivered.
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    /// Profile extraction failed for a single URL.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Scoring failed (missing requirement spec, bad profile payload).
    #[error("Scoring failed: {0}")]
    Scoring(String),

    /// Persistence of a terminal record failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Result sink update failed after the record was already persisted.
    #[error("Sink error: {0}")]
    Sink(String),

    /// Missing or malformed configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Returns true if the message should be acked and dropped rather
    /// than nacked: redelivering a malformed payload only loops it.
    pub fn is_drop_on_ack(&self) -> bool {
        matches!(self, PipelineError::InvalidJob(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_job_is_dropped_not_nacked() {
        assert!(PipelineError::InvalidJob("no url".into()).is_drop_on_ack());
        assert!(!PipelineError::Extraction("timeout".into()).is_drop_on_ack());
        assert!(!PipelineError::Broker("down".into()).is_drop_on_ack());
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: PipelineError = io.into();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
