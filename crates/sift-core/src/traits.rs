use std::future::Future;
use std::path::PathBuf;

use crate::error::PipelineError;
use crate::job::{DedupRecord, NaturalKey};
use crate::profile::ProfileRecord;
use crate::requirements::RequirementSpec;
use crate::score::ScoreResult;

/// Turns a live profile URL into a structured [`ProfileRecord`].
///
/// Implementations own whatever sessions, credentials, or browsers they
/// need; the pipeline never sees them. Errors are per-URL: a failing
/// extraction must never take the worker down with it.
pub trait ProfileExtractor: Send + Sync + Clone {
    fn extract(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<ProfileRecord, PipelineError>> + Send;
}

/// Persists extracted profiles. `save` returns the terminal file ref;
/// a successful return means the record is durable.
pub trait ProfileStore: Send + Sync + Clone {
    fn save(
        &self,
        record: &ProfileRecord,
    ) -> impl Future<Output = Result<PathBuf, PipelineError>> + Send;
}

/// Persists score results alongside the profile they were computed from.
pub trait ScoreStore: Send + Sync + Clone {
    fn save(
        &self,
        profile: &ProfileRecord,
        requirements_id: &str,
        score: &ScoreResult,
    ) -> impl Future<Output = Result<PathBuf, PipelineError>> + Send;
}

/// Loads a named [`RequirementSpec`]. Specs are provisioned by
/// configuration; the pipeline only ever reads them.
pub trait RequirementSource: Send + Sync + Clone {
    fn load(
        &self,
        requirements_id: &str,
    ) -> impl Future<Output = Result<RequirementSpec, PipelineError>> + Send;
}

/// Downstream consumer of final scores (external datastore, dashboard).
///
/// Called only after the authoritative score record is persisted; a
/// failure here is counted but never fails the job.
pub trait ResultSink: Send + Sync + Clone {
    fn update(
        &self,
        profile_url: &str,
        total_score: f64,
    ) -> impl Future<Output = Result<(), PipelineError>> + Send;
}

/// A no-op ResultSink for pipelines without a downstream consumer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ResultSink for NullSink {
    async fn update(&self, _profile_url: &str, _total_score: f64) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// Read-time index over persisted terminal records.
///
/// The persisted output files are the source of truth; this index only
/// answers "was this natural key already completed at this stage"
/// quickly. A miss is authoritative only after the fallback rescan, so
/// a narrow two-workers-same-key race remains possible and is accepted.
pub trait DedupIndex: Send + Sync + Clone {
    fn has_terminal_record(
        &self,
        key: &NaturalKey,
    ) -> impl Future<Output = Result<Option<DedupRecord>, PipelineError>> + Send;

    /// Record a freshly written terminal output. Called exactly once
    /// per successful terminal write; never mutates existing records.
    fn record_terminal(
        &self,
        key: &NaturalKey,
        file_ref: &std::path::Path,
    ) -> impl Future<Output = Result<(), PipelineError>> + Send;
}
