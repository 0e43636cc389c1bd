use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::PipelineError;
use crate::profile::ProfileRecord;

/// Wire message on the crawl queue: one profile URL to extract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlJob {
    pub url: String,
    /// Requirement spec the resulting profile should be scored against.
    /// Falls back to the worker pool's configured default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements_id: Option<String>,
}

impl CrawlJob {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            requirements_id: None,
        }
    }

    pub fn with_requirements_id(mut self, id: impl Into<String>) -> Self {
        self.requirements_id = Some(id.into());
        self
    }

    /// Parse a crawl message. Malformed JSON or a missing/empty `url`
    /// maps to [`PipelineError::InvalidJob`] so the caller can ack and
    /// drop without a redelivery loop.
    pub fn from_bytes(body: &[u8]) -> Result<Self, PipelineError> {
        let job: CrawlJob = serde_json::from_slice(body)
            .map_err(|e| PipelineError::InvalidJob(format!("bad crawl message: {e}")))?;
        if job.url.trim().is_empty() {
            return Err(PipelineError::InvalidJob("missing url".into()));
        }
        Ok(job)
    }
}

/// Wire message on the scoring queue: an extracted profile plus the
/// requirement spec id to score it against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreJob {
    pub profile_data: ProfileRecord,
    pub requirements_id: String,
    pub profile_url: String,
}

impl ScoreJob {
    pub fn new(profile: ProfileRecord, requirements_id: impl Into<String>) -> Self {
        let profile_url = profile.profile_url.clone();
        Self {
            profile_data: profile,
            requirements_id: requirements_id.into(),
            profile_url,
        }
    }

    /// Parse a scoring message, with the same drop-on-invalid contract
    /// as [`CrawlJob::from_bytes`].
    pub fn from_bytes(body: &[u8]) -> Result<Self, PipelineError> {
        let job: ScoreJob = serde_json::from_slice(body)
            .map_err(|e| PipelineError::InvalidJob(format!("bad score message: {e}")))?;
        if job.profile_url.trim().is_empty() {
            return Err(PipelineError::InvalidJob("missing profile_url".into()));
        }
        if job.requirements_id.trim().is_empty() {
            return Err(PipelineError::InvalidJob("missing requirements_id".into()));
        }
        Ok(job)
    }
}

/// Pipeline stage a terminal record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Extracted profile record.
    Profile,
    /// Score result for a (profile, requirement) pair.
    Score,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Profile => "profile",
            Stage::Score => "score",
        }
    }
}

/// External identifier used for deduplication: the URL for crawl work,
/// the URL plus requirement id for scoring work.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub stage: Stage,
    pub url: String,
    pub requirements_id: Option<String>,
}

impl NaturalKey {
    pub fn crawl(url: impl Into<String>) -> Self {
        Self {
            stage: Stage::Profile,
            url: url.into(),
            requirements_id: None,
        }
    }

    pub fn score(url: impl Into<String>, requirements_id: impl Into<String>) -> Self {
        Self {
            stage: Stage::Score,
            url: url.into(),
            requirements_id: Some(requirements_id.into()),
        }
    }

    /// Stable hash of the full natural key, as 64-char hex.
    pub fn key_hash(&self) -> String {
        match &self.requirements_id {
            Some(id) => compute_hash(&format!("{}\n{}", self.url, id)),
            None => compute_hash(&self.url),
        }
    }

    /// First 8 hex chars of the URL hash, the collision-tolerant
    /// uniqueness key embedded in persisted filenames.
    pub fn url_hash8(&self) -> String {
        compute_hash(&self.url)[..8].to_string()
    }
}

/// A recorded terminal output for a natural key at one stage.
///
/// At most one exists per `(key hash, stage)` pair; derived from the
/// persisted files, never mutated or deleted by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupRecord {
    pub natural_key_hash: String,
    pub stage: Stage,
    pub terminal_file_ref: PathBuf,
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
