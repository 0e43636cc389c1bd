use std::path::PathBuf;

use sift_core::error::PipelineError;
use sift_core::profile::ProfileRecord;
use sift_core::traits::ProfileExtractor;

/// Extractor that serves captured profile records from a directory.
///
/// The live browser extractor is an external collaborator; this is the
/// in-repo implementation of the same seam, used to replay previously
/// captured profiles through the pipeline (backfills, reprocessing
/// after a scoring change, tests against recorded data). A real
/// extractor plugs in by implementing [`ProfileExtractor`] the same
/// way.
#[derive(Debug, Clone)]
pub struct ReplayExtractor {
    dir: PathBuf,
}

impl ReplayExtractor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ProfileExtractor for ReplayExtractor {
    async fn extract(&self, url: &str) -> Result<ProfileRecord, PipelineError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(|e| {
            PipelineError::Extraction(format!(
                "captures directory {} unavailable: {e}",
                self.dir.display()
            ))
        })?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PipelineError::Extraction(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = match tokio::fs::read(&path).await {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::debug!(file = %path.display(), error = %e, "Skipping unreadable capture");
                    continue;
                }
            };
            match serde_json::from_slice::<ProfileRecord>(&raw) {
                Ok(record) if record.profile_url == url => {
                    tracing::debug!(url = %url, file = %path.display(), "Replaying captured profile");
                    return Ok(record);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(file = %path.display(), error = %e, "Skipping unparseable capture");
                }
            }
        }

        Err(PipelineError::Extraction(format!(
            "no captured profile for {url}"
        )))
    }
}
