use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sift_core::error::PipelineError;
use sift_core::job::NaturalKey;
use sift_core::profile::ProfileRecord;
use sift_core::requirements::RequirementSpec;
use sift_core::score::ScoreResult;
use sift_core::traits::{ProfileStore, RequirementSource, ScoreStore};

fn storage_err(path: &std::path::Path, e: std::io::Error) -> PipelineError {
    PipelineError::Storage(format!("{}: {e}", path.display()))
}

/// On-disk envelope for one score result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedScore {
    pub profile: ProfileRecord,
    pub requirements_id: String,
    pub score: ScoreResult,
    pub scored_at: DateTime<Utc>,
}

/// Writes profile records as pretty JSON files named
/// `{name_slug}_{timestamp}_{url_hash8}.json`.
///
/// The URL hash suffix makes accidental duplicate writes for the same
/// profile self-identifying even when the dedup check raced.
#[derive(Debug, Clone)]
pub struct FileProfileStore {
    dir: PathBuf,
}

impl FileProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ProfileStore for FileProfileStore {
    async fn save(&self, record: &ProfileRecord) -> Result<PathBuf, PipelineError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| storage_err(&self.dir, e))?;

        let key = NaturalKey::crawl(&record.profile_url);
        let filename = format!(
            "{}_{}_{}.json",
            record.name_slug(),
            Utc::now().format("%Y%m%d_%H%M%S"),
            key.url_hash8()
        );
        let path = self.dir.join(filename);

        let json = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| storage_err(&path, e))?;
        Ok(path)
    }
}

/// Writes score results as pretty JSON files named
/// `{name_slug}_{requirements_id}_{timestamp}_{url_hash8}_score.json`.
#[derive(Debug, Clone)]
pub struct FileScoreStore {
    dir: PathBuf,
}

impl FileScoreStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ScoreStore for FileScoreStore {
    async fn save(
        &self,
        profile: &ProfileRecord,
        requirements_id: &str,
        score: &ScoreResult,
    ) -> Result<PathBuf, PipelineError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| storage_err(&self.dir, e))?;

        let key = NaturalKey::crawl(&profile.profile_url);
        let filename = format!(
            "{}_{}_{}_{}_score.json",
            profile.name_slug(),
            requirements_id,
            Utc::now().format("%Y%m%d_%H%M%S"),
            key.url_hash8()
        );
        let path = self.dir.join(filename);

        let envelope = PersistedScore {
            profile: profile.clone(),
            requirements_id: requirements_id.to_string(),
            score: score.clone(),
            scored_at: Utc::now(),
        };
        let json = serde_json::to_vec_pretty(&envelope)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| storage_err(&path, e))?;
        Ok(path)
    }
}

/// Loads requirement specs from `{dir}/{requirements_id}.json`.
#[derive(Debug, Clone)]
pub struct FileRequirementSource {
    dir: PathBuf,
}

impl FileRequirementSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl RequirementSource for FileRequirementSource {
    async fn load(&self, requirements_id: &str) -> Result<RequirementSpec, PipelineError> {
        // Ids are filenames; reject anything that could escape the dir.
        if requirements_id.is_empty()
            || requirements_id.contains(['/', '\\'])
            || requirements_id.contains("..")
        {
            return Err(PipelineError::Scoring(format!(
                "invalid requirements id '{requirements_id}'"
            )));
        }

        let path = self.dir.join(format!("{requirements_id}.json"));
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PipelineError::Scoring(format!(
                    "requirements not found: {}",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&raw).map_err(|e| {
            PipelineError::Scoring(format!("invalid requirements {}: {e}", path.display()))
        })
    }
}
