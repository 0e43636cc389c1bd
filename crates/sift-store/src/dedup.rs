use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use sift_core::error::PipelineError;
use sift_core::job::{DedupRecord, NaturalKey, Stage};
use sift_core::traits::DedupIndex;

use crate::records::PersistedScore;

/// Read-time dedup index over a record directory.
///
/// The persisted files are the source of truth; this index never
/// writes them. Lookup order:
/// 1. in-memory cache of keys recorded this process lifetime,
/// 2. filename scan for the embedded `url_hash8` (and requirements-id
///    segment for score records),
/// 3. full rescan parsing each record and comparing the literal
///    `profile_url` field, which tolerates files written by tooling
///    that predates the hashed filenames.
///
/// A miss is only authoritative after step 3, so two workers starting
/// the same key before either writes remains possible; that duplicate
/// is accepted and harmless because filenames self-identify the URL.
#[derive(Clone)]
pub struct FileDedupIndex {
    dir: PathBuf,
    stage: Stage,
    seen: Arc<Mutex<HashMap<String, PathBuf>>>,
}

impl FileDedupIndex {
    /// Index over extracted profile records.
    pub fn profiles(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, Stage::Profile)
    }

    /// Index over persisted score records.
    pub fn scores(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, Stage::Score)
    }

    fn new(dir: impl Into<PathBuf>, stage: Stage) -> Self {
        Self {
            dir: dir.into(),
            stage,
            seen: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn found(&self, key: &NaturalKey, path: PathBuf) -> DedupRecord {
        self.seen
            .lock()
            .unwrap()
            .insert(key.key_hash(), path.clone());
        DedupRecord {
            natural_key_hash: key.key_hash(),
            stage: self.stage,
            terminal_file_ref: path,
        }
    }

    /// Does this filename carry the key's hash (and requirement id)?
    fn filename_matches(&self, name: &str, key: &NaturalKey) -> bool {
        match self.stage {
            Stage::Profile => name.ends_with(&format!("_{}.json", key.url_hash8())),
            Stage::Score => {
                let hash_ok = name.ends_with(&format!("_{}_score.json", key.url_hash8()));
                let req_ok = key
                    .requirements_id
                    .as_deref()
                    .map(|id| name.contains(&format!("_{id}_")))
                    .unwrap_or(false);
                hash_ok && req_ok
            }
        }
    }

    /// Does this record's content carry the key's literal fields?
    fn content_matches(&self, raw: &[u8], key: &NaturalKey) -> bool {
        match self.stage {
            Stage::Profile => serde_json::from_slice::<sift_core::ProfileRecord>(raw)
                .map(|record| record.profile_url == key.url)
                .unwrap_or(false),
            Stage::Score => serde_json::from_slice::<PersistedScore>(raw)
                .map(|envelope| {
                    envelope.profile.profile_url == key.url
                        && Some(&envelope.requirements_id) == key.requirements_id.as_ref()
                })
                .unwrap_or(false),
        }
    }

    async fn list_json_files(&self) -> Result<Vec<PathBuf>, PipelineError> {
        let mut files = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            // No directory yet means nothing was ever persisted.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(path);
            }
        }
        Ok(files)
    }
}

impl DedupIndex for FileDedupIndex {
    async fn has_terminal_record(
        &self,
        key: &NaturalKey,
    ) -> Result<Option<DedupRecord>, PipelineError> {
        if let Some(path) = self.seen.lock().unwrap().get(&key.key_hash()).cloned() {
            return Ok(Some(DedupRecord {
                natural_key_hash: key.key_hash(),
                stage: self.stage,
                terminal_file_ref: path,
            }));
        }

        let files = self.list_json_files().await?;

        for path in &files {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            if self.filename_matches(name, key) {
                return Ok(Some(self.found(key, path.clone())));
            }
        }

        // Fallback rescan on the literal key fields.
        for path in &files {
            let raw = match tokio::fs::read(path).await {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::debug!(file = %path.display(), error = %e, "Skipping unreadable record");
                    continue;
                }
            };
            if self.content_matches(&raw, key) {
                return Ok(Some(self.found(key, path.clone())));
            }
        }

        Ok(None)
    }

    async fn record_terminal(
        &self,
        key: &NaturalKey,
        file_ref: &Path,
    ) -> Result<(), PipelineError> {
        self.seen
            .lock()
            .unwrap()
            .insert(key.key_hash(), file_ref.to_path_buf());
        Ok(())
    }
}
