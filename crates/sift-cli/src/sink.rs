use std::path::PathBuf;

use sift_core::error::PipelineError;
use sift_core::traits::ResultSink;

/// Result sink that appends `(profile_url, score)` rows to a CSV file.
///
/// Stands in for an external datastore: every update is one appended
/// row, written after the authoritative score record is already on
/// disk, so losing an append loses nothing that cannot be rebuilt from
/// the score files.
#[derive(Debug, Clone)]
pub struct CsvResultSink {
    path: PathBuf,
}

impl CsvResultSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ResultSink for CsvResultSink {
    async fn update(&self, profile_url: &str, total_score: f64) -> Result<(), PipelineError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| PipelineError::Sink(e.to_string()))?;
            }
        }

        let is_new = !self.path.exists();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| PipelineError::Sink(e.to_string()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_new {
            writer
                .write_record(["profile_url", "score"])
                .map_err(|e| PipelineError::Sink(e.to_string()))?;
        }
        writer
            .write_record([profile_url, &format!("{total_score}")])
            .map_err(|e| PipelineError::Sink(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| PipelineError::Sink(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_rows_with_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.csv");
        let sink = CsvResultSink::new(&path);

        sink.update("https://example.com/in/jane", 82.5)
            .await
            .unwrap();
        sink.update("https://example.com/in/omar", 61.0)
            .await
            .unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "https://example.com/in/jane");
        assert_eq!(&rows[0][1], "82.5");
        assert_eq!(&rows[1][0], "https://example.com/in/omar");
    }

    #[tokio::test]
    async fn creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out").join("scores.csv");
        let sink = CsvResultSink::new(&path);
        sink.update("https://example.com/in/jane", 50.0)
            .await
            .unwrap();
        assert!(path.is_file());
    }
}
