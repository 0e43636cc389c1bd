use sift_core::error::PipelineError;
use sift_core::profile::ProfileRecord;
use sift_core::testutil::{make_test_profile, make_test_spec};
use sift_core::traits::{ProfileStore, RequirementSource, ScoreStore};
use sift_core::{NaturalKey, Scorer};
use sift_store::{FileProfileStore, FileRequirementSource, FileScoreStore, PersistedScore};

#[tokio::test]
async fn profile_save_writes_named_json() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileProfileStore::new(dir.path());
    let profile = make_test_profile("https://example.com/in/jane");

    let path = store.save(&profile).await.unwrap();

    let name = path.file_name().unwrap().to_str().unwrap();
    let hash8 = NaturalKey::crawl(&profile.profile_url).url_hash8();
    assert!(name.starts_with("jane_doe_"), "got {name}");
    assert!(name.ends_with(&format!("_{hash8}.json")), "got {name}");

    let raw = std::fs::read(&path).unwrap();
    let read_back: ProfileRecord = serde_json::from_slice(&raw).unwrap();
    assert_eq!(read_back, profile);
}

#[tokio::test]
async fn profile_save_creates_directory() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("data").join("output");
    let store = FileProfileStore::new(&nested);

    store
        .save(&make_test_profile("https://example.com/in/jane"))
        .await
        .unwrap();
    assert!(nested.is_dir());
}

#[tokio::test]
async fn duplicate_saves_never_corrupt_either_file() {
    // Two workers racing on the same URL may both persist; every file
    // that results must stay a valid record.
    let dir = tempfile::tempdir().unwrap();
    let store = FileProfileStore::new(dir.path());
    let profile = make_test_profile("https://example.com/in/jane");

    store.save(&profile).await.unwrap();
    store.save(&profile).await.unwrap();

    let mut parsed = 0;
    for entry in std::fs::read_dir(dir.path()).unwrap() {
        let raw = std::fs::read(entry.unwrap().path()).unwrap();
        let record: ProfileRecord = serde_json::from_slice(&raw).unwrap();
        assert_eq!(record, profile);
        parsed += 1;
    }
    assert!(parsed >= 1);
}

#[tokio::test]
async fn score_save_writes_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileScoreStore::new(dir.path());
    let profile = make_test_profile("https://example.com/in/jane");
    let result = Scorer::new(make_test_spec()).score(&profile);

    let path = store.save(&profile, "backend", &result).await.unwrap();

    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.contains("_backend_"), "got {name}");
    assert!(name.ends_with("_score.json"), "got {name}");

    let raw = std::fs::read(&path).unwrap();
    let envelope: PersistedScore = serde_json::from_slice(&raw).unwrap();
    assert_eq!(envelope.profile, profile);
    assert_eq!(envelope.requirements_id, "backend");
    assert_eq!(envelope.score, result);
}

#[tokio::test]
async fn requirement_source_loads_by_id() {
    let dir = tempfile::tempdir().unwrap();
    let spec = make_test_spec();
    std::fs::write(
        dir.path().join("backend.json"),
        serde_json::to_vec_pretty(&spec).unwrap(),
    )
    .unwrap();

    let source = FileRequirementSource::new(dir.path());
    let loaded = source.load("backend").await.unwrap();
    assert_eq!(loaded, spec);
}

#[tokio::test]
async fn requirement_source_missing_id_is_scoring_error() {
    let dir = tempfile::tempdir().unwrap();
    let source = FileRequirementSource::new(dir.path());
    let err = source.load("nonexistent").await.unwrap_err();
    assert!(matches!(err, PipelineError::Scoring(_)), "got {err}");
}

#[tokio::test]
async fn requirement_source_rejects_path_traversal() {
    let dir = tempfile::tempdir().unwrap();
    let source = FileRequirementSource::new(dir.path());
    for id in ["../secrets", "a/b", "a\\b", ""] {
        let err = source.load(id).await.unwrap_err();
        assert!(matches!(err, PipelineError::Scoring(_)), "id {id:?}");
    }
}

#[tokio::test]
async fn requirement_source_invalid_json_is_scoring_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("broken.json"), b"{not json").unwrap();

    let source = FileRequirementSource::new(dir.path());
    let err = source.load("broken").await.unwrap_err();
    assert!(matches!(err, PipelineError::Scoring(_)));
}
