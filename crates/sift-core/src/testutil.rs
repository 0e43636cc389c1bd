//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests. All mocks
//! use `Arc<Mutex<_>>` for interior mutability, allowing test
//! assertions on recorded calls. `MemoryBroker` is a full in-memory
//! broker whose consumers yield `None` once their queue drains, so
//! worker loops run to completion inside a test.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::broker::{BrokerClient, JobConsumer, JobDelivery};
use crate::error::PipelineError;
use crate::job::{DedupRecord, NaturalKey};
use crate::profile::{Education, Experience, ProfileRecord, Skill};
use crate::requirements::RequirementSpec;
use crate::score::ScoreResult;
use crate::traits::{
    DedupIndex, ProfileExtractor, ProfileStore, RequirementSource, ResultSink, ScoreStore,
};
use crate::worker::{WorkerEvent, WorkerReporter};

// ---------------------------------------------------------------------------
// MemoryBroker
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryBrokerInner {
    queues: HashMap<String, VecDeque<(u64, Vec<u8>)>>,
    next_tag: u64,
    acked: Vec<u64>,
    nacked: Vec<(u64, bool)>,
    failing_publish_queues: HashSet<String>,
}

/// In-memory broker: durable-queue semantics without a broker process.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    inner: Arc<Mutex<MemoryBrokerInner>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a message directly onto a queue.
    pub fn push(&self, queue: &str, body: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        inner.next_tag += 1;
        let tag = inner.next_tag;
        inner
            .queues
            .entry(queue.to_string())
            .or_default()
            .push_back((tag, body));
    }

    /// Make every publish to `queue` fail with a broker error.
    pub fn fail_publishes_to(&self, queue: &str) {
        self.inner
            .lock()
            .unwrap()
            .failing_publish_queues
            .insert(queue.to_string());
    }

    pub fn queue_len(&self, queue: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .queues
            .get(queue)
            .map_or(0, VecDeque::len)
    }

    /// Bodies currently sitting on a queue, front first.
    pub fn peek(&self, queue: &str) -> Vec<Vec<u8>> {
        self.inner
            .lock()
            .unwrap()
            .queues
            .get(queue)
            .map(|q| q.iter().map(|(_, body)| body.clone()).collect())
            .unwrap_or_default()
    }

    pub fn acked_count(&self) -> usize {
        self.inner.lock().unwrap().acked.len()
    }

    pub fn nacked(&self) -> Vec<(u64, bool)> {
        self.inner.lock().unwrap().nacked.clone()
    }
}

impl BrokerClient for MemoryBroker {
    type Consumer = MemoryConsumer;

    async fn declare_queue(&self, name: &str) -> Result<(), PipelineError> {
        self.inner
            .lock()
            .unwrap()
            .queues
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), PipelineError> {
        {
            let inner = self.inner.lock().unwrap();
            if inner.failing_publish_queues.contains(queue) {
                return Err(PipelineError::Broker(format!(
                    "publish to '{queue}' refused"
                )));
            }
        }
        self.push(queue, payload.to_vec());
        Ok(())
    }

    async fn consume(&self, queue: &str, _prefetch: u16) -> Result<MemoryConsumer, PipelineError> {
        Ok(MemoryConsumer {
            broker: self.clone(),
            queue: queue.to_string(),
        })
    }

    async fn queue_depth(&self, name: &str) -> Result<u32, PipelineError> {
        Ok(self.queue_len(name) as u32)
    }
}

/// Consumer over a [`MemoryBroker`] queue. Yields `None` when the
/// queue is empty so test workers drain and stop.
pub struct MemoryConsumer {
    broker: MemoryBroker,
    queue: String,
}

impl JobConsumer for MemoryConsumer {
    async fn next_delivery(&mut self) -> Result<Option<JobDelivery>, PipelineError> {
        let mut inner = self.broker.inner.lock().unwrap();
        let front = inner
            .queues
            .get_mut(&self.queue)
            .and_then(VecDeque::pop_front);
        Ok(front.map(|(tag, body)| JobDelivery { tag, body }))
    }

    async fn ack(&mut self, tag: u64) -> Result<(), PipelineError> {
        self.broker.inner.lock().unwrap().acked.push(tag);
        Ok(())
    }

    async fn nack(&mut self, tag: u64, requeue: bool) -> Result<(), PipelineError> {
        self.broker.inner.lock().unwrap().nacked.push((tag, requeue));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Mock extractor returning a fixed profile, or one error.
#[derive(Clone)]
pub struct MockExtractor {
    profile: Arc<Mutex<Option<ProfileRecord>>>,
    error: Arc<Mutex<Option<PipelineError>>>,
    calls: Arc<Mutex<u64>>,
}

impl MockExtractor {
    pub fn new(profile: ProfileRecord) -> Self {
        Self {
            profile: Arc::new(Mutex::new(Some(profile))),
            error: Arc::new(Mutex::new(None)),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_error(error: PipelineError) -> Self {
        Self {
            profile: Arc::new(Mutex::new(None)),
            error: Arc::new(Mutex::new(Some(error))),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn calls(&self) -> u64 {
        *self.calls.lock().unwrap()
    }
}

impl ProfileExtractor for MockExtractor {
    async fn extract(&self, url: &str) -> Result<ProfileRecord, PipelineError> {
        *self.calls.lock().unwrap() += 1;
        if let Some(e) = self.error.lock().unwrap().take() {
            return Err(e);
        }
        let mut profile = self.profile.lock().unwrap().clone().unwrap_or_default();
        if profile.profile_url.is_empty() {
            profile.profile_url = url.to_string();
        }
        Ok(profile)
    }
}

// ---------------------------------------------------------------------------
// MockProfileStore / MockScoreStore
// ---------------------------------------------------------------------------

/// Mock profile store recording every save.
#[derive(Clone)]
pub struct MockProfileStore {
    pub saved: Arc<Mutex<Vec<ProfileRecord>>>,
    save_error: Arc<Mutex<Option<PipelineError>>>,
}

impl MockProfileStore {
    pub fn empty() -> Self {
        Self {
            saved: Arc::new(Mutex::new(Vec::new())),
            save_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_save_error(error: PipelineError) -> Self {
        Self {
            saved: Arc::new(Mutex::new(Vec::new())),
            save_error: Arc::new(Mutex::new(Some(error))),
        }
    }
}

impl ProfileStore for MockProfileStore {
    async fn save(&self, record: &ProfileRecord) -> Result<PathBuf, PipelineError> {
        if let Some(e) = self.save_error.lock().unwrap().take() {
            return Err(e);
        }
        self.saved.lock().unwrap().push(record.clone());
        Ok(PathBuf::from(format!("{}.json", record.name_slug())))
    }
}

/// Recorded score save: (profile, requirements_id, result).
pub type SavedScore = (ProfileRecord, String, ScoreResult);

/// Mock score store recording every save.
#[derive(Clone)]
pub struct MockScoreStore {
    pub saved: Arc<Mutex<Vec<SavedScore>>>,
    save_error: Arc<Mutex<Option<PipelineError>>>,
}

impl MockScoreStore {
    pub fn empty() -> Self {
        Self {
            saved: Arc::new(Mutex::new(Vec::new())),
            save_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_save_error(error: PipelineError) -> Self {
        Self {
            saved: Arc::new(Mutex::new(Vec::new())),
            save_error: Arc::new(Mutex::new(Some(error))),
        }
    }
}

impl ScoreStore for MockScoreStore {
    async fn save(
        &self,
        profile: &ProfileRecord,
        requirements_id: &str,
        score: &ScoreResult,
    ) -> Result<PathBuf, PipelineError> {
        if let Some(e) = self.save_error.lock().unwrap().take() {
            return Err(e);
        }
        self.saved.lock().unwrap().push((
            profile.clone(),
            requirements_id.to_string(),
            score.clone(),
        ));
        Ok(PathBuf::from(format!(
            "{}_{}_score.json",
            profile.name_slug(),
            requirements_id
        )))
    }
}

// ---------------------------------------------------------------------------
// MockRequirementSource
// ---------------------------------------------------------------------------

/// Mock requirement source with one spec, or one error.
#[derive(Clone)]
pub struct MockRequirementSource {
    spec: Arc<Mutex<Option<RequirementSpec>>>,
    error: Arc<Mutex<Option<PipelineError>>>,
}

impl MockRequirementSource {
    pub fn with_spec(spec: RequirementSpec) -> Self {
        Self {
            spec: Arc::new(Mutex::new(Some(spec))),
            error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_error(error: PipelineError) -> Self {
        Self {
            spec: Arc::new(Mutex::new(None)),
            error: Arc::new(Mutex::new(Some(error))),
        }
    }
}

impl RequirementSource for MockRequirementSource {
    async fn load(&self, requirements_id: &str) -> Result<RequirementSpec, PipelineError> {
        if let Some(e) = self.error.lock().unwrap().take() {
            return Err(e);
        }
        self.spec
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| PipelineError::Scoring(format!("no spec for '{requirements_id}'")))
    }
}

// ---------------------------------------------------------------------------
// MockSink
// ---------------------------------------------------------------------------

/// Mock result sink recording every update.
#[derive(Clone)]
pub struct MockSink {
    pub updates: Arc<Mutex<Vec<(String, f64)>>>,
    error: Arc<Mutex<Option<PipelineError>>>,
}

impl MockSink {
    pub fn ok() -> Self {
        Self {
            updates: Arc::new(Mutex::new(Vec::new())),
            error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_error(error: PipelineError) -> Self {
        Self {
            updates: Arc::new(Mutex::new(Vec::new())),
            error: Arc::new(Mutex::new(Some(error))),
        }
    }
}

impl ResultSink for MockSink {
    async fn update(&self, profile_url: &str, total_score: f64) -> Result<(), PipelineError> {
        if let Some(e) = self.error.lock().unwrap().take() {
            return Err(e);
        }
        self.updates
            .lock()
            .unwrap()
            .push((profile_url.to_string(), total_score));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockDedup
// ---------------------------------------------------------------------------

/// Mock dedup index over an in-memory map keyed by the natural-key hash.
#[derive(Clone)]
pub struct MockDedup {
    records: Arc<Mutex<HashMap<String, DedupRecord>>>,
}

impl MockDedup {
    pub fn empty() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Index with one pre-existing terminal record.
    pub fn with_record(key: &NaturalKey) -> Self {
        let dedup = Self::empty();
        dedup.records.lock().unwrap().insert(
            key.key_hash(),
            DedupRecord {
                natural_key_hash: key.key_hash(),
                stage: key.stage,
                terminal_file_ref: PathBuf::from("existing.json"),
            },
        );
        dedup
    }
}

impl DedupIndex for MockDedup {
    async fn has_terminal_record(
        &self,
        key: &NaturalKey,
    ) -> Result<Option<DedupRecord>, PipelineError> {
        Ok(self.records.lock().unwrap().get(&key.key_hash()).cloned())
    }

    async fn record_terminal(
        &self,
        key: &NaturalKey,
        file_ref: &Path,
    ) -> Result<(), PipelineError> {
        self.records.lock().unwrap().insert(
            key.key_hash(),
            DedupRecord {
                natural_key_hash: key.key_hash(),
                stage: key.stage,
                terminal_file_ref: file_ref.to_path_buf(),
            },
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Worker reporter that records event labels.
#[derive(Default)]
pub struct RecordingReporter {
    labels: Arc<Mutex<Vec<String>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.labels.lock().unwrap().clone()
    }
}

impl WorkerReporter for RecordingReporter {
    fn report(&self, event: WorkerEvent<'_>) {
        let label = match &event {
            WorkerEvent::Started { .. } => "Started",
            WorkerEvent::JobStarted { .. } => "JobStarted",
            WorkerEvent::JobSkipped { .. } => "JobSkipped",
            WorkerEvent::JobInvalid { .. } => "JobInvalid",
            WorkerEvent::JobCompleted { .. } => "JobCompleted",
            WorkerEvent::JobFailed { .. } => "JobFailed",
            WorkerEvent::Stopped { .. } => "Stopped",
        };
        self.labels.lock().unwrap().push(label.to_string());
    }
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

/// Create a test profile with enough data to score meaningfully.
pub fn make_test_profile(url: &str) -> ProfileRecord {
    ProfileRecord {
        profile_url: url.to_string(),
        name: "Jane Doe".to_string(),
        location: "Berlin, Germany".to_string(),
        skills: ["python", "sql", "docker"]
            .iter()
            .map(|s| Skill {
                name: s.to_string(),
                details: vec![],
            })
            .collect(),
        experiences: vec![Experience {
            title: "Backend Engineer".to_string(),
            company: "Acme".to_string(),
            duration: "3 yrs 2 mos".to_string(),
            location: "Berlin".to_string(),
        }],
        education: vec![Education {
            school: "State University".to_string(),
            degree: "Bachelor of Science".to_string(),
            years: "2014 - 2018".to_string(),
        }],
        ..ProfileRecord::default()
    }
}

/// Create a test requirement spec matching [`make_test_profile`] well.
pub fn make_test_spec() -> RequirementSpec {
    RequirementSpec {
        position: "Backend Engineer".to_string(),
        required_skills: [("python".to_string(), 3.0), ("sql".to_string(), 1.0)]
            .into_iter()
            .collect(),
        preferred_skills: [("docker".to_string(), 1.0)].into_iter().collect(),
        min_experience_years: 2.0,
        education_level: vec![],
        ..RequirementSpec::default()
    }
}
