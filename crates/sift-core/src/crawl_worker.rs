use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::broker::{BrokerClient, JobConsumer, JobDelivery};
use crate::error::PipelineError;
use crate::job::{CrawlJob, NaturalKey, ScoreJob};
use crate::profile::ProfileRecord;
use crate::stats::PipelineStats;
use crate::traits::{DedupIndex, ProfileExtractor, ProfileStore};
use crate::worker::{JobOutcome, WorkerEvent, WorkerReporter};

/// Configuration for one extraction worker.
#[derive(Debug, Clone)]
pub struct CrawlWorkerConfig {
    pub worker_id: String,
    pub crawl_queue: String,
    pub scoring_queue: String,
    /// Requirement spec attached to score jobs when the crawl message
    /// carries none.
    pub default_requirements_id: String,
    /// Unacked deliveries the broker may hand this worker at once.
    /// 1 means a job fully finishes, side effects included, before the
    /// next is accepted.
    pub prefetch: u16,
}

impl Default for CrawlWorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: format!("crawl-{}", &Uuid::new_v4().to_string()[..8]),
            crawl_queue: "crawl_queue".to_string(),
            scoring_queue: "scoring_queue".to_string(),
            default_requirements_id: "default".to_string(),
            prefetch: 1,
        }
    }
}

impl CrawlWorkerConfig {
    pub fn with_worker_id(mut self, id: impl Into<String>) -> Self {
        self.worker_id = id.into();
        self
    }

    pub fn with_queues(
        mut self,
        crawl_queue: impl Into<String>,
        scoring_queue: impl Into<String>,
    ) -> Self {
        self.crawl_queue = crawl_queue.into();
        self.scoring_queue = scoring_queue.into();
        self
    }

    pub fn with_default_requirements_id(mut self, id: impl Into<String>) -> Self {
        self.default_requirements_id = id.into();
        self
    }
}

/// Worker that consumes crawl jobs, extracts profiles, persists them,
/// and enqueues scoring work.
///
/// Per delivery: dedup check → extract → persist → enqueue score →
/// ack. Any failure in extract or persist nacks without requeue: a
/// failed extraction against a live, rate-limited source is not
/// retried automatically; operators resubmit after investigating.
pub struct CrawlWorker<B, X, P, D>
where
    B: BrokerClient,
    X: ProfileExtractor,
    P: ProfileStore,
    D: DedupIndex,
{
    broker: B,
    extractor: X,
    store: P,
    dedup: D,
    stats: Arc<PipelineStats>,
    config: CrawlWorkerConfig,
}

impl<B, X, P, D> CrawlWorker<B, X, P, D>
where
    B: BrokerClient,
    X: ProfileExtractor,
    P: ProfileStore,
    D: DedupIndex,
{
    pub fn new(
        broker: B,
        extractor: X,
        store: P,
        dedup: D,
        stats: Arc<PipelineStats>,
        config: CrawlWorkerConfig,
    ) -> Self {
        Self {
            broker,
            extractor,
            store,
            dedup,
            stats,
            config,
        }
    }

    /// Consume the crawl queue until cancellation.
    ///
    /// Cancellation is only observed between deliveries: the in-flight
    /// job always finishes and acks/nacks before the worker exits, so
    /// no job is ever marked done with incomplete side effects.
    pub async fn run<WR: WorkerReporter>(
        &self,
        cancel_token: CancellationToken,
        reporter: &WR,
    ) -> Result<(), PipelineError> {
        self.broker.declare_queue(&self.config.crawl_queue).await?;
        self.broker
            .declare_queue(&self.config.scoring_queue)
            .await?;

        let mut consumer = self
            .broker
            .consume(&self.config.crawl_queue, self.config.prefetch)
            .await?;

        reporter.report(WorkerEvent::Started {
            worker_id: &self.config.worker_id,
            queue: &self.config.crawl_queue,
        });

        loop {
            let delivery = tokio::select! {
                biased;
                () = cancel_token.cancelled() => break,
                delivery = consumer.next_delivery() => delivery?,
            };
            let Some(delivery) = delivery else {
                tracing::warn!(
                    worker_id = %self.config.worker_id,
                    queue = %self.config.crawl_queue,
                    "Consumer stream closed"
                );
                break;
            };
            self.process(&mut consumer, delivery, reporter).await;
        }

        reporter.report(WorkerEvent::Stopped {
            worker_id: &self.config.worker_id,
        });
        Ok(())
    }

    async fn process<WR: WorkerReporter>(
        &self,
        consumer: &mut B::Consumer,
        delivery: JobDelivery,
        reporter: &WR,
    ) {
        let job = match CrawlJob::from_bytes(&delivery.body) {
            Ok(job) => job,
            Err(e) => {
                reporter.report(WorkerEvent::JobInvalid {
                    reason: &e.to_string(),
                });
                let result = if e.is_drop_on_ack() {
                    consumer.ack(delivery.tag).await
                } else {
                    consumer.nack(delivery.tag, false).await
                };
                if let Err(e) = result {
                    tracing::error!(error = %e, "Failed to settle invalid message");
                }
                return;
            }
        };

        reporter.report(WorkerEvent::JobStarted { url: &job.url });
        self.stats.start_processing();

        match self.handle_job(&job).await {
            Ok(JobOutcome::Completed) => {
                self.stats.record_completed();
                reporter.report(WorkerEvent::JobCompleted { url: &job.url });
                if let Err(e) = consumer.ack(delivery.tag).await {
                    tracing::error!(url = %job.url, error = %e, "Failed to ack completed job");
                }
            }
            Ok(JobOutcome::Skipped) => {
                self.stats.record_skipped();
                reporter.report(WorkerEvent::JobSkipped { url: &job.url });
                if let Err(e) = consumer.ack(delivery.tag).await {
                    tracing::error!(url = %job.url, error = %e, "Failed to ack skipped job");
                }
            }
            Err(e) => {
                self.stats.record_failed();
                reporter.report(WorkerEvent::JobFailed {
                    url: &job.url,
                    error: &e.to_string(),
                });
                if let Err(e) = consumer.nack(delivery.tag, false).await {
                    tracing::error!(url = %job.url, error = %e, "Failed to nack failed job");
                }
            }
        }

        self.stats.stop_processing();
    }

    async fn handle_job(&self, job: &CrawlJob) -> Result<JobOutcome, PipelineError> {
        let key = NaturalKey::crawl(&job.url);
        if let Some(existing) = self.dedup.has_terminal_record(&key).await? {
            tracing::debug!(
                url = %job.url,
                terminal_ref = %existing.terminal_file_ref.display(),
                "Profile already extracted"
            );
            return Ok(JobOutcome::Skipped);
        }

        // The extractor boundary: whatever goes wrong in there is a
        // job failure, never a worker crash.
        let record = self
            .extractor
            .extract(&job.url)
            .await
            .map_err(|e| match e {
                PipelineError::Extraction(_) => e,
                other => PipelineError::Extraction(other.to_string()),
            })?;

        let file_ref = self.store.save(&record).await?;
        tracing::info!(url = %job.url, file = %file_ref.display(), "Profile persisted");

        if let Err(e) = self.dedup.record_terminal(&key, &file_ref).await {
            // The persisted file is the source of truth; a stale index
            // is caught by the rescan fallback.
            tracing::warn!(url = %job.url, error = %e, "Failed to index terminal record");
        }

        // Everything from here is downstream of the durable write and
        // must not affect the ack decision.
        self.enqueue_score_job(job, record).await;

        Ok(JobOutcome::Completed)
    }

    async fn enqueue_score_job(&self, job: &CrawlJob, record: ProfileRecord) {
        let requirements_id = job
            .requirements_id
            .clone()
            .unwrap_or_else(|| self.config.default_requirements_id.clone());
        let score_job = ScoreJob::new(record, requirements_id);

        let payload = match serde_json::to_vec(&score_job) {
            Ok(payload) => payload,
            Err(e) => {
                self.stats.record_enqueue_failed();
                tracing::error!(url = %job.url, error = %e, "Failed to encode score job");
                return;
            }
        };

        match self
            .broker
            .publish(&self.config.scoring_queue, &payload)
            .await
        {
            Ok(()) => {
                self.stats.record_sent_to_scoring();
                tracing::info!(
                    url = %job.url,
                    queue = %self.config.scoring_queue,
                    "Sent to scoring"
                );
            }
            Err(e) => {
                self.stats.record_enqueue_failed();
                tracing::error!(url = %job.url, error = %e, "Failed to enqueue score job");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    fn test_config() -> CrawlWorkerConfig {
        CrawlWorkerConfig::default().with_worker_id("crawl-test")
    }

    fn crawl_message(url: &str) -> Vec<u8> {
        serde_json::to_vec(&CrawlJob::new(url)).unwrap()
    }

    #[tokio::test]
    async fn happy_path_persists_and_enqueues_score() {
        let broker = MemoryBroker::new();
        broker.push("crawl_queue", crawl_message("https://example.com/in/jane"));

        let store = MockProfileStore::empty();
        let stats = Arc::new(PipelineStats::new());
        let worker = CrawlWorker::new(
            broker.clone(),
            MockExtractor::new(make_test_profile("https://example.com/in/jane")),
            store.clone(),
            MockDedup::empty(),
            Arc::clone(&stats),
            test_config(),
        );

        worker
            .run(CancellationToken::new(), &RecordingReporter::new())
            .await
            .unwrap();

        assert_eq!(store.saved.lock().unwrap().len(), 1);
        assert_eq!(broker.queue_len("scoring_queue"), 1);
        assert_eq!(broker.acked_count(), 1);
        assert_eq!(broker.nacked(), vec![]);

        let snap = stats.snapshot();
        assert_eq!(snap.completed, 1);
        assert_eq!(snap.sent_to_scoring, 1);
        assert_eq!(snap.failed, 0);
        assert_eq!(snap.processing, 0);
    }

    #[tokio::test]
    async fn score_job_carries_requirements_id_from_message() {
        let broker = MemoryBroker::new();
        let msg = serde_json::to_vec(
            &CrawlJob::new("https://example.com/in/jane").with_requirements_id("backend"),
        )
        .unwrap();
        broker.push("crawl_queue", msg);

        let worker = CrawlWorker::new(
            broker.clone(),
            MockExtractor::new(make_test_profile("https://example.com/in/jane")),
            MockProfileStore::empty(),
            MockDedup::empty(),
            Arc::new(PipelineStats::new()),
            test_config(),
        );
        worker
            .run(CancellationToken::new(), &RecordingReporter::new())
            .await
            .unwrap();

        let published = broker.peek("scoring_queue");
        let score_job = ScoreJob::from_bytes(&published[0]).unwrap();
        assert_eq!(score_job.requirements_id, "backend");
        assert_eq!(score_job.profile_url, "https://example.com/in/jane");
    }

    #[tokio::test]
    async fn dedup_hit_skips_without_extracting() {
        let broker = MemoryBroker::new();
        broker.push("crawl_queue", crawl_message("https://example.com/in/jane"));

        let extractor = MockExtractor::new(make_test_profile("https://example.com/in/jane"));
        let stats = Arc::new(PipelineStats::new());
        let worker = CrawlWorker::new(
            broker.clone(),
            extractor.clone(),
            MockProfileStore::empty(),
            MockDedup::with_record(&NaturalKey::crawl("https://example.com/in/jane")),
            Arc::clone(&stats),
            test_config(),
        );
        worker
            .run(CancellationToken::new(), &RecordingReporter::new())
            .await
            .unwrap();

        assert_eq!(extractor.calls(), 0);
        assert_eq!(stats.snapshot().skipped, 1);
        assert_eq!(stats.snapshot().completed, 0);
        assert_eq!(broker.acked_count(), 1);
        assert_eq!(broker.queue_len("scoring_queue"), 0);
    }

    #[tokio::test]
    async fn idempotence_second_submission_is_skipped() {
        // Same URL twice, first one completing before the second is
        // processed: exactly one persisted record, second acked as
        // skipped.
        let broker = MemoryBroker::new();
        broker.push("crawl_queue", crawl_message("https://example.com/in/jane"));
        broker.push("crawl_queue", crawl_message("https://example.com/in/jane"));

        let store = MockProfileStore::empty();
        let stats = Arc::new(PipelineStats::new());
        let worker = CrawlWorker::new(
            broker.clone(),
            MockExtractor::new(make_test_profile("https://example.com/in/jane")),
            store.clone(),
            MockDedup::empty(),
            Arc::clone(&stats),
            test_config(),
        );
        worker
            .run(CancellationToken::new(), &RecordingReporter::new())
            .await
            .unwrap();

        assert_eq!(store.saved.lock().unwrap().len(), 1);
        let snap = stats.snapshot();
        assert_eq!(snap.completed, 1);
        assert_eq!(snap.skipped, 1);
        assert_eq!(broker.acked_count(), 2);
    }

    #[tokio::test]
    async fn extraction_failure_nacks_without_requeue() {
        let broker = MemoryBroker::new();
        broker.push("crawl_queue", crawl_message("https://example.com/in/jane"));

        let store = MockProfileStore::empty();
        let stats = Arc::new(PipelineStats::new());
        let worker = CrawlWorker::new(
            broker.clone(),
            MockExtractor::with_error(PipelineError::Extraction("page gone".into())),
            store.clone(),
            MockDedup::empty(),
            Arc::clone(&stats),
            test_config(),
        );
        let reporter = RecordingReporter::new();
        worker
            .run(CancellationToken::new(), &reporter)
            .await
            .unwrap();

        assert!(store.saved.lock().unwrap().is_empty());
        assert_eq!(broker.nacked(), vec![(1, false)]);
        assert_eq!(stats.snapshot().failed, 1);
        assert_eq!(broker.queue_len("scoring_queue"), 0);
        assert!(reporter.labels().contains(&"JobFailed".to_string()));
    }

    #[tokio::test]
    async fn persist_failure_nacks_without_requeue() {
        let broker = MemoryBroker::new();
        broker.push("crawl_queue", crawl_message("https://example.com/in/jane"));

        let stats = Arc::new(PipelineStats::new());
        let worker = CrawlWorker::new(
            broker.clone(),
            MockExtractor::new(make_test_profile("https://example.com/in/jane")),
            MockProfileStore::with_save_error(PipelineError::Storage("disk full".into())),
            MockDedup::empty(),
            Arc::clone(&stats),
            test_config(),
        );
        worker
            .run(CancellationToken::new(), &RecordingReporter::new())
            .await
            .unwrap();

        assert_eq!(broker.nacked(), vec![(1, false)]);
        assert_eq!(stats.snapshot().failed, 1);
        assert_eq!(broker.queue_len("scoring_queue"), 0);
    }

    #[tokio::test]
    async fn invalid_message_is_acked_and_dropped() {
        let broker = MemoryBroker::new();
        broker.push("crawl_queue", b"{}".to_vec());
        broker.push("crawl_queue", b"not json at all".to_vec());

        let stats = Arc::new(PipelineStats::new());
        let worker = CrawlWorker::new(
            broker.clone(),
            MockExtractor::new(make_test_profile("https://example.com/in/jane")),
            MockProfileStore::empty(),
            MockDedup::empty(),
            Arc::clone(&stats),
            test_config(),
        );
        let reporter = RecordingReporter::new();
        worker
            .run(CancellationToken::new(), &reporter)
            .await
            .unwrap();

        assert_eq!(broker.acked_count(), 2);
        assert_eq!(broker.nacked(), vec![]);
        let snap = stats.snapshot();
        assert_eq!(snap.completed, 0);
        assert_eq!(snap.failed, 0);
        assert_eq!(
            reporter
                .labels()
                .iter()
                .filter(|l| *l == "JobInvalid")
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn enqueue_failure_still_acks_completed_job() {
        // Publish failure after a durable persist is best-effort: the
        // job completes and acks, the failure is counted.
        let broker = MemoryBroker::new();
        broker.push("crawl_queue", crawl_message("https://example.com/in/jane"));
        broker.fail_publishes_to("scoring_queue");

        let stats = Arc::new(PipelineStats::new());
        let worker = CrawlWorker::new(
            broker.clone(),
            MockExtractor::new(make_test_profile("https://example.com/in/jane")),
            MockProfileStore::empty(),
            MockDedup::empty(),
            Arc::clone(&stats),
            test_config(),
        );
        worker
            .run(CancellationToken::new(), &RecordingReporter::new())
            .await
            .unwrap();

        let snap = stats.snapshot();
        assert_eq!(snap.completed, 1);
        assert_eq!(snap.enqueue_failed, 1);
        assert_eq!(snap.sent_to_scoring, 0);
        assert_eq!(broker.acked_count(), 1);
        assert_eq!(broker.nacked(), vec![]);
    }

    #[tokio::test]
    async fn cancellation_stops_before_next_delivery() {
        let broker = MemoryBroker::new();
        broker.push("crawl_queue", crawl_message("https://example.com/in/jane"));

        let cancel = CancellationToken::new();
        cancel.cancel();

        let store = MockProfileStore::empty();
        let worker = CrawlWorker::new(
            broker.clone(),
            MockExtractor::new(make_test_profile("https://example.com/in/jane")),
            store.clone(),
            MockDedup::empty(),
            Arc::new(PipelineStats::new()),
            test_config(),
        );
        worker.run(cancel, &RecordingReporter::new()).await.unwrap();

        // Nothing consumed: the token was cancelled before the first
        // delivery was accepted.
        assert!(store.saved.lock().unwrap().is_empty());
        assert_eq!(broker.queue_len("crawl_queue"), 1);
    }
}
