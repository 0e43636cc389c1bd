use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::broker::{BrokerClient, JobConsumer, JobDelivery};
use crate::error::PipelineError;
use crate::job::{NaturalKey, ScoreJob};
use crate::score::Scorer;
use crate::stats::PipelineStats;
use crate::traits::{DedupIndex, RequirementSource, ResultSink, ScoreStore};
use crate::worker::{JobOutcome, WorkerEvent, WorkerReporter};

/// Configuration for one scoring worker.
#[derive(Debug, Clone)]
pub struct ScoreWorkerConfig {
    pub worker_id: String,
    pub scoring_queue: String,
    pub prefetch: u16,
}

impl Default for ScoreWorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: format!("score-{}", &Uuid::new_v4().to_string()[..8]),
            scoring_queue: "scoring_queue".to_string(),
            prefetch: 1,
        }
    }
}

impl ScoreWorkerConfig {
    pub fn with_worker_id(mut self, id: impl Into<String>) -> Self {
        self.worker_id = id.into();
        self
    }

    pub fn with_scoring_queue(mut self, queue: impl Into<String>) -> Self {
        self.scoring_queue = queue.into();
        self
    }
}

/// Worker that consumes scoring jobs, runs the scoring engine, persists
/// the result, and pushes it to the result sink.
///
/// Dedup is keyed on `(url, requirements_id)`: the same profile may be
/// legitimately scored against many requirement specs. The sink call
/// happens only after the score record is durable and never affects the
/// ack decision.
pub struct ScoreWorker<B, R, S, K, D>
where
    B: BrokerClient,
    R: RequirementSource,
    S: ScoreStore,
    K: ResultSink,
    D: DedupIndex,
{
    broker: B,
    requirements: R,
    store: S,
    sink: K,
    dedup: D,
    stats: Arc<PipelineStats>,
    config: ScoreWorkerConfig,
}

impl<B, R, S, K, D> ScoreWorker<B, R, S, K, D>
where
    B: BrokerClient,
    R: RequirementSource,
    S: ScoreStore,
    K: ResultSink,
    D: DedupIndex,
{
    pub fn new(
        broker: B,
        requirements: R,
        store: S,
        sink: K,
        dedup: D,
        stats: Arc<PipelineStats>,
        config: ScoreWorkerConfig,
    ) -> Self {
        Self {
            broker,
            requirements,
            store,
            sink,
            dedup,
            stats,
            config,
        }
    }

    /// Consume the scoring queue until cancellation. Same in-flight
    /// guarantees as the crawl worker: cancellation is observed only
    /// between deliveries.
    pub async fn run<WR: WorkerReporter>(
        &self,
        cancel_token: CancellationToken,
        reporter: &WR,
    ) -> Result<(), PipelineError> {
        self.broker
            .declare_queue(&self.config.scoring_queue)
            .await?;

        let mut consumer = self
            .broker
            .consume(&self.config.scoring_queue, self.config.prefetch)
            .await?;

        reporter.report(WorkerEvent::Started {
            worker_id: &self.config.worker_id,
            queue: &self.config.scoring_queue,
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
                    queue = %self.config.scoring_queue,
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
        let job = match ScoreJob::from_bytes(&delivery.body) {
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

        reporter.report(WorkerEvent::JobStarted {
            url: &job.profile_url,
        });
        self.stats.start_processing();

        match self.handle_job(&job).await {
            Ok(JobOutcome::Completed) => {
                self.stats.record_completed();
                reporter.report(WorkerEvent::JobCompleted {
                    url: &job.profile_url,
                });
                if let Err(e) = consumer.ack(delivery.tag).await {
                    tracing::error!(url = %job.profile_url, error = %e, "Failed to ack completed job");
                }
            }
            Ok(JobOutcome::Skipped) => {
                self.stats.record_skipped();
                reporter.report(WorkerEvent::JobSkipped {
                    url: &job.profile_url,
                });
                if let Err(e) = consumer.ack(delivery.tag).await {
                    tracing::error!(url = %job.profile_url, error = %e, "Failed to ack skipped job");
                }
            }
            Err(e) => {
                self.stats.record_failed();
                reporter.report(WorkerEvent::JobFailed {
                    url: &job.profile_url,
                    error: &e.to_string(),
                });
                if let Err(e) = consumer.nack(delivery.tag, false).await {
                    tracing::error!(url = %job.profile_url, error = %e, "Failed to nack failed job");
                }
            }
        }

        self.stats.stop_processing();
    }

    async fn handle_job(&self, job: &ScoreJob) -> Result<JobOutcome, PipelineError> {
        let key = NaturalKey::score(&job.profile_url, &job.requirements_id);
        if let Some(existing) = self.dedup.has_terminal_record(&key).await? {
            tracing::debug!(
                url = %job.profile_url,
                requirements_id = %job.requirements_id,
                terminal_ref = %existing.terminal_file_ref.display(),
                "Pair already scored"
            );
            return Ok(JobOutcome::Skipped);
        }

        let spec = self
            .requirements
            .load(&job.requirements_id)
            .await
            .map_err(|e| match e {
                PipelineError::Scoring(_) => e,
                other => PipelineError::Scoring(other.to_string()),
            })?;

        let result = Scorer::new(spec).score(&job.profile_data);
        tracing::info!(
            url = %job.profile_url,
            requirements_id = %job.requirements_id,
            score = result.total_score,
            percentage = result.percentage,
            "Score computed"
        );

        let file_ref = self
            .store
            .save(&job.profile_data, &job.requirements_id, &result)
            .await?;
        tracing::info!(url = %job.profile_url, file = %file_ref.display(), "Score persisted");

        if let Err(e) = self.dedup.record_terminal(&key, &file_ref).await {
            tracing::warn!(url = %job.profile_url, error = %e, "Failed to index terminal record");
        }

        // Best-effort side channel: the authoritative record is already
        // on disk.
        if let Err(e) = self
            .sink
            .update(&job.profile_url, result.total_score)
            .await
        {
            self.stats.record_sink_failed();
            tracing::warn!(url = %job.profile_url, error = %e, "Result sink update failed");
        }

        Ok(JobOutcome::Completed)
    }
}
