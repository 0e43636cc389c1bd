use std::future::Future;

use crate::error::PipelineError;

/// One delivered message, identified by its broker delivery tag until
/// acked or nacked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDelivery {
    pub tag: u64,
    pub body: Vec<u8>,
}

/// A consuming channel bound to one queue.
///
/// Messages stay on the queue until explicitly acked; an unacked
/// message redelivers after the consumer disconnects. The broker stops
/// delivering once `prefetch` messages are outstanding, which is the
/// pipeline's only backpressure mechanism.
pub trait JobConsumer: Send {
    /// Wait for the next delivery. `Ok(None)` means the consumer
    /// stream closed (broker connection lost or queue deleted), which
    /// is fatal to this worker, not to the pool.
    fn next_delivery(
        &mut self,
    ) -> impl Future<Output = Result<Option<JobDelivery>, PipelineError>> + Send;

    /// Acknowledge: the job's side effects are durably recorded.
    fn ack(&mut self, tag: u64) -> impl Future<Output = Result<(), PipelineError>> + Send;

    /// Reject. With `requeue = false` the message is dropped for good;
    /// the pipeline never requeues automatically.
    fn nack(
        &mut self,
        tag: u64,
        requeue: bool,
    ) -> impl Future<Output = Result<(), PipelineError>> + Send;
}

/// Client for a durable message broker.
///
/// Implementations are per-worker: each worker owns its client and the
/// connection behind it; connections are never shared across workers.
pub trait BrokerClient: Send + Sync {
    type Consumer: JobConsumer;

    /// Declare a durable queue. Idempotent.
    fn declare_queue(&self, name: &str)
    -> impl Future<Output = Result<(), PipelineError>> + Send;

    /// Publish a persistent message. On error the job was not
    /// accepted; there is no partial delivery.
    fn publish(
        &self,
        queue: &str,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), PipelineError>> + Send;

    /// Start consuming with at most `prefetch` unacked deliveries.
    fn consume(
        &self,
        queue: &str,
        prefetch: u16,
    ) -> impl Future<Output = Result<Self::Consumer, PipelineError>> + Send;

    /// Number of ready messages in a queue, for observability.
    fn queue_depth(&self, name: &str) -> impl Future<Output = Result<u32, PipelineError>> + Send;
}
