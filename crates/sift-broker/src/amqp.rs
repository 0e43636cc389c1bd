use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};

use sift_core::PipelineError;
use sift_core::broker::{BrokerClient, JobConsumer, JobDelivery};

use crate::config::AmqpConfig;

/// AMQP broker client over one dedicated connection.
///
/// Each worker opens its own `AmqpBroker`: the connection is never
/// shared across workers, so a broken connection takes down exactly
/// one worker and the supervisor can restart it.
pub struct AmqpBroker {
    // Held so the connection outlives the channel.
    _connection: Connection,
    channel: Channel,
}

impl AmqpBroker {
    /// Open a new connection and channel.
    pub async fn connect(config: &AmqpConfig) -> Result<Self, PipelineError> {
        let connection = Connection::connect(&config.url, ConnectionProperties::default())
            .await
            .map_err(broker_err)?;
        let channel = connection.create_channel().await.map_err(broker_err)?;
        tracing::debug!(url = %config.url, "Connected to AMQP broker");
        Ok(Self {
            _connection: connection,
            channel,
        })
    }
}

impl BrokerClient for AmqpBroker {
    type Consumer = AmqpConsumer;

    async fn declare_queue(&self, name: &str) -> Result<(), PipelineError> {
        self.channel
            .queue_declare(
                name,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(broker_err)?;
        Ok(())
    }

    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), PipelineError> {
        // Default exchange routes by queue name; delivery mode 2 makes
        // the message survive a broker restart. Publisher confirms are
        // not enabled, so the returned confirm is inert.
        let _confirm = self
            .channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default().with_delivery_mode(2),
            )
            .await
            .map_err(broker_err)?;
        Ok(())
    }

    async fn consume(&self, queue: &str, prefetch: u16) -> Result<AmqpConsumer, PipelineError> {
        self.channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await
            .map_err(broker_err)?;

        // Empty consumer tag: the server generates a unique one.
        let consumer = self
            .channel
            .basic_consume(
                queue,
                "",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(broker_err)?;

        Ok(AmqpConsumer {
            channel: self.channel.clone(),
            consumer,
        })
    }

    async fn queue_depth(&self, name: &str) -> Result<u32, PipelineError> {
        let queue = self
            .channel
            .queue_declare(
                name,
                QueueDeclareOptions {
                    durable: true,
                    passive: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(broker_err)?;
        Ok(queue.message_count())
    }
}

/// Consuming side of an [`AmqpBroker`] channel.
pub struct AmqpConsumer {
    channel: Channel,
    consumer: Consumer,
}

impl JobConsumer for AmqpConsumer {
    async fn next_delivery(&mut self) -> Result<Option<JobDelivery>, PipelineError> {
        match self.consumer.next().await {
            Some(Ok(delivery)) => Ok(Some(JobDelivery {
                tag: delivery.delivery_tag,
                body: delivery.data,
            })),
            Some(Err(e)) => Err(broker_err(e)),
            // Stream end: connection lost or queue deleted.
            None => Ok(None),
        }
    }

    async fn ack(&mut self, tag: u64) -> Result<(), PipelineError> {
        self.channel
            .basic_ack(tag, BasicAckOptions::default())
            .await
            .map_err(broker_err)
    }

    async fn nack(&mut self, tag: u64, requeue: bool) -> Result<(), PipelineError> {
        self.channel
            .basic_nack(
                tag,
                BasicNackOptions {
                    requeue,
                    ..BasicNackOptions::default()
                },
            )
            .await
            .map_err(broker_err)
    }
}

fn broker_err(e: lapin::Error) -> PipelineError {
    PipelineError::Broker(e.to_string())
}
