use crate::kafka::delivery::{DeliveryContext, DeliveryListener, DeliveryStats};
use crate::{config::KafkaConfig, Error, Result};
use rdkafka::producer::{BaseRecord, Producer as _, ThreadedProducer};
use rdkafka::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Transmission side of the broker client.
///
/// `enqueue` hands a fully serialized message to the client's send buffer and
/// returns without waiting for an acknowledgement. `flush` blocks until the
/// buffer drains or the timeout elapses; `None` waits forever.
pub trait BrokerClient: Send + Sync {
    fn enqueue(&self, topic: &str, key: &[u8], value: Option<&[u8]>) -> Result<()>;

    fn flush(&self, timeout: Option<Duration>) -> Result<()>;
}

/// rdkafka-backed broker client.
///
/// Uses a `ThreadedProducer` so delivery reports are polled on a background
/// thread and `enqueue` never blocks the caller.
pub struct KafkaBroker {
    producer: ThreadedProducer<DeliveryContext>,
}

impl KafkaBroker {
    pub fn new(
        config: &KafkaConfig,
        stats: Arc<DeliveryStats>,
        listener: Option<DeliveryListener>,
    ) -> Result<Self> {
        let producer: ThreadedProducer<DeliveryContext> = ClientConfig::new()
            .set("bootstrap.servers", config.bootstrap_servers())
            .set("compression.type", &config.compression)
            .set("acks", &config.acks)
            .set("linger.ms", config.linger_ms.to_string())
            .set("batch.size", config.batch_size.to_string())
            .set(
                "queue.buffering.max.messages",
                config.queue_buffering_max_messages.to_string(),
            )
            .create_with_context(DeliveryContext::new(stats, listener))
            .map_err(|e| Error::Connection(format!("failed to create Kafka producer: {}", e)))?;

        Ok(Self { producer })
    }
}

impl BrokerClient for KafkaBroker {
    fn enqueue(&self, topic: &str, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        let record: BaseRecord<'_, [u8], [u8]> = match value {
            Some(value) => BaseRecord::to(topic).key(key).payload(value),
            None => BaseRecord::to(topic).key(key),
        };

        self.producer
            .send(record)
            .map_err(|(e, _record)| Error::Kafka(e))?;

        debug!(topic, key_len = key.len(), "Message enqueued");
        Ok(())
    }

    fn flush(&self, timeout: Option<Duration>) -> Result<()> {
        self.producer.flush(timeout).map_err(Error::Kafka)
    }
}
