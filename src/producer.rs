//! Schema-bound producers.
//!
//! A [`TypedProducer`] binds one topic to a key schema and an optional value
//! schema. Construction registers both schemas, makes sure the topic exists
//! through the shared [`Registrar`], and only then accepts messages.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use topic_producer::config::{Config, ProducerConfig};
//! use topic_producer::kafka::KafkaAdmin;
//! use topic_producer::producer::TypedProducer;
//! use topic_producer::registrar::{FailurePolicy, Registrar};
//!
//! # async fn example(config: Config) -> topic_producer::Result<()> {
//! let registrar = Registrar::new(
//!     Arc::new(KafkaAdmin::new(&config.kafka)?),
//!     FailurePolicy::AssumeExists,
//! );
//!
//! let flights = ProducerConfig::new(
//!     "purple.flights",
//!     r#"{"type":"record","name":"FlightKey","fields":[{"name":"id","type":"int"}]}"#,
//! );
//! let producer =
//!     TypedProducer::connect(&flights, &config.kafka, &config.schema_registry, &registrar, None)
//!         .await?;
//!
//! producer.publish_key(&serde_json::json!({"id": 42}))?;
//! producer.close()?;
//! # Ok(())
//! # }
//! ```

use crate::config::{KafkaConfig, ProducerConfig, SchemaRegistryConfig};
use crate::kafka::{
    BrokerClient, DeliveryCounts, DeliveryListener, DeliveryStats, KafkaBroker, TopicSpec,
};
use crate::registrar::{Registrar, TopicOutcome};
use crate::schema::{
    parse_schema, subject_name, HttpSchemaRegistry, SchemaBinding, SchemaRegistry, SubjectKind,
};
use crate::{Error, Result};
use apache_avro::Schema;
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, instrument, warn};

/// Wall-clock milliseconds since the Unix epoch.
///
/// Commonly used as a default event key or timestamp.
pub fn current_time_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub struct TypedProducer {
    topic: String,
    key: SchemaBinding,
    value: Option<SchemaBinding>,
    // None once closed
    broker: RwLock<Option<Arc<dyn BrokerClient>>>,
    // owned for the handle's lifetime; only used during construction
    _registry: Arc<dyn SchemaRegistry>,
    stats: Arc<DeliveryStats>,
    topic_outcome: TopicOutcome,
}

impl TypedProducer {
    /// Builds a producer with its own Kafka and schema-registry clients.
    ///
    /// `listener`, when given, receives every delivery report.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] for an invalid `config` or malformed schema; no
    ///   network call is made in that case.
    /// - [`Error::Connection`] if a client cannot be created or the registry
    ///   is unreachable.
    pub async fn connect(
        config: &ProducerConfig,
        kafka: &KafkaConfig,
        schema_registry: &SchemaRegistryConfig,
        registrar: &Registrar,
        listener: Option<DeliveryListener>,
    ) -> Result<Self> {
        config.validate()?;

        let stats = Arc::new(DeliveryStats::default());
        let broker = Arc::new(KafkaBroker::new(kafka, stats.clone(), listener)?);
        let registry = Arc::new(HttpSchemaRegistry::new(schema_registry)?);

        Self::with_clients(config, broker, registry, stats, registrar).await
    }

    /// Builds a producer on top of already constructed clients.
    #[instrument(skip_all, fields(topic = %config.topic))]
    pub async fn with_clients(
        config: &ProducerConfig,
        broker: Arc<dyn BrokerClient>,
        registry: Arc<dyn SchemaRegistry>,
        stats: Arc<DeliveryStats>,
        registrar: &Registrar,
    ) -> Result<Self> {
        config.validate()?;

        let key_schema = parse_schema(&config.key_schema)?;
        let value_schema = config
            .value_schema
            .as_deref()
            .map(parse_schema)
            .transpose()?;

        let key = bind(registry.as_ref(), &config.topic, SubjectKind::Key, key_schema).await?;
        let value = match value_schema {
            Some(schema) => {
                Some(bind(registry.as_ref(), &config.topic, SubjectKind::Value, schema).await?)
            }
            None => None,
        };

        let topic_outcome = registrar
            .ensure_topic(&TopicSpec::new(
                config.topic.clone(),
                config.partitions,
                config.replicas,
            ))
            .await;

        info!(
            key_schema_id = key.id,
            value_schema_id = ?value.as_ref().map(|v| v.id),
            outcome = ?topic_outcome,
            "Producer ready for topic '{}'",
            config.topic
        );

        Ok(Self {
            topic: config.topic.clone(),
            key,
            value,
            broker: RwLock::new(Some(broker)),
            _registry: registry,
            stats,
            topic_outcome,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// What the registrar reported for this producer's topic at construction.
    pub fn topic_outcome(&self) -> &TopicOutcome {
        &self.topic_outcome
    }

    pub fn key_schema_id(&self) -> u32 {
        self.key.id
    }

    pub fn value_schema_id(&self) -> Option<u32> {
        self.value.as_ref().map(|v| v.id)
    }

    pub fn key_schema(&self) -> &Schema {
        &self.key.schema
    }

    pub fn value_schema(&self) -> Option<&Schema> {
        self.value.as_ref().map(|v| &v.schema)
    }

    pub fn delivery_stats(&self) -> DeliveryCounts {
        self.stats.snapshot()
    }

    pub fn is_closed(&self) -> bool {
        self.broker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    pub fn current_time_millis(&self) -> i64 {
        current_time_millis()
    }

    /// Serializes and enqueues one message.
    ///
    /// Returns once the message sits in the client's send buffer; delivery
    /// failures show up later as delivery reports, never here.
    ///
    /// # Errors
    ///
    /// - [`Error::Serialization`] if `key` or `value` does not match its schema.
    /// - [`Error::Schema`] if a value is given but no value schema is bound.
    /// - [`Error::Closed`] after [`close`](Self::close).
    /// - [`Error::Kafka`] if the send buffer is full.
    pub fn publish<K, V>(&self, key: &K, value: Option<&V>) -> Result<()>
    where
        K: Serialize + ?Sized,
        V: Serialize + ?Sized,
    {
        let broker = self
            .broker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| Error::Closed(self.topic.clone()))?;

        let key_bytes = self.key.encode(key)?;
        let value_bytes = match (value, &self.value) {
            (None, _) => None,
            (Some(value), Some(binding)) => Some(binding.encode(value)?),
            (Some(_), None) => {
                return Err(Error::Schema(format!(
                    "topic '{}' has no value schema; publish keys only",
                    self.topic
                )))
            }
        };

        broker.enqueue(&self.topic, &key_bytes, value_bytes.as_deref())
    }

    /// Enqueues a key-only message.
    pub fn publish_key<K: Serialize + ?Sized>(&self, key: &K) -> Result<()> {
        self.publish::<K, K>(key, None)
    }

    /// Flushes every enqueued message and releases the broker client.
    ///
    /// Blocks the calling thread until all outstanding messages have been
    /// acknowledged or have failed. There is no timeout. Publishers wait on
    /// the handle while the flush runs. If the flush fails the client is kept
    /// and the handle stays open, so `close` can be called again. Calls after
    /// a successful close are no-ops.
    pub fn close(&self) -> Result<()> {
        let mut broker = self.broker.write().unwrap_or_else(PoisonError::into_inner);

        let Some(client) = broker.as_ref() else {
            debug!("Producer {} already closed", self.topic);
            return Ok(());
        };

        if let Err(e) = client.flush(None) {
            warn!("Failed to flush producer {}: {}", self.topic, e);
            return Err(e);
        }
        broker.take();

        let counts = self.stats.snapshot();
        info!(
            delivered = counts.delivered,
            failed = counts.failed,
            "Producer {} closed",
            self.topic
        );
        Ok(())
    }
}

impl Drop for TypedProducer {
    fn drop(&mut self) {
        if !self.is_closed() {
            warn!(
                "Producer {} dropped without close; unflushed messages may be lost",
                self.topic
            );
        }
    }
}

async fn bind(
    registry: &dyn SchemaRegistry,
    topic: &str,
    kind: SubjectKind,
    schema: Schema,
) -> Result<SchemaBinding> {
    let subject = subject_name(topic, kind);
    let id = registry.register(&subject, &schema).await?;
    Ok(SchemaBinding {
        subject,
        schema,
        id,
    })
}
