use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub kafka: KafkaConfig,
    pub schema_registry: SchemaRegistryConfig,
    #[serde(default)]
    pub producers: Vec<ProducerConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    #[serde(default = "default_compression")]
    pub compression: String,
    #[serde(default = "default_acks")]
    pub acks: String,
    #[serde(default = "default_linger_ms")]
    pub linger_ms: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_queue_buffering_max_messages")]
    pub queue_buffering_max_messages: usize,
    #[serde(default = "default_admin_timeout_secs")]
    pub admin_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchemaRegistryConfig {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_registry_timeout_ms")]
    pub timeout_ms: u64,
}

/// Per-topic producer settings.
///
/// `value_schema` is optional; without it the producer only sends keys.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProducerConfig {
    pub topic: String,
    pub key_schema: String,
    #[serde(default)]
    pub value_schema: Option<String>,
    #[serde(default = "default_partitions")]
    pub partitions: i32,
    #[serde(default = "default_replicas")]
    pub replicas: i32,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("TOPIC_PRODUCER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.kafka.validate()?;
        self.schema_registry.validate()?;
        for producer in &self.producers {
            producer.validate()?;
        }
        Ok(())
    }

    pub fn producer(&self, topic: &str) -> Option<&ProducerConfig> {
        self.producers.iter().find(|p| p.topic == topic)
    }
}

impl KafkaConfig {
    pub fn bootstrap_servers(&self) -> String {
        self.brokers.join(",")
    }

    fn validate(&self) -> Result<()> {
        if self.brokers.iter().all(|b| b.trim().is_empty()) {
            return Err(Error::Config("at least one broker is required".to_string()));
        }
        Ok(())
    }
}

impl SchemaRegistryConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            timeout_ms: default_registry_timeout_ms(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::Config("schema registry url is required".to_string()));
        }
        Ok(())
    }
}

impl ProducerConfig {
    pub fn new(topic: impl Into<String>, key_schema: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            key_schema: key_schema.into(),
            value_schema: None,
            partitions: default_partitions(),
            replicas: default_replicas(),
        }
    }

    pub fn with_value_schema(mut self, value_schema: impl Into<String>) -> Self {
        self.value_schema = Some(value_schema.into());
        self
    }

    pub fn with_partitions(mut self, partitions: i32) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn with_replicas(mut self, replicas: i32) -> Self {
        self.replicas = replicas;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.topic.trim().is_empty() {
            return Err(Error::Config("topic name must not be empty".to_string()));
        }
        if self.key_schema.trim().is_empty() {
            return Err(Error::Config(format!(
                "key schema for topic '{}' must not be empty",
                self.topic
            )));
        }
        if matches!(&self.value_schema, Some(s) if s.trim().is_empty()) {
            return Err(Error::Config(format!(
                "value schema for topic '{}' is present but empty",
                self.topic
            )));
        }
        if self.partitions < 1 {
            return Err(Error::Config(format!(
                "partitions for topic '{}' must be positive, got {}",
                self.topic, self.partitions
            )));
        }
        if self.replicas < 1 {
            return Err(Error::Config(format!(
                "replicas for topic '{}' must be positive, got {}",
                self.topic, self.replicas
            )));
        }
        Ok(())
    }
}

fn default_compression() -> String {
    "snappy".to_string()
}

fn default_acks() -> String {
    "all".to_string()
}

fn default_linger_ms() -> u32 {
    100
}

fn default_batch_size() -> usize {
    16384
}

fn default_queue_buffering_max_messages() -> usize {
    100_000
}

fn default_admin_timeout_secs() -> u64 {
    30
}

fn default_registry_timeout_ms() -> u64 {
    5000
}

fn default_partitions() -> i32 {
    1
}

fn default_replicas() -> i32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn toml_file() -> NamedTempFile {
        tempfile::Builder::new().suffix(".toml").tempfile().unwrap()
    }

    const KEY_SCHEMA: &str = r#"{"type":"record","name":"Key","fields":[{"name":"id","type":"int"}]}"#;

    #[test]
    fn test_producer_defaults() {
        let producer = ProducerConfig::new("purple.flights", KEY_SCHEMA);
        assert_eq!(producer.partitions, 1);
        assert_eq!(producer.replicas, 1);
        assert!(producer.value_schema.is_none());
        assert!(producer.validate().is_ok());
    }

    #[test]
    fn test_producer_validation() {
        let err = ProducerConfig::new("", KEY_SCHEMA).validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = ProducerConfig::new("t", "  ").validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = ProducerConfig::new("t", KEY_SCHEMA)
            .with_partitions(0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = ProducerConfig::new("t", KEY_SCHEMA)
            .with_replicas(-1)
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = ProducerConfig::new("t", KEY_SCHEMA)
            .with_value_schema("")
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = toml_file();
        write!(
            file,
            r#"
[kafka]
brokers = ["kafka0:9092", "kafka1:9092"]
acks = "1"

[schema_registry]
url = "http://schema-registry:8081"

[[producers]]
topic = "purple.flights"
key_schema = '{KEY_SCHEMA}'
partitions = 3
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.kafka.bootstrap_servers(), "kafka0:9092,kafka1:9092");
        assert_eq!(config.kafka.acks, "1");
        assert_eq!(config.kafka.compression, "snappy");
        assert_eq!(config.schema_registry.timeout_ms, 5000);

        let producer = config.producer("purple.flights").unwrap();
        assert_eq!(producer.partitions, 3);
        assert_eq!(producer.replicas, 1);
        assert!(config.producer("missing").is_none());
    }

    #[test]
    fn test_load_rejects_empty_registry_url() {
        let mut file = toml_file();
        write!(
            file,
            r#"
[kafka]
brokers = ["localhost:9092"]

[schema_registry]
url = ""
"#
        )
        .unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
