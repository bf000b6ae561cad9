#![allow(dead_code)]

use std::env;
use topic_producer::config::{Config, KafkaConfig, ProducerConfig, SchemaRegistryConfig};

pub const KEY_SCHEMA: &str = r#"{
    "type": "record",
    "name": "FlightKey",
    "fields": [{"name": "id", "type": "int"}]
}"#;

pub const VALUE_SCHEMA: &str = r#"{
    "type": "record",
    "name": "Arrival",
    "fields": [
        {"name": "station", "type": "string"},
        {"name": "line", "type": "string"},
        {"name": "delayed", "type": "boolean"}
    ]
}"#;

/// Get test configuration from environment variables
pub fn get_test_config() -> Config {
    // Use TEST_ prefix for test environment variables
    let kafka = KafkaConfig {
        brokers: env::var("TEST_KAFKA_BROKERS")
            .unwrap_or_else(|_| "localhost:9092".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .collect(),
        compression: "none".to_string(), // No compression for tests
        acks: "all".to_string(),
        linger_ms: 0, // Immediate sending for tests
        batch_size: 1, // Small batches for tests
        queue_buffering_max_messages: 1000,
        admin_timeout_secs: 10,
    };

    let schema_registry = SchemaRegistryConfig::new(
        env::var("TEST_SCHEMA_REGISTRY_URL").unwrap_or_else(|_| "http://localhost:8081".to_string()),
    );

    Config {
        kafka,
        schema_registry,
        producers: Vec::new(),
    }
}

/// Topic name unique to this test process
pub fn test_topic(name: &str) -> String {
    format!("test_{}.{}", std::process::id(), name)
}

pub fn key_only_producer(topic: &str) -> ProducerConfig {
    ProducerConfig::new(topic, KEY_SCHEMA)
}

pub fn keyed_producer(topic: &str) -> ProducerConfig {
    ProducerConfig::new(topic, KEY_SCHEMA).with_value_schema(VALUE_SCHEMA)
}
