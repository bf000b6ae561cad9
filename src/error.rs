//! Error types and result handling for topic-producer.
//!
//! This module defines the main error type [`Error`] and a convenience
//! [`Result`] type alias used throughout the crate.
//!
//! # Example
//!
//! ```rust
//! use topic_producer::{Error, Result};
//!
//! fn build_producer() -> Result<()> {
//!     // Simulating a validation failure
//!     Err(Error::Config("topic name must not be empty".to_string()))
//! }
//!
//! match build_producer() {
//!     Ok(()) => println!("Producer ready"),
//!     Err(Error::Config(msg)) => eprintln!("Configuration error: {}", msg),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use thiserror::Error;

/// The main error type for topic-producer operations.
///
/// Construction failures ([`Error::Config`], [`Error::Connection`]) are fatal:
/// no producer is returned. Topic creation failures are reported as a
/// [`TopicOutcome`](crate::registrar::TopicOutcome) and only become
/// [`Error::TopicCreation`] when a caller asks for it.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid topic name, schema, or endpoint.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Broker or schema registry unreachable.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The administrative create-topics call failed.
    #[error("Topic creation failed for '{topic}': {reason}")]
    TopicCreation {
        /// Topic the request was issued for
        topic: String,
        /// Broker-reported or client-side failure
        reason: String,
    },

    /// A message failed after it was enqueued.
    #[error("Delivery to '{topic}' failed: {source}")]
    Delivery {
        /// Destination topic of the failed message
        topic: String,
        /// Underlying client error
        source: rdkafka::error::KafkaError,
    },

    /// Kafka client or producer error.
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// Avro encoding or schema resolution error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] apache_avro::Error),

    /// JSON error, typically from registry responses or CLI input.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Message does not fit the schemas bound to the producer.
    #[error("Schema error: {0}")]
    Schema(String),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The producer was already closed.
    #[error("Producer for '{0}' is closed")]
    Closed(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Connection(e.to_string())
    }
}

/// A convenient Result type alias for topic-producer operations.
///
/// This is equivalent to `std::result::Result<T, topic_producer::Error>`.
pub type Result<T> = std::result::Result<T, Error>;
