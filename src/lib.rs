pub mod config;
pub mod error;
pub mod producer;
pub mod registrar;

pub mod kafka;
pub mod schema;

#[cfg(test)]
mod test_utils;

pub use config::Config;
pub use error::{Error, Result};
pub use producer::{current_time_millis, TypedProducer};
pub use registrar::{FailurePolicy, Registrar, TopicOutcome};
