//! Process-wide topic registration.
//!
//! A [`Registrar`] is built once by the application's wiring and shared (via
//! `Arc`) with every [`TypedProducer`](crate::producer::TypedProducer). It
//! guarantees that each topic name triggers at most one create-topics request
//! for the lifetime of the registrar.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use topic_producer::kafka::{KafkaAdmin, TopicSpec};
//! use topic_producer::registrar::{FailurePolicy, Registrar};
//! # use topic_producer::config::KafkaConfig;
//!
//! # async fn example(kafka: KafkaConfig) -> topic_producer::Result<()> {
//! let admin = Arc::new(KafkaAdmin::new(&kafka)?);
//! let registrar = Registrar::new(admin, FailurePolicy::AssumeExists);
//!
//! let outcome = registrar
//!     .ensure_topic(&TopicSpec::new("purple.flights", 1, 1))
//!     .await;
//! println!("purple.flights: {:?}", outcome);
//! # Ok(())
//! # }
//! ```

use crate::kafka::{CreateTopicResult, TopicAdmin, TopicSpec};
use crate::{Error, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// What to record when a create-topics request fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Mark the topic registered anyway and assume it exists (for example,
    /// created by an earlier process). No retry for this registrar's lifetime.
    #[default]
    AssumeExists,
    /// Leave the topic unregistered so the next producer construction for it
    /// issues a fresh request.
    RetryOnNextConstruction,
}

/// Result of [`Registrar::ensure_topic`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicOutcome {
    /// Already in the registration set; no request issued.
    AlreadyRegistered,
    Created,
    /// The broker reported the topic as existing.
    AlreadyExists,
    /// The request failed. Whether the topic was registered regardless
    /// depends on the [`FailurePolicy`].
    Failed { reason: String },
}

impl TopicOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, TopicOutcome::Failed { .. })
    }

    /// Converts a failed outcome into [`Error::TopicCreation`].
    pub fn into_result(self, topic: &str) -> Result<Self> {
        match self {
            TopicOutcome::Failed { reason } => Err(Error::TopicCreation {
                topic: topic.to_string(),
                reason,
            }),
            outcome => Ok(outcome),
        }
    }
}

pub struct Registrar {
    admin: Arc<dyn TopicAdmin>,
    policy: FailurePolicy,
    registered: Mutex<HashSet<String>>,
}

impl Registrar {
    pub fn new(admin: Arc<dyn TopicAdmin>, policy: FailurePolicy) -> Self {
        Self {
            admin,
            policy,
            registered: Mutex::new(HashSet::new()),
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Issues a create-topics request for `spec` unless its name is already
    /// registered.
    ///
    /// The registration lock is held across the request, so concurrent calls
    /// for the same name produce exactly one request. Failures never surface
    /// as `Err`; they are logged and returned as [`TopicOutcome::Failed`].
    #[instrument(skip(self), fields(topic = %spec.name))]
    pub async fn ensure_topic(&self, spec: &TopicSpec) -> TopicOutcome {
        let mut registered = self.registered.lock().await;

        if registered.contains(&spec.name) {
            debug!("Topic '{}' already registered", spec.name);
            return TopicOutcome::AlreadyRegistered;
        }

        info!("Creating producer topic '{}'", spec.name);
        let outcome = match self.admin.create_topic(spec).await {
            CreateTopicResult::Created => TopicOutcome::Created,
            CreateTopicResult::AlreadyExists => {
                info!("Topic '{}' already exists on the broker", spec.name);
                TopicOutcome::AlreadyExists
            }
            CreateTopicResult::Failed(reason) => {
                warn!(
                    policy = ?self.policy,
                    "Failed to create topic '{}': {}", spec.name, reason
                );
                TopicOutcome::Failed { reason }
            }
        };

        let retry_later =
            outcome.is_failed() && self.policy == FailurePolicy::RetryOnNextConstruction;
        if !retry_later {
            registered.insert(spec.name.clone());
        }

        outcome
    }

    pub async fn is_registered(&self, name: &str) -> bool {
        self.registered.lock().await.contains(name)
    }

    /// Sorted snapshot of the registration set.
    pub async fn registered_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.registered.lock().await.iter().cloned().collect();
        topics.sort();
        topics
    }
}
