use crate::{config::KafkaConfig, Error, Result};
use futures::future::BoxFuture;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::ClientConfig;
use std::time::Duration;
use tracing::{debug, info};

/// A create-topics request for a single topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSpec {
    pub name: String,
    pub partitions: i32,
    pub replicas: i32,
}

impl TopicSpec {
    pub fn new(name: impl Into<String>, partitions: i32, replicas: i32) -> Self {
        Self {
            name: name.into(),
            partitions,
            replicas,
        }
    }
}

/// What the broker said about a create-topics request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateTopicResult {
    Created,
    AlreadyExists,
    Failed(String),
}

/// Administrative endpoint of the broker.
///
/// Only topic creation is needed; everything else about cluster
/// administration is left to external tooling.
pub trait TopicAdmin: Send + Sync {
    fn create_topic<'a>(&'a self, spec: &'a TopicSpec) -> BoxFuture<'a, CreateTopicResult>;
}

pub struct KafkaAdmin {
    admin_client: AdminClient<DefaultClientContext>,
    operation_timeout: Duration,
}

impl KafkaAdmin {
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let admin_client: AdminClient<_> = ClientConfig::new()
            .set("bootstrap.servers", config.bootstrap_servers())
            .create()
            .map_err(Error::Kafka)?;

        Ok(Self {
            admin_client,
            operation_timeout: Duration::from_secs(config.admin_timeout_secs),
        })
    }

    async fn create(&self, spec: &TopicSpec) -> CreateTopicResult {
        let new_topic = NewTopic::new(
            &spec.name,
            spec.partitions,
            TopicReplication::Fixed(spec.replicas),
        );

        let opts = AdminOptions::new().operation_timeout(Some(self.operation_timeout));

        debug!(
            partitions = spec.partitions,
            replicas = spec.replicas,
            "Issuing create-topics request for '{}'",
            spec.name
        );

        let results = match self.admin_client.create_topics(&[new_topic], &opts).await {
            Ok(results) => results,
            Err(e) => return CreateTopicResult::Failed(e.to_string()),
        };

        // One topic in, one result out; an empty response is treated as failure.
        match results.into_iter().next() {
            Some(Ok(topic)) => {
                info!("Successfully created topic: {}", topic);
                CreateTopicResult::Created
            }
            Some(Err((_topic, RDKafkaErrorCode::TopicAlreadyExists))) => {
                CreateTopicResult::AlreadyExists
            }
            Some(Err((_topic, code))) => CreateTopicResult::Failed(code.to_string()),
            None => CreateTopicResult::Failed("broker returned no result".to_string()),
        }
    }
}

impl TopicAdmin for KafkaAdmin {
    fn create_topic<'a>(&'a self, spec: &'a TopicSpec) -> BoxFuture<'a, CreateTopicResult> {
        Box::pin(self.create(spec))
    }
}
