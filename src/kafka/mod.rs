pub mod admin;
pub mod broker;
pub mod delivery;

pub use admin::{CreateTopicResult, KafkaAdmin, TopicAdmin, TopicSpec};
pub use broker::{BrokerClient, KafkaBroker};
pub use delivery::{DeliveryCounts, DeliveryListener, DeliveryReport, DeliveryStats};
