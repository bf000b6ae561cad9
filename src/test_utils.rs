//! In-memory stand-ins for the broker, admin and registry clients.

use crate::kafka::{BrokerClient, CreateTopicResult, TopicAdmin, TopicSpec};
use crate::schema::SchemaRegistry;
use crate::{Error, Result};
use apache_avro::Schema;
use futures::future::BoxFuture;
use rdkafka::error::KafkaError;
use rdkafka::types::RDKafkaErrorCode;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub struct MockAdmin {
    result: Mutex<CreateTopicResult>,
    requests: Mutex<Vec<TopicSpec>>,
    delay: Duration,
}

impl MockAdmin {
    pub fn new() -> Self {
        Self::with_result(CreateTopicResult::Created)
    }

    pub fn with_result(result: CreateTopicResult) -> Self {
        Self {
            result: Mutex::new(result),
            requests: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    pub fn set_result(&self, result: CreateTopicResult) {
        *self.result.lock().unwrap() = result;
    }

    pub fn requests(&self) -> Vec<TopicSpec> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl TopicAdmin for MockAdmin {
    fn create_topic<'a>(&'a self, spec: &'a TopicSpec) -> BoxFuture<'a, CreateTopicResult> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(spec.clone());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.result.lock().unwrap().clone()
        })
    }
}

/// Hands out sequential ids per subject; can be switched to fail.
#[derive(Default)]
pub struct MockRegistry {
    ids: Mutex<HashMap<String, u32>>,
    calls: AtomicUsize,
    unreachable: bool,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn id_for(&self, subject: &str) -> Option<u32> {
        self.ids.lock().unwrap().get(subject).copied()
    }
}

impl SchemaRegistry for MockRegistry {
    fn register<'a>(&'a self, subject: &'a str, _schema: &'a Schema) -> BoxFuture<'a, Result<u32>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.unreachable {
                return Err(Error::Connection("connection refused".to_string()));
            }
            let mut ids = self.ids.lock().unwrap();
            let next = ids.len() as u32 + 1;
            Ok(*ids.entry(subject.to_string()).or_insert(next))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub topic: String,
    pub key: Vec<u8>,
    pub value: Option<Vec<u8>>,
}

/// Records enqueued messages; `flush` moves them to the acknowledged list.
#[derive(Default)]
pub struct MockBroker {
    pending: Mutex<Vec<SentMessage>>,
    acknowledged: Mutex<Vec<SentMessage>>,
    flushes: AtomicUsize,
    // flushes still to fail, leaving pending messages in place
    failing_flushes: AtomicUsize,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Vec<SentMessage> {
        self.pending.lock().unwrap().clone()
    }

    pub fn acknowledged(&self) -> Vec<SentMessage> {
        self.acknowledged.lock().unwrap().clone()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn fail_next_flushes(&self, count: usize) {
        self.failing_flushes.store(count, Ordering::SeqCst);
    }
}

impl BrokerClient for MockBroker {
    fn enqueue(&self, topic: &str, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        self.pending.lock().unwrap().push(SentMessage {
            topic: topic.to_string(),
            key: key.to_vec(),
            value: value.map(<[u8]>::to_vec),
        });
        Ok(())
    }

    fn flush(&self, _timeout: Option<Duration>) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_flushes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(Error::Kafka(KafkaError::Flush(RDKafkaErrorCode::OperationTimedOut)));
        }

        let drained: Vec<_> = self.pending.lock().unwrap().drain(..).collect();
        self.acknowledged.lock().unwrap().extend(drained);
        Ok(())
    }
}
