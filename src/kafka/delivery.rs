//! Asynchronous delivery reports.
//!
//! `publish` only enqueues; whether a message actually reached the broker is
//! learned later on librdkafka's polling thread. [`DeliveryContext`] receives
//! those callbacks, keeps running counts, logs failures, and forwards each
//! report to an optional caller-supplied [`DeliveryListener`].

use crate::{Error, Result};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::producer::{DeliveryResult, ProducerContext};
use rdkafka::ClientContext;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, trace};

/// Outcome of a single enqueued message.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub topic: String,
    pub partition: i32,
    /// Offset assigned by the broker, or the error that ended the attempt.
    pub result: std::result::Result<i64, KafkaError>,
}

impl DeliveryReport {
    pub fn is_delivered(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> Result<i64> {
        self.result.map_err(|source| Error::Delivery {
            topic: self.topic,
            source,
        })
    }
}

/// Callback invoked for every delivery report.
///
/// Runs on the client's background thread and must not block.
pub type DeliveryListener = Arc<dyn Fn(&DeliveryReport) + Send + Sync>;

#[derive(Debug, Default)]
pub struct DeliveryStats {
    delivered: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryCounts {
    pub delivered: u64,
    pub failed: u64,
}

impl DeliveryStats {
    pub fn record(&self, report: &DeliveryReport) {
        if report.is_delivered() {
            self.delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> DeliveryCounts {
        DeliveryCounts {
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

pub struct DeliveryContext {
    stats: Arc<DeliveryStats>,
    listener: Option<DeliveryListener>,
}

impl DeliveryContext {
    pub fn new(stats: Arc<DeliveryStats>, listener: Option<DeliveryListener>) -> Self {
        Self { stats, listener }
    }

    pub(crate) fn handle(&self, report: DeliveryReport) {
        self.stats.record(&report);

        match &report.result {
            Ok(offset) => trace!(
                topic = %report.topic,
                partition = report.partition,
                offset,
                "Message delivered"
            ),
            Err(e) => error!(
                topic = %report.topic,
                partition = report.partition,
                "Message delivery failed: {}",
                e
            ),
        }

        if let Some(listener) = &self.listener {
            listener(&report);
        }
    }
}

impl ClientContext for DeliveryContext {}

impl ProducerContext for DeliveryContext {
    type DeliveryOpaque = ();

    fn delivery(&self, delivery_result: &DeliveryResult<'_>, _opaque: Self::DeliveryOpaque) {
        let report = match delivery_result {
            Ok(message) => DeliveryReport {
                topic: message.topic().to_string(),
                partition: message.partition(),
                result: Ok(message.offset()),
            },
            Err((e, message)) => DeliveryReport {
                topic: message.topic().to_string(),
                partition: message.partition(),
                result: Err(e.clone()),
            },
        };
        self.handle(report);
    }
}
