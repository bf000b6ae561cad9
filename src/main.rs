use apache_avro::Schema;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use topic_producer::kafka::{DeliveryListener, DeliveryReport, KafkaAdmin, TopicSpec};
use topic_producer::{Config, Error, FailurePolicy, Registrar, Result, TypedProducer};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "topic-producer")]
#[command(about = "Schema-aware Kafka producer", long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[arg(short, long, help = "Enable JSON output for logs")]
    json_logs: bool,

    #[arg(short, long, help = "Verbose logging")]
    verbose: bool,

    #[arg(long, help = "Retry topic creation on the next construction instead of assuming the topic exists")]
    retry_failed_topics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create every configured producer topic that does not exist yet
    EnsureTopics,
    /// Publish a single message to a configured topic
    Publish {
        #[arg(short, long)]
        topic: String,

        #[arg(
            short,
            long,
            value_name = "JSON",
            help = "Key as JSON; 'now' sends the current time in millis (key schema must be a long or a record with one long field)"
        )]
        key: String,

        #[arg(long, value_name = "JSON")]
        value: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.json_logs, args.verbose);

    info!("Starting topic-producer");
    info!("Loading configuration from {:?}", args.config);

    let config = match Config::from_file(&args.config) {
        Ok(cfg) => {
            info!("Configuration loaded successfully");
            cfg
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    info!(
        kafka_brokers = ?config.kafka.brokers,
        schema_registry = %config.schema_registry.url,
        producers = config.producers.len(),
        "Configuration summary"
    );

    let policy = if args.retry_failed_topics {
        FailurePolicy::RetryOnNextConstruction
    } else {
        FailurePolicy::AssumeExists
    };
    let registrar = Registrar::new(Arc::new(KafkaAdmin::new(&config.kafka)?), policy);

    match args.command {
        Command::EnsureTopics => ensure_topics(&config, &registrar).await,
        Command::Publish { topic, key, value } => {
            publish_one(&config, &registrar, &topic, &key, value.as_deref()).await
        }
    }
}

async fn ensure_topics(config: &Config, registrar: &Registrar) -> Result<()> {
    let mut failed = Vec::new();

    for producer in &config.producers {
        let spec = TopicSpec::new(producer.topic.clone(), producer.partitions, producer.replicas);
        let outcome = registrar.ensure_topic(&spec).await;
        match outcome.into_result(&producer.topic) {
            Ok(outcome) => info!("{}: {:?}", producer.topic, outcome),
            Err(e) => {
                warn!("{}", e);
                failed.push(producer.topic.as_str());
            }
        }
    }

    if !failed.is_empty() {
        return Err(Error::TopicCreation {
            topic: failed.join(", "),
            reason: format!("{} of {} topics failed", failed.len(), config.producers.len()),
        });
    }
    Ok(())
}

async fn publish_one(
    config: &Config,
    registrar: &Registrar,
    topic: &str,
    key: &str,
    value: Option<&str>,
) -> Result<()> {
    let producer_config = config
        .producer(topic)
        .ok_or_else(|| Error::Config(format!("no producer configured for topic '{}'", topic)))?;

    let reports: Arc<Mutex<Vec<DeliveryReport>>> = Arc::default();
    let sink = reports.clone();
    let listener: DeliveryListener = Arc::new(move |report: &DeliveryReport| {
        sink.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report.clone());
    });

    let producer = TypedProducer::connect(
        producer_config,
        &config.kafka,
        &config.schema_registry,
        registrar,
        Some(listener),
    )
    .await?;

    let key: serde_json::Value = if key == "now" {
        time_key(producer.key_schema(), producer.current_time_millis())?
    } else {
        serde_json::from_str(key)?
    };
    let value: Option<serde_json::Value> = value.map(serde_json::from_str).transpose()?;

    producer.publish(&key, value.as_ref())?;

    // flush blocks until the broker answers
    tokio::task::block_in_place(|| producer.close())?;

    let stats = producer.delivery_stats();
    info!(
        delivered = stats.delivered,
        failed = stats.failed,
        "Published to {}",
        topic
    );

    let reports = std::mem::take(&mut *reports.lock().unwrap_or_else(PoisonError::into_inner));
    require_delivered(reports)
}

/// Shapes the current time to fit the key schema: a bare long, or a record
/// whose only field is a long.
fn time_key(schema: &Schema, millis: i64) -> Result<serde_json::Value> {
    let is_long = |s: &Schema| matches!(s, Schema::Long | Schema::TimestampMillis);

    match schema {
        s if is_long(s) => Ok(serde_json::Value::from(millis)),
        Schema::Record(record) if record.fields.len() == 1 && is_long(&record.fields[0].schema) => {
            let mut key = serde_json::Map::new();
            key.insert(record.fields[0].name.clone(), millis.into());
            Ok(serde_json::Value::Object(key))
        }
        _ => Err(Error::Config(
            "--key now needs a long key schema or a record with a single long field".to_string(),
        )),
    }
}

/// Fails with the first undelivered report.
fn require_delivered(reports: Vec<DeliveryReport>) -> Result<()> {
    for report in reports {
        let topic = report.topic.clone();
        let partition = report.partition;
        let offset = report.into_result().map_err(|e| {
            error!("Message to {} was not delivered", topic);
            e
        })?;
        info!(partition, offset, "Message to {} delivered", topic);
    }
    Ok(())
}

fn init_logging(json: bool, verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("topic_producer=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("topic_producer=info,warn"))
    };

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdkafka::error::KafkaError;
    use rdkafka::types::RDKafkaErrorCode;

    fn report(result: std::result::Result<i64, KafkaError>) -> DeliveryReport {
        DeliveryReport {
            topic: "blue.arrivals".to_string(),
            partition: 0,
            result,
        }
    }

    #[test]
    fn test_failed_delivery_fails_publish() {
        let err = require_delivered(vec![
            report(Ok(11)),
            report(Err(KafkaError::MessageProduction(
                RDKafkaErrorCode::MessageTimedOut,
            ))),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::Delivery { ref topic, .. } if topic == "blue.arrivals"));

        assert!(require_delivered(vec![report(Ok(12))]).is_ok());
    }

    #[test]
    fn test_time_key_fits_key_schema() {
        let long = Schema::parse_str(r#""long""#).unwrap();
        assert_eq!(time_key(&long, 1_700_000_000_000).unwrap(), 1_700_000_000_000i64);

        let record = Schema::parse_str(
            r#"{"type":"record","name":"ArrivalKey","fields":[{"name":"timestamp","type":"long"}]}"#,
        )
        .unwrap();
        assert_eq!(
            time_key(&record, 5).unwrap(),
            serde_json::json!({"timestamp": 5})
        );

        let int_record = Schema::parse_str(
            r#"{"type":"record","name":"FlightKey","fields":[{"name":"id","type":"int"}]}"#,
        )
        .unwrap();
        assert!(matches!(time_key(&int_record, 5), Err(Error::Config(_))));
    }
}
