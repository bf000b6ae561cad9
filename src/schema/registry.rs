//! Schema registry client.
//!
//! Speaks the Confluent REST API. Only registration is needed on the produce
//! path: the id returned for a subject/schema pair is written into every
//! message header.

use crate::{config::SchemaRegistryConfig, Error, Result};
use apache_avro::Schema;
use futures::future::BoxFuture;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

const CONTENT_TYPE: &str = "application/vnd.schemaregistry.v1+json";

pub trait SchemaRegistry: Send + Sync {
    /// Registers `schema` under `subject` (or looks up the existing
    /// registration) and returns its global id.
    fn register<'a>(&'a self, subject: &'a str, schema: &'a Schema) -> BoxFuture<'a, Result<u32>>;
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    id: u32,
}

pub struct HttpSchemaRegistry {
    config: SchemaRegistryConfig,
    http_client: HttpClient,
    // keyed by (subject, canonical form)
    id_cache: RwLock<HashMap<(String, String), u32>>,
}

impl HttpSchemaRegistry {
    pub fn new(config: &SchemaRegistryConfig) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Connection(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config: config.clone(),
            http_client,
            id_cache: RwLock::new(HashMap::new()),
        })
    }

    fn versions_url(&self, subject: &str) -> String {
        format!(
            "{}/subjects/{}/versions",
            self.config.url.trim_end_matches('/'),
            subject
        )
    }

    pub async fn cached_ids(&self) -> usize {
        self.id_cache.read().await.len()
    }

    async fn register_schema(&self, subject: &str, schema: &Schema) -> Result<u32> {
        let cache_key = (subject.to_string(), schema.canonical_form());
        if let Some(id) = self.id_cache.read().await.get(&cache_key) {
            debug!("Schema for subject '{}' already registered with id {}", subject, id);
            return Ok(*id);
        }

        let body = serde_json::json!({ "schema": serde_json::to_string(schema)? });

        let mut request = self
            .http_client
            .post(self.versions_url(subject))
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .json(&body);
        if let Some(username) = &self.config.username {
            request = request.basic_auth(username, self.config.password.as_ref());
        }

        let response = request.send().await.map_err(|e| {
            Error::Connection(format!(
                "schema registry at {} unreachable: {}",
                self.config.url, e
            ))
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(if status.is_client_error() {
                Error::Schema(format!(
                    "registry rejected schema for subject '{}': {} - {}",
                    subject, status, detail
                ))
            } else {
                Error::Connection(format!(
                    "registry error for subject '{}': {} - {}",
                    subject, status, detail
                ))
            });
        }

        let id = response.json::<RegisterResponse>().await?.id;
        info!("Registered schema for subject '{}' with id {}", subject, id);

        self.id_cache.write().await.insert(cache_key, id);
        Ok(id)
    }
}

impl SchemaRegistry for HttpSchemaRegistry {
    fn register<'a>(&'a self, subject: &'a str, schema: &'a Schema) -> BoxFuture<'a, Result<u32>> {
        Box::pin(self.register_schema(subject, schema))
    }
}
