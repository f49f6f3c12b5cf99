//! Optional Application Insights telemetry.
//!
//! Handlers record metrics and exceptions into a [`TelemetrySink`]; items are
//! buffered and only leave the process on [`TelemetrySink::flush`].

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

use crate::config::TelemetryConfig;

const ROLE_NAME: &str = "hello-service";
const SDK_VERSION: &str = concat!("rust:", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("ingestion endpoint rejected telemetry: {status} - {message}")]
    Api { status: u16, message: String },
}

#[async_trait]
pub trait TelemetrySink: Send + Sync {
    fn track_metric(&self, name: &str, value: f64);

    fn track_exception(&self, type_name: &str, message: &str);

    /// Send everything buffered so far.
    async fn flush(&self) -> Result<(), TelemetryError>;
}

/// Application Insights client speaking the v2 track protocol.
pub struct AppInsightsClient {
    client: reqwest::Client,
    endpoint: String,
    instrumentation_key: String,
    buffer: Mutex<Vec<Value>>,
}

impl AppInsightsClient {
    pub fn new(instrumentation_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            instrumentation_key: instrumentation_key.into(),
            buffer: Mutex::new(Vec::new()),
        }
    }

    /// Build a client when an instrumentation key is configured.
    #[must_use]
    pub fn from_config(config: &TelemetryConfig) -> Option<Self> {
        config
            .instrumentation_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .map(|key| Self::new(key, config.endpoint.clone()))
    }

    /// Number of items waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn envelope(&self, kind: &str, base_type: &str, base_data: Value) -> Value {
        json!({
            "name": format!(
                "Microsoft.ApplicationInsights.{}.{kind}",
                self.instrumentation_key.replace('-', "")
            ),
            "time": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "iKey": self.instrumentation_key,
            "tags": {
                "ai.cloud.role": ROLE_NAME,
                "ai.internal.sdkVersion": SDK_VERSION,
            },
            "data": {
                "baseType": base_type,
                "baseData": base_data,
            },
        })
    }

    fn push(&self, envelope: Value) {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(envelope);
    }
}

#[async_trait]
impl TelemetrySink for AppInsightsClient {
    fn track_metric(&self, name: &str, value: f64) {
        let envelope = self.envelope(
            "Metric",
            "MetricData",
            json!({
                "ver": 2,
                "metrics": [{ "name": name, "kind": 0, "value": value, "count": 1 }],
                "properties": {},
            }),
        );
        self.push(envelope);
    }

    fn track_exception(&self, type_name: &str, message: &str) {
        let envelope = self.envelope(
            "Exception",
            "ExceptionData",
            json!({
                "ver": 2,
                "exceptions": [{
                    "id": 1,
                    "outerId": 0,
                    "typeName": type_name,
                    "message": message,
                    "hasFullStack": false,
                }],
                "properties": {},
            }),
        );
        self.push(envelope);
    }

    /// Sends everything buffered. The batch is dropped even if the POST fails.
    async fn flush(&self) -> Result<(), TelemetryError> {
        let batch = std::mem::take(&mut *self.buffer.lock().unwrap_or_else(PoisonError::into_inner));
        if batch.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .json(&batch)
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TelemetryError::Api {
                status: status.as_u16(),
                message,
            });
        }

        tracing::debug!(items = batch.len(), "flushed telemetry");
        Ok(())
    }
}

/// Milliseconds in `elapsed`, as reported in metrics.
#[must_use]
pub fn millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

#[cfg(any(test, feature = "test-utils"))]
#[allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
pub mod mock {
    //! Recording sink for unit testing.

    use super::{TelemetryError, TelemetrySink};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingTelemetry {
        metrics: Mutex<Vec<(String, f64)>>,
        exceptions: Mutex<Vec<(String, String)>>,
        flushes: Mutex<usize>,
    }

    impl RecordingTelemetry {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn metric_names(&self) -> Vec<String> {
            self.metrics
                .lock()
                .unwrap()
                .iter()
                .map(|(name, _)| name.clone())
                .collect()
        }

        pub fn metrics(&self) -> Vec<(String, f64)> {
            self.metrics.lock().unwrap().clone()
        }

        pub fn exceptions(&self) -> Vec<(String, String)> {
            self.exceptions.lock().unwrap().clone()
        }

        pub fn flushes(&self) -> usize {
            *self.flushes.lock().unwrap()
        }
    }

    #[async_trait]
    impl TelemetrySink for RecordingTelemetry {
        fn track_metric(&self, name: &str, value: f64) {
            self.metrics.lock().unwrap().push((name.to_string(), value));
        }

        fn track_exception(&self, type_name: &str, message: &str) {
            self.exceptions
                .lock()
                .unwrap()
                .push((type_name.to_string(), message.to_string()));
        }

        async fn flush(&self) -> Result<(), TelemetryError> {
            *self.flushes.lock().unwrap() += 1;
            Ok(())
        }
    }
}
