//! Reqwest-backed metrics store accessor.
//!
//! Reads the latest row from an upstream HTTP endpoint that answers with a
//! JSON object, an array of rows (newest first), or `null` when empty.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::{classify_reqwest_error, StoreError};
use crate::models::RawSample;
use crate::traits::MetricsAccessor;

/// Default bound on a single store read.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(3);

/// Metrics accessor that queries an HTTP endpoint.
///
/// # Example
///
/// ```ignore
/// use metricast::adapters::HttpMetricsStore;
///
/// let store = HttpMetricsStore::new("http://db-api:4001/api/metrics/latest");
/// let row = store.latest().await?;
/// ```
#[derive(Debug, Clone)]
pub struct HttpMetricsStore {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpMetricsStore {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_timeout(url, DEFAULT_STORE_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}

#[async_trait]
impl MetricsAccessor for HttpMetricsStore {
    async fn latest(&self) -> Result<Option<RawSample>, StoreError> {
        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e, self.timeout_ms()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::unavailable(format!(
                "{} answered HTTP {}",
                self.url,
                status.as_u16()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| classify_reqwest_error(&e, self.timeout_ms()))?;

        match body {
            Value::Null => {
                debug!(url = %self.url, "Store has no rows yet");
                Ok(None)
            }
            Value::Object(row) => Ok(Some(row)),
            Value::Array(rows) => match rows.into_iter().next() {
                None => Ok(None),
                Some(Value::Object(row)) => Ok(Some(row)),
                Some(_) => Err(StoreError::InvalidResponse {
                    message: "array element is not an object".to_string(),
                }),
            },
            _ => Err(StoreError::InvalidResponse {
                message: "expected an object, array or null".to_string(),
            }),
        }
    }
}
