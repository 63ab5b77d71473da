//! HTTP polling push transport.
//!
//! Used when a WebSocket cannot be established. The "handshake" is one
//! successful read of `/metrics/latest`; after that the stream synthesizes
//! the same frames the WebSocket would carry, one per poll interval.
//!
//! A `503` carrying a store error code means the relay is healthy but its
//! store is not; that round simply has no data, like on the WebSocket route.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::error::ConnectError;
use crate::traits::{PushStream, PushTransport, TransportKind};
use crate::websocket::messages::{INITIAL_DATA, METRICS_UPDATE};

/// REST path of the latest sample.
pub const LATEST_PATH: &str = "/metrics/latest";

/// Per-request ceiling when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Prefix of the error codes the relay uses for store outages.
const STORE_CODE_PREFIX: &str = "E_STORE_";

/// Resolve an endpoint into the URL of its latest-sample resource.
pub fn latest_url(endpoint: &str) -> Result<Url, ConnectError> {
    let invalid = |message: String| ConnectError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        message,
    };

    let mut url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "http",
        "https" | "wss" => "https",
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    };
    url.set_scheme(scheme)
        .map_err(|_| invalid(format!("cannot switch scheme to {}", scheme)))?;
    if matches!(url.path(), "" | "/" | "/ws") {
        url.set_path(LATEST_PATH);
    }
    Ok(url)
}

/// Polls the relay's REST endpoint.
#[derive(Debug, Clone)]
pub struct PollingTransport {
    client: reqwest::Client,
    interval: Duration,
    request_timeout: Duration,
}

impl PollingTransport {
    pub fn new(interval: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            interval,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Bound every GET, so a relay that stops answering reads as a drop.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// One read of the latest-sample resource.
#[derive(Debug, Clone, PartialEq)]
enum Poll {
    /// The relay's answer: a sample or `null`.
    Latest(Value),
    /// The relay is up but its store is not.
    StoreUnavailable { code: String },
}

/// Shared request state of a transport and its streams.
#[derive(Debug, Clone)]
struct Poller {
    client: reqwest::Client,
    url: Url,
    endpoint: String,
    timeout: Duration,
}

impl Poller {
    async fn fetch(&self) -> Result<Poll, ConnectError> {
        let response = self
            .client
            .get(self.url.as_str())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            let body = response.json::<Value>().await.unwrap_or(Value::Null);
            return match body.get("code").and_then(Value::as_str) {
                Some(code) if code.starts_with(STORE_CODE_PREFIX) => Ok(Poll::StoreUnavailable {
                    code: code.to_string(),
                }),
                _ => Err(ConnectError::transport(&self.endpoint, "HTTP 503")),
            };
        }
        if !status.is_success() {
            return Err(ConnectError::transport(
                &self.endpoint,
                format!("HTTP {}", status.as_u16()),
            ));
        }
        response
            .json::<Value>()
            .await
            .map(Poll::Latest)
            .map_err(|e| self.request_error(e))
    }

    fn request_error(&self, err: reqwest::Error) -> ConnectError {
        if err.is_timeout() {
            ConnectError::transport(
                &self.endpoint,
                format!("no answer within {}ms", self.timeout.as_millis()),
            )
        } else {
            ConnectError::transport(&self.endpoint, err)
        }
    }
}

#[async_trait]
impl PushTransport for PollingTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Polling
    }

    async fn open(&self, endpoint: &str) -> Result<Box<dyn PushStream>, ConnectError> {
        let poller = Poller {
            client: self.client.clone(),
            url: latest_url(endpoint)?,
            endpoint: endpoint.to_string(),
            timeout: self.request_timeout,
        };
        let first = match poller.fetch().await? {
            Poll::Latest(metrics) => metrics,
            Poll::StoreUnavailable { code } => {
                debug!(endpoint = %endpoint, code = %code, "Relay store unavailable at connect");
                Value::Null
            }
        };
        debug!(url = %poller.url, "Polling transport established");

        Ok(Box::new(PollingStream {
            poller,
            interval: self.interval,
            initial: Some(json!({ "event": INITIAL_DATA, "metrics": first }).to_string()),
            closed: false,
        }))
    }
}

/// Stream of synthesized frames backed by periodic GETs.
pub struct PollingStream {
    poller: Poller,
    interval: Duration,
    initial: Option<String>,
    closed: bool,
}

#[async_trait]
impl PushStream for PollingStream {
    async fn next_frame(&mut self) -> Option<Result<String, ConnectError>> {
        if self.closed {
            return None;
        }
        if let Some(initial) = self.initial.take() {
            return Some(Ok(initial));
        }
        loop {
            tokio::time::sleep(self.interval).await;
            match self.poller.fetch().await {
                // No data yet: nothing to push this round.
                Ok(Poll::Latest(Value::Null)) => continue,
                Ok(Poll::StoreUnavailable { code }) => {
                    debug!(endpoint = %self.poller.endpoint, code = %code, "Relay store unavailable, skipping");
                    continue;
                }
                Ok(Poll::Latest(metrics)) => {
                    let frame = json!({
                        "event": METRICS_UPDATE,
                        "metrics": metrics,
                        "timestamp": Utc::now().to_rfc3339(),
                    });
                    return Some(Ok(frame.to_string()));
                }
                Err(e) => {
                    self.closed = true;
                    return Some(Err(e));
                }
            }
        }
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}
