//! Server transport for the sync client.
//!
//! The driver talks to the server through the [`SyncTransport`] trait so
//! cycle logic can be exercised against an in-memory double; the real
//! implementation is [`HttpTransport`] over reqwest with a bounded request
//! timeout. A timed-out call is a failed cycle, never a partial one.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::models::format_ts;
use crate::protocol::{PullResponse, PushRequest, PushResponse};

/// Errors talking to the sync server.
#[derive(Debug)]
pub enum TransportError {
    /// The request did not complete within the configured timeout.
    Timeout,
    /// Transport-level failure (connection refused, DNS, TLS, ...).
    Http(reqwest::Error),
    /// The server answered with a non-success status.
    Rejected { status: u16, message: String },
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Timeout => write!(f, "Request timed out"),
            TransportError::Http(e) => write!(f, "Connection error: {}", e),
            TransportError::Rejected { status, message } => {
                write!(f, "Server rejected request ({}): {}", status, message)
            }
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Http(e)
        }
    }
}

/// What the driver needs from a server.
pub trait SyncTransport {
    fn push(
        &self,
        request: &PushRequest,
    ) -> impl std::future::Future<Output = Result<PushResponse, TransportError>> + Send;

    fn pull(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> impl std::future::Future<Output = Result<PullResponse, TransportError>> + Send;
}

/// HTTP implementation of [`SyncTransport`].
pub struct HttpTransport {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport for the given server with a per-request timeout.
    pub fn new(
        server_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: normalize_base_url(server_url.into()),
            api_key: api_key.into(),
            client,
        })
    }

    fn sync_url(&self) -> String {
        format!("{}/sync", self.base_url)
    }
}

impl SyncTransport for HttpTransport {
    async fn push(&self, request: &PushRequest) -> Result<PushResponse, TransportError> {
        let response = self
            .client
            .post(self.sync_url())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    async fn pull(&self, since: Option<DateTime<Utc>>) -> Result<PullResponse, TransportError> {
        let mut request = self.client.get(self.sync_url()).bearer_auth(&self.api_key);

        if let Some(since) = since {
            request = request.query(&[("since", format_ts(since))]);
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

/// Returns true if the server's health endpoint answers.
///
/// Used to fast-fail auto-sync when the device is offline.
pub async fn check_server(server_url: &str) -> bool {
    let url = format!("{}/health", normalize_base_url(server_url.to_string()));

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
    {
        Ok(client) => client,
        Err(_) => return false,
    };

    match client.get(&url).send().await {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}

fn normalize_base_url(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        url = format!("http://{}", url);
    }
    url
}
