//! Credential -> Identity resolution against the external identity endpoint.
//!
//! `GET <identity_url>` with `Authorization: Bearer <credential>`.
//! - 2xx + JSON object => `Identity`
//! - non-2xx           => `ResolveError::Upstream` (status + upstream message)
//! - transport failure => `ResolveError::Transport`
//!
//! No retries here. A failed resolution fails the current request only.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, header};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::services::auth::credential::fingerprint;
use crate::services::auth::identity::Identity;

/// Default outbound timeout. Bounds the single suspension point of a request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("identity endpoint unreachable: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("identity endpoint returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("identity endpoint returned a non-object body")]
    InvalidBody,
}

impl ResolveError {
    /// Upstream HTTP status, when the endpoint answered at all.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Message safe to return to the client.
    pub fn client_message(&self) -> String {
        match self {
            Self::Transport(_) => "identity endpoint unreachable".to_owned(),
            Self::Upstream { message, .. } => message.clone(),
            Self::InvalidBody => "invalid identity response".to_owned(),
        }
    }
}

/// Resolves a credential into an identity.
///
/// Implementations must not block the calling task while waiting on I/O.
#[async_trait]
pub trait IdentityResolver: Send + Sync + 'static {
    async fn resolve(&self, credential: &str) -> Result<Identity, ResolveError>;
}

/// `reqwest`-backed resolver for a single identity endpoint.
#[derive(Clone, Debug)]
pub struct HttpIdentityResolver {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpIdentityResolver {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, endpoint))
    }

    /// Reuse an existing client (connection pool shared with the host).
    pub fn with_client(client: reqwest::Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl IdentityResolver for HttpIdentityResolver {
    async fn resolve(&self, credential: &str) -> Result<Identity, ResolveError> {
        tracing::debug!(
            credential = %fingerprint(credential),
            endpoint = %self.endpoint,
            "resolving identity"
        );

        let resp = self
            .client
            .get(self.endpoint.clone())
            .bearer_auth(credential)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(ResolveError::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ResolveError::Upstream {
                status: status.as_u16(),
                message: upstream_message(status, &body),
            });
        }

        match resp.json::<Value>().await {
            Ok(Value::Object(fields)) => Ok(Identity::from_fields(fields, credential)),
            _ => Err(ResolveError::InvalidBody),
        }
    }
}

// Prefer the endpoint's own wording; fall back to a generic status line.
fn upstream_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "error_description", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str).map(str::to_owned))
        })
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()))
}
