//! Request-scoped auth pipeline: extract -> resolve (cache or endpoint) -> authorize.
//!
//! Steps run strictly in that order and stop at the first failure. The only
//! suspension point is the resolver call on a cache miss.
//!
//! One pipeline per protected mount. Required scopes are fixed at construction.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use axum::http::HeaderMap;
use serde_json::Value;
use url::Url;

use crate::error::AuthError;
use crate::services::auth::{
    credential::{self, fingerprint},
    identity::Identity,
    resolver::{DEFAULT_REQUEST_TIMEOUT, HttpIdentityResolver, IdentityResolver},
    scope::{self, ScopeSet},
};
use crate::services::cache::{DEFAULT_TTL, IdentityCache};

/// Construction parameters for an HTTP-backed pipeline.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub identity_url: Url,
    pub required_scopes: ScopeSet,
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
}

impl AuthConfig {
    pub fn new(identity_url: Url) -> Self {
        Self {
            identity_url,
            required_scopes: ScopeSet::empty(),
            cache_ttl: DEFAULT_TTL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_required_scopes(mut self, scopes: impl Into<ScopeSet>) -> Self {
        self.required_scopes = scopes.into();
        self
    }

    /// Required scopes from a loosely-typed value (string, list, or absent).
    ///
    /// Any other shape is rejected here rather than on the first request.
    pub fn with_required_scopes_value(mut self, scopes: Option<&Value>) -> Result<Self, AuthError> {
        self.required_scopes = ScopeSet::from_value(scopes)?;
        Ok(self)
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

pub struct AuthPipeline {
    resolver: Arc<dyn IdentityResolver>,
    cache: IdentityCache,
    required_scopes: ScopeSet,
    closed: AtomicBool,
}

impl std::fmt::Debug for AuthPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthPipeline")
            .field("required_scopes", &self.required_scopes)
            .field("cache_ttl", &self.cache.ttl())
            .field("closed", &self.closed)
            .finish()
    }
}

impl AuthPipeline {
    pub fn new(
        resolver: Arc<dyn IdentityResolver>,
        required_scopes: ScopeSet,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            resolver,
            cache: IdentityCache::new(cache_ttl),
            required_scopes,
            closed: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let resolver = HttpIdentityResolver::new(config.identity_url.clone(), config.request_timeout)
            .map_err(|e| AuthError::InvalidConfiguration(format!("http client: {e}")))?;

        Ok(Self::new(
            Arc::new(resolver),
            config.required_scopes.clone(),
            config.cache_ttl,
        ))
    }

    pub fn required_scopes(&self) -> &ScopeSet {
        &self.required_scopes
    }

    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    /// Full pipeline for one request. The returned identity belongs to the caller.
    pub async fn run(&self, headers: &HeaderMap) -> Result<Identity, AuthError> {
        let identity = self.authenticate(headers).await?;
        self.authorize(&identity)?;
        Ok(identity)
    }

    /// Extract the credential and resolve it, via the cache when possible.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, AuthError> {
        let Some(credential) = credential::extract(headers) else {
            tracing::debug!("no credential on request");
            return Err(AuthError::MissingCredential);
        };

        if let Some(identity) = self.cache.get(&credential) {
            tracing::debug!(credential = %fingerprint(&credential), "identity cache hit");
            return Ok(identity);
        }

        tracing::debug!(credential = %fingerprint(&credential), "identity cache miss");

        let identity = self.resolver.resolve(&credential).await.map_err(|err| {
            tracing::warn!(
                credential = %fingerprint(&credential),
                upstream_status = ?err.upstream_status(),
                error = %err,
                "identity resolution failed"
            );
            AuthError::from(err)
        })?;

        self.cache.put(&credential, identity.clone());
        Ok(identity)
    }

    /// Check the identity's granted scopes against this pipeline's requirement.
    pub fn authorize(&self, identity: &Identity) -> Result<(), AuthError> {
        let granted = identity.scopes()?;

        scope::authorize(&self.required_scopes, &granted).map_err(|missing| {
            tracing::info!(
                uid = ?identity.uid(),
                scope = %missing.scope,
                "request rejected: missing scope"
            );
            AuthError::from(missing)
        })
    }

    /// Cancel every pending cache expiry and drop cached identities.
    ///
    /// Meant to be called once at shutdown; later calls only log. Requests served
    /// after close still authenticate, they just are not cached.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            tracing::warn!("auth pipeline already closed");
            return;
        }

        self.cache.close();
        tracing::info!("auth pipeline closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
