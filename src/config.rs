/*
 * Responsibility
 * - 環境変数の読み込み (IDENTITY_URL, REQUIRED_SCOPES, cache TTL など)
 * - 設定値のバリデーション (不足なら起動失敗)
 */
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::services::auth::resolver::DEFAULT_REQUEST_TIMEOUT;
use crate::services::auth::{AuthConfig, ScopeSet};
use crate::services::cache::DEFAULT_TTL;

/// Deployment flavour. Decides log verbosity and panic behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    /// `APP_ENV`; anything but `production` / `prod` is development.
    pub fn from_env() -> Self {
        Self::parse(std::env::var("APP_ENV").ok().as_deref())
    }

    fn parse(raw: Option<&str>) -> Self {
        match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("production" | "prod") => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {key} ({reason})")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl ToString) -> Self {
        Self::Invalid {
            key,
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub identity_url: Url,
    pub required_scopes: Vec<String>,
    pub identity_cache_ttl: Duration,
    pub identity_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port = env_parsed::<u16>("PORT")?.unwrap_or(3000);
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        let app_env = AppEnv::from_env();

        let identity_url =
            std::env::var("IDENTITY_URL").map_err(|_| ConfigError::Missing("IDENTITY_URL"))?;
        let identity_url = parse_identity_url(&identity_url)?;

        let required_scopes = parse_scope_list(&std::env::var("REQUIRED_SCOPES").unwrap_or_default());

        let identity_cache_ttl = env_parsed::<u64>("IDENTITY_CACHE_TTL_MS")?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TTL);

        let identity_timeout = match env_parsed::<u64>("IDENTITY_TIMEOUT_SECS")? {
            Some(0) => return Err(ConfigError::invalid("IDENTITY_TIMEOUT_SECS", "must be > 0")),
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        Ok(Self {
            addr,
            app_env,
            identity_url,
            required_scopes,
            identity_cache_ttl,
            identity_timeout,
        })
    }

    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig::new(self.identity_url.clone())
            .with_required_scopes(ScopeSet::from(self.required_scopes.clone()))
            .with_cache_ttl(self.identity_cache_ttl)
            .with_request_timeout(self.identity_timeout)
    }

    /// Whole-request budget: identity round-trip plus headroom for the handler.
    pub fn request_timeout(&self) -> Duration {
        self.identity_timeout + Duration::from_secs(20)
    }
}

// Unset => None; set but unparsable => error naming the variable.
fn env_parsed<T>(key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::invalid(key, e)),
        Err(_) => Ok(None),
    }
}

fn parse_identity_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::invalid("IDENTITY_URL", e))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::invalid(
            "IDENTITY_URL",
            format!("unsupported scheme {other}"),
        )),
    }
}

// Comma-separated, blanks dropped: "read, write" -> ["read", "write"]
fn parse_scope_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
