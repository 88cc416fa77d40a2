//! Identity-resolving auth middleware for axum.
//!
//! A request's `Authorization` credential is resolved to an [`Identity`] by an
//! external identity endpoint, cached for a fixed TTL, checked against the
//! mount's required scopes, and handed to handlers through request extensions.
//!
//! ```ignore
//! let pipeline = Arc::new(AuthPipeline::from_config(
//!     &AuthConfig::new(identity_url).with_required_scopes("write"),
//! )?);
//! let api = middleware::auth::access::apply(api, pipeline.clone());
//! // ... serve ...
//! pipeline.close();
//! ```
//!
//! [`Identity`]: services::auth::Identity

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;

pub use error::{AuthError, ErrorKind};
pub use services::auth::{AuthConfig, AuthPipeline, Identity, ScopeSet};
