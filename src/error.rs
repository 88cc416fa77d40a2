/*
 * Responsibility
 * - Auth pipeline error taxonomy (ErrorKind)
 * - The single ErrorKind -> HTTP status mapping (IntoResponse)
 * - JSON error body `{ "message": ... }` (+ `WWW-Authenticate` for missing credentials)
 */
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::auth::resolver::ResolveError;
use crate::services::auth::scope::{MissingScope, ScopeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingCredential,
    ResolutionFailed,
    MissingScope,
    InvalidConfiguration,
    Unclassified,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no token")]
    MissingCredential,
    #[error("{message}")]
    ResolutionFailed {
        upstream_status: Option<u16>,
        message: String,
    },
    #[error("missing scope {0}")]
    MissingScope(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("internal server error")]
    Internal,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingCredential => ErrorKind::MissingCredential,
            Self::ResolutionFailed { .. } => ErrorKind::ResolutionFailed,
            Self::MissingScope(_) => ErrorKind::MissingScope,
            Self::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
            Self::Internal => ErrorKind::Unclassified,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::MissingCredential | ErrorKind::ResolutionFailed => StatusCode::UNAUTHORIZED,
            ErrorKind::MissingScope => StatusCode::FORBIDDEN,
            ErrorKind::InvalidConfiguration | ErrorKind::Unclassified => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();

        // 5xx details stay in the log.
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "auth pipeline internal failure");
            "internal server error".to_owned()
        } else {
            self.to_string()
        };

        let mut resp = (status, Json(ErrorResponse { message })).into_response();
        if self.kind() == ErrorKind::MissingCredential {
            resp.headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        resp
    }
}

impl From<ResolveError> for AuthError {
    fn from(e: ResolveError) -> Self {
        Self::ResolutionFailed {
            upstream_status: e.upstream_status(),
            message: e.client_message(),
        }
    }
}

impl From<MissingScope> for AuthError {
    fn from(e: MissingScope) -> Self {
        Self::MissingScope(e.scope)
    }
}

impl From<ScopeError> for AuthError {
    fn from(e: ScopeError) -> Self {
        Self::InvalidConfiguration(e.to_string())
    }
}
