//! Credential extraction from the `Authorization` header.
//!
//! Accepted shapes:
//! - `Bearer <token>`        -> `<token>` (scheme is matched case-sensitively)
//! - `Basic base64(u:token)` -> `<token>`; any other decoded shape is treated as absent
//! - anything else           -> passed through as a raw token
//!
//! Extraction never fails hard: an unusable header is the same as no header.

use axum::http::{HeaderMap, header};
use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use sha2::{Digest, Sha256};

pub const BEARER_SCHEME: &str = "Bearer";
pub const BASIC_SCHEME: &str = "Basic";

/// Pull the credential out of request headers.
pub fn extract(headers: &HeaderMap) -> Option<String> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())?;

    let credential = parse_authorization(raw);
    if let Some(credential) = &credential {
        tracing::trace!(credential = %fingerprint(credential), "credential extracted");
    }
    credential
}

/// Normalize a raw `Authorization` header value into a credential.
pub fn parse_authorization(raw: &str) -> Option<String> {
    let credential = if let Some(rest) = raw.strip_prefix(BEARER_SCHEME) {
        rest.trim().to_owned()
    } else if let Some(rest) = raw.strip_prefix(BASIC_SCHEME) {
        basic_secret(rest.trim())?
    } else {
        raw.to_owned()
    };

    // An empty string is not a credential (e.g. `Authorization: Bearer `).
    (!credential.is_empty()).then_some(credential)
}

// `username:secret` with exactly one delimiter; the secret half is the credential.
fn basic_secret(encoded: &str) -> Option<String> {
    let decoded = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;

    let mut parts = decoded.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_user), Some(secret), None) => Some(secret.to_owned()),
        _ => None,
    }
}

/// Short, non-reversible tag for log correlation. Raw credentials are never logged.
pub fn fingerprint(credential: &str) -> String {
    let digest = Sha256::digest(credential.as_bytes());
    URL_SAFE_NO_PAD.encode(&digest[..6])
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn basic(payload: &str) -> String {
        format!("Basic {}", STANDARD.encode(payload))
    }

    #[test]
    fn missing_header_is_no_credential() {
        assert_eq!(extract(&HeaderMap::new()), None);
    }

    #[test]
    fn bearer_scheme_is_stripped() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer T"));
        assert_eq!(extract(&headers).as_deref(), Some("T"));
    }

    #[test]
    fn bearer_surrounding_whitespace_is_trimmed() {
        assert_eq!(parse_authorization("Bearer   abc  ").as_deref(), Some("abc"));
    }

    #[test]
    fn bearer_without_token_is_no_credential() {
        assert_eq!(parse_authorization("Bearer "), None);
        assert_eq!(parse_authorization("Bearer"), None);
    }

    #[test]
    fn bearer_scheme_match_is_case_sensitive() {
        // Not the scheme, so the whole value is the raw token.
        assert_eq!(
            parse_authorization("bearer abc").as_deref(),
            Some("bearer abc")
        );
    }

    #[test]
    fn basic_yields_secret_half() {
        assert_eq!(parse_authorization(&basic("u:T")).as_deref(), Some("T"));
    }

    #[test]
    fn basic_without_colon_is_no_credential() {
        assert_eq!(parse_authorization(&basic("justatoken")), None);
    }

    #[test]
    fn basic_with_extra_colons_is_no_credential() {
        assert_eq!(parse_authorization(&basic("u:T:x")), None);
    }

    #[test]
    fn basic_with_invalid_base64_is_no_credential() {
        assert_eq!(parse_authorization("Basic !!!not-base64"), None);
    }

    #[test]
    fn basic_with_empty_secret_is_no_credential() {
        assert_eq!(parse_authorization(&basic("u:")), None);
    }

    #[test]
    fn raw_value_passes_through() {
        assert_eq!(parse_authorization("helloworld").as_deref(), Some("helloworld"));
    }

    #[test]
    fn fingerprint_is_stable_and_does_not_contain_credential() {
        let a = fingerprint("helloworld");
        assert_eq!(a, fingerprint("helloworld"));
        assert_ne!(a, fingerprint("helloworld2"));
        assert!(!a.contains("helloworld"));
        assert_eq!(a.len(), 8);
    }
}
