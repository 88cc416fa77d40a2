/*
 * Responsibility
 * - The resolved principal that the auth middleware hands to handlers
 * - Keeps the identity endpoint's JSON object as-is and overlays
 *   `uid` / `access_token` / `cached`
 * - Scope normalization entry point (`scopes` field)
 */
use serde::Serialize;
use serde_json::{Map, Value};

use crate::services::auth::scope::{ScopeError, ScopeSet};

/// Fields the middleware owns. Upstream values under these names are dropped.
const RESERVED_FIELDS: [&str; 3] = ["uid", "access_token", "cached"];

/// Resolved principal attached to a request.
///
/// - `fields` is the identity endpoint's response object (minus reserved names)
/// - `uid` mirrors the upstream `id` (or `sub`) for caller convenience
/// - `cached` is per-access: set on cache-hit copies only, never stored as `true`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    #[serde(flatten)]
    fields: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uid: Option<Value>,
    access_token: String,
    cached: bool,
}

impl Identity {
    pub fn from_fields(mut fields: Map<String, Value>, credential: &str) -> Self {
        for name in RESERVED_FIELDS {
            fields.remove(name);
        }

        let uid = fields
            .get("id")
            .or_else(|| fields.get("sub"))
            .filter(|v| !v.is_null())
            .cloned();

        Self {
            fields,
            uid,
            access_token: credential.to_owned(),
            cached: false,
        }
    }

    pub fn uid(&self) -> Option<&Value> {
        self.uid.as_ref()
    }

    /// Display/login name: `login`, falling back to `name`.
    pub fn login(&self) -> Option<&str> {
        self.field("login")
            .or_else(|| self.field("name"))
            .and_then(Value::as_str)
    }

    /// The credential this identity was resolved from.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn is_from_cache(&self) -> bool {
        self.cached
    }

    /// A field of the upstream response, by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Handlers own their copy, so mutating it never reaches the cache.
    pub fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.fields
    }

    /// Granted scopes, normalized (absent -> empty, string -> singleton).
    pub fn scopes(&self) -> Result<ScopeSet, ScopeError> {
        ScopeSet::from_value(self.field("scopes"))
    }

    pub(crate) fn into_stored(mut self) -> Self {
        self.cached = false;
        self
    }

    pub(crate) fn into_cached(mut self) -> Self {
        self.cached = true;
        self
    }
}
