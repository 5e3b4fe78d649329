//! Credential substitution for flow definitions
//!
//! Flow documents reference secrets with `${{ secrets.NAME }}` markers, and
//! some carry empty credential fields (`api_key: ""`) that are filled in at
//! deploy time. Both forms resolve against the environment-backed store
//! before the document is transmitted. An unresolved secret substitutes an
//! empty value with a warning; on the server an empty secret looks the same
//! as an unset one, so it must not block the rest of the document.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::warn;

static SECRET_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{\{\s*secrets\.([A-Za-z0-9_]+)\s*\}\}").unwrap());

/// Credential field names that are filled when present with an empty value.
static EMPTY_CREDENTIAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^(\s*)(api_key|apiKey|token|password|authToken):\s*(?:""|'')\s*$"#).unwrap()
});

const ENV_PREFIX: &str = "KESTRA_SECRET_";

/// Read-only, process-wide secret store backed by environment variables.
///
/// A key resolves first as `KESTRA_SECRET_<KEY>`, then as plain `<KEY>`.
#[derive(Debug, Clone, Default)]
pub struct SecretStore;

impl SecretStore {
    pub fn from_env() -> Self {
        Self
    }

    pub fn resolve(&self, key: &str) -> Option<String> {
        std::env::var(format!("{}{}", ENV_PREFIX, key))
            .or_else(|_| std::env::var(key))
            .ok()
    }

    /// Replace all secret markers and empty credential fields in a flow
    /// document. Non-fatal: unresolved keys become empty values.
    pub fn substitute(&self, source: &str) -> String {
        let pass = SECRET_MARKER.replace_all(source, |caps: &Captures| {
            let key = &caps[1];
            match self.resolve(key) {
                Some(value) => value,
                None => {
                    warn!(key, "secret not found; substituting empty value");
                    String::new()
                }
            }
        });

        EMPTY_CREDENTIAL
            .replace_all(&pass, |caps: &Captures| {
                let indent = &caps[1];
                let field = &caps[2];
                let key = field_secret_key(field);
                match self.resolve(&key) {
                    Some(value) => format!("{}{}: \"{}\"", indent, field, value),
                    None => {
                        warn!(field, "no secret for empty credential field");
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }
}

/// `apiKey` and `api_key` both resolve under `API_KEY`.
fn field_secret_key(field: &str) -> String {
    let mut key = String::with_capacity(field.len() + 2);
    for ch in field.chars() {
        if ch.is_ascii_uppercase() {
            key.push('_');
            key.push(ch);
        } else {
            key.push(ch.to_ascii_uppercase());
        }
    }
    key
}
