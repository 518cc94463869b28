//! Process-wide secret redaction.
//!
//! Every token, secret-id or credential value the client learns about is
//! registered here. The log writer installed by [`crate::init_tracing`] runs
//! every formatted line through [`redact`] before it reaches the terminal.

use std::collections::HashSet;
use std::sync::{LazyLock, RwLock};

/// Minimum secret length to redact (shorter secrets may cause false positives)
pub const MIN_SECRET_LENGTH: usize = 4;

/// Placeholder for redacted secrets
pub const REDACTED_PLACEHOLDER: &str = "****";

static SECRET_REGISTRY: LazyLock<RwLock<HashSet<String>>> =
    LazyLock::new(|| RwLock::new(HashSet::new()));

fn insert_with_variants(registry: &mut HashSet<String>, secret: String) {
    if secret.len() < MIN_SECRET_LENGTH {
        return;
    }
    // Secrets often end up in URLs (query strings, basic-auth userinfo).
    let encoded = urlencoding::encode(&secret).into_owned();
    if encoded != secret {
        registry.insert(encoded);
    }
    registry.insert(secret);
}

/// Register a secret value for redaction.
///
/// The URL-encoded form of the value is registered as well when it differs.
/// Secrets shorter than `MIN_SECRET_LENGTH` are ignored.
///
/// # Example
///
/// ```rust
/// use stepvault_events::redaction::{redact, register_secret};
///
/// register_secret("hvs.CAESIJ-example");
/// assert_eq!(redact("token=hvs.CAESIJ-example"), "token=****");
/// ```
pub fn register_secret(secret: impl Into<String>) {
    if let Ok(mut registry) = SECRET_REGISTRY.write() {
        insert_with_variants(&mut registry, secret.into());
    }
}

/// Register multiple secrets at once.
pub fn register_secrets(secrets: impl IntoIterator<Item = impl Into<String>>) {
    if let Ok(mut registry) = SECRET_REGISTRY.write() {
        for secret in secrets {
            insert_with_variants(&mut registry, secret.into());
        }
    }
}

/// Redact all registered secrets from a string.
///
/// Longer secrets are replaced first so that a secret containing another
/// registered secret is masked as a whole.
#[must_use]
pub fn redact(input: &str) -> String {
    let secrets = match SECRET_REGISTRY.read() {
        Ok(registry) => registry.clone(),
        Err(_) => return input.to_string(),
    };

    if secrets.is_empty() {
        return input.to_string();
    }

    let mut sorted: Vec<_> = secrets.into_iter().collect();
    sorted.sort_by_key(|s| std::cmp::Reverse(s.len()));

    let mut result = input.to_string();
    for secret in &sorted {
        result = result.replace(secret, REDACTED_PLACEHOLDER);
    }
    result
}

/// Check if any secrets are registered.
#[must_use]
pub fn has_secrets() -> bool {
    SECRET_REGISTRY
        .read()
        .map(|r| !r.is_empty())
        .unwrap_or(false)
}

/// Get the number of registered redaction patterns (encoded variants included).
#[must_use]
pub fn secret_count() -> usize {
    SECRET_REGISTRY.read().map(|r| r.len()).unwrap_or(0)
}

/// Clear all registered secrets.
#[cfg(test)]
pub fn clear_secrets() {
    if let Ok(mut registry) = SECRET_REGISTRY.write() {
        registry.clear();
    }
}
