//! Step parameters backed by secrets.
//!
//! A step parameter (say `password`) may be declared as a secret reference.
//! The value is then looked up in a fixed list of search paths built from the
//! step configuration:
//!
//! 1. `{vaultPath}/{secret}`
//! 2. `{vaultBasePath}/{vaultPipelineName}/{secret}`
//! 3. `{vaultBasePath}/GROUP-SECRETS/{secret}`
//!
//! The first secret that carries the parameter name (or one of its aliases)
//! wins. Read failures are logged and the next path is tried.

use crate::{SecretStore, SecureSecret};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use stepvault_events::register_secret;
use tracing::{debug, info, warn};

/// Folder under the base path holding secrets shared by every pipeline.
pub const GROUP_SECRETS: &str = "GROUP-SECRETS";

/// Search path configuration, deserialized from step configuration keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceConfig {
    /// Team or project folder searched first.
    #[serde(default)]
    pub vault_path: Option<String>,
    /// Root folder for pipeline and group secrets.
    #[serde(default)]
    pub vault_base_path: Option<String>,
    /// Pipeline folder below the base path.
    #[serde(default)]
    pub vault_pipeline_name: Option<String>,
    /// Keep values that are already set instead of replacing them.
    #[serde(default)]
    pub vault_disable_overwrite: bool,
}

impl ReferenceConfig {
    /// Configuration searching a single folder.
    #[must_use]
    pub fn with_vault_path(path: impl Into<String>) -> Self {
        Self {
            vault_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Paths probed for `secret_name`, in order.
    ///
    /// Entries whose configuration keys are missing or blank are left out, so
    /// an empty configuration yields no paths at all.
    #[must_use]
    pub fn search_paths(&self, secret_name: &str) -> Vec<String> {
        let mut paths = Vec::new();
        if let Some(vault_path) = non_blank(self.vault_path.as_deref()) {
            paths.push(join(&[vault_path, secret_name]));
        }
        if let Some(base) = non_blank(self.vault_base_path.as_deref()) {
            if let Some(pipeline) = non_blank(self.vault_pipeline_name.as_deref()) {
                paths.push(join(&[base, pipeline, secret_name]));
            }
            paths.push(join(&[base, GROUP_SECRETS, secret_name]));
        }
        paths
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn join(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|s| s.trim().trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// A step parameter whose value comes from a secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretReference {
    /// Parameter name; also the field name looked up inside the secret.
    pub parameter: String,
    /// Alternative field names accepted inside the secret.
    pub aliases: Vec<String>,
    /// Default secret name appended to each search path.
    pub secret_name: String,
    /// Configuration key that may override `secret_name`.
    pub name_key: Option<String>,
}

impl SecretReference {
    /// Reference whose secret is named like the parameter.
    #[must_use]
    pub fn new(parameter: impl Into<String>) -> Self {
        let parameter = parameter.into();
        Self {
            secret_name: parameter.clone(),
            parameter,
            aliases: Vec::new(),
            name_key: None,
        }
    }

    /// Add an accepted alias.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Use a different default secret name.
    #[must_use]
    pub fn with_secret_name(mut self, name: impl Into<String>) -> Self {
        self.secret_name = name.into();
        self
    }

    /// Allow `key` in the step configuration to override the secret name.
    #[must_use]
    pub fn with_name_key(mut self, key: impl Into<String>) -> Self {
        self.name_key = Some(key.into());
        self
    }

    fn effective_secret_name<'a>(&'a self, params: &'a HashMap<String, String>) -> &'a str {
        self.name_key
            .as_ref()
            .and_then(|key| params.get(key))
            .map(String::as_str)
            .and_then(|name| non_blank(Some(name)))
            .unwrap_or(&self.secret_name)
    }

    fn lookup(&self, fields: &HashMap<String, String>) -> Option<String> {
        std::iter::once(&self.parameter)
            .chain(self.aliases.iter())
            .find_map(|name| fields.get(name))
            .cloned()
    }
}

/// Resolve one reference.
///
/// `existing` is the value already configured for the parameter. Returns
/// `None` when the existing value must be kept or no search path yields a
/// value. The store is never queried when overwrite is disabled and a value is
/// already present.
pub fn resolve_reference<S: SecretStore + ?Sized>(
    store: &S,
    config: &ReferenceConfig,
    reference: &SecretReference,
    existing: Option<&str>,
) -> Option<SecureSecret> {
    resolve_named(store, config, reference, &reference.secret_name, existing)
}

fn resolve_named<S: SecretStore + ?Sized>(
    store: &S,
    config: &ReferenceConfig,
    reference: &SecretReference,
    secret_name: &str,
    existing: Option<&str>,
) -> Option<SecureSecret> {
    if config.vault_disable_overwrite && existing.is_some_and(|v| !v.is_empty()) {
        debug!(
            parameter = %reference.parameter,
            "Keeping preset value, overwriting from the secret store is disabled"
        );
        return None;
    }

    for path in config.search_paths(secret_name) {
        match store.read_kv(&path) {
            Ok(Some(fields)) => {
                if let Some(value) = reference.lookup(&fields) {
                    register_secret(value.clone());
                    info!(parameter = %reference.parameter, path = %path, "Resolved parameter from secret store");
                    return Some(SecureSecret::new(value));
                }
                debug!(parameter = %reference.parameter, path = %path, "Secret has no matching field");
            }
            Ok(None) => debug!(path = %path, "No secret stored"),
            Err(e) => {
                warn!(parameter = %reference.parameter, path = %path, error = %e, "Skipping unreadable secret path");
            }
        }
    }
    None
}

/// Resolve every reference against the step parameters in `params`.
///
/// Returns the parameters that received a value. Name overrides
/// ([`SecretReference::with_name_key`]) are read from `params`.
pub fn resolve_all<S: SecretStore + ?Sized>(
    store: &S,
    config: &ReferenceConfig,
    references: &[SecretReference],
    params: &HashMap<String, String>,
) -> HashMap<String, SecureSecret> {
    references
        .iter()
        .filter_map(|reference| {
            let secret_name = reference.effective_secret_name(params);
            let existing = params.get(&reference.parameter).map(String::as_str);
            resolve_named(store, config, reference, secret_name, existing)
                .map(|value| (reference.parameter.clone(), value))
        })
        .collect()
}
