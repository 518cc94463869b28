//! AppRole session and metadata.
//!
//! Login, self-revocation, secret-id rotation, secret-id TTL and role name
//! lookup.

use crate::client::{Client, DEFAULT_APPROLE_MOUNT};
use crate::error::{Result, VaultError};
use crate::path::join_path;
use crate::transport::Transport;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::time::Duration;
use stepvault_events::register_secret;
use tracing::{debug, info};

const LOOKUP_SELF: &str = "auth/token/lookup-self";
const REVOKE_SELF: &str = "auth/token/revoke-self";

/// Prefix of service tokens issued by current servers.
pub const SERVICE_TOKEN_PREFIX: &str = "hvs.";

fn body<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

impl<T: Transport> Client<T> {
    fn app_role_path(&self, segments: &[&str]) -> String {
        let mount = match self.config().app_role_mount.trim() {
            "" => DEFAULT_APPROLE_MOUNT,
            mount => mount,
        };
        let mut all = vec![mount];
        all.extend_from_slice(segments);
        join_path(&all)
    }

    /// Exchange an AppRole pair for a session token and attach it.
    pub(crate) fn login(&self, role_id: &str, secret_id: &str) -> Result<()> {
        let path = self.app_role_path(&["login"]);
        let payload = body([
            ("role_id", Value::String(role_id.to_string())),
            ("secret_id", Value::String(secret_id.to_string())),
        ]);

        let token = self
            .write(&path, &payload)?
            .and_then(|response| response.auth)
            .map(|auth| auth.client_token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| VaultError::LoginFailed {
                role_id: role_id.to_string(),
            })?;

        self.attach_token(&token);
        info!(mount = %self.config().app_role_mount, "AppRole login succeeded");
        Ok(())
    }

    /// Revoke the session token. The client is unusable afterwards.
    ///
    /// # Errors
    ///
    /// Transport errors unchanged; the client stays usable when the
    /// revocation itself failed.
    pub fn revoke_token(&self) -> Result<()> {
        self.write(REVOKE_SELF, &Map::new())?;
        self.mark_revoked();
        info!("Session token revoked");
        Ok(())
    }

    /// Revoke the session token only when it is a service token (`hvs.`
    /// prefix). Returns whether a revocation happened.
    ///
    /// # Errors
    ///
    /// Errors of the lookup or the revocation.
    pub fn revoke_service_token(&self) -> Result<bool> {
        let id = self
            .read(LOOKUP_SELF)?
            .and_then(|response| response.data_str("id").map(str::to_string))
            .unwrap_or_default();
        if !id.starts_with(SERVICE_TOKEN_PREFIX) {
            debug!("Session token is not a service token, leaving it in place");
            return Ok(false);
        }
        self.revoke_token()?;
        Ok(true)
    }

    fn lookup_secret_id(&self, secret_id: &str, role_name: &str) -> Result<Option<Map<String, Value>>> {
        let path = self.app_role_path(&["role", role_name, "secret-id", "lookup"]);
        let payload = body([("secret_id", Value::String(secret_id.to_string()))]);
        Ok(self.write(&path, &payload)?.and_then(|response| response.data))
    }

    /// Rotate the secret-id of `role_name`.
    ///
    /// Looks up `secret_id` (proving ownership and fetching its metadata),
    /// mints a new secret-id carrying the same metadata, and returns it. No
    /// mint is attempted when the lookup fails.
    ///
    /// # Errors
    ///
    /// [`VaultError::RotateFailed`] naming the role, with the failing
    /// request's error as source when there is one.
    pub fn generate_new_secret_id(&self, secret_id: &str, role_name: &str) -> Result<String> {
        let info = self
            .lookup_secret_id(secret_id, role_name)
            .map_err(|e| VaultError::rotate(role_name, "secret-id lookup failed", Some(e)))?
            .ok_or_else(|| VaultError::rotate(role_name, "secret-id lookup returned no data", None))?;

        let metadata = info.get("metadata").cloned().unwrap_or(Value::Null);
        let encoded = serde_json::to_string(&metadata)
            .map_err(|e| VaultError::rotate(role_name, format!("could not encode metadata: {e}"), None))?;

        let path = self.app_role_path(&["role", role_name, "secret-id"]);
        let payload = body([("metadata", Value::String(encoded))]);
        let response = self
            .write(&path, &payload)
            .map_err(|e| VaultError::rotate(role_name, "secret-id mint failed", Some(e)))?;

        let new_secret_id = response
            .as_ref()
            .and_then(|r| r.data_str("secret_id"))
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                VaultError::rotate(
                    role_name,
                    format!("response for path {path} did not contain a new secret-id"),
                    None,
                )
            })?;

        register_secret(new_secret_id.clone());
        info!(role = %role_name, "Rotated AppRole secret-id");
        Ok(new_secret_id)
    }

    /// Remaining lifetime of `secret_id`; zero once expired.
    ///
    /// # Errors
    ///
    /// Lookup errors unchanged, [`VaultError::TtlUnknown`] when the lookup
    /// has no `expiration_time`, [`VaultError::Decode`] when it is not
    /// RFC 3339.
    pub fn secret_id_ttl(&self, secret_id: &str, role_name: &str) -> Result<Duration> {
        let info = self.lookup_secret_id(secret_id, role_name)?;
        let expiration = info
            .as_ref()
            .and_then(|data| data.get("expiration_time"))
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| VaultError::TtlUnknown {
                role: role_name.to_string(),
            })?;

        let expires_at = DateTime::parse_from_rfc3339(expiration)
            .map_err(|e| {
                VaultError::decode(
                    self.app_role_path(&["role", role_name, "secret-id", "lookup"]),
                    format!("invalid expiration_time '{expiration}': {e}"),
                )
            })?
            .with_timezone(&Utc);

        Ok(remaining(expires_at, Utc::now()))
    }

    /// Role name stored in the session token's metadata.
    ///
    /// Returns an empty string when `role_name` is absent or not a string.
    ///
    /// # Errors
    ///
    /// [`VaultError::TokenMetadataMissing`] when the token has no `meta`,
    /// [`VaultError::Decode`] when the lookup is empty or `meta` is not a
    /// map.
    pub fn app_role_name(&self) -> Result<String> {
        let data = self
            .read(LOOKUP_SELF)?
            .and_then(|response| response.data)
            .ok_or_else(|| VaultError::decode(LOOKUP_SELF, "token lookup returned no data"))?;

        match data.get("meta") {
            None | Some(Value::Null) => Err(VaultError::TokenMetadataMissing),
            Some(Value::Object(meta)) => Ok(meta
                .get("role_name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()),
            Some(_) => Err(VaultError::decode(LOOKUP_SELF, "token metadata is not a map")),
        }
    }
}

fn remaining(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (expires_at - now).to_std().unwrap_or(Duration::ZERO)
}
