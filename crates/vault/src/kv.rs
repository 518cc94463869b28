//! KV v1/v2 accessor.

use crate::client::Client;
use crate::error::{Result, VaultError};
use crate::mounts::KvVersion;
use crate::path::normalize_path;
use crate::transport::Transport;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

impl<T: Transport> Client<T> {
    /// Read the secret at logical `path`.
    ///
    /// `Ok(None)` when nothing is stored there. Only string fields are
    /// returned; any other field is dropped.
    ///
    /// # Errors
    ///
    /// Mount resolution errors, transport errors, and [`VaultError::Decode`]
    /// when a v2 response lacks its `data` wrapper.
    pub fn read_kv_secret(&self, path: &str) -> Result<Option<HashMap<String, String>>> {
        let path = normalize_path(path);
        let mount = self.mount_for(&path)?;
        let wire_path = mount.wire_path(&path);
        debug!(path = %path, wire_path = %wire_path, version = ?mount.version, "Reading KV secret");

        let Some(response) = self.read(&wire_path)? else {
            return Ok(None);
        };

        let fields = match mount.version {
            KvVersion::V1 => response.data.unwrap_or_default(),
            KvVersion::V2 => {
                let mut data = response.data.unwrap_or_default();
                match data.remove("data") {
                    Some(Value::Object(fields)) => fields,
                    Some(Value::Null) | None => {
                        return Err(VaultError::decode(&wire_path, "missing 'data' field in response"));
                    }
                    Some(other) => {
                        return Err(VaultError::decode(
                            &wire_path,
                            format!("'data' field is not a map: {other}"),
                        ));
                    }
                }
            }
        };

        Ok(Some(string_fields(&wire_path, fields)))
    }

    /// Write `fields` to logical `path` as a plain upsert.
    ///
    /// The server decides versioning on v2 mounts; existing keys not present
    /// in `fields` are not carried over (see [`Client::merge_kv_secret`]).
    ///
    /// # Errors
    ///
    /// Mount resolution and transport errors.
    pub fn write_kv_secret(&self, path: &str, fields: &HashMap<String, String>) -> Result<()> {
        let path = normalize_path(path);
        let mount = self.mount_for(&path)?;
        let wire_path = mount.wire_path(&path);

        let payload: Map<String, Value> = fields
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        let body = match mount.version {
            KvVersion::V1 => payload,
            KvVersion::V2 => Map::from_iter([("data".to_string(), Value::Object(payload))]),
        };

        debug!(path = %path, wire_path = %wire_path, keys = fields.len(), "Writing KV secret");
        self.write(&wire_path, &body)?;
        Ok(())
    }

    /// Read the current secret, overlay `fields`, and write the union back.
    ///
    /// Returns the merged field set.
    ///
    /// # Errors
    ///
    /// Errors of the read or the write.
    pub fn merge_kv_secret(
        &self,
        path: &str,
        fields: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>> {
        let mut merged = self.read_kv_secret(path)?.unwrap_or_default();
        merged.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.write_kv_secret(path, &merged)?;
        Ok(merged)
    }
}

fn string_fields(wire_path: &str, fields: Map<String, Value>) -> HashMap<String, String> {
    fields
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::String(s) => Some((key, s)),
            _ => {
                debug!(wire_path = %wire_path, key = %key, "Dropping non-string secret field");
                None
            }
        })
        .collect()
}
