//! KV mount introspection.

use crate::error::{Result, VaultError};
use crate::path::{join_path, normalize_path};
use crate::transport::Transport;
use serde_json::{Map, Value};
use tracing::debug;

const MOUNTS_ENDPOINT: &str = "sys/internal/ui/mounts";

/// Storage layout of a KV mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KvVersion {
    /// Flat layout, wire path equals logical path.
    V1,
    /// Versioned layout, `/data/` infix after the mount.
    V2,
}

/// A resolved mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    /// Mount prefix, normalised (no trailing slash).
    pub path: String,
    /// Engine version.
    pub version: KvVersion,
}

impl MountInfo {
    /// Wire path for a normalised logical path under this mount.
    ///
    /// v2: `{mount}/data/{rest}`, or `{mount}/data` for the mount itself.
    /// v1: unchanged.
    #[must_use]
    pub fn wire_path(&self, logical: &str) -> String {
        match self.version {
            KvVersion::V1 => logical.to_string(),
            KvVersion::V2 => {
                let prefix = format!("{}/", self.path);
                let rest = if logical == self.path {
                    ""
                } else {
                    logical.strip_prefix(&prefix).unwrap_or(logical)
                };
                join_path(&[&self.path, "data", rest])
            }
        }
    }
}

/// Ask the server which mount covers `path` and which KV version it runs.
///
/// # Errors
///
/// [`VaultError::MountUnknown`] when the response is empty or has no `path`,
/// [`VaultError::VersionUnsupported`] when `options.version` is not 1 or 2,
/// plus any transport error unchanged.
pub fn resolve_mount<T: Transport + ?Sized>(transport: &T, path: &str) -> Result<MountInfo> {
    let path = normalize_path(path);
    let endpoint = join_path(&[MOUNTS_ENDPOINT, &path]);
    let unknown = || VaultError::MountUnknown { path: path.clone() };

    let response = transport.read(&endpoint)?.ok_or_else(unknown)?;
    let data = response.data.as_ref().ok_or_else(unknown)?;
    let mount = data
        .get("path")
        .and_then(Value::as_str)
        .map(normalize_path)
        .filter(|mount| !mount.is_empty())
        .ok_or_else(unknown)?;

    let version = engine_version(&mount, data)?;
    debug!(path = %path, mount = %mount, version = ?version, "Resolved mount");
    Ok(MountInfo {
        path: mount,
        version,
    })
}

fn engine_version(mount: &str, data: &Map<String, Value>) -> Result<KvVersion> {
    let raw = match data.get("options") {
        None | Some(Value::Null) => return Ok(KvVersion::V1),
        Some(Value::Object(options)) => match options.get("version") {
            None | Some(Value::Null) => return Ok(KvVersion::V1),
            Some(Value::String(v)) if v.trim().is_empty() => return Ok(KvVersion::V1),
            Some(Value::String(v)) => v.trim().to_string(),
            Some(other) => other.to_string(),
        },
        // An options value that is not a map carries no version.
        Some(_) => return Ok(KvVersion::V1),
    };

    match raw.parse::<i64>() {
        Ok(1) => Ok(KvVersion::V1),
        Ok(2) => Ok(KvVersion::V2),
        _ => Err(VaultError::VersionUnsupported {
            mount: mount.to_string(),
            version: raw,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::mock::MockTransport;
    use serde_json::json;

    fn mounts(path: &str, data: Value) -> MockTransport {
        MockTransport::new().on_read(&format!("sys/internal/ui/mounts/{path}"), json!({ "data": data }))
    }

    #[test]
    fn test_v2_mount() {
        let transport = mounts("secret/test", json!({"path": "secret/", "options": {"version": "2"}}));
        let info = resolve_mount(&transport, "secret/test").unwrap();
        assert_eq!(info.path, "secret");
        assert_eq!(info.version, KvVersion::V2);
        assert_eq!(transport.paths(), vec!["read sys/internal/ui/mounts/secret/test"]);
    }

    #[test]
    fn test_no_options_is_v1() {
        let transport = mounts("kv/app", json!({"path": "kv/"}));
        assert_eq!(resolve_mount(&transport, "kv/app").unwrap().version, KvVersion::V1);
    }

    #[test]
    fn test_null_options_is_v1() {
        let transport = mounts("kv/app", json!({"path": "kv/", "options": null}));
        assert_eq!(resolve_mount(&transport, "kv/app").unwrap().version, KvVersion::V1);
    }

    #[test]
    fn test_empty_version_is_v1() {
        let transport = mounts("kv/app", json!({"path": "kv/", "options": {"version": ""}}));
        assert_eq!(resolve_mount(&transport, "kv/app").unwrap().version, KvVersion::V1);

        let transport = mounts("kv/app", json!({"path": "kv/", "options": {}}));
        assert_eq!(resolve_mount(&transport, "kv/app").unwrap().version, KvVersion::V1);
    }

    #[test]
    fn test_version_three_unsupported() {
        let transport = mounts("secret/test", json!({"path": "secret/", "options": {"version": "3"}}));
        let err = resolve_mount(&transport, "secret/test").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VersionUnsupported);
        let msg = err.to_string();
        assert!(msg.contains('3'));
        assert!(msg.contains("not supported"));
    }

    #[test]
    fn test_non_numeric_version_unsupported() {
        let transport = mounts("secret/test", json!({"path": "secret/", "options": {"version": "two"}}));
        let err = resolve_mount(&transport, "secret/test").unwrap_err();
        assert!(matches!(err, VaultError::VersionUnsupported { ref version, .. } if version == "two"));
    }

    #[test]
    fn test_numeric_json_version() {
        let transport = mounts("secret/test", json!({"path": "secret/", "options": {"version": 2}}));
        assert_eq!(resolve_mount(&transport, "secret/test").unwrap().version, KvVersion::V2);
    }

    #[test]
    fn test_empty_response_is_mount_unknown() {
        let transport = MockTransport::new();
        let err = resolve_mount(&transport, "nowhere/x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MountUnknown);
    }

    #[test]
    fn test_missing_path_is_mount_unknown() {
        let transport = mounts("secret/test", json!({"options": {"version": "2"}}));
        let err = resolve_mount(&transport, "secret/test").unwrap_err();
        assert!(matches!(err, VaultError::MountUnknown { ref path } if path == "secret/test"));
    }

    #[test]
    fn test_transport_error_propagates() {
        let transport = MockTransport::new().on_read_error("sys/internal/ui/mounts/secret/x", 403, "permission denied");
        let err = resolve_mount(&transport, "secret/x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Server);
    }

    #[test]
    fn test_wire_path_v2() {
        let mount = MountInfo {
            path: "secret".to_string(),
            version: KvVersion::V2,
        };
        assert_eq!(mount.wire_path("secret/test"), "secret/data/test");
        assert_eq!(mount.wire_path("secret/a/b"), "secret/data/a/b");
        assert_eq!(mount.wire_path("secret"), "secret/data");
    }

    #[test]
    fn test_wire_path_nested_mount() {
        let mount = MountInfo {
            path: "team/kv".to_string(),
            version: KvVersion::V2,
        };
        assert_eq!(mount.wire_path("team/kv/app/db"), "team/kv/data/app/db");
    }

    #[test]
    fn test_wire_path_v1_passthrough() {
        let mount = MountInfo {
            path: "kv".to_string(),
            version: KvVersion::V1,
        };
        assert_eq!(mount.wire_path("kv/app"), "kv/app");
    }
}
