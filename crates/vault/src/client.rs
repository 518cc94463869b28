//! Client construction, session state and the mount cache.

use crate::error::{Result, VaultError};
use crate::mounts::{MountInfo, resolve_mount};
use crate::path::normalize_path;
use crate::transport::{HttpTransport, Transport, VaultResponse};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use stepvault_events::register_secret;
use stepvault_secrets::{SecretError, SecretStore, SecureSecret};
use tracing::debug;

/// Default server address.
pub const DEFAULT_ADDRESS: &str = "http://127.0.0.1:8200";

/// Default mount of the AppRole auth method.
pub const DEFAULT_APPROLE_MOUNT: &str = "auth/approle";

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

fn default_approle_mount() -> String {
    DEFAULT_APPROLE_MOUNT.to_string()
}

/// Client configuration.
///
/// Deserializes from camelCase keys, e.g.
/// `{"address": "https://vault:8200", "namespace": "team", "cacheMounts": true}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Server base URL.
    #[serde(default = "default_address")]
    pub address: String,
    /// Namespace sent with every request.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Mount of the AppRole auth method.
    #[serde(default = "default_approle_mount")]
    pub app_role_mount: String,
    /// Cache mount introspection results per path.
    #[serde(default)]
    pub cache_mounts: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            namespace: None,
            app_role_mount: default_approle_mount(),
            cache_mounts: false,
        }
    }
}

impl ClientConfig {
    /// Configuration from `VAULT_ADDR`, `VAULT_NAMESPACE` and
    /// `VAULT_APPROLE_MOUNT`, falling back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let var = |name: &str| {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            address: var("VAULT_ADDR").unwrap_or_else(default_address),
            namespace: var("VAULT_NAMESPACE"),
            app_role_mount: var("VAULT_APPROLE_MOUNT").unwrap_or_else(default_approle_mount),
            cache_mounts: false,
        }
    }
}

/// How the client authenticates.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// A ready session token.
    Token(SecureSecret),
    /// AppRole pair, exchanged for a token at construction.
    AppRole {
        /// Stable role id
        role_id: String,
        /// Rotatable secret id
        secret_id: SecureSecret,
    },
}

/// Secrets client.
///
/// Holds one session token. After [`Client::revoke_token`] every call fails
/// with [`VaultError::Transport`] without reaching the server; construct a new
/// client instead.
pub struct Client<T: Transport = HttpTransport> {
    transport: T,
    config: ClientConfig,
    revoked: AtomicBool,
    mounts: Mutex<HashMap<String, MountInfo>>,
}

impl Client<HttpTransport> {
    /// Connect over HTTP and authenticate.
    ///
    /// # Errors
    ///
    /// Transport construction errors, and for AppRole credentials any login
    /// error (see [`Client::with_transport`]).
    pub fn connect(config: ClientConfig, credentials: &Credentials) -> Result<Self> {
        let transport = HttpTransport::new(&config.address)?;
        Self::with_transport(transport, config, credentials)
    }
}

impl<T: Transport> Client<T> {
    /// Build a client over `transport` and authenticate.
    ///
    /// A token is attached as is. An AppRole pair is logged in immediately;
    /// a failed login yields no client.
    ///
    /// # Errors
    ///
    /// [`VaultError::LoginFailed`] when the login response has no token, or
    /// the login request's own error.
    pub fn with_transport(transport: T, config: ClientConfig, credentials: &Credentials) -> Result<Self> {
        if let Some(namespace) = config.namespace.as_deref() {
            transport.set_namespace(Some(namespace));
        }
        let client = Self {
            transport,
            config,
            revoked: AtomicBool::new(false),
            mounts: Mutex::new(HashMap::new()),
        };
        match credentials {
            Credentials::Token(token) => client.attach_token(token.expose()),
            Credentials::AppRole { role_id, secret_id } => {
                client.login(role_id, secret_id.expose())?;
            }
        }
        Ok(client)
    }

    /// Client authenticated with a token.
    ///
    /// # Errors
    ///
    /// Never fails today; kept fallible to mirror [`Client::with_app_role`].
    pub fn with_token(transport: T, config: ClientConfig, token: &str) -> Result<Self> {
        Self::with_transport(transport, config, &Credentials::Token(SecureSecret::from(token)))
    }

    /// Client authenticated through an AppRole login.
    ///
    /// # Errors
    ///
    /// See [`Client::with_transport`].
    pub fn with_app_role(
        transport: T,
        config: ClientConfig,
        role_id: &str,
        secret_id: &str,
    ) -> Result<Self> {
        let credentials = Credentials::AppRole {
            role_id: role_id.to_string(),
            secret_id: SecureSecret::from(secret_id),
        };
        Self::with_transport(transport, config, &credentials)
    }

    /// The underlying transport.
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// The configuration this client was built with.
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Whether the session token was revoked.
    pub fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::SeqCst)
    }

    /// Switch namespace for every following request.
    pub fn set_namespace(&self, namespace: Option<&str>) {
        self.transport.set_namespace(namespace);
        self.invalidate_mounts();
    }

    /// Raw read of `path` (normalised, no mount rewriting).
    ///
    /// # Errors
    ///
    /// Transport errors unchanged.
    pub fn read_secret(&self, path: &str) -> Result<Option<VaultResponse>> {
        self.read(&normalize_path(path))
    }

    pub(crate) fn attach_token(&self, token: &str) {
        register_secret(token);
        self.transport.set_token(token);
        self.invalidate_mounts();
    }

    pub(crate) fn mark_revoked(&self) {
        self.revoked.store(true, Ordering::SeqCst);
        self.invalidate_mounts();
    }

    fn ensure_live(&self, path: &str) -> Result<()> {
        if self.is_revoked() {
            return Err(VaultError::transport(path, "session token has been revoked"));
        }
        Ok(())
    }

    pub(crate) fn read(&self, path: &str) -> Result<Option<VaultResponse>> {
        self.ensure_live(path)?;
        self.transport.read(path)
    }

    pub(crate) fn write(&self, path: &str, body: &Map<String, Value>) -> Result<Option<VaultResponse>> {
        self.ensure_live(path)?;
        self.transport.write(path, body)
    }

    /// Resolve the mount for a normalised path, consulting the cache when
    /// enabled.
    pub(crate) fn mount_for(&self, path: &str) -> Result<MountInfo> {
        self.ensure_live(path)?;
        if self.config.cache_mounts
            && let Ok(cache) = self.mounts.lock()
            && let Some(info) = cache.get(path)
        {
            debug!(path = %path, mount = %info.path, "Mount cache hit");
            return Ok(info.clone());
        }

        let info = resolve_mount(&self.transport, path)?;
        if self.config.cache_mounts
            && let Ok(mut cache) = self.mounts.lock()
        {
            cache.insert(path.to_string(), info.clone());
        }
        Ok(info)
    }

    fn invalidate_mounts(&self) {
        if let Ok(mut cache) = self.mounts.lock() {
            cache.clear();
        }
    }
}

impl<T: Transport> SecretStore for Client<T> {
    fn read_kv(&self, path: &str) -> std::result::Result<Option<HashMap<String, String>>, SecretError> {
        self.read_kv_secret(path)
            .map_err(|e| SecretError::ReadFailed {
                path: path.to_string(),
                message: e.to_string(),
            })
    }
}
