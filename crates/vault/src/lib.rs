//! Client for Vault-compatible secret servers, built for CI pipeline steps.
//!
//! Supports:
//! - KV v1 and v2 reads and writes with automatic mount/version routing
//! - token and AppRole authentication, self-revocation, secret-id rotation
//! - OIDC identity tokens with an offline `exp` check
//! - trust relay bundles
//!
//! Every token minted through this crate is registered with
//! [`stepvault_events::register_secret`] so that log output redacts it.
//!
//! ```no_run
//! use stepvault_vault::{Client, ClientConfig, Credentials};
//!
//! let config = ClientConfig::from_env();
//! let client = Client::connect(config, &Credentials::Token("s.example".into()))?;
//! if let Some(secret) = client.read_kv_secret("secret/pipeline/deploy")? {
//!     println!("{} keys", secret.len());
//! }
//! # Ok::<(), stepvault_vault::VaultError>(())
//! ```

mod approle;
mod client;
mod error;
mod kv;
mod mounts;
mod oidc;
mod path;
mod relay;
mod transport;

#[cfg(test)]
mod mock;

pub use approle::SERVICE_TOKEN_PREFIX;
pub use client::{Client, ClientConfig, Credentials, DEFAULT_ADDRESS, DEFAULT_APPROLE_MOUNT};
pub use error::{ErrorKind, Result, VaultError};
pub use mounts::{KvVersion, MountInfo, resolve_mount};
pub use oidc::{OIDC_TOKEN_ENV, cached_oidc_token, is_jwt_valid};
pub use path::{join_path, normalize_path};
pub use relay::{
    PipelineRepositoryRelationship, RepositoryInfo, SonarInfo, TrustRelayBundle, TrustRelayClient,
};
pub use transport::{
    AuthInfo, HttpTransport, NAMESPACE_HEADER, TOKEN_HEADER, Transport, VaultResponse,
    install_crypto_provider,
};
