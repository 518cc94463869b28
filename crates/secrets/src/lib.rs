//! Secret resolution for pipeline steps.
//!
//! This crate holds the pieces that sit between a step's configuration and a
//! secret backend:
//!
//! - [`SecretStore`]: the read-only seam a backend implements
//!   (`stepvault-vault` implements it for its KV client).
//! - [`references`]: resolving step parameters from a set of search paths.
//! - [`credentials`]: exporting whole credential secrets as environment
//!   variable assignments.
//!
//! Every value obtained through these helpers is registered with
//! `stepvault-events` for log redaction and returned as a [`SecureSecret`].
//!
//! ```ignore
//! use stepvault_secrets::{ReferenceConfig, SecretReference, resolve_reference};
//!
//! let config = ReferenceConfig::with_vault_path("team1");
//! let reference = SecretReference::new("password");
//! if let Some(secret) = resolve_reference(&client, &config, &reference, None) {
//!     // secret.expose() ...
//! }
//! ```

pub mod credentials;
pub mod references;
mod types;

pub use credentials::{
    CredentialExport, CredentialSource, STANDARD_CREDENTIAL_PREFIX, TEST_CREDENTIAL_PREFIX,
    convert_env_var,
};
pub use references::{GROUP_SECRETS, ReferenceConfig, SecretReference, resolve_all, resolve_reference};
pub use types::SecureSecret;

use std::collections::HashMap;
use thiserror::Error;

/// Error types for secret resolution
#[derive(Debug, Error)]
pub enum SecretError {
    /// The backing store failed to read a path
    #[error("Failed to read secret at '{path}': {message}")]
    ReadFailed {
        /// Path that was read
        path: String,
        /// Error message from the store
        message: String,
    },

    /// Credential export configuration is inconsistent
    #[error("Invalid credential configuration: {message}")]
    InvalidConfig {
        /// What is wrong
        message: String,
    },
}

/// A key-value secret backend.
///
/// `Ok(None)` means nothing is stored at `path`; that is not an error.
pub trait SecretStore: Send + Sync {
    /// Read the string fields stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::ReadFailed`] if the backend cannot be reached
    /// or rejects the read.
    fn read_kv(&self, path: &str) -> Result<Option<HashMap<String, String>>, SecretError>;
}

impl<S: SecretStore + ?Sized> SecretStore for &S {
    fn read_kv(&self, path: &str) -> Result<Option<HashMap<String, String>>, SecretError> {
        (**self).read_kv(path)
    }
}
