//! Error types for the vault client.

use miette::Diagnostic;
use thiserror::Error;

/// Coarse classification of a [`VaultError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Network failure, or any call on a revoked session.
    Transport,
    /// The server answered with a non-2xx status.
    Server,
    /// KV engine version outside {1, 2}.
    VersionUnsupported,
    /// Mount introspection returned nothing usable.
    MountUnknown,
    /// AppRole login did not produce a token.
    LoginFailed,
    /// Secret-id rotation failed at one of its steps.
    RotateFailed,
    /// Secret-id lookup had no expiration time.
    TtlUnknown,
    /// A response could not be decoded into the expected shape.
    Decode,
}

/// Errors returned by every fallible vault operation.
#[derive(Debug, Error, Diagnostic)]
pub enum VaultError {
    /// The request never produced an HTTP response.
    #[error("request to '{path}' failed: {message}")]
    #[diagnostic(
        code(stepvault::vault::transport),
        help("Check VAULT_ADDR and network connectivity to the server")
    )]
    Transport {
        /// Wire path or URL of the request
        path: String,
        /// Underlying failure
        message: String,
    },

    /// Non-2xx answer from the server.
    #[error("server returned status {status} for '{path}': {}", errors.join("; "))]
    #[diagnostic(code(stepvault::vault::server))]
    Server {
        /// Wire path or URL of the request
        path: String,
        /// HTTP status code
        status: u16,
        /// Messages from the server's `errors` array
        errors: Vec<String>,
    },

    /// The mount holds a KV engine version this client cannot address.
    #[error("KV engine version {version} at mount '{mount}' is not supported")]
    #[diagnostic(code(stepvault::vault::version_unsupported))]
    VersionUnsupported {
        /// Mount path
        mount: String,
        /// Version string reported by the server
        version: String,
    },

    /// No mount covers the path.
    #[error("no secrets engine mount found for path '{path}'")]
    #[diagnostic(
        code(stepvault::vault::mount_unknown),
        help("Check that the path starts with an existing KV mount and the token may read sys/internal/ui/mounts")
    )]
    MountUnknown {
        /// Logical path
        path: String,
    },

    /// AppRole login response carried no client token.
    #[error("Could not obtain token from approle with role_id {role_id}")]
    #[diagnostic(code(stepvault::vault::login_failed))]
    LoginFailed {
        /// Role id used for the login
        role_id: String,
    },

    /// Secret-id rotation failed.
    #[error("could not generate new approle secret-id for approle '{role}': {reason}")]
    #[diagnostic(code(stepvault::vault::rotate_failed))]
    RotateFailed {
        /// AppRole name
        role: String,
        /// Failed step
        reason: String,
        /// Underlying error, when the step failed on a request
        #[source]
        source: Option<Box<VaultError>>,
    },

    /// Secret-id lookup did not report an expiration time.
    #[error("secret-id lookup for approle '{role}' did not contain an expiration time")]
    #[diagnostic(code(stepvault::vault::ttl_unknown))]
    TtlUnknown {
        /// AppRole name
        role: String,
    },

    /// A response had an unexpected shape.
    #[error("could not decode response from '{path}': {message}")]
    #[diagnostic(code(stepvault::vault::decode))]
    Decode {
        /// Wire path or URL of the request
        path: String,
        /// What was wrong with it
        message: String,
    },

    /// The session token carries no metadata.
    #[error("token info did not contain metadata")]
    #[diagnostic(
        code(stepvault::vault::no_metadata),
        help("Only tokens minted by an AppRole login carry a role name")
    )]
    TokenMetadataMissing,
}

impl VaultError {
    /// Classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Server { .. } => ErrorKind::Server,
            Self::VersionUnsupported { .. } => ErrorKind::VersionUnsupported,
            Self::MountUnknown { .. } => ErrorKind::MountUnknown,
            Self::LoginFailed { .. } => ErrorKind::LoginFailed,
            Self::RotateFailed { .. } => ErrorKind::RotateFailed,
            Self::TtlUnknown { .. } => ErrorKind::TtlUnknown,
            Self::Decode { .. } | Self::TokenMetadataMissing => ErrorKind::Decode,
        }
    }

    pub(crate) fn transport(path: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Transport {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn decode(path: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Decode {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn rotate(role: &str, reason: impl Into<String>, source: Option<Self>) -> Self {
        Self::RotateFailed {
            role: role.to_string(),
            reason: reason.into(),
            source: source.map(Box::new),
        }
    }
}

/// Result alias for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
