//! Argument parsing, error mapping and output envelopes.

use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::{Diagnostic, Report};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use stepvault_ci::OrchestratorError;
use stepvault_secrets::SecretError;
use stepvault_vault::{DEFAULT_ADDRESS, DEFAULT_APPROLE_MOUNT, ErrorKind, VaultError};
use thiserror::Error;
use tracing::Level;

/// Exit codes for the CLI application
pub const EXIT_OK: i32 = 0;
/// CLI or configuration error exit code
pub const EXIT_CLI: i32 = 2;
/// Server, transport or decoding error exit code
pub const EXIT_VAULT: i32 = 3;

/// CLI-specific error types with proper exit code mapping
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// CLI or configuration error (exit code 2)
    #[error("CLI/configuration error: {message}")]
    #[diagnostic(code(stepvault::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Error reported by the secrets server or while talking to it (exit code 3)
    #[error("{message}")]
    #[diagnostic(code(stepvault::cli::vault))]
    Vault {
        /// Classification of the underlying error
        kind: String,
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Other unexpected error (exit code 3)
    #[error("Unexpected error: {message}")]
    #[diagnostic(code(stepvault::cli::other))]
    Other {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new configuration error with help text
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a new other error
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            help: None,
        }
    }

    /// Short machine-readable code used in JSON error envelopes.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Config { .. } => "config",
            Self::Vault { kind, .. } => kind.as_str(),
            Self::Other { .. } => "other",
        }
    }
}

fn kind_code(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Transport => "transport",
        ErrorKind::Server => "server",
        ErrorKind::VersionUnsupported => "version_unsupported",
        ErrorKind::MountUnknown => "mount_unknown",
        ErrorKind::LoginFailed => "login_failed",
        ErrorKind::RotateFailed => "rotate_failed",
        ErrorKind::TtlUnknown => "ttl_unknown",
        ErrorKind::Decode => "decode",
    }
}

/// Keeps the diagnostic help of the library error and appends the source
/// chain to the message.
impl From<VaultError> for CliError {
    fn from(err: VaultError) -> Self {
        let help = err.help().map(|h| h.to_string());
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::Vault {
            kind: kind_code(err.kind()).to_string(),
            message,
            help,
        }
    }
}

impl From<OrchestratorError> for CliError {
    fn from(err: OrchestratorError) -> Self {
        let help = err.help().map(|h| h.to_string());
        Self::Config {
            message: err.to_string(),
            help,
        }
    }
}

impl From<SecretError> for CliError {
    fn from(err: SecretError) -> Self {
        match err {
            SecretError::InvalidConfig { message } => Self::config(message),
            other @ SecretError::ReadFailed { .. } => Self::Vault {
                kind: "read_failed".to_string(),
                message: other.to_string(),
                help: None,
            },
        }
    }
}

/// Map CLI error to appropriate exit code
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } => EXIT_CLI,
        CliError::Vault { .. } | CliError::Other { .. } => EXIT_VAULT,
    }
}

/// Render error appropriately based on JSON flag
#[allow(clippy::print_stdout, clippy::print_stderr)]
pub fn render_error(err: &CliError, json_mode: bool) {
    if json_mode {
        let error_envelope = ErrorEnvelope::new(serde_json::json!({
            "code": err.code(),
            "message": stepvault_events::redact(&err.to_string()),
        }));

        match serde_json::to_string(&error_envelope) {
            Ok(json) => println!("{json}"),
            Err(_) => eprintln!("Error serializing error response"),
        }
    } else {
        let report = Report::new(err.clone());
        eprintln!("{}", stepvault_events::redact(&format!("{report:?}")));
        let _ = io::stderr().flush();
    }
}

/// Success response envelope for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkEnvelope<T> {
    /// Status indicator - always "ok" for success
    pub status: &'static str,
    /// The actual data payload
    pub data: T,
}

impl<T> OkEnvelope<T> {
    /// Create a new success envelope
    #[must_use]
    pub const fn new(data: T) -> Self {
        Self { status: "ok", data }
    }
}

/// Error response envelope for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope<E> {
    /// Status indicator - always "error" for failures
    pub status: &'static str,
    /// The error details
    pub error: E,
}

impl<E> ErrorEnvelope<E> {
    /// Create a new error envelope
    #[must_use]
    pub const fn new(error: E) -> Self {
        Self {
            status: "error",
            error,
        }
    }
}

/// Log verbosity accepted by `--level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Show all logs (trace level)
    Trace,
    /// Show debug and above
    Debug,
    /// Show info and above
    Info,
    /// Show warnings and above (default)
    Warn,
    /// Show errors only
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// Server address and credentials, shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Server base URL.
    #[arg(long, global = true, env = "VAULT_ADDR", default_value = DEFAULT_ADDRESS)]
    pub address: String,

    /// Namespace sent with every request.
    #[arg(long, global = true, env = "VAULT_NAMESPACE")]
    pub namespace: Option<String>,

    /// Mount of the AppRole auth method.
    #[arg(long, global = true, env = "VAULT_APPROLE_MOUNT", default_value = DEFAULT_APPROLE_MOUNT)]
    pub approle_mount: String,

    /// Session token. Takes precedence over an AppRole pair.
    #[arg(long, global = true, env = "VAULT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// AppRole role id.
    #[arg(long, global = true, env = "VAULT_ROLE_ID")]
    pub role_id: Option<String>,

    /// AppRole secret id.
    #[arg(long, global = true, env = "VAULT_SECRET_ID", hide_env_values = true)]
    pub secret_id: Option<String>,

    /// Cache mount lookups for the lifetime of the command.
    #[arg(long, global = true)]
    pub cache_mounts: bool,
}

/// Secrets client for CI pipeline steps.
#[derive(Parser, Debug)]
#[command(name = "stepvault")]
#[command(about = "Read and write pipeline secrets, manage AppRole credentials and OIDC tokens")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Logging verbosity level.
    #[arg(
        short = 'L',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    /// Emit JSON envelope instead of text.
    #[arg(long, global = true, help = "Emit JSON envelope instead of text")]
    pub json: bool,

    /// Connection settings.
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Read a KV secret.
    #[command(about = "Read a KV secret and print its fields")]
    Read {
        /// Logical secret path, e.g. `secret/pipeline/deploy`
        path: String,
    },

    /// Write a KV secret, replacing its current fields.
    #[command(about = "Write KEY=VALUE fields to a KV secret")]
    Write {
        /// Logical secret path
        path: String,
        /// Fields as KEY=VALUE
        #[arg(required = true, value_parser = parse_assignment)]
        fields: Vec<(String, String)>,
    },

    /// Overlay fields onto an existing KV secret.
    #[command(about = "Merge KEY=VALUE fields into a KV secret")]
    Merge {
        /// Logical secret path
        path: String,
        /// Fields as KEY=VALUE
        #[arg(required = true, value_parser = parse_assignment)]
        fields: Vec<(String, String)>,
    },

    /// Resolve step parameters from the secret search paths.
    #[command(about = "Resolve step parameters from vaultPath, pipeline and group secrets")]
    Resolve {
        /// Team or project folder searched first
        #[arg(long)]
        vault_path: Option<String>,
        /// Root folder for pipeline and group secrets
        #[arg(long)]
        vault_base_path: Option<String>,
        /// Pipeline folder below the base path
        #[arg(long)]
        pipeline_name: Option<String>,
        /// Parameter names to resolve
        #[arg(required = true)]
        parameters: Vec<String>,
    },

    /// Export credential secrets as environment assignments.
    #[command(about = "Print credential secrets as NAME=value environment assignments")]
    Credentials {
        /// Folder holding the credential secrets
        #[arg(long)]
        vault_path: String,
        /// Credential secret below the folder (repeatable)
        #[arg(long = "path", required = true)]
        paths: Vec<String>,
        /// Key to export from each secret (repeatable)
        #[arg(long = "key", required = true)]
        keys: Vec<String>,
        /// Custom variable prefix, one for all paths or one per path
        #[arg(long = "prefix")]
        prefixes: Vec<String>,
        /// Export as test credentials
        #[arg(long)]
        test: bool,
    },

    /// Rotate the AppRole secret-id.
    #[command(about = "Mint a new AppRole secret-id carrying the current one's metadata")]
    RotateSecretId {
        /// Role name; looked up from the session token when omitted
        #[arg(long)]
        role_name: Option<String>,
    },

    /// Remaining lifetime of the AppRole secret-id.
    #[command(about = "Show the remaining lifetime of the AppRole secret-id")]
    SecretIdTtl {
        /// Role name; looked up from the session token when omitted
        #[arg(long)]
        role_name: Option<String>,
    },

    /// Role name of the session token.
    #[command(about = "Show the AppRole name of the session token")]
    RoleName,

    /// Revoke the session token.
    #[command(about = "Revoke the session token")]
    Revoke {
        /// Only revoke service tokens (`hvs.` prefix)
        #[arg(long)]
        service_only: bool,
    },

    /// Obtain an OIDC identity token.
    #[command(about = "Print a valid OIDC identity token for a role")]
    OidcToken {
        /// Identity role name
        role: String,
        /// Mint a new token even if the cached one is still valid
        #[arg(long)]
        force: bool,
    },

    /// Offline expiry check of a JWT.
    #[command(about = "Check whether a JWT has not expired yet")]
    JwtValid {
        /// The token; defaults to the cached OIDC identity token
        #[arg(env = "PIPER_OIDCIdentityToken", hide_env_values = true)]
        token: String,
    },

    /// Fetch a trust relay bundle.
    #[command(about = "Exchange an OIDC token for a trust relay bundle")]
    TrustRelay {
        /// Relay base URL
        #[arg(long, env = "PIPER_TRUST_RELAY_URL")]
        url: String,
        /// Reference name requested from the relay
        #[arg(long)]
        reference: String,
        /// Bearer token; defaults to the cached OIDC identity token
        #[arg(long, env = "PIPER_OIDCIdentityToken", hide_env_values = true)]
        jwt: String,
    },

    /// Detect the CI orchestrator and print its run context.
    #[command(about = "Show the detected CI orchestrator and branch/pull request context")]
    Context,
}

/// Parse a `KEY=VALUE` argument. The value may contain `=`.
///
/// # Errors
///
/// Returns a message when there is no `=` or the key is empty.
pub fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        Some(_) => Err(format!("empty key in '{raw}'")),
        None => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

/// Parse the process arguments.
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}
