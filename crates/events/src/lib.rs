//! Log plumbing shared by the stepvault crates.
//!
//! Two concerns live here:
//!
//! - [`redaction`]: a process-wide registry of secret values. Every token the
//!   client mints or receives is registered so it can be masked.
//! - [`logging`]: the tracing subscriber used by the CLI, which masks every
//!   registered secret before a log line is written.
//!
//! # Usage
//!
//! ```rust,ignore
//! use stepvault_events::{TracingConfig, init_tracing, register_secret};
//!
//! init_tracing(&TracingConfig::default())?;
//! register_secret(token.clone());
//! tracing::info!("using token {token}"); // printed as "using token ****"
//! ```

pub mod logging;
pub mod redaction;

pub use logging::{
    RedactingMakeWriter, RedactingWriter, TracingConfig, TracingError, TracingFormat, init_tracing,
};
pub use redaction::{REDACTED_PLACEHOLDER, has_secrets, redact, register_secret, register_secrets};
