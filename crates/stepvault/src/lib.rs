//! stepvault command line front-end.
//!
//! The binary is a thin wrapper: [`cli`] defines arguments, errors and output
//! envelopes, [`commands`] runs one subcommand against the
//! [`stepvault_vault::Client`] and returns its text and JSON rendering.

pub mod cli;
pub mod commands;

pub use cli::{Cli, CliError, Commands};
pub use commands::{CommandOutput, execute};
