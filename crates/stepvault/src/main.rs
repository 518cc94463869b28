//! stepvault CLI entry point.

// CLI binary needs to output to stdout/stderr
#![allow(clippy::print_stdout, clippy::print_stderr)]

use stepvault::cli::{self, EXIT_OK, OkEnvelope, exit_code_for, render_error};
use stepvault::commands;
use stepvault_events::{TracingConfig, TracingFormat, init_tracing, register_secret};
use stepvault_vault::{OIDC_TOKEN_ENV, install_crypto_provider};

/// Environment variables whose values must never reach a log line.
const SECRET_ENV_VARS: [&str; 3] = ["VAULT_TOKEN", "VAULT_SECRET_ID", OIDC_TOKEN_ENV];

fn main() {
    // NOTE: eprintln! here on purpose, tracing may be unusable during a panic.
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with --level debug for more information.");
    }));

    for name in SECRET_ENV_VARS {
        if let Ok(value) = std::env::var(name)
            && !value.is_empty()
        {
            register_secret(value);
        }
    }

    install_crypto_provider();

    let cli = cli::parse();
    for value in [&cli.connection.token, &cli.connection.secret_id]
        .into_iter()
        .flatten()
    {
        if !value.is_empty() {
            register_secret(value.clone());
        }
    }

    let tracing_config = TracingConfig {
        format: if cli.json {
            TracingFormat::Json
        } else {
            TracingFormat::Pretty
        },
        level: cli.level.into(),
    };
    if let Err(e) = init_tracing(&tracing_config) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    let exit_code = match commands::execute(&cli) {
        Ok(output) => {
            if cli.json {
                match serde_json::to_string_pretty(&OkEnvelope::new(output.json)) {
                    Ok(rendered) => println!("{rendered}"),
                    Err(e) => eprintln!("Error: failed to serialize output: {e}"),
                }
            } else if !output.text.is_empty() {
                println!("{}", output.text);
            }
            EXIT_OK
        }
        Err(err) => {
            render_error(&err, cli.json);
            exit_code_for(&err)
        }
    };

    std::process::exit(exit_code);
}
