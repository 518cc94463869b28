//! Subcommand execution.
//!
//! Every command produces a [`CommandOutput`] holding both its text and JSON
//! rendering; `main` picks one based on `--json`.

use crate::cli::{CliError, Cli, Commands, ConnectionArgs};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use stepvault_secrets::{
    CredentialExport, CredentialSource, ReferenceConfig, SecretReference, SecureSecret, resolve_all,
};
use stepvault_events::register_secrets;
use stepvault_vault::{Client, ClientConfig, Credentials, TrustRelayClient, is_jwt_valid};
use tracing::{debug, info};

/// Result of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Text printed without `--json`.
    pub text: String,
    /// Payload of the JSON envelope.
    pub json: Value,
}

impl CommandOutput {
    fn new(text: impl Into<String>, json: Value) -> Self {
        Self {
            text: text.into(),
            json,
        }
    }
}

/// Client configuration from the connection flags.
#[must_use]
pub fn client_config(args: &ConnectionArgs) -> ClientConfig {
    ClientConfig {
        address: args.address.clone(),
        namespace: args.namespace.clone().filter(|ns| !ns.trim().is_empty()),
        app_role_mount: args.approle_mount.clone(),
        cache_mounts: args.cache_mounts,
    }
}

/// Credentials from the connection flags: a token wins over an AppRole pair.
///
/// # Errors
///
/// Returns a configuration error when neither is complete.
pub fn credentials(args: &ConnectionArgs) -> Result<Credentials, CliError> {
    let non_empty = |v: &Option<String>| v.clone().filter(|v| !v.is_empty());
    if let Some(token) = non_empty(&args.token) {
        return Ok(Credentials::Token(SecureSecret::new(token)));
    }
    match (non_empty(&args.role_id), non_empty(&args.secret_id)) {
        (Some(role_id), Some(secret_id)) => Ok(Credentials::AppRole {
            role_id,
            secret_id: SecureSecret::new(secret_id),
        }),
        _ => Err(CliError::config_with_help(
            "no credentials configured",
            "Set VAULT_TOKEN, or VAULT_ROLE_ID and VAULT_SECRET_ID",
        )),
    }
}

fn connect(args: &ConnectionArgs) -> Result<Client, CliError> {
    let config = client_config(args);
    debug!(address = %config.address, namespace = ?config.namespace, "Connecting");
    Ok(Client::connect(config, &credentials(args)?)?)
}

fn current_secret_id(args: &ConnectionArgs) -> Result<&str, CliError> {
    args.secret_id
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            CliError::config_with_help(
                "this command needs the current AppRole secret-id",
                "Set VAULT_SECRET_ID or pass --secret-id",
            )
        })
}

fn role_name_or_lookup(client: &Client, role_name: Option<&str>) -> Result<String, CliError> {
    match role_name.filter(|name| !name.is_empty()) {
        Some(name) => Ok(name.to_string()),
        None => {
            let name = client.app_role_name()?;
            if name.is_empty() {
                return Err(CliError::config_with_help(
                    "the session token does not name an AppRole",
                    "Pass --role-name explicitly",
                ));
            }
            Ok(name)
        }
    }
}

fn assignments_text<'a>(entries: impl IntoIterator<Item = (&'a String, &'a str)>) -> String {
    entries
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn exposed(values: &BTreeMap<String, SecureSecret>) -> BTreeMap<&String, &str> {
    values.iter().map(|(k, v)| (k, v.expose())).collect()
}

/// Run the selected subcommand.
///
/// # Errors
///
/// Configuration errors for missing inputs; library errors converted into
/// [`CliError`].
pub fn execute(cli: &Cli) -> Result<CommandOutput, CliError> {
    let conn = &cli.connection;
    match &cli.command {
        Commands::Read { path } => {
            let client = connect(conn)?;
            match client.read_kv_secret(path)? {
                Some(fields) => {
                    register_secrets(fields.values().filter(|v| !v.is_empty()).cloned());
                    let sorted: BTreeMap<&String, &str> =
                        fields.iter().map(|(k, v)| (k, v.as_str())).collect();
                    let text = assignments_text(sorted.iter().map(|(k, v)| (*k, *v)));
                    Ok(CommandOutput::new(text, json!(sorted)))
                }
                None => Ok(CommandOutput::new(
                    format!("no secret stored at '{path}'"),
                    Value::Null,
                )),
            }
        }

        Commands::Write { path, fields } => {
            let client = connect(conn)?;
            let fields: HashMap<String, String> = fields.iter().cloned().collect();
            client.write_kv_secret(path, &fields)?;
            let mut keys: Vec<&String> = fields.keys().collect();
            keys.sort();
            Ok(CommandOutput::new(
                format!("wrote {} field(s) to '{path}'", keys.len()),
                json!({"path": path, "keys": keys}),
            ))
        }

        Commands::Merge { path, fields } => {
            let client = connect(conn)?;
            let fields: HashMap<String, String> = fields.iter().cloned().collect();
            let merged = client.merge_kv_secret(path, &fields)?;
            let mut keys: Vec<&String> = merged.keys().collect();
            keys.sort();
            Ok(CommandOutput::new(
                format!("'{path}' now holds {} field(s)", keys.len()),
                json!({"path": path, "keys": keys}),
            ))
        }

        Commands::Resolve {
            vault_path,
            vault_base_path,
            pipeline_name,
            parameters,
        } => {
            let config = ReferenceConfig {
                vault_path: vault_path.clone(),
                vault_base_path: vault_base_path.clone(),
                vault_pipeline_name: pipeline_name.clone(),
                vault_disable_overwrite: false,
            };
            let references: Vec<SecretReference> =
                parameters.iter().map(SecretReference::new).collect();
            let client = connect(conn)?;
            let resolved: BTreeMap<String, SecureSecret> =
                resolve_all(&client, &config, &references, &HashMap::new())
                    .into_iter()
                    .collect();
            info!(requested = parameters.len(), resolved = resolved.len(), "Resolved step parameters");
            let values = exposed(&resolved);
            let text = assignments_text(values.iter().map(|(k, v)| (*k, *v)));
            Ok(CommandOutput::new(text, json!(values)))
        }

        Commands::Credentials {
            vault_path,
            paths,
            keys,
            prefixes,
            test,
        } => {
            let sources: Vec<CredentialSource> = paths
                .iter()
                .map(|path| CredentialSource::new(path.as_str(), keys.iter().map(String::as_str)))
                .collect();
            let mut export = if *test {
                CredentialExport::test(vault_path.as_str(), sources)
            } else {
                CredentialExport::general(vault_path.as_str(), sources)
            };
            if !prefixes.is_empty() {
                export = export.with_prefixes(prefixes.iter().map(String::as_str));
            }
            let client = connect(conn)?;
            let exported = export.resolve(&client)?;
            let values = exposed(&exported);
            let text = assignments_text(values.iter().map(|(k, v)| (*k, *v)));
            Ok(CommandOutput::new(text, json!(values)))
        }

        Commands::RotateSecretId { role_name } => {
            let secret_id = current_secret_id(conn)?;
            let client = connect(conn)?;
            let role = role_name_or_lookup(&client, role_name.as_deref())?;
            let new_secret_id = client.generate_new_secret_id(secret_id, &role)?;
            Ok(CommandOutput::new(
                new_secret_id.clone(),
                json!({"role": role, "secretId": new_secret_id}),
            ))
        }

        Commands::SecretIdTtl { role_name } => {
            let secret_id = current_secret_id(conn)?;
            let client = connect(conn)?;
            let role = role_name_or_lookup(&client, role_name.as_deref())?;
            let ttl = client.secret_id_ttl(secret_id, &role)?;
            Ok(CommandOutput::new(
                format!("{}s", ttl.as_secs()),
                json!({"role": role, "seconds": ttl.as_secs()}),
            ))
        }

        Commands::RoleName => {
            let client = connect(conn)?;
            let name = client.app_role_name()?;
            Ok(CommandOutput::new(name.clone(), json!({"roleName": name})))
        }

        Commands::Revoke { service_only } => {
            let client = connect(conn)?;
            let revoked = if *service_only {
                client.revoke_service_token()?
            } else {
                client.revoke_token()?;
                true
            };
            let text = if revoked {
                "session token revoked"
            } else {
                "session token is not a service token, left in place"
            };
            Ok(CommandOutput::new(text, json!({"revoked": revoked})))
        }

        Commands::OidcToken { role, force } => {
            let client = connect(conn)?;
            let token = if *force {
                client.fetch_oidc_token(role)?
            } else {
                client.oidc_token_by_validation(role)?
            };
            Ok(CommandOutput::new(token.clone(), json!({"role": role, "token": token})))
        }

        Commands::JwtValid { token } => {
            let valid = is_jwt_valid(token);
            Ok(CommandOutput::new(valid.to_string(), json!({"valid": valid})))
        }

        Commands::TrustRelay {
            url,
            reference,
            jwt,
        } => {
            let relay = TrustRelayClient::new()?;
            let bundle = relay.fetch(url, reference, jwt)?;
            let repo = &bundle.pipeline_repository_relationship.repo;
            let sonar = &bundle.pipeline_repository_relationship.sonar;
            let text = [
                format!("token={}", bundle.token),
                format!("requestId={}", bundle.request_id),
                format!("repo={}", repo.url),
                format!("sonarProject={}", sonar.project_key),
            ]
            .join("\n");
            let json = serde_json::to_value(&bundle).map_err(|e| CliError::other(e.to_string()))?;
            Ok(CommandOutput::new(text, json))
        }

        Commands::Context => {
            let provider = stepvault_ci::detect_provider()?;
            let context = provider.context();
            let json = serde_json::to_value(&context).map_err(|e| CliError::other(e.to_string()))?;
            Ok(CommandOutput::new(context.to_string(), json))
        }
    }
}
