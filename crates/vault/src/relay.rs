//! Trust relay fetcher.
//!
//! The relay exchanges a pipeline's OIDC identity token for a bundle of
//! short-lived system tokens plus the repository relationship the pipeline
//! is registered with.

use crate::error::{Result, VaultError};
use crate::transport::{error_messages, install_crypto_provider};
use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};
use stepvault_events::register_secret;
use tracing::{debug, info};

/// Repository the pipeline belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryInfo {
    /// Repository owner or organisation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Repository name
    pub name: String,
    /// Clone or web URL
    pub url: String,
}

/// Code analysis server the repository reports to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SonarInfo {
    /// Server URL
    pub host: String,
    /// Project key on the server
    pub project_key: String,
    /// Organisation on the server
    pub organization: String,
}

/// Relationship between the pipeline and its repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineRepositoryRelationship {
    /// Source repository
    pub repo: RepositoryInfo,
    /// Analysis server
    pub sonar: SonarInfo,
}

/// Body returned by the trust relay.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustRelayBundle {
    /// Exchanged system token
    pub token: String,
    /// Relay-side request id
    pub request_id: String,
    /// Repository relationship of the pipeline
    pub pipeline_repository_relationship: PipelineRepositoryRelationship,
}

impl std::fmt::Debug for TrustRelayBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustRelayBundle")
            .field("token", &"[REDACTED]")
            .field("request_id", &self.request_id)
            .field(
                "pipeline_repository_relationship",
                &self.pipeline_repository_relationship,
            )
            .finish()
    }
}

/// Bearer-authenticated client for the trust relay.
#[derive(Debug, Clone)]
pub struct TrustRelayClient {
    client: HttpClient,
}

impl TrustRelayClient {
    /// Relay client with a default HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Transport`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        install_crypto_provider();
        let client = HttpClient::builder()
            .build()
            .map_err(|e| VaultError::transport("trust relay", e))?;
        Ok(Self { client })
    }

    /// Relay client over a caller-configured HTTP client.
    #[must_use]
    pub const fn with_client(client: HttpClient) -> Self {
        Self { client }
    }

    /// `GET {base_url}/{reference}` with `jwt` as bearer token.
    ///
    /// The body is read completely before decoding. The returned token is
    /// registered for redaction.
    ///
    /// # Errors
    ///
    /// [`VaultError::Transport`] when no response arrives,
    /// [`VaultError::Server`] on a non-2xx status, [`VaultError::Decode`]
    /// when the body does not match [`TrustRelayBundle`].
    pub fn fetch(&self, base_url: &str, reference: &str, jwt: &str) -> Result<TrustRelayBundle> {
        let url = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            reference.trim_start_matches('/')
        );
        debug!(url = %url, "Fetching trust relay bundle");

        let response = self
            .client
            .get(&url)
            .bearer_auth(jwt)
            .send()
            .map_err(|e| VaultError::transport(&url, e))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| VaultError::transport(&url, e))?;

        if !status.is_success() {
            return Err(VaultError::Server {
                path: url,
                status: status.as_u16(),
                errors: error_messages(&body),
            });
        }

        let bundle: TrustRelayBundle =
            serde_json::from_str(&body).map_err(|e| VaultError::decode(&url, e))?;
        if !bundle.token.is_empty() {
            register_secret(bundle.token.clone());
        }
        info!(reference = %reference, request_id = %bundle.request_id, "Received trust relay bundle");
        Ok(bundle)
    }
}
