//! Request/response surface towards the server.
//!
//! [`Transport`] is the seam every accessor goes through. [`HttpTransport`]
//! is the production implementation on a blocking `reqwest` client; tests use
//! an in-memory double.

use crate::error::{Result, VaultError};
use crate::path::normalize_path;
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// Header carrying the session token.
pub const TOKEN_HEADER: &str = "X-Vault-Token";

/// Header selecting the namespace on multi-tenant servers.
pub const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// A decoded server response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VaultResponse {
    /// Server-assigned request id.
    #[serde(default)]
    pub request_id: String,
    /// Field map of the response.
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
    /// Authentication block, present on login responses.
    #[serde(default)]
    pub auth: Option<AuthInfo>,
    /// Non-fatal server warnings.
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
}

impl VaultResponse {
    /// String field of `data`, if present.
    #[must_use]
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.as_ref()?.get(key)?.as_str()
    }
}

/// The `auth` block of a login response.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthInfo {
    /// Session token.
    #[serde(default)]
    pub client_token: String,
    /// Token accessor.
    #[serde(default)]
    pub accessor: String,
    /// Policies attached to the token.
    #[serde(default)]
    pub policies: Option<Vec<String>>,
    /// Claims attached by the auth method (for AppRole: `role_name`).
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
    /// Token lifetime in seconds.
    #[serde(default)]
    pub lease_duration: u64,
    /// Whether the token can be renewed.
    #[serde(default)]
    pub renewable: bool,
}

impl std::fmt::Debug for AuthInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthInfo")
            .field("client_token", &"[REDACTED]")
            .field("accessor", &self.accessor)
            .field("policies", &self.policies)
            .field("metadata", &self.metadata)
            .field("lease_duration", &self.lease_duration)
            .field("renewable", &self.renewable)
            .finish()
    }
}

/// Blocking request/response surface.
///
/// `Ok(None)` means the server had nothing at the path (404 or an empty
/// body). Implementations must not retry.
pub trait Transport: Send + Sync {
    /// Idempotent read.
    ///
    /// # Errors
    ///
    /// [`VaultError::Transport`] on network failure, [`VaultError::Server`]
    /// on a non-2xx status, [`VaultError::Decode`] on an undecodable body.
    fn read(&self, path: &str) -> Result<Option<VaultResponse>>;

    /// Write carrying a field map.
    ///
    /// # Errors
    ///
    /// Same as [`Transport::read`].
    fn write(&self, path: &str, body: &Map<String, Value>) -> Result<Option<VaultResponse>>;

    /// Set or clear the namespace sent with every following request.
    fn set_namespace(&self, namespace: Option<&str>);

    /// Set the session token sent with every following request.
    fn set_token(&self, token: &str);

    /// The session token currently attached.
    fn token(&self) -> Option<String>;
}

/// [`Transport`] over HTTP.
pub struct HttpTransport {
    client: HttpClient,
    address: String,
    token: RwLock<Option<String>>,
    namespace: RwLock<Option<String>>,
}

impl HttpTransport {
    /// Transport with a default HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Transport`] if the HTTP client cannot be built.
    pub fn new(address: &str) -> Result<Self> {
        install_crypto_provider();
        let client = HttpClient::builder()
            .build()
            .map_err(|e| VaultError::transport(address, e))?;
        Ok(Self::with_client(client, address))
    }

    /// Transport over a caller-configured HTTP client (timeouts, proxies,
    /// retry middleware).
    #[must_use]
    pub fn with_client(client: HttpClient, address: &str) -> Self {
        Self {
            client,
            address: address.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
            namespace: RwLock::new(None),
        }
    }

    /// Server base address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.address, normalize_path(path))
    }

    fn with_headers(&self, mut request: RequestBuilder) -> RequestBuilder {
        if let Ok(token) = self.token.read()
            && let Some(token) = token.as_deref()
        {
            request = request.header(TOKEN_HEADER, token);
        }
        if let Ok(namespace) = self.namespace.read()
            && let Some(namespace) = namespace.as_deref()
        {
            request = request.header(NAMESPACE_HEADER, namespace);
        }
        request
    }

    fn send(&self, path: &str, request: RequestBuilder) -> Result<Option<VaultResponse>> {
        let response = self
            .with_headers(request)
            .send()
            .map_err(|e| VaultError::transport(path, e))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| VaultError::transport(path, e))?;
        debug!(path = %path, status = status.as_u16(), "Vault response");
        decode_response(path, status, &body)
    }
}

impl Transport for HttpTransport {
    fn read(&self, path: &str) -> Result<Option<VaultResponse>> {
        self.send(path, self.client.get(self.url(path)))
    }

    fn write(&self, path: &str, body: &Map<String, Value>) -> Result<Option<VaultResponse>> {
        self.send(path, self.client.post(self.url(path)).json(body))
    }

    fn set_namespace(&self, namespace: Option<&str>) {
        if let Ok(mut slot) = self.namespace.write() {
            *slot = namespace
                .map(str::trim)
                .filter(|ns| !ns.is_empty())
                .map(str::to_string);
        }
    }

    fn set_token(&self, token: &str) {
        if let Ok(mut slot) = self.token.write() {
            *slot = Some(token.to_string());
        }
    }

    fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|t| t.clone())
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

/// Messages of an error body; falls back to the raw text.
pub(crate) fn error_messages(body: &str) -> Vec<String> {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => parsed.errors,
        _ if body.trim().is_empty() => Vec::new(),
        _ => vec![body.trim().to_string()],
    }
}

fn decode_response(path: &str, status: StatusCode, body: &str) -> Result<Option<VaultResponse>> {
    if status == StatusCode::NOT_FOUND || status == StatusCode::NO_CONTENT {
        return Ok(None);
    }
    if !status.is_success() {
        return Err(VaultError::Server {
            path: path.to_string(),
            status: status.as_u16(),
            errors: error_messages(body),
        });
    }
    if body.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(body)
        .map(Some)
        .map_err(|e| VaultError::decode(path, e))
}

/// Install the process-wide rustls crypto provider if none is set.
///
/// The HTTP stack is built without a bundled provider; this must run before
/// the first client is constructed. Safe to call repeatedly.
pub fn install_crypto_provider() {
    if rustls::crypto::CryptoProvider::get_default().is_none() {
        let _ = rustls::crypto::ring::default_provider().install_default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_not_found_is_absent() {
        let result = decode_response("secret/x", StatusCode::NOT_FOUND, r#"{"errors":[]}"#);
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn test_decode_no_content_is_absent() {
        let result = decode_response("auth/token/revoke-self", StatusCode::NO_CONTENT, "");
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn test_decode_server_error() {
        let err = decode_response(
            "secret/x",
            StatusCode::FORBIDDEN,
            r#"{"errors":["permission denied"]}"#,
        )
        .unwrap_err();
        match err {
            VaultError::Server { status, errors, .. } => {
                assert_eq!(status, 403);
                assert_eq!(errors, vec!["permission denied"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decode_server_error_plain_body() {
        let err =
            decode_response("secret/x", StatusCode::BAD_GATEWAY, "upstream down\n").unwrap_err();
        assert!(err.to_string().contains("upstream down"));
    }

    #[test]
    fn test_decode_invalid_json() {
        let err = decode_response("secret/x", StatusCode::OK, "{not json").unwrap_err();
        assert!(matches!(err, VaultError::Decode { .. }));
    }

    #[test]
    fn test_decode_auth_block() {
        let body = json!({
            "request_id": "r1",
            "data": null,
            "warnings": null,
            "auth": {
                "client_token": "hvs.token",
                "accessor": "acc",
                "policies": ["default"],
                "metadata": {"role_name": "pipeline"},
                "lease_duration": 3600,
                "renewable": true
            }
        })
        .to_string();
        let response = decode_response("auth/approle/login", StatusCode::OK, &body)
            .unwrap()
            .unwrap();
        let auth = response.auth.unwrap();
        assert_eq!(auth.client_token, "hvs.token");
        assert_eq!(auth.metadata.unwrap()["role_name"], "pipeline");
        assert!(response.data.is_none());
    }

    #[test]
    fn test_auth_debug_hides_token() {
        let auth = AuthInfo {
            client_token: "hvs.secret-token".to_string(),
            ..AuthInfo::default()
        };
        let rendered = format!("{auth:?}");
        assert!(!rendered.contains("hvs.secret-token"));
        assert!(rendered.contains("[REDACTED]"));
    }

    fn transport(address: &str) -> HttpTransport {
        HttpTransport::new(address).unwrap()
    }

    #[test]
    fn test_url_building() {
        let transport = transport("http://127.0.0.1:8200/");
        assert_eq!(
            transport.url("/secret/data/app/"),
            "http://127.0.0.1:8200/v1/secret/data/app"
        );
    }

    #[test]
    fn test_namespace_blank_clears() {
        let transport = transport("http://localhost");
        transport.set_namespace(Some("team-a"));
        assert_eq!(transport.namespace.read().unwrap().as_deref(), Some("team-a"));
        transport.set_namespace(Some("  "));
        assert!(transport.namespace.read().unwrap().is_none());
    }
}
