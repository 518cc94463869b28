//! OIDC identity tokens.
//!
//! Tokens are minted by the identity endpoint, cached in the
//! [`OIDC_TOKEN_ENV`] environment slot, and checked offline against their
//! `exp` claim before reuse.

use crate::client::Client;
use crate::error::{Result, VaultError};
use crate::path::join_path;
use crate::transport::Transport;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use serde::Deserialize;
use stepvault_events::register_secret;
use tracing::{debug, info};

/// Environment variable holding the most recently minted identity token.
pub const OIDC_TOKEN_ENV: &str = "PIPER_OIDCIdentityToken";

const OIDC_TOKEN_ENDPOINT: &str = "identity/oidc/token";

#[derive(Deserialize)]
struct Claims {
    exp: i64,
}

/// Whether `token` is a JWT whose `exp` lies in the future.
///
/// Purely offline. Anything that does not decode is invalid.
#[must_use]
pub fn is_jwt_valid(token: &str) -> bool {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload)) = (segments.next(), segments.next()) else {
        return false;
    };
    let Ok(decoded) = URL_SAFE_NO_PAD.decode(payload) else {
        return false;
    };
    let Ok(claims) = serde_json::from_slice::<Claims>(&decoded) else {
        return false;
    };
    claims.exp > Utc::now().timestamp()
}

/// The token currently held in [`OIDC_TOKEN_ENV`], if any.
#[must_use]
pub fn cached_oidc_token() -> Option<String> {
    std::env::var(OIDC_TOKEN_ENV)
        .ok()
        .filter(|token| !token.is_empty())
}

fn publish_oidc_token(token: &str) {
    // SAFETY: The slot is process-wide by contract; concurrent writers race
    // and the last one wins. Every value written is a complete token.
    #[allow(unsafe_code)]
    unsafe {
        std::env::set_var(OIDC_TOKEN_ENV, token);
    }
}

impl<T: Transport> Client<T> {
    /// Mint an identity token for `role`, cache it in [`OIDC_TOKEN_ENV`] and
    /// return it.
    ///
    /// # Errors
    ///
    /// Transport errors unchanged, [`VaultError::Decode`] when the response
    /// has no `token`.
    pub fn fetch_oidc_token(&self, role: &str) -> Result<String> {
        let path = join_path(&[OIDC_TOKEN_ENDPOINT, role]);
        let token = self
            .read(&path)?
            .as_ref()
            .and_then(|response| response.data_str("token"))
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .ok_or_else(|| VaultError::decode(&path, "response did not contain a token"))?;

        register_secret(token.clone());
        publish_oidc_token(&token);
        info!(role = %role, "Fetched OIDC identity token");
        Ok(token)
    }

    /// The cached identity token when still valid, otherwise a fresh one.
    ///
    /// Concurrent callers may each mint a token.
    ///
    /// # Errors
    ///
    /// See [`Client::fetch_oidc_token`].
    pub fn oidc_token_by_validation(&self, role: &str) -> Result<String> {
        if let Some(token) = cached_oidc_token()
            && is_jwt_valid(&token)
        {
            debug!(role = %role, "Reusing cached OIDC identity token");
            register_secret(token.clone());
            return Ok(token);
        }
        self.fetch_oidc_token(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::client::ClientConfig;
    use crate::mock::MockTransport;
    use serde_json::json;

    fn jwt_with_payload(payload: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(payload);
        format!("{header}.{payload}.c2lnbmF0dXJl")
    }

    fn jwt_expiring_in(seconds: i64) -> String {
        jwt_with_payload(&format!(r#"{{"exp":{}}}"#, Utc::now().timestamp() + seconds))
    }

    fn client(transport: MockTransport) -> Client<MockTransport> {
        Client::with_token(transport, ClientConfig::default(), "s.oidc-test-token").unwrap()
    }

    #[test]
    fn test_expired_jwt_is_invalid() {
        assert!(!is_jwt_valid(&jwt_with_payload(r#"{"exp":0}"#)));
        assert!(!is_jwt_valid(&jwt_expiring_in(-1)));
    }

    #[test]
    fn test_future_jwt_is_valid() {
        assert!(is_jwt_valid(&jwt_expiring_in(3600)));
    }

    #[test]
    fn test_malformed_jwt_is_invalid() {
        assert!(!is_jwt_valid(""));
        assert!(!is_jwt_valid("no-dots-here"));
        assert!(!is_jwt_valid("header.!!!not-base64!!!.sig"));
        assert!(!is_jwt_valid(&jwt_with_payload("not json")));
        assert!(!is_jwt_valid(&jwt_with_payload(r#"{"sub":"ci"}"#)));
        assert!(!is_jwt_valid(&jwt_with_payload(r#"{"exp":"tomorrow"}"#)));
    }

    #[test]
    fn test_padded_payload_is_invalid() {
        let payload = base64::engine::general_purpose::URL_SAFE.encode(r#"{"exp":99999999999}"#);
        assert!(payload.ends_with('='));
        assert!(!is_jwt_valid(&format!("h.{payload}.s")));
    }

    #[test]
    fn test_two_segments_suffice() {
        let payload = URL_SAFE_NO_PAD.encode(r#"{"exp":99999999999}"#);
        assert!(is_jwt_valid(&format!("header.{payload}")));
    }

    #[test]
    fn test_fetch_publishes_token() {
        let minted = jwt_expiring_in(600);
        let transport = MockTransport::new().on_read("identity/oidc/token/ci-role", json!({"data": {"token": minted}}));
        temp_env::with_var_unset(OIDC_TOKEN_ENV, || {
            let token = client(transport).fetch_oidc_token("ci-role").unwrap();
            assert_eq!(token, minted);
            assert_eq!(cached_oidc_token().as_deref(), Some(minted.as_str()));
        });
    }

    #[test]
    fn test_fetch_without_token_is_decode_error() {
        let transport = MockTransport::new().on_read("identity/oidc/token/ci-role", json!({"data": {}}));
        temp_env::with_var_unset(OIDC_TOKEN_ENV, || {
            let err = client(transport).fetch_oidc_token("ci-role").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Decode);
            assert!(cached_oidc_token().is_none());
        });
    }

    #[test]
    fn test_valid_cached_token_skips_server() {
        let cached = jwt_expiring_in(3600);
        temp_env::with_var(OIDC_TOKEN_ENV, Some(cached.as_str()), || {
            let client = client(MockTransport::new());
            let token = client.oidc_token_by_validation("ci-role").unwrap();
            assert_eq!(token, cached);
            assert!(client.transport().calls().is_empty());
        });
    }

    #[test]
    fn test_expired_cached_token_is_replaced() {
        let stale = jwt_expiring_in(-1);
        let fresh = jwt_expiring_in(3600);
        let transport = MockTransport::new().on_read("identity/oidc/token/ci-role", json!({"data": {"token": fresh}}));
        temp_env::with_var(OIDC_TOKEN_ENV, Some(stale.as_str()), || {
            let client = client(transport);
            let token = client.oidc_token_by_validation("ci-role").unwrap();
            assert_eq!(token, fresh);
            assert_eq!(client.transport().paths(), vec!["read identity/oidc/token/ci-role"]);
            assert_eq!(cached_oidc_token().as_deref(), Some(fresh.as_str()));
        });
    }
}
