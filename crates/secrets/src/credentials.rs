//! Credential export.
//!
//! A credential secret (for example `team1/appCredentials`) is read as a whole
//! and selected keys are turned into environment variable assignments such as
//! `PIPER_VAULTCREDENTIAL_APPUSER=...`. The assignments are returned to the
//! caller; nothing is written to disk.

use crate::{SecretError, SecretStore, SecureSecret};
use std::collections::BTreeMap;
use stepvault_events::register_secret;
use tracing::{debug, warn};

/// Prefix every general purpose credential is exported under.
pub const STANDARD_CREDENTIAL_PREFIX: &str = "PIPER_VAULTCREDENTIAL_";

/// Default prefix for test credentials.
pub const TEST_CREDENTIAL_PREFIX: &str = "PIPER_TESTCREDENTIAL_";

/// Turn a secret key into an environment variable name.
///
/// Uppercases, maps `-` to `_`, then drops every character outside
/// `[A-Za-z0-9_]`.
///
/// ```
/// use stepvault_secrets::convert_env_var;
///
/// assert_eq!(convert_env_var("my_App?-(1]"), "MY_APP_1");
/// ```
#[must_use]
pub fn convert_env_var(name: &str) -> String {
    name.to_uppercase()
        .chars()
        .map(|c| if c == '-' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// One credential secret and the keys to export from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSource {
    /// Secret path relative to the vault path.
    pub path: String,
    /// Keys to export.
    pub keys: Vec<String>,
}

impl CredentialSource {
    /// Export `keys` from `path`.
    #[must_use]
    pub fn new(path: impl Into<String>, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            path: path.into(),
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

/// Export plan for a set of credential secrets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialExport {
    vault_path: String,
    sources: Vec<CredentialSource>,
    prefixes: Vec<String>,
    standard_prefix: Option<&'static str>,
}

impl CredentialExport {
    /// General purpose credentials.
    ///
    /// Exported under each custom prefix and always under
    /// [`STANDARD_CREDENTIAL_PREFIX`].
    #[must_use]
    pub fn general(vault_path: impl Into<String>, sources: Vec<CredentialSource>) -> Self {
        Self {
            vault_path: vault_path.into(),
            sources,
            prefixes: Vec::new(),
            standard_prefix: Some(STANDARD_CREDENTIAL_PREFIX),
        }
    }

    /// Test credentials, exported under [`TEST_CREDENTIAL_PREFIX`] unless a
    /// custom prefix is given.
    #[must_use]
    pub fn test(vault_path: impl Into<String>, sources: Vec<CredentialSource>) -> Self {
        Self {
            vault_path: vault_path.into(),
            sources,
            prefixes: vec![TEST_CREDENTIAL_PREFIX.to_string()],
            standard_prefix: None,
        }
    }

    /// Replace the custom prefixes.
    ///
    /// A single prefix applies to every source; otherwise there must be one
    /// prefix per source, matched by position.
    #[must_use]
    pub fn with_prefixes(mut self, prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    fn prefix_for(&self, index: usize) -> Option<&str> {
        match self.prefixes.as_slice() {
            [] => None,
            [single] => Some(single.as_str()),
            many => many.get(index).map(String::as_str),
        }
    }

    fn validate(&self) -> Result<(), SecretError> {
        if self.prefixes.len() > 1 && self.prefixes.len() != self.sources.len() {
            return Err(SecretError::InvalidConfig {
                message: format!(
                    "{} credential prefixes given for {} credential paths",
                    self.prefixes.len(),
                    self.sources.len()
                ),
            });
        }
        Ok(())
    }

    /// Read every source and build the environment assignments.
    ///
    /// Sources that cannot be read or do not exist are logged and skipped.
    /// Requested keys missing from a secret are skipped as well. Every
    /// exported value is registered for log redaction.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::InvalidConfig`] when the number of prefixes does
    /// not match the number of sources.
    pub fn resolve<S: SecretStore + ?Sized>(
        &self,
        store: &S,
    ) -> Result<BTreeMap<String, SecureSecret>, SecretError> {
        self.validate()?;

        let mut exported = BTreeMap::new();
        for (index, source) in self.sources.iter().enumerate() {
            let path = format!(
                "{}/{}",
                self.vault_path.trim_matches('/'),
                source.path.trim_matches('/')
            );
            let fields = match store.read_kv(&path) {
                Ok(Some(fields)) => fields,
                Ok(None) => {
                    warn!(path = %path, "No credential secret stored");
                    continue;
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "Skipping unreadable credential secret");
                    continue;
                }
            };

            let prefixes = self
                .prefix_for(index)
                .into_iter()
                .chain(self.standard_prefix);
            let prefixes: Vec<&str> = prefixes.collect();

            for key in &source.keys {
                let Some(value) = fields.get(key) else {
                    debug!(path = %path, key = %key, "Credential key not present");
                    continue;
                };
                register_secret(value.clone());
                let name = convert_env_var(key);
                for prefix in &prefixes {
                    exported.insert(format!("{prefix}{name}"), SecureSecret::new(value.clone()));
                }
            }
        }
        Ok(exported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;
    use proptest::prelude::*;

    #[test]
    fn test_convert_env_var() {
        assert_eq!(convert_env_var(""), "");
        assert_eq!(convert_env_var("myApp1"), "MYAPP1");
        assert_eq!(convert_env_var("my-App-1"), "MY_APP_1");
        assert_eq!(convert_env_var("my_App_1"), "MY_APP_1");
        assert_eq!(convert_env_var("my_App?-(1]"), "MY_APP_1");
        assert_eq!(convert_env_var("päss-wört"), "PSS_WRT");
    }

    #[test]
    fn test_default_test_credential_prefix() {
        let store = MemoryStore::default()
            .with("team1/appCredentials1", &[("appUser1", "test-user"), ("appUserPw1", "password1234")])
            .with("team1/appCredentials2", &[("appUser2", "test-user"), ("appUserPw2", "password1234")]);
        let export = CredentialExport::test(
            "team1",
            vec![
                CredentialSource::new("appCredentials1", ["appUser1", "appUserPw1"]),
                CredentialSource::new("appCredentials2", ["appUser2", "appUserPw2"]),
            ],
        );

        let env = export.resolve(&store).unwrap();
        assert_eq!(env.len(), 4);
        assert_eq!(env["PIPER_TESTCREDENTIAL_APPUSER1"].expose(), "test-user");
        assert_eq!(env["PIPER_TESTCREDENTIAL_APPUSERPW2"].expose(), "password1234");
    }

    #[test]
    fn test_custom_test_credential_prefix_replaces_default() {
        let store =
            MemoryStore::default().with("team1/appCredentials", &[("appUser6", "test-user")]);
        let export = CredentialExport::test(
            "team1",
            vec![CredentialSource::new("appCredentials", ["appUser6"])],
        )
        .with_prefixes(["CUSTOM_CREDENTIAL_"]);

        let env = export.resolve(&store).unwrap();
        assert_eq!(env.keys().collect::<Vec<_>>(), vec!["CUSTOM_CREDENTIAL_APPUSER6"]);
    }

    #[test]
    fn test_prefix_per_path() {
        let store = MemoryStore::default()
            .with("team1/appCredentials1", &[("appUser", "test-user1")])
            .with("team1/appCredentials2", &[("appUser", "test-user2")]);
        let export = CredentialExport::test(
            "team1",
            vec![
                CredentialSource::new("appCredentials1", ["appUser"]),
                CredentialSource::new("appCredentials2", ["appUser"]),
            ],
        )
        .with_prefixes(["TEST1_", "TEST2_"]);

        let env = export.resolve(&store).unwrap();
        assert_eq!(env["TEST1_APPUSER"].expose(), "test-user1");
        assert_eq!(env["TEST2_APPUSER"].expose(), "test-user2");
    }

    #[test]
    fn test_general_credentials_always_use_standard_prefix() {
        let store = MemoryStore::default()
            .with("team1/appCredentials3", &[("appUser3", "test-user"), ("appUserPw3", "password1234")]);
        let export = CredentialExport::general(
            "team1",
            vec![CredentialSource::new("appCredentials3", ["appUser3", "appUserPw3"])],
        )
        .with_prefixes(["CUSTOM_MYCRED1_"]);

        let env = export.resolve(&store).unwrap();
        assert_eq!(env["CUSTOM_MYCRED1_APPUSER3"].expose(), "test-user");
        assert_eq!(env["PIPER_VAULTCREDENTIAL_APPUSER3"].expose(), "test-user");
        assert_eq!(env["PIPER_VAULTCREDENTIAL_APPUSERPW3"].expose(), "password1234");
        assert_eq!(env.len(), 4);
    }

    #[test]
    fn test_empty_custom_prefix() {
        let store = MemoryStore::default().with("team1/creds", &[("appUser", "u1234")]);
        let export =
            CredentialExport::general("team1", vec![CredentialSource::new("creds", ["appUser"])])
                .with_prefixes([""]);

        let env = export.resolve(&store).unwrap();
        assert!(env.contains_key("APPUSER"));
        assert!(env.contains_key("PIPER_VAULTCREDENTIAL_APPUSER"));
    }

    #[test]
    fn test_prefix_count_mismatch() {
        let export = CredentialExport::test(
            "team1",
            vec![CredentialSource::new("creds", ["a"])],
        )
        .with_prefixes(["A_", "B_"]);
        let err = export.resolve(&MemoryStore::default()).unwrap_err();
        assert!(matches!(err, SecretError::InvalidConfig { .. }));
    }

    #[test]
    fn test_unreadable_and_missing_sources_are_skipped() {
        let store = MemoryStore::default()
            .failing_at("team1/broken")
            .with("team1/ok", &[("user", "someone")]);
        let export = CredentialExport::general(
            "team1",
            vec![
                CredentialSource::new("broken", ["user"]),
                CredentialSource::new("absent", ["user"]),
                CredentialSource::new("ok", ["user", "missing"]),
            ],
        );

        let env = export.resolve(&store).unwrap();
        assert_eq!(env.keys().collect::<Vec<_>>(), vec!["PIPER_VAULTCREDENTIAL_USER"]);
    }

    mod proptest_tests {
        use super::*;

        proptest! {
            #[test]
            fn converted_names_are_env_safe(name in ".*") {
                let converted = convert_env_var(&name);
                prop_assert!(converted.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'));
            }
        }
    }
}
