//! Host-facing DNS-01 authenticator built on the registry client

use crate::config::load_credentials_file;
use crate::credentials::CredentialResolver;
use crate::registry::RegistryClient;
use crate::types::{AuthenticatorConfig, CHALLENGE_TTL, Credentials, PektinResult};
use std::time::Duration;
use tracing::{debug, info};

const ACME_CHALLENGE_LABEL: &str = "_acme-challenge";

/// DNS-01 authenticator backed by the Pektin registry
pub struct PektinAuthenticator {
    client: RegistryClient,
    propagation_seconds: u64,
}

impl PektinAuthenticator {
    /// Load the credentials file and resolve a registry session
    pub async fn setup(config: &AuthenticatorConfig) -> PektinResult<Self> {
        let map = load_credentials_file(&config.credentials_path)?;
        let credentials = Credentials::from_map(&map)?;
        Self::from_credentials(credentials, config.propagation_seconds).await
    }

    /// Resolve a registry session from already loaded credentials
    pub async fn from_credentials(
        credentials: Credentials,
        propagation_seconds: u64,
    ) -> PektinResult<Self> {
        debug!(mode = credentials.mode(), "Setting up Pektin authenticator");

        let http = reqwest::Client::new();
        let session = CredentialResolver::new(http.clone())
            .resolve(&credentials)
            .await?;

        Ok(Self {
            client: RegistryClient::new(http, session),
            propagation_seconds,
        })
    }

    /// Publish the validation value for one challenge
    pub async fn perform(
        &self,
        domain: &str,
        validation_name: &str,
        validation: &str,
    ) -> PektinResult<()> {
        self.client
            .add_record(domain, validation_name, validation, CHALLENGE_TTL)
            .await?;
        info!(domain, "DNS-01 challenge record published");
        Ok(())
    }

    /// Retract the validation value for one challenge. Never fails.
    pub async fn cleanup(&self, domain: &str, validation_name: &str, validation: &str) {
        self.client
            .remove_record(domain, validation_name, validation)
            .await;
    }

    pub fn propagation_seconds(&self) -> u64 {
        self.propagation_seconds
    }

    pub fn propagation_delay(&self) -> Duration {
        Duration::from_secs(self.propagation_seconds)
    }

    pub fn registry(&self) -> &RegistryClient {
        &self.client
    }
}

/// Record name holding the validation for `domain`.
///
/// Wildcard and apex share `_acme-challenge.<base>`.
pub fn validation_name(domain: &str) -> String {
    let base = domain.strip_prefix("*.").unwrap_or(domain);
    format!("{}.{}", ACME_CHALLENGE_LABEL, base.trim_end_matches('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PektinError;
    use std::io::Write;

    #[test]
    fn test_validation_name() {
        assert_eq!(validation_name("example.com"), "_acme-challenge.example.com");
        assert_eq!(validation_name("*.example.com"), "_acme-challenge.example.com");
        assert_eq!(
            validation_name("sub.example.com."),
            "_acme-challenge.sub.example.com"
        );
    }

    #[tokio::test]
    async fn test_setup_from_static_token_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "dns_pektin_api_token = abc").unwrap();
        writeln!(file, "dns_pektin_api_endpoint = http://127.0.0.1:3001").unwrap();

        let mut config = AuthenticatorConfig::new(file.path());
        config.propagation_seconds = 30;
        let authenticator = PektinAuthenticator::setup(&config).await.unwrap();

        assert_eq!(authenticator.propagation_seconds(), 30);
        assert_eq!(authenticator.propagation_delay(), Duration::from_secs(30));
        assert_eq!(authenticator.registry().session().base_uri, "http://127.0.0.1:3001");
    }

    #[tokio::test]
    async fn test_setup_missing_file() {
        let config = AuthenticatorConfig::new("/nonexistent/pektin.ini");
        let err = PektinAuthenticator::setup(&config).await.err().unwrap();
        assert!(matches!(err, PektinError::Configuration(_)));
    }
}
