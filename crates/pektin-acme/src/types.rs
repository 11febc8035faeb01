use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// TTL applied to challenge records, in seconds
pub const CHALLENGE_TTL: u32 = 120;

/// Configuration surface handed to the authenticator by the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatorConfig {
    /// Path to the Pektin credentials INI file
    pub credentials_path: PathBuf,
    /// Seconds the host waits for DNS propagation before asking for validation
    #[serde(default = "default_propagation_seconds")]
    pub propagation_seconds: u64,
}

fn default_propagation_seconds() -> u64 {
    10
}

impl AuthenticatorConfig {
    pub fn new(credentials_path: impl Into<PathBuf>) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            propagation_seconds: default_propagation_seconds(),
        }
    }
}

/// How the authenticator proves itself to the registry
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Static API token sent directly to the registry
    StaticToken { api_endpoint: String, token: String },
    /// Username and confidant password sent directly to the registry
    UsernameSecret {
        api_endpoint: String,
        username: String,
        confidant_password: String,
    },
    /// Username and confidant password exchanged at vault for the registry token
    BackendMediated {
        vault_endpoint: String,
        username: String,
        confidant_password: String,
    },
}

impl Credentials {
    /// Short name of the authentication mode, safe to log
    pub fn mode(&self) -> &'static str {
        match self {
            Self::StaticToken { .. } => "static-token",
            Self::UsernameSecret { .. } => "username-secret",
            Self::BackendMediated { .. } => "vault",
        }
    }
}

// Secrets never reach the logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaticToken { api_endpoint, .. } => f
                .debug_struct("StaticToken")
                .field("api_endpoint", api_endpoint)
                .finish_non_exhaustive(),
            Self::UsernameSecret {
                api_endpoint,
                username,
                ..
            } => f
                .debug_struct("UsernameSecret")
                .field("api_endpoint", api_endpoint)
                .field("username", username)
                .finish_non_exhaustive(),
            Self::BackendMediated {
                vault_endpoint,
                username,
                ..
            } => f
                .debug_struct("BackendMediated")
                .field("vault_endpoint", vault_endpoint)
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

/// Authorization fields merged into every registry request body
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RegistryAuth {
    Token {
        token: String,
    },
    Client {
        client_username: String,
        confidant_password: String,
    },
}

impl fmt::Debug for RegistryAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token { .. } => f.write_str("Token(..)"),
            Self::Client {
                client_username, ..
            } => f
                .debug_struct("Client")
                .field("client_username", client_username)
                .finish_non_exhaustive(),
        }
    }
}

/// Resolved registry location and authorization, valid for the process lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub base_uri: String,
    pub auth: RegistryAuth,
}

#[derive(Error, Debug)]
pub enum PektinError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Pektin registry error: {0}")]
    Registry(String),

    #[error("Cleanup failed: {0}")]
    Cleanup(String),
}

pub type PektinResult<T> = Result<T, PektinError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_propagation_seconds() {
        let config = AuthenticatorConfig::new("/etc/letsencrypt/pektin.ini");
        assert_eq!(config.propagation_seconds, 10);

        let config: AuthenticatorConfig =
            serde_json::from_str(r#"{"credentials_path": "/tmp/p.ini"}"#).unwrap();
        assert_eq!(config.propagation_seconds, 10);
        assert_eq!(config.credentials_path, PathBuf::from("/tmp/p.ini"));
    }

    #[test]
    fn test_registry_auth_fields() {
        let token = RegistryAuth::Token {
            token: "secret".into(),
        };
        assert_eq!(
            serde_json::to_value(&token).unwrap(),
            serde_json::json!({"token": "secret"})
        );

        let client = RegistryAuth::Client {
            client_username: "acme".into(),
            confidant_password: "pw".into(),
        };
        assert_eq!(
            serde_json::to_value(&client).unwrap(),
            serde_json::json!({"client_username": "acme", "confidant_password": "pw"})
        );
    }

    #[test]
    fn test_debug_hides_secrets() {
        let creds = Credentials::UsernameSecret {
            api_endpoint: "https://pektin.example.com".into(),
            username: "acme".into(),
            confidant_password: "hunter2".into(),
        };
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("acme"));
        assert!(!rendered.contains("hunter2"));

        let auth = RegistryAuth::Token {
            token: "hunter2".into(),
        };
        assert!(!format!("{:?}", auth).contains("hunter2"));
    }
}
