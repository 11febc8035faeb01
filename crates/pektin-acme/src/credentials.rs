//! Credential resolution: turns configured credentials into a registry session
//!
//! Direct modes need no network access. The vault mode is a three step
//! exchange (login, fetch pektin-config, fetch gss_token) driven as a small
//! state machine; a failure at any step drops everything obtained so far.

use crate::config::CredentialMap;
use crate::types::{Credentials, PektinError, PektinResult, RegistryAuth, Session};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
const PEKTIN_CONFIG_KEY: &str = "pektin-config";
const GSS_TOKEN_KEY: &str = "gss_token";

impl Credentials {
    /// Select the authentication mode from the keys present.
    ///
    /// Fails with a configuration error naming the first missing key.
    pub fn from_map(map: &CredentialMap) -> PektinResult<Self> {
        let get = |key: &str| map.get(key).filter(|v| !v.is_empty());
        let require = |key: &str| {
            get(key).cloned().ok_or_else(|| {
                PektinError::Configuration(format!(
                    "The credentials file must contain {}.",
                    key
                ))
            })
        };
        let endpoint = |key: &str| require(key).map(|e| e.trim_end_matches('/').to_string());

        if get("vault_endpoint").is_some() {
            return Ok(Self::BackendMediated {
                vault_endpoint: endpoint("vault_endpoint")?,
                username: require("username")?,
                confidant_password: require("confidant_password")?,
            });
        }

        if let Some(token) = get("api_token") {
            return Ok(Self::StaticToken {
                api_endpoint: endpoint("api_endpoint")?,
                token: token.clone(),
            });
        }

        if get("username").is_some() || get("confidant_password").is_some() {
            return Ok(Self::UsernameSecret {
                username: require("username")?,
                confidant_password: require("confidant_password")?,
                api_endpoint: endpoint("api_endpoint")?,
            });
        }

        Err(PektinError::Configuration(
            "The credentials file must contain api_token (or username and confidant_password)."
                .into(),
        ))
    }
}

/// Progress through the vault exchange
enum VaultState {
    NotStarted,
    Authenticated { session_token: String },
    ConfigFetched { session_token: String, base_uri: String },
    Ready(Session),
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    auth: Option<LoginAuth>,
}

#[derive(Debug, Deserialize)]
struct LoginAuth {
    client_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KvResponse {
    data: Option<KvData>,
}

#[derive(Debug, Deserialize)]
struct KvData {
    data: Option<Map<String, Value>>,
}

/// Produces a [`Session`] from [`Credentials`], once per authenticator
pub struct CredentialResolver {
    http: reqwest::Client,
}

impl CredentialResolver {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub async fn resolve(&self, credentials: &Credentials) -> PektinResult<Session> {
        let session = match credentials {
            Credentials::StaticToken {
                api_endpoint,
                token,
            } => Session {
                base_uri: api_endpoint.clone(),
                auth: RegistryAuth::Token {
                    token: token.clone(),
                },
            },
            Credentials::UsernameSecret {
                api_endpoint,
                username,
                confidant_password,
            } => Session {
                base_uri: api_endpoint.clone(),
                auth: RegistryAuth::Client {
                    client_username: username.clone(),
                    confidant_password: confidant_password.clone(),
                },
            },
            Credentials::BackendMediated {
                vault_endpoint,
                username,
                confidant_password,
            } => {
                self.resolve_via_vault(vault_endpoint, username, confidant_password)
                    .await?
            }
        };

        info!(
            mode = credentials.mode(),
            registry = %session.base_uri,
            "Pektin session ready"
        );
        Ok(session)
    }

    async fn resolve_via_vault(
        &self,
        vault: &str,
        username: &str,
        password: &str,
    ) -> PektinResult<Session> {
        let mut state = VaultState::NotStarted;
        loop {
            state = match state {
                VaultState::NotStarted => VaultState::Authenticated {
                    session_token: self.login(vault, username, password).await?,
                },
                VaultState::Authenticated { session_token } => {
                    let config = self.kv_get(vault, &session_token, PEKTIN_CONFIG_KEY).await?;
                    VaultState::ConfigFetched {
                        base_uri: registry_base_from_config(&config)?,
                        session_token,
                    }
                }
                VaultState::ConfigFetched {
                    session_token,
                    base_uri,
                } => {
                    let secret = self.kv_get(vault, &session_token, GSS_TOKEN_KEY).await?;
                    let token = secret
                        .get("token")
                        .and_then(Value::as_str)
                        .filter(|t| !t.is_empty())
                        .ok_or_else(|| {
                            PektinError::Authentication(format!(
                                "vault secret {} has no token field",
                                GSS_TOKEN_KEY
                            ))
                        })?;
                    VaultState::Ready(Session {
                        base_uri,
                        auth: RegistryAuth::Token {
                            token: token.to_string(),
                        },
                    })
                }
                VaultState::Ready(session) => return Ok(session),
            };
        }
    }

    async fn login(&self, vault: &str, username: &str, password: &str) -> PektinResult<String> {
        let url = format!("{}/auth/login/{}", vault, username);
        debug!(url = %url, "Logging in to vault");

        let resp = self
            .http
            .post(&url)
            .form(&[("password", password)])
            .send()
            .await
            .map_err(|e| PektinError::Authentication(format!("vault login failed: {}", e)))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if status != StatusCode::OK {
            return Err(PektinError::Authentication(format!(
                "vault login failed: {} {}",
                status.as_u16(),
                body
            )));
        }

        serde_json::from_str::<LoginResponse>(&body)
            .ok()
            .and_then(|r| r.auth)
            .and_then(|a| a.client_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                PektinError::Authentication("vault login response has no client_token".into())
            })
    }

    /// Read a KV v2 secret and return its inner `data` object
    async fn kv_get(
        &self,
        vault: &str,
        session_token: &str,
        key: &str,
    ) -> PektinResult<Map<String, Value>> {
        let url = format!("{}/kv/data/{}", vault, key);
        debug!(url = %url, "Fetching secret from vault");

        let resp = self
            .http
            .get(&url)
            .header(AUTH_TOKEN_HEADER, session_token)
            .send()
            .await
            .map_err(|e| {
                PektinError::Authentication(format!("vault request for {} failed: {}", key, e))
            })?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if status != StatusCode::OK {
            return Err(PektinError::Authentication(format!(
                "vault request for {} failed: {} {}",
                key,
                status.as_u16(),
                body
            )));
        }

        serde_json::from_str::<KvResponse>(&body)
            .ok()
            .and_then(|r| r.data)
            .and_then(|d| d.data)
            .ok_or_else(|| {
                PektinError::Authentication(format!("vault secret {} has no data", key))
            })
    }
}

/// Registry base from pektin-config: explicit `apiEndpoint`, else
/// `https://{apiSubDomain}.{domain}`
fn registry_base_from_config(config: &Map<String, Value>) -> PektinResult<String> {
    let field = |name: &str| {
        config
            .get(name)
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
    };

    if let Some(endpoint) = field("apiEndpoint") {
        return Ok(endpoint.trim_end_matches('/').to_string());
    }

    let missing = |name: &str| {
        PektinError::Configuration(format!("pektin-config is missing {}", name))
    };
    let sub_domain = field("apiSubDomain").ok_or_else(|| missing("apiSubDomain"))?;
    let domain = field("domain").ok_or_else(|| missing("domain"))?;
    Ok(format!(
        "https://{}.{}",
        sub_domain,
        domain.trim_end_matches('.')
    ))
}
