//! Pektin registry record management for ACME DNS-01 challenges

use crate::response::RegistryOutcome;
use crate::types::{PektinError, PektinResult, RegistryAuth, Session};
use reqwest::StatusCode;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as SyncMutex, MutexGuard, PoisonError};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const TXT: &str = "TXT";

#[derive(Debug, Serialize)]
struct SetRequest<'a> {
    #[serde(flatten)]
    auth: &'a RegistryAuth,
    records: Vec<SetRecord<'a>>,
}

#[derive(Debug, Serialize)]
struct SetRecord<'a> {
    name: &'a str,
    ttl: u32,
    rr_set: Vec<RrEntry<'a>>,
    rr_type: &'static str,
}

#[derive(Debug, Serialize)]
struct RrEntry<'a> {
    ttl: u32,
    value: TxtValue<'a>,
}

#[derive(Debug, Serialize)]
struct TxtValue<'a> {
    #[serde(rename = "TXT")]
    txt: &'a str,
}

#[derive(Debug, Serialize)]
struct DeleteRequest<'a> {
    #[serde(flatten)]
    auth: &'a RegistryAuth,
    records: Vec<DeleteKey<'a>>,
}

#[derive(Debug, Serialize)]
struct DeleteKey<'a> {
    name: &'a str,
    rr_type: &'static str,
}

/// TXT values this client has placed under one name
#[derive(Debug, Default)]
struct PendingValues {
    ttl: u32,
    values: Vec<String>,
}

type PendingKey = (String, String);
type PendingMap = HashMap<PendingKey, Arc<Mutex<PendingValues>>>;

/// Client for the registry's `/set` and `/delete` endpoints.
///
/// `/set` replaces the whole record set of a name, so the client keeps every
/// value it has added per (domain, name) and always sends the full set.
/// Calls for the same domain and name are serialized; other names proceed
/// independently. The map itself sits behind a synchronous lock that is never
/// held across a request.
pub struct RegistryClient {
    http: reqwest::Client,
    session: Arc<Session>,
    pending: SyncMutex<PendingMap>,
}

impl RegistryClient {
    pub fn new(http: reqwest::Client, session: Session) -> Self {
        Self {
            http,
            session: Arc::new(session),
            pending: SyncMutex::new(HashMap::new()),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Add a TXT value under `record_name`, keeping values added earlier for
    /// the same domain.
    pub async fn add_record(
        &self,
        domain: &str,
        record_name: &str,
        record_value: &str,
        ttl: u32,
    ) -> PektinResult<()> {
        let name = normalize_record_name(record_name);
        if name == "." {
            return Err(PektinError::Configuration("record name is empty".into()));
        }
        if record_value.is_empty() {
            return Err(PektinError::Configuration("record value is empty".into()));
        }

        debug!(domain, record_name = %name, "Attempting to add record");

        let entry = self.pending_entry(domain, &name);
        let mut pending = entry.lock().await;

        let newly_added = !pending.values.iter().any(|v| v == record_value);
        if newly_added {
            pending.values.push(record_value.to_string());
        }
        pending.ttl = ttl;

        let result = self.send_set(&name, &pending.values, ttl).await;
        if let Err(e) = result {
            if newly_added {
                pending.values.retain(|v| v != record_value);
            }
            return Err(e);
        }

        info!(
            domain,
            record_name = %name,
            values = pending.values.len(),
            "Added challenge TXT record"
        );
        Ok(())
    }

    /// Withdraw a TXT value. Failures are logged, never returned.
    ///
    /// Sibling values still pending under the same name are re-sent with
    /// `/set`; the name is deleted only once no value is left.
    pub async fn remove_record(&self, domain: &str, record_name: &str, record_value: &str) {
        let name = normalize_record_name(record_name);
        if name == "." {
            warn!(domain, "Could not delete record: record name is empty");
            return;
        }
        debug!(domain, record_name = %name, "Deleting record");

        let entry = self.pending_entry(domain, &name);
        let mut pending = entry.lock().await;
        pending.values.retain(|v| v != record_value);

        let result = if pending.values.is_empty() {
            self.send_delete(&name).await
        } else {
            self.send_set(&name, &pending.values, pending.ttl)
                .await
                .map_err(|e| PektinError::Cleanup(e.to_string()))
        };

        match result {
            Ok(()) => info!(
                domain,
                record_name = %name,
                remaining = pending.values.len(),
                "Removed challenge TXT record"
            ),
            Err(e) => warn!(
                domain,
                record_name = %name,
                error = %e,
                "Could not delete record"
            ),
        }

        if pending.values.is_empty() {
            self.evict_if_idle(domain, &name, &entry);
        }
    }

    fn pending_map(&self) -> MutexGuard<'_, PendingMap> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending_entry(&self, domain: &str, name: &str) -> Arc<Mutex<PendingValues>> {
        self.pending_map()
            .entry((domain.to_string(), name.to_string()))
            .or_default()
            .clone()
    }

    /// Drop an emptied entry unless another call already holds a handle to it.
    ///
    /// Handles are only cloned under the map lock, so the count cannot grow
    /// while it is being checked.
    fn evict_if_idle(&self, domain: &str, name: &str, entry: &Arc<Mutex<PendingValues>>) {
        let mut map = self.pending_map();
        // One reference in the map, one held by the caller.
        if Arc::strong_count(entry) == 2 {
            map.remove(&(domain.to_string(), name.to_string()));
        }
    }

    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.pending_map().len()
    }

    async fn send_set(&self, name: &str, values: &[String], ttl: u32) -> PektinResult<()> {
        let url = format!("{}/set", self.session.base_uri);
        let request = SetRequest {
            auth: &self.session.auth,
            records: vec![SetRecord {
                name,
                ttl,
                rr_set: values
                    .iter()
                    .map(|v| RrEntry {
                        ttl,
                        value: TxtValue { txt: v },
                    })
                    .collect(),
                rr_type: TXT,
            }],
        };

        let resp = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| PektinError::Registry(format!("Error setting record: {}", e)))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if status != StatusCode::OK {
            return Err(PektinError::Registry(format!(
                "Error setting record: {} {}",
                status.as_u16(),
                body
            )));
        }

        match RegistryOutcome::parse(&body) {
            RegistryOutcome::Success => Ok(()),
            RegistryOutcome::Failure(message) => Err(PektinError::Registry(format!(
                "Pektin API response indicates an error: {}",
                message
            ))),
            RegistryOutcome::Malformed(detail) => Err(PektinError::Registry(format!(
                "JSON response from Pektin API is invalid: {}",
                detail
            ))),
        }
    }

    async fn send_delete(&self, name: &str) -> PektinResult<()> {
        let url = format!("{}/delete", self.session.base_uri);
        let request = DeleteRequest {
            auth: &self.session.auth,
            records: vec![DeleteKey { name, rr_type: TXT }],
        };

        let resp = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| PektinError::Cleanup(format!("HTTP request failed: {}", e)))?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(PektinError::Cleanup(format!(
                "{} {}",
                status.as_u16(),
                body
            )));
        }
        Ok(())
    }
}

/// Ensure a record name ends with exactly one trailing dot
pub fn normalize_record_name(name: &str) -> String {
    format!("{}.", name.trim_end_matches('.'))
}
