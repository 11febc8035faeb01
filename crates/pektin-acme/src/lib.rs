//! Pektin DNS-01 authenticator
//!
//! This crate fulfills ACME DNS-01 challenges by publishing and retracting TXT
//! records through the Pektin registry API. Credentials are either sent to the
//! registry directly or exchanged at vault for a registry token.

pub mod config;
pub mod credentials;
pub mod registry;
pub mod response;
pub mod types;

mod authenticator;

pub use authenticator::{PektinAuthenticator, validation_name};
pub use credentials::CredentialResolver;
pub use registry::{RegistryClient, normalize_record_name};
pub use types::{
    AuthenticatorConfig, CHALLENGE_TTL, Credentials, PektinError, PektinResult, RegistryAuth,
    Session,
};
