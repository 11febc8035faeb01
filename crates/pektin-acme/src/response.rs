//! Registry response interpretation
//!
//! Registry generations answer with either a `type` string or an `error`
//! boolean. Shapes are tried in that order; anything else is rejected.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawResponse {
    Typed {
        #[serde(rename = "type")]
        kind: String,
        message: Option<String>,
    },
    Flagged {
        error: bool,
        message: Option<String>,
    },
}

/// Outcome of a registry call after parsing the body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryOutcome {
    Success,
    Failure(String),
    Malformed(String),
}

impl RegistryOutcome {
    pub fn parse(body: &str) -> Self {
        match serde_json::from_str::<RawResponse>(body) {
            Ok(RawResponse::Typed { kind, .. }) if kind == "success" => Self::Success,
            Ok(RawResponse::Typed { kind, message }) => Self::Failure(match message {
                Some(m) => format!("{}: {}", kind, m),
                None => kind,
            }),
            Ok(RawResponse::Flagged { error: false, .. }) => Self::Success,
            Ok(RawResponse::Flagged {
                error: true,
                message,
            }) => Self::Failure(message.unwrap_or_else(|| "no message".to_string())),
            Err(_) => Self::Malformed(format!(
                "response has neither a type nor an error field: {}",
                body
            )),
        }
    }
}
