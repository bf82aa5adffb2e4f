//! Remote collaborators: the favorites store and the token issuer.
//!
//! Response bodies are decoded once here, at the network boundary, so the
//! session store only ever branches on closed types.

mod auth;
mod http;

pub use auth::{validate_registration, AuthClient, RegistrationRequest};
pub use http::HttpFavoritesRemote;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::favorites::{CountryCode, FavoritesSet};

/// Errors returned by remote calls
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Failed to reach server: {0}")]
    Network(String),

    #[error("Authentication required or token rejected")]
    Unauthorized,

    #[error("Server returned error {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Unexpected response from server: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteError::InvalidResponse(e.to_string())
        } else {
            RemoteError::Network(e.to_string())
        }
    }
}

/// What a successful add/remove call told us about the resulting favorites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Body carried `user.favorites`
    FullUser(FavoritesSet),
    /// Body carried a top-level `favorites`
    FavoritesOnly(FavoritesSet),
    /// Success without a usable favorites payload
    Ambiguous,
}

impl MutationOutcome {
    /// Classify a success body. Anything unparseable is `Ambiguous`.
    pub fn from_body(body: &str) -> Self {
        let value: Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(_) => return MutationOutcome::Ambiguous,
        };

        if let Some(favorites) = value
            .get("user")
            .and_then(|user| user.get("favorites"))
            .and_then(favorites_from_value)
        {
            return MutationOutcome::FullUser(favorites);
        }

        if let Some(favorites) = value.get("favorites").and_then(favorites_from_value) {
            return MutationOutcome::FavoritesOnly(favorites);
        }

        MutationOutcome::Ambiguous
    }
}

/// Decode the body of a favorites fetch: `{"favorites": [...]}` or a bare array.
pub fn favorites_from_fetch_body(body: &str) -> Option<FavoritesSet> {
    let value: Value = serde_json::from_str(body).ok()?;
    match &value {
        Value::Array(_) => favorites_from_value(&value),
        Value::Object(_) => value.get("favorites").and_then(favorites_from_value),
        _ => None,
    }
}

fn favorites_from_value(value: &Value) -> Option<FavoritesSet> {
    let items = value.as_array()?;
    Some(FavoritesSet::from_lenient(
        items.iter().filter_map(Value::as_str),
    ))
}

/// Error body shape used by the backend: `{"message": "..."}`
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// Best human-readable message from an error response body
pub(crate) fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            message: Some(message),
            ..
        }) => message,
        Ok(ErrorBody {
            error: Some(error), ..
        }) => error,
        _ => body.trim().to_string(),
    }
}

/// Remote source of truth for a user's favorites.
#[async_trait]
pub trait FavoritesRemote: Send + Sync {
    async fn fetch(&self, user_id: &str, token: &str) -> Result<FavoritesSet, RemoteError>;

    async fn add(
        &self,
        user_id: &str,
        code: &CountryCode,
        token: &str,
    ) -> Result<MutationOutcome, RemoteError>;

    async fn remove(
        &self,
        user_id: &str,
        code: &CountryCode,
        token: &str,
    ) -> Result<MutationOutcome, RemoteError>;
}


#[cfg(test)]
mod tests {
    use super::*;

    fn set(codes: &[&str]) -> FavoritesSet {
        FavoritesSet::from_lenient(codes.iter().copied())
    }

    #[test]
    fn test_outcome_prefers_user_favorites() {
        let body = r#"{"user":{"favorites":["FRA","ITA"]},"favorites":["DEU"]}"#;
        assert_eq!(
            MutationOutcome::from_body(body),
            MutationOutcome::FullUser(set(&["FRA", "ITA"]))
        );
    }

    #[test]
    fn test_outcome_falls_back_to_top_level_favorites() {
        let body = r#"{"user":{"name":"Ann"},"favorites":["DEU"]}"#;
        assert_eq!(
            MutationOutcome::from_body(body),
            MutationOutcome::FavoritesOnly(set(&["DEU"]))
        );
    }

    #[test]
    fn test_outcome_empty_list_is_authoritative() {
        assert_eq!(
            MutationOutcome::from_body(r#"{"favorites":[]}"#),
            MutationOutcome::FavoritesOnly(FavoritesSet::new())
        );
    }

    #[test]
    fn test_outcome_ambiguous_bodies() {
        for body in ["", "OK", r#"{"message":"added"}"#, r#"{"favorites":"FRA"}"#, "null"] {
            assert_eq!(
                MutationOutcome::from_body(body),
                MutationOutcome::Ambiguous,
                "body: {body:?}"
            );
        }
    }

    #[test]
    fn test_fetch_body_shapes() {
        assert_eq!(
            favorites_from_fetch_body(r#"{"favorites":["FRA","DEU"]}"#),
            Some(set(&["FRA", "DEU"]))
        );
        assert_eq!(
            favorites_from_fetch_body(r#"["ESP"]"#),
            Some(set(&["ESP"]))
        );
        assert_eq!(favorites_from_fetch_body(r#"{"user":"u1"}"#), None);
        assert_eq!(favorites_from_fetch_body("garbage"), None);
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"message":"Invalid credentials"}"#), "Invalid credentials");
        assert_eq!(error_message(r#"{"error":"nope"}"#), "nope");
        assert_eq!(error_message(" plain text \n"), "plain text");
    }
}
