//! Bearer token claim decoding.
//!
//! Tokens are JWTs issued by the auth backend. The client only reads the
//! claims; it holds no key, so neither the signature nor `exp` is checked
//! here. The decoded identity is what the token *claims*, and anything
//! authorization-sensitive is enforced server-side.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use super::Role;

/// Errors that can occur while decoding a bearer token
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Token is empty")]
    Empty,

    #[error("Token is malformed: {0}")]
    Malformed(#[from] jsonwebtoken::errors::Error),

    #[error("Token has no user id claim")]
    MissingUserId,
}

/// Claims the client reads from a token
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    /// Account identifier (`id` claim, string or number)
    #[serde(rename = "id", deserialize_with = "deserialize_user_id", default)]
    pub user_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: Role,
    /// Expiry as a Unix timestamp, informational only
    #[serde(default)]
    pub exp: Option<i64>,
}

impl TokenClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }
}

fn deserialize_user_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

/// Decode the claims of `token` without verifying it.
pub fn decode_claims(token: &str) -> Result<TokenClaims, TokenError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(TokenError::Empty);
    }

    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)?;
    let claims = data.claims;

    if claims.user_id.trim().is_empty() {
        return Err(TokenError::MissingUserId);
    }

    Ok(claims)
}


#[cfg(test)]
mod tests {
    use super::test_tokens::{mint, user_token};
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_valid_token() {
        let token = user_token("u1", "Ann", "user");
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.user_id, "u1");
        assert_eq!(claims.name, "Ann");
        assert_eq!(claims.role, Role::User);
        assert_eq!(
            claims.expires_at().map(|t| t.timestamp()),
            Some(4_102_444_800)
        );
    }

    #[test]
    fn test_decode_ignores_signature_and_expiry() {
        // Signed with a key the client never sees, and long expired
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &json!({ "id": "u2", "name": "Bo", "role": "admin", "exp": 1 }),
            &jsonwebtoken::EncodingKey::from_secret(b"server-only"),
        )
        .unwrap();

        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.user_id, "u2");
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn test_decode_numeric_id_and_missing_optional_claims() {
        let token = mint(json!({ "id": 42 }));
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.user_id, "42");
        assert_eq!(claims.name, "");
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.exp, None);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_claims(""), Err(TokenError::Empty)));
        assert!(matches!(
            decode_claims("not-a-jwt"),
            Err(TokenError::Malformed(_))
        ));
        assert!(matches!(
            decode_claims("aaa.bbb.ccc"),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_requires_user_id() {
        let token = mint(json!({ "name": "Nobody", "role": "user" }));
        assert!(matches!(
            decode_claims(&token),
            Err(TokenError::MissingUserId)
        ));
    }
}
