//! The authenticated session value.

mod token;

pub use token::{decode_claims, TokenClaims, TokenError};

#[cfg(test)]
pub(crate) use token::test_tokens;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::favorites::FavoritesSet;

/// Access level carried in the token. Informational only.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    #[default]
    User,
    Admin,
    Other(String),
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.to_lowercase().as_str() {
            "" | "user" => Role::User,
            "admin" => Role::Admin,
            _ => Role::Other(value),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Admin => f.write_str("admin"),
            Role::Other(other) => f.write_str(other),
        }
    }
}

/// Current authenticated user, credential and favorites.
///
/// Never mutated in place once published; changes produce a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub name: String,
    pub role: Role,
    pub token: String,
    pub favorites: FavoritesSet,
    expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn from_claims(claims: TokenClaims, token: String, favorites: FavoritesSet) -> Self {
        let expires_at = claims.expires_at();
        Self {
            user_id: claims.user_id,
            name: claims.name,
            role: claims.role,
            token,
            favorites,
            expires_at,
        }
    }

    /// Same identity and credential with a different favorites set
    pub fn with_favorites(&self, favorites: FavoritesSet) -> Self {
        Self {
            favorites,
            ..self.clone()
        }
    }

    /// Expiry claimed by the token. Not enforced by the client.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Whether the session carries enough identity to talk to the remote store
    pub fn can_sync(&self) -> bool {
        !self.user_id.is_empty() && !self.token.is_empty()
    }
}
