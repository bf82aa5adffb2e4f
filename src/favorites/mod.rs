//! Country codes and the per-user favorites set.
//!
//! A [`FavoritesSet`] has set semantics (no duplicates, removing a missing code
//! is a no-op) but keeps insertion order so lists render the way the user built
//! them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced when parsing a country code
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CountryCodeError {
    #[error("Country code must not be empty")]
    Empty,

    #[error("Country code must be exactly 3 letters, got {0:?}")]
    InvalidLength(String),

    #[error("Country code must contain only ASCII letters, got {0:?}")]
    InvalidCharacters(String),
}

/// ISO 3166-1 alpha-3 style code (e.g. `FRA`), always stored upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode(String);

impl CountryCode {
    pub fn parse(raw: &str) -> Result<Self, CountryCodeError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CountryCodeError::Empty);
        }
        if trimmed.chars().count() != 3 {
            return Err(CountryCodeError::InvalidLength(trimmed.to_string()));
        }
        if !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CountryCodeError::InvalidCharacters(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CountryCode {
    type Err = CountryCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CountryCode {
    type Error = CountryCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CountryCode> for String {
    fn from(code: CountryCode) -> Self {
        code.0
    }
}

impl AsRef<str> for CountryCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Ordered set of favorite country codes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<CountryCode>", into = "Vec<CountryCode>")]
pub struct FavoritesSet {
    codes: Vec<CountryCode>,
}

impl FavoritesSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from raw strings, dropping entries that are not valid codes.
    ///
    /// Used for data we do not control (the local cache file and remote
    /// payloads), where one bad entry should not discard the whole list.
    pub fn from_lenient<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for value in raw {
            match CountryCode::parse(value.as_ref()) {
                Ok(code) => {
                    set.insert(code);
                }
                Err(e) => {
                    tracing::warn!(value = value.as_ref(), error = %e, "Skipping invalid country code");
                }
            }
        }
        set
    }

    pub fn contains(&self, code: &CountryCode) -> bool {
        self.codes.contains(code)
    }

    /// Insert a code, returning `false` if it was already present
    pub fn insert(&mut self, code: CountryCode) -> bool {
        if self.contains(&code) {
            return false;
        }
        self.codes.push(code);
        true
    }

    /// Remove a code, returning `false` if it was not present
    pub fn remove(&mut self, code: &CountryCode) -> bool {
        let before = self.codes.len();
        self.codes.retain(|c| c != code);
        self.codes.len() != before
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CountryCode> {
        self.codes.iter()
    }

    pub fn as_slice(&self) -> &[CountryCode] {
        &self.codes
    }

    /// Serialize to the cache representation: a JSON array of code strings
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.codes).unwrap_or_else(|_| "[]".to_string())
    }

    /// Parse the cache representation. Non-array input yields `None`.
    pub fn from_json(raw: &str) -> Option<Self> {
        let values: Vec<serde_json::Value> = serde_json::from_str(raw).ok()?;
        Some(Self::from_lenient(
            values.iter().filter_map(|v| v.as_str()),
        ))
    }
}

impl From<Vec<CountryCode>> for FavoritesSet {
    fn from(codes: Vec<CountryCode>) -> Self {
        let mut set = Self::new();
        for code in codes {
            set.insert(code);
        }
        set
    }
}

impl From<FavoritesSet> for Vec<CountryCode> {
    fn from(set: FavoritesSet) -> Self {
        set.codes
    }
}

impl FromIterator<CountryCode> for FavoritesSet {
    fn from_iter<T: IntoIterator<Item = CountryCode>>(iter: T) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl<'a> IntoIterator for &'a FavoritesSet {
    type Item = &'a CountryCode;
    type IntoIter = std::slice::Iter<'a, CountryCode>;

    fn into_iter(self) -> Self::IntoIter {
        self.codes.iter()
    }
}
