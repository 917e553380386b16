//! Value types returned to callers.
//!
//! [`SecretString`] keeps resolved values and credentials out of logs,
//! debug output, and serialized structures. [`Secret`] is the envelope a
//! provider returns from `get_with_metadata`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A string wrapper that redacts its contents in Debug, Display, and serialization.
///
/// The memory is zeroed when the value is dropped. The only ways to read the
/// contents are [`SecretString::expose_secret`] and [`SecretString::into_inner`].
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Exposes the underlying value. Never log the result.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper and returns the inner value.
    pub fn into_inner(mut self) -> String {
        std::mem::take(&mut self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Config files carry real values, so deserialization is not redacted.
        String::deserialize(deserializer).map(SecretString)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretString {}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A resolved secret together with backend-reported metadata.
///
/// `value` is always complete: providers build a `Secret` only after the
/// whole value has been resolved.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Secret {
    /// The logical key the caller asked for, not the backend's internal path.
    pub key: String,

    pub value: SecretString,

    /// Backend-specific version token.
    pub version: Option<String>,

    /// Best-effort creation timestamp; `None` when the backend does not report one.
    pub created_at: Option<DateTime<Utc>>,

    pub expires_at: Option<DateTime<Utc>>,

    /// Informational backend fields (ARN, namespace, labels, ...).
    /// Never used for authorization decisions.
    pub metadata: HashMap<String, String>,
}

impl Secret {
    pub fn new(key: impl Into<String>, value: impl Into<SecretString>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            version: None,
            created_at: None,
            expires_at: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_created_at(mut self, created_at: Option<DateTime<Utc>>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Exposes the secret value. Never log the result.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }
}
