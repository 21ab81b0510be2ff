//! API key type with automatic memory zeroization.
//!
//! The scoring service authenticates every request with an API key header.
//! `ApiKey` wraps the key material and clears it from memory when dropped,
//! and keeps it out of `Debug`/`Display` output.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::Zeroizing;

/// An API key that zeroizes its contents when dropped.
///
/// # Example
///
/// ```
/// use scorecal_client::ApiKey;
///
/// let key = ApiKey::new("my-api-key".to_string());
/// assert_eq!(key.expose_secret(), "my-api-key");
/// ```
#[derive(Clone)]
pub struct ApiKey(Zeroizing<String>);

impl ApiKey {
    /// Creates a new `ApiKey` from a `String`.
    pub fn new(key: String) -> Self {
        Self(Zeroizing::new(key))
    }

    /// Exposes the key for use in a request header.
    ///
    /// Avoid copying the returned value; copies are not zeroized.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Returns true if the key is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for ApiKey {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

impl From<&str> for ApiKey {
    fn from(key: &str) -> Self {
        Self::new(key.to_string())
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl PartialEq for ApiKey {
    fn eq(&self, other: &Self) -> bool {
        // Constant-time comparison to prevent timing attacks
        use subtle::ConstantTimeEq;
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl Eq for ApiKey {}

impl Serialize for ApiKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ApiKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let key = String::deserialize(deserializer)?;
        Ok(ApiKey::new(key))
    }
}
