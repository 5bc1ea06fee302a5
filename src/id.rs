use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::Rng as _;
use serde::{Deserialize, Serialize};

/// Opaque session identifier carried in the session cookie.
///
/// Ids are plain strings on the wire and in the store. The [`Default`]
/// implementation draws 24 bytes from the thread-local CSPRNG and encodes them
/// as unpadded base64url (192 bits of entropy), which is what the session
/// resolver uses unless a custom generator is configured via
/// [`SessionConfig::with_genid`](crate::SessionConfig::with_genid).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    /// Wrap an existing identifier, e.g. one read from a cookie.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Id {
    fn default() -> Self {
        let mut bytes = [0u8; 24];
        rand::thread_rng().fill(&mut bytes[..]);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
