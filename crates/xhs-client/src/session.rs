//! Per-session client identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque token tying REST calls and the WebSocket stream to one backend
/// conversation.
///
/// Generated once when the client starts and never rotated.  Uniqueness is
/// time-based: the current Unix time in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Generate a fresh identifier from the current time.
    pub fn generate() -> Self {
        Self(chrono::Utc::now().timestamp_millis().to_string())
    }

    /// Wrap an existing identifier, e.g. one passed on the command line.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
