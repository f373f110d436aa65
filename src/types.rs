//! Shared identifier types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Correlation identifier carried in a stanza's `id` attribute.
pub type StanzaId = String;

/// Opaque entity address. Used as the roster key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Jid(String);

impl Jid {
    /// Wraps an address without validating it.
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// Full address text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Address with any `/resource` suffix stripped.
    pub fn bare(&self) -> Jid {
        match self.0.split_once('/') {
            Some((bare, _)) => Jid(bare.to_string()),
            None => self.clone(),
        }
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Jid {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Jid {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Unique key of one client session within a process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientKey(String);

impl ClientKey {
    /// Wraps a session key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ClientKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}
