//! Section identifiers.
//!
//! A section created in the editor carries a temporary id until the server
//! assigns one. Temporary ids are rendered as `tmp-<uuid>` so they can be
//! told apart from server ids anywhere a section id travels as a string.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Prefix reserved for client-generated ids
pub const TEMP_PREFIX: &str = "tmp-";

#[derive(Error, Debug, PartialEq)]
pub enum SectionIdError {
    #[error("Section id cannot be empty")]
    Empty,

    #[error("Invalid temporary section id: {0}")]
    InvalidTemporary(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SectionId {
    /// Client-generated placeholder, never sent to the server
    Temporary(Uuid),
    /// Id issued by the server
    Server(String),
}

impl SectionId {
    /// Generate a fresh temporary id
    pub fn temporary() -> Self {
        SectionId::Temporary(Uuid::new_v4())
    }

    pub fn server(id: impl Into<String>) -> Self {
        SectionId::Server(id.into())
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, SectionId::Temporary(_))
    }

    /// The server id, if this section has been persisted.
    pub fn as_server(&self) -> Option<&str> {
        match self {
            SectionId::Server(id) => Some(id),
            SectionId::Temporary(_) => None,
        }
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionId::Temporary(uuid) => write!(f, "{}{}", TEMP_PREFIX, uuid.simple()),
            SectionId::Server(id) => write!(f, "{}", id),
        }
    }
}

impl FromStr for SectionId {
    type Err = SectionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(SectionIdError::Empty);
        }

        match s.strip_prefix(TEMP_PREFIX) {
            Some(rest) => Uuid::parse_str(rest)
                .map(SectionId::Temporary)
                .map_err(|_| SectionIdError::InvalidTemporary(s.to_string())),
            None => Ok(SectionId::Server(s.to_string())),
        }
    }
}

impl Serialize for SectionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SectionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        SectionId::from_str(&s).map_err(serde::de::Error::custom)
    }
}
