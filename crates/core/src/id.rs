//! Strongly-typed identifiers used across the bridge.
//!
//! The forum platform addresses everything with signed 64-bit integers
//! (group ids are negative for supergroups); the peer platform uses opaque
//! string identifiers.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a forum group chat.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(i64);

/// Identifier of a topic (thread), scoped to its group.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(i64);

macro_rules! impl_i64_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $t {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = s
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(value))
            }
        }
    };
}

impl_i64_newtype!(GroupId, "GroupId");
impl_i64_newtype!(ThreadId, "ThreadId");

impl ThreadId {
    /// Highest thread id that still denotes the group's default topic.
    pub const DEFAULT_TOPIC_MAX: i64 = 1;

    /// `0` and `1` both address the "General" topic, which the forum platform
    /// never lets anyone delete.
    pub const fn is_default_topic(self) -> bool {
        self.0 <= Self::DEFAULT_TOPIC_MAX
    }
}

/// Identifier of a chat on the peer platform (a contact or a group).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerChatId(String);

impl PeerChatId {
    /// Validate and wrap a raw peer identifier.
    pub fn parse(raw: impl Into<String>) -> Result<Self, DomainError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_id("PeerChatId: empty"));
        }
        if trimmed.len() != raw.len() {
            return Ok(Self(trimmed.to_string()));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before the `@server` suffix, if the identifier carries one.
    pub fn user(&self) -> &str {
        self.0.split_once('@').map_or(self.0.as_str(), |(user, _)| user)
    }
}

impl core::fmt::Display for PeerChatId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PeerChatId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for PeerChatId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
