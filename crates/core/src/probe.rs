//! Classification of topic-existence probes.
//!
//! The forum platform has no "does this topic exist" endpoint. Existence is
//! inferred by issuing an idempotent reopen call and matching the text of the
//! error it returns.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error signatures meaning the topic is gone.
pub const NOT_FOUND_SIGNATURES: [&str; 3] =
    ["TOPIC_NOT_FOUND", "TOPIC_ID_INVALID", "MESSAGE_THREAD_INVALID"];

/// Error signature of a reopen that changed nothing (topic already open).
pub const NOT_MODIFIED_SIGNATURE: &str = "TOPIC_NOT_MODIFIED";

/// Outcome of a topic-existence probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// The call succeeded, or failed ambiguously.
    Exists,
    /// The reopen was a no-op; still proves the topic exists.
    Unchanged,
    /// The topic was deleted on the forum side.
    NotFound,
}

impl ProbeOutcome {
    /// Classify the text of a probe error.
    ///
    /// Matching is a case-insensitive substring search. "Not found" wins over
    /// "not modified"; anything unrecognised is treated as `Exists` so that an
    /// ambiguous failure never leads to a delete.
    pub fn classify_error(text: &str) -> Self {
        let upper = text.to_ascii_uppercase();
        if NOT_FOUND_SIGNATURES.iter().any(|sig| upper.contains(sig)) {
            Self::NotFound
        } else if upper.contains(NOT_MODIFIED_SIGNATURE) {
            Self::Unchanged
        } else {
            Self::Exists
        }
    }

    /// Classify the result of a probe call.
    pub fn classify<T, E: fmt::Display>(result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => Self::Exists,
            Err(err) => Self::classify_error(&err.to_string()),
        }
    }

    pub fn is_not_found(self) -> bool {
        matches!(self, Self::NotFound)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exists => "exists",
            Self::Unchanged => "unchanged",
            Self::NotFound => "not_found",
        }
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
