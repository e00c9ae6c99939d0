//! `topicbridge-core`: domain building blocks of the bridge.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! platform identifiers, the persisted mapping rows and the classification of
//! topic-existence probes.

pub mod error;
pub mod id;
pub mod mapping;
pub mod probe;

pub use error::DomainError;
pub use id::{GroupId, PeerChatId, ThreadId};
pub use mapping::{ChatThreadPair, MessageIdPair};
pub use probe::ProbeOutcome;
