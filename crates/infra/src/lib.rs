//! Infrastructure layer: dispatch queues, platform clients, mapping store,
//! periodic maintenance and runtime wiring.

pub mod config;
pub mod dispatch;
pub mod platform;
pub mod profile_picture;
pub mod reconcile;
pub mod runtime;
pub mod scheduler;
pub mod store;

pub use config::{BridgeConfig, ConfigError};
pub use runtime::BridgeRuntime;
