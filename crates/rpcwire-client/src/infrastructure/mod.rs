//! Infrastructure layer for the client.
//!
//! Contains the adapters around the dispatcher: the TOML configuration that
//! builds a connected transport stack, and a listener that reports
//! connection lifecycle events through `tracing`.
//!
//! **Dependency rule**: this layer may depend on `application`, `domain` and
//! `rpcwire_core`, but MUST NOT be imported by the `application` or `domain`
//! layers.

pub mod config;
pub mod listener;

pub use config::{ClientConfig, ConfigError};
pub use listener::LoggingListener;
