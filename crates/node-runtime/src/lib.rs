//! # Node Runtime Library
//!
//! Configuration loading and node assembly behind the `node-runtime`
//! binary, exposed for tests and embedding.
//!
//! - `config` - `AdapterConfig` from file plus environment overrides
//! - `builtin` - handlers every node answers
//! - `runtime` - [`NodeRuntime`]: startup, event logging, shutdown

pub mod builtin;
pub mod config;
pub mod runtime;

pub use config::{load_config, load_config_from};
pub use runtime::NodeRuntime;
