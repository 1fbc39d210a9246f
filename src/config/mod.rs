//! Configuration management
//!
//! Node construction takes an explicit `NodeConfig`; the binary seeds one
//! from environment overrides through `GLOBAL_CONFIG`.

pub mod settings;

pub use settings::{Config, NodeConfig, NodeRole, GLOBAL_CONFIG};
