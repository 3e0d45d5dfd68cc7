//! tally-config
//!
//! Operator configuration for the tally tools: the `Config` file model and
//! its on-disk manager with timestamped backups.

pub mod error;
pub mod manager;
pub mod model;

pub use error::ConfigError;
pub use manager::ConfigManager;
pub use model::{Backend, Config};
