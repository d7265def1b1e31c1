//! Configuration for drsnap: file locations, retry policy, snapshot naming
//! and worker concurrency, loaded from YAML with sensible defaults.

pub mod config;
pub mod loader;

pub use config::{AppConfig, RetrySettings, SnapshotSettings};
pub use loader::{ConfigLoader, CONFIG_FILE_NAME};
