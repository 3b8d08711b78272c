// vpkmount - Addon deployment engine for Deadlock
//
// This is the library crate containing the deployment engine and its command
// boundary. The binary crate (main.rs) provides a headless status entry
// point; the desktop UI consumes the same boundary out of process.

pub mod commands;
pub mod config;
pub mod logging;
pub mod models;
pub mod services;

// Re-export commonly used types for convenience
pub use commands::{AddonEngine, EngineError};
pub use config::SettingsManager;
pub use models::{DeployMethod, InstallRequest, SearchPathsState, Settings};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
