//! Data models for the vpkmount engine.
//!
//! This module contains the core data structures shared across the crate:
//! - [`DeployMethod`]: copy vs. symbolic-link mounting strategy
//! - [`SearchPathsState`]: classification of the game's `SearchPaths` block
//! - [`InstallRequest`]: typed input of the `install_addon` command
//! - [`Settings`] / [`AddonEntry`]: the persisted configuration ledger
//! - Game layout constants ([`GAME_APP_ID`], [`GAME_INFO_REL`], ...)
//!
//! All config structs derive `Serialize`/`Deserialize` for YAML persistence
//! through [`SettingsManager`](crate::config::SettingsManager).

pub mod addon;
pub mod settings;

pub use addon::{
    ADDON_EXTENSION, DeployMethod, GAME_ADDONS_REL, GAME_APP_ID, GAME_INFO_BACKUP_REL,
    GAME_INFO_REL, InstallRequest, SearchPathsState,
};
pub use settings::{AddonEntry, Settings};
