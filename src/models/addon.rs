use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Steam application id of Deadlock (internal name "Citadel").
pub const GAME_APP_ID: u32 = 1422450;

/// Location of the game's KeyValues manifest, relative to the game root.
pub const GAME_INFO_REL: &str = "game/citadel/gameinfo.gi";

/// Backup of the pristine manifest, written on first search-path modification.
pub const GAME_INFO_BACKUP_REL: &str = "game/citadel/gameinfo.gi.bak";

/// The game's active addon content directory, relative to the game root.
pub const GAME_ADDONS_REL: &str = "game/citadel/addons";

/// File extension of addon content packages (Valve Pak).
pub const ADDON_EXTENSION: &str = "vpk";

/// How an installed addon is materialized into the game's addon directory.
///
/// `Symlink` is only selectable when the host filesystem and privilege level
/// allow creating symbolic links (probed once per session, see
/// [`AddonEngine::is_symlink_available`](crate::commands::AddonEngine::is_symlink_available)).
/// Switching the method never rewrites already-mounted addons; the new method
/// applies from the next mount onward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployMethod {
    #[default]
    Copy,
    Symlink,
}

/// Classification of the game's `SearchPaths` block.
///
/// - `Vanilla`: exactly the untouched retail configuration
/// - `Modded`: exactly the configuration this engine injects
/// - `Custom`: anything else (edited by hand or by another tool); the engine
///   refuses to touch it except through an explicit reset from backup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchPathsState {
    Vanilla,
    Modded,
    Custom,
}

/// Input of the `install_addon` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallRequest {
    /// Source package file to install, as picked or dropped by the user.
    pub file_path: Utf8PathBuf,

    /// Explicit target file name inside the store. When absent, the source's
    /// base name is used and a collision with an installed addon is an error;
    /// when present, the caller has resolved the collision and an existing
    /// addon under this name is replaced.
    #[serde(default)]
    pub file_name: Option<String>,

    /// Display name recorded in the settings ledger. Defaults to the file name.
    #[serde(default)]
    pub display_name: Option<String>,
}
