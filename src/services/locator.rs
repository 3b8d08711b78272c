//! Game and storage path discovery.
//!
//! Locates the Deadlock installation through the local Steam libraries and
//! validates the user-chosen addon storage directory. Discovery is read-only
//! and never fails hard: an unresolvable game path is reported as `None` and
//! the reason is logged, since a missing game is an expected state during
//! onboarding, not an error.

use crate::models::{GAME_ADDONS_REL, GAME_APP_ID, GAME_INFO_BACKUP_REL, GAME_INFO_REL};
use camino::{Utf8Path, Utf8PathBuf};
use std::io;
use steamlocate::SteamDir;
use thiserror::Error;

/// Errors from storage-directory validation.
#[derive(Error, Debug)]
pub enum LocatorError {
    #[error("addon storage path cannot be inside the game installation")]
    InstallPathInsideGame,

    #[error("addon storage path {0} is not writable")]
    InstallPathNotWritable(Utf8PathBuf),

    #[error("could not access {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Locate the game root directory through the Steam installation.
///
/// Returns `None` when Steam or the game cannot be found, or when the
/// resolved path is not valid UTF-8; the cause is logged at warn level.
pub fn find_game_path() -> Option<Utf8PathBuf> {
    let steam_dir = match SteamDir::locate() {
        Ok(dir) => dir,
        Err(e) => {
            tracing::warn!("Steam installation not found: {}", e);
            return None;
        }
    };

    let (app, library) = match steam_dir.find_app(GAME_APP_ID) {
        Ok(Some(found)) => found,
        Ok(None) => {
            tracing::info!("Deadlock (app {}) is not installed", GAME_APP_ID);
            return None;
        }
        Err(e) => {
            tracing::warn!("Failed to scan Steam libraries: {}", e);
            return None;
        }
    };

    let app_dir = library.resolve_app_dir(&app);
    match Utf8PathBuf::from_path_buf(app_dir) {
        Ok(path) => {
            tracing::info!("Found game installation at {}", path);
            Some(path)
        }
        Err(path) => {
            tracing::warn!("Game path is not valid UTF-8: {}", path.display());
            None
        }
    }
}

/// Path of the game's KeyValues manifest under the given game root.
pub fn game_info_path(game_root: &Utf8Path) -> Utf8PathBuf {
    game_root.join(GAME_INFO_REL)
}

/// Path of the pristine-manifest backup under the given game root.
pub fn game_info_backup_path(game_root: &Utf8Path) -> Utf8PathBuf {
    game_root.join(GAME_INFO_BACKUP_REL)
}

/// The game's active addon directory under the given game root.
pub fn addons_dir(game_root: &Utf8Path) -> Utf8PathBuf {
    game_root.join(GAME_ADDONS_REL)
}

/// Validate and prepare an addon storage directory.
///
/// The directory must not live inside the game installation (uninstalling
/// the game would silently delete the user's library), is created when
/// absent, and must be writable. Writability is checked by creating and
/// dropping an anonymous temp file in it.
pub fn prepare_install_dir(
    install_path: &Utf8Path,
    game_path: Option<&Utf8Path>,
) -> Result<(), LocatorError> {
    if let Some(game_path) = game_path {
        if install_path.starts_with(game_path) {
            return Err(LocatorError::InstallPathInsideGame);
        }
    }

    if !install_path.exists() {
        std::fs::create_dir_all(install_path).map_err(|source| LocatorError::Io {
            path: install_path.to_path_buf(),
            source,
        })?;
        tracing::info!("Created addon storage directory {}", install_path);
    }

    match tempfile::tempfile_in(install_path) {
        Ok(_probe) => Ok(()),
        Err(e) => {
            tracing::warn!("Storage directory {} failed write probe: {}", install_path, e);
            Err(LocatorError::InstallPathNotWritable(
                install_path.to_path_buf(),
            ))
        }
    }
}
