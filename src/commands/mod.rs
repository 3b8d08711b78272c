//! The command boundary consumed by the presentation layer.
//!
//! [`AddonEngine`] is the one type the (out-of-process) UI talks to. It owns
//! the session state (discovered game path, loaded settings, the cached
//! symbolic-link probe, and per-addon operation locks) and dispatches into
//! the stateless services. Every operation returns `Result<_, EngineError>`;
//! nothing panics across this boundary, and the UI renders
//! `EngineError::to_string()` in its failure dialog.
//!
//! Mutating operations on a single addon (`mount_addon`, `unmount_addon`,
//! `uninstall_addon`) are `async` and serialize per addon name through a
//! lock map, so two racing operations on the same addon can never interleave
//! their filesystem writes. Operations on distinct addons run freely in
//! parallel. Read-only commands and whole-settings mutations are plain
//! synchronous calls.
//!
//! The filesystem is the ground truth throughout: "mounted" is answered by
//! enumerating the game's addon directory, never by a persisted mount table
//! that could drift out of sync.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::SettingsManager;
use crate::models::{
    ADDON_EXTENSION, AddonEntry, DeployMethod, InstallRequest, SearchPathsState,
    Settings,
};
use crate::services::{
    deploy::{DeployError, Deployer},
    locator::{self, LocatorError},
    search_paths::{SearchPathsError, SearchPathsFile},
    store::{AddonStore, StoreError},
};

/// Failure channel of every engine command.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("game installation not found")]
    NoGamePath,

    #[error("no addon storage directory is configured")]
    NoInstallPath,

    #[error("search paths are in the {0:?} state; deployment requires the modded state")]
    NotModded(SearchPathsState),

    #[error("symbolic links are not available on this system")]
    SymlinkUnavailable,

    #[error(transparent)]
    SearchPaths(#[from] SearchPathsError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Locator(#[from] LocatorError),

    #[error("settings could not be persisted: {0}")]
    Settings(anyhow::Error),
}

/// Mutable session state behind the engine's lock.
struct EngineState {
    settings: Settings,

    /// Result of the one-shot symbolic-link probe; `None` until first asked.
    symlink_support: Option<bool>,
}

/// The addon deployment engine.
pub struct AddonEngine {
    /// Discovered once at construction; a changed game path means building a
    /// fresh engine.
    game_path: Option<Utf8PathBuf>,

    settings_manager: SettingsManager,
    state: RwLock<EngineState>,

    /// Per-addon-name operation locks for mount/unmount/uninstall.
    addon_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AddonEngine {
    /// Build an engine, discovering the game through Steam and loading
    /// persisted settings.
    pub fn new(settings_manager: SettingsManager) -> anyhow::Result<Self> {
        Self::with_game_path(locator::find_game_path(), settings_manager)
    }

    /// Build an engine against an explicit game root (or none).
    ///
    /// This is the constructor tests use with fixture directories; `new`
    /// delegates here after Steam discovery.
    pub fn with_game_path(
        game_path: Option<Utf8PathBuf>,
        settings_manager: SettingsManager,
    ) -> anyhow::Result<Self> {
        let settings = settings_manager.load()?;

        let symlink_support = settings
            .install_path
            .as_deref()
            .filter(|dir| dir.is_dir())
            .map(Deployer::probe_symlink_support);

        Ok(Self {
            game_path,
            settings_manager,
            state: RwLock::new(EngineState {
                settings,
                symlink_support,
            }),
            addon_locks: Mutex::new(HashMap::new()),
        })
    }

    // --- path resolution -------------------------------------------------

    /// The discovered game root, if any.
    pub fn game_path(&self) -> Option<&Utf8Path> {
        self.game_path.as_deref()
    }

    /// The configured addon storage directory, if any.
    pub fn install_path(&self) -> Option<Utf8PathBuf> {
        self.state.read().unwrap().settings.install_path.clone()
    }

    /// Choose the addon storage directory.
    ///
    /// Validates and creates the directory, persists the choice, and copies
    /// any `.vpk` packages from the previous directory into the new one so
    /// the user's library follows the move. The migration is best-effort per
    /// file; failures are logged and do not fail the command. The symlink
    /// probe cache is dropped since the answer may differ on the new volume.
    pub fn set_install_path(&self, install_path: Utf8PathBuf) -> Result<(), EngineError> {
        let previous = self.install_path();
        if previous.as_ref() == Some(&install_path) {
            return Ok(());
        }

        locator::prepare_install_dir(&install_path, self.game_path.as_deref())?;

        if let Some(previous) = previous {
            migrate_packages(&previous, &install_path);
        }

        let mut state = self.state.write().unwrap();
        state.settings.install_path = Some(install_path);
        state.symlink_support = None;
        self.persist(&state.settings)
    }

    // --- search-path state machine ---------------------------------------

    /// Classify the game's search-path configuration.
    pub fn search_paths_state(&self) -> Result<SearchPathsState, EngineError> {
        Ok(self.search_paths()?.inspect()?)
    }

    /// Inject the addon search-path entries (valid only from `Vanilla`).
    pub fn mod_search_paths(&self) -> Result<(), EngineError> {
        Ok(self.search_paths()?.modify()?)
    }

    /// Restore the pristine search-path configuration from backup.
    pub fn reset_search_paths(&self) -> Result<(), EngineError> {
        Ok(self.search_paths()?.reset()?)
    }

    // --- addon store ------------------------------------------------------

    /// Installed addon names, sorted.
    pub fn list_installed_addons(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.store()?.list()?)
    }

    /// Install a package file into the store and record its display name.
    pub fn install_addon(&self, request: InstallRequest) -> Result<(), EngineError> {
        let store = self.store()?;
        let name = store.install(&request.file_path, request.file_name.as_deref())?;

        let display_name = request.display_name.unwrap_or_else(|| name.clone());
        let mut state = self.state.write().unwrap();
        state
            .settings
            .addons
            .insert(name, AddonEntry { display_name });
        self.persist(&state.settings)
    }

    /// Remove an addon from the store, unmounting it first when necessary.
    ///
    /// Either the addon ends up fully gone (unmounted, file deleted, ledger
    /// entry dropped) or the operation fails and nothing changed; in
    /// particular the package is not deleted when its unmount fails.
    pub async fn uninstall_addon(&self, name: &str) -> Result<(), EngineError> {
        let lock = self.addon_lock(name).await;
        let _guard = lock.lock().await;

        let store = self.store()?;
        if !store.is_installed(name) {
            return Err(StoreError::NotInstalled(name.to_string()).into());
        }

        if let Some(game_path) = self.game_path.as_deref() {
            let deployer = Deployer::new(game_path);
            if deployer.is_mounted(name) {
                deployer.unmount(&store, name)?;
            }
        }

        store.uninstall(name)?;

        let mut state = self.state.write().unwrap();
        if state.settings.addons.shift_remove(name).is_some() {
            self.persist(&state.settings)?;
        }
        Ok(())
    }

    /// Display name recorded for an addon, falling back to its file name.
    pub fn display_name(&self, name: &str) -> String {
        self.state
            .read()
            .unwrap()
            .settings
            .display_name(name)
            .to_string()
    }

    // --- deployment -------------------------------------------------------

    /// Mounted addon names: the game's addon directory intersected with the
    /// installed set, sorted.
    pub fn list_mounted_addons(&self) -> Result<Vec<String>, EngineError> {
        let store = self.store()?;
        Ok(self.deployer()?.list_mounted(&store)?)
    }

    /// Mount an installed addon with the configured deploy method.
    ///
    /// Requires the modded search-path state; a no-op when already mounted.
    pub async fn mount_addon(&self, name: &str) -> Result<(), EngineError> {
        let lock = self.addon_lock(name).await;
        let _guard = lock.lock().await;

        self.require_modded()?;
        let store = self.store()?;
        let method = self.deploy_method();

        Ok(self.deployer()?.mount(&store, name, method)?)
    }

    /// Unmount an addon from the game's addon directory.
    ///
    /// Requires the modded search-path state. Unmounting an addon that is
    /// not mounted is an error (`NotMounted`), not a no-op; the store copy
    /// is never deleted.
    pub async fn unmount_addon(&self, name: &str) -> Result<(), EngineError> {
        let lock = self.addon_lock(name).await;
        let _guard = lock.lock().await;

        self.require_modded()?;
        let store = self.store()?;

        Ok(self.deployer()?.unmount(&store, name)?)
    }

    /// Whether this session can create symbolic links.
    ///
    /// Probed at most once (in the storage directory, falling back to the
    /// system temp directory) and cached for the engine's lifetime.
    pub fn is_symlink_available(&self) -> bool {
        if let Some(cached) = self.state.read().unwrap().symlink_support {
            return cached;
        }

        let dir = self
            .install_path()
            .or_else(|| Utf8PathBuf::from_path_buf(std::env::temp_dir()).ok());
        let supported = match dir {
            Some(dir) => Deployer::probe_symlink_support(&dir),
            None => false,
        };

        self.state.write().unwrap().symlink_support = Some(supported);
        supported
    }

    /// The configured deploy method.
    pub fn deploy_method(&self) -> DeployMethod {
        self.state.read().unwrap().settings.deploy_method
    }

    /// Switch the deploy method for subsequent mounts.
    ///
    /// `Symlink` is rejected when the probe says links cannot be created.
    /// Addons that are already mounted keep their current on-disk form; the
    /// new method applies from the next mount, which avoids a surprise mass
    /// rewrite of the game directory on a settings toggle.
    pub fn set_deploy_method(&self, method: DeployMethod) -> Result<(), EngineError> {
        if method == DeployMethod::Symlink && !self.is_symlink_available() {
            return Err(EngineError::SymlinkUnavailable);
        }

        let mut state = self.state.write().unwrap();
        state.settings.deploy_method = method;
        self.persist(&state.settings)?;

        tracing::info!("Deploy method set to {:?}", method);
        Ok(())
    }

    // --- internals --------------------------------------------------------

    fn game_root(&self) -> Result<&Utf8Path, EngineError> {
        self.game_path.as_deref().ok_or(EngineError::NoGamePath)
    }

    fn search_paths(&self) -> Result<SearchPathsFile, EngineError> {
        Ok(SearchPathsFile::new(self.game_root()?))
    }

    fn deployer(&self) -> Result<Deployer, EngineError> {
        Ok(Deployer::new(self.game_root()?))
    }

    fn store(&self) -> Result<AddonStore, EngineError> {
        let install_path = self.install_path().ok_or(EngineError::NoInstallPath)?;
        Ok(AddonStore::new(install_path))
    }

    fn require_modded(&self) -> Result<(), EngineError> {
        match self.search_paths()?.inspect()? {
            SearchPathsState::Modded => Ok(()),
            state => Err(EngineError::NotModded(state)),
        }
    }

    fn persist(&self, settings: &Settings) -> Result<(), EngineError> {
        self.settings_manager
            .save(settings)
            .map_err(EngineError::Settings)
    }

    async fn addon_lock(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.addon_locks.lock().await;
        locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Copy `.vpk` packages from the old storage directory into the new one.
///
/// Best effort: a package that fails to copy is logged and skipped, and the
/// old files are left in place for the user to clean up.
fn migrate_packages(from: &Utf8Path, to: &Utf8Path) {
    let entries = match std::fs::read_dir(from) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Could not read previous storage directory {}: {}", from, e);
            return;
        }
    };

    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if !file_type.is_file() || Utf8Path::new(&name).extension() != Some(ADDON_EXTENSION) {
            continue;
        }

        match std::fs::copy(entry.path(), to.join(&name).as_std_path()) {
            Ok(_) => tracing::info!("Migrated {} to {}", name, to),
            Err(e) => tracing::warn!("Could not migrate {} to {}: {}", name, to, e),
        }
    }
}
