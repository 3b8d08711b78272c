//! Mounting addons into the game's active content directory.
//!
//! A mounted addon is nothing more than a file (or symbolic link) with the
//! addon's name inside `game/citadel/addons`; the directory itself is the
//! source of truth for what is mounted. This module materializes and removes
//! those entries. Both deploy strategies stage under a temp name first and
//! rename into place, so an interrupted mount never leaves a half-written
//! package visible under the addon's name.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io::{self, Write};
use thiserror::Error;

use crate::models::{ADDON_EXTENSION, DeployMethod};
use crate::services::locator;
use crate::services::store::AddonStore;

/// Errors from mount and unmount operations.
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("addon {0} is not installed")]
    NotInstalled(String),

    #[error("addon {0} is not mounted")]
    NotMounted(String),

    #[error("could not access {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Deployer over one game installation's addon directory.
pub struct Deployer {
    addons_dir: Utf8PathBuf,
}

impl Deployer {
    pub fn new(game_root: &Utf8Path) -> Self {
        Self {
            addons_dir: locator::addons_dir(game_root),
        }
    }

    pub fn addons_dir(&self) -> &Utf8Path {
        &self.addons_dir
    }

    /// Create the game's addon directory if it does not exist yet.
    pub fn ensure_addons_dir(&self) -> Result<(), DeployError> {
        if !self.addons_dir.exists() {
            fs::create_dir_all(&self.addons_dir).map_err(|source| DeployError::Io {
                path: self.addons_dir.clone(),
                source,
            })?;
            tracing::info!("Created game addon directory {}", self.addons_dir);
        }
        Ok(())
    }

    /// Path an addon occupies inside the game's addon directory when mounted.
    pub fn mounted_path(&self, name: &str) -> Utf8PathBuf {
        self.addons_dir.join(name)
    }

    /// Whether a file or link (dangling included) exists under this name.
    pub fn is_mounted(&self, name: &str) -> bool {
        self.mounted_path(name).symlink_metadata().is_ok()
    }

    /// Mounted addon names: `.vpk` files and links in the game's addon
    /// directory, intersected with the installed set so foreign files some
    /// other tool dropped there are never reported. Sorted.
    pub fn list_mounted(&self, store: &AddonStore) -> Result<Vec<String>, DeployError> {
        self.ensure_addons_dir()?;

        let entries = fs::read_dir(&self.addons_dir).map_err(|source| DeployError::Io {
            path: self.addons_dir.clone(),
            source,
        })?;

        let mut mounted = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| DeployError::Io {
                path: self.addons_dir.clone(),
                source,
            })?;

            let file_type = entry.file_type().map_err(|source| DeployError::Io {
                path: self.addons_dir.clone(),
                source,
            })?;
            if !file_type.is_file() && !file_type.is_symlink() {
                continue;
            }

            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            if Utf8Path::new(&name).extension() == Some(ADDON_EXTENSION)
                && store.is_installed(&name)
            {
                mounted.push(name);
            }
        }

        mounted.sort();
        Ok(mounted)
    }

    /// Mount an installed addon using the given deploy method.
    ///
    /// Idempotent: mounting an already-mounted addon is a no-op, whatever
    /// method it was originally mounted with.
    pub fn mount(
        &self,
        store: &AddonStore,
        name: &str,
        method: DeployMethod,
    ) -> Result<(), DeployError> {
        if !store.is_installed(name) {
            return Err(DeployError::NotInstalled(name.to_string()));
        }

        self.ensure_addons_dir()?;

        if self.is_mounted(name) {
            tracing::debug!("{} is already mounted, nothing to do", name);
            return Ok(());
        }

        let source = store.addon_path(name);
        let destination = self.mounted_path(name);

        match method {
            DeployMethod::Copy => self.stage_copy(&source, &destination)?,
            DeployMethod::Symlink => self.stage_symlink(&source, &destination)?,
        }

        tracing::info!("Mounted {} via {:?}", name, method);
        Ok(())
    }

    /// Remove an addon's file or link from the game's addon directory.
    ///
    /// Fails with [`DeployError::NotMounted`] when nothing is mounted under
    /// this name. The store copy is never touched; if it has gone missing and
    /// the mounted entry is a regular file, the file is rescued back into the
    /// store before removal so the package is not lost.
    pub fn unmount(&self, store: &AddonStore, name: &str) -> Result<(), DeployError> {
        let mounted = self.mounted_path(name);

        let metadata = mounted
            .symlink_metadata()
            .map_err(|_| DeployError::NotMounted(name.to_string()))?;

        if metadata.is_file() && !store.is_installed(name) {
            let store_path = store.addon_path(name);
            match fs::copy(&mounted, &store_path) {
                Ok(_) => tracing::info!("Rescued {} back into the store", name),
                Err(e) => tracing::warn!("Could not rescue {} into the store: {}", name, e),
            }
        }

        fs::remove_file(&mounted).map_err(|source| DeployError::Io {
            path: mounted.clone(),
            source,
        })?;

        tracing::info!("Unmounted {}", name);
        Ok(())
    }

    /// Probe whether this process can create symbolic links in `dir`.
    ///
    /// Creates and removes a throwaway link. On Windows this fails without
    /// developer mode or elevation; the result is cached by the engine for
    /// the session.
    pub fn probe_symlink_support(dir: &Utf8Path) -> bool {
        let target = dir.join(".vpkmount-probe-target");
        let link = dir.join(".vpkmount-probe-link");

        let _ = fs::remove_file(&link);
        if fs::write(&target, b"probe").is_err() {
            return false;
        }

        let supported = symlink_file(&target, &link).is_ok();

        let _ = fs::remove_file(&link);
        let _ = fs::remove_file(&target);

        tracing::info!("Symbolic link probe in {}: {}", dir, supported);
        supported
    }

    /// Copy `source` to a staged temp file next to `destination`, then
    /// rename it into place.
    fn stage_copy(&self, source: &Utf8Path, destination: &Utf8Path) -> Result<(), DeployError> {
        let mut reader = fs::File::open(source).map_err(|e| DeployError::Io {
            path: source.to_path_buf(),
            source: e,
        })?;

        let mut staged = tempfile::Builder::new()
            .prefix(".vpkmount-")
            .suffix(".tmp")
            .tempfile_in(&self.addons_dir)
            .map_err(|e| DeployError::Io {
                path: self.addons_dir.clone(),
                source: e,
            })?;
        io::copy(&mut reader, &mut staged)
            .and_then(|_| staged.flush())
            .map_err(|e| DeployError::Io {
                path: destination.to_path_buf(),
                source: e,
            })?;

        staged.persist(destination).map_err(|e| DeployError::Io {
            path: destination.to_path_buf(),
            source: e.error,
        })?;

        Ok(())
    }

    /// Create the symlink under a staged temp name, then rename it into place.
    ///
    /// The staged name is keyed by the addon name: concurrent mounts of
    /// distinct addons stay out of each other's way, and same-name mounts
    /// are serialized by the engine's per-addon lock.
    fn stage_symlink(&self, source: &Utf8Path, destination: &Utf8Path) -> Result<(), DeployError> {
        let name = destination.file_name().unwrap_or("addon");
        let staged = self.addons_dir.join(format!(".vpkmount-{}.lnk", name));
        let _ = fs::remove_file(&staged);

        symlink_file(source, &staged).map_err(|e| DeployError::Io {
            path: staged.clone(),
            source: e,
        })?;

        if let Err(e) = fs::rename(&staged, destination) {
            let _ = fs::remove_file(&staged);
            return Err(DeployError::Io {
                path: destination.to_path_buf(),
                source: e,
            });
        }

        Ok(())
    }
}

#[cfg(unix)]
fn symlink_file(original: &Utf8Path, link: &Utf8Path) -> io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(windows)]
fn symlink_file(original: &Utf8Path, link: &Utf8Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(original, link)
}
