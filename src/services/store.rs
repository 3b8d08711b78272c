//! The on-disk addon store.
//!
//! Owns the user-chosen storage directory: one `.vpk` package file per
//! installed addon, file name as the addon's identity. Installs are staged
//! through a temp file in the target directory and renamed into place, so a
//! crash mid-copy never leaves a truncated package behind and two installs
//! racing to the same default name cannot both win.

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::fs;
use std::io::{self, Write};
use thiserror::Error;

use crate::models::ADDON_EXTENSION;

/// Errors from store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0} is not a .vpk addon package")]
    InvalidAddonFile(Utf8PathBuf),

    #[error("addon file name {0:?} is not allowed")]
    InvalidAddonName(String),

    #[error("an addon named {0} is already installed")]
    NameCollision(String),

    #[error("addon {0} is not installed")]
    NotInstalled(String),

    #[error("could not access {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Handle to one addon storage directory.
pub struct AddonStore {
    install_dir: Utf8PathBuf,

    /// Accepted addon file names: a plain `.vpk` base name, no path
    /// separators, no leading dot.
    name_pattern: Regex,
}

impl AddonStore {
    /// Create a store over an existing storage directory.
    ///
    /// Directory creation and writability checks happen when the user picks
    /// the path (see [`locator::prepare_install_dir`](crate::services::locator::prepare_install_dir));
    /// the store itself performs no setup.
    pub fn new(install_dir: Utf8PathBuf) -> Self {
        Self {
            install_dir,
            name_pattern: Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 ._\-]*\.vpk$")
                .expect("Invalid addon name regex"),
        }
    }

    pub fn install_dir(&self) -> &Utf8Path {
        &self.install_dir
    }

    /// Absolute path of an addon package inside the store.
    pub fn addon_path(&self, name: &str) -> Utf8PathBuf {
        self.install_dir.join(name)
    }

    /// Whether an addon package with this name is present in the store.
    pub fn is_installed(&self, name: &str) -> bool {
        self.addon_path(name).is_file()
    }

    /// Installed addon names, lexicographically sorted.
    ///
    /// Only regular files carrying the `.vpk` extension count; anything else
    /// in the directory is ignored.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let entries = fs::read_dir(&self.install_dir).map_err(|source| StoreError::Io {
            path: self.install_dir.clone(),
            source,
        })?;

        let mut addons = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: self.install_dir.clone(),
                source,
            })?;

            let file_type = entry.file_type().map_err(|source| StoreError::Io {
                path: self.install_dir.clone(),
                source,
            })?;
            if !file_type.is_file() {
                continue;
            }

            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            if Utf8Path::new(&name).extension() == Some(ADDON_EXTENSION) {
                addons.push(name);
            }
        }

        addons.sort();
        Ok(addons)
    }

    /// Copy a source package into the store.
    ///
    /// The resolved name is `target_name` when given, else the source's base
    /// name. Without an explicit `target_name`, a collision with an installed
    /// addon fails with [`StoreError::NameCollision`]; the caller resolves
    /// collisions by prompting for a rename or replace and calling again with
    /// an explicit name, which is allowed to overwrite.
    ///
    /// Returns the resolved addon name.
    pub fn install(
        &self,
        source: &Utf8Path,
        target_name: Option<&str>,
    ) -> Result<String, StoreError> {
        if !source.is_file() || source.extension() != Some(ADDON_EXTENSION) {
            return Err(StoreError::InvalidAddonFile(source.to_path_buf()));
        }

        let explicit = target_name.is_some();
        let name = match target_name {
            Some(name) => name.to_string(),
            None => source
                .file_name()
                .ok_or_else(|| StoreError::InvalidAddonFile(source.to_path_buf()))?
                .to_string(),
        };

        if !self.name_pattern.is_match(&name) {
            return Err(StoreError::InvalidAddonName(name));
        }

        let destination = self.addon_path(&name);
        if !explicit && destination.symlink_metadata().is_ok() {
            return Err(StoreError::NameCollision(name));
        }

        self.stage_into_store(source, &destination, explicit)?;

        tracing::info!("Installed {} into {}", name, self.install_dir);
        Ok(name)
    }

    /// Delete an addon package from the store.
    ///
    /// Mount-state bookkeeping (cascading unmount, ledger cleanup) is the
    /// engine's job; this only removes the file.
    pub fn uninstall(&self, name: &str) -> Result<(), StoreError> {
        let path = self.addon_path(name);
        if !path.is_file() {
            return Err(StoreError::NotInstalled(name.to_string()));
        }

        fs::remove_file(&path).map_err(|source| StoreError::Io { path, source })?;

        tracing::info!("Removed {} from {}", name, self.install_dir);
        Ok(())
    }

    /// Stage `source` into the store under `destination` via temp-and-rename.
    ///
    /// With `replace` the final rename clobbers an existing file (explicit
    /// rename/replace flow); without it the rename refuses to overwrite, so
    /// the loser of a default-name race surfaces as a collision instead of
    /// silently clobbering the winner.
    fn stage_into_store(
        &self,
        source: &Utf8Path,
        destination: &Utf8Path,
        replace: bool,
    ) -> Result<(), StoreError> {
        let io_err = |path: &Utf8Path| {
            let path = path.to_path_buf();
            move |source| StoreError::Io { path, source }
        };

        let mut reader = fs::File::open(source).map_err(io_err(source))?;

        let mut staged = tempfile::Builder::new()
            .prefix(".vpkmount-")
            .suffix(".tmp")
            .tempfile_in(&self.install_dir)
            .map_err(io_err(&self.install_dir))?;
        io::copy(&mut reader, &mut staged).map_err(io_err(destination))?;
        staged.flush().map_err(io_err(destination))?;

        if replace {
            staged
                .persist(destination)
                .map_err(|e| StoreError::Io {
                    path: destination.to_path_buf(),
                    source: e.error,
                })?;
        } else {
            staged.persist_noclobber(destination).map_err(|e| {
                if e.error.kind() == io::ErrorKind::AlreadyExists {
                    let name = destination
                        .file_name()
                        .unwrap_or_default()
                        .to_string();
                    StoreError::NameCollision(name)
                } else {
                    StoreError::Io {
                        path: destination.to_path_buf(),
                        source: e.error,
                    }
                }
            })?;
        }

        Ok(())
    }
}
