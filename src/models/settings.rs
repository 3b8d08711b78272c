use crate::models::DeployMethod;
use camino::Utf8PathBuf;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Persisted engine settings, stored as `vpkmount.yaml` in the settings
/// directory.
///
/// This is the on-disk shape behind the configuration ledger: the
/// user-chosen addon storage directory, the deploy method, and per-addon
/// display metadata. Loaded once at engine construction, written back
/// immediately on every mutation. `IndexMap` keeps the addon section in
/// insertion order so saved files diff cleanly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding installed addon packages. `None` until the user
    /// picks one during onboarding.
    #[serde(default)]
    pub install_path: Option<Utf8PathBuf>,

    /// Process-wide deploy strategy used by subsequent mounts.
    #[serde(default)]
    pub deploy_method: DeployMethod,

    /// Per-addon metadata, keyed by addon file name.
    #[serde(default)]
    pub addons: IndexMap<String, AddonEntry>,
}

/// Ledger entry for one installed addon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonEntry {
    pub display_name: String,
}

impl Settings {
    /// Display name for an addon, falling back to its file name when the
    /// ledger has no entry.
    pub fn display_name<'a>(&'a self, file_name: &'a str) -> &'a str {
        self.addons
            .get(file_name)
            .map(|entry| entry.display_name.as_str())
            .unwrap_or(file_name)
    }
}
