use crate::models::Settings;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Name of the YAML settings file inside the settings directory.
const SETTINGS_FILE: &str = "vpkmount.yaml";

/// Loads and saves the persisted engine settings.
///
/// Settings live in a single YAML file holding the addon storage path, the
/// deploy method, and the per-addon display-name ledger. Reads fall back to
/// defaults when the file does not exist yet; writes replace the whole file
/// and are performed immediately by the engine after every mutation.
#[derive(Debug, Clone)]
pub struct SettingsManager {
    settings_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
}

impl SettingsManager {
    /// Create a new SettingsManager rooted at the given directory.
    ///
    /// The directory is created if it does not exist.
    pub fn new<P: AsRef<Utf8Path>>(settings_dir: P) -> Result<Self> {
        let settings_dir = settings_dir.as_ref().to_path_buf();

        if !settings_dir.exists() {
            fs::create_dir_all(&settings_dir).with_context(|| {
                format!("Failed to create settings directory: {}", settings_dir)
            })?;
        }

        Ok(Self {
            settings_path: settings_dir.join(SETTINGS_FILE),
            settings_dir,
        })
    }

    /// Per-user default settings directory (e.g. `~/.config/vpkmount`).
    pub fn default_dir() -> Option<Utf8PathBuf> {
        let base = dirs::config_dir()?;
        let dir = Utf8PathBuf::from_path_buf(base).ok()?;
        Some(dir.join("vpkmount"))
    }

    /// Load settings from disk, or defaults when no file exists yet.
    pub fn load(&self) -> Result<Settings> {
        if !self.settings_path.exists() {
            tracing::info!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
            return Ok(Settings::default());
        }

        let file_contents = fs::read_to_string(&self.settings_path)
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?;

        let settings: Settings = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        tracing::info!("Loaded settings from {}", self.settings_path);
        Ok(settings)
    }

    /// Save settings to disk, replacing the previous file.
    pub fn save(&self, settings: &Settings) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::debug!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    /// Get the settings directory path.
    pub fn settings_dir(&self) -> &Utf8Path {
        &self.settings_dir
    }
}
