//! vpkmount - Addon deployment engine for Deadlock
//!
//! Headless entry point. The desktop UI talks to [`AddonEngine`] through its
//! own shell; this binary wires up the same engine and prints a status
//! report, which doubles as a quick health check of a user's setup:
//!
//! 1. Initialize logging → `<settings dir>/logs/vpkmount.<date>`
//! 2. Locate the game through Steam and load persisted settings
//! 3. Report the search-path state, installed addons, and mounted addons
//!
//! The status report only uses the engine's synchronous read-only surface;
//! the async mount/unmount/uninstall commands are driven by the UI shell
//! (and the integration tests) on their own runtime.

use anyhow::{Context, Result};
use vpkmount::{APP_NAME, AddonEngine, SettingsManager, VERSION};

fn main() -> Result<()> {
    let settings_dir =
        SettingsManager::default_dir().context("Could not resolve a settings directory")?;

    let _log_guard = vpkmount::logging::setup_logging(&settings_dir.join("logs"), APP_NAME, true)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let settings_manager = SettingsManager::new(&settings_dir)?;
    let engine = AddonEngine::new(settings_manager)?;

    report_status(&engine);
    Ok(())
}

/// Print the engine's view of the world to stdout.
fn report_status(engine: &AddonEngine) {
    match engine.game_path() {
        Some(path) => println!("Game installation: {}", path),
        None => {
            println!("Game installation: not found");
            return;
        }
    }

    match engine.search_paths_state() {
        Ok(state) => println!("Search paths:      {:?}", state),
        Err(e) => println!("Search paths:      error: {}", e),
    }

    match engine.install_path() {
        Some(path) => println!("Addon storage:     {}", path),
        None => {
            println!("Addon storage:     not configured");
            return;
        }
    }

    println!("Deploy method:     {:?}", engine.deploy_method());
    println!("Symlinks usable:   {}", engine.is_symlink_available());

    match engine.list_installed_addons() {
        Ok(addons) => {
            println!("Installed addons:  {}", addons.len());
            for name in &addons {
                println!("  {} ({})", name, engine.display_name(name));
            }
        }
        Err(e) => println!("Installed addons:  error: {}", e),
    }

    match engine.list_mounted_addons() {
        Ok(addons) => println!("Mounted addons:    {}", addons.join(", ")),
        Err(e) => println!("Mounted addons:    error: {}", e),
    }
}
