//! Integration tests for the search-path state machine against a realistic
//! `gameinfo.gi` fixture.
//!
//! These tests verify:
//! - Classification of vanilla, modded, and hand-edited manifests
//! - The Vanilla → Modded transition and its backup side effect
//! - Reset-from-backup, including its failure and idempotence cases
//! - That only the `SearchPaths` block is rewritten and no staging files
//!   are left behind

use camino::Utf8PathBuf;
use std::fs;
use tempfile::TempDir;
use vpkmount::SearchPathsState;
use vpkmount::services::{SearchPathsError, SearchPathsFile};

const VANILLA_GAMEINFO: &str = concat!(
    "\"GameInfo\"\n",
    "{\n",
    "\tgame\t\t\"Citadel\"\n",
    "\ttitle\t\t\"Citadel\"\n",
    "\n",
    "\tFileSystem\n",
    "\t{\n",
    "\t\tSearchPaths\n",
    "\t\t{\n",
    "\t\t\tGame\tcitadel\n",
    "\t\t\tGame\tcore\n",
    "\t\t}\n",
    "\t}\n",
    "\n",
    "\tEngine2\n",
    "\t{\n",
    "\t\tHasModAppSystems\t1\n",
    "\t}\n",
    "}\n"
);

struct Fixture {
    _temp: TempDir,
    game_root: Utf8PathBuf,
    machine: SearchPathsFile,
}

fn fixture_with_manifest(manifest: &str) -> Fixture {
    let temp = TempDir::new().unwrap();
    let game_root = Utf8PathBuf::try_from(temp.path().join("deadlock")).unwrap();

    let citadel = game_root.join("game/citadel");
    fs::create_dir_all(&citadel).unwrap();
    fs::write(citadel.join("gameinfo.gi"), manifest).unwrap();

    Fixture {
        machine: SearchPathsFile::new(&game_root),
        _temp: temp,
        game_root,
    }
}

fn fixture() -> Fixture {
    fixture_with_manifest(VANILLA_GAMEINFO)
}

fn manifest_content(fx: &Fixture) -> String {
    fs::read_to_string(fx.game_root.join("game/citadel/gameinfo.gi")).unwrap()
}

#[test]
fn test_inspect_vanilla_manifest() {
    let fx = fixture();
    assert_eq!(fx.machine.inspect().unwrap(), SearchPathsState::Vanilla);
}

#[test]
fn test_inspect_hand_edited_manifest_as_custom() {
    let edited = VANILLA_GAMEINFO.replace(
        "\t\t\tGame\tcitadel\n",
        "\t\t\tGame\tmy_total_conversion\n\t\t\tGame\tcitadel\n",
    );
    let fx = fixture_with_manifest(&edited);

    assert_eq!(fx.machine.inspect().unwrap(), SearchPathsState::Custom);
}

#[test]
fn test_modify_transitions_vanilla_to_modded() {
    let fx = fixture();

    fx.machine.modify().unwrap();

    assert_eq!(fx.machine.inspect().unwrap(), SearchPathsState::Modded);

    let content = manifest_content(&fx);
    // The addon entry is injected at the block's original indentation.
    assert!(content.contains("\t\tSearchPaths"));
    assert!(content.contains("citadel/addons"));
    assert!(content.contains("Mod"));
    assert!(content.contains("Write"));
    // Everything outside the block is untouched.
    assert!(content.contains("\tEngine2\n"));
    assert!(content.contains("\tgame\t\t\"Citadel\"\n"));
}

#[test]
fn test_modify_writes_pristine_backup() {
    let fx = fixture();

    fx.machine.modify().unwrap();

    let backup = fx.game_root.join("game/citadel/gameinfo.gi.bak");
    assert_eq!(fs::read_to_string(backup).unwrap(), VANILLA_GAMEINFO);
}

#[test]
fn test_modify_twice_fails_with_already_modded() {
    let fx = fixture();
    fx.machine.modify().unwrap();

    let err = fx.machine.modify().unwrap_err();

    assert!(matches!(err, SearchPathsError::AlreadyModded));
}

#[test]
fn test_modify_refuses_custom_manifest() {
    let edited = VANILLA_GAMEINFO.replace("Game\tcore", "Game\tcore_nightly");
    let fx = fixture_with_manifest(&edited);

    let err = fx.machine.modify().unwrap_err();

    assert!(matches!(err, SearchPathsError::AlreadyModded));
    // Refusal must not have created a backup of the custom state.
    assert!(!fx.game_root.join("game/citadel/gameinfo.gi.bak").exists());
}

#[test]
fn test_reset_restores_pristine_bytes() {
    let fx = fixture();
    fx.machine.modify().unwrap();

    fx.machine.reset().unwrap();

    assert_eq!(fx.machine.inspect().unwrap(), SearchPathsState::Vanilla);
    assert_eq!(manifest_content(&fx), VANILLA_GAMEINFO);
}

#[test]
fn test_reset_recovers_custom_manifest_from_backup() {
    let fx = fixture();
    fx.machine.modify().unwrap();

    // Another tool scribbles over the modded manifest.
    let manifest = fx.game_root.join("game/citadel/gameinfo.gi");
    let scribbled = manifest_content(&fx).replace("citadel/addons", "third_party/addons");
    fs::write(&manifest, scribbled).unwrap();
    assert_eq!(fx.machine.inspect().unwrap(), SearchPathsState::Custom);

    fx.machine.reset().unwrap();

    assert_eq!(manifest_content(&fx), VANILLA_GAMEINFO);
}

#[test]
fn test_reset_is_idempotent_on_vanilla() {
    let fx = fixture();

    fx.machine.reset().unwrap();
    fx.machine.reset().unwrap();

    assert_eq!(manifest_content(&fx), VANILLA_GAMEINFO);
}

#[test]
fn test_reset_without_backup_fails() {
    let edited = VANILLA_GAMEINFO.replace("Game\tcore", "Game\tcore_nightly");
    let fx = fixture_with_manifest(&edited);

    let err = fx.machine.reset().unwrap_err();

    assert!(matches!(err, SearchPathsError::NoBackupFound(_)));
    // The manifest is left exactly as it was.
    assert_eq!(manifest_content(&fx), edited);
}

#[test]
fn test_modify_leaves_no_staging_files() {
    let fx = fixture();
    fx.machine.modify().unwrap();
    fx.machine.reset().unwrap();

    let citadel = fx.game_root.join("game/citadel");
    let mut names: Vec<String> = fs::read_dir(&citadel)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();

    assert_eq!(names, vec!["gameinfo.gi", "gameinfo.gi.bak"]);
}

#[test]
fn test_manifest_without_search_paths_block() {
    let fx = fixture_with_manifest("\"GameInfo\"\n{\n\tgame\t\"Citadel\"\n}\n");

    let err = fx.machine.inspect().unwrap_err();

    assert!(matches!(err, SearchPathsError::MissingBlock(_)));
}
