//! The game's content-search-path state machine.
//!
//! Deadlock decides which directories it scans for content through the
//! `SearchPaths` block of `game/citadel/gameinfo.gi`, a Valve KeyValues
//! file. This module classifies that block as `Vanilla`, `Modded`, or
//! `Custom` and rewrites it between the first two states.
//!
//! Only the `SearchPaths` block is ever touched; every other line of the
//! manifest is carried over verbatim, and the block is re-indented to the
//! tab depth it was found at. Before the first modification the pristine
//! manifest is copied to `gameinfo.gi.bak`, which is the only source for
//! `reset`. All writes go through a temp file in the manifest's directory
//! followed by a rename, so a reader never observes a half-written file.
//!
//! A `Custom` block (edited by hand or by another tool) is never rewritten
//! except by an explicit reset from the backup.

use crate::models::SearchPathsState;
use crate::services::locator;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use thiserror::Error;

/// The retail `Game` entries.
const VANILLA_GAME: [&str; 2] = ["citadel", "core"];

/// The `Game` entries with the addon directory injected in front.
const MODDED_GAME: [&str; 3] = ["citadel/addons", "citadel", "core"];

/// Value of the injected `Mod` and `Write` keys.
const MOD_MOUNT: &str = "citadel";

/// Errors from search-path inspection and mutation.
#[derive(Error, Debug)]
pub enum SearchPathsError {
    #[error("search paths are already modified")]
    AlreadyModded,

    #[error("no pristine manifest backup found at {0}")]
    NoBackupFound(Utf8PathBuf),

    #[error("no SearchPaths block found in {0}")]
    MissingBlock(Utf8PathBuf),

    #[error("malformed SearchPaths block in {path}: {source}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: Box<keyvalues_serde::error::Error>,
    },

    #[error("could not access {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The three keys of the `SearchPaths` block this engine cares about.
///
/// `Game` is a repeated key and deserializes into a list; `Mod` and `Write`
/// are absent in the vanilla manifest.
#[derive(Debug, Deserialize, Serialize)]
struct SearchPaths {
    #[serde(rename = "Game")]
    game: Vec<String>,

    #[serde(rename = "Mod")]
    mod_key: Option<String>,

    #[serde(rename = "Write")]
    write: Option<String>,
}

impl SearchPaths {
    fn modded() -> Self {
        Self {
            game: MODDED_GAME.iter().map(|s| s.to_string()).collect(),
            mod_key: Some(MOD_MOUNT.to_string()),
            write: Some(MOD_MOUNT.to_string()),
        }
    }
}

/// Classify a parsed block against the known vanilla and modded signatures.
fn classify(paths: &SearchPaths) -> SearchPathsState {
    match (&paths.mod_key, &paths.write, paths.game.len()) {
        (None, None, 2) => {
            if paths.game[0] == VANILLA_GAME[0] && paths.game[1] == VANILLA_GAME[1] {
                return SearchPathsState::Vanilla;
            }
        }
        (Some(mod_key), Some(write), 3) => {
            if paths.game[0] == MODDED_GAME[0]
                && paths.game[1] == MODDED_GAME[1]
                && paths.game[2] == MODDED_GAME[2]
                && mod_key == MOD_MOUNT
                && write == MOD_MOUNT
            {
                return SearchPathsState::Modded;
            }
        }
        _ => {}
    }

    SearchPathsState::Custom
}

/// Line span of the `SearchPaths` block: the header line through the first
/// closing brace, plus the tab depth of the header.
struct BlockSpan {
    start: usize,
    end: usize,
    tab_level: usize,
}

/// Find the `SearchPaths` block in the manifest's lines.
///
/// Returns `None` when there is no block or the block is never closed.
fn find_block(lines: &[&str]) -> Option<BlockSpan> {
    let start = lines.iter().position(|line| line.contains("SearchPaths"))?;
    let tab_level = lines[start].chars().take_while(|&c| c == '\t').count();

    let mut end = start + 1;
    while end < lines.len() {
        if lines[end].contains('}') {
            return Some(BlockSpan {
                start,
                end,
                tab_level,
            });
        }
        end += 1;
    }

    None
}

/// Extract the raw text of the `SearchPaths` block from manifest content.
fn extract_block(content: &str) -> Option<String> {
    let lines: Vec<&str> = content.lines().collect();
    let span = find_block(&lines)?;

    Some(lines[span.start..=span.end].join("\n"))
}

/// State machine over one game installation's manifest.
#[derive(Debug, Clone)]
pub struct SearchPathsFile {
    manifest_path: Utf8PathBuf,
    backup_path: Utf8PathBuf,
}

impl SearchPathsFile {
    pub fn new(game_root: &Utf8Path) -> Self {
        Self {
            manifest_path: locator::game_info_path(game_root),
            backup_path: locator::game_info_backup_path(game_root),
        }
    }

    /// Read and classify the current `SearchPaths` block.
    pub fn inspect(&self) -> Result<SearchPathsState, SearchPathsError> {
        let paths = self.read_block()?;
        Ok(classify(&paths))
    }

    /// Inject the engine's search-path entries.
    ///
    /// Valid only from `Vanilla`. The pristine manifest is backed up first
    /// (once; an existing backup is never overwritten), then the block is
    /// rewritten in place via temp-file-and-rename. On any failure the
    /// manifest on disk is left untouched.
    pub fn modify(&self) -> Result<(), SearchPathsError> {
        match self.inspect()? {
            SearchPathsState::Vanilla => {}
            state => {
                tracing::warn!("Refusing to modify search paths in {:?} state", state);
                return Err(SearchPathsError::AlreadyModded);
            }
        }

        if !self.backup_path.exists() {
            fs::copy(&self.manifest_path, &self.backup_path).map_err(|source| {
                SearchPathsError::Io {
                    path: self.backup_path.clone(),
                    source,
                }
            })?;
            tracing::info!("Backed up pristine manifest to {}", self.backup_path);
        }

        let content = self.read_manifest()?;
        let new_content = self.splice_block(&content, &SearchPaths::modded())?;
        self.write_manifest(&new_content)?;

        tracing::info!("Injected addon search paths into {}", self.manifest_path);
        Ok(())
    }

    /// Restore the pristine manifest from backup.
    ///
    /// A no-op when the manifest is already `Vanilla`; otherwise the backup
    /// is required and its absence is an error. The backup file is kept
    /// after a restore.
    pub fn reset(&self) -> Result<(), SearchPathsError> {
        if self.inspect()? == SearchPathsState::Vanilla {
            tracing::debug!("Search paths already vanilla, nothing to reset");
            return Ok(());
        }

        if !self.backup_path.exists() {
            return Err(SearchPathsError::NoBackupFound(self.backup_path.clone()));
        }

        let pristine = fs::read(&self.backup_path).map_err(|source| SearchPathsError::Io {
            path: self.backup_path.clone(),
            source,
        })?;
        self.write_manifest_bytes(&pristine)?;

        tracing::info!("Restored pristine manifest from {}", self.backup_path);
        Ok(())
    }

    fn read_manifest(&self) -> Result<String, SearchPathsError> {
        fs::read_to_string(&self.manifest_path).map_err(|source| SearchPathsError::Io {
            path: self.manifest_path.clone(),
            source,
        })
    }

    fn read_block(&self) -> Result<SearchPaths, SearchPathsError> {
        let content = self.read_manifest()?;

        let block = extract_block(&content)
            .ok_or_else(|| SearchPathsError::MissingBlock(self.manifest_path.clone()))?;

        keyvalues_serde::from_str::<SearchPaths>(&block).map_err(|e| SearchPathsError::Parse {
            path: self.manifest_path.clone(),
            source: Box::new(e),
        })
    }

    /// Replace the `SearchPaths` block inside `content`, re-indenting the
    /// serialized block to the depth of the original.
    fn splice_block(
        &self,
        content: &str,
        paths: &SearchPaths,
    ) -> Result<String, SearchPathsError> {
        let lines: Vec<&str> = content.lines().collect();
        let span = find_block(&lines)
            .ok_or_else(|| SearchPathsError::MissingBlock(self.manifest_path.clone()))?;

        let serialized =
            keyvalues_serde::to_string(paths).map_err(|e| SearchPathsError::Parse {
                path: self.manifest_path.clone(),
                source: Box::new(e),
            })?;

        let tabs = "\t".repeat(span.tab_level);
        let new_block = serialized
            .replace('"', "")
            .lines()
            .map(|line| format!("{}{}", tabs, line))
            .collect::<Vec<_>>()
            .join("\n");

        let mut new_lines = Vec::with_capacity(lines.len());
        new_lines.extend_from_slice(&lines[..span.start]);
        new_lines.push(new_block.as_str());
        new_lines.extend_from_slice(&lines[span.end + 1..]);

        Ok(new_lines.join("\n"))
    }

    fn write_manifest(&self, content: &str) -> Result<(), SearchPathsError> {
        self.write_manifest_bytes(content.as_bytes())
    }

    fn write_manifest_bytes(&self, content: &[u8]) -> Result<(), SearchPathsError> {
        let io_err = |source| SearchPathsError::Io {
            path: self.manifest_path.clone(),
            source,
        };

        // Stage next to the manifest so the final rename stays on one filesystem.
        let dir = self
            .manifest_path
            .parent()
            .ok_or_else(|| io_err(io::Error::other("manifest path has no parent")))?;

        let mut staged = tempfile::Builder::new()
            .prefix(".vpkmount-")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(io_err)?;
        staged.write_all(content).map_err(io_err)?;
        staged.persist(&self.manifest_path).map_err(|e| io_err(e.error))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vanilla_paths() -> SearchPaths {
        SearchPaths {
            game: vec!["citadel".to_string(), "core".to_string()],
            mod_key: None,
            write: None,
        }
    }

    #[test]
    fn test_classify_vanilla() {
        assert_eq!(classify(&vanilla_paths()), SearchPathsState::Vanilla);
    }

    #[test]
    fn test_classify_modded() {
        assert_eq!(classify(&SearchPaths::modded()), SearchPathsState::Modded);
    }

    #[test]
    fn test_classify_reordered_entries_as_custom() {
        let paths = SearchPaths {
            game: vec!["core".to_string(), "citadel".to_string()],
            mod_key: None,
            write: None,
        };
        assert_eq!(classify(&paths), SearchPathsState::Custom);
    }

    #[test]
    fn test_classify_extra_game_entry_as_custom() {
        let mut paths = vanilla_paths();
        paths.game.push("my_mod".to_string());
        assert_eq!(classify(&paths), SearchPathsState::Custom);
    }

    #[test]
    fn test_classify_wrong_mod_mount_as_custom() {
        let mut paths = SearchPaths::modded();
        paths.mod_key = Some("hlvr".to_string());
        assert_eq!(classify(&paths), SearchPathsState::Custom);
    }

    #[test]
    fn test_extract_block_finds_span() {
        let content = "FileSystem\n{\n\tSearchPaths\n\t{\n\t\tGame\tcitadel\n\t\tGame\tcore\n\t}\n}\n";
        let block = extract_block(content).unwrap();

        assert!(block.starts_with("\tSearchPaths"));
        assert!(block.ends_with("\t}"));
        assert_eq!(block.lines().count(), 5);
    }

    #[test]
    fn test_extract_block_missing() {
        assert!(extract_block("GameInfo\n{\n}\n").is_none());
    }

    #[test]
    fn test_extract_block_unclosed() {
        assert!(extract_block("SearchPaths\n{\n\tGame\tcitadel\n").is_none());
    }

    #[test]
    fn test_extracted_block_parses() {
        let content = "\tSearchPaths\n\t{\n\t\tGame\tcitadel\n\t\tGame\tcore\n\t}\n";
        let block = extract_block(content).unwrap();
        let paths: SearchPaths = keyvalues_serde::from_str(&block).unwrap();

        assert_eq!(paths.game, vec!["citadel", "core"]);
        assert!(paths.mod_key.is_none());
        assert!(paths.write.is_none());
    }
}
