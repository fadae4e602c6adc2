//! Level and data table loading for headless runs.
//!
//! Levels and stat tables are authored as RON files. Every level is checked
//! against the tables before a runner hands it to a session.

use std::fs;
use std::path::{Path, PathBuf};

use rampart_core::data::{GameData, LevelDefinition};
use rampart_core::error::GameError;
use thiserror::Error;

/// Error type for level loading.
#[derive(Error, Debug)]
pub enum LevelLoadError {
    /// Directory does not exist.
    #[error("Level directory not found: {0}")]
    DirectoryNotFound(String),
    /// Failed to read file.
    #[error("Failed to read '{path}': {source}")]
    Io {
        /// File that failed.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Failed to parse RON.
    #[error("Failed to parse '{path}': {source}")]
    Ron {
        /// File that failed.
        path: String,
        /// Underlying error.
        source: ron::error::SpannedError,
    },
    /// Level parsed but is not playable with the given tables.
    #[error("Level '{path}' rejected: {source}")]
    Invalid {
        /// File that failed.
        path: String,
        /// Configuration error.
        source: GameError,
    },
}

fn read(path: &Path) -> Result<String, LevelLoadError> {
    fs::read_to_string(path).map_err(|source| LevelLoadError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Parse a level definition from a RON file without checking it.
pub fn parse_level(path: &Path) -> Result<LevelDefinition, LevelLoadError> {
    let content = read(path)?;
    ron::from_str(&content).map_err(|source| LevelLoadError::Ron {
        path: path.display().to_string(),
        source,
    })
}

/// Load a level from a RON file and check it against `data`.
pub fn load_level(path: &Path, data: &GameData) -> Result<LevelDefinition, LevelLoadError> {
    let level = parse_level(path)?;
    level
        .validate(data)
        .map_err(|source| LevelLoadError::Invalid {
            path: path.display().to_string(),
            source,
        })?;
    tracing::debug!(level = %level.id, ?path, "Level loaded");
    Ok(level)
}

/// Load stat tables from a RON file, or the built-in tables when `path`
/// is `None`.
pub fn load_game_data(path: Option<&Path>) -> Result<GameData, LevelLoadError> {
    let Some(path) = path else {
        return Ok(GameData::builtin());
    };
    let content = read(path)?;
    let data: GameData = ron::from_str(&content).map_err(|source| LevelLoadError::Ron {
        path: path.display().to_string(),
        source,
    })?;
    data.validate().map_err(|source| LevelLoadError::Invalid {
        path: path.display().to_string(),
        source,
    })?;
    Ok(data)
}

/// Load every `.ron` level in a directory, sorted by file name.
///
/// Files that fail to load are logged and skipped.
pub fn load_level_directory(
    dir: &Path,
    data: &GameData,
) -> Result<Vec<(PathBuf, LevelDefinition)>, LevelLoadError> {
    if !dir.is_dir() {
        return Err(LevelLoadError::DirectoryNotFound(dir.display().to_string()));
    }

    let entries = fs::read_dir(dir).map_err(|source| LevelLoadError::Io {
        path: dir.display().to_string(),
        source,
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| LevelLoadError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        let path = entry.path();
        if path.extension().is_some_and(|e| e == "ron") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut loaded = Vec::with_capacity(paths.len());
    for path in paths {
        match load_level(&path, data) {
            Ok(level) => loaded.push((path, level)),
            Err(e) => tracing::warn!("Skipping level {}: {e}", path.display()),
        }
    }
    Ok(loaded)
}

/// Default directory for authored levels.
pub fn default_level_dir() -> PathBuf {
    PathBuf::from("levels")
}
