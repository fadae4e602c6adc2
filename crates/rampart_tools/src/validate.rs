//! Data validation utilities.
//!
//! A directory may mix level files and stat table files. Each `.ron` file
//! is read as a level first, then as a stat table. Levels are checked
//! against the tables given to [`validate_data_directory`].

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use rampart_core::data::{GameData, LevelDefinition};
use thiserror::Error;

/// Error type for validation runs.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Directory does not exist.
    #[error("Data directory not found: {0}")]
    DirectoryNotFound(String),
    /// Failed to read a file or directory.
    #[error("Failed to read '{path}': {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Failed to parse the reference stat tables.
    #[error("Failed to parse stat tables '{path}': {source}")]
    Ron {
        /// Path that failed.
        path: String,
        /// Underlying error.
        source: ron::error::SpannedError,
    },
    /// One or more files have problems.
    #[error("{failed} of {checked} files failed validation")]
    Failed {
        /// Files with problems.
        failed: usize,
        /// Files checked.
        checked: usize,
    },
}

/// What a file turned out to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// A level definition.
    Level,
    /// A stat table set.
    Data,
    /// Neither parsed.
    Unknown,
}

/// Outcome for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    /// File checked.
    pub path: PathBuf,
    /// Detected content.
    pub kind: FileKind,
    /// First problem found, if any.
    pub problem: Option<String>,
}

impl FileReport {
    /// Whether the file passed.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.problem.is_none()
    }
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.problem {
            None => write!(f, "ok      {} ({:?})", self.path.display(), self.kind),
            Some(problem) => write!(f, "FAILED  {}: {problem}", self.path.display()),
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ValidationError + '_ {
    move |source| ValidationError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Load the stat tables levels are checked against.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_reference_data(path: Option<&Path>) -> Result<GameData, ValidationError> {
    let Some(path) = path else {
        return Ok(GameData::builtin());
    };
    let content = fs::read_to_string(path).map_err(io_error(path))?;
    ron::from_str(&content).map_err(|source| ValidationError::Ron {
        path: path.display().to_string(),
        source,
    })
}

/// Check a single RON source.
#[must_use]
pub fn validate_source(path: &Path, source: &str, data: &GameData) -> FileReport {
    let (kind, problem) = match ron::from_str::<LevelDefinition>(source) {
        Ok(level) => (FileKind::Level, level.validate(data).err().map(|e| e.to_string())),
        Err(level_error) => match ron::from_str::<GameData>(source) {
            Ok(tables) => (FileKind::Data, tables.validate().err().map(|e| e.to_string())),
            Err(_) => (FileKind::Unknown, Some(format!("not a level or stat table: {level_error}"))),
        },
    };
    FileReport {
        path: path.to_path_buf(),
        kind,
        problem,
    }
}

/// Check every `.ron` file in a directory, sorted by path.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn check_directory(path: &Path, data: &GameData) -> Result<Vec<FileReport>, ValidationError> {
    if !path.is_dir() {
        return Err(ValidationError::DirectoryNotFound(path.display().to_string()));
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(path).map_err(io_error(path))? {
        let file = entry.map_err(io_error(path))?.path();
        if file.extension().is_some_and(|e| e == "ron") {
            files.push(file);
        }
    }
    files.sort();

    let mut reports = Vec::with_capacity(files.len());
    for file in files {
        let source = fs::read_to_string(&file).map_err(io_error(&file))?;
        let report = validate_source(&file, &source, data);
        tracing::debug!("{report}");
        reports.push(report);
    }
    Ok(reports)
}

/// Validate all RON data files in a directory.
///
/// # Errors
///
/// Returns an error if any data file fails validation.
pub fn validate_data_directory(path: &Path, data: &GameData) -> Result<usize, ValidationError> {
    let reports = check_directory(path, data)?;
    let failed = reports.iter().filter(|r| !r.is_ok()).count();
    for report in reports.iter().filter(|r| !r.is_ok()) {
        tracing::warn!("{report}");
    }
    if failed > 0 {
        return Err(ValidationError::Failed {
            failed,
            checked: reports.len(),
        });
    }
    Ok(reports.len())
}
