use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BuildError>;

/// Fatal errors. Any of these aborts the build before a manifest is written.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Build configuration is missing or invalid
    #[error("[CFG_ERROR]: {0}")]
    Config(String),

    #[error(transparent)]
    Baseline(#[from] BaselineError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    /// A patch definition could not be parsed
    #[error("Malformed patch definition {}: {reason}", .path.display())]
    Format { path: PathBuf, reason: String },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl BuildError {
    pub fn format(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        BuildError::Format {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// A target file is not in its known-good original state and cannot be made so.
#[derive(Debug, Error)]
pub enum BaselineError {
    #[error("Game file not found: {}", .0.display())]
    GameFileNotFound(PathBuf),

    #[error(
        "No original game file found for {} (size {actual_size}, expected {expected_size}) \
         and no backup either",
        .path.display()
    )]
    MissingBackup {
        path: PathBuf,
        expected_size: u64,
        actual_size: u64,
    },

    #[error(
        "{} does not match its baseline after restoring from backup: \
         size {actual_size} (expected {expected_size}), \
         hash {actual_hash} (expected {expected_hash})",
        .path.display()
    )]
    BackupMismatch {
        path: PathBuf,
        expected_size: u64,
        actual_size: u64,
        expected_hash: String,
        actual_hash: String,
    },
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Decompression failure for {}", .archive.display())]
    Decompression {
        archive: PathBuf,
        #[source]
        cause: ToolFailure,
    },

    #[error("Archive patch failure for {}", .instructions.display())]
    ArchivePatch {
        instructions: PathBuf,
        #[source]
        cause: ToolFailure,
    },
}

/// Underlying reason an external tool invocation failed.
#[derive(Debug, Error)]
pub enum ToolFailure {
    #[error("failed to launch {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} exited with {status}: {stderr}", .program.display())]
    Exit {
        program: PathBuf,
        status: ExitStatus,
        stderr: String,
    },

    #[error("failed to move tool output into place: {0}")]
    Io(#[from] io::Error),
}

/// Attaches the offending path to a bare `io::Error`.
pub trait IoResultExt<T> {
    fn at(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|source| BuildError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        })
    }
}
