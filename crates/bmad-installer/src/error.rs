use std::path::{Path, PathBuf};

use bmad_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No installation found in {0}")]
    NotInstalled(PathBuf),

    #[error("An installation already exists in {0}; request update, quick-update, compile-agents or uninstall")]
    ActionRequired(PathBuf),

    #[error("Installation manifest {path} is corrupt: {message}")]
    CorruptManifest { path: PathBuf, message: String },

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("{0} holds the only copy of previously installed content; move it back before reinstalling")]
    StrandedBackup(PathBuf),
}

/// Attach the offending path to raw I/O errors.
pub(crate) trait IoResultExt<T> {
    fn at(self, path: &Path) -> Result<T, InstallError>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn at(self, path: &Path) -> Result<T, InstallError> {
        self.map_err(|source| InstallError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
