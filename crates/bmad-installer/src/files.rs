//! Hash inventory of installed vendor files (`files-manifest.csv`).
//!
//! Comparing a file's current hash against the recorded one tells an update
//! whether the user edited a vendor file since it was installed.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{InstallError, IoResultExt};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// File extension without the dot, or `file` when there is none.
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub module: String,
    /// Project-relative path with forward slashes.
    pub path: String,
    pub hash: String,
}

impl FileEntry {
    pub fn new(module: &str, path: String, hash: String) -> Self {
        let file_name = path.rsplit('/').next().unwrap_or(&path).to_string();
        let (name, kind) = match file_name.split_once('.') {
            Some((stem, ext)) => (stem.to_string(), ext.rsplit('.').next().unwrap_or(ext).to_string()),
            None => (file_name.clone(), "file".to_string()),
        };
        Self {
            kind,
            name,
            module: module.to_string(),
            path,
            hash,
        }
    }
}

/// Recorded entries keyed by project-relative path.
#[derive(Debug, Clone, Default)]
pub struct FilesManifest {
    entries: BTreeMap<String, FileEntry>,
}

impl FilesManifest {
    /// Read the inventory. A missing file is an empty inventory.
    pub fn read(path: &Path) -> Result<Self, InstallError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let mut reader = csv::Reader::from_path(path)?;
        let mut entries = BTreeMap::new();
        for row in reader.deserialize::<FileEntry>() {
            match row {
                Ok(entry) => {
                    entries.insert(entry.path.clone(), entry);
                }
                Err(e) => tracing::debug!("Skipping unreadable files-manifest row: {e}"),
            }
        }
        Ok(Self { entries })
    }

    pub fn from_entries(entries: impl IntoIterator<Item = FileEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.path.clone(), e)).collect(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), InstallError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).at(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;
        for entry in self.entries.values() {
            writer.serialize(entry)?;
        }
        writer.flush().at(path)?;
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        self.entries.get(path)
    }

    pub fn entries(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = FileEntry>) {
        for e in entries {
            self.entries.insert(e.path.clone(), e);
        }
    }
}

/// Write `content` to `path` unless the file already holds exactly that.
/// Returns whether the file was written.
pub(crate) fn write_if_changed(path: &Path, content: &str) -> Result<bool, InstallError> {
    if let Ok(existing) = std::fs::read(path) {
        if existing == content.as_bytes() {
            return Ok(false);
        }
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).at(parent)?;
    }
    std::fs::write(path, content).at(path)?;
    Ok(true)
}

/// SHA-256 of a file's contents as lowercase hex.
pub fn hash_file(path: &Path) -> Result<String, InstallError> {
    let mut file = std::fs::File::open(path).at(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf).at(path)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
