//! The installation manifest: what is installed, with which settings, and
//! every command file generated for it.

use std::collections::BTreeMap;
use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CoreSettings;
use crate::error::{InstallError, IoResultExt};
use crate::generator::GeneratedFile;
use crate::layout::Layout;
use crate::modules::ModuleOrigin;

/// Version of the installer that wrote a manifest.
pub const INSTALLER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallationInfo {
    pub version: String,
    pub install_date: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledModule {
    pub name: String,
    pub version: String,
    pub source: ModuleOrigin,
    pub install_date: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallationManifest {
    pub installation: InstallationInfo,
    pub bmad_folder: String,
    #[serde(default)]
    pub settings: CoreSettings,
    #[serde(default)]
    pub modules: Vec<InstalledModule>,
    #[serde(default)]
    pub ides: Vec<String>,
    #[serde(default)]
    pub generated: Vec<GeneratedFile>,
}

impl InstallationManifest {
    pub fn new(bmad_folder: &str, settings: CoreSettings, now: DateTime<Utc>) -> Self {
        Self {
            installation: InstallationInfo {
                version: INSTALLER_VERSION.to_string(),
                install_date: now,
                last_updated: now,
            },
            bmad_folder: bmad_folder.to_string(),
            settings,
            modules: Vec::new(),
            ides: Vec::new(),
            generated: Vec::new(),
        }
    }

    /// Read the manifest for `layout`.
    ///
    /// `Ok(None)` means nothing is installed. A manifest that exists but cannot
    /// be parsed is a [`InstallError::CorruptManifest`], never `None`.
    pub fn read(layout: &Layout) -> Result<Option<Self>, InstallError> {
        let path = layout.manifest_path();
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path).at(&path)?;
        serde_yaml::from_str(&text)
            .map(Some)
            .map_err(|e| InstallError::CorruptManifest {
                path: path.clone(),
                message: e.to_string(),
            })
    }

    /// Replace the manifest on disk. The new content is written to a
    /// temporary file in the same directory and renamed over the old one.
    pub fn write(&self, layout: &Layout) -> Result<(), InstallError> {
        let path = layout.manifest_path();
        let dir = layout.config_dir();
        std::fs::create_dir_all(&dir).at(&dir)?;

        let text = serde_yaml::to_string(self)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).at(&dir)?;
        tmp.write_all(text.as_bytes()).at(tmp.path())?;
        tmp.persist(&path).map_err(|e| InstallError::Io {
            path: path.clone(),
            source: e.error,
        })?;
        debug!("Wrote {}", path.display());
        Ok(())
    }

    pub fn module(&self, name: &str) -> Option<&InstalledModule> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn module_names(&self) -> Vec<String> {
        self.modules.iter().map(|m| m.name.clone()).collect()
    }

    pub fn agent_count(&self) -> usize {
        let mut agents: Vec<(&str, &str)> = self
            .generated
            .iter()
            .filter(|f| f.artifact_type == bmad_core::ArtifactType::Agent)
            .map(|f| (f.module.as_str(), f.name.as_str()))
            .collect();
        agents.sort_unstable();
        agents.dedup();
        agents.len()
    }
}
