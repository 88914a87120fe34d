use std::path::Path;

use serde::Serialize;

use crate::error::InstallError;
use crate::layout::Layout;
use crate::lifecycle::InstallState;
use crate::modules;
use crate::state::InstallationManifest;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleUpdate {
    pub module: String,
    pub installed: String,
    pub available: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstallStatus {
    pub manifest: InstallationManifest,
    pub available_updates: Vec<ModuleUpdate>,
    /// Agents whose overlay changes something, as `module/name`.
    pub customized_agents: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Status {
    NotInstalled,
    Installed(Box<InstallStatus>),
}

/// Describe the installation in `project_root` without modifying anything.
///
/// When `source_root` is given, installed module versions are compared with
/// the versions available there.
pub fn read_status(
    project_root: &Path,
    bmad_folder: &str,
    source_root: Option<&Path>,
) -> Result<Status, InstallError> {
    let layout = Layout::new(project_root, bmad_folder);
    let manifest = match InstallState::detect(&layout)? {
        InstallState::NoInstallation => return Ok(Status::NotInstalled),
        InstallState::Installed(manifest) => *manifest,
    };

    let available_updates = match source_root {
        Some(root) => {
            let available = modules::available(root);
            manifest
                .modules
                .iter()
                .filter_map(|m| {
                    let candidate = available.get(&m.name)?;
                    is_newer(&m.version, &candidate.version).then(|| ModuleUpdate {
                        module: m.name.clone(),
                        installed: m.version.clone(),
                        available: candidate.version.clone(),
                    })
                })
                .collect()
        }
        None => Vec::new(),
    };

    let customized_agents = customized_agents(&layout);
    Ok(Status::Installed(Box::new(InstallStatus {
        manifest,
        available_updates,
        customized_agents,
    })))
}

/// Semver comparison when both sides parse, plain inequality otherwise.
fn is_newer(installed: &str, available: &str) -> bool {
    match (
        semver::Version::parse(installed.trim()),
        semver::Version::parse(available.trim()),
    ) {
        (Ok(i), Ok(a)) => a > i,
        _ => installed.trim() != available.trim(),
    }
}

fn customized_agents(layout: &Layout) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(layout.overlays_dir()) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .flatten()
        .filter_map(|e| {
            let file_name = e.file_name().to_string_lossy().into_owned();
            let stem = file_name.strip_suffix(".customize.yaml")?.to_string();
            match bmad_core::customize::load_overlay(&e.path()) {
                bmad_core::OverlayLoad::Loaded(o) if !o.is_noop() => Some(stem),
                _ => None,
            }
        })
        .collect();
    names.sort();
    names
}
