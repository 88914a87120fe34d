//! Removing an installation in phases.
//!
//! Each phase moves its targets into a staging directory inside the project
//! and deletes the staging directory only when every move succeeded. A
//! failed move puts everything already staged back where it was.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{InstallError, IoResultExt};
use crate::ide::IdeTarget;
use crate::layout::{is_contained, Layout};
use crate::state::InstallationManifest;

const STAGING_PREFIX: &str = ".bmad-uninstall";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UninstallPhase {
    IdeIntegrations,
    OutputArtifacts,
    ModuleContent,
}

impl UninstallPhase {
    /// Phases always run in this order.
    pub const ORDER: [UninstallPhase; 3] = [
        Self::IdeIntegrations,
        Self::OutputArtifacts,
        Self::ModuleContent,
    ];
}

impl fmt::Display for UninstallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::IdeIntegrations => "IDE integrations",
            Self::OutputArtifacts => "output artifacts",
            Self::ModuleContent => "module content",
        })
    }
}

/// Which parts of an installation to remove.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UninstallOptions {
    pub ide_integrations: bool,
    pub output_artifacts: bool,
    pub module_content: bool,
}

impl UninstallOptions {
    pub fn all() -> Self {
        Self {
            ide_integrations: true,
            output_artifacts: true,
            module_content: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.ide_integrations || self.output_artifacts || self.module_content)
    }

    pub fn includes(&self, phase: UninstallPhase) -> bool {
        match phase {
            UninstallPhase::IdeIntegrations => self.ide_integrations,
            UninstallPhase::OutputArtifacts => self.output_artifacts,
            UninstallPhase::ModuleContent => self.module_content,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UninstallReport {
    pub completed: Vec<UninstallPhase>,
    pub failed: Option<(UninstallPhase, String)>,
    /// Phases not requested, or not run because an earlier one failed.
    pub skipped: Vec<UninstallPhase>,
    /// Project-relative paths removed.
    pub removed: Vec<String>,
}

impl UninstallReport {
    pub fn success(&self) -> bool {
        self.failed.is_none()
    }
}

pub(crate) fn run(
    layout: &Layout,
    mut manifest: InstallationManifest,
    options: &UninstallOptions,
) -> Result<UninstallReport, InstallError> {
    let mut report = UninstallReport::default();

    for phase in UninstallPhase::ORDER {
        if !options.includes(phase) || report.failed.is_some() {
            report.skipped.push(phase);
            continue;
        }
        let targets = phase_targets(layout, &manifest, phase);
        info!("Uninstalling {phase}: {} target(s)", targets.len());
        match stage_and_remove(layout.project_root(), &targets) {
            Ok(()) => {
                report
                    .removed
                    .extend(targets.iter().filter_map(|t| layout.relative(t)));
                report.completed.push(phase);
                if phase == UninstallPhase::IdeIntegrations {
                    prune_command_dirs(layout.project_root(), &manifest.ides);
                }
            }
            Err(e) => {
                warn!("Uninstall of {phase} failed and was rolled back: {e}");
                report.failed = Some((phase, e.to_string()));
            }
        }
    }

    let ides_removed = report.completed.contains(&UninstallPhase::IdeIntegrations);
    if ides_removed && layout.bmad_dir().is_dir() {
        manifest.ides.clear();
        manifest.generated.clear();
        manifest.installation.last_updated = chrono::Utc::now();
        manifest.write(layout)?;
    }
    Ok(report)
}

fn phase_targets(layout: &Layout, manifest: &InstallationManifest, phase: UninstallPhase) -> Vec<PathBuf> {
    match phase {
        UninstallPhase::IdeIntegrations => manifest
            .generated
            .iter()
            .filter(|f| is_contained(Path::new(&f.path)))
            .map(|f| layout.resolve(&f.path))
            .filter(|p| p.is_file())
            .collect(),
        UninstallPhase::OutputArtifacts => {
            let folder = manifest.settings.output_folder.trim();
            if folder.is_empty() || folder == manifest.bmad_folder || !is_contained(Path::new(folder)) {
                warn!("Refusing to remove output folder '{folder}'");
                return Vec::new();
            }
            let dir = layout.resolve(folder);
            if dir.exists() {
                vec![dir]
            } else {
                Vec::new()
            }
        }
        UninstallPhase::ModuleContent => {
            let dir = layout.bmad_dir();
            if dir.exists() {
                vec![dir]
            } else {
                Vec::new()
            }
        }
    }
}

/// Move every target into a fresh staging directory under `project_root`,
/// then delete it. On a failed move the already-staged targets are restored.
pub(crate) fn stage_and_remove(project_root: &Path, targets: &[PathBuf]) -> Result<(), InstallError> {
    if targets.is_empty() {
        return Ok(());
    }
    let stage = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(project_root)
        .at(project_root)?;

    let mut moved: Vec<(&Path, PathBuf)> = Vec::new();
    for (i, target) in targets.iter().enumerate() {
        let staged = stage.path().join(i.to_string());
        if let Err(source) = std::fs::rename(target, &staged) {
            for (original, staged) in moved.iter().rev() {
                if let Err(e) = std::fs::rename(staged, original) {
                    warn!("Could not restore {}: {e}", original.display());
                }
            }
            return Err(InstallError::Io {
                path: target.clone(),
                source,
            });
        }
        debug!("Staged {} for removal", target.display());
        moved.push((target.as_path(), staged));
    }

    let stage_path = stage.path().to_path_buf();
    stage.close().at(&stage_path)
}

/// Remove command directories left empty.
fn prune_command_dirs(project_root: &Path, ides: &[String]) {
    for target in ides.iter().filter_map(|i| IdeTarget::find(i)) {
        let dir = target.dir(project_root);
        let empty = dir.read_dir().map(|mut d| d.next().is_none()).unwrap_or(false);
        if empty && std::fs::remove_dir(&dir).is_ok() {
            debug!("Removed empty {}", dir.display());
        }
    }
}
