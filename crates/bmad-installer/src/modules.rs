//! Module sources and copying their content into the project.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use bmad_core::model::CORE_MODULE;

use crate::config::validate_module_code;
use crate::error::{InstallError, IoResultExt};
use crate::files::{hash_file, FileEntry, FilesManifest};
use crate::layout::{to_slash, Layout};

pub const MODULE_DESCRIPTOR: &str = "module.yaml";
const BUILT_IN_SUBDIR: &str = "modules";
const BACKUP_SUFFIX: &str = ".bak";

/// Contents of a module's `module.yaml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModuleDescriptor {
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Settings the module contributes to its `config.yaml`, with defaults.
    #[serde(default)]
    pub config: BTreeMap<String, SettingSpec>,
}

fn default_version() -> String {
    "0.0.0".to_string()
}

/// A module setting: either a bare default or a prompt definition with one.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SettingSpec {
    Detailed {
        default: serde_yaml::Value,
        #[serde(default)]
        prompt: Option<String>,
    },
    Plain(serde_yaml::Value),
}

impl SettingSpec {
    pub fn default_value(&self) -> String {
        let value = match self {
            Self::Detailed { default, .. } => default,
            Self::Plain(v) => v,
        };
        yaml_scalar_to_string(value)
    }
}

pub(crate) fn yaml_scalar_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::Null => String::new(),
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

impl ModuleDescriptor {
    pub fn load(path: &Path) -> Result<Self, InstallError> {
        let text = std::fs::read_to_string(path).at(path)?;
        let descriptor: Self = serde_yaml::from_str(&text).map_err(|e| {
            InstallError::InvalidConfig(format!("{}: {e}", path.display()))
        })?;
        Ok(descriptor)
    }

    /// Defaults for every declared setting.
    pub fn default_settings(&self) -> BTreeMap<String, String> {
        self.config
            .iter()
            .map(|(k, spec)| (k.clone(), spec.default_value()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "path")]
pub enum ModuleOrigin {
    BuiltIn,
    Custom(PathBuf),
}

impl fmt::Display for ModuleOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BuiltIn => f.write_str("built-in"),
            Self::Custom(p) => write!(f, "custom ({})", p.display()),
        }
    }
}

/// A module whose content is available on disk, ready to install.
#[derive(Debug, Clone)]
pub struct ModuleSource {
    pub descriptor: ModuleDescriptor,
    pub root: PathBuf,
    pub origin: ModuleOrigin,
}

impl ModuleSource {
    pub fn code(&self) -> &str {
        &self.descriptor.code
    }

    fn open(root: &Path, origin: ModuleOrigin) -> Result<Self, InstallError> {
        let descriptor = ModuleDescriptor::load(&root.join(MODULE_DESCRIPTOR))?;
        validate_module_code(&descriptor.code)?;
        Ok(Self {
            descriptor,
            root: root.to_path_buf(),
            origin,
        })
    }
}

/// Locate the built-in module `code` under `source_root`.
pub fn find_built_in(source_root: &Path, code: &str) -> Option<PathBuf> {
    [source_root.join(code), source_root.join(BUILT_IN_SUBDIR).join(code)]
        .into_iter()
        .find(|dir| dir.join(MODULE_DESCRIPTOR).is_file())
}

/// Resolve the modules to install: `core` first, then the selection in order,
/// then custom content. Duplicate codes keep their first occurrence.
pub fn resolve(
    source_root: Option<&Path>,
    selected: &[String],
    custom_paths: &[PathBuf],
) -> Result<Vec<ModuleSource>, InstallError> {
    let mut wanted: Vec<&str> = vec![CORE_MODULE];
    wanted.extend(selected.iter().map(String::as_str).filter(|m| *m != CORE_MODULE));

    let mut sources = Vec::new();
    let mut seen = BTreeSet::new();

    for code in wanted {
        if !seen.insert(code.to_string()) {
            continue;
        }
        let root = source_root
            .and_then(|r| find_built_in(r, code))
            .ok_or_else(|| InstallError::ModuleNotFound(code.to_string()))?;
        sources.push(ModuleSource::open(&root, ModuleOrigin::BuiltIn)?);
    }

    for path in custom_paths {
        if !path.join(MODULE_DESCRIPTOR).is_file() {
            return Err(InstallError::ModuleNotFound(format!(
                "no {MODULE_DESCRIPTOR} in custom content {}",
                path.display()
            )));
        }
        let source = ModuleSource::open(path, ModuleOrigin::Custom(path.clone()))?;
        if seen.insert(source.code().to_string()) {
            sources.push(source);
        } else {
            warn!("Custom module '{}' shadows an already selected module; skipped", source.code());
        }
    }

    Ok(sources)
}

/// Every module available under `source_root`, keyed by code.
pub fn available(source_root: &Path) -> BTreeMap<String, ModuleDescriptor> {
    let mut found = BTreeMap::new();
    for dir in [source_root.to_path_buf(), source_root.join(BUILT_IN_SUBDIR)] {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let descriptor_path = entry.path().join(MODULE_DESCRIPTOR);
            if !descriptor_path.is_file() {
                continue;
            }
            match ModuleDescriptor::load(&descriptor_path) {
                Ok(d) => {
                    found.entry(d.code.clone()).or_insert(d);
                }
                Err(e) => debug!("Ignoring {}: {e}", descriptor_path.display()),
            }
        }
    }
    found
}

/// What copying one module produced.
#[derive(Debug, Default)]
pub struct ContentReport {
    /// Vendor files now installed, with their hashes.
    pub files: Vec<FileEntry>,
    pub preserved: usize,
    pub backed_up: usize,
    pub warnings: Vec<String>,
}

/// Replace the installed content of `source` with a fresh copy.
///
/// The copy is assembled in a staging directory first and swapped in only
/// once complete, so a failed copy leaves the previous content in place.
/// Files the user added since the last install are carried over; vendor
/// files the user edited are saved next to the new copy with a `.bak` suffix.
pub fn install_content(
    source: &ModuleSource,
    layout: &Layout,
    previous: &FilesManifest,
) -> Result<ContentReport, InstallError> {
    let code = source.code();
    let dest = layout.module_dir(code);
    let staging_root = layout.staging_dir();
    let staged = staging_root.join(code);

    if staged.exists() {
        std::fs::remove_dir_all(&staged).at(&staged)?;
    }
    std::fs::create_dir_all(&staged).at(&staged)?;

    let mut report = ContentReport::default();
    let vendor_files = copy_tree(&source.root, &staged)?;

    for rel in &vendor_files {
        let project_rel = format!("{}/{code}/{rel}", layout.bmad_folder());
        let hash = hash_file(&staged.join(rel))?;
        report.files.push(FileEntry::new(code, project_rel, hash));
    }

    if dest.exists() {
        carry_over_user_files(code, &dest, &staged, &vendor_files, layout, previous, &mut report)?;
    }

    swap_in(&staged, &dest, &staging_root.join(format!("{code}.old")))?;
    if staging_root.read_dir().map(|mut d| d.next().is_none()).unwrap_or(false) {
        let _ = std::fs::remove_dir(&staging_root);
    }

    info!(
        "Installed module {code} ({} files, {} preserved, {} backed up)",
        report.files.len(),
        report.preserved,
        report.backed_up
    );
    Ok(report)
}

/// Copy every file under `from` into `to`, returning slash-separated
/// relative paths in sorted order.
fn copy_tree(from: &Path, to: &Path) -> Result<Vec<String>, InstallError> {
    let mut copied = Vec::new();
    for entry in WalkDir::new(from).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(from) else {
            continue;
        };
        let target = to.join(rel);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).at(parent)?;
        }
        std::fs::copy(entry.path(), &target).at(entry.path())?;
        copied.push(to_slash(rel));
    }
    Ok(copied)
}

fn carry_over_user_files(
    code: &str,
    dest: &Path,
    staged: &Path,
    vendor_files: &[String],
    layout: &Layout,
    previous: &FilesManifest,
    report: &mut ContentReport,
) -> Result<(), InstallError> {
    let vendor: BTreeSet<&str> = vendor_files.iter().map(String::as_str).collect();

    for entry in WalkDir::new(dest).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel_path) = entry.path().strip_prefix(dest) else {
            continue;
        };
        let rel = to_slash(rel_path);
        let project_rel = format!("{}/{code}/{rel}", layout.bmad_folder());

        match previous.get(&project_rel) {
            None if !vendor.contains(rel.as_str()) => {
                let target = staged.join(rel_path);
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent).at(parent)?;
                }
                std::fs::copy(entry.path(), &target).at(entry.path())?;
                report.preserved += 1;
                debug!("Preserved user file {project_rel}");
            }
            Some(recorded) => {
                let current = hash_file(entry.path())?;
                if current != recorded.hash && vendor.contains(rel.as_str()) {
                    let backup = staged.join(format!("{rel}{BACKUP_SUFFIX}"));
                    std::fs::copy(entry.path(), &backup).at(entry.path())?;
                    report.backed_up += 1;
                    report.warnings.push(format!(
                        "{project_rel} was modified locally; your version was saved as {project_rel}{BACKUP_SUFFIX}"
                    ));
                }
            }
            None => {}
        }
    }
    Ok(())
}

/// Move `staged` into `dest`, restoring the old content if the move fails.
fn swap_in(staged: &Path, dest: &Path, old: &Path) -> Result<(), InstallError> {
    if old.exists() {
        if !dest.exists() {
            return Err(InstallError::StrandedBackup(old.to_path_buf()));
        }
        std::fs::remove_dir_all(old).at(old)?;
    }
    let had_previous = dest.exists();
    if had_previous {
        std::fs::rename(dest, old).at(dest)?;
    } else if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).at(parent)?;
    }

    if let Err(e) = std::fs::rename(staged, dest) {
        if had_previous {
            if let Err(restore) = std::fs::rename(old, dest) {
                error!(
                    "Could not restore {} from {}: {restore}",
                    dest.display(),
                    old.display()
                );
            }
        }
        return Err(InstallError::Io {
            path: dest.to_path_buf(),
            source: e,
        });
    }

    if had_previous {
        std::fs::remove_dir_all(old).at(old)?;
    }
    Ok(())
}

/// Read an existing module `config.yaml` as flat key/value strings.
pub fn read_module_config(path: &Path) -> BTreeMap<String, String> {
    let Ok(text) = std::fs::read_to_string(path) else {
        return BTreeMap::new();
    };
    match serde_yaml::from_str::<BTreeMap<String, serde_yaml::Value>>(&text) {
        Ok(map) => map
            .iter()
            .map(|(k, v)| (k.clone(), yaml_scalar_to_string(v)))
            .collect(),
        Err(e) => {
            warn!("Ignoring unreadable {}: {e}", path.display());
            BTreeMap::new()
        }
    }
}

/// Write a module's `config.yaml`.
pub fn write_module_config(
    path: &Path,
    module: &str,
    values: &BTreeMap<String, String>,
) -> Result<(), InstallError> {
    let mut text = format!("# {module} module configuration, generated by the installer.\n");
    text.push_str("# Values are kept by quick-update; edit them here or re-run install.\n\n");
    text.push_str(&serde_yaml::to_string(values)?);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).at(parent)?;
    }
    std::fs::write(path, text).at(path)
}
