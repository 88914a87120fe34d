//! Deciding what to do with a project and running the install pipeline.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use bmad_core::manifest;
use bmad_core::model::CORE_MODULE;
use bmad_core::{ArtifactRecord, ArtifactType, NamingConvention, Variables};

use crate::compiler;
use crate::config::{ActionRequest, CoreSettings, InstallConfig};
use crate::error::{InstallError, IoResultExt};
use crate::files::{hash_file, FileEntry, FilesManifest};
use crate::generator::{self, ArtifactGenerator, GeneratedFile};
use crate::ide::IdeTarget;
use crate::layout::Layout;
use crate::modules::{self, ModuleOrigin, ModuleSource};
use crate::result::InstallResult;
use crate::scan;
use crate::state::{InstallationManifest, InstalledModule};
use crate::uninstall::{self, UninstallOptions, UninstallReport};

/// What a run will do to the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    FreshInstall,
    Update,
    QuickUpdate,
    CompileAgents,
    Uninstall,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FreshInstall => "fresh install",
            Self::Update => "update",
            Self::QuickUpdate => "quick update",
            Self::CompileAgents => "compile agents",
            Self::Uninstall => "uninstall",
        })
    }
}

/// Whether the project already holds an installation.
#[derive(Debug, Clone, PartialEq)]
pub enum InstallState {
    NoInstallation,
    Installed(Box<InstallationManifest>),
}

impl InstallState {
    pub fn detect(layout: &Layout) -> Result<Self, InstallError> {
        Ok(match InstallationManifest::read(layout)? {
            Some(m) => Self::Installed(Box::new(m)),
            None => Self::NoInstallation,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedModule {
    pub code: String,
    pub version: String,
    /// Version currently installed, if any.
    pub installed: Option<String>,
}

/// Everything a run is about to do, shown to the user before any write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstallPlan {
    pub action: Action,
    pub project_root: PathBuf,
    pub bmad_folder: String,
    pub modules: Vec<PlannedModule>,
    pub ides: Vec<String>,
    pub settings: CoreSettings,
}

/// Asks whether a plan may proceed.
pub trait Confirm {
    fn confirm(&self, plan: &InstallPlan) -> bool;
}

/// Proceeds without asking.
pub struct AutoConfirm;

impl Confirm for AutoConfirm {
    fn confirm(&self, _plan: &InstallPlan) -> bool {
        true
    }
}

/// Inputs of one pipeline pass once previous state has been folded in.
struct Resolved {
    settings: CoreSettings,
    modules: Vec<String>,
    ides: Vec<String>,
    custom_paths: Vec<PathBuf>,
    module_settings: BTreeMap<String, BTreeMap<String, String>>,
}

pub struct Installer {
    config: InstallConfig,
    layout: Layout,
}

impl Installer {
    pub fn new(config: InstallConfig) -> Self {
        let layout = Layout::new(&config.project_directory, config.bmad_folder.trim());
        Self { config, layout }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn config(&self) -> &InstallConfig {
        &self.config
    }

    /// Decide the action from the requested one and the current state.
    pub fn plan(&self) -> Result<Action, InstallError> {
        self.decide(self.config.action).map(|(action, _)| action)
    }

    fn decide(
        &self,
        requested: Option<ActionRequest>,
    ) -> Result<(Action, Option<InstallationManifest>), InstallError> {
        let existing = match InstallationManifest::read(&self.layout) {
            Ok(m) => m,
            Err(InstallError::CorruptManifest { path, message })
                if requested == Some(ActionRequest::Install) =>
            {
                warn!("Reinstalling over corrupt manifest {}: {message}", path.display());
                None
            }
            Err(e) => return Err(e),
        };

        let action = match (requested, existing.is_some()) {
            (None | Some(ActionRequest::Install), false) => Action::FreshInstall,
            (Some(_), false) => return Err(InstallError::NotInstalled(self.layout.bmad_dir())),
            (None, true) => return Err(InstallError::ActionRequired(self.layout.bmad_dir())),
            (Some(ActionRequest::Install | ActionRequest::Update), true) => Action::Update,
            (Some(ActionRequest::QuickUpdate), true) => Action::QuickUpdate,
            (Some(ActionRequest::CompileAgents), true) => Action::CompileAgents,
            (Some(ActionRequest::Uninstall), true) => Action::Uninstall,
        };
        Ok((action, existing))
    }

    /// Run whatever [`Installer::plan`] decides. Uninstall removes everything.
    pub fn run(&self, confirm: &dyn Confirm) -> Result<InstallResult, InstallError> {
        match self.plan()? {
            Action::FreshInstall | Action::Update => self.install(confirm),
            Action::QuickUpdate => self.quick_update(confirm),
            Action::CompileAgents => self.compile_agents(&[]),
            Action::Uninstall => {
                let plan = self.describe(Action::Uninstall, &[], &self.resolve_from_manifest()?);
                if !confirm.confirm(&plan) {
                    return Ok(InstallResult::cancelled(Action::Uninstall));
                }
                let report = self.uninstall(&UninstallOptions::all())?;
                let mut result = InstallResult::completed(Action::Uninstall, Vec::new());
                result.success = report.success();
                result.warnings.extend(report.failed.map(|(phase, msg)| format!("{phase}: {msg}")));
                Ok(result)
            }
        }
    }

    /// Fresh install, or a full update when an installation exists.
    pub fn install(&self, confirm: &dyn Confirm) -> Result<InstallResult, InstallError> {
        self.config.validate()?;
        let (action, previous) = self.decide(Some(ActionRequest::Install))?;
        let resolved = self.resolve_from_config(previous.as_ref());
        self.execute(action, resolved, previous, confirm)
    }

    /// Refresh content while keeping every stored setting.
    pub fn quick_update(&self, confirm: &dyn Confirm) -> Result<InstallResult, InstallError> {
        self.config.validate_location()?;
        let previous = self.require_manifest()?;
        let resolved = self.resolve_from_manifest_with(&previous);
        self.execute(Action::QuickUpdate, resolved, Some(previous), confirm)
    }

    /// Recompile agents over installed content and regenerate their command
    /// files. `only` selects agents by name, `module/name`, or generated file
    /// name; empty means all.
    pub fn compile_agents(&self, only: &[String]) -> Result<InstallResult, InstallError> {
        let mut manifest = self.require_manifest()?;
        let mut warnings = Vec::new();

        let records = self.load_records(&manifest.settings)?;
        let agents: Vec<ArtifactRecord> = records
            .into_iter()
            .filter(|r| r.artifact_type == ArtifactType::Agent)
            .collect();
        let selected = select_agents(&agents, only, &mut warnings);

        let compiled = compiler::compile_all(&self.layout, &selected)?;
        warnings.extend(compiled.warnings);

        let targets = targets(&manifest.ides);
        let generation = ArtifactGenerator::from_layout(&self.layout).generate_all(&selected, &targets)?;
        warnings.extend(generation.warnings);

        let recompiled: BTreeSet<(&str, &str)> = selected
            .iter()
            .map(|r| (r.module.as_str(), r.name.as_str()))
            .collect();
        let (replaced, mut kept): (Vec<GeneratedFile>, Vec<GeneratedFile>) =
            manifest.generated.iter().cloned().partition(|f| {
                f.artifact_type == ArtifactType::Agent
                    && recompiled.contains(&(f.module.as_str(), f.name.as_str()))
            });
        generator::remove_stale(self.layout.project_root(), &replaced, &generation.files)?;
        kept.extend(generation.files.iter().cloned());
        manifest.generated = kept;

        let mut files = FilesManifest::read(&self.layout.files_manifest_path())?;
        files.extend(self.compiled_entries(&selected)?);
        files.write(&self.layout.files_manifest_path())?;

        manifest.installation.last_updated = Utc::now();
        manifest.write(&self.layout)?;

        info!("Compiled {} agent(s)", compiled.compiled);
        let mut result = InstallResult::completed(Action::CompileAgents, manifest.module_names());
        result.agent_count = compiled.compiled;
        result.generated = generation.files;
        result.warnings = warnings;
        Ok(result)
    }

    /// Remove the parts of the installation named in `options`.
    pub fn uninstall(&self, options: &UninstallOptions) -> Result<UninstallReport, InstallError> {
        let manifest = self.require_manifest()?;
        uninstall::run(&self.layout, manifest, options)
    }

    fn require_manifest(&self) -> Result<InstallationManifest, InstallError> {
        InstallationManifest::read(&self.layout)?
            .ok_or_else(|| InstallError::NotInstalled(self.layout.bmad_dir()))
    }

    fn resolve_from_config(&self, previous: Option<&InstallationManifest>) -> Resolved {
        let mut modules: Vec<String> = Vec::new();
        let mut custom_paths = self.config.custom_content_paths.clone();
        let mut ides = self.config.selected_ides.clone();
        let mut module_settings = BTreeMap::new();

        // An update never drops a module; removing content is uninstall's job.
        if let Some(prev) = previous {
            for m in &prev.modules {
                match &m.source {
                    ModuleOrigin::BuiltIn => modules.push(m.name.clone()),
                    ModuleOrigin::Custom(p) if !custom_paths.contains(p) => custom_paths.push(p.clone()),
                    ModuleOrigin::Custom(_) => {}
                }
                module_settings.insert(m.name.clone(), m.settings.clone());
            }
            if ides.is_empty() {
                ides = prev.ides.clone();
            }
        }
        for m in &self.config.selected_modules {
            if !modules.contains(m) {
                modules.push(m.clone());
            }
        }
        for (module, values) in &self.config.module_settings {
            module_settings
                .entry(module.clone())
                .or_insert_with(BTreeMap::new)
                .extend(values.clone());
        }

        Resolved {
            settings: self.config.settings(),
            modules,
            ides: normalize_ides(&ides),
            custom_paths,
            module_settings,
        }
    }

    fn resolve_from_manifest(&self) -> Result<Resolved, InstallError> {
        Ok(self.resolve_from_manifest_with(&self.require_manifest()?))
    }

    /// Settings come from the manifest, then from edits the user made to the
    /// generated `config.yaml` files. Caller-supplied values are ignored.
    fn resolve_from_manifest_with(&self, previous: &InstallationManifest) -> Resolved {
        let mut settings = previous.settings.clone();
        settings.apply(&modules::read_module_config(&self.layout.module_config_path(CORE_MODULE)));

        let mut modules = Vec::new();
        let mut custom_paths = Vec::new();
        let mut module_settings = BTreeMap::new();
        for m in &previous.modules {
            match &m.source {
                ModuleOrigin::BuiltIn => modules.push(m.name.clone()),
                ModuleOrigin::Custom(p) => custom_paths.push(p.clone()),
            }
            let mut values = m.settings.clone();
            let on_disk = modules::read_module_config(&self.layout.module_config_path(&m.name));
            values.extend(
                on_disk
                    .into_iter()
                    .filter(|(k, _)| !CoreSettings::KEYS.contains(&k.as_str())),
            );
            module_settings.insert(m.name.clone(), values);
        }

        Resolved {
            settings,
            modules,
            ides: previous.ides.clone(),
            custom_paths,
            module_settings,
        }
    }

    fn describe(&self, action: Action, sources: &[ModuleSource], resolved: &Resolved) -> InstallPlan {
        let installed = InstallationManifest::read(&self.layout).ok().flatten();
        let modules = sources
            .iter()
            .map(|s| PlannedModule {
                code: s.code().to_string(),
                version: s.descriptor.version.clone(),
                installed: installed
                    .as_ref()
                    .and_then(|m| m.module(s.code()))
                    .map(|m| m.version.clone()),
            })
            .collect();
        InstallPlan {
            action,
            project_root: self.layout.project_root().to_path_buf(),
            bmad_folder: self.layout.bmad_folder().to_string(),
            modules,
            ides: resolved.ides.clone(),
            settings: resolved.settings.clone(),
        }
    }

    fn execute(
        &self,
        action: Action,
        resolved: Resolved,
        previous: Option<InstallationManifest>,
        confirm: &dyn Confirm,
    ) -> Result<InstallResult, InstallError> {
        let sources = modules::resolve(
            self.config.source_root.as_deref(),
            &resolved.modules,
            &resolved.custom_paths,
        )?;
        let plan = self.describe(action, &sources, &resolved);
        if !confirm.confirm(&plan) {
            info!("{action} cancelled");
            return Ok(InstallResult::cancelled(action));
        }
        info!("Starting {action} in {}", self.layout.project_root().display());

        let layout = &self.layout;
        let now = Utc::now();
        let mut warnings = Vec::new();
        let previous_files = FilesManifest::read(&layout.files_manifest_path())?;
        let mut files = FilesManifest::default();
        let mut installed_modules = Vec::new();

        for source in &sources {
            let content = modules::install_content(source, layout, &previous_files)?;
            warnings.extend(content.warnings);
            files.extend(content.files);

            let mut values = source.descriptor.default_settings();
            if let Some(stored) = resolved.module_settings.get(source.code()) {
                values.extend(stored.clone());
            }
            let config_path = layout.module_config_path(source.code());
            let mut written = values.clone();
            written.extend(resolved.settings.to_map());
            modules::write_module_config(&config_path, source.code(), &written)?;
            files.extend(self.entry_for(source.code(), &config_path)?);

            let prior = previous.as_ref().and_then(|p| p.module(source.code()));
            installed_modules.push(InstalledModule {
                name: source.code().to_string(),
                version: source.descriptor.version.clone(),
                source: source.origin.clone(),
                install_date: prior.map_or(now, |m| m.install_date),
                last_updated: now,
                settings: values
                    .into_iter()
                    .filter(|(k, _)| !CoreSettings::KEYS.contains(&k.as_str()))
                    .collect(),
            });
        }

        let output_dir = layout.resolve(&resolved.settings.output_folder);
        std::fs::create_dir_all(&output_dir).at(&output_dir)?;

        let codes: Vec<String> = sources.iter().map(|s| s.code().to_string()).collect();
        let scanned = scan::scan_modules(layout, &codes)?;
        warnings.extend(scanned.warnings);
        scan::write_manifests(layout, &scanned.records)?;
        let records = self.load_records(&resolved.settings)?;

        let compiled = compiler::compile_all(layout, &records)?;
        warnings.extend(compiled.warnings);
        files.extend(self.compiled_entries(&records)?);

        let targets = targets(&resolved.ides);
        let generation = ArtifactGenerator::from_layout(layout).generate_all(&records, &targets)?;
        warnings.extend(generation.warnings);

        if let Some(prev) = &previous {
            let removed = generator::remove_stale(layout.project_root(), &prev.generated, &generation.files)?;
            if !removed.is_empty() {
                info!("Removed {} stale command file(s)", removed.len());
            }
        }
        let mut known = generation.files.clone();
        if let Some(prev) = &previous {
            known.extend(prev.generated.iter().cloned());
        }
        for target in &targets {
            let removed = generator::remove_legacy(layout.project_root(), target, &known)?;
            if !removed.is_empty() {
                info!("Removed {} legacy file(s) from {}", removed.len(), target.command_dir);
            }
        }

        files.write(&layout.files_manifest_path())?;

        let mut manifest = InstallationManifest::new(layout.bmad_folder(), resolved.settings, now);
        if let Some(prev) = &previous {
            manifest.installation.install_date = prev.installation.install_date;
        }
        manifest.modules = installed_modules;
        manifest.ides = resolved.ides;
        manifest.generated = generation.files.clone();
        manifest.write(layout)?;

        let mut result = InstallResult::completed(action, codes);
        result.agent_count = records
            .iter()
            .filter(|r| r.artifact_type == ArtifactType::Agent)
            .count();
        result.generated = generation.files;
        result.warnings = warnings;
        info!(
            "{action} complete: {} module(s), {} agent(s), {} command file(s)",
            result.module_count,
            result.agent_count,
            result.generated.len()
        );
        Ok(result)
    }

    fn load_records(&self, settings: &CoreSettings) -> Result<Vec<ArtifactRecord>, InstallError> {
        let vars = Variables::new(self.layout.bmad_folder())
            .with("output_folder", settings.output_folder.clone());
        Ok(manifest::load_all(&self.layout.config_dir(), &vars)?)
    }

    fn entry_for(&self, module: &str, path: &std::path::Path) -> Result<Option<FileEntry>, InstallError> {
        let Some(rel) = self.layout.relative(path) else {
            return Ok(None);
        };
        Ok(Some(FileEntry::new(module, rel, hash_file(path)?)))
    }

    /// Inventory entries for compiled agent files that exist on disk.
    fn compiled_entries(&self, records: &[ArtifactRecord]) -> Result<Vec<FileEntry>, InstallError> {
        let mut entries = Vec::new();
        for r in records.iter().filter(|r| r.artifact_type == ArtifactType::Agent) {
            let path = self.layout.resolve(&r.source_path);
            if path.is_file() {
                entries.extend(self.entry_for(&r.module, &path)?);
            }
        }
        Ok(entries)
    }
}

fn normalize_ides(ides: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for ide in ides {
        if let Some(t) = IdeTarget::find(ide) {
            if !out.iter().any(|c| c == t.code) {
                out.push(t.code.to_string());
            }
        }
    }
    out
}

fn targets(ides: &[String]) -> Vec<&'static IdeTarget> {
    ides.iter().filter_map(|i| IdeTarget::find(i)).collect()
}

fn select_agents(agents: &[ArtifactRecord], only: &[String], warnings: &mut Vec<String>) -> Vec<ArtifactRecord> {
    if only.is_empty() {
        return agents.to_vec();
    }
    let mut selected: Vec<ArtifactRecord> = Vec::new();
    for wanted in only {
        let wanted = wanted.trim();
        let decoded = NamingConvention::detect(wanted).map(|(_, parsed)| parsed);
        let matches: Vec<&ArtifactRecord> = agents
            .iter()
            .filter(|a| {
                a.name == wanted
                    || format!("{}/{}", a.module, a.name) == wanted
                    || decoded
                        .as_ref()
                        .is_some_and(|p| p.module == a.module && p.name == a.name)
            })
            .collect();
        if matches.is_empty() {
            warnings.push(format!("no installed agent matches '{wanted}'"));
        }
        for m in matches {
            if !selected.contains(m) {
                selected.push(m.clone());
            }
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::SourceTree;
    use std::cell::Cell;
    use std::fs;
    use tempfile::TempDir;

    struct Decline(Cell<bool>);

    impl Confirm for Decline {
        fn confirm(&self, _plan: &InstallPlan) -> bool {
            self.0.set(true);
            false
        }
    }

    fn install(src: &SourceTree, project: &TempDir, modules: &[&str], ides: &[&str]) -> InstallResult {
        Installer::new(src.config(project.path(), modules, ides))
            .install(&AutoConfirm)
            .unwrap()
    }

    fn read_generated(project: &TempDir, files: &[GeneratedFile]) -> Vec<(String, Vec<u8>)> {
        files
            .iter()
            .map(|f| (f.path.clone(), fs::read(project.path().join(&f.path)).unwrap()))
            .collect()
    }

    #[test]
    fn test_fresh_install_end_to_end() {
        let src = SourceTree::new();
        let project = TempDir::new().unwrap();
        let result = install(&src, &project, &["bmm"], &["claude-code"]);

        assert!(result.success);
        assert_eq!(result.action, Some(Action::FreshInstall));
        assert_eq!(result.modules, vec!["core", "bmm"]);
        assert_eq!(result.agent_count, 3);
        assert_eq!(result.generated.len(), 7);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);

        let root = project.path();
        let commands = root.join(".claude/commands");
        for name in [
            "bmad-agent-bmad-master.md",
            "bmad-agent-bmm-pm.md",
            "bmad-agent-bmm-tech-writer.md",
            "bmad-brainstorming.md",
            "bmad-bmm-correct-course.md",
            "bmad-help.md",
            "bmad-bmm-shard-doc.md",
        ] {
            assert!(commands.join(name).is_file(), "missing {name}");
        }
        assert!(!commands.join("bmad-workflow.md").exists());

        assert!(root.join("_bmad/bmm/agents/pm.md").is_file());
        assert!(root.join("_bmad/_config/agents/bmm-pm.customize.yaml").is_file());
        assert!(root.join("_bmad/_config/files-manifest.csv").is_file());
        assert!(root.join("_bmad-output").is_dir());

        let bmm_config = modules::read_module_config(&root.join("_bmad/bmm/config.yaml"));
        assert_eq!(bmm_config["project_name"], "demo");
        assert_eq!(bmm_config["user_name"], "User");

        let manifest = InstallationManifest::read(&Layout::new(root, "_bmad")).unwrap().unwrap();
        assert_eq!(manifest.module_names(), vec!["core", "bmm"]);
        assert_eq!(manifest.ides, vec!["claude-code"]);
        assert_eq!(manifest.generated.len(), 7);
        assert_eq!(manifest.agent_count(), 3);
    }

    #[test]
    fn test_reinstall_is_byte_identical() {
        let src = SourceTree::new();
        let project = TempDir::new().unwrap();
        let first = install(&src, &project, &["bmm"], &["claude-code", "cursor"]);
        let before = read_generated(&project, &first.generated);

        let second = install(&src, &project, &["bmm"], &["claude-code", "cursor"]);
        assert_eq!(second.action, Some(Action::Update));
        assert_eq!(read_generated(&project, &second.generated), before);
    }

    #[test]
    fn test_cancelled_install_writes_nothing() {
        let src = SourceTree::new();
        let project = TempDir::new().unwrap();
        let decline = Decline(Cell::new(false));
        let result = Installer::new(src.config(project.path(), &["bmm"], &["claude-code"]))
            .install(&decline)
            .unwrap();

        assert!(decline.0.get());
        assert!(result.cancelled);
        assert!(!result.success);
        assert_eq!(fs::read_dir(project.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_plan_decisions() {
        let src = SourceTree::new();
        let project = TempDir::new().unwrap();
        let with = |action: Option<ActionRequest>| {
            let mut config = src.config(project.path(), &[], &[]);
            config.action = action;
            Installer::new(config).plan()
        };

        assert_eq!(with(None).unwrap(), Action::FreshInstall);
        assert_eq!(with(Some(ActionRequest::Install)).unwrap(), Action::FreshInstall);
        assert!(matches!(with(Some(ActionRequest::QuickUpdate)), Err(InstallError::NotInstalled(_))));
        assert!(matches!(with(Some(ActionRequest::Uninstall)), Err(InstallError::NotInstalled(_))));

        install(&src, &project, &[], &[]);
        assert!(matches!(with(None), Err(InstallError::ActionRequired(_))));
        assert_eq!(with(Some(ActionRequest::Install)).unwrap(), Action::Update);
        assert_eq!(with(Some(ActionRequest::QuickUpdate)).unwrap(), Action::QuickUpdate);
        assert_eq!(with(Some(ActionRequest::CompileAgents)).unwrap(), Action::CompileAgents);

        fs::write(project.path().join("_bmad/_config/manifest.yaml"), "installation: [unclosed\n").unwrap();
        assert!(matches!(with(Some(ActionRequest::Update)), Err(InstallError::CorruptManifest { .. })));
        assert_eq!(with(Some(ActionRequest::Install)).unwrap(), Action::FreshInstall);
    }

    #[test]
    fn test_quick_update_keeps_settings() {
        let src = SourceTree::new();
        let project = TempDir::new().unwrap();
        let mut config = src.config(project.path(), &["bmm"], &["claude-code"]);
        config.output_folder = "docs".into();
        config.user_name = "Ada".into();
        config
            .module_settings
            .insert("bmm".into(), BTreeMap::from([("project_name".into(), "apollo".into())]));
        Installer::new(config).install(&AutoConfirm).unwrap();

        let bmm_config = project.path().join("_bmad/bmm/config.yaml");
        let mut edited = modules::read_module_config(&bmm_config);
        edited.insert("user_skill_level".into(), "expert".into());
        modules::write_module_config(&bmm_config, "bmm", &edited).unwrap();
        src.set_version("bmm", "6.1.0");

        // Caller passes defaults; stored values must win.
        let mut quick = src.config(project.path(), &[], &[]);
        quick.action = Some(ActionRequest::QuickUpdate);
        let result = Installer::new(quick).run(&AutoConfirm).unwrap();
        assert_eq!(result.action, Some(Action::QuickUpdate));
        assert_eq!(result.modules, vec!["core", "bmm"]);

        let manifest = InstallationManifest::read(&Layout::new(project.path(), "_bmad")).unwrap().unwrap();
        assert_eq!(manifest.settings.output_folder, "docs");
        assert_eq!(manifest.settings.user_name, "Ada");
        assert_eq!(manifest.ides, vec!["claude-code"]);
        let bmm = manifest.module("bmm").unwrap();
        assert_eq!(bmm.version, "6.1.0");
        assert_eq!(bmm.settings["project_name"], "apollo");
        assert_eq!(bmm.settings["user_skill_level"], "expert");

        let written = modules::read_module_config(&bmm_config);
        assert_eq!(written["output_folder"], "docs");
        assert_eq!(written["user_skill_level"], "expert");
        assert!(project.path().join(".claude/commands/bmad-agent-bmm-pm.md").is_file());
    }

    #[test]
    fn test_quick_update_ignores_unused_caller_values() {
        let src = SourceTree::new();
        let project = TempDir::new().unwrap();
        install(&src, &project, &["bmm"], &["claude-code"]);

        let mut quick = src.config(project.path(), &[], &["notepad"]);
        quick.output_folder = "../outside".into();
        let result = Installer::new(quick).quick_update(&AutoConfirm).unwrap();
        assert!(result.success);

        let manifest = InstallationManifest::read(&Layout::new(project.path(), "_bmad")).unwrap().unwrap();
        assert_eq!(manifest.settings.output_folder, "_bmad-output");
        assert_eq!(manifest.ides, vec!["claude-code"]);
    }

    #[test]
    fn test_failed_update_leaves_manifest_untouched() {
        let src = SourceTree::new();
        let project = TempDir::new().unwrap();
        install(&src, &project, &["bmm"], &["claude-code"]);
        let manifest_path = project.path().join("_bmad/_config/manifest.yaml");
        let before = fs::read(&manifest_path).unwrap();

        let commands = project.path().join(".claude/commands");
        fs::remove_dir_all(&commands).unwrap();
        fs::write(&commands, "not a directory").unwrap();

        let err = Installer::new(src.config(project.path(), &["bmm"], &["claude-code"]))
            .install(&AutoConfirm)
            .unwrap_err();
        assert!(matches!(err, InstallError::Io { .. }), "{err:?}");
        assert_eq!(fs::read(&manifest_path).unwrap(), before);
    }

    #[test]
    fn test_update_keeps_overlays_and_applies_them() {
        let src = SourceTree::new();
        let project = TempDir::new().unwrap();
        install(&src, &project, &["bmm"], &["claude-code"]);

        let overlay = project.path().join("_bmad/_config/agents/bmm-pm.customize.yaml");
        fs::write(&overlay, "memories:\n  - Team uses RFCs\n").unwrap();

        install(&src, &project, &["bmm"], &["claude-code"]);
        assert_eq!(fs::read_to_string(&overlay).unwrap(), "memories:\n  - Team uses RFCs\n");
        let compiled = fs::read_to_string(project.path().join("_bmad/bmm/agents/pm.md")).unwrap();
        assert!(compiled.contains("Team uses RFCs"));
    }

    #[test]
    fn test_changing_ides_removes_old_files() {
        let src = SourceTree::new();
        let project = TempDir::new().unwrap();
        install(&src, &project, &["bmm"], &["cursor"]);
        assert!(project.path().join(".cursor/commands/bmad-agent-bmm-pm.md").is_file());

        install(&src, &project, &["bmm"], &["claude-code"]);
        assert!(!project.path().join(".cursor/commands/bmad-agent-bmm-pm.md").exists());
        assert!(project.path().join(".claude/commands/bmad-agent-bmm-pm.md").is_file());
    }

    #[test]
    fn test_update_never_drops_modules() {
        let src = SourceTree::new();
        let project = TempDir::new().unwrap();
        install(&src, &project, &["bmm"], &[]);
        let result = install(&src, &project, &[], &[]);
        assert_eq!(result.modules, vec!["core", "bmm"]);
    }

    #[test]
    fn test_compile_agents_selected_by_file_name() {
        let src = SourceTree::new();
        let project = TempDir::new().unwrap();
        install(&src, &project, &["bmm"], &["claude-code"]);
        fs::write(
            project.path().join("_bmad/_config/agents/bmm-pm.customize.yaml"),
            "persona:\n  role: Growth PM\n",
        )
        .unwrap();

        let mut config = src.config(project.path(), &[], &[]);
        config.action = Some(ActionRequest::CompileAgents);
        let result = Installer::new(config)
            .compile_agents(&["bmad-agent-bmm-pm.md".into(), "ghost".into()])
            .unwrap();
        assert_eq!(result.agent_count, 1);
        assert_eq!(result.warnings, vec!["no installed agent matches 'ghost'"]);

        let compiled = fs::read_to_string(project.path().join("_bmad/bmm/agents/pm.md")).unwrap();
        assert!(compiled.contains("<role>Growth PM</role>"));
        assert!(!compiled.contains("Veteran PM"));

        let manifest = InstallationManifest::read(&Layout::new(project.path(), "_bmad")).unwrap().unwrap();
        assert_eq!(manifest.generated.len(), 7);
    }

    #[test]
    fn test_compile_agents_requires_installation() {
        let src = SourceTree::new();
        let project = TempDir::new().unwrap();
        let err = Installer::new(src.config(project.path(), &[], &[]))
            .compile_agents(&[])
            .unwrap_err();
        assert!(matches!(err, InstallError::NotInstalled(_)));
    }

    #[test]
    fn test_missing_source_root_is_module_error() {
        let project = TempDir::new().unwrap();
        let config = InstallConfig {
            project_directory: project.path().to_path_buf(),
            ..Default::default()
        };
        let err = Installer::new(config).install(&AutoConfirm).unwrap_err();
        assert!(matches!(err, InstallError::ModuleNotFound(m) if m == "core"));
        assert_eq!(fs::read_dir(project.path()).unwrap().count(), 0);
    }
}
