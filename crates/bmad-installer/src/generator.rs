//! Pointer command files written into each IDE's command directory.
//!
//! A pointer document carries no content of its own: it names the
//! authoritative definition under the bmad folder and tells the host tool to
//! load it and follow it verbatim. Generated files are keyed by the naming
//! convention's output name, so regenerating rewrites them in place.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use bmad_core::manifest::PROJECT_ROOT_TOKEN;
use bmad_core::{ArtifactRecord, ArtifactType, NamingConvention};

use crate::error::{InstallError, IoResultExt};
use crate::files::write_if_changed;
use crate::ide::IdeTarget;
use crate::layout::{is_contained, to_slash, Layout};

const WORKFLOW_ENGINE: &str = "core/tasks/workflow.xml";

/// One generated command file, as recorded in the installation manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub ide: String,
    /// Project-relative path with forward slashes.
    pub path: String,
    pub artifact_type: ArtifactType,
    pub module: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateOutcome {
    Written(GeneratedFile),
    Unchanged(GeneratedFile),
    /// Nothing was written; the reason is a user-facing warning.
    Skipped(String),
}

/// Files produced by a generation pass, in generation order.
#[derive(Debug, Default)]
pub struct GenerationReport {
    pub files: Vec<GeneratedFile>,
    pub written: usize,
    pub warnings: Vec<String>,
}

pub struct ArtifactGenerator {
    layout: Layout,
}

impl ArtifactGenerator {
    pub fn new(project_root: impl Into<PathBuf>, bmad_folder: impl Into<String>) -> Self {
        Self {
            layout: Layout::new(project_root, bmad_folder),
        }
    }

    pub fn from_layout(layout: &Layout) -> Self {
        Self {
            layout: layout.clone(),
        }
    }

    /// Write the pointer file for `record` into `target`'s command directory.
    pub fn generate(
        &self,
        record: &ArtifactRecord,
        target: &IdeTarget,
    ) -> Result<GenerateOutcome, InstallError> {
        let source = match self.source_path(&record.source_path) {
            Ok(s) => s,
            Err(reason) => {
                let msg = format!(
                    "{} {}/{} skipped for {}: {reason}",
                    record.artifact_type, record.module, record.name, target.code
                );
                warn!("{msg}");
                return Ok(GenerateOutcome::Skipped(msg));
            }
        };

        let file_name = target.file_name(record);
        let path = target.dir(self.layout.project_root()).join(&file_name);
        let content = self.render(record, &source);
        let generated = GeneratedFile {
            ide: target.code.to_string(),
            path: format!("{}/{file_name}", target.command_dir),
            artifact_type: record.artifact_type,
            module: record.module.clone(),
            name: record.name.clone(),
        };

        if write_if_changed(&path, &content)? {
            debug!("Wrote {}", generated.path);
            Ok(GenerateOutcome::Written(generated))
        } else {
            Ok(GenerateOutcome::Unchanged(generated))
        }
    }

    /// Generate every record into every target.
    ///
    /// Tasks and tools that are not standalone are not given command files.
    /// When two records map to the same file name in one target the first
    /// keeps it and the rest are reported.
    pub fn generate_all(
        &self,
        records: &[ArtifactRecord],
        targets: &[&IdeTarget],
    ) -> Result<GenerationReport, InstallError> {
        let mut report = GenerationReport::default();
        for target in targets {
            let mut claimed: BTreeMap<String, String> = BTreeMap::new();
            for record in records {
                if matches!(record.artifact_type, ArtifactType::Task | ArtifactType::Tool)
                    && !record.standalone
                {
                    continue;
                }
                let owner = format!("{} {}/{}", record.artifact_type, record.module, record.name);
                let file_name = target.file_name(record);
                if let Some(first) = claimed.get(&file_name) {
                    let msg = format!(
                        "{owner} maps to {file_name} in {}, already used by {first}; skipped",
                        target.code
                    );
                    warn!("{msg}");
                    report.warnings.push(msg);
                    continue;
                }
                match self.generate(record, target)? {
                    GenerateOutcome::Written(f) => {
                        report.written += 1;
                        report.files.push(f);
                    }
                    GenerateOutcome::Unchanged(f) => report.files.push(f),
                    GenerateOutcome::Skipped(msg) => {
                        report.warnings.push(msg);
                        continue;
                    }
                }
                claimed.insert(file_name, owner);
            }
            info!("{}: {} command file(s)", target.name, claimed.len());
        }
        Ok(report)
    }

    /// Normalize a record's source path to project-relative form.
    fn source_path(&self, source: &str) -> Result<String, String> {
        let source = source.trim();
        if source.is_empty() {
            return Err("empty source path".to_string());
        }
        let path = Path::new(source);
        let relative = if path.is_absolute() {
            self.layout
                .relative(path)
                .ok_or_else(|| format!("{source} is outside the project"))?
        } else {
            source.replace('\\', "/")
        };
        if relative.is_empty() || !is_contained(Path::new(&relative)) {
            return Err(format!("{source} escapes the project"));
        }
        Ok(to_slash(Path::new(&relative)))
    }

    fn render(&self, record: &ArtifactRecord, source: &str) -> String {
        let loaded = format!("{PROJECT_ROOT_TOKEN}/{source}");
        let mut out = String::from("---\n");
        if record.artifact_type == ArtifactType::Agent {
            out.push_str(&format!("name: {}\n", quote(&record.name)));
        }
        out.push_str(&format!("description: {}\n---\n\n", quote(&record.description)));

        match record.artifact_type {
            ArtifactType::Agent => out.push_str(&format!(
                "You must fully embody this agent's persona and follow all activation instructions exactly as specified. \
                 NEVER break character until given an exit command.\n\n\
                 <agent-activation CRITICAL=\"TRUE\">\n\
                 1. LOAD the FULL agent file from @{loaded}\n\
                 2. READ its entire contents - this contains the complete agent persona, menu, and instructions\n\
                 3. Execute ALL activation steps exactly as written in the agent file\n\
                 4. Follow the agent's persona and menu system precisely\n\
                 5. Stay in character throughout the session\n\
                 </agent-activation>\n"
            )),
            ArtifactType::Workflow if is_yaml(source) => {
                let engine = format!(
                    "{PROJECT_ROOT_TOKEN}/{}/{WORKFLOW_ENGINE}",
                    self.layout.bmad_folder()
                );
                out.push_str(&format!(
                    "IT IS CRITICAL THAT YOU FOLLOW THESE STEPS:\n\n\
                     <steps CRITICAL=\"TRUE\">\n\
                     1. Always LOAD the FULL @{engine}\n\
                     2. READ its entire contents - this is the engine that executes the workflow config @{loaded}\n\
                     3. Pass the yaml path {loaded} as 'workflow-config' to the workflow.xml instructions\n\
                     4. Follow workflow.xml instructions EXACTLY as written\n\
                     5. Save outputs after EACH section when generating documents from templates\n\
                     </steps>\n"
                ))
            }
            _ => out.push_str(&format!(
                "LOAD the FULL @{loaded}, READ its entire contents and follow its directions exactly!\n"
            )),
        }
        out
    }
}

fn is_yaml(path: &str) -> bool {
    path.ends_with(".yaml") || path.ends_with(".yml")
}

/// Double-quoted single-line YAML scalar.
pub(crate) fn quote(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    format!("\"{}\"", flat.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Remove files recorded by a previous run that this run no longer produces.
pub fn remove_stale(
    project_root: &Path,
    previous: &[GeneratedFile],
    current: &[GeneratedFile],
) -> Result<Vec<String>, InstallError> {
    let keep: BTreeSet<&str> = current.iter().map(|f| f.path.as_str()).collect();
    let mut removed = Vec::new();
    for file in previous {
        if keep.contains(file.path.as_str()) || !is_contained(Path::new(&file.path)) {
            continue;
        }
        let path = project_root.join(&file.path);
        if path.is_file() {
            std::fs::remove_file(&path).at(&path)?;
            debug!("Removed stale {}", file.path);
            removed.push(file.path.clone());
        }
    }
    Ok(removed)
}

/// Remove files in `target`'s directory that carry the legacy-convention name
/// of an artifact in `known`. Other files in the directory are left alone,
/// including user files that merely look like legacy names.
pub fn remove_legacy(
    project_root: &Path,
    target: &IdeTarget,
    known: &[GeneratedFile],
) -> Result<Vec<String>, InstallError> {
    let mut legacy_names = BTreeSet::new();
    for file in known.iter().filter(|f| f.ide == target.code) {
        for convention in NamingConvention::LEGACY {
            let encoded = convention.encode(&file.module, file.artifact_type, &file.name);
            legacy_names.insert(target.with_extension(encoded.clone()));
            legacy_names.insert(encoded);
        }
    }

    let dir = target.dir(project_root);
    let mut removed = Vec::new();
    for name in legacy_names {
        let path = dir.join(&name);
        if !path.is_file() {
            continue;
        }
        std::fs::remove_file(&path).at(&path)?;
        debug!("Removed legacy command file {}", path.display());
        removed.push(format!("{}/{name}", target.command_dir));
    }
    Ok(removed)
}
