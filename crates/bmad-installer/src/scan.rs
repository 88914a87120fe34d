//! Discover installed artifacts and write the per-type manifests.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use bmad_core::manifest::{self, ManifestSchema};
use bmad_core::model::AgentDefinition;
use bmad_core::{ArtifactRecord, ArtifactType};

use crate::error::{InstallError, IoResultExt};
use crate::layout::{to_slash, Layout};
use crate::modules::yaml_scalar_to_string;

pub const AGENT_SOURCE_SUFFIX: &str = ".agent.yaml";
const WORKFLOW_FILES: [&str; 3] = ["workflow.yaml", "workflow.yml", "workflow.md"];

static ROOT_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"<(?:task|tool)\b([^>]*)>").expect("valid regex")
});

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r#"([A-Za-z_-]+)\s*=\s*"([^"]*)""#).expect("valid regex")
});

/// Artifacts found in the installed modules.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub records: Vec<ArtifactRecord>,
    pub warnings: Vec<String>,
}

/// Header fields read from YAML or markdown frontmatter.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Header {
    name: Option<serde_yaml::Value>,
    description: Option<serde_yaml::Value>,
    standalone: Option<serde_yaml::Value>,
}

impl Header {
    fn name(&self) -> Option<String> {
        self.name.as_ref().map(yaml_scalar_to_string).filter(|s| !s.trim().is_empty())
    }

    fn description(&self) -> Option<String> {
        self.description.as_ref().map(yaml_scalar_to_string)
    }

    fn standalone(&self) -> Option<bool> {
        self.standalone.as_ref().map(|v| parse_flag(&yaml_scalar_to_string(v)))
    }
}

fn parse_flag(text: &str) -> bool {
    !matches!(text.trim().to_ascii_lowercase().as_str(), "false" | "no" | "0")
}

/// Scan `modules` in order. Within a module, agents come first, then
/// workflows, tasks and tools, each sorted by path.
pub fn scan_modules(layout: &Layout, modules: &[String]) -> Result<ScanResult, InstallError> {
    let mut result = ScanResult::default();
    for module in modules {
        let module_dir = layout.module_dir(module);
        if !module_dir.is_dir() {
            debug!("Module {module} has no installed content");
            continue;
        }
        let prefix = format!("{}/{module}", layout.bmad_folder());
        scan_agents(&module_dir, module, &prefix, &mut result)?;
        scan_workflows(&module_dir, module, &prefix, &mut result)?;
        for artifact_type in [ArtifactType::Task, ArtifactType::Tool] {
            scan_flat(&module_dir, module, &prefix, artifact_type, &mut result)?;
        }
    }
    info!("Discovered {} artifact(s)", result.records.len());
    Ok(result)
}

/// Write all four per-type manifests into `<bmad>/_config/`.
pub fn write_manifests(layout: &Layout, records: &[ArtifactRecord]) -> Result<(), InstallError> {
    let dir = layout.config_dir();
    std::fs::create_dir_all(&dir).at(&dir)?;
    for schema in ManifestSchema::all() {
        manifest::write(&dir.join(schema.file_name), &schema, records)?;
    }
    Ok(())
}

fn scan_agents(
    module_dir: &Path,
    module: &str,
    prefix: &str,
    result: &mut ScanResult,
) -> Result<(), InstallError> {
    let agents_dir = module_dir.join(ArtifactType::Agent.folder());
    if !agents_dir.is_dir() {
        return Ok(());
    }
    let mut seen = BTreeSet::new();

    for entry in WalkDir::new(&agents_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy();
        let Ok(rel) = path.strip_prefix(module_dir) else {
            continue;
        };
        let rel = to_slash(rel);

        let (stem, yaml_source) = if let Some(stem) = file_name.strip_suffix(AGENT_SOURCE_SUFFIX) {
            (stem.to_string(), true)
        } else if let Some(stem) = file_name.strip_suffix(".md") {
            // Compiled output of a YAML agent is picked up through the YAML.
            if path.with_file_name(format!("{stem}{AGENT_SOURCE_SUFFIX}")).exists() {
                continue;
            }
            (stem.to_string(), false)
        } else {
            continue;
        };

        let name = agent_name(&agents_dir, path, &stem);
        if !seen.insert(name.clone()) {
            result.warnings.push(format!("duplicate agent '{name}' in module {module}; {rel} ignored"));
            continue;
        }

        let md_rel = match rel.strip_suffix(AGENT_SOURCE_SUFFIX) {
            Some(base) => format!("{base}.md"),
            None => rel.clone(),
        };
        let mut record = ArtifactRecord::new(
            ArtifactType::Agent,
            module,
            name.clone(),
            format!("{prefix}/{md_rel}"),
        );

        if yaml_source {
            match AgentDefinition::load(path) {
                Ok(def) => {
                    record = record
                        .with_display_name(def.metadata.name.clone())
                        .with_description(def.metadata.title.clone());
                }
                Err(e) => {
                    warn!("Skipping agent {name}: {e}");
                    result.warnings.push(format!("agent {module}/{name} skipped: {e}"));
                    continue;
                }
            }
        }
        debug!("Found agent {module}/{name}");
        result.records.push(record);
    }
    Ok(())
}

/// Agents nested in their own folder take the folder's name.
fn agent_name(agents_dir: &Path, path: &Path, stem: &str) -> String {
    match path.parent() {
        Some(parent) if parent != agents_dir => parent
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| stem.to_string()),
        _ => stem.to_string(),
    }
}

fn scan_workflows(
    module_dir: &Path,
    module: &str,
    prefix: &str,
    result: &mut ScanResult,
) -> Result<(), InstallError> {
    let workflows_dir = module_dir.join(ArtifactType::Workflow.folder());
    if !workflows_dir.is_dir() {
        return Ok(());
    }
    let mut seen = BTreeSet::new();

    for entry in WalkDir::new(&workflows_dir).sort_by_file_name() {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy();
        if !entry.file_type().is_file() || !WORKFLOW_FILES.contains(&file_name.as_ref()) {
            continue;
        }
        let path = entry.path();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!("Skipping unreadable {}: {e}", path.display());
                result.warnings.push(format!("{} skipped: {e}", path.display()));
                continue;
            }
        };
        let header = if file_name.ends_with(".md") {
            frontmatter(&text)
        } else {
            parse_header(&text)
        };
        let header = match header {
            Ok(h) => h,
            Err(e) => {
                result.warnings.push(format!("{} skipped: {e}", path.display()));
                continue;
            }
        };

        let fallback = path
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| module.to_string());
        let name = header.name().unwrap_or(fallback);
        if !seen.insert(name.clone()) {
            debug!("Workflow {module}/{name} already registered; skipping {}", path.display());
            continue;
        }
        let Ok(rel) = path.strip_prefix(module_dir) else {
            continue;
        };
        let record = ArtifactRecord::new(
            ArtifactType::Workflow,
            module,
            name.clone(),
            format!("{prefix}/{}", to_slash(rel)),
        )
        .with_description(header.description())
        .with_standalone(header.standalone().unwrap_or(true));
        debug!("Found workflow {module}/{name}");
        result.records.push(record);
    }
    Ok(())
}

fn scan_flat(
    module_dir: &Path,
    module: &str,
    prefix: &str,
    artifact_type: ArtifactType,
    result: &mut ScanResult,
) -> Result<(), InstallError> {
    let dir = module_dir.join(artifact_type.folder());
    if !dir.is_dir() {
        return Ok(());
    }

    for entry in WalkDir::new(&dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        if !entry.file_type().is_file() || !matches!(ext, "md" | "xml") {
            continue;
        }
        let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!("Skipping unreadable {}: {e}", path.display());
                result.warnings.push(format!("{} skipped: {e}", path.display()));
                continue;
            }
        };

        let (display_name, description, standalone) = if ext == "xml" {
            let attrs = root_attributes(&text);
            let get = |key: &str| {
                attrs
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| v.clone())
            };
            (get("name"), get("description"), get("standalone").map(|v| parse_flag(&v)))
        } else {
            match frontmatter(&text) {
                Ok(h) => (h.name(), h.description(), h.standalone()),
                Err(e) => {
                    result.warnings.push(format!("{} frontmatter ignored: {e}", path.display()));
                    (None, None, None)
                }
            }
        };

        let file_name = entry.file_name().to_string_lossy();
        let record = ArtifactRecord::new(
            artifact_type,
            module,
            name.clone(),
            format!("{prefix}/{}/{file_name}", artifact_type.folder()),
        )
        .with_display_name(display_name)
        .with_description(description)
        .with_standalone(standalone.unwrap_or(true));
        debug!("Found {artifact_type} {module}/{name}");
        result.records.push(record);
    }
    Ok(())
}

fn parse_header(text: &str) -> Result<Header, serde_yaml::Error> {
    let value: serde_yaml::Value = serde_yaml::from_str(text)?;
    if value.is_mapping() {
        serde_yaml::from_value(value)
    } else {
        Ok(Header::default())
    }
}

/// Parse YAML frontmatter between leading `---` lines. Text without
/// frontmatter yields an empty header.
fn frontmatter(text: &str) -> Result<Header, serde_yaml::Error> {
    let text = text.trim_start_matches('\u{feff}');
    let Some(rest) = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    else {
        return Ok(Header::default());
    };
    let end = rest
        .lines()
        .scan(0usize, |offset, line| {
            let start = *offset;
            *offset += line.len() + 1;
            Some((start, line))
        })
        .find(|(_, line)| line.trim_end() == "---")
        .map(|(start, _)| start);
    match end {
        Some(end) => parse_header(&rest[..end]),
        None => Ok(Header::default()),
    }
}

fn root_attributes(text: &str) -> Vec<(String, String)> {
    let Some(caps) = ROOT_TAG_RE.captures(text) else {
        return Vec::new();
    };
    ATTR_RE
        .captures_iter(&caps[1])
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules;
    use crate::files::FilesManifest;
    use crate::test_support::SourceTree;
    use bmad_core::Variables;
    use tempfile::TempDir;

    fn installed(project: &TempDir, src: &SourceTree) -> Layout {
        let layout = Layout::new(project.path(), "_bmad");
        for source in modules::resolve(Some(src.root()), &["bmm".into()], &[]).unwrap() {
            modules::install_content(&source, &layout, &FilesManifest::default()).unwrap();
        }
        layout
    }

    #[test]
    fn test_scan_finds_every_type() {
        let src = SourceTree::new();
        let project = TempDir::new().unwrap();
        let layout = installed(&project, &src);

        let result = scan_modules(&layout, &["core".into(), "bmm".into()]).unwrap();
        let names: Vec<_> = result
            .records
            .iter()
            .map(|r| format!("{}:{}:{}", r.artifact_type, r.module, r.name))
            .collect();
        assert_eq!(
            names,
            vec![
                "agent:core:bmad-master",
                "workflow:core:brainstorming",
                "task:core:help",
                "task:core:workflow",
                "agent:bmm:pm",
                "agent:bmm:tech-writer",
                "workflow:bmm:correct-course",
                "task:bmm:shard-doc",
            ]
        );
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_scan_reads_headers() {
        let src = SourceTree::new();
        let project = TempDir::new().unwrap();
        let layout = installed(&project, &src);
        let result = scan_modules(&layout, &["core".into(), "bmm".into()]).unwrap();
        let find = |name: &str| result.records.iter().find(|r| r.name == name).unwrap();

        let pm = find("pm");
        assert_eq!(pm.display_name, "John");
        assert_eq!(pm.description, "Product Manager");
        assert_eq!(pm.source_path, "_bmad/bmm/agents/pm.md");

        let writer = find("tech-writer");
        assert_eq!(writer.source_path, "_bmad/bmm/agents/tech-writer/tech-writer.md");

        assert!(!find("workflow").standalone);
        assert!(find("help").standalone);
        assert_eq!(find("shard-doc").description, "Split a large document into sections");
        assert_eq!(
            find("correct-course").source_path,
            "_bmad/bmm/workflows/correct-course/workflow.yaml"
        );
    }

    #[test]
    fn test_written_manifests_load_back() {
        let src = SourceTree::new();
        let project = TempDir::new().unwrap();
        let layout = installed(&project, &src);
        let result = scan_modules(&layout, &["core".into(), "bmm".into()]).unwrap();
        write_manifests(&layout, &result.records).unwrap();

        let loaded = manifest::load_all(&layout.config_dir(), &Variables::new("_bmad")).unwrap();
        // Loaded back grouped by type rather than by module.
        assert_eq!(loaded.len(), result.records.len());
        for record in &result.records {
            assert!(loaded.contains(record), "missing {record:?}");
        }
        assert_eq!(loaded[0].artifact_type, ArtifactType::Agent);
        let csv = std::fs::read_to_string(layout.config_dir().join("tool-manifest.csv")).unwrap();
        assert!(csv.starts_with("name,displayName,description,module,path,standalone"));
    }

    #[test]
    fn test_unreadable_files_become_warnings() {
        let src = SourceTree::new();
        let project = TempDir::new().unwrap();
        let layout = installed(&project, &src);
        let bmm = layout.module_dir("bmm");
        std::fs::write(bmm.join("tasks/latin1.md"), [0xe9, 0xff]).unwrap();
        std::fs::create_dir_all(bmm.join("workflows/garbled")).unwrap();
        std::fs::write(bmm.join("workflows/garbled/workflow.yaml"), [0xe9, 0xff]).unwrap();

        let result = scan_modules(&layout, &["core".into(), "bmm".into()]).unwrap();
        assert_eq!(result.warnings.len(), 2);
        assert!(result.warnings.iter().any(|w| w.contains("latin1.md")));
        assert!(result.records.iter().all(|r| r.name != "latin1" && r.name != "garbled"));
        assert!(result.records.iter().any(|r| r.name == "shard-doc"));
    }

    #[test]
    fn test_frontmatter_parsing() {
        let h = frontmatter("---\nname: x\nstandalone: \"false\"\n---\n# body\n").unwrap();
        assert_eq!(h.name().as_deref(), Some("x"));
        assert_eq!(h.standalone(), Some(false));
        assert!(frontmatter("# no header\n").unwrap().name().is_none());
        assert!(frontmatter("---\nname: [unclosed\n---\n").is_err());
    }
}
