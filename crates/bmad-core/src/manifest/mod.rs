//! Per-type artifact manifests.
//!
//! Tasks and tools are listed in CSV files with a header row; agents and
//! workflows in YAML sequences of records. Both go through the same typed row
//! schema, and any row that does not satisfy it is dropped rather than turned
//! into a half-filled record.

mod row;
mod variables;

pub use variables::{has_placeholder, Variables, PROJECT_ROOT_TOKEN};

use std::path::Path;

use tracing::debug;

use crate::error::CoreError;
use crate::model::{ArtifactRecord, ArtifactType};

use row::{ManifestRow, OutputRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Csv,
    Yaml,
}

/// Explicit deserialization contract for one artifact type's manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestSchema {
    pub artifact_type: ArtifactType,
    pub format: ManifestFormat,
    pub file_name: &'static str,
}

impl ManifestSchema {
    /// Columns every row must carry with a non-blank value.
    pub const REQUIRED_COLUMNS: [&'static str; 3] = ["name", "module", "path"];

    pub fn for_type(artifact_type: ArtifactType) -> Self {
        let (format, file_name) = match artifact_type {
            ArtifactType::Agent => (ManifestFormat::Yaml, "agent-manifest.yaml"),
            ArtifactType::Workflow => (ManifestFormat::Yaml, "workflow-manifest.yaml"),
            ArtifactType::Task => (ManifestFormat::Csv, "task-manifest.csv"),
            ArtifactType::Tool => (ManifestFormat::Csv, "tool-manifest.csv"),
        };
        Self {
            artifact_type,
            format,
            file_name,
        }
    }

    pub fn all() -> [ManifestSchema; 4] {
        ArtifactType::ALL.map(Self::for_type)
    }
}

/// Load the records listed in a manifest file, in file order.
///
/// A missing file yields an empty list. Rows lacking a required column, or
/// whose `path` still holds an unresolved `{placeholder}` after substitution,
/// are skipped.
pub fn load(
    path: &Path,
    schema: &ManifestSchema,
    vars: &Variables,
) -> Result<Vec<ArtifactRecord>, CoreError> {
    if !path.exists() {
        debug!("No {} manifest at {}", schema.artifact_type, path.display());
        return Ok(Vec::new());
    }

    let text = std::fs::read_to_string(path).map_err(|source| CoreError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    let rows = match schema.format {
        ManifestFormat::Csv => parse_csv(&text, path)?,
        ManifestFormat::Yaml => parse_yaml(&text, path)?,
    };

    let records: Vec<ArtifactRecord> = rows
        .into_iter()
        .enumerate()
        .filter_map(|(i, row)| match row {
            Some(row) => row.into_record(schema.artifact_type, vars).or_else(|| {
                debug!("{}: excluded row {}", path.display(), i + 1);
                None
            }),
            None => {
                debug!("{}: row {} does not match schema", path.display(), i + 1);
                None
            }
        })
        .collect();

    debug!(
        "Loaded {} {} record(s) from {}",
        records.len(),
        schema.artifact_type,
        path.display()
    );
    Ok(records)
}

/// Load every per-type manifest found in `dir`, agents first.
pub fn load_all(dir: &Path, vars: &Variables) -> Result<Vec<ArtifactRecord>, CoreError> {
    let mut records = Vec::new();
    for schema in ManifestSchema::all() {
        records.extend(load(&dir.join(schema.file_name), &schema, vars)?);
    }
    Ok(records)
}

/// Serialize records in the schema's format. Paths are written relative to
/// `{project-root}` so the file is portable between checkouts.
pub fn write(
    path: &Path,
    schema: &ManifestSchema,
    records: &[ArtifactRecord],
) -> Result<(), CoreError> {
    let rows: Vec<OutputRow> = records
        .iter()
        .filter(|r| r.artifact_type == schema.artifact_type)
        .map(OutputRow::from)
        .collect();

    let text = match schema.format {
        ManifestFormat::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            if rows.is_empty() {
                writer.write_record(OutputRow::HEADER)?;
            }
            for row in &rows {
                writer.serialize(row)?;
            }
            let bytes = writer
                .into_inner()
                .map_err(|e| CoreError::Io(e.into_error()))?;
            String::from_utf8_lossy(&bytes).into_owned()
        }
        ManifestFormat::Yaml => serde_yaml::to_string(&rows)?,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, text)?;
    Ok(())
}

fn parse_csv(text: &str, path: &Path) -> Result<Vec<Option<ManifestRow>>, CoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(CoreError::InvalidManifest {
            path: path.to_path_buf(),
            message: "missing header row".to_string(),
        });
    }

    Ok(reader
        .deserialize::<ManifestRow>()
        .map(|row| row.ok())
        .collect())
}

fn parse_yaml(text: &str, path: &Path) -> Result<Vec<Option<ManifestRow>>, CoreError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let doc: serde_yaml::Value = serde_yaml::from_str(text)?;
    let items = match doc {
        serde_yaml::Value::Null => return Ok(Vec::new()),
        serde_yaml::Value::Sequence(items) => items,
        _ => {
            return Err(CoreError::InvalidManifest {
                path: path.to_path_buf(),
                message: "expected a list of records".to_string(),
            })
        }
    };
    Ok(items
        .into_iter()
        .map(|item| serde_yaml::from_value::<ManifestRow>(item).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn vars() -> Variables {
        Variables::new("_bmad")
    }

    #[test]
    fn test_missing_manifest_is_empty() {
        let tmp = TempDir::new().unwrap();
        let schema = ManifestSchema::for_type(ArtifactType::Task);
        let records = load(&tmp.path().join("task-manifest.csv"), &schema, &vars()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_load_csv_tasks() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("task-manifest.csv");
        fs::write(
            &path,
            "name,displayName,description,module,path,standalone\n\
             shard-doc,Shard Document,Split large docs,core,{project-root}/_bmad/core/tasks/shard-doc.xml,true\n\
             workflow,Run Workflow,,core,{project-root}/{bmad_folder}/core/tasks/workflow.xml,false\n",
        )
        .unwrap();

        let schema = ManifestSchema::for_type(ArtifactType::Task);
        let records = load(&path, &schema, &vars()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "shard-doc");
        assert_eq!(records[0].display_name, "Shard Document");
        assert_eq!(records[0].source_path, "_bmad/core/tasks/shard-doc.xml");
        assert!(records[0].standalone);
        assert_eq!(records[1].source_path, "_bmad/core/tasks/workflow.xml");
        assert_eq!(records[1].description, "workflow");
        assert!(!records[1].standalone);
    }

    #[test]
    fn test_unresolved_placeholder_rows_are_excluded() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tool-manifest.csv");
        fs::write(
            &path,
            "name,module,path\n\
             index-docs,core,_bmad/core/tools/index-docs.xml\n\
             tea-kb,bmm,{tea_root}/knowledge/index.md\n\
             ,core,_bmad/core/tools/nameless.xml\n\
             no-path,core,\n",
        )
        .unwrap();

        let schema = ManifestSchema::for_type(ArtifactType::Tool);
        let records = load(&path, &schema, &vars()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "index-docs");
    }

    #[test]
    fn test_zero_valid_rows_is_empty_not_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tool-manifest.csv");
        fs::write(&path, "name,module,path\nx,core,{unknown}/x.md\n").unwrap();

        let schema = ManifestSchema::for_type(ArtifactType::Tool);
        assert!(load(&path, &schema, &vars()).unwrap().is_empty());

        fs::write(&path, "name,module,path\n").unwrap();
        assert!(load(&path, &schema, &vars()).unwrap().is_empty());
    }

    #[test]
    fn test_load_yaml_agents_skips_bad_rows() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("agent-manifest.yaml");
        fs::write(
            &path,
            r#"
- name: pm
  displayName: John
  title: Product Manager
  module: bmm
  path: "{project-root}/_bmad/bmm/agents/pm.md"
- name: broken
  module: [not, a, string]
  path: _bmad/bmm/agents/broken.md
- name: analyst
  module: bmm
  path: _bmad/bmm/agents/analyst.md
"#,
        )
        .unwrap();

        let schema = ManifestSchema::for_type(ArtifactType::Agent);
        let records = load(&path, &schema, &vars()).unwrap();
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["pm", "analyst"]);
        assert_eq!(records[0].display_name, "John");
        assert_eq!(records[0].description, "Product Manager");
        assert_eq!(records[0].artifact_type, ArtifactType::Agent);
    }

    #[test]
    fn test_yaml_manifest_must_be_a_list() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("workflow-manifest.yaml");
        fs::write(&path, "name: not-a-list\n").unwrap();

        let schema = ManifestSchema::for_type(ArtifactType::Workflow);
        assert!(matches!(
            load(&path, &schema, &vars()),
            Err(CoreError::InvalidManifest { .. })
        ));
    }

    #[test]
    fn test_write_then_load_all() {
        let tmp = TempDir::new().unwrap();
        let records = vec![
            ArtifactRecord::new(ArtifactType::Agent, "bmm", "pm", "_bmad/bmm/agents/pm.md"),
            ArtifactRecord::new(ArtifactType::Task, "core", "shard-doc", "_bmad/core/tasks/shard-doc.xml")
                .with_standalone(false),
        ];
        for schema in ManifestSchema::all() {
            write(&tmp.path().join(schema.file_name), &schema, &records).unwrap();
        }

        let csv = fs::read_to_string(tmp.path().join("tool-manifest.csv")).unwrap();
        assert!(csv.starts_with("name,displayName,description,module,path,standalone"));

        let loaded = load_all(tmp.path(), &vars()).unwrap();
        assert_eq!(loaded, records);
    }
}
