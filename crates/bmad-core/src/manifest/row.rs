use serde::{Deserialize, Serialize};

use super::variables::Variables;
use crate::model::{ArtifactRecord, ArtifactType};

/// One manifest row as read from disk. Every column is optional here; the
/// required ones are checked in [`ManifestRow::into_record`].
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct ManifestRow {
    name: Option<String>,
    module: Option<String>,
    path: Option<String>,
    #[serde(alias = "displayName")]
    display_name: Option<String>,
    title: Option<String>,
    description: Option<String>,
    standalone: Option<Flag>,
}

/// CSV cells arrive as text while YAML gives real booleans.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Text(String),
}

impl Flag {
    fn value(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Text(t) => !matches!(t.trim().to_ascii_lowercase().as_str(), "false" | "no" | "0"),
        }
    }
}

impl ManifestRow {
    /// Validate required columns and resolve the path. `None` means the row
    /// is excluded.
    pub(super) fn into_record(
        self,
        artifact_type: ArtifactType,
        vars: &Variables,
    ) -> Option<ArtifactRecord> {
        let name = non_blank(self.name)?;
        let module = non_blank(self.module)?;
        let path = non_blank(self.path)?;
        let source_path = vars.resolve_path(&path)?;

        let record = ArtifactRecord::new(artifact_type, module, name, source_path)
            .with_display_name(self.display_name)
            .with_description(non_blank(self.description).or(self.title))
            .with_standalone(self.standalone.as_ref().map_or(true, Flag::value));
        Some(record)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Row shape written by manifest generation.
#[derive(Debug, Serialize)]
pub(super) struct OutputRow {
    name: String,
    #[serde(rename = "displayName")]
    display_name: String,
    description: String,
    module: String,
    path: String,
    standalone: bool,
}

impl OutputRow {
    pub(super) const HEADER: [&'static str; 6] = [
        "name",
        "displayName",
        "description",
        "module",
        "path",
        "standalone",
    ];
}

impl From<&ArtifactRecord> for OutputRow {
    fn from(r: &ArtifactRecord) -> Self {
        Self {
            name: r.name.clone(),
            display_name: r.display_name.clone(),
            description: r.description.clone(),
            module: r.module.clone(),
            path: format!("{}/{}", super::PROJECT_ROOT_TOKEN, r.source_path),
            standalone: r.standalone,
        }
    }
}
