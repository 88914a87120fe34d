//! Flat command filenames for artifacts.
//!
//! Every convention produces names shaped like
//! `bmad<sep>[agent<sep>]<module><sep><name>.md`, where the module segment is
//! omitted for `core`. Only the joining character differs:
//!
//! | convention   | example                          |
//! |--------------|----------------------------------|
//! | `Dash`       | `bmad-agent-bmm-pm.md`           |
//! | `Colon`      | `bmad:agent:bmm:pm.md` (legacy)  |
//! | `Underscore` | `bmad_agent_bmm_pm.md` (legacy)  |
//!
//! Non-agent artifacts share one shape, so decoding cannot tell a workflow from
//! a task or tool; decode reports [`ArtifactType::Workflow`] for all of them.

use serde::{Deserialize, Serialize};

use crate::model::{ArtifactRecord, ArtifactType, CORE_MODULE};

const PREFIX: &str = "bmad";
const AGENT_MARKER: &str = "agent";
const EXTENSION: &str = ".md";
const PLACEHOLDER_NAME: &str = "unnamed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingConvention {
    #[default]
    Dash,
    Colon,
    Underscore,
}

/// Structured identity recovered from a flat filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub module: String,
    pub artifact_type: ArtifactType,
    pub name: String,
}

impl NamingConvention {
    pub const ALL: [NamingConvention; 3] = [Self::Dash, Self::Colon, Self::Underscore];
    pub const LEGACY: [NamingConvention; 2] = [Self::Colon, Self::Underscore];

    pub fn separator(&self) -> char {
        match self {
            Self::Dash => '-',
            Self::Colon => ':',
            Self::Underscore => '_',
        }
    }

    fn joiner(&self) -> &'static str {
        match self {
            Self::Dash => "-",
            Self::Colon => ":",
            Self::Underscore => "_",
        }
    }

    /// Output filename for an artifact.
    ///
    /// Never fails: a name that sanitizes to nothing becomes `unnamed`.
    pub fn encode(&self, module: &str, artifact_type: ArtifactType, name: &str) -> String {
        let module = sanitize_segment(module);
        let name = match self.flatten(name) {
            Some(n) => n,
            None => {
                tracing::warn!(module = %module, "Artifact name {name:?} is empty after normalization");
                PLACEHOLDER_NAME.to_string()
            }
        };

        let mut parts: Vec<&str> = vec![PREFIX];
        if artifact_type == ArtifactType::Agent {
            parts.push(AGENT_MARKER);
        }
        if !module.is_empty() && module != CORE_MODULE {
            parts.push(&module);
        }
        parts.push(&name);

        let mut out = parts.join(self.joiner());
        out.push_str(EXTENSION);
        out
    }

    pub fn encode_record(&self, record: &ArtifactRecord) -> String {
        self.encode(&record.module, record.artifact_type, &record.name)
    }

    /// Flatten a hierarchical path such as `bmm/agents/pm.md` or
    /// `_bmad/core/tasks/shard-doc.xml` into an output filename.
    ///
    /// Agents nested in their own folder collapse to the folder name, so
    /// `bmm/agents/tech-writer/tech-writer.md` becomes `bmad-agent-bmm-tech-writer.md`.
    /// Returns `None` when the path has no artifact-type folder preceded by a
    /// module segment.
    pub fn encode_path(&self, relative_path: &str) -> Option<String> {
        let segments: Vec<&str> = relative_path
            .split(['/', '\\'])
            .filter(|s| !s.is_empty() && *s != ".")
            .collect();

        let type_index = segments
            .iter()
            .enumerate()
            .skip(1)
            .find_map(|(i, s)| ArtifactType::from_folder(s).map(|_| i))?;
        let artifact_type = ArtifactType::from_folder(segments[type_index])?;
        let module = segments[type_index - 1];
        let rest = &segments[type_index + 1..];

        let (file, dirs) = rest.split_last()?;
        let stem = file.split('.').next().unwrap_or(file);

        let name = if artifact_type == ArtifactType::Agent {
            match dirs.last() {
                Some(folder) => (*folder).to_string(),
                None => stem.to_string(),
            }
        } else {
            let mut all: Vec<&str> = dirs.to_vec();
            all.push(stem);
            all.join("/")
        };

        Some(self.encode(module, artifact_type, &name))
    }

    /// Recover module, type and name from a filename produced by this convention.
    pub fn decode(&self, filename: &str) -> Option<ParsedName> {
        let stem = filename.strip_suffix(EXTENSION)?;
        let stem = stem.strip_suffix(".prompt").unwrap_or(stem);
        let sep = self.separator();
        let parts: Vec<&str> = stem.split(sep).collect();

        if parts.len() < 2 || parts[0] != PREFIX || parts.iter().any(|p| p.is_empty()) {
            return None;
        }
        let joined = |from: usize| parts[from..].join(self.joiner());

        if parts[1] == AGENT_MARKER {
            return match parts.len() {
                2 => None,
                3 => Some(ParsedName {
                    module: CORE_MODULE.to_string(),
                    artifact_type: ArtifactType::Agent,
                    name: parts[2].to_string(),
                }),
                _ => Some(ParsedName {
                    module: parts[2].to_string(),
                    artifact_type: ArtifactType::Agent,
                    name: joined(3),
                }),
            };
        }

        if parts.len() == 2 {
            return Some(ParsedName {
                module: CORE_MODULE.to_string(),
                artifact_type: ArtifactType::Workflow,
                name: parts[1].to_string(),
            });
        }

        Some(ParsedName {
            module: parts[1].to_string(),
            artifact_type: ArtifactType::Workflow,
            name: joined(2),
        })
    }

    /// Find the first convention that can decode `filename`.
    pub fn detect(filename: &str) -> Option<(NamingConvention, ParsedName)> {
        Self::ALL
            .into_iter()
            .find_map(|c| c.decode(filename).map(|parsed| (c, parsed)))
    }

    fn flatten(&self, name: &str) -> Option<String> {
        let segments: Vec<String> = name
            .split(['/', '\\'])
            .map(sanitize_segment)
            .filter(|s| !s.is_empty() && s != "." && s != "..")
            .collect();
        if segments.is_empty() {
            None
        } else {
            Some(segments.join(self.joiner()))
        }
    }
}

impl std::fmt::Display for NamingConvention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Dash => "dash",
            Self::Colon => "colon",
            Self::Underscore => "underscore",
        })
    }
}

/// Whether `code` can be used as a module code.
///
/// The module segment of an encoded name is delimited only by the joining
/// character, so a code containing any convention's separator would not decode
/// back to itself. Codes are limited to ASCII letters and digits.
pub fn is_valid_module_code(code: &str) -> bool {
    !code.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Keep only characters that are safe in filenames on every platform.
fn sanitize_segment(segment: &str) -> String {
    segment
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect::<String>()
        .trim_matches('.')
        .to_string()
}
