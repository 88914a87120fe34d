pub mod agent;

pub use agent::{AgentDefinition, AgentDocument, AgentMetadata, MenuItem, Persona, Principles, Prompt};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The reserved module whose name is omitted from generated filenames.
pub const CORE_MODULE: &str = "core";

/// Kind of installable unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    Agent,
    Workflow,
    Task,
    Tool,
}

impl ArtifactType {
    pub const ALL: [ArtifactType; 4] = [Self::Agent, Self::Workflow, Self::Task, Self::Tool];

    /// Folder segment used inside a module tree (`agents`, `workflows`, ...).
    pub fn folder(&self) -> &'static str {
        match self {
            Self::Agent => "agents",
            Self::Workflow => "workflows",
            Self::Task => "tasks",
            Self::Tool => "tools",
        }
    }

    /// Inverse of [`ArtifactType::folder`].
    pub fn from_folder(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.folder() == segment)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Workflow => "workflow",
            Self::Task => "task",
            Self::Tool => "tool",
        }
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "agent" | "agents" => Ok(Self::Agent),
            "workflow" | "workflows" => Ok(Self::Workflow),
            "task" | "tasks" => Ok(Self::Task),
            "tool" | "tools" => Ok(Self::Tool),
            other => Err(CoreError::UnknownArtifactType(other.to_string())),
        }
    }
}

/// One installable unit discovered from an installed module.
///
/// Records are built fresh by the manifest loader on every pass and are not
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub artifact_type: ArtifactType,
    pub module: String,
    pub name: String,
    /// Authoritative definition file, relative to the project root.
    pub source_path: String,
    pub display_name: String,
    pub description: String,
    /// Only standalone tasks and tools get command files.
    #[serde(default = "default_true")]
    pub standalone: bool,
}

fn default_true() -> bool {
    true
}

impl ArtifactRecord {
    pub fn new(
        artifact_type: ArtifactType,
        module: impl Into<String>,
        name: impl Into<String>,
        source_path: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            artifact_type,
            module: module.into(),
            display_name: name.clone(),
            description: name.clone(),
            name,
            source_path: source_path.into(),
            standalone: true,
        }
    }

    pub fn with_display_name(mut self, display_name: Option<String>) -> Self {
        if let Some(d) = display_name.filter(|d| !d.trim().is_empty()) {
            self.display_name = d;
        }
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        if let Some(d) = description.filter(|d| !d.trim().is_empty()) {
            self.description = d;
        }
        self
    }

    pub fn with_standalone(mut self, standalone: bool) -> Self {
        self.standalone = standalone;
        self
    }

    pub fn is_core(&self) -> bool {
        self.module == CORE_MODULE
    }
}
