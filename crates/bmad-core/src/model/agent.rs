use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Top-level shape of an `*.agent.yaml` file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentDocument {
    pub agent: AgentDefinition,
}

/// A vendor-supplied agent definition, before or after customization.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentDefinition {
    pub metadata: AgentMetadata,
    pub persona: Persona,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub critical_actions: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub memories: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub menu: Vec<MenuItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prompts: Vec<Prompt>,
}

impl AgentDefinition {
    /// Parse an agent definition from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        let doc: AgentDocument = serde_yaml::from_str(text)?;
        Ok(doc.agent)
    }

    /// Load an agent definition from an `*.agent.yaml` file.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path).map_err(|source| CoreError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text).map_err(|e| CoreError::InvalidAgent {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Vendor-specific keys carried through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl AgentMetadata {
    /// True when every field is missing or blank.
    pub fn is_empty(&self) -> bool {
        [&self.id, &self.name, &self.title, &self.icon, &self.module]
            .iter()
            .all(|f| is_blank(f.as_deref()))
            && self.extra.values().all(is_blank_value)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Persona {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub communication_style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principles: Option<Principles>,
}

impl Persona {
    /// True when every field is missing or blank.
    pub fn is_empty(&self) -> bool {
        is_blank(self.role.as_deref())
            && is_blank(self.identity.as_deref())
            && is_blank(self.communication_style.as_deref())
            && self.principles.as_ref().map_or(true, Principles::is_empty)
    }
}

/// Principles are written either as one block of prose or as a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Principles {
    Text(String),
    List(Vec<String>),
}

impl Principles {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(t) => t.trim().is_empty(),
            Self::List(items) => items.iter().all(|i| i.trim().is_empty()),
        }
    }

    /// Flatten to display lines.
    pub fn lines(&self) -> Vec<&str> {
        match self {
            Self::Text(t) => t.lines().map(str::trim).filter(|l| !l.is_empty()).collect(),
            Self::List(items) => items.iter().map(String::as_str).collect(),
        }
    }
}

/// One entry in an agent's command menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub trigger: String,
    #[serde(default)]
    pub description: String,
    /// Handler attributes such as `workflow`, `exec` or `action`.
    #[serde(flatten)]
    pub handlers: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub id: String,
    #[serde(default)]
    pub content: String,
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

fn is_blank_value(value: &serde_yaml::Value) -> bool {
    match value {
        serde_yaml::Value::Null => true,
        serde_yaml::Value::String(s) => s.trim().is_empty(),
        serde_yaml::Value::Sequence(s) => s.is_empty(),
        serde_yaml::Value::Mapping(m) => m.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PM: &str = r#"
agent:
  metadata:
    id: "_bmad/bmm/agents/pm.md"
    name: John
    title: Product Manager
    icon: "📋"
    module: bmm
    hasSidecar: false
  persona:
    role: Investigative Product Strategist
    identity: Product management veteran
    communication_style: Asks WHY relentlessly
    principles: |
      Ship the smallest thing that validates the assumption.
      User value first.
  critical_actions:
    - Load project context before answering
  menu:
    - trigger: create-prd
      workflow: "{project-root}/_bmad/bmm/workflows/prd/workflow.yaml"
      description: Create a PRD
  prompts:
    - id: kickoff
      content: Start with the problem statement.
"#;

    #[test]
    fn test_parse_agent_definition() {
        let agent = AgentDefinition::from_yaml(PM).unwrap();
        assert_eq!(agent.metadata.name.as_deref(), Some("John"));
        assert_eq!(
            agent.metadata.extra.get("hasSidecar"),
            Some(&serde_yaml::Value::Bool(false))
        );
        assert_eq!(agent.persona.principles.as_ref().unwrap().lines().len(), 2);
        assert_eq!(agent.menu[0].trigger, "create-prd");
        assert!(agent.menu[0].handlers.contains_key("workflow"));
        assert_eq!(agent.prompts[0].id, "kickoff");
        assert!(agent.memories.is_empty());
    }

    #[test]
    fn test_principles_list_form() {
        let yaml = "agent:\n  persona:\n    principles:\n      - one\n      - two\n";
        let agent = AgentDefinition::from_yaml(yaml).unwrap();
        assert_eq!(
            agent.persona.principles,
            Some(Principles::List(vec!["one".into(), "two".into()]))
        );
    }

    #[test]
    fn test_blank_sections_are_empty() {
        let persona = Persona {
            role: Some(String::new()),
            principles: Some(Principles::List(vec![])),
            ..Default::default()
        };
        assert!(persona.is_empty());

        let mut meta = AgentMetadata::default();
        assert!(meta.is_empty());
        meta.name = Some("Bob".into());
        assert!(!meta.is_empty());
    }
}
