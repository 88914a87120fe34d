//! User customization overlays for agents.
//!
//! An overlay is a small YAML document kept under `_config/agents/` that the
//! user edits. It is merged onto the vendor agent definition every time agents
//! are compiled; the vendor file itself is never rewritten with the result.
//!
//! | section                                          | mode    |
//! |--------------------------------------------------|---------|
//! | `agent.metadata`, `persona`                      | replace |
//! | `critical_actions`, `memories`, `menu`, `prompts`| append  |
//!
//! `persona` is replaced as a whole: an overlay that only sets `persona.role`
//! yields a persona with nothing but that role. There is no field-level merge.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::{AgentDefinition, AgentMetadata, MenuItem, Persona, Prompt};

/// Parsed overlay document. Unknown top-level keys are ignored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Overlay {
    pub agent: Option<OverlayAgent>,
    pub persona: Option<Persona>,
    pub critical_actions: Option<Vec<String>>,
    pub memories: Option<Vec<String>>,
    pub menu: Option<Vec<MenuItem>>,
    pub prompts: Option<Vec<Prompt>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayAgent {
    pub metadata: Option<AgentMetadata>,
}

impl Overlay {
    pub fn metadata(&self) -> Option<&AgentMetadata> {
        self.agent.as_ref().and_then(|a| a.metadata.as_ref())
    }

    /// True when applying this overlay would change nothing.
    pub fn is_noop(&self) -> bool {
        self.metadata().map_or(true, AgentMetadata::is_empty)
            && self.persona.as_ref().map_or(true, Persona::is_empty)
            && self.critical_actions.as_ref().map_or(true, Vec::is_empty)
            && self.memories.as_ref().map_or(true, Vec::is_empty)
            && self.menu.as_ref().map_or(true, Vec::is_empty)
            && self.prompts.as_ref().map_or(true, Vec::is_empty)
    }

    /// Parse overlay text. Blank or comment-only documents are an empty overlay.
    pub fn from_yaml(text: &str) -> Result<Self, String> {
        let value: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| e.to_string())?;
        match value {
            serde_yaml::Value::Null => Ok(Self::default()),
            serde_yaml::Value::Mapping(_) => serde_yaml::from_value(value).map_err(|e| e.to_string()),
            _ => Err("overlay must be a mapping of sections".to_string()),
        }
    }
}

/// Outcome of reading an overlay file.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayLoad {
    Absent,
    Loaded(Overlay),
    Malformed(String),
}

/// Read the overlay at `path`. Never fails; problems come back as
/// [`OverlayLoad::Malformed`] so the caller can fall back to the base agent.
pub fn load_overlay(path: &Path) -> OverlayLoad {
    if !path.exists() {
        return OverlayLoad::Absent;
    }
    match std::fs::read_to_string(path) {
        Ok(text) => match Overlay::from_yaml(&text) {
            Ok(overlay) => OverlayLoad::Loaded(overlay),
            Err(e) => OverlayLoad::Malformed(e),
        },
        Err(e) => OverlayLoad::Malformed(e.to_string()),
    }
}

/// Merge an overlay onto a base definition.
///
/// Sections that are absent, or present but entirely blank (as in the
/// generated template), leave the base untouched.
pub fn merge(base: &AgentDefinition, overlay: &Overlay) -> AgentDefinition {
    let mut merged = base.clone();

    if let Some(metadata) = overlay.metadata().filter(|m| !m.is_empty()) {
        merged.metadata = metadata.clone();
    }
    if let Some(persona) = overlay.persona.as_ref().filter(|p| !p.is_empty()) {
        merged.persona = persona.clone();
    }

    append(&mut merged.critical_actions, overlay.critical_actions.as_deref());
    append(&mut merged.memories, overlay.memories.as_deref());
    append(&mut merged.menu, overlay.menu.as_deref());
    append(&mut merged.prompts, overlay.prompts.as_deref());

    merged
}

fn append<T: Clone>(base: &mut Vec<T>, extra: Option<&[T]>) {
    if let Some(items) = extra {
        base.extend_from_slice(items);
    }
}

/// A base definition with its overlay applied.
#[derive(Debug, Clone)]
pub struct CompiledAgent {
    pub definition: AgentDefinition,
    pub customized: bool,
    /// Set when the overlay existed but could not be used.
    pub warning: Option<String>,
}

/// Apply the overlay at `overlay_path` to `base`, falling back to the base
/// definition when the overlay is malformed.
pub fn compile(base: &AgentDefinition, overlay_path: &Path) -> CompiledAgent {
    match load_overlay(overlay_path) {
        OverlayLoad::Absent => CompiledAgent {
            definition: base.clone(),
            customized: false,
            warning: None,
        },
        OverlayLoad::Loaded(overlay) => CompiledAgent {
            definition: merge(base, &overlay),
            customized: !overlay.is_noop(),
            warning: None,
        },
        OverlayLoad::Malformed(reason) => {
            tracing::warn!("Ignoring malformed overlay {}: {reason}", overlay_path.display());
            CompiledAgent {
                definition: base.clone(),
                customized: false,
                warning: Some(format!(
                    "customization {} ignored: {reason}",
                    overlay_path.display()
                )),
            }
        }
    }
}

/// File name of the overlay for an agent, e.g. `bmm-pm.customize.yaml`.
pub fn overlay_file_name(module: &str, agent_name: &str) -> String {
    format!("{module}-{agent_name}.customize.yaml")
}

/// Starter overlay written for each agent that has none yet. Every section is
/// blank so it changes nothing until the user fills it in.
pub fn overlay_template(module: &str, agent_name: &str) -> String {
    format!(
        "# Customizations for the {module}/{agent_name} agent.\n\
         # These survive updates. Replace sections: agent.metadata, persona.\n\
         # Append sections: critical_actions, memories, menu, prompts.\n\
         # A persona given here replaces the whole vendor persona.\n\
         \n\
         agent:\n  metadata:\n    name: \"\"\n\
         \n\
         persona:\n  role: \"\"\n  identity: \"\"\n  communication_style: \"\"\n  principles: []\n\
         \n\
         critical_actions: []\n\
         \n\
         memories: []\n\
         \n\
         menu: []\n\
         \n\
         prompts: []\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Principles;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    fn base() -> AgentDefinition {
        AgentDefinition {
            metadata: AgentMetadata {
                id: Some("_bmad/bmm/agents/pm.md".into()),
                name: Some("John".into()),
                title: Some("Product Manager".into()),
                icon: Some("📋".into()),
                module: Some("bmm".into()),
                extra: BTreeMap::new(),
            },
            persona: Persona {
                role: Some("Product strategist".into()),
                identity: Some("Veteran PM".into()),
                communication_style: Some("Direct".into()),
                principles: Some(Principles::List(vec!["User value first".into()])),
            },
            critical_actions: vec!["Load config".into()],
            memories: vec!["Base memory".into()],
            menu: vec![MenuItem {
                trigger: "create-prd".into(),
                description: "Create a PRD".into(),
                handlers: BTreeMap::new(),
            }],
            prompts: vec![],
        }
    }

    #[test]
    fn test_memories_only_overlay_appends() {
        let overlay = Overlay::from_yaml("memories:\n  - Prefers short answers\n").unwrap();
        let merged = merge(&base(), &overlay);

        assert_eq!(merged.menu, base().menu);
        assert_eq!(merged.persona, base().persona);
        assert_eq!(merged.critical_actions, base().critical_actions);
        assert_eq!(merged.metadata, base().metadata);
        assert_eq!(merged.memories, vec!["Base memory", "Prefers short answers"]);
    }

    #[test]
    fn test_partial_persona_replaces_whole_persona() {
        let overlay = Overlay::from_yaml("persona:\n  role: Growth PM\n").unwrap();
        let merged = merge(&base(), &overlay);
        assert_eq!(
            merged.persona,
            Persona {
                role: Some("Growth PM".into()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_metadata_replaced_wholesale() {
        let overlay = Overlay::from_yaml("agent:\n  metadata:\n    name: Bob\n").unwrap();
        let merged = merge(&base(), &overlay);
        assert_eq!(merged.metadata.name.as_deref(), Some("Bob"));
        assert_eq!(merged.metadata.title, None);
    }

    #[test]
    fn test_append_sections_preserve_order() {
        let overlay = Overlay::from_yaml(
            "critical_actions: [Read the style guide]\n\
             menu:\n  - trigger: standup\n    action: Summarize yesterday\n    description: Daily standup\n\
             prompts:\n  - id: standup\n    content: What changed?\n",
        )
        .unwrap();
        let merged = merge(&base(), &overlay);
        assert_eq!(merged.critical_actions, vec!["Load config", "Read the style guide"]);
        let triggers: Vec<_> = merged.menu.iter().map(|m| m.trigger.as_str()).collect();
        assert_eq!(triggers, vec!["create-prd", "standup"]);
        assert_eq!(merged.prompts.len(), 1);
    }

    #[test]
    fn test_template_is_noop() {
        let overlay = Overlay::from_yaml(&overlay_template("bmm", "pm")).unwrap();
        assert!(overlay.is_noop());
        assert_eq!(merge(&base(), &overlay), base());
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let overlay = Overlay::from_yaml("theme: dark\nextras: [1, 2]\nmemories: [m]\n").unwrap();
        let merged = merge(&base(), &overlay);
        assert_eq!(merged.memories.len(), 2);
    }

    #[test]
    fn test_empty_overlay_document() {
        assert_eq!(Overlay::from_yaml("").unwrap(), Overlay::default());
        assert_eq!(Overlay::from_yaml("# nothing yet\n").unwrap(), Overlay::default());
    }

    #[test]
    fn test_compile_absent_overlay_is_base() {
        let tmp = TempDir::new().unwrap();
        let compiled = compile(&base(), &tmp.path().join("bmm-pm.customize.yaml"));
        assert_eq!(compiled.definition, base());
        assert!(!compiled.customized);
        assert!(compiled.warning.is_none());
    }

    #[test]
    fn test_compile_malformed_overlay_falls_back() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bmm-pm.customize.yaml");

        fs::write(&path, "memories: [unterminated\n").unwrap();
        let compiled = compile(&base(), &path);
        assert_eq!(compiled.definition, base());
        assert!(compiled.warning.is_some());

        fs::write(&path, "- just\n- a list\n").unwrap();
        assert!(matches!(load_overlay(&path), OverlayLoad::Malformed(_)));

        fs::write(&path, "menu: not-a-list\n").unwrap();
        assert_eq!(compile(&base(), &path).definition, base());
    }

    #[test]
    fn test_compile_loaded_overlay() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(overlay_file_name("bmm", "pm"));
        fs::write(&path, "memories: [Team uses Rust]\n").unwrap();

        let compiled = compile(&base(), &path);
        assert!(compiled.customized);
        assert_eq!(compiled.definition.memories.last().unwrap(), "Team uses Rust");
    }
}
