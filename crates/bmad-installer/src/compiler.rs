//! Compile `*.agent.yaml` definitions, with their overlays applied, into the
//! markdown agent files the pointer documents load.

use std::path::PathBuf;

use tracing::{debug, info};

use bmad_core::customize::{self, overlay_template};
use bmad_core::model::{AgentDefinition, MenuItem};
use bmad_core::{ArtifactRecord, ArtifactType};

use crate::error::{InstallError, IoResultExt};
use crate::files::write_if_changed;
use crate::generator::quote;
use crate::layout::Layout;
use crate::modules::yaml_scalar_to_string;
use crate::scan::AGENT_SOURCE_SUFFIX;

const RESERVED_TRIGGERS: [&str; 2] = ["help", "exit"];

/// Totals for one compile pass.
#[derive(Debug, Default)]
pub struct CompileReport {
    pub compiled: usize,
    pub written: usize,
    pub customized: Vec<String>,
    pub warnings: Vec<String>,
}

/// Compile every agent record. Problems with a single agent become warnings.
pub fn compile_all(layout: &Layout, records: &[ArtifactRecord]) -> Result<CompileReport, InstallError> {
    let mut report = CompileReport::default();
    for record in records.iter().filter(|r| r.artifact_type == ArtifactType::Agent) {
        let Some(yaml_path) = agent_yaml_path(layout, record) else {
            debug!("Agent {}/{} has no YAML source; left as is", record.module, record.name);
            continue;
        };
        let base = match AgentDefinition::load(&yaml_path) {
            Ok(base) => base,
            Err(e) => {
                report.warnings.push(format!("agent {}/{} not compiled: {e}", record.module, record.name));
                continue;
            }
        };

        ensure_overlay(layout, &record.module, &record.name)?;
        let compiled = customize::compile(&base, &layout.overlay_path(&record.module, &record.name));
        if let Some(w) = compiled.warning {
            report.warnings.push(w);
        }
        if compiled.customized {
            report.customized.push(format!("{}/{}", record.module, record.name));
        }

        let text = render(layout, record, &compiled.definition);
        if write_if_changed(&layout.resolve(&record.source_path), &text)? {
            report.written += 1;
        }
        report.compiled += 1;
    }
    info!(
        "Compiled {} agent(s), {} rewritten, {} customized",
        report.compiled,
        report.written,
        report.customized.len()
    );
    Ok(report)
}

/// The `*.agent.yaml` file the compiled `.md` at `record.source_path` is built from.
fn agent_yaml_path(layout: &Layout, record: &ArtifactRecord) -> Option<PathBuf> {
    let base = record.source_path.strip_suffix(".md")?;
    let path = layout.resolve(&format!("{base}{AGENT_SOURCE_SUFFIX}"));
    path.is_file().then_some(path)
}

/// Write the starter overlay for an agent unless one exists. Existing
/// overlays are never touched.
pub fn ensure_overlay(layout: &Layout, module: &str, agent: &str) -> Result<bool, InstallError> {
    let path = layout.overlay_path(module, agent);
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).at(parent)?;
    }
    std::fs::write(&path, overlay_template(module, agent)).at(&path)?;
    debug!("Created overlay template {}", path.display());
    Ok(true)
}

/// Render a compiled agent document.
pub fn render(layout: &Layout, record: &ArtifactRecord, agent: &AgentDefinition) -> String {
    let meta = &agent.metadata;
    let display = meta.name.clone().unwrap_or_else(|| record.display_name.clone());
    let title = meta.title.clone().unwrap_or_else(|| record.description.clone());

    let mut out = String::new();
    out.push_str(&format!(
        "---\nname: {}\ndescription: {}\n---\n\n",
        quote(&record.name),
        quote(&title)
    ));
    out.push_str(
        "You must fully embody this agent's persona and follow all activation instructions exactly as specified. \
         NEVER break character until given an exit command.\n\n",
    );
    out.push_str("```xml\n");

    let mut attrs = vec![
        ("id", meta.id.clone().unwrap_or_else(|| record.source_path.clone())),
        ("name", display),
        ("title", title),
    ];
    if let Some(icon) = &meta.icon {
        attrs.push(("icon", icon.clone()));
    }
    out.push_str(&format!("<agent{}>\n", attributes(attrs.iter().map(|(k, v)| (*k, v.as_str())))));

    render_activation(&mut out, layout, &record.module, &agent.critical_actions);
    render_persona(&mut out, agent);

    if !agent.memories.is_empty() {
        out.push_str("  <memories>\n");
        for memory in &agent.memories {
            out.push_str(&format!("    <memory>{}</memory>\n", escape(memory)));
        }
        out.push_str("  </memories>\n");
    }

    if !agent.prompts.is_empty() {
        out.push_str("  <prompts>\n");
        for prompt in &agent.prompts {
            out.push_str(&format!(
                "    <prompt id=\"{}\">\n{}\n    </prompt>\n",
                escape(&prompt.id),
                escape(prompt.content.trim_end())
            ));
        }
        out.push_str("  </prompts>\n");
    }

    render_menu(&mut out, &agent.menu);
    out.push_str("</agent>\n```\n");
    out
}

fn render_activation(out: &mut String, layout: &Layout, module: &str, critical_actions: &[String]) {
    let config = format!(
        "{{project-root}}/{}/{module}/config.yaml",
        layout.bmad_folder()
    );
    let mut steps = vec![
        "Load persona from this current agent file (already in context)".to_string(),
        format!(
            "Load and read {config} NOW. Store ALL fields as session variables: \
             {{user_name}}, {{communication_language}}, {{output_folder}}. \
             Do NOT proceed until the config is loaded"
        ),
        "Remember: the user's name is {user_name}".to_string(),
    ];
    steps.extend(critical_actions.iter().cloned());
    steps.push(
        "Greet {user_name} in {communication_language}, then display the numbered menu items".to_string(),
    );
    steps.push("STOP and WAIT for user input; accept a number or a trigger".to_string());

    out.push_str("  <activation critical=\"MANDATORY\">\n");
    for (i, step) in steps.iter().enumerate() {
        out.push_str(&format!("    <step n=\"{}\">{}</step>\n", i + 1, escape(step)));
    }
    out.push_str("  </activation>\n");
}

fn render_persona(out: &mut String, agent: &AgentDefinition) {
    let persona = &agent.persona;
    if persona.is_empty() {
        return;
    }
    out.push_str("  <persona>\n");
    for (tag, value) in [
        ("role", &persona.role),
        ("identity", &persona.identity),
        ("communication_style", &persona.communication_style),
    ] {
        if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            out.push_str(&format!("    <{tag}>{}</{tag}>\n", escape(v)));
        }
    }
    if let Some(principles) = persona.principles.as_ref().filter(|p| !p.is_empty()) {
        out.push_str(&format!(
            "    <principles>{}</principles>\n",
            escape(&principles.lines().join(" "))
        ));
    }
    out.push_str("  </persona>\n");
}

fn render_menu(out: &mut String, menu: &[MenuItem]) {
    out.push_str("  <menu>\n");
    out.push_str("    <item cmd=\"*help\">Show numbered menu</item>\n");
    for item in menu {
        let trigger = item.trigger.trim().trim_start_matches('*');
        if trigger.is_empty() || RESERVED_TRIGGERS.contains(&trigger) {
            continue;
        }
        let cmd = format!("*{trigger}");
        let handlers: Vec<(String, String)> = item
            .handlers
            .iter()
            .map(|(k, v)| (k.clone(), yaml_scalar_to_string(v)))
            .collect();
        let attrs = std::iter::once(("cmd", cmd.as_str()))
            .chain(handlers.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        out.push_str(&format!(
            "    <item{}>{}</item>\n",
            attributes(attrs),
            escape(&item.description)
        ));
    }
    out.push_str("    <item cmd=\"*exit\">Exit with confirmation</item>\n");
    out.push_str("  </menu>\n");
}

fn attributes<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    pairs
        .map(|(k, v)| format!(" {k}=\"{}\"", escape(v)))
        .collect()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
