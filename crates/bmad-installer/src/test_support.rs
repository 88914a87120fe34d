//! Fixture module sources shared by the installer tests.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::config::InstallConfig;

const CORE_MODULE_YAML: &str = "code: core\nname: Core\nversion: 6.0.0\ndescription: Shared engine\n";

const BMAD_MASTER: &str = "agent:
  metadata:
    id: _bmad/core/agents/bmad-master.md
    name: BMad Master
    title: Master Executor
    icon: \"🧙\"
  persona:
    role: Orchestrator
    identity: Knows every module
    communication_style: Plain
    principles:
      - Load resources at runtime
  menu:
    - trigger: list-tasks
      action: list all tasks from {project-root}/_bmad/_config/task-manifest.csv
      description: List available tasks
";

const WORKFLOW_ENGINE: &str =
    "<task id=\"_bmad/core/tasks/workflow.xml\" name=\"Execute Workflow\" standalone=\"false\">\n  <objective>Run a workflow config</objective>\n</task>\n";

const HELP_TASK: &str = "---\nname: help\ndescription: Show what to do next\nstandalone: true\n---\n\n# Help\n";

const BRAINSTORMING: &str = "name: brainstorming\ndescription: Facilitate a brainstorming session\ninstructions: ./instructions.md\n";

const BMM_MODULE_YAML: &str = "code: bmm
name: BMad Method
version: 6.0.1
config:
  project_name:
    prompt: What is the project called?
    default: demo
  user_skill_level: intermediate
";

const PM: &str = "agent:
  metadata:
    id: _bmad/bmm/agents/pm.md
    name: John
    title: Product Manager
    icon: \"📋\"
    module: bmm
  persona:
    role: Product strategist
    identity: Veteran PM
    communication_style: Direct
    principles: |
      Ship user value.
      Validate assumptions.
  critical_actions:
    - Read the project brief before answering
  menu:
    - trigger: create-prd
      workflow: \"{project-root}/_bmad/bmm/workflows/create-prd/workflow.yaml\"
      description: Create a PRD
";

const TECH_WRITER: &str = "agent:
  metadata:
    name: Paige
    title: Technical Writer
    icon: \"📚\"
    module: bmm
  persona:
    role: Documentation specialist
";

const CORRECT_COURSE: &str = "name: correct-course\ndescription: Navigate significant changes mid-sprint\n";

const SHARD_DOC: &str = "<task id=\"_bmad/bmm/tasks/shard-doc.xml\" name=\"Shard Document\" description=\"Split a large document into sections\">\n</task>\n";

/// A throwaway source root holding the `core` and `bmm` modules.
pub(crate) struct SourceTree {
    dir: TempDir,
}

impl SourceTree {
    pub(crate) fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "core/module.yaml", CORE_MODULE_YAML);
        write(root, "core/agents/bmad-master.agent.yaml", BMAD_MASTER);
        write(root, "core/tasks/workflow.xml", WORKFLOW_ENGINE);
        write(root, "core/tasks/help.md", HELP_TASK);
        write(root, "core/workflows/brainstorming/workflow.yaml", BRAINSTORMING);
        write(root, "core/workflows/brainstorming/instructions.md", "# Steps\n");

        write(root, "bmm/module.yaml", BMM_MODULE_YAML);
        write(root, "bmm/agents/pm.agent.yaml", PM);
        write(root, "bmm/agents/tech-writer/tech-writer.agent.yaml", TECH_WRITER);
        write(root, "bmm/workflows/correct-course/workflow.yaml", CORRECT_COURSE);
        write(root, "bmm/tasks/shard-doc.xml", SHARD_DOC);
        Self { dir }
    }

    pub(crate) fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Add a custom module with a single agent and return its root.
    pub(crate) fn custom_module(&self, code: &str) -> PathBuf {
        let root = self.dir.path().join("custom").join(code);
        write(&root, "module.yaml", &format!("code: {code}\nversion: 1.0.0\n"));
        write(
            &root,
            &format!("agents/{code}-bot.agent.yaml"),
            &format!("agent:\n  metadata:\n    name: Bot\n    title: {code} helper\n"),
        );
        root
    }

    /// Bump a module's version in place.
    pub(crate) fn set_version(&self, module: &str, version: &str) {
        let path = self.dir.path().join(module).join("module.yaml");
        let text = fs::read_to_string(&path).unwrap();
        let updated: Vec<String> = text
            .lines()
            .map(|l| {
                if l.starts_with("version:") {
                    format!("version: {version}")
                } else {
                    l.to_string()
                }
            })
            .collect();
        fs::write(&path, updated.join("\n") + "\n").unwrap();
    }

    pub(crate) fn config(&self, project: &Path, modules: &[&str], ides: &[&str]) -> InstallConfig {
        InstallConfig {
            project_directory: project.to_path_buf(),
            source_root: Some(self.root().to_path_buf()),
            selected_modules: modules.iter().map(|m| m.to_string()).collect(),
            selected_ides: ides.iter().map(|i| i.to_string()).collect(),
            ..Default::default()
        }
    }
}

pub(crate) fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}
