use std::path::{Path, PathBuf};

use bmad_core::{ArtifactRecord, NamingConvention};

/// A host tool that reads slash-command prompt files from a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdeTarget {
    pub code: &'static str,
    pub name: &'static str,
    /// Command directory relative to the project root.
    pub command_dir: &'static str,
    /// File extension that replaces `.md` on generated names.
    pub extension: &'static str,
    pub convention: NamingConvention,
}

pub const IDE_TARGETS: &[IdeTarget] = &[
    IdeTarget {
        code: "claude-code",
        name: "Claude Code",
        command_dir: ".claude/commands",
        extension: ".md",
        convention: NamingConvention::Dash,
    },
    IdeTarget {
        code: "cursor",
        name: "Cursor",
        command_dir: ".cursor/commands",
        extension: ".md",
        convention: NamingConvention::Dash,
    },
    IdeTarget {
        code: "windsurf",
        name: "Windsurf",
        command_dir: ".windsurf/workflows",
        extension: ".md",
        convention: NamingConvention::Dash,
    },
    IdeTarget {
        code: "opencode",
        name: "OpenCode",
        command_dir: ".opencode/command",
        extension: ".md",
        convention: NamingConvention::Dash,
    },
    IdeTarget {
        code: "github-copilot",
        name: "GitHub Copilot",
        command_dir: ".github/prompts",
        extension: ".prompt.md",
        convention: NamingConvention::Dash,
    },
    IdeTarget {
        code: "codex",
        name: "Codex",
        command_dir: ".codex/prompts",
        extension: ".md",
        convention: NamingConvention::Dash,
    },
];

impl IdeTarget {
    pub fn find(code: &str) -> Option<&'static IdeTarget> {
        let code = code.trim().to_ascii_lowercase();
        IDE_TARGETS.iter().find(|t| t.code == code)
    }

    pub fn codes() -> Vec<&'static str> {
        IDE_TARGETS.iter().map(|t| t.code).collect()
    }

    pub fn dir(&self, project_root: &Path) -> PathBuf {
        project_root.join(self.command_dir)
    }

    /// Output filename for a record in this target.
    pub fn file_name(&self, record: &ArtifactRecord) -> String {
        self.with_extension(self.convention.encode_record(record))
    }

    pub(crate) fn with_extension(&self, encoded: String) -> String {
        match encoded.strip_suffix(".md") {
            Some(stem) => format!("{stem}{}", self.extension),
            None => encoded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bmad_core::ArtifactType;

    #[test]
    fn test_find_and_file_names() {
        let claude = IdeTarget::find("Claude-Code").unwrap();
        let record = ArtifactRecord::new(ArtifactType::Agent, "bmm", "pm", "_bmad/bmm/agents/pm.md");
        assert_eq!(claude.file_name(&record), "bmad-agent-bmm-pm.md");

        let copilot = IdeTarget::find("github-copilot").unwrap();
        assert_eq!(copilot.file_name(&record), "bmad-agent-bmm-pm.prompt.md");
        assert!(IdeTarget::find("notepad").is_none());
    }
}
