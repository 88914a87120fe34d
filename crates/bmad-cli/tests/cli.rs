//! End-to-end tests for the bmad binary.

#![allow(clippy::expect_used, deprecated)]

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn bmad() -> Command {
    Command::cargo_bin("bmad").expect("bmad binary should exist")
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A minimal module source root with `core` and `bmm`.
fn sources() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "core/module.yaml", "code: core\nversion: 6.0.0\n");
    write(
        root,
        "core/tasks/help.md",
        "---\nname: help\ndescription: Show what to do next\n---\n# Help\n",
    );
    write(root, "bmm/module.yaml", "code: bmm\nversion: 6.0.1\nconfig:\n  project_name: demo\n");
    write(
        root,
        "bmm/agents/pm.agent.yaml",
        "agent:\n  metadata:\n    name: John\n    title: Product Manager\n  persona:\n    role: Strategist\n",
    );
    write(
        root,
        "bmm/workflows/correct-course/workflow.yaml",
        "name: correct-course\ndescription: Handle change\n",
    );
    dir
}

fn install(project: &TempDir, src: &TempDir) -> assert_cmd::assert::Assert {
    bmad()
        .arg("install")
        .arg("-d")
        .arg(project.path())
        .arg("--source")
        .arg(src.path())
        .args(["--modules", "bmm", "--ides", "claude-code", "--yes"])
        .assert()
}

#[test]
fn test_help_lists_commands() {
    bmad()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("quick-update"))
        .stdout(predicate::str::contains("compile-agents"));
}

#[test]
fn test_version_command() {
    bmad()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("bmad 0.1.0"));

    bmad()
        .args(["version", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"{"version":"0.1.0"}"#));
}

#[test]
fn test_install_generates_commands() {
    let src = sources();
    let project = TempDir::new().unwrap();
    install(&project, &src)
        .success()
        .stdout(predicate::str::contains("fresh install complete"))
        .stdout(predicate::str::contains("Command files: 3"));

    let commands = project.path().join(".claude/commands");
    assert!(commands.join("bmad-agent-bmm-pm.md").is_file());
    assert!(commands.join("bmad-bmm-correct-course.md").is_file());
    assert!(commands.join("bmad-help.md").is_file());
    assert!(project.path().join("_bmad/_config/manifest.yaml").is_file());

    install(&project, &src)
        .success()
        .stdout(predicate::str::contains("update complete"));
}

#[test]
fn test_install_without_yes_outside_terminal_is_cancelled() {
    let src = sources();
    let project = TempDir::new().unwrap();
    bmad()
        .arg("install")
        .arg("-d")
        .arg(project.path())
        .arg("--source")
        .arg(src.path())
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cancelled"))
        .stderr(predicate::str::contains("--yes"));
    assert!(!project.path().join("_bmad").exists());
}

#[test]
fn test_quick_update_requires_installation() {
    let project = TempDir::new().unwrap();
    bmad()
        .arg("quick-update")
        .arg("-d")
        .arg(project.path())
        .arg("--yes")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No installation found"));
}

#[test]
fn test_status_json() {
    let src = sources();
    let project = TempDir::new().unwrap();
    bmad()
        .args(["status", "--format", "json", "-d"])
        .arg(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("not_installed"));

    install(&project, &src).success();
    bmad()
        .args(["status", "-d"])
        .arg(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("bmm 6.0.1"))
        .stdout(predicate::str::contains("claude-code: 3 command file(s)"));
}

#[test]
fn test_compile_agents_applies_customization() {
    let src = sources();
    let project = TempDir::new().unwrap();
    install(&project, &src).success();
    fs::write(
        project.path().join("_bmad/_config/agents/bmm-pm.customize.yaml"),
        "memories:\n  - Prefers bullet points\n",
    )
    .unwrap();

    bmad()
        .args(["compile-agents", "pm", "-d"])
        .arg(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("compile agents complete"));
    let compiled = fs::read_to_string(project.path().join("_bmad/bmm/agents/pm.md")).unwrap();
    assert!(compiled.contains("Prefers bullet points"));
}

#[test]
fn test_uninstall_modules_only() {
    let src = sources();
    let project = TempDir::new().unwrap();
    install(&project, &src).success();

    bmad()
        .args(["uninstall", "--modules", "--yes", "-d"])
        .arg(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed module content"));
    assert!(!project.path().join("_bmad").exists());
    assert!(project.path().join(".claude/commands/bmad-agent-bmm-pm.md").is_file());
}

#[test]
fn test_uninstall_requires_selection() {
    let project = TempDir::new().unwrap();
    bmad()
        .args(["uninstall", "--yes", "-d"])
        .arg(project.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nothing selected"));
}
