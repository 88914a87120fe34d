use std::path::{Component, Path, PathBuf};

/// Default name of the folder that holds installed module content.
pub const DEFAULT_BMAD_FOLDER: &str = "_bmad";

const CONFIG_DIR: &str = "_config";
const AGENT_OVERLAY_DIR: &str = "agents";
const STAGING_DIR: &str = ".staging";
const MANIFEST_FILE: &str = "manifest.yaml";
const FILES_MANIFEST_FILE: &str = "files-manifest.csv";

/// Where everything lives inside a host project.
///
/// The bmad folder name is part of the layout rather than a global so tests
/// and callers can install under any folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    project_root: PathBuf,
    bmad_folder: String,
}

impl Layout {
    pub fn new(project_root: impl Into<PathBuf>, bmad_folder: impl Into<String>) -> Self {
        Self {
            project_root: project_root.into(),
            bmad_folder: bmad_folder.into(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn bmad_folder(&self) -> &str {
        &self.bmad_folder
    }

    /// `<project>/<bmad-folder>`
    pub fn bmad_dir(&self) -> PathBuf {
        self.project_root.join(&self.bmad_folder)
    }

    /// `<bmad>/_config`, home of generated manifests and user overlays.
    pub fn config_dir(&self) -> PathBuf {
        self.bmad_dir().join(CONFIG_DIR)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.config_dir().join(MANIFEST_FILE)
    }

    pub fn files_manifest_path(&self) -> PathBuf {
        self.config_dir().join(FILES_MANIFEST_FILE)
    }

    pub fn overlays_dir(&self) -> PathBuf {
        self.config_dir().join(AGENT_OVERLAY_DIR)
    }

    pub fn overlay_path(&self, module: &str, agent: &str) -> PathBuf {
        self.overlays_dir()
            .join(bmad_core::customize::overlay_file_name(module, agent))
    }

    pub fn module_dir(&self, module: &str) -> PathBuf {
        self.bmad_dir().join(module)
    }

    pub fn module_config_path(&self, module: &str) -> PathBuf {
        self.module_dir(module).join("config.yaml")
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.bmad_dir().join(STAGING_DIR)
    }

    /// Project-relative path with forward slashes, or `None` if `path` is
    /// outside the project.
    pub fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.project_root).ok()?;
        Some(to_slash(rel))
    }

    /// Join a project-relative, slash-separated path onto the project root.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.project_root.join(relative)
    }
}

/// Render a relative path with `/` separators regardless of platform.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// True if `relative` stays inside its base directory: no root, prefix or `..`.
pub fn is_contained(relative: &Path) -> bool {
    relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
