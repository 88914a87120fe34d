use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use bmad_core::naming::is_valid_module_code;
use serde::{Deserialize, Serialize};

use crate::error::{InstallError, IoResultExt};
use crate::ide::IdeTarget;
use crate::layout::{is_contained, DEFAULT_BMAD_FOLDER};

/// Action explicitly requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionRequest {
    Install,
    Update,
    QuickUpdate,
    CompileAgents,
    Uninstall,
}

impl FromStr for ActionRequest {
    type Err = InstallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "install" => Ok(Self::Install),
            "update" => Ok(Self::Update),
            "quick-update" => Ok(Self::QuickUpdate),
            "compile-agents" | "compile" => Ok(Self::CompileAgents),
            "uninstall" => Ok(Self::Uninstall),
            other => Err(InstallError::InvalidConfig(format!(
                "unknown action '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ActionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Install => "install",
            Self::Update => "update",
            Self::QuickUpdate => "quick-update",
            Self::CompileAgents => "compile-agents",
            Self::Uninstall => "uninstall",
        })
    }
}

/// Settings shared by every module and written into each module's `config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreSettings {
    pub user_name: String,
    pub communication_language: String,
    pub document_output_language: String,
    pub output_folder: String,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            user_name: "User".to_string(),
            communication_language: "English".to_string(),
            document_output_language: "English".to_string(),
            output_folder: "_bmad-output".to_string(),
        }
    }
}

impl CoreSettings {
    pub const KEYS: [&'static str; 4] = [
        "user_name",
        "communication_language",
        "document_output_language",
        "output_folder",
    ];

    pub fn to_map(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("user_name".to_string(), self.user_name.clone()),
            (
                "communication_language".to_string(),
                self.communication_language.clone(),
            ),
            (
                "document_output_language".to_string(),
                self.document_output_language.clone(),
            ),
            ("output_folder".to_string(), self.output_folder.clone()),
        ])
    }

    /// Overwrite fields with any non-blank values found in `values`.
    pub fn apply(&mut self, values: &BTreeMap<String, String>) {
        let fields = [
            ("user_name", &mut self.user_name),
            ("communication_language", &mut self.communication_language),
            ("document_output_language", &mut self.document_output_language),
            ("output_folder", &mut self.output_folder),
        ];
        for (key, field) in fields {
            if let Some(v) = values.get(key).filter(|v| !v.trim().is_empty()) {
                *field = v.clone();
            }
        }
    }
}

/// Everything the caller resolved before asking for an install.
///
/// Can be read from a YAML file; fields left out take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    pub project_directory: PathBuf,
    /// Directory holding built-in module sources (`<root>/<code>/module.yaml`).
    pub source_root: Option<PathBuf>,
    pub selected_modules: Vec<String>,
    pub selected_ides: Vec<String>,
    pub action: Option<ActionRequest>,
    pub bmad_folder: String,
    pub user_name: String,
    pub communication_language: String,
    pub document_output_language: String,
    pub output_folder: String,
    /// Per-module overrides of `module.yaml` config defaults.
    pub module_settings: BTreeMap<String, BTreeMap<String, String>>,
    /// Extra module roots, each containing its own `module.yaml`.
    pub custom_content_paths: Vec<PathBuf>,
}

impl Default for InstallConfig {
    fn default() -> Self {
        let settings = CoreSettings::default();
        Self {
            project_directory: PathBuf::from("."),
            source_root: None,
            selected_modules: Vec::new(),
            selected_ides: Vec::new(),
            action: None,
            bmad_folder: DEFAULT_BMAD_FOLDER.to_string(),
            user_name: settings.user_name,
            communication_language: settings.communication_language,
            document_output_language: settings.document_output_language,
            output_folder: settings.output_folder,
            module_settings: BTreeMap::new(),
            custom_content_paths: Vec::new(),
        }
    }
}

impl InstallConfig {
    /// Read a configuration file written in YAML.
    pub fn load(path: &Path) -> Result<Self, InstallError> {
        let text = std::fs::read_to_string(path).at(path)?;
        serde_yaml::from_str(&text).map_err(|e| {
            InstallError::InvalidConfig(format!("{}: {e}", path.display()))
        })
    }

    pub fn settings(&self) -> CoreSettings {
        CoreSettings {
            user_name: self.user_name.clone(),
            communication_language: self.communication_language.clone(),
            document_output_language: self.document_output_language.clone(),
            output_folder: self.output_folder.clone(),
        }
    }

    /// Check everything that can be checked without touching the project.
    pub fn validate(&self) -> Result<(), InstallError> {
        self.validate_location()?;
        validate_relative_dir("output_folder", &self.output_folder)?;
        if self.output_folder.trim() == self.bmad_folder {
            return Err(InstallError::InvalidConfig(
                "output_folder must differ from bmad_folder".to_string(),
            ));
        }
        for ide in &self.selected_ides {
            if IdeTarget::find(ide).is_none() {
                return Err(InstallError::InvalidConfig(format!(
                    "unknown IDE target '{ide}' (known: {})",
                    IdeTarget::codes().join(", ")
                )));
            }
        }
        for module in &self.selected_modules {
            validate_module_code(module)?;
        }
        Ok(())
    }

    /// Check only where the installation lives. Runs that take every other
    /// value from the existing installation need nothing more.
    pub fn validate_location(&self) -> Result<(), InstallError> {
        if !self.project_directory.is_dir() {
            return Err(InstallError::InvalidConfig(format!(
                "project directory {} does not exist",
                self.project_directory.display()
            )));
        }
        validate_folder_name("bmad_folder", &self.bmad_folder)
    }
}

fn validate_folder_name(field: &str, value: &str) -> Result<(), InstallError> {
    let value = value.trim();
    if value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\'])
    {
        return Err(InstallError::InvalidConfig(format!(
            "{field} '{value}' must be a plain folder name"
        )));
    }
    Ok(())
}

pub(crate) fn validate_module_code(code: &str) -> Result<(), InstallError> {
    if !is_valid_module_code(code.trim()) {
        return Err(InstallError::InvalidConfig(format!(
            "module code '{}' must contain only ASCII letters and digits",
            code.trim()
        )));
    }
    Ok(())
}

fn validate_relative_dir(field: &str, value: &str) -> Result<(), InstallError> {
    let value = value.trim();
    if value.is_empty() || value == "." || !is_contained(Path::new(value)) {
        return Err(InstallError::InvalidConfig(format!(
            "{field} '{value}' must be a relative path inside the project"
        )));
    }
    Ok(())
}
