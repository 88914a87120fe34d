use serde::Serialize;

use crate::generator::GeneratedFile;
use crate::lifecycle::Action;

/// Outcome of one installer run, suitable for both text and JSON output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstallResult {
    pub success: bool,
    pub cancelled: bool,
    pub action: Option<Action>,
    pub module_count: usize,
    pub modules: Vec<String>,
    pub agent_count: usize,
    pub generated: Vec<GeneratedFile>,
    pub warnings: Vec<String>,
}

impl InstallResult {
    /// The user declined the plan; nothing was written.
    pub fn cancelled(action: Action) -> Self {
        Self {
            success: false,
            cancelled: true,
            action: Some(action),
            module_count: 0,
            modules: Vec::new(),
            agent_count: 0,
            generated: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn completed(action: Action, modules: Vec<String>) -> Self {
        Self {
            success: true,
            cancelled: false,
            action: Some(action),
            module_count: modules.len(),
            modules,
            agent_count: 0,
            generated: Vec::new(),
            warnings: Vec::new(),
        }
    }
}
