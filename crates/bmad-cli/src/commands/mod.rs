pub mod compile_agents;
pub mod install;
pub mod quick_update;
pub mod status;
pub mod uninstall;
pub mod update;
pub mod version;

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};
use bmad_installer::{Confirm, InstallConfig, InstallPlan};
use clap::{Args, Subcommand};

use crate::output::format::format_plan;

#[derive(Subcommand)]
pub enum Commands {
    /// Install modules into a project (updates an existing installation)
    Install(install::InstallArgs),
    /// Reinstall module content with new selections or settings
    Update(install::InstallArgs),
    /// Refresh module content, keeping every stored setting
    QuickUpdate(quick_update::QuickUpdateArgs),
    /// Recompile agents with their customizations
    CompileAgents(compile_agents::CompileAgentsArgs),
    /// Remove IDE commands, output artifacts or module content
    Uninstall(uninstall::UninstallArgs),
    /// Show what is installed and which modules have updates
    Status(status::StatusArgs),
    /// Print version information
    Version,
}

/// Where the project is and where module sources come from.
#[derive(Args)]
pub struct ProjectArgs {
    /// Project directory (default: current directory)
    #[arg(short = 'd', long)]
    pub directory: Option<PathBuf>,

    /// Name of the folder that holds installed content (default: _bmad)
    #[arg(long)]
    pub bmad_folder: Option<String>,

    /// Directory containing module sources
    #[arg(long, env = "BMAD_SOURCE_ROOT")]
    pub source: Option<PathBuf>,

    /// Read installer settings from a YAML file; flags override it
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl ProjectArgs {
    pub fn load_config(&self) -> Result<InstallConfig> {
        let mut config = match &self.config {
            Some(path) => InstallConfig::load(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?,
            None => InstallConfig::default(),
        };
        if let Some(dir) = &self.directory {
            config.project_directory = dir.clone();
        }
        if let Some(folder) = &self.bmad_folder {
            config.bmad_folder = folder.clone();
        }
        if let Some(source) = &self.source {
            config.source_root = Some(source.clone());
        }
        Ok(config)
    }
}

/// Shows the plan on stderr and asks on the terminal unless `--yes` was given.
pub struct TerminalConfirm {
    pub yes: bool,
}

impl Confirm for TerminalConfirm {
    fn confirm(&self, plan: &InstallPlan) -> bool {
        eprintln!("{}", format_plan(plan));
        if self.yes {
            return true;
        }
        if !std::io::stdin().is_terminal() {
            eprintln!("Not running in a terminal; re-run with --yes to proceed.");
            return false;
        }
        dialoguer::Confirm::new()
            .with_prompt("Proceed?")
            .default(true)
            .interact()
            .unwrap_or(false)
    }
}
