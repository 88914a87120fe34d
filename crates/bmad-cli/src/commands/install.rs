use std::path::PathBuf;

use anyhow::{Context, Result};
use bmad_installer::{ActionRequest, InstallConfig, Installer};
use clap::Args;
use tracing::debug;

use super::{ProjectArgs, TerminalConfirm};
use crate::output::format::format_install_result;
use crate::output::OutputFormat;

#[derive(Args)]
pub struct InstallArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Modules to install besides core (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub modules: Vec<String>,

    /// IDE targets to generate commands for (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub ides: Vec<String>,

    /// How agents address you
    #[arg(long)]
    pub user_name: Option<String>,

    /// Language agents talk to you in
    #[arg(long)]
    pub communication_language: Option<String>,

    /// Language of generated documents
    #[arg(long)]
    pub document_output_language: Option<String>,

    /// Folder for generated documents, relative to the project
    #[arg(long)]
    pub output_folder: Option<String>,

    /// Extra module directory containing a module.yaml (repeatable)
    #[arg(long = "custom-content")]
    pub custom_content: Vec<PathBuf>,

    /// Module setting as MODULE.KEY=VALUE (repeatable)
    #[arg(long = "set", value_parser = parse_setting)]
    pub settings: Vec<(String, String, String)>,

    /// Skip the confirmation prompt
    #[arg(long, short)]
    pub yes: bool,
}

impl InstallArgs {
    pub fn to_config(&self, action: ActionRequest) -> Result<InstallConfig> {
        let mut config = self.project.load_config()?;
        config.action = Some(action);
        if !self.modules.is_empty() {
            config.selected_modules = self.modules.iter().map(|m| m.trim().to_string()).collect();
        }
        if !self.ides.is_empty() {
            config.selected_ides = self.ides.iter().map(|i| i.trim().to_string()).collect();
        }
        for (field, value) in [
            (&mut config.user_name, &self.user_name),
            (&mut config.communication_language, &self.communication_language),
            (&mut config.document_output_language, &self.document_output_language),
            (&mut config.output_folder, &self.output_folder),
        ] {
            if let Some(v) = value {
                *field = v.clone();
            }
        }
        config.custom_content_paths.extend(self.custom_content.iter().cloned());
        for (module, key, value) in &self.settings {
            config
                .module_settings
                .entry(module.clone())
                .or_default()
                .insert(key.clone(), value.clone());
        }
        Ok(config)
    }
}

fn parse_setting(s: &str) -> Result<(String, String, String), String> {
    let (target, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected MODULE.KEY=VALUE, got '{s}'"))?;
    let (module, key) = target
        .split_once('.')
        .ok_or_else(|| format!("expected MODULE.KEY=VALUE, got '{s}'"))?;
    if module.trim().is_empty() || key.trim().is_empty() {
        return Err(format!("expected MODULE.KEY=VALUE, got '{s}'"));
    }
    Ok((module.trim().to_string(), key.trim().to_string(), value.to_string()))
}

pub fn run(args: &InstallArgs, format: OutputFormat) -> Result<()> {
    let config = args.to_config(ActionRequest::Install)?;
    debug!(
        project = %config.project_directory.display(),
        modules = ?config.selected_modules,
        ides = ?config.selected_ides,
        "install requested"
    );
    let installer = Installer::new(config);
    let result = installer
        .install(&TerminalConfirm { yes: args.yes })
        .context("Install failed")?;
    println!("{}", format_install_result(&result, format));
    Ok(())
}
