use std::io::IsTerminal;

use anyhow::{Context, Result};
use bmad_installer::{ActionRequest, Installer, UninstallOptions};
use clap::Args;

use super::ProjectArgs;
use crate::output::format::format_uninstall_report;
use crate::output::OutputFormat;

#[derive(Args)]
pub struct UninstallArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Remove generated IDE command files
    #[arg(long)]
    pub ide: bool,

    /// Remove the output folder and everything in it
    #[arg(long)]
    pub output: bool,

    /// Remove installed module content, manifests and customizations
    #[arg(long)]
    pub modules: bool,

    /// Remove everything
    #[arg(long, conflicts_with_all = ["ide", "output", "modules"])]
    pub all: bool,

    /// Skip the confirmation prompt
    #[arg(long, short)]
    pub yes: bool,
}

impl UninstallArgs {
    fn options(&self) -> UninstallOptions {
        if self.all {
            return UninstallOptions::all();
        }
        UninstallOptions {
            ide_integrations: self.ide,
            output_artifacts: self.output,
            module_content: self.modules,
        }
    }
}

pub fn run(args: &UninstallArgs, format: OutputFormat) -> Result<()> {
    let options = args.options();
    if options.is_empty() {
        anyhow::bail!("Nothing selected. Use --ide, --output, --modules or --all.");
    }

    let mut config = args.project.load_config()?;
    config.action = Some(ActionRequest::Uninstall);
    let installer = Installer::new(config);
    installer.plan().context("Nothing to uninstall")?;

    if !args.yes {
        if !std::io::stdin().is_terminal() {
            anyhow::bail!("Refusing to uninstall without confirmation. Use --yes.");
        }
        let proceed = dialoguer::Confirm::new()
            .with_prompt(format!(
                "Remove {} from {}?",
                describe(&options),
                installer.layout().project_root().display()
            ))
            .default(false)
            .interact()?;
        if !proceed {
            println!("Uninstall cancelled; nothing was changed.");
            return Ok(());
        }
    }

    let report = installer.uninstall(&options).context("Uninstall failed")?;
    println!("{}", format_uninstall_report(&report, format));
    if let Some((phase, reason)) = &report.failed {
        anyhow::bail!("Uninstall stopped at {phase}: {reason}");
    }
    Ok(())
}

fn describe(options: &UninstallOptions) -> String {
    let mut parts = Vec::new();
    if options.ide_integrations {
        parts.push("IDE commands");
    }
    if options.output_artifacts {
        parts.push("output artifacts");
    }
    if options.module_content {
        parts.push("module content");
    }
    parts.join(" and ")
}
