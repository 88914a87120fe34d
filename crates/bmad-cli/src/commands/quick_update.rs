use anyhow::{Context, Result};
use bmad_installer::{ActionRequest, Installer};
use clap::Args;

use super::{ProjectArgs, TerminalConfirm};
use crate::output::format::format_install_result;
use crate::output::OutputFormat;

#[derive(Args)]
pub struct QuickUpdateArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Skip the confirmation prompt
    #[arg(long, short)]
    pub yes: bool,
}

pub fn run(args: &QuickUpdateArgs, format: OutputFormat) -> Result<()> {
    let mut config = args.project.load_config()?;
    config.action = Some(ActionRequest::QuickUpdate);

    let result = Installer::new(config)
        .quick_update(&TerminalConfirm { yes: args.yes })
        .context("Quick update failed")?;
    println!("{}", format_install_result(&result, format));
    Ok(())
}
