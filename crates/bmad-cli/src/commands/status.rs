use anyhow::{Context, Result};
use bmad_installer::read_status;
use clap::Args;

use super::ProjectArgs;
use crate::output::format::format_status;
use crate::output::OutputFormat;

#[derive(Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}

pub fn run(args: &StatusArgs, format: OutputFormat) -> Result<()> {
    let config = args.project.load_config()?;
    let status = read_status(
        &config.project_directory,
        &config.bmad_folder,
        config.source_root.as_deref(),
    )
    .context("Failed to read installation status")?;
    println!("{}", format_status(&status, format));
    Ok(())
}
