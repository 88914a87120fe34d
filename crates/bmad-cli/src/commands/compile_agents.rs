use anyhow::{Context, Result};
use bmad_installer::{ActionRequest, Installer};
use clap::Args;

use super::ProjectArgs;
use crate::output::format::format_install_result;
use crate::output::OutputFormat;

#[derive(Args)]
pub struct CompileAgentsArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Agents to compile, by name, MODULE/NAME or command file name (default: all)
    pub agents: Vec<String>,
}

pub fn run(args: &CompileAgentsArgs, format: OutputFormat) -> Result<()> {
    let mut config = args.project.load_config()?;
    config.action = Some(ActionRequest::CompileAgents);

    let result = Installer::new(config)
        .compile_agents(&args.agents)
        .context("Agent compilation failed")?;
    println!("{}", format_install_result(&result, format));
    Ok(())
}
