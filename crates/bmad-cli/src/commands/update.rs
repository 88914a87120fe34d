use anyhow::{Context, Result};
use bmad_installer::{ActionRequest, Installer};

use super::install::InstallArgs;
use super::TerminalConfirm;
use crate::output::format::format_install_result;
use crate::output::OutputFormat;

pub fn run(args: &InstallArgs, format: OutputFormat) -> Result<()> {
    let config = args.to_config(ActionRequest::Update)?;
    let installer = Installer::new(config);
    installer
        .plan()
        .context("Nothing to update. Run `bmad install` first.")?;

    let result = installer
        .install(&TerminalConfirm { yes: args.yes })
        .context("Update failed")?;
    println!("{}", format_install_result(&result, format));
    Ok(())
}
