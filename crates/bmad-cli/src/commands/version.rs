use anyhow::Result;

use crate::output::OutputFormat;

pub fn run(format: OutputFormat) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "version": version })),
        OutputFormat::Text => println!("bmad {version}"),
    }
    Ok(())
}
