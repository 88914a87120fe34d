use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod output;

#[derive(Parser)]
#[command(
    name = "bmad",
    version,
    about = "Install bmad modules and generate agent and workflow commands for your IDEs"
)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: output::OutputFormat,

    #[command(subcommand)]
    command: commands::Commands,
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        commands::Commands::Install(args) => commands::install::run(args, cli.format),
        commands::Commands::Update(args) => commands::update::run(args, cli.format),
        commands::Commands::QuickUpdate(args) => commands::quick_update::run(args, cli.format),
        commands::Commands::CompileAgents(args) => commands::compile_agents::run(args, cli.format),
        commands::Commands::Uninstall(args) => commands::uninstall::run(args, cli.format),
        commands::Commands::Status(args) => commands::status::run(args, cli.format),
        commands::Commands::Version => commands::version::run(cli.format),
    }
}
