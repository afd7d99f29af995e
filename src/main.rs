use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use prism_bot::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for prism_bot::AppCommand {
    fn from(cmd: Commands) -> prism_bot::AppCommand {
        match cmd {
            Commands::Run => prism_bot::AppCommand::Run,
            Commands::Prices => prism_bot::AppCommand::Prices,
            Commands::ClearCache => prism_bot::AppCommand::ClearCache,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Answer challenges until the service reports it is finished
    Run,
    /// Fetch and display current prices for the stock universe
    Prices,
    /// Remove all cached prices, including the on-disk history
    ClearCache,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => prism_bot::cli::setup::setup(cli.config_path.as_deref()),
        Some(cmd) => prism_bot::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
