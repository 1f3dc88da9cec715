use anyhow::Result;
use clap::{Parser, Subcommand};
use coinchart::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    /// Directory for cached datasets, overrides the configured one
    #[arg(short, long, global = true)]
    data_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Chart prices interactively (the default)
    View,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => coinchart::cli::setup::setup(),
        Some(Commands::View) | None => {
            coinchart::run(cli.config_path.as_deref(), cli.data_path.as_deref()).await
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_is_the_default_session() {
        let cli = Cli::try_parse_from(["coinchart", "view", "-d", "data"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::View)));
        assert_eq!(cli.data_path.as_deref(), Some("data"));

        let cli = Cli::try_parse_from(["coinchart"]).unwrap();
        assert!(cli.command.is_none());
    }
}
