use clap::Parser;

use fieldtail_cli::cli::{Cli, Commands};
use fieldtail_cli::commands;
use fieldtail_cli::error::CliError;
use fieldtail_cli::output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so JSON output on stdout stays machine-readable.
    let level = cli.log_level.clone().unwrap_or_else(|| "warn".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        use colored::Colorize;
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);

    if let Commands::Config(args) = cli.command {
        return commands::config::execute(args, &cli.config, cli.db_path.as_deref(), &writer)
            .await;
    }

    let config = commands::load_config(&cli.config, cli.db_path.as_deref()).await?;
    let admin = commands::open_admin(&config)?;
    tracing::debug!(command = ?cli.command, "running command");

    match cli.command {
        Commands::Rules(args) => commands::rules::execute(args, &admin, &writer),
        Commands::Labels(args) => commands::labels::execute(args, &admin, &writer),
        Commands::Alerts(args) => commands::alerts::execute(args, &admin, &writer),
        Commands::Events(args) => commands::events::execute(args, &admin, &writer),
        Commands::Preview(args) => commands::preview::execute(args, &admin, &writer),
        // Handled above without opening the store.
        Commands::Config(_) => Ok(()),
    }
}
