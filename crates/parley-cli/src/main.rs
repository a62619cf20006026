mod cli;
mod commands;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use parley_ai::Settings;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(Settings::default_path);
    let settings = Settings::load_with(config_path.as_deref(), std::env::vars())
        .context("Failed to load settings")?;

    // Logs go to stderr so stdout stays clean for answers and JSON output
    let level = if cli.verbose {
        "debug"
    } else {
        settings.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let (non_blocking, _guard) = tracing_appender::non_blocking(std::io::stderr());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .init();

    match cli.command {
        Commands::Chat(args) => commands::chat::run(settings, args, cli.format).await,
        Commands::Check(args) => commands::check::run(&settings, args, cli.format),
        Commands::Settings => commands::settings::run(&settings, cli.format),
    }
}
