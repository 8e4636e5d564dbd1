mod cli;
mod commands;
mod error;
mod logging;
mod output;

use clap::Parser;
use std::process::ExitCode;

use tickwatch_core::Settings;

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = resolve_settings(&cli)?;
    logging::init(&settings.log_level, &settings.log_format);

    let failure_count = commands::run(&cli, &settings).await?;

    if cli.strict && failure_count > 0 {
        return Err(CliError::StrictModeViolation { failure_count });
    }

    Ok(ExitCode::SUCCESS)
}

/// Settings file, then environment, then command-line flags.
fn resolve_settings(cli: &Cli) -> Result<Settings, CliError> {
    let mut settings = Settings::load(cli.settings.as_deref())?;

    if let Some(path) = &cli.watchlist {
        settings.watchlist = path.clone();
    }
    if let Some(concurrency) = cli.concurrency {
        settings.concurrency = concurrency;
    }
    if let Some(level) = &cli.log_level {
        settings.log_level = level.clone();
    }

    settings.validate()?;
    Ok(settings)
}
