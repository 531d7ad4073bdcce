use std::process::ExitCode;

use clap::Parser;
use core_runtime::logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
use tracing::error;

mod app;
mod args;

use args::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_logging(&cli) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match app::execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn setup_logging(cli: &Cli) -> core_runtime::Result<()> {
    let format = match &cli.log_format {
        Some(format) => format.parse::<LogFormat>()?,
        None => LogFormat::default(),
    };
    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let mut config = LoggingConfig::default()
        .with_format(format)
        .with_level(level)
        .with_spans(cli.verbose);
    if let Ok(filter) = std::env::var("RUST_LOG") {
        config = config.with_filter(filter);
    }

    init_logging(config)
}
