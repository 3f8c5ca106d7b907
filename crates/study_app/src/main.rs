mod cli;
mod commands;
mod config;
mod render;

use std::process::ExitCode;

use anyhow::{Context as _, Result};
use clap::Parser;
use study_logging::study_error;

use crate::cli::Cli;
use crate::commands::Context;
use crate::config::{AppConfig, ConfigError};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            study_error!("command failed: {:#}", err);
            eprintln!("error: {err}");
            for cause in err.chain().skip(1) {
                eprintln!("  caused by: {cause}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(&cli).context("failed to load configuration")?;

    study_logging::initialize(&config.log_destination(), config.log_level()?);
    let ctx = Context::new(config)?;
    commands::run(&ctx, cli.command).await
}

fn load_config(cli: &Cli) -> Result<AppConfig, ConfigError> {
    let (path, explicit) = cli.global.config_path();
    let mut config = AppConfig::load(&path, explicit)?;
    if let Some(api_url) = &cli.global.api_url {
        config.api_url = api_url.clone();
    }
    if let Some(token) = &cli.global.token {
        config.token = Some(token.clone());
    }
    if let Some(level) = &cli.global.log_level {
        config.log.level = level.clone();
    }
    config.validate()?;
    Ok(config)
}
