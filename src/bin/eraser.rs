//! Eraser CLI Binary
//!
//! Command-line front end for the Eraser edit-history engine.

use anyhow::Context;
use clap::Parser;
use eraser::cli::{map_error, Cli, RunContext};
use eraser::config::ConfigLoader;
use eraser::logging::{init_logging, LoggingConfig};
use eraser::EditError;
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("{}", render_error(&e));
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<String> {
    let logging_config = build_logging_config(cli);
    init_logging(Some(&logging_config)).context("Failed to initialize logging")?;

    info!("Eraser CLI starting");

    let context = RunContext::new(cli.workspace.clone(), cli.config.clone())
        .context("Error loading configuration")?;
    let output = context.execute(&cli.command)?;
    info!("Command completed successfully");
    Ok(output)
}

/// Domain errors get their CLI wording; anything else prints with its context chain.
fn render_error(e: &anyhow::Error) -> String {
    match e.downcast_ref::<EditError>() {
        Some(edit) if e.to_string() == edit.to_string() => map_error(edit),
        Some(edit) => format!("{}: {}", e, map_error(edit)),
        None => format!("{:#}", e),
    }
}

/// Build logging configuration from CLI args and config file.
/// Precedence: CLI flags override config file override defaults.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let loaded = match cli.config {
        Some(ref config_path) => ConfigLoader::load_from_file(config_path),
        None => ConfigLoader::load(&cli.workspace),
    };
    let mut config = loaded.map(|c| c.logging).unwrap_or_default();

    if cli.quiet {
        config.enabled = false;
    }
    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.clone();
    }
    if let Some(ref file) = cli.log_file {
        config.file = Some(file.clone());
    }

    config
}
