mod cli;
mod config;
mod report;

use std::io::Write;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use engine_logging::{engine_error, engine_info};
use notion_import_engine::{import_archive, ImportToken};

use crate::cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    engine_logging::initialize(cli.log_level(), cli.log_file.as_deref());

    if !cli.zip.is_file() {
        Cli::command()
            .error(
                ErrorKind::InvalidValue,
                format!("zip file not found: {}", cli.zip.display()),
            )
            .exit();
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            engine_error!("Import failed: {:#}", err);
            eprintln!("[ERROR] {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = config::load(cli.config.as_deref())?;
    let settings = cli.settings(&config)?;
    let site_root = settings
        .posts_dir
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_default();

    let token = ImportToken::now();
    engine_info!(
        "Run {} into {:?}{}",
        token,
        site_root,
        if settings.dry_run { " (dry run)" } else { "" }
    );
    let summary = import_archive(&cli.zip, &settings, token)
        .with_context(|| format!("failed to import {}", cli.zip.display()))?;

    let text = report::render(&summary, cli.format, &site_root);
    std::io::stdout()
        .write_all(text.as_bytes())
        .context("failed to write summary")?;
    Ok(())
}
