use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{FixedOffset, NaiveDate};
use clap::{Parser, ValueEnum};
use log::LevelFilter;
use notion_import_engine::{parse_utc_offset, ImportSettings};

use crate::config::AppConfig;

#[derive(Debug, Parser)]
#[command(
    name = "import-notion-export",
    about = "Import a Notion markdown export zip into Jekyll posts",
    version
)]
pub struct Cli {
    /// Notion export archive (.zip)
    pub zip: PathBuf,

    /// Force the publish date of every post (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub date: Option<NaiveDate>,

    /// UTC offset for derived and forced dates, e.g. +0900
    #[arg(long, value_parser = parse_offset, allow_hyphen_values = true)]
    pub timezone: Option<FixedOffset>,

    /// Author written into every post
    #[arg(long)]
    pub author: Option<String>,

    /// Resolve everything but write and copy nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Site directory holding `_posts/` and `assets/` (default: .)
    #[arg(long)]
    pub site_root: Option<PathBuf>,

    /// RON config file (default: ./notion-import.ron when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Summary format
    #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
    pub format: OutputFormat,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,

    /// Also write the log to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

impl Cli {
    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }

    /// Merge flags over `config` over built-in defaults.
    pub fn settings(&self, config: &AppConfig) -> Result<ImportSettings> {
        let site_root = self
            .site_root
            .clone()
            .or_else(|| config.site_root.clone())
            .unwrap_or_else(|| PathBuf::from("."));
        let mut settings = ImportSettings::for_site_root(&site_root);

        settings.timezone = match (self.timezone, &config.timezone) {
            (Some(offset), _) => offset,
            (None, Some(value)) => parse_utc_offset(value)
                .with_context(|| format!("invalid timezone {value:?} in config file"))?,
            (None, None) => settings.timezone,
        };
        if let Some(author) = self.author.as_ref().or(config.author.as_ref()) {
            settings.author = author.clone();
        }
        if let Some(layout) = &config.layout {
            settings.layout = layout.clone();
        }
        if let Some(batch_tag) = &config.batch_tag {
            settings.batch_tag = batch_tag.clone();
        }
        settings.forced_date = self.date;
        settings.dry_run = self.dry_run;
        Ok(settings)
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| format!("expected YYYY-MM-DD, got {value:?}"))
}

fn parse_offset(value: &str) -> Result<FixedOffset, String> {
    parse_utc_offset(value).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("import-notion-export").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_apply_without_flags_or_config() {
        let cli = parse(&["export.zip"]).unwrap();
        let settings = cli.settings(&AppConfig::default()).unwrap();

        assert_eq!(settings.author, "Keto");
        assert_eq!(settings.timezone.local_minus_utc(), 9 * 3600);
        assert_eq!(settings.posts_dir, PathBuf::from("./_posts"));
        assert_eq!(settings.forced_date, None);
        assert!(!settings.dry_run);
        assert_eq!(cli.format, OutputFormat::Plain);
        assert_eq!(cli.log_level(), LevelFilter::Info);
    }

    #[test]
    fn flags_override_config() {
        let cli = parse(&[
            "export.zip",
            "--author",
            "Ana",
            "--timezone",
            "-0530",
            "--date",
            "2024-03-01",
            "--site-root",
            "blog",
            "--dry-run",
            "--format",
            "json",
            "-v",
        ])
        .unwrap();
        let config = AppConfig {
            author: Some("From Config".to_string()),
            timezone: Some("+0100".to_string()),
            site_root: Some(PathBuf::from("elsewhere")),
            layout: Some("article".to_string()),
            batch_tag: None,
        };
        let settings = cli.settings(&config).unwrap();

        assert_eq!(settings.author, "Ana");
        assert_eq!(settings.timezone.local_minus_utc(), -(5 * 3600 + 30 * 60));
        assert_eq!(settings.forced_date, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(settings.posts_dir, PathBuf::from("blog/_posts"));
        assert_eq!(settings.layout, "article");
        assert_eq!(settings.batch_tag, "notion-import");
        assert!(settings.dry_run);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.log_level(), LevelFilter::Debug);
    }

    #[test]
    fn config_fills_in_missing_flags() {
        let cli = parse(&["export.zip"]).unwrap();
        let config = AppConfig {
            author: Some("From Config".to_string()),
            timezone: Some("+01:00".to_string()),
            ..AppConfig::default()
        };
        let settings = cli.settings(&config).unwrap();

        assert_eq!(settings.author, "From Config");
        assert_eq!(settings.timezone.local_minus_utc(), 3600);
    }

    #[test]
    fn bad_timezone_in_config_is_an_error() {
        let cli = parse(&["export.zip"]).unwrap();
        let config = AppConfig {
            timezone: Some("JST".to_string()),
            ..AppConfig::default()
        };
        assert!(cli.settings(&config).is_err());
    }

    #[test]
    fn malformed_date_and_timezone_are_usage_errors() {
        let err = parse(&["export.zip", "--date", "03/01/2024"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
        let err = parse(&["export.zip", "--timezone", "+2500"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn archive_argument_is_required() {
        let err = parse(&[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }
}
