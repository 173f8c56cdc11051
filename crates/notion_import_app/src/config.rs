use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use engine_logging::{engine_debug, engine_info};
use ron::extensions::Extensions;
use ron::Options;
use serde::Deserialize;

/// Looked up in the current directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILENAME: &str = "notion-import.ron";

/// Optional overrides read from a RON file, e.g.
///
/// ```ron
/// (author: "Keto", timezone: "+0900", site_root: "../blog")
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub author: Option<String>,
    pub timezone: Option<String>,
    pub site_root: Option<PathBuf>,
    pub layout: Option<String>,
    pub batch_tag: Option<String>,
}

impl AppConfig {
    pub fn parse(text: &str) -> Result<Self, ron::error::SpannedError> {
        Options::default()
            .with_default_extension(Extensions::IMPLICIT_SOME)
            .from_str(text)
    }
}

/// Load `explicit`, or the default file if present, or nothing.
///
/// An explicitly named file must exist; the default one is optional.
pub fn load(explicit: Option<&Path>) -> Result<AppConfig> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILENAME), false),
    };

    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound && !required => {
            engine_debug!("No config file at {:?}; using defaults", path);
            return Ok(AppConfig::default());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read config file {path:?}"));
        }
    };

    let config =
        AppConfig::parse(&text).with_context(|| format!("failed to parse config file {path:?}"))?;
    engine_info!("Loaded config from {:?}", path);
    Ok(config)
}
