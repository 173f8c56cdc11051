use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{FixedOffset, Local, NaiveDate, NaiveDateTime, Offset, Utc};
use serde::Serialize;

use crate::archive::ArchiveError;
use crate::assets::ASSET_NAMESPACE_DIR;
use crate::document::DocumentError;
use crate::frontmatter::{FrontMatterError, DEFAULT_LAYOUT};
use crate::metadata::BATCH_TAG;
use crate::persist::PersistError;

pub const DEFAULT_AUTHOR: &str = "Keto";
const DEFAULT_OFFSET_SECS: i32 = 9 * 3600;
pub const POSTS_DIR: &str = "_posts";
pub const ASSETS_DIR: &str = "assets";
pub const TABLES_DIR: &str = "tables";

/// Per-run identifier namespacing copied assets, e.g. `20240301-091500`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ImportToken(String);

impl ImportToken {
    pub fn from_start_time(started: NaiveDateTime) -> Self {
        Self(started.format("%Y%m%d-%H%M%S").to_string())
    }

    /// Token for a run starting now, in local time.
    pub fn now() -> Self {
        Self::from_start_time(Local::now().naive_local())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImportToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything a run needs besides the archive itself.
#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub posts_dir: PathBuf,
    /// On-disk directory served as `/assets`.
    pub assets_dir: PathBuf,
    pub author: String,
    pub layout: String,
    pub batch_tag: String,
    pub timezone: FixedOffset,
    pub forced_date: Option<NaiveDate>,
    /// When set, nothing under `posts_dir` or `assets_dir` is touched.
    pub dry_run: bool,
}

impl ImportSettings {
    /// Defaults for a site rooted at `site_root`.
    pub fn for_site_root(site_root: &Path) -> Self {
        Self {
            posts_dir: site_root.join(POSTS_DIR),
            assets_dir: site_root.join(ASSETS_DIR),
            author: DEFAULT_AUTHOR.to_string(),
            layout: DEFAULT_LAYOUT.to_string(),
            batch_tag: BATCH_TAG.to_string(),
            timezone: FixedOffset::east_opt(DEFAULT_OFFSET_SECS).unwrap_or_else(|| Utc.fix()),
            forced_date: None,
            dry_run: false,
        }
    }

    /// `assets/notion`: the directory mirroring the asset URL prefix.
    pub fn asset_namespace_dir(&self) -> PathBuf {
        self.assets_dir.join(ASSET_NAMESPACE_DIR)
    }

    /// `assets/notion/<token>`: where this run's files land.
    pub fn run_asset_dir(&self, token: &ImportToken) -> PathBuf {
        self.asset_namespace_dir().join(token.as_str())
    }
}

/// What a run produced (or, under dry run, would have produced).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub import_token: ImportToken,
    pub posts: Vec<PathBuf>,
    pub assets_copied: usize,
    pub asset_dir: PathBuf,
    pub tables: Vec<PathBuf>,
    pub dry_run: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("no markdown files found in export")]
    EmptyBatch,
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    FrontMatter(#[from] FrontMatterError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}
