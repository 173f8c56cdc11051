use std::fmt::Write;
use std::path::{Path, PathBuf};

use notion_import_engine::ImportSummary;

use crate::cli::OutputFormat;

pub fn render(summary: &ImportSummary, format: OutputFormat, site_root: &Path) -> String {
    match format {
        OutputFormat::Plain => render_plain(summary, site_root),
        OutputFormat::Json => render_json(summary),
    }
}

fn render_plain(summary: &ImportSummary, site_root: &Path) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "[OK] Imported {} markdown file(s).", summary.posts.len());
    for post in &summary.posts {
        let _ = writeln!(out, " - {}", site_relative(post, site_root).display());
    }
    let _ = writeln!(
        out,
        "[OK] Copied {} attachment file(s) to {}/",
        summary.assets_copied,
        site_relative(&summary.asset_dir, site_root).display()
    );
    if !summary.tables.is_empty() {
        let _ = writeln!(out, "[OK] Copied {} csv file(s).", summary.tables.len());
    }
    if summary.dry_run {
        let _ = writeln!(out, "[DRY-RUN] No files were written.");
    }
    out
}

fn render_json(summary: &ImportSummary) -> String {
    // Serializing plain strings, paths and integers cannot fail.
    let mut out = serde_json::to_string_pretty(summary).unwrap_or_default();
    out.push('\n');
    out
}

fn site_relative(path: &Path, site_root: &Path) -> PathBuf {
    path.strip_prefix(site_root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}
