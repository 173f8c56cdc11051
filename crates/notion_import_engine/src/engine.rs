use std::path::{Path, PathBuf};

use engine_logging::{engine_info, engine_warn};

use crate::archive::{files_with_extension, ArchiveError, ExportArchive};
use crate::batch::ImportBatch;
use crate::document::SourceDocument;
use crate::types::{ImportError, ImportSettings, ImportSummary, ImportToken};

/// Extract `zip_path` and import everything in it.
///
/// The scratch extraction is removed before this returns, whatever the
/// outcome.
pub fn import_archive(
    zip_path: &Path,
    settings: &ImportSettings,
    token: ImportToken,
) -> Result<ImportSummary, ImportError> {
    engine_info!("Importing {:?} as run {}", zip_path, token);
    let archive = ExportArchive::extract(zip_path)?;
    let markdown = archive.markdown_documents()?;
    let tables = archive.table_files()?;
    import_documents(archive.root(), &markdown, &tables, settings, token)
}

/// Import an already extracted export rooted at `root`.
pub fn import_extracted(
    root: &Path,
    settings: &ImportSettings,
    token: ImportToken,
) -> Result<ImportSummary, ImportError> {
    let root = root
        .canonicalize()
        .map_err(|source| ArchiveError::Io {
            path: root.to_path_buf(),
            source,
        })?;
    let markdown = files_with_extension(&root, "md")?;
    let tables = files_with_extension(&root, "csv")?;
    import_documents(&root, &markdown, &tables, settings, token)
}

fn import_documents(
    root: &Path,
    markdown: &[PathBuf],
    tables: &[PathBuf],
    settings: &ImportSettings,
    token: ImportToken,
) -> Result<ImportSummary, ImportError> {
    if markdown.is_empty() {
        return Err(ImportError::EmptyBatch);
    }

    let mut batch = ImportBatch::new(token);
    for path in markdown {
        let doc = SourceDocument::load(path)?;
        if doc.content.trim().is_empty() {
            engine_warn!("{:?} is empty; importing it anyway", path);
        }
        batch.plan_document(&doc, root, settings)?;
    }
    batch.plan_tables(root, tables, settings);
    batch.commit(settings)?;

    Ok(summarize(&batch, settings))
}

fn summarize(batch: &ImportBatch, settings: &ImportSettings) -> ImportSummary {
    ImportSummary {
        import_token: batch.token().clone(),
        posts: batch.posts().iter().map(|post| post.path.clone()).collect(),
        assets_copied: batch.assets().len(),
        asset_dir: settings.run_asset_dir(batch.token()),
        tables: batch
            .tables()
            .iter()
            .map(|table| table.destination.clone())
            .collect(),
        dry_run: settings.dry_run,
    }
}
