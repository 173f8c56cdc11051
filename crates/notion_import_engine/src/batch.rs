use std::path::{Path, PathBuf};

use engine_logging::{engine_debug, engine_info};

use crate::assets::{AssetLedger, AssetResolver, CopiedAsset};
use crate::document::SourceDocument;
use crate::filename::{PostFilenames, SlugRegistry};
use crate::frontmatter::{build_post_document, FrontMatter};
use crate::identity::identify;
use crate::links::{rewrite_links, AssetReference};
use crate::metadata::{classify, pick_publish_date, DateSource};
use crate::persist::{copy_file, ensure_output_dir, AtomicFileWriter};
use crate::types::{ImportError, ImportSettings, ImportToken, TABLES_DIR};

/// One post ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub source: PathBuf,
    pub slug: String,
    pub filename: String,
    pub path: PathBuf,
    pub front_matter: FrontMatter,
    pub date_source: DateSource,
    pub references: Vec<AssetReference>,
    /// Full file content: front matter and rewritten body.
    pub document: String,
}

/// A `.csv` file copied wholesale into the run's `tables` directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCopy {
    pub source: PathBuf,
    pub destination: PathBuf,
}

#[derive(Debug)]
pub struct ImportBatch {
    token: ImportToken,
    slugs: SlugRegistry,
    filenames: PostFilenames,
    ledger: AssetLedger,
    posts: Vec<Post>,
    tables: Vec<TableCopy>,
}

impl ImportBatch {
    pub fn new(token: ImportToken) -> Self {
        Self {
            token,
            slugs: SlugRegistry::new(),
            filenames: PostFilenames::new(),
            ledger: AssetLedger::new(),
            posts: Vec::new(),
            tables: Vec::new(),
        }
    }

    pub fn token(&self) -> &ImportToken {
        &self.token
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn assets(&self) -> &[CopiedAsset] {
        self.ledger.copies()
    }

    pub fn tables(&self) -> &[TableCopy] {
        &self.tables
    }

    /// Turn one source document into a planned post.
    ///
    /// `archive_root` must be the canonical extraction root.
    pub fn plan_document(
        &mut self,
        doc: &SourceDocument,
        archive_root: &Path,
        settings: &ImportSettings,
    ) -> Result<&Post, ImportError> {
        let identity = identify(&doc.raw_name);
        let slug = self.slugs.claim(identity.slug_basis.as_str());
        engine_debug!(
            "{:?}: title {:?}, slug {} from {:?}",
            doc.path,
            identity.title,
            slug,
            identity.slug_basis
        );

        let asset_base = format!("{}/{slug}", self.token);
        let resolver = AssetResolver::new(archive_root, doc.dir(), &asset_base);
        let body = rewrite_links(&doc.content, &resolver, &mut self.ledger);

        let date = pick_publish_date(
            settings.forced_date,
            &body.text,
            doc.modified,
            settings.timezone,
        );
        let classification = classify(&identity.title, &body.text, &settings.batch_tag);
        let front_matter = FrontMatter {
            layout: settings.layout.clone(),
            title: identity.title,
            date: date.front_matter_value(),
            author: settings.author.clone(),
            categories: classification.categories,
            tags: classification.tags,
        };
        let document = build_post_document(&front_matter, &body.text)?;

        let filename = self.filenames.allocate(&settings.posts_dir, date.day(), &slug);
        let path = settings.posts_dir.join(&filename);
        engine_info!(
            "Planned {} ({} local link(s), date from {:?})",
            filename,
            body.local_count(),
            date.source
        );

        self.posts.push(Post {
            source: doc.path.clone(),
            slug,
            filename,
            path,
            front_matter,
            date_source: date.source,
            references: body.references,
            document,
        });
        let last = self.posts.len() - 1;
        Ok(&self.posts[last])
    }

    /// Plan copies of every table file, keeping its path below the root.
    pub fn plan_tables(
        &mut self,
        archive_root: &Path,
        tables: &[PathBuf],
        settings: &ImportSettings,
    ) {
        let tables_dir = settings.run_asset_dir(&self.token).join(TABLES_DIR);
        for source in tables {
            let relative = match source.strip_prefix(archive_root) {
                Ok(relative) => relative.to_path_buf(),
                Err(_) => source.file_name().map(PathBuf::from).unwrap_or_default(),
            };
            self.tables.push(TableCopy {
                source: source.clone(),
                destination: tables_dir.join(relative),
            });
        }
    }

    /// Write posts and copy assets and tables. No-op under dry run.
    pub fn commit(&self, settings: &ImportSettings) -> Result<(), ImportError> {
        if settings.dry_run {
            engine_info!("Dry run: skipping {} post write(s)", self.posts.len());
            return Ok(());
        }

        ensure_output_dir(&settings.posts_dir)?;
        let writer = AtomicFileWriter::new(settings.posts_dir.clone());
        for post in &self.posts {
            writer.write(&post.filename, &post.document)?;
        }

        let namespace_dir = settings.asset_namespace_dir();
        for asset in self.ledger.copies() {
            copy_file(&asset.source, &asset.destination_in(&namespace_dir))?;
        }
        for table in &self.tables {
            copy_file(&table.source, &table.destination)?;
        }
        engine_info!(
            "Wrote {} post(s), {} attachment(s), {} table(s)",
            self.posts.len(),
            self.ledger.len(),
            self.tables.len()
        );
        Ok(())
    }
}
