//! Notion import engine: turns an exported workspace archive into Jekyll posts.
mod archive;
mod assets;
mod batch;
mod decode;
mod document;
mod engine;
mod filename;
mod frontmatter;
mod identity;
mod links;
mod metadata;
mod persist;
mod types;

pub use archive::{files_with_extension, unzip_recursively, ArchiveError, ExportArchive};
pub use assets::{
    encode_url_path, is_external, split_link_title, AssetLedger, AssetResolver, CopiedAsset,
    PassReason, Resolution, ASSET_URL_PREFIX,
};
pub use batch::{ImportBatch, Post, TableCopy};
pub use decode::{decode_text, DecodeError, DecodedText};
pub use document::{DocumentError, SourceDocument};
pub use engine::{import_archive, import_extracted};
pub use filename::{first_free, PostFilenames, SlugRegistry};
pub use frontmatter::{build_post_document, FrontMatter, FrontMatterError, DEFAULT_LAYOUT};
pub use identity::{identify, slugify, DocumentIdentity, SlugBasis, FALLBACK_SLUG};
pub use links::{rewrite_links, AssetReference, LinkContext, RewrittenBody};
pub use metadata::{
    classify, parse_utc_offset, pick_publish_date, Classification, DateSource, OffsetParseError,
    PublishDate, BATCH_TAG,
};
pub use persist::{copy_file, ensure_output_dir, AtomicFileWriter, PersistError};
pub use types::{
    ImportError, ImportSettings, ImportSummary, ImportToken, DEFAULT_AUTHOR, POSTS_DIR,
};
