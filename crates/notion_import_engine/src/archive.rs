//! Recursive extraction of the export archive into a scratch directory.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use engine_logging::{engine_debug, engine_info};
use tempfile::TempDir;
use thiserror::Error;
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::ZipArchive;

const SCRATCH_PREFIX: &str = "notion-import-";
const EXTRACT_DIR: &str = "extract";

/// Upper bound on extraction rounds; each round unpacks one nesting level.
const MAX_NESTING: usize = 32;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("zip file not found: {0:?}")]
    NotFound(PathBuf),
    #[error("failed to extract {path:?}: {source}")]
    Extract {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
    #[error("nested archives in {0:?} go deeper than {MAX_NESTING} levels")]
    TooDeep(PathBuf),
    #[error("failed to scan extracted files: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ArchiveError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> ArchiveError + '_ {
        move |source| ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A fully extracted export. The scratch directory is removed on drop.
#[derive(Debug)]
pub struct ExportArchive {
    _scratch: TempDir,
    root: PathBuf,
}

impl ExportArchive {
    /// Extract `zip_path` and every zip nested in it into a fresh scratch dir.
    pub fn extract(zip_path: &Path) -> Result<Self, ArchiveError> {
        if !zip_path.is_file() {
            return Err(ArchiveError::NotFound(zip_path.to_path_buf()));
        }
        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir()
            .map_err(ArchiveError::io(zip_path))?;
        let extract_dir = scratch.path().join(EXTRACT_DIR);
        fs::create_dir_all(&extract_dir).map_err(ArchiveError::io(&extract_dir))?;
        let root = extract_dir
            .canonicalize()
            .map_err(ArchiveError::io(&extract_dir))?;

        unzip_recursively(zip_path, &root)?;
        Ok(Self {
            _scratch: scratch,
            root,
        })
    }

    /// Canonical path of the extraction root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Markdown documents under the root, sorted by path.
    pub fn markdown_documents(&self) -> Result<Vec<PathBuf>, ArchiveError> {
        files_with_extension(&self.root, "md")
    }

    /// Tabular (`.csv`) files under the root, sorted by path.
    pub fn table_files(&self) -> Result<Vec<PathBuf>, ArchiveError> {
        files_with_extension(&self.root, "csv")
    }
}

/// Extract `zip_path` into `dest`, then unpack nested zips in place.
///
/// Returns the number of archives extracted, the outer one included.
pub fn unzip_recursively(zip_path: &Path, dest: &Path) -> Result<usize, ArchiveError> {
    unzip_into(zip_path, dest)?;
    let mut extracted = 1;

    for _ in 0..MAX_NESTING {
        let nested = files_with_extension(dest, "zip")?;
        if nested.is_empty() {
            engine_info!("Extracted {} archive(s) into {:?}", extracted, dest);
            return Ok(extracted);
        }
        for child in nested {
            let parent = child.parent().unwrap_or(dest);
            unzip_into(&child, parent)?;
            fs::remove_file(&child).map_err(ArchiveError::io(&child))?;
            extracted += 1;
        }
    }
    Err(ArchiveError::TooDeep(zip_path.to_path_buf()))
}

fn unzip_into(zip_path: &Path, dest: &Path) -> Result<(), ArchiveError> {
    engine_debug!("Unzipping {:?} into {:?}", zip_path, dest);
    let file = File::open(zip_path).map_err(ArchiveError::io(zip_path))?;
    let extract_err = |source| ArchiveError::Extract {
        path: zip_path.to_path_buf(),
        source,
    };
    let mut archive = ZipArchive::new(file).map_err(extract_err)?;
    // `extract` rejects entries whose names would leave `dest`.
    archive.extract(dest).map_err(extract_err)
}

/// Regular files under `root` with extension `ext` (case-insensitive), sorted.
pub fn files_with_extension(root: &Path, ext: &str) -> Result<Vec<PathBuf>, ArchiveError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|e| e.eq_ignore_ascii_case(ext));
        if matches {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}
