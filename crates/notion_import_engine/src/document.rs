use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::decode::{decode_text, DecodeError};

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },
}

/// One markdown file found in the extracted export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub path: PathBuf,
    /// Filename without the `.md` extension; may end in a legacy id.
    pub raw_name: String,
    pub content: String,
    pub encoding_label: String,
    pub modified: SystemTime,
}

impl SourceDocument {
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let read_err = |source| DocumentError::Read {
            path: path.to_path_buf(),
            source,
        };
        let bytes = fs::read(path).map_err(read_err)?;
        let modified = fs::metadata(path)
            .and_then(|meta| meta.modified())
            .map_err(read_err)?;
        let decoded = decode_text(&bytes).map_err(|source| DocumentError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        let raw_name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            raw_name,
            content: decoded.text,
            encoding_label: decoded.encoding_label,
            modified,
        })
    }

    /// Directory relative links in this document are resolved against.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }
}
