use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use engine_logging::engine_debug;
use pathdiff::diff_paths;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;

use crate::filename::first_free;

/// URL prefix under which copied attachments are served.
pub const ASSET_URL_PREFIX: &str = "/assets/notion";

/// Directory below the site's asset root that mirrors [`ASSET_URL_PREFIX`].
pub const ASSET_NAMESPACE_DIR: &str = "notion";

/// Everything except RFC 3986 unreserved characters is escaped.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

static URI_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+\-.]*:").expect("valid regex"));
static TRAILING_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)^(.*?\S)(\s+(?:"[^"]*"|'[^']*')\s*)$"#).expect("valid regex")
});

/// Why a link was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    /// Root-relative, fragment-only or carrying a URI scheme.
    External,
    /// Looked local but names no regular file inside the archive root.
    Unresolved,
}

/// Outcome of resolving one raw link token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The token referenced an in-tree file.
    Local {
        rewritten: String,
        /// `true` for the first reference to this source in the batch.
        first_copy: bool,
    },
    Passthrough(PassReason),
}

impl Resolution {
    /// Text to put back into the document in place of `raw`.
    pub fn into_text(self, raw: &str) -> String {
        match self {
            Resolution::Local { rewritten, .. } => rewritten,
            Resolution::Passthrough(_) => raw.to_string(),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Resolution::Local { .. })
    }
}

/// One source file and the single place it is copied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopiedAsset {
    pub source: PathBuf,
    /// Destination relative to the asset namespace directory, `/`-separated.
    pub relative_destination: String,
}

impl CopiedAsset {
    /// Destination below `namespace_dir` (the site's `assets/notion`).
    pub fn destination_in(&self, namespace_dir: &Path) -> PathBuf {
        self.relative_destination
            .split('/')
            .fold(namespace_dir.to_path_buf(), |path, segment| path.join(segment))
    }

    /// Root-relative URL of the copied file.
    pub fn url_path(&self) -> String {
        format!("{ASSET_URL_PREFIX}/{}", encode_url_path(&self.relative_destination))
    }
}

/// Per-batch memo of source files and their destinations.
///
/// The mapping is injective: a source gets exactly one destination, and two
/// sources never share one.
#[derive(Debug, Default, Clone)]
pub struct AssetLedger {
    by_source: HashMap<PathBuf, usize>,
    claimed: HashSet<String>,
    copies: Vec<CopiedAsset>,
}

impl AssetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Destination of `source`, registering `wanted` (or a numbered variant of
    /// it) on first sight. The flag is `true` when the source is new.
    fn register(&mut self, source: &Path, wanted: String) -> (&CopiedAsset, bool) {
        if let Some(&index) = self.by_source.get(source) {
            return (&self.copies[index], false);
        }
        let destination = self.unclaimed_destination(&wanted);
        self.claimed.insert(destination.clone());
        self.by_source.insert(source.to_path_buf(), self.copies.len());
        self.copies.push(CopiedAsset {
            source: source.to_path_buf(),
            relative_destination: destination,
        });
        let last = self.copies.len() - 1;
        (&self.copies[last], true)
    }

    fn unclaimed_destination(&self, wanted: &str) -> String {
        if !self.claimed.contains(wanted) {
            return wanted.to_string();
        }
        let (dir, file) = match wanted.rsplit_once('/') {
            Some((dir, file)) => (Some(dir), file),
            None => (None, wanted),
        };
        let (stem, ext) = match file.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
            _ => (file, None),
        };
        let assemble = |stem: &str| {
            let file = match ext {
                Some(ext) => format!("{stem}.{ext}"),
                None => stem.to_string(),
            };
            match dir {
                Some(dir) => format!("{dir}/{file}"),
                None => file,
            }
        };
        let stem = first_free(stem, |candidate| self.claimed.contains(&assemble(candidate)));
        assemble(&stem)
    }

    pub fn copies(&self) -> &[CopiedAsset] {
        &self.copies
    }

    pub fn len(&self) -> usize {
        self.copies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.copies.is_empty()
    }
}

/// Resolves link tokens found in one document.
#[derive(Debug, Clone, Copy)]
pub struct AssetResolver<'a> {
    archive_root: &'a Path,
    source_dir: &'a Path,
    asset_base: &'a str,
}

impl<'a> AssetResolver<'a> {
    /// `archive_root` must be canonical (symlinks resolved) and `source_dir`
    /// must lie below it. `asset_base` is `<import-token>/<slug>`.
    pub fn new(archive_root: &'a Path, source_dir: &'a Path, asset_base: &'a str) -> Self {
        Self {
            archive_root,
            source_dir,
            asset_base,
        }
    }

    /// Resolve `raw` and, if it is local, record its copy in `ledger`.
    pub fn resolve(&self, raw: &str, ledger: &mut AssetLedger) -> Resolution {
        let (target, tail) = split_link_title(raw);
        if is_external(target) {
            return Resolution::Passthrough(PassReason::External);
        }

        let (path_part, suffix) = split_url_suffix(target);
        let decoded = percent_decode_str(path_part).decode_utf8_lossy();
        let Some(source) = self.locate(&decoded) else {
            engine_debug!("Leaving unresolved link {:?} in {:?}", raw, self.source_dir);
            return Resolution::Passthrough(PassReason::Unresolved);
        };

        let relative = relative_segments(self.source_dir, &source);
        if relative.is_empty() {
            return Resolution::Passthrough(PassReason::Unresolved);
        }
        let wanted = format!("{}/{}", self.asset_base, relative.join("/"));
        let (copy, first_copy) = ledger.register(&source, wanted);
        if first_copy {
            engine_debug!(
                "Mapped attachment {:?} -> {}",
                source,
                copy.relative_destination
            );
        }
        Resolution::Local {
            rewritten: format!("{}{suffix}{tail}", copy.url_path()),
            first_copy,
        }
    }

    /// Absolute in-tree path of a decoded relative link, if it names a file.
    fn locate(&self, decoded: &str) -> Option<PathBuf> {
        if decoded.is_empty() {
            return None;
        }
        let resolved = normalize_lexically(&self.source_dir.join(decoded));
        if !resolved.starts_with(self.archive_root) || !resolved.is_file() {
            return None;
        }
        let canonical = resolved.canonicalize().ok()?;
        if !canonical.starts_with(self.archive_root) {
            return None;
        }
        Some(resolved)
    }
}

/// Split `raw` into the link target and any trailing title text.
///
/// `<a b.png> "t"` yields `a b.png` and ` "t"`; `a b.png "t"` yields the same;
/// anything without a quoted title is the target in full.
pub fn split_link_title(raw: &str) -> (&str, &str) {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix('<') {
        if let Some(end) = rest.find('>') {
            return (&rest[..end], &rest[end + 1..]);
        }
    }
    match TRAILING_TITLE.captures(trimmed) {
        Some(caps) => {
            let target = caps.get(1).map_or(trimmed, |m| m.as_str());
            let tail = caps.get(2).map_or("", |m| m.as_str());
            (target, tail)
        }
        None => (trimmed, ""),
    }
}

/// Split off everything from the first `?` or `#`.
pub fn split_url_suffix(target: &str) -> (&str, &str) {
    match target.find(['?', '#']) {
        Some(0) | None => (target, ""),
        Some(index) => target.split_at(index),
    }
}

/// Root-relative, fragment-only or scheme-qualified targets are never local.
pub fn is_external(target: &str) -> bool {
    target.starts_with('/') || target.starts_with('#') || URI_SCHEME.is_match(target)
}

/// Percent-encode each `/`-separated segment independently.
pub fn encode_url_path(path: &str) -> String {
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Resolve `.` and `..` without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Path of `target` relative to `base`, minus any `.`, `..` or empty
/// segments, so the result never climbs out of the directory it is joined onto.
fn relative_segments(base: &Path, target: &Path) -> Vec<String> {
    let Some(relative) = diff_paths(target, base) else {
        return Vec::new();
    };
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .filter(|segment| !segment.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    struct Fixture {
        _temp: tempfile::TempDir,
        root: PathBuf,
        doc_dir: PathBuf,
    }

    fn fixture() -> Fixture {
        let temp = tempfile::TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap().join("export");
        let doc_dir = root.join("Space");
        fs::create_dir_all(doc_dir.join("Page")).unwrap();
        fs::write(doc_dir.join("Page").join("shot 1.png"), b"png").unwrap();
        fs::write(root.join("top.txt"), b"top").unwrap();
        fs::write(temp.path().join("secret.txt"), b"secret").unwrap();
        Fixture {
            _temp: temp,
            root,
            doc_dir,
        }
    }

    #[test]
    fn external_tokens_pass_through() {
        for token in ["https://example.com/a.png", "/abs/path.png", "#anchor", "mailto:x@y.z"] {
            assert!(is_external(token), "{token}");
        }
        assert!(!is_external("Page/shot.png"));
        assert!(!is_external("./shot.png"));
    }

    #[test]
    fn suffix_is_split_at_first_query_or_fragment() {
        assert_eq!(split_url_suffix("a.png?x=1#y"), ("a.png", "?x=1#y"));
        assert_eq!(split_url_suffix("a.png#frag"), ("a.png", "#frag"));
        assert_eq!(split_url_suffix("a.png"), ("a.png", ""));
    }

    #[test]
    fn titles_and_angle_brackets_are_split_off() {
        assert_eq!(split_link_title("a b.png \"Title\""), ("a b.png", " \"Title\""));
        assert_eq!(split_link_title("<a b.png> 'T'"), ("a b.png", " 'T'"));
        assert_eq!(split_link_title(" photo 12.png "), ("photo 12.png", ""));
    }

    #[test]
    fn segments_are_encoded_independently() {
        assert_eq!(encode_url_path("tok/slug/a b/c#d.png"), "tok/slug/a%20b/c%23d.png");
        assert_eq!(encode_url_path("한글.png"), "%ED%95%9C%EA%B8%80.png");
    }

    #[test]
    fn local_link_is_rewritten_with_suffix_and_title() {
        let fx = fixture();
        let resolver = AssetResolver::new(&fx.root, &fx.doc_dir, "tok/my-post");
        let mut ledger = AssetLedger::new();

        let resolution = resolver.resolve("Page/shot%201.png#x \"Cap\"", &mut ledger);
        assert_eq!(
            resolution,
            Resolution::Local {
                rewritten: "/assets/notion/tok/my-post/Page/shot%201.png#x \"Cap\"".to_string(),
                first_copy: true,
            }
        );
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.copies()[0].source, fx.doc_dir.join("Page").join("shot 1.png"));
    }

    #[test]
    fn repeated_references_reuse_the_first_mapping() {
        let fx = fixture();
        let mut ledger = AssetLedger::new();
        let first = AssetResolver::new(&fx.root, &fx.doc_dir, "tok/first");
        let second = AssetResolver::new(&fx.root, &fx.doc_dir, "tok/second");

        let a = first.resolve("Page/shot 1.png", &mut ledger).into_text("");
        let b = second.resolve("./Page/shot%201.png", &mut ledger);
        assert_eq!(
            b,
            Resolution::Local {
                rewritten: a.clone(),
                first_copy: false,
            }
        );
        assert_eq!(a, "/assets/notion/tok/first/Page/shot%201.png");
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn escaping_or_missing_targets_pass_through() {
        let fx = fixture();
        let resolver = AssetResolver::new(&fx.root, &fx.doc_dir, "tok/p");
        let mut ledger = AssetLedger::new();

        for token in ["../../secret.txt", "Page/missing.png", "Page", ""] {
            assert_eq!(
                resolver.resolve(token, &mut ledger),
                Resolution::Passthrough(PassReason::Unresolved),
                "{token}"
            );
        }
        assert!(ledger.is_empty());
    }

    #[test]
    fn parent_links_inside_root_drop_dot_segments() {
        let fx = fixture();
        let resolver = AssetResolver::new(&fx.root, &fx.doc_dir, "tok/p");
        let mut ledger = AssetLedger::new();

        let text = resolver.resolve("../top.txt", &mut ledger).into_text("");
        assert_eq!(text, "/assets/notion/tok/p/top.txt");
    }

    #[test]
    fn distinct_sources_never_share_a_destination() {
        let fx = fixture();
        fs::write(fx.doc_dir.join("top.txt"), b"other").unwrap();
        let resolver = AssetResolver::new(&fx.root, &fx.doc_dir, "tok/p");
        let mut ledger = AssetLedger::new();

        let inner = resolver.resolve("top.txt", &mut ledger).into_text("");
        let outer = resolver.resolve("../top.txt", &mut ledger).into_text("");
        assert_eq!(inner, "/assets/notion/tok/p/top.txt");
        assert_eq!(outer, "/assets/notion/tok/p/top-2.txt");
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn lexical_normalization_collapses_dots() {
        assert_eq!(
            normalize_lexically(Path::new("/a/b/./c/../d")),
            PathBuf::from("/a/b/d")
        );
    }
}
