use std::sync::LazyLock;

use regex::Regex;

static HEX_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+[0-9a-f]{32}$").expect("valid regex"));
static UUID_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("valid regex")
});
static HEX_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)([0-9a-f]{32})$").expect("valid regex"));
static UUID_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})$")
        .expect("valid regex")
});

/// Slug used when neither the title nor an identifier yields anything.
pub const FALLBACK_SLUG: &str = "post";

const ID_SLUG_LEN: usize = 8;

/// Which branch of the slug fallback chain produced the slug basis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlugBasis {
    /// Derived from the transliterated title.
    Title(String),
    /// Title produced nothing usable; first characters of the legacy id.
    Identifier(String),
    /// Neither title nor id were usable.
    Fallback,
}

impl SlugBasis {
    pub fn as_str(&self) -> &str {
        match self {
            SlugBasis::Title(slug) | SlugBasis::Identifier(slug) => slug,
            SlugBasis::Fallback => FALLBACK_SLUG,
        }
    }
}

/// Everything recovered from a raw document filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentIdentity {
    pub title: String,
    pub legacy_id: Option<String>,
    pub slug_basis: SlugBasis,
}

/// Normalize a filename stem (no extension) into title, id and slug basis.
pub fn identify(raw_stem: &str) -> DocumentIdentity {
    let title = normalize_title(raw_stem);
    let legacy_id = extract_legacy_id(raw_stem);
    let slug_basis = match slugify(&title) {
        Some(slug) => SlugBasis::Title(slug),
        None => match &legacy_id {
            Some(id) => SlugBasis::Identifier(id.chars().take(ID_SLUG_LEN).collect()),
            None => SlugBasis::Fallback,
        },
    };
    DocumentIdentity {
        title,
        legacy_id,
        slug_basis,
    }
}

/// Remove a trailing hex id and then a trailing UUID, trimming the rest.
pub fn strip_legacy_suffix(raw: &str) -> String {
    let without_hex = HEX_SUFFIX.replace(raw, "");
    let without_uuid = UUID_SUFFIX.replace(&without_hex, "");
    without_uuid.trim().to_string()
}

/// The display title; the raw name is kept when stripping would empty it.
pub fn normalize_title(raw: &str) -> String {
    let stripped = strip_legacy_suffix(raw);
    if stripped.is_empty() {
        raw.to_string()
    } else {
        stripped
    }
}

/// Trailing page id, lower-cased and without hyphens.
///
/// A bare 32-hex tail wins over a hyphenated UUID tail. No whitespace is
/// required before the id, so a name made of the id alone still yields it.
pub fn extract_legacy_id(raw: &str) -> Option<String> {
    if let Some(caps) = HEX_ID.captures(raw) {
        return Some(caps[1].to_ascii_lowercase());
    }
    UUID_ID
        .captures(raw)
        .map(|caps| caps[1].replace('-', "").to_ascii_lowercase())
}

/// ASCII slug of a title, or `None` when nothing survives.
pub fn slugify(title: &str) -> Option<String> {
    let ascii = deunicode::deunicode_with_tofu(title, "").to_ascii_lowercase();
    let mut slug = String::with_capacity(ascii.len());
    let mut pending_hyphen = false;
    for ch in ascii.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch);
        } else {
            pending_hyphen = true;
        }
    }
    if slug.is_empty() {
        None
    } else {
        Some(slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const HEX: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn strips_hex_suffix_and_keeps_id() {
        let identity = identify(&format!("Heap Exploitation Notes {HEX}"));
        assert_eq!(identity.title, "Heap Exploitation Notes");
        assert_eq!(identity.legacy_id.as_deref(), Some(HEX));
        assert_eq!(
            identity.slug_basis,
            SlugBasis::Title("heap-exploitation-notes".to_string())
        );
    }

    #[test]
    fn strips_uppercase_uuid_suffix_and_removes_hyphens() {
        let raw = "Kernel Bug 0123ABCD-4567-89AB-CDEF-0123456789AB";
        let identity = identify(raw);
        assert_eq!(identity.title, "Kernel Bug");
        assert_eq!(
            identity.legacy_id.as_deref(),
            Some("0123abcd456789abcdef0123456789ab")
        );
    }

    #[test]
    fn name_without_suffix_is_untouched() {
        let identity = identify("Plain Title");
        assert_eq!(identity.title, "Plain Title");
        assert_eq!(identity.legacy_id, None);
    }

    #[test]
    fn bare_id_name_keeps_raw_title() {
        // Nothing precedes the id, so there is no whitespace to strip.
        let identity = identify(HEX);
        assert_eq!(identity.title, HEX);
        assert_eq!(identity.legacy_id.as_deref(), Some(HEX));
    }

    #[test]
    fn slug_transliterates_and_collapses_separators() {
        assert_eq!(slugify("Café  --  Crème!").as_deref(), Some("cafe-creme"));
        assert_eq!(slugify("  ..Edge.. ").as_deref(), Some("edge"));
        assert_eq!(slugify("CVE-2023-12345 RCE").as_deref(), Some("cve-2023-12345-rce"));
    }

    #[test]
    fn slug_falls_back_to_identifier_prefix() {
        // Private-use characters have no transliteration.
        let identity = identify(&format!("\u{E000}\u{E001} {HEX}"));
        assert_eq!(identity.slug_basis, SlugBasis::Identifier("01234567".to_string()));
        assert_eq!(identity.slug_basis.as_str(), "01234567");
    }

    #[test]
    fn slug_falls_back_to_literal_without_identifier() {
        let identity = identify("???");
        assert_eq!(identity.slug_basis, SlugBasis::Fallback);
        assert_eq!(identity.slug_basis.as_str(), FALLBACK_SLUG);
    }
}
