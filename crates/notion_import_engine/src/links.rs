use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::assets::{AssetLedger, AssetResolver};

/// The `[label](` or `![alt](` opener of a markdown link, possibly spanning
/// lines. The target after it is scanned by [`balanced_target_len`].
static MARKDOWN_OPENER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)!?\[[^\]]*\]\(").expect("valid regex"));
/// `src="..."` / `href='...'` with any attribute-name casing.
static HTML_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(\b(?:src|href)=["'])([^"']+)(["'])"#).expect("valid regex")
});

/// Markup a link occurrence was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkContext {
    Markdown,
    HtmlAttribute,
}

/// One link occurrence seen while rewriting a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    /// Target exactly as written in the source text.
    pub raw: String,
    pub context: LinkContext,
    /// Whether the target resolved to a file inside the archive.
    pub local: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenBody {
    pub text: String,
    pub references: Vec<AssetReference>,
}

impl RewrittenBody {
    pub fn local_count(&self) -> usize {
        self.references.iter().filter(|r| r.local).count()
    }
}

/// Rewrite local attachment links in `body`: markdown links first, then HTML
/// attributes over the result.
pub fn rewrite_links(
    body: &str,
    resolver: &AssetResolver<'_>,
    ledger: &mut AssetLedger,
) -> RewrittenBody {
    let mut references = Vec::new();
    let markdown = rewrite_markdown_pass(body, resolver, ledger, &mut references);
    let text = HTML_LINK
        .replace_all(&markdown, |caps: &Captures<'_>| {
            let target = resolve_reference(
                &caps[2],
                LinkContext::HtmlAttribute,
                resolver,
                ledger,
                &mut references,
            );
            format!("{}{target}{}", &caps[1], &caps[3])
        })
        .into_owned();
    RewrittenBody { text, references }
}

fn rewrite_markdown_pass(
    input: &str,
    resolver: &AssetResolver<'_>,
    ledger: &mut AssetLedger,
    references: &mut Vec<AssetReference>,
) -> String {
    let mut out = String::with_capacity(input.len());
    let mut cursor = 0;
    while let Some(opener) = MARKDOWN_OPENER.find_at(input, cursor) {
        let start = opener.end();
        out.push_str(&input[cursor..start]);
        cursor = start;
        let len = match balanced_target_len(&input[start..]) {
            Some(len) if len > 0 => len,
            _ => continue,
        };
        let raw = &input[start..start + len];
        out.push_str(&resolve_reference(
            raw,
            LinkContext::Markdown,
            resolver,
            ledger,
            references,
        ));
        cursor = start + len;
    }
    out.push_str(&input[cursor..]);
    out
}

/// Byte length of a link target up to its first unmatched `)`.
///
/// Balanced pairs such as `image (1).png` stay inside the target. `None` when
/// the target is never closed.
fn balanced_target_len(rest: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (index, ch) in rest.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' if depth == 0 => return Some(index),
            ')' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn resolve_reference(
    raw: &str,
    context: LinkContext,
    resolver: &AssetResolver<'_>,
    ledger: &mut AssetLedger,
    references: &mut Vec<AssetReference>,
) -> String {
    let resolution = resolver.resolve(raw, ledger);
    references.push(AssetReference {
        raw: raw.to_string(),
        context,
        local: resolution.is_local(),
    });
    resolution.into_text(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::path::PathBuf;

    fn setup() -> (tempfile::TempDir, PathBuf) {
        let temp = tempfile::TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("Post")).unwrap();
        fs::write(root.join("Post").join("a.png"), b"a").unwrap();
        fs::write(root.join("Post").join("b c.png"), b"b").unwrap();
        fs::write(root.join("Post").join("image (1).png"), b"i").unwrap();
        (temp, root)
    }

    #[test]
    fn markdown_and_html_links_are_rewritten() {
        let (_temp, root) = setup();
        let resolver = AssetResolver::new(&root, &root, "tok/post");
        let mut ledger = AssetLedger::new();
        let body = "See ![a](Post/a.png) and <img SRC=\"Post/b%20c.png\"> and [w](https://x.io).";

        let out = rewrite_links(body, &resolver, &mut ledger);
        assert_eq!(
            out.text,
            "See ![a](/assets/notion/tok/post/Post/a.png) and \
             <img SRC=\"/assets/notion/tok/post/Post/b%20c.png\"> and [w](https://x.io)."
        );
        assert_eq!(out.local_count(), 2);
        assert_eq!(out.references.len(), 3);
        assert_eq!(out.references[2].context, LinkContext::HtmlAttribute);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn link_label_may_span_lines() {
        let (_temp, root) = setup();
        let resolver = AssetResolver::new(&root, &root, "tok/post");
        let mut ledger = AssetLedger::new();

        let out = rewrite_links("[multi\nline](Post/a.png)", &resolver, &mut ledger);
        assert_eq!(out.text, "[multi\nline](/assets/notion/tok/post/Post/a.png)");
    }

    #[test]
    fn rewriting_twice_resolves_nothing_new() {
        let (_temp, root) = setup();
        let resolver = AssetResolver::new(&root, &root, "tok/post");
        let mut ledger = AssetLedger::new();
        let once = rewrite_links("![a](Post/a.png) <a href='Post/a.png'>x</a>", &resolver, &mut ledger);

        let twice = rewrite_links(&once.text, &resolver, &mut ledger);
        assert_eq!(twice.text, once.text);
        assert_eq!(twice.local_count(), 0);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn unresolved_links_keep_their_bytes() {
        let (_temp, root) = setup();
        let resolver = AssetResolver::new(&root, &root, "tok/post");
        let mut ledger = AssetLedger::new();
        let body = "[gone](Post/none.png) [up](../../etc/passwd) <img src='x y.png'>";

        let out = rewrite_links(body, &resolver, &mut ledger);
        assert_eq!(out.text, body);
        assert!(ledger.is_empty());
    }

    #[test]
    fn targets_keep_balanced_parentheses() {
        let (_temp, root) = setup();
        let resolver = AssetResolver::new(&root, &root, "tok/post");
        let mut ledger = AssetLedger::new();

        let out = rewrite_links(
            "![x](Post/image%20(1).png) and [y](Post/a.png) (aside)",
            &resolver,
            &mut ledger,
        );
        assert_eq!(
            out.text,
            "![x](/assets/notion/tok/post/Post/image%20%281%29.png) and \
             [y](/assets/notion/tok/post/Post/a.png) (aside)"
        );
        assert_eq!(out.local_count(), 2);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn unclosed_target_is_left_alone() {
        let (_temp, root) = setup();
        let resolver = AssetResolver::new(&root, &root, "tok/post");
        let mut ledger = AssetLedger::new();

        let out = rewrite_links("![x](Post/a.png", &resolver, &mut ledger);
        assert_eq!(out.text, "![x](Post/a.png");
        assert!(out.references.is_empty());
    }
}
