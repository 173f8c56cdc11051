use serde::Serialize;

/// Layout every imported post renders with.
pub const DEFAULT_LAYOUT: &str = "post";

/// Post front matter; field order is the serialized key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrontMatter {
    pub layout: String,
    pub title: String,
    pub date: String,
    pub author: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum FrontMatterError {
    #[error("failed to serialize front matter: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

/// `---`-framed YAML front matter, a blank line, then the trimmed body with a
/// single trailing newline.
pub fn build_post_document(front: &FrontMatter, body: &str) -> Result<String, FrontMatterError> {
    let yaml = serde_yaml::to_string(front)?;
    let yaml = yaml.strip_prefix("---\n").unwrap_or(&yaml);
    Ok(format!(
        "---\n{yaml}---\n\n{body}\n",
        yaml = yaml,
        body = body.trim_end()
    ))
}
