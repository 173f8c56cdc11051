use std::collections::HashSet;
use std::path::Path;

use chrono::NaiveDate;

/// First numeric suffix tried after the bare candidate is taken.
const FIRST_SUFFIX: u32 = 2;

/// Return `base` if free, else the first free `{base}-2`, `{base}-3`, ...
pub fn first_free(base: &str, mut is_taken: impl FnMut(&str) -> bool) -> String {
    if !is_taken(base) {
        return base.to_string();
    }
    let mut index = FIRST_SUFFIX;
    loop {
        let candidate = format!("{base}-{index}");
        if !is_taken(&candidate) {
            return candidate;
        }
        index += 1;
    }
}

/// Slugs already handed out in this batch.
#[derive(Debug, Default, Clone)]
pub struct SlugRegistry {
    used: HashSet<String>,
}

impl SlugRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `base` or its smallest free numbered variant.
    pub fn claim(&mut self, base: &str) -> String {
        let slug = first_free(base, |candidate| self.used.contains(candidate));
        self.used.insert(slug.clone());
        slug
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.used.contains(slug)
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

/// Date-prefixed post filenames, unique on disk and within the batch.
#[derive(Debug, Default, Clone)]
pub struct PostFilenames {
    allocated: HashSet<String>,
}

impl PostFilenames {
    pub fn new() -> Self {
        Self::default()
    }

    /// `{date}-{slug}.md`, numbered until neither the posts directory nor this
    /// batch already holds the name.
    pub fn allocate(&mut self, posts_dir: &Path, date: NaiveDate, slug: &str) -> String {
        let stem = format!("{}-{slug}", date.format("%Y-%m-%d"));
        let chosen = first_free(&stem, |candidate| {
            let filename = format!("{candidate}.md");
            self.allocated.contains(&filename) || posts_dir.join(&filename).exists()
        });
        let filename = format!("{chosen}.md");
        self.allocated.insert(filename.clone());
        filename
    }
}
