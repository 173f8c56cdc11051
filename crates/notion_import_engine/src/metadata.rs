use std::sync::LazyLock;
use std::time::SystemTime;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use regex::Regex;

/// Hour of day given to forced publish dates.
pub const DEFAULT_HOUR: u32 = 9;

/// Only this many leading lines are searched for an embedded date.
pub const DATE_SCAN_LINES: usize = 30;

/// Tag carried by every imported post.
pub const BATCH_TAG: &str = "notion-import";

/// Category used when no rule matches.
pub const DEFAULT_CATEGORY: &str = "writeup";

static DATE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(date|created(?: time)?|published(?: time)?)\s*:").expect("valid regex")
});
static CVE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)cve-\d{4}-\d+").expect("valid regex"));

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M %z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y/%m/%d %H:%M:%S %z",
];
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%B %d, %Y %I:%M %p",
    "%b %d, %Y %I:%M %p",
    "%B %d, %Y %H:%M",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%B %d, %Y", "%b %d, %Y"];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OffsetParseError {
    #[error("timezone offset must look like +0900 or -05:30, got {0:?}")]
    Malformed(String),
    #[error("timezone offset {0:?} is out of range")]
    OutOfRange(String),
}

/// Parse `±HHMM` (or `±HH:MM`) into a fixed offset.
pub fn parse_utc_offset(value: &str) -> Result<FixedOffset, OffsetParseError> {
    let trimmed = value.trim();
    let malformed = || OffsetParseError::Malformed(value.to_string());
    let (sign, rest) = match trimmed.as_bytes().first() {
        Some(b'+') => (1, &trimmed[1..]),
        Some(b'-') => (-1, &trimmed[1..]),
        _ => return Err(malformed()),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(malformed());
    }
    let hours: i32 = digits[..2].parse().map_err(|_| malformed())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| malformed())?;
    if minutes >= 60 {
        return Err(OffsetParseError::OutOfRange(value.to_string()));
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| OffsetParseError::OutOfRange(value.to_string()))
}

/// Which branch of the date fallback chain fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    Override,
    /// Zero-based line index of the matching label line.
    Embedded { line: usize },
    Modified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishDate {
    pub at: DateTime<FixedOffset>,
    pub source: DateSource,
}

impl PublishDate {
    /// `YYYY-MM-DD HH:MM:SS ±HHMM`, as written into front matter.
    pub fn front_matter_value(&self) -> String {
        self.at.format("%Y-%m-%d %H:%M:%S %z").to_string()
    }

    pub fn day(&self) -> NaiveDate {
        self.at.date_naive()
    }
}

/// Pick the publish date: override, then embedded label line, then mtime.
pub fn pick_publish_date(
    forced: Option<NaiveDate>,
    content: &str,
    modified: SystemTime,
    offset: FixedOffset,
) -> PublishDate {
    if let Some(day) = forced {
        return PublishDate {
            at: local_to_offset(day.and_time(default_time_of_day()), offset),
            source: DateSource::Override,
        };
    }
    if let Some(embedded) = embedded_date(content, offset) {
        return embedded;
    }
    PublishDate {
        at: DateTime::<Utc>::from(modified).with_timezone(&offset),
        source: DateSource::Modified,
    }
}

/// First parseable `date:`-style line among the leading lines.
pub fn embedded_date(content: &str, offset: FixedOffset) -> Option<PublishDate> {
    content
        .lines()
        .take(DATE_SCAN_LINES)
        .enumerate()
        .filter(|(_, line)| DATE_LABEL.is_match(line))
        .find_map(|(index, line)| {
            let (_, value) = line.split_once(':')?;
            parse_timestamp(value, offset).map(|at| PublishDate {
                at,
                source: DateSource::Embedded { line: index },
            })
        })
}

/// Parse a loosely formatted timestamp into the configured offset.
///
/// Values that carry their own offset are converted; values without one are
/// taken as wall-clock time in `offset`.
pub fn parse_timestamp(value: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.with_timezone(&offset));
    }
    if let Ok(at) = DateTime::parse_from_rfc2822(value) {
        return Some(at.with_timezone(&offset));
    }
    for format in OFFSET_FORMATS {
        if let Ok(at) = DateTime::parse_from_str(value, format) {
            return Some(at.with_timezone(&offset));
        }
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(local_to_offset(naive, offset));
        }
    }
    for format in DATE_FORMATS {
        if let Ok(day) = NaiveDate::parse_from_str(value, format) {
            return Some(local_to_offset(day.and_time(NaiveTime::MIN), offset));
        }
    }
    None
}

fn default_time_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(DEFAULT_HOUR, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn local_to_offset(naive: NaiveDateTime, offset: FixedOffset) -> DateTime<FixedOffset> {
    // A fixed offset has no gaps or folds, so the mapping is always single.
    offset
        .from_local_datetime(&naive)
        .single()
        .unwrap_or_else(|| offset.from_utc_datetime(&naive))
}

/// One keyword test over the lower-cased title and body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    Contains(&'static str),
    CveId,
}

impl Matcher {
    fn matches(&self, text: &str) -> bool {
        match self {
            Matcher::Contains(needle) => text.contains(needle),
            Matcher::CveId => CVE_ID.is_match(text),
        }
    }
}

/// Assigns `label` when any of `any_of` matches.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub any_of: &'static [Matcher],
    pub label: &'static str,
}

impl Rule {
    pub fn applies(&self, text: &str) -> bool {
        self.any_of.iter().any(|m| m.matches(text))
    }
}

pub const CATEGORY_RULES: &[Rule] = &[
    Rule {
        any_of: &[
            Matcher::CveId,
            Matcher::Contains("1-day"),
            Matcher::Contains("exploit"),
        ],
        label: "1-day",
    },
    Rule {
        any_of: &[Matcher::Contains("ctf")],
        label: "ctf",
    },
];

pub const TAG_RULES: &[Rule] = &[
    Rule {
        any_of: &[Matcher::Contains("exploit")],
        label: "exploit",
    },
    Rule {
        any_of: &[Matcher::CveId],
        label: "cve",
    },
    Rule {
        any_of: &[Matcher::Contains("ctf")],
        label: "ctf",
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub categories: Vec<String>,
    pub tags: Vec<String>,
}

/// Categories and tags for a post from its title and body.
pub fn classify(title: &str, body: &str, batch_tag: &str) -> Classification {
    let text = format!("{title}\n{body}").to_lowercase();

    let mut categories = Vec::new();
    for rule in CATEGORY_RULES.iter().filter(|rule| rule.applies(&text)) {
        push_unique(&mut categories, rule.label);
    }
    if categories.is_empty() {
        categories.push(DEFAULT_CATEGORY.to_string());
    }

    let mut tags = vec![batch_tag.to_string()];
    for rule in TAG_RULES.iter().filter(|rule| rule.applies(&text)) {
        push_unique(&mut tags, rule.label);
    }

    Classification { categories, tags }
}

fn push_unique(list: &mut Vec<String>, label: &str) {
    if !list.iter().any(|existing| existing == label) {
        list.push(label.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn kst() -> FixedOffset {
        parse_utc_offset("+0900").unwrap()
    }

    #[test]
    fn offsets_parse_with_and_without_colon() {
        assert_eq!(parse_utc_offset("+0900").unwrap().local_minus_utc(), 9 * 3600);
        assert_eq!(parse_utc_offset("-05:30").unwrap().local_minus_utc(), -(5 * 3600 + 1800));
        assert!(matches!(parse_utc_offset("0900"), Err(OffsetParseError::Malformed(_))));
        assert!(matches!(parse_utc_offset("+0975"), Err(OffsetParseError::OutOfRange(_))));
    }

    #[test]
    fn forced_date_wins_over_everything() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let picked = pick_publish_date(Some(day), "date: 2020-01-01\n", SystemTime::now(), kst());
        assert_eq!(picked.source, DateSource::Override);
        assert_eq!(picked.front_matter_value(), "2024-03-01 09:00:00 +0900");
    }

    #[test]
    fn embedded_line_is_used_and_bad_lines_are_skipped() {
        let content = "# Title\nDate: not a date\nCreated time: January 5, 2024 3:04 PM\n";
        let picked = pick_publish_date(None, content, SystemTime::UNIX_EPOCH, kst());
        assert_eq!(picked.source, DateSource::Embedded { line: 2 });
        assert_eq!(picked.front_matter_value(), "2024-01-05 15:04:00 +0900");
    }

    #[test]
    fn offset_bearing_values_are_converted() {
        let at = parse_timestamp("2024-01-05T00:00:00Z", kst()).unwrap();
        assert_eq!(at.format("%Y-%m-%d %H:%M:%S %z").to_string(), "2024-01-05 09:00:00 +0900");
    }

    #[test]
    fn labels_after_scan_window_are_ignored() {
        let mut content = "filler\n".repeat(DATE_SCAN_LINES);
        content.push_str("date: 2024-01-01\n");
        let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(86_400);
        let picked = pick_publish_date(None, &content, modified, kst());
        assert_eq!(picked.source, DateSource::Modified);
        assert_eq!(picked.front_matter_value(), "1970-01-02 09:00:00 +0900");
    }

    #[test]
    fn cve_title_is_a_one_day_not_a_writeup() {
        let c = classify("CVE-2023-12345 RCE Writeup", "", BATCH_TAG);
        assert_eq!(c.categories, vec!["1-day"]);
        assert_eq!(c.tags, vec!["notion-import", "cve"]);
    }

    #[test]
    fn ctf_exploit_gets_both_categories_in_rule_order() {
        let c = classify("pwn", "A CTF heap EXPLOIT", BATCH_TAG);
        assert_eq!(c.categories, vec!["1-day", "ctf"]);
        assert_eq!(c.tags, vec!["notion-import", "exploit", "ctf"]);
    }

    #[test]
    fn unmatched_text_defaults_to_writeup() {
        let c = classify("Reading notes", "nothing special", BATCH_TAG);
        assert_eq!(c.categories, vec![DEFAULT_CATEGORY]);
        assert_eq!(c.tags, vec![BATCH_TAG]);
    }
}
