//! Front matter parsing.
//!
//! A content document opens with a metadata block, either YAML fenced by
//! `---` lines or TOML fenced by `+++` lines:
//!
//! ```text
//! ---
//! title: "Переменные"
//! date: 2023-04-01
//! weight: 10
//! tags: [basics, syntax]
//! ---
//! Markdown body…
//! ```
//!
//! Both flavours are normalised to a YAML value and deserialized into
//! [`FrontMatter`]. Known keys get typed fields; everything else (taxonomy
//! term lists included) lands in [`FrontMatter::extra`].

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrontMatterError {
    #[error("document has no front matter (expected a leading --- or +++ block)")]
    Missing,
    #[error("front matter block opened with {0} is never closed")]
    Unterminated(&'static str),
    #[error("invalid YAML front matter: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid TOML front matter: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("front matter must be a mapping")]
    NotAMapping,
    #[error("front matter is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("unrecognised date {0:?}")]
    InvalidDate(String),
}

/// Which fence delimited the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Toml,
}

impl Format {
    fn fence(self) -> &'static str {
        match self {
            Format::Yaml => "---",
            Format::Toml => "+++",
        }
    }
}

/// Typed front matter of one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrontMatter {
    pub title: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub date: Option<DateTime<FixedOffset>>,
    pub weight: Option<i64>,
    pub draft: bool,
    pub slug: Option<String>,
    pub layout: Option<String>,
    /// Hand-written summary; list pages fall back to the body's opening words.
    pub summary: Option<String>,
    /// Keys without a typed field, including taxonomy term lists.
    pub extra: BTreeMap<String, Value>,
}

impl FrontMatter {
    /// Terms listed under a taxonomy's plural key (`tags: [a, b]` or `tags: a`).
    pub fn terms(&self, plural: &str) -> Vec<String> {
        match self.extra.get(plural) {
            Some(Value::Sequence(items)) => items
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .filter(|s| !s.is_empty())
                .collect(),
            Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
            _ => Vec::new(),
        }
    }
}

/// Mirror of [`FrontMatter`] with everything optional, as written by authors.
#[derive(Debug, Deserialize)]
struct RawFrontMatter {
    title: Option<String>,
    description: Option<String>,
    #[serde(default)]
    keywords: Vec<String>,
    date: Option<String>,
    weight: Option<i64>,
    #[serde(default)]
    draft: bool,
    slug: Option<String>,
    layout: Option<String>,
    summary: Option<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

/// Split a document into its front matter block and body.
///
/// The opening fence must be the first line; the closing fence must sit on a
/// line of its own.
pub fn split(content: &str) -> Result<(Format, &str, &str), FrontMatterError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let format = if content.starts_with("---") {
        Format::Yaml
    } else if content.starts_with("+++") {
        Format::Toml
    } else {
        return Err(FrontMatterError::Missing);
    };
    let fence = format.fence();

    let (first_line, rest) = match content.split_once('\n') {
        Some(parts) => parts,
        None => (content, ""),
    };
    if first_line.trim_end() != fence {
        // `----` is a thematic break, not a fence
        return Err(FrontMatterError::Missing);
    }

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == fence {
            return Ok((format, &rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    Err(FrontMatterError::Unterminated(fence))
}

/// Parse a whole document: typed front matter plus the Markdown body.
pub fn parse(content: &str) -> Result<(FrontMatter, &str), FrontMatterError> {
    let (format, block, body) = split(content)?;
    let value = match format {
        Format::Yaml => serde_yaml::from_str::<Value>(block)?,
        Format::Toml => toml_to_yaml(toml::from_str::<toml::Value>(block)?),
    };
    let value = match value {
        Value::Null => Value::Mapping(Default::default()),
        Value::Mapping(_) => value,
        _ => return Err(FrontMatterError::NotAMapping),
    };
    let raw: RawFrontMatter = serde_yaml::from_value(value)?;

    let title = raw
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or(FrontMatterError::MissingField("title"))?;
    let date = raw.date.as_deref().map(parse_date).transpose()?;

    Ok((
        FrontMatter {
            title,
            description: raw.description.filter(|d| !d.trim().is_empty()),
            keywords: raw.keywords,
            date,
            weight: raw.weight,
            draft: raw.draft,
            slug: raw.slug,
            layout: raw.layout,
            summary: raw.summary,
            extra: raw.extra,
        },
        body,
    ))
}

/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD HH:MM:SS` and
/// `YYYY-MM-DD`. Values without an offset are UTC.
pub fn parse_date(raw: &str) -> Result<DateTime<FixedOffset>, FrontMatterError> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }
    if let Ok(day) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(day.and_time(NaiveTime::MIN).and_utc().fixed_offset());
    }
    Err(FrontMatterError::InvalidDate(raw.to_string()))
}

fn toml_to_yaml(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => Value::Number(f.into()),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(d) => Value::String(d.to_string()),
        toml::Value::Array(items) => Value::Sequence(items.into_iter().map(toml_to_yaml).collect()),
        toml::Value::Table(table) => Value::Mapping(
            table
                .into_iter()
                .map(|(k, v)| (Value::String(k), toml_to_yaml(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parse_yaml_front_matter() {
        let doc = "---\ntitle: Переменные\ndate: 2023-04-01\nweight: 10\nkeywords: [go, var]\n---\n# Body\n";
        let (fm, body) = parse(doc).unwrap();
        assert_eq!(fm.title, "Переменные");
        assert_eq!(fm.weight, Some(10));
        assert_eq!(fm.keywords, vec!["go", "var"]);
        assert!(!fm.draft);
        assert_eq!(fm.date.unwrap().year(), 2023);
        assert_eq!(body, "# Body\n");
    }

    #[test]
    fn parse_toml_front_matter() {
        let doc = "+++\ntitle = \"Каналы\"\ndate = 2023-05-02T10:30:00+03:00\ndraft = true\ntags = [\"concurrency\"]\n+++\nbody";
        let (fm, body) = parse(doc).unwrap();
        assert_eq!(fm.title, "Каналы");
        assert!(fm.draft);
        assert_eq!(fm.date.unwrap().hour(), 10);
        assert_eq!(fm.terms("tags"), vec!["concurrency"]);
        assert_eq!(body, "body");
    }

    #[test]
    fn unknown_keys_go_to_extra() {
        let doc = "---\ntitle: X\nShowToc: false\ncover: {image: a.png}\n---\n";
        let (fm, _) = parse(doc).unwrap();
        assert!(fm.extra.contains_key("ShowToc"));
        assert!(fm.extra.contains_key("cover"));
    }

    #[test]
    fn missing_title_is_error() {
        let doc = "---\ndate: 2023-01-01\n---\nbody";
        assert!(matches!(parse(doc), Err(FrontMatterError::MissingField("title"))));
    }

    #[test]
    fn blank_title_is_error() {
        let doc = "---\ntitle: \"  \"\n---\nbody";
        assert!(matches!(parse(doc), Err(FrontMatterError::MissingField("title"))));
    }

    #[test]
    fn no_front_matter_is_error() {
        assert!(matches!(parse("# Just markdown"), Err(FrontMatterError::Missing)));
    }

    #[test]
    fn thematic_break_is_not_a_fence() {
        assert!(matches!(parse("----\ntext"), Err(FrontMatterError::Missing)));
    }

    #[test]
    fn unterminated_block_is_error() {
        let doc = "---\ntitle: X\nbody without close";
        assert!(matches!(parse(doc), Err(FrontMatterError::Unterminated("---"))));
    }

    #[test]
    fn malformed_yaml_is_error() {
        let doc = "---\ntitle: [unclosed\n---\n";
        assert!(matches!(parse(doc), Err(FrontMatterError::Yaml(_))));
    }

    #[test]
    fn scalar_block_is_error() {
        let doc = "---\njust text\n---\n";
        assert!(matches!(parse(doc), Err(FrontMatterError::NotAMapping)));
    }

    #[test]
    fn wrong_type_is_error() {
        let doc = "---\ntitle: X\nweight: heavy\n---\n";
        assert!(matches!(parse(doc), Err(FrontMatterError::Yaml(_))));
    }

    #[test]
    fn bad_date_is_error() {
        let doc = "---\ntitle: X\ndate: yesterday\n---\n";
        assert!(matches!(parse(doc), Err(FrontMatterError::InvalidDate(_))));
    }

    #[test]
    fn closing_fence_with_trailing_spaces() {
        let doc = "---\ntitle: X\n---  \nbody";
        let (fm, body) = parse(doc).unwrap();
        assert_eq!(fm.title, "X");
        assert_eq!(body, "body");
    }

    #[test]
    fn bom_is_ignored() {
        let doc = "\u{feff}---\ntitle: X\n---\n";
        assert_eq!(parse(doc).unwrap().0.title, "X");
    }

    #[test]
    fn body_may_contain_fences() {
        let doc = "---\ntitle: X\n---\nintro\n---\nmore";
        let (_, body) = parse(doc).unwrap();
        assert_eq!(body, "intro\n---\nmore");
    }

    // =========================================================================
    // Dates
    // =========================================================================

    #[test]
    fn date_formats() {
        let rfc = parse_date("2023-04-01T12:00:00+03:00").unwrap();
        assert_eq!(rfc.offset().local_minus_utc(), 3 * 3600);

        let naive_t = parse_date("2023-04-01T12:00:00").unwrap();
        assert_eq!(naive_t.offset().local_minus_utc(), 0);
        assert_eq!(naive_t.hour(), 12);

        let naive_space = parse_date("2023-04-01 08:15:00").unwrap();
        assert_eq!(naive_space.minute(), 15);

        let day = parse_date("2023-04-01").unwrap();
        assert_eq!((day.year(), day.month(), day.day(), day.hour()), (2023, 4, 1, 0));
    }

    // =========================================================================
    // Taxonomy terms
    // =========================================================================

    #[test]
    fn terms_accept_list_or_single_string() {
        let (fm, _) = parse("---\ntitle: X\ntags: [a, \" b \", \"\"]\ncategories: go\n---\n").unwrap();
        assert_eq!(fm.terms("tags"), vec!["a", "b"]);
        assert_eq!(fm.terms("categories"), vec!["go"]);
        assert!(fm.terms("series").is_empty());
    }
}
