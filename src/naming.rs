//! Content-path to URL mapping.
//!
//! Every document's public address is derived from its location under
//! `content/`. The mapping is purely lexical and lives here so that scan,
//! reference resolution and resource copying all agree on it:
//!
//! - `basics/variables.md` → `/basics/variables/` (file `basics/variables/index.html`)
//! - `basics/_index.md` → `/basics/`
//! - `search.md` → `/search/`
//! - `basics/img/gopher.png` → `basics/img/gopher.png`
//!
//! ## Display Titles
//!
//! Sections without an `_index.md` are titled from their directory name:
//! dashes and underscores become spaces and the first letter is capitalised.
//! - `go-basics/` → "Go basics"
//! - `parallelism/` → "Parallelism"

use thiserror::Error;

/// File name that carries a section's own front matter and intro.
pub const SECTION_INDEX: &str = "_index.md";

/// Reduce a path segment or taxonomy term to its URL form.
///
/// Lowercases (Unicode aware), turns whitespace and underscores into `-`,
/// drops everything that is not alphanumeric, `-` or `.`, and collapses
/// repeated dashes.
pub fn slugify(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars().flat_map(char::to_lowercase) {
        let c = if c.is_whitespace() || c == '_' { '-' } else { c };
        if c == '-' {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
        } else if c.is_alphanumeric() || c == '.' {
            out.push(c);
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Title for a section directory that has no `_index.md`.
pub fn display_title(dir_name: &str) -> String {
    let spaced: String = dir_name
        .chars()
        .map(|c| if c == '-' || c == '_' { ' ' } else { c })
        .collect();
    let trimmed = spaced.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// URL of a section directory, `""` being the home section.
///
/// `"advanced/Generics"` → `"/advanced/generics/"`.
pub fn section_url(section: &str) -> String {
    let mut url = String::from("/");
    for segment in section.split('/').filter(|s| !s.is_empty()) {
        url.push_str(&slugify(segment));
        url.push('/');
    }
    url
}

/// URL of a regular page.
///
/// `slug` (from front matter) replaces the file stem as the last segment.
pub fn page_url(section: &str, file_stem: &str, slug: Option<&str>) -> String {
    let leaf = match slug {
        Some(s) if !s.trim().is_empty() => slugify(s),
        _ => slugify(file_stem),
    };
    format!("{}{}/", section_url(section), leaf)
}

/// Output file for a page-like URL: `/basics/` → `basics/index.html`.
pub fn index_file(url: &str) -> String {
    let trimmed = url.trim_start_matches('/');
    format!("{trimmed}index.html")
}

/// Output path of a non-Markdown file under `content/`.
///
/// Directory segments are slugified so resources sit next to the page URLs
/// of their section; the file name itself is kept as written.
pub fn resource_path(rel: &str) -> String {
    match rel.rsplit_once('/') {
        Some((dir, file)) => format!("{}{}", section_url(dir).trim_start_matches('/'), file),
        None => rel.to_string(),
    }
}

/// Parent section of a content-relative path (`"basics/x.md"` → `"basics"`).
pub fn parent_dir(rel: &str) -> &str {
    rel.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Resolve `.` and `..` in a `/`-separated relative path.
///
/// Returns `None` when `..` climbs above the root.
pub fn normalize_path(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0:?} is not an absolute http(s) URL")]
pub struct InvalidBaseUrl(pub String);

/// The absolute URL a site is served from, always ending in `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(String);

impl BaseUrl {
    pub fn parse(raw: &str) -> Result<Self, InvalidBaseUrl> {
        let trimmed = raw.trim();
        let rest = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .ok_or_else(|| InvalidBaseUrl(raw.to_string()))?;
        let host = rest.split('/').next().unwrap_or_default();
        if host.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(InvalidBaseUrl(raw.to_string()));
        }
        let mut url = trimmed.to_string();
        if !url.ends_with('/') {
            url.push('/');
        }
        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Absolute form of a site-rooted path: `/basics/` → `https://host/basics/`.
    ///
    /// Already-absolute URLs pass through unchanged.
    pub fn abs(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}{}", self.0, path.trim_start_matches('/'))
    }
}

impl std::fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
