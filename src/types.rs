//! Shared types used across the pipeline stages.
//!
//! These are what the scan stage produces and the build stage consumes. They
//! serialize to JSON for `sitepress scan --json`.

use crate::frontmatter::FrontMatter;
use serde::{Deserialize, Serialize};

/// A regular content page (any `*.md` other than `_index.md`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentDocument {
    /// Path under `content/`, `/`-separated (`basics/variables.md`).
    pub path: String,
    /// Section directory the page belongs to (`basics`, `""` for the root).
    pub section: String,
    /// Site-rooted URL (`/basics/variables/`).
    pub url: String,
    pub front: FrontMatter,
    /// Markdown body after the front matter.
    pub body: String,
}

/// A directory under `content/`, the root included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    /// Directory under `content/` (`""` for the root, `advanced/generics`).
    pub path: String,
    /// Parent section path; `None` only for the root.
    pub parent: Option<String>,
    pub url: String,
    /// From `_index.md` when present, otherwise derived from the directory name.
    pub title: String,
    /// Front matter of `_index.md`, if the section has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub front: Option<FrontMatter>,
    /// Intro Markdown from `_index.md`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
}

impl Section {
    /// Content path of the section's `_index.md` (`basics/_index.md`).
    pub fn index_path(&self) -> String {
        if self.path.is_empty() {
            crate::naming::SECTION_INDEX.to_string()
        } else {
            format!("{}/{}", self.path, crate::naming::SECTION_INDEX)
        }
    }

    /// Listing weight, taken from `_index.md`.
    pub fn weight(&self) -> Option<i64> {
        self.front.as_ref().and_then(|f| f.weight)
    }

    pub fn description(&self) -> Option<&str> {
        self.front.as_ref().and_then(|f| f.description.as_deref())
    }
}

/// One table-of-contents entry (h2–h4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocEntry {
    pub level: u8,
    pub id: String,
    pub title: String,
}
