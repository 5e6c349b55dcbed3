//! Content discovery and manifest generation.
//!
//! Stage 1 of the sitepress pipeline. Loads the site configuration, walks the
//! `content/` tree and produces a [`Manifest`] that the build stage consumes.
//!
//! ## Directory Structure
//!
//! ```text
//! site/
//! ├── config.yaml                  # Loaded first; errors abort before any content is read
//! ├── content/
//! │   ├── _index.md                # Home section front matter (optional)
//! │   ├── search.md                # Root-level page → /search/
//! │   ├── basics/                  # Section → /basics/
//! │   │   ├── _index.md            # Section title, weight, intro (optional)
//! │   │   ├── variables.md         # Page → /basics/variables/
//! │   │   └── diagram.svg          # Resource, copied verbatim
//! │   └── advanced/
//! │       └── generics.md
//! └── static/                      # Copied verbatim into the output root
//!     └── images/gopher.svg
//! ```
//!
//! ## Validation
//!
//! The scanner fails loudly, naming the offending file, when:
//! - a Markdown file has no front matter, or the block does not parse
//! - `title` is missing
//! - a regular page has no `date`
//! - two documents (or a document and a section) map to the same URL
//!
//! Visibility (drafts, future dates) is *not* decided here: the manifest
//! records every document and [`crate::select`] filters per build.

use crate::config::{self, SiteConfig};
use crate::frontmatter::{self, FrontMatterError};
use crate::naming;
use crate::types::{ContentDocument, Section};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

pub const CONTENT_DIR: &str = "content";
pub const STATIC_DIR: &str = "static";

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("No content directory at {0}")]
    MissingContentDir(PathBuf),
    #[error("{path}: {source}")]
    FrontMatter {
        path: PathBuf,
        source: FrontMatterError,
    },
    #[error("{0}: front matter is missing required field `date`")]
    MissingDate(PathBuf),
    #[error("{first} and {second} both map to URL {url}")]
    DuplicateUrl {
        url: String,
        first: String,
        second: String,
    },
}

/// Manifest output from the scan stage.
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    /// Every directory under `content/`, the root first, sorted by path.
    pub sections: Vec<Section>,
    /// Every regular page, drafts and future-dated ones included, sorted by path.
    pub documents: Vec<ContentDocument>,
    /// Non-Markdown files under `content/`, relative to it.
    pub resources: Vec<String>,
    /// Files under `static/`, relative to it.
    pub static_files: Vec<String>,
    pub config: SiteConfig,
}

impl Manifest {
    pub fn section(&self, path: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.path == path)
    }

    pub fn document(&self, path: &str) -> Option<&ContentDocument> {
        self.documents.iter().find(|d| d.path == path)
    }
}

pub fn scan(root: &Path) -> Result<Manifest, ScanError> {
    // Configuration errors win over content errors
    let config = config::load_config(root)?;

    let content_root = root.join(CONTENT_DIR);
    if !content_root.is_dir() {
        return Err(ScanError::MissingContentDir(content_root));
    }

    let mut sections: BTreeMap<String, Section> = BTreeMap::new();
    sections.insert(
        String::new(),
        Section {
            path: String::new(),
            parent: None,
            url: "/".to_string(),
            title: config.title.clone(),
            front: None,
            body: String::new(),
        },
    );
    let mut documents = Vec::new();
    let mut resources = Vec::new();

    let walker = WalkDir::new(&content_root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        let entry = entry?;
        let rel = relative_key(&content_root, entry.path());

        if entry.file_type().is_dir() {
            let name = entry.file_name().to_string_lossy();
            sections.insert(
                rel.clone(),
                Section {
                    parent: Some(naming::parent_dir(&rel).to_string()),
                    url: naming::section_url(&rel),
                    title: naming::display_title(&name),
                    path: rel,
                    front: None,
                    body: String::new(),
                },
            );
            continue;
        }

        if !is_markdown(entry.path()) {
            log::debug!("resource {rel}");
            resources.push(rel);
            continue;
        }

        let text = fs::read_to_string(entry.path())?;
        let (front, body) = frontmatter::parse(&text).map_err(|source| ScanError::FrontMatter {
            path: entry.path().to_path_buf(),
            source,
        })?;
        let section_path = naming::parent_dir(&rel).to_string();

        if entry.file_name() == naming::SECTION_INDEX {
            // Pre-order walk: the directory entry was registered before its files
            if let Some(section) = sections.get_mut(&section_path) {
                section.title = front.title.clone();
                section.body = body.to_string();
                section.front = Some(front);
            }
            continue;
        }

        if front.date.is_none() {
            return Err(ScanError::MissingDate(entry.path().to_path_buf()));
        }
        let stem = entry
            .path()
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let url = naming::page_url(&section_path, &stem, front.slug.as_deref());
        log::debug!("document {rel} → {url}");
        documents.push(ContentDocument {
            path: rel,
            section: section_path,
            url,
            front,
            body: body.to_string(),
        });
    }

    let sections: Vec<Section> = sections.into_values().collect();
    check_unique_urls(&sections, &documents)?;
    report_unknown_keys(&config, &documents);

    let static_files = collect_files(&root.join(STATIC_DIR))?;

    Ok(Manifest {
        sections,
        documents,
        resources,
        static_files,
        config,
    })
}

/// `/`-separated path of `path` relative to `base`.
pub fn relative_key(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// All regular files under `dir` (relative keys, sorted). Missing `dir` is empty.
pub fn collect_files(dir: &Path) -> Result<Vec<String>, ScanError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(relative_key(dir, entry.path()));
        }
    }
    Ok(files)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("md"))
        .unwrap_or(false)
}

fn check_unique_urls(sections: &[Section], documents: &[ContentDocument]) -> Result<(), ScanError> {
    let mut seen: HashMap<&str, String> = HashMap::new();
    let section_entries = sections
        .iter()
        .map(|s| (s.url.as_str(), format!("{}/", s.path)));
    let document_entries = documents.iter().map(|d| (d.url.as_str(), d.path.clone()));
    for (url, owner) in section_entries.chain(document_entries) {
        if let Some(first) = seen.get(url) {
            return Err(ScanError::DuplicateUrl {
                url: url.to_string(),
                first: first.clone(),
                second: owner,
            });
        }
        seen.insert(url, owner);
    }
    Ok(())
}

fn report_unknown_keys(config: &SiteConfig, documents: &[ContentDocument]) {
    for doc in documents {
        for key in doc.front.extra.keys() {
            if !config.taxonomies.values().any(|plural| plural == key) {
                log::debug!("{}: front matter key `{key}` kept in extra", doc.path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use tempfile::TempDir;

    #[test]
    fn scan_fixture_finds_sections() {
        let tmp = setup_fixtures();
        let manifest = scan(tmp.path()).unwrap();
        let paths: Vec<&str> = manifest.sections.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(paths, vec!["", "advanced", "basics"]);
        assert_eq!(find_section(&manifest, "basics").title, "Основы");
        assert_eq!(find_section(&manifest, "basics").url, "/basics/");
        assert_eq!(find_section(&manifest, "basics").parent.as_deref(), Some(""));
    }

    #[test]
    fn scan_fixture_records_drafts_and_future_pages() {
        let tmp = setup_fixtures();
        let manifest = scan(tmp.path()).unwrap();
        assert!(find_document(&manifest, "basics/pointers.md").front.draft);
        assert!(manifest.document("basics/channels-preview.md").is_some());
    }

    #[test]
    fn scan_maps_urls() {
        let tmp = setup_fixtures();
        let manifest = scan(tmp.path()).unwrap();
        assert_eq!(find_document(&manifest, "basics/variables.md").url, "/basics/variables/");
        assert_eq!(find_document(&manifest, "search.md").url, "/search/");
        assert_eq!(find_document(&manifest, "search.md").section, "");
    }

    #[test]
    fn scan_collects_resources_and_static() {
        let tmp = setup_fixtures();
        let manifest = scan(tmp.path()).unwrap();
        assert_eq!(manifest.resources, vec!["basics/diagram.txt"]);
        assert!(manifest.static_files.contains(&"images/gopher.svg".to_string()));
    }

    #[test]
    fn section_without_index_is_titled_from_dir() {
        let tmp = setup_fixtures();
        fs::create_dir_all(tmp.path().join("content/go-tools")).unwrap();
        write_page(tmp.path(), "go-tools/vet.md", "title: vet\ndate: 2023-01-01", "");
        let manifest = scan(tmp.path()).unwrap();
        let section = find_section(&manifest, "go-tools");
        assert_eq!(section.title, "Go tools");
        assert!(section.front.is_none());
    }

    #[test]
    fn slug_overrides_file_stem() {
        let tmp = setup_fixtures();
        write_page(
            tmp.path(),
            "basics/long-file-name.md",
            "title: Short\ndate: 2023-01-01\nslug: short",
            "",
        );
        let manifest = scan(tmp.path()).unwrap();
        assert_eq!(find_document(&manifest, "basics/long-file-name.md").url, "/basics/short/");
    }

    #[test]
    fn hidden_files_are_skipped() {
        let tmp = setup_fixtures();
        fs::write(tmp.path().join("content/basics/.DS_Store"), "junk").unwrap();
        let manifest = scan(tmp.path()).unwrap();
        assert!(!manifest.resources.iter().any(|r| r.contains(".DS_Store")));
    }

    // =========================================================================
    // Failure modes
    // =========================================================================

    #[test]
    fn missing_front_matter_names_the_file() {
        let tmp = setup_fixtures();
        fs::write(tmp.path().join("content/basics/bare.md"), "# No metadata").unwrap();
        let err = scan(tmp.path()).unwrap_err();
        assert!(matches!(err, ScanError::FrontMatter { .. }));
        assert!(err.to_string().contains("bare.md"));
    }

    #[test]
    fn missing_title_is_error() {
        let tmp = setup_fixtures();
        write_page(tmp.path(), "basics/untitled.md", "date: 2023-01-01", "");
        let err = scan(tmp.path()).unwrap_err();
        assert!(matches!(
            err,
            ScanError::FrontMatter {
                source: FrontMatterError::MissingField("title"),
                ..
            }
        ));
    }

    #[test]
    fn missing_date_is_error_for_pages() {
        let tmp = setup_fixtures();
        write_page(tmp.path(), "basics/undated.md", "title: Undated", "");
        let err = scan(tmp.path()).unwrap_err();
        assert!(matches!(err, ScanError::MissingDate(ref p) if p.ends_with("undated.md")));
    }

    #[test]
    fn section_index_may_omit_date() {
        let tmp = setup_fixtures();
        fs::create_dir_all(tmp.path().join("content/tools")).unwrap();
        write_page(tmp.path(), "tools/_index.md", "title: Инструменты", "");
        let manifest = scan(tmp.path()).unwrap();
        assert_eq!(find_section(&manifest, "tools").title, "Инструменты");
    }

    #[test]
    fn duplicate_urls_are_error() {
        let tmp = setup_fixtures();
        write_page(
            tmp.path(),
            "basics/vars.md",
            "title: Vars\ndate: 2023-01-01\nslug: variables",
            "",
        );
        let err = scan(tmp.path()).unwrap_err();
        assert!(matches!(err, ScanError::DuplicateUrl { ref url, .. } if url == "/basics/variables/"));
    }

    #[test]
    fn page_colliding_with_section_is_error() {
        let tmp = setup_fixtures();
        write_page(tmp.path(), "basics.md", "title: Basics\ndate: 2023-01-01", "");
        assert!(matches!(
            scan(tmp.path()),
            Err(ScanError::DuplicateUrl { .. })
        ));
    }

    #[test]
    fn config_errors_win_over_content_errors() {
        let tmp = setup_fixtures();
        fs::write(tmp.path().join("content/basics/bare.md"), "# No metadata").unwrap();
        fs::write(tmp.path().join("config.yaml"), "title: no base url\n").unwrap();
        assert!(matches!(scan(tmp.path()), Err(ScanError::Config(_))));
    }

    #[test]
    fn missing_content_dir_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.yaml"), "baseURL: https://x.org/\n").unwrap();
        assert!(matches!(
            scan(tmp.path()),
            Err(ScanError::MissingContentDir(_))
        ));
    }

    #[test]
    fn relative_keys_use_forward_slashes() {
        let base = Path::new("/site/content");
        assert_eq!(
            relative_key(base, &base.join("basics").join("x.md")),
            "basics/x.md"
        );
    }
}
