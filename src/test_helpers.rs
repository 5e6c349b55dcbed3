//! Shared test utilities for the sitepress test suite.
//!
//! Provides fixture setup and lookup helpers that work with scan- and
//! select-phase data structures (`Manifest`, `Section`, `SiteIndex`).
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let manifest = scan(tmp.path()).unwrap();
//!
//! let doc = find_document(&manifest, "basics/variables.md");
//! assert_eq!(doc.url, "/basics/variables/");
//! ```

use chrono::{DateTime, TimeZone, Utc};
use std::path::Path;
use tempfile::TempDir;

use crate::config::BuildOptions;
use crate::scan::Manifest;
use crate::select::SiteIndex;
use crate::types::{ContentDocument, Section};

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/site/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Write `content/<rel>` with the given YAML front matter and body.
pub fn write_page(root: &Path, rel: &str, front: &str, body: &str) {
    let path = root.join("content").join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, format!("---\n{front}\n---\n{body}")).unwrap();
}

/// Fixed reference instant for builds: 2024-06-01T00:00:00Z.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

/// Build options taken from the manifest's config, pinned to [`fixed_now`].
pub fn options_for(manifest: &Manifest) -> BuildOptions {
    BuildOptions::from_config(&manifest.config, fixed_now())
}

// =========================================================================
// Manifest lookups: panic listing the available names on a miss
// =========================================================================

/// Find a document by content path. Panics if not found.
pub fn find_document<'a>(manifest: &'a Manifest, path: &str) -> &'a ContentDocument {
    manifest.document(path).unwrap_or_else(|| {
        let paths: Vec<&str> = manifest.documents.iter().map(|d| d.path.as_str()).collect();
        panic!("document '{path}' not found. Available: {paths:?}")
    })
}

/// Find a section by directory path. Panics if not found.
pub fn find_section<'a>(manifest: &'a Manifest, path: &str) -> &'a Section {
    manifest.section(path).unwrap_or_else(|| {
        let paths: Vec<&str> = manifest.sections.iter().map(|s| s.path.as_str()).collect();
        panic!("section '{path}' not found. Available: {paths:?}")
    })
}

// =========================================================================
// Listing helpers
// =========================================================================

/// Entry titles of a section listing, in display order.
pub fn listing_titles<'a>(index: &SiteIndex<'a>, section: &str) -> Vec<&'a str> {
    index.listing(section).iter().map(|e| e.title()).collect()
}
