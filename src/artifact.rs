//! The build artifact.
//!
//! A build produces an in-memory map from output path (`/`-separated,
//! relative to the output root) to file bytes. Keeping it in memory until the
//! very end means a failed build never leaves a half-written output
//! directory behind, and makes two builds trivially comparable.
//!
//! [`Artifact::write_to`] replaces the output directory wholesale. It refuses
//! to touch a directory that would take the site's own sources with it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::scan::{CONTENT_DIR, STATIC_DIR};

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("refusing to write output to {output}: {reason}")]
    UnsafeOutput { output: PathBuf, reason: &'static str },
}

/// Output path → bytes, ordered by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artifact {
    files: BTreeMap<String, Vec<u8>>,
}

impl Artifact {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, returning the bytes it replaced, if any.
    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Option<Vec<u8>> {
        self.files.insert(path.into(), bytes.into())
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    /// File contents as UTF-8, for text outputs.
    pub fn text(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn total_bytes(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    /// Apply `f` to every file selected by path.
    pub fn transform(&mut self, mut f: impl FnMut(&str, Vec<u8>) -> Vec<u8>) {
        let files = std::mem::take(&mut self.files);
        self.files = files
            .into_iter()
            .map(|(path, bytes)| {
                let out = f(&path, bytes);
                (path, out)
            })
            .collect();
    }

    /// Replace `output` with exactly the artifact's files.
    ///
    /// `site_root` is the source tree the artifact was built from; the
    /// output may not be that root, contain it, or sit inside its `content/`
    /// or `static/` directories.
    pub fn write_to(&self, output: &Path, site_root: &Path) -> Result<(), ArtifactError> {
        check_output_location(output, site_root)?;

        if output.exists() {
            fs::remove_dir_all(output)?;
        }
        fs::create_dir_all(output)?;

        for (rel, bytes) in &self.files {
            let path = output.join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, bytes)?;
        }
        log::info!("wrote {} files to {}", self.files.len(), output.display());
        Ok(())
    }
}

/// Canonical form of `path`, which may not exist yet: the deepest existing
/// ancestor is canonicalized and the missing tail appended.
fn resolve(path: &Path) -> Result<PathBuf, std::io::Error> {
    let abs = std::path::absolute(path)?;
    let mut existing = abs.as_path();
    let mut tail = Vec::new();
    loop {
        if let Ok(mut canonical) = existing.canonicalize() {
            canonical.extend(tail.iter().rev());
            return Ok(canonical);
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(abs),
        }
    }
}

fn check_output_location(output: &Path, site_root: &Path) -> Result<(), ArtifactError> {
    let out = resolve(output)?;
    let root = resolve(site_root)?;
    let unsafe_output = |reason| ArtifactError::UnsafeOutput {
        output: output.to_path_buf(),
        reason,
    };

    if out == root {
        return Err(unsafe_output("it is the site root"));
    }
    if root.starts_with(&out) {
        return Err(unsafe_output("it contains the site root"));
    }
    for dir in [CONTENT_DIR, STATIC_DIR] {
        if out.starts_with(root.join(dir)) {
            return Err(unsafe_output("it lies inside the site sources"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Artifact {
        let mut artifact = Artifact::new();
        artifact.insert("index.html", "<p>home</p>");
        artifact.insert("basics/index.html", "<p>basics</p>");
        artifact
    }

    #[test]
    fn insert_reports_replaced_bytes() {
        let mut artifact = sample();
        let old = artifact.insert("index.html", "<p>new</p>");
        assert_eq!(old.as_deref(), Some("<p>home</p>".as_bytes()));
        assert_eq!(artifact.len(), 2);
    }

    #[test]
    fn paths_are_sorted() {
        let artifact = sample();
        let paths: Vec<&str> = artifact.paths().collect();
        assert_eq!(paths, vec!["basics/index.html", "index.html"]);
    }

    #[test]
    fn transform_rewrites_in_place() {
        let mut artifact = sample();
        artifact.transform(|path, bytes| if path == "index.html" { b"x".to_vec() } else { bytes });
        assert_eq!(artifact.text("index.html"), Some("x"));
        assert_eq!(artifact.text("basics/index.html"), Some("<p>basics</p>"));
    }

    #[test]
    fn write_replaces_stale_output() {
        let tmp = TempDir::new().unwrap();
        let site = tmp.path().join("site");
        fs::create_dir_all(&site).unwrap();
        let out = tmp.path().join("public");
        fs::create_dir_all(out.join("old")).unwrap();
        fs::write(out.join("old/stale.html"), "stale").unwrap();

        sample().write_to(&out, &site).unwrap();

        assert!(!out.join("old").exists());
        assert_eq!(fs::read_to_string(out.join("basics/index.html")).unwrap(), "<p>basics</p>");
    }

    #[test]
    fn write_into_site_root_is_refused() {
        let tmp = TempDir::new().unwrap();
        let err = sample().write_to(tmp.path(), tmp.path()).unwrap_err();
        assert!(matches!(err, ArtifactError::UnsafeOutput { .. }));
    }

    #[test]
    fn write_to_parent_of_site_is_refused() {
        let tmp = TempDir::new().unwrap();
        let site = tmp.path().join("site");
        fs::create_dir_all(&site).unwrap();
        assert!(sample().write_to(tmp.path(), &site).is_err());
        assert!(site.exists());
    }

    #[test]
    fn write_inside_content_is_refused() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("content")).unwrap();
        let out = tmp.path().join("content/public");
        assert!(sample().write_to(&out, tmp.path()).is_err());
        assert!(!out.exists());
    }

    #[test]
    fn write_inside_site_root_is_allowed() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("public");
        sample().write_to(&out, tmp.path()).unwrap();
        assert!(out.join("index.html").exists());
    }
}
