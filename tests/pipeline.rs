//! End-to-end tests of the build and deploy pipeline.
//!
//! Each test copies `fixtures/site/` into a temp directory, runs the public
//! library API the way the CLI does (scan → build → write → index → sync) and
//! checks the observable result. Deploys go to the in-memory store.
//!
//! Run with: cargo test --test pipeline

use chrono::{DateTime, TimeZone, Utc};
use sitepress::artifact::Artifact;
use sitepress::config::{BuildOptions, ConfigError, SyncMode};
use sitepress::deploy::memory::MemoryStore;
use sitepress::deploy::state::STATE_KEY;
use sitepress::deploy::{self, ArtifactIndex, DeployError, SyncOptions};
use sitepress::generate::{self, GenerateError};
use sitepress::scan::{self, ScanError};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use walkdir::WalkDir;

// ============================================================================
// Helpers
// ============================================================================

fn site() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    for entry in WalkDir::new(&fixtures) {
        let entry = entry.unwrap();
        let dest = tmp.path().join(entry.path().strip_prefix(&fixtures).unwrap());
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).unwrap();
        } else {
            fs::copy(entry.path(), &dest).unwrap();
        }
    }
    tmp
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

fn build_with(root: &Path, tweak: impl FnOnce(&mut BuildOptions)) -> Result<Artifact, GenerateError> {
    let manifest = scan::scan(root).unwrap();
    let mut options = BuildOptions::from_config(&manifest.config, now());
    tweak(&mut options);
    generate::build(&manifest, &options, root).map(|out| out.artifact)
}

fn build(root: &Path) -> Artifact {
    build_with(root, |_| {}).unwrap()
}

fn set_front_line(root: &Path, rel: &str, from: &str, to: &str) {
    let path = root.join("content").join(rel);
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains(from), "{rel} has no line '{from}'");
    fs::write(&path, text.replace(from, to)).unwrap();
}

fn sync_options() -> SyncOptions {
    SyncOptions {
        mode: SyncMode::Mirror,
        parallelism: 4,
        retries: 1,
        retry_delay: Duration::from_millis(1),
        dry_run: false,
    }
}

/// Build, write to `<root>/public` and index the written tree.
fn publish_dir(root: &Path) -> ArtifactIndex {
    let out = root.join("public");
    build(root).write_to(&out, root).unwrap();
    ArtifactIndex::from_dir(&out).unwrap()
}

fn changed_paths(a: &Artifact, b: &Artifact) -> Vec<String> {
    let mut paths: Vec<String> = a
        .paths()
        .chain(b.paths())
        .filter(|p| a.get(p) != b.get(p))
        .map(str::to_string)
        .collect();
    paths.sort();
    paths.dedup();
    paths
}

fn any_file_contains(artifact: &Artifact, needle: &str) -> Vec<String> {
    artifact
        .iter()
        .filter(|(_, bytes)| String::from_utf8_lossy(bytes).contains(needle))
        .map(|(path, _)| path.to_string())
        .collect()
}

// ============================================================================
// Visibility
// ============================================================================

#[test]
fn draft_appears_nowhere_in_production_build() {
    let tmp = site();
    let artifact = build(tmp.path());
    assert!(!artifact.contains("basics/pointers/index.html"));
    assert_eq!(any_file_contains(&artifact, "Указатели"), Vec::<String>::new());
    assert_eq!(any_file_contains(&artifact, "basics/pointers"), Vec::<String>::new());
}

#[test]
fn future_page_needs_build_future() {
    let tmp = site();
    let artifact = build(tmp.path());
    assert!(!artifact.contains("basics/channels-preview/index.html"));
    assert!(any_file_contains(&artifact, "channels-preview").is_empty());

    let future = build_with(tmp.path(), |o| o.build_future = true).unwrap();
    assert!(future.contains("basics/channels-preview/index.html"));
    assert!(future.text("sitemap.xml").unwrap().contains("basics/channels-preview/"));
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn draft_with_weight_54_slots_between_30_and_56() {
    let tmp = site();
    let artifact = build_with(tmp.path(), |o| o.build_drafts = true).unwrap();
    let functions = artifact.text("basics/functions/index.html").unwrap();
    let nav = &functions[functions.find("class=\"paginav\"").unwrap()..];
    assert!(nav.contains("/basics/pointers/"));
    assert!(!nav.contains("/basics/constants/"));

    let pointers = artifact.text("basics/pointers/index.html").unwrap();
    let nav = &pointers[pointers.find("class=\"paginav\"").unwrap()..];
    let prev = nav.find("/basics/constants/").unwrap();
    let next = nav.find("/basics/functions/").unwrap();
    assert!(prev < next);
}

#[test]
fn weight_change_only_touches_its_section() {
    let tmp = site();
    let before = build(tmp.path());
    set_front_line(tmp.path(), "basics/constants.md", "weight: 30", "weight: 5");
    let after = build(tmp.path());

    let changed = changed_paths(&before, &after);
    assert!(!changed.is_empty());
    for path in &changed {
        assert!(path.starts_with("basics/"), "{path} changed outside the section");
    }

    let listing = after.text("basics/index.html").unwrap();
    let constants = listing.find("Константы").unwrap();
    let hello = listing.find("Hello, World").unwrap();
    assert!(constants < hello);
}

// ============================================================================
// Determinism and base URL
// ============================================================================

#[test]
fn rebuilds_are_byte_identical_on_disk() {
    let tmp = site();
    let first = publish_dir(tmp.path());
    let second = publish_dir(tmp.path());
    let hashes = |index: &ArtifactIndex| -> Vec<(String, String)> {
        index.objects.iter().map(|o| (o.key.clone(), o.hash.clone())).collect()
    };
    assert_eq!(hashes(&first), hashes(&second));
}

#[test]
fn base_url_override_rewrites_every_link() {
    let tmp = site();
    let artifact = build_with(tmp.path(), |o| o.base_url = Some("https://staging.gopedia.dev/".into())).unwrap();
    assert_eq!(any_file_contains(&artifact, "https://gopedia.ru"), Vec::<String>::new());
    assert!(artifact.text("sitemap.xml").unwrap().contains("https://staging.gopedia.dev/basics/"));
    assert!(artifact.text("index.xml").unwrap().contains("https://staging.gopedia.dev/"));
    assert!(artifact.text("robots.txt").unwrap().contains("https://staging.gopedia.dev/sitemap.xml"));
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn broken_reference_fails_before_writing() {
    let tmp = site();
    let out = tmp.path().join("public");
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("index.html"), "previous build").unwrap();
    set_front_line(tmp.path(), "basics/constants.md", "`const`.", "`const`. See [missing](nowhere.md).");

    let err = build_with(tmp.path(), |_| {}).unwrap_err();
    assert!(err.to_string().contains("nowhere.md"), "{err}");
    assert_eq!(fs::read_to_string(out.join("index.html")).unwrap(), "previous build");
}

#[test]
fn dead_asset_links_fail_the_build() {
    let tmp = site();
    let loops = tmp.path().join("content/basics/loops.md");
    let text = fs::read_to_string(&loops).unwrap();

    fs::write(&loops, format!("{text}\n[diagram](diagram.txt)\n")).unwrap();
    let artifact = build(tmp.path());
    assert!(artifact.contains("basics/diagram.txt"));
    assert!(
        artifact
            .text("basics/loops/index.html")
            .unwrap()
            .contains(r#"href="https://gopedia.ru/basics/diagram.txt""#)
    );

    for dead in ["[gone](missing.png)", "[abs](/images/nope.svg)"] {
        fs::write(&loops, format!("{text}\n{dead}\n")).unwrap();
        let err = build_with(tmp.path(), |_| {}).unwrap_err();
        assert!(err.to_string().contains("content/basics/loops.md"), "{err}");
    }
}

#[test]
fn draft_section_index_publishes_nothing_of_its_own() {
    let tmp = site();
    fs::write(
        tmp.path().join("content/advanced/_index.md"),
        "---\ntitle: Скрытый раздел\ndescription: Скрытое описание\ndraft: true\n---\nВступление\n",
    )
    .unwrap();
    let artifact = build(tmp.path());
    assert!(!artifact.contains("advanced/index.html"));
    assert!(!artifact.contains("advanced/index.xml"));
    assert!(artifact.contains("advanced/generics/index.html"));
    for needle in ["Скрытый раздел", "Скрытое описание", "Вступление"] {
        assert_eq!(any_file_contains(&artifact, needle), Vec::<String>::new());
    }
}

#[test]
fn invalid_config_fails_before_content() {
    let tmp = site();
    fs::write(tmp.path().join("config.yaml"), "baseURL: \"\"\ntitle: x\n").unwrap();
    fs::write(tmp.path().join("content/basics/broken.md"), "no front matter").unwrap();
    let err = scan::scan(tmp.path()).unwrap_err();
    assert!(matches!(err, ScanError::Config(ConfigError::Validation(_))), "{err:?}");
}

// ============================================================================
// Deploy
// ============================================================================

#[test]
fn second_sync_of_unchanged_build_writes_nothing() {
    let tmp = site();
    let store = MemoryStore::new();
    let first = deploy::sync(&publish_dir(tmp.path()), &store, &sync_options()).unwrap();
    assert!(first.uploaded > 10);
    assert!(store.object(STATE_KEY).is_some());

    // A fresh build of the same content, as a CI run would produce
    store.clear_writes();
    let second = deploy::sync(&publish_dir(tmp.path()), &store, &sync_options()).unwrap();
    assert_eq!(store.write_count(), 0);
    assert_eq!(second.uploaded, 0);
    assert!(second.plan.is_noop());
}

#[test]
fn content_edit_uploads_only_affected_files() {
    let tmp = site();
    let store = MemoryStore::new();
    deploy::sync(&publish_dir(tmp.path()), &store, &sync_options()).unwrap();

    set_front_line(tmp.path(), "advanced/reflection.md", "во время выполнения", "в рантайме");
    store.clear_writes();
    let report = deploy::sync(&publish_dir(tmp.path()), &store, &sync_options()).unwrap();
    assert!(report.plan.uploads.contains(&"advanced/reflection/index.html".to_string()));
    assert!(!report.plan.uploads.contains(&"basics/variables/index.html".to_string()));
    assert!(report.plan.deletes.is_empty());
}

#[test]
fn mirror_sync_removes_unpublished_page() {
    let tmp = site();
    let store = MemoryStore::new();
    deploy::sync(&publish_dir(tmp.path()), &store, &sync_options()).unwrap();
    assert!(store.object("advanced/reflection/index.html").is_some());

    set_front_line(tmp.path(), "advanced/reflection.md", "date: 2023-03-05", "date: 2023-03-05\ndraft: true");
    let report = deploy::sync(&publish_dir(tmp.path()), &store, &sync_options()).unwrap();
    assert!(report.plan.deletes.contains(&"advanced/reflection/index.html".to_string()));
    assert!(store.object("advanced/reflection/index.html").is_none());
}

#[test]
fn failed_upload_leaves_bucket_contents_in_place() {
    let tmp = site();
    let store = MemoryStore::with_objects([("legacy/index.html", "old site")]);
    store.fail_puts_for("index.html", 100, 403);

    let err = deploy::sync(&publish_dir(tmp.path()), &store, &sync_options()).unwrap_err();
    assert!(matches!(err, DeployError::Upload { .. }));
    assert_eq!(store.object("legacy/index.html"), Some(b"old site".to_vec()));
    assert!(store.object(STATE_KEY).is_none());
}

#[test]
fn additive_sync_keeps_foreign_objects() {
    let tmp = site();
    let store = MemoryStore::with_objects([("legacy/index.html", "old site")]);
    let options = SyncOptions {
        mode: SyncMode::Additive,
        ..sync_options()
    };
    let report = deploy::sync(&publish_dir(tmp.path()), &store, &options).unwrap();
    assert_eq!(report.plan.kept, vec!["legacy/index.html"]);
    assert!(store.object("legacy/index.html").is_some());
}
