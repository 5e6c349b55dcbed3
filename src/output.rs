//! CLI output formatting for all pipeline stages.
//!
//! # Information-First Display
//!
//! Output is **information-centric, not file-centric**. Every entity (section,
//! page) leads with its positional index and title; content paths follow as
//! indented `Source:` lines. The scan listing reads as a table of contents
//! while still pointing back at the files.
//!
//! # Output Format
//!
//! ## Scan
//!
//! ```text
//! Content
//! 001 Gopedia
//!     Source: content/_index.md
//!     001 Основы
//!         Source: content/basics/_index.md
//!         001 Hello, World (10.01.2023)
//!             Source: content/basics/hello-world.md
//!         005 Указатели (15.01.2023) [draft]
//!             Source: content/basics/pointers.md
//!
//! Resources
//!     basics/diagram.txt
//!
//! Static
//!     images/gopher.svg
//! ```
//!
//! ## Build
//!
//! ```text
//! Base URL: https://gopedia.ru/
//! Rendered 8 pages, 6 list pages, 4 taxonomy pages, 3 feeds
//! Copied 2 files
//! Excluded (draft)
//!     basics/pointers.md
//! Artifact: 31 files, 120 KiB
//! ```
//!
//! ## Deploy
//!
//! ```text
//! Plan: 3 upload, 28 unchanged, 1 delete
//!     upload basics/variables/index.html
//!     delete old/index.html
//! Uploaded 3 objects (14 KiB), deleted 1, state updated
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::deploy::{SyncPlan, SyncReport};
use crate::generate::BuildReport;
use crate::scan::{CONTENT_DIR, Manifest};
use crate::select::listing_key;
use crate::types::{ContentDocument, Section};

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn format_bytes(bytes: u64) -> String {
    match bytes {
        b if b >= 1024 * 1024 => format!("{:.1} MiB", b as f64 / (1024.0 * 1024.0)),
        b if b >= 1024 => format!("{} KiB", b / 1024),
        b => format!("{b} B"),
    }
}

/// A section or a page, for the scan tree.
enum Node<'a> {
    Section(&'a Section),
    Page(&'a ContentDocument),
}

impl Node<'_> {
    fn key(&self) -> (bool, i64, &str) {
        match self {
            Node::Section(s) => listing_key(s.weight(), &s.path),
            Node::Page(d) => listing_key(d.front.weight, &d.path),
        }
    }
}

// ============================================================================
// Stage 1: Scan output
// ============================================================================

/// Format the scanned content tree.
///
/// Every document is shown, drafts and future pages included, with flags;
/// visibility is a per-build decision and the scan does not make it.
pub fn format_scan_output(manifest: &Manifest) -> Vec<String> {
    let mut lines = vec!["Content".to_string()];
    if let Some(root) = manifest.sections.iter().find(|s| s.parent.is_none()) {
        lines.push(format!("{} {}", format_index(1), root.title));
        push_source(&mut lines, 1, &root.index_path(), root.front.is_some());
        walk_section(manifest, root, 1, &mut lines);
    }

    if !manifest.resources.is_empty() {
        lines.push(String::new());
        lines.push("Resources".to_string());
        lines.extend(manifest.resources.iter().map(|r| format!("    {r}")));
    }
    if !manifest.static_files.is_empty() {
        lines.push(String::new());
        lines.push("Static".to_string());
        lines.extend(manifest.static_files.iter().map(|r| format!("    {r}")));
    }
    lines
}

fn push_source(lines: &mut Vec<String>, depth: usize, path: &str, exists: bool) {
    if exists {
        lines.push(format!("{}Source: {CONTENT_DIR}/{path}", indent(depth)));
    }
}

fn walk_section(manifest: &Manifest, section: &Section, depth: usize, lines: &mut Vec<String>) {
    let mut children: Vec<Node> = manifest
        .sections
        .iter()
        .filter(|s| s.parent.as_deref() == Some(section.path.as_str()))
        .map(Node::Section)
        .chain(
            manifest
                .documents
                .iter()
                .filter(|d| d.section == section.path)
                .map(Node::Page),
        )
        .collect();
    children.sort_by(|a, b| a.key().cmp(&b.key()));

    for (i, child) in children.iter().enumerate() {
        let pad = indent(depth);
        match child {
            Node::Section(s) => {
                lines.push(format!("{pad}{} {}", format_index(i + 1), s.title));
                push_source(lines, depth + 1, &s.index_path(), s.front.is_some());
                walk_section(manifest, s, depth + 1, lines);
            }
            Node::Page(d) => {
                lines.push(format!("{pad}{} {}", format_index(i + 1), page_label(manifest, d)));
                push_source(lines, depth + 1, &d.path, true);
            }
        }
    }
}

fn page_label(manifest: &Manifest, doc: &ContentDocument) -> String {
    let mut label = doc.front.title.clone();
    if let Some(date) = &doc.front.date {
        label.push_str(&format!(" ({})", date.format(&manifest.config.params.date_format)));
    }
    if doc.front.draft {
        label.push_str(" [draft]");
    }
    if let Some(layout) = &doc.front.layout {
        label.push_str(&format!(" [{layout}]"));
    }
    label
}

pub fn print_scan_output(manifest: &Manifest) {
    for line in format_scan_output(manifest) {
        println!("{}", line);
    }
}

// ============================================================================
// Stage 2: Build output
// ============================================================================

pub fn format_build_output(report: &BuildReport) -> Vec<String> {
    let mut lines = vec![format!("Base URL: {}", report.base_url)];
    lines.push(format!(
        "Rendered {} pages, {} list pages, {} taxonomy pages, {} feeds",
        report.pages, report.list_pages, report.taxonomy_pages, report.feeds
    ));
    if report.copied > 0 {
        lines.push(format!("Copied {} files", report.copied));
    }
    for (label, paths) in [
        ("Excluded (draft)", &report.excluded_drafts),
        ("Excluded (future)", &report.excluded_future),
    ] {
        if !paths.is_empty() {
            lines.push(label.to_string());
            lines.extend(paths.iter().map(|p| format!("    {p}")));
        }
    }
    let mut artifact = format!(
        "Artifact: {} files, {}",
        report.files,
        format_bytes(report.bytes as u64)
    );
    if report.minified {
        artifact.push_str(" (minified)");
    }
    lines.push(artifact);
    lines
}

pub fn print_build_output(report: &BuildReport) {
    for line in format_build_output(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Stage 3: Deploy output
// ============================================================================

/// Plan summary plus one line per mutating action. Unchanged keys are only
/// counted.
pub fn format_sync_plan(plan: &SyncPlan) -> Vec<String> {
    let mut summary = format!(
        "Plan: {} upload, {} unchanged, {} delete",
        plan.uploads.len(),
        plan.unchanged.len(),
        plan.deletes.len()
    );
    if !plan.kept.is_empty() {
        summary.push_str(&format!(", {} kept", plan.kept.len()));
    }
    let mut lines = vec![summary];
    lines.extend(plan.uploads.iter().map(|k| format!("    upload {k}")));
    lines.extend(plan.deletes.iter().map(|k| format!("    delete {k}")));
    lines
}

pub fn format_sync_report(report: &SyncReport) -> Vec<String> {
    let mut lines = format_sync_plan(&report.plan);
    if report.dry_run {
        lines.push("Dry run: nothing changed".to_string());
        return lines;
    }
    if report.plan.is_noop() && !report.state_written {
        lines.push("Up to date".to_string());
        return lines;
    }
    let state = if report.state_written {
        "state updated"
    } else {
        "state unchanged"
    };
    lines.push(format!(
        "Uploaded {} objects ({}), deleted {}, {}",
        report.uploaded,
        format_bytes(report.uploaded_bytes),
        report.deleted,
        state
    ));
    lines
}

pub fn print_sync_report(report: &SyncReport) {
    for line in format_sync_report(report) {
        println!("{}", line);
    }
}
