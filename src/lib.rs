//! # Sitepress
//!
//! Builds a Hugo-style Markdown content tree into a static site and mirrors
//! the result to an S3-compatible bucket. The content tree is the data
//! source: directories become sections, `_index.md` gives a section its
//! title and intro, and every other Markdown file is a page.
//!
//! # Architecture: Three-Stage Pipeline
//!
//! ```text
//! 1. Scan      site root  →  Manifest     (filesystem → typed content tree)
//! 2. Build     Manifest   →  Artifact     (select, render, feeds; in memory)
//! 3. Deploy    public/    →  bucket       (hash, plan, mirror sync)
//! ```
//!
//! Each stage only starts once the previous one fully succeeded. A build that
//! hits a broken reference fails before anything is written; a deploy never
//! runs on a failed build.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `config.yaml` loading, stock defaults, merging and validation |
//! | [`frontmatter`] | YAML (`---`) and TOML (`+++`) front matter into [`frontmatter::FrontMatter`] |
//! | [`naming`] | Slugs, content path → URL mapping, [`naming::BaseUrl`] |
//! | [`scan`] | Stage 1: walks `content/` and `static/`, produces the [`scan::Manifest`] |
//! | [`select`] | Draft and future visibility, listing order, taxonomies |
//! | [`markdown`] | Markdown → HTML with reference resolution, heading anchors and TOC |
//! | [`generate`] | Stage 2: renders the site into an [`artifact::Artifact`] using Maud |
//! | [`feeds`] | RSS, sitemap, robots.txt and the search index |
//! | [`minify`] | HTML and XML minification |
//! | [`artifact`] | In-memory build output and its safe write to disk |
//! | [`deploy`] | Stage 3: incremental mirror sync to an object store |
//! | [`types`] | Shared content types (`ContentDocument`, `Section`) |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Deterministic Builds
//!
//! The build takes its reference instant (for future-dated content) as an
//! input rather than reading the clock, renders into ordered maps, and embeds
//! no timestamps. The same content and options produce byte-identical output,
//! which is what lets the deploy stage skip unchanged files by hash.
//!
//! ## Base URL Is a Build Input
//!
//! `baseURL` comes from config but `build --base-url` overrides it for the
//! whole artifact: permalinks, canonicals, feeds, sitemap, menus and assets.
//! A staging build carries no trace of the production host.
//!
//! ## Maud Over Template Engines
//!
//! HTML is generated with [Maud](https://maud.lambda.xyz/). Templates are Rust
//! code: checked at compile time, escaped by default, and shipped inside the
//! binary with the stylesheet and search script.
//!
//! ## Bucket-Side Sync State
//!
//! The deploy stage stores the hashes it uploaded in the bucket itself (see
//! [`deploy::state`]), so any machine holding the credentials can run an
//! incremental deploy, and a CI runner with a fresh checkout uploads nothing
//! when nothing changed.

pub mod artifact;
pub mod config;
pub mod deploy;
pub mod feeds;
pub mod frontmatter;
pub mod generate;
pub mod markdown;
pub mod minify;
pub mod naming;
pub mod output;
pub mod scan;
pub mod select;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
