//! Visibility and ordering.
//!
//! Decides which scanned documents a given build publishes and in which order
//! they are listed. The result, a [`SiteIndex`], borrows from the
//! [`Manifest`] and is what the build stage renders.
//!
//! ## Visibility
//!
//! A document is published when it is not a draft (unless drafts are built)
//! and its date is not after the build's reference instant (unless future
//! content is built). A section is rendered when it is the home section, when
//! its `_index.md` is published, or when it lists at least one published page
//! or rendered subsection. An unpublished `_index.md` only hides the section's
//! own intro.
//!
//! ## Ordering
//!
//! Section listings hold the section's published pages plus its rendered
//! child sections, sorted by `(weight absent, weight, path)`: weighted
//! entries first in ascending weight, unweighted entries after them, and the
//! content path as the tie-break. Prev/next links follow the same order.

use crate::config::BuildOptions;
use crate::frontmatter::FrontMatter;
use crate::naming;
use crate::scan::Manifest;
use crate::types::{ContentDocument, Section};
use chrono::{DateTime, FixedOffset, Utc};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

/// Layout name of the client-side search page.
pub const SEARCH_LAYOUT: &str = "search";

#[derive(Debug, Clone, Copy)]
pub struct Visibility {
    pub build_drafts: bool,
    pub build_future: bool,
    pub now: DateTime<Utc>,
}

impl From<&BuildOptions> for Visibility {
    fn from(options: &BuildOptions) -> Self {
        Self {
            build_drafts: options.build_drafts,
            build_future: options.build_future,
            now: options.now,
        }
    }
}

pub fn is_published(front: &FrontMatter, vis: &Visibility) -> bool {
    if front.draft && !vis.build_drafts {
        return false;
    }
    match front.date {
        Some(date) if !vis.build_future => date.with_timezone(&Utc) <= vis.now,
        _ => true,
    }
}

/// Pages rendered but kept out of listings, feeds and the search index.
pub fn is_utility_page(doc: &ContentDocument) -> bool {
    doc.front.layout.as_deref() == Some(SEARCH_LAYOUT)
}

/// Sort key shared by every listing.
pub fn listing_key(weight: Option<i64>, path: &str) -> (bool, i64, &str) {
    (weight.is_none(), weight.unwrap_or(0), path)
}

/// One entry of a section listing.
#[derive(Debug, Clone, Copy)]
pub enum Entry<'a> {
    Page(&'a ContentDocument),
    Section(&'a Section),
}

impl<'a> Entry<'a> {
    pub fn title(&self) -> &'a str {
        match self {
            Entry::Page(d) => &d.front.title,
            Entry::Section(s) => &s.title,
        }
    }

    pub fn url(&self) -> &'a str {
        match self {
            Entry::Page(d) => &d.url,
            Entry::Section(s) => &s.url,
        }
    }

    pub fn path(&self) -> &'a str {
        match self {
            Entry::Page(d) => &d.path,
            Entry::Section(s) => &s.path,
        }
    }

    pub fn weight(&self) -> Option<i64> {
        match self {
            Entry::Page(d) => d.front.weight,
            Entry::Section(s) => s.weight(),
        }
    }

    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            Entry::Page(d) => d.front.date,
            Entry::Section(s) => s.front.as_ref().and_then(|f| f.date),
        }
    }
}

/// Pages filed under one taxonomy term.
#[derive(Debug, Clone)]
pub struct Term<'a> {
    /// Term as first written in front matter.
    pub name: String,
    pub slug: String,
    /// Newest first, then by path.
    pub pages: Vec<&'a ContentDocument>,
}

/// A configured taxonomy and its terms, keyed by term slug.
#[derive(Debug, Clone)]
pub struct Taxonomy<'a> {
    pub singular: String,
    pub plural: String,
    pub terms: BTreeMap<String, Term<'a>>,
}

/// What one build publishes, and in which order.
#[derive(Debug)]
pub struct SiteIndex<'a> {
    pub manifest: &'a Manifest,
    /// Published pages in content-path order.
    pub pages: Vec<&'a ContentDocument>,
    /// Rendered sections in path order, the home section first.
    pub sections: Vec<&'a Section>,
    /// Content path → site-rooted URL of every published reference target,
    /// `_index.md` of rendered sections included.
    pub targets: HashMap<String, String>,
    pub taxonomies: Vec<Taxonomy<'a>>,
    /// Drafts left out of this build.
    pub excluded_drafts: Vec<&'a str>,
    /// Future-dated pages left out of this build.
    pub excluded_future: Vec<&'a str>,
    listings: BTreeMap<String, Vec<Entry<'a>>>,
    intros: HashMap<String, bool>,
}

pub fn select<'a>(manifest: &'a Manifest, vis: &Visibility) -> SiteIndex<'a> {
    let mut excluded_drafts = Vec::new();
    let mut excluded_future = Vec::new();
    let mut pages = Vec::new();
    for doc in &manifest.documents {
        if is_published(&doc.front, vis) {
            pages.push(doc);
        } else if doc.front.draft && !vis.build_drafts {
            excluded_drafts.push(doc.path.as_str());
        } else {
            excluded_future.push(doc.path.as_str());
        }
    }

    let mut listings: BTreeMap<String, Vec<Entry<'a>>> = BTreeMap::new();
    for doc in pages.iter().filter(|d| !is_utility_page(d)) {
        listings
            .entry(doc.section.clone())
            .or_default()
            .push(Entry::Page(*doc));
    }

    // Children sort after their parent, so walking backwards settles every
    // subsection before the section that lists it.
    let mut intros = HashMap::new();
    let mut rendered = Vec::new();
    for section in manifest.sections.iter().rev() {
        let intro = section
            .front
            .as_ref()
            .is_some_and(|f| is_published(f, vis));
        intros.insert(section.path.clone(), intro);
        let has_entries = listings.get(&section.path).is_some_and(|l| !l.is_empty());
        let is_root = section.parent.is_none();
        // An unpublished _index.md withholds the whole section page; its
        // published pages still render on their own.
        let withheld = !is_root && section.front.is_some() && !intro;
        if withheld {
            log::debug!("section {} withheld: its _index.md is not published", section.path);
        }
        if withheld || !(is_root || intro || has_entries) {
            continue;
        }
        rendered.push(section);
        if let Some(parent) = &section.parent {
            listings
                .entry(parent.clone())
                .or_default()
                .push(Entry::Section(section));
        }
    }
    rendered.reverse();

    for entries in listings.values_mut() {
        entries.sort_by(|a, b| listing_key(a.weight(), a.path()).cmp(&listing_key(b.weight(), b.path())));
    }

    let mut targets = HashMap::new();
    for doc in &pages {
        targets.insert(doc.path.clone(), doc.url.clone());
    }
    for section in &rendered {
        targets.insert(section.index_path(), section.url.clone());
    }

    let taxonomies = collect_taxonomies(manifest, &pages);

    SiteIndex {
        manifest,
        pages,
        sections: rendered,
        targets,
        taxonomies,
        excluded_drafts,
        excluded_future,
        listings,
        intros,
    }
}

fn collect_taxonomies<'a>(manifest: &'a Manifest, pages: &[&'a ContentDocument]) -> Vec<Taxonomy<'a>> {
    manifest
        .config
        .taxonomies
        .iter()
        .map(|(singular, plural)| {
            let mut terms: BTreeMap<String, Term<'a>> = BTreeMap::new();
            for doc in pages.iter().filter(|d| !is_utility_page(d)) {
                for name in doc.front.terms(plural) {
                    let slug = naming::slugify(&name);
                    if slug.is_empty() {
                        continue;
                    }
                    terms
                        .entry(slug.clone())
                        .or_insert_with(|| Term {
                            name,
                            slug,
                            pages: Vec::new(),
                        })
                        .pages
                        .push(*doc);
                }
            }
            for term in terms.values_mut() {
                sort_by_date(&mut term.pages);
                term.pages.dedup_by(|a, b| a.path == b.path);
            }
            Taxonomy {
                singular: singular.clone(),
                plural: plural.clone(),
                terms,
            }
        })
        .collect()
}

/// Newest first, content path as the tie-break.
pub fn sort_by_date(pages: &mut [&ContentDocument]) {
    pages.sort_by(|a, b| (Reverse(a.front.date), &a.path).cmp(&(Reverse(b.front.date), &b.path)));
}

impl<'a> SiteIndex<'a> {
    /// Listing of a section in display order (empty for unknown sections).
    pub fn listing(&self, section: &str) -> &[Entry<'a>] {
        self.listings.get(section).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the section's `_index.md` intro is part of this build.
    pub fn has_intro(&self, section: &str) -> bool {
        self.intros.get(section).copied().unwrap_or(false)
    }

    pub fn section(&self, path: &str) -> Option<&'a Section> {
        self.sections.iter().copied().find(|s| s.path == path)
    }

    /// Neighbouring pages of `doc` within its section listing.
    pub fn prev_next(
        &self,
        doc: &ContentDocument,
    ) -> (Option<&'a ContentDocument>, Option<&'a ContentDocument>) {
        let siblings: Vec<&'a ContentDocument> = self
            .listing(&doc.section)
            .iter()
            .filter_map(|e| match e {
                Entry::Page(d) => Some(*d),
                Entry::Section(_) => None,
            })
            .collect();
        match siblings.iter().position(|d| d.path == doc.path) {
            Some(i) => (
                i.checked_sub(1).map(|p| siblings[p]),
                siblings.get(i + 1).copied(),
            ),
            None => (None, None),
        }
    }

    /// Whether the section has a list page in this build.
    pub fn is_rendered(&self, section: &str) -> bool {
        self.section(section).is_some()
    }

    /// Sections from the home section down to `section`.
    pub fn ancestors(&self, section: &str) -> Vec<&'a Section> {
        let mut chain = Vec::new();
        let mut cursor = Some(section.to_string());
        while let Some(path) = cursor {
            match self.manifest.section(&path) {
                Some(s) => {
                    chain.push(s);
                    cursor = s.parent.clone();
                }
                None => break,
            }
        }
        chain.reverse();
        chain
    }

    /// Listable pages, newest first (feeds, search index).
    pub fn pages_by_date(&self) -> Vec<&'a ContentDocument> {
        let mut pages: Vec<&'a ContentDocument> = self
            .pages
            .iter()
            .copied()
            .filter(|d| !is_utility_page(d))
            .collect();
        sort_by_date(&mut pages);
        pages
    }

    /// Listable pages of a section and all its subsections, newest first.
    pub fn section_pages_by_date(&self, section: &str) -> Vec<&'a ContentDocument> {
        let prefix = format!("{section}/");
        let mut pages: Vec<&'a ContentDocument> = self
            .pages_by_date()
            .into_iter()
            .filter(|d| section.is_empty() || d.section == section || d.section.starts_with(&prefix))
            .collect();
        sort_by_date(&mut pages);
        pages
    }
}
