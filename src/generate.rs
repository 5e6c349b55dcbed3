//! HTML site generation.
//!
//! Stage 2 of the sitepress pipeline. Takes the scan [`Manifest`] and the
//! per-build [`BuildOptions`] and renders the whole site into an in-memory
//! [`Artifact`]. Nothing is written to disk here; see
//! [`Artifact::write_to`].
//!
//! ## Generated Files
//!
//! ```text
//! public/
//! ├── index.html                   # Home: profile layout, or the root listing
//! ├── index.xml                    # RSS for every listable page
//! ├── index.json                   # Search index
//! ├── sitemap.xml
//! ├── robots.txt
//! ├── 404.html
//! ├── basics/
//! │   ├── index.html               # Section listing, page 1
//! │   ├── index.xml                # Section RSS
//! │   ├── page/2/index.html        # Further listing pages
//! │   └── variables/index.html     # Page
//! ├── tags/
//! │   ├── index.html               # Term index
//! │   └── syntax/index.html        # Pages of one term
//! └── images/gopher.svg            # From static/
//! ```
//!
//! ## Determinism
//!
//! The same manifest and options always give the same bytes: listings are
//! ordered, maps are `BTreeMap`s, parallel work is collected back into a
//! fixed order, and no wall-clock value is rendered.
//!
//! ## HTML Generation
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating.
//! The stylesheet and the search script are embedded at compile time.

use crate::artifact::Artifact;
use crate::config::{BuildOptions, SiteConfig};
use crate::feeds::{self, Channel, FeedEntry, FeedError, SearchEntry, SitemapEntry};
use crate::markdown::{self, LinkResolver, MarkdownError, Rendered};
use crate::minify::{MinifyType, minify};
use crate::naming::{self, BaseUrl, InvalidBaseUrl};
use crate::scan::{CONTENT_DIR, Manifest, STATIC_DIR};
use crate::select::{self, Entry, SiteIndex, Taxonomy, Term, Visibility};
use crate::types::{ContentDocument, Section};
use chrono::{DateTime, FixedOffset};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Base URL: {0}")]
    BaseUrl(#[from] InvalidBaseUrl),
    #[error("{path}: {source}")]
    Markdown { path: String, source: MarkdownError },
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),
}

const CSS: &str = include_str!("../static/style.css");
const SEARCH_JS: &str = include_str!("../static/search.js");

/// What a build produced, for CLI output.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub base_url: String,
    pub pages: usize,
    pub list_pages: usize,
    pub taxonomy_pages: usize,
    pub feeds: usize,
    pub copied: usize,
    pub excluded_drafts: Vec<String>,
    pub excluded_future: Vec<String>,
    pub files: usize,
    pub bytes: usize,
    pub minified: bool,
}

#[derive(Debug)]
pub struct BuildOutput {
    pub artifact: Artifact,
    pub report: BuildReport,
}

/// UI strings of the built-in layout.
struct Labels {
    home: &'static str,
    toc: &'static str,
    prev: &'static str,
    next: &'static str,
    prev_page: &'static str,
    next_page: &'static str,
    minutes: &'static str,
    words: &'static str,
    not_found: &'static str,
    search: &'static str,
}

const EN: Labels = Labels {
    home: "Home",
    toc: "Table of Contents",
    prev: "Prev",
    next: "Next",
    prev_page: "« Prev Page",
    next_page: "Next Page »",
    minutes: "min",
    words: "words",
    not_found: "Page not found",
    search: "Search ↵",
};

const RU: Labels = Labels {
    home: "Главная",
    toc: "Содержание",
    prev: "Назад",
    next: "Вперёд",
    prev_page: "« Предыдущая",
    next_page: "Следующая »",
    minutes: "мин",
    words: "слов",
    not_found: "Страница не найдена",
    search: "Поиск ↵",
};

fn labels_for(language: &str) -> &'static Labels {
    if language.to_ascii_lowercase().starts_with("ru") {
        &RU
    } else {
        &EN
    }
}

/// Everything a template needs, shared read-only across render threads.
struct Site<'a> {
    config: &'a SiteConfig,
    base: BaseUrl,
    index: SiteIndex<'a>,
    /// Content path (page or `_index.md`) → rendered Markdown.
    rendered: HashMap<String, Rendered>,
    labels: &'static Labels,
}

/// `<head>` fields that vary per page.
struct Head {
    title: String,
    description: String,
    keywords: Vec<String>,
    canonical: String,
    feed: Option<String>,
    og_type: &'static str,
}

/// Build the site into memory.
///
/// `root` is the site root the manifest was scanned from; only `static/`
/// and content resources are read from it.
pub fn build(manifest: &Manifest, options: &BuildOptions, root: &Path) -> Result<BuildOutput, GenerateError> {
    let config = &manifest.config;
    let base = BaseUrl::parse(options.effective_base_url(config))?;
    let index = select::select(manifest, &Visibility::from(options));
    if !config.theme.is_empty() {
        log::debug!("theme {:?} is rendered with the built-in layout", config.theme);
    }

    let rendered = render_markdown(&index, &base)?;
    let site = Site {
        config,
        base,
        index,
        rendered,
        labels: labels_for(&config.language_code),
    };

    let mut artifact = Artifact::new();
    let mut report = BuildReport {
        base_url: site.base.to_string(),
        excluded_drafts: site.index.excluded_drafts.iter().map(|s| s.to_string()).collect(),
        excluded_future: site.index.excluded_future.iter().map(|s| s.to_string()).collect(),
        minified: options.minify,
        ..Default::default()
    };

    // Copied files first so generated pages win any collision
    for rel in &manifest.static_files {
        let bytes = fs::read(root.join(STATIC_DIR).join(rel))?;
        artifact.insert(rel.clone(), bytes);
        report.copied += 1;
    }
    for rel in &manifest.resources {
        let bytes = fs::read(root.join(CONTENT_DIR).join(rel))?;
        artifact.insert(naming::resource_path(rel), bytes);
        report.copied += 1;
    }

    let pages: Vec<(String, String)> = site
        .index
        .pages
        .par_iter()
        .map(|doc| (naming::index_file(&doc.url), render_page(&site, doc).into_string()))
        .collect();
    report.pages = pages.len();
    let mut generated = pages;

    let lists = render_section_lists(&site);
    report.list_pages = lists.len();
    generated.extend(lists);

    let terms = render_taxonomies(&site);
    report.taxonomy_pages = terms.len();
    generated.extend(terms);

    generated.push(("404.html".to_string(), render_not_found(&site).into_string()));

    let machine = render_machine_outputs(&site)?;
    report.feeds = machine.iter().filter(|(p, _)| p.ends_with("index.xml")).count();
    generated.extend(machine);

    for (path, body) in generated {
        if artifact.insert(path.clone(), body).is_some() {
            log::warn!("generated {path} replaces a copied file of the same name");
        }
    }
    check_local_links(&site, &artifact)?;

    if options.minify {
        artifact.transform(|path, bytes| {
            let minified = MinifyType::for_path(path, &bytes).map(|kind| minify(kind, true).into_owned());
            minified.unwrap_or(bytes)
        });
    }

    report.files = artifact.len();
    report.bytes = artifact.total_bytes();
    log::info!(
        "built {} pages, {} list pages, {} files for {}",
        report.pages,
        report.list_pages,
        report.files,
        report.base_url
    );
    Ok(BuildOutput { artifact, report })
}

/// Render every published body in parallel; the first failure in content
/// order is reported.
fn render_markdown(index: &SiteIndex, base: &BaseUrl) -> Result<HashMap<String, Rendered>, GenerateError> {
    let links = LinkResolver {
        base,
        targets: &index.targets,
    };
    let mut sources: Vec<(String, &str)> = index
        .pages
        .iter()
        .map(|d| (d.path.clone(), d.body.as_str()))
        .collect();
    sources.extend(
        index
            .sections
            .iter()
            .filter(|s| index.has_intro(&s.path))
            .map(|s| (s.index_path(), s.body.as_str())),
    );

    let results: Vec<Result<(String, Rendered), GenerateError>> = sources
        .par_iter()
        .map(|(path, body)| {
            markdown::render(body, path, &links)
                .map(|r| (path.clone(), r))
                .map_err(|source| GenerateError::Markdown {
                    path: format!("{CONTENT_DIR}/{path}"),
                    source,
                })
        })
        .collect();
    results.into_iter().collect()
}

/// Every local link must land on a file of this build; the first miss in
/// content order is reported.
fn check_local_links(site: &Site, artifact: &Artifact) -> Result<(), GenerateError> {
    let intros = site
        .index
        .sections
        .iter()
        .filter(|s| site.index.has_intro(&s.path))
        .map(|s| s.index_path());
    let sources = site.index.pages.iter().map(|d| d.path.clone()).chain(intros);
    for path in sources {
        let Some(rendered) = site.rendered.get(&path) else {
            continue;
        };
        if let Some(link) = rendered.local_links.iter().find(|l| !serves(artifact, &l.path)) {
            return Err(GenerateError::Markdown {
                path: format!("{CONTENT_DIR}/{path}"),
                source: MarkdownError::BrokenReference {
                    target: link.target.clone(),
                },
            });
        }
    }
    Ok(())
}

/// Whether a request for site path `path` is answered by an artifact file.
fn serves(artifact: &Artifact, path: &str) -> bool {
    let rel = path.trim_start_matches('/');
    if rel.is_empty() || rel.ends_with('/') {
        return artifact.contains(&format!("{rel}index.html"));
    }
    artifact.contains(rel) || artifact.contains(&format!("{rel}/index.html"))
}

impl Site<'_> {
    fn abs(&self, url: &str) -> String {
        self.base.abs(url)
    }

    /// Menu and button targets: site-rooted paths get the base URL.
    fn link(&self, url: &str) -> String {
        if url.starts_with('/') {
            self.abs(url)
        } else {
            url.to_string()
        }
    }

    fn format_date(&self, date: &DateTime<FixedOffset>) -> String {
        date.format(&self.config.params.date_format).to_string()
    }

    fn feeds_enabled(&self) -> bool {
        self.config.outputs.rss()
    }

    fn section_feed(&self, section: &Section) -> Option<String> {
        self.feeds_enabled()
            .then(|| self.abs(&format!("{}index.xml", section.url)))
    }

    fn summary_of(&self, doc: &ContentDocument) -> String {
        match &doc.front.summary {
            Some(s) => s.clone(),
            None => self
                .rendered
                .get(&doc.path)
                .map(Rendered::summary)
                .unwrap_or_default(),
        }
    }

    fn head_for_site(&self, title: String, canonical: String) -> Head {
        Head {
            title,
            description: self.config.params.description.clone(),
            keywords: self.config.params.keywords.clone(),
            canonical,
            feed: self.feeds_enabled().then(|| self.abs("/index.xml")),
            og_type: "website",
        }
    }
}

// ============================================================================
// HTML Components
// ============================================================================

fn base_document(site: &Site, head: &Head, body_class: &str, content: Markup) -> Markup {
    let config = site.config;
    let analytics = &config.params.analytics;
    html! {
        (DOCTYPE)
        html lang=(config.language_code) dir="auto" {
            head {
                meta charset="utf-8";
                meta http-equiv="X-UA-Compatible" content="IE=edge";
                meta name="viewport" content="width=device-width, initial-scale=1, shrink-to-fit=no";
                meta name="robots" content="index, follow";
                title { (head.title) }
                @if !head.keywords.is_empty() {
                    meta name="keywords" content=(head.keywords.join(", "));
                }
                meta name="description" content=(head.description);
                @if !config.params.author.is_empty() {
                    meta name="author" content=(config.params.author);
                }
                link rel="canonical" href=(head.canonical);
                @if let Some(feed) = &head.feed {
                    link rel="alternate" type="application/rss+xml" href=(feed) title=(config.title);
                }
                @if !analytics.google.site_verification_tag.is_empty() {
                    meta name="google-site-verification" content=(analytics.google.site_verification_tag);
                }
                @if !analytics.yandex.site_verification_tag.is_empty() {
                    meta name="yandex-verification" content=(analytics.yandex.site_verification_tag);
                }
                @if !analytics.bing.site_verification_tag.is_empty() {
                    meta name="msvalidate.01" content=(analytics.bing.site_verification_tag);
                }
                meta property="og:title" content=(head.title);
                meta property="og:description" content=(head.description);
                meta property="og:type" content=(head.og_type);
                meta property="og:url" content=(head.canonical);
                style { (PreEscaped(CSS)) }
                @if !config.google_analytics.is_empty() {
                    script async src={ "https://www.googletagmanager.com/gtag/js?id=" (config.google_analytics) } {}
                    script {
                        (PreEscaped(format!(
                            "window.dataLayer=window.dataLayer||[];function gtag(){{dataLayer.push(arguments);}}gtag('js',new Date());gtag('config','{}');",
                            config.google_analytics
                        )))
                    }
                }
            }
            body class=(body_class) {
                (site_header(site, &head.canonical))
                (content)
                (site_footer(site))
            }
        }
    }
}

fn site_header(site: &Site, current: &str) -> Markup {
    html! {
        header.header {
            nav.nav {
                div.logo {
                    a href=(site.abs("/")) accesskey="h" title=(site.config.title) { (site.config.title) }
                }
                ul #menu {
                    @for entry in site.config.sorted_menu() {
                        @let url = site.link(&entry.url);
                        @let active = url == current;
                        li {
                            a href=(url) title=(entry.name) class=[active.then_some("active")] {
                                span { (entry.name) }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn site_footer(site: &Site) -> Markup {
    html! {
        footer.footer {
            span { (site.config.title) }
        }
    }
}

/// Home » Section » Subsection, for pages and listings below the home section.
fn breadcrumbs(site: &Site, section: &str) -> Markup {
    if !site.config.params.show_breadcrumbs {
        return html! {};
    }
    let chain = site.index.ancestors(section);
    html! {
        div.breadcrumbs {
            @for (i, s) in chain.iter().enumerate() {
                @if i > 0 { " » " }
                @if s.parent.is_none() {
                    a href=(site.abs("/")) { (site.labels.home) }
                } @else if site.index.is_rendered(&s.path) {
                    a href=(site.abs(&s.url)) { (s.title) }
                } @else {
                    span { (naming::display_title(s.path.rsplit('/').next().unwrap_or(&s.path))) }
                }
            }
        }
    }
}

/// "01.02.2023 · 2 мин · 340 слов"
fn meta_line(site: &Site, date: Option<&DateTime<FixedOffset>>, rendered: Option<&Rendered>) -> Vec<String> {
    let params = &site.config.params;
    let mut parts = Vec::new();
    if let Some(date) = date {
        parts.push(site.format_date(date));
    }
    if let Some(r) = rendered {
        if params.show_reading_time {
            parts.push(format!("{} {}", r.reading_time().max(1), site.labels.minutes));
        }
        if params.show_word_count {
            parts.push(format!("{} {}", r.word_count, site.labels.words));
        }
    }
    parts
}

fn entry_card(site: &Site, entry: &Entry) -> Markup {
    let (summary, meta) = match entry {
        Entry::Page(doc) => (
            Some(site.summary_of(doc)),
            meta_line(site, doc.front.date.as_ref(), site.rendered.get(&doc.path)),
        ),
        Entry::Section(section) => (section.description().map(str::to_string), Vec::new()),
    };
    let url = site.abs(entry.url());
    html! {
        article.post-entry {
            header.entry-header {
                h2 { (entry.title()) }
            }
            @if let Some(summary) = summary.filter(|s| !s.is_empty()) {
                div.entry-content { p { (summary) } }
            }
            @if !meta.is_empty() {
                footer.entry-footer { (meta.join(" · ")) }
            }
            a.entry-link aria-label={ "post link to " (entry.title()) } href=(url) {}
        }
    }
}

fn toc_block(site: &Site, doc: &ContentDocument, rendered: &Rendered) -> Markup {
    let page_toggle = doc
        .front
        .extra
        .get("ShowToc")
        .and_then(serde_yaml::Value::as_bool);
    let show = page_toggle.unwrap_or(site.config.params.show_toc);
    if !show || rendered.toc.is_empty() {
        return html! {};
    }
    html! {
        details.toc open[site.config.params.toc_open] {
            summary { span.title { (site.labels.toc) } }
            div.inner {
                ul {
                    @for entry in &rendered.toc {
                        li class={ "toc-h" (entry.level) } {
                            a href={ "#" (entry.id) } { (entry.title) }
                        }
                    }
                }
            }
        }
    }
}

// ============================================================================
// Page Renderers
// ============================================================================

fn render_page(site: &Site, doc: &ContentDocument) -> Markup {
    if doc.front.layout.as_deref() == Some(select::SEARCH_LAYOUT) {
        return render_search_page(site, doc);
    }

    let empty = Rendered::default();
    let rendered = site.rendered.get(&doc.path).unwrap_or(&empty);
    let canonical = site.abs(&doc.url);
    let (prev, next) = site.index.prev_next(doc);
    let tags = page_terms(site, doc);
    let meta = meta_line(site, doc.front.date.as_ref(), Some(rendered));

    let head = Head {
        title: format!("{} | {}", doc.front.title, site.config.title),
        description: doc
            .front
            .description
            .clone()
            .unwrap_or_else(|| site.summary_of(doc)),
        keywords: if doc.front.keywords.is_empty() {
            site.config.params.keywords.clone()
        } else {
            doc.front.keywords.clone()
        },
        canonical,
        feed: site
            .index
            .section(&doc.section)
            .and_then(|s| site.section_feed(s)),
        og_type: "article",
    };

    let content = html! {
        main.main {
            article.post-single {
                header.post-header {
                    (breadcrumbs(site, &doc.section))
                    h1.post-title { (doc.front.title) }
                    @if let Some(description) = &doc.front.description {
                        div.post-description { (description) }
                    }
                    @if !meta.is_empty() {
                        div.post-meta { (meta.join(" · ")) }
                    }
                }
                (toc_block(site, doc, rendered))
                div.post-content { (PreEscaped(&rendered.html)) }
                footer.post-footer {
                    @if !tags.is_empty() {
                        ul.post-tags {
                            @for (name, url) in &tags {
                                li { a href=(url) { (name) } }
                            }
                        }
                    }
                    @if site.config.params.show_post_nav_links && (prev.is_some() || next.is_some()) {
                        nav.paginav {
                            @if let Some(p) = prev {
                                a.prev href=(site.abs(&p.url)) {
                                    span.title { "« " (site.labels.prev) }
                                    br;
                                    span { (p.front.title) }
                                }
                            }
                            @if let Some(n) = next {
                                a.next href=(site.abs(&n.url)) {
                                    span.title { (site.labels.next) " »" }
                                    br;
                                    span { (n.front.title) }
                                }
                            }
                        }
                    }
                }
            }
        }
    };

    base_document(site, &head, "single", content)
}

/// `(term name, absolute term URL)` for every taxonomy the page is filed under.
fn page_terms(site: &Site, doc: &ContentDocument) -> Vec<(String, String)> {
    site.index
        .taxonomies
        .iter()
        .flat_map(|tax| {
            doc.front.terms(&tax.plural).into_iter().filter_map(move |name| {
                let slug = naming::slugify(&name);
                tax.terms
                    .contains_key(&slug)
                    .then(|| (name, site.abs(&term_url(tax, &slug))))
            })
        })
        .collect()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchConfig<'a> {
    index: String,
    is_case_sensitive: bool,
    min_match_char_length: usize,
    keys: &'a [String],
}

fn render_search_page(site: &Site, doc: &ContentDocument) -> Markup {
    let fuse = &site.config.params.fuse_opts;
    let search_config = SearchConfig {
        index: site.abs("/index.json"),
        is_case_sensitive: fuse.is_case_sensitive,
        min_match_char_length: fuse.min_match_char_length,
        keys: &fuse.keys,
    };
    // serde_json cannot fail on this struct; "</" is escaped for the script context
    let config_json = serde_json::to_string(&search_config)
        .unwrap_or_else(|_| "{}".to_string())
        .replace("</", "<\\/");
    let head = Head {
        title: format!("{} | {}", doc.front.title, site.config.title),
        description: doc
            .front
            .description
            .clone()
            .unwrap_or_else(|| site.config.params.description.clone()),
        keywords: site.config.params.keywords.clone(),
        canonical: site.abs(&doc.url),
        feed: None,
        og_type: "website",
    };
    let content = html! {
        main.main {
            header.page-header {
                h1 { (doc.front.title) }
                @if let Some(description) = &doc.front.description {
                    div.post-description { (description) }
                }
            }
            div #searchbox {
                input #searchInput autofocus placeholder=(site.labels.search) aria-label="search" type="search" autocomplete="off";
                ul #searchResults aria-label="search results" {}
            }
        }
        script #search-config type="application/json" { (PreEscaped(config_json)) }
        script { (PreEscaped(SEARCH_JS)) }
    };
    base_document(site, &head, "search", content)
}

fn list_page_url(section_url: &str, page: usize) -> String {
    if page <= 1 {
        section_url.to_string()
    } else {
        format!("{section_url}page/{page}/")
    }
}

/// Every rendered section's listing, split into `paginate`-sized pages.
///
/// With profile mode on, the home section renders the profile instead.
fn render_section_lists(site: &Site) -> Vec<(String, String)> {
    let mut jobs: Vec<(&Section, usize)> = Vec::new();
    for section in &site.index.sections {
        let is_home = section.parent.is_none();
        if is_home && site.config.params.profile_mode.enabled {
            continue;
        }
        let entries = site.index.listing(&section.path).len();
        let pages = entries.div_ceil(site.config.paginate).max(1);
        jobs.extend((1..=pages).map(|page| (*section, page)));
    }

    let mut out: Vec<(String, String)> = jobs
        .par_iter()
        .map(|(section, page)| {
            let url = list_page_url(&section.url, *page);
            (naming::index_file(&url), render_list_page(site, section, *page).into_string())
        })
        .collect();

    if site.config.params.profile_mode.enabled {
        out.push(("index.html".to_string(), render_profile_home(site).into_string()));
    }
    out
}

fn render_list_page(site: &Site, section: &Section, page: usize) -> Markup {
    let entries = site.index.listing(&section.path);
    let per_page = site.config.paginate;
    let total = entries.len().div_ceil(per_page).max(1);
    let chunk = entries.chunks(per_page).nth(page - 1).unwrap_or(&[]);
    let is_home = section.parent.is_none();
    let intro = (page == 1 && site.index.has_intro(&section.path))
        .then(|| site.rendered.get(&section.index_path()))
        .flatten();

    let mut head = if is_home {
        site.head_for_site(site.config.title.clone(), site.abs(&list_page_url(&section.url, page)))
    } else {
        Head {
            title: format!("{} | {}", section.title, site.config.title),
            description: section
                .description()
                .map(str::to_string)
                .unwrap_or_else(|| site.config.params.description.clone()),
            keywords: site.config.params.keywords.clone(),
            canonical: site.abs(&list_page_url(&section.url, page)),
            feed: None,
            og_type: "website",
        }
    };
    if !is_home {
        head.feed = site.section_feed(section);
    }

    let content = html! {
        main.main {
            @if !is_home {
                header.page-header {
                    (breadcrumbs(site, section.parent.as_deref().unwrap_or("")))
                    h1 { (section.title) }
                    @if let Some(description) = section.description() {
                        div.post-description { (description) }
                    }
                }
            }
            @if let Some(intro) = intro {
                div.post-content { (PreEscaped(&intro.html)) }
            }
            @for entry in chunk {
                (entry_card(site, entry))
            }
            @if total > 1 {
                footer.page-footer {
                    nav.pagination {
                        @if page > 1 {
                            a.prev href=(site.abs(&list_page_url(&section.url, page - 1))) { (site.labels.prev_page) }
                        }
                        @if page < total {
                            a.next href=(site.abs(&list_page_url(&section.url, page + 1))) { (site.labels.next_page) }
                        }
                    }
                }
            }
        }
    };
    base_document(site, &head, "list", content)
}

fn render_profile_home(site: &Site) -> Markup {
    let profile = &site.config.params.profile_mode;
    let title = if profile.title.is_empty() {
        &site.config.title
    } else {
        &profile.title
    };
    let head = site.head_for_site(site.config.title.clone(), site.abs("/"));
    let width = (profile.image_width > 0).then_some(profile.image_width);
    let height = (profile.image_height > 0).then_some(profile.image_height);
    let content = html! {
        main.main {
            div.profile {
                @if !profile.image_url.is_empty() {
                    img src=(site.link(&profile.image_url)) alt=(profile.image_title) title=(profile.image_title) width=[width] height=[height];
                }
                h1 { (title) }
                @if !profile.subtitle.is_empty() {
                    span { (profile.subtitle) }
                }
                @if !profile.buttons.is_empty() {
                    div.buttons {
                        @for button in &profile.buttons {
                            a.button href=(site.link(&button.url)) {
                                span.button-inner { (button.name) }
                            }
                        }
                    }
                }
            }
        }
    };
    base_document(site, &head, "list profile", content)
}

fn taxonomy_url(tax: &Taxonomy) -> String {
    naming::section_url(&tax.plural)
}

fn term_url(tax: &Taxonomy, slug: &str) -> String {
    format!("{}{}/", taxonomy_url(tax), slug)
}

fn taxonomy_title(tax: &Taxonomy) -> String {
    naming::display_title(&tax.plural)
}

fn render_taxonomies(site: &Site) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for tax in site.index.taxonomies.iter().filter(|t| !t.terms.is_empty()) {
        let url = taxonomy_url(tax);
        out.push((naming::index_file(&url), render_term_index(site, tax).into_string()));
        for term in tax.terms.values() {
            let url = term_url(tax, &term.slug);
            out.push((naming::index_file(&url), render_term_page(site, tax, term).into_string()));
        }
    }
    out
}

fn render_term_index(site: &Site, tax: &Taxonomy) -> Markup {
    let title = taxonomy_title(tax);
    let head = site.head_for_site(
        format!("{} | {}", title, site.config.title),
        site.abs(&taxonomy_url(tax)),
    );
    let content = html! {
        main.main {
            header.page-header { h1 { (title) } }
            ul.terms-tags {
                @for term in tax.terms.values() {
                    li {
                        a href=(site.abs(&term_url(tax, &term.slug))) {
                            (term.name) sup { (term.pages.len()) }
                        }
                    }
                }
            }
        }
    };
    base_document(site, &head, "list terms", content)
}

fn render_term_page(site: &Site, tax: &Taxonomy, term: &Term) -> Markup {
    let head = site.head_for_site(
        format!("{} | {}", term.name, site.config.title),
        site.abs(&term_url(tax, &term.slug)),
    );
    let content = html! {
        main.main {
            header.page-header {
                div.breadcrumbs {
                    a href=(site.abs("/")) { (site.labels.home) }
                    " » "
                    a href=(site.abs(&taxonomy_url(tax))) { (taxonomy_title(tax)) }
                }
                h1 { (term.name) }
            }
            @for doc in &term.pages {
                (entry_card(site, &Entry::Page(doc)))
            }
        }
    };
    base_document(site, &head, "list", content)
}

fn render_not_found(site: &Site) -> Markup {
    let head = site.head_for_site(
        format!("404 | {}", site.config.title),
        site.abs("/404.html"),
    );
    let content = html! {
        main.main {
            div.not-found { "404" }
            p { (site.labels.not_found) }
            p { a href=(site.abs("/")) { (site.labels.home) } }
        }
    };
    base_document(site, &head, "list", content)
}

// ============================================================================
// Feeds, sitemap, robots, search index
// ============================================================================

fn feed_entries(site: &Site, pages: &[&ContentDocument]) -> Vec<FeedEntry> {
    pages
        .iter()
        .map(|doc| FeedEntry {
            title: doc.front.title.clone(),
            link: site.abs(&doc.url),
            date: doc.front.date,
            summary: site.summary_of(doc),
        })
        .collect()
}

fn render_machine_outputs(site: &Site) -> Result<Vec<(String, String)>, GenerateError> {
    let config = site.config;
    let mut out = Vec::new();
    let all_pages = site.index.pages_by_date();

    if site.feeds_enabled() {
        let home_link = site.abs("/");
        let home = Channel {
            title: &config.title,
            link: &home_link,
            description: &config.params.description,
            language: &config.language_code,
        };
        out.push(("index.xml".to_string(), feeds::rss(&home, &feed_entries(site, &all_pages))?));

        for section in site.index.sections.iter().filter(|s| s.parent.is_some()) {
            let link = site.abs(&section.url);
            let title = format!("{} | {}", section.title, config.title);
            let channel = Channel {
                title: &title,
                link: &link,
                description: section.description().unwrap_or(&config.params.description),
                language: &config.language_code,
            };
            let pages = site.index.section_pages_by_date(&section.path);
            let url = format!("{}index.xml", section.url);
            out.push((
                url.trim_start_matches('/').to_string(),
                feeds::rss(&channel, &feed_entries(site, &pages))?,
            ));
        }
    }

    if config.outputs.json() {
        let entries: Vec<SearchEntry> = all_pages
            .iter()
            .map(|doc| SearchEntry {
                title: doc.front.title.clone(),
                content: site
                    .rendered
                    .get(&doc.path)
                    .map(|r| r.plain_text.clone())
                    .unwrap_or_default(),
                permalink: site.abs(&doc.url),
                summary: site.summary_of(doc),
            })
            .collect();
        out.push(("index.json".to_string(), feeds::search_index(&entries)?));
    }

    out.push(("sitemap.xml".to_string(), feeds::sitemap(&sitemap_entries(site))));

    if config.enable_robots_txt {
        out.push(("robots.txt".to_string(), feeds::robots(&site.abs("/sitemap.xml"))));
    }
    Ok(out)
}

fn newest(pages: &[&ContentDocument]) -> Option<DateTime<FixedOffset>> {
    pages.iter().filter_map(|d| d.front.date).max()
}

fn sitemap_entries(site: &Site) -> Vec<SitemapEntry> {
    let mut entries = Vec::new();
    for section in &site.index.sections {
        let pages = site.index.section_pages_by_date(&section.path);
        entries.push(SitemapEntry {
            loc: site.abs(&section.url),
            lastmod: newest(&pages),
        });
    }
    for doc in &site.index.pages {
        entries.push(SitemapEntry {
            loc: site.abs(&doc.url),
            lastmod: doc.front.date,
        });
    }
    for tax in site.index.taxonomies.iter().filter(|t| !t.terms.is_empty()) {
        entries.push(SitemapEntry {
            loc: site.abs(&taxonomy_url(tax)),
            lastmod: None,
        });
        for term in tax.terms.values() {
            entries.push(SitemapEntry {
                loc: site.abs(&term_url(tax, &term.slug)),
                lastmod: newest(&term.pages),
            });
        }
    }
    entries
}

// ============================================================================
// Tests
// ============================================================================
