//! Markdown rendering.
//!
//! Converts a document body to HTML with pulldown-cmark and, on the way,
//! does the work that makes pages link together:
//!
//! - **References**: links and images pointing at `*.md` files resolve to the
//!   target's permalink, relative to the current document first and then to
//!   `content/`. `{{< ref "x.md" >}}` and `{{< relref "x.md" >}}` expand to
//!   the same permalink before parsing. A target that does not exist or is
//!   not published in this build is an error, never a dead link.
//! - **Local links**: site-rooted links (`/images/gopher.svg`) and relative
//!   links to other files (`diagram.png`, resolved against the document's
//!   directory) are made absolute against the build's base URL and recorded
//!   in [`Rendered::local_links`], so the build can check them against its
//!   output.
//! - **Headings** get unique ids (`объявление`, `объявление-1`, ...); h2–h4
//!   feed the table of contents.
//! - **Plain text** is collected for word counts, summaries and the search
//!   index.

use crate::naming::{self, BaseUrl};
use crate::types::TocEntry;
use pulldown_cmark::{CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Average reading speed used for reading-time estimates.
pub const WORDS_PER_MINUTE: usize = 213;

/// Words kept in an automatic summary.
pub const SUMMARY_WORDS: usize = 70;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarkdownError {
    #[error("broken reference to {target:?}: nothing is published at that path")]
    BrokenReference { target: String },
    #[error("unknown shortcode {name:?} (only ref and relref are supported)")]
    UnknownShortcode { name: String },
    #[error("shortcode opened but never closed")]
    UnterminatedShortcode,
}

/// Output of [`render`].
#[derive(Debug, Clone, Default)]
pub struct Rendered {
    pub html: String,
    pub toc: Vec<TocEntry>,
    /// Whitespace-normalised text content.
    pub plain_text: String,
    pub word_count: usize,
    /// Non-Markdown local destinations, in document order.
    pub local_links: Vec<LocalLink>,
}

/// A local link that is not a content reference.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalLink {
    /// Destination as written.
    pub target: String,
    /// Site-rooted path it points at, query and fragment removed.
    pub path: String,
}

impl Rendered {
    /// Minutes, rounded up.
    pub fn reading_time(&self) -> usize {
        self.word_count.div_ceil(WORDS_PER_MINUTE)
    }

    /// Opening words of the text, with an ellipsis when cut.
    pub fn summary(&self) -> String {
        let mut words = self.plain_text.split_whitespace();
        let head: Vec<&str> = words.by_ref().take(SUMMARY_WORDS).collect();
        let mut summary = head.join(" ");
        if words.next().is_some() {
            summary.push('…');
        }
        summary
    }
}

/// Rewrites link destinations for one build.
#[derive(Debug, Clone, Copy)]
pub struct LinkResolver<'a> {
    pub base: &'a BaseUrl,
    /// Content path → site-rooted URL of every published document.
    pub targets: &'a HashMap<String, String>,
}

impl LinkResolver<'_> {
    /// Rewrite a link or image destination found in document `from`.
    ///
    /// Local destinations that are not content references are pushed onto
    /// `local` for checking once the build output exists.
    pub fn rewrite(&self, from: &str, dest: &str, local: &mut Vec<LocalLink>) -> Result<String, MarkdownError> {
        if dest.is_empty() || dest.starts_with('#') || dest.starts_with("//") || has_scheme(dest) {
            return Ok(dest.to_string());
        }
        let (path, suffix) = split_suffix(dest);
        if path.to_ascii_lowercase().ends_with(".md") {
            return self.resolve(from, dest, false);
        }
        let site_path = if path.starts_with('/') {
            path.to_string()
        } else {
            relative_site_path(from, path).ok_or_else(|| MarkdownError::BrokenReference {
                target: dest.to_string(),
            })?
        };
        local.push(LocalLink {
            target: dest.to_string(),
            path: site_path.clone(),
        });
        Ok(format!("{}{suffix}", self.base.abs(&site_path)))
    }

    /// Absolute permalink of a content reference, keeping any `?query` or
    /// `#fragment`.
    ///
    /// `loose` also accepts extension-less targets (`basics/variables`) and
    /// section directories (`basics/`), as shortcodes allow.
    pub fn resolve(&self, from: &str, target: &str, loose: bool) -> Result<String, MarkdownError> {
        let (path, suffix) = split_suffix(target);

        let mut spellings = vec![path.to_string()];
        if loose && !path.to_ascii_lowercase().ends_with(".md") {
            let trimmed = path.trim_end_matches('/');
            spellings = vec![
                format!("{trimmed}.md"),
                format!("{trimmed}/{}", naming::SECTION_INDEX),
            ];
        }

        let dir = naming::parent_dir(from);
        for spelling in &spellings {
            let candidates = match spelling.strip_prefix('/') {
                Some(rooted) => vec![rooted.to_string()],
                None if dir.is_empty() => vec![spelling.clone()],
                None => vec![format!("{dir}/{spelling}"), spelling.clone()],
            };
            for candidate in candidates.iter().filter_map(|c| naming::normalize_path(c)) {
                if let Some(url) = self.targets.get(&candidate) {
                    return Ok(format!("{}{suffix}", self.base.abs(url)));
                }
            }
        }
        Err(MarkdownError::BrokenReference {
            target: target.to_string(),
        })
    }
}

/// `"a.md?x=1#y"` → `("a.md", "?x=1#y")`.
fn split_suffix(dest: &str) -> (&str, &str) {
    dest.split_at(dest.find(['#', '?']).unwrap_or(dest.len()))
}

/// Output location of a relative destination, taken from the content
/// directory of `from`. `None` when it climbs above `content/`.
fn relative_site_path(from: &str, path: &str) -> Option<String> {
    let joined = match naming::parent_dir(from) {
        "" => path.to_string(),
        dir => format!("{dir}/{path}"),
    };
    let normalized = naming::normalize_path(&joined)?;
    if normalized.is_empty() || path.ends_with('/') {
        Some(naming::section_url(&normalized))
    } else {
        Some(format!("/{}", naming::resource_path(&normalized)))
    }
}

fn has_scheme(dest: &str) -> bool {
    match dest.split_once(':') {
        Some((scheme, _)) => {
            scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_HEADING_ATTRIBUTES
}

/// Render the body of the document at content path `from`.
pub fn render(body: &str, from: &str, links: &LinkResolver) -> Result<Rendered, MarkdownError> {
    let source = expand_shortcodes(body, from, links)?;
    let events: Vec<Event> = Parser::new_ext(&source, options()).collect();
    let (heading_ids, toc) = assign_heading_ids(&events);

    let mut ids = heading_ids.into_iter();
    let mut local_links = Vec::new();
    let mut plain = String::new();
    let mut out = Vec::with_capacity(events.len());
    for event in events {
        let event = match event {
            Event::Start(Tag::Heading {
                level,
                id: _,
                classes,
                attrs,
            }) => Event::Start(Tag::Heading {
                level,
                id: ids.next().map(CowStr::from),
                classes,
                attrs,
            }),
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                title,
                id,
            }) => Event::Start(Tag::Link {
                link_type,
                dest_url: links.rewrite(from, &dest_url, &mut local_links)?.into(),
                title,
                id,
            }),
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            }) => Event::Start(Tag::Image {
                link_type,
                dest_url: links.rewrite(from, &dest_url, &mut local_links)?.into(),
                title,
                id,
            }),
            Event::Text(text) => {
                plain.push_str(&text);
                Event::Text(text)
            }
            Event::Code(code) => {
                plain.push_str(&code);
                Event::Code(code)
            }
            Event::SoftBreak => {
                plain.push(' ');
                Event::SoftBreak
            }
            Event::HardBreak => {
                plain.push(' ');
                Event::HardBreak
            }
            Event::End(end) => {
                if ends_block(&end) {
                    plain.push(' ');
                }
                Event::End(end)
            }
            other => other,
        };
        out.push(event);
    }

    let mut body_html = String::new();
    html::push_html(&mut body_html, out.into_iter());

    let plain_text = plain.split_whitespace().collect::<Vec<_>>().join(" ");
    let word_count = plain_text.split_whitespace().count();
    Ok(Rendered {
        html: body_html,
        toc,
        plain_text,
        word_count,
        local_links,
    })
}

fn ends_block(end: &TagEnd) -> bool {
    matches!(
        end,
        TagEnd::Paragraph
            | TagEnd::Heading(_)
            | TagEnd::Item
            | TagEnd::CodeBlock
            | TagEnd::TableCell
    )
}

/// First pass: one id per heading in document order, plus the h2–h4 TOC.
fn assign_heading_ids(events: &[Event]) -> (Vec<String>, Vec<TocEntry>) {
    let mut used: HashSet<String> = HashSet::new();
    let mut ids = Vec::new();
    let mut toc = Vec::new();
    let mut current: Option<(HeadingLevel, Option<String>, String)> = None;

    for event in events {
        match event {
            Event::Start(Tag::Heading { level, id, .. }) => {
                current = Some((*level, id.as_ref().map(|s| s.to_string()), String::new()));
            }
            Event::Text(t) | Event::Code(t) => {
                if let Some((_, _, text)) = current.as_mut() {
                    text.push_str(t);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, explicit, text)) = current.take() {
                    let id = match explicit {
                        Some(id) => unique_id(&mut used, &id),
                        None => unique_id(&mut used, &naming::slugify(&text)),
                    };
                    if matches!(level, HeadingLevel::H2 | HeadingLevel::H3 | HeadingLevel::H4) {
                        toc.push(TocEntry {
                            level: level as u8,
                            id: id.clone(),
                            title: text.trim().to_string(),
                        });
                    }
                    ids.push(id);
                }
            }
            _ => {}
        }
    }
    (ids, toc)
}

fn unique_id(used: &mut HashSet<String>, slug: &str) -> String {
    let base = if slug.is_empty() { "heading" } else { slug };
    let mut candidate = base.to_string();
    let mut n = 0;
    while used.contains(&candidate) {
        n += 1;
        candidate = format!("{base}-{n}");
    }
    used.insert(candidate.clone());
    candidate
}

/// Expand `{{< ref >}}`/`{{< relref >}}` (and the `{{% %}}` forms) to
/// permalinks. `{{</* ... */>}}` is the escape for a literal shortcode.
fn expand_shortcodes<'b>(
    body: &'b str,
    from: &str,
    links: &LinkResolver,
) -> Result<Cow<'b, str>, MarkdownError> {
    if !body.contains("{{<") && !body.contains("{{%") {
        return Ok(Cow::Borrowed(body));
    }
    let mut out = String::with_capacity(body.len());
    let mut rest = body;
    while let Some(start) = next_shortcode(rest) {
        out.push_str(&rest[..start]);
        let (open, close) = if rest[start..].starts_with("{{<") {
            ("{{<", ">}}")
        } else {
            ("{{%", "%}}")
        };
        let inner_start = start + open.len();
        let len = rest[inner_start..]
            .find(close)
            .ok_or(MarkdownError::UnterminatedShortcode)?;
        let inner = rest[inner_start..inner_start + len].trim();
        match inner.strip_prefix("/*").and_then(|s| s.strip_suffix("*/")) {
            Some(literal) => {
                out.push_str(open);
                out.push_str(literal);
                out.push_str(close);
            }
            None => out.push_str(&expand_shortcode(inner, from, links)?),
        }
        rest = &rest[inner_start + len + close.len()..];
    }
    out.push_str(rest);
    Ok(Cow::Owned(out))
}

fn next_shortcode(s: &str) -> Option<usize> {
    [s.find("{{<"), s.find("{{%")].into_iter().flatten().min()
}

fn expand_shortcode(inner: &str, from: &str, links: &LinkResolver) -> Result<String, MarkdownError> {
    let (name, args) = inner.split_once(char::is_whitespace).unwrap_or((inner, ""));
    match name {
        "ref" | "relref" => links.resolve(from, args.trim().trim_matches('"'), true),
        _ => Err(MarkdownError::UnknownShortcode {
            name: name.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets() -> HashMap<String, String> {
        [
            ("basics/variables.md", "/basics/variables/"),
            ("basics/constants.md", "/basics/constants/"),
            ("basics/_index.md", "/basics/"),
            ("advanced/generics.md", "/advanced/generics/"),
            ("search.md", "/search/"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn render_in(body: &str, from: &str) -> Result<Rendered, MarkdownError> {
        let base = BaseUrl::parse("https://gopedia.ru/").unwrap();
        let targets = targets();
        let links = LinkResolver {
            base: &base,
            targets: &targets,
        };
        render(body, from, &links)
    }

    #[test]
    fn renders_commonmark_and_tables() {
        let r = render_in("# Title\n\n| a | b |\n|---|---|\n| 1 | 2 |\n", "x.md").unwrap();
        assert!(r.html.contains("<table>"));
        assert!(r.html.contains("<h1 id=\"title\">Title</h1>"));
    }

    #[test]
    fn strikethrough_footnotes_and_tasks() {
        let r = render_in("~~old~~ text[^1]\n\n- [x] done\n\n[^1]: note\n", "x.md").unwrap();
        assert!(r.html.contains("<del>old</del>"));
        assert!(r.html.contains("footnote"));
        assert!(r.html.contains("checkbox"));
    }

    #[test]
    fn relative_md_link_resolves_to_permalink() {
        let r = render_in("[c](constants.md)", "basics/variables.md").unwrap();
        assert!(r.html.contains("href=\"https://gopedia.ru/basics/constants/\""));
    }

    #[test]
    fn parent_relative_link_keeps_fragment() {
        let r = render_in("[v](../basics/variables.md#decl)", "advanced/generics.md").unwrap();
        assert!(r.html.contains("href=\"https://gopedia.ru/basics/variables/#decl\""));
    }

    #[test]
    fn content_rooted_link_resolves() {
        let r = render_in("[g](/advanced/generics.md)", "basics/variables.md").unwrap();
        assert!(r.html.contains("href=\"https://gopedia.ru/advanced/generics/\""));
    }

    #[test]
    fn missing_md_target_is_broken_reference() {
        let err = render_in("[p](pointers.md)", "basics/variables.md").unwrap_err();
        assert_eq!(
            err,
            MarkdownError::BrokenReference {
                target: "pointers.md".to_string()
            }
        );
    }

    #[test]
    fn external_and_anchor_links_unchanged() {
        let r = render_in(
            "[a](https://go.dev/) [b](mailto:team@gopedia.ru) [c](#top) [d](//cdn.example.com/x.js)",
            "x.md",
        )
        .unwrap();
        assert!(r.html.contains("href=\"https://go.dev/\""));
        assert!(r.html.contains("href=\"mailto:team@gopedia.ru\""));
        assert!(r.html.contains("href=\"#top\""));
        assert!(r.html.contains("href=\"//cdn.example.com/x.js\""));
    }

    #[test]
    fn site_rooted_image_gets_base_url() {
        let r = render_in("![g](/images/gopher.svg)", "x.md").unwrap();
        assert!(r.html.contains("src=\"https://gopedia.ru/images/gopher.svg\""));
    }

    #[test]
    fn md_link_keeps_query_and_fragment() {
        let r = render_in("[c](constants.md?tab=1#iota)", "basics/variables.md").unwrap();
        assert!(r.html.contains("href=\"https://gopedia.ru/basics/constants/?tab=1#iota\""));
    }

    #[test]
    fn relative_asset_link_points_at_resource_output() {
        let r = render_in("[d](diagram.txt) ![p](img/Plot.png)", "Basics/loops.md").unwrap();
        assert!(r.html.contains("href=\"https://gopedia.ru/basics/diagram.txt\""));
        assert!(r.html.contains("src=\"https://gopedia.ru/basics/img/Plot.png\""));
        assert_eq!(
            r.local_links,
            vec![
                LocalLink {
                    target: "diagram.txt".to_string(),
                    path: "/basics/diagram.txt".to_string(),
                },
                LocalLink {
                    target: "img/Plot.png".to_string(),
                    path: "/basics/img/Plot.png".to_string(),
                },
            ]
        );
    }

    #[test]
    fn relative_directory_link_points_at_section() {
        let r = render_in("[a](../advanced/)", "basics/loops.md").unwrap();
        assert!(r.html.contains("href=\"https://gopedia.ru/advanced/\""));
        assert_eq!(r.local_links[0].path, "/advanced/");
    }

    #[test]
    fn site_rooted_link_is_recorded_without_query() {
        let r = render_in("[n](/images/nope.svg?v=2)", "basics/loops.md").unwrap();
        assert!(r.html.contains("href=\"https://gopedia.ru/images/nope.svg?v=2\""));
        assert_eq!(r.local_links[0].path, "/images/nope.svg");
    }

    #[test]
    fn relative_link_above_content_root_is_broken() {
        let err = render_in("[x](../../etc/passwd)", "basics/loops.md").unwrap_err();
        assert!(matches!(err, MarkdownError::BrokenReference { .. }));
    }

    // =========================================================================
    // Shortcodes
    // =========================================================================

    #[test]
    fn ref_shortcode_falls_back_to_content_root() {
        let r = render_in("[g]({{< ref \"advanced/generics.md\" >}})", "basics/variables.md").unwrap();
        assert!(r.html.contains("href=\"https://gopedia.ru/advanced/generics/\""));
    }

    #[test]
    fn relref_accepts_extensionless_and_sections() {
        let r = render_in(
            "[a]({{< relref \"constants\" >}}) [b]({{% relref \"/basics/\" %}})",
            "basics/variables.md",
        )
        .unwrap();
        assert!(r.html.contains("href=\"https://gopedia.ru/basics/constants/\""));
        assert!(r.html.contains("href=\"https://gopedia.ru/basics/\""));
    }

    #[test]
    fn ref_to_missing_target_is_error() {
        let err = render_in("{{< ref \"nope.md\" >}}", "x.md").unwrap_err();
        assert!(matches!(err, MarkdownError::BrokenReference { .. }));
    }

    #[test]
    fn unknown_shortcode_is_error() {
        let err = render_in("{{< youtube abc >}}", "x.md").unwrap_err();
        assert_eq!(
            err,
            MarkdownError::UnknownShortcode {
                name: "youtube".to_string()
            }
        );
    }

    #[test]
    fn unterminated_shortcode_is_error() {
        let err = render_in("{{< ref \"x.md\"", "x.md").unwrap_err();
        assert_eq!(err, MarkdownError::UnterminatedShortcode);
    }

    #[test]
    fn escaped_shortcode_is_literal() {
        let r = render_in("`{{</* ref \"x.md\" */>}}`", "x.md").unwrap();
        assert!(r.html.contains("{{&lt; ref \"x.md\" &gt;}}") || r.html.contains("{{&lt; ref &quot;x.md&quot; &gt;}}"));
    }

    // =========================================================================
    // Headings and TOC
    // =========================================================================

    #[test]
    fn duplicate_headings_get_unique_ids() {
        let r = render_in("## Объявление\n\n## Объявление\n", "x.md").unwrap();
        assert!(r.html.contains("id=\"объявление\""));
        assert!(r.html.contains("id=\"объявление-1\""));
    }

    #[test]
    fn explicit_id_colliding_with_earlier_heading_is_made_unique() {
        let r = render_in("## Custom\n\n## Other {#custom}\n", "x.md").unwrap();
        assert!(r.html.contains("id=\"custom\""));
        assert!(r.html.contains("id=\"custom-1\""));
        let ids: Vec<&str> = r.toc.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["custom", "custom-1"]);
    }

    #[test]
    fn explicit_heading_id_is_kept() {
        let r = render_in("## Intro {#custom}\n", "x.md").unwrap();
        assert!(r.html.contains("id=\"custom\""));
        assert_eq!(r.toc[0].id, "custom");
    }

    #[test]
    fn toc_covers_h2_to_h4() {
        let r = render_in("# A\n## B\n### C `code`\n#### D\n##### E\n", "x.md").unwrap();
        let titles: Vec<&str> = r.toc.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "C code", "D"]);
        assert_eq!(r.toc[1].level, 3);
    }

    // =========================================================================
    // Plain text, word count, reading time, summary
    // =========================================================================

    #[test]
    fn word_count_ignores_markup() {
        let r = render_in("Hello **bold** world.\n\n- one\n- two\n", "x.md").unwrap();
        assert_eq!(r.word_count, 5);
        assert_eq!(r.plain_text, "Hello bold world. one two");
    }

    #[test]
    fn reading_time_rounds_up() {
        let r = Rendered {
            word_count: 214,
            ..Default::default()
        };
        assert_eq!(r.reading_time(), 2);
        assert_eq!(Rendered::default().reading_time(), 0);
    }

    #[test]
    fn summary_truncates_long_text() {
        let text = vec!["слово"; 100].join(" ");
        let r = render_in(&text, "x.md").unwrap();
        let summary = r.summary();
        assert!(summary.ends_with('…'));
        assert_eq!(summary.trim_end_matches('…').split_whitespace().count(), SUMMARY_WORDS);

        let short = render_in("Коротко.", "x.md").unwrap();
        assert_eq!(short.summary(), "Коротко.");
    }
}
