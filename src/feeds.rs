//! Machine-readable outputs: RSS feeds, sitemap, robots.txt and the search
//! index.
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
//!   <url>
//!     <loc>https://gopedia.ru/basics/variables/</loc>
//!     <lastmod>2023-01-12T09:00:00+03:00</lastmod>
//!   </url>
//! </urlset>
//! ```
//!
//! Every function here takes absolute URLs and returns text; none of them
//! embed the build time, so feeds are byte-identical across rebuilds.

use chrono::{DateTime, FixedOffset};
use rss::validation::Validate;
use rss::{ChannelBuilder, GuidBuilder, ItemBuilder};
use serde::Serialize;
use thiserror::Error;

/// XML namespace for sitemap
const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

const GENERATOR: &str = concat!("sitepress ", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("rss validation failed: {0}")]
    Validation(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Channel-level fields of one RSS feed.
#[derive(Debug, Clone)]
pub struct Channel<'a> {
    pub title: &'a str,
    /// Absolute URL of the page the feed describes.
    pub link: &'a str,
    pub description: &'a str,
    pub language: &'a str,
}

/// One feed item.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub title: String,
    /// Absolute permalink; doubles as the GUID.
    pub link: String,
    pub date: Option<DateTime<FixedOffset>>,
    pub summary: String,
}

/// Render an RSS 2.0 document.
pub fn rss(channel: &Channel, entries: &[FeedEntry]) -> Result<String, FeedError> {
    let items: Vec<rss::Item> = entries
        .iter()
        .map(|entry| {
            ItemBuilder::default()
                .title(entry.title.clone())
                .link(Some(entry.link.clone()))
                .guid(GuidBuilder::default().permalink(true).value(entry.link.clone()).build())
                .description((!entry.summary.is_empty()).then(|| entry.summary.clone()))
                .pub_date(entry.date.map(|d| d.to_rfc2822()))
                .build()
        })
        .collect();

    let language = (!channel.language.is_empty()).then(|| channel.language.to_string());
    let channel = ChannelBuilder::default()
        .title(channel.title)
        .link(channel.link)
        .description(channel.description)
        .language(language)
        .generator(GENERATOR.to_string())
        .items(items)
        .build();

    channel
        .validate()
        .map_err(|e| FeedError::Validation(e.to_string()))?;
    Ok(channel.to_string())
}

/// Single URL entry in the sitemap.
#[derive(Debug, Clone)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: Option<DateTime<FixedOffset>>,
}

pub fn sitemap(entries: &[SitemapEntry]) -> String {
    let mut xml = String::with_capacity(128 + entries.len() * 96);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(&format!(r#"<urlset xmlns="{SITEMAP_NS}">"#));
    xml.push('\n');
    for entry in entries {
        xml.push_str("  <url>\n");
        xml.push_str(&format!("    <loc>{}</loc>\n", escape_xml(&entry.loc)));
        if let Some(lastmod) = entry.lastmod {
            xml.push_str(&format!(
                "    <lastmod>{}</lastmod>\n",
                lastmod.format("%Y-%m-%dT%H:%M:%S%:z")
            ));
        }
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

/// `robots.txt` allowing everything and pointing at the sitemap.
pub fn robots(sitemap_url: &str) -> String {
    format!("User-agent: *\nAllow: /\n\nSitemap: {sitemap_url}\n")
}

/// One record of `index.json`, the client-side search index.
#[derive(Debug, Clone, Serialize)]
pub struct SearchEntry {
    pub title: String,
    pub content: String,
    pub permalink: String,
    pub summary: String,
}

pub fn search_index(entries: &[SearchEntry]) -> Result<String, FeedError> {
    Ok(serde_json::to_string(entries)?)
}

/// Escape special XML characters.
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
