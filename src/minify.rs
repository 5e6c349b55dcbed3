//! HTML and XML minification.
//!
//! Gated by the build's minify switch: when it is off, content passes
//! through untouched.

use std::borrow::Cow;

/// Content type for minification.
pub enum MinifyType<'a> {
    Html(&'a [u8]),
    Xml(&'a [u8]),
}

impl<'a> MinifyType<'a> {
    /// Pick the minifier from an output path; other files are not minified.
    pub fn for_path(path: &str, content: &'a [u8]) -> Option<Self> {
        if path.ends_with(".html") {
            Some(MinifyType::Html(content))
        } else if path.ends_with(".xml") {
            Some(MinifyType::Xml(content))
        } else {
            None
        }
    }
}

/// Returns `Cow::Borrowed` when disabled, `Cow::Owned` when minified.
pub fn minify<'a>(content: MinifyType<'a>, enabled: bool) -> Cow<'a, [u8]> {
    match (content, enabled) {
        (MinifyType::Html(html), false) | (MinifyType::Xml(html), false) => Cow::Borrowed(html),
        (MinifyType::Html(html), true) => Cow::Owned(minify_html_inner(html)),
        (MinifyType::Xml(xml), true) => Cow::Owned(minify_xml_inner(xml)),
    }
}

fn minify_html_inner(html: &[u8]) -> Vec<u8> {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = false;
    cfg.minify_css = true;
    cfg.minify_js = true;
    cfg.remove_bangs = true;
    cfg.remove_processing_instructions = true;
    minify_html::minify(html, &cfg)
}

/// Line-trimming XML minifier. Text nodes never span lines in generated feeds.
fn minify_xml_inner(xml: &[u8]) -> Vec<u8> {
    String::from_utf8_lossy(xml)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<String>()
        .into_bytes()
}
