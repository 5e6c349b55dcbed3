//! Site configuration module.
//!
//! Handles loading, validating, and merging `config.yaml`. Exactly one
//! configuration document governs a build: it lives at the site root next to
//! `content/` and may be spelled `config.yaml` or `config.yml` (but not both).
//!
//! ## Site Layout
//!
//! ```text
//! site/
//! ├── config.yaml          # This file (required)
//! ├── content/             # Markdown documents, one directory per section
//! └── static/              # Copied verbatim into the output root (optional)
//! ```
//!
//! ## Configuration Options
//!
//! ```yaml
//! baseURL: "https://gopedia.ru/"   # required
//! title: "Gopedia"
//! languageCode: "ru"
//! paginate: 10
//! theme: "PaperMod"
//! enableRobotsTXT: true
//! buildDrafts: false
//! buildFuture: false
//! minify: false
//! googleAnalytics: ""
//! outputs:
//!   home: [HTML, RSS, JSON]
//! taxonomies:
//!   tag: tags
//! menu:
//!   main:
//!     - { identifier: search, name: "Search", url: /search/, weight: 10 }
//! params:
//!   ShowReadingTime: true
//!   ShowBreadCrumbs: true
//!   ShowWordCount: true
//!   ShowToc: true
//!   profileMode: { enabled: false }
//! deployment:
//!   bucket: "gopedia.ru"
//!   endpoint: "https://storage.yandexcloud.net"
//!   mode: mirror
//! ```
//!
//! ## Partial Configuration
//!
//! The file is sparse: user values are merged over the stock defaults, so only
//! `baseURL` has to be present. Mappings merge key by key, lists and scalars
//! replace the default wholesale.
//!
//! Unknown top-level keys are rejected to catch typos early. Unknown keys under
//! `params` are kept in [`Params::extra`] because that block is the site's own
//! namespace.
//!
//! Deploy credentials are never read from this file; see
//! [`crate::deploy::S3Settings::resolve`].

use crate::naming::BaseUrl;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Candidate file names for the site configuration, in lookup order.
pub const CONFIG_FILENAMES: &[&str] = &["config.yaml", "config.yml"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("No config.yaml found in {0}")]
    NotFound(PathBuf),
    #[error("Both {0} and {1} exist; keep exactly one site configuration")]
    Ambiguous(PathBuf, PathBuf),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.yaml`.
///
/// Immutable once loaded; the build threads a reference to it through every
/// stage instead of consulting global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute base URL every permalink is built from.
    #[serde(rename = "baseURL")]
    pub base_url: String,
    /// Site title (header, feeds, home page `<title>`).
    pub title: String,
    /// Content language, emitted as `<html lang>` and the RSS language.
    #[serde(rename = "languageCode")]
    pub language_code: String,
    /// Entries per section list page.
    pub paginate: usize,
    /// Theme name. Recorded for reference; the built-in layout renders it.
    pub theme: String,
    #[serde(rename = "enableRobotsTXT")]
    pub enable_robots_txt: bool,
    /// Default for `build --build-drafts`.
    #[serde(rename = "buildDrafts")]
    pub build_drafts: bool,
    /// Default for `build --build-future`.
    #[serde(rename = "buildFuture")]
    pub build_future: bool,
    /// Default for `build --minify`.
    pub minify: bool,
    /// Google Analytics measurement id. Empty disables the tag.
    #[serde(rename = "googleAnalytics")]
    pub google_analytics: String,
    pub outputs: OutputsConfig,
    /// Taxonomies as `singular: plural`, e.g. `tag: tags`.
    pub taxonomies: BTreeMap<String, String>,
    pub menu: MenuConfig,
    pub params: Params,
    pub deployment: DeploymentConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            title: "My New Site".to_string(),
            language_code: "en".to_string(),
            paginate: 10,
            theme: String::new(),
            enable_robots_txt: true,
            build_drafts: false,
            build_future: false,
            minify: false,
            google_analytics: String::new(),
            outputs: OutputsConfig::default(),
            taxonomies: BTreeMap::new(),
            menu: MenuConfig::default(),
            params: Params::default(),
            deployment: DeploymentConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("baseURL is required".into()));
        }
        BaseUrl::parse(&self.base_url)
            .map_err(|e| ConfigError::Validation(format!("baseURL: {e}")))?;
        if self.paginate == 0 {
            return Err(ConfigError::Validation("paginate must be at least 1".into()));
        }
        for (i, entry) in self.menu.main.iter().enumerate() {
            if entry.name.trim().is_empty() || entry.url.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "menu.main[{i}] needs both name and url"
                )));
            }
        }
        for (singular, plural) in &self.taxonomies {
            if singular.trim().is_empty() || plural.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "taxonomies entries must be non-empty `singular: plural` pairs".into(),
                ));
            }
        }
        if StrftimeItems::new(&self.params.date_format).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::Validation(format!(
                "params.DateFormat {:?} is not a valid strftime pattern",
                self.params.date_format
            )));
        }
        if self.deployment.parallelism == 0 {
            return Err(ConfigError::Validation(
                "deployment.parallelism must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Main menu entries in display order (weight, then name).
    pub fn sorted_menu(&self) -> Vec<&MenuEntry> {
        let mut entries: Vec<&MenuEntry> = self.menu.main.iter().collect();
        entries.sort_by(|a, b| (a.weight, &a.name).cmp(&(b.weight, &b.name)));
        entries
    }
}

/// Output formats produced for the home page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    #[serde(rename = "HTML")]
    Html,
    #[serde(rename = "RSS")]
    Rss,
    #[serde(rename = "JSON")]
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputsConfig {
    pub home: Vec<OutputFormat>,
}

impl Default for OutputsConfig {
    fn default() -> Self {
        Self {
            home: vec![OutputFormat::Html, OutputFormat::Rss, OutputFormat::Json],
        }
    }
}

impl OutputsConfig {
    /// RSS feeds (`index.xml`) for home and sections.
    pub fn rss(&self) -> bool {
        self.home.contains(&OutputFormat::Rss)
    }

    /// Search index (`index.json`).
    pub fn json(&self) -> bool {
        self.home.contains(&OutputFormat::Json)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MenuConfig {
    pub main: Vec<MenuEntry>,
}

/// One navigation entry in `menu.main`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MenuEntry {
    pub identifier: String,
    pub name: String,
    /// Site-rooted (`/search/`) or absolute (`https://...`) URL.
    pub url: String,
    pub weight: i64,
}

/// The `params` block: theme feature toggles plus arbitrary site keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    pub description: String,
    pub keywords: Vec<String>,
    pub author: String,
    /// strftime pattern used for displayed dates.
    #[serde(rename = "DateFormat")]
    pub date_format: String,
    #[serde(rename = "ShowReadingTime")]
    pub show_reading_time: bool,
    #[serde(rename = "ShowBreadCrumbs")]
    pub show_breadcrumbs: bool,
    #[serde(rename = "ShowWordCount")]
    pub show_word_count: bool,
    #[serde(rename = "ShowToc")]
    pub show_toc: bool,
    #[serde(rename = "TocOpen")]
    pub toc_open: bool,
    #[serde(rename = "ShowPostNavLinks")]
    pub show_post_nav_links: bool,
    pub analytics: AnalyticsConfig,
    #[serde(rename = "profileMode")]
    pub profile_mode: ProfileMode,
    #[serde(rename = "fuseOpts")]
    pub fuse_opts: FuseOpts,
    /// Every other key under `params`.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            description: String::new(),
            keywords: Vec::new(),
            author: String::new(),
            date_format: "%Y-%m-%d".to_string(),
            show_reading_time: true,
            show_breadcrumbs: true,
            show_word_count: false,
            show_toc: false,
            toc_open: false,
            show_post_nav_links: true,
            analytics: AnalyticsConfig::default(),
            profile_mode: ProfileMode::default(),
            fuse_opts: FuseOpts::default(),
            extra: BTreeMap::new(),
        }
    }
}

/// Search-engine verification tags, emitted as `<meta>` elements.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyticsConfig {
    pub google: VerificationTag,
    pub bing: VerificationTag,
    pub yandex: VerificationTag,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerificationTag {
    #[serde(rename = "SiteVerificationTag")]
    pub site_verification_tag: String,
}

/// Home page "profile" layout: avatar, title, subtitle and a row of buttons.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ProfileMode {
    pub enabled: bool,
    pub title: String,
    pub subtitle: String,
    pub image_url: String,
    pub image_title: String,
    pub image_width: u32,
    pub image_height: u32,
    pub buttons: Vec<ProfileButton>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileButton {
    pub name: String,
    pub url: String,
}

/// Client-side search tuning, passed to the search page as data attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct FuseOpts {
    pub is_case_sensitive: bool,
    pub min_match_char_length: usize,
    /// Search index fields to match against.
    pub keys: Vec<String>,
}

impl Default for FuseOpts {
    fn default() -> Self {
        Self {
            is_case_sensitive: false,
            min_match_char_length: 1,
            keys: vec![
                "title".to_string(),
                "permalink".to_string(),
                "summary".to_string(),
                "content".to_string(),
            ],
        }
    }
}

/// Stale-object policy of the deploy sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Destination ends up exactly matching the artifact, removals included.
    #[default]
    Mirror,
    /// New and changed files are uploaded; nothing is deleted.
    Additive,
}

/// The `deployment` block. Holds everything except credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct DeploymentConfig {
    pub bucket: String,
    /// S3-compatible API endpoint, e.g. `https://storage.yandexcloud.net`.
    pub endpoint: String,
    pub region: String,
    /// Canned ACL applied to every uploaded object. Empty sends none.
    pub acl: String,
    pub mode: SyncMode,
    /// Address the bucket as `endpoint/bucket` rather than `bucket.endpoint`.
    pub path_style: bool,
    /// Maximum concurrent uploads.
    pub parallelism: usize,
    /// Retries per request for transient failures.
    pub retries: usize,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            endpoint: String::new(),
            region: "us-east-1".to_string(),
            acl: "public-read".to_string(),
            mode: SyncMode::Mirror,
            path_style: true,
            parallelism: 4,
            retries: 3,
        }
    }
}

/// Per-build switches, resolved from config defaults and CLI flags.
///
/// `now` is the reference instant for future-dated content. It is an input
/// rather than a clock read inside the build so that two builds of the same
/// inputs produce the same artifact.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Overrides `baseURL` when set.
    pub base_url: Option<String>,
    pub minify: bool,
    pub build_drafts: bool,
    pub build_future: bool,
    pub now: DateTime<Utc>,
}

impl BuildOptions {
    /// Options with every switch taken from the config file.
    pub fn from_config(config: &SiteConfig, now: DateTime<Utc>) -> Self {
        Self {
            base_url: None,
            minify: config.minify,
            build_drafts: config.build_drafts,
            build_future: config.build_future,
            now,
        }
    }

    /// The base URL this build emits: the override if present, else the config's.
    pub fn effective_base_url<'a>(&'a self, config: &'a SiteConfig) -> &'a str {
        self.base_url.as_deref().unwrap_or(&config.base_url)
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a YAML mapping.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<Value, ConfigError> {
    Ok(serde_yaml::to_value(SiteConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Mappings are merged key-by-key (overlay keys override base keys).
/// - Non-mapping values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_yaml(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(mut base_map), Value::Mapping(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_val) => merge_yaml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_map.insert(key, merged);
            }
            Value::Mapping(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Locate the single configuration file in a site root.
pub fn find_config_file(root: &Path) -> Result<PathBuf, ConfigError> {
    let found: Vec<PathBuf> = CONFIG_FILENAMES
        .iter()
        .map(|name| root.join(name))
        .filter(|p| p.is_file())
        .collect();
    match found.as_slice() {
        [] => Err(ConfigError::NotFound(root.to_path_buf())),
        [single] => Ok(single.clone()),
        [first, second, ..] => Err(ConfigError::Ambiguous(first.clone(), second.clone())),
    }
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(base: Value, overlay: Option<Value>) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(Value::Null) | None => base,
        Some(ov) => merge_yaml(base, ov),
    };
    let config: SiteConfig = serde_yaml::from_value(merged)?;
    config.validate()?;
    Ok(config)
}

/// Parse config text (already read from disk) over the stock defaults.
pub fn parse_config(text: &str) -> Result<SiteConfig, ConfigError> {
    let overlay: Value = serde_yaml::from_str(text)?;
    if !matches!(overlay, Value::Mapping(_) | Value::Null) {
        return Err(ConfigError::Validation(
            "config must be a YAML mapping at the top level".into(),
        ));
    }
    resolve_config(stock_defaults_value()?, Some(overlay))
}

/// Load `config.yaml` from the site root.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let path = find_config_file(root)?;
    let text = fs::read_to_string(&path)?;
    let config = parse_config(&text)?;
    log::debug!("loaded site config from {}", path.display());
    Ok(config)
}

/// An empty YAML mapping; convenient when building values by hand.
pub fn empty_mapping() -> Value {
    Value::Mapping(Mapping::new())
}

/// Returns a fully-commented stock `config.yaml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_yaml() -> &'static str {
    r##"# sitepress configuration
# ======================
# Only baseURL is required; every other key shows its default.

# Absolute URL the site is served from. Every permalink, feed and sitemap
# entry is built from it. `sitepress build --base-url` overrides it.
baseURL: "https://example.org/"

title: "My New Site"
languageCode: "en"

# Entries per section list page.
paginate: 10

# Recorded for reference; the built-in layout renders every site.
theme: ""

enableRobotsTXT: true

# Build switches (each can also be turned on from the command line).
buildDrafts: false
buildFuture: false
minify: false

# Google Analytics measurement id; empty disables the tag.
googleAnalytics: ""

# Extra outputs for the home page: RSS → index.xml, JSON → index.json (search).
outputs:
  home: [HTML, RSS, JSON]

# Taxonomies as `singular: plural`. Terms come from the front-matter key
# named by the plural, e.g. `tags: [basics, syntax]`.
taxonomies:
  tag: tags

menu:
  main: []
  # - identifier: search
  #   name: Search
  #   url: /search/
  #   weight: 10

params:
  description: ""
  keywords: []
  author: ""
  DateFormat: "%Y-%m-%d"      # strftime
  ShowReadingTime: true
  ShowBreadCrumbs: true
  ShowWordCount: false
  ShowToc: false
  TocOpen: false
  ShowPostNavLinks: true
  analytics:
    google:
      SiteVerificationTag: ""
    bing:
      SiteVerificationTag: ""
    yandex:
      SiteVerificationTag: ""
  profileMode:
    enabled: false
    title: ""
    subtitle: ""
    imageUrl: ""
    imageTitle: ""
    imageWidth: 0
    imageHeight: 0
    buttons: []
  fuseOpts:
    isCaseSensitive: false
    minMatchCharLength: 1
    keys: [title, permalink, summary, content]

# Deploy target. Credentials are read from the environment only:
#   SITEPRESS_ACCESS_KEY / SITEPRESS_SECRET_KEY
#   (or AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY)
#   SITEPRESS_ENDPOINT overrides `endpoint`.
deployment:
  bucket: ""
  endpoint: ""
  region: "us-east-1"
  acl: "public-read"
  mode: mirror                # mirror | additive
  pathStyle: true
  parallelism: 4
  retries: 3
"##
}
