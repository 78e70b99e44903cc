//! Process-wide set of known WebMD pages, built once from the site's sitemap.
//!
//! The set is filled by a single `load` at start-up and only read afterwards.
//! Requests that arrive before the load finishes see an empty set.

use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::{header, Client};
use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info, instrument, warn};

use crate::constants::BROWSER_USER_AGENT;

/// Sitemap paths tried in order, relative to the site root.
const SITEMAP_PATHS: &[&str] = &["/sitemap.xml", "/sitemap_index.xml", "/sitemap/sitemap.xml"];

/// Default-page suffixes synthesised for every known entry.
pub const COMMON_SUFFIXES: &[&str] = &["/default.htm", "/default.aspx", "/index.htm", "/index.aspx"];

/// Installed when no sitemap location yields a usable document.
pub const FALLBACK_URLS: &[&str] = &[
    "https://www.webmd.com",
    "https://www.webmd.com/conditions",
    "https://www.webmd.com/drugs",
    "https://www.webmd.com/well-being",
    "https://www.webmd.com/tools",
    "https://www.webmd.com/news",
    "https://www.webmd.com/mental-health",
    "https://www.webmd.com/diet",
    "https://www.webmd.com/fitness-exercise",
    "https://www.webmd.com/women",
    "https://www.webmd.com/men",
    "https://www.webmd.com/children",
    "https://www.webmd.com/symptom-checker",
    "https://www.webmd.com/a-to-z-guides",
    "https://www.webmd.com/drugs/index-drugs",
    "https://www.webmd.com/diet/features",
    "https://www.webmd.com/fitness-exercise/features",
    "https://www.webmd.com/mental-health/features",
    "https://www.webmd.com/children/features",
    "https://www.webmd.com/women/features",
    "https://www.webmd.com/men/features",
];

/// Where the current set of URLs came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapSource {
    /// A sitemap document fetched from this location.
    Location(String),
    /// The hard-coded list of landing pages.
    Fallback,
}

#[derive(Debug, Default)]
pub struct SitemapCache {
    urls: RwLock<HashSet<String>>,
}

impl SitemapCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache holding exactly `urls`, without derived entries.
    pub fn from_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: RwLock::new(urls.into_iter().map(Into::into).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Populate the cache from the first sitemap location that yields a
    /// `urlset`, falling back to [`FALLBACK_URLS`]. Never fails.
    #[instrument(skip(self, client))]
    pub async fn load(&self, client: &Client, site_root: &str) -> SitemapSource {
        let mut base = HashSet::new();
        let mut source = SitemapSource::Fallback;

        for location in sitemap_locations(site_root) {
            info!("Attempting to load sitemap from: {}", location);
            let parsed = match fetch_sitemap(client, &location).await {
                Ok(xml) => parse_sitemap_locs(&xml),
                Err(e) => Err(e),
            };
            match parsed {
                Ok(locs) => {
                    base.extend(
                        locs.iter()
                            .filter(|loc| loc.starts_with(site_root))
                            .map(|loc| loc.trim().to_string()),
                    );
                    info!("Successfully loaded {} URLs from sitemap", base.len());
                    source = SitemapSource::Location(location);
                    break;
                }
                Err(e) => {
                    warn!("Failed to load sitemap from {}: {:#}", location, e);
                }
            }
        }

        if source == SitemapSource::Fallback {
            info!("Using fallback set of known valid WebMD URLs");
            base = FALLBACK_URLS.iter().map(|url| url.to_string()).collect();
        }

        let urls = with_derived_entries(base);
        info!("Total valid URLs: {}", urls.len());
        self.install(urls);
        source
    }

    /// Membership test with the permissive prefix rule: any URL nested under a
    /// known entry counts as known.
    pub fn is_known(&self, url: &str) -> bool {
        let normalized = url.strip_suffix('/').unwrap_or(url).to_lowercase();
        let urls = self.read();
        if urls.contains(&normalized) {
            return true;
        }
        urls.iter()
            .any(|known| normalized.starts_with(&known.to_lowercase()))
    }

    fn install(&self, urls: HashSet<String>) {
        let mut guard = match self.urls.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = urls;
    }

    fn read(&self) -> RwLockReadGuard<'_, HashSet<String>> {
        match self.urls.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

pub fn sitemap_locations(site_root: &str) -> Vec<String> {
    let root = site_root.trim_end_matches('/');
    SITEMAP_PATHS
        .iter()
        .map(|path| format!("{}{}", root, path))
        .collect()
}

/// Add every [`COMMON_SUFFIXES`] variant of each entry that does not already
/// end with it.
pub fn with_derived_entries(base: HashSet<String>) -> HashSet<String> {
    let mut urls = base.clone();
    for url in &base {
        for suffix in COMMON_SUFFIXES {
            if !url.ends_with(suffix) {
                urls.insert(format!("{}{}", url, suffix));
            }
        }
    }
    urls
}

async fn fetch_sitemap(client: &Client, location: &str) -> Result<String> {
    let response = client
        .get(location)
        .header(header::USER_AGENT, BROWSER_USER_AGENT)
        .header(header::ACCEPT, "application/xml, text/xml, */*")
        .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
        .send()
        .await
        .context(format!("Failed to request sitemap at {}", location))?
        .error_for_status()?;

    response
        .text()
        .await
        .context("Failed to read sitemap body")
}

/// Extract the raw `<loc>` values of a `<urlset>` document.
///
/// Tag names are compared case-insensitively and namespace prefixes are
/// ignored. A document that is not a `urlset` with at least one `url` entry
/// is rejected, which includes sitemap indexes.
pub fn parse_sitemap_locs(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut root: Option<String> = None;
    let mut url_entries = 0usize;
    let mut in_url = false;
    let mut in_loc = false;
    let mut current_loc = String::new();
    let mut locs = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_lowercase();
                if root.is_none() {
                    root = Some(name);
                } else if name == "url" {
                    in_url = true;
                    url_entries += 1;
                    current_loc.clear();
                } else if name == "loc" && in_url {
                    in_loc = true;
                    current_loc.clear();
                }
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_lowercase();
                if root.is_none() {
                    root = Some(name);
                } else if name == "url" {
                    url_entries += 1;
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_lowercase();
                match name.as_str() {
                    "loc" if in_loc => {
                        in_loc = false;
                    }
                    "url" if in_url => {
                        if !current_loc.is_empty() {
                            locs.push(std::mem::take(&mut current_loc));
                        }
                        in_url = false;
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) if in_loc => {
                let text = e.unescape().context("Invalid text in <loc>")?;
                current_loc.push_str(&text);
            }
            Ok(Event::CData(e)) if in_loc => {
                current_loc.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "XML parse error at position {}: {}",
                    reader.buffer_position(),
                    e
                ));
            }
            _ => {}
        }
        buf.clear();
    }

    match root.as_deref() {
        Some("urlset") if url_entries > 0 => {
            debug!(entries = url_entries, locs = locs.len(), "Parsed urlset");
            Ok(locs)
        }
        Some(other) => anyhow::bail!("Expected a urlset with url entries, found <{}>", other),
        None => anyhow::bail!("Empty sitemap document"),
    }
}
