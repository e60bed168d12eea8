//! Sitemap documents: parsing, index flattening, and input clamping.
//!
//! Fetching is delegated to a [`SitemapFetcher`]; this module only reads
//! what it returns.

use crate::error::{Error, Result};
use crate::types::SitemapEntry;
use async_trait::async_trait;
use quick_xml::events::Event;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, warn};

/// Returns the raw bytes behind a sitemap location (URL or file path).
#[async_trait]
pub trait SitemapFetcher: Send + Sync {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>>;
}

/// A parsed sitemap body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// `<urlset>` or a plain-text list of URLs.
    UrlSet(Vec<SitemapEntry>),
    /// `<sitemapindex>`: locations of child sitemaps.
    Index(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Root {
    UrlSet,
    Index,
}

/// Parse an XML sitemap, sitemap index, or plain-text sitemap.
pub fn parse_sitemap(location: &str, body: &[u8]) -> Result<SitemapDocument> {
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    if !trimmed.starts_with('<') {
        return Ok(SitemapDocument::UrlSet(parse_text(trimmed)));
    }

    let mut reader = quick_xml::Reader::from_str(trimmed);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut root: Option<Root> = None;
    // Open elements, counting the root as 1. Item fields sit at depth 3;
    // extension children such as `<image:image><image:loc>` sit deeper and
    // never touch the item's own `loc`.
    let mut depth = 0usize;
    let mut in_item = false;
    let mut field = String::new();
    let mut loc = String::new();
    let mut lastmod: Option<String> = None;
    let mut entries = Vec::new();
    let mut children = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                depth += 1;
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_lowercase();
                match (root, depth, name.as_str()) {
                    (None, _, "urlset") => root = Some(Root::UrlSet),
                    (None, _, "sitemapindex") => root = Some(Root::Index),
                    (None, _, other) => {
                        return Err(Error::Sitemap {
                            location: location.to_string(),
                            reason: format!("unrecognized root element <{other}>"),
                        })
                    }
                    (Some(Root::UrlSet), 2, "url") | (Some(Root::Index), 2, "sitemap") => {
                        in_item = true;
                        loc.clear();
                        lastmod = None;
                    }
                    (Some(_), 3, _) if in_item => field = name.clone(),
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) if root.is_none() => {
                match e.local_name().as_ref() {
                    b"urlset" => return Ok(SitemapDocument::UrlSet(Vec::new())),
                    b"sitemapindex" => return Ok(SitemapDocument::Index(Vec::new())),
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) if in_item && depth == 3 => {
                let value = e.unescape().map(|v| v.trim().to_string()).unwrap_or_default();
                assign_field(&field, value, &mut loc, &mut lastmod);
            }
            Ok(Event::CData(ref e)) if in_item && depth == 3 => {
                let value = String::from_utf8_lossy(e).trim().to_string();
                assign_field(&field, value, &mut loc, &mut lastmod);
            }
            Ok(Event::End(_)) => {
                if depth == 3 {
                    field.clear();
                }
                if in_item && depth == 2 {
                    in_item = false;
                    if !loc.is_empty() {
                        match root {
                            Some(Root::UrlSet) => {
                                entries.push(SitemapEntry::new(loc.clone(), lastmod.take()))
                            }
                            Some(Root::Index) => children.push(loc.clone()),
                            None => {}
                        }
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Sitemap {
                    location: location.to_string(),
                    reason: format!("XML error at byte {}: {e}", reader.buffer_position()),
                })
            }
            _ => {}
        }
        buf.clear();
    }

    match root {
        Some(Root::UrlSet) => Ok(SitemapDocument::UrlSet(entries)),
        Some(Root::Index) => Ok(SitemapDocument::Index(children)),
        None => Err(Error::Sitemap {
            location: location.to_string(),
            reason: "document has no root element".to_string(),
        }),
    }
}

fn assign_field(tag: &str, value: String, loc: &mut String, lastmod: &mut Option<String>) {
    if value.is_empty() {
        return;
    }
    match tag {
        "loc" => *loc = value,
        "lastmod" => *lastmod = Some(value),
        _ => {}
    }
}

fn parse_text(text: &str) -> Vec<SitemapEntry> {
    text.lines()
        .map(str::trim)
        .filter(|l| l.starts_with("http://") || l.starts_with("https://"))
        .map(|l| SitemapEntry::new(l, None))
        .collect()
}

/// Entries gathered from a set of sources.
#[derive(Debug, Default)]
pub struct LoadedSitemaps {
    /// Unique by raw URL, first occurrence wins, in document order.
    pub entries: Vec<SitemapEntry>,
    /// Number of sitemap documents read successfully.
    pub documents: usize,
    /// `(location, reason)` for every source that could not be read.
    pub failures: Vec<(String, String)>,
}

/// Fetch `sources`, following sitemap indexes depth-first in document order.
///
/// A location is fetched at most once, so cyclic indexes terminate. A failed
/// source is logged and skipped.
pub async fn load_sitemaps(fetcher: &dyn SitemapFetcher, sources: &[String]) -> LoadedSitemaps {
    let mut loaded = LoadedSitemaps::default();
    let mut seen_docs: HashSet<String> = HashSet::new();
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = sources.iter().cloned().collect();

    while let Some(location) = queue.pop_front() {
        if !seen_docs.insert(location.clone()) {
            continue;
        }
        let parsed = match fetcher.fetch(&location).await {
            Ok(body) => parse_sitemap(&location, &body),
            Err(e) => Err(e),
        };
        match parsed {
            Ok(SitemapDocument::UrlSet(entries)) => {
                loaded.documents += 1;
                debug!(%location, entries = entries.len(), "read urlset");
                for entry in entries {
                    if seen_urls.insert(entry.url.clone()) {
                        loaded.entries.push(entry);
                    }
                }
            }
            Ok(SitemapDocument::Index(children)) => {
                loaded.documents += 1;
                debug!(%location, children = children.len(), "read sitemap index");
                for child in children.into_iter().rev() {
                    queue.push_front(child);
                }
            }
            Err(e) => {
                warn!(%location, "skipping sitemap: {e}");
                loaded.failures.push((location, e.to_string()));
            }
        }
    }
    loaded
}

/// How to cut an oversized input down to `max_urls`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleStrategy {
    /// The first N entries in document order.
    #[default]
    First,
    /// A uniform random N, kept in document order.
    Random,
}

impl std::str::FromStr for SampleStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "first" => Ok(SampleStrategy::First),
            "random" => Ok(SampleStrategy::Random),
            other => Err(format!("unknown sample strategy '{other}' (expected first|random)")),
        }
    }
}

/// How a run's input was cut down, recorded next to the results it produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleInfo {
    pub strategy: SampleStrategy,
    /// Distinct URLs found before clamping.
    pub discovered: usize,
    /// URLs actually classified.
    pub kept: usize,
}

/// Clamp `entries` to at most `max_urls`.
pub fn clamp_entries<T>(entries: Vec<T>, max_urls: usize, strategy: SampleStrategy) -> Vec<T> {
    clamp_entries_with(entries, max_urls, strategy, &mut rand::thread_rng())
}

/// [`clamp_entries`] with a caller-supplied RNG.
pub fn clamp_entries_with<T, R: Rng + ?Sized>(
    mut entries: Vec<T>,
    max_urls: usize,
    strategy: SampleStrategy,
    rng: &mut R,
) -> Vec<T> {
    if entries.len() <= max_urls {
        return entries;
    }
    match strategy {
        SampleStrategy::First => {
            entries.truncate(max_urls);
            entries
        }
        SampleStrategy::Random => {
            let mut picked = rand::seq::index::sample(rng, entries.len(), max_urls).into_vec();
            picked.sort_unstable();
            let mut keep = vec![false; entries.len()];
            for idx in picked {
                keep[idx] = true;
            }
            entries
                .into_iter()
                .zip(keep)
                .filter_map(|(entry, keep)| keep.then_some(entry))
                .collect()
        }
    }
}
