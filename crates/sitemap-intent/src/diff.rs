//! Set difference between a crawl and the previous snapshot.
//!
//! Identity is the normalized URL. `lastmod` is never consulted.

use crate::normalizer::normalize;
use crate::snapshot::Snapshot;
use crate::types::{UrlRecord, UNKNOWN};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A URL that disappeared since the prior snapshot. Not re-classified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedUrl {
    pub url: String,
    pub path: String,
    /// Category the URL had when it was last seen.
    pub intent_category: String,
    pub last_seen_snapshot: String,
}

/// Result of diffing one crawl.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffReport {
    pub previous_snapshot_id: Option<String>,
    /// New URLs in crawl order.
    pub new_urls: Vec<String>,
    /// Removed URLs in prior-snapshot order.
    pub removed_urls: Vec<RemovedUrl>,
}

impl DiffReport {
    pub fn is_first_run(&self) -> bool {
        self.previous_snapshot_id.is_none()
    }
}

/// Mark `is_new` on `records` and collect the removed URLs.
///
/// Without a prior snapshot every record is new and nothing is removed.
pub fn diff_against(records: &mut [UrlRecord], prior: Option<&Snapshot>) -> DiffReport {
    diff_sample(records, None, prior)
}

/// [`diff_against`] for a run that classified only a sample of the site.
///
/// `site_urls` lists every identity the site currently has. A URL counts as
/// new only if the prior snapshot never listed it, and as removed only if
/// it is missing from `site_urls`, so a shifting sample window reports no
/// change by itself.
pub fn diff_sample(
    records: &mut [UrlRecord],
    site_urls: Option<&[String]>,
    prior: Option<&Snapshot>,
) -> DiffReport {
    let Some(prior) = prior else {
        for record in records.iter_mut() {
            record.is_new = true;
        }
        return DiffReport {
            previous_snapshot_id: None,
            new_urls: records.iter().map(|r| r.url.clone()).collect(),
            removed_urls: Vec::new(),
        };
    };

    let old = prior.urls();
    let mut new_urls = Vec::new();
    for record in records.iter_mut() {
        record.is_new = !old.contains(record.url.as_str());
        if record.is_new {
            new_urls.push(record.url.clone());
        }
    }

    let current: HashSet<&str> = match site_urls {
        Some(urls) => urls.iter().map(String::as_str).collect(),
        None => records.iter().map(|r| r.url.as_str()).collect(),
    };
    let classified: HashMap<&str, &UrlRecord> =
        prior.records.iter().map(|r| (r.url.as_str(), r)).collect();
    let removed_urls = prior
        .site_identities()
        .into_iter()
        .filter(|url| !current.contains(url))
        .map(|url| {
            let (path, intent_category) = match classified.get(url) {
                Some(r) => (r.path.clone(), r.intent_category.clone()),
                None => (
                    normalize(url).map(|n| n.path).unwrap_or_default(),
                    UNKNOWN.to_string(),
                ),
            };
            RemovedUrl {
                url: url.to_string(),
                path,
                intent_category,
                last_seen_snapshot: prior.id.clone(),
            }
        })
        .collect();

    DiffReport {
        previous_snapshot_id: Some(prior.id.clone()),
        new_urls,
        removed_urls,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::RuleClassifier;
    use crate::sitemap::{SampleInfo, SampleStrategy};

    fn records(urls: &[&str]) -> Vec<UrlRecord> {
        let rules = RuleClassifier::default();
        urls.iter()
            .map(|u| rules.classify_url(normalize(u).unwrap(), None))
            .collect()
    }

    fn prior(urls: &[&str]) -> Snapshot {
        Snapshot::new("example.com", records(urls))
    }

    #[test]
    fn test_abc_to_bcd() {
        let old = prior(&["https://e.com/a", "https://e.com/b", "https://e.com/c"]);
        let mut new = records(&["https://e.com/b", "https://e.com/c", "https://e.com/d"]);
        let report = diff_against(&mut new, Some(&old));

        assert_eq!(report.new_urls, vec!["https://e.com/d"]);
        let removed: Vec<_> = report.removed_urls.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(removed, vec!["https://e.com/a"]);
        assert_eq!(report.removed_urls[0].last_seen_snapshot, old.id);

        let flags: Vec<_> = new.iter().map(|r| r.is_new).collect();
        assert_eq!(flags, vec![false, false, true]);
    }

    #[test]
    fn test_first_run_marks_everything_new() {
        let mut new = records(&["https://e.com/a", "https://e.com/b"]);
        let report = diff_against(&mut new, None);
        assert!(report.is_first_run());
        assert!(report.removed_urls.is_empty());
        assert_eq!(report.new_urls.len(), 2);
        assert!(new.iter().all(|r| r.is_new));
    }

    #[test]
    fn test_rerun_clears_stale_flags() {
        let old = prior(&["https://e.com/a"]);
        let mut new = records(&["https://e.com/a"]);
        new[0].is_new = true;
        let report = diff_against(&mut new, Some(&old));
        assert!(report.new_urls.is_empty());
        assert!(!new[0].is_new);
    }

    fn site(urls: &[&str]) -> Vec<String> {
        urls.iter().map(|u| u.to_string()).collect()
    }

    #[test]
    fn test_sample_window_shift_is_not_a_change() {
        let all = site(&["https://e.com/a", "https://e.com/b", "https://e.com/c", "https://e.com/d"]);
        let sample = SampleInfo {
            strategy: SampleStrategy::Random,
            discovered: 4,
            kept: 2,
        };
        let old = prior(&["https://e.com/a", "https://e.com/b"]).with_sample(all.clone(), sample);

        let mut new = records(&["https://e.com/c", "https://e.com/d"]);
        let report = diff_sample(&mut new, Some(&all), Some(&old));
        assert!(report.new_urls.is_empty());
        assert!(report.removed_urls.is_empty());
        assert!(new.iter().all(|r| !r.is_new));

        // A URL that really left the site is still removed, even unclassified.
        let shrunk = site(&["https://e.com/a", "https://e.com/b", "https://e.com/c", "https://e.com/e"]);
        let mut new = records(&["https://e.com/c", "https://e.com/e"]);
        let report = diff_sample(&mut new, Some(&shrunk), Some(&old));
        assert_eq!(report.new_urls, vec!["https://e.com/e"]);
        assert_eq!(report.removed_urls.len(), 1);
        assert_eq!(report.removed_urls[0].url, "https://e.com/d");
        assert_eq!(report.removed_urls[0].path, "/d");
        assert_eq!(report.removed_urls[0].intent_category, UNKNOWN);
    }

    #[test]
    fn test_scheme_change_is_add_plus_remove() {
        let old = prior(&["http://e.com/a"]);
        let mut new = records(&["https://e.com/a"]);
        let report = diff_against(&mut new, Some(&old));
        assert_eq!(report.new_urls, vec!["https://e.com/a"]);
        assert_eq!(report.removed_urls[0].url, "http://e.com/a");
    }

    #[test]
    fn test_trailing_slash_and_query_are_same_identity() {
        let old = prior(&["https://e.com/a/"]);
        let mut new = records(&["https://e.com/a?utm_source=x"]);
        let report = diff_against(&mut new, Some(&old));
        assert!(report.new_urls.is_empty());
        assert!(report.removed_urls.is_empty());
    }

    #[test]
    fn test_lastmod_is_ignored() {
        let mut old_records = records(&["https://e.com/a"]);
        old_records[0].lastmod = Some("2020-01-01".into());
        let old = Snapshot::new("e.com", old_records);
        let mut new = records(&["https://e.com/a"]);
        new[0].lastmod = Some("2026-01-01".into());
        let report = diff_against(&mut new, Some(&old));
        assert!(report.new_urls.is_empty());
    }

    #[test]
    fn test_diff_is_exhaustive() {
        let old_urls = ["https://e.com/1", "https://e.com/2", "https://e.com/3", "https://e.com/4"];
        let new_urls = ["https://e.com/3", "https://e.com/4", "https://e.com/5"];
        let old = prior(&old_urls);
        let mut new = records(&new_urls);
        let report = diff_against(&mut new, Some(&old));

        let o: HashSet<_> = old_urls.iter().map(|s| s.to_string()).collect();
        let n: HashSet<_> = new_urls.iter().map(|s| s.to_string()).collect();
        let added: HashSet<_> = report.new_urls.iter().cloned().collect();
        let removed: HashSet<_> = report.removed_urls.iter().map(|r| r.url.clone()).collect();

        assert_eq!(added, n.difference(&o).cloned().collect());
        assert_eq!(removed, o.difference(&n).cloned().collect());
        assert!(n.is_disjoint(&removed));
    }
}
