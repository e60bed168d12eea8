//! Grouped views, coverage metrics, and the summary documents.

use crate::diff::{DiffReport, RemovedUrl};
use crate::sitemap::SampleInfo;
use crate::tree::{compare_names, DirectoryNode};
use crate::types::{SortMode, UrlRecord, UNKNOWN};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Version of the summary JSON layout.
pub const SCHEMA_VERSION: &str = "1.0";

/// Default number of sample URLs per group.
pub const DEFAULT_SAMPLE_SIZE: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentGroup {
    pub intent_category: String,
    pub url_count: usize,
    pub sample_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionObjectGroup {
    pub action: String,
    pub object: String,
    pub url_count: usize,
    pub sample_urls: Vec<String>,
}

/// The `intent_summary.json` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryDocument {
    pub schema_version: String,
    pub domain: String,
    pub generated_at: DateTime<Utc>,
    pub total_urls: usize,
    pub new_url_count: usize,
    pub coverage_strict_percentage: f64,
    pub coverage_any_percentage: f64,
    pub by_intent_category: Vec<IntentGroup>,
    pub by_action_object: Vec<ActionObjectGroup>,
    pub directory_tree: DirectoryNode,
    /// Present when the input was clamped before classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<SampleInfo>,
}

/// The `diff_summary.json` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub schema_version: String,
    pub domain: String,
    pub snapshot_id: String,
    pub previous_snapshot_id: Option<String>,
    pub new_url_count: usize,
    pub removed_url_count: usize,
    pub new_urls_by_intent: Vec<IntentGroup>,
    pub new_urls: Vec<String>,
    pub removed_urls: Vec<RemovedUrl>,
    /// Present when only a sample of the new side was classified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<SampleInfo>,
}

/// Options for the grouped views.
#[derive(Debug, Clone, Copy)]
pub struct SummaryOptions {
    pub sample_size: usize,
    pub sort: SortMode,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
            sort: SortMode::Count,
        }
    }
}

/// Accumulates counts and the first `sample_size` URLs per key, keeping
/// first-seen key order.
struct Buckets<K> {
    order: Vec<K>,
    counts: HashMap<K, (usize, Vec<String>)>,
    sample_size: usize,
}

impl<K: std::hash::Hash + Eq + Clone> Buckets<K> {
    fn new(sample_size: usize) -> Self {
        Self {
            order: Vec::new(),
            counts: HashMap::new(),
            sample_size,
        }
    }

    fn add(&mut self, key: K, url: &str) {
        let order = &mut self.order;
        let (count, samples) = self.counts.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            (0, Vec::new())
        });
        *count += 1;
        if samples.len() < self.sample_size {
            samples.push(url.to_string());
        }
    }

    fn into_groups(mut self) -> Vec<(K, usize, Vec<String>)> {
        self.order
            .into_iter()
            .filter_map(|k| self.counts.remove(&k).map(|(n, s)| (k, n, s)))
            .collect()
    }
}

fn or_unknown(tag: &str) -> String {
    if tag.is_empty() {
        UNKNOWN.to_string()
    } else {
        tag.to_string()
    }
}

fn compare_groups(a_count: usize, a_key: &str, b_count: usize, b_key: &str, sort: SortMode) -> Ordering {
    match sort {
        SortMode::Name => compare_names(a_key, b_key),
        SortMode::Count => b_count
            .cmp(&a_count)
            .then_with(|| compare_names(a_key, b_key)),
    }
}

/// Group records by `intent_category`.
pub fn group_by_intent(records: &[UrlRecord], options: SummaryOptions) -> Vec<IntentGroup> {
    let mut buckets = Buckets::new(options.sample_size);
    for record in records {
        buckets.add(or_unknown(&record.intent_category), &record.url);
    }
    let mut groups: Vec<IntentGroup> = buckets
        .into_groups()
        .into_iter()
        .map(|(intent_category, url_count, sample_urls)| IntentGroup {
            intent_category,
            url_count,
            sample_urls,
        })
        .collect();
    groups.sort_by(|a, b| {
        compare_groups(a.url_count, &a.intent_category, b.url_count, &b.intent_category, options.sort)
    });
    groups
}

/// Group records by `(action, object)`.
pub fn group_by_action_object(records: &[UrlRecord], options: SummaryOptions) -> Vec<ActionObjectGroup> {
    let mut buckets = Buckets::new(options.sample_size);
    for record in records {
        buckets.add((or_unknown(&record.action), or_unknown(&record.object)), &record.url);
    }
    let mut groups: Vec<ActionObjectGroup> = buckets
        .into_groups()
        .into_iter()
        .map(|((action, object), url_count, sample_urls)| ActionObjectGroup {
            action,
            object,
            url_count,
            sample_urls,
        })
        .collect();
    groups.sort_by(|a, b| {
        let a_key = format!("{}/{}", a.action, a.object);
        let b_key = format!("{}/{}", b.action, b.object);
        compare_groups(a.url_count, &a_key, b.url_count, &b_key, options.sort)
    });
    groups
}

/// Coverage percentages `(strict, any)`.
///
/// Strict counts records with both action and object resolved; any counts
/// records with at least one. Both are rounded half-up to one decimal.
pub fn coverage(records: &[UrlRecord]) -> (f64, f64) {
    let strict = records.iter().filter(|r| r.has_action() && r.has_object()).count();
    let any = records.iter().filter(|r| r.has_action() || r.has_object()).count();
    (percentage(strict, records.len()), percentage(any, records.len()))
}

/// `part / total` as a percentage, rounded half-up to one decimal place.
///
/// Computed in integer tenths so equal inputs always round identically and
/// a smaller `part` never rounds above a larger one.
pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let part = part.min(total) as u128;
    let total = total as u128;
    let tenths = (part * 2000 + total) / (2 * total);
    tenths as f64 / 10.0
}

/// Assemble the summary document.
pub fn summarize(
    domain: &str,
    records: &[UrlRecord],
    directory_tree: DirectoryNode,
    options: SummaryOptions,
) -> SummaryDocument {
    let (strict, any) = coverage(records);
    SummaryDocument {
        schema_version: SCHEMA_VERSION.to_string(),
        domain: domain.to_string(),
        generated_at: Utc::now(),
        total_urls: records.len(),
        new_url_count: records.iter().filter(|r| r.is_new).count(),
        coverage_strict_percentage: strict,
        coverage_any_percentage: any,
        by_intent_category: group_by_intent(records, options),
        by_action_object: group_by_action_object(records, options),
        directory_tree,
        sample: None,
    }
}

/// Assemble the diff summary, grouping only the new records by intent.
pub fn summarize_diff(
    domain: &str,
    snapshot_id: &str,
    records: &[UrlRecord],
    report: &DiffReport,
    options: SummaryOptions,
) -> DiffSummary {
    let new_records: Vec<UrlRecord> = records.iter().filter(|r| r.is_new).cloned().collect();
    DiffSummary {
        schema_version: SCHEMA_VERSION.to_string(),
        domain: domain.to_string(),
        snapshot_id: snapshot_id.to_string(),
        previous_snapshot_id: report.previous_snapshot_id.clone(),
        new_url_count: report.new_urls.len(),
        removed_url_count: report.removed_urls.len(),
        new_urls_by_intent: group_by_intent(&new_records, options),
        new_urls: report.new_urls.clone(),
        removed_urls: report.removed_urls.clone(),
        sample: None,
    }
}
