//! One intent-mapping run: normalize, classify, enrich, diff, aggregate.

use crate::classifier::{enrich_records, RuleClassifier, TextClassifier};
use crate::classifier::enrich::EnrichStats;
use crate::diff::{diff_sample, DiffReport};
use crate::error::{Error, Result};
use crate::normalizer::{normalize, NormalizedUrl};
use crate::sitemap::{clamp_entries, SampleInfo, SampleStrategy};
use crate::snapshot::Snapshot;
use crate::summary::{summarize, summarize_diff, DiffSummary, SummaryDocument, SummaryOptions};
use crate::tree::{build_tree, verify_counts};
use crate::types::{GroupBy, SitemapEntry, SortMode, UrlRecord};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What to do with a URL that fails normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// Log the URL, count it, and continue.
    #[default]
    Skip,
    /// Fail the whole run.
    Abort,
}

#[derive(Debug, Clone, Copy)]
pub struct JobOptions {
    pub on_malformed: MalformedPolicy,
    pub group_by: GroupBy,
    pub sort: SortMode,
    pub sample_size: usize,
    /// Maximum enrichment calls in flight.
    pub enrich_concurrency: usize,
    /// Classify at most this many distinct URLs.
    pub max_urls: Option<usize>,
    /// How to pick them when the input is larger.
    pub sample_strategy: SampleStrategy,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            on_malformed: MalformedPolicy::Skip,
            group_by: GroupBy::Path,
            sort: SortMode::Count,
            sample_size: crate::summary::DEFAULT_SAMPLE_SIZE,
            enrich_concurrency: 4,
            max_urls: None,
            sample_strategy: SampleStrategy::First,
        }
    }
}

/// An input URL dropped by the skip policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedUrl {
    pub url: String,
    pub reason: String,
}

/// Normalized entries ready for classification.
#[derive(Debug, Default)]
pub struct PreparedEntries {
    pub entries: Vec<(NormalizedUrl, Option<String>)>,
    pub skipped: Vec<SkippedUrl>,
    /// Entries dropped because an earlier entry had the same identity.
    pub duplicates: usize,
}

/// Normalize every entry and drop duplicates, keeping the first occurrence.
pub fn prepare_entries(entries: &[SitemapEntry], policy: MalformedPolicy) -> Result<PreparedEntries> {
    let mut prepared = PreparedEntries::default();
    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        let normalized = match normalize(&entry.url) {
            Ok(n) => n,
            Err(Error::MalformedUrl { url, reason }) if policy == MalformedPolicy::Skip => {
                warn!(%url, "skipping malformed URL: {reason}");
                prepared.skipped.push(SkippedUrl { url, reason });
                continue;
            }
            Err(e) => return Err(e),
        };
        if !seen.insert(normalized.url.clone()) {
            debug!(url = %normalized.url, "dropping duplicate URL");
            prepared.duplicates += 1;
            continue;
        }
        prepared.entries.push((normalized, entry.lastmod.clone()));
    }
    Ok(prepared)
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct JobOutput {
    /// The new snapshot; its records carry the `is_new` flags.
    pub snapshot: Snapshot,
    pub diff: DiffReport,
    pub summary: SummaryDocument,
    pub diff_summary: DiffSummary,
    pub skipped: Vec<SkippedUrl>,
    pub duplicates: usize,
    pub enrichment: Option<EnrichStats>,
    /// Set when `max_urls` cut the input down.
    pub sample: Option<SampleInfo>,
}

impl JobOutput {
    pub fn records(&self) -> &[UrlRecord] {
        &self.snapshot.records
    }
}

/// Batch intent-mapping job.
pub struct IntentJob {
    classifier: RuleClassifier,
    enricher: Option<Arc<dyn TextClassifier>>,
    options: JobOptions,
}

impl IntentJob {
    pub fn new(classifier: RuleClassifier, options: JobOptions) -> Self {
        Self {
            classifier,
            enricher: None,
            options,
        }
    }

    /// Consult `enricher` for fields the rules leave `unknown`.
    pub fn with_enricher(mut self, enricher: Arc<dyn TextClassifier>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn options(&self) -> &JobOptions {
        &self.options
    }

    /// Normalize, deduplicate, and rule-classify `entries` in input order.
    ///
    /// `max_urls` is not applied here.
    pub fn classify(&self, entries: &[SitemapEntry]) -> Result<(Vec<UrlRecord>, PreparedEntries)> {
        let mut prepared = prepare_entries(entries, self.options.on_malformed)?;
        let batch = std::mem::take(&mut prepared.entries);
        Ok((self.classify_batch(batch), prepared))
    }

    fn classify_batch(&self, batch: Vec<(NormalizedUrl, Option<String>)>) -> Vec<UrlRecord> {
        batch
            .into_par_iter()
            .map(|(normalized, lastmod)| self.classifier.classify_url(normalized, lastmod))
            .collect()
    }

    /// Run the configured enricher, if any, over `records`.
    pub async fn enrich(&self, records: &mut [UrlRecord]) -> Option<EnrichStats> {
        let enricher = self.enricher.as_ref()?;
        let stats = enrich_records(
            records,
            enricher.as_ref(),
            &self.classifier,
            self.options.enrich_concurrency,
        )
        .await;
        info!(
            requested = stats.requested,
            resolved = stats.resolved,
            failed = stats.failed,
            "enrichment finished"
        );
        Some(stats)
    }

    /// Run the whole pipeline against the prior snapshot, if any.
    ///
    /// When the input exceeds `max_urls`, only a sample is classified, but
    /// the snapshot keeps every identity the site listed so later diffs
    /// compare sites rather than samples.
    pub async fn run(
        &self,
        domain: &str,
        entries: &[SitemapEntry],
        prior: Option<&Snapshot>,
    ) -> Result<JobOutput> {
        let mut prepared = prepare_entries(entries, self.options.on_malformed)?;
        let mut batch = std::mem::take(&mut prepared.entries);

        let discovered = batch.len();
        let mut site_urls = None;
        let mut sample = None;
        if let Some(max_urls) = self.options.max_urls.filter(|max| discovered > *max) {
            site_urls = Some(batch.iter().map(|(n, _)| n.url.clone()).collect::<Vec<_>>());
            batch = clamp_entries(batch, max_urls, self.options.sample_strategy);
            sample = Some(SampleInfo {
                strategy: self.options.sample_strategy,
                discovered,
                kept: batch.len(),
            });
            info!(
                from = discovered,
                to = batch.len(),
                strategy = ?self.options.sample_strategy,
                "sampled URLs"
            );
        }

        let mut records = self.classify_batch(batch);
        info!(
            domain,
            records = records.len(),
            skipped = prepared.skipped.len(),
            duplicates = prepared.duplicates,
            "classified URLs"
        );

        let enrichment = self.enrich(&mut records).await;

        let diff = diff_sample(&mut records, site_urls.as_deref(), prior);
        info!(
            new = diff.new_urls.len(),
            removed = diff.removed_urls.len(),
            first_run = diff.is_first_run(),
            "diffed against previous snapshot"
        );

        let summary_options = SummaryOptions {
            sample_size: self.options.sample_size,
            sort: self.options.sort,
        };
        let tree = build_tree(&records, self.options.group_by, self.options.sort);
        verify_counts(&tree, records.len())?;

        let mut snapshot = Snapshot::new(domain, records);
        if let (Some(urls), Some(info)) = (site_urls, sample) {
            snapshot = snapshot.with_sample(urls, info);
        }
        let mut summary = summarize(domain, &snapshot.records, tree, summary_options);
        summary.sample = sample;
        let mut diff_summary =
            summarize_diff(domain, &snapshot.id, &snapshot.records, &diff, summary_options);
        diff_summary.sample = sample;

        Ok(JobOutput {
            snapshot,
            diff,
            summary,
            diff_summary,
            skipped: prepared.skipped,
            duplicates: prepared.duplicates,
            enrichment,
            sample,
        })
    }
}
