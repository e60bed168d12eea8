//! `sitemap-intent intent-map`: classify a site's sitemap URLs and diff them
//! against the previous crawl.

use super::{
    ensure_dir, infer_domain, write_csv, write_diff_artifacts, write_json, write_keyword_table,
    KEYWORD_TABLE_CSV, RAW_CSV, SUMMARY_JSON,
};
use crate::config::{IntentConfig, Overrides};
use crate::fetch::HttpFetcher;
use crate::llm::OpenAiClassifier;
use crate::output::{self, Styled};
use crate::robots::discover_sitemaps;
use anyhow::{bail, Context, Result};
use clap::Args;
use sitemap_intent::sitemap::load_sitemaps;
use sitemap_intent::{
    GroupBy, IntentJob, JobOutput, RuleClassifier, SampleStrategy, SnapshotStore, SortMode,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug, Clone, Default, Args)]
pub struct IntentMapArgs {
    /// Sitemap or sitemap index URL (repeatable)
    #[arg(long = "sitemap-url")]
    pub sitemap_urls: Vec<String>,

    /// Local sitemap file, XML or plain text (repeatable)
    #[arg(long = "sitemap-file")]
    pub sitemap_files: Vec<PathBuf>,

    /// Discover sitemaps via the domain's robots.txt and common paths
    #[arg(long)]
    pub domain: Option<String>,

    /// Directory for the CSV and JSON artifacts
    #[arg(long, short = 'o', default_value = "intent-out")]
    pub output_dir: PathBuf,

    /// Config file (.json or .toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Max URLs to classify (default 500)
    #[arg(long)]
    pub max_urls: Option<usize>,

    /// Sampling strategy when clamping: first|random
    #[arg(long)]
    pub sample: Option<SampleStrategy>,

    /// HTTP timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Minimum delay in seconds between sitemap fetches
    #[arg(long)]
    pub delay: Option<f64>,

    /// Custom User-Agent
    #[arg(long)]
    pub user_agent: Option<String>,

    /// OpenAI-compatible model name; enables enrichment of unknown fields
    #[arg(long)]
    pub llm_model: Option<String>,

    /// OpenAI-compatible base URL
    #[arg(long)]
    pub llm_base_url: Option<String>,

    /// API key (defaults to $OPENAI_API_KEY)
    #[arg(long)]
    pub llm_api_key: Option<String>,

    /// Snapshot history directory
    #[arg(long)]
    pub history_dir: Option<PathBuf>,

    /// Neither read nor publish a snapshot; every URL counts as new
    #[arg(long)]
    pub no_history: bool,

    /// Tree grouping: path|intent_category|object
    #[arg(long)]
    pub group_by: Option<GroupBy>,

    /// Group ordering: count|name
    #[arg(long)]
    pub sort: Option<SortMode>,

    /// Fail on the first malformed URL instead of skipping it
    #[arg(long)]
    pub abort_on_malformed: bool,
}

impl IntentMapArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            max_urls: self.max_urls,
            sample: self.sample,
            timeout_secs: self.timeout,
            delay_secs: self.delay,
            user_agent: self.user_agent.clone(),
            llm_model: self.llm_model.clone(),
            llm_base_url: self.llm_base_url.clone(),
            llm_api_key: self.llm_api_key.clone(),
            history_dir: self.history_dir.clone(),
            group_by: self.group_by,
            sort: self.sort,
            abort_on_malformed: self.abort_on_malformed,
        }
    }

    fn explicit_sources(&self) -> Vec<String> {
        self.sitemap_urls
            .iter()
            .cloned()
            .chain(self.sitemap_files.iter().map(|p| p.display().to_string()))
            .collect()
    }
}

/// What an `intent-map` run produced.
pub struct IntentMapOutcome {
    pub domain: String,
    pub sources: Vec<String>,
    pub source_failures: Vec<(String, String)>,
    /// Entries read from the sitemaps, before deduplication and sampling.
    pub discovered: usize,
    pub output: JobOutput,
    pub artifacts: Vec<PathBuf>,
    pub snapshot_dir: Option<PathBuf>,
    pub elapsed: Duration,
}

/// Fetch, classify, diff, write artifacts and publish the snapshot.
pub async fn execute(args: &IntentMapArgs) -> Result<IntentMapOutcome> {
    let start = Instant::now();
    let mut config = IntentConfig::load(args.config.as_deref())?;
    config.apply(&args.overrides());

    let mut fetcher = HttpFetcher::new(&config.http).context("failed to build HTTP client")?;
    let mut sources = args.explicit_sources();
    if let Some(domain) = &args.domain {
        let found = discover_sitemaps(&fetcher, domain, &config.http.user_agent).await;
        fetcher.apply_crawl_delay(found.crawl_delay);
        for sitemap in found.sitemaps {
            if !sources.contains(&sitemap) {
                sources.push(sitemap);
            }
        }
    }
    if sources.is_empty() {
        bail!("no sitemap sources: pass --sitemap-url, --sitemap-file, or --domain");
    }

    let loaded = load_sitemaps(&fetcher, &sources).await;
    if loaded.documents == 0 {
        bail!("none of the {} sitemap source(s) could be read", sources.len());
    }
    let discovered = loaded.entries.len();
    let domain = infer_domain(args.domain.as_deref(), &loaded.entries, &sources);

    let mut job = IntentJob::new(RuleClassifier::from_rules(&config.rules), config.job_options());
    if let Some(llm) = OpenAiClassifier::from_config(&config.llm)? {
        info!(model = llm.model(), "enrichment enabled");
        job = job.with_enricher(Arc::new(llm));
    }

    let store = (!args.no_history)
        .then(|| SnapshotStore::new(&config.history.dir).with_retention(config.history.keep));
    let prior = match &store {
        Some(store) => store
            .open(&domain)
            .with_context(|| format!("failed to open snapshot history for {domain}"))?,
        None => None,
    };

    let output = job
        .run(&domain, &loaded.entries, prior.as_ref())
        .await
        .context("intent mapping failed")?;

    ensure_dir(&args.output_dir)?;
    let mut artifacts = vec![
        write_csv(&args.output_dir.join(RAW_CSV), output.records())?,
        write_json(&args.output_dir.join(SUMMARY_JSON), &output.summary)?,
        write_keyword_table(&args.output_dir.join(KEYWORD_TABLE_CSV), output.records())?,
    ];
    artifacts.extend(write_diff_artifacts(&args.output_dir, &output.diff_summary)?);

    let snapshot_dir = match &store {
        Some(store) => Some(
            store
                .publish(&domain, &output.snapshot)
                .context("failed to publish snapshot")?,
        ),
        None => None,
    };

    Ok(IntentMapOutcome {
        domain,
        sources,
        source_failures: loaded.failures,
        discovered,
        output,
        artifacts,
        snapshot_dir,
        elapsed: start.elapsed(),
    })
}

/// Run the intent-map command.
pub async fn run(args: IntentMapArgs) -> Result<()> {
    let outcome = execute(&args).await?;
    if output::is_json() {
        print_outcome_json(&outcome);
    } else if !output::is_quiet() {
        print_outcome(&Styled::new(), &outcome);
    }
    Ok(())
}

fn print_outcome(s: &Styled, outcome: &IntentMapOutcome) {
    let out = &outcome.output;
    let summary = &out.summary;

    output::print_header(s);
    eprintln!(
        "  {} mapped in {}",
        s.bold(&outcome.domain),
        output::format_duration(outcome.elapsed.as_millis())
    );

    output::print_section(s, "Sources");
    for source in &outcome.sources {
        match outcome.source_failures.iter().find(|(loc, _)| loc == source) {
            Some((_, reason)) => {
                output::print_check(s.fail_sym(), "unreadable", source);
                output::print_detail(&s.dim(reason));
            }
            None => output::print_check(s.ok_sym(), "read", source),
        }
    }
    let clamp = match out.sample {
        Some(sample) => format!(
            "{} of {} sampled ({})",
            sample.kept,
            sample.discovered,
            match sample.strategy {
                SampleStrategy::First => "first",
                SampleStrategy::Random => "random",
            }
        ),
        None => summary.total_urls.to_string(),
    };
    output::print_check(s.info_sym(), "urls", &clamp);
    if !out.skipped.is_empty() {
        output::print_check(s.warn_sym(), "malformed", &out.skipped.len().to_string());
        if output::is_verbose() {
            for skipped in &out.skipped {
                output::print_detail(&s.dim(&format!("{} ({})", skipped.url, skipped.reason)));
            }
        }
    }
    if out.duplicates > 0 {
        output::print_check(s.info_sym(), "duplicates", &out.duplicates.to_string());
    }

    output::print_section(s, "Coverage");
    output::print_check(
        s.info_sym(),
        "action + object",
        &output::percent_bar(summary.coverage_strict_percentage, 20),
    );
    output::print_check(
        s.info_sym(),
        "action or object",
        &output::percent_bar(summary.coverage_any_percentage, 20),
    );
    if let Some(stats) = out.enrichment {
        output::print_check(
            s.info_sym(),
            "enriched",
            &format!("{}/{} ({} failed)", stats.resolved, stats.requested, stats.failed),
        );
    }

    output::print_section(s, "Top intents");
    for group in summary.by_intent_category.iter().take(5) {
        eprintln!("    {:<28} {:>6}", group.intent_category, group.url_count);
    }

    output::print_section(s, "Changes");
    match &out.diff.previous_snapshot_id {
        Some(previous) => {
            output::print_check(s.info_sym(), "since", previous);
            output::print_check(s.ok_sym(), "new", &s.green(&out.diff.new_urls.len().to_string()));
            output::print_check(
                s.ok_sym(),
                "removed",
                &s.yellow(&out.diff.removed_urls.len().to_string()),
            );
        }
        None => output::print_check(s.info_sym(), "first run", "every URL is new"),
    }

    output::print_section(s, "Artifacts");
    for path in &outcome.artifacts {
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        output::print_check(s.ok_sym(), &output::format_size(size), &path.display().to_string());
    }
    match &outcome.snapshot_dir {
        Some(dir) => output::print_check(s.ok_sym(), "snapshot", &s.cyan(&dir.display().to_string())),
        None => output::print_check(s.info_sym(), "snapshot", "history disabled"),
    }
    eprintln!();
}

fn print_outcome_json(outcome: &IntentMapOutcome) {
    let out = &outcome.output;
    output::print_json(&serde_json::json!({
        "domain": outcome.domain,
        "snapshot_id": out.snapshot.id,
        "previous_snapshot_id": out.diff.previous_snapshot_id,
        "sources": outcome.sources,
        "source_failures": outcome
            .source_failures
            .iter()
            .map(|(location, reason)| serde_json::json!({"location": location, "reason": reason}))
            .collect::<Vec<_>>(),
        "discovered_urls": outcome.discovered,
        "sample": out.sample,
        "total_urls": out.summary.total_urls,
        "skipped": out.skipped,
        "duplicates": out.duplicates,
        "new_url_count": out.diff.new_urls.len(),
        "removed_url_count": out.diff.removed_urls.len(),
        "coverage_strict_percentage": out.summary.coverage_strict_percentage,
        "coverage_any_percentage": out.summary.coverage_any_percentage,
        "artifacts": outcome.artifacts,
        "snapshot_dir": outcome.snapshot_dir,
        "duration_ms": outcome.elapsed.as_millis() as u64,
    }));
}
