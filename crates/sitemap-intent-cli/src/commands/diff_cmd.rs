//! `sitemap-intent sitemap-diff`: compare two sitemap sources without
//! touching the snapshot history.

use super::{ensure_dir, infer_domain, write_csv, write_diff_artifacts, NEW_URLS_CSV};
use crate::config::{IntentConfig, Overrides};
use crate::fetch::HttpFetcher;
use crate::llm::OpenAiClassifier;
use crate::output::{self, Styled};
use anyhow::{bail, Context, Result};
use clap::Args;
use sitemap_intent::sitemap::load_sitemaps;
use sitemap_intent::summary::summarize_diff;
use sitemap_intent::{
    diff_against, DiffSummary, IntentJob, RuleClassifier, SitemapEntry, Snapshot, SummaryOptions,
    UrlRecord,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone, Default, Args)]
pub struct SitemapDiffArgs {
    /// Old sitemap URL or file
    #[arg(long)]
    pub old: String,

    /// New sitemap URL or file
    #[arg(long)]
    pub new: String,

    /// Directory for the diff artifacts
    #[arg(long, short = 'o', default_value = "diff-out")]
    pub output_dir: PathBuf,

    /// Config file (.json or .toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// HTTP timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Minimum delay in seconds between sitemap fetches
    #[arg(long)]
    pub delay: Option<f64>,

    /// Custom User-Agent
    #[arg(long)]
    pub user_agent: Option<String>,

    /// OpenAI-compatible model name; enables enrichment of new URLs
    #[arg(long)]
    pub llm_model: Option<String>,

    /// OpenAI-compatible base URL
    #[arg(long)]
    pub llm_base_url: Option<String>,

    /// API key (defaults to $OPENAI_API_KEY)
    #[arg(long)]
    pub llm_api_key: Option<String>,

    /// Label recorded as the removed URLs' last-seen snapshot
    #[arg(long, default_value = "old")]
    pub old_label: String,

    /// Label recorded as the new URLs' snapshot
    #[arg(long, default_value = "new")]
    pub new_label: String,

    /// Fail on the first malformed URL instead of skipping it
    #[arg(long)]
    pub abort_on_malformed: bool,
}

impl SitemapDiffArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            timeout_secs: self.timeout,
            delay_secs: self.delay,
            user_agent: self.user_agent.clone(),
            llm_model: self.llm_model.clone(),
            llm_base_url: self.llm_base_url.clone(),
            llm_api_key: self.llm_api_key.clone(),
            abort_on_malformed: self.abort_on_malformed,
            ..Overrides::default()
        }
    }
}

/// What a `sitemap-diff` run produced.
pub struct DiffOutcome {
    pub summary: DiffSummary,
    /// Classified records of the URLs only in the new source.
    pub new_records: Vec<UrlRecord>,
    pub artifacts: Vec<PathBuf>,
}

async fn read_source(fetcher: &HttpFetcher, source: &str) -> Result<Vec<SitemapEntry>> {
    let loaded = load_sitemaps(fetcher, &[source.to_string()]).await;
    if loaded.documents == 0 {
        let reason = loaded
            .failures
            .first()
            .map(|(_, reason)| reason.as_str())
            .unwrap_or("no sitemap documents");
        bail!("could not read {source}: {reason}");
    }
    Ok(loaded.entries)
}

pub async fn execute(args: &SitemapDiffArgs) -> Result<DiffOutcome> {
    let mut config = IntentConfig::load(args.config.as_deref())?;
    config.apply(&args.overrides());

    let fetcher = HttpFetcher::new(&config.http).context("failed to build HTTP client")?;
    let old_entries = read_source(&fetcher, &args.old).await?;
    let new_entries = read_source(&fetcher, &args.new).await?;
    let domain = infer_domain(None, &new_entries, std::slice::from_ref(&args.new));

    let mut job = IntentJob::new(RuleClassifier::from_rules(&config.rules), config.job_options());
    if let Some(llm) = OpenAiClassifier::from_config(&config.llm)? {
        job = job.with_enricher(Arc::new(llm));
    }

    // The old side only needs identities and categories.
    let (old_records, _) = job.classify(&old_entries).context("failed to classify old sitemap")?;
    let mut baseline = Snapshot::new(&domain, old_records);
    baseline.id = args.old_label.clone();

    let (mut records, _) = job.classify(&new_entries).context("failed to classify new sitemap")?;
    let diff = diff_against(&mut records, Some(&baseline));
    info!(
        new = diff.new_urls.len(),
        removed = diff.removed_urls.len(),
        "compared sitemaps"
    );

    // Only URLs unique to the new side are worth an enrichment call.
    let mut new_records: Vec<UrlRecord> = records.into_iter().filter(|r| r.is_new).collect();
    job.enrich(&mut new_records).await;

    let options = SummaryOptions {
        sample_size: config.output.sample_size,
        sort: config.output.sort,
    };
    let summary = summarize_diff(&domain, &args.new_label, &new_records, &diff, options);

    ensure_dir(&args.output_dir)?;
    let mut artifacts = write_diff_artifacts(&args.output_dir, &summary)?;
    artifacts.push(write_csv(&args.output_dir.join(NEW_URLS_CSV), &new_records)?);

    Ok(DiffOutcome {
        summary,
        new_records,
        artifacts,
    })
}

/// Run the sitemap-diff command.
pub async fn run(args: SitemapDiffArgs) -> Result<()> {
    let start = Instant::now();
    let outcome = execute(&args).await?;
    let summary = &outcome.summary;

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "domain": summary.domain,
            "old": args.old_label,
            "new": args.new_label,
            "new_url_count": summary.new_url_count,
            "removed_url_count": summary.removed_url_count,
            "new_urls_by_intent": summary.new_urls_by_intent,
            "artifacts": outcome.artifacts,
            "duration_ms": start.elapsed().as_millis() as u64,
        }));
        return Ok(());
    }
    if output::is_quiet() {
        return Ok(());
    }

    let s = Styled::new();
    output::print_header(&s);
    eprintln!(
        "  {} {} {} {}",
        s.bold(&summary.domain),
        s.dim(&args.old_label),
        s.dim("->"),
        s.dim(&args.new_label)
    );
    output::print_section(&s, "Changes");
    output::print_check(s.ok_sym(), "new", &s.green(&summary.new_url_count.to_string()));
    output::print_check(s.ok_sym(), "removed", &s.yellow(&summary.removed_url_count.to_string()));
    if !summary.new_urls_by_intent.is_empty() {
        output::print_section(&s, "New URLs by intent");
        for group in &summary.new_urls_by_intent {
            eprintln!("    {:<28} {:>6}", group.intent_category, group.url_count);
            if output::is_verbose() {
                for url in &group.sample_urls {
                    output::print_detail(&s.dim(url));
                }
            }
        }
    }
    output::print_section(&s, "Artifacts");
    for path in &outcome.artifacts {
        output::print_check(s.ok_sym(), "wrote", &path.display().to_string());
    }
    eprintln!(
        "\n  Done in {}.",
        output::format_duration(start.elapsed().as_millis())
    );
    Ok(())
}
