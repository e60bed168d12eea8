//! `sitemap-intent history`: list the published snapshots of a domain.

use crate::config::IntentConfig;
use crate::output::{self, Styled};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use sitemap_intent::SnapshotStore;
use std::path::PathBuf;

#[derive(Debug, Clone, Args)]
pub struct HistoryArgs {
    /// Domain whose snapshots to list
    pub domain: String,

    /// Snapshot history directory
    #[arg(long)]
    pub history_dir: Option<PathBuf>,

    /// Config file (.json or .toml) supplying `history.dir`
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// One published snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotInfo {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub url_count: usize,
    pub new_url_count: usize,
    pub latest: bool,
}

/// Published snapshots of `domain`, oldest first.
pub fn collect(store: &SnapshotStore, domain: &str) -> Result<Vec<SnapshotInfo>> {
    let latest = store.latest_id(domain)?;
    store
        .list(domain)?
        .into_iter()
        .map(|id| {
            let snapshot = store
                .load(domain, &id)
                .with_context(|| format!("failed to load snapshot {id}"))?;
            Ok(SnapshotInfo {
                latest: latest.as_deref() == Some(id.as_str()),
                created_at: snapshot.created_at,
                url_count: snapshot.records.len(),
                new_url_count: snapshot.records.iter().filter(|r| r.is_new).count(),
                id,
            })
        })
        .collect()
}

/// Run the history command.
pub async fn run(args: HistoryArgs) -> Result<()> {
    let config = IntentConfig::load(args.config.as_deref())?;
    let dir = args.history_dir.unwrap_or(config.history.dir);
    let store = SnapshotStore::new(&dir);
    let snapshots = collect(&store, &args.domain)?;

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "domain": args.domain,
            "history_dir": dir,
            "snapshots": snapshots,
        }));
        return Ok(());
    }
    if output::is_quiet() {
        return Ok(());
    }

    let s = Styled::new();
    if snapshots.is_empty() {
        eprintln!("  No snapshots for '{}' under {}.", args.domain, dir.display());
        return Ok(());
    }
    eprintln!("  {} {}", s.bold(&args.domain), s.dim(&dir.display().to_string()));
    eprintln!();
    eprintln!("    {:<24} {:>8} {:>8}", "SNAPSHOT", "URLS", "NEW");
    for snap in &snapshots {
        let marker = if snap.latest { s.green(" (latest)") } else { String::new() };
        eprintln!(
            "    {:<24} {:>8} {:>8}{marker}",
            snap.id, snap.url_count, snap.new_url_count
        );
    }
    Ok(())
}
