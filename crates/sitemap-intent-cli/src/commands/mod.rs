//! Subcommand implementations for the `sitemap-intent` binary.

pub mod diff_cmd;
pub mod history_cmd;
pub mod intent_map;

use anyhow::{Context, Result};
use serde::Serialize;
use sitemap_intent::export::{write_keyword_table_csv, write_records_csv, write_url_list};
use sitemap_intent::{DiffSummary, SitemapEntry, UrlRecord};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

pub const RAW_CSV: &str = "intent_map_raw.csv";
pub const SUMMARY_JSON: &str = "intent_summary.json";
pub const NEW_URLS_TXT: &str = "new_urls.txt";
pub const REMOVED_URLS_TXT: &str = "removed_urls.txt";
pub const DIFF_SUMMARY_JSON: &str = "diff_summary.json";
pub const NEW_URLS_CSV: &str = "new_urls.csv";
pub const KEYWORD_TABLE_CSV: &str = "intent_keywords_table.csv";

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

pub(crate) fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create output directory {}", dir.display()))
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<PathBuf> {
    let writer = create(path)?;
    serde_json::to_writer_pretty(writer, value)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path.to_path_buf())
}

pub(crate) fn write_csv(path: &Path, records: &[UrlRecord]) -> Result<PathBuf> {
    write_records_csv(create(path)?, records).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path.to_path_buf())
}

pub(crate) fn write_keyword_table(path: &Path, records: &[UrlRecord]) -> Result<PathBuf> {
    write_keyword_table_csv(create(path)?, records)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path.to_path_buf())
}

/// `new_urls.txt`, `removed_urls.txt` and `diff_summary.json`.
pub fn write_diff_artifacts(dir: &Path, diff: &DiffSummary) -> Result<Vec<PathBuf>> {
    let new_path = dir.join(NEW_URLS_TXT);
    write_url_list(create(&new_path)?, &diff.new_urls)
        .with_context(|| format!("failed to write {}", new_path.display()))?;

    let removed_path = dir.join(REMOVED_URLS_TXT);
    write_url_list(create(&removed_path)?, diff.removed_urls.iter().map(|r| r.url.as_str()))
        .with_context(|| format!("failed to write {}", removed_path.display()))?;

    let json_path = write_json(&dir.join(DIFF_SUMMARY_JSON), diff)?;
    Ok(vec![new_path, removed_path, json_path])
}

/// Host the run is about: the explicit domain, else the first entry's host,
/// else the first source's host.
pub fn infer_domain(explicit: Option<&str>, entries: &[SitemapEntry], sources: &[String]) -> String {
    let host_of = |raw: &str| {
        url::Url::parse(raw).ok().and_then(|u| {
            u.host_str().map(|h| match u.port() {
                Some(port) => format!("{h}:{port}"),
                None => h.to_string(),
            })
        })
    };
    explicit
        .and_then(|d| host_of(crate::robots::site_base(d).as_str()))
        .or_else(|| entries.iter().find_map(|e| host_of(e.url.as_str())))
        .or_else(|| sources.iter().find_map(|s| host_of(s.as_str())))
        .unwrap_or_else(|| "local".to_string())
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_domain_prefers_explicit() {
        let entries = vec![SitemapEntry::new("https://cdn.example.com/a", None)];
        assert_eq!(infer_domain(Some("Example.com"), &entries, &[]), "example.com");
        assert_eq!(infer_domain(None, &entries, &[]), "cdn.example.com");
    }

    #[test]
    fn test_infer_domain_falls_back() {
        let sources = vec!["sitemap.xml".to_string(), "http://localhost:8080/s.xml".to_string()];
        assert_eq!(infer_domain(None, &[], &sources), "localhost:8080");
        assert_eq!(infer_domain(None, &[], &["s.xml".to_string()]), "local");
    }

    #[test]
    fn test_diff_artifacts_layout() {
        let dir = tempfile::tempdir().unwrap();
        let diff = DiffSummary {
            schema_version: sitemap_intent::SCHEMA_VERSION.to_string(),
            domain: "example.com".into(),
            snapshot_id: "new".into(),
            previous_snapshot_id: Some("old".into()),
            new_url_count: 1,
            removed_url_count: 1,
            new_urls_by_intent: Vec::new(),
            new_urls: vec!["https://example.com/d".into()],
            removed_urls: vec![sitemap_intent::RemovedUrl {
                url: "https://example.com/a".into(),
                path: "/a".into(),
                intent_category: "unknown".into(),
                last_seen_snapshot: "old".into(),
            }],
            sample: None,
        };
        let written = write_diff_artifacts(dir.path(), &diff).unwrap();
        assert_eq!(written.len(), 3);
        assert_eq!(
            fs::read_to_string(dir.path().join(NEW_URLS_TXT)).unwrap(),
            "https://example.com/d\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join(REMOVED_URLS_TXT)).unwrap(),
            "https://example.com/a\n"
        );
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join(DIFF_SUMMARY_JSON)).unwrap()).unwrap();
        assert_eq!(json["previous_snapshot_id"], "old");
        assert_eq!(json["removed_urls"][0]["last_seen_snapshot"], "old");
    }
}
