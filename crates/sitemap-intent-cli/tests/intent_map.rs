//! `intent-map` end to end: discovery, two crawls, artifacts, history.

use sitemap_intent_cli::commands::history_cmd;
use sitemap_intent_cli::commands::intent_map::{execute, IntentMapArgs};
use sitemap_intent::{SampleStrategy, SnapshotStore};
use std::fs;
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn urlset(base: &str, paths: &[&str]) -> String {
    let urls: String = paths
        .iter()
        .map(|p| format!("<url><loc>{base}{p}</loc><lastmod>2026-07-01</lastmod></url>"))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{urls}</urlset>"#
    )
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(String::from)
        .collect()
}

#[tokio::test]
async fn test_file_sitemap_two_runs() {
    let dir = tempfile::tempdir().unwrap();
    let sitemap = dir.path().join("sitemap.xml");
    let history = dir.path().join("history");

    fs::write(
        &sitemap,
        urlset(
            "https://example.com",
            &["/remove-background", "/tools/upscale-photo", "/about", "/about?ref=footer"],
        ),
    )
    .unwrap();
    let first_out = dir.path().join("run1");
    let args = IntentMapArgs {
        sitemap_files: vec![sitemap.clone()],
        output_dir: first_out.clone(),
        history_dir: Some(history.clone()),
        ..IntentMapArgs::default()
    };
    let first = execute(&args).await.unwrap();
    assert_eq!(first.domain, "example.com");
    assert_eq!(first.output.records().len(), 3);
    assert_eq!(first.output.duplicates, 1);
    assert!(first.output.diff.is_first_run());
    assert_eq!(first.artifacts.len(), 6);
    for name in [
        "intent_map_raw.csv",
        "intent_summary.json",
        "intent_keywords_table.csv",
        "new_urls.txt",
        "removed_urls.txt",
        "diff_summary.json",
    ] {
        assert!(first_out.join(name).is_file(), "missing {name}");
    }
    assert_eq!(read_lines(&first_out.join("new_urls.txt")).len(), 3);
    assert_eq!(read_lines(&first_out.join("intent_map_raw.csv")).len(), 4);

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(first_out.join("intent_summary.json")).unwrap()).unwrap();
    assert_eq!(summary["schema_version"], "1.0");
    assert_eq!(summary["total_urls"], 3);
    assert_eq!(summary["directory_tree"]["count"], 3);

    tokio::time::sleep(Duration::from_millis(5)).await;

    fs::write(
        &sitemap,
        urlset("https://example.com", &["/tools/upscale-photo/", "/about", "/erase-bg"]),
    )
    .unwrap();
    let second_out = dir.path().join("run2");
    let args = IntentMapArgs {
        output_dir: second_out.clone(),
        ..args
    };
    let second = execute(&args).await.unwrap();
    assert_eq!(
        second.output.diff.previous_snapshot_id.as_deref(),
        Some(first.output.snapshot.id.as_str())
    );
    assert_eq!(read_lines(&second_out.join("new_urls.txt")), vec!["https://example.com/erase-bg"]);
    assert_eq!(
        read_lines(&second_out.join("removed_urls.txt")),
        vec!["https://example.com/remove-background"]
    );

    let store = SnapshotStore::new(&history);
    let listed = history_cmd::collect(&store, "example.com").unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed[1].latest);
    assert_eq!(listed[1].new_url_count, 1);
}

#[tokio::test]
async fn test_domain_discovery_follows_index() {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(format!("Sitemap: {base}/sitemap_index.xml\n")),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sitemap_index.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
<sitemap><loc>{base}/pages.xml</loc></sitemap>
<sitemap><loc>{base}/sitemap_index.xml</loc></sitemap>
</sitemapindex>"#
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pages.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(urlset(&base, &["/remove-watermark", "/denoise-photo", "/pricing"])),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let args = IntentMapArgs {
        domain: Some(base.clone()),
        output_dir: dir.path().join("out"),
        no_history: true,
        max_urls: Some(2),
        ..IntentMapArgs::default()
    };
    let outcome = execute(&args).await.unwrap();

    assert_eq!(outcome.sources, vec![format!("{base}/sitemap_index.xml")]);
    assert_eq!(outcome.discovered, 3);
    assert!(outcome.snapshot_dir.is_none());
    let urls: Vec<&str> = outcome.output.records().iter().map(|r| r.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            format!("{base}/remove-watermark").as_str(),
            format!("{base}/denoise-photo").as_str()
        ]
    );
    assert_eq!(outcome.output.records()[0].intent_category, "remove-watermark");
    assert_eq!(outcome.output.records()[1].intent_category, "denoise-photo");
}

#[tokio::test]
async fn test_random_sample_reruns_report_no_churn() {
    let dir = tempfile::tempdir().unwrap();
    let sitemap = dir.path().join("sitemap.xml");
    let history = dir.path().join("history");
    let paths: Vec<String> = (0..12).map(|i| format!("/tools/upscale-{i}")).collect();
    let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
    fs::write(&sitemap, urlset("https://example.com", &paths)).unwrap();

    let args = IntentMapArgs {
        sitemap_files: vec![sitemap],
        output_dir: dir.path().join("run1"),
        history_dir: Some(history.clone()),
        max_urls: Some(3),
        sample: Some(SampleStrategy::Random),
        ..IntentMapArgs::default()
    };
    let first = execute(&args).await.unwrap();
    assert_eq!(first.output.records().len(), 3);
    let sample = first.output.sample.unwrap();
    assert_eq!((sample.discovered, sample.kept), (12, 3));
    assert!(first.output.diff.is_first_run());

    for run in 2..5 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let args = IntentMapArgs {
            output_dir: dir.path().join(format!("run{run}")),
            ..args.clone()
        };
        let rerun = execute(&args).await.unwrap();
        assert_eq!(rerun.output.records().len(), 3);
        assert!(rerun.output.diff.new_urls.is_empty(), "run {run}");
        assert!(rerun.output.diff.removed_urls.is_empty(), "run {run}");
        assert!(read_lines(&args.output_dir.join("new_urls.txt")).is_empty());

        let summary: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(args.output_dir.join("intent_summary.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(summary["sample"]["kept"], 3);
        assert_eq!(summary["sample"]["discovered"], 12);
    }
}

#[tokio::test]
async fn test_no_sources_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let args = IntentMapArgs {
        output_dir: dir.path().join("out"),
        no_history: true,
        ..IntentMapArgs::default()
    };
    let err = execute(&args).await.err().unwrap();
    assert!(err.to_string().contains("no sitemap sources"));
}
