//! robots.txt parsing and sitemap discovery for a bare domain.

use crate::fetch::HttpFetcher;
use sitemap_intent::SitemapFetcher;
use tracing::{debug, info};

/// Paths probed when robots.txt does not list every sitemap.
pub const COMMON_SITEMAP_PATHS: [&str; 3] = ["/sitemap.xml", "/sitemap_index.xml", "/sitemap.txt"];

/// Upper bound applied to any `Crawl-delay`, in seconds.
pub const MAX_CRAWL_DELAY_SECS: f32 = 60.0;

/// The parts of robots.txt that matter to sitemap discovery.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotsRules {
    pub crawl_delay: Option<f32>,
    pub sitemaps: Vec<String>,
}

/// Parse a robots.txt string for a specific user agent.
///
/// `Crawl-delay` comes from the group naming `user_agent`, else from `*`,
/// and is capped at [`MAX_CRAWL_DELAY_SECS`]. Negative or non-numeric values
/// are ignored. `Sitemap` lines are global.
pub fn parse_robots(txt: &str, user_agent: &str) -> RobotsRules {
    let mut rules = RobotsRules::default();
    let ua_lower = user_agent.to_lowercase();
    // (names us, names `*`) for the current group.
    let mut group = (false, false);
    let mut in_agent_lines = false;
    let mut specific_delay = None;
    let mut wildcard_delay = None;

    for line in txt.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        let key = key.trim().to_lowercase();

        if key == "user-agent" {
            // Consecutive User-agent lines share one group.
            if !in_agent_lines {
                group = (false, false);
            }
            in_agent_lines = true;
            let ua = value.to_lowercase();
            if ua == "*" {
                group.1 = true;
            } else if !ua.is_empty() && ua_lower.contains(&ua) {
                group.0 = true;
            }
            continue;
        }
        in_agent_lines = false;

        match key.as_str() {
            "crawl-delay" => {
                let Some(delay) = value
                    .parse::<f32>()
                    .ok()
                    .filter(|d| d.is_finite() && *d >= 0.0)
                    .map(|d| d.min(MAX_CRAWL_DELAY_SECS))
                else {
                    continue;
                };
                if group.0 {
                    specific_delay = Some(delay);
                } else if group.1 {
                    wildcard_delay = Some(delay);
                }
            }
            "sitemap" => {
                if !value.is_empty() && !rules.sitemaps.iter().any(|s| s == value) {
                    rules.sitemaps.push(value.to_string());
                }
            }
            _ => {}
        }
    }

    rules.crawl_delay = specific_delay.or(wildcard_delay);
    rules
}

/// `https://`-prefixed origin for a domain or URL, without a trailing slash.
pub fn site_base(domain: &str) -> String {
    let trimmed = domain.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Sitemaps found for a domain.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// robots.txt entries first, then responding common paths.
    pub sitemaps: Vec<String>,
    pub crawl_delay: Option<f32>,
}

/// Read robots.txt and probe the common sitemap paths of `domain`.
pub async fn discover_sitemaps(fetcher: &HttpFetcher, domain: &str, user_agent: &str) -> Discovery {
    let base = site_base(domain);
    let mut discovery = Discovery::default();

    let robots_url = format!("{base}/robots.txt");
    match fetcher.fetch(&robots_url).await {
        Ok(body) => {
            let rules = parse_robots(&String::from_utf8_lossy(&body), user_agent);
            debug!(sitemaps = rules.sitemaps.len(), crawl_delay = ?rules.crawl_delay, "read robots.txt");
            discovery.crawl_delay = rules.crawl_delay;
            discovery.sitemaps = rules.sitemaps;
        }
        Err(e) => debug!("no robots.txt: {e}"),
    }

    for path in COMMON_SITEMAP_PATHS {
        let url = format!("{base}{path}");
        if discovery.sitemaps.contains(&url) {
            continue;
        }
        if fetcher.probe(&url).await {
            discovery.sitemaps.push(url);
        }
    }

    info!(domain = %base, found = discovery.sitemaps.len(), "discovered sitemaps");
    discovery
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_robots() {
        let txt = r#"
User-agent: *
Allow: /
Disallow: /admin
Crawl-delay: 1.5

Sitemap: https://example.com/sitemap.xml
Sitemap: https://example.com/sitemap-blog.xml # blog
Sitemap: https://example.com/sitemap.xml
"#;
        let rules = parse_robots(txt, "SitemapIntent/0.1");
        assert_eq!(rules.crawl_delay, Some(1.5));
        assert_eq!(
            rules.sitemaps,
            vec![
                "https://example.com/sitemap.xml".to_string(),
                "https://example.com/sitemap-blog.xml".to_string(),
            ]
        );
    }

    #[test]
    fn test_specific_group_wins_crawl_delay() {
        let txt = r#"
User-agent: sitemapintent
Crawl-delay: 4

User-agent: *
Crawl-delay: 1
"#;
        let rules = parse_robots(txt, "SitemapIntent/0.1");
        assert_eq!(rules.crawl_delay, Some(4.0));
        let rules = parse_robots(txt, "OtherBot");
        assert_eq!(rules.crawl_delay, Some(1.0));
    }

    #[test]
    fn test_crawl_delay_is_capped() {
        let rules = parse_robots("User-agent: *\nCrawl-delay: 1e30\n", "SitemapIntent/0.1");
        assert_eq!(rules.crawl_delay, Some(MAX_CRAWL_DELAY_SECS));

        let rules = parse_robots("User-agent: *\nCrawl-delay: inf\n", "SitemapIntent/0.1");
        assert_eq!(rules.crawl_delay, None);
        let rules = parse_robots("User-agent: *\nCrawl-delay: -3\n", "SitemapIntent/0.1");
        assert_eq!(rules.crawl_delay, None);
    }

    #[test]
    fn test_site_base() {
        assert_eq!(site_base("example.com"), "https://example.com");
        assert_eq!(site_base("http://example.com/"), "http://example.com");
    }

    #[tokio::test]
    async fn test_discovery_merges_robots_and_probes() {
        let server = MockServer::start().await;
        let base = server.uri();
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                "User-agent: *\nCrawl-delay: 0.01\nSitemap: {base}/sitemap.xml\n"
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sitemap.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x"))
            .mount(&server)
            .await;

        let http = HttpConfig {
            retries: 0,
            ..HttpConfig::default()
        };
        let fetcher = HttpFetcher::new(&http).unwrap().with_backoff(Duration::from_millis(1));
        let found = discover_sitemaps(&fetcher, &base, "SitemapIntent").await;
        assert_eq!(found.crawl_delay, Some(0.01));
        assert_eq!(
            found.sitemaps,
            vec![format!("{base}/sitemap.xml"), format!("{base}/sitemap.txt")]
        );
    }
}
