//! HTTP and filesystem access to sitemap sources.

use crate::config::HttpConfig;
use crate::rate_limiter::RateLimiter;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::StatusCode;
use sitemap_intent::{Error, Result, SitemapFetcher};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Fetches sitemap bodies over HTTP(S) with retries, or from local files.
pub struct HttpFetcher {
    client: reqwest::Client,
    user_agents: Vec<String>,
    retries: u32,
    backoff: Duration,
    limiter: RateLimiter,
}

/// Outcome of one HTTP attempt.
enum Attempt {
    Body(Vec<u8>),
    Retry(String),
    Fatal(String),
}

impl HttpFetcher {
    pub fn new(http: &HttpConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(http.timeout())
            .build()?;
        let mut user_agents = vec![http.user_agent.clone()];
        user_agents.extend(http.extra_user_agents.iter().filter(|ua| !ua.is_empty()).cloned());
        Ok(Self {
            client,
            user_agents,
            retries: http.retries,
            backoff: Duration::from_secs(1),
            limiter: RateLimiter::new(1, http.delay()),
        })
    }

    /// Base of the exponential backoff between retries.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Honour a robots.txt `Crawl-delay` when it is slower than the current delay.
    pub fn apply_crawl_delay(&mut self, crawl_delay: Option<f32>) {
        let current = self.limiter.min_delay();
        let limiter = RateLimiter::from_crawl_delay(crawl_delay, current, 1);
        if limiter.min_delay() > current {
            debug!(delay_ms = limiter.min_delay().as_millis() as u64, "raising request delay");
            self.limiter = limiter;
        }
    }

    pub fn min_delay(&self) -> Duration {
        self.limiter.min_delay()
    }

    /// GET `url`, retrying up to `retries` extra times.
    pub async fn get(&self, url: &str, retries: u32) -> Result<Vec<u8>> {
        let mut last_error = String::new();
        for attempt in 0..=retries {
            if attempt > 0 {
                let pause = self.backoff_for(attempt);
                debug!(%url, attempt, pause_ms = pause.as_millis() as u64, "retrying");
                tokio::time::sleep(pause).await;
            }
            match self.attempt(url).await {
                Attempt::Body(body) => return Ok(body),
                Attempt::Retry(reason) => {
                    warn!(%url, attempt, "fetch failed: {reason}");
                    last_error = reason;
                }
                Attempt::Fatal(reason) => return Err(sitemap_error(url, reason)),
            }
        }
        Err(sitemap_error(url, format!("gave up after {} attempts: {last_error}", retries + 1)))
    }

    /// True when a single GET of `url` succeeds.
    pub async fn probe(&self, url: &str) -> bool {
        self.get(url, 0).await.is_ok()
    }

    async fn attempt(&self, url: &str) -> Attempt {
        let _guard = self.limiter.acquire().await;
        let user_agent = self.pick_user_agent();
        let response = match self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Attempt::Retry(e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            let reason = format!("HTTP {status}");
            return if is_retryable(status) {
                Attempt::Retry(reason)
            } else {
                Attempt::Fatal(reason)
            };
        }
        match response.bytes().await {
            Ok(bytes) => Attempt::Body(bytes.to_vec()),
            Err(e) => Attempt::Retry(e.to_string()),
        }
    }

    fn pick_user_agent(&self) -> &str {
        self.user_agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or(crate::config::DEFAULT_USER_AGENT)
    }

    /// `backoff * 2^(attempt-1)` plus up to one `backoff` of jitter.
    fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = self.backoff.saturating_mul(1 << (attempt - 1).min(16));
        let jitter = rand::thread_rng().gen_range(0.0..=1.0);
        exp + self.backoff.mul_f64(jitter)
    }
}

#[async_trait]
impl SitemapFetcher for HttpFetcher {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>> {
        if is_http_url(location) {
            return self.get(location, self.retries).await;
        }
        let path = Path::new(location.strip_prefix("file://").unwrap_or(location));
        tokio::fs::read(path)
            .await
            .map_err(|e| sitemap_error(location, e.to_string()))
    }
}

/// 403, 429 and 5xx are worth another attempt.
pub fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::FORBIDDEN
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

pub fn is_http_url(location: &str) -> bool {
    url::Url::parse(location)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

fn sitemap_error(location: &str, reason: String) -> Error {
    Error::Sitemap {
        location: location.to_string(),
        reason,
    }
}
