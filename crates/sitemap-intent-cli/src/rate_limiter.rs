//! Rate limiter for polite sitemap fetching.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Enforces a concurrency limit and a minimum delay between requests.
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    min_delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(max_concurrent: usize, min_delay: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            min_delay,
            last_request: Mutex::new(None),
        }
    }

    /// Limiter honouring a robots.txt `Crawl-delay`, never faster than `floor`.
    ///
    /// Delays that do not fit a `Duration` are ignored.
    pub fn from_crawl_delay(crawl_delay: Option<f32>, floor: Duration, max_concurrent: usize) -> Self {
        let robots = crawl_delay
            .filter(|d| *d > 0.0)
            .and_then(|d| Duration::try_from_secs_f32(d).ok())
            .unwrap_or_default();
        Self::new(max_concurrent, robots.max(floor))
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Wait until the limiter allows another request.
    pub async fn acquire(&self) -> RateLimitGuard {
        // The semaphore is never closed, so acquisition only fails on shutdown.
        let permit = self.semaphore.clone().acquire_owned().await.ok();

        {
            let mut last = self.last_request.lock().await;
            if let Some(previous) = *last {
                let elapsed = previous.elapsed();
                if elapsed < self.min_delay {
                    tokio::time::sleep(self.min_delay - elapsed).await;
                }
            }
            *last = Some(Instant::now());
        }

        RateLimitGuard { _permit: permit }
    }
}

/// Releases the limiter permit when dropped.
pub struct RateLimitGuard {
    _permit: Option<OwnedSemaphorePermit>,
}
