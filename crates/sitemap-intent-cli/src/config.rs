//! Run configuration: built-in defaults, an optional JSON or TOML file, then
//! command-line overrides.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sitemap_intent::classifier::RuleSet;
use sitemap_intent::{GroupBy, JobOptions, MalformedPolicy, SampleStrategy, SortMode};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MAX_URLS: usize = 500;
pub const DEFAULT_USER_AGENT: &str = concat!("SitemapIntent/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";

/// Every knob of an `intent-map` run.
///
/// Each section carries `#[serde(default)]`, so a file only needs the keys it
/// changes. Lists such as `rules.actions` replace the defaults wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    pub max_urls: usize,
    pub sample_strategy: SampleStrategy,
    pub http: HttpConfig,
    pub rules: RuleSet,
    pub llm: LlmConfig,
    pub history: HistoryConfig,
    pub output: OutputConfig,
    pub on_malformed: MalformedPolicy,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            max_urls: DEFAULT_MAX_URLS,
            sample_strategy: SampleStrategy::First,
            http: HttpConfig::default(),
            rules: RuleSet::default(),
            llm: LlmConfig::default(),
            history: HistoryConfig::default(),
            output: OutputConfig::default(),
            on_malformed: MalformedPolicy::Skip,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Minimum pause between two requests.
    pub delay_secs: f64,
    /// Extra attempts after the first on 403, 429, 5xx, or transport errors.
    pub retries: u32,
    /// Alternates picked at random per attempt, alongside `user_agent`.
    pub extra_user_agents: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 10,
            delay_secs: 0.0,
            retries: 3,
            extra_user_agents: vec![
                "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)".into(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".into(),
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".into(),
            ],
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn delay(&self) -> Duration {
        if self.delay_secs.is_finite() && self.delay_secs > 0.0 {
            Duration::from_secs_f64(self.delay_secs)
        } else {
            Duration::ZERO
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is unset.
    pub api_key_env: String,
    /// Maximum requests in flight.
    pub concurrency: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: None,
            base_url: None,
            api_key: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            concurrency: 4,
        }
    }
}

impl LlmConfig {
    /// The model to use, when enrichment is switched on.
    pub fn active_model(&self) -> Option<&str> {
        self.model
            .as_deref()
            .filter(|m| self.enabled && !m.trim().is_empty())
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_LLM_BASE_URL)
    }

    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub dir: PathBuf,
    /// Snapshots kept per domain; `None` keeps all.
    pub keep: Option<usize>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".sitemap-intent/history"),
            keep: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub sample_size: usize,
    pub sort: SortMode,
    pub group_by: GroupBy,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sample_size: sitemap_intent::summary::DEFAULT_SAMPLE_SIZE,
            sort: SortMode::Count,
            group_by: GroupBy::Path,
        }
    }
}

/// Command-line values that win over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub max_urls: Option<usize>,
    pub sample: Option<SampleStrategy>,
    pub timeout_secs: Option<u64>,
    pub delay_secs: Option<f64>,
    pub user_agent: Option<String>,
    /// Naming a model also switches enrichment on.
    pub llm_model: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_api_key: Option<String>,
    pub history_dir: Option<PathBuf>,
    pub group_by: Option<GroupBy>,
    pub sort: Option<SortMode>,
    pub abort_on_malformed: bool,
}

impl IntentConfig {
    /// Defaults, merged with `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&text, path)
    }

    /// Parse `text` as TOML or JSON, chosen by the extension of `path`.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let config = match ext.as_deref() {
            Some("toml") => toml::from_str(text)
                .with_context(|| format!("invalid TOML in {}", path.display()))?,
            Some("json") | None => serde_json::from_str(text)
                .with_context(|| format!("invalid JSON in {}", path.display()))?,
            Some(other) => bail!(
                "unsupported config format '.{other}' for {} (expected .json or .toml)",
                path.display()
            ),
        };
        Ok(config)
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(max) = overrides.max_urls {
            self.max_urls = max;
        }
        if let Some(sample) = overrides.sample {
            self.sample_strategy = sample;
        }
        if let Some(timeout) = overrides.timeout_secs {
            self.http.timeout_secs = timeout;
        }
        if let Some(delay) = overrides.delay_secs {
            self.http.delay_secs = delay;
        }
        if let Some(ua) = &overrides.user_agent {
            self.http.user_agent = ua.clone();
        }
        if let Some(model) = &overrides.llm_model {
            self.llm.enabled = true;
            self.llm.model = Some(model.clone());
        }
        if let Some(url) = &overrides.llm_base_url {
            self.llm.base_url = Some(url.clone());
        }
        if let Some(key) = &overrides.llm_api_key {
            self.llm.api_key = Some(key.clone());
        }
        if let Some(dir) = &overrides.history_dir {
            self.history.dir = dir.clone();
        }
        if let Some(group_by) = overrides.group_by {
            self.output.group_by = group_by;
        }
        if let Some(sort) = overrides.sort {
            self.output.sort = sort;
        }
        if overrides.abort_on_malformed {
            self.on_malformed = MalformedPolicy::Abort;
        }
    }

    pub fn job_options(&self) -> JobOptions {
        JobOptions {
            on_malformed: self.on_malformed,
            group_by: self.output.group_by,
            sort: self.output.sort,
            sample_size: self.output.sample_size,
            enrich_concurrency: self.llm.concurrency.max(1),
            max_urls: Some(self.max_urls),
            sample_strategy: self.sample_strategy,
        }
    }
}
