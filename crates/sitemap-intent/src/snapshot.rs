//! Per-domain snapshot history on disk.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<domain>/<snapshot-id>/snapshot.json
//! <root>/<domain>/latest            # id of the newest published snapshot
//! ```
//!
//! Publishing writes into a hidden temporary directory, renames it into
//! place, and only then repoints `latest`. A reader never sees a half-written
//! snapshot.

use crate::error::{Error, Result};
use crate::sitemap::SampleInfo;
use crate::types::UrlRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const SNAPSHOT_FILE: &str = "snapshot.json";
pub const LATEST_MARKER: &str = "latest";
const TMP_PREFIX: &str = ".tmp-";

/// Immutable record collection for one domain at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub domain: String,
    pub created_at: DateTime<Utc>,
    pub records: Vec<UrlRecord>,
    /// Every URL identity the site listed, in document order, when `records`
    /// holds only a sample of them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub site_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<SampleInfo>,
}

impl Snapshot {
    /// Snapshot stamped with the current time.
    pub fn new(domain: &str, records: Vec<UrlRecord>) -> Self {
        Self::at(domain, Utc::now(), records)
    }

    pub fn at(domain: &str, created_at: DateTime<Utc>, records: Vec<UrlRecord>) -> Self {
        Self {
            id: snapshot_id(created_at),
            domain: domain.to_string(),
            created_at,
            records,
            site_urls: Vec::new(),
            sample: None,
        }
    }

    /// Record that `records` is a sample drawn from `site_urls`.
    pub fn with_sample(mut self, site_urls: Vec<String>, sample: SampleInfo) -> Self {
        self.site_urls = site_urls;
        self.sample = Some(sample);
        self
    }

    /// URL identities the site listed at this point, in document order.
    pub fn site_identities(&self) -> Vec<&str> {
        if self.site_urls.is_empty() {
            self.records.iter().map(|r| r.url.as_str()).collect()
        } else {
            self.site_urls.iter().map(String::as_str).collect()
        }
    }

    /// URL identities the site listed at this point.
    pub fn urls(&self) -> HashSet<&str> {
        self.site_identities().into_iter().collect()
    }
}

/// Timestamp-named id, lexicographically sortable.
pub fn snapshot_id(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%S%.3fZ").to_string()
}

/// Reduce a domain or URL to a safe directory name (`https://Example.com:8080/x`
/// becomes `example.com_8080`).
pub fn domain_key(domain: &str) -> String {
    let host = url::Url::parse(domain)
        .ok()
        .and_then(|u| {
            u.host_str().map(|h| match u.port() {
                Some(port) => format!("{h}:{port}"),
                None => h.to_string(),
            })
        })
        .unwrap_or_else(|| domain.trim().trim_matches('/').to_string());
    host.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Snapshot history rooted at a directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
    keep: Option<usize>,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            keep: None,
        }
    }

    /// Keep only the newest `keep` snapshots after each publish.
    pub fn with_retention(mut self, keep: Option<usize>) -> Self {
        self.keep = keep.filter(|k| *k > 0);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn domain_dir(&self, domain: &str) -> PathBuf {
        self.root.join(domain_key(domain))
    }

    /// The latest snapshot for `domain`, or `None` on a first run.
    pub fn open(&self, domain: &str) -> Result<Option<Snapshot>> {
        match self.latest_id(domain)? {
            Some(id) => self.load(domain, &id).map(Some),
            None => Ok(None),
        }
    }

    /// Id the `latest` marker points at.
    pub fn latest_id(&self, domain: &str) -> Result<Option<String>> {
        let marker = self.domain_dir(domain).join(LATEST_MARKER);
        match fs::read_to_string(&marker) {
            Ok(id) => {
                let id = id.trim().to_string();
                Ok((!id.is_empty()).then_some(id))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::snapshot(marker, e)),
        }
    }

    /// Load one published snapshot.
    pub fn load(&self, domain: &str, id: &str) -> Result<Snapshot> {
        let path = self.domain_dir(domain).join(id).join(SNAPSHOT_FILE);
        let bytes = fs::read(&path).map_err(|e| Error::snapshot(&path, e))?;
        serde_json::from_slice(&bytes).map_err(|source| Error::SnapshotCorrupt { path, source })
    }

    /// Published snapshot ids, oldest first.
    pub fn list(&self, domain: &str) -> Result<Vec<String>> {
        let dir = self.domain_dir(domain);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::snapshot(dir, e)),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::snapshot(&dir, e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(TMP_PREFIX) || !entry.path().join(SNAPSHOT_FILE).is_file() {
                continue;
            }
            ids.push(name);
        }
        ids.sort();
        Ok(ids)
    }

    /// Write `snapshot` and repoint `latest` at it. Returns the snapshot directory.
    ///
    /// Any failure before the final rename leaves `latest` untouched.
    pub fn publish(&self, domain: &str, snapshot: &Snapshot) -> Result<PathBuf> {
        let dir = self.domain_dir(domain);
        fs::create_dir_all(&dir).map_err(|e| Error::snapshot(&dir, e))?;

        let target = dir.join(&snapshot.id);
        if target.exists() {
            return Err(Error::SnapshotExists {
                domain: domain_key(domain),
                id: snapshot.id.clone(),
            });
        }

        let staging = dir.join(format!("{TMP_PREFIX}{}", snapshot.id));
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| Error::snapshot(&staging, e))?;
        }
        fs::create_dir_all(&staging).map_err(|e| Error::snapshot(&staging, e))?;

        let file_path = staging.join(SNAPSHOT_FILE);
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        write_synced(&file_path, &bytes)?;
        fs::rename(&staging, &target).map_err(|e| Error::snapshot(&target, e))?;

        let marker = dir.join(LATEST_MARKER);
        let marker_tmp = dir.join(format!("{LATEST_MARKER}.tmp"));
        write_synced(&marker_tmp, snapshot.id.as_bytes())?;
        fs::rename(&marker_tmp, &marker).map_err(|e| Error::snapshot(&marker, e))?;

        info!(
            domain = %domain_key(domain),
            id = %snapshot.id,
            records = snapshot.records.len(),
            "published snapshot"
        );

        if let Some(keep) = self.keep {
            self.prune(domain, keep, &snapshot.id);
        }
        Ok(target)
    }

    /// Drop the oldest snapshots beyond `keep`. Pruning is best-effort.
    fn prune(&self, domain: &str, keep: usize, latest: &str) {
        let ids = match self.list(domain) {
            Ok(ids) => ids,
            Err(e) => {
                warn!("skipping snapshot pruning: {e}");
                return;
            }
        };
        if ids.len() <= keep {
            return;
        }
        let excess = ids.len() - keep;
        for id in ids.iter().take(excess).filter(|id| id.as_str() != latest) {
            let path = self.domain_dir(domain).join(id);
            match fs::remove_dir_all(&path) {
                Ok(()) => debug!(id = %id, "pruned snapshot"),
                Err(e) => warn!("failed to prune {}: {e}", path.display()),
            }
        }
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| Error::snapshot(path, e))?;
    file.write_all(bytes).map_err(|e| Error::snapshot(path, e))?;
    file.sync_all().map_err(|e| Error::snapshot(path, e))?;
    Ok(())
}
