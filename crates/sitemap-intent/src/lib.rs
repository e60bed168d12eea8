//! # sitemap-intent
//!
//! Classification, tree-aggregation, and diff engine for sitemap URL sets.
//!
//! A flat list of `(url, lastmod)` entries becomes:
//! - a tagged [`UrlRecord`] per URL (action, object, scene, intent category),
//! - a [`DirectoryNode`] tree with reconciled per-node counts,
//! - a [`DiffReport`] against the previous [`Snapshot`] of the same domain.
//!
//! ```no_run
//! use sitemap_intent::{IntentJob, JobOptions, RuleClassifier, SitemapEntry, SnapshotStore};
//!
//! # async fn demo() -> sitemap_intent::Result<()> {
//! let store = SnapshotStore::new("history");
//! let prior = store.open("example.com")?;
//! let entries = vec![SitemapEntry::new("https://example.com/remove-background", None)];
//!
//! let job = IntentJob::new(RuleClassifier::default(), JobOptions::default());
//! let output = job.run("example.com", &entries, prior.as_ref()).await?;
//! store.publish("example.com", &output.snapshot)?;
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod diff;
pub mod error;
pub mod export;
pub mod job;
pub mod normalizer;
pub mod sitemap;
pub mod snapshot;
pub mod summary;
pub mod tree;
pub mod types;

pub use classifier::{Classification, RuleClassifier, RuleSet, TextClassifier};
pub use diff::{diff_against, diff_sample, DiffReport, RemovedUrl};
pub use error::{Error, Result};
pub use job::{IntentJob, JobOptions, JobOutput, MalformedPolicy};
pub use normalizer::{normalize, NormalizedUrl};
pub use sitemap::{SampleInfo, SampleStrategy, SitemapFetcher};
pub use snapshot::{Snapshot, SnapshotStore};
pub use summary::{DiffSummary, SummaryDocument, SummaryOptions, SCHEMA_VERSION};
pub use tree::{build_tree, DirectoryNode};
pub use types::{Field, GroupBy, SitemapEntry, SortMode, UrlRecord, UNKNOWN};
