//! # sitemap-intent-cli
//!
//! Command-line front end for the `sitemap-intent` engine: HTTP and file
//! sitemap fetching, robots.txt discovery, optional model-based enrichment,
//! and the `intent-map`, `sitemap-diff` and `history` subcommands.

pub mod commands;
pub mod config;
pub mod fetch;
pub mod llm;
pub mod output;
pub mod rate_limiter;
pub mod robots;
