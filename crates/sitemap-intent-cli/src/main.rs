use anyhow::Result;
use clap::{Parser, Subcommand};
use sitemap_intent_cli::commands::diff_cmd::{self, SitemapDiffArgs};
use sitemap_intent_cli::commands::history_cmd::{self, HistoryArgs};
use sitemap_intent_cli::commands::intent_map::{self, IntentMapArgs};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sitemap-intent")]
#[command(about = "Map sitemap URLs to search intent and track changes between crawls", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print machine-readable JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Debug logging and per-URL detail
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Emit log lines as JSON
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify sitemap URLs by intent and diff against the last snapshot
    #[command(name = "intent-map")]
    IntentMap(IntentMapArgs),

    /// Diff two sitemap sources without touching the history
    #[command(name = "sitemap-diff")]
    SitemapDiff(SitemapDiffArgs),

    /// List published snapshots for a domain
    History(HistoryArgs),
}

fn init_tracing(cli: &Cli) {
    let default = if cli.verbose {
        "sitemap_intent=debug,sitemap_intent_cli=debug"
    } else if cli.quiet || cli.json {
        "sitemap_intent=warn,sitemap_intent_cli=warn"
    } else {
        "sitemap_intent=info,sitemap_intent_cli=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Output helpers read these.
    if cli.json {
        std::env::set_var("SITEMAP_INTENT_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("SITEMAP_INTENT_QUIET", "1");
    }
    if cli.verbose {
        std::env::set_var("SITEMAP_INTENT_VERBOSE", "1");
    }
    if cli.no_color {
        std::env::set_var("SITEMAP_INTENT_NO_COLOR", "1");
    }
    init_tracing(&cli);

    match cli.command {
        Commands::IntentMap(args) => intent_map::run(args).await,
        Commands::SitemapDiff(args) => diff_cmd::run(args).await,
        Commands::History(args) => history_cmd::run(args).await,
    }
}
