use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::LazyLock;

static VERSION_INFO: LazyLock<String> = LazyLock::new(|| {
    let version = env!("CARGO_PKG_VERSION");

    // Use VERGEN_GIT_SHA for the commit hash (with safe slicing)
    let commit = option_env!("VERGEN_GIT_SHA")
        .map(|s| s.chars().take(7).collect::<String>())
        .unwrap_or_else(|| "unknown".to_string());

    let built = option_env!("VERGEN_BUILD_DATE").unwrap_or("unknown"); // YYYY-MM-DD
    let rustc = option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown");

    format!("{version}\ncommit: {commit}\nbuilt: {built}\nrustc: {rustc}")
});

pub fn version_info() -> &'static str {
    &VERSION_INFO
}

/// CLI configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "tessera")]
#[command(
    author,
    version = version_info(),
    about = "Content synchronization engine for remote vector stores"
)]
#[command(after_help = "Examples:
  tessera sync docs                       # Sync the 'docs' collection to completion
  tessera sync docs --cron                # Schedule the job; drive it with 'tessera step docs'
  tessera step docs                       # Process one item of the active job
  tessera status                          # Show job state
  tessera cancel                          # Cancel the active sync job
  tessera collections                     # List configured collections

Providers (per collection, in collections.toml):
  provider = \"openai\"  - two-layer file store + vector store
  provider = \"gemini\"  - single-layer file-search store")]
pub struct Cli {
    /// PostgreSQL database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Provider API key
    #[arg(long, env = "TESSERA_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Override the provider API root (proxies, testing)
    #[arg(long, env = "TESSERA_BASE_URL")]
    pub base_url: Option<String>,

    /// JSONL file of content items to sync from
    #[arg(long, env = "TESSERA_CONTENT_FILE", value_name = "PATH")]
    pub content_file: Option<PathBuf>,

    /// Custom path to collections.toml configuration file
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Synchronize a collection's content into its remote store
    #[command(after_help = "Examples:
  tessera sync docs              # Direct mode: runs every item to completion
  tessera sync docs --cron       # Cron mode: creates the job as scheduled")]
    Sync {
        /// Collection name from collections.toml
        collection: String,

        /// Create the job in cron mode; each `tessera step` processes one item
        #[arg(long)]
        cron: bool,
    },
    /// Process one unit of the active sync job
    Step {
        /// Collection name the active job belongs to
        collection: String,
    },
    /// Show the state of the sync and analysis jobs
    Status,
    /// Cancel the active job
    Cancel {
        /// Job type to cancel
        #[arg(long, default_value = "sync")]
        job_type: String,
    },
    /// Analyze a collection's content quality under job control
    Analyze {
        /// Collection name from collections.toml
        collection: String,
    },
    /// List configured collections and their remote stores
    Collections,
}
