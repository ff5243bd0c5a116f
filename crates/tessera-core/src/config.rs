//! Configuration types for Tessera components.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

// =============================================================================
// Provider Configuration
// =============================================================================

/// Remote index provider family.
///
/// Determines which vector store adapter topology is used for a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Two-layer topology: independent file storage plus vector store
    /// indexes files are attached to.
    #[default]
    OpenAi,
    /// Single-layer topology: documents live directly inside a named
    /// file-search store.
    Gemini,
}

impl ProviderKind {
    /// Returns true if file storage and search index are separate resources.
    pub fn is_two_layer(&self) -> bool {
        matches!(self, ProviderKind::OpenAi)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Gemini => write!(f, "gemini"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            _ => Err(AppError::Config(format!(
                "Unknown provider: '{}'. Valid options: openai, gemini",
                s
            ))),
        }
    }
}

// =============================================================================
// HTTP and polling configuration
// =============================================================================

/// HTTP client configuration for provider API calls.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Timeout for status checks and other cheap reads.
    pub short_timeout: Duration,
    /// Timeout for ordinary mutations and queries.
    pub timeout: Duration,
    /// Timeout for uploads and other long calls.
    pub long_timeout: Duration,
    /// Retries beyond the first attempt for retryable failures.
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries.
    pub retry_base_delay: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            short_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
            long_timeout: Duration::from_secs(90),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

/// Polling configuration for long-running remote operations.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// First poll delay; doubles each attempt.
    pub base_delay: Duration,
    /// Delay ceiling.
    pub max_delay: Duration,
    /// Attempts before surfacing an operation timeout.
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            max_attempts: 12,
        }
    }
}

impl PollConfig {
    /// Delay before poll attempt `attempt` (0-based): base doubling per
    /// attempt, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        std::cmp::min(self.base_delay.saturating_mul(factor), self.max_delay)
    }
}

// =============================================================================
// Collection Configuration (collections.toml)
// =============================================================================

/// Default enabled status when not specified in configuration.
fn default_enabled() -> bool {
    true
}

/// Root configuration structure for collections.toml.
///
/// # Example
///
/// ```toml
/// [[collections]]
/// name = "docs"
/// provider = "openai"
/// content_filter = "post,page"
///
/// [[collections]]
/// name = "kb"
/// provider = "gemini"
/// enabled = false
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionsConfig {
    /// Array of collection configurations.
    pub collections: Vec<CollectionEntry>,
}

impl CollectionsConfig {
    /// Returns only enabled collections.
    pub fn enabled_collections(&self) -> Vec<&CollectionEntry> {
        self.collections.iter().filter(|c| c.enabled).collect()
    }

    /// Find a collection by name (case-insensitive).
    pub fn find_by_name(&self, name: &str) -> Option<&CollectionEntry> {
        self.collections
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// A single collection entry in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionEntry {
    /// Human-readable collection name.
    ///
    /// Used for `sync <name>` lookup and logging.
    pub name: String,

    /// Remote index provider for this collection.
    #[serde(default)]
    pub provider: ProviderKind,

    /// Comma-separated item types to include (e.g. "post,page").
    ///
    /// An empty or missing filter includes every published item.
    pub content_filter: Option<String>,

    /// Whether this collection participates in batch sync.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Optional description of the collection.
    pub description: Option<String>,
}

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "collections.toml";

/// Returns the default configuration directory path.
///
/// Uses XDG Base Directory specification: `~/.config/tessera/`
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tessera"))
}

/// Returns the default configuration file path.
///
/// Path: `~/.config/tessera/collections.toml`
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join(CONFIG_FILE_NAME))
}

/// Default template content for a new collections.toml file.
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Tessera Collection Configuration
#
# Usage:
#   tessera sync <name>       # Sync one collection
#   tessera collections       # List configured collections
#
# Set enabled = false to skip a collection during batch sync.
# content_filter is a comma-separated list of item types; omit it to
# include every published item.

[[collections]]
name = "docs"
provider = "openai"
content_filter = "post,page"
description = "Published documentation pages"
"#;

/// Load collection configuration from a TOML file.
///
/// # Arguments
/// * `path` - Optional custom path. If `None`, uses default XDG path.
///
/// # Returns
/// * `Ok(Some(config))` - Configuration loaded successfully
/// * `Ok(None)` - No configuration file found at the default path
/// * `Err(e)` - Configuration file exists but is invalid
///
/// # Behavior
/// If no configuration file exists at the default path, a template file
/// is automatically created to help users get started.
pub fn load_collections_config(path: Option<PathBuf>) -> Result<Option<CollectionsConfig>, AppError> {
    let using_default_path = path.is_none();
    let config_path = match path {
        Some(p) => p,
        None => match default_config_path() {
            Some(p) => p,
            None => return Ok(None),
        },
    };

    if !config_path.exists() {
        if using_default_path {
            match create_default_config(&config_path) {
                Ok(()) => {
                    tracing::info!(
                        "Config file created at {}. Edit it to describe your collections.",
                        config_path.display()
                    );
                }
                Err(e) => {
                    tracing::warn!("Could not create default config template: {}", e);
                    return Ok(None);
                }
            }
        } else {
            return Err(AppError::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }
    }

    let content = std::fs::read_to_string(&config_path).map_err(|e| {
        AppError::Config(format!(
            "Failed to read config file '{}': {}",
            config_path.display(),
            e
        ))
    })?;

    let config: CollectionsConfig = toml::from_str(&content).map_err(|e| {
        AppError::Config(format!(
            "Invalid TOML in '{}': {}",
            config_path.display(),
            e
        ))
    })?;

    Ok(Some(config))
}

/// Create a default configuration file with a template.
///
/// Creates the parent directory if it doesn't exist.
fn create_default_config(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;
    tracing::info!("Created default config template at: {}", path.display());

    Ok(())
}
