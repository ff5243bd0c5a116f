use thiserror::Error;

/// Provider API errors are classified into a fixed taxonomy so that the
/// sync engine can decide retryability without knowing which vendor
/// produced the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Authentication failure (401/403, invalid or revoked API key)
    Authentication,
    /// Malformed payload or schema violation (400) - will not succeed on retry
    BadRequest,
    /// Remote resource (store, file, operation) does not exist (404)
    NotFound,
    /// Rate limit exceeded (429)
    RateLimit,
    /// Billing/quota exhausted (insufficient_quota) - distinct from rate limiting
    QuotaExceeded,
    /// Request timed out (408 or transport timeout)
    Timeout,
    /// Service temporarily unavailable (503)
    ServiceUnavailable,
    /// Other server-side failure (5xx)
    ServerError,
    /// Optimistic-concurrency violation (409) - caller must reload and recompute
    VersionConflict,
    /// Network/connection error before any HTTP status was received
    Network,
    /// Unknown or unclassified error
    Unknown,
}

impl ProviderErrorKind {
    /// Stable snake_case code stored on training records and surfaced to operators.
    pub fn code(&self) -> &'static str {
        match self {
            ProviderErrorKind::Authentication => "authentication_failed",
            ProviderErrorKind::BadRequest => "bad_request",
            ProviderErrorKind::NotFound => "not_found",
            ProviderErrorKind::RateLimit => "rate_limit_exceeded",
            ProviderErrorKind::QuotaExceeded => "insufficient_quota",
            ProviderErrorKind::Timeout => "timeout",
            ProviderErrorKind::ServiceUnavailable => "service_unavailable",
            ProviderErrorKind::ServerError => "server_error",
            ProviderErrorKind::VersionConflict => "version_conflict",
            ProviderErrorKind::Network => "network_error",
            ProviderErrorKind::Unknown => "unknown",
        }
    }

    /// Returns true if an operation failing with this kind may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderErrorKind::RateLimit
                | ProviderErrorKind::Timeout
                | ProviderErrorKind::ServiceUnavailable
                | ProviderErrorKind::ServerError
                | ProviderErrorKind::Network
        )
    }
}

/// Structured error details from a remote provider API.
#[derive(Debug, Clone)]
pub struct ProviderErrorDetails {
    /// The specific error category
    pub kind: ProviderErrorKind,
    /// Human-readable error message from the API
    pub message: String,
    /// HTTP status code (0 when the failure happened before a response)
    pub status_code: u16,
    /// Server-suggested retry delay in seconds, when supplied
    pub retry_after: Option<u64>,
}

impl ProviderErrorDetails {
    pub fn new(kind: ProviderErrorKind, message: String, status_code: u16) -> Self {
        Self {
            kind,
            message,
            status_code,
            retry_after: None,
        }
    }

    /// Attach a server-supplied `Retry-After` delay.
    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }
}

impl std::fmt::Display for ProviderErrorDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Provider API error (HTTP {}): {}",
            self.status_code, self.message
        )
    }
}

/// Application-wide error types.
///
/// Most errors automatically convert from their source types using the
/// `#[from]` attribute:
/// - `sqlx::Error` → `AppError::Database`
/// - `serde_json::Error` → `AppError::Serialization`
#[derive(Error, Debug)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP transport failed before the provider produced a response.
    #[error("API client error: {0}")]
    Client(String),

    /// Remote provider API call failed with a classified error.
    #[error("Provider error: {0}")]
    Provider(ProviderErrorDetails),

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Network or connection error.
    #[error("Network error: {0}")]
    Network(String),

    /// Request timed out client-side.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// A long-running remote operation did not settle within the poll budget.
    #[error("Remote operation did not complete after {attempts} polls")]
    OperationTimeout { attempts: u32 },

    /// A job of this type is already scheduled or running.
    #[error("A '{0}' job is already active")]
    JobActive(String),

    /// Job initialization resolved an empty item set.
    #[error("No items to process")]
    NoItems,

    /// A referenced collection does not exist.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic application error for cases not covered by specific variants.
    #[error("Error: {0}")]
    Generic(String),
}

impl AppError {
    /// Build a provider error in one call.
    pub fn provider(kind: ProviderErrorKind, message: impl Into<String>, status: u16) -> Self {
        AppError::Provider(ProviderErrorDetails::new(kind, message.into(), status))
    }

    /// Returns the classified kind if this is a provider error.
    pub fn provider_kind(&self) -> Option<ProviderErrorKind> {
        match self {
            AppError::Provider(details) => Some(details.kind),
            _ => None,
        }
    }

    /// Returns true if this error is retryable.
    ///
    /// Retryable errors feed the job's retry sub-pass and the
    /// consecutive-failure circuit breaker; non-retryable errors are
    /// recorded and skipped.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Network(_)
            | AppError::Timeout(_)
            | AppError::OperationTimeout { .. }
            | AppError::Client(_) => true,
            AppError::Provider(details) => details.kind.is_retryable(),
            _ => false,
        }
    }

    /// Stable snake_case code for persisting on training records.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Client(_) => "client_error",
            AppError::Provider(details) => details.kind.code(),
            AppError::Serialization(_) => "serialization_error",
            AppError::Network(_) => "network_error",
            AppError::Timeout(_) => "timeout",
            AppError::OperationTimeout { .. } => "operation_timeout",
            AppError::JobActive(_) => "job_active",
            AppError::NoItems => "no_items",
            AppError::CollectionNotFound(_) => "collection_not_found",
            AppError::Config(_) => "config_error",
            AppError::Generic(_) => "unknown",
        }
    }

    /// Returns a user-friendly error message suitable for CLI output.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Database(e) => {
                if e.to_string().contains("connection") {
                    "Cannot connect to database. Is PostgreSQL running?".to_string()
                } else {
                    format!("Database error: {}", e)
                }
            }
            AppError::Provider(details) => match details.kind {
                ProviderErrorKind::Authentication => {
                    "Invalid provider API key.\n   Check your TESSERA_API_KEY environment variable."
                        .to_string()
                }
                ProviderErrorKind::RateLimit => {
                    "Provider rate limit reached.\n   Wait a moment and try again.".to_string()
                }
                ProviderErrorKind::QuotaExceeded => {
                    "Provider quota exceeded.\n   Check your account billing.".to_string()
                }
                ProviderErrorKind::ServiceUnavailable | ProviderErrorKind::ServerError => {
                    format!(
                        "Provider server error (HTTP {}).\n   Please try again later.",
                        details.status_code
                    )
                }
                _ => format!("Provider error: {}", details.message),
            },
            AppError::Network(msg) => {
                format!("Network error: {}\n   Check your internet connection.", msg)
            }
            AppError::Timeout(secs) => {
                format!("Request timed out after {} seconds. Try again later.", secs)
            }
            AppError::JobActive(job_type) => format!(
                "A '{}' job is already running. Cancel it first or wait for it to finish.",
                job_type
            ),
            AppError::NoItems => {
                "Nothing to sync: the collection resolved an empty item set.".to_string()
            }
            AppError::Config(msg) => {
                format!("Configuration error: {}\n   Check your configuration file.", msg)
            }
            _ => self.to_string(),
        }
    }
}
