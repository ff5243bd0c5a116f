//! HTTP + resilience layer beneath the vector store adapters.
//!
//! `ProviderClient` knows nothing about domain entities. It issues requests,
//! classifies failures into the shared taxonomy, retries retryable ones with
//! backoff, and drives the two long-running protocols remote index APIs
//! use: resumable (chunked) uploads and operation polling.

use std::time::{Duration, Instant};

use rand::Rng;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use tessera_core::error::{AppError, ProviderErrorDetails, ProviderErrorKind};
use tessera_core::{HttpConfig, PollConfig};

// =============================================================================
// Request purpose
// =============================================================================

/// What a request is for; drives the per-request timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPurpose {
    /// Cheap existence/status checks - short timeout.
    Status,
    /// Ordinary reads - default timeout.
    Query,
    /// Creates, updates, deletes - default timeout.
    Mutation,
    /// Uploads and other long transfers - long timeout.
    Upload,
}

impl RequestPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestPurpose::Status => "status",
            RequestPurpose::Query => "query",
            RequestPurpose::Mutation => "mutation",
            RequestPurpose::Upload => "upload",
        }
    }

    fn timeout(&self, config: &HttpConfig) -> Duration {
        match self {
            RequestPurpose::Status => config.short_timeout,
            RequestPurpose::Query | RequestPurpose::Mutation => config.timeout,
            RequestPurpose::Upload => config.long_timeout,
        }
    }
}

// =============================================================================
// Authentication
// =============================================================================

/// How the API key is transmitted.
///
/// The key always travels in a header, never in the URL, to prevent
/// accidental exposure in logs and proxies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <key>` (OpenAI-style APIs).
    Bearer,
    /// `x-goog-api-key: <key>` (Google-style APIs).
    GoogApiKey,
}

// =============================================================================
// Error classification
// =============================================================================

/// Error envelope most provider APIs wrap failures in.
#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Classify a provider API error based on status code and message.
pub fn classify_provider_error(status_code: u16, message: &str) -> ProviderErrorKind {
    match status_code {
        401 | 403 => ProviderErrorKind::Authentication,
        400 => {
            if message.contains("API key") || message.contains("Unauthorized") {
                ProviderErrorKind::Authentication
            } else {
                ProviderErrorKind::BadRequest
            }
        }
        404 => ProviderErrorKind::NotFound,
        408 => ProviderErrorKind::Timeout,
        409 => ProviderErrorKind::VersionConflict,
        429 => {
            // Quota exhaustion rides the same status as rate limiting but
            // must not be retried.
            if message.contains("insufficient_quota") || message.contains("quota") {
                ProviderErrorKind::QuotaExceeded
            } else {
                ProviderErrorKind::RateLimit
            }
        }
        503 => ProviderErrorKind::ServiceUnavailable,
        500..=599 => ProviderErrorKind::ServerError,
        _ => {
            if message.contains("API key") || message.contains("Unauthorized") {
                ProviderErrorKind::Authentication
            } else if message.contains("rate") {
                ProviderErrorKind::RateLimit
            } else if message.contains("quota") {
                ProviderErrorKind::QuotaExceeded
            } else {
                ProviderErrorKind::Unknown
            }
        }
    }
}

// =============================================================================
// Polling
// =============================================================================

/// Verdict an adapter's poll predicate returns for one poll response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The operation settled successfully.
    Ready,
    /// Still in flight; keep polling.
    Pending,
    /// The operation settled with a remote failure.
    Failed(String),
}

// =============================================================================
// Provider client
// =============================================================================

/// HTTP client for one remote provider API.
#[derive(Clone)]
pub struct ProviderClient {
    http: Client,
    api_key: String,
    base_url: String,
    auth: AuthScheme,
    config: HttpConfig,
    poll: PollConfig,
}

impl ProviderClient {
    /// Creates a client for the given API root.
    pub fn new(api_key: &str, base_url: &str, auth: AuthScheme) -> Result<Self, AppError> {
        Self::with_config(api_key, base_url, auth, HttpConfig::default(), PollConfig::default())
    }

    pub fn with_config(
        api_key: &str,
        base_url: &str,
        auth: AuthScheme,
        config: HttpConfig,
        poll: PollConfig,
    ) -> Result<Self, AppError> {
        let http = Client::builder()
            .build()
            .map_err(|e| AppError::Client(e.to_string()))?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            config,
            poll,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.auth {
            AuthScheme::Bearer => builder.bearer_auth(&self.api_key),
            AuthScheme::GoogApiKey => builder.header("x-goog-api-key", &self.api_key),
        }
    }

    /// Issue a JSON request with classification, retry, and backoff.
    ///
    /// Retryable failures are retried up to `max_retries` times beyond the
    /// first attempt, sleeping for the server-suggested `Retry-After` when
    /// present and an exponential, jittered delay otherwise. Every attempt
    /// is logged with its timing.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
        purpose: RequestPurpose,
    ) -> Result<Value, AppError> {
        let url = self.url(path);
        let timeout = purpose.timeout(&self.config);
        let mut attempt: u32 = 0;

        loop {
            let mut builder = self
                .http
                .request(method.clone(), &url)
                .timeout(timeout);
            builder = self.authorize(builder);
            if let Some(body) = payload {
                builder = builder.json(body);
            }

            let started = Instant::now();
            let outcome = self.execute(builder, timeout).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(value) => {
                    tracing::debug!(
                        endpoint = path,
                        purpose = purpose.as_str(),
                        attempt,
                        elapsed_ms,
                        "request succeeded"
                    );
                    return Ok(value);
                }
                Err(err) => {
                    tracing::debug!(
                        endpoint = path,
                        purpose = purpose.as_str(),
                        attempt,
                        elapsed_ms,
                        error = %err,
                        "request failed"
                    );
                    if err.is_retryable() && attempt < self.config.max_retries {
                        let delay = self.backoff_delay(attempt, &err);
                        tracing::debug!(
                            endpoint = path,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "retrying after backoff"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Send one request and turn the response into a value or a classified
    /// error.
    async fn execute(&self, builder: RequestBuilder, timeout: Duration) -> Result<Value, AppError> {
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(timeout.as_secs())
            } else if e.is_connect() {
                AppError::Provider(ProviderErrorDetails::new(
                    ProviderErrorKind::Network,
                    format!("Connection failed: {}", e),
                    0, // no HTTP status for connection failures
                ))
            } else {
                AppError::Client(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.classify_response(response).await);
        }

        // An empty body (e.g. on DELETE) is a valid success.
        let text = response
            .text()
            .await
            .map_err(|e| AppError::Client(format!("Failed to read response: {}", e)))?;
        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| {
            AppError::Provider(ProviderErrorDetails::new(
                ProviderErrorKind::Unknown,
                format!("Malformed success response: {}", e),
                status.as_u16(),
            ))
        })
    }

    async fn classify_response(&self, response: Response) -> AppError {
        let status_code = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();

        let message = if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&body) {
            envelope.error.message
        } else {
            format!("HTTP {}: {}", status_code, body)
        };

        let kind = classify_provider_error(status_code, &message);
        let mut details = ProviderErrorDetails::new(kind, message, status_code);
        if let Some(seconds) = retry_after {
            details = details.with_retry_after(seconds);
        }
        AppError::Provider(details)
    }

    /// Backoff before retry `attempt + 1`: server-suggested delay when
    /// present, otherwise exponential from the base delay with jitter.
    fn backoff_delay(&self, attempt: u32, err: &AppError) -> Duration {
        if let AppError::Provider(details) = err {
            if let Some(seconds) = details.retry_after {
                return Duration::from_secs(seconds);
            }
        }
        let base = self.config.retry_base_delay;
        let exp = base.saturating_mul(2u32.saturating_pow(attempt));
        let jitter_ms = rand::thread_rng().gen_range(0..=base.as_millis() as u64 / 2);
        exp + Duration::from_millis(jitter_ms)
    }

    /// Two-phase resumable upload.
    ///
    /// Phase one declares the content length and type against the initiate
    /// endpoint and receives a session upload URL; phase two streams the
    /// payload to that URL with a finalize signal. Both phases go through
    /// the same classification as ordinary requests; only the initiate
    /// phase is retried, since a session URL is single-use.
    pub async fn upload_resumable(
        &self,
        initiate_path: &str,
        metadata: &Value,
        content: Vec<u8>,
        content_type: &str,
    ) -> Result<Value, AppError> {
        let url = self.url(initiate_path);
        let timeout = RequestPurpose::Upload.timeout(&self.config);

        // Phase 1: initiate the session.
        let started = Instant::now();
        let mut builder = self
            .http
            .post(&url)
            .timeout(timeout)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", content.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", content_type)
            .json(metadata);
        builder = self.authorize(builder);

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(timeout.as_secs())
            } else {
                AppError::Network(format!("Upload initiation failed: {}", e))
            }
        })?;
        if !response.status().is_success() {
            return Err(self.classify_response(response).await);
        }
        let upload_url = response
            .headers()
            .get("X-Goog-Upload-URL")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::Client("Upload initiation returned no session URL".to_string())
            })?;
        tracing::debug!(
            endpoint = initiate_path,
            elapsed_ms = started.elapsed().as_millis() as u64,
            bytes = content.len(),
            "upload session initiated"
        );

        // Phase 2: stream the payload and finalize.
        let started = Instant::now();
        let mut builder = self
            .http
            .post(&upload_url)
            .timeout(timeout)
            .header("X-Goog-Upload-Command", "upload, finalize")
            .header("X-Goog-Upload-Offset", "0")
            .header("Content-Type", content_type)
            .body(content);
        builder = self.authorize(builder);

        let value = self.execute(builder, timeout).await?;
        tracing::debug!(
            endpoint = initiate_path,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "upload finalized"
        );
        Ok(value)
    }

    /// Poll a long-running operation until the predicate settles it.
    ///
    /// The delay starts at the configured base and doubles per attempt up
    /// to the ceiling; when the attempt budget runs out an
    /// [`AppError::OperationTimeout`] surfaces.
    pub async fn poll_operation<F>(&self, path: &str, check: F) -> Result<Value, AppError>
    where
        F: Fn(&Value) -> PollOutcome + Send + Sync,
    {
        for attempt in 0..self.poll.max_attempts {
            tokio::time::sleep(self.poll.delay_for_attempt(attempt)).await;
            let value = self
                .request(Method::GET, path, None, RequestPurpose::Status)
                .await?;
            match check(&value) {
                PollOutcome::Ready => return Ok(value),
                PollOutcome::Pending => {
                    tracing::debug!(endpoint = path, attempt, "operation still pending");
                }
                PollOutcome::Failed(message) => {
                    return Err(AppError::provider(
                        ProviderErrorKind::ServerError,
                        message,
                        200,
                    ));
                }
            }
        }
        Err(AppError::OperationTimeout {
            attempts: self.poll.max_attempts,
        })
    }
}
