//! Crate-wide error hierarchy for pr-context-engine.
//!
//! Goals:
//! - Single root `Error` for all public functions.
//! - Provider-aware mapping (401→Unauthorized, 429→RateLimited, 5xx→Server, etc.).
//! - No dynamic dispatch, no async-trait, ergonomic `?` via `From` impls.

use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type CtxResult<T> = Result<T, Error>;

/// Root error type for the pr-context-engine crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Hosting-provider (remote API) related failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Codebase indexing failure (structural, not transient).
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Input validation errors (bad coordinates, malformed paths, etc.).
    #[error("validation error: {0}")]
    Validation(String),

    /// Generic catch-all error when nothing else fits.
    #[error("other error: {0}")]
    Other(String),
}

/// Detailed provider-specific error used inside the provider layer.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Unauthorized (HTTP 401).
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden (HTTP 403) without a rate-limit signal.
    #[error("forbidden")]
    Forbidden,

    /// Not found (HTTP 404).
    #[error("not found")]
    NotFound,

    /// Primary rate limit (quota exhausted for the current window).
    #[error("rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Secondary rate limit (burst/abuse detection asked us to back off).
    #[error("secondary rate limited")]
    SecondaryRateLimit { retry_after_secs: Option<u64> },

    /// Gateway/Server error (HTTP 5xx).
    #[error("server error: status {0}")]
    Server(u16),

    /// Other HTTP status (4xx/3xx) not covered above.
    #[error("http status error: {0}")]
    HttpStatus(u16),

    /// Timeout at transport level.
    #[error("timeout")]
    Timeout,

    /// Network/transport failure without status (DNS/connect/reset).
    #[error("network error: {0}")]
    Network(String),

    /// JSON deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Unexpected/invalid shape of provider response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Structural indexing errors.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Repository-wide traversal produced zero eligible source files.
    ///
    /// Fatal in strict mode; the tolerant entry point degrades to an empty
    /// index instead of raising this.
    #[error("no eligible source files found in {owner}/{repo}@{branch}")]
    NoEligibleFiles {
        owner: String,
        repo: String,
        branch: String,
    },
}

// ===== Conversions for `?` ergonomics =====

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Provider(ProviderError::from(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Provider(ProviderError::Serde(e))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return ProviderError::Timeout;
        }
        if let Some(status) = e.status() {
            let code = status.as_u16();
            return match code {
                401 => ProviderError::Unauthorized,
                403 => ProviderError::Forbidden,
                404 => ProviderError::NotFound,
                429 => ProviderError::RateLimited {
                    retry_after_secs: None,
                },
                500..=599 => ProviderError::Server(code),
                _ => ProviderError::HttpStatus(code),
            };
        }
        ProviderError::Network(e.to_string())
    }
}
