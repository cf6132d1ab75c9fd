//! Error taxonomy shared across the Amber core (spec §7).

use thiserror::Error;

/// Errors surfaced by core ports and application services.
///
/// Each variant maps to one row of the error taxonomy in `spec.md` §7.
/// Infrastructure ports raise these; application code matches on the
/// variant to decide whether to retry, fail over, or propagate.
#[derive(Debug, Error)]
pub enum AmberError {
    /// Transient upstream provider failure; retryable, engages failover/circuit breaker.
    #[error("provider unavailable: {message}")]
    ProviderUnavailable { message: String },

    /// Transient rate limiting; retry after the indicated duration.
    #[error("rate limited: {message}")]
    RateLimit {
        message: String,
        retry_after_ms: Option<u64>,
    },

    /// Non-transient billing/quota failure; do not retry.
    #[error("quota exceeded: {message}")]
    QuotaExceeded { message: String },

    /// Permanent configuration error (bad credentials, malformed request).
    #[error("authentication error: {message}")]
    Authentication { message: String },

    /// Permanent configuration error distinct from auth (bad model name, etc).
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// Request-level validation failure (HTTP 422 at the transport layer).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Resource not found (HTTP 404 at the transport layer).
    #[error("not found: {message}")]
    NotFound { message: String },

    /// State-machine compare-and-swap mismatch.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// Configuration resolution failure (ambiguous model lookup, missing setting).
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Storage-port failure (vector/graph/object/relational/KV).
    #[error("storage error: {message}")]
    Storage { message: String },

    /// Unclassified internal error.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl AmberError {
    /// Whether this error is retryable per the taxonomy in spec.md §7.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AmberError::ProviderUnavailable { .. } | AmberError::RateLimit { .. }
        )
    }

    /// Whether this error should short-circuit a failover chain without
    /// counting toward a circuit breaker (permanent config errors).
    #[must_use]
    pub fn is_permanent_config_error(&self) -> bool {
        matches!(
            self,
            AmberError::Authentication { .. } | AmberError::InvalidRequest { .. }
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AmberError::Internal {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        AmberError::Storage {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AmberError::NotFound {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        AmberError::Configuration {
            message: message.into(),
        }
    }
}

/// Convenience result alias for core/port-level APIs.
pub type Result<T> = std::result::Result<T, AmberError>;

/// Structured error body the outer HTTP layer converts `AmberError` into
/// (spec.md §7: "The outer HTTP layer converts to a structured error
/// body"). Kept here since the shape is part of the observable contract
/// even though the HTTP layer itself is out of scope.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub request_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorBody {
    #[must_use]
    pub fn from_error(err: &AmberError, request_id: impl Into<String>) -> Self {
        let code = match err {
            AmberError::ProviderUnavailable { .. } => "provider_unavailable",
            AmberError::RateLimit { .. } => "rate_limited",
            AmberError::QuotaExceeded { .. } => "quota_exceeded",
            AmberError::Authentication { .. } => "authentication_error",
            AmberError::InvalidRequest { .. } => "invalid_request",
            AmberError::Validation { .. } => "validation_error",
            AmberError::NotFound { .. } => "not_found",
            AmberError::Conflict { .. } => "conflict",
            AmberError::Configuration { .. } => "configuration_error",
            AmberError::Storage { .. } => "storage_error",
            AmberError::Internal { .. } => "internal_error",
        };

        Self {
            code: code.to_string(),
            message: err.to_string(),
            request_id: request_id.into(),
            timestamp: chrono::Utc::now(),
            details: None,
        }
    }
}
