use http::StatusCode;
use thiserror::Error;

/// Classification attached to a server-layer failure
///
/// Drives both the retry policy at the Server layer and the scheduler's
/// error accounting (blacklist vs. temporary block vs. no action).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Permanent failure (e.g. "invalid model") — pipeline is blacklisted
    Unrecoverable,
    /// Missing or rejected credentials — pipeline is temporarily blocked
    Authentication,
    /// Upstream rate limit hit
    RateLimit,
    /// Network-level failure (timeout, connection reset, 408/504)
    Network,
    /// Transient server-side failure (5xx) other than the above
    Recoverable,
}

/// Errors surfaced anywhere in the gateway core
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration failed structural or semantic validation
    #[error("config invalid: {0}")]
    ConfigInvalid(String),

    /// A pipeline failed its initial handshake during initialization
    #[error("handshake failed for pipeline {pipeline_id}: {reason}")]
    HandshakeFailed {
        /// The pipeline that failed to come up
        pipeline_id: String,
        /// Why the handshake failed
        reason: String,
    },

    /// No pipeline could be selected for a virtual model
    #[error("no available pipelines for virtual model {virtual_model}")]
    NoAvailablePipelines {
        /// The virtual model that had no eligible pipeline
        virtual_model: String,
    },

    /// A layer's output failed the next layer's format precondition
    #[error("format violation at {layer}: {detail}")]
    FormatViolation {
        /// Name of the layer whose post-condition check failed
        layer: &'static str,
        /// Human-readable explanation
        detail: String,
    },

    /// The transformer layer failed to convert the request
    #[error("transformer failed: {0}")]
    TransformerFailed(String),

    /// Upstream rejected credentials
    #[error("authentication failed against upstream")]
    Authentication,

    /// Upstream rate-limited the request
    #[error("rate limited by upstream, retry after {retry_after_secs}s")]
    RateLimit {
        /// Seconds until the caller should retry, if known
        retry_after_secs: u64,
    },

    /// Network-level failure reaching the upstream
    #[error("network error: {0}")]
    Network(String),

    /// A failure the scheduler should treat as permanent for this pipeline
    #[error("unrecoverable upstream error: {0}")]
    Unrecoverable(String),

    /// A transient upstream failure eligible for retry/blocking
    #[error("recoverable upstream error: {0}")]
    Recoverable(String),

    /// The upstream response body could not be parsed, even after salvage
    #[error("failed to parse upstream response: {0}")]
    ParseError(String),

    /// Already initialized; `initialize()` is at-most-once
    #[error("gateway already initialized")]
    AlreadyInitialized,

    /// Catch-all for programmer-error states that should never occur
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GatewayError {
    /// Classify this error for scheduler accounting, if it originated at
    /// the Server layer. Other kinds (config, format-violation, …) are not
    /// pipeline-attributable and return `None`.
    pub const fn classify(&self) -> Option<ErrorKind> {
        match self {
            Self::Authentication => Some(ErrorKind::Authentication),
            Self::RateLimit { .. } => Some(ErrorKind::RateLimit),
            Self::Network(_) | Self::ParseError(_) => Some(ErrorKind::Network),
            Self::Unrecoverable(_) => Some(ErrorKind::Unrecoverable),
            Self::Recoverable(_) => Some(ErrorKind::Recoverable),
            _ => None,
        }
    }

    /// Whether the Server layer's retry policy should retry this error
    pub const fn is_retryable_at_server(&self) -> bool {
        matches!(self, Self::Recoverable(_) | Self::Network(_) | Self::ParseError(_))
    }
}

/// Trait for domain errors that can be rendered as HTTP responses
///
/// Kept decoupled from any HTTP framework: the HTTP listening surface is
/// outside this crate's scope, but the mapping is specified so that surface
/// can render these errors consistently.
pub trait HttpError: std::error::Error {
    /// HTTP status code appropriate for this error
    fn status_code(&self) -> StatusCode;
    /// Machine-readable error type string
    fn error_type(&self) -> &str;
    /// Message safe to return to API consumers
    fn client_message(&self) -> String;
}

impl HttpError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ConfigInvalid(_) | Self::HandshakeFailed { .. } | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NoAvailablePipelines { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::FormatViolation { .. } | Self::TransformerFailed(_) | Self::ParseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::RateLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Network(_) => StatusCode::BAD_GATEWAY,
            Self::Unrecoverable(_) | Self::Recoverable(_) => StatusCode::BAD_GATEWAY,
            Self::AlreadyInitialized => StatusCode::CONFLICT,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::ConfigInvalid(_) => "config_invalid",
            Self::HandshakeFailed { .. } => "handshake_failed",
            Self::NoAvailablePipelines { .. } => "no_available_pipelines",
            Self::FormatViolation { .. } => "format_violation",
            Self::TransformerFailed(_) => "transformer_failed",
            Self::Authentication => "authentication_error",
            Self::RateLimit { .. } => "rate_limit_error",
            Self::Network(_) => "network_error",
            Self::Unrecoverable(_) => "unrecoverable_error",
            Self::Recoverable(_) => "recoverable_error",
            Self::ParseError(_) => "parse_error",
            Self::AlreadyInitialized => "already_initialized",
            Self::Internal(_) => "internal_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "an internal error occurred".to_owned(),
            other => other.to_string(),
        }
    }
}
