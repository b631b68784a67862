//! Error types for zonesync
//!
//! Every adapter failure is normalized into [`Error`] so the orchestrator can
//! classify it (transient vs permanent) without knowing which provider raised it.

use thiserror::Error;

use crate::plan::ConflictStrategy;

/// Result type alias for zonesync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Provider context attached to provider-originated errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDetails {
    /// Provider name ("cloudflare", "cloudns", ...)
    pub provider: String,
    /// HTTP status, when a response was received
    pub status: Option<u16>,
    /// Provider-reported description (e.g. ClouDNS `statusDescription`)
    pub description: Option<String>,
}

impl ProviderDetails {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            status: None,
            description: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Core error type for zonesync
#[derive(Error, Debug)]
pub enum Error {
    /// Retryable provider failure (HTTP 5xx, 429, or no response at all)
    #[error("Transient provider error ({}): {message}", .details.provider)]
    TransientProvider {
        message: String,
        details: ProviderDetails,
    },

    /// Non-retryable provider failure (other 4xx, provider-reported failure)
    #[error("Provider error ({}): {message}", .details.provider)]
    PermanentProvider {
        message: String,
        details: ProviderDetails,
    },

    /// Provider payload did not have the expected shape
    #[error("Malformed response from {provider}: {message}")]
    MalformedResponse { provider: String, message: String },

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Record type outside the supported set
    #[error("Unsupported record type: {0}")]
    UnsupportedRecordType(String),

    /// Conflict strategy with no resolution algorithm
    #[error("Unsupported conflict strategy: {0:?}")]
    UnsupportedConflictStrategy(ConflictStrategy),

    /// Record cache failure
    #[error("Cache error: {0}")]
    Cache(String),

    /// Notification delivery failure
    #[error("Notification error: {0}")]
    Notification(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a cache error
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Create a notification error
    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification(msg.into())
    }

    /// Create a malformed-response error
    pub fn malformed(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Classify a failed HTTP exchange by status code.
    ///
    /// `>= 500` and `429` are transient, everything else is permanent.
    pub fn from_status(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        let details = ProviderDetails::new(provider).with_status(status);
        let message = message.into();
        if status >= 500 || status == 429 {
            Self::TransientProvider { message, details }
        } else {
            Self::PermanentProvider { message, details }
        }
    }

    /// A request that never produced a response (connect error, timeout).
    pub fn transport(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransientProvider {
            message: message.into(),
            details: ProviderDetails::new(provider),
        }
    }

    /// A provider answered 2xx but reported failure in the body.
    pub fn rejected(
        provider: impl Into<String>,
        message: impl Into<String>,
        description: Option<String>,
    ) -> Self {
        let mut details = ProviderDetails::new(provider);
        details.description = description;
        Self::PermanentProvider {
            message: message.into(),
            details,
        }
    }

    /// Whether the retry executor should try again
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientProvider { .. })
    }

    /// HTTP status carried by a provider error
    pub fn status(&self) -> Option<u16> {
        self.provider_details().and_then(|d| d.status)
    }

    pub fn provider_details(&self) -> Option<&ProviderDetails> {
        match self {
            Self::TransientProvider { details, .. } | Self::PermanentProvider { details, .. } => {
                Some(details)
            }
            _ => None,
        }
    }

    /// Stable machine-readable code, used in metrics tags and notifications
    pub fn classification_code(&self) -> &'static str {
        match self {
            Self::TransientProvider { .. } => "transient_provider",
            Self::PermanentProvider { .. } => "permanent_provider",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::Configuration(_) => "configuration",
            Self::UnsupportedRecordType(_) => "unsupported_record_type",
            Self::UnsupportedConflictStrategy(_) => "unsupported_conflict_strategy",
            Self::Cache(_) => "cache",
            Self::Notification(_) => "notification",
        }
    }
}
