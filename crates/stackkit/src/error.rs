//! Error types for stack reconciliation.
//!
//! Provider failures are categorized so the engine can tell transient
//! throttling (retry), idempotent no-ops (recover locally) and real failures
//! (abort) apart. Classification prefers the machine-readable error code and
//! only falls back to matching the human message when the provider gives no
//! usable code.

use crate::types::Operation;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error code the provisioning service uses for rate limiting.
pub const THROTTLING_CODE: &str = "Throttling";

/// Error code the provisioning service uses when creating a stack that exists.
pub const ALREADY_EXISTS_CODE: &str = "AlreadyExistsException";

/// Categories of provider errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Request rejected by rate limiting (transient, retryable)
    Throttling,
    /// Stack does not exist
    NotFound,
    /// Stack already exists (create is redundant)
    AlreadyExists,
    /// Update would not change anything
    NoUpdates,
    /// Anything else
    Other,
}

impl ErrorCategory {
    /// Whether this error category is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Throttling)
    }

    /// Whether this error means the requested operation does not need to happen.
    pub fn is_semantic_noop(&self) -> bool {
        matches!(self, Self::NotFound | Self::AlreadyExists | Self::NoUpdates)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Throttling => "Request throttled",
            Self::NotFound => "Stack not found",
            Self::AlreadyExists => "Stack already exists",
            Self::NoUpdates => "No updates to perform",
            Self::Other => "Unexpected error",
        }
    }
}

/// An error returned by the remote provisioning service.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ProviderError {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl ProviderError {
    /// Create a provider error from a code and a message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// A throttling rejection.
    pub fn throttled() -> Self {
        Self::new(THROTTLING_CODE, "Rate exceeded")
    }

    /// The "stack does not exist" validation error.
    pub fn stack_missing(name: &str) -> Self {
        Self::new(
            "ValidationError",
            format!("Stack with id {name} does not exist"),
        )
    }

    /// Categorize this error.
    ///
    /// Codes are checked first. Message matching is the fallback for
    /// providers that report every semantic condition as a generic
    /// validation error.
    pub fn category(&self) -> ErrorCategory {
        match self.code.as_str() {
            THROTTLING_CODE => return ErrorCategory::Throttling,
            ALREADY_EXISTS_CODE => return ErrorCategory::AlreadyExists,
            _ => {}
        }

        let message = self.message.to_lowercase();

        if message.contains("no updates are to be performed") {
            return ErrorCategory::NoUpdates;
        }

        if message.contains("already exists") {
            return ErrorCategory::AlreadyExists;
        }

        if message.contains("does not exist") || message.contains("not found") {
            return ErrorCategory::NotFound;
        }

        ErrorCategory::Other
    }
}

/// Errors that abort a reconciliation call.
#[derive(Debug, Error)]
pub enum Error {
    /// The desired spec violates its invariants
    #[error("invalid stack spec: {0}")]
    InvalidSpec(String),

    /// A throttled call kept being throttled
    #[error("gave up after {attempts} throttled attempts: {source}")]
    RetryExhausted {
        /// Number of attempts made
        attempts: u32,
        /// The last throttling error
        source: ProviderError,
    },

    /// Fetching the current stack state failed
    #[error("failed to observe stack {name}: {source}")]
    Observe {
        /// Stack name
        name: String,
        /// Underlying provider error
        source: ProviderError,
    },

    /// A create, update or delete call failed
    #[error("{operation} of stack {name} failed: {source}")]
    Mutation {
        /// The operation that failed
        operation: Operation,
        /// Stack name
        name: String,
        /// Underlying provider error
        source: ProviderError,
    },

    /// A template body is not a valid JSON document
    #[error("template is not valid JSON: {0}")]
    Template(#[from] serde_json::Error),

    /// Provider error passed through unclassified
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl Error {
    /// The category of the underlying provider error, if any.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::RetryExhausted { .. } => ErrorCategory::Throttling,
            Error::Observe { source, .. }
            | Error::Mutation { source, .. }
            | Error::Provider(source) => source.category(),
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error is a "stack does not exist" signal.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Provider(e) if e.category() == ErrorCategory::NotFound)
    }
}

/// Result type for stack operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for raw provider calls.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
