//! Error types for secrets retrieval.
//!
//! Every backend normalizes its native failure vocabulary (HTTP status
//! codes, AWS error types, cluster API statuses) into [`SecretsError`], so
//! callers branch on [`ErrorKind`] instead of matching message text.

use thiserror::Error;

/// Result type for secrets operations.
pub type Result<T> = std::result::Result<T, SecretsError>;

/// Longest backend body excerpt rendered in an error message.
const BODY_EXCERPT_LIMIT: usize = 1024;

/// Errors that can occur while resolving secrets.
#[derive(Error, Debug)]
pub enum SecretsError {
    /// Secret not found in the backend.
    #[error("Secret not found: {key}")]
    NotFound { key: String },

    /// The backend does not implement the requested operation.
    #[error("Operation '{operation}' is not supported by the {provider} provider")]
    NotSupported { operation: String, provider: String },

    /// No provider is available to serve the request.
    #[error("Provider not configured: {message}")]
    NotConfigured { message: String },

    /// The backend rejected the supplied credentials.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// The request did not complete in time.
    #[error("Operation timed out: {message}")]
    Timeout { message: String },

    /// Configuration failed validation.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The backend answered but the payload could not be interpreted.
    #[error("Failed to parse backend response: {message}{}", excerpt(.body))]
    Parse { message: String, body: Option<String> },

    /// Connectivity failure or an unexpected backend status.
    #[error("Backend request failed: {message}{}", excerpt(.body))]
    Transport { message: String, body: Option<String> },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Backend-independent classification of a [`SecretsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    NotSupported,
    NotConfigured,
    AuthenticationFailed,
    Timeout,
    /// Anything not covered above: transport, parse, and config failures.
    Other,
}

fn excerpt(body: &Option<String>) -> String {
    match body {
        Some(body) if !body.is_empty() => {
            let mut end = body.len().min(BODY_EXCERPT_LIMIT);
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            let ellipsis = if end < body.len() { "..." } else { "" };
            format!(" (body: {}{})", &body[..end], ellipsis)
        }
        _ => String::new(),
    }
}

impl SecretsError {
    /// Create a not found error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a not supported error.
    pub fn not_supported(operation: impl Into<String>, provider: impl Into<String>) -> Self {
        Self::NotSupported { operation: operation.into(), provider: provider.into() }
    }

    /// Create a provider not configured error.
    pub fn not_configured(message: impl Into<String>) -> Self {
        Self::NotConfigured { message: message.into() }
    }

    /// Create an authentication failed error.
    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed { message: message.into() }
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout { message: message.into() }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig { message: message.into() }
    }

    /// Create a parse error, keeping the raw body for diagnostics.
    pub fn parse(message: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Parse { message: message.into(), body: Some(body.into()) }
    }

    /// Create a transport error without a response body.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into(), body: None }
    }

    /// Create a transport error for an unexpected backend status.
    pub fn unexpected_status(message: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Transport { message: message.into(), body: Some(body.into()) }
    }

    /// Wrap a `reqwest` failure, keeping timeouts distinguishable.
    pub fn from_http(context: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(format!("{}: {}", context, err))
        } else {
            Self::transport(format!("{}: {}", context, err))
        }
    }

    /// Classify this error into the backend-independent taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::NotSupported { .. } => ErrorKind::NotSupported,
            Self::NotConfigured { .. } => ErrorKind::NotConfigured,
            Self::AuthenticationFailed { .. } => ErrorKind::AuthenticationFailed,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::InvalidConfig { .. }
            | Self::Parse { .. }
            | Self::Transport { .. }
            | Self::Serialization(_) => ErrorKind::Other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Raw backend response body attached to this error, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Parse { body, .. } | Self::Transport { body, .. } => body.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let err = SecretsError::not_found("test_key");
        assert!(matches!(err, SecretsError::NotFound { .. }));
        assert_eq!(err.to_string(), "Secret not found: test_key");

        let err = SecretsError::authentication_failed("permission denied");
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);

        let err = SecretsError::not_supported("list", "env");
        assert_eq!(err.kind(), ErrorKind::NotSupported);
        assert!(err.to_string().contains("list"));
    }

    #[test]
    fn test_unclassified_errors_map_to_other() {
        assert_eq!(SecretsError::invalid_config("bad").kind(), ErrorKind::Other);
        assert_eq!(SecretsError::parse("bad json", "{").kind(), ErrorKind::Other);
        assert_eq!(SecretsError::transport("refused").kind(), ErrorKind::Other);
    }

    #[test]
    fn test_body_is_preserved_and_shown() {
        let err = SecretsError::unexpected_status("status 500", "internal failure");
        assert_eq!(err.body(), Some("internal failure"));
        assert!(err.to_string().contains("internal failure"));

        let err = SecretsError::transport("connection refused");
        assert!(err.body().is_none());
        assert_eq!(err.to_string(), "Backend request failed: connection refused");
    }

    #[test]
    fn test_long_body_is_truncated_in_display() {
        let body = "x".repeat(BODY_EXCERPT_LIMIT * 2);
        let err = SecretsError::parse("bad", body.clone());
        let rendered = err.to_string();
        assert!(rendered.ends_with("...)"));
        assert!(rendered.len() < body.len());
        // The full body stays available for diagnostics.
        assert_eq!(err.body().map(str::len), Some(body.len()));
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let body = "é".repeat(BODY_EXCERPT_LIMIT);
        let err = SecretsError::parse("bad", body);
        // Would panic on a non-boundary slice.
        assert!(err.to_string().contains("é"));
    }
}
