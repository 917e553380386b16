//! The capability contract every secrets backend implements.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;
use crate::types::Secret;

/// Upper bound for a single health probe, independent of any caller deadline.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Trait for secrets backends.
///
/// Implementations hold only connection and credential state established
/// at construction time; no secret values are cached between calls. They
/// must be safe to call concurrently.
///
/// Network-backed methods are cancelled by dropping the returned future
/// (for example through `tokio::time::timeout`). The in-flight HTTP request
/// is aborted with it.
#[async_trait]
pub trait Provider: Send + Sync + std::fmt::Debug {
    /// Static identifier used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Retrieve a secret value by key.
    ///
    /// # Errors
    ///
    /// - [`SecretsError::NotFound`](crate::SecretsError::NotFound) if the secret doesn't exist
    /// - [`SecretsError::AuthenticationFailed`](crate::SecretsError::AuthenticationFailed) if the backend rejects the credential
    /// - a transport, parse, or timeout error otherwise
    async fn get(&self, key: &str) -> Result<String> {
        Ok(self.get_with_metadata(key).await?.value.into_inner())
    }

    /// Retrieve a secret together with backend metadata.
    async fn get_with_metadata(&self, key: &str) -> Result<Secret>;

    /// List available keys. Best effort: neither exhaustive nor ordered.
    async fn list(&self) -> Result<Vec<String>>;

    /// Release held connection resources. Idempotent.
    async fn close(&self) -> Result<()>;

    /// Lightweight, side-effect-free reachability probe.
    async fn healthy(&self) -> bool;
}
