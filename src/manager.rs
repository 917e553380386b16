//! Facade over the single active [`Provider`].
//!
//! [`Manager::new`] is the factory: it validates the [`Config`] and builds
//! exactly one backend. The backend never changes for the manager's life.

use std::sync::Arc;
use tracing::{debug, info};

use crate::aws::AwsProvider;
use crate::config::{Config, ProviderKind};
use crate::env::EnvProvider;
use crate::error::{Result, SecretsError};
use crate::provider::Provider;
use crate::types::Secret;
use crate::vault::VaultProvider;

/// Owns one provider and delegates every call to it.
///
/// A `Manager::default()` has no provider: lookups fail with
/// [`SecretsError::NotConfigured`], `healthy` is false and `close` succeeds.
#[derive(Debug, Clone, Default)]
pub struct Manager {
    provider: Option<Arc<dyn Provider>>,
}

impl Manager {
    /// Validate `config` and construct the provider it selects.
    ///
    /// No network traffic happens here; connectivity is first exercised by
    /// the first real call.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let provider = build_provider(&config).await?;
        info!(provider = provider.name(), "Secrets manager initialized");
        Ok(Self::with_provider(provider))
    }

    /// Wrap an already constructed provider.
    pub fn with_provider(provider: Arc<dyn Provider>) -> Self {
        Self { provider: Some(provider) }
    }

    fn provider(&self) -> Result<&Arc<dyn Provider>> {
        self.provider
            .as_ref()
            .ok_or_else(|| SecretsError::not_configured("secrets manager has no provider"))
    }

    /// Name of the active backend, or `"none"`.
    pub fn provider_name(&self) -> &'static str {
        self.provider.as_ref().map(|p| p.name()).unwrap_or("none")
    }

    pub async fn get(&self, key: &str) -> Result<String> {
        self.provider()?.get(key).await
    }

    pub async fn get_with_metadata(&self, key: &str) -> Result<Secret> {
        self.provider()?.get_with_metadata(key).await
    }

    pub async fn list(&self) -> Result<Vec<String>> {
        self.provider()?.list().await
    }

    pub async fn healthy(&self) -> bool {
        match &self.provider {
            Some(provider) => provider.healthy().await,
            None => false,
        }
    }

    /// Resolve `key`, returning `fallback` on any error.
    pub async fn get_or_default(&self, key: &str, fallback: &str) -> String {
        match self.get(key).await {
            Ok(value) => value,
            Err(e) => {
                debug!(key = %key, error = %e, "Using fallback value for secret");
                fallback.to_string()
            }
        }
    }

    /// Resolve a secret that the process cannot run without.
    ///
    /// Meant for startup configuration only.
    ///
    /// # Panics
    ///
    /// Panics if the secret cannot be resolved.
    pub async fn must_get(&self, key: &str) -> String {
        match self.get(key).await {
            Ok(value) => value,
            Err(e) => panic!("required secret '{}' could not be resolved: {}", key, e),
        }
    }

    /// Close the provider. Safe to call more than once.
    pub async fn close(&mut self) -> Result<()> {
        match self.provider.take() {
            Some(provider) => {
                debug!(provider = provider.name(), "Closing secrets provider");
                provider.close().await
            }
            None => Ok(()),
        }
    }
}

/// Construct the provider variant selected by `config.provider`.
///
/// Callers are expected to have run [`Config::validate`] first.
pub async fn build_provider(config: &Config) -> Result<Arc<dyn Provider>> {
    let timeout = config.request_timeout();
    let provider: Arc<dyn Provider> = match config.provider_kind()? {
        ProviderKind::Env => Arc::new(EnvProvider::new(&config.env.prefix)),
        ProviderKind::Vault => Arc::new(VaultProvider::new(&config.vault, timeout)?),
        ProviderKind::Aws => Arc::new(AwsProvider::new(&config.aws, timeout)?),
        ProviderKind::Kubernetes => build_kubernetes(config).await?,
    };
    Ok(provider)
}

#[cfg(feature = "kubernetes")]
async fn build_kubernetes(config: &Config) -> Result<Arc<dyn Provider>> {
    let provider = crate::kubernetes::KubernetesProvider::connect(&config.kubernetes).await?;
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "kubernetes"))]
async fn build_kubernetes(_config: &Config) -> Result<Arc<dyn Provider>> {
    tracing::warn!("Kubernetes provider requested but the 'kubernetes' feature is disabled");
    Err(SecretsError::not_configured("kubernetes provider requires the 'kubernetes' feature"))
}
