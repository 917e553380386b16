//! Kubernetes Secrets backend.
//!
//! Serves keys out of the data map of a single named Secret object in one
//! namespace. The cluster API sits behind [`SecretObjectStore`];
//! [`KubeSecretStore`] is the `kube`-based implementation, compiled with the
//! `kubernetes` feature.
//!
//! A missing object is an expected steady state: `list` returns no keys
//! and `healthy` still reports the API as reachable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Result, SecretsError};
use crate::provider::{Provider, HEALTH_CHECK_TIMEOUT};
use crate::types::Secret;

/// The parts of a cluster Secret object this crate reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecretObject {
    pub data: BTreeMap<String, Vec<u8>>,
    pub resource_version: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub labels: BTreeMap<String, String>,
}

/// Read access to Secret objects in a cluster.
#[async_trait]
pub trait SecretObjectStore: Send + Sync + std::fmt::Debug {
    /// Fetches a Secret object, or `None` if it does not exist.
    ///
    /// Rejected credentials surface as
    /// [`SecretsError::AuthenticationFailed`]; any other API failure as a
    /// transport error.
    async fn fetch(&self, namespace: &str, name: &str) -> Result<Option<SecretObject>>;
}

/// Kubernetes Secrets provider.
#[derive(Debug, Clone)]
pub struct KubernetesProvider {
    store: Arc<dyn SecretObjectStore>,
    namespace: String,
    secret_name: String,
}

impl KubernetesProvider {
    pub fn new(
        store: Arc<dyn SecretObjectStore>,
        namespace: impl Into<String>,
        secret_name: impl Into<String>,
    ) -> Self {
        Self { store, namespace: namespace.into(), secret_name: secret_name.into() }
    }

    /// Build a provider backed by a real cluster client.
    #[cfg(feature = "kubernetes")]
    pub async fn connect(config: &crate::config::KubernetesConfig) -> Result<Self> {
        let store = KubeSecretStore::connect(config).await?;
        tracing::info!(
            namespace = %config.namespace,
            secret_name = %config.secret_name,
            in_cluster = config.in_cluster,
            "Initialized Kubernetes secrets provider"
        );
        Ok(Self::new(Arc::new(store), &config.namespace, &config.secret_name))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn secret_name(&self) -> &str {
        &self.secret_name
    }
}

#[async_trait]
impl Provider for KubernetesProvider {
    fn name(&self) -> &'static str {
        "kubernetes"
    }

    async fn get_with_metadata(&self, key: &str) -> Result<Secret> {
        debug!(
            key = %key,
            namespace = %self.namespace,
            secret_name = %self.secret_name,
            "Fetching secret from Kubernetes"
        );

        let object = self
            .store
            .fetch(&self.namespace, &self.secret_name)
            .await?
            .ok_or_else(|| SecretsError::not_found(key))?;

        let bytes = object.data.get(key).ok_or_else(|| SecretsError::not_found(key))?;
        let value = String::from_utf8(bytes.clone()).map_err(|e| SecretsError::Parse {
            message: format!("Kubernetes secret key '{}' is not valid UTF-8: {}", key, e),
            body: None,
        })?;

        let mut secret = Secret::new(key, value)
            .with_created_at(object.created_at)
            .with_metadata("namespace", self.namespace.as_str())
            .with_metadata("secret_name", self.secret_name.as_str());
        if let Some(version) = object.resource_version {
            secret = secret.with_version(version);
        }
        for (label, value) in object.labels {
            secret.metadata.insert(format!("label.{}", label), value);
        }
        Ok(secret)
    }

    async fn list(&self) -> Result<Vec<String>> {
        match self.store.fetch(&self.namespace, &self.secret_name).await? {
            Some(object) => Ok(object.data.into_keys().collect()),
            None => {
                debug!(secret_name = %self.secret_name, "Kubernetes secret object absent");
                Ok(Vec::new())
            }
        }
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    async fn healthy(&self) -> bool {
        let probe = self.store.fetch(&self.namespace, &self.secret_name);
        match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, probe).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "Kubernetes health check failed");
                false
            }
            Err(_) => {
                warn!(timeout = ?HEALTH_CHECK_TIMEOUT, "Kubernetes health check timed out");
                false
            }
        }
    }
}

#[cfg(feature = "kubernetes")]
pub use kube_store::KubeSecretStore;

#[cfg(feature = "kubernetes")]
mod kube_store {
    use super::{SecretObject, SecretObjectStore};
    use crate::config::KubernetesConfig;
    use crate::error::{Result, SecretsError};
    use async_trait::async_trait;
    use k8s_openapi::api::core::v1::Secret as K8sSecret;
    use kube::config::{KubeConfigOptions, Kubeconfig};
    use kube::{Api, Client};

    /// [`SecretObjectStore`] backed by the cluster API.
    #[derive(Clone)]
    pub struct KubeSecretStore {
        client: Client,
    }

    impl std::fmt::Debug for KubeSecretStore {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("KubeSecretStore").field("client", &"[kube::Client]").finish()
        }
    }

    impl KubeSecretStore {
        /// Builds a client from an explicit kubeconfig, the in-cluster
        /// service account, or the inferred default, in that order.
        pub async fn connect(config: &KubernetesConfig) -> Result<Self> {
            let client_config = if let Some(path) = &config.kubeconfig_path {
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    SecretsError::invalid_config(format!(
                        "Failed to read kubeconfig from {:?}: {}",
                        path, e
                    ))
                })?;
                kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| {
                        SecretsError::invalid_config(format!("Failed to load kubeconfig: {}", e))
                    })?
            } else if config.in_cluster {
                kube::Config::incluster().map_err(|e| {
                    SecretsError::not_configured(format!(
                        "In-cluster Kubernetes configuration unavailable: {}",
                        e
                    ))
                })?
            } else {
                kube::Config::infer().await.map_err(|e| {
                    SecretsError::not_configured(format!(
                        "Failed to infer Kubernetes configuration: {}",
                        e
                    ))
                })?
            };

            let client = Client::try_from(client_config).map_err(|e| {
                SecretsError::invalid_config(format!("Failed to create Kubernetes client: {}", e))
            })?;
            Ok(Self { client })
        }
    }

    fn map_kube_error(err: kube::Error) -> SecretsError {
        match &err {
            kube::Error::Api(response) if response.code == 401 || response.code == 403 => {
                SecretsError::authentication_failed(format!(
                    "Kubernetes API rejected the request: {}",
                    response.message
                ))
            }
            _ => SecretsError::transport(format!("Kubernetes API request failed: {}", err)),
        }
    }

    #[async_trait]
    impl SecretObjectStore for KubeSecretStore {
        async fn fetch(&self, namespace: &str, name: &str) -> Result<Option<SecretObject>> {
            let api: Api<K8sSecret> = Api::namespaced(self.client.clone(), namespace);
            let Some(secret) = api.get_opt(name).await.map_err(map_kube_error)? else {
                return Ok(None);
            };

            let data = secret
                .data
                .unwrap_or_default()
                .into_iter()
                .map(|(key, bytes)| (key, bytes.0))
                .collect();

            Ok(Some(SecretObject {
                data,
                resource_version: secret.metadata.resource_version,
                created_at: secret.metadata.creation_timestamp.map(|t| t.0),
                labels: secret.metadata.labels.unwrap_or_default(),
            }))
        }
    }
}
