//! # Configuration
//!
//! Describes which backend to use and how to reach it. A [`Config`] is
//! built once at startup from defaults layered with environment input,
//! validated once with [`Config::validate`], and then handed to
//! [`Manager::new`](crate::Manager::new). Validation is a pure function of
//! the struct and never touches the network.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, SecretsError};
use crate::types::SecretString;

/// Backend variants a [`Config`] can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Env,
    Vault,
    Aws,
    Kubernetes,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Env => "env",
            Self::Vault => "vault",
            Self::Aws => "aws",
            Self::Kubernetes => "kubernetes",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = SecretsError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "env" => Ok(Self::Env),
            "vault" => Ok(Self::Vault),
            "aws" => Ok(Self::Aws),
            "kubernetes" => Ok(Self::Kubernetes),
            other => Err(SecretsError::invalid_config(format!(
                "invalid provider '{}': expected one of env, vault, aws, kubernetes",
                other
            ))),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_provider() -> String {
    "env".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_mount_path() -> String {
    "secret".to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_in_cluster() -> bool {
    true
}

/// Top-level secrets configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// One of `env`, `vault`, `aws`, `kubernetes`.
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Per-request timeout applied by the HTTP-based providers.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub env: EnvConfig,

    #[serde(default)]
    pub vault: VaultConfig,

    #[serde(default)]
    pub aws: AwsConfig,

    #[serde(default)]
    pub kubernetes: KubernetesConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            request_timeout_secs: default_request_timeout_secs(),
            env: EnvConfig::default(),
            vault: VaultConfig::default(),
            aws: AwsConfig::default(),
            kubernetes: KubernetesConfig::default(),
        }
    }
}

/// Environment-variable backend settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Prefix probed first, e.g. `APP_` turns `db.password` into `APP_DB_PASSWORD`.
    #[serde(default)]
    pub prefix: String,
}

/// HashiCorp Vault (KV v2) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    pub address: String,
    pub token: Option<SecretString>,
    #[serde(default = "default_mount_path")]
    pub mount_path: String,
    /// Vault Enterprise namespace.
    pub namespace: Option<String>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            token: None,
            mount_path: default_mount_path(),
            namespace: None,
        }
    }
}

/// AWS Secrets Manager settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AwsConfig {
    pub region: String,
    /// Store-wide prefix; `key` is addressed as `{secret_prefix}/{key}`.
    #[serde(default)]
    pub secret_prefix: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<SecretString>,
    pub session_token: Option<SecretString>,
    /// Overrides the regional endpoint (localstack, tests).
    pub endpoint: Option<String>,
}

/// Kubernetes Secrets settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubernetesConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Name of the Secret object whose data map holds the keys.
    #[serde(default)]
    pub secret_name: String,
    #[serde(default = "default_in_cluster")]
    pub in_cluster: bool,
    pub kubeconfig_path: Option<PathBuf>,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            secret_name: String::new(),
            in_cluster: default_in_cluster(),
            kubeconfig_path: None,
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// For each setting the first listed variable that is set and non-empty
    /// wins; unset settings keep their defaults.
    ///
    /// - `SECRETS_PROVIDER`
    /// - `SECRETS_REQUEST_TIMEOUT_SECS`
    /// - `SECRETS_ENV_PREFIX`
    /// - `SECRETS_VAULT_ADDR` or `VAULT_ADDR`
    /// - `SECRETS_VAULT_TOKEN` or `VAULT_TOKEN`
    /// - `SECRETS_VAULT_MOUNT_PATH` or `VAULT_MOUNT_PATH`
    /// - `SECRETS_VAULT_NAMESPACE` or `VAULT_NAMESPACE`
    /// - `SECRETS_AWS_REGION`, `AWS_REGION` or `AWS_DEFAULT_REGION`
    /// - `SECRETS_AWS_PREFIX`, `SECRETS_AWS_ENDPOINT`
    /// - `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_SESSION_TOKEN`
    /// - `SECRETS_K8S_NAMESPACE` or `POD_NAMESPACE`
    /// - `SECRETS_K8S_SECRET_NAME`
    /// - `SECRETS_K8S_KUBECONFIG` or `KUBECONFIG` (forces `in_cluster = false`)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| {
            names.iter().find_map(|name| lookup(*name).filter(|value| !value.is_empty()))
        };

        let mut config = Self::default();

        if let Some(provider) = first(&["SECRETS_PROVIDER"]) {
            config.provider = provider;
        }

        if let Some(raw) = first(&["SECRETS_REQUEST_TIMEOUT_SECS"]) {
            config.request_timeout_secs = raw.parse().map_err(|e| {
                SecretsError::invalid_config(format!(
                    "SECRETS_REQUEST_TIMEOUT_SECS must be a whole number of seconds: {}",
                    e
                ))
            })?;
        }

        if let Some(prefix) = first(&["SECRETS_ENV_PREFIX"]) {
            config.env.prefix = prefix;
        }

        if let Some(address) = first(&["SECRETS_VAULT_ADDR", "VAULT_ADDR"]) {
            config.vault.address = address;
        }
        config.vault.token = first(&["SECRETS_VAULT_TOKEN", "VAULT_TOKEN"]).map(SecretString::new);
        if let Some(mount_path) = first(&["SECRETS_VAULT_MOUNT_PATH", "VAULT_MOUNT_PATH"]) {
            config.vault.mount_path = mount_path;
        }
        config.vault.namespace = first(&["SECRETS_VAULT_NAMESPACE", "VAULT_NAMESPACE"]);

        if let Some(region) = first(&["SECRETS_AWS_REGION", "AWS_REGION", "AWS_DEFAULT_REGION"]) {
            config.aws.region = region;
        }
        if let Some(prefix) = first(&["SECRETS_AWS_PREFIX"]) {
            config.aws.secret_prefix = prefix;
        }
        config.aws.access_key_id = first(&["AWS_ACCESS_KEY_ID"]);
        config.aws.secret_access_key = first(&["AWS_SECRET_ACCESS_KEY"]).map(SecretString::new);
        config.aws.session_token = first(&["AWS_SESSION_TOKEN"]).map(SecretString::new);
        config.aws.endpoint = first(&["SECRETS_AWS_ENDPOINT"]);

        if let Some(namespace) = first(&["SECRETS_K8S_NAMESPACE", "POD_NAMESPACE"]) {
            config.kubernetes.namespace = namespace;
        }
        if let Some(secret_name) = first(&["SECRETS_K8S_SECRET_NAME"]) {
            config.kubernetes.secret_name = secret_name;
        }
        if let Some(path) = first(&["SECRETS_K8S_KUBECONFIG", "KUBECONFIG"]) {
            config.kubernetes.kubeconfig_path = Some(PathBuf::from(path));
            config.kubernetes.in_cluster = false;
        }

        Ok(config)
    }

    /// The parsed provider discriminator.
    pub fn provider_kind(&self) -> Result<ProviderKind> {
        self.provider.parse()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check that the selected backend has its minimum settings.
    pub fn validate(&self) -> Result<()> {
        match self.provider_kind()? {
            ProviderKind::Env => {}
            ProviderKind::Vault => {
                if self.vault.address.trim().is_empty() {
                    return Err(SecretsError::invalid_config("vault provider requires an address"));
                }
                self.validate_request_timeout()?;
            }
            ProviderKind::Aws => {
                if self.aws.region.trim().is_empty() {
                    return Err(SecretsError::invalid_config("aws provider requires a region"));
                }
                self.validate_request_timeout()?;
            }
            ProviderKind::Kubernetes => {
                if self.kubernetes.secret_name.trim().is_empty() {
                    return Err(SecretsError::invalid_config(
                        "kubernetes provider requires a secret name",
                    ));
                }
            }
        }

        Ok(())
    }

    /// Only the HTTP-backed providers use the request timeout.
    fn validate_request_timeout(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(SecretsError::invalid_config("request timeout must be at least 1 second"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name: &str| vars.get(name).cloned()
    }

    fn config_for(provider: &str) -> Config {
        Config { provider: provider.to_string(), ..Default::default() }
    }

    #[test]
    fn test_provider_kind_roundtrip() {
        for kind in
            [ProviderKind::Env, ProviderKind::Vault, ProviderKind::Aws, ProviderKind::Kubernetes]
        {
            let parsed: ProviderKind = kind.as_str().parse().unwrap();
            assert_eq!(kind, parsed);
            assert_eq!(kind.to_string(), kind.as_str());
        }
        assert_eq!(" Vault ".parse::<ProviderKind>().unwrap(), ProviderKind::Vault);
    }

    #[test]
    fn test_env_always_valid() {
        assert!(config_for("env").validate().is_ok());
    }

    #[test]
    fn test_vault_requires_address() {
        let mut config = config_for("vault");
        assert!(config.validate().is_err());

        config.vault.address = "http://127.0.0.1:8200".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_aws_requires_region() {
        let mut config = config_for("aws");
        assert!(matches!(config.validate(), Err(SecretsError::InvalidConfig { .. })));

        config.aws.region = "eu-west-1".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_kubernetes_requires_secret_name() {
        let mut config = config_for("kubernetes");
        assert!(config.validate().is_err());

        config.kubernetes.secret_name = "app-secrets".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_provider_fails() {
        for provider in ["gcp", "", "vaultx"] {
            let err = config_for(provider).validate().unwrap_err();
            assert!(err.to_string().contains("invalid provider"), "{}", err);
        }
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.provider, "env");
        assert_eq!(config.vault.mount_path, "secret");
        assert_eq!(config.kubernetes.namespace, "default");
        assert!(config.kubernetes.in_cluster);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_from_lookup_prefers_backend_specific_variables() {
        let config = Config::from_lookup(lookup_from(&[
            ("SECRETS_PROVIDER", "vault"),
            ("VAULT_ADDR", "http://generic:8200"),
            ("SECRETS_VAULT_ADDR", "http://specific:8200"),
            ("VAULT_TOKEN", "s.generic"),
            ("VAULT_NAMESPACE", "team-a"),
        ]))
        .unwrap();

        assert_eq!(config.provider_kind().unwrap(), ProviderKind::Vault);
        assert_eq!(config.vault.address, "http://specific:8200");
        assert_eq!(config.vault.token.as_ref().map(|t| t.expose_secret()), Some("s.generic"));
        assert_eq!(config.vault.namespace.as_deref(), Some("team-a"));
    }

    #[test]
    fn test_from_lookup_aws_region_fallbacks() {
        let config =
            Config::from_lookup(lookup_from(&[("AWS_DEFAULT_REGION", "us-west-2")])).unwrap();
        assert_eq!(config.aws.region, "us-west-2");

        let config = Config::from_lookup(lookup_from(&[
            ("AWS_DEFAULT_REGION", "us-west-2"),
            ("AWS_REGION", "eu-central-1"),
        ]))
        .unwrap();
        assert_eq!(config.aws.region, "eu-central-1");
    }

    #[test]
    fn test_from_lookup_ignores_empty_values() {
        let config = Config::from_lookup(lookup_from(&[
            ("SECRETS_AWS_REGION", ""),
            ("AWS_REGION", "ap-south-1"),
        ]))
        .unwrap();
        assert_eq!(config.aws.region, "ap-south-1");
    }

    #[test]
    fn test_kubeconfig_forces_out_of_cluster() {
        let config = Config::from_lookup(lookup_from(&[
            ("POD_NAMESPACE", "payments"),
            ("SECRETS_K8S_SECRET_NAME", "payments-secrets"),
            ("KUBECONFIG", "/home/dev/.kube/config"),
        ]))
        .unwrap();

        assert_eq!(config.kubernetes.namespace, "payments");
        assert_eq!(config.kubernetes.secret_name, "payments-secrets");
        assert!(!config.kubernetes.in_cluster);
        assert_eq!(config.kubernetes.kubeconfig_path, Some(PathBuf::from("/home/dev/.kube/config")));
    }

    #[test]
    fn test_invalid_timeout_is_rejected() {
        let result =
            Config::from_lookup(lookup_from(&[("SECRETS_REQUEST_TIMEOUT_SECS", "soon")]));
        assert!(matches!(result, Err(SecretsError::InvalidConfig { .. })));

        let mut config = Config {
            provider: "vault".to_string(),
            request_timeout_secs: 0,
            ..Default::default()
        };
        config.vault.address = "http://vault:8200".to_string();
        assert!(config.validate().is_err());

        let mut config =
            Config { provider: "aws".to_string(), request_timeout_secs: 0, ..Default::default() };
        config.aws.region = "us-east-1".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_ignores_zero_timeout() {
        let config = Config::from_lookup(lookup_from(&[
            ("SECRETS_PROVIDER", "env"),
            ("SECRETS_REQUEST_TIMEOUT_SECS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.request_timeout_secs, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization_redacts_credentials() {
        let mut config = config_for("aws");
        config.aws.secret_access_key = Some(SecretString::new("wJalrXUtnFEMI"));
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("[REDACTED]"));
        assert!(!json.contains("wJalrXUtnFEMI"));
    }
}
