//! # Secret Broker
//!
//! One interface for reading named secrets from interchangeable stores:
//! environment variables, HashiCorp Vault (KV v2), AWS Secrets Manager, or
//! a Kubernetes Secret object. Switching stores is a configuration change.
//!
//! ```text
//! Config ──validate──▶ build_provider ──▶ Manager ──▶ Arc<dyn Provider>
//!                                                      ├─ EnvProvider
//!                                                      ├─ VaultProvider
//!                                                      ├─ AwsProvider
//!                                                      └─ KubernetesProvider
//! ```
//!
//! Every backend maps its own failure vocabulary onto [`SecretsError`], so
//! callers branch on [`ErrorKind`] rather than on HTTP codes or message text.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use secret_broker::{Config, Manager, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::from_env()?;
//!     let mut secrets = Manager::new(config).await?;
//!     let password = secrets.get_or_default("database.password", "changeme").await;
//!     # let _ = password;
//!     secrets.close().await
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `kubernetes` (default): the `kube`-backed cluster client.

pub mod aws;
pub mod config;
pub mod env;
pub mod error;
pub mod kubernetes;
pub mod manager;
pub mod observability;
pub mod provider;
pub mod types;
pub mod vault;

pub use aws::AwsProvider;
pub use config::{Config, ProviderKind};
pub use env::EnvProvider;
pub use error::{ErrorKind, Result, SecretsError};
pub use kubernetes::KubernetesProvider;
pub use manager::{build_provider, Manager};
pub use provider::Provider;
pub use types::{Secret, SecretString};
pub use vault::VaultProvider;

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
