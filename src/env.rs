//! Environment variable secrets backend.
//!
//! Keys are normalized to upper snake case (`database.password` becomes
//! `DATABASE_PASSWORD`) and probed in order:
//!
//! 1. `{prefix}{NORMALIZED}`
//! 2. `{NORMALIZED}`
//! 3. the key exactly as given
//!
//! The first non-empty value wins. An empty variable counts as unset.
//!
//! Variable lookup goes through [`EnvSource`] so tests can supply a map
//! instead of mutating the process environment.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Result, SecretsError};
use crate::provider::Provider;
use crate::types::Secret;

/// A source of environment variables.
pub trait EnvSource: Send + Sync + std::fmt::Debug {
    fn var(&self, name: &str) -> Option<String>;

    fn vars(&self) -> Vec<(String, String)>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn vars(&self) -> Vec<(String, String)> {
        // vars_os so a single non-UTF-8 variable cannot panic the scan
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }

    fn vars(&self) -> Vec<(String, String)> {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

/// Converts a logical key into an environment variable name.
///
/// `.`, `-` and `/` become `_` and the result is upper-cased.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            '.' | '-' | '/' => '_',
            other => other,
        })
        .collect::<String>()
        .to_uppercase()
}

/// Reads secrets from environment variables.
#[derive(Debug, Clone)]
pub struct EnvProvider {
    prefix: String,
    source: Arc<dyn EnvSource>,
}

impl EnvProvider {
    /// Creates a provider over the process environment.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::with_source(prefix, ProcessEnv)
    }

    pub fn with_source(prefix: impl Into<String>, source: impl EnvSource + 'static) -> Self {
        Self { prefix: prefix.into(), source: Arc::new(source) }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn candidates(&self, key: &str) -> Vec<String> {
        let normalized = normalize_key(key);
        let mut names = Vec::with_capacity(3);
        if !self.prefix.is_empty() {
            names.push(format!("{}{}", self.prefix, normalized));
        }
        names.push(normalized);
        names.push(key.to_string());
        names.dedup();
        names
    }

    fn resolve(&self, key: &str) -> Option<(String, String)> {
        self.candidates(key).into_iter().find_map(|name| {
            self.source.var(&name).filter(|value| !value.is_empty()).map(|value| (name, value))
        })
    }
}

#[async_trait]
impl Provider for EnvProvider {
    fn name(&self) -> &'static str {
        "env"
    }

    async fn get_with_metadata(&self, key: &str) -> Result<Secret> {
        match self.resolve(key) {
            Some((env_var, value)) => {
                debug!(key = %key, env_var = %env_var, "Resolved secret from environment");
                Ok(Secret::new(key, value).with_metadata("env_var", env_var))
            }
            None => {
                debug!(
                    key = %key,
                    candidates = ?self.candidates(key),
                    "Secret not found in environment"
                );
                Err(SecretsError::not_found(key))
            }
        }
    }

    async fn list(&self) -> Result<Vec<String>> {
        let keys = self
            .source
            .vars()
            .into_iter()
            .filter_map(|(name, _)| name.strip_prefix(self.prefix.as_str()).map(str::to_string))
            .filter(|key| !key.is_empty())
            .collect();
        Ok(keys)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    async fn healthy(&self) -> bool {
        true
    }
}
