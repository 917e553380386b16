//! HashiCorp Vault secrets backend (KV v2).
//!
//! Talks to Vault's HTTP API directly:
//!
//! - read: `GET {address}/v1/{mount}/data/{key}`
//! - list: `GET {address}/v1/{mount}/metadata/?list=true`
//! - health: `GET {address}/v1/sys/health`
//!
//! The token is sent as `X-Vault-Token` and the Enterprise namespace as
//! `X-Vault-Namespace`; either header is omitted entirely when not
//! configured.
//!
//! # Value resolution
//!
//! A KV v2 secret is a map of fields. The value returned to callers is the
//! field named `value` if present, otherwise the first string field in
//! key order. A secret with no string field at all is a parse error: it
//! exists but has nothing usable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::VaultConfig;
use crate::error::{Result, SecretsError};
use crate::provider::{Provider, HEALTH_CHECK_TIMEOUT};
use crate::types::{Secret, SecretString};

/// Health status codes meaning "reachable and usable": active (200),
/// standby (429), DR secondary (472) and performance standby (473).
const HEALTHY_STATUS_CODES: [u16; 4] = [200, 429, 472, 473];

#[derive(Debug, Deserialize)]
struct ReadResponse {
    data: ReadData,
}

#[derive(Debug, Deserialize)]
struct ReadData {
    #[serde(default)]
    data: Option<Map<String, Value>>,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    data: ListData,
}

#[derive(Debug, Deserialize)]
struct ListData {
    #[serde(default)]
    keys: Vec<String>,
}

/// Vault KV v2 provider.
pub struct VaultProvider {
    client: reqwest::Client,
    address: String,
    mount_path: String,
    token: Option<SecretString>,
    namespace: Option<String>,
}

impl std::fmt::Debug for VaultProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultProvider")
            .field("address", &self.address)
            .field("mount_path", &self.mount_path)
            .field("namespace", &self.namespace)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl VaultProvider {
    /// Create a new Vault provider. No request is made until the first call.
    pub fn new(config: &VaultConfig, request_timeout: Duration) -> Result<Self> {
        let address = config.address.trim().trim_end_matches('/').to_string();
        if address.is_empty() {
            return Err(SecretsError::invalid_config("vault provider requires an address"));
        }

        let mount_path = match config.mount_path.trim().trim_matches('/') {
            "" => "secret".to_string(),
            mount => mount.to_string(),
        };

        let client = reqwest::Client::builder().timeout(request_timeout).build().map_err(|e| {
            SecretsError::invalid_config(format!("Failed to create Vault HTTP client: {}", e))
        })?;

        info!(
            address = %address,
            mount_path = %mount_path,
            namespace = ?config.namespace,
            token_configured = config.token.is_some(),
            "Initialized Vault secrets provider"
        );

        Ok(Self {
            client,
            address,
            mount_path,
            token: config.token.clone().filter(|t| !t.is_empty()),
            namespace: config.namespace.clone().filter(|n| !n.is_empty()),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn mount_path(&self) -> &str {
        &self.mount_path
    }

    fn data_url(&self, key: &str) -> String {
        format!("{}/v1/{}/data/{}", self.address, self.mount_path, key.trim_start_matches('/'))
    }

    fn list_url(&self) -> String {
        format!("{}/v1/{}/metadata/?list=true", self.address, self.mount_path)
    }

    fn health_url(&self) -> String {
        format!("{}/v1/sys/health", self.address)
    }

    fn authorize(&self, mut request: RequestBuilder) -> RequestBuilder {
        if let Some(token) = &self.token {
            request = request.header("X-Vault-Token", token.expose_secret());
        }
        if let Some(namespace) = &self.namespace {
            request = request.header("X-Vault-Namespace", namespace);
        }
        request
    }

    async fn send(&self, url: &str, context: &str) -> Result<Response> {
        self.authorize(self.client.get(url))
            .send()
            .await
            .map_err(|e| SecretsError::from_http(context, e))
    }

    /// Maps a non-success status to the shared error taxonomy.
    fn status_error(key: &str, status: StatusCode, body: String) -> SecretsError {
        match status {
            StatusCode::NOT_FOUND => SecretsError::not_found(key),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                SecretsError::authentication_failed(format!("Vault rejected token ({})", status))
            }
            _ => SecretsError::unexpected_status(format!("Vault returned {}", status), body),
        }
    }
}

/// Picks the value field out of a KV v2 data map.
pub(crate) fn resolve_value(data: &Map<String, Value>) -> Option<&str> {
    if let Some(value) = data.get("value").and_then(Value::as_str) {
        return Some(value);
    }
    data.values().find_map(Value::as_str)
}

fn metadata_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_secret(key: &str, mount_path: &str, body: &str) -> Result<Secret> {
    let response: ReadResponse = serde_json::from_str(body)
        .map_err(|e| SecretsError::parse(format!("invalid Vault read response: {}", e), body))?;

    let data = response.data.data.unwrap_or_default();
    let value = resolve_value(&data).ok_or_else(|| {
        SecretsError::parse(format!("Vault secret '{}' has no string field", key), body)
    })?;

    let mut secret = Secret::new(key, value)
        .with_metadata("path", key)
        .with_metadata("mount_path", mount_path);

    if let Some(metadata) = response.data.metadata {
        if let Some(version) = metadata.get("version").and_then(metadata_string) {
            secret = secret.with_version(version);
        }

        let created_at = metadata
            .get("created_time")
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|t| t.with_timezone(&Utc));
        secret = secret.with_created_at(created_at);

        for field in ["deletion_time", "destroyed"] {
            if let Some(value) = metadata.get(field).and_then(metadata_string) {
                secret.metadata.insert(field.to_string(), value);
            }
        }

        if let Some(Value::Object(custom)) = metadata.get("custom_metadata") {
            for (name, value) in custom {
                if let Some(value) = metadata_string(value) {
                    secret.metadata.insert(format!("custom.{}", name), value);
                }
            }
        }
    }

    Ok(secret)
}

#[async_trait]
impl Provider for VaultProvider {
    fn name(&self) -> &'static str {
        "vault"
    }

    async fn get_with_metadata(&self, key: &str) -> Result<Secret> {
        debug!(key = %key, mount_path = %self.mount_path, "Fetching secret from Vault");

        let response = self.send(&self.data_url(key), "Vault read request failed").await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SecretsError::from_http("Failed to read Vault response body", e))?;

        if !status.is_success() {
            let err = Self::status_error(key, status, body);
            debug!(key = %key, status = %status, error = %err, "Vault read failed");
            return Err(err);
        }

        parse_secret(key, &self.mount_path, &body)
    }

    async fn list(&self) -> Result<Vec<String>> {
        let response = self.send(&self.list_url(), "Vault list request failed").await?;
        let status = response.status();

        // An empty mount has no metadata to list.
        if status == StatusCode::NOT_FOUND {
            debug!(mount_path = %self.mount_path, "Vault list returned 404, treating as empty");
            return Ok(Vec::new());
        }

        let body = response
            .text()
            .await
            .map_err(|e| SecretsError::from_http("Failed to read Vault response body", e))?;

        if !status.is_success() {
            return Err(Self::status_error(&self.mount_path, status, body));
        }

        let parsed: ListResponse = serde_json::from_str(&body)
            .map_err(|e| SecretsError::parse(format!("invalid Vault list response: {}", e), body))?;
        Ok(parsed.data.keys)
    }

    async fn close(&self) -> Result<()> {
        debug!(address = %self.address, "Closing Vault provider");
        Ok(())
    }

    async fn healthy(&self) -> bool {
        let probe = self.authorize(self.client.get(self.health_url())).send();
        match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, probe).await {
            Ok(Ok(response)) => {
                let code = response.status().as_u16();
                let healthy = HEALTHY_STATUS_CODES.contains(&code);
                if !healthy {
                    warn!(status = code, "Vault health check returned unusable status");
                }
                healthy
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Vault health check failed");
                false
            }
            Err(_) => {
                warn!(timeout = ?HEALTH_CHECK_TIMEOUT, "Vault health check timed out");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider(address: &str, mount_path: &str) -> VaultProvider {
        let config = VaultConfig {
            address: address.to_string(),
            token: None,
            mount_path: mount_path.to_string(),
            namespace: None,
        };
        VaultProvider::new(&config, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_address_and_mount_are_normalized() {
        let vault = provider("http://127.0.0.1:8200/", "/kv/");
        assert_eq!(vault.address(), "http://127.0.0.1:8200");
        assert_eq!(vault.mount_path(), "kv");
        assert_eq!(vault.data_url("app/db"), "http://127.0.0.1:8200/v1/kv/data/app/db");
        assert_eq!(vault.list_url(), "http://127.0.0.1:8200/v1/kv/metadata/?list=true");

        let vault = provider("http://vault:8200", "");
        assert_eq!(vault.mount_path(), "secret");
    }

    #[test]
    fn test_empty_address_is_rejected() {
        let config = VaultConfig::default();
        assert!(VaultProvider::new(&config, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_resolve_value_prefers_value_field() {
        let data = json!({"a_first": "other", "value": "chosen"});
        assert_eq!(resolve_value(data.as_object().unwrap()), Some("chosen"));
    }

    #[test]
    fn test_resolve_value_falls_back_to_string_field() {
        let data = json!({"count": 3, "password": "hunter2"});
        assert_eq!(resolve_value(data.as_object().unwrap()), Some("hunter2"));

        let data = json!({"count": 3, "enabled": true});
        assert_eq!(resolve_value(data.as_object().unwrap()), None);
    }

    #[test]
    fn test_parse_secret_reads_metadata() {
        let body = json!({
            "data": {
                "data": {"value": "s3cr3t"},
                "metadata": {
                    "version": 4,
                    "created_time": "2024-03-01T12:00:00.5Z",
                    "deletion_time": "",
                    "destroyed": false,
                    "custom_metadata": {"owner": "payments"}
                }
            }
        })
        .to_string();

        let secret = parse_secret("db/password", "secret", &body).unwrap();
        assert_eq!(secret.expose(), "s3cr3t");
        assert_eq!(secret.key, "db/password");
        assert_eq!(secret.version.as_deref(), Some("4"));
        assert!(secret.created_at.is_some());
        assert_eq!(secret.metadata.get("destroyed").map(String::as_str), Some("false"));
        assert!(!secret.metadata.contains_key("deletion_time"));
        assert_eq!(secret.metadata.get("custom.owner").map(String::as_str), Some("payments"));
    }

    #[test]
    fn test_parse_secret_without_string_field_is_parse_error() {
        let body = json!({"data": {"data": {"port": 5432}, "metadata": {}}}).to_string();
        let err = parse_secret("db", "secret", &body).unwrap_err();
        assert!(matches!(err, SecretsError::Parse { .. }));
        assert!(err.body().unwrap().contains("5432"));
    }

    #[test]
    fn test_parse_secret_rejects_malformed_body() {
        let err = parse_secret("db", "secret", "<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, SecretsError::Parse { .. }));
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            VaultProvider::status_error("k", StatusCode::NOT_FOUND, String::new()),
            SecretsError::NotFound { .. }
        ));
        assert!(matches!(
            VaultProvider::status_error("k", StatusCode::FORBIDDEN, String::new()),
            SecretsError::AuthenticationFailed { .. }
        ));
        assert!(matches!(
            VaultProvider::status_error("k", StatusCode::UNAUTHORIZED, String::new()),
            SecretsError::AuthenticationFailed { .. }
        ));
        let err =
            VaultProvider::status_error("k", StatusCode::BAD_GATEWAY, "upstream down".to_string());
        assert_eq!(err.body(), Some("upstream down"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = VaultConfig {
            address: "http://vault:8200".to_string(),
            token: Some(SecretString::new("s.verysecret")),
            ..Default::default()
        };
        let vault = VaultProvider::new(&config, Duration::from_secs(1)).unwrap();
        let debug = format!("{:?}", vault);
        assert!(!debug.contains("s.verysecret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
