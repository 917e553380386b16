//! AWS Secrets Manager backend.
//!
//! Speaks the Secrets Manager JSON protocol directly: every call is a
//! `POST /` to the regional endpoint with the operation chosen by the
//! `X-Amz-Target` header. Requests are signed with [`signer::Signer`] when
//! static credentials are configured and sent unsigned otherwise.
//!
//! When a store-wide prefix is configured, key `db` is addressed as
//! `{prefix}/db` on the wire, and listed names outside `{prefix}/` are not
//! surfaced.

pub mod signer;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::AwsConfig;
use crate::error::{Result, SecretsError};
use crate::provider::{Provider, HEALTH_CHECK_TIMEOUT};
use crate::types::Secret;

pub use signer::{sha256_hex, Credentials, Signer, SigningRequest};

const SERVICE: &str = "secretsmanager";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const TARGET_GET_SECRET_VALUE: &str = "secretsmanager.GetSecretValue";
const TARGET_LIST_SECRETS: &str = "secretsmanager.ListSecrets";
const LIST_PAGE_SIZE: u32 = 100;

/// Error types that mean the caller's credentials were rejected.
const AUTH_ERROR_TYPES: [&str; 6] = [
    "AccessDeniedException",
    "UnrecognizedClientException",
    "InvalidSignatureException",
    "ExpiredTokenException",
    "IncompleteSignature",
    "MissingAuthenticationToken",
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetSecretValueResponse {
    #[serde(rename = "ARN")]
    arn: Option<String>,
    name: Option<String>,
    secret_string: Option<String>,
    secret_binary: Option<String>,
    version_id: Option<String>,
    #[serde(default)]
    version_stages: Vec<String>,
    created_date: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListSecretsResponse {
    #[serde(default)]
    secret_list: Vec<SecretListEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SecretListEntry {
    name: Option<String>,
}

/// AWS Secrets Manager provider.
#[derive(Debug)]
pub struct AwsProvider {
    client: reqwest::Client,
    endpoint: Url,
    host: String,
    signer: Signer,
    credentials: Option<Credentials>,
    prefix: String,
}

impl AwsProvider {
    /// Create a new provider. Credentials are taken from the config; no request is sent.
    pub fn new(config: &AwsConfig, request_timeout: Duration) -> Result<Self> {
        let region = config.region.trim();
        if region.is_empty() {
            return Err(SecretsError::invalid_config("aws provider requires a region"));
        }

        let raw_endpoint = match config.endpoint.as_deref().map(str::trim) {
            Some(endpoint) if !endpoint.is_empty() => endpoint.to_string(),
            _ => format!("https://{}.{}.amazonaws.com", SERVICE, region),
        };
        let endpoint = Url::parse(&raw_endpoint).map_err(|e| {
            SecretsError::invalid_config(format!("Invalid AWS endpoint '{}': {}", raw_endpoint, e))
        })?;
        let host = host_header(&endpoint).ok_or_else(|| {
            SecretsError::invalid_config(format!("AWS endpoint '{}' has no host", raw_endpoint))
        })?;

        // Static credentials need both halves; otherwise fall back to ambient credentials.
        let credentials = match (&config.access_key_id, &config.secret_access_key) {
            (Some(access_key), Some(secret_key))
                if !access_key.is_empty() && !secret_key.is_empty() =>
            {
                let mut credentials = Credentials::new(access_key.clone(), secret_key.clone());
                credentials.session_token = config.session_token.clone().filter(|t| !t.is_empty());
                Some(credentials)
            }
            _ => None,
        };

        let client = reqwest::Client::builder().timeout(request_timeout).build().map_err(|e| {
            SecretsError::invalid_config(format!("Failed to create AWS HTTP client: {}", e))
        })?;

        let prefix = config.secret_prefix.trim().trim_end_matches('/').to_string();

        info!(
            region = %region,
            endpoint = %endpoint,
            prefix = %prefix,
            signed = credentials.is_some(),
            "Initialized AWS Secrets Manager provider"
        );

        let signer = Signer::new(region, SERVICE);
        Ok(Self { client, endpoint, host, signer, credentials, prefix })
    }

    pub fn region(&self) -> &str {
        self.signer.region()
    }

    /// The identifier sent on the wire for a logical key.
    pub fn secret_id(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", self.prefix, key)
        }
    }

    /// Maps a backend name back to a logical key, or `None` if it lies outside the prefix.
    pub fn strip_prefix<'a>(&self, name: &'a str) -> Option<&'a str> {
        if self.prefix.is_empty() {
            return Some(name);
        }
        name.strip_prefix(self.prefix.as_str())?.strip_prefix('/').filter(|key| !key.is_empty())
    }

    async fn call(&self, target: &str, payload: &Value) -> Result<(StatusCode, String)> {
        let body = serde_json::to_vec(payload)?;
        let signing = SigningRequest {
            method: "POST",
            host: &self.host,
            content_type: CONTENT_TYPE,
            target,
            payload: &body,
            timestamp: Utc::now(),
        };
        let signed_headers = self.signer.sign(self.credentials.as_ref(), &signing);

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header("Content-Type", CONTENT_TYPE)
            .header("X-Amz-Target", target);
        for (name, value) in &signed_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| SecretsError::from_http("AWS Secrets Manager request failed", e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SecretsError::from_http("Failed to read AWS response body", e))?;
        Ok((status, text))
    }
}

/// Host header value for an endpoint, keeping non-default ports.
fn host_header(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Maps an error response to the shared taxonomy.
pub(crate) fn classify_error(key: &str, status: StatusCode, body: String) -> SecretsError {
    let parsed = serde_json::from_str::<Value>(&body).ok();
    let field = |names: &[&str]| -> String {
        parsed
            .as_ref()
            .and_then(|v| names.iter().find_map(|name| v.get(*name).and_then(Value::as_str)))
            .unwrap_or_default()
            .to_string()
    };
    let error_type = field(&["__type", "code", "Code"]);
    let message = field(&["message", "Message"]);

    if status == StatusCode::BAD_REQUEST && error_type.contains("ResourceNotFoundException") {
        return SecretsError::not_found(key);
    }
    if matches!(status, StatusCode::BAD_REQUEST | StatusCode::FORBIDDEN)
        && AUTH_ERROR_TYPES.iter().any(|t| error_type.contains(t))
    {
        return SecretsError::authentication_failed(format!("{}: {}", error_type, message));
    }

    let summary = if error_type.is_empty() {
        format!("AWS Secrets Manager returned {}", status)
    } else {
        format!("AWS Secrets Manager returned {} ({})", status, error_type)
    };
    SecretsError::unexpected_status(summary, body)
}

/// Accepts `CreatedDate` as an RFC 3339 string or as epoch seconds.
fn parse_created_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => DateTime::parse_from_rfc3339(raw).ok().map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => {
            let seconds = n.as_f64()?;
            let whole = seconds.trunc() as i64;
            let nanos = ((seconds - seconds.trunc()) * 1e9).round() as u32;
            Utc.timestamp_opt(whole, nanos.min(999_999_999)).single()
        }
        _ => None,
    }
}

fn parse_secret(key: &str, body: &str) -> Result<Secret> {
    let response: GetSecretValueResponse = serde_json::from_str(body).map_err(|e| {
        SecretsError::parse(format!("invalid GetSecretValue response: {}", e), body)
    })?;

    // SecretBinary is passed through in its wire encoding, not decoded.
    let value = response.secret_string.or(response.secret_binary).ok_or_else(|| {
        let message = format!("AWS secret '{}' has neither SecretString nor SecretBinary", key);
        SecretsError::parse(message, body)
    })?;

    let mut secret = Secret::new(key, value)
        .with_created_at(response.created_date.as_ref().and_then(parse_created_date));
    if let Some(version) = response.version_id {
        secret = secret.with_version(version);
    }
    if let Some(arn) = response.arn {
        secret = secret.with_metadata("arn", arn);
    }
    if let Some(name) = response.name {
        secret = secret.with_metadata("name", name);
    }
    if !response.version_stages.is_empty() {
        secret = secret.with_metadata("version_stages", response.version_stages.join(","));
    }
    Ok(secret)
}

#[async_trait]
impl Provider for AwsProvider {
    fn name(&self) -> &'static str {
        "aws"
    }

    async fn get_with_metadata(&self, key: &str) -> Result<Secret> {
        let secret_id = self.secret_id(key);
        debug!(key = %key, secret_id = %secret_id, "Fetching secret from AWS Secrets Manager");

        let (status, body) =
            self.call(TARGET_GET_SECRET_VALUE, &json!({ "SecretId": secret_id })).await?;

        if status != StatusCode::OK {
            let err = classify_error(key, status, body);
            debug!(key = %key, status = %status, error = %err, "AWS GetSecretValue failed");
            return Err(err);
        }

        parse_secret(key, &body)
    }

    /// Reads only the first `ListSecrets` page (up to 100 names); `NextToken`
    /// is not followed.
    async fn list(&self) -> Result<Vec<String>> {
        let mut payload = json!({ "MaxResults": LIST_PAGE_SIZE });
        if !self.prefix.is_empty() {
            payload["Filters"] =
                json!([{ "Key": "name", "Values": [format!("{}/", self.prefix)] }]);
        }

        let (status, body) = self.call(TARGET_LIST_SECRETS, &payload).await?;
        if status != StatusCode::OK {
            return Err(classify_error(&self.prefix, status, body));
        }

        let parsed: ListSecretsResponse = serde_json::from_str(&body).map_err(|e| {
            SecretsError::parse(format!("invalid ListSecrets response: {}", e), body.clone())
        })?;

        Ok(parsed
            .secret_list
            .iter()
            .filter_map(|entry| entry.name.as_deref())
            .filter_map(|name| self.strip_prefix(name))
            .map(str::to_string)
            .collect())
    }

    async fn close(&self) -> Result<()> {
        debug!(endpoint = %self.endpoint, "Closing AWS Secrets Manager provider");
        Ok(())
    }

    async fn healthy(&self) -> bool {
        let payload = json!({ "MaxResults": 1 });
        let probe = self.call(TARGET_LIST_SECRETS, &payload);
        match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, probe).await {
            Ok(Ok((status, _))) if status == StatusCode::OK => true,
            Ok(Ok((status, _))) => {
                warn!(status = %status, "AWS Secrets Manager health check returned non-200");
                false
            }
            Ok(Err(e)) => {
                warn!(error = %e, "AWS Secrets Manager health check failed");
                false
            }
            Err(_) => {
                warn!(timeout = ?HEALTH_CHECK_TIMEOUT, "AWS health check timed out");
                false
            }
        }
    }
}
