//! AWS Signature Version 4 request signing.
//!
//! Built from HMAC-SHA256 and SHA-256 primitives. Signing is a pure
//! function of credentials, region, service, request parts and timestamp,
//! so identical inputs always produce identical headers.
//!
//! Only the shape of request this crate sends is supported: a `POST` to
//! `/` with an empty query string and a JSON body.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::types::SecretString;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const TERMINATOR: &str = "aws4_request";

/// Static credentials for request signing.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    pub session_token: Option<SecretString>,
}

impl Credentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<SecretString>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<SecretString>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

/// The parts of an outgoing request that take part in the signature.
#[derive(Debug, Clone)]
pub struct SigningRequest<'a> {
    pub method: &'a str,
    /// Host header value, including a non-default port.
    pub host: &'a str,
    pub content_type: &'a str,
    /// `X-Amz-Target` operation selector.
    pub target: &'a str,
    pub payload: &'a [u8],
    pub timestamp: DateTime<Utc>,
}

/// Signs requests for one region and service.
#[derive(Debug, Clone)]
pub struct Signer {
    region: String,
    service: String,
}

/// Hex-encoded SHA-256 digest.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Derives the signing key: `AWS4{secret}` → date → region → service → `aws4_request`.
pub fn signing_key(
    secret_access_key: &str,
    date_stamp: &str,
    region: &str,
    service: &str,
) -> Vec<u8> {
    let seed = format!("AWS4{}", secret_access_key);
    let k_date = hmac_sha256(seed.as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, TERMINATOR.as_bytes())
}

impl Signer {
    pub fn new(region: impl Into<String>, service: impl Into<String>) -> Self {
        Self { region: region.into(), service: service.into() }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn credential_scope(&self, date_stamp: &str) -> String {
        format!("{}/{}/{}/{}", date_stamp, self.region, self.service, TERMINATOR)
    }

    /// Builds the lower-cased headers that are signed, sorted by name.
    fn canonical_header_map(
        request: &SigningRequest<'_>,
        amz_date: &str,
        payload_hash: &str,
        session_token: Option<&str>,
    ) -> BTreeMap<&'static str, String> {
        let mut headers = BTreeMap::new();
        headers.insert("content-type", request.content_type.trim().to_string());
        headers.insert("host", request.host.trim().to_string());
        headers.insert("x-amz-content-sha256", payload_hash.to_string());
        headers.insert("x-amz-date", amz_date.to_string());
        headers.insert("x-amz-target", request.target.trim().to_string());
        if let Some(token) = session_token {
            headers.insert("x-amz-security-token", token.to_string());
        }
        headers
    }

    /// Canonical request string and the signed header list.
    pub fn canonical_request(
        &self,
        request: &SigningRequest<'_>,
        session_token: Option<&str>,
    ) -> (String, String) {
        let amz_date = request.timestamp.format("%Y%m%dT%H%M%SZ").to_string();
        let payload_hash = sha256_hex(request.payload);
        let headers = Self::canonical_header_map(request, &amz_date, &payload_hash, session_token);

        let canonical_headers: String =
            headers.iter().map(|(name, value)| format!("{}:{}\n", name, value)).collect();
        let signed_headers = headers.keys().copied().collect::<Vec<_>>().join(";");

        let canonical = format!(
            "{}\n/\n\n{}\n{}\n{}",
            request.method, canonical_headers, signed_headers, payload_hash
        );
        (canonical, signed_headers)
    }

    /// Returns the headers to attach to the request.
    ///
    /// Without credentials the request is left unsigned: no `Authorization`,
    /// `X-Amz-Date` or `X-Amz-Content-Sha256` header is produced, and an
    /// ambient credential mechanism is expected to apply instead.
    pub fn sign(
        &self,
        credentials: Option<&Credentials>,
        request: &SigningRequest<'_>,
    ) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        let Some(credentials) = credentials else {
            return out;
        };

        let amz_date = request.timestamp.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = request.timestamp.format("%Y%m%d").to_string();
        let payload_hash = sha256_hex(request.payload);
        let session_token = credentials.session_token.as_ref().map(|t| t.expose_secret());

        let (canonical, signed_headers) = self.canonical_request(request, session_token);
        let scope = self.credential_scope(&date_stamp);
        let string_to_sign =
            format!("{}\n{}\n{}\n{}", ALGORITHM, amz_date, scope, sha256_hex(canonical.as_bytes()));

        let key = signing_key(
            credentials.secret_access_key.expose_secret(),
            &date_stamp,
            &self.region,
            &self.service,
        );
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

        out.insert("x-amz-date".to_string(), amz_date);
        out.insert("x-amz-content-sha256".to_string(), payload_hash);
        if let Some(token) = session_token {
            out.insert("x-amz-security-token".to_string(), token.to_string());
        }
        out.insert(
            "authorization".to_string(),
            format!(
                "{} Credential={}/{}, SignedHeaders={}, Signature={}",
                ALGORITHM, credentials.access_key_id, scope, signed_headers, signature
            ),
        );
        out
    }
}
