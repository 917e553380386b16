//! Config → validate → factory → Manager, end to end.

use std::collections::HashMap;

use secret_broker::{Config, ErrorKind, Manager, SecretsError};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_from(pairs: &[(&str, &str)]) -> secret_broker::Result<Config> {
    let vars: HashMap<String, String> =
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    Config::from_lookup(move |name: &str| vars.get(name).cloned())
}

#[test]
fn test_validation_minimums() {
    assert!(config_from(&[]).unwrap().validate().is_ok());

    let cases: [&[(&str, &str)]; 4] = [
        &[("SECRETS_PROVIDER", "aws")],
        &[("SECRETS_PROVIDER", "vault")],
        &[("SECRETS_PROVIDER", "kubernetes")],
        &[("SECRETS_PROVIDER", "keychain")],
    ];
    for pairs in cases {
        let err = config_from(pairs).unwrap().validate().unwrap_err();
        assert!(matches!(err, SecretsError::InvalidConfig { .. }), "{:?}", pairs);
    }

    let ok: [&[(&str, &str)]; 3] = [
        &[("SECRETS_PROVIDER", "aws"), ("AWS_DEFAULT_REGION", "eu-central-1")],
        &[("SECRETS_PROVIDER", "vault"), ("VAULT_ADDR", "http://vault:8200")],
        &[("SECRETS_PROVIDER", "kubernetes"), ("SECRETS_K8S_SECRET_NAME", "app")],
    ];
    for pairs in ok {
        assert!(config_from(pairs).unwrap().validate().is_ok(), "{:?}", pairs);
    }
}

#[tokio::test]
async fn test_invalid_config_constructs_nothing() {
    let config = config_from(&[("SECRETS_PROVIDER", "vault")]).unwrap();
    let err = Manager::new(config).await.unwrap_err();
    assert!(matches!(err, SecretsError::InvalidConfig { .. }));
}

#[tokio::test]
async fn test_vault_manager_from_environment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/data/service/api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "data": { "value": "abc123" }, "metadata": { "version": 1 } }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/sys/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let uri = server.uri();
    let config = config_from(&[
        ("SECRETS_PROVIDER", "vault"),
        ("VAULT_ADDR", uri.as_str()),
        ("VAULT_TOKEN", "root"),
        ("SECRETS_VAULT_MOUNT_PATH", "kv"),
    ])
    .unwrap();

    let mut manager = Manager::new(config).await.unwrap();
    assert_eq!(manager.provider_name(), "vault");
    assert_eq!(manager.get("service/api-key").await.unwrap(), "abc123");
    assert_eq!(manager.get_or_default("service/missing", "fallback").await, "fallback");
    assert!(manager.healthy().await);

    manager.close().await.unwrap();
    manager.close().await.unwrap();
    let err = manager.get("service/api-key").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotConfigured);
}

#[tokio::test]
async fn test_env_manager_get_or_default() {
    let var = format!("SECRET_BROKER_MANAGER_TEST_{}", std::process::id());
    std::env::set_var(&var, "present");

    let manager = Manager::new(Config::default()).await.unwrap();
    assert_eq!(manager.get_or_default(&var, "fallback").await, "present");
    assert_eq!(manager.get_or_default(&format!("{}_ABSENT", var), "fallback").await, "fallback");

    std::env::remove_var(&var);
}
