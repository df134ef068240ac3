//! Mock KAS tests using mockito for automated CI coverage
//!
//! These tests validate the KAS public key client without a running platform.

mod common;

use common::*;
use mockito::{Matcher, Server};
use opentdf_nano::p256::SecretKey;
use opentdf_nano::{
    open_envelope, Credentials, KasClient, KasLocator, NanoTdfBuilder, NanoTdfError,
    PlatformConfig,
};
use rand::rngs::OsRng;
use std::time::Duration;

fn public_key_response(pem: &str) -> String {
    serde_json::json!({ "publicKey": pem, "kid": "e1" }).to_string()
}

fn client_for(url: &str) -> KasClient {
    KasClient::new(KasLocator::parse(url).unwrap(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_public_key_fetch_and_roundtrip() {
    let mut server = Server::new_async().await;
    let kas_secret = SecretKey::random(&mut OsRng);

    let mock = server
        .mock("GET", "/kas/v2/kas_public_key")
        .match_query(Matcher::UrlEncoded(
            "algorithm".into(),
            "ec:secp256r1".into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(public_key_response(&public_key_pem(&kas_secret)))
        .create_async()
        .await;

    let client = client_for(&format!("{}/kas", server.url()));
    let kas_public = client.public_key().await.unwrap();
    mock.assert_async().await;

    assert_eq!(kas_public.kid(), Some("e1"));
    assert_eq!(kas_public.key(), &kas_secret.public_key());
    assert_eq!(kas_public.locator().url(), format!("{}/kas", server.url()));

    let bytes = NanoTdfBuilder::new()
        .kas(kas_public)
        .attribute(SECRET_FQN)
        .unwrap()
        .encrypt_to_bytes(TEST_PLAINTEXT)
        .unwrap();
    assert_eq!(
        open_envelope(&bytes, &kas_secret, None).unwrap(),
        TEST_PLAINTEXT
    );
}

#[tokio::test]
async fn test_server_error_is_unavailable() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/kas/v2/kas_public_key")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("internal error")
        .create_async()
        .await;

    let client = client_for(&format!("{}/kas", server.url()));
    let err = client.public_key().await.unwrap_err();
    mock.assert_async().await;

    assert!(matches!(err, NanoTdfError::KeyServiceUnavailable(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_unparseable_key_is_invalid() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/kas/v2/kas_public_key")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(public_key_response("-----BEGIN PUBLIC KEY-----\nnope\n-----END PUBLIC KEY-----"))
        .create_async()
        .await;

    let client = client_for(&format!("{}/kas", server.url()));
    let err = client.public_key().await.unwrap_err();
    assert!(matches!(err, NanoTdfError::InvalidKasKey(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_unreachable_kas() {
    let client = client_for("http://127.0.0.1:1/kas");
    let err = client.public_key().await.unwrap_err();
    assert!(matches!(err, NanoTdfError::KeyServiceUnavailable(_)));
}

#[tokio::test]
async fn test_from_config_sends_bearer_token() {
    let mut server = Server::new_async().await;
    let kas_secret = SecretKey::random(&mut OsRng);

    let mock = server
        .mock("GET", "/kas/v2/kas_public_key")
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer platform-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(public_key_response(&public_key_pem(&kas_secret)))
        .create_async()
        .await;

    let config = PlatformConfig::new(
        server.url(),
        Credentials::Bearer("platform-token".to_string()),
    );
    let client = KasClient::from_config(&config).unwrap();
    client.public_key().await.unwrap();
    mock.assert_async().await;
}
