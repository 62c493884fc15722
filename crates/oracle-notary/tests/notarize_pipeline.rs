//! Pipeline-level integration tests: a mock `EnclaveDevice` double plus a
//! tiny local `axum` server standing in for exchange endpoints, exercised
//! through the public API rather than any single component in isolation.

use std::sync::{Arc, Mutex};

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use oracle_notary::domain::enclave::{EnclaveDevice, EnclaveError, TARGET_INFO_SIZE, USER_REPORT_DATA_SIZE};
use oracle_notary::domain::oracle::{Hasher, Signer};
use oracle_notary::domain::request::{
    AttestationRequest, EncodingOptions, EncodingValueKind, RequestMethod, ResponseFormat,
};
use oracle_notary::domain::validate;
use oracle_notary::domain::RuntimeContext;
use oracle_notary::infra::config::RuntimeConfig;
use oracle_notary::infra::hasher::Blake2Hasher;
use oracle_notary::infra::http_client;
use oracle_notary::infra::signer::Ed25519Signer;
use tower::ServiceExt;

const MOCK_CONFIG: &str = r#"{
    "port": 8000,
    "metricsPort": 8001,
    "logLevel": "info",
    "whitelistedDomains": ["127.0.0.1"],
    "symbolExchanges": { "BTC": ["alpha", "beta"] },
    "exchangeUrlTemplates": {}
}"#;

struct MockEnclaveDevice {
    quote_len: usize,
    report_data: Mutex<Option<[u8; USER_REPORT_DATA_SIZE]>>,
}

impl MockEnclaveDevice {
    fn new() -> Self {
        Self {
            quote_len: oracle_notary::domain::enclave::MIN_QUOTE_SIZE,
            report_data: Mutex::new(None),
        }
    }
}

impl EnclaveDevice for MockEnclaveDevice {
    fn read_my_target_info(&self) -> Result<[u8; TARGET_INFO_SIZE], EnclaveError> {
        Ok([0x11; TARGET_INFO_SIZE])
    }

    fn write_target_info(&self, _buf: &[u8; TARGET_INFO_SIZE]) -> Result<(), EnclaveError> {
        Ok(())
    }

    fn write_user_report_data(&self, buf: &[u8; USER_REPORT_DATA_SIZE]) -> Result<(), EnclaveError> {
        *self.report_data.lock().unwrap() = Some(*buf);
        Ok(())
    }

    fn read_quote(&self) -> Result<Vec<u8>, EnclaveError> {
        Ok(vec![0x99; self.quote_len])
    }

    fn read_attestation_type(&self) -> Result<String, EnclaveError> {
        Ok("sgx".to_string())
    }
}

fn test_context() -> RuntimeContext {
    RuntimeContext::new(
        Arc::new(RuntimeConfig::from_json(MOCK_CONFIG).unwrap()),
        Arc::new(MockEnclaveDevice::new()),
        Arc::new(Blake2Hasher),
        Arc::new(Ed25519Signer::generate()),
        http_client::build_client(),
    )
}

fn sample_request(url: &str) -> AttestationRequest {
    AttestationRequest {
        url: url.to_string(),
        request_method: RequestMethod::Get,
        response_format: ResponseFormat::Json,
        selector: "value".to_string(),
        html_result_type: None,
        request_body: None,
        request_content_type: None,
        request_headers: indexmap::IndexMap::new(),
        encoding_options: EncodingOptions {
            value: EncodingValueKind::Int,
            precision: 0,
        },
        debug_request: false,
    }
}

#[tokio::test]
async fn random_endpoint_round_trips_through_the_full_pipeline() {
    let ctx = test_context();
    let router = oracle_notary::api::router(ctx);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/random?max=1000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(value.get("report").is_some());
    assert!(value.get("signature").is_some());
}

#[tokio::test]
async fn random_endpoint_rejects_an_out_of_range_max() {
    let ctx = test_context();
    let router = oracle_notary::api::router(ctx);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/random?max=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["errorCode"], 1020);
    assert!(value.get("requestId").is_some());
}

#[test]
fn notarize_rejects_a_non_whitelisted_target() {
    let ctx = test_context();
    let req = sample_request("evil.example.com/data");

    let err = validate::validate(&req, &ctx.config.whitelisted_domains).unwrap_err();
    assert!(matches!(err, validate::ValidationError::TargetNotWhitelisted));
}

#[tokio::test]
async fn health_and_whitelist_endpoints_respond() {
    let ctx = test_context();
    let router = oracle_notary::api::router(ctx);

    let health = router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    let whitelist = router
        .oneshot(Request::builder().uri("/whitelist").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(whitelist.status(), StatusCode::OK);
    let body = to_bytes(whitelist.into_body(), usize::MAX).await.unwrap();
    let domains: Vec<String> = serde_json::from_slice(&body).unwrap();
    assert_eq!(domains, vec!["127.0.0.1".to_string()]);
}

/// Exercises C4 against a local mock exchange pair, bypassing the
/// production config's real exchange hosts.
#[tokio::test]
async fn price_feed_aggregates_across_mock_exchanges() {
    let mock_server = Router::new()
        .route(
            "/alpha",
            get(|| async { axum::Json(serde_json::json!({"lastPrice": "100.0", "volume": "10.0"})) }),
        )
        .route(
            "/beta",
            get(|| async { axum::Json(serde_json::json!({"lastPrice": "200.0", "volume": "30.0"})) }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, mock_server).await.unwrap();
    });

    let config_json = format!(
        r#"{{
            "port": 8000,
            "metricsPort": 8001,
            "logLevel": "info",
            "whitelistedDomains": [],
            "symbolExchanges": {{ "BTC": ["binance", "bybit"] }},
            "exchangeUrlTemplates": {{
                "binance": "http://{addr}/alpha",
                "bybit": "http://{addr}/beta"
            }}
        }}"#
    );
    let ctx = RuntimeContext::new(
        Arc::new(RuntimeConfig::from_json(&config_json).unwrap()),
        Arc::new(MockEnclaveDevice::new()),
        Arc::new(Blake2Hasher),
        Arc::new(Ed25519Signer::generate()),
        http_client::build_client(),
    );

    let result = oracle_notary::domain::price::aggregate(&ctx, oracle_notary::domain::request::PriceFeedAsset::Btc)
        .await
        .unwrap();

    assert_eq!(result.exchange_count, 2);
    assert!((result.total_volume - 40.0).abs() < 1e-9);
    let expected_vwap = (100.0 * 10.0 + 200.0 * 30.0) / 40.0;
    assert!((result.volume_weighted_avg - expected_vwap).abs() < 1e-9);
}

#[test]
fn hasher_and_signer_are_wired_consistently() {
    let hasher = Blake2Hasher;
    let signer = Ed25519Signer::generate();
    let digest = hasher.hash_bytes(b"hello");
    let signature = signer.sign(&digest);
    assert!(!signature.is_empty());
    assert!(signer.public_key().starts_with("0x"));
}

