/// HTTP API tests driving the router in-process
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use did_attest::{
    attestation::SignerConfig,
    chain::transfer::{counterparty_account_id, expected_transfer_amount, SHARED_CONTROL_PURPOSE},
    config::{ChainConfig, LoggingConfig, ServerConfig, ServiceConfig, VerificationConfig},
    server::build_router,
    AppContext,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tower::ServiceExt;

const ALICE: &str = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045";
const REGISTRY: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";
const CHAIN: u64 = 66238;

fn test_config() -> ServerConfig {
    let mut rpc_urls = HashMap::new();
    // Never contacted by these tests
    rpc_urls.insert(CHAIN, "http://127.0.0.1:9".to_string());

    ServerConfig {
        service: ServiceConfig {
            hostname: "127.0.0.1".to_string(),
            port: 0,
            debug_responses: false,
            request_timeout: Duration::from_secs(5),
        },
        chain: ChainConfig {
            active_chain_id: CHAIN,
            rpc_urls,
            registry_address: REGISTRY.to_string(),
            rpc_max_retries: 0,
        },
        signer: SignerConfig::default(),
        verification: VerificationConfig {
            doh_url: "http://127.0.0.1:9/dns-query".to_string(),
            document_timeout: Duration::from_secs(1),
            min_confirmations: 0,
        },
        logging: LoggingConfig {
            level: "info".to_string(),
        },
    }
}

fn app() -> Router {
    build_router(AppContext::new(test_config()).unwrap())
}

async fn send(request: Request<Body>) -> (StatusCode, Value) {
    let response = app().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn get(uri: &str) -> (StatusCode, Value) {
    send(Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(uri: &str, body: &str) -> (StatusCode, Value) {
    send(
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

#[tokio::test]
async fn test_health() {
    let (status, body) = get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let response = app()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route() {
    let (status, body) = get("/xrpc/com.atproto.server.describeServer").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NotFound");
}

#[tokio::test]
async fn test_normalize_checksums_evm_address() {
    let uri = format!("/api/v1/normalize?id=eip155:1:{}", ALICE.to_lowercase());
    let (status, body) = get(&uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["canonical"], format!("eip155:1:{}", ALICE));
    assert_eq!(body["namespace"], "eip155");
}

#[tokio::test]
async fn test_normalize_rejects_unknown_namespace() {
    let (status, body) = get("/api/v1/normalize?id=bitcoin:mainnet:1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("eip155"));
    assert!(message.contains("solana"));
    assert!(message.contains("sui"));
}

#[tokio::test]
async fn test_transfer_amount_matches_verifier() {
    let uri = format!(
        "/api/v1/transfer-amount?did=did:web:example.com&claimant={}",
        ALICE.to_lowercase()
    );
    let (status, body) = get(&uri).await;
    assert_eq!(status, StatusCode::OK);

    let expected = expected_transfer_amount(
        "did:web:example.com",
        &counterparty_account_id(CHAIN, ALICE),
        CHAIN,
        SHARED_CONTROL_PURPOSE,
    );
    assert_eq!(body["amountWei"], expected.to_string());
    assert_eq!(body["purpose"], "shared-control");
    assert_eq!(body["chainId"], CHAIN);
}

#[tokio::test]
async fn test_verify_and_attest_rejects_unsupported_did() {
    let request = json!({
        "did": "did:ethr:0x1234",
        "connectedAddress": ALICE,
        "requiredSchemas": ["domain-ownership"]
    });
    let (status, body) = post_json("/api/v1/verify-and-attest", &request.to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
    assert_eq!(body["status"], "failed");
    assert!(body["error"].as_str().unwrap().contains("Unsupported DID method"));
    assert!(body["elapsedMs"].is_u64());
    assert!(body.get("debug").is_none());
}

#[tokio::test]
async fn test_verify_and_attest_rejects_bad_address() {
    let request = json!({
        "did": "did:web:example.com",
        "connectedAddress": "0X1234",
        "requiredSchemas": ["domain-ownership"]
    });
    let (status, body) = post_json("/api/v1/verify-and-attest", &request.to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorKind"], "format");
}

#[tokio::test]
async fn test_verify_and_attest_rejects_malformed_json() {
    let (status, body) = post_json("/api/v1/verify-and-attest", "{\"did\":").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
    assert_eq!(body["status"], "failed");
    assert_eq!(body["errorKind"], "format");
    assert_eq!(body["details"]["stage"], "request");
    assert!(body["elapsedMs"].is_u64());
}

#[tokio::test]
async fn test_verify_and_attest_missing_field_is_a_report() {
    let request = json!({
        "did": "did:web:example.com",
        "requiredSchemas": ["domain-ownership"]
    });
    let (status, body) = post_json("/api/v1/verify-and-attest", &request.to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
    assert_eq!(body["errorKind"], "format");
    assert!(body["error"].as_str().unwrap().contains("connectedAddress"));
    assert!(body["attestations"].is_object());
    assert!(body["elapsedMs"].is_u64());
}
