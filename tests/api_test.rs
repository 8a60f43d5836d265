//! REST API tests driven through the router

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use ruster_audit::api::{create_router, AppState};
use ruster_audit::providers::{default_labels, RpcManager};
use ruster_audit::{AppConfig, Auditor, HeuristicsConfig, HeuristicsEngine};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> Router {
    let auditor = Auditor::with_parts(
        RpcManager::new(&AppConfig::default()),
        default_labels(),
        HeuristicsEngine::new(HeuristicsConfig::default()).unwrap(),
    );
    create_router(Arc::new(AppState::new(auditor)))
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn bundle(creator: &str) -> Value {
    json!({
        "input": {
            "chain": "ethereum",
            "contract_address": "0xtoken",
            "creation": {
                "creator": creator,
                "creation_time": "2024-01-01T00:00:00Z",
                "genesis_ordinal": 0
            },
            "events": [
                {"from": "0x0000000000000000000000000000000000000000", "to": "0xwhale",
                 "value": 900, "timestamp": "2024-01-01T01:00:00Z"},
                {"from": "0xwhale", "to": "0xother", "value": 100, "timestamp": "2024-01-01T02:00:00Z"}
            ]
        }
    })
}

#[tokio::test]
async fn test_health_is_public() {
    for uri in ["/health", "/v1/health"] {
        let request = Request::builder()
            .uri(uri)
            .header("x-api-key", "bogus")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "healthy");
    }
}

#[tokio::test]
async fn test_offline_audit() {
    let (status, body) = send(app(), post("/v1/audit", bundle("0xcreator"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["request_id"].as_str().is_some_and(|id| !id.is_empty()));
    assert_eq!(body["data"]["suspicious"], true);
    assert_eq!(body["data"]["concentration"]["total_transferred"], 1000.0);
}

#[tokio::test]
async fn test_missing_creator_is_unprocessable() {
    let (status, body) = send(app(), post("/v1/audit", bundle(""))).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "AUDIT_CREATION_INFO_UNAVAILABLE");
}

#[tokio::test]
async fn test_bad_event_does_not_reject_batch() {
    let mut body = bundle("0xcreator");
    let events = body["input"]["events"].as_array_mut().unwrap();
    events.push(json!({"from": "0xwhale", "to": "0xthird", "value": null, "timestamp": "2024-01-01T03:00:00Z"}));
    events.push(json!({"from": "0xwhale", "to": "0xfourth", "value": 5, "timestamp": 1704081600.5}));
    events.push(json!(42));

    let (status, body) = send(app(), post("/v1/audit", body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["concentration"]["total_transferred"], 1005.0);
    let malformed: Vec<u64> = body["data"]["degradations"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|d| d["condition"] == "malformed_event")
        .filter_map(|d| d["index"].as_u64())
        .collect();
    assert_eq!(malformed, vec![2, 4]);
}

#[tokio::test]
async fn test_oversized_config_window_is_bad_request() {
    let mut body = bundle("0xcreator");
    body["config"] = json!({"dump_window_days": 200_000_000, "high_frequency_max_gap_secs": i64::MAX});

    let (status, body) = send(app(), post("/v1/audit", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "CFG_INVALID_VALUE");
}

#[tokio::test]
async fn test_invalid_api_key_is_rejected() {
    let mut request = post("/v1/audit", bundle("0xcreator"));
    request
        .headers_mut()
        .insert("x-api-key", "not-a-key".parse().unwrap());

    let (status, body) = send(app(), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "API_UNAUTHORIZED");
}

#[tokio::test]
async fn test_live_audit_rejects_unknown_input() {
    let (status, body) = send(app(), post("/v1/audit/live", json!({"input": "hello world"}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "CHAIN_UNSUPPORTED");
}

#[tokio::test]
async fn test_live_audit_rejects_empty_input() {
    let (status, body) = send(app(), post("/v1/audit/live", json!({"input": "  "}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "API_BAD_REQUEST");
}

#[tokio::test]
async fn test_stats_count_audits() {
    let app = app();
    let (status, _) = send(app.clone(), post("/v1/audit", bundle("0xcreator"))).await;
    assert_eq!(status, StatusCode::OK);

    let request = Request::builder().uri("/v1/stats").body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["audits_served"], 1);
    assert_eq!(body["data"]["suspicious_findings"], 1);
    assert_eq!(body["data"]["cache"]["entries"], 0);
}
