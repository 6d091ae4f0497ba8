//! Service endpoints over a real socket

mod common;

use common::{client, test_config, Origin, RunningProxy};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

#[tokio::test]
async fn test_health_reports_uptime_and_version() {
    let proxy = RunningProxy::start(test_config()).await;

    let response = client().get(proxy.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["uptime"].as_str().unwrap().ends_with('s'));
}

#[tokio::test]
async fn test_config_summary_never_contains_the_key() {
    let proxy = RunningProxy::start(test_config()).await;

    let text = client().get(proxy.url("/api/config")).send().await.unwrap().text().await.unwrap();
    assert!(!text.contains("integration-test-key"));

    let body: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["urlEncoding"]["scheme"], "base64");
    assert_eq!(body["features"]["rateLimit"], false);
    assert_eq!(body["proxy"]["timeout"], 2_000);
}

#[tokio::test]
async fn test_preflight_is_answered_without_routing() {
    let proxy = RunningProxy::start(test_config()).await;

    let response = client().request(Method::OPTIONS, proxy.url("/proxy/anything")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers()["access-control-max-age"], "86400");
    assert!(response.headers()["access-control-allow-methods"].to_str().unwrap().contains("DELETE"));
}

#[tokio::test]
async fn test_unknown_path_and_wrong_method() {
    let proxy = RunningProxy::start(test_config()).await;

    let missing = client().get(proxy.url("/nope")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let wrong = client().post(proxy.url("/health")).send().await.unwrap();
    assert_eq!(wrong.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_blocklist_entries_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.blocklist.path = Some(dir.path().join("blocklist.json"));

    {
        let proxy = RunningProxy::start(config.clone()).await;
        let response = client()
            .post(proxy.url("/api/blocklist"))
            .json(&json!({"type": "domain", "value": "tracker.test", "reason": "telemetry"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let blocked = client().get(proxy.proxy_url("https://cdn.tracker.test/a.js")).send().await.unwrap();
        assert_eq!(blocked.status(), StatusCode::FORBIDDEN);
    }

    let proxy = RunningProxy::start(config).await;
    let listed: Value =
        client().get(proxy.url("/api/blocklist")).send().await.unwrap().json().await.unwrap();
    assert_eq!(listed["count"], 1);
    assert_eq!(listed["entries"][0]["value"], "tracker.test");
    assert_eq!(listed["entries"][0]["reason"], "telemetry");

    let removed: Value = client()
        .delete(proxy.url("/api/blocklist?value=tracker.test"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(removed["removed"], 1);
}

#[tokio::test]
async fn test_stats_track_cache_activity() {
    let origin = Origin::start(Duration::ZERO).await;
    let proxy = RunningProxy::start(test_config()).await;
    let url = proxy.proxy_url(&origin.url("/"));

    client().get(&url).send().await.unwrap();
    client().get(&url).send().await.unwrap();

    let stats: Value = client().get(proxy.url("/api/stats")).send().await.unwrap().json().await.unwrap();
    assert_eq!(stats["cache"]["hits"], 1);
    assert_eq!(stats["cache"]["misses"], 1);
    assert_eq!(stats["cache"]["size"], 1);
    assert_eq!(stats["blocklist"]["customEntries"], 0);
    assert!(stats["rateLimit"].is_null());
}
