//! End-to-end tests over a running gateway instance.

use serde_json::Value;

mod common;
use common::{spawn_gateway, test_config};

#[tokio::test]
async fn health_reports_status_and_skipped_datastore() {
    let addr = spawn_gateway(test_config()).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("http://{addr}/api/health"))
        .send()
        .await
        .expect("gateway unreachable");

    // 503 only when the host itself is critical
    assert!(response.status() == 200 || response.status() == 503);
    assert_eq!(response.headers()["cache-control"], "no-store");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert!(response.headers().contains_key("x-request-id"));

    let body: Value = response.json().await.unwrap();
    assert!(matches!(
        body["status"].as_str().unwrap(),
        "healthy" | "warning" | "critical"
    ));
    assert_eq!(body["datastore"], "skipped");
    assert!(body["metrics"]["memory"]["total_bytes"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn deep_probe_failure_flips_datastore_not_status() {
    let mut config = test_config();
    // nothing listens on the discard port, so the probe fails fast
    config.health.probe_url = Some("http://127.0.0.1:9/health".into());
    config.health.probe_timeout_secs = 1;
    let addr = spawn_gateway(config).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("http://{addr}/api/health?deep=1"))
        .send()
        .await
        .unwrap();

    let status = response.status();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["datastore"], "error");
    // the status tracks host classification, never the probe outcome
    let expected = if body["status"] == "critical" { 503 } else { 200 };
    assert_eq!(status, expected);
}

#[tokio::test]
async fn metrics_requires_bearer_token() {
    let addr = spawn_gateway(test_config()).await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/api/metrics");

    let unauthorized = client.get(&url).send().await.unwrap();
    assert_eq!(unauthorized.status(), 401);
    let body: Value = unauthorized.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");

    let wrong = client.get(&url).bearer_auth("nope").send().await.unwrap();
    assert_eq!(wrong.status(), 401);

    let authorized = client
        .get(&url)
        .bearer_auth("test-secret")
        .send()
        .await
        .unwrap();
    assert_eq!(authorized.status(), 200);
    let body: Value = authorized.json().await.unwrap();
    assert_eq!(body["window_seconds"], 300);
    assert!(body["buffer"]["max_samples"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn metrics_counts_observed_requests() {
    let addr = spawn_gateway(test_config()).await;
    let client = reqwest::Client::new();

    for _ in 0..3 {
        client
            .get(format!("http://{addr}/api/health"))
            .send()
            .await
            .unwrap();
    }

    let body: Value = client
        .get(format!("http://{addr}/api/metrics?window=60"))
        .bearer_auth("test-secret")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(body["totals"]["count"].as_u64().unwrap() >= 3);
    let routes = body["by_route"].as_array().unwrap();
    assert!(routes
        .iter()
        .any(|r| r["path"] == "/api/health" && r["method"] == "GET"));
    assert_eq!(body["window_seconds"], 60);
}

#[tokio::test]
async fn origin_enforcement_matrix() {
    let mut config = test_config();
    config.security.allowed_origins = vec!["https://a.com".into()];
    let addr = spawn_gateway(config).await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/api/widgets");

    // mutating + disallowed origin → 403 envelope
    let blocked = client
        .post(&url)
        .header("origin", "https://evil.com")
        .send()
        .await
        .unwrap();
    assert_eq!(blocked.status(), 403);
    let body: Value = blocked.json().await.unwrap();
    assert_eq!(body["error"], "forbidden_origin");

    // mutating + allowed origin → passes through to the fallback
    let allowed = client
        .post(&url)
        .header("origin", "https://a.com")
        .send()
        .await
        .unwrap();
    assert_eq!(allowed.status(), 404);

    // mutating without an Origin header → never blocked
    let no_origin = client.post(&url).send().await.unwrap();
    assert_eq!(no_origin.status(), 404);

    // reads are never checked
    let read = client
        .get(&url)
        .header("origin", "https://evil.com")
        .send()
        .await
        .unwrap();
    assert_eq!(read.status(), 404);
}

#[tokio::test]
async fn rate_limit_rejects_with_retry_after() {
    let mut config = test_config();
    config.rate_limit.default_max = 3;
    let addr = spawn_gateway(config).await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/api/widgets");

    for _ in 0..3 {
        let response = client.get(&url).send().await.unwrap();
        assert_eq!(response.status(), 404); // under quota, reaches fallback
    }

    let limited = client.get(&url).send().await.unwrap();
    assert_eq!(limited.status(), 429);
    let retry_after: u64 = limited.headers()["retry-after"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after >= 1);
    let body: Value = limited.json().await.unwrap();
    assert_eq!(body["error"], "rate_limited");
}

#[tokio::test]
async fn health_is_exempt_from_rate_limiting() {
    let mut config = test_config();
    config.rate_limit.default_max = 1;
    let addr = spawn_gateway(config).await;
    let client = reqwest::Client::new();

    for _ in 0..5 {
        let response = client
            .get(format!("http://{addr}/api/health"))
            .send()
            .await
            .unwrap();
        assert_ne!(response.status(), 429);
    }
}

#[tokio::test]
async fn route_groups_share_a_quota_bucket() {
    let mut config = test_config();
    config.rate_limit.default_max = 2;
    let addr = spawn_gateway(config).await;
    let client = reqwest::Client::new();

    // different job ids, same /api/jobs/* bucket
    let first = client
        .get(format!("http://{addr}/api/jobs/42"))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 404);
    let second = client
        .get(format!("http://{addr}/api/jobs/99"))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 404);
    let third = client
        .get(format!("http://{addr}/api/jobs/7"))
        .send()
        .await
        .unwrap();
    assert_eq!(third.status(), 429);
}

#[tokio::test]
async fn hsts_only_when_forwarded_https() {
    let addr = spawn_gateway(test_config()).await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/api/health");

    let plain = client.get(&url).send().await.unwrap();
    assert!(!plain.headers().contains_key("strict-transport-security"));

    let forwarded = client
        .get(&url)
        .header("x-forwarded-proto", "https")
        .send()
        .await
        .unwrap();
    assert!(forwarded.headers().contains_key("strict-transport-security"));
}
