use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::json;

use stockledger_api::app::{build_app, services::build_services};
use stockledger_infra::LedgerConfig;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, bound to an ephemeral port.
        let services = build_services(LedgerConfig::default()).expect("failed to open ledger");
        let app = build_app(Arc::new(services));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn register(client: &reqwest::Client, srv: &TestServer, sku: &str, threshold: i64) {
    let res = client
        .put(srv.url(&format!("/products/{sku}")))
        .json(&json!({ "name": "Widget", "reorder_threshold": threshold }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_issues_over_http_never_oversell() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    register(&client, &srv, "A", 0).await;

    let res = client
        .post(srv.url("/movements"))
        .json(&json!({ "sku": "A", "kind": "in", "quantity": 40, "unit_cost": "1.00", "actor": "dock" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let issue = |picker: &'static str| {
        let client = client.clone();
        let url = srv.url("/movements");
        tokio::spawn(async move {
            client
                .post(url)
                .json(&json!({ "sku": "A", "kind": "out", "quantity": 30, "actor": picker }))
                .send()
                .await
                .unwrap()
        })
    };

    let (a, b) = tokio::join!(issue("picker-1"), issue("picker-2"));
    let mut statuses = vec![a.unwrap().status(), b.unwrap().status()];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::UNPROCESSABLE_ENTITY]);

    let position: serde_json::Value = client
        .get(srv.url("/positions/A"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(position["quantity"], 10);
}

#[tokio::test]
async fn committed_movements_are_streamed_to_subscribers() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    register(&client, &srv, "A", 5).await;

    let mut stream = client.get(srv.url("/stream")).send().await.unwrap();
    assert_eq!(stream.status(), StatusCode::OK);

    let res = client
        .post(srv.url("/movements"))
        .json(&json!({ "sku": "A", "kind": "in", "quantity": 2, "unit_cost": "3.00", "actor": "dock" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let mut seen = String::new();
    let deadline = std::time::Duration::from_secs(5);
    while !(seen.contains("movement_recorded") && seen.contains("alert_raised")) {
        let chunk = tokio::time::timeout(deadline, stream.chunk())
            .await
            .expect("no ledger event streamed in time")
            .unwrap()
            .expect("stream closed");
        seen.push_str(&String::from_utf8_lossy(&chunk));
    }
    assert!(seen.contains("\"stream_id\":\"A\""));
}
