//! Server-level tests: health endpoint, filesystem origin end to end,
//! and graceful shutdown.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use url::Url;

use understudy::config::model::Config;
use understudy::engine::classify::UnservedCodes;
use understudy::health::HealthResponse;
use understudy::origin::FsOrigin;
use understudy::server::{self, AppState, Stats};

fn temp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{prefix}-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn make_state(upstream: &str, origin_root: PathBuf) -> Arc<AppState> {
    let upstream = Url::parse(upstream).unwrap();
    let config = Config::from_required(upstream.to_string(), origin_root.clone());
    Arc::new(AppState {
        upstream,
        spool_dir: std::env::temp_dir(),
        server_name: None,
        unserved: UnservedCodes::classify_default(),
        probe_unserved: UnservedCodes::probe_default(),
        timeout: Duration::from_secs(5),
        origin: Arc::new(FsOrigin::new(origin_root)),
        http_client: server::build_http_client(),
        start_time: Instant::now(),
        stats: Stats::new(),
        config: Arc::new(config),
    })
}

async fn spawn_server(state: Arc<AppState>) -> (std::net::SocketAddr, tokio::sync::oneshot::Sender<()>) {
    let router = server::build_router(state, 1024 * 1024);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = rx.await;
            })
            .await
            .unwrap();
    });
    (addr, tx)
}

#[tokio::test]
async fn health_endpoint_reports_state() {
    let root = temp_dir("understudy-health");
    let state = make_state("http://fallback.example.com", root);
    let (addr, _shutdown) = spawn_server(state).await;

    let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);

    let health: HealthResponse = resp.json().await.unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
    assert_eq!(health.upstream, "http://fallback.example.com/");
    assert_eq!(health.stats.requests_served, 0);
    assert_eq!(health.stats.requests_forwarded, 0);
    assert_eq!(health.stats.requests_failed, 0);
}

#[tokio::test]
async fn filesystem_origin_serves_and_counts() {
    let root = temp_dir("understudy-fs");
    std::fs::write(root.join("hello.html"), "<h1>hi</h1>").unwrap();

    let state = make_state("http://fallback.example.com", root);
    let (addr, _shutdown) = spawn_server(state).await;

    let resp = reqwest::get(format!("http://{addr}/hello.html"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "text/html");
    assert!(resp.headers().contains_key("last-modified"));
    assert_eq!(resp.text().await.unwrap(), "<h1>hi</h1>");

    let health: HealthResponse = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health.stats.requests_served, 1);
}

#[tokio::test]
async fn unreachable_upstream_is_a_bad_gateway() {
    let root = temp_dir("understudy-unreachable");
    // Port 9 (discard) refuses connections; the probe misses locally
    // so the request must forward, and the failed forward maps to 502.
    let state = make_state("http://127.0.0.1:9", root);
    let (addr, _shutdown) = spawn_server(state).await;

    let resp = reqwest::get(format!("http://{addr}/missing"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);

    let health: HealthResponse = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health.stats.requests_failed, 1);
}

#[tokio::test]
async fn graceful_shutdown_completes() {
    let root = temp_dir("understudy-shutdown");
    let state = make_state("http://fallback.example.com", root);

    let router = server::build_router(state, 1024 * 1024);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = rx.await;
            })
            .await
    });

    let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);

    tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not shut down in time")
        .unwrap();
    assert!(result.is_ok());
}
