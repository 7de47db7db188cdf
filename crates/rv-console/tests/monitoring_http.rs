use axum::{http::StatusCode, routing::get, Json, Router};
use rv_console::{AlertPoller, HttpMonitoringApi, MonitoringApi, PollError};
use serde_json::json;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use url::Url;

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

fn monitoring_router() -> Router {
    Router::new()
        .route(
            "/api/v1/uav/swarm-status",
            get(|| async {
                Json(json!({
                    "active_uavs": 8,
                    "total_uavs": 12,
                    "total_mapping_completion": 0.42,
                    "lga_progress": {"Ikeja": 90.0, "Surulere": 15.0}
                }))
            }),
        )
        .route(
            "/api/v1/uav/critical-alerts",
            get(|| async {
                Json(json!([{
                    "lga": "Ikeja",
                    "issue": "Pothole cluster on Obafemi Awolowo Way",
                    "recommended_action": "Dispatch repair unit",
                    "timestamp": 1718000000.5,
                    "severity": "CRITICAL"
                }]))
            }),
        )
}

fn api_for(addr: SocketAddr) -> HttpMonitoringApi {
    let base = Url::parse(&format!("http://{addr}/api/v1")).expect("url");
    HttpMonitoringApi::new(base, Duration::from_secs(2)).expect("client")
}

#[tokio::test]
async fn reads_swarm_status_and_alerts() {
    let api = api_for(serve(monitoring_router()).await);

    let status = api.swarm_status().await.expect("status");
    assert_eq!(status.active_uavs, 8);
    assert_eq!(status.lga_progress.get("Ikeja"), Some(&90.0));
    assert!((status.mapping_percent() - 42.0).abs() < 1e-9);

    let alerts = api.critical_alerts().await.expect("alerts");
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity.as_deref(), Some("CRITICAL"));
}

#[tokio::test]
async fn non_success_status_and_bad_bodies_are_poll_errors() {
    let app = Router::new()
        .route(
            "/api/v1/uav/swarm-status",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
        )
        .route(
            "/api/v1/uav/critical-alerts",
            get(|| async { Json(json!({"unexpected": true})) }),
        );
    let api = api_for(serve(app).await);

    match api.swarm_status().await {
        Err(PollError::Status { status, .. }) => assert_eq!(status, 503),
        other => panic!("expected status error, got {other:?}"),
    }
    assert!(matches!(
        api.critical_alerts().await,
        Err(PollError::Decode { .. })
    ));
}

#[tokio::test]
async fn unreachable_api_is_a_request_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    assert!(matches!(
        api_for(addr).swarm_status().await,
        Err(PollError::Request { .. })
    ));
}

#[tokio::test]
async fn poller_publishes_snapshots_from_the_api() {
    let api = Arc::new(api_for(serve(monitoring_router()).await));
    let poller = AlertPoller::new();
    let mut revisions = poller.subscribe();
    poller.start(api, Duration::from_millis(50));

    tokio::time::timeout(Duration::from_secs(5), revisions.changed())
        .await
        .expect("cycle before timeout")
        .expect("poller alive");
    let snapshot = poller.snapshot();
    assert_eq!(snapshot.status.map(|s| s.total_uavs), Some(12));
    assert!(!snapshot.alerts.is_empty());

    tokio::time::timeout(Duration::from_secs(5), revisions.changed())
        .await
        .expect("second cycle before timeout")
        .expect("poller alive");
    let snapshot = poller.snapshot();
    assert!(snapshot.alerts.len() >= 2);
    assert!(snapshot.alerts.len() <= 5);
    assert!(snapshot.applied_cycles >= 2);
    poller.stop();
}
