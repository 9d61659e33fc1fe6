//! Driver and router wired together, as the binary does it.

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use packetflow_core::test_utils::reference_simulation;
use packetflow_server::driver::{self, Shutdown};
use packetflow_server::http::{AppState, router};
use std::time::Duration;
use tower::ServiceExt;

async fn get_json(app: axum::Router, uri: &str) -> serde_json::Value {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn pull_api_tracks_running_driver() {
    let handle = driver::spawn(
        reference_simulation(11),
        Duration::from_millis(5),
        Shutdown::new(),
    );
    let app = router(AppState::from_driver(&handle));

    let before = get_json(app.clone(), "/api/snapshot").await;
    assert_eq!(before["tick"], 0);

    let mut latest = handle.latest_receiver();
    tokio::time::timeout(Duration::from_secs(5), latest.wait_for(|s| s.tick >= 3))
        .await
        .unwrap()
        .unwrap();

    let after = get_json(app.clone(), "/api/snapshot").await;
    assert!(after["tick"].as_u64().unwrap() >= 3);
    let queues: f64 = after["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["queue"].as_f64().unwrap())
        .sum();
    assert!(queues >= 0.0);

    let nodes = get_json(app, "/api/nodes").await;
    assert_eq!(nodes.as_array().unwrap().len(), 5);

    let sim = handle.stop().await.unwrap();
    assert!(sim.tick() >= 3);
}
