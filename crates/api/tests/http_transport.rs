use axum::body::Body;
use axum::http::{Request, StatusCode};
use janusd_api::{build_router, state::AppState};
use janusd_config::{JanusSettings, ServerSettings, Settings};
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_settings() -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
        },
        janus: JanusSettings {
            admin_secret: None,
            server_name: "test-gateway".into(),
            version: 1000,
            version_string: "1.0.0".into(),
            idle_timeout_secs: 60,
        },
    }
}

async fn post_json(app: &axum::Router, body: Value) -> Value {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn http_create_session_and_ping() {
    let app = build_router(AppState::new(test_settings()));

    let created = post_json(&app, json!({"janus": "create", "transaction": "t1"})).await;
    assert_eq!(created["janus"], "success");
    let session_id = created["data"]["id"].as_u64().unwrap();
    assert_ne!(session_id, 0);

    let pong = post_json(&app, json!({"janus": "ping", "transaction": "t2"})).await;
    assert_eq!(pong["janus"], "pong");

    let info = post_json(&app, json!({"janus": "info", "transaction": "t3"})).await;
    assert_eq!(info["janus"], "server_info");
    assert_eq!(info["name"], "test-gateway");
}

#[tokio::test]
async fn http_health_check() {
    let app = build_router(AppState::new(test_settings()));
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn http_join_returns_async_event_error() {
    let app = build_router(AppState::new(test_settings()));

    let created = post_json(&app, json!({"janus": "create", "transaction": "t1"})).await;
    let session_id = created["data"]["id"].as_u64().unwrap();

    let attached = post_json(
        &app,
        json!({
            "janus": "attach",
            "transaction": "t2",
            "session_id": session_id,
            "plugin": "janus.plugin.videoroom",
        }),
    )
    .await;
    let handle_id = attached["data"]["id"].as_u64().unwrap();

    let room_created = post_json(
        &app,
        json!({
            "janus": "message",
            "transaction": "t3",
            "session_id": session_id,
            "handle_id": handle_id,
            "body": {"request": "create"},
        }),
    )
    .await;
    let room_id = room_created["plugindata"]["data"]["room"].as_u64().unwrap();

    let pub_attached = post_json(
        &app,
        json!({
            "janus": "attach",
            "transaction": "t4",
            "session_id": session_id,
            "plugin": "janus.plugin.videoroom",
        }),
    )
    .await;
    let pub_handle_id = pub_attached["data"]["id"].as_u64().unwrap();

    // `join` is ack-then-reply: over HTTP there is no connection left to
    // carry the early ack, so this must surface as a transport error.
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "janus": "message",
                        "transaction": "t5",
                        "session_id": session_id,
                        "handle_id": pub_handle_id,
                        "body": {"request": "join", "ptype": "publisher", "room": room_id},
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], 512);
}

#[tokio::test]
async fn http_malformed_json_returns_error_envelope() {
    let app = build_router(AppState::new(test_settings()));
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("content-type", "application/json")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
