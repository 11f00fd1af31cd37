use janusd_config::{JanusSettings, ServerSettings, Settings};
use janusd_core::dispatch::Dispatcher;
use janusd_core::media::MemoryMediaEngine;
use serde_json::{json, Value};

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

fn new_dispatcher() -> Dispatcher {
    Dispatcher::new(Box::new(MemoryMediaEngine::new()), test_settings())
}

async fn create_session(d: &Dispatcher) -> u64 {
    let reply = d
        .dispatch(&json!({"janus": "create", "transaction": "t1"}), 1)
        .await;
    reply.reply["data"]["id"].as_u64().unwrap()
}

async fn attach(d: &Dispatcher, session_id: u64, transaction: &str) -> u64 {
    let reply = d
        .dispatch(
            &json!({
                "janus": "attach",
                "transaction": transaction,
                "session_id": session_id,
                "plugin": "janus.plugin.videoroom",
            }),
            1,
        )
        .await;
    reply.reply["data"]["id"].as_u64().unwrap()
}

async fn message(
    d: &Dispatcher,
    session_id: u64,
    handle_id: u64,
    transaction: &str,
    body: Value,
    jsep: Option<Value>,
) -> janusd_core::Dispatched {
    let mut req = json!({
        "janus": "message",
        "transaction": transaction,
        "session_id": session_id,
        "handle_id": handle_id,
        "body": body,
    });
    if let Some(jsep) = jsep {
        req["jsep"] = jsep;
    }
    d.dispatch(&req, 1).await
}

#[tokio::test]
async fn session_create_then_ping() {
    let d = new_dispatcher();
    let session_id = create_session(&d).await;
    assert_ne!(session_id, 0);

    let pong = d.dispatch(&json!({"janus": "ping", "transaction": "t2"}), 1).await;
    assert_eq!(pong.reply["janus"], "pong");
    assert_eq!(pong.reply["transaction"], "t2");
}

#[tokio::test]
async fn attach_rejects_unsupported_plugin() {
    let d = new_dispatcher();
    let session_id = create_session(&d).await;
    let reply = d
        .dispatch(
            &json!({
                "janus": "attach",
                "session_id": session_id,
                "plugin": "janus.plugin.sip",
                "transaction": "t3",
            }),
            1,
        )
        .await;
    assert_eq!(reply.reply["janus"], "error");
    assert_eq!(reply.reply["error"]["code"], 460);
}

#[tokio::test]
async fn create_room_then_publisher_join_and_configure() {
    let d = new_dispatcher();
    let session_id = create_session(&d).await;
    let handle_id = attach(&d, session_id, "t-attach").await;

    let created = message(
        &d,
        session_id,
        handle_id,
        "t-create",
        json!({"request": "create", "publishers": 4}),
        None,
    )
    .await;
    assert!(created.ack.is_none(), "create is not ack-then-reply");
    assert_eq!(created.reply["plugindata"]["data"]["videoroom"], "created");
    let room_id = created.reply["plugindata"]["data"]["room"].as_u64().unwrap();

    let pub_handle = attach(&d, session_id, "t-attach2").await;
    let joined = message(
        &d,
        session_id,
        pub_handle,
        "t-join",
        json!({"request": "join", "ptype": "publisher", "room": room_id}),
        None,
    )
    .await;
    assert!(joined.ack.is_some(), "join must ack before replying");
    assert_eq!(joined.reply["plugindata"]["data"]["videoroom"], "joined");
    let feed_id = joined.reply["plugindata"]["data"]["id"].as_u64().unwrap();
    assert_ne!(feed_id, 0);
    assert_eq!(
        joined.reply["plugindata"]["data"]["publishers"]
            .as_array()
            .unwrap()
            .len(),
        0
    );

    let configured = message(
        &d,
        session_id,
        pub_handle,
        "t-configure",
        json!({"request": "configure", "room": room_id, "feed": feed_id}),
        Some(json!({"type": "offer", "sdp": "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\ns=-\r\n"})),
    )
    .await;
    assert!(configured.ack.is_some());
    assert_eq!(configured.reply["plugindata"]["data"]["configured"], "ok");
    assert_eq!(configured.reply["jsep"]["type"], "answer");
}

#[tokio::test]
async fn subscriber_join_then_start() {
    let d = new_dispatcher();
    let session_id = create_session(&d).await;
    let ctrl_handle = attach(&d, session_id, "t-attach").await;

    let created = message(
        &d,
        session_id,
        ctrl_handle,
        "t-create",
        json!({"request": "create"}),
        None,
    )
    .await;
    let room_id = created.reply["plugindata"]["data"]["room"].as_u64().unwrap();

    let pub_handle = attach(&d, session_id, "t-attach-pub").await;
    let joined = message(
        &d,
        session_id,
        pub_handle,
        "t-join-pub",
        json!({"request": "join", "ptype": "publisher", "room": room_id}),
        None,
    )
    .await;
    let feed_id = joined.reply["plugindata"]["data"]["id"].as_u64().unwrap();

    message(
        &d,
        session_id,
        pub_handle,
        "t-configure",
        json!({"request": "configure", "room": room_id, "feed": feed_id}),
        Some(json!({"type": "offer", "sdp": "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\ns=-\r\n"})),
    )
    .await;

    let sub_handle = attach(&d, session_id, "t-attach-sub").await;
    let attached = message(
        &d,
        session_id,
        sub_handle,
        "t-join-sub",
        json!({"request": "join", "ptype": "subscriber", "room": room_id, "feed": feed_id}),
        None,
    )
    .await;
    assert!(attached.ack.is_some());
    assert_eq!(attached.reply["plugindata"]["data"]["videoroom"], "attached");
    assert_eq!(attached.reply["jsep"]["type"], "offer");

    let started = message(
        &d,
        session_id,
        sub_handle,
        "t-start",
        json!({"request": "start", "room": room_id, "feed": feed_id}),
        Some(json!({"type": "answer", "sdp": "v=0\r\no=- 2 1 IN IP4 0.0.0.0\r\ns=-\r\n"})),
    )
    .await;
    assert!(started.ack.is_some());
    assert_eq!(started.reply["plugindata"]["data"]["started"], "ok");
}

#[tokio::test]
async fn destroy_room_then_join_fails() {
    let d = new_dispatcher();
    let session_id = create_session(&d).await;
    let handle_id = attach(&d, session_id, "t-attach").await;

    let created = message(
        &d,
        session_id,
        handle_id,
        "t-create",
        json!({"request": "create"}),
        None,
    )
    .await;
    let room_id = created.reply["plugindata"]["data"]["room"].as_u64().unwrap();

    let destroyed = message(
        &d,
        session_id,
        handle_id,
        "t-destroy",
        json!({"request": "destroy", "room": room_id}),
        None,
    )
    .await;
    assert_eq!(destroyed.reply["plugindata"]["data"]["videoroom"], "destroyed");

    let other_handle = attach(&d, session_id, "t-attach2").await;
    let join_after_destroy = message(
        &d,
        session_id,
        other_handle,
        "t-join",
        json!({"request": "join", "ptype": "publisher", "room": room_id}),
        None,
    )
    .await;
    assert_eq!(join_after_destroy.reply["janus"], "error");
    assert_eq!(join_after_destroy.reply["error"]["code"], 426);
}

#[tokio::test]
async fn trickle_without_matching_media_fails() {
    let d = new_dispatcher();
    let session_id = create_session(&d).await;
    let handle_id = attach(&d, session_id, "t-attach").await;

    let created = message(
        &d,
        session_id,
        handle_id,
        "t-create",
        json!({"request": "create"}),
        None,
    )
    .await;
    let room_id = created.reply["plugindata"]["data"]["room"].as_u64().unwrap();

    message(
        &d,
        session_id,
        handle_id,
        "t-join",
        json!({"request": "join", "ptype": "publisher", "room": room_id}),
        None,
    )
    .await;
    message(
        &d,
        session_id,
        handle_id,
        "t-configure",
        json!({"request": "configure", "room": room_id, "feed": 0}),
        Some(json!({"type": "offer", "sdp": "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\ns=-\r\n"})),
    )
    .await;

    let reply = d
        .dispatch(
            &json!({
                "janus": "trickle",
                "transaction": "t-trickle",
                "session_id": session_id,
                "handle_id": handle_id,
                "candidate": { "candidate": "candidate:1 1 UDP 1 1.2.3.4 9 typ host", "sdpMLineIndex": 99 },
            }),
            1,
        )
        .await;
    assert_eq!(reply.reply["janus"], "error");
    assert_eq!(reply.reply["error"]["code"], 466);
}

#[tokio::test]
async fn every_reply_echoes_transaction() {
    let d = new_dispatcher();
    for (command, extra) in [
        ("ping", json!({})),
        ("create", json!({})),
    ] {
        let mut req = json!({"janus": command, "transaction": "echo-me"});
        for (k, v) in extra.as_object().unwrap() {
            req[k] = v.clone();
        }
        let reply = d.dispatch(&req, 1).await;
        assert_eq!(reply.reply["transaction"], "echo-me");
    }
}
