use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{ProtocolError, ProtocolResult};
use crate::ids::Identifier;
use crate::media::{MediaEngine, MediaFlags};
use crate::registry::Registry;
use crate::room::Room;
use crate::session::{Role, Session};

/// JSEP `{type, sdp}` envelope carried alongside `message` requests/replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jsep {
    #[serde(rename = "type")]
    pub kind: String,
    pub sdp: String,
}

/// What a videoroom operation hands back to the dispatcher: the plugin
/// data payload, and an optional JSEP to attach to the reply envelope.
pub struct PluginReply {
    pub data: Value,
    pub jsep: Option<Jsep>,
}

impl PluginReply {
    fn data_only(data: Value) -> Self {
        Self { data, jsep: None }
    }
}

fn require_u64(body: &Value, field: &'static str) -> ProtocolResult<u64> {
    body.get(field)
        .and_then(Value::as_u64)
        .ok_or(ProtocolError::MissingElement(field))
}

fn require_str<'a>(body: &'a Value, field: &'static str) -> ProtocolResult<&'a str> {
    body.get(field)
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingElement(field))
}

/// `videoroom.create`. Pre: `handle.role == None`.
pub async fn create(
    registry: &Registry,
    session: &Arc<Session>,
    handle_id: Identifier,
    body: &Value,
    engine: &dyn MediaEngine,
) -> ProtocolResult<PluginReply> {
    let already_has_role = session
        .with_handle(handle_id, |h| h.role != Role::None)
        .unwrap_or(false);
    if already_has_role {
        return Err(ProtocolError::AlreadyInRoom(0));
    }

    let max_publishers = body.get("publishers").and_then(Value::as_u64).map(|n| n as u32);
    let mut requested_room = body.get("room").and_then(Value::as_u64);

    // Room ids are reserved uniquely under the registry lock, so a
    // call_id collision here should never happen in practice; retry with
    // a fresh id anyway rather than trust that invariant blindly.
    let (room_id, call_id) = loop {
        let room_id = registry.create_room(requested_room, |id| {
            Room::new(id, session, handle_id, max_publishers)
        });
        let call_id = format!("janus {}", room_id);
        match engine.call_get_or_create(&call_id, true).await {
            Ok(()) => break (room_id, call_id),
            Err(_) => {
                registry.remove_room(room_id);
                requested_room = None;
            }
        }
    };

    session.with_handle(handle_id, |h| {
        h.role = Role::Controlling;
        h.room_id = room_id;
    });

    debug!(room_id, call_id, "videoroom room created");

    Ok(PluginReply::data_only(json!({
        "videoroom": "created",
        "room": room_id,
        "permanent": false,
    })))
}

/// `videoroom.destroy`. Pre: caller's session controls the room.
pub async fn destroy(
    registry: &Registry,
    session: &Arc<Session>,
    body: &Value,
    engine: &dyn MediaEngine,
) -> ProtocolResult<PluginReply> {
    let room_id = require_u64(body, "room")?;

    let call_id = registry
        .with_room(room_id, |room| {
            if room.is_controlled_by(session) {
                Some(room.call_id.clone())
            } else {
                None
            }
        })
        .flatten()
        .ok_or(ProtocolError::NoSuchRoom(room_id))?;

    let room = registry.remove_room(room_id);
    for feed_id in room.iter().flat_map(|r| r.publishers.values()) {
        registry.remove_feed(*feed_id);
    }
    engine.call_destroy(&call_id).await?;

    debug!(room_id, "videoroom room destroyed");

    Ok(PluginReply::data_only(json!({
        "videoroom": "destroyed",
        "room": room_id,
    })))
}

fn parse_ptype(raw: &str) -> ProtocolResult<Role> {
    match raw {
        "publisher" => Ok(Role::Publisher),
        "subscriber" | "listener" => Ok(Role::Subscriber),
        other => Err(ProtocolError::InvalidPtype(other.to_string())),
    }
}

/// `videoroom.join`. The dispatcher is expected to have already sent the
/// early ack (see `dispatch::Dispatcher`) before calling this.
pub async fn join(
    registry: &Registry,
    session: &Arc<Session>,
    handle_id: Identifier,
    body: &Value,
    engine: &dyn MediaEngine,
) -> ProtocolResult<PluginReply> {
    let ptype = parse_ptype(require_str(body, "ptype")?)?;
    let room_id = require_u64(body, "room")?;

    let current_role = session
        .with_handle(handle_id, |h| h.role)
        .ok_or(ProtocolError::Unhandled("no such handle".into()))?;
    if current_role != Role::None {
        return Err(ProtocolError::AlreadyInRoom(room_id));
    }

    let call_id = registry
        .with_room(room_id, |room| {
            if room.is_controlled_by(session) {
                Some(room.call_id.clone())
            } else {
                None
            }
        })
        .flatten()
        .ok_or(ProtocolError::NoSuchRoom(room_id))?;

    match ptype {
        Role::Publisher => {
            let (feed_id, other_feeds) = registry
                .insert_publisher(room_id, handle_id)
                .ok_or(ProtocolError::NoSuchRoom(room_id))?;

            session.with_handle(handle_id, |h| {
                h.role = Role::Publisher;
                h.room_id = room_id;
            });

            Ok(PluginReply::data_only(json!({
                "videoroom": "joined",
                "room": room_id,
                "id": feed_id,
                "publishers": other_feeds,
            })))
        }
        Role::Subscriber => {
            let feed_id = require_u64(body, "feed")?;

            let publisher_handle_id = registry
                .lookup_feed(feed_id)
                .ok_or_else(|| ProtocolError::Internal(format!("no such feed {feed_id}")))?;

            let publisher_present = registry
                .with_room(room_id, |room| room.publishers.contains_key(&publisher_handle_id))
                .unwrap_or(false);
            if !publisher_present {
                return Err(ProtocolError::Internal(format!(
                    "feed {feed_id} not published in room {room_id}"
                )));
            }

            registry.with_room_mut(room_id, |room| {
                room.subscribers.insert(handle_id, feed_id);
            });

            let rollback = || {
                registry.with_room_mut(room_id, |room| {
                    room.subscribers.remove(&handle_id);
                });
            };

            let source_ml = match engine.monologue_get(&call_id, &publisher_handle_id.to_string()).await {
                Some(ml) => ml,
                None => {
                    rollback();
                    return Err(ProtocolError::Internal(format!(
                        "no monologue for publisher handle {publisher_handle_id}"
                    )));
                }
            };
            let dest_ml = engine
                .monologue_get_or_create(&call_id, &handle_id.to_string())
                .await;

            let flags = MediaFlags {
                audio: true,
                video: true,
            };

            if let Err(e) = engine
                .monologue_subscribe_request(source_ml, dest_ml, &flags)
                .await
            {
                rollback();
                return Err(e);
            }

            let parsed = crate::media::ParsedSdp {
                raw: String::new(),
                sections: Vec::new(),
            };
            let sdp_out = match engine.sdp_replace(source_ml, &parsed, dest_ml, &flags).await {
                Ok(sdp) => sdp,
                Err(e) => {
                    rollback();
                    return Err(e);
                }
            };

            session.with_handle(handle_id, |h| {
                h.role = Role::Subscriber;
                h.room_id = room_id;
            });

            Ok(PluginReply {
                data: json!({
                    "videoroom": "attached",
                    "room": room_id,
                    "id": feed_id,
                }),
                jsep: Some(Jsep {
                    kind: "offer".into(),
                    sdp: sdp_out,
                }),
            })
        }
        Role::None | Role::Controlling => unreachable!("parse_ptype never returns these"),
    }
}

/// `videoroom.configure`. Pre: handle is a publisher in `room`, carries an
/// offer.
pub async fn configure(
    registry: &Registry,
    session: &Arc<Session>,
    handle_id: Identifier,
    body: &Value,
    jsep: Option<&Jsep>,
    engine: &dyn MediaEngine,
) -> ProtocolResult<PluginReply> {
    let room_id = require_u64(body, "room")?;
    require_u64(body, "feed")?;

    let role_ok = session
        .with_handle(handle_id, |h| h.role == Role::Publisher && h.room_id == room_id)
        .unwrap_or(false);
    if !role_ok {
        return Err(ProtocolError::Internal("handle is not a publisher in this room".into()));
    }

    let jsep = jsep.ok_or(ProtocolError::MissingElement("jsep"))?;
    if jsep.kind != "offer" {
        return Err(ProtocolError::Internal("configure requires an offer".into()));
    }

    let parsed = engine.sdp_parse(&jsep.sdp)?;
    let streams = engine.sdp_streams(&parsed);

    let call_id = registry
        .with_room(room_id, |room| room.call_id.clone())
        .ok_or(ProtocolError::NoSuchRoom(room_id))?;

    let ml = engine
        .monologue_get_or_create(&call_id, &handle_id.to_string())
        .await;

    let flags = MediaFlags {
        audio: true,
        video: true,
    };
    let parsed_for_publish = crate::media::ParsedSdp {
        raw: parsed.raw.clone(),
        sections: streams.clone(),
    };
    engine.monologue_publish(ml, &parsed_for_publish, &flags).await?;

    let answer = engine.sdp_create(ml, "answer").await?;
    engine.save_last_sdp(ml, &jsep.sdp).await;

    let audio_codec = streams
        .iter()
        .find(|s| s.mid.as_deref() == Some("audio"))
        .map(|_| "opus");
    let video_codec = streams
        .iter()
        .find(|s| s.mid.as_deref() == Some("video"))
        .map(|_| "vp8");

    Ok(PluginReply {
        data: json!({
            "videoroom": "event",
            "room": room_id,
            "configured": "ok",
            "audio_codec": audio_codec,
            "video_codec": video_codec,
        }),
        jsep: Some(Jsep {
            kind: "answer".into(),
            sdp: answer,
        }),
    })
}

/// `videoroom.start`. Pre: handle is a subscriber in `room`, carries an
/// answer.
pub async fn start(
    registry: &Registry,
    session: &Arc<Session>,
    handle_id: Identifier,
    body: &Value,
    jsep: Option<&Jsep>,
    engine: &dyn MediaEngine,
) -> ProtocolResult<PluginReply> {
    let room_id = require_u64(body, "room")?;
    let feed_id = require_u64(body, "feed")?;

    let role_ok = session
        .with_handle(handle_id, |h| h.role == Role::Subscriber && h.room_id == room_id)
        .unwrap_or(false);
    if !role_ok {
        return Err(ProtocolError::Internal("handle is not a subscriber in this room".into()));
    }

    let jsep = jsep.ok_or(ProtocolError::MissingElement("jsep"))?;
    if jsep.kind != "answer" {
        return Err(ProtocolError::Internal("start requires an answer".into()));
    }

    let parsed = engine.sdp_parse(&jsep.sdp)?;
    let streams_vec = engine.sdp_streams(&parsed);
    let parsed = crate::media::ParsedSdp {
        raw: parsed.raw,
        sections: streams_vec,
    };

    let call_id = registry
        .with_room(room_id, |room| room.call_id.clone())
        .ok_or(ProtocolError::NoSuchRoom(room_id))?;

    let publisher_handle_id = registry
        .lookup_feed(feed_id)
        .ok_or_else(|| ProtocolError::Internal(format!("no such feed {feed_id}")))?;

    let source_ml = engine
        .monologue_get(&call_id, &publisher_handle_id.to_string())
        .await
        .ok_or_else(|| ProtocolError::Internal(format!("no monologue for publisher handle {publisher_handle_id}")))?;
    let dest_ml = engine
        .monologue_get(&call_id, &handle_id.to_string())
        .await
        .ok_or_else(|| ProtocolError::Internal("subscriber monologue missing".into()))?;

    let flags = MediaFlags {
        audio: true,
        video: true,
    };
    engine
        .monologue_subscribe_answer(source_ml, dest_ml, &flags, &parsed)
        .await?;

    Ok(PluginReply::data_only(json!({
        "videoroom": "event",
        "room": room_id,
        "started": "ok",
    })))
}

/// Dispatches a `videoroom` plugin message (the `body.request` field) to
/// the matching operation. `jsep` is the JSEP carried on the outer
/// `message`, if any.
pub async fn dispatch_message(
    registry: &Registry,
    session: &Arc<Session>,
    handle_id: Identifier,
    body: &Value,
    jsep: Option<&Jsep>,
    engine: &dyn MediaEngine,
) -> ProtocolResult<PluginReply> {
    let request = require_str(body, "request")?.to_string();
    match request.as_str() {
        "create" => create(registry, session, handle_id, body, engine).await,
        "destroy" => destroy(registry, session, body, engine).await,
        "join" => join(registry, session, handle_id, body, engine).await,
        "configure" => configure(registry, session, handle_id, body, jsep, engine).await,
        "start" => start(registry, session, handle_id, body, jsep, engine).await,
        other => {
            warn!(request = other, "unknown videoroom request");
            Err(ProtocolError::UnknownRequest(other.to_string()))
        }
    }
}

/// Requests that early-ack before doing their (possibly slow) work, so a
/// client sees the transaction acknowledged before the media engine call
/// completes.
pub fn needs_early_ack(request: &str) -> bool {
    matches!(request, "join" | "configure" | "start")
}
