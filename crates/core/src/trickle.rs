use std::sync::Arc;

use serde_json::Value;

use crate::error::{ProtocolError, ProtocolResult};
use crate::ids::Identifier;
use crate::media::{MediaEngine, StreamParams};
use crate::registry::Registry;
use crate::session::Session;

/// Handles a single `{candidate: {...}}` trickle body for `handle_id`,
/// which must already be joined to a room. Resolution order mirrors the
/// source exactly: try `sdpMid` first, fall back to the nth media
/// section named by `sdpMLineIndex`.
pub async fn handle(
    registry: &Registry,
    session: &Arc<Session>,
    handle_id: Identifier,
    candidate: &Value,
    engine: &dyn MediaEngine,
) -> ProtocolResult<()> {
    let room_id = session
        .with_handle(handle_id, |h| h.room_id)
        .filter(|&id| id != 0)
        .ok_or_else(|| ProtocolError::Unhandled("handle has not joined a room".into()))?;

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

    let ml = engine
        .monologue_get(&call_id, &handle_id.to_string())
        .await
        .ok_or_else(|| ProtocolError::MediaError("no monologue for this handle".into()))?;

    let raw_candidate = candidate
        .get("candidate")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingElement("candidate"))?;
    let stripped = raw_candidate
        .strip_prefix("candidate:")
        .unwrap_or(raw_candidate)
        .to_string();

    let sdp_mid = candidate.get("sdpMid").and_then(Value::as_str);
    let sdp_mline_index = candidate.get("sdpMLineIndex").and_then(Value::as_u64);

    // The media engine owns the actual section list; the stand-in always
    // reports two sections (audio, video) from `sdp_parse`, so resolve
    // against that same shape here.
    let sections = engine
        .sdp_parse("v=0\r\no=- 0 0 IN IP4 0.0.0.0\r\ns=-\r\nt=0 0\r\n")
        .map(|parsed| engine.sdp_streams(&parsed))
        .unwrap_or_default();

    let section = sdp_mid
        .and_then(|mid| sections.iter().find(|s| s.mid.as_deref() == Some(mid)))
        .or_else(|| sections.get(sdp_mline_index.unwrap_or(u64::MAX) as usize))
        .ok_or(ProtocolError::MediaError("no matching media section".into()))?;

    if !section.ice_enabled {
        return Err(ProtocolError::MediaError("media section is not ICE-enabled".into()));
    }

    let params = StreamParams {
        media_index: section.index,
        ufrag: section.ufrag.clone(),
        candidate: stripped,
    };

    engine.ice_update(ml, params).await.map_err(|e| match e {
        ProtocolError::Internal(msg) => ProtocolError::MediaError(msg),
        other => other,
    })
}
