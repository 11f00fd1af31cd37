use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;

use crate::error::ProtocolError;

/// A single media section within an SDP body (roughly: one `m=` line).
#[derive(Debug, Clone)]
pub struct MediaSection {
    pub index: usize,
    pub mid: Option<String>,
    pub ufrag: Option<String>,
    pub ice_enabled: bool,
}

/// Flags this core passes down into publish/subscribe calls. The media
/// engine is free to ignore fields it doesn't support.
#[derive(Debug, Clone, Default)]
pub struct MediaFlags {
    pub audio: bool,
    pub video: bool,
}

/// A trickle candidate resolved to a concrete media section, ready for
/// the ICE agent.
#[derive(Debug, Clone)]
pub struct StreamParams {
    pub media_index: usize,
    pub ufrag: Option<String>,
    pub candidate: String,
}

/// A parsed SDP body: its raw text plus the media sections it contains.
#[derive(Debug, Clone)]
pub struct ParsedSdp {
    pub raw: String,
    pub sections: Vec<MediaSection>,
}

/// Opaque handle to a call's monologue (one per participating handle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonologueId(pub u64);

/// The external collaborator this core drives but does not implement:
/// a call registry, per-handle monologues, an ICE agent, and an SDP
/// generator. Method names mirror the domain vocabulary (calls,
/// monologues, streams) rather than any specific media stack's API.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Gets the call for `call_id`, creating it if `must_be_new` is false
    /// and it doesn't exist. Returns an error if `must_be_new` is true and
    /// the call already exists.
    async fn call_get_or_create(&self, call_id: &str, must_be_new: bool) -> Result<(), ProtocolError>;

    async fn call_get(&self, call_id: &str) -> Result<(), ProtocolError>;

    async fn call_destroy(&self, call_id: &str) -> Result<(), ProtocolError>;

    /// Monologues are keyed by the handle id stringified — this contract
    /// must be preserved so the same engine backend can be swapped in
    /// across deployments.
    async fn monologue_get(&self, call_id: &str, handle_id: &str) -> Option<MonologueId>;

    async fn monologue_get_or_create(&self, call_id: &str, handle_id: &str) -> MonologueId;

    async fn monologue_publish(
        &self,
        ml: MonologueId,
        streams: &ParsedSdp,
        flags: &MediaFlags,
    ) -> Result<(), ProtocolError>;

    async fn monologue_subscribe_request(
        &self,
        source: MonologueId,
        dest: MonologueId,
        flags: &MediaFlags,
    ) -> Result<(), ProtocolError>;

    async fn monologue_subscribe_answer(
        &self,
        source: MonologueId,
        dest: MonologueId,
        flags: &MediaFlags,
        streams: &ParsedSdp,
    ) -> Result<(), ProtocolError>;

    fn sdp_parse(&self, sdp: &str) -> Result<ParsedSdp, ProtocolError>;

    fn sdp_streams(&self, parsed: &ParsedSdp) -> Vec<MediaSection>;

    /// Generates a fresh SDP body of `kind` ("offer"/"answer") for `ml`.
    async fn sdp_create(&self, ml: MonologueId, kind: &str) -> Result<String, ProtocolError>;

    /// Rewrites `source`'s last published SDP into an outbound offer
    /// addressed to `dest`.
    async fn sdp_replace(
        &self,
        source: MonologueId,
        parsed: &ParsedSdp,
        dest: MonologueId,
        flags: &MediaFlags,
    ) -> Result<String, ProtocolError>;

    async fn save_last_sdp(&self, ml: MonologueId, sdp: &str);

    async fn ice_update(&self, ml: MonologueId, params: StreamParams) -> Result<(), ProtocolError>;
}

struct CallState {
    monologues: DashMap<String, MonologueId>,
}

/// Deterministic in-process stand-in. Treats SDP as an opaque string,
/// "generates" a fixed two-section (audio + video) placeholder body, and
/// records the most recent trickle candidate per section. Sufficient to
/// drive every transition in this core without a real RTP/ICE stack; a
/// production deployment swaps a real implementation in behind
/// `MediaEngine`.
pub struct MemoryMediaEngine {
    calls: DashMap<String, RwLock<CallState>>,
    next_monologue: std::sync::atomic::AtomicU64,
    last_candidates: DashMap<(MonologueId, usize), String>,
}

impl MemoryMediaEngine {
    pub fn new() -> Self {
        Self {
            calls: DashMap::new(),
            next_monologue: std::sync::atomic::AtomicU64::new(1),
            last_candidates: DashMap::new(),
        }
    }

    fn next_monologue_id(&self) -> MonologueId {
        MonologueId(self.next_monologue.fetch_add(1, std::sync::atomic::Ordering::Relaxed))
    }
}

impl Default for MemoryMediaEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaEngine for MemoryMediaEngine {
    async fn call_get_or_create(&self, call_id: &str, must_be_new: bool) -> Result<(), ProtocolError> {
        if must_be_new && self.calls.contains_key(call_id) {
            return Err(ProtocolError::Internal(format!("call {call_id} already exists")));
        }
        self.calls.entry(call_id.to_string()).or_insert_with(|| {
            RwLock::new(CallState {
                monologues: DashMap::new(),
            })
        });
        Ok(())
    }

    async fn call_get(&self, call_id: &str) -> Result<(), ProtocolError> {
        if self.calls.contains_key(call_id) {
            Ok(())
        } else {
            Err(ProtocolError::Internal(format!("no such call {call_id}")))
        }
    }

    async fn call_destroy(&self, call_id: &str) -> Result<(), ProtocolError> {
        self.calls.remove(call_id);
        Ok(())
    }

    async fn monologue_get(&self, call_id: &str, handle_id: &str) -> Option<MonologueId> {
        let call = self.calls.get(call_id)?;
        let state = call.read().await;
        state.monologues.get(handle_id).map(|r| *r)
    }

    async fn monologue_get_or_create(&self, call_id: &str, handle_id: &str) -> MonologueId {
        self.call_get_or_create(call_id, false).await.ok();
        let call = self.calls.get(call_id).expect("call just created");
        let state = call.read().await;
        if let Some(existing) = state.monologues.get(handle_id) {
            return *existing;
        }
        drop(state);
        let id = self.next_monologue_id();
        let state = call.read().await;
        state.monologues.insert(handle_id.to_string(), id);
        id
    }

    async fn monologue_publish(
        &self,
        _ml: MonologueId,
        _streams: &ParsedSdp,
        _flags: &MediaFlags,
    ) -> Result<(), ProtocolError> {
        Ok(())
    }

    async fn monologue_subscribe_request(
        &self,
        _source: MonologueId,
        _dest: MonologueId,
        _flags: &MediaFlags,
    ) -> Result<(), ProtocolError> {
        Ok(())
    }

    async fn monologue_subscribe_answer(
        &self,
        _source: MonologueId,
        _dest: MonologueId,
        _flags: &MediaFlags,
        _streams: &ParsedSdp,
    ) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn sdp_parse(&self, sdp: &str) -> Result<ParsedSdp, ProtocolError> {
        if sdp.trim().is_empty() {
            return Err(ProtocolError::Internal("empty SDP body".into()));
        }
        Ok(ParsedSdp {
            raw: sdp.to_string(),
            sections: vec![
                MediaSection {
                    index: 0,
                    mid: Some("audio".into()),
                    ufrag: Some("ufrg".into()),
                    ice_enabled: true,
                },
                MediaSection {
                    index: 1,
                    mid: Some("video".into()),
                    ufrag: Some("ufrg".into()),
                    ice_enabled: true,
                },
            ],
        })
    }

    fn sdp_streams(&self, parsed: &ParsedSdp) -> Vec<MediaSection> {
        parsed.sections.clone()
    }

    async fn sdp_create(&self, ml: MonologueId, kind: &str) -> Result<String, ProtocolError> {
        Ok(format!(
            "v=0\r\no=- {} 1 IN IP4 0.0.0.0\r\ns=-\r\nt=0 0\r\n; {kind} for monologue {}\r\n",
            ml.0, ml.0
        ))
    }

    async fn sdp_replace(
        &self,
        source: MonologueId,
        parsed: &ParsedSdp,
        dest: MonologueId,
        _flags: &MediaFlags,
    ) -> Result<String, ProtocolError> {
        let _ = &parsed.sections;
        Ok(format!(
            "v=0\r\no=- {} 1 IN IP4 0.0.0.0\r\ns=-\r\nt=0 0\r\n; offer rewritten from monologue {} for {}\r\n",
            dest.0, source.0, dest.0
        ))
    }

    async fn save_last_sdp(&self, _ml: MonologueId, _sdp: &str) {}

    async fn ice_update(&self, ml: MonologueId, params: StreamParams) -> Result<(), ProtocolError> {
        self.last_candidates
            .insert((ml, params.media_index), params.candidate);
        Ok(())
    }
}
