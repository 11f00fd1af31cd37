use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::ids::{allocate, Identifier};
use crate::room::Room;
use crate::session::Session;

/// The five global tables behind one lock. Unified into a single mutex
/// (the source keeps separate `sessions_mutex`/`rooms_mutex`) because the
/// invariants linking rooms, publishers and feeds need one critical
/// section to stay consistent, and a single lock makes the "never call
/// the media engine while holding the registry lock" rule trivial to
/// audit: every call site is of the shape "lock, read/write, unlock",
/// never "lock, await".
struct RegistryInner {
    tokens: HashMap<String, Instant>,
    sessions: HashMap<Identifier, Arc<Session>>,
    handles: HashSet<Identifier>,
    rooms: HashMap<Identifier, Room>,
    feeds: HashMap<Identifier, Identifier>,
}

pub struct Registry {
    inner: Mutex<RegistryInner>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                tokens: HashMap::new(),
                sessions: HashMap::new(),
                handles: HashSet::new(),
                rooms: HashMap::new(),
                feeds: HashMap::new(),
            }),
        }
    }

    // -- tokens ---------------------------------------------------------

    pub fn add_token(&self, token: String) {
        self.inner.lock().tokens.insert(token, Instant::now());
    }

    pub fn has_token(&self, token: &str) -> bool {
        self.inner.lock().tokens.contains_key(token)
    }

    // -- sessions ---------------------------------------------------------

    /// Allocates a fresh session id (optionally trying a client-supplied
    /// one first, matching the source's `janus_create`), inserts it, and
    /// returns the shared reference.
    pub fn create_session(&self, requested_id: Option<Identifier>) -> Arc<Session> {
        let mut inner = self.inner.lock();
        let id = match requested_id {
            Some(id) if id != 0 && !inner.sessions.contains_key(&id) => id,
            _ => allocate(|candidate| inner.sessions.contains_key(&candidate)),
        };
        let session = Session::new(id);
        inner.sessions.insert(id, session.clone());
        session
    }

    pub fn lookup_session(&self, id: Identifier) -> Option<Arc<Session>> {
        let session = self.inner.lock().sessions.get(&id).cloned();
        if let Some(ref s) = session {
            s.touch();
        }
        session
    }

    pub fn remove_session(&self, id: Identifier) -> Option<Arc<Session>> {
        self.inner.lock().sessions.remove(&id)
    }

    // -- handles (presence only; owned by their session) -----------------

    pub fn allocate_handle_id(&self) -> Identifier {
        let mut inner = self.inner.lock();
        let id = allocate(|candidate| inner.handles.contains(&candidate));
        inner.handles.insert(id);
        id
    }

    pub fn remove_handle_id(&self, id: Identifier) {
        self.inner.lock().handles.remove(&id);
    }

    // -- rooms ------------------------------------------------------------

    /// Picks a room id (trying a client-supplied one first) and inserts the
    /// room built from it under a single lock acquisition, so a second
    /// caller can never be handed the same requested id in between the
    /// check and the insert.
    pub fn create_room(
        &self,
        requested_id: Option<Identifier>,
        build: impl FnOnce(Identifier) -> Room,
    ) -> Identifier {
        let mut inner = self.inner.lock();
        let id = match requested_id {
            Some(id) if id != 0 && !inner.rooms.contains_key(&id) => id,
            _ => allocate(|candidate| inner.rooms.contains_key(&candidate)),
        };
        inner.rooms.insert(id, build(id));
        id
    }

    pub fn remove_room(&self, id: Identifier) -> Option<Room> {
        self.inner.lock().rooms.remove(&id)
    }

    pub fn with_room<R>(&self, id: Identifier, f: impl FnOnce(&Room) -> R) -> Option<R> {
        self.inner.lock().rooms.get(&id).map(f)
    }

    pub fn with_room_mut<R>(&self, id: Identifier, f: impl FnOnce(&mut Room) -> R) -> Option<R> {
        self.inner.lock().rooms.get_mut(&id).map(f)
    }

    // -- feeds (global) -----------------------------------------------------

    pub fn remove_feed(&self, feed_id: Identifier) {
        self.inner.lock().feeds.remove(&feed_id);
    }

    pub fn lookup_feed(&self, feed_id: Identifier) -> Option<Identifier> {
        self.inner.lock().feeds.get(&feed_id).copied()
    }

    /// Registers a fresh publisher: picks a feed id and inserts it into both
    /// the global feeds table and `room_id`'s publishers map under a single
    /// lock acquisition, so two concurrent joins can never be handed the
    /// same feed id (invariant 5) and invariant (1) — every publisher's feed
    /// id is always resolvable in the feeds table — never observes a
    /// half-applied state. Returns the freshly allocated feed id plus the
    /// other publishers' feed ids (self excluded), or `None` if the room no
    /// longer exists.
    pub fn insert_publisher(
        &self,
        room_id: Identifier,
        handle_id: Identifier,
    ) -> Option<(Identifier, Vec<Identifier>)> {
        let mut inner = self.inner.lock();
        if !inner.rooms.contains_key(&room_id) {
            return None;
        }
        let feed_id = allocate(|candidate| inner.feeds.contains_key(&candidate));
        inner.feeds.insert(feed_id, handle_id);
        let room = inner.rooms.get_mut(&room_id).expect("checked above");
        room.publishers.insert(handle_id, feed_id);
        let other_feeds = room
            .publishers
            .iter()
            .filter(|(h, _)| **h != handle_id)
            .map(|(_, feed)| *feed)
            .collect();
        Some((feed_id, other_feeds))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
