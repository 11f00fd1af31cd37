use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::ids::Identifier;

/// A plugin handle's role within whatever room it has joined. Role is
/// terminal for the handle's lifetime — this core defines no transition
/// back to `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    None,
    Controlling,
    Publisher,
    Subscriber,
}

#[derive(Debug)]
pub struct Handle {
    pub id: Identifier,
    pub session_id: Identifier,
    pub room_id: Identifier,
    pub role: Role,
}

impl Handle {
    pub fn new(id: Identifier, session_id: Identifier) -> Self {
        Self {
            id,
            session_id,
            room_id: 0,
            role: Role::None,
        }
    }
}

/// An opaque tag for whatever transport (WebSocket connection, in this
/// design) adopted a session. Routing asynchronous events to the right
/// connection is the transport layer's job; the core only needs to know
/// a session has at least one live transport.
pub type TransportId = u64;

struct SessionInner {
    last_activity: Instant,
    transports: Vec<TransportId>,
    handles: HashMap<Identifier, Handle>,
}

/// Per-session state. Shared-owned (`Arc<Session>`) so a room's weak
/// back-reference to its controller can coexist with the registry's
/// strong reference. The inner mutex is acquired only after the registry
/// mutex has been released, per the lock hierarchy.
pub struct Session {
    pub id: Identifier,
    inner: Mutex<SessionInner>,
}

impl Session {
    pub fn new(id: Identifier) -> Arc<Self> {
        Arc::new(Self {
            id,
            inner: Mutex::new(SessionInner {
                last_activity: Instant::now(),
                transports: Vec::new(),
                handles: HashMap::new(),
            }),
        })
    }

    pub fn touch(&self) {
        self.inner.lock().last_activity = Instant::now();
    }

    pub fn last_activity(&self) -> Instant {
        self.inner.lock().last_activity
    }

    pub fn add_transport(&self, transport: TransportId) {
        let mut inner = self.inner.lock();
        if !inner.transports.contains(&transport) {
            inner.transports.push(transport);
        }
    }

    pub fn transports(&self) -> Vec<TransportId> {
        self.inner.lock().transports.clone()
    }

    pub fn insert_handle(&self, handle: Handle) {
        self.inner.lock().handles.insert(handle.id, handle);
    }

    pub fn with_handle<R>(&self, handle_id: Identifier, f: impl FnOnce(&mut Handle) -> R) -> Option<R> {
        self.inner.lock().handles.get_mut(&handle_id).map(f)
    }

    pub fn has_handle(&self, handle_id: Identifier) -> bool {
        self.inner.lock().handles.contains_key(&handle_id)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish()
    }
}
