use std::collections::HashMap;
use std::sync::Weak;

use crate::ids::Identifier;
use crate::session::Session;

/// A videoroom instance. Maps 1:1 to a call in the media engine via
/// `call_id`. The back-reference to the controlling session is
/// deliberately weak and compared by identity only (`Weak::ptr_eq`) —
/// never upgraded for ownership — to avoid a Session -> Room -> Session
/// reference cycle.
pub struct Room {
    pub id: Identifier,
    pub call_id: String,
    pub max_publishers: u32,
    pub controller_session: Weak<Session>,
    pub controller_handle_id: Identifier,
    /// handle_id -> feed_id
    pub publishers: HashMap<Identifier, Identifier>,
    /// handle_id -> subscribed feed_id
    pub subscribers: HashMap<Identifier, Identifier>,
}

pub const DEFAULT_MAX_PUBLISHERS: u32 = 3;

impl Room {
    pub fn new(
        id: Identifier,
        controller_session: &std::sync::Arc<Session>,
        controller_handle_id: Identifier,
        max_publishers: Option<u32>,
    ) -> Self {
        Self {
            id,
            call_id: format!("janus {}", id),
            max_publishers: match max_publishers {
                Some(n) if n > 0 => n,
                _ => DEFAULT_MAX_PUBLISHERS,
            },
            controller_session: std::sync::Arc::downgrade(controller_session),
            controller_handle_id,
            publishers: HashMap::new(),
            subscribers: HashMap::new(),
        }
    }

    /// True if `session` is the (still-live) controller of this room.
    /// Identity comparison only — never dereferences for ownership.
    pub fn is_controlled_by(&self, session: &std::sync::Arc<Session>) -> bool {
        match self.controller_session.upgrade() {
            Some(controller) => std::sync::Arc::ptr_eq(&controller, session),
            None => false,
        }
    }
}
