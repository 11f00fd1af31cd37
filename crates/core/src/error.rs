use thiserror::Error;

/// One variant per numeric error code the videoroom protocol reports.
///
/// `code()` and the `Display` reason are what the dispatcher puts into the
/// `{janus:"error", error:{code, reason}}` envelope.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Missing/invalid admin_secret")]
    Forbidden,
    #[error("Unknown videoroom request '{0}'")]
    UnknownRequest(String),
    #[error("No such room ({0})")]
    NoSuchRoom(u64),
    #[error("Invalid ptype '{0}'")]
    InvalidPtype(String),
    #[error("Already in room {0}")]
    AlreadyInRoom(u64),
    #[error("JSON parse error: {0}")]
    JsonParse(String),
    #[error("Request is not a JSON object")]
    NotAnObject,
    #[error("Missing/invalid element '{0}'")]
    MissingElement(&'static str),
    #[error("Unhandled request '{0}'")]
    Unhandled(String),
    #[error("Session {0} not found")]
    NoSuchSession(u64),
    #[error("Unsupported plugin '{0}'")]
    UnsupportedPlugin(String),
    #[error("Media/ICE error: {0}")]
    MediaError(String),
    #[error("Media engine error: {0}")]
    Internal(String),
}

impl ProtocolError {
    pub fn code(&self) -> u32 {
        match self {
            ProtocolError::Forbidden => 403,
            ProtocolError::UnknownRequest(_) => 423,
            ProtocolError::NoSuchRoom(_) => 426,
            ProtocolError::InvalidPtype(_) => 430,
            ProtocolError::AlreadyInRoom(_) => 436,
            ProtocolError::JsonParse(_) => 454,
            ProtocolError::NotAnObject => 455,
            ProtocolError::MissingElement(_) => 456,
            ProtocolError::Unhandled(_) => 457,
            ProtocolError::NoSuchSession(_) => 458,
            ProtocolError::UnsupportedPlugin(_) => 460,
            ProtocolError::MediaError(_) => 466,
            ProtocolError::Internal(_) => 512,
        }
    }
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
