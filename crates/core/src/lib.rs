pub mod dispatch;
pub mod error;
pub mod ids;
pub mod media;
pub mod registry;
pub mod room;
pub mod session;
pub mod trickle;
pub mod videoroom;

pub use dispatch::{Dispatched, Dispatcher};
pub use error::{ProtocolError, ProtocolResult};
pub use registry::Registry;
