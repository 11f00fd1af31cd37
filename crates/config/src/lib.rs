pub mod settings;

pub use settings::{JanusSettings, ServerSettings, Settings};
