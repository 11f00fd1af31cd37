use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub janus: JanusSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JanusSettings {
    pub admin_secret: Option<String>,
    pub server_name: String,
    pub version: u32,
    pub version_string: String,
    /// Carried for forward compatibility; no reaper task reads this yet.
    pub idle_timeout_secs: u64,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("JANUSD"),
            )
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8188)?
            .set_default("janus.admin_secret", None::<String>)?
            .set_default("janus.server_name", "Janus videoroom gateway")?
            .set_default("janus.version", 1000)?
            .set_default("janus.version_string", "1.0.0")?
            .set_default("janus.idle_timeout_secs", 60)?
            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::load().expect("Failed to load default settings")
    }
}
