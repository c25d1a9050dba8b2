use serde::Deserialize;

use crate::report::MAX_ROAS_PRECISION;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    /// Directory holding the `cp_*.json` blobs.
    pub data_dir: String,
    /// Decimal places kept on ROAS figures.
    pub roas_precision: u32,
    /// Hours a login token stays valid.
    pub session_ttl_hours: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .set_default("server_port", 8000)?
            .set_default("data_dir", "./data")?
            .set_default("roas_precision", 1)?
            .set_default("session_ttl_hours", 12)?
            .add_source(config::Environment::default())
            .build()?;
        let mut config: Self = config.try_deserialize()?;
        config.roas_precision = config.roas_precision.min(MAX_ROAS_PRECISION);
        Ok(config)
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.session_ttl_hours))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 8000,
            data_dir: "./data".to_string(),
            roas_precision: 1,
            session_ttl_hours: 12,
        }
    }
}
