use crate::error::Error;
use crate::model::{SourceMode, WatermarkPolicy};
use config::Config;

const ENV_PREFIX: &str = "HM";
const DTU_URL: &str = "http://192.168.178.114";

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Settings {
    pub source: SourceMode,
    pub dtu_url: String,
    pub timeout_secs: u64,
    pub fixture_path: String,
    pub store_path: String,
    pub watermark_policy: WatermarkPolicy,
    /// Upper bound of the power gauge on the page, in watts.
    pub max_power: f64,
}

fn config_err(e: config::ConfigError) -> Error {
    Error::ConfigError(e.to_string())
}

fn with_defaults(settings: &mut Config) -> Result<(), config::ConfigError> {
    settings
        .set_default("source", "live")?
        .set_default("dtu_url", DTU_URL)?
        .set_default("timeout_secs", 10i64)?
        .set_default("fixture_path", "resources/fixture.json")?
        .set_default("store_path", "watermark.jsonl")?
        .set_default("watermark_policy", "append")?
        .set_default("max_power", 420.0)?;
    Ok(())
}

/// Build settings from `settings` layered over the defaults.
pub fn from_config(mut settings: Config) -> Result<Settings, Error> {
    with_defaults(&mut settings).map_err(config_err)?;
    settings.try_into().map_err(config_err)
}

/// Read settings from `HM_*` environment variables, e.g. `HM_SOURCE=fixture`.
pub fn read_settings() -> Result<Settings, Error> {
    let mut settings = Config::default();
    settings
        .merge(config::Environment::with_prefix(ENV_PREFIX))
        .map_err(config_err)?;
    from_config(settings)
}
