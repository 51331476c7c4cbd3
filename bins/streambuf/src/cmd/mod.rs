pub mod clear;
pub mod flush;
pub mod run;
pub mod status;

use streambuf_engine::{Engine, EngineConfig};

use crate::error::CliError;

fn bootstrap(config_path: &str) -> Result<Engine, CliError> {
    let config = EngineConfig::load(config_path)?;
    tracing::debug!(config = %config_path, "loaded config");
    Ok(Engine::bootstrap(config)?)
}
