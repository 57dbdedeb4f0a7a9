//! `tessera.toml` loading.
//!
//! ```toml
//! [runtime]
//! validate = true
//! print_target = "stdout"
//!
//! [output]
//! pretty = false
//!
//! [log]
//! filter = "warn"
//! ```

use std::path::Path;

use serde::Deserialize;
use tessera_eval::RuntimeConfig;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct CliConfig {
    pub runtime: RuntimeConfig,
    pub output: OutputConfig,
    pub log: LogConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct OutputConfig {
    pub pretty: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub(crate) struct LogConfig {
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            filter: "warn".to_string(),
        }
    }
}

impl CliConfig {
    /// Defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<CliConfig, String> {
        let Some(path) = path else {
            return Ok(CliConfig::default());
        };
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("error reading config '{}': {}", path.display(), e))?;
        CliConfig::parse(&text).map_err(|e| format!("invalid config '{}': {}", path.display(), e))
    }

    pub fn parse(text: &str) -> Result<CliConfig, toml::de::Error> {
        toml::from_str(text)
    }
}
