//! Ambient configuration layer (§10.4): runtime settings for the
//! reference collector binary, loaded through the `config` crate over
//! an optional TOML file with environment-variable overrides, into a
//! plain `serde`-derived struct. The core library itself never reads
//! configuration — it takes every parameter as an explicit constructor
//! argument (§1).

use serde::Deserialize;

use crate::error::AppError;

/// Deserialized shape of the collector's configuration file (if any).
/// Every field has a default so a completely absent file still yields
/// a usable configuration — command-line flags layer on top of this in
/// `main`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log_level: String,
    pub listen: Vec<String>,
    pub export: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            log_level: "info".to_string(),
            listen: vec!["0.0.0.0:4739".to_string()],
            export: None,
        }
    }
}

impl Settings {
    /// Load settings from `config_file` (if given), with environment
    /// variables prefixed `IPFIX_` taking precedence over file values,
    /// and the built-in defaults taking precedence over neither (they
    /// seed the config so an absent file is not an error).
    pub fn load(config_file: Option<&str>) -> Result<Self, AppError> {
        let defaults = Settings::default();
        let mut builder = config::Config::builder()
            .set_default("log_level", defaults.log_level)?
            .set_default("listen", defaults.listen)?
            .set_default("export", None::<String>)?;

        if let Some(path) = config_file {
            builder = builder.add_source(config::File::with_name(path));
        }
        builder = builder.add_source(config::Environment::with_prefix("IPFIX"));

        let settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable_with_no_config_file() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.listen, vec!["0.0.0.0:4739".to_string()]);
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.export, None);
    }

    #[test]
    fn environment_override_takes_precedence_over_default() {
        std::env::set_var("IPFIX_LOG_LEVEL", "debug");
        let settings = Settings::load(None).unwrap();
        std::env::remove_var("IPFIX_LOG_LEVEL");
        assert_eq!(settings.log_level, "debug");
    }
}
