use crate::config::AppConfig;
use crate::error::{EngineError, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads application configuration by merging defaults, TOML, and
    /// `FXP_`-prefixed environment variables (e.g. `FXP_SERVER__PORT`).
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load() -> Result<AppConfig> {
        Self::load_from("config/Config.toml")
    }

    /// Loads application configuration from an explicit TOML path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_from(path: &str) -> Result<AppConfig> {
        let config: AppConfig = Figment::from(figment::providers::Serialized::defaults(
            AppConfig::default(),
        ))
        .merge(Toml::file(path))
        .merge(Env::prefixed("FXP_").split("__"))
        .extract()
        .map_err(|e| EngineError::Validation(format!("config load failed: {e}")))?;

        Ok(config)
    }

    /// Loads application configuration with a profile overlay
    /// (`config/Config.<profile>.toml`).
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_with_profile(profile: &str) -> Result<AppConfig> {
        let config: AppConfig = Figment::from(figment::providers::Serialized::defaults(
            AppConfig::default(),
        ))
        .merge(Toml::file("config/Config.toml"))
        .merge(Toml::file(format!("config/Config.{profile}.toml")))
        .merge(Env::prefixed("FXP_").split("__"))
        .extract()
        .map_err(|e| EngineError::Validation(format!("config load failed: {e}")))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_falls_back_to_defaults_without_files() {
        // No config file present in the test cwd: defaults apply.
        let config = ConfigLoader::load_from("/nonexistent/Config.toml").unwrap();
        assert_eq!(config.market_data.symbol, "EURUSD");
        assert_eq!(config.server.port, 8080);
    }
}
