use serde::Deserialize;

use super::security::SecurityConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::from_config(config)
    }

    /// Deserialize and validate an already-built source stack
    pub fn from_config(config: config::Config) -> Result<Self, config::ConfigError> {
        let app: Self = config.try_deserialize()?;
        app.security
            .validate()
            .map_err(config::ConfigError::Message)?;

        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_source_keeps_defaults() {
        let config = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [logging]
                format = "json"

                [security.auth]
                require_auth = false

                [security.resources.ceilings]
                decoy = 1
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();

        let app = AppConfig::from_config(config).unwrap();

        assert_eq!(app.logging.format, LogFormat::Json);
        assert_eq!(app.logging.level, "info");
        assert!(!app.security.auth.require_auth);
        assert!(app.security.auth.enabled);
        assert_eq!(app.security.resources.ceilings.get("decoy"), Some(&1));
        assert!(app.security.operations.contains_key("deploy_decoy"));
    }

    #[test]
    fn test_zero_rate_window_fails_to_load() {
        let config = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [security.rate_limit.default]
                window_ms = 0
                max_requests = 10
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();

        let error = AppConfig::from_config(config).unwrap_err();

        assert!(error.to_string().contains("rate_limit.default"));
    }
}
