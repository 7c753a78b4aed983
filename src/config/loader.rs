//! Configuration loader with environment variable expansion

use super::{Config, ConfigError};
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML text, expanding `${VAR}` placeholders first
    pub fn from_yaml_str(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content);
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Expand environment variables in the format `${VAR}` or `${VAR:-default}`.
    ///
    /// Unknown variables without a default are left as-is.
    fn expand_env_vars(content: &str) -> String {
        let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
            .expect("placeholder pattern is valid");

        re.replace_all(content, |cap: &regex_lite::Captures<'_>| {
            match std::env::var(&cap[1]) {
                Ok(value) => value,
                Err(_) => cap
                    .get(2)
                    .map(|default| default.as_str().to_string())
                    .unwrap_or_else(|| cap[0].to_string()),
            }
        })
        .into_owned()
    }
}
