use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use super::errors::ConfigError;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_vet_initially")]
    pub vet_initially: usize,

    #[serde(default = "default_max_tries")]
    pub max_tries: u32,

    #[serde(default = "default_dial_timeout_secs")]
    pub dial_timeout_secs: u64,

    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    #[serde(default = "default_probe_url")]
    pub probe_url: String,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,

    #[serde(default = "default_cache_max_age_secs")]
    pub max_age_secs: u64,

    #[serde(default = "default_cache_write_interval_secs")]
    pub write_interval_secs: u64,

    #[serde(default)]
    pub path: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_cache_max_entries(),
            max_age_secs: default_cache_max_age_secs(),
            write_interval_secs: default_cache_write_interval_secs(),
            path: None,
        }
    }
}

fn default_vet_initially() -> usize {
    1000
}
fn default_max_tries() -> u32 {
    // A bound in the thousands amounts to an unbounded retry loop in
    // practice once every attempt also burns a masquerade from the queue.
    // Kept low and exposed as a config knob for operators who want more.
    6
}
fn default_dial_timeout_secs() -> u64 {
    10
}
fn default_idle_timeout_secs() -> u64 {
    70
}
fn default_probe_url() -> String {
    "http://dlymairwlc89h.cloudfront.net/index.html".to_string()
}
fn default_cache_max_entries() -> usize {
    1000
}
fn default_cache_max_age_secs() -> u64 {
    24 * 60 * 60
}
fn default_cache_write_interval_secs() -> u64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vet_initially: default_vet_initially(),
            max_tries: default_max_tries(),
            dial_timeout_secs: default_dial_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            probe_url: default_probe_url(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: Option<&str>, overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = path {
            Self::from_file(path)?
        } else if std::path::Path::new("fronting.toml").exists() {
            Self::from_file("fronting.toml")?
        } else if std::path::Path::new("/etc/fronting/config.toml").exists() {
            Self::from_file("/etc/fronting/config.toml")?
        } else {
            Self::default()
        };

        config.apply_cli_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if let Some(v) = overrides.vet_initially {
            self.vet_initially = v;
        }
        if let Some(v) = overrides.max_tries {
            self.max_tries = v;
        }
        if let Some(v) = overrides.cache_path {
            self.cache.path = Some(v);
        }
        if let Some(v) = overrides.log_level {
            self.logging.level = v;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dial_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "dial_timeout_secs cannot be 0".to_string(),
            ));
        }
        if self.max_tries == 0 {
            return Err(ConfigError::Validation("max_tries cannot be 0".to_string()));
        }
        if self.vet_initially == 0 {
            return Err(ConfigError::Validation(
                "vet_initially cannot be 0".to_string(),
            ));
        }
        if self.cache.write_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "cache.write_interval_secs cannot be 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn save(&self, path: &str) -> Result<(), ConfigError> {
        let rendered = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Parse(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, rendered)
            .map_err(|e| ConfigError::FileWrite(path.to_string(), e.to_string()))?;
        Ok(())
    }

    pub fn dial_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.dial_timeout_secs)
    }

    pub fn idle_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.idle_timeout_secs)
    }
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub vet_initially: Option<usize>,
    pub max_tries: Option<u32>,
    pub cache_path: Option<String>,
    pub log_level: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_tries, 6);
    }

    #[test]
    fn zero_dial_timeout_rejected() {
        let mut config = Config::default();
        config.dial_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_cache_write_interval_rejected() {
        let mut config = Config::default();
        config.cache.write_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn cli_overrides_apply() {
        let mut config = Config::default();
        config.apply_cli_overrides(CliOverrides {
            max_tries: Some(20),
            ..Default::default()
        });
        assert_eq!(config.max_tries, 20);
    }
}
