//! Configuration module

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

pub const SCAN_INTERVAL_RANGE: (u64, u64) = (10, 300);
pub const CONSIDER_HOME_RANGE: (u64, u64) = (0, 600);

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub router: RouterConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,
    /// Grace window after the last ARP sighting; 0 disables it
    #[serde(default = "default_consider_home")]
    pub consider_home_secs: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_scan_interval(),
            consider_home_secs: default_consider_home(),
        }
    }
}

fn default_username() -> String {
    "ubnt".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_scan_interval() -> u64 {
    30
}

fn default_consider_home() -> u64 {
    180
}

impl RouterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl TrackingConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn consider_home(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.consider_home_secs as i64)
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::Environment::with_prefix("EDGEPRESENCE").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.router.host.trim().is_empty() {
            return Err(ConfigError::Missing("router.host"));
        }
        if self.router.username.trim().is_empty() {
            return Err(ConfigError::Missing("router.username"));
        }

        check_range(
            "tracking.scan_interval_secs",
            self.tracking.scan_interval_secs,
            SCAN_INTERVAL_RANGE,
        )?;
        check_range(
            "tracking.consider_home_secs",
            self.tracking.consider_home_secs,
            CONSIDER_HOME_RANGE,
        )?;

        if self.router.timeout_secs == 0 {
            return Err(ConfigError::OutOfRange {
                field: "router.timeout_secs",
                value: 0,
                min: 1,
                max: u64::MAX,
            });
        }

        Ok(())
    }
}

fn check_range(field: &'static str, value: u64, (min, max): (u64, u64)) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config(scan: u64, home: u64) -> Config {
        Config {
            router: RouterConfig {
                host: "192.168.1.1".to_string(),
                username: default_username(),
                password: "secret".to_string(),
                port: default_ssh_port(),
                timeout_secs: default_timeout_secs(),
            },
            tracking: TrackingConfig {
                scan_interval_secs: scan,
                consider_home_secs: home,
            },
        }
    }

    #[test]
    fn test_defaults() {
        let tracking = TrackingConfig::default();
        assert_eq!(tracking.scan_interval(), Duration::from_secs(30));
        assert_eq!(tracking.consider_home(), chrono::Duration::seconds(180));
        assert!(make_config(30, 180).validate().is_ok());
    }

    #[test]
    fn test_bounds() {
        assert!(make_config(10, 0).validate().is_ok());
        assert!(make_config(300, 600).validate().is_ok());
        assert!(matches!(
            make_config(5, 180).validate(),
            Err(ConfigError::OutOfRange { field: "tracking.scan_interval_secs", .. })
        ));
        assert!(matches!(
            make_config(30, 601).validate(),
            Err(ConfigError::OutOfRange { field: "tracking.consider_home_secs", .. })
        ));
    }

    #[test]
    fn test_missing_host() {
        let mut config = make_config(30, 180);
        config.router.host = " ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Missing("router.host"))));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let settings = config::Config::builder()
            .set_override("router.host", "10.0.0.1")
            .unwrap()
            .build()
            .unwrap();
        let config: Config = settings.try_deserialize().unwrap();

        assert_eq!(config.router.username, "ubnt");
        assert_eq!(config.router.port, 22);
        assert_eq!(config.router.timeout(), Duration::from_secs(10));
        assert_eq!(config.tracking.scan_interval_secs, 30);
        assert_eq!(config.tracking.consider_home_secs, 180);
    }
}
