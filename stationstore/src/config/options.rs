use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use super::ConfigError;

/// Which sinks a manager feeds. Any key other than these four is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default = "enabled")]
    pub mariadb: bool,
    #[serde(default)]
    pub db_config: Option<PathBuf>,
    #[serde(default)]
    pub flat_config: Option<PathBuf>,
    #[serde(default)]
    pub csv_config: Option<PathBuf>,
}

fn enabled() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            mariadb: true,
            db_config: None,
            flat_config: None,
            csv_config: None,
        }
    }
}

impl StoreConfig {
    pub fn from_json(json: &str) -> Result<StoreConfig, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<StoreConfig, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            inner: e,
        })?;
        StoreConfig::from_json(&json)
    }

    pub fn any_enabled(&self) -> bool {
        self.mariadb || self.flat_config.is_some() || self.csv_config.is_some()
    }
}

/// What happens to the in-flight record when a sink fails fatally. The
/// failure propagates either way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FatalPolicy {
    #[default]
    Drop,
    Hold,
}

impl FromStr for FatalPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drop" => Ok(FatalPolicy::Drop),
            "hold" => Ok(FatalPolicy::Hold),
            other => Err(ConfigError::Invalid(format!(
                "fatal policy must be drop or hold, not {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerOptions {
    /// Upper bound on any single open or write.
    pub io_timeout: Duration,
    pub fatal_policy: FatalPolicy,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        ManagerOptions {
            io_timeout: Duration::from_secs(10),
            fatal_policy: FatalPolicy::Drop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_all_four_options() {
        let config = StoreConfig::from_json(
            r#"{"mariadb": false, "db_config": null, "flat_config": "/tmp/flat.txt", "csv_config": "/tmp/data.csv"}"#,
        )
        .unwrap();
        assert!(!config.mariadb);
        assert_eq!(config.db_config, None);
        assert_eq!(config.flat_config, Some(PathBuf::from("/tmp/flat.txt")));
        assert_eq!(config.csv_config, Some(PathBuf::from("/tmp/data.csv")));
    }

    #[test]
    fn relational_sink_is_on_by_default() {
        let config = StoreConfig::from_json("{}").unwrap();
        assert_eq!(config, StoreConfig::default());
        assert!(config.any_enabled());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let error = StoreConfig::from_json(r#"{"mariadb": true, "json_config": "x"}"#).unwrap_err();
        assert!(matches!(error, ConfigError::Json(_)));
    }

    #[test]
    fn fatal_policy_parses() {
        assert_eq!("Hold".parse::<FatalPolicy>().unwrap(), FatalPolicy::Hold);
        assert_eq!("drop".parse::<FatalPolicy>().unwrap(), FatalPolicy::Drop);
        assert!("retry".parse::<FatalPolicy>().is_err());
    }
}
