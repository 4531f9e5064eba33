use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use super::ConfigError;

/// Relational sink credentials and target table.
///
/// Defaults come from the `WS_*` environment variables, falling back to the
/// stock station setup (`pi@localhost`, database `weather_data`, table
/// `sensors`). A JSON file with the same keys overrides them.
#[derive(Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub db_name: String,
    pub db_table: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DbConfigFile {
    #[serde(rename = "WS_USERNAME")]
    username: Option<String>,
    #[serde(rename = "WS_PASSWORD")]
    password: Option<String>,
    #[serde(rename = "WS_HOST")]
    host: Option<String>,
    #[serde(rename = "WS_PORT")]
    port: Option<String>,
    #[serde(rename = "WS_DB_NAME")]
    db_name: Option<String>,
    #[serde(rename = "WS_DB_TABLE")]
    db_table: Option<String>,
}

impl DbConfig {
    pub fn from_env() -> Result<DbConfig, ConfigError> {
        DbConfig::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<DbConfig, ConfigError> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        Ok(DbConfig {
            username: get("WS_USERNAME", "pi"),
            password: get("WS_PASSWORD", "raspberry"),
            host: get("WS_HOST", "localhost"),
            port: parse_port(&get("WS_PORT", "5432"))?,
            db_name: get("WS_DB_NAME", "weather_data"),
            db_table: get("WS_DB_TABLE", "sensors"),
        })
    }

    /// Environment defaults, then overrides from `path` when given.
    pub fn load(path: Option<&Path>) -> Result<DbConfig, ConfigError> {
        let config = DbConfig::from_env()?;
        match path {
            Some(path) => {
                let json = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
                    path: path.to_path_buf(),
                    inner: e,
                })?;
                config.with_overrides(&json)
            }
            None => Ok(config),
        }
    }

    pub fn with_overrides(mut self, json: &str) -> Result<DbConfig, ConfigError> {
        let file: DbConfigFile = serde_json::from_str(json)?;
        let trimmed = |value: Option<String>| value.map(|v| v.trim().to_string());
        if let Some(username) = trimmed(file.username) {
            self.username = username;
        }
        if let Some(password) = trimmed(file.password) {
            self.password = password;
        }
        if let Some(host) = trimmed(file.host) {
            self.host = host;
        }
        if let Some(port) = trimmed(file.port) {
            self.port = parse_port(&port)?;
        }
        if let Some(db_name) = trimmed(file.db_name) {
            self.db_name = db_name;
        }
        if let Some(db_table) = trimmed(file.db_table) {
            self.db_table = db_table;
        }
        Ok(self)
    }

    pub fn connect_config(&self, connect_timeout: Duration) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .user(&self.username)
            .password(&self.password)
            .host(&self.host)
            .port(self.port)
            .dbname(&self.db_name)
            .connect_timeout(connect_timeout);
        config
    }
}

fn parse_port(port: &str) -> Result<u16, ConfigError> {
    port.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("WS_PORT is not a port number: {port:?}")))
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("DbConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db_name", &self.db_name)
            .field("db_table", &self.db_table)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn stock_defaults() {
        let config = DbConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.username, "pi");
        assert_eq!(config.password, "raspberry");
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5432);
        assert_eq!(config.db_name, "weather_data");
        assert_eq!(config.db_table, "sensors");
    }

    #[test]
    fn environment_then_file() {
        let env: HashMap<&str, &str> = [("WS_HOST", "nas.local"), ("WS_DB_TABLE", "outdoor")].into();
        let config = DbConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()))
            .unwrap()
            .with_overrides(r#"{"WS_USERNAME": " station ", "WS_PORT": "5433"}"#)
            .unwrap();
        assert_eq!(config.host, "nas.local");
        assert_eq!(config.db_table, "outdoor");
        assert_eq!(config.username, "station");
        assert_eq!(config.port, 5433);
    }

    #[test]
    fn rejects_unknown_keys_and_bad_ports() {
        let base = DbConfig::from_lookup(|_| None).unwrap();
        assert!(base.clone().with_overrides(r#"{"WS_PASS": "x"}"#).is_err());
        assert!(base.with_overrides(r#"{"WS_PORT": "many"}"#).is_err());
    }

    #[test]
    fn debug_hides_password() {
        let config = DbConfig::from_lookup(|_| None).unwrap();
        assert!(!format!("{config:?}").contains("raspberry"));
    }
}
