use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use lazy_static::lazy_static;
use stationstore::config::ConfigError;
use stationstore::{FatalPolicy, ManagerOptions, StoreConfig};

lazy_static! {
    static ref DEFAULT_CONFIG: PathBuf = default_config();
}

pub fn default_config() -> PathBuf {
    match dirs::home_dir() {
        Some(home_dir) => home_dir.join(".stationd").join("config.json"),
        None => PathBuf::from("./config.json"),
    }
}

#[derive(Debug, Parser)]
#[clap(author = "Kenny", about = "Stores weather station records read from stdin")]
pub struct Options {
    #[clap(
        long,
        help = "JSON sink configuration. Defaults to ~/.stationd/config.json when that exists"
    )]
    pub config: Option<PathBuf>,

    #[clap(long, help = "Enable or disable the relational sink")]
    pub mariadb: Option<bool>,
    #[clap(long, help = "JSON file with WS_* relational credentials")]
    pub db_config: Option<PathBuf>,
    #[clap(long, help = "Line-record (JSON per line) output file")]
    pub flat_config: Option<PathBuf>,
    #[clap(long, help = "Delimited (CSV) output file")]
    pub csv_config: Option<PathBuf>,

    #[clap(
        long,
        value_delimiter = ',',
        default_value = "time,ws_ave,ws_max,w_dir,humid,press,temp,therm,rain"
    )]
    pub schema: Vec<String>,

    #[clap(long, default_value = "10s", value_parser = humantime::parse_duration)]
    pub io_timeout: Duration,
    #[clap(long, default_value = "drop", help = "drop or hold a record a sink rejects")]
    pub on_fatal: FatalPolicy,

    #[clap(long, default_value = "info")]
    pub log_level: String,
}

impl Options {
    /// The config file, then any sink options given on the command line.
    pub fn store_config(&self) -> Result<StoreConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => StoreConfig::from_file(path)?,
            None if DEFAULT_CONFIG.exists() => StoreConfig::from_file(&DEFAULT_CONFIG)?,
            None => StoreConfig::default(),
        };
        if let Some(mariadb) = self.mariadb {
            config.mariadb = mariadb;
        }
        if self.db_config.is_some() {
            config.db_config = self.db_config.clone();
        }
        if self.flat_config.is_some() {
            config.flat_config = self.flat_config.clone();
        }
        if self.csv_config.is_some() {
            config.csv_config = self.csv_config.clone();
        }
        Ok(config)
    }

    pub fn manager_options(&self) -> ManagerOptions {
        ManagerOptions {
            io_timeout: self.io_timeout,
            fatal_policy: self.on_fatal,
        }
    }

    pub fn schema_fields(&self) -> Vec<String> {
        self.schema.iter().map(|field| field.trim().to_string()).collect()
    }
}

pub fn get_args() -> Options {
    Options::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = Options::try_parse_from(["stationd"]).unwrap();
        assert_eq!(options.schema_fields().len(), 9);
        assert_eq!(options.schema_fields()[3], "w_dir");
        assert_eq!(options.io_timeout, Duration::from_secs(10));
        assert_eq!(options.manager_options().fatal_policy, FatalPolicy::Drop);
    }

    #[test]
    fn command_line_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(
            &config_path,
            r#"{"mariadb": true, "csv_config": "/mnt/nas/csv_data.txt", "flat_config": "/mnt/nas/flat_data.txt"}"#,
        )
        .unwrap();

        let options = Options::try_parse_from([
            "stationd",
            "--config",
            config_path.to_str().unwrap(),
            "--mariadb",
            "false",
            "--csv-config",
            "/tmp/csv_data.txt",
            "--schema",
            "time, ws_ave ,w_dir",
            "--io-timeout",
            "2s",
            "--on-fatal",
            "hold",
        ])
        .unwrap();
        let config = options.store_config().unwrap();

        assert!(!config.mariadb);
        assert_eq!(config.csv_config, Some(PathBuf::from("/tmp/csv_data.txt")));
        assert_eq!(config.flat_config, Some(PathBuf::from("/mnt/nas/flat_data.txt")));
        assert_eq!(options.schema_fields(), ["time", "ws_ave", "w_dir"]);
        assert_eq!(
            options.manager_options(),
            ManagerOptions {
                io_timeout: Duration::from_secs(2),
                fatal_policy: FatalPolicy::Hold,
            }
        );
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let options =
            Options::try_parse_from(["stationd", "--config", "/nonexistent/stationd.json"]).unwrap();
        assert!(matches!(options.store_config(), Err(ConfigError::Read { .. })));
    }

    #[test]
    fn unknown_config_keys_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, r#"{"mariadb": false, "sqlite_config": "x"}"#).unwrap();
        let options =
            Options::try_parse_from(["stationd", "--config", config_path.to_str().unwrap()])
                .unwrap();
        assert!(matches!(options.store_config(), Err(ConfigError::Json(_))));
    }
}
