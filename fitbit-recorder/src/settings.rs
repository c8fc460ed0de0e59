use config::{Config, ConfigError, Environment, File, FileFormat};
use fitbit_api::endpoints::Period;
use fitbit_auth::{AuthError, CredentialStore};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Defaults to `<config dir>/fitbit-recorder/fitbit.yaml`
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Trailing window fetched on every run, ending today.
    #[serde(default)]
    pub window: Period,

    #[serde(default)]
    pub influxdb: InfluxDbSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InfluxDbSettings {
    #[serde(default = "default_influxdb_url")]
    pub url: String,

    #[serde(default = "default_influxdb_database")]
    pub database: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

impl Default for InfluxDbSettings {
    fn default() -> Self {
        Self {
            url: default_influxdb_url(),
            database: default_influxdb_database(),
            username: None,
            password: None,
        }
    }
}

fn default_api_base_url() -> String {
    fitbit_api::BASE_URL.to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_influxdb_url() -> String {
    "http://localhost:8086".to_string()
}

fn default_influxdb_database() -> String {
    "fitbit".to_string()
}

impl Settings {
    /// `config.toml` (or `$FITBIT_RECORDER_CONFIG`), then `FITBIT_RECORDER__*` variables.
    pub fn new() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("FITBIT_RECORDER_CONFIG").unwrap_or_else(|_| "config.toml".to_string());

        let settings = Config::builder()
            .add_source(File::with_name(&config_path).required(false))
            .add_source(Environment::with_prefix("FITBIT_RECORDER").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.api_base_url.starts_with("http") {
            return Err("api_base_url must be a valid HTTP(S) URL".to_string());
        }
        if !self.influxdb.url.starts_with("http") {
            return Err("influxdb.url must be a valid HTTP(S) URL".to_string());
        }
        if self.influxdb.database.trim().is_empty() {
            return Err("influxdb.database is required".to_string());
        }
        if self.timeout_seconds == 0 {
            return Err("timeout_seconds must be greater than zero".to_string());
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn credentials_path(&self) -> Result<PathBuf, AuthError> {
        match &self.credentials_path {
            Some(path) => Ok(path.clone()),
            None => CredentialStore::default_path(),
        }
    }
}
