use std::collections::HashSet;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::pipeline::channel::{DEFAULT_CAPACITY, MAX_CAPACITY};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deployment {
    Local,
    Dev,
    Stage,
    Prod,
}

impl Deployment {
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Self::Dev,
            "stage" | "staging" => Self::Stage,
            "prod" | "production" => Self::Prod,
            _ => Self::Local,
        }
    }
}

/// A simulated device: stable identifier plus display label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSpec {
    pub id: String,
    pub name: String,
}

const DEFAULT_DEVICES: &str = "DEV001:Conveyor Belt,DEV002:Cooling Unit,DEV003:Robotic Arm";

#[derive(Debug, Clone)]
pub struct Config {
    // Storage
    pub database_url: String,
    pub alert_log_dir: PathBuf,

    // Pipeline
    pub channel_capacity: usize,
    pub time_unit: Duration,
    pub devices: Vec<DeviceSpec>,

    // API settings
    pub api_host: String,
    pub api_port: u16,

    // Application metadata
    pub deployment: Deployment,
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a variable is set but cannot be parsed
    /// or violates its constraints.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let channel_capacity: usize = parse_var(&lookup, "CHANNEL_CAPACITY", DEFAULT_CAPACITY)?;
        if channel_capacity == 0 || channel_capacity > MAX_CAPACITY {
            return Err(ConfigError::Invalid {
                var: "CHANNEL_CAPACITY",
                value: channel_capacity.to_string(),
            });
        }

        let time_unit_ms: u64 = parse_var(&lookup, "TIME_UNIT_MS", 1000)?;
        if time_unit_ms == 0 {
            return Err(ConfigError::Invalid {
                var: "TIME_UNIT_MS",
                value: "0".to_string(),
            });
        }

        let devices_raw = lookup("DEVICES").unwrap_or_else(|| DEFAULT_DEVICES.to_string());
        let devices = parse_devices(&devices_raw)?;

        Ok(Self {
            // Storage
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://sensor_data.db?mode=rwc".to_string()),
            alert_log_dir: PathBuf::from(
                lookup("ALERT_LOG_DIR").unwrap_or_else(|| "logs".to_string()),
            ),

            // Pipeline
            channel_capacity,
            time_unit: Duration::from_millis(time_unit_ms),
            devices,

            // API settings
            api_host: lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            api_port: parse_var(&lookup, "API_PORT", 3000)?,

            // Application metadata
            deployment: Deployment::from_str(
                &lookup("DEPLOYMENT").unwrap_or_else(|| "local".to_string()),
            ),
        })
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

/// Parse `ID[:Name],ID[:Name],...`. A missing name falls back to `"Device"`.
fn parse_devices(raw: &str) -> Result<Vec<DeviceSpec>, ConfigError> {
    let invalid = || ConfigError::Invalid {
        var: "DEVICES",
        value: raw.to_string(),
    };

    let mut seen = HashSet::new();
    let mut devices = Vec::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (id, name) = match entry.split_once(':') {
            Some((id, name)) => (id.trim(), name.trim()),
            None => (entry, "Device"),
        };
        if id.is_empty() || !seen.insert(id.to_string()) {
            return Err(invalid());
        }
        devices.push(DeviceSpec {
            id: id.to_string(),
            name: if name.is_empty() { "Device" } else { name }.to_string(),
        });
    }

    if devices.is_empty() {
        return Err(invalid());
    }
    Ok(devices)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("Alert log directory {path} is not writable: {source}")]
    Unwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
