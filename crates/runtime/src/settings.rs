//! Layered settings: built-in defaults, optional file, then `AUTOCODER__*` env vars

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use autocoder_core::config::{NamingConfig, PortConfig, TimeoutConfig};

/// Environment prefix; nested keys use `__` (`AUTOCODER__PORTS__RANGE_START`)
pub const ENV_PREFIX: &str = "AUTOCODER";
const ENV_SEPARATOR: &str = "__";

const LEDGER_FILE_NAME: &str = "port_ledger.json";
const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_LOG_FILTER: &str = "autocoder=info";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ports: PortConfig,
    pub ledger: LedgerSettings,
    pub naming: NamingConfig,
    pub timeouts: TimeoutConfig,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// Ledger file; `~` is expanded. Unset means the per-user cache dir.
    pub path: Option<String>,
    /// Host used by the bind test
    pub bind_host: IpAddr,
    /// Bound on waiting for the ledger lock
    pub lock_timeout_ms: u64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            path: None,
            bind_host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => bail!("unknown log format '{}' (expected pretty or json)", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: LogFormat,
    /// EnvFilter directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Settings {
    /// Load from the optional file and the process environment
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::load_from(file, None)
    }

    /// Load with an explicit environment map instead of the process env
    ///
    /// Keys are full variable names (`AUTOCODER__PORTS__RANGE_START`).
    pub fn load_from(file: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path.to_path_buf()).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("ports.reserved_ports")
                .source(env),
        );

        let settings: Settings = builder
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Failed to parse settings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.ports.validate().context("Invalid [ports] settings")?;
        self.naming.validate().context("Invalid [naming] settings")?;
        if self.ledger.lock_timeout_ms == 0 {
            bail!("Invalid [ledger] settings: lock_timeout_ms must be greater than 0");
        }
        Ok(())
    }

    /// Resolved ledger file path
    ///
    /// Explicit path (tilde-expanded), else the per-user cache dir, else the
    /// system temp dir.
    pub fn ledger_path(&self) -> PathBuf {
        if let Some(path) = &self.ledger.path {
            return PathBuf::from(shellexpand::tilde(path).into_owned());
        }
        directories::ProjectDirs::from("dev", "autocoder", "autocoder")
            .map(|dirs| dirs.cache_dir().join(LEDGER_FILE_NAME))
            .unwrap_or_else(|| std::env::temp_dir().join("autocoder").join(LEDGER_FILE_NAME))
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.ledger.lock_timeout_ms)
    }
}
