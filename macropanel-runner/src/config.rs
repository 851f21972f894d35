//! Pipeline configuration and credential resolution.
//!
//! Configuration lives in a TOML file whose fields all default, so a missing
//! file means "use the defaults". Lookup order: an explicit `--config` path,
//! then `MACROPANEL_CONFIG`, then `./macropanel.toml` when present.
//!
//! Credentials never come from the config file. They are resolved once at
//! startup (explicit override, else environment, after loading `.env`) and
//! handed to the provider constructors.

use chrono::NaiveDate;
use macropanel_core::data::bls::BLS_BASE_URL;
use macropanel_core::data::fred::FRED_BASE_URL;
use macropanel_core::data::fredgraph::FREDGRAPH_BASE_URL;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Environment variable naming an alternate config file.
pub const CONFIG_ENV_VAR: &str = "MACROPANEL_CONFIG";
/// Config file picked up from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "macropanel.toml";

pub const FRED_API_KEY_VAR: &str = "FRED_API_KEY";
pub const BLS_API_KEY_VAR: &str = "BLS_API_KEY";

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("invalid date '{value}': expected YYYY-MM-DD")]
    InvalidDate { value: String },

    #[error(
        "missing credential: {var} is not set. Export it, add `{var}=<key>` to a .env file, \
         or pass --api-key"
    )]
    MissingCredential { var: String },
}

/// Directory layout and provider settings shared by every stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Raw per-series files written by `fetch` (and `fetch-bls` under `bls/`).
    pub raw_dir: PathBuf,
    /// Intermediate panel snapshots.
    pub processed_dir: PathBuf,
    /// Analysis-ready panels and reports.
    pub final_dir: PathBuf,
    /// First date requested from the providers.
    pub start_date: NaiveDate,
    /// Courtesy delay between provider requests.
    pub request_delay_ms: u64,
    pub fred_base_url: String,
    /// Keyless CSV endpoint used by `fetch-missing`.
    pub fredgraph_base_url: String,
    pub bls_base_url: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            processed_dir: PathBuf::from("data/processed"),
            final_dir: PathBuf::from("data/final"),
            start_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or(NaiveDate::MIN),
            request_delay_ms: 1000,
            fred_base_url: FRED_BASE_URL.to_string(),
            fredgraph_base_url: FREDGRAPH_BASE_URL.to_string(),
            bls_base_url: BLS_BASE_URL.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|reason| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Parse a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("serialize config: {e}"))
    }

    /// Resolve the config file by lookup order and load it, falling back to
    /// defaults when no file is found.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
        Self::discover_from(explicit, env_path.as_deref(), Path::new(DEFAULT_CONFIG_FILE))
    }

    fn discover_from(
        explicit: Option<&Path>,
        env_path: Option<&Path>,
        local: &Path,
    ) -> Result<Self, ConfigError> {
        if let Some(path) = explicit.or(env_path) {
            info!(path = %path.display(), "loading config");
            return Self::from_file(path);
        }
        if local.is_file() {
            info!(path = %local.display(), "loading config");
            return Self::from_file(local);
        }
        debug!("no config file found, using defaults");
        Ok(Self::default())
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// Raw BLS series live in a subdirectory of `raw_dir`.
    pub fn bls_dir(&self) -> PathBuf {
        self.raw_dir.join("bls")
    }

    pub fn raw_path(&self, file_name: &str) -> PathBuf {
        self.raw_dir.join(file_name)
    }

    pub fn processed_path(&self, file_name: &str) -> PathBuf {
        self.processed_dir.join(file_name)
    }

    pub fn final_path(&self, file_name: &str) -> PathBuf {
        self.final_dir.join(file_name)
    }
}

/// Parse a `YYYY-MM-DD` command-line date.
pub fn parse_date(value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| ConfigError::InvalidDate {
        value: value.to_string(),
    })
}

/// Load variables from a `.env` file in the working directory, if any.
/// Existing environment variables win.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => debug!(path = %path.display(), "loaded .env"),
        Err(_) => debug!("no .env file"),
    }
}

/// A resolved provider credential.
#[derive(Clone)]
pub struct Credentials {
    var: &'static str,
    key: String,
}

impl Credentials {
    /// An explicit non-empty override wins; otherwise `var` must be set in
    /// the environment.
    pub fn resolve(override_key: Option<&str>, var: &'static str) -> Result<Self, ConfigError> {
        let key = match override_key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => key.to_string(),
            None => std::env::var(var)
                .ok()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .ok_or_else(|| ConfigError::MissingCredential {
                    var: var.to_string(),
                })?,
        };
        Ok(Self { var, key })
    }

    pub fn fred(override_key: Option<&str>) -> Result<Self, ConfigError> {
        Self::resolve(override_key, FRED_API_KEY_VAR)
    }

    pub fn bls(override_key: Option<&str>) -> Result<Self, ConfigError> {
        Self::resolve(override_key, BLS_API_KEY_VAR)
    }

    pub fn var(&self) -> &str {
        self.var
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("var", &self.var)
            .field("key", &"<redacted>")
            .finish()
    }
}
