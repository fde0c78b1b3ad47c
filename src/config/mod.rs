//! Configuration management.
//!
//! Effective settings are layered: built-in defaults, then the config file,
//! then flags given on the command line. API keys also fall back to the
//! `ADS_API_KEY` and `SEMANTIC_SCHOLAR_API_KEY` environment variables.

mod file_config;

pub use file_config::ConfigFile;

use std::path::PathBuf;
use std::time::Duration;

use crate::models::PreferredSource;
use crate::sources::Credentials;
use crate::utils::DEFAULT_TIMEOUT;

/// Environment variable holding the ADS token
pub const ADS_API_KEY_ENV: &str = "ADS_API_KEY";

/// Environment variable holding the Semantic Scholar key
pub const SEMANTIC_SCHOLAR_API_KEY_ENV: &str = "SEMANTIC_SCHOLAR_API_KEY";

pub const DEFAULT_OUTPUT: &str = "references.bib";

pub const DEFAULT_MAX_AUTHORS: usize = 3;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load config file {}: {message}", path.display())]
    Load { path: PathBuf, message: String },

    #[error("Invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Values given explicitly on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub output: Option<PathBuf>,
    pub max_authors: Option<usize>,
    pub preferred: Option<PreferredSource>,
    pub ads_api_key: Option<String>,
    pub semantic_scholar_api_key: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Effective settings for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub output: PathBuf,
    pub max_authors: usize,
    pub preferred: PreferredSource,
    pub timeout: Duration,
    pub credentials: Credentials,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output: PathBuf::from(DEFAULT_OUTPUT),
            max_authors: DEFAULT_MAX_AUTHORS,
            preferred: PreferredSource::default(),
            timeout: DEFAULT_TIMEOUT,
            credentials: Credentials::default(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Settings {
    /// Combine defaults, the config file, CLI overrides and the environment.
    ///
    /// `env` looks up an environment variable; the binary passes
    /// `std::env::var(..).ok()`, tests pass a closure.
    pub fn resolve(
        file: ConfigFile,
        overrides: Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let defaults = Settings::default();

        let file_preferred = match file.preferred_source {
            Some(ref name) => Some(name.parse::<PreferredSource>().map_err(|message| {
                ConfigError::Invalid {
                    field: "preferred-source",
                    message,
                }
            })?),
            None => None,
        };

        let timeout = match overrides.timeout_secs.or(file.timeout) {
            Some(0) => {
                return Err(ConfigError::Invalid {
                    field: "timeout",
                    message: "must be at least 1 second".to_string(),
                })
            }
            Some(secs) => Duration::from_secs(secs),
            None => defaults.timeout,
        };

        let credentials = Credentials {
            ads_api_key: non_blank(overrides.ads_api_key)
                .or_else(|| non_blank(file.ads_api_key))
                .or_else(|| non_blank(env(ADS_API_KEY_ENV))),
            semantic_scholar_api_key: non_blank(overrides.semantic_scholar_api_key)
                .or_else(|| non_blank(file.semantic_scholar_api_key))
                .or_else(|| non_blank(env(SEMANTIC_SCHOLAR_API_KEY_ENV))),
        };

        Ok(Settings {
            output: overrides.output.or(file.output).unwrap_or(defaults.output),
            max_authors: overrides
                .max_authors
                .or(file.max_authors)
                .unwrap_or(defaults.max_authors),
            preferred: overrides
                .preferred
                .or(file_preferred)
                .unwrap_or(defaults.preferred),
            timeout,
            credentials,
        })
    }
}

/// Default config file location (`~/.config/citefetch/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("citefetch").join("config.toml"))
}
