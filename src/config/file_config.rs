//! Configuration file support for citefetch.
//!
//! The file is TOML with flat, kebab-case keys. Every key is optional.
//!
//! # Configuration File Format
//!
//! ```toml
//! output = "refs.bib"
//! max-authors = 5
//! preferred-source = "inspire"
//! ads-api-key = "your-ads-token"
//! semantic-scholar-api-key = "your-s2-key"
//! timeout = 20
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::ConfigError;

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigFile {
    /// Output bibliography path
    #[serde(default)]
    pub output: Option<PathBuf>,

    /// Author list limit (0 = no limit)
    #[serde(default)]
    pub max_authors: Option<usize>,

    /// One of ads, inspire, semantic-scholar, auto
    #[serde(default)]
    pub preferred_source: Option<String>,

    #[serde(default)]
    pub ads_api_key: Option<String>,

    #[serde(default)]
    pub semantic_scholar_api_key: Option<String>,

    /// HTTP timeout in seconds
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl ConfigFile {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the empty configuration; a file that exists but
    /// does not parse is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .build()
            .map_err(|e| ConfigError::Load {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        settings.try_deserialize().map_err(|e| ConfigError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}
