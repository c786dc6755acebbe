use std::fs;
use std::num::NonZeroUsize;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::MirrorError;
use crate::manifest::DEFAULT_MANIFEST_PATH;
use crate::transfer::{Concurrency, TransferOptions};

pub const DEFAULT_CONFIG_FILE: &str = "ndex-mirror.json";
pub const DEFAULT_NDEX_BASE_URL: &str = "http://ndexbio.org/v2";
pub const DEFAULT_SEARCH_SIZE: u64 = 1_000_000;
pub const DEFAULT_BUCKET: &str = "cx.ndex.test";
pub const DEFAULT_MAX_CONCURRENT: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub ndex_base_url: String,
    /// Result-size ceiling for the single search request.
    pub search_size: u64,
    /// Total per-request timeout; `None` leaves long downloads unbounded.
    pub request_timeout_secs: Option<u64>,
    pub bucket: String,
    /// Overrides the region resolved from the AWS shared config.
    pub region: Option<String>,
    /// S3-compatible endpoint used instead of AWS; implies path-style URLs.
    pub s3_endpoint_url: Option<String>,
    pub manifest_path: Utf8PathBuf,
    /// Worker count for transfers; 0 launches one worker per manifest entry.
    pub max_concurrent: usize,
    pub fail_fast: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ndex_base_url: DEFAULT_NDEX_BASE_URL.to_string(),
            search_size: DEFAULT_SEARCH_SIZE,
            request_timeout_secs: None,
            bucket: DEFAULT_BUCKET.to_string(),
            region: None,
            s3_endpoint_url: None,
            manifest_path: Utf8PathBuf::from(DEFAULT_MANIFEST_PATH),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            fail_fast: true,
        }
    }
}

impl Config {
    pub fn transfer_options(&self) -> TransferOptions {
        let concurrency = match NonZeroUsize::new(self.max_concurrent) {
            Some(limit) => Concurrency::Limited(limit),
            None => Concurrency::Unbounded,
        };
        TransferOptions {
            concurrency,
            fail_fast: self.fail_fast,
        }
    }

    pub fn validate(&self) -> Result<(), MirrorError> {
        if !is_http_url(&self.ndex_base_url) {
            return Err(MirrorError::InvalidConfig(format!(
                "ndex_base_url must be an http(s) URL: {}",
                self.ndex_base_url
            )));
        }
        if let Some(endpoint_url) = &self.s3_endpoint_url {
            if !is_http_url(endpoint_url) {
                return Err(MirrorError::InvalidConfig(format!(
                    "s3_endpoint_url must be an http(s) URL: {endpoint_url}"
                )));
            }
        }
        if self.search_size == 0 {
            return Err(MirrorError::InvalidConfig(
                "search_size must be greater than zero".to_string(),
            ));
        }
        if self.bucket.trim().is_empty() {
            return Err(MirrorError::InvalidConfig(
                "bucket must not be empty".to_string(),
            ));
        }
        if self.manifest_path.as_str().is_empty() {
            return Err(MirrorError::InvalidConfig(
                "manifest_path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `ndex-mirror.json` from the working directory when no
    /// path is given. Only the implicit file may be absent, in which case the
    /// built-in defaults apply.
    pub fn resolve(path: Option<&str>) -> Result<Config, MirrorError> {
        let config_path = match path {
            Some(path) => Utf8PathBuf::from(path),
            None => Utf8PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.as_std_path().exists() {
            tracing::debug!("no {DEFAULT_CONFIG_FILE} found, using defaults");
            return Ok(Config::default());
        }

        Self::load(&config_path)
    }

    pub fn load(path: &Utf8Path) -> Result<Config, MirrorError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|_| MirrorError::ConfigRead(path.to_owned()))?;
        let config = Self::parse(&content)?;
        tracing::debug!(path = %path, "loaded config");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Config, MirrorError> {
        let config: Config = serde_json::from_str(content)
            .map_err(|err| MirrorError::ConfigParse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
