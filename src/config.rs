//! Harness configuration.
//!
//! Everything the harness needs from the outside world is in
//! [`HarnessConfig`], most importantly the path of the disc image that boots
//! the FTP server. It is loaded from a TOML file or string, with
//! `FTP_HARNESS_*` environment variables layered on top, and validated once.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use super::listing::ListingFormat;
use super::types::Mode;

/// Prefix of environment overrides, e.g. `FTP_HARNESS_USERNAME`.
pub const ENV_PREFIX: &str = "FTP_HARNESS";

#[derive(Debug, Deserialize, Clone)]
pub struct HarnessConfig {
    /// Disc image the console boots, which starts the FTP server.
    pub dvd_image: PathBuf,

    #[serde(default = "default_credential")]
    pub username: String,

    #[serde(default = "default_credential")]
    pub password: String,

    #[serde(default)]
    pub mode: Mode,

    /// Read/write timeout on the control connection.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Drive letters a blank disk exposes at `/`, in listing order.
    #[serde(default = "default_drives")]
    pub drives: Vec<String>,

    /// Metadata columns before the name in `LIST` lines.
    #[serde(default = "default_listing_fields")]
    pub listing_fields: usize,
}

fn default_credential() -> String {
    "xbox".to_owned()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_drives() -> Vec<String> {
    ["C", "E", "F", "X", "Y", "Z"].iter().map(|d| d.to_string()).collect()
}

fn default_listing_fields() -> usize {
    ListingFormat::default().metadata_fields()
}

impl HarnessConfig {
    /// Defaults for everything but the disc image.
    pub fn new<P: Into<PathBuf>>(dvd_image: P) -> HarnessConfig {
        HarnessConfig {
            dvd_image: dvd_image.into(),
            username: default_credential(),
            password: default_credential(),
            mode: Mode::default(),
            timeout_secs: default_timeout_secs(),
            drives: default_drives(),
            listing_fields: default_listing_fields(),
        }
    }

    /// Load configuration from a TOML file with environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::build(File::from(path).format(FileFormat::Toml))
    }

    /// Load configuration from TOML text with environment overrides.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Self::build(File::from_str(text, FileFormat::Toml))
    }

    fn build<S>(source: S) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        Self::build_with_prefix(source, ENV_PREFIX)
    }

    fn build_with_prefix<S>(source: S, prefix: &str) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings = Config::builder()
            .add_source(source)
            .add_source(Environment::with_prefix(prefix))
            .build()?;
        let config: HarnessConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn listing_format(&self) -> ListingFormat {
        ListingFormat::with_metadata_fields(self.listing_fields)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dvd_image.as_os_str().is_empty() {
            return Err(ConfigError::Message("dvd_image cannot be empty".into()));
        }

        if self.username.is_empty() {
            return Err(ConfigError::Message("username cannot be empty".into()));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::Message("timeout_secs must be greater than 0".into()));
        }

        if self.drives.is_empty() {
            return Err(ConfigError::Message("drives cannot be empty".into()));
        }

        if let Some(bad) = self
            .drives
            .iter()
            .find(|d| d.len() != 1 || !d.chars().all(|c| c.is_ascii_uppercase()))
        {
            return Err(ConfigError::Message(format!(
                "drive {:?} is not a single uppercase letter",
                bad
            )));
        }

        if self.listing_fields == 0 {
            return Err(ConfigError::Message("listing_fields must be greater than 0".into()));
        }

        Ok(())
    }
}
