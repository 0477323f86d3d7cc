// Configuration loading and validation (config.toml).
//
// Every key is optional. A missing file yields the defaults, which match the
// live site: backloggd.com, the `main_game,remake` category filter, 100ms
// debounce and mount retry.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Datelike;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://backloggd.com";
pub const DEFAULT_CATEGORIES: &str = "main_game,remake";
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;
pub const DEFAULT_MOUNT_RETRY_MS: u64 = 100;
pub const DEFAULT_MOUNT_RETRY_LIMIT: u32 = 50;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

const CONFIG_FILE_NAME: &str = "config.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

// ---------------------------------------------------------------------------
// Assembled config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub site: SiteConfig,
    pub timing: TimingConfig,
}

/// Where the listing lives and which slice of it the panel shows.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteConfig {
    pub base_url: Url,
    pub categories: String,
    /// Release year the panel is about. Resolved once at load time.
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimingConfig {
    pub debounce: Duration,
    pub mount_retry: Duration,
    pub mount_retry_limit: u32,
    pub request_timeout: Duration,
}

impl SiteConfig {
    /// Path of the filtered listing for one profile, relative to the site
    /// origin. Also used as the panel's "See More" target.
    pub fn listing_path(&self, profile_id: &str) -> String {
        format!(
            "/u/{profile_id}/games/user-rating/type:played;release_year:{};category:{}",
            self.year, self.categories
        )
    }

    /// Absolute listing URL for one profile.
    pub fn listing_url(&self, profile_id: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(&self.listing_path(profile_id))
    }
}

// ---------------------------------------------------------------------------
// config.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    site: SiteSection,
    timing: TimingSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct SiteSection {
    base_url: String,
    categories: String,
    year: Option<i32>,
}

impl Default for SiteSection {
    fn default() -> Self {
        SiteSection {
            base_url: DEFAULT_BASE_URL.to_string(),
            categories: DEFAULT_CATEGORIES.to_string(),
            year: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct TimingSection {
    debounce_ms: u64,
    mount_retry_ms: u64,
    mount_retry_limit: u32,
    request_timeout_secs: u64,
}

impl Default for TimingSection {
    fn default() -> Self {
        TimingSection {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            mount_retry_ms: DEFAULT_MOUNT_RETRY_MS,
            mount_retry_limit: DEFAULT_MOUNT_RETRY_LIMIT,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Defaults only, no file involved.
pub fn default_config() -> Result<Config, ConfigError> {
    assemble(ConfigFile::default())
}

/// Parse config from TOML text. Used by `load_config_from` and by tests
/// that want a specific setup without touching the filesystem.
pub fn config_from_str(text: &str) -> Result<Config, ConfigError> {
    parse_str(text, Path::new("<inline>"))
}

/// Load config from `path`. A missing file is not an error: the defaults
/// apply.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return default_config();
    }
    let text = read_file(path)?;
    parse_str(&text, path)
}

/// Load config from an explicit path (which must exist) or from the
/// platform config directory (which may not).
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    match explicit {
        Some(path) => {
            let text = read_file(path)?;
            parse_str(&text, path)
        }
        None => match default_config_path() {
            Some(path) => load_config_from(&path),
            None => default_config(),
        },
    }
}

/// `<platform config dir>/favpanel/config.toml`, if the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "favpanel")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

fn parse_str(text: &str, path: &Path) -> Result<Config, ConfigError> {
    let file: ConfigFile = toml::from_str(text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;
    assemble(file)
}

fn assemble(file: ConfigFile) -> Result<Config, ConfigError> {
    let base_url = Url::parse(&file.site.base_url).map_err(|e| ConfigError::ValidationError {
        field: "site.base_url".into(),
        message: format!("not a valid URL: {e}"),
    })?;

    let year = file
        .site
        .year
        .unwrap_or_else(|| chrono::Local::now().year());

    let config = Config {
        site: SiteConfig {
            base_url,
            categories: file.site.categories.trim().to_string(),
            year,
        },
        timing: TimingConfig {
            debounce: Duration::from_millis(file.timing.debounce_ms),
            mount_retry: Duration::from_millis(file.timing.mount_retry_ms),
            mount_retry_limit: file.timing.mount_retry_limit,
            request_timeout: Duration::from_secs(file.timing.request_timeout_secs),
        },
    };

    validate(&config)?;

    Ok(config)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let base = &config.site.base_url;
    if !matches!(base.scheme(), "http" | "https") || base.host_str().is_none() {
        return Err(ConfigError::ValidationError {
            field: "site.base_url".into(),
            message: format!("must be an http(s) URL with a host, got {base}"),
        });
    }

    if config.site.categories.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "site.categories".into(),
            message: "must not be empty".into(),
        });
    }

    if !(1970..=9999).contains(&config.site.year) {
        return Err(ConfigError::ValidationError {
            field: "site.year".into(),
            message: format!("must be between 1970 and 9999, got {}", config.site.year),
        });
    }

    let t = &config.timing;
    let durations: &[(&str, Duration)] = &[
        ("timing.debounce_ms", t.debounce),
        ("timing.mount_retry_ms", t.mount_retry),
        ("timing.request_timeout_secs", t.request_timeout),
    ];
    for (name, val) in durations {
        if val.is_zero() {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must be > 0".into(),
            });
        }
    }

    if t.mount_retry_limit == 0 {
        return Err(ConfigError::ValidationError {
            field: "timing.mount_retry_limit".into(),
            message: "must be > 0".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
