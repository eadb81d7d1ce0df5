use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Listing crawled when `TARGET_URL` is not set: the "my threads" tab of a
/// Discuz user space.
pub const DEFAULT_TARGET_URL: &str =
    "https://klpbbs.com/home.php?mod=space&uid=2086093&do=thread&view=me&from=space";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Target
    pub target_url: Url,
    /// Raw `name=value; ...` cookie string; validated before the browser starts.
    pub cookie: Option<String>,

    // Browser
    pub chrome_path: Option<String>,
    pub headless: bool,
    pub page_timeout: Duration,

    // Crawl
    pub max_pages: usize,
    /// Replay saved `*.html` pages from this directory instead of browsing.
    pub fixture_dir: Option<PathBuf>,

    // Report
    pub report_dir: PathBuf,
    pub report_prefix: String,
    pub report_json: bool,
    pub report_partial_on_failure: bool,
    pub diagnostic_file: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Target
            target_url: parse_env_url("TARGET_URL", DEFAULT_TARGET_URL)?,
            cookie: optional_env("FORUM_COOKIE"),

            // Browser
            chrome_path: optional_env("CHROME_PATH"),
            headless: parse_env_bool("HEADLESS", true)?,
            page_timeout: Duration::from_secs(parse_env_u64("PAGE_TIMEOUT_SECS", 20)?),

            // Crawl
            max_pages: parse_env_usize("MAX_PAGES", 200)?,
            fixture_dir: optional_env("FIXTURE_DIR").map(PathBuf::from),

            // Report
            report_dir: PathBuf::from(env_or_default("REPORT_DIR", ".")),
            report_prefix: env_or_default("REPORT_PREFIX", "forum_thread_report"),
            report_json: parse_env_bool("REPORT_JSON", false)?,
            report_partial_on_failure: parse_env_bool("REPORT_PARTIAL_ON_FAILURE", false)?,
            diagnostic_file: env_or_default("DIAGNOSTIC_SCREENSHOT", "error_screenshot.png"),
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// The cookie is checked separately, right before the crawl starts.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_pages == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_PAGES".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.page_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "PAGE_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if !matches!(self.target_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                name: "TARGET_URL".to_string(),
                message: format!("must be an http(s) URL, got '{}'", self.target_url),
            });
        }
        if self.report_prefix.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "REPORT_PREFIX".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Root of the forum site, where the session cookies are installed.
    #[must_use]
    pub fn forum_origin(&self) -> Url {
        let mut origin = self.target_url.clone();
        origin.set_path("/");
        origin.set_query(None);
        origin.set_fragment(None);
        origin
    }

    /// Where a failed page's screenshot is written.
    #[must_use]
    pub fn diagnostic_path(&self) -> PathBuf {
        self.report_dir.join(&self.diagnostic_file)
    }

    /// Configuration with defaults and no environment access.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            target_url: Url::parse(DEFAULT_TARGET_URL).expect("default target URL is valid"),
            cookie: Some("auth=test".to_string()),
            chrome_path: None,
            headless: true,
            page_timeout: Duration::from_secs(5),
            max_pages: 50,
            fixture_dir: None,
            report_dir: PathBuf::from("."),
            report_prefix: "forum_thread_report".to_string(),
            report_json: false,
            report_partial_on_failure: false,
            diagnostic_file: "error_screenshot.png".to_string(),
        }
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_url(name: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = env_or_default(name, default);
    Url::parse(&raw).map_err(|e| ConfigError::InvalidValue {
        name: name.to_string(),
        message: format!("'{raw}' is not a URL: {e}"),
    })
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}
