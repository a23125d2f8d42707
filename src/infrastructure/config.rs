//! Configuration infrastructure
//!
//! Settings are layered with the `config` crate: built-in defaults, then an
//! optional JSON/TOML file, then `DIRCRAWL_*` environment variables
//! (`__` separates nested keys, e.g. `DIRCRAWL_PIPELINE__MODE=concurrent`).

#![allow(clippy::struct_excessive_bools)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "DIRCRAWL";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    Load {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },

    #[error("Failed to write config to {path}: {message}")]
    Write { path: String, message: String },
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub site: SiteConfig,
    pub scroll: ScrollConfig,
    pub http: HttpConfig,
    pub selectors: SelectorConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// Target site layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Listing root for the default locale; other locales append their prefix
    pub base_url: String,

    /// Path segment every entity identifier lives under
    pub entity_path: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://example.org".to_string(),
            entity_path: "/names".to_string(),
        }
    }
}

/// Infinite-scroll emulation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrollConfig {
    /// Viewport advances per render call
    pub steps_per_render: u32,

    /// Pixels per viewport advance
    pub step_height: u32,

    /// A render call exceeding this aborts the run
    pub render_timeout_secs: u64,

    /// Settle time after the scroll script, letting lazy content load
    pub settle_sleep_secs: u64,

    /// Randomized pacing before a locale pass starts
    pub start_delay_min_ms: u64,
    pub start_delay_max_ms: u64,

    /// Give up after this many failed steps in a row; unset retries forever
    pub max_consecutive_failures: Option<u32>,
}

impl ScrollConfig {
    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    pub fn settle_sleep(&self) -> Duration {
        Duration::from_secs(self.settle_sleep_secs)
    }
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            steps_per_render: 5,
            step_height: 300,
            render_timeout_secs: 30,
            settle_sleep_secs: 2,
            start_delay_min_ms: 1000,
            start_delay_max_ms: 2000,
            max_consecutive_failures: None,
        }
    }
}

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
    pub follow_redirects: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36".to_string(),
            timeout_seconds: 30,
            max_requests_per_second: 5,
            follow_redirects: true,
        }
    }
}

/// CSS selectors, tried in order until one matches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Entity links on listing pages; the link text is the locale name
    pub listing_link: Vec<String>,

    /// Entity title on its detail page
    pub detail_title: Vec<String>,

    /// Links from an entity page to its detail sub-pages
    pub detail_link: Vec<String>,

    /// Title of a detail sub-page
    pub sub_record_title: Vec<String>,

    /// Named fields captured from a detail sub-page
    pub sub_record_fields: BTreeMap<String, String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        let mut sub_record_fields = BTreeMap::new();
        sub_record_fields.insert("date".to_string(), ".event-date".to_string());
        sub_record_fields.insert("place".to_string(), ".event-place".to_string());
        sub_record_fields.insert("description".to_string(), ".event-description".to_string());

        Self {
            listing_link: vec![
                "a[href*='/names/']".to_string(),
                ".names-list a".to_string(),
            ],
            detail_title: vec![
                "h1[class*='post-title translation-view']".to_string(),
            ],
            detail_link: vec![
                "a[href*='/events/']".to_string(),
                ".events-list a".to_string(),
            ],
            sub_record_title: vec![
                "h1".to_string(),
                ".post-title".to_string(),
            ],
            sub_record_fields,
        }
    }
}

/// How the locale passes are driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CrawlMode {
    #[default]
    Sequential,
    Concurrent,
}

/// What the concurrent mode does with the per-locale results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Reconciliation {
    /// Single writer merges every worker's stubs into one set
    #[default]
    Merged,
    /// Each worker keeps a private set; records are never reconciled across locales
    Partitioned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// Plain HTTP fetch; the listing never grows
    #[default]
    Static,
    /// Headless Chromium (requires the `browser` feature)
    Chromium,
}

/// Pipeline orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub mode: CrawlMode,
    pub reconciliation: Reconciliation,
    pub renderer: RendererKind,

    /// Extra attempts per entity before it is emitted as partial
    pub enrichment_retry_count: u32,
    pub enrichment_retry_delay_ms: u64,

    pub checkpoint_dir: PathBuf,
    pub checkpoint_name: String,

    pub output_dir: PathBuf,
    pub output_prefix: String,
    pub output_format: OutputFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: CrawlMode::Sequential,
            reconciliation: Reconciliation::Merged,
            renderer: RendererKind::Static,
            enrichment_retry_count: 2,
            enrichment_retry_delay_ms: 1000,
            checkpoint_dir: PathBuf::from("temp"),
            checkpoint_name: "entities".to_string(),
            output_dir: PathBuf::from("."),
            output_prefix: "entities".to_string(),
            output_format: OutputFormat::Json,
        }
    }
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    pub console_output: bool,
    pub file_output: bool,

    pub log_dir: PathBuf,

    /// Receives every record at or above `level`
    pub log_file_name: String,

    /// Receives ERROR records only, for postmortems
    pub error_log_file_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: true,
            log_dir: PathBuf::from("logs"),
            log_file_name: "directory-crawler.log".to_string(),
            error_log_file_name: "directory-crawler.error.log".to_string(),
        }
    }
}

impl AppConfig {
    /// Per-user default config location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("directory-crawler").join("config.json"))
    }

    /// Load defaults, then `path` (or the per-user file if present), then environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?);

        let file = path
            .map(Path::to_path_buf)
            .or_else(|| Self::default_path().filter(|p| p.exists()));
        if let Some(file) = &file {
            builder = builder.add_source(config::File::from(file.as_path()));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;

        if let Some(file) = file {
            info!("Loaded configuration from: {:?}", file);
        }
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| {
            Err(ConfigError::Validation {
                message: message.to_string(),
            })
        };

        if url::Url::parse(&self.site.base_url).is_err() {
            return invalid("site.base_url must be an absolute URL");
        }
        if !self.site.entity_path.starts_with('/') {
            return invalid("site.entity_path must start with '/'");
        }
        if self.scroll.steps_per_render == 0 || self.scroll.step_height == 0 {
            return invalid("scroll.steps_per_render and scroll.step_height must be greater than 0");
        }
        if self.scroll.render_timeout_secs == 0 {
            return invalid("scroll.render_timeout_secs must be greater than 0");
        }
        if self.scroll.max_consecutive_failures == Some(0) {
            return invalid("scroll.max_consecutive_failures must be greater than 0 when set");
        }
        if self.scroll.start_delay_min_ms > self.scroll.start_delay_max_ms {
            return invalid("scroll.start_delay_min_ms cannot be greater than start_delay_max_ms");
        }
        if self.http.max_requests_per_second == 0 {
            return invalid("http.max_requests_per_second must be greater than 0");
        }
        if self.http.timeout_seconds == 0 {
            return invalid("http.timeout_seconds must be greater than 0");
        }
        if self.selectors.listing_link.is_empty() || self.selectors.detail_title.is_empty() {
            return invalid("selectors.listing_link and selectors.detail_title cannot be empty");
        }
        Ok(())
    }

    /// Write this configuration as pretty JSON
    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |message: String| ConfigError::Write {
            path: path.display().to_string(),
            message,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| write_error(e.to_string()))?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| write_error(e.to_string()))?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| write_error(e.to_string()))?;

        info!("Saved configuration to: {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scroll.steps_per_render, 5);
        assert_eq!(config.scroll.step_height, 300);
        assert_eq!(config.scroll.render_timeout_secs, 30);
        assert_eq!(config.scroll.max_consecutive_failures, None);
    }

    #[test]
    fn zero_rate_limit_is_rejected() {
        let mut config = AppConfig::default();
        config.http.max_requests_per_second = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn zero_failure_cap_is_rejected() {
        let mut config = AppConfig::default();
        config.scroll.max_consecutive_failures = Some(0);
        assert!(matches!(config.validate(), Err(ConfigError::Validation { .. })));

        config.scroll.max_consecutive_failures = Some(1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn relative_base_url_is_rejected() {
        let mut config = AppConfig::default();
        config.site.base_url = "/names".to_string();
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn saved_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.site.base_url = "https://directory.test".to_string();
        config.pipeline.mode = CrawlMode::Concurrent;
        config.pipeline.reconciliation = Reconciliation::Partitioned;
        config.save(&path).await.unwrap();

        let loaded = AppConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(loaded.site.base_url, "https://directory.test");
        assert_eq!(loaded.pipeline.mode, CrawlMode::Concurrent);
        assert_eq!(loaded.pipeline.reconciliation, Reconciliation::Partitioned);
        assert_eq!(loaded.scroll.step_height, 300);
    }
}
