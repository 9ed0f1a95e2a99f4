//! Configuration infrastructure
//!
//! One `AppConfig` value is constructed at process start and passed by
//! constructor injection into the record processor, reconciliation engine,
//! and collection driver. No global config singleton.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tracing::info;

use crate::domain::listing::GRACE_PERIOD_DAYS;

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Collection run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Administrative area codes (법정동코드) to collect, in run order.
    pub regions: Vec<String>,

    /// Upper bound on search pages per region.
    pub max_pages_per_region: u32,

    /// Courtesy delay between search-page requests in milliseconds.
    pub request_delay_ms: u64,

    /// Maximum concurrent detail fetches within one page of results.
    pub detail_max_concurrent: usize,

    /// Consecutive missing days tolerated before soft delete.
    pub grace_period_days: i64,

    /// SQLite database file location.
    pub database_path: PathBuf,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            regions: Vec::new(),
            max_pages_per_region: 50,
            request_delay_ms: 800,
            detail_max_concurrent: 4,
            grace_period_days: GRACE_PERIOD_DAYS,
            database_path: PathBuf::from("land_collector.db"),
        }
    }
}

/// Portal API endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub referer: String,
    pub request_timeout_seconds: u64,
    pub max_retries: u32,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://new.land.naver.com".to_string(),
            referer: "https://new.land.naver.com/".to_string(),
            request_timeout_seconds: 30,
            max_retries: 3,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        }
    }
}

/// Logging configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable console output
    pub console_output: bool,

    /// Enable daily-rolled file output
    pub file_output: bool,

    /// Directory for log files when file output is enabled
    pub log_dir: PathBuf,

    /// Module-specific log level filters (e.g., "sqlx": "warn")
    pub module_filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: false,
            log_dir: PathBuf::from("logs"),
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("sqlx".to_string(), "warn".to_string());
                filters.insert("reqwest".to_string(), "warn".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters
            },
        }
    }
}

/// Configuration manager for loading and saving settings.
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join("land-collector");
        Ok(config_dir)
    }

    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_dir()?.join("land_collector_config.json");
        Ok(Self { config_path })
    }

    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Load the config, writing defaults on first run.
    pub async fn initialize_or_load(&self) -> Result<AppConfig> {
        let config_dir = self
            .config_path
            .parent()
            .context("Failed to get config directory")?;
        if !config_dir.exists() {
            fs::create_dir_all(config_dir)
                .await
                .context("Failed to create config directory")?;
            info!("✅ created configuration directory: {:?}", config_dir);
        }

        if self.config_path.exists() {
            self.load_config().await
        } else {
            info!("🎉 first run detected - writing default configuration");
            let default_config = AppConfig::default();
            self.save_config(&default_config).await?;
            Ok(default_config)
        }
    }

    pub async fn load_config(&self) -> Result<AppConfig> {
        let contents = fs::read_to_string(&self.config_path)
            .await
            .with_context(|| format!("Failed to read config file: {:?}", self.config_path))?;
        let config: AppConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", self.config_path))?;
        Ok(config)
    }

    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        let contents =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;
        fs::write(&self.config_path, contents)
            .await
            .with_context(|| format!("Failed to write config file: {:?}", self.config_path))?;
        Ok(())
    }
}
