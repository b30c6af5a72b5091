use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub gerrit: GerritConfig,
    pub crawler: CrawlerConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(".")
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Config::builder()
            .add_source(
                File::with_name(
                    path.as_ref()
                        .join("config/default")
                        .to_string_lossy()
                        .as_ref(),
                )
                .required(false),
            )
            .add_source(
                File::with_name(
                    path.as_ref()
                        .join("config/local")
                        .to_string_lossy()
                        .as_ref(),
                )
                .required(false),
            )
            .add_source(Environment::default().separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GerritConfig {
    /// Root of the Gerrit web UI, e.g. `https://review.opendev.org`.
    pub base_url: String,
    /// Project filter passed as `project:<repository>` in the change query.
    /// A value starting with `^` is a Gerrit project regex; the sink
    /// watermark then covers every stored project whose whole name matches.
    pub repository: String,
    #[serde(default = "GerritConfig::default_user_agent")]
    pub user_agent: String,
}

impl GerritConfig {
    fn default_user_agent() -> String {
        "gerrit-crawler".to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Lower bound used when the sink holds no change for the repository yet.
    /// Format: `YYYY-MM-DDTHH:MM:SSZ`.
    pub updated_since: String,
    #[serde(default = "CrawlerConfig::default_loop_delay_secs")]
    pub loop_delay_secs: u64,
    #[serde(default)]
    pub run_once: bool,
    #[serde(default = "CrawlerConfig::default_output_path")]
    pub output_path: String,
}

impl CrawlerConfig {
    const fn default_loop_delay_secs() -> u64 {
        300
    }

    fn default_output_path() -> String {
        "changes.jsonl".to_string()
    }
}
