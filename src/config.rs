use crate::error::{HarvestError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Default listing URL (the webscraper.io AJAX test catalog)
pub const DEFAULT_START_URL: &str =
    "https://webscraper.io/test-sites/e-commerce/ajax/computers/laptops";

/// Configuration for one scrape run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// URL of the first listing page
    pub start_url: String,

    /// Maximum number of pages to process
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Whether to capture one full-page screenshot per page
    #[serde(default)]
    pub capture_screenshots: bool,

    /// Path of the CSV output file
    #[serde(default = "default_output_path")]
    pub output_path: String,

    /// Budget for each wait-for-content poll, in seconds
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,

    /// Interval between content polls, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Settle delay after page actions, in milliseconds
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Delay after a pagination click before polling for content, in milliseconds
    #[serde(default = "default_page_load_delay_ms")]
    pub page_load_delay_ms: u64,
}

impl ScrapeConfig {
    /// Create a new configuration with default values
    pub fn new(start_url: &str) -> Self {
        Self {
            start_url: start_url.to_string(),
            max_pages: default_max_pages(),
            webdriver_url: default_webdriver_url(),
            capture_screenshots: false,
            output_path: default_output_path(),
            wait_timeout_secs: default_wait_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            page_load_delay_ms: default_page_load_delay_ms(),
        }
    }

    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| HarvestError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Override the WebDriver URL from the environment, as driver setups vary
    /// between machines
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
            if !webdriver_url.is_empty() {
                self.webdriver_url = webdriver_url;
            }
        }
        self
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self::new(DEFAULT_START_URL)
    }
}

/// Default value for max_pages
fn default_max_pages() -> u32 {
    20
}

/// Default value for webdriver_url
fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

/// Default value for output_path
fn default_output_path() -> String {
    "laptops_progressive.csv".to_string()
}

/// Default wait budget for content polls
fn default_wait_timeout_secs() -> u64 {
    20
}

/// Default poll interval
fn default_poll_interval_ms() -> u64 {
    500
}

/// Default settle delay between actions
fn default_settle_delay_ms() -> u64 {
    2000
}

/// Default delay after a pagination click
fn default_page_load_delay_ms() -> u64 {
    4000
}
