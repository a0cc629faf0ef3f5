// Re-export modules
pub mod config;
pub mod error;
pub mod extract;
pub mod listing;
pub mod results;
pub mod screenshot;
pub mod session;
pub mod store;
pub mod vision;

// Re-export commonly used types for convenience
pub use config::ScrapeConfig;
pub use error::{HarvestError, Result};
pub use results::{ProductRecord, RunSummary, TerminationReason};

use crate::listing::WebListing;
use crate::screenshot::ScreenshotDir;
use crate::store::CsvStore;

/// Builder for configuring and running one scrape of a paginated listing.
pub struct Harvest {
    config: ScrapeConfig,
}

impl Harvest {
    /// Create a new Harvest for the given listing URL
    pub fn new(start_url: &str) -> Self {
        Self {
            config: ScrapeConfig::new(start_url),
        }
    }

    /// Use a prepared configuration
    pub fn with_config(config: ScrapeConfig) -> Self {
        Self { config }
    }

    /// Set the page cap
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.config.max_pages = max_pages;
        self
    }

    /// Enable or disable per-page full-page screenshots
    pub fn with_screenshots(mut self, capture: bool) -> Self {
        self.config.capture_screenshots = capture;
        self
    }

    /// Set the CSV output path
    pub fn with_output_path(mut self, path: &str) -> Self {
        self.config.output_path = path.to_string();
        self
    }

    /// Run the paginated extraction loop to completion.
    ///
    /// The browser session and the CSV store are both owned here and
    /// released on every exit path, including when the loop errors.
    pub async fn run(self) -> Result<RunSummary> {
        let config = self.config.apply_env_overrides();

        let client = session::connect(&config.webdriver_url).await?;

        let shots = if config.capture_screenshots {
            match ScreenshotDir::create() {
                Ok(dir) => Some(dir),
                Err(e) => {
                    ::log::warn!("screenshot directory unavailable, captures disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let mut store = match CsvStore::create(&config.output_path, config.capture_screenshots) {
            Ok(store) => store,
            Err(e) => {
                session::close(client).await;
                return Err(e);
            }
        };

        let start_url = config.start_url.clone();
        let max_pages = config.max_pages;
        let mut source = WebListing::new(client, config, shots);

        let result = listing::run_loop(&mut source, &mut store, &start_url, max_pages).await;

        source.close().await;
        if let Err(e) = store.close() {
            ::log::warn!("failed to close CSV store: {}", e);
        }

        result
    }
}
