use clap::Parser;
use page_harvest::Harvest;

mod args;
use args::{Args, resolve_config};

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Parse command-line arguments
    let args = Args::parse();

    let config = match resolve_config(args) {
        Ok(config) => config,
        Err(e) => {
            ::log::error!("invalid configuration: {}", e);
            return;
        }
    };

    println!("Note: scraping requires a WebDriver server (e.g., ChromeDriver).");
    println!(
        "Set WEBDRIVER_URL environment variable if not using the default http://localhost:4444"
    );

    ::log::info!("starting scrape of: {}", config.start_url);
    let start_time = std::time::Instant::now();

    match Harvest::with_config(config).run().await {
        Ok(summary) => {
            let duration = start_time.elapsed();
            ::log::info!(
                "scrape complete: {} ({} pages, {} rows in {:.2} seconds)",
                summary.reason,
                summary.pages_processed,
                summary.records_written,
                duration.as_secs_f64()
            );
        }
        Err(e) => {
            ::log::error!("scrape aborted: {}", e);
        }
    }
}
