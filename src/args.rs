use clap::Parser;
use page_harvest::config::{DEFAULT_START_URL, ScrapeConfig};

#[derive(Parser, Debug)]
#[command(name = "page-harvest")]
#[command(about = "Paginated listing scraper with crash-safe CSV output")]
#[command(version)]
pub struct Args {
    /// URL of the first listing page
    #[arg(default_value = DEFAULT_START_URL)]
    pub url: String,

    /// Maximum number of pages to process
    #[arg(short, long, default_value_t = 20)]
    pub max_pages: u32,

    /// Capture one full-page screenshot per page
    #[arg(short, long)]
    pub screenshots: bool,

    /// Path of the CSV output file
    #[arg(short, long, default_value = "laptops_progressive.csv")]
    pub output: String,

    /// WebDriver URL (WEBDRIVER_URL env var also works)
    #[arg(long, default_value = "http://localhost:4444")]
    pub webdriver_url: String,

    /// Load the full configuration from a JSON file instead (CLI flags ignored)
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,
}

/// Build the run configuration from the CLI, or from a JSON file when given
pub fn resolve_config(args: Args) -> page_harvest::Result<ScrapeConfig> {
    if let Some(path) = &args.config {
        return ScrapeConfig::from_file(path);
    }

    let mut config = ScrapeConfig::new(&args.url);
    config.max_pages = args.max_pages;
    config.capture_screenshots = args.screenshots;
    config.output_path = args.output;
    config.webdriver_url = args.webdriver_url;
    Ok(config)
}
