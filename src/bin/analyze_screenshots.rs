use clap::Parser;
use page_harvest::vision::{
    self, PageAnalysis, VisionAnalyzer, latest_screenshot_dir, screenshot_files,
};
use std::path::PathBuf;
use std::time::Duration;

/// Delay between vision requests, to respect external rate limits
const INTER_REQUEST_DELAY: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "analyze-screenshots")]
#[command(about = "Re-derive product data from page screenshots via a vision model")]
#[command(version)]
pub struct Args {
    /// Screenshot directory (defaults to the latest screenshots_* directory)
    pub folder: Option<PathBuf>,

    /// Path of the flattened per-product CSV output
    #[arg(short, long, default_value = "gemini_analysis.csv")]
    pub output: String,

    /// Path of the full JSON dump
    #[arg(long, default_value = "analysis_results.json")]
    pub json_output: String,

    /// Vision model to query
    #[arg(long, default_value = "gemini-2.0-flash")]
    pub model: String,

    /// API key (falls back to the GEMINI_API_KEY environment variable)
    #[arg(long)]
    pub api_key: Option<String>,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    let args = Args::parse();

    let api_key = match args
        .api_key
        .or_else(|| std::env::var("GEMINI_API_KEY").ok())
        .filter(|k| !k.is_empty())
    {
        Some(key) => key,
        None => {
            ::log::error!("no API key: pass --api-key or set GEMINI_API_KEY");
            return;
        }
    };

    let folder = match args
        .folder
        .or_else(|| latest_screenshot_dir(std::path::Path::new(".")))
    {
        Some(folder) => folder,
        None => {
            ::log::error!("no screenshots_* directory found; run the scraper with -s first");
            return;
        }
    };
    ::log::info!("analyzing screenshots in {}", folder.display());

    let files = match screenshot_files(&folder) {
        Ok(files) if !files.is_empty() => files,
        Ok(_) => {
            ::log::error!("no page_*.png captures in {}", folder.display());
            return;
        }
        Err(e) => {
            ::log::error!("could not list {}: {}", folder.display(), e);
            return;
        }
    };
    ::log::info!("{} captures found", files.len());

    let analyzer = VisionAnalyzer::new(api_key).with_model(&args.model);
    let mut results: Vec<PageAnalysis> = Vec::with_capacity(files.len());

    for (idx, file) in files.iter().enumerate() {
        let page = idx as u32 + 1;
        if let Some(analysis) = analyzer.analyze_image(file, page).await {
            results.push(analysis);
        }

        if idx + 1 < files.len() {
            tokio::time::sleep(INTER_REQUEST_DELAY).await;
        }
    }

    if let Err(e) = vision::write_results_csv(&results, &args.output) {
        ::log::error!("could not write {}: {}", args.output, e);
    }
    if let Err(e) = vision::write_results_json(&results, &args.json_output) {
        ::log::error!("could not write {}: {}", args.json_output, e);
    }

    ::log::info!(
        "analysis complete: {} of {} pages parsed",
        results.len(),
        files.len()
    );
}
