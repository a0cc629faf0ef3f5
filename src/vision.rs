use crate::error::{HarvestError, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Fixed extraction prompt sent with every screenshot.
pub const ANALYSIS_PROMPT: &str = r#"
Analyze this laptop catalog page.

For every visible product, extract the following fields as JSON:
- title: product name
- price: price (number only, no currency symbol)
- description: technical description
- reviews: review count
- rating: score out of 5 (count the stars)
- stock_status: "In stock", "Out of stock" or "Unknown"
- promotions: are any promotions visible? (yes/no)
- visual_quality: quality of the product image (good/average/poor)

Return ONLY valid JSON in this shape:
{
    "page": page_number,
    "products": [
        {
            "title": "...",
            "price": "...",
            "description": "...",
            "reviews": "...",
            "rating": ...,
            "stock_status": "...",
            "promotions": "...",
            "visual_quality": "..."
        }
    ],
    "page_layout": "description of the overall layout",
    "total_products": product_count
}

Use "N/A" for anything you cannot extract.
"#;

static RUN_DIR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^screenshots_\d{8}_\d{6}$").expect("dir pattern is valid"));

/// Structured result for one analyzed screenshot.
///
/// `products`, `page_layout` and `total_products` are required; a response
/// missing any of them fails to parse and the image is skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageAnalysis {
    /// Overwritten with the screenshot's page index after parsing
    #[serde(default)]
    pub page: u32,
    pub products: Vec<VisionProduct>,
    pub page_layout: String,
    pub total_products: u64,
}

/// One product as the vision model saw it. Fields stay as raw JSON values
/// since the model mixes numbers, strings and "N/A".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisionProduct {
    #[serde(default)]
    pub title: Value,
    #[serde(default)]
    pub price: Value,
    #[serde(default)]
    pub description: Value,
    #[serde(default)]
    pub reviews: Value,
    #[serde(default)]
    pub rating: Value,
    #[serde(default)]
    pub stock_status: Value,
    #[serde(default)]
    pub promotions: Value,
    #[serde(default)]
    pub visual_quality: Value,
}

/// Render a vision field for CSV output, with the documented "N/A" default.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => "N/A".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Strip markdown code fences the model sometimes wraps its JSON in.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed);
    trimmed.trim()
}

/// Parse a model reply into a [`PageAnalysis`], pinning the page index.
pub fn parse_analysis(text: &str, page: u32) -> Result<PageAnalysis> {
    let body = strip_code_fences(text);
    let mut analysis: PageAnalysis =
        serde_json::from_str(body).map_err(|e| HarvestError::Vision(e.to_string()))?;
    analysis.page = page;
    Ok(analysis)
}

/// Client for the Gemini multimodal API.
pub struct VisionAnalyzer {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl VisionAnalyzer {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Analyze one screenshot. Any failure (read, request, parse) is logged
    /// and yields `None`; the caller moves on to the next image, no retry.
    pub async fn analyze_image(&self, path: &Path, page: u32) -> Option<PageAnalysis> {
        ::log::info!("analyzing page {} ({})", page, path.display());

        let png = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                ::log::error!("could not read {}: {}", path.display(), e);
                return None;
            }
        };

        let reply = match self.request(&png).await {
            Ok(text) => text,
            Err(e) => {
                ::log::error!("vision request for page {} failed: {}", page, e);
                return None;
            }
        };

        match parse_analysis(&reply, page) {
            Ok(analysis) => {
                ::log::info!(
                    "page {}: {} products reported by the model",
                    page,
                    analysis.total_products
                );
                Some(analysis)
            }
            Err(e) => {
                ::log::warn!(
                    "unparseable reply for page {} ({}): {:.200}",
                    page,
                    e,
                    reply
                );
                None
            }
        }
    }

    async fn request(&self, png: &[u8]) -> Result<String> {
        let body = serde_json::json!({
            "contents": [{
                "parts": [
                    { "text": ANALYSIS_PROMPT },
                    {
                        "inline_data": {
                            "mime_type": "image/png",
                            "data": BASE64.encode(png),
                        }
                    }
                ]
            }]
        });

        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_ENDPOINT, self.model, self.api_key
        );
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| HarvestError::Vision(e.to_string()))?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| HarvestError::Vision(e.to_string()))?;

        if !status.is_success() {
            return Err(HarvestError::Vision(format!(
                "API error {}: {}",
                status, payload
            )));
        }

        payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| HarvestError::Vision("reply carries no text part".to_string()))
    }
}

/// Most recently created run-scoped screenshot directory under `base`.
pub fn latest_screenshot_dir(base: &Path) -> Option<PathBuf> {
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(base)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| RUN_DIR_PATTERN.is_match(name))
        })
        .map(|entry| entry.path())
        .collect();

    // Timestamp names sort chronologically.
    dirs.sort();
    dirs.pop()
}

/// The `page_*.png` captures of one run, in page order.
pub fn screenshot_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("page_") && name.ends_with(".png"))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Write the flattened per-product CSV (one row per product per page).
pub fn write_results_csv<P: AsRef<Path>>(results: &[PageAnalysis], path: P) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    writer.write_record([
        "page",
        "product_index",
        "title",
        "price",
        "description",
        "reviews",
        "rating",
        "stock_status",
        "promotions",
        "visual_quality",
        "page_layout",
    ])?;

    for analysis in results {
        for (idx, product) in analysis.products.iter().enumerate() {
            writer.write_record([
                analysis.page.to_string(),
                (idx + 1).to_string(),
                value_text(&product.title),
                value_text(&product.price),
                value_text(&product.description),
                value_text(&product.reviews),
                value_text(&product.rating),
                value_text(&product.stock_status),
                value_text(&product.promotions),
                value_text(&product.visual_quality),
                analysis.page_layout.clone(),
            ])?;
        }
    }
    writer.flush()?;

    ::log::info!("analysis CSV written: {}", path.as_ref().display());
    Ok(())
}

/// Dump every page analysis as pretty-printed JSON.
pub fn write_results_json<P: AsRef<Path>>(results: &[PageAnalysis], path: P) -> Result<()> {
    let file = std::fs::File::create(path.as_ref())?;
    serde_json::to_writer_pretty(file, results).map_err(|e| HarvestError::Vision(e.to_string()))?;

    ::log::info!("analysis JSON written: {}", path.as_ref().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = r#"
    {
        "page": 99,
        "products": [
            {
                "title": "Asus VivoBook X441NA",
                "price": "295.99",
                "description": "14 inch, 4GB RAM",
                "reviews": "14",
                "rating": 3,
                "stock_status": "In stock",
                "promotions": "no",
                "visual_quality": "good"
            },
            { "title": "Partial Laptop" }
        ],
        "page_layout": "three column grid",
        "total_products": 2
    }
    "#;

    #[test]
    fn fences_are_stripped() {
        assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("  ```json\n{}\n```  "), "{}");
    }

    #[test]
    fn parses_reply_and_pins_page() {
        let analysis = parse_analysis(&format!("```json\n{REPLY}\n```"), 4).unwrap();
        assert_eq!(analysis.page, 4, "model-reported page number is ignored");
        assert_eq!(analysis.products.len(), 2);
        assert_eq!(analysis.total_products, 2);
        assert_eq!(analysis.page_layout, "three column grid");
        assert_eq!(value_text(&analysis.products[0].rating), "3");
    }

    #[test]
    fn missing_required_fields_fail_parse() {
        assert!(parse_analysis(r#"{"products": []}"#, 1).is_err());
        assert!(parse_analysis("the page shows six laptops", 1).is_err());
    }

    #[test]
    fn absent_product_fields_render_as_na() {
        let analysis = parse_analysis(REPLY, 1).unwrap();
        let partial = &analysis.products[1];
        assert_eq!(value_text(&partial.title), "Partial Laptop");
        assert_eq!(value_text(&partial.price), "N/A");
        assert_eq!(value_text(&partial.rating), "N/A");
    }

    #[test]
    fn finds_latest_run_directory() {
        let base = tempfile::tempdir().unwrap();
        for name in [
            "screenshots_20250101_010101",
            "screenshots_20251231_235959",
            "screenshots_bad_name",
            "unrelated",
        ] {
            std::fs::create_dir(base.path().join(name)).unwrap();
        }

        let latest = latest_screenshot_dir(base.path()).unwrap();
        assert!(
            latest
                .file_name()
                .unwrap()
                .to_str()
                .unwrap()
                .ends_with("20251231_235959")
        );
    }

    #[test]
    fn screenshot_files_sort_by_page() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["page_02_laptops.png", "page_01_laptops.png", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let files = screenshot_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].to_string_lossy().ends_with("page_01_laptops.png"));
        assert!(files[1].to_string_lossy().ends_with("page_02_laptops.png"));
    }

    #[test]
    fn flattened_csv_has_one_row_per_product() {
        let analysis = parse_analysis(REPLY, 2).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.csv");

        write_results_csv(std::slice::from_ref(&analysis), &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "2");
        assert_eq!(&rows[0][1], "1");
        assert_eq!(&rows[0][2], "Asus VivoBook X441NA");
        assert_eq!(&rows[1][3], "N/A");
        assert_eq!(&rows[1][10], "three column grid");
    }
}
