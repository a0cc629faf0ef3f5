use crate::error::Result;
use fantoccini::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Run-scoped directory holding this execution's page captures.
#[derive(Debug, Clone)]
pub struct ScreenshotDir {
    dir: PathBuf,
}

impl ScreenshotDir {
    /// Create a fresh `screenshots_{YYYYMMDD_HHMMSS}` directory.
    pub fn create() -> Result<Self> {
        let name = format!(
            "screenshots_{}",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        );
        Self::at(Path::new(&name))
    }

    /// Create (or reuse) a specific directory.
    pub fn at(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;
        ::log::info!("screenshot directory: {}", path.display());
        Ok(Self {
            dir: path.to_path_buf(),
        })
    }

    /// Deterministic per-page file path; zero-padded so files sort by page.
    pub fn page_file(&self, page: u32) -> PathBuf {
        self.dir.join(format!("page_{page:02}_laptops.png"))
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

/// Capture a full-page screenshot for `page`, returning its path.
///
/// The viewport is resized to the full scrollable content dimensions for the
/// capture and restored afterwards; the restore runs even when the capture
/// fails so later interaction keeps a sane viewport. Returns `None` on any
/// failure without aborting the page.
pub async fn capture_full_page(client: &Client, dir: &ScreenshotDir, page: u32) -> Option<String> {
    let filepath = dir.page_file(page);

    let _ = client.execute("window.scrollTo(0, 0);", vec![]).await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    let png = match content_dimensions(client).await {
        Some((width, height)) => {
            let original = match client.get_window_size().await {
                Ok(size) => size,
                Err(e) => {
                    ::log::warn!("could not read window size for page {}: {}", page, e);
                    return None;
                }
            };

            if let Err(e) = client.set_window_size(width as u32, height as u32).await {
                ::log::warn!("could not resize window for page {}: {}", page, e);
                return None;
            }
            tokio::time::sleep(Duration::from_millis(300)).await;

            let shot = client.screenshot().await;

            // Restore the viewport whether or not the capture worked.
            if let Err(e) = client
                .set_window_size(original.0 as u32, original.1 as u32)
                .await
            {
                ::log::warn!("could not restore window size after page {}: {}", page, e);
            }
            tokio::time::sleep(Duration::from_millis(300)).await;

            shot
        }
        // Fall back to a viewport capture when the dimensions are unreadable.
        None => client.screenshot().await,
    };

    let png = match png {
        Ok(bytes) => bytes,
        Err(e) => {
            ::log::warn!("screenshot failed for page {}: {}", page, e);
            return None;
        }
    };

    if let Err(e) = std::fs::write(&filepath, &png) {
        ::log::warn!("could not write {}: {}", filepath.display(), e);
        return None;
    }

    ::log::info!(
        "captured page {} screenshot: {} ({:.1} KiB)",
        page,
        filepath.display(),
        png.len() as f64 / 1024.0
    );
    Some(filepath.to_string_lossy().into_owned())
}

/// Read the full scrollable content dimensions from the document.
async fn content_dimensions(client: &Client) -> Option<(u64, u64)> {
    let width = client
        .execute("return document.body.scrollWidth;", vec![])
        .await
        .ok()?
        .as_u64()?;
    let height = client
        .execute("return document.body.scrollHeight;", vec![])
        .await
        .ok()?
        .as_u64()?;
    Some((width, height))
}
