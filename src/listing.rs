use crate::config::ScrapeConfig;
use crate::error::{HarvestError, Result};
use crate::extract::{self, ITEM_SELECTOR};
use crate::results::{ProductRecord, RunSummary, TerminationReason};
use crate::screenshot::{self, ScreenshotDir};
use crate::session;
use crate::store::CsvStore;
use fantoccini::{Client, Locator};
use std::time::Duration;
use url::Url;

/// One paginated listing, viewed through whatever drives it.
///
/// The live implementation is [`WebListing`]; tests drive the loop with a
/// fake source so termination and degradation behavior can be checked
/// without a browser.
#[allow(async_fn_in_trait)]
pub trait ListingSource {
    /// Navigate to the start URL and wait for the first page's items.
    /// Failure here is fatal to the run.
    async fn open(&mut self, url: &str) -> Result<usize>;

    /// After a pagination advance, wait for the new page's items.
    /// An error stops pagination but keeps rows already written.
    async fn await_items(&mut self) -> Result<usize>;

    /// Capture a page-level screenshot, returning its path or an empty
    /// string when capture is off or failed.
    async fn capture(&mut self, page: u32) -> String;

    /// Extract every item on the current page. Per-item failures are
    /// skipped inside, never propagated.
    async fn extract_items(&mut self, page: u32, screenshot: &str) -> Vec<ProductRecord>;

    /// Activate the next-page control. `false` means no further pages.
    async fn advance(&mut self) -> bool;
}

/// Drive `source` from page 1 until a termination condition is met,
/// appending every extracted record to `store` as it is produced.
///
/// Termination conditions, first one reached wins: the page cap, a page
/// with zero items, an absent or disabled pagination control, or a
/// page-level failure. Only the initial open can fail the whole run.
pub async fn run_loop<S: ListingSource>(
    source: &mut S,
    store: &mut CsvStore,
    start_url: &str,
    max_pages: u32,
) -> Result<RunSummary> {
    let mut pages_processed = 0u32;
    let mut records_written = 0u64;

    if max_pages == 0 {
        return Ok(RunSummary {
            reason: TerminationReason::PageCap,
            pages_processed,
            records_written,
        });
    }

    ::log::info!("starting scrape of {} (cap: {} pages)", start_url, max_pages);
    let mut item_count = source.open(start_url).await?;
    let mut page: u32 = 1;

    let reason = loop {
        if item_count == 0 {
            ::log::warn!("page {} has no items, stopping", page);
            break TerminationReason::NoItems;
        }
        ::log::info!("page {}: {} items found", page, item_count);

        let shot = source.capture(page).await;
        let items = source.extract_items(page, &shot).await;

        for record in &items {
            match store.append(record) {
                Ok(()) => records_written += 1,
                Err(e) => ::log::error!("failed to write row for '{}': {}", record.title, e),
            }
        }
        pages_processed = page;
        ::log::info!(
            "page {} done: {} of {} items written ({} total)",
            page,
            items.len(),
            item_count,
            records_written
        );

        if page == max_pages {
            ::log::info!("page cap of {} reached", max_pages);
            break TerminationReason::PageCap;
        }
        if !source.advance().await {
            ::log::info!("pagination ended at page {}", page);
            break TerminationReason::PaginationExhausted;
        }
        page += 1;

        match source.await_items().await {
            Ok(count) => item_count = count,
            Err(e) => {
                ::log::warn!("page {} never became ready: {}", page, e);
                break TerminationReason::PageError;
            }
        }
    };

    ::log::info!(
        "scrape finished: {} ({} pages, {} rows)",
        reason,
        pages_processed,
        records_written
    );
    Ok(RunSummary {
        reason,
        pages_processed,
        records_written,
    })
}

/// Live listing backed by a fantoccini WebDriver session.
pub struct WebListing {
    client: Client,
    config: ScrapeConfig,
    shots: Option<ScreenshotDir>,
    next_matcher: fn(&str) -> bool,
    page_url: Option<Url>,
}

impl WebListing {
    pub fn new(client: Client, config: ScrapeConfig, shots: Option<ScreenshotDir>) -> Self {
        Self {
            client,
            config,
            shots,
            next_matcher: extract::is_next_control,
            page_url: None,
        }
    }

    /// Swap the next-control matching rule.
    pub fn with_next_matcher(mut self, matcher: fn(&str) -> bool) -> Self {
        self.next_matcher = matcher;
        self
    }

    /// Shut down the browser session. Always called, on every exit path.
    pub async fn close(self) {
        session::close(self.client).await;
    }

    fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.config.wait_timeout_secs)
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.poll_interval_ms)
    }

    async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)).await;
    }

    async fn scroll_into_view(&self, element: &fantoccini::elements::Element) {
        if let Ok(arg) = serde_json::to_value(element) {
            let _ = self
                .client
                .execute(
                    "arguments[0].scrollIntoView({block: 'center'});",
                    vec![arg],
                )
                .await;
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
    }

    /// Whether a pagination control reports itself disabled.
    async fn control_disabled(&self, element: &fantoccini::elements::Element) -> bool {
        if let Ok(Some(_)) = element.attr("disabled").await {
            return true;
        }
        matches!(element.prop("disabled").await, Ok(Some(v)) if v == "true")
    }
}

impl ListingSource for WebListing {
    async fn open(&mut self, url: &str) -> Result<usize> {
        self.client.goto(url).await?;
        ::log::info!("navigated to {}", url);

        let count = session::wait_for_items(
            &self.client,
            ITEM_SELECTOR,
            self.wait_timeout(),
            self.poll_interval(),
        )
        .await
        .map_err(|_| HarvestError::InitialLoad(url.to_string()))?;

        self.page_url = self.client.current_url().await.ok();
        self.settle().await;
        Ok(count)
    }

    async fn await_items(&mut self) -> Result<usize> {
        tokio::time::sleep(Duration::from_millis(self.config.page_load_delay_ms)).await;

        // Nudge lazily rendered content into view before polling.
        let _ = self.client.execute("window.scrollTo(0, 0);", vec![]).await;
        let _ = self
            .client
            .execute("window.scrollTo(0, 800);", vec![])
            .await;

        let count = session::wait_for_items(
            &self.client,
            ITEM_SELECTOR,
            self.wait_timeout(),
            self.poll_interval(),
        )
        .await?;

        self.page_url = self.client.current_url().await.ok();
        self.settle().await;
        Ok(count)
    }

    async fn capture(&mut self, page: u32) -> String {
        match &self.shots {
            Some(dir) => screenshot::capture_full_page(&self.client, dir, page)
                .await
                .unwrap_or_default(),
            None => String::new(),
        }
    }

    async fn extract_items(&mut self, page: u32, screenshot: &str) -> Vec<ProductRecord> {
        let elements = match self.client.find_all(Locator::Css(ITEM_SELECTOR)).await {
            Ok(elements) => elements,
            Err(e) => {
                ::log::error!("could not enumerate items on page {}: {}", page, e);
                return Vec::new();
            }
        };

        let mut records = Vec::with_capacity(elements.len());
        for (idx, element) in elements.iter().enumerate() {
            self.scroll_into_view(element).await;

            let fragment = match element.html(false).await {
                Ok(html) => html,
                Err(e) => {
                    ::log::warn!("item {} on page {} unreadable, skipped: {}", idx + 1, page, e);
                    continue;
                }
            };

            match extract::parse_item(&fragment, page, screenshot, self.page_url.as_ref()) {
                Some(record) => {
                    ::log::debug!("extracted '{}' (${})", record.title, record.price);
                    records.push(record);
                }
                None => {
                    ::log::warn!(
                        "item {} on page {} missing required fields, skipped",
                        idx + 1,
                        page
                    );
                }
            }
        }
        records
    }

    async fn advance(&mut self) -> bool {
        let _ = self
            .client
            .execute("window.scrollTo(0, document.body.scrollHeight);", vec![])
            .await;
        tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)).await;

        let buttons = match self.client.find_all(Locator::Css("button")).await {
            Ok(buttons) => buttons,
            Err(e) => {
                ::log::warn!("could not look for a pagination control: {}", e);
                return false;
            }
        };

        for button in buttons {
            let label = button.text().await.unwrap_or_default();
            let label = label.trim();
            if !(self.next_matcher)(label) {
                continue;
            }

            if self.control_disabled(&button).await {
                ::log::info!("pagination control '{}' is disabled, last page reached", label);
                return false;
            }

            self.scroll_into_view(&button).await;
            let click = match serde_json::to_value(&button) {
                Ok(arg) => self.client.execute("arguments[0].click();", vec![arg]).await,
                Err(e) => {
                    ::log::warn!("could not reference pagination control: {}", e);
                    return false;
                }
            };
            if let Err(e) = click {
                ::log::warn!("pagination click failed: {}", e);
                return false;
            }

            ::log::debug!("clicked pagination control '{}'", label);
            self.settle().await;
            return true;
        }

        ::log::info!("no pagination control found");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scripted listing: a fixed item count per page, with pagination
    /// reported exhausted after the last scripted page.
    struct FakeListing {
        items_per_page: Vec<usize>,
        current: usize,
        screenshots: bool,
        advance_calls: u32,
        fail_await_on_page: Option<u32>,
    }

    impl FakeListing {
        fn new(items_per_page: Vec<usize>) -> Self {
            Self {
                items_per_page,
                current: 0,
                screenshots: false,
                advance_calls: 0,
                fail_await_on_page: None,
            }
        }

        fn with_screenshots(mut self) -> Self {
            self.screenshots = true;
            self
        }

        fn failing_await_on_page(mut self, page: u32) -> Self {
            self.fail_await_on_page = Some(page);
            self
        }

        fn count(&self) -> usize {
            self.items_per_page[self.current]
        }
    }

    impl ListingSource for FakeListing {
        async fn open(&mut self, _url: &str) -> Result<usize> {
            Ok(self.count())
        }

        async fn await_items(&mut self) -> Result<usize> {
            if self.fail_await_on_page == Some(self.current as u32 + 1) {
                return Err(HarvestError::ContentWait);
            }
            Ok(self.count())
        }

        async fn capture(&mut self, page: u32) -> String {
            if self.screenshots {
                format!("shots/page_{page:02}_laptops.png")
            } else {
                String::new()
            }
        }

        async fn extract_items(&mut self, page: u32, screenshot: &str) -> Vec<ProductRecord> {
            (0..self.count())
                .map(|i| ProductRecord {
                    page,
                    title: format!("Laptop {page}-{i}"),
                    price: "295.99".to_string(),
                    description: String::new(),
                    reviews: "0".to_string(),
                    rating: 3,
                    link: String::new(),
                    screenshot: screenshot.to_string(),
                })
                .collect()
        }

        async fn advance(&mut self) -> bool {
            self.advance_calls += 1;
            if self.current + 1 < self.items_per_page.len() {
                self.current += 1;
                true
            } else {
                false
            }
        }
    }

    fn temp_store(with_screenshot: bool) -> (tempfile::TempDir, CsvStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::create(dir.path().join("out.csv"), with_screenshot).unwrap();
        (dir, store)
    }

    fn read_rows(dir: &tempfile::TempDir) -> Vec<csv::StringRecord> {
        let mut reader = csv::Reader::from_path(dir.path().join("out.csv")).unwrap();
        reader.records().map(|r| r.unwrap()).collect()
    }

    #[tokio::test]
    async fn stops_when_control_reports_disabled() {
        // 3 pages available, cap of 20: the control goes dead after page 3.
        let mut source = FakeListing::new(vec![6, 6, 4]);
        let (dir, mut store) = temp_store(false);

        let summary = run_loop(&mut source, &mut store, "https://example.com", 20)
            .await
            .unwrap();

        assert_eq!(summary.reason, TerminationReason::PaginationExhausted);
        assert_eq!(summary.pages_processed, 3);
        assert_eq!(summary.records_written, 16);
        store.close().unwrap();
        assert_eq!(read_rows(&dir).len(), 16);
    }

    #[tokio::test]
    async fn page_cap_stops_without_navigating() {
        let mut source = FakeListing::new(vec![6, 6, 6, 6, 6]);
        let (_dir, mut store) = temp_store(false);

        let summary = run_loop(&mut source, &mut store, "https://example.com", 1)
            .await
            .unwrap();

        assert_eq!(summary.reason, TerminationReason::PageCap);
        assert_eq!(summary.pages_processed, 1);
        assert_eq!(summary.records_written, 6);
        assert_eq!(source.advance_calls, 0);
    }

    #[tokio::test]
    async fn zero_items_terminates() {
        let mut source = FakeListing::new(vec![0]);
        let (dir, mut store) = temp_store(false);

        let summary = run_loop(&mut source, &mut store, "https://example.com", 20)
            .await
            .unwrap();

        assert_eq!(summary.reason, TerminationReason::NoItems);
        assert_eq!(summary.pages_processed, 0);
        assert_eq!(summary.records_written, 0);
        store.close().unwrap();
        assert!(read_rows(&dir).is_empty());
    }

    #[tokio::test]
    async fn page_error_keeps_prior_rows() {
        let mut source = FakeListing::new(vec![6, 6, 6]).failing_await_on_page(2);
        let (dir, mut store) = temp_store(false);

        let summary = run_loop(&mut source, &mut store, "https://example.com", 20)
            .await
            .unwrap();

        assert_eq!(summary.reason, TerminationReason::PageError);
        assert_eq!(summary.pages_processed, 1);
        assert_eq!(summary.records_written, 6);
        store.close().unwrap();
        assert_eq!(read_rows(&dir).len(), 6);
    }

    #[tokio::test]
    async fn zero_page_cap_writes_nothing() {
        let mut source = FakeListing::new(vec![6]);
        let (_dir, mut store) = temp_store(false);

        let summary = run_loop(&mut source, &mut store, "https://example.com", 0)
            .await
            .unwrap();

        assert_eq!(summary.reason, TerminationReason::PageCap);
        assert_eq!(summary.pages_processed, 0);
        assert_eq!(summary.records_written, 0);
    }

    #[tokio::test]
    async fn pages_are_non_decreasing_and_share_screenshots() {
        let mut source = FakeListing::new(vec![3, 2, 4]).with_screenshots();
        let (dir, mut store) = temp_store(true);

        run_loop(&mut source, &mut store, "https://example.com", 20)
            .await
            .unwrap();
        store.close().unwrap();

        let rows = read_rows(&dir);
        assert_eq!(rows.len(), 9);

        let mut last_page = 0u32;
        let mut per_page_shot: std::collections::HashMap<u32, String> = Default::default();
        for row in &rows {
            let page: u32 = row[0].parse().unwrap();
            assert!(page >= last_page, "page column must be non-decreasing");
            last_page = page;

            let shot = row[7].to_string();
            assert!(!shot.is_empty());
            let prev = per_page_shot.entry(page).or_insert_with(|| shot.clone());
            assert_eq!(*prev, shot, "all rows of a page share one screenshot");
        }
        assert_eq!(per_page_shot.len(), 3);
    }
}
