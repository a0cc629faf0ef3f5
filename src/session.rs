use crate::error::{HarvestError, Result};
use fantoccini::{Client, ClientBuilder, Locator};
use std::time::Duration;
use tokio::time::Instant;

/// Common WebDriver ports to try when the configured URL is unreachable
const FALLBACK_WEBDRIVER_URLS: [&str; 3] = [
    "http://localhost:9515", // ChromeDriver default
    "http://localhost:4444", // Selenium / geckodriver default
    "http://127.0.0.1:4444", // Try with IP instead of localhost
];

/// Establish the browser session. Failure here is fatal to the run.
pub async fn connect(webdriver_url: &str) -> Result<Client> {
    match ClientBuilder::native().connect(webdriver_url).await {
        Ok(client) => {
            ::log::info!("connected to WebDriver at {}", webdriver_url);
            return Ok(client);
        }
        Err(e) => {
            ::log::error!("failed to connect to WebDriver at {}: {}", webdriver_url, e);
        }
    }

    for url in FALLBACK_WEBDRIVER_URLS.iter() {
        if *url == webdriver_url {
            continue;
        }
        ::log::info!("trying fallback WebDriver URL: {}", url);
        if let Ok(client) = ClientBuilder::native().connect(url).await {
            ::log::info!("connected to fallback WebDriver at {}", url);
            return Ok(client);
        }
    }

    ::log::error!(
        "no WebDriver server reachable; start one or set the WEBDRIVER_URL environment variable"
    );
    Err(HarvestError::Session(webdriver_url.to_string()))
}

/// Poll until the number of elements matching `selector` is nonzero and stable
/// across two consecutive polls, or until the timeout budget is spent.
///
/// Replaces fixed sleeps: the wait ends as soon as the rendered item count
/// stops changing. On timeout, a nonzero last count is still accepted.
pub async fn wait_for_items(
    client: &Client,
    selector: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<usize> {
    let deadline = Instant::now() + timeout;
    let mut last_count: Option<usize> = None;

    loop {
        let count = match client.find_all(Locator::Css(selector)).await {
            Ok(elements) => elements.len(),
            Err(e) => {
                ::log::debug!("content poll failed: {}", e);
                0
            }
        };

        if count > 0 && last_count == Some(count) {
            return Ok(count);
        }
        last_count = Some(count);

        if Instant::now() >= deadline {
            if count > 0 {
                // Still changing at the deadline; take what is rendered.
                return Ok(count);
            }
            return Err(HarvestError::ContentWait);
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// Close the session, logging rather than propagating any shutdown error.
pub async fn close(client: Client) {
    if let Err(e) = client.close().await {
        ::log::warn!("failed to close WebDriver session: {}", e);
    } else {
        ::log::info!("WebDriver session closed");
    }
}
