use thiserror::Error;

/// Result type for harvest operations.
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Errors raised by the scraper and the vision pass.
///
/// Only `Session` and `InitialLoad` are fatal to a run; everything else is
/// handled at the narrowest scope that can log it and continue.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// Could not establish a WebDriver session on any known URL.
    #[error("failed to establish WebDriver session: {0}")]
    Session(String),

    /// The very first listing page never produced any item elements.
    #[error("initial page load timed out for {0}")]
    InitialLoad(String),

    /// A WebDriver command failed.
    #[error("browser command failed: {0}")]
    Browser(#[from] fantoccini::error::CmdError),

    /// Waiting for listing content exhausted its timeout budget.
    #[error("timed out waiting for listing content")]
    ContentWait,

    /// CSV serialization or writing failed.
    #[error("CSV store error: {0}")]
    Store(#[from] csv::Error),

    /// Filesystem error (store, screenshot directory, image files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// The vision API returned an error or an unusable response.
    #[error("vision API error: {0}")]
    Vision(String),
}
