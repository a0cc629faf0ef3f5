use serde::{Deserialize, Serialize};
use std::fmt;

/// One extracted product, immutable once built.
///
/// All records from the same page carry the same `screenshot` value (one
/// capture per page, or an empty string when capture is off or failed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// 1-based listing page the product appeared on
    pub page: u32,

    /// Product title text
    pub title: String,

    /// Price with currency symbol and thousands separators stripped
    pub price: String,

    /// Description text, possibly empty
    pub description: String,

    /// Review count kept as text, "0" when absent
    pub reviews: String,

    /// Star count in 0..=5
    pub rating: u8,

    /// Absolute product URL, possibly empty
    pub link: String,

    /// Path of the page-level screenshot, empty when none was taken
    pub screenshot: String,
}

/// Why the pagination loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The configured page cap was reached
    PageCap,

    /// A page rendered zero item elements
    NoItems,

    /// No pagination control was found, or it reported itself disabled
    PaginationExhausted,

    /// A page-level failure (navigation or content wait) ended the loop early
    PageError,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TerminationReason::PageCap => "page cap reached",
            TerminationReason::NoItems => "no items on page",
            TerminationReason::PaginationExhausted => "no further pages",
            TerminationReason::PageError => "page-level error",
        };
        f.write_str(s)
    }
}

/// Outcome of one complete run of the extraction loop.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub reason: TerminationReason,

    /// Pages whose items were fully extracted
    pub pages_processed: u32,

    /// Rows durably written to the store
    pub records_written: u64,
}
