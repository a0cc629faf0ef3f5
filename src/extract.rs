use crate::results::ProductRecord;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use url::Url;

/// CSS selector for one product card on the listing page
pub const ITEM_SELECTOR: &str = ".thumbnail";

const TITLE_SELECTOR: &str = ".title";
const PRICE_SELECTOR: &str = ".price";
const DESCRIPTION_SELECTOR: &str = ".description";
const REVIEW_COUNT_SELECTOR: &str = ".ratings p.review-count";
const STAR_SELECTOR: &str = ".ratings .ws-icon-star";

static NON_PRICE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9.]").expect("price pattern is valid"));

static LEADING_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("integer pattern is valid"));

/// Predicate over a pagination control's visible label.
///
/// Matches the case-insensitive token "next" or a `>`/`›` glyph. This is a
/// heuristic: the first control in document order that matches wins.
pub fn is_next_control(label: &str) -> bool {
    let label = label.trim();
    if label.is_empty() {
        return false;
    }
    label.to_lowercase().contains("next") || label.contains('>') || label.contains('›')
}

/// Strip the currency symbol and thousands separators from a price string.
pub fn normalize_price(raw: &str) -> String {
    NON_PRICE_CHARS.replace_all(raw, "").trim().to_string()
}

/// Keep the leading integer of a review-count blurb ("14 reviews" -> "14").
/// Falls back to "0" when no digits are present.
pub fn parse_review_count(raw: &str) -> String {
    LEADING_INTEGER
        .find(raw)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "0".to_string())
}

fn select_text(doc: &Html, selector: &Selector) -> Option<String> {
    let text = doc
        .select(selector)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    Some(text)
}

/// Extract one product from an item element's HTML fragment.
///
/// Title and price are required: when either is missing the item is skipped
/// (`None`). The optional fields degrade independently: description to `""`,
/// reviews to `"0"`, link to `""`.
pub fn parse_item(
    fragment: &str,
    page: u32,
    screenshot: &str,
    base_url: Option<&Url>,
) -> Option<ProductRecord> {
    let doc = Html::parse_fragment(fragment);

    let title_sel = Selector::parse(TITLE_SELECTOR).expect("title selector is valid");
    let price_sel = Selector::parse(PRICE_SELECTOR).expect("price selector is valid");
    let desc_sel = Selector::parse(DESCRIPTION_SELECTOR).expect("description selector is valid");
    let reviews_sel =
        Selector::parse(REVIEW_COUNT_SELECTOR).expect("review-count selector is valid");
    let star_sel = Selector::parse(STAR_SELECTOR).expect("star selector is valid");

    let title = select_text(&doc, &title_sel).filter(|t| !t.is_empty())?;
    let price = select_text(&doc, &price_sel)
        .map(|p| normalize_price(&p))
        .filter(|p| !p.is_empty())?;

    let description = select_text(&doc, &desc_sel).unwrap_or_default();

    let reviews = select_text(&doc, &reviews_sel)
        .map(|r| parse_review_count(&r))
        .unwrap_or_else(|| "0".to_string());

    // The markup does not distinguish filled from empty stars; the icon count
    // is the rating as-is, clamped to the documented 0..=5 range.
    let rating = doc.select(&star_sel).count().min(5) as u8;

    let link = doc
        .select(&title_sel)
        .next()
        .and_then(|el| el.value().attr("href"))
        .map(|href| resolve_link(href, base_url))
        .unwrap_or_default();

    Some(ProductRecord {
        page,
        title,
        price,
        description,
        reviews,
        rating,
        link,
        screenshot: screenshot.to_string(),
    })
}

/// Resolve a possibly relative href against the page URL.
fn resolve_link(href: &str, base_url: Option<&Url>) -> String {
    match base_url {
        Some(base) => base
            .join(href)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| href.to_string()),
        None => href.to_string(),
    }
}
