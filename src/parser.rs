//! Extraction of thread entries from a Discuz "my threads" listing page.
//!
//! The listing lives in `div.c_threadlist ul`, one `li` per thread. Entries
//! are parsed independently: a broken entry is reported and skipped, it never
//! aborts the page.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::models::RawThread;

/// Selector the page source waits for before handing over the page.
pub const THREAD_LIST_SELECTOR: &str = "div.c_threadlist ul";

/// Placeholder stored when an optional date field is missing.
pub const MISSING_FIELD: &str = "N/A";

static LIST: Lazy<Selector> = Lazy::new(|| Selector::parse(THREAD_LIST_SELECTOR).unwrap());
static ENTRY: Lazy<Selector> =
    Lazy::new(|| Selector::parse(&format!("{THREAD_LIST_SELECTOR} li")).unwrap());
static TITLE_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"div.tit > a[href^="thread-"]"#).unwrap());
static CREATED: Lazy<Selector> = Lazy::new(|| Selector::parse("div.dte").unwrap());
static VIEWS: Lazy<Selector> = Lazy::new(|| Selector::parse("em.vie").unwrap());
static LAST_REPLY_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"em.y a[href*="goto=lastpost"]"#).unwrap());
static TITLED_SPAN: Lazy<Selector> = Lazy::new(|| Selector::parse("span[title]").unwrap());

/// The page does not contain a thread listing at all.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("thread list container `div.c_threadlist ul` not found")]
    MissingContainer,
}

/// Why a single thread entry was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordParseError {
    #[error("entry {index}: no thread title link")]
    MissingTitle { index: usize },
    #[error("entry {index}: thread link `{href}` cannot be resolved: {message}")]
    InvalidUrl {
        index: usize,
        href: String,
        message: String,
    },
    #[error("entry {index}: view count `{raw}` is not a number")]
    MalformedViews { index: usize, raw: String },
}

/// Threads parsed from one listing page plus the entries that were skipped.
#[derive(Debug, Default)]
pub struct ParsedPage {
    pub threads: Vec<RawThread>,
    pub skipped: Vec<RecordParseError>,
}

impl ParsedPage {
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.threads.len() + self.skipped.len()
    }
}

/// Parse one rendered listing page.
///
/// Relative thread links are resolved against `base_url`.
///
/// # Errors
///
/// Returns [`ParseError::MissingContainer`] when the listing container is not
/// in the document, which means the layout changed or the page did not
/// render.
pub fn parse_thread_list(html: &str, base_url: &Url) -> Result<ParsedPage, ParseError> {
    let document = Html::parse_document(html);
    if document.select(&LIST).next().is_none() {
        return Err(ParseError::MissingContainer);
    }

    // One document-wide match, so an `li` under nested lists is seen once.
    let mut page = ParsedPage::default();
    for (index, entry) in document.select(&ENTRY).enumerate() {
        match parse_entry(index, entry, base_url) {
            Ok(thread) => page.threads.push(thread),
            Err(e) => {
                warn!(error = %e, "Skipping malformed thread entry");
                page.skipped.push(e);
            }
        }
    }

    if page.entry_count() == 0 {
        warn!("Thread list is present but contains no entries");
    } else {
        debug!(
            parsed = page.threads.len(),
            skipped = page.skipped.len(),
            "Parsed thread list"
        );
    }

    Ok(page)
}

fn parse_entry(
    index: usize,
    entry: ElementRef<'_>,
    base_url: &Url,
) -> Result<RawThread, RecordParseError> {
    let link = entry
        .select(&TITLE_LINK)
        .next()
        .ok_or(RecordParseError::MissingTitle { index })?;
    let title = element_text(link);
    if title.is_empty() {
        return Err(RecordParseError::MissingTitle { index });
    }

    let href = link.value().attr("href").unwrap_or_default();
    let url = base_url
        .join(href)
        .map_err(|e| RecordParseError::InvalidUrl {
            index,
            href: href.to_string(),
            message: e.to_string(),
        })?
        .to_string();

    let creation_date_raw = entry
        .select(&CREATED)
        .next()
        .map(element_text)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| MISSING_FIELD.to_string());

    let views = match entry.select(&VIEWS).next() {
        Some(tag) => parse_views(&element_text(tag)).ok_or_else(|| {
            RecordParseError::MalformedViews {
                index,
                raw: element_text(tag),
            }
        })?,
        None => 0,
    };

    Ok(RawThread {
        title,
        url,
        views,
        creation_date_raw,
        last_reply_date_raw: last_reply_date(entry),
    })
}

/// Keep only the digits of a view counter such as `"1,234 次查看"`.
#[must_use]
pub fn parse_views(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Prefer the exact timestamp in the span's `title` attribute, falling back
/// to the link's visible (possibly relative) text.
fn last_reply_date(entry: ElementRef<'_>) -> String {
    let Some(link) = entry.select(&LAST_REPLY_LINK).next() else {
        return MISSING_FIELD.to_string();
    };

    link.select(&TITLED_SPAN)
        .next()
        .and_then(|span| span.value().attr("title"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map_or_else(|| element_text(link), str::to_string)
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
