//! The pagination crawl: fetch, parse, advance until the listing ends.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::models::ThreadRecord;
use crate::page_source::{PageContent, PageSource, PageSourceError};
use crate::parser::{parse_thread_list, ParseError};

#[derive(Debug, Error)]
pub enum CrawlError {
    /// The listing never rendered, or rendered without its container.
    #[error("page {page}: listing structure not found: {reason}")]
    PageStructure { page: usize, reason: String },
    #[error("stopped after {limit} pages but the listing still has a next page")]
    MaxPagesExceeded { limit: usize },
    #[error("page {page}: {source}")]
    Source {
        page: usize,
        #[source]
        source: PageSourceError,
    },
}

impl CrawlError {
    /// Whether the failure happened on a page, as opposed to the page cap.
    #[must_use]
    pub fn is_page_failure(&self) -> bool {
        matches!(self, Self::PageStructure { .. } | Self::Source { .. })
    }
}

/// Accumulated state of one crawl run.
#[derive(Debug, Clone)]
pub struct CrawlSession {
    /// The instant every relative date in this run is resolved against.
    pub anchor_now: NaiveDateTime,
    pub records: Vec<ThreadRecord>,
    pub pages_visited: usize,
    pub skipped_entries: usize,
}

impl CrawlSession {
    #[must_use]
    pub fn new(anchor_now: NaiveDateTime) -> Self {
        Self {
            anchor_now,
            records: Vec::new(),
            pages_visited: 0,
            skipped_entries: 0,
        }
    }
}

/// A failed crawl together with whatever was collected before the failure.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct CrawlFailure {
    #[source]
    pub error: CrawlError,
    pub partial: CrawlSession,
}

#[derive(Debug)]
enum CrawlState {
    Fetching,
    Parsing(PageContent),
    Paginating,
    Done,
}

/// Drives a [`PageSource`] through the whole listing.
pub struct Crawler<'a, S: PageSource + ?Sized> {
    source: &'a mut S,
    max_pages: usize,
    diagnostic_path: PathBuf,
}

impl<'a, S: PageSource + ?Sized> Crawler<'a, S> {
    #[must_use]
    pub fn new(source: &'a mut S, max_pages: usize, diagnostic_path: PathBuf) -> Self {
        Self {
            source,
            max_pages,
            diagnostic_path,
        }
    }

    /// Crawl every page, starting from the one the source currently shows.
    ///
    /// Pages are handled strictly one after another. Broken entries are
    /// skipped; any page-level failure ends the crawl after a best-effort
    /// diagnostic capture.
    ///
    /// # Errors
    ///
    /// Returns a [`CrawlFailure`] carrying the records collected so far.
    pub async fn run(&mut self, anchor_now: NaiveDateTime) -> Result<CrawlSession, CrawlFailure> {
        let mut session = CrawlSession::new(anchor_now);
        match self.drive(&mut session).await {
            Ok(()) => {
                info!(
                    pages = session.pages_visited,
                    records = session.records.len(),
                    skipped = session.skipped_entries,
                    "Crawl finished"
                );
                Ok(session)
            }
            Err(error) => {
                error!(
                    error = %error,
                    pages = session.pages_visited,
                    records = session.records.len(),
                    "Crawl failed"
                );
                if error.is_page_failure() {
                    self.capture_diagnostic().await;
                }
                Err(CrawlFailure {
                    error,
                    partial: session,
                })
            }
        }
    }

    async fn drive(&mut self, session: &mut CrawlSession) -> Result<(), CrawlError> {
        let mut state = CrawlState::Fetching;
        let mut page_number = 1;

        loop {
            state = match state {
                CrawlState::Fetching => {
                    info!(page = page_number, "Fetching page");
                    match self.source.fetch_current_page().await {
                        Ok(content) => CrawlState::Parsing(content),
                        Err(PageSourceError::Timeout { selector, waited }) => {
                            let reason = format!("`{selector}` did not appear within {waited:?}");
                            return Err(structure_failure(page_number, reason));
                        }
                        Err(source) => {
                            return Err(CrawlError::Source {
                                page: page_number,
                                source,
                            })
                        }
                    }
                }
                CrawlState::Parsing(content) => {
                    let parsed = match parse_thread_list(&content.html, &content.url) {
                        Ok(parsed) => parsed,
                        Err(ParseError::MissingContainer) => {
                            let reason = ParseError::MissingContainer.to_string();
                            return Err(structure_failure(page_number, reason));
                        }
                    };

                    info!(
                        page = page_number,
                        threads = parsed.threads.len(),
                        skipped = parsed.skipped.len(),
                        url = %content.url,
                        "Parsed page"
                    );
                    session.pages_visited += 1;
                    session.skipped_entries += parsed.skipped.len();
                    session.records.extend(
                        parsed
                            .threads
                            .into_iter()
                            .map(|raw| ThreadRecord::from_raw(raw, session.anchor_now)),
                    );
                    CrawlState::Paginating
                }
                CrawlState::Paginating => {
                    let has_next = self.source.has_next_page().await.map_err(|source| {
                        CrawlError::Source {
                            page: page_number,
                            source,
                        }
                    })?;

                    if !has_next {
                        info!(page = page_number, "No next page, reached the end of the listing");
                        CrawlState::Done
                    } else if page_number >= self.max_pages {
                        return Err(CrawlError::MaxPagesExceeded {
                            limit: self.max_pages,
                        });
                    } else {
                        debug!(page = page_number, "Advancing to next page");
                        self.source
                            .advance_to_next_page()
                            .await
                            .map_err(|source| CrawlError::Source {
                                page: page_number,
                                source,
                            })?;
                        page_number += 1;
                        CrawlState::Fetching
                    }
                }
                CrawlState::Done => return Ok(()),
            };
        }
    }

    /// Best effort: a failed capture is logged and never replaces the crawl error.
    async fn capture_diagnostic(&mut self) {
        info!(path = %self.diagnostic_path.display(), "Capturing diagnostics");
        if let Err(e) = self.source.capture_diagnostic(&self.diagnostic_path).await {
            warn!(error = %e, "Failed to capture diagnostics");
        }
    }
}

fn structure_failure(page: usize, reason: String) -> CrawlError {
    warn!(page, reason = %reason, "Listing structure missing");
    CrawlError::PageStructure { page, reason }
}
