//! The collaborator the crawl reads pages from.
//!
//! The crawl loop only ever talks to a [`PageSource`]; the live Chromium
//! session and the offline replay source both implement it.

mod chromium;
mod memory;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

pub use chromium::{ChromiumConfig, ChromiumPageSource};
pub use memory::MemoryPageSource;

#[derive(Debug, Error)]
pub enum PageSourceError {
    #[error("failed to start browser session: {0}")]
    SessionInit(String),
    #[error("timed out after {waited:?} waiting for `{selector}`")]
    Timeout { selector: String, waited: Duration },
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("browser error: {0}")]
    Browser(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Rendered HTML of the page currently open in the source.
#[derive(Debug, Clone)]
pub struct PageContent {
    /// Address of the page, used to resolve relative links.
    pub url: Url,
    pub html: String,
}

/// Access to a paginated listing, one page at a time.
#[async_trait]
pub trait PageSource: Send {
    /// Return the current page once its thread list has rendered.
    ///
    /// # Errors
    ///
    /// Returns [`PageSourceError::Timeout`] when the listing does not appear
    /// within the source's wait bound.
    async fn fetch_current_page(&mut self) -> Result<PageContent, PageSourceError>;

    /// Whether the current page has a "next page" control.
    async fn has_next_page(&mut self) -> Result<bool, PageSourceError>;

    /// Follow the "next page" control.
    async fn advance_to_next_page(&mut self) -> Result<(), PageSourceError>;

    /// Save whatever helps diagnose a failed page.
    ///
    /// A browser writes a screenshot to `path`; a source without rendering
    /// may write a different format beside it, with a matching extension.
    async fn capture_diagnostic(&mut self, path: &Path) -> Result<(), PageSourceError>;

    /// Release the underlying session. Called exactly once, on every exit path.
    async fn close(&mut self);
}
