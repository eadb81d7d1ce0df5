use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};
use url::Url;

use super::{PageContent, PageSource, PageSourceError};

/// Replays a fixed sequence of saved listing pages.
///
/// Page `n` reports a next page as long as page `n + 1` exists. Used for
/// offline runs against captured HTML and throughout the tests.
#[derive(Debug, Default)]
pub struct MemoryPageSource {
    pages: Vec<PageContent>,
    cursor: usize,
    fetched: Vec<usize>,
    diagnostics: Vec<PathBuf>,
    closed: bool,
}

impl MemoryPageSource {
    #[must_use]
    pub fn new(pages: Vec<PageContent>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    /// Load every `*.html` file in `dir`, in file name order.
    ///
    /// Each page's URL is `base_url` joined with its file name.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or one of its files cannot be read.
    pub async fn from_dir(dir: &Path, base_url: &Url) -> Result<Self, PageSourceError> {
        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("html")) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut pages = Vec::with_capacity(paths.len());
        for path in paths {
            let html = tokio::fs::read_to_string(&path).await?;
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            let url = base_url.join(name).unwrap_or_else(|_| base_url.clone());
            pages.push(PageContent { url, html });
        }

        info!(dir = %dir.display(), pages = pages.len(), "Loaded saved listing pages");
        Ok(Self::new(pages))
    }

    /// Indices of the pages handed out so far, in order.
    #[must_use]
    pub fn fetched_pages(&self) -> &[usize] {
        &self.fetched
    }

    /// Paths passed to [`PageSource::capture_diagnostic`].
    #[must_use]
    pub fn diagnostics(&self) -> &[PathBuf] {
        &self.diagnostics
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl PageSource for MemoryPageSource {
    async fn fetch_current_page(&mut self) -> Result<PageContent, PageSourceError> {
        let page = self
            .pages
            .get(self.cursor)
            .cloned()
            .ok_or_else(|| PageSourceError::Navigation(format!("no page {}", self.cursor + 1)))?;
        self.fetched.push(self.cursor);
        debug!(page = self.cursor + 1, url = %page.url, "Replaying saved page");
        Ok(page)
    }

    async fn has_next_page(&mut self) -> Result<bool, PageSourceError> {
        Ok(self.cursor + 1 < self.pages.len())
    }

    async fn advance_to_next_page(&mut self) -> Result<(), PageSourceError> {
        if self.cursor + 1 >= self.pages.len() {
            return Err(PageSourceError::Navigation(
                "no next page to advance to".to_string(),
            ));
        }
        self.cursor += 1;
        Ok(())
    }

    /// Dumps the current page's HTML next to `path`, with an `.html` extension.
    async fn capture_diagnostic(&mut self, path: &Path) -> Result<(), PageSourceError> {
        self.diagnostics.push(path.to_path_buf());
        if let Some(page) = self.pages.get(self.cursor) {
            let dump = path.with_extension("html");
            tokio::fs::write(&dump, &page.html).await?;
            info!(path = %dump.display(), "Saved page HTML for diagnostics");
        }
        Ok(())
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}
