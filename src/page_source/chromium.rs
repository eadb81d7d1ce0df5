//! Live page source backed by a headless Chromium session.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{ClearBrowserCookiesParams, CookieParam};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use url::Url;

use super::{PageContent, PageSource, PageSourceError};
use crate::cookies::CookiePair;
use crate::parser::THREAD_LIST_SELECTOR;

/// Default viewport width in pixels.
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1280;

/// Default viewport height in pixels.
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 1600;

/// Discuz pager link to the following page.
const NEXT_PAGE_SELECTOR: &str = "a.nxt";

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct ChromiumConfig {
    /// Path to Chrome/Chromium executable (None for auto-detection).
    pub chrome_path: Option<String>,
    pub headless: bool,
    /// Bound on every wait for page markup.
    pub page_timeout: Duration,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for ChromiumConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            page_timeout: Duration::from_secs(20),
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
        }
    }
}

/// One browser with one tab, navigated page by page.
pub struct ChromiumPageSource {
    config: ChromiumConfig,
    browser: Browser,
    handler: JoinHandle<()>,
    page: Page,
}

impl ChromiumPageSource {
    /// Launch the browser and open a blank tab.
    ///
    /// # Errors
    ///
    /// Returns [`PageSourceError::SessionInit`] if Chromium cannot be started.
    pub async fn launch(config: ChromiumConfig) -> Result<Self, PageSourceError> {
        info!(headless = config.headless, "Launching Chromium");

        let mut builder = BrowserConfig::builder()
            .window_size(config.viewport_width, config.viewport_height)
            .request_timeout(config.page_timeout)
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--blink-settings=imagesEnabled=false")
            .arg("--disable-blink-features=AutomationControlled");

        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(ref chrome_path) = config.chrome_path {
            builder = builder.chrome_executable(chrome_path);
        }

        let browser_config = builder.build().map_err(PageSourceError::SessionInit)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| PageSourceError::SessionInit(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {e}");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(PageSourceError::SessionInit(e.to_string()));
            }
        };

        info!("Chromium started");
        Ok(Self {
            config,
            browser,
            handler,
            page,
        })
    }

    /// Install the session cookies for `origin` and reload so they apply.
    ///
    /// A cookie the browser refuses is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the origin cannot be opened or reloaded.
    pub async fn login_with_cookies(
        &mut self,
        origin: &Url,
        cookies: &[CookiePair],
    ) -> Result<(), PageSourceError> {
        info!(origin = %origin, "Opening forum origin to install cookies");
        self.goto(origin).await?;

        // Drop any stale session before installing the configured cookies.
        self.page
            .execute(ClearBrowserCookiesParams::default())
            .await
            .map_err(|e| PageSourceError::Browser(format!("failed to clear cookies: {e}")))?;

        let params = cookie_params(origin, cookies);
        self.page
            .set_cookies(params)
            .await
            .map_err(|e| PageSourceError::Browser(format!("failed to set cookies: {e}")))?;
        info!(count = cookies.len(), "Cookies installed, reloading");

        self.page
            .reload()
            .await
            .map_err(|e| PageSourceError::Navigation(e.to_string()))?;
        Ok(())
    }

    /// Navigate the tab to `url` and wait for the load to finish.
    ///
    /// # Errors
    ///
    /// Returns [`PageSourceError::Navigation`] if the page fails to load.
    pub async fn goto(&mut self, url: &Url) -> Result<(), PageSourceError> {
        debug!(url = %url, "Navigating");
        self.page
            .goto(url.as_str())
            .await
            .map_err(|e| PageSourceError::Navigation(format!("{url}: {e}")))?;
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str) -> Result<(), PageSourceError> {
        let deadline = Instant::now() + self.config.page_timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(PageSourceError::Timeout {
                    selector: selector.to_string(),
                    waited: self.config.page_timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn current_url(&self) -> Result<Url, PageSourceError> {
        let raw = self
            .page
            .url()
            .await
            .map_err(|e| PageSourceError::Browser(e.to_string()))?
            .ok_or_else(|| PageSourceError::Browser("page has no URL".to_string()))?;
        Url::parse(&raw).map_err(|e| PageSourceError::Browser(format!("bad page URL {raw}: {e}")))
    }
}

/// Browser cookie parameters scoped to `origin`. A cookie the browser
/// protocol rejects is logged and skipped.
fn cookie_params(origin: &Url, cookies: &[CookiePair]) -> Vec<CookieParam> {
    cookies
        .iter()
        .filter_map(|cookie| {
            CookieParam::builder()
                .name(cookie.name.clone())
                .value(cookie.value.clone())
                .url(origin.as_str())
                .build()
                .map_err(|e| warn!(name = %cookie.name, error = %e, "Skipping cookie"))
                .ok()
        })
        .collect()
}

#[async_trait]
impl PageSource for ChromiumPageSource {
    async fn fetch_current_page(&mut self) -> Result<PageContent, PageSourceError> {
        self.wait_for_selector(THREAD_LIST_SELECTOR).await?;

        let url = self.current_url().await?;
        let html = self
            .page
            .content()
            .await
            .map_err(|e| PageSourceError::Browser(e.to_string()))?;

        debug!(url = %url, bytes = html.len(), "Fetched page content");
        Ok(PageContent { url, html })
    }

    async fn has_next_page(&mut self) -> Result<bool, PageSourceError> {
        Ok(self.page.find_element(NEXT_PAGE_SELECTOR).await.is_ok())
    }

    async fn advance_to_next_page(&mut self) -> Result<(), PageSourceError> {
        let next = self
            .page
            .find_element(NEXT_PAGE_SELECTOR)
            .await
            .map_err(|e| PageSourceError::Navigation(format!("next page link vanished: {e}")))?;

        let href = next
            .attribute("href")
            .await
            .map_err(|e| PageSourceError::Browser(e.to_string()))?;

        match href {
            Some(href) => {
                let target = self
                    .current_url()
                    .await?
                    .join(&href)
                    .map_err(|e| PageSourceError::Navigation(format!("bad next link {href}: {e}")))?;
                info!(url = %target, "Following next page link");
                self.goto(&target).await
            }
            None => {
                info!("Clicking next page control");
                next.click()
                    .await
                    .map_err(|e| PageSourceError::Navigation(e.to_string()))?;
                self.page
                    .wait_for_navigation()
                    .await
                    .map_err(|e| PageSourceError::Navigation(e.to_string()))?;
                Ok(())
            }
        }
    }

    async fn capture_diagnostic(&mut self, path: &Path) -> Result<(), PageSourceError> {
        let params = ScreenshotParams::builder().full_page(true).build();
        self.page
            .save_screenshot(params, path)
            .await
            .map_err(|e| PageSourceError::Browser(format!("screenshot failed: {e}")))?;
        info!(path = %path.display(), "Saved diagnostic screenshot");
        Ok(())
    }

    async fn close(&mut self) {
        info!("Closing Chromium");
        if let Err(e) = self.browser.close().await {
            error!("Failed to close browser: {e}");
        } else if let Err(e) = self.browser.wait().await {
            warn!("Failed to wait for browser exit: {e}");
        }
        self.handler.abort();
    }
}
