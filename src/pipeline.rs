//! End-to-end run: credentials, browser session, crawl, cleanup, report.

use std::path::PathBuf;

use chrono::{Local, NaiveDateTime};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::cookies::{parse_cookie_string, AuthConfigError, CookiePair};
use crate::crawl::{CrawlError, CrawlFailure, Crawler};
use crate::page_source::{
    ChromiumConfig, ChromiumPageSource, MemoryPageSource, PageSource, PageSourceError,
};
use crate::report::{write_report, ReportError, ReportOptions};

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Auth(#[from] AuthConfigError),
    #[error("browser session could not start: {0}")]
    SessionInit(#[source] PageSourceError),
    #[error("could not open the listing: {0}")]
    Login(#[source] PageSourceError),
    #[error("could not load saved pages: {0}")]
    Fixture(#[source] PageSourceError),
    #[error("crawl aborted: {0}")]
    Crawl(#[from] CrawlError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("failed to prepare report directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Run a full scrape as configured.
///
/// The anchor time is taken once, here. With `fixture_dir` set the saved
/// pages are replayed and no credentials are needed; otherwise the cookie is
/// validated before Chromium is launched.
///
/// Returns the report path, or `None` when no threads were found.
///
/// # Errors
///
/// Returns the first fatal error; the browser is closed before returning.
pub async fn run(config: &Config) -> Result<Option<PathBuf>, ScrapeError> {
    let anchor_now = Local::now().naive_local();
    info!(anchor = %anchor_now, target = %config.target_url, "Starting scrape");

    if let Some(dir) = &config.fixture_dir {
        info!(dir = %dir.display(), "Replaying saved pages, no browser session");
        let mut source = MemoryPageSource::from_dir(dir, &config.target_url)
            .await
            .map_err(ScrapeError::Fixture)?;
        return run_with_source(&mut source, config, anchor_now).await;
    }

    let cookies = parse_cookie_string(config.cookie.as_deref())?;

    let mut source = ChromiumPageSource::launch(chromium_config(config))
        .await
        .map_err(ScrapeError::SessionInit)?;

    if let Err(e) = open_listing(&mut source, config, &cookies).await {
        error!(error = %e, "Failed to open the listing");
        if let Err(diag) = source.capture_diagnostic(&config.diagnostic_path()).await {
            warn!(error = %diag, "Failed to capture diagnostics");
        }
        source.close().await;
        return Err(ScrapeError::Login(e));
    }

    run_with_source(&mut source, config, anchor_now).await
}

/// Crawl an already opened source, close it, then write the report.
///
/// The source is closed on every path. A failed crawl writes no report
/// unless `report_partial_on_failure` is set and something was collected.
///
/// # Errors
///
/// Returns the crawl error, or a report error if writing fails.
pub async fn run_with_source<S: PageSource + ?Sized>(
    source: &mut S,
    config: &Config,
    anchor_now: NaiveDateTime,
) -> Result<Option<PathBuf>, ScrapeError> {
    if let Err(e) = tokio::fs::create_dir_all(&config.report_dir).await {
        source.close().await;
        return Err(e.into());
    }

    let outcome = Crawler::new(&mut *source, config.max_pages, config.diagnostic_path())
        .run(anchor_now)
        .await;
    source.close().await;

    let options = report_options(config);
    match outcome {
        Ok(session) => Ok(write_report(session, &options)?),
        Err(CrawlFailure { error, partial }) => {
            if config.report_partial_on_failure && !partial.records.is_empty() {
                warn!(records = partial.records.len(), "Writing partial report");
                match write_report(partial, &options) {
                    Ok(Some(path)) => info!(path = %path.display(), "Partial report saved"),
                    Ok(None) => {}
                    Err(e) => error!(error = %e, "Failed to write partial report"),
                }
            }
            Err(error.into())
        }
    }
}

async fn open_listing(
    source: &mut ChromiumPageSource,
    config: &Config,
    cookies: &[CookiePair],
) -> Result<(), PageSourceError> {
    source.login_with_cookies(&config.forum_origin(), cookies).await?;
    info!(url = %config.target_url, "Opening thread listing");
    source.goto(&config.target_url).await
}

fn chromium_config(config: &Config) -> ChromiumConfig {
    ChromiumConfig {
        chrome_path: config.chrome_path.clone(),
        headless: config.headless,
        page_timeout: config.page_timeout,
        ..ChromiumConfig::default()
    }
}

fn report_options(config: &Config) -> ReportOptions {
    ReportOptions {
        dir: config.report_dir.clone(),
        prefix: config.report_prefix.clone(),
        json: config.report_json,
    }
}
