//! Environment-driven configuration and the credential gate in front of the
//! browser session.

use std::path::PathBuf;
use std::time::Duration;

use forum_thread_report::config::{Config, DEFAULT_TARGET_URL};
use forum_thread_report::cookies::AuthConfigError;
use forum_thread_report::pipeline::{self, ScrapeError};
use serial_test::serial;
use tempfile::TempDir;

const VARS: [&str; 12] = [
    "TARGET_URL",
    "FORUM_COOKIE",
    "CHROME_PATH",
    "HEADLESS",
    "PAGE_TIMEOUT_SECS",
    "MAX_PAGES",
    "REPORT_DIR",
    "REPORT_PREFIX",
    "REPORT_JSON",
    "REPORT_PARTIAL_ON_FAILURE",
    "DIAGNOSTIC_SCREENSHOT",
    "FIXTURE_DIR",
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_defaults_without_environment() {
    clear_env();
    let config = Config::from_env().expect("defaults should load");

    assert_eq!(config.target_url.as_str(), DEFAULT_TARGET_URL);
    assert!(config.cookie.is_none());
    assert!(config.headless);
    assert_eq!(config.page_timeout, Duration::from_secs(20));
    assert_eq!(config.max_pages, 200);
    assert_eq!(config.report_dir, PathBuf::from("."));
    assert_eq!(config.report_prefix, "forum_thread_report");
    assert!(!config.report_json);
    assert!(!config.report_partial_on_failure);
    assert!(config.fixture_dir.is_none());
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_overrides_from_environment() {
    clear_env();
    std::env::set_var("TARGET_URL", "https://forum.example/home.php?mod=space&uid=7");
    std::env::set_var("HEADLESS", "off");
    std::env::set_var("PAGE_TIMEOUT_SECS", "45");
    std::env::set_var("MAX_PAGES", "3");
    std::env::set_var("REPORT_DIR", "reports");
    std::env::set_var("REPORT_JSON", "1");

    let config = Config::from_env().expect("overrides should load");
    clear_env();

    assert_eq!(config.forum_origin().as_str(), "https://forum.example/");
    assert!(!config.headless);
    assert_eq!(config.page_timeout, Duration::from_secs(45));
    assert_eq!(config.max_pages, 3);
    assert_eq!(
        config.diagnostic_path(),
        PathBuf::from("reports/error_screenshot.png")
    );
    assert!(config.report_json);
}

#[test]
#[serial]
fn test_malformed_values_are_rejected() {
    clear_env();
    std::env::set_var("MAX_PAGES", "many");
    assert!(Config::from_env().is_err());

    clear_env();
    std::env::set_var("HEADLESS", "maybe");
    assert!(Config::from_env().is_err());

    clear_env();
    std::env::set_var("TARGET_URL", "not a url");
    assert!(Config::from_env().is_err());
    clear_env();
}

#[tokio::test]
async fn test_missing_cookie_fails_before_browser_launch() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = Config {
        cookie: None,
        // Would fail to launch if reached
        chrome_path: Some("/nonexistent/chrome".to_string()),
        report_dir: temp_dir.path().to_path_buf(),
        ..Config::for_testing()
    };

    let err = pipeline::run(&config).await.expect_err("run should fail");
    assert!(matches!(err, ScrapeError::Auth(AuthConfigError::Missing)));
    assert!(!temp_dir.path().join("error_screenshot.png").exists());
}

#[tokio::test]
async fn test_placeholder_cookie_is_rejected() {
    let config = Config {
        cookie: Some("在这里粘贴你的Cookie".to_string()),
        chrome_path: Some("/nonexistent/chrome".to_string()),
        ..Config::for_testing()
    };

    let err = pipeline::run(&config).await.expect_err("run should fail");
    assert!(matches!(err, ScrapeError::Auth(AuthConfigError::Placeholder)));
}

#[tokio::test]
async fn test_fixture_dir_replays_saved_pages() {
    let fixtures = TempDir::new().expect("Failed to create temp dir");
    let reports = TempDir::new().expect("Failed to create temp dir");
    let page = r#"<div class="c_threadlist"><ul><li>
        <div class="tit"><a href="thread-9-1-1.html">Saved thread</a></div>
        <div class="dte">2020-01-01 00:00</div>
        <em class="vie">1234</em>
    </li></ul></div>"#;
    std::fs::write(fixtures.path().join("page-1.html"), page).expect("Failed to write fixture");

    let config = Config {
        cookie: None,
        fixture_dir: Some(fixtures.path().to_path_buf()),
        report_dir: reports.path().to_path_buf(),
        ..Config::for_testing()
    };

    let path = pipeline::run(&config)
        .await
        .expect("replay should succeed")
        .expect("one thread should produce a report");
    assert!(path.starts_with(reports.path()));
    assert!(path.exists());
}
