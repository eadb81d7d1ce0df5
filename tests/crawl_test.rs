//! Integration tests for the crawl loop and the end-to-end pipeline over
//! replayed listing pages.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use forum_thread_report::config::Config;
use forum_thread_report::crawl::{CrawlError, Crawler};
use forum_thread_report::page_source::{MemoryPageSource, PageContent};
use forum_thread_report::pipeline::{run_with_source, ScrapeError};
use tempfile::TempDir;
use url::Url;

fn anchor() -> NaiveDateTime {
    NaiveDateTime::parse_from_str("2024-03-10 12:00", "%Y-%m-%d %H:%M").unwrap()
}

fn entry(id: u32, title: &str, date: &str, views: &str) -> String {
    format!(
        r#"<li>
            <div class="tit"><a href="thread-{id}-1-1.html">{title}</a></div>
            <div class="dte">{date}</div>
            <em class="vie">{views}</em>
            <em class="y"><a href="forum.php?mod=redirect&amp;tid={id}&amp;goto=lastpost#lastpost"><span title="2024-3-10 10:00">2 小时前</span></a></em>
        </li>"#
    )
}

fn listing_page(page: u32, entries: &[String]) -> PageContent {
    PageContent {
        url: Url::parse(&format!(
            "https://klpbbs.com/home.php?mod=space&uid=1&do=thread&view=me&page={page}"
        ))
        .unwrap(),
        html: format!(
            r#"<html><body><div class="c_threadlist"><ul>{}</ul></div></body></html>"#,
            entries.join("\n")
        ),
    }
}

fn broken_page() -> PageContent {
    PageContent {
        url: Url::parse("https://klpbbs.com/member.php?mod=logging").unwrap(),
        html: "<html><body><div class=\"alert\">请先登录</div></body></html>".to_string(),
    }
}

fn three_pages() -> Vec<PageContent> {
    vec![
        listing_page(
            1,
            &[
                entry(1, "Page one A", "1 天前", "50"),
                entry(2, "Page one B", "2 天前", "400"),
            ],
        ),
        listing_page(2, &[entry(3, "Page two A", "2024-3-1 09:00", "90")]),
        listing_page(
            3,
            &[
                entry(4, "Page three A", "昨天 08:00", "7"),
                entry(5, "Page three B", "半小时前", "3"),
            ],
        ),
    ]
}

fn test_config(report_dir: PathBuf) -> Config {
    Config {
        report_dir,
        ..Config::for_testing()
    }
}

#[tokio::test]
async fn test_three_page_crawl_visits_each_page_once() {
    let mut source = MemoryPageSource::new(three_pages());
    let session = Crawler::new(&mut source, 10, PathBuf::from("unused.png"))
        .run(anchor())
        .await
        .expect("crawl should succeed");

    assert_eq!(session.pages_visited, 3);
    let titles: Vec<_> = session.records.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["Page one A", "Page one B", "Page two A", "Page three A", "Page three B"]
    );
    assert_eq!(source.fetched_pages(), &[0, 1, 2]);
}

#[tokio::test]
async fn test_malformed_entry_does_not_abort_page() {
    let page = listing_page(
        1,
        &[
            entry(1, "Good one", "1 天前", "10"),
            entry(2, "Bad views", "1 天前", "n/a"),
            entry(3, "Good two", "1 天前", "20"),
        ],
    );
    let mut source = MemoryPageSource::new(vec![page]);
    let session = Crawler::new(&mut source, 10, PathBuf::from("unused.png"))
        .run(anchor())
        .await
        .expect("crawl should succeed");

    assert_eq!(session.records.len(), 2);
    assert_eq!(session.skipped_entries, 1);
    assert_eq!(session.records[0].title, "Good one");
    assert_eq!(session.records[1].title, "Good two");
}

#[tokio::test]
async fn test_missing_listing_captures_diagnostic_and_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let diagnostic = temp_dir.path().join("error_screenshot.png");
    let mut source = MemoryPageSource::new(vec![
        listing_page(1, &[entry(1, "Before failure", "1 天前", "10")]),
        broken_page(),
    ]);

    let failure = Crawler::new(&mut source, 10, diagnostic.clone())
        .run(anchor())
        .await
        .expect_err("crawl should fail on page 2");

    assert!(matches!(failure.error, CrawlError::PageStructure { page: 2, .. }));
    assert_eq!(failure.partial.records.len(), 1);
    assert_eq!(source.diagnostics(), &[diagnostic.clone()]);
    assert!(diagnostic.with_extension("html").exists());
    assert!(!diagnostic.exists());
}

#[tokio::test]
async fn test_pipeline_writes_sorted_report_and_closes_source() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = Config {
        report_json: true,
        ..test_config(temp_dir.path().to_path_buf())
    };
    let mut source = MemoryPageSource::new(three_pages());

    let path = run_with_source(&mut source, &config, anchor())
        .await
        .expect("pipeline should succeed")
        .expect("report should be written");

    assert!(source.is_closed());
    assert_eq!(
        path,
        temp_dir
            .path()
            .join("forum_thread_report_2024-03-10_12-00-00.xlsx")
    );
    let bytes = std::fs::read(&path).expect("Failed to read report");
    assert!(bytes.starts_with(b"PK"), "xlsx is a zip container");

    let json: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(path.with_extension("json")).expect("Failed to read json"),
    )
    .expect("Failed to parse json");
    assert_eq!(json["pages_visited"], 3);
    let daily: Vec<f64> = json["threads"]
        .as_array()
        .expect("threads should be an array")
        .iter()
        .map(|t| t["daily_views"].as_f64().unwrap())
        .collect();
    assert_eq!(daily.len(), 5);
    assert!(daily.windows(2).all(|w| w[0] >= w[1]));
    assert!((daily[0] - 200.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_pipeline_without_threads_writes_nothing() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = test_config(temp_dir.path().to_path_buf());
    let mut source = MemoryPageSource::new(vec![listing_page(1, &[])]);

    let result = run_with_source(&mut source, &config, anchor())
        .await
        .expect("pipeline should succeed");

    assert!(result.is_none());
    assert!(source.is_closed());
    let files: Vec<_> = std::fs::read_dir(temp_dir.path()).unwrap().collect();
    assert!(files.is_empty(), "no report file expected");
}

#[tokio::test]
async fn test_pipeline_failure_closes_source_without_report() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = test_config(temp_dir.path().to_path_buf());
    let mut source = MemoryPageSource::new(vec![
        listing_page(1, &[entry(1, "Collected", "1 天前", "10")]),
        broken_page(),
    ]);

    let err = run_with_source(&mut source, &config, anchor())
        .await
        .expect_err("pipeline should fail");

    assert!(matches!(
        err,
        ScrapeError::Crawl(CrawlError::PageStructure { page: 2, .. })
    ));
    assert!(source.is_closed());
    let reports: Vec<_> = std::fs::read_dir(temp_dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "xlsx"))
        .collect();
    assert!(reports.is_empty());
}

#[tokio::test]
async fn test_pipeline_can_report_partial_results() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = Config {
        report_partial_on_failure: true,
        ..test_config(temp_dir.path().to_path_buf())
    };
    let mut source = MemoryPageSource::new(vec![
        listing_page(1, &[entry(1, "Collected", "1 天前", "10")]),
        broken_page(),
    ]);

    let result = run_with_source(&mut source, &config, anchor()).await;

    assert!(result.is_err());
    assert!(temp_dir
        .path()
        .join("forum_thread_report_2024-03-10_12-00-00.xlsx")
        .exists());
}

#[tokio::test]
async fn test_page_cap_is_a_distinct_failure() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = Config {
        max_pages: 2,
        ..test_config(temp_dir.path().to_path_buf())
    };
    let mut source = MemoryPageSource::new(three_pages());

    let err = run_with_source(&mut source, &config, anchor())
        .await
        .expect_err("cap should stop the crawl");

    assert!(matches!(
        err,
        ScrapeError::Crawl(CrawlError::MaxPagesExceeded { limit: 2 })
    ));
    assert_eq!(source.fetched_pages(), &[0, 1]);
}
