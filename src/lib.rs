//! Forum thread report library.
//!
//! Crawls a forum user's paginated thread listing through an authenticated
//! browser session, normalizes the forum's relative dates against a single
//! anchor time, ranks threads by views per day and writes a color-graded
//! Excel report.

pub mod config;
pub mod cookies;
pub mod crawl;
pub mod dates;
pub mod metrics;
pub mod models;
pub mod page_source;
pub mod parser;
pub mod pipeline;
pub mod report;
