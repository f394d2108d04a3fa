pub mod cache;
pub mod details;
pub mod error;
pub mod fetch;
pub mod months;
pub mod output;
pub mod records;
pub mod report;
pub mod scrape;
pub mod service;
pub mod session;
pub mod source;
