//! Outbound web access shared by the web loader, the scraper and the
//! Wikipedia tool.

pub mod fetch;
pub mod html;

pub use fetch::{FetchError, FetchedPage, WebFetcher};
pub use html::{extract_links, html_to_text, page_metadata, PageMetadata};
