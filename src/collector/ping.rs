//! Ping scraper for checking the scrape pipeline end to end.
//!
//! - [`PingScraper`]: delayed constant gauge

mod scraper;

pub use scraper::PingScraper;
