pub mod fetch;
pub mod loader;

pub use fetch::{FetchOptions, HttpImageFetcher, ImageFetcher, is_fetchable_url};
pub use loader::{CsvCityLoader, LoadReport, RejectedRow, parse_cities};
