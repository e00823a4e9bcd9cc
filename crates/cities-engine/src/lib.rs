//! Catalog orchestration: image materialization and the public city operations

pub mod catalog;
pub mod error;
pub mod materializer;

pub use catalog::Catalog;
pub use error::{CatalogError, Result};
pub use materializer::ImageMaterializer;
