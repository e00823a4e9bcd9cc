//! Storage layer for the cities catalog
//!
//! This crate provides:
//! - SQLite record store for city records
//! - Blob storage for materialized images

pub mod blob;
pub mod db;
pub mod error;

pub use blob::BlobStore;
pub use db::Storage;
pub use error::{Result, StorageError};
