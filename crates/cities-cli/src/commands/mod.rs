pub mod city;
pub mod serve;

use anyhow::{Context, Result};
use cities_config::Config;
use cities_engine::Catalog;
use cities_sources::{CsvCityLoader, FetchOptions, HttpImageFetcher};
use cities_storage::{BlobStore, Storage};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Wire storage, blob store, fetcher and loader from config
pub async fn open_catalog(config: &Config, source: Option<PathBuf>) -> Result<Catalog> {
    let storage = Storage::new(config.database_path.clone()).await?;

    let blobs = BlobStore::new(config.storage_root.clone()).with_context(|| {
        format!(
            "Failed to open image storage at {}",
            config.storage_root.display()
        )
    })?;

    let mut options = FetchOptions {
        timeout: Duration::from_secs(config.fetch.timeout_secs),
        max_bytes: config.fetch.max_bytes,
        ..FetchOptions::default()
    };
    if let Some(agent) = &config.fetch.user_agent {
        options.user_agent = agent.clone();
    }
    let fetcher = HttpImageFetcher::new(options)?;

    let loader = CsvCityLoader::new(source.unwrap_or_else(|| config.source_csv.clone()));

    debug!(
        storage_root = %blobs.root().display(),
        source = %loader.path().display(),
        "catalog opened"
    );

    Ok(Catalog::new(storage, Arc::new(blobs), Arc::new(fetcher), loader)
        .serve_on_materialize(config.materialize.serve_on_materialize))
}
