//! Lazy materialization of remote city images into local storage.
//!
//! A `FROM_SOURCE` city points at a remote URL. The first successful fetch
//! stores the bytes in the blob store and flips the record to `MATERIALIZED`
//! with its location rewritten to the local path. From then on the image is
//! served from disk.
//!
//! The call that performs the transition returns no content unless
//! `serve_on_materialize` is enabled; the bytes are served by the next call.

use std::sync::Arc;

use cities_core::{City, CityStatus};
use cities_sources::{ImageFetcher, is_fetchable_url};
use cities_storage::{BlobStore, Storage};
use tracing::{debug, info, warn};

use crate::Result;

pub struct ImageMaterializer {
    storage: Storage,
    blobs: Arc<BlobStore>,
    fetcher: Arc<dyn ImageFetcher>,
    serve_on_materialize: bool,
}

impl ImageMaterializer {
    pub fn new(storage: Storage, blobs: Arc<BlobStore>, fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self {
            storage,
            blobs,
            fetcher,
            serve_on_materialize: false,
        }
    }

    /// Return the freshly cached bytes from the transitioning call itself
    pub fn serve_on_materialize(mut self, enabled: bool) -> Self {
        self.serve_on_materialize = enabled;
        self
    }

    /// Image bytes for a city, materializing the remote image on first access.
    ///
    /// `Ok(None)` covers an unknown city, a failed fetch (the record is left
    /// as it was so a later call retries), the transitioning call itself,
    /// and a stored location that cannot be read.
    pub async fn resolve_image(&self, city_id: i64) -> Result<Option<Vec<u8>>> {
        let Some(mut city) = self.storage.get_city(city_id).await? else {
            debug!(city_id, "no such city");
            return Ok(None);
        };

        if city.status == CityStatus::FromSource {
            match self.materialize(&mut city).await? {
                Some(bytes) if self.serve_on_materialize => return Ok(Some(bytes)),
                _ => return Ok(None),
            }
        }

        debug!(city_id, location = %city.image_location, "serving cached image");
        Ok(self.blobs.get(&city.image_location).await)
    }

    /// Fetch, store and persist the transition.
    ///
    /// Returns the fetched bytes when the record was moved to `MATERIALIZED`,
    /// `None` when nothing changed.
    async fn materialize(&self, city: &mut City) -> Result<Option<Vec<u8>>> {
        if !is_fetchable_url(&city.image_location) {
            warn!(
                city_id = city.id,
                location = %city.image_location,
                "image location is not a fetchable URL"
            );
            return Ok(None);
        }

        let bytes = match self.fetcher.fetch(&city.image_location).await {
            Ok(bytes) if bytes.is_empty() => {
                warn!(city_id = city.id, url = %city.image_location, "remote image is empty");
                return Ok(None);
            }
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(city_id = city.id, url = %city.image_location, error = %e, "image fetch failed");
                return Ok(None);
            }
        };

        let path = match self
            .blobs
            .put(&bytes, &city.title, city.image_extension())
            .await
        {
            Ok(path) => path.to_string_lossy().into_owned(),
            Err(e) => {
                warn!(city_id = city.id, error = %e, "failed to store fetched image");
                return Ok(None);
            }
        };

        if path == city.image_location {
            return Ok(None);
        }

        let source = std::mem::take(&mut city.image_location);
        city.materialize(path);
        self.storage.save_city(city).await?;

        info!(
            city_id = city.id,
            from = %source,
            to = %city.image_location,
            bytes = bytes.len(),
            "materialized city image"
        );

        Ok(Some(bytes))
    }
}
