//! Public city operations

use std::sync::Arc;

use cities_core::{City, CityDraft};
use cities_sources::{CsvCityLoader, ImageFetcher, LoadReport};
use cities_storage::{BlobStore, Storage};
use tracing::{debug, info, warn};

use crate::materializer::ImageMaterializer;
use crate::{CatalogError, Result};

pub struct Catalog {
    storage: Storage,
    blobs: Arc<BlobStore>,
    loader: CsvCityLoader,
    materializer: ImageMaterializer,
}

impl Catalog {
    pub fn new(
        storage: Storage,
        blobs: Arc<BlobStore>,
        fetcher: Arc<dyn ImageFetcher>,
        loader: CsvCityLoader,
    ) -> Self {
        let materializer = ImageMaterializer::new(storage.clone(), blobs.clone(), fetcher);
        Self {
            storage,
            blobs,
            loader,
            materializer,
        }
    }

    /// See [`ImageMaterializer::serve_on_materialize`]
    pub fn serve_on_materialize(mut self, enabled: bool) -> Self {
        self.materializer = self.materializer.serve_on_materialize(enabled);
        self
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Load the CSV source and persist every city it produced
    pub async fn bulk_load_report(&self) -> Result<LoadReport> {
        let report = self.loader.load().await?;

        for city in &report.cities {
            self.storage.save_city(city).await?;
        }

        info!(
            source = %self.loader.path().display(),
            saved = report.cities.len(),
            rejected = report.rejected.len(),
            "bulk load finished"
        );
        Ok(report)
    }

    /// Bulk load; true if at least one city was loaded
    pub async fn bulk_load(&self) -> Result<bool> {
        let report = self.bulk_load_report().await?;
        Ok(!report.cities.is_empty())
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<City>> {
        Ok(self.storage.get_city(id).await?)
    }

    pub async fn titles(&self) -> Result<Vec<String>> {
        let cities = self.storage.list_cities().await?;
        Ok(cities.into_iter().map(|c| c.title).collect())
    }

    /// The single city whose title contains `text`.
    ///
    /// Zero matches and ambiguous matches both yield `None`.
    pub async fn search_by_title(&self, text: &str) -> Result<Option<City>> {
        let matches = self.storage.find_by_title(text).await?;

        match matches.as_slice() {
            [only] => self.find_by_id(only.id).await,
            [] => Ok(None),
            _ => {
                debug!(text, matches = matches.len(), "ambiguous city search");
                Ok(None)
            }
        }
    }

    /// Validate and persist a client-supplied city
    pub async fn update_city(&self, draft: Option<CityDraft>) -> Result<City> {
        let Some(draft) = draft else {
            return Err(CatalogError::Validation("City is missing".to_string()));
        };

        let city = draft.validate()?;
        Ok(self.storage.save_city(&city).await?)
    }

    /// Store client-supplied image bytes for a city and mark it materialized.
    ///
    /// Returns false without touching the record when no bytes were given,
    /// the city does not exist, or the bytes could not be stored.
    pub async fn upload_image(&self, bytes: Option<&[u8]>, city_id: i64) -> Result<bool> {
        let Some(bytes) = bytes.filter(|b| !b.is_empty()) else {
            return Ok(false);
        };

        let Some(mut city) = self.storage.get_city(city_id).await? else {
            warn!(city_id, "upload for unknown city");
            return Ok(false);
        };

        let path = match self
            .blobs
            .put(bytes, &city.title, city.image_extension())
            .await
        {
            Ok(path) => path,
            Err(e) => {
                warn!(city_id, error = %e, "failed to store uploaded image");
                return Ok(false);
            }
        };

        city.materialize(path.to_string_lossy().into_owned());
        self.storage.save_city(&city).await?;

        info!(city_id, location = %city.image_location, "stored uploaded image");
        Ok(true)
    }

    pub async fn image_for_city(&self, city_id: i64) -> Result<Option<Vec<u8>>> {
        self.materializer.resolve_image(city_id).await
    }
}
