use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use cities_core::{City, CityDraft, CityStatus};
use cities_engine::{Catalog, CatalogError};
use cities_sources::{CsvCityLoader, ImageFetcher};
use cities_storage::{BlobStore, Storage};

/// Serves a fixed body, or fails every request when `body` is `None`
struct StubFetcher {
    body: Option<Vec<u8>>,
    calls: AtomicUsize,
}

impl StubFetcher {
    fn serving(body: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            body: Some(body.to_vec()),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            body: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.body {
            Some(body) => Ok(body.clone()),
            None => anyhow::bail!("connection refused: {}", url),
        }
    }
}

struct Fixture {
    dir: tempfile::TempDir,
    catalog: Catalog,
    blobs: Arc<BlobStore>,
}

impl Fixture {
    async fn new(fetcher: Arc<StubFetcher>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::in_memory().await.unwrap();
        let blobs = Arc::new(BlobStore::new(dir.path().join("images")).unwrap());
        let loader = CsvCityLoader::new(dir.path().join("cities.csv"));
        let catalog = Catalog::new(storage, blobs.clone(), fetcher, loader);
        Self {
            dir,
            catalog,
            blobs,
        }
    }

    fn write_source(&self, content: &str) {
        std::fs::write(self.dir.path().join("cities.csv"), content).unwrap();
    }

    async fn save(&self, city: &City) {
        self.catalog.storage().save_city(city).await.unwrap();
    }

    async fn city(&self, id: i64) -> City {
        self.catalog.find_by_id(id).await.unwrap().unwrap()
    }

    /// Make every blob write fail by putting a regular file where the root was
    fn break_blob_root(&self) {
        let root = self.blobs.root();
        std::fs::remove_dir_all(root).unwrap();
        std::fs::write(root, b"not a directory").unwrap();
    }
}

fn city(id: i64, title: &str) -> City {
    City::from_source(
        id,
        title.to_string(),
        format!("https://example.org/images/{}.jpg", title.to_lowercase()),
    )
}

const SOURCE: &str = "\
id,name,photo
1,Tallinn,https://example.org/images/tallinn.jpg
2,Tartu,https://example.org/images/tartu.jpg
3,Narva,https://example.org/images/narva.jpg
4,Pärnu,https://example.org/images/parnu.jpg
";

#[tokio::test]
async fn test_bulk_load_persists_every_row() {
    let fixture = Fixture::new(StubFetcher::failing()).await;
    fixture.write_source(SOURCE);

    assert!(fixture.catalog.bulk_load().await.unwrap());

    let cities = fixture.catalog.storage().list_cities().await.unwrap();
    assert_eq!(cities.len(), 4);
    assert!(cities.iter().all(|c| c.status == CityStatus::FromSource));
}

#[tokio::test]
async fn test_bulk_load_empty_source() {
    let fixture = Fixture::new(StubFetcher::failing()).await;
    fixture.write_source("id,name,photo\n");

    assert!(!fixture.catalog.bulk_load().await.unwrap());
    assert_eq!(fixture.catalog.storage().count_cities().await.unwrap(), 0);
}

#[tokio::test]
async fn test_bulk_load_missing_source() {
    let fixture = Fixture::new(StubFetcher::failing()).await;

    assert!(!fixture.catalog.bulk_load().await.unwrap());
}

#[tokio::test]
async fn test_bulk_load_skips_malformed_rows() {
    let fixture = Fixture::new(StubFetcher::failing()).await;
    fixture.write_source(
        "id,name,photo\n1,Tallinn,https://example.org/t.jpg\none,Tartu,https://example.org/u.jpg\n",
    );

    let report = fixture.catalog.bulk_load_report().await.unwrap();
    assert_eq!(report.cities.len(), 1);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(fixture.catalog.storage().count_cities().await.unwrap(), 1);
}

#[tokio::test]
async fn test_titles_in_store_order() {
    let fixture = Fixture::new(StubFetcher::failing()).await;
    fixture.write_source(SOURCE);
    fixture.catalog.bulk_load().await.unwrap();

    let titles = fixture.catalog.titles().await.unwrap();
    assert_eq!(titles, vec!["Tallinn", "Tartu", "Narva", "Pärnu"]);
}

#[tokio::test]
async fn test_search_by_title() {
    let fixture = Fixture::new(StubFetcher::failing()).await;
    fixture.write_source(SOURCE);
    fixture.catalog.bulk_load().await.unwrap();

    let found = fixture.catalog.search_by_title("tallin").await.unwrap();
    assert_eq!(found.map(|c| c.id), Some(1));

    // Tallinn and Tartu both contain "ta"
    assert_eq!(fixture.catalog.search_by_title("ta").await.unwrap(), None);
    assert_eq!(fixture.catalog.search_by_title("Toronto").await.unwrap(), None);
    assert_eq!(fixture.catalog.search_by_title("").await.unwrap(), None);
}

#[tokio::test]
async fn test_find_by_id() {
    let fixture = Fixture::new(StubFetcher::failing()).await;
    fixture.save(&city(1, "Tallinn")).await;

    assert_eq!(
        fixture.catalog.find_by_id(1).await.unwrap(),
        Some(city(1, "Tallinn"))
    );
    assert_eq!(fixture.catalog.find_by_id(2).await.unwrap(), None);
}

#[tokio::test]
async fn test_materialized_image_is_served_without_fetch() {
    let fetcher = StubFetcher::serving(b"remote");
    let fixture = Fixture::new(fetcher.clone()).await;

    let path = fixture.blobs.put(b"cached", "Tartu", ".jpg").await.unwrap();
    let mut tartu = city(2, "Tartu");
    tartu.materialize(path.to_string_lossy().into_owned());
    fixture.save(&tartu).await;

    let image = fixture.catalog.image_for_city(2).await.unwrap();
    assert_eq!(image, Some(b"cached".to_vec()));
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_unreachable_url_leaves_city_from_source() {
    let fetcher = StubFetcher::failing();
    let fixture = Fixture::new(fetcher.clone()).await;
    fixture.save(&city(3, "Narva")).await;

    assert_eq!(fixture.catalog.image_for_city(3).await.unwrap(), None);
    assert_eq!(fixture.city(3).await, city(3, "Narva"));
    assert_eq!(fetcher.calls(), 1);

    // The record is still owed a fetch, so the next call retries
    assert_eq!(fixture.catalog.image_for_city(3).await.unwrap(), None);
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn test_invalid_url_is_not_fetched() {
    let fetcher = StubFetcher::serving(b"never");
    let fixture = Fixture::new(fetcher.clone()).await;
    let local = City::from_source(
        5,
        "Viljandi".to_string(),
        "src/main/resources/images/viljandi.jpg".to_string(),
    );
    fixture.save(&local).await;

    assert_eq!(fixture.catalog.image_for_city(5).await.unwrap(), None);
    assert_eq!(fixture.city(5).await.status, CityStatus::FromSource);
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_first_fetch_transitions_second_call_serves() {
    let fetcher = StubFetcher::serving(b"tallinn jpeg");
    let fixture = Fixture::new(fetcher.clone()).await;
    fixture.save(&City::from_source(
        1,
        "Tallinn".to_string(),
        "https://example/tallinn.jpg".to_string(),
    ))
    .await;

    assert_eq!(fixture.catalog.image_for_city(1).await.unwrap(), None);

    let tallinn = fixture.city(1).await;
    assert_eq!(tallinn.status, CityStatus::Materialized);
    assert!(Path::new(&tallinn.image_location).starts_with(fixture.blobs.root()));
    assert!(tallinn.image_location.ends_with("-Tallinn.jpg"));

    assert_eq!(
        fixture.catalog.image_for_city(1).await.unwrap(),
        Some(b"tallinn jpeg".to_vec())
    );
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_serve_on_materialize_returns_bytes_immediately() {
    let fetcher = StubFetcher::serving(b"tartu jpeg");
    let fixture = Fixture::new(fetcher.clone()).await;
    let catalog = fixture.catalog.serve_on_materialize(true);
    catalog.storage().save_city(&city(2, "Tartu")).await.unwrap();

    assert_eq!(
        catalog.image_for_city(2).await.unwrap(),
        Some(b"tartu jpeg".to_vec())
    );
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_image_for_unknown_city() {
    let fixture = Fixture::new(StubFetcher::serving(b"x")).await;

    assert_eq!(fixture.catalog.image_for_city(404).await.unwrap(), None);
}

#[tokio::test]
async fn test_update_rejects_missing_or_blank() {
    let fixture = Fixture::new(StubFetcher::failing()).await;

    let err = fixture.catalog.update_city(None).await.unwrap_err();
    assert!(matches!(err, CatalogError::Validation(_)));

    let blank_title = CityDraft {
        title: Some("  ".to_string()),
        ..CityDraft::from(city(1, "Tallinn"))
    };
    let err = fixture.catalog.update_city(Some(blank_title)).await.unwrap_err();
    assert!(matches!(err, CatalogError::Validation(_)));

    let no_location = CityDraft {
        image_location: None,
        ..CityDraft::from(city(1, "Tallinn"))
    };
    let err = fixture.catalog.update_city(Some(no_location)).await.unwrap_err();
    assert!(matches!(err, CatalogError::Validation(_)));

    let blank_status = CityDraft {
        status: Some(String::new()),
        ..CityDraft::from(city(1, "Tallinn"))
    };
    let err = fixture.catalog.update_city(Some(blank_status)).await.unwrap_err();
    assert!(matches!(err, CatalogError::Validation(_)));

    assert_eq!(fixture.catalog.storage().count_cities().await.unwrap(), 0);
}

#[tokio::test]
async fn test_update_round_trips() {
    let fixture = Fixture::new(StubFetcher::failing()).await;
    fixture.save(&city(1, "Tallinn")).await;

    let renamed = City::new(
        1,
        "Reval".to_string(),
        "https://example.org/images/reval.png".to_string(),
        CityStatus::FromSource,
    );
    let updated = fixture
        .catalog
        .update_city(Some(CityDraft::from(renamed.clone())))
        .await
        .unwrap();

    assert_eq!(updated, renamed);
    assert_eq!(fixture.city(1).await, renamed);
}

#[tokio::test]
async fn test_upload_without_bytes_changes_nothing() {
    let fixture = Fixture::new(StubFetcher::failing()).await;
    fixture.save(&city(1, "Tallinn")).await;

    assert!(!fixture.catalog.upload_image(None, 1).await.unwrap());
    assert!(!fixture.catalog.upload_image(Some(&[][..]), 1).await.unwrap());
    assert_eq!(fixture.city(1).await, city(1, "Tallinn"));
}

#[tokio::test]
async fn test_upload_materializes_city() {
    let fetcher = StubFetcher::failing();
    let fixture = Fixture::new(fetcher.clone()).await;
    fixture.save(&city(1, "Tallinn")).await;

    assert!(
        fixture
            .catalog
            .upload_image(Some(&b"uploaded png"[..]), 1)
            .await
            .unwrap()
    );

    let tallinn = fixture.city(1).await;
    assert_eq!(tallinn.status, CityStatus::Materialized);
    assert!(tallinn.image_location.ends_with("-Tallinn.jpg"));

    assert_eq!(
        fixture.catalog.image_for_city(1).await.unwrap(),
        Some(b"uploaded png".to_vec())
    );
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_upload_for_unknown_city() {
    let fixture = Fixture::new(StubFetcher::failing()).await;

    assert!(!fixture.catalog.upload_image(Some(&b"bytes"[..]), 9).await.unwrap());
    assert_eq!(fixture.catalog.storage().count_cities().await.unwrap(), 0);
}

#[tokio::test]
async fn test_blob_write_failure_leaves_records_untouched() {
    let fetcher = StubFetcher::serving(b"tallinn jpeg");
    let fixture = Fixture::new(fetcher.clone()).await;
    fixture.save(&city(1, "Tallinn")).await;
    fixture.save(&city(2, "Tartu")).await;
    fixture.break_blob_root();

    assert_eq!(fixture.catalog.image_for_city(1).await.unwrap(), None);
    assert_eq!(fetcher.calls(), 1);
    let tallinn = fixture.city(1).await;
    assert_eq!(tallinn.status, CityStatus::FromSource);
    assert_eq!(tallinn.image_location, "https://example.org/images/tallinn.jpg");

    assert!(
        !fixture
            .catalog
            .upload_image(Some(&b"uploaded png"[..]), 2)
            .await
            .unwrap()
    );
    assert_eq!(fixture.city(2).await, city(2, "Tartu"));
}
