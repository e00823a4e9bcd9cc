//! Record store for city records

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use cities_core::{City, CityStatus};
use sqlx::Row;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use tracing::debug;

use crate::error::{Result, StorageError};

/// SQLite-backed record store. Cloning shares the connection pool.
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Open (or create) the database and run migrations.
    ///
    /// `None` uses `cities.db` in the platform data directory.
    pub async fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let path = match db_path {
            Some(path) => path,
            None => Self::default_db_path()?,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        debug!(path = %path.display(), "opened city database");

        let storage = Self { pool };
        storage.migrate().await?;
        Ok(storage)
    }

    /// Private in-memory database, used by tests and throwaway runs
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // Every connection to :memory: is a separate database, so keep exactly one alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let storage = Self { pool };
        storage.migrate().await?;
        Ok(storage)
    }

    pub fn default_db_path() -> Result<PathBuf> {
        directories::ProjectDirs::from("com", "cities", "cities")
            .map(|dirs| dirs.data_dir().join("cities.db"))
            .ok_or_else(|| anyhow::anyhow!("Could not determine a data directory").into())
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cities (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                image_location TEXT NOT NULL,
                status TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_city(&self, id: i64) -> Result<Option<City>> {
        let row = sqlx::query(
            "SELECT id, title, image_location, status FROM cities WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_city).transpose()
    }

    /// All cities, ordered by id
    pub async fn list_cities(&self) -> Result<Vec<City>> {
        let rows = sqlx::query("SELECT id, title, image_location, status FROM cities ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_city).collect()
    }

    /// Insert the city, or overwrite the existing record with the same id.
    ///
    /// Last writer wins: there is no version check between concurrent saves.
    pub async fn save_city(&self, city: &City) -> Result<City> {
        city.validate()?;

        sqlx::query(
            r#"
            INSERT INTO cities (id, title, image_location, status)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                image_location = excluded.image_location,
                status = excluded.status
            "#,
        )
        .bind(city.id)
        .bind(&city.title)
        .bind(&city.image_location)
        .bind(city.status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(city.clone())
    }

    /// Case-insensitive substring match over titles, ordered by id.
    ///
    /// An empty search text matches nothing. Matching happens on Unicode
    /// lowercase forms, which SQLite's `lower()` and `LIKE` only handle for ASCII.
    pub async fn find_by_title(&self, text: &str) -> Result<Vec<City>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let needle = text.to_lowercase();
        let cities = self.list_cities().await?;

        Ok(cities
            .into_iter()
            .filter(|city| city.title.to_lowercase().contains(&needle))
            .collect())
    }

    pub async fn count_cities(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cities")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn row_to_city(row: &SqliteRow) -> Result<City> {
    let id: i64 = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let status = CityStatus::from_str(&status).map_err(|e| StorageError::CorruptRecord {
        id,
        reason: e.to_string(),
    })?;

    Ok(City {
        id,
        title: row.try_get("title")?,
        image_location: row.try_get("image_location")?,
        status,
    })
}
