//! City domain model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// A catalog entry: a city and the location of its representative image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct City {
    pub id: i64,
    pub title: String,
    /// Remote URL while `FROM_SOURCE`, local storage path once `MATERIALIZED`
    pub image_location: String,
    pub status: CityStatus,
}

impl City {
    pub fn new(id: i64, title: String, image_location: String, status: CityStatus) -> Self {
        Self {
            id,
            title,
            image_location,
            status,
        }
    }

    /// A city freshly produced by the bulk loader, pointing at its remote image
    pub fn from_source(id: i64, title: String, image_url: String) -> Self {
        Self::new(id, title, image_url, CityStatus::FromSource)
    }

    pub fn is_materialized(&self) -> bool {
        self.status == CityStatus::Materialized
    }

    /// Point the record at a locally cached image
    pub fn materialize(&mut self, local_path: String) {
        self.image_location = local_path;
        self.status = CityStatus::Materialized;
    }

    /// Extension of the current image location (e.g. `.jpg`), empty if none
    pub fn image_extension(&self) -> &str {
        image_extension(&self.image_location)
    }

    /// Check the invariant every persisted record must satisfy
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "City {} has a blank title",
                self.id
            )));
        }
        if self.image_location.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "City {} has a blank image location",
                self.id
            )));
        }
        Ok(())
    }
}

/// Whether a city's image still has to be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CityStatus {
    /// Image location is a remote reference that has never been fetched
    #[serde(rename = "FROM_SOURCE", alias = "FROM_CSV")]
    FromSource,
    /// Image bytes are cached locally and the location points at them
    #[serde(rename = "MATERIALIZED", alias = "DOWNLOADED")]
    Materialized,
}

impl CityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CityStatus::FromSource => "FROM_SOURCE",
            CityStatus::Materialized => "MATERIALIZED",
        }
    }
}

impl fmt::Display for CityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CityStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FROM_SOURCE" | "FROM_CSV" => Ok(CityStatus::FromSource),
            "MATERIALIZED" | "DOWNLOADED" => Ok(CityStatus::Materialized),
            _ => Err(CoreError::UnknownStatus(s.to_string())),
        }
    }
}

/// Client-supplied city, not yet validated
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityDraft {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image_location: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl CityDraft {
    /// Turn the draft into a record, rejecting blank or missing fields
    pub fn validate(self) -> Result<City> {
        let title = required(self.title, "title")?;
        let image_location = required(self.image_location, "imageLocation")?;
        let status = required(self.status, "status")?;
        let status = status
            .parse::<CityStatus>()
            .map_err(|e| CoreError::Validation(e.to_string()))?;

        let city = City::new(self.id, title, image_location, status);
        city.validate()?;
        Ok(city)
    }
}

impl From<City> for CityDraft {
    fn from(city: City) -> Self {
        Self {
            id: city.id,
            title: Some(city.title),
            image_location: Some(city.image_location),
            status: Some(city.status.as_str().to_string()),
        }
    }
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(CoreError::Validation(format!("City {} is blank", field))),
    }
}

/// Trailing dot-suffix of the last segment of an image location.
///
/// Query strings and fragments are ignored, so
/// `https://host/a/tallinn.jpg?width=200` yields `.jpg`. Returns an empty
/// string when the last segment has no dot.
pub fn image_extension(location: &str) -> &str {
    let without_query = location.split(['?', '#']).next().unwrap_or(location);
    let last_segment = without_query
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(without_query);

    match last_segment.rfind('.') {
        Some(idx) => &last_segment[idx..],
        None => "",
    }
}
