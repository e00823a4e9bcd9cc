//! Bulk loading of cities from a CSV source

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cities_core::City;
use tracing::{info, warn};

/// Outcome of a bulk load: the cities produced and the rows that were rejected
#[derive(Debug, Default)]
pub struct LoadReport {
    pub cities: Vec<City>,
    pub rejected: Vec<RejectedRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    /// 1-based line number in the source, header included
    pub line: usize,
    pub reason: String,
}

/// Loads `id,title,imageURL` rows from a CSV file with a header row
pub struct CsvCityLoader {
    path: PathBuf,
}

impl CsvCityLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the source. A missing file is an empty source.
    pub async fn load(&self) -> Result<LoadReport> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "city source not found, nothing to load");
                return Ok(LoadReport::default());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read {}", self.path.display()));
            }
        };

        let report = parse_cities(&content);
        info!(
            path = %self.path.display(),
            loaded = report.cities.len(),
            rejected = report.rejected.len(),
            "parsed city source"
        );
        Ok(report)
    }
}

/// Parse CSV content into `FROM_SOURCE` cities.
///
/// The first line is a header. Each row is parsed on its own: a bad row is
/// recorded in `rejected` and does not affect the others.
pub fn parse_cities(content: &str) -> LoadReport {
    let mut report = LoadReport::default();

    for (idx, line) in content.lines().enumerate().skip(1) {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        match parse_row(line) {
            Ok(city) => report.cities.push(city),
            Err(reason) => {
                warn!(line = line_no, %reason, "skipping malformed city row");
                report.rejected.push(RejectedRow {
                    line: line_no,
                    reason,
                });
            }
        }
    }

    report
}

/// Rows are split on every comma. A field may be wrapped in double quotes,
/// but quoting does not protect an embedded comma.
fn parse_row(line: &str) -> std::result::Result<City, String> {
    let mut fields = line.splitn(3, ',');

    let id = unquote(fields.next().unwrap_or_default())?;
    let title = unquote(fields.next().ok_or("missing title column")?)?;
    let image_url = unquote(fields.next().ok_or("missing image URL column")?)?;

    let id: i64 = id
        .parse()
        .map_err(|e| format!("invalid id {:?}: {}", id, e))?;

    let city = City::from_source(id, title.to_string(), image_url.to_string());
    city.validate().map_err(|e| e.to_string())?;
    Ok(city)
}

fn unquote(field: &str) -> std::result::Result<&str, String> {
    let field = field.trim();
    let inner = match field.strip_prefix('"') {
        Some(rest) => rest
            .strip_suffix('"')
            .ok_or_else(|| format!("unterminated quoted field {:?}", field))?,
        None => field,
    };

    if inner.contains('"') {
        return Err(format!(
            "unexpected quote in field {:?} (fields cannot contain commas)",
            field
        ));
    }
    Ok(inner.trim())
}
