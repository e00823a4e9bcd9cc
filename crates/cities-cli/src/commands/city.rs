use anyhow::{Context, Result};
use cities_core::{City, CityDraft};
use cities_engine::Catalog;
use std::path::PathBuf;

pub async fn init(catalog: &Catalog) -> Result<()> {
    let report = catalog.bulk_load_report().await?;

    if report.cities.is_empty() {
        println!("No cities loaded.");
    } else {
        println!("✓ Loaded {} cities", report.cities.len());
    }

    if !report.rejected.is_empty() {
        println!("\nSkipped rows ({}):", report.rejected.len());
        for row in &report.rejected {
            println!("  line {}: {}", row.line, row.reason);
        }
    }

    Ok(())
}

pub async fn show(catalog: &Catalog, id: i64) -> Result<()> {
    let city = require_city(catalog, id).await?;
    print_city(&city)
}

pub async fn image(catalog: &Catalog, id: i64, out: Option<PathBuf>) -> Result<()> {
    let before = require_city(catalog, id).await?;

    let Some(bytes) = catalog.image_for_city(id).await? else {
        let after = require_city(catalog, id).await?;
        if !before.is_materialized() && after.is_materialized() {
            println!("✓ Cached image for {}", after.title);
            println!("  Location: {}", after.image_location);
            println!("  Run again to read it.");
        } else {
            println!("No image available for {}.", after.title);
        }
        return Ok(());
    };

    match out {
        Some(path) => {
            tokio::fs::write(&path, &bytes)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("✓ Wrote {} bytes to {}", bytes.len(), path.display());
        }
        None => {
            println!("Image for {}: {} bytes", before.title, bytes.len());
        }
    }

    Ok(())
}

pub async fn titles(catalog: &Catalog) -> Result<()> {
    let titles = catalog.titles().await?;

    if titles.is_empty() {
        println!("No cities found.");
        return Ok(());
    }

    for title in titles {
        println!("  {}", title);
    }

    Ok(())
}

pub async fn search(catalog: &Catalog, text: String) -> Result<()> {
    match catalog.search_by_title(&text).await? {
        Some(city) => print_city(&city),
        None => {
            println!("No single city matches '{}'.", text);
            Ok(())
        }
    }
}

pub async fn update(
    catalog: &Catalog,
    id: i64,
    title: Option<String>,
    location: Option<String>,
    status: Option<String>,
) -> Result<()> {
    // Unspecified fields keep their stored values
    let mut draft = catalog
        .find_by_id(id)
        .await?
        .map(CityDraft::from)
        .unwrap_or_default();
    draft.id = id;
    if title.is_some() {
        draft.title = title;
    }
    if location.is_some() {
        draft.image_location = location;
    }
    if status.is_some() {
        draft.status = status;
    }

    let city = catalog.update_city(Some(draft)).await?;

    println!("✓ Updated city {}", city.id);
    print_city(&city)
}

pub async fn upload(catalog: &Catalog, id: i64, file: PathBuf) -> Result<()> {
    let bytes = tokio::fs::read(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    if !catalog.upload_image(Some(&bytes), id).await? {
        anyhow::bail!("Image was not stored for city {}", id);
    }

    let city = require_city(catalog, id).await?;
    println!("✓ Uploaded image for {}", city.title);
    println!("  Location: {}", city.image_location);

    Ok(())
}

async fn require_city(catalog: &Catalog, id: i64) -> Result<City> {
    catalog
        .find_by_id(id)
        .await?
        .with_context(|| format!("City {} not found", id))
}

fn print_city(city: &City) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(city)?);
    Ok(())
}
