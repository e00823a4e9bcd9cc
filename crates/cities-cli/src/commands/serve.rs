use anyhow::Result;
use cities_engine::Catalog;
use cities_server::CitiesServer;
use std::sync::Arc;

pub async fn handle(
    catalog: Catalog,
    host: String,
    port: u16,
    max_upload_bytes: usize,
) -> Result<()> {
    println!("Starting cities server on {}:{}", host, port);
    CitiesServer::serve(Arc::new(catalog), &host, port, max_upload_bytes).await?;

    Ok(())
}
