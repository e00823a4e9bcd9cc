mod cli;
mod commands;

use anyhow::Result;
use cities_config::Config;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let catalog = match &cli.command {
        cli::Commands::Init { source } => {
            commands::open_catalog(&config, source.clone()).await?
        }
        _ => commands::open_catalog(&config, None).await?,
    };

    match cli.command {
        cli::Commands::Init { .. } => commands::city::init(&catalog).await,
        cli::Commands::Show { id } => commands::city::show(&catalog, id).await,
        cli::Commands::Image { id, out } => commands::city::image(&catalog, id, out).await,
        cli::Commands::Titles => commands::city::titles(&catalog).await,
        cli::Commands::Search { text } => commands::city::search(&catalog, text).await,
        cli::Commands::Update {
            id,
            title,
            location,
            status,
        } => commands::city::update(&catalog, id, title, location, status).await,
        cli::Commands::Upload { id, file } => commands::city::upload(&catalog, id, file).await,
        cli::Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            commands::serve::handle(catalog, host, port, config.server.max_upload_bytes).await
        }
    }
}
