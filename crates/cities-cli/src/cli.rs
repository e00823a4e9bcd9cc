use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cities")]
#[command(about = "City catalog with lazily cached images", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (default: platform config directory)
    #[arg(long, global = true, env = "CITIES_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load cities from the CSV source into the catalog
    Init {
        /// CSV file to load instead of the configured source
        #[arg(long)]
        source: Option<PathBuf>,
    },

    /// Show a city record
    Show {
        /// City ID
        id: i64,
    },

    /// Fetch a city's image, caching it locally on first access
    Image {
        /// City ID
        id: i64,

        /// Write the image bytes to this file
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// List all city titles
    Titles,

    /// Find the single city whose title contains the text
    Search {
        /// Case-insensitive title fragment
        text: String,
    },

    /// Overwrite fields of a city record
    Update {
        /// City ID
        id: i64,

        #[arg(long)]
        title: Option<String>,

        /// Image URL or local path
        #[arg(long)]
        location: Option<String>,

        /// FROM_SOURCE or MATERIALIZED
        #[arg(long)]
        status: Option<String>,
    },

    /// Replace a city's image with a local file
    Upload {
        /// City ID
        id: i64,

        /// Image file
        file: PathBuf,
    },

    /// Start the HTTP server
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },
}
