use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ladle_core::{ImportContext, Importer, MemoryStore};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ladle")]
#[command(about = "Ladle recipe importer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a recipe from a URL and print the structured payload
    Import {
        /// Recipe, video or pin URL
        url: String,
        /// Skip the cache layer and always fetch
        #[arg(long)]
        fresh: bool,
    },
    /// Structure one or more scanned recipe photos
    Scan {
        /// Image files, page order
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = ImportContext::from_env().context("building import context")?;
    let importer = Importer::new(ctx, Arc::new(MemoryStore::new()));

    match cli.command {
        Commands::Import { url, fresh } => {
            if fresh {
                let fetched = importer.import_url(&url).await?;
                println!("{}", serde_json::to_string_pretty(&fetched.recipe)?);
            } else {
                let outcome = importer.import_cached(&url).await?;
                tracing::info!(
                    from_cache = outcome.from_cache,
                    language = %outcome.language,
                    score = outcome.entry.quality_score,
                    "import finished"
                );
                println!("{}", serde_json::to_string_pretty(&outcome.payload)?);
            }
        }
        Commands::Scan { images } => {
            let mut data = Vec::with_capacity(images.len());
            for path in &images {
                data.push(
                    std::fs::read(path)
                        .with_context(|| format!("reading {}", path.display()))?,
                );
            }
            let fetched = importer.import_scan(&data).await?;
            println!("{}", serde_json::to_string_pretty(&fetched.recipe)?);
        }
    }

    Ok(())
}
