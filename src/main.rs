use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;

use blob_thumbnailer::{api, azure::AzureStoreFactory, EnvSettings, ThumbnailHandler};

#[derive(Parser)]
#[command(name = "blob-thumbnailer", version, about = "Writes thumbnails for newly created image blobs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Receive Event Grid deliveries over HTTP
    Serve {
        #[arg(long, default_value = "0.0.0.0:7071")]
        bind: String,
    },
    /// Run a single invocation from an event JSON document
    Handle {
        /// Event file; stdin when omitted
        #[arg(long)]
        event: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "blob_thumbnailer=debug,tower_http=debug".to_string()
        } else {
            "blob_thumbnailer=info,tower_http=info".to_string()
        }
    });
    tracing_subscriber::fmt().with_env_filter(&env_filter).init();

    let handler = Arc::new(ThumbnailHandler::new(
        Arc::new(EnvSettings),
        Arc::new(AzureStoreFactory::new().context("failed to build storage http client")?),
    ));

    match cli.command {
        Commands::Serve { bind } => api::serve(&bind, handler).await,
        Commands::Handle { event } => {
            let raw = match event {
                Some(path) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("failed to read event file {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    tokio::io::stdin().read_to_string(&mut buf).await.context("failed to read event from stdin")?;
                    buf
                }
            };
            let outcome = handler.handle_json(&raw).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
    }
}
