mod api;

use anyhow::{anyhow, bail};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use pdf_page_search_core::config::{DEFAULT_HOST, DEFAULT_INDEX_NAME, DEFAULT_PORT};
use pdf_page_search_core::{
    DirectoryReport, DocumentStore, MemoryStore, OpenSearchStore, SearchManager, StoreConfig,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-page-search", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// OpenSearch host
    #[arg(long, env = "OPENSEARCH_HOST", default_value = DEFAULT_HOST)]
    opensearch_host: String,

    /// OpenSearch port
    #[arg(long, env = "OPENSEARCH_PORT", default_value_t = DEFAULT_PORT)]
    opensearch_port: u16,

    /// OpenSearch index name
    #[arg(long, env = "OPENSEARCH_INDEX", default_value = DEFAULT_INDEX_NAME)]
    opensearch_index: String,

    /// Talk to OpenSearch over https.
    #[arg(long, env = "OPENSEARCH_USE_SSL")]
    opensearch_tls: bool,

    /// Store backend. `memory` keeps documents only for the lifetime of the process.
    #[arg(long, value_enum, default_value_t = Backend::Opensearch)]
    backend: Backend,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Backend {
    Opensearch,
    Memory,
}

#[derive(Subcommand)]
enum Command {
    /// Index a PDF file, or every PDF below a directory.
    Index {
        /// PDF file or directory.
        path: PathBuf,
    },
    /// Full-text search over indexed pages.
    Search {
        /// Text to search for; every term must match.
        query: String,
        /// Maximum number of results.
        #[arg(long, default_value = "10")]
        size: usize,
    },
    /// Show page and file counts of the index.
    Stats,
    /// Serve the HTTP search API.
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,
        /// Port to listen on.
        #[arg(long, default_value = "8000")]
        port: u16,
        /// Directory to index before accepting requests.
        #[arg(long)]
        preload: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        backend = ?cli.backend,
        "pdf-page-search boot"
    );

    let config = StoreConfig::new(&cli.opensearch_host, cli.opensearch_port)
        .with_index_name(&cli.opensearch_index)
        .with_tls(cli.opensearch_tls);

    match cli.backend {
        Backend::Opensearch => {
            let store = OpenSearchStore::connect(&config).await.map_err(|error| {
                anyhow!(
                    "failed to connect to opensearch at {}:{}: {error}",
                    config.host,
                    config.port
                )
            })?;
            run(cli.command, SearchManager::new(store)).await
        }
        Backend::Memory => {
            warn!("memory backend selected; nothing is persisted");
            run(cli.command, SearchManager::new(MemoryStore::new(config.index_name))).await
        }
    }
}

async fn run<S>(command: Command, manager: SearchManager<S>) -> anyhow::Result<()>
where
    S: DocumentStore + Send + Sync + 'static,
{
    match command {
        Command::Index { path } => index(&manager, &path).await,
        Command::Search { query, size } => search(&manager, &query, size).await,
        Command::Stats => stats(&manager).await,
        Command::Serve {
            bind,
            port,
            preload,
        } => {
            if let Some(folder) = preload {
                let report = manager.index_directory(&folder).await;
                print_report(&report);
            }
            api::serve(Arc::new(manager), &bind, port).await
        }
    }
}

async fn index<S>(manager: &SearchManager<S>, path: &Path) -> anyhow::Result<()>
where
    S: DocumentStore + Send + Sync,
{
    if path.is_file() {
        let indexed = manager.index_file(path).await?;
        println!(
            "indexed {} page(s) from {}",
            indexed.pages,
            indexed.path.display()
        );
        return Ok(());
    }

    if path.is_dir() {
        let report = manager.index_directory(path).await;
        print_report(&report);
        if !report.failed.is_empty() {
            bail!(
                "{} of {} file(s) failed to index",
                report.failed.len(),
                report.total
            );
        }
        return Ok(());
    }

    bail!("path not found: {}", path.display())
}

async fn search<S>(manager: &SearchManager<S>, query: &str, size: usize) -> anyhow::Result<()>
where
    S: DocumentStore + Send + Sync,
{
    let results = manager.try_search(query, size).await?;

    if results.is_empty() {
        println!("no results for '{query}'");
        return Ok(());
    }

    println!("results for '{query}' ({})", results.len());
    println!("{}", "=".repeat(60));

    for (position, result) in results.iter().enumerate() {
        println!(
            "[{}] {} (page {})",
            position + 1,
            result.filename,
            result.page_number
        );
        println!("score: {:.2}", result.score);

        match &result.highlights {
            Some(fragments) if !fragments.is_empty() => {
                println!("matches:");
                for fragment in fragments {
                    println!("  - {fragment}");
                }
            }
            _ => println!("preview:\n{}", result.content_preview),
        }
        println!("{}", "-".repeat(40));
    }

    Ok(())
}

async fn stats<S>(manager: &SearchManager<S>) -> anyhow::Result<()>
where
    S: DocumentStore + Send + Sync,
{
    let stats = manager.try_stats().await?;

    println!("index: {}", stats.index_name);
    println!("files: {}", stats.unique_files);
    println!("pages: {}", stats.total_pages);
    Ok(())
}

fn print_report(report: &DirectoryReport) {
    for failed in &report.failed {
        warn!(path = %failed.path.display(), reason = %failed.reason, "skipped pdf");
    }

    println!("succeeded: {} file(s)", report.succeeded.len());
    println!("failed:    {} file(s)", report.failed.len());
    println!("total:     {} file(s)", report.total);
}
