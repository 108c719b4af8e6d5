//! chartfeed CLI: fetch a ranked media RSS feed and import it

use anyhow::Result;
use chartfeed::config::Config;
use chartfeed::feed::{FileFeed, HttpFeed};
use chartfeed::import::{ImportCoordinator, ImportEvent, ImportStats};
use chartfeed::store::MemoryStore;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "chartfeed")]
#[command(about = "Streaming importer for ranked media RSS feeds")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "chartfeed.toml")]
    config: PathBuf,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the chart feed and import it
    Import {
        /// Import a local feed document instead of the configured URL
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Number of chart entries to request from the feed
        #[arg(short, long)]
        limit: Option<usize>,

        /// Completed records per intermediate commit
        #[arg(long)]
        batch_size: Option<usize>,

        /// Disable the category cache (for A/B comparison)
        #[arg(long)]
        no_cache: bool,

        /// Number of top entries to print after the import
        #[arg(short, long, default_value = "10")]
        top: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };

    match cli.command {
        Commands::Import {
            file,
            limit,
            batch_size,
            no_cache,
            top,
        } => {
            if let Some(limit) = limit {
                config.feed.limit = limit;
            }
            if let Some(batch_size) = batch_size {
                config.import.batch_size = batch_size;
            }
            if no_cache {
                config.import.cache_enabled = false;
            }
            config.validate()?;
            run_import(config, file, top)
        }
    }
}

fn run_import(config: Config, file: Option<PathBuf>, top: usize) -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let coordinator = ImportCoordinator::new(store.clone())
        .with_batch_size(config.import.batch_size)
        .with_cache_capacity(config.import.cache_capacity)
        .with_cache_enabled(config.import.cache_enabled);

    let handle = match file {
        Some(path) => {
            info!(path = %path.display(), "importing from file");
            coordinator.start(FileFeed::new(path))
        }
        None => {
            let url = config.feed.url()?;
            info!(url = %url, "importing from feed");
            coordinator.start(HttpFeed::new(url))
        }
    };

    // Drain the session's events on this thread; each Saved marks a durable
    // batch an observer could refresh from.
    let outcome: Result<ImportStats, _> = loop {
        match handle.events().recv() {
            Ok(ImportEvent::Saved { songs_in_batch }) => {
                info!(songs = songs_in_batch, "batch saved");
            }
            Ok(ImportEvent::Finished(stats)) => break Ok(stats),
            Ok(ImportEvent::Failed(e)) => break Err(anyhow::Error::from(e)),
            Err(_) => break Err(anyhow::anyhow!("import worker exited unexpectedly")),
        }
    };
    let stats = outcome?;

    println!("\nImport summary");
    println!("==============");
    println!("Songs imported: {}", stats.songs_imported);
    println!("Commits:        {}", stats.commits);
    println!("Cache hits:     {}", stats.cache_hits);
    println!("Cache misses:   {}", stats.cache_misses);
    println!("Lookup time:    {:.4}s", stats.lookup_seconds);
    println!("Elapsed:        {:.2}s", stats.elapsed_seconds);
    println!("Rate:           {:.1} songs/s", stats.songs_per_second);

    let songs = store.committed_songs();
    if top > 0 && !songs.is_empty() {
        println!("\nTop {} of {}:", top.min(songs.len()), songs.len());
        for song in songs.iter().take(top) {
            let category = song
                .category
                .and_then(|handle| store.resolve_category(handle).ok())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:>4}. {} - {} [{}]",
                song.rank,
                song.title.as_deref().unwrap_or("(untitled)"),
                song.artist.as_deref().unwrap_or("(unknown)"),
                category,
            );
        }
    }

    Ok(())
}
