mod config;
mod engine;
mod host;
mod lyrics;
mod metadata;
mod prefetch;
mod provider;
mod store;
mod sync;

use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;

use engine::session::FetchSession;
use host::{PlayerEvent, TrackIdentity};
use provider::{Outcome, ProviderClient};
use store::{LyricsCache, OffsetStore};

#[derive(Debug, Parser)]
#[command(name = "verso", version, about = "Synced-lyrics resolution and playback sync engine")]
struct Cli {
    /// Override config file path.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the engine against newline-delimited JSON player events on
    /// stdin, emitting engine events on stdout (default).
    Watch,
    /// Resolve lyrics for a track and print them (headless).
    Fetch {
        #[arg(long)]
        title: String,
        #[arg(long)]
        artist: String,
        #[arg(long, default_value = "")]
        album: String,
        #[arg(long, default_value_t = 0)]
        duration_secs: u64,
        /// Cache the result under this track uri.
        #[arg(long)]
        uri: Option<String>,
    },
    /// Export cached lyrics as LRC with the stored offset applied.
    Export {
        uri: String,
        /// Write to a file instead of stdout.
        #[arg(long)]
        out: Option<std::path::PathBuf>,
    },
    /// Per-track timing offset management.
    Offset {
        #[command(subcommand)]
        cmd: OffsetCommand,
    },
    /// Local lyrics cache management.
    Cache {
        #[command(subcommand)]
        cmd: CacheCommand,
    },
}

#[derive(Debug, Subcommand)]
enum OffsetCommand {
    /// Print the stored offset for a track (0 when unset).
    Get { uri: String },
    /// Store an offset in milliseconds (0 clears it).
    Set { uri: String, offset_ms: i64 },
    /// Remove the stored offset.
    Clear { uri: String },
}

#[derive(Debug, Subcommand)]
enum CacheCommand {
    /// Print entry count and on-disk size.
    Stats,
    /// Drop one cached track.
    Remove { uri: String },
    /// Drop every cached track.
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref()).context("load config")?;

    match cli.command.unwrap_or(Command::Watch) {
        Command::Watch => run_watch(cfg).await?,
        Command::Fetch {
            title,
            artist,
            album,
            duration_secs,
            uri,
        } => {
            let track = TrackIdentity {
                uri: uri.clone().unwrap_or_default(),
                title,
                artist,
                album,
                duration_ms: duration_secs * 1000,
            };
            run_fetch(&cfg, track, uri.is_some()).await?;
        }
        Command::Export { uri, out } => {
            let (cache, _) = LyricsCache::load(cfg.cache_path())?;
            let (offsets, _) = OffsetStore::load(cfg.offsets_path())?;
            let entry = cache
                .get(&uri)
                .with_context(|| format!("no cached lyrics for {uri}"))?;
            let lrc = lyrics::export_lrc(&entry.track, &entry.lines, offsets.get(&uri));
            match out {
                Some(path) => {
                    std::fs::write(&path, lrc)
                        .with_context(|| format!("write {}", path.display()))?;
                    println!("Exported {} lines to {}", entry.lines.len(), path.display());
                }
                None => print!("{lrc}"),
            }
        }
        Command::Offset { cmd } => {
            let (mut offsets, corrupt) = OffsetStore::load(cfg.offsets_path())?;
            if corrupt {
                eprintln!("offset store was corrupt and has been reset");
            }
            match cmd {
                OffsetCommand::Get { uri } => println!("{}", offsets.get(&uri)),
                OffsetCommand::Set { uri, offset_ms } => {
                    offsets.set(&uri, offset_ms)?;
                    println!("Offset for {uri} set to {offset_ms}ms");
                }
                OffsetCommand::Clear { uri } => {
                    offsets.set(&uri, 0)?;
                    println!("Offset for {uri} cleared");
                }
            }
        }
        Command::Cache { cmd } => {
            let (mut cache, corrupt) = LyricsCache::load(cfg.cache_path())?;
            if corrupt {
                eprintln!("lyrics cache was corrupt and has been reset");
            }
            match cmd {
                CacheCommand::Stats => {
                    let size = std::fs::metadata(cache.path()).map(|m| m.len()).unwrap_or(0);
                    println!("{} tracks cached, {} bytes at {}", cache.len(), size, cache.path().display());
                }
                CacheCommand::Remove { uri } => {
                    if cache.remove(&uri)? {
                        println!("Removed {uri}");
                    } else {
                        println!("Nothing cached for {uri}");
                    }
                }
                CacheCommand::Clear => {
                    cache.clear()?;
                    println!("Cache cleared");
                }
            }
        }
    }

    Ok(())
}

/// Wire the engine between stdin (player events) and stdout (engine
/// events), both as newline-delimited JSON.
async fn run_watch(cfg: config::Config) -> anyhow::Result<()> {
    let (player_tx, player_rx) = mpsc::channel::<PlayerEvent>(256);
    let (engine_tx, mut engine_rx) = mpsc::channel(256);
    let mut engine = engine::Engine::new(cfg, engine_tx)?;

    tokio::spawn(async move {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<PlayerEvent>(line) {
                Ok(ev) => {
                    if player_tx.send(ev).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!("ignoring malformed player event: {e}"),
            }
        }
        // Channel drop shuts the engine loop down.
    });

    tokio::spawn(async move {
        while let Some(ev) = engine_rx.recv().await {
            match serde_json::to_string(&ev) {
                Ok(json) => println!("{json}"),
                Err(e) => tracing::warn!("serialize engine event: {e}"),
            }
        }
    });

    engine.run(player_rx).await
}

/// Headless one-shot resolution with the full permutation ladder.
async fn run_fetch(cfg: &config::Config, track: TrackIdentity, cache_it: bool) -> anyhow::Result<()> {
    let client = ProviderClient::new(
        &cfg.provider.endpoint,
        Duration::from_secs(cfg.provider.timeout_secs),
    );
    let permutations = metadata::search_permutations(&track);
    eprintln!(
        "Searching {} permutation(s) for {} - {}",
        permutations.len(),
        track.artist,
        track.title
    );

    let session = FetchSession::detached(&track.uri);
    match client.resolve(&track, &permutations, &session).await {
        Outcome::Synced {
            lines, versions, ..
        } => {
            eprintln!("Found synced lyrics ({} distinct versions)", versions);
            for line in &lines {
                println!("{}{}", lyrics::format_timestamp(line.time_ms), line.text);
            }
            if cache_it {
                let (mut cache, _) = LyricsCache::load(cfg.cache_path())?;
                cache.put(&track, lines, true)?;
                eprintln!("Cached under {}", track.uri);
            }
        }
        Outcome::Plain { text } => {
            eprintln!("Only plain lyrics found");
            println!("{text}");
        }
        Outcome::NotFound => println!("No lyrics found"),
        Outcome::Unreachable => println!("Lyrics provider unreachable"),
        Outcome::Cancelled => {}
    }

    Ok(())
}
