//! Resolution orchestrator.
//!
//! Consumes host player events, runs the cache → provider resolution
//! pipeline for the current track, drives the sync machine, and emits
//! state-transition notifications. Resolutions run on a spawned task;
//! completions come back through the engine loop and are applied only
//! if their session is still the latest (stale results drop silently).

pub mod session;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::config::Config;
use crate::host::{EngineEvent, PlayerEvent, QueueEntry, ResolveStatus, TrackIdentity};
use crate::lyrics::LyricLine;
use crate::metadata;
use crate::prefetch::{self, PrefetchScheduler};
use crate::provider::{Outcome, ProviderClient};
use crate::store::{LyricsCache, OffsetStore};
use crate::sync::{Mode, SyncEngine, SyncEvent};
use session::SessionCounter;

/// A finished resolution attempt, delivered back into the engine loop.
#[derive(Debug)]
struct Resolution {
    generation: u64,
    uri: String,
    outcome: Outcome,
}

pub struct Engine {
    cfg: Config,
    provider: ProviderClient,
    cache: Arc<Mutex<LyricsCache>>,
    offsets: OffsetStore,
    sessions: SessionCounter,
    sync: SyncEngine,
    prefetch: PrefetchScheduler,
    current: Option<TrackIdentity>,
    queue: Vec<QueueEntry>,
    #[allow(dead_code)]
    playing: bool,
    events_out: mpsc::Sender<EngineEvent>,
    pending_notices: Vec<String>,
}

impl Engine {
    pub fn new(cfg: Config, events_out: mpsc::Sender<EngineEvent>) -> anyhow::Result<Self> {
        let provider = ProviderClient::new(
            &cfg.provider.endpoint,
            Duration::from_secs(cfg.provider.timeout_secs),
        );

        let (cache, cache_corrupt) = LyricsCache::load(cfg.cache_path())?;
        let (offsets, offsets_corrupt) = OffsetStore::load(cfg.offsets_path())?;
        let mut pending_notices = Vec::new();
        if cache_corrupt {
            pending_notices.push("lyrics cache was corrupt and has been reset".to_string());
        }
        if offsets_corrupt {
            pending_notices.push("offset store was corrupt and has been reset".to_string());
        }

        let prefetch = PrefetchScheduler::new(
            provider.clone(),
            Duration::from_millis(cfg.prefetch.delay_ms),
            cfg.prefetch.lookahead,
        );
        let sync = SyncEngine::new(Duration::from_millis(cfg.sync.resync_after_ms));

        Ok(Self {
            cfg,
            provider,
            cache: Arc::new(Mutex::new(cache)),
            offsets,
            sessions: SessionCounter::new(),
            sync,
            prefetch,
            current: None,
            queue: Vec::new(),
            playing: false,
            events_out,
            pending_notices,
        })
    }

    /// Event loop: host events in, engine events out, plus the resync
    /// deadline and resolution completions.
    pub async fn run(&mut self, mut player_rx: mpsc::Receiver<PlayerEvent>) -> anyhow::Result<()> {
        let (done_tx, mut done_rx) = mpsc::channel::<Resolution>(16);

        for message in std::mem::take(&mut self.pending_notices) {
            self.notify(message).await;
        }

        loop {
            let deadline = self.sync.deadline().map(tokio::time::Instant::from_std);
            tokio::select! {
                ev = player_rx.recv() => match ev {
                    Some(ev) => self.handle_player(ev, &done_tx).await,
                    None => break,
                },
                Some(res) = done_rx.recv() => self.apply_resolution(res).await,
                _ = async { tokio::time::sleep_until(deadline.unwrap()).await }, if deadline.is_some() => {
                    let events = self.sync.tick(Instant::now());
                    self.forward(events).await;
                }
            }
        }

        Ok(())
    }

    async fn handle_player(&mut self, ev: PlayerEvent, done_tx: &mpsc::Sender<Resolution>) {
        match ev {
            PlayerEvent::TrackChanged { track } => self.on_track_changed(track, done_tx).await,
            PlayerEvent::Progress { position_ms } => {
                let events = self.sync.on_progress(position_ms);
                self.forward(events).await;
            }
            PlayerEvent::PlayPause { playing } => self.playing = playing,
            PlayerEvent::QueueChanged { entries } => self.queue = entries,
            PlayerEvent::ManualScroll { delta } => {
                let events = self.sync.on_manual_scroll(delta, Instant::now());
                self.forward(events).await;
            }
            PlayerEvent::Resync => {
                let events = self.sync.resync();
                self.forward(events).await;
            }
            PlayerEvent::NudgeOffset { delta_ms } => self.nudge_offset(delta_ms).await,
        }
    }

    async fn on_track_changed(&mut self, track: TrackIdentity, done_tx: &mpsc::Sender<Resolution>) {
        tracing::info!("track changed: {} - {}", track.artist, track.title);

        // Superseding the session aborts any in-flight resolution.
        let session = self.sessions.begin(&track.uri);
        self.sync.unload();
        self.current = Some(track.clone());

        let cached = self.cache.lock().unwrap().get(&track.uri).cloned();
        if let Some(entry) = cached {
            self.apply_lines(&track, entry.lines, entry.synced, 0, true).await;
            self.trigger_prefetch();
            return;
        }

        self.emit(EngineEvent::Status {
            uri: track.uri.clone(),
            status: ResolveStatus::Searching,
        })
        .await;

        let provider = self.provider.clone();
        let permutations = metadata::search_permutations(&track);
        let done_tx = done_tx.clone();
        tokio::spawn(async move {
            let outcome = provider.resolve(&track, &permutations, &session).await;
            let _ = done_tx
                .send(Resolution {
                    generation: session.generation(),
                    uri: session.uri.clone(),
                    outcome,
                })
                .await;
        });

        self.trigger_prefetch();
    }

    async fn apply_resolution(&mut self, res: Resolution) {
        // Double guard: the session generation and the latest track
        // identity both have to match before the result is applied.
        if res.generation != self.sessions.current_generation() {
            tracing::debug!("dropping superseded resolution for {}", res.uri);
            return;
        }
        let Some(track) = self.current.clone() else {
            return;
        };
        if track.uri != res.uri {
            tracing::debug!("dropping stale resolution for {}", res.uri);
            return;
        }

        match res.outcome {
            Outcome::Synced {
                lines, versions, ..
            } => {
                tracing::info!(
                    "resolved synced lyrics for {} ({} lines, {} versions)",
                    track.uri,
                    lines.len(),
                    versions
                );
                let stored = self.cache.lock().unwrap().put(&track, lines.clone(), true);
                if let Err(e) = stored {
                    self.notify(format!("failed to cache lyrics: {e:#}")).await;
                }
                self.apply_lines(&track, lines, true, versions, false).await;
                self.trigger_prefetch();
            }
            Outcome::Plain { text } => {
                let lines = prefetch::synthesize_timing(&text);
                if !lines.is_empty() {
                    let stored = self.cache.lock().unwrap().put(&track, lines.clone(), false);
                    if let Err(e) = stored {
                        self.notify(format!("failed to cache lyrics: {e:#}")).await;
                    }
                }
                self.apply_lines(&track, lines, false, 0, false).await;
                self.trigger_prefetch();
            }
            Outcome::NotFound => {
                self.emit(EngineEvent::Status {
                    uri: track.uri,
                    status: ResolveStatus::NotFound,
                })
                .await;
            }
            Outcome::Unreachable => {
                self.emit(EngineEvent::Status {
                    uri: track.uri,
                    status: ResolveStatus::Unreachable,
                })
                .await;
            }
            Outcome::Cancelled => tracing::debug!("resolution cancelled for {}", res.uri),
        }
    }

    /// Make a sequence current: notify the presentation layer and, for
    /// synced lyrics, hand it to the sync machine. Plain-text fallbacks
    /// are display-only and never drive sync timing.
    async fn apply_lines(
        &mut self,
        track: &TrackIdentity,
        lines: Vec<LyricLine>,
        synced: bool,
        versions: usize,
        from_cache: bool,
    ) {
        let status = if synced {
            ResolveStatus::Found
        } else {
            ResolveStatus::PlainOnly
        };
        self.emit(EngineEvent::LyricsLoaded {
            uri: track.uri.clone(),
            lines: lines.clone(),
            synced,
            versions,
            from_cache,
        })
        .await;
        self.emit(EngineEvent::Status {
            uri: track.uri.clone(),
            status,
        })
        .await;

        if synced {
            let offset = self.offsets.get(&track.uri);
            self.sync.load(lines, offset);
        }
    }

    async fn nudge_offset(&mut self, delta_ms: i64) {
        let Some(track) = self.current.clone() else {
            return;
        };
        let next = self.offsets.get(&track.uri) + delta_ms;
        self.set_offset(&track.uri, next).await;
    }

    /// Persist an offset and immediately re-evaluate the active line —
    /// the displayed line can change with no playback movement.
    async fn set_offset(&mut self, uri: &str, offset_ms: i64) {
        if let Err(e) = self.offsets.set(uri, offset_ms) {
            self.notify(format!("failed to persist offset: {e:#}")).await;
        }
        self.emit(EngineEvent::OffsetChanged {
            uri: uri.to_string(),
            offset_ms,
        })
        .await;

        if self.current.as_ref().is_some_and(|t| t.uri == uri) {
            let events = self.sync.set_offset(offset_ms);
            self.forward(events).await;
        }
    }

    /// Kick a background queue walk. Fire-and-forget: prefetch is never
    /// abort-linked to the foreground path.
    fn trigger_prefetch(&self) {
        if !self.cfg.prefetch.enabled || self.queue.is_empty() {
            return;
        }
        let scheduler = self.prefetch.clone();
        let entries = self.queue.clone();
        let cache = Arc::clone(&self.cache);
        tokio::spawn(scheduler.run(entries, cache));
    }

    async fn forward(&mut self, events: Vec<SyncEvent>) {
        for ev in events {
            let mapped = match ev {
                SyncEvent::Revealed => EngineEvent::Revealed,
                SyncEvent::LineChanged { previous, current } => {
                    EngineEvent::ActiveLine { previous, current }
                }
                SyncEvent::ScrollTo { index } => EngineEvent::ScrollTo { index },
                SyncEvent::ModeChanged(mode) => EngineEvent::Mode {
                    manual: mode == Mode::Manual,
                },
            };
            self.emit(mapped).await;
        }
    }

    async fn emit(&self, event: EngineEvent) {
        // A dropped receiver just means nobody is listening anymore.
        let _ = self.events_out.send(event).await;
    }

    async fn notify(&self, message: String) {
        tracing::warn!("{message}");
        self.emit(EngineEvent::Notice { message }).await;
    }
}
