//! Host-player boundary.
//!
//! The media player itself is an external collaborator: it pushes
//! `PlayerEvent`s into the engine channel and consumes `EngineEvent`
//! notifications. Loosely-shaped host data (queue entries) is coerced
//! into strict types here, before it reaches the core.

use serde::{Deserialize, Serialize};

use crate::lyrics::LyricLine;

/// Immutable identity of a track. `uri` keys the cache and offset stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackIdentity {
    pub uri: String,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub duration_ms: u64,
}

impl TrackIdentity {
    /// Track length rounded to whole seconds, as the provider expects.
    pub fn duration_secs(&self) -> u64 {
        (self.duration_ms + 500) / 1000
    }
}

/// A queue entry as the host reports it: any field may be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueEntry {
    pub uri: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_ms: Option<u64>,
}

impl QueueEntry {
    /// Coerce into a strict identity. Returns None when a required field
    /// (uri, title, artist) is absent or blank; optional fields default.
    pub fn into_identity(self) -> Option<TrackIdentity> {
        let uri = self.uri.filter(|s| !s.trim().is_empty())?;
        let title = self.title.filter(|s| !s.trim().is_empty())?;
        let artist = self.artist.filter(|s| !s.trim().is_empty())?;
        Some(TrackIdentity {
            uri,
            title,
            artist,
            album: self.album.unwrap_or_default(),
            duration_ms: self.duration_ms.unwrap_or(0),
        })
    }
}

/// Events the host pushes into the engine: transport notifications plus
/// the user actions the lyrics surface forwards (scroll, resync, offset).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlayerEvent {
    TrackChanged { track: TrackIdentity },
    Progress { position_ms: u64 },
    PlayPause { playing: bool },
    QueueChanged { entries: Vec<QueueEntry> },
    ManualScroll { delta: i32 },
    Resync,
    NudgeOffset { delta_ms: i64 },
}

/// Resolution status for the presentation layer to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveStatus {
    Searching,
    Found,
    PlainOnly,
    NotFound,
    Unreachable,
}

/// State-transition notifications the engine emits. The presentation
/// layer subscribes to these; the core never draws.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A lyric sequence became current for `uri`. `synced` is false for
    /// plain-text fallbacks, which are display-only.
    LyricsLoaded {
        uri: String,
        lines: Vec<LyricLine>,
        synced: bool,
        versions: usize,
        from_cache: bool,
    },
    Status {
        uri: String,
        status: ResolveStatus,
    },
    /// Active line moved: mark `previous` past, `current` active.
    ActiveLine {
        previous: Option<usize>,
        current: Option<usize>,
    },
    /// First line became active; reveal the line display.
    Revealed,
    /// Center this line vertically.
    ScrollTo { index: usize },
    /// Synced-vs-manual scroll mode changed.
    Mode { manual: bool },
    OffsetChanged { uri: String, offset_ms: i64 },
    /// Notification surface (recoverable conditions, e.g. a reset store).
    Notice { message: String },
}
