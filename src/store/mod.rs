//! Persistent key-value stores: the lyrics cache and the per-track
//! offset map. Each lives in its own JSON blob under the data dir, so a
//! corrupt file resets only that store. Corruption is recoverable: the
//! load reports it and starts empty instead of failing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::host::TrackIdentity;
use crate::lyrics::LyricLine;

/// One cached resolution. `synced` is false for plain-text fallbacks,
/// which are display-only and never drive the sync machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub track: TrackIdentity,
    pub lines: Vec<LyricLine>,
    pub synced: bool,
    pub fetched_at: i64,
}

/// Resolved lyrics keyed by track uri. Last write wins.
#[derive(Debug)]
pub struct LyricsCache {
    path: PathBuf,
    entries: HashMap<String, CacheEntry>,
}

impl LyricsCache {
    /// Load from disk. The boolean is true when existing data failed to
    /// parse and the store was reset — the caller should surface that.
    pub fn load(path: PathBuf) -> anyhow::Result<(Self, bool)> {
        let (entries, corrupt) = load_map(&path)?;
        let cache = Self { path, entries };
        if corrupt {
            cache.persist()?;
        }
        Ok((cache, corrupt))
    }

    pub fn get(&self, uri: &str) -> Option<&CacheEntry> {
        self.entries.get(uri)
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.entries.contains_key(uri)
    }

    /// Insert or overwrite the entry for this track, stamped with the
    /// current time, and persist immediately.
    pub fn put(
        &mut self,
        track: &TrackIdentity,
        lines: Vec<LyricLine>,
        synced: bool,
    ) -> anyhow::Result<()> {
        let entry = CacheEntry {
            track: track.clone(),
            lines,
            synced,
            fetched_at: time::OffsetDateTime::now_utc().unix_timestamp(),
        };
        self.entries.insert(track.uri.clone(), entry);
        self.persist()
    }

    pub fn remove(&mut self, uri: &str) -> anyhow::Result<bool> {
        let removed = self.entries.remove(uri).is_some();
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    pub fn clear(&mut self) -> anyhow::Result<()> {
        self.entries.clear();
        self.persist()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> anyhow::Result<()> {
        persist_json(&self.path, &self.entries)
    }
}

/// Per-track playback-time correction in milliseconds. A missing key
/// means 0; an explicit 0 is never stored, so "has custom offset" is a
/// key-presence check.
#[derive(Debug)]
pub struct OffsetStore {
    path: PathBuf,
    offsets: HashMap<String, i64>,
}

impl OffsetStore {
    pub fn load(path: PathBuf) -> anyhow::Result<(Self, bool)> {
        let (offsets, corrupt) = load_map(&path)?;
        let store = Self { path, offsets };
        if corrupt {
            store.persist()?;
        }
        Ok((store, corrupt))
    }

    pub fn get(&self, uri: &str) -> i64 {
        self.offsets.get(uri).copied().unwrap_or(0)
    }

    pub fn has(&self, uri: &str) -> bool {
        self.offsets.contains_key(uri)
    }

    /// Store an offset; zero deletes the key. Persists immediately.
    pub fn set(&mut self, uri: &str, offset_ms: i64) -> anyhow::Result<()> {
        if offset_ms == 0 {
            self.offsets.remove(uri);
        } else {
            self.offsets.insert(uri.to_string(), offset_ms);
        }
        self.persist()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> anyhow::Result<()> {
        persist_json(&self.path, &self.offsets)
    }
}

/// Read a JSON map from `path`. Missing file → empty. Unparsable file →
/// empty plus a corruption flag; the store rewrites itself afterwards.
fn load_map<T: DeserializeOwned + Default>(path: &Path) -> anyhow::Result<(T, bool)> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((T::default(), false)),
        Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Ok((value, false)),
        Err(e) => {
            tracing::warn!("resetting corrupt store {}: {e}", path.display());
            Ok((T::default(), true))
        }
    }
}

fn persist_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create dir {}", parent.display()))?;
    }
    let raw = serde_json::to_string(value).context("serialize store")?;
    std::fs::write(path, raw).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("verso-{}-{}.json", name, std::process::id()));
        let _ = std::fs::remove_file(&path);
        path
    }

    fn track(uri: &str) -> TrackIdentity {
        TrackIdentity {
            uri: uri.into(),
            title: "T".into(),
            artist: "A".into(),
            album: String::new(),
            duration_ms: 1000,
        }
    }

    #[test]
    fn test_cache_roundtrip() {
        let path = tmp("cache-roundtrip");
        let (mut cache, corrupt) = LyricsCache::load(path.clone()).unwrap();
        assert!(!corrupt);

        cache
            .put(&track("a:1"), vec![LyricLine::new(0, "x")], true)
            .unwrap();
        assert!(cache.contains("a:1"));

        let (reloaded, corrupt) = LyricsCache::load(path.clone()).unwrap();
        assert!(!corrupt);
        let entry = reloaded.get("a:1").unwrap();
        assert!(entry.synced);
        assert_eq!(entry.lines[0].text, "x");
        assert!(entry.fetched_at > 0);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_cache_last_write_wins_and_clear() {
        let path = tmp("cache-overwrite");
        let (mut cache, _) = LyricsCache::load(path.clone()).unwrap();
        cache
            .put(&track("a:1"), vec![LyricLine::new(0, "old")], true)
            .unwrap();
        cache
            .put(&track("a:1"), vec![LyricLine::new(0, "new")], false)
            .unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a:1").unwrap().lines[0].text, "new");

        cache.clear().unwrap();
        assert!(cache.is_empty());

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_corrupt_cache_resets() {
        let path = tmp("cache-corrupt");
        std::fs::write(&path, "{not json").unwrap();

        let (cache, corrupt) = LyricsCache::load(path.clone()).unwrap();
        assert!(corrupt);
        assert!(cache.is_empty());

        // The reset was persisted: a reload is clean.
        let (_, corrupt) = LyricsCache::load(path.clone()).unwrap();
        assert!(!corrupt);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_offset_zero_deletes_key() {
        let path = tmp("offsets");
        let (mut store, _) = OffsetStore::load(path.clone()).unwrap();

        store.set("a:1", -250).unwrap();
        assert_eq!(store.get("a:1"), -250);
        assert!(store.has("a:1"));

        store.set("a:1", 0).unwrap();
        assert!(!store.has("a:1"));
        assert_eq!(store.get("a:1"), 0);

        let (reloaded, _) = OffsetStore::load(path.clone()).unwrap();
        assert!(!reloaded.has("a:1"));

        let _ = std::fs::remove_file(path);
    }
}
