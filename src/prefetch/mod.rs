//! Look-ahead prefetch for the upcoming play queue.
//!
//! Best-effort and silent: entries are walked sequentially with a fixed
//! inter-item delay so the provider is never burst at, and every
//! per-item failure is swallowed. Prefetch is not abort-linked to the
//! foreground resolution path.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::engine::session::FetchSession;
use crate::host::QueueEntry;
use crate::lyrics::LyricLine;
use crate::metadata::SearchPermutation;
use crate::provider::{Outcome, ProviderClient};
use crate::store::LyricsCache;

/// Spacing for synthetic timestamps on plain-text fallbacks.
const SYNTHETIC_SPACING_MS: u64 = 2000;

#[derive(Debug, Clone)]
pub struct PrefetchScheduler {
    provider: ProviderClient,
    delay: Duration,
    lookahead: usize,
}

impl PrefetchScheduler {
    pub fn new(provider: ProviderClient, delay: Duration, lookahead: usize) -> Self {
        Self {
            provider,
            delay,
            lookahead,
        }
    }

    /// Walk a queue snapshot, populating the cache for entries it can
    /// resolve. Single-pass per entry: only the original metadata triple
    /// is queried, no permutation ladder.
    pub async fn run(self, entries: Vec<QueueEntry>, cache: Arc<Mutex<LyricsCache>>) {
        for entry in entries.into_iter().take(self.lookahead) {
            let Some(track) = entry.into_identity() else {
                continue;
            };
            if cache.lock().unwrap().contains(&track.uri) {
                continue;
            }

            tokio::time::sleep(self.delay).await;

            let perm = SearchPermutation {
                title: track.title.clone(),
                artist: track.artist.clone(),
                album: track.album.clone(),
            };
            let session = FetchSession::detached(&track.uri);
            let outcome = self.provider.resolve(&track, &[perm], &session).await;

            let (lines, synced) = match outcome {
                Outcome::Synced { lines, .. } => (lines, true),
                Outcome::Plain { text } => (synthesize_timing(&text), false),
                _ => continue,
            };
            if lines.is_empty() {
                continue;
            }

            tracing::debug!("prefetched lyrics for {} ({} lines)", track.uri, lines.len());
            if let Err(e) = cache.lock().unwrap().put(&track, lines, synced) {
                tracing::debug!("prefetch cache write failed for {}: {e:#}", track.uri);
            }
        }
    }
}

/// Give plain text a placeholder timeline: one line every two seconds.
pub fn synthesize_timing(text: &str) -> Vec<LyricLine> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .enumerate()
        .map(|(i, l)| LyricLine::new(i as u64 * SYNTHETIC_SPACING_MS, l))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesize_timing_spacing() {
        let lines = synthesize_timing("one\ntwo\n\nthree\n");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], LyricLine::new(0, "one"));
        assert_eq!(lines[1], LyricLine::new(2000, "two"));
        assert_eq!(lines[2], LyricLine::new(4000, "three"));
    }

    #[test]
    fn test_synthesize_timing_empty() {
        assert!(synthesize_timing("\n  \n").is_empty());
    }
}
