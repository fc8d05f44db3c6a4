//! Lyrics provider client (LRCLIB-compatible API).
//!
//! One `GET /get` query per search permutation, carrying title, artist,
//! album, and the duration rounded to seconds. Individual misses are
//! expected and swallowed; the outcome is classified only after the
//! permutation ladder is exhausted.

use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::session::FetchSession;
use crate::host::TrackIdentity;
use crate::lyrics::{self, LyricLine};
use crate::metadata::SearchPermutation;

const USER_AGENT: &str = concat!("verso/", env!("CARGO_PKG_VERSION"));

/// Terminal classification of one resolution attempt.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// At least one permutation returned parseable timed lyrics. The
    /// first parsed payload wins; `versions` counts distinct synced
    /// payloads seen across the whole ladder.
    Synced {
        lines: Vec<LyricLine>,
        raw: String,
        versions: usize,
    },
    /// Untimed text only — display fallback, never fed into sync timing.
    Plain { text: String },
    /// The provider answered but had nothing usable.
    NotFound,
    /// No query reached the provider at all.
    Unreachable,
    /// The session was superseded mid-flight. Not a failure.
    Cancelled,
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    #[serde(rename = "syncedLyrics")]
    synced_lyrics: Option<String>,
    #[serde(rename = "plainLyrics")]
    plain_lyrics: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProviderClient {
    client: reqwest::Client,
    endpoint: String,
}

impl ProviderClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .timeout(timeout)
                .build()
                .expect("failed to create reqwest client"),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    /// Walk the permutation ladder in order and classify the result.
    /// Every permutation is queried even after a hit so the distinct
    /// version count stays meaningful for status display.
    pub async fn resolve(
        &self,
        track: &TrackIdentity,
        permutations: &[SearchPermutation],
        session: &FetchSession,
    ) -> Outcome {
        let mut collector = Collector::default();

        for perm in permutations {
            if session.is_stale() {
                return Outcome::Cancelled;
            }

            let url = build_url(&self.endpoint, perm, track.duration_secs());
            let response = match self.client.get(&url).send().await {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!("permutation miss ({} - {}): {e}", perm.artist, perm.title);
                    continue;
                }
            };
            collector.reached = true;

            if response.status() == reqwest::StatusCode::NOT_FOUND {
                continue;
            }
            if !response.status().is_success() {
                tracing::debug!("provider status {} for {url}", response.status());
                continue;
            }
            match response.json::<ProviderResponse>().await {
                Ok(body) => collector.absorb(body),
                Err(e) => tracing::debug!("malformed provider response: {e}"),
            }
        }

        if session.is_stale() {
            return Outcome::Cancelled;
        }
        collector.finish()
    }
}

fn build_url(endpoint: &str, perm: &SearchPermutation, duration_secs: u64) -> String {
    format!(
        "{}/get?track_name={}&artist_name={}&album_name={}&duration={}",
        endpoint,
        urlencoding::encode(&perm.title),
        urlencoding::encode(&perm.artist),
        urlencoding::encode(&perm.album),
        duration_secs,
    )
}

/// Accumulates per-permutation replies until classification.
#[derive(Debug, Default)]
struct Collector {
    reached: bool,
    first: Option<(Vec<LyricLine>, String)>,
    versions: usize,
    seen_synced: HashSet<String>,
    plain: Option<String>,
}

impl Collector {
    fn absorb(&mut self, body: ProviderResponse) {
        if let Some(raw) = body.synced_lyrics.filter(|s| !s.trim().is_empty()) {
            // Distinct by raw source text; re-served payloads don't count twice.
            if self.seen_synced.insert(raw.clone()) {
                if let Some(lines) = lyrics::parser::parse(&raw) {
                    self.versions += 1;
                    if self.first.is_none() {
                        self.first = Some((lines, raw));
                    }
                }
            }
        }
        if self.plain.is_none() {
            if let Some(text) = body.plain_lyrics.filter(|s| !s.trim().is_empty()) {
                self.plain = Some(text);
            }
        }
    }

    fn finish(self) -> Outcome {
        if let Some((lines, raw)) = self.first {
            return Outcome::Synced {
                lines,
                raw,
                versions: self.versions,
            };
        }
        if let Some(text) = self.plain {
            return Outcome::Plain { text };
        }
        if self.reached {
            Outcome::NotFound
        } else {
            Outcome::Unreachable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(synced: Option<&str>, plain: Option<&str>) -> ProviderResponse {
        ProviderResponse {
            synced_lyrics: synced.map(String::from),
            plain_lyrics: plain.map(String::from),
        }
    }

    #[test]
    fn test_build_url_encodes_fields() {
        let perm = SearchPermutation {
            title: "Foo & Bar".into(),
            artist: "A B".into(),
            album: String::new(),
        };
        let url = build_url("https://lrclib.net/api", &perm, 200);
        assert_eq!(
            url,
            "https://lrclib.net/api/get?track_name=Foo%20%26%20Bar&artist_name=A%20B&album_name=&duration=200"
        );
    }

    #[test]
    fn test_collector_keeps_first_counts_distinct() {
        let mut c = Collector::default();
        c.reached = true;
        c.absorb(body(Some("[00:01.00]one"), None));
        c.absorb(body(Some("[00:01.00]one"), None)); // same payload again
        c.absorb(body(Some("[00:02.00]two"), None));

        match c.finish() {
            Outcome::Synced {
                lines, versions, ..
            } => {
                assert_eq!(versions, 2);
                assert_eq!(lines[0].text, "one");
            }
            other => panic!("expected synced, got {other:?}"),
        }
    }

    #[test]
    fn test_collector_plain_fallback() {
        let mut c = Collector::default();
        c.reached = true;
        c.absorb(body(None, Some("just words")));
        c.absorb(body(Some("not a timestamp"), None)); // unparseable synced payload
        assert!(matches!(c.finish(), Outcome::Plain { text } if text == "just words"));
    }

    #[test]
    fn test_collector_not_found_vs_unreachable() {
        let mut reached = Collector::default();
        reached.reached = true;
        assert!(matches!(reached.finish(), Outcome::NotFound));

        let unreachable = Collector::default();
        assert!(matches!(unreachable.finish(), Outcome::Unreachable));
    }
}
