//! Track-metadata normalization and search-permutation generation.
//!
//! Provider catalogs rarely carry the decorations streaming metadata
//! does ("(Remastered 2011)", "feat. X", multi-artist strings), so a
//! search runs over a ladder of progressively cleaned variants, original
//! metadata first.

use crate::host::TrackIdentity;

/// Qualifier markers that flag a trailing "- ..." clause as decoration.
const QUALIFIERS: [&str; 6] = ["remaster", "live", "edit", "version", "mix", "deluxe"];

/// Characters separating artist credits in a joined artist string.
const ARTIST_SEPARATORS: [char; 4] = [',', '/', '&', ';'];

/// One candidate search triple. Ordering inside the permutation set is
/// meaningful: earlier triples are closer to the original metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchPermutation {
    pub title: String,
    pub artist: String,
    pub album: String,
}

/// Strip decorations from a title/artist/album string: a trailing
/// dash-qualifier clause, parenthesized and bracketed segments, a
/// feat./ft. clause, and everything past the first artist separator.
/// Pure and idempotent; cleaning cleaned text is a no-op.
pub fn clean_text(text: &str) -> String {
    let mut s = strip_dash_qualifier(text);
    s = strip_enclosed(&s, '(', ')');
    s = strip_enclosed(&s, '[', ']');
    s = strip_feat(&s);

    if let Some(idx) = s.find(ARTIST_SEPARATORS) {
        s.truncate(idx);
    }

    // Collapse whitespace runs left behind by removed segments.
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut a trailing " - 2011 Remaster"-style clause. Only clauses that
/// contain a known qualifier marker are removed; "Song - Part II" stays.
fn strip_dash_qualifier(text: &str) -> String {
    for (idx, _) in text.match_indices(" - ") {
        let tail = text[idx + 3..].to_lowercase();
        if QUALIFIERS.iter().any(|q| tail.contains(q)) {
            return text[..idx].to_string();
        }
    }
    text.to_string()
}

/// Remove every `open`..`close` segment, including the delimiters.
fn strip_enclosed(text: &str, open: char, close: char) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    for c in text.chars() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth = depth.saturating_sub(1);
        } else if depth == 0 {
            out.push(c);
        }
    }
    out
}

/// Cut a "feat." / "ft." clause and everything after it. The marker must
/// start a word so "Shaft." and similar are left alone.
fn strip_feat(text: &str) -> String {
    // ASCII lowering keeps byte offsets aligned with `text`.
    let lower = text.to_ascii_lowercase();
    let mut cut: Option<usize> = None;
    for marker in ["feat.", "ft."] {
        for (idx, _) in lower.match_indices(marker) {
            let at_word_start =
                idx == 0 || lower[..idx].ends_with(|c: char| c.is_whitespace());
            if at_word_start {
                cut = Some(cut.map_or(idx, |c| c.min(idx)));
            }
        }
    }
    match cut {
        Some(idx) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Split a joined artist credit into individual names.
pub fn split_artists(artist: &str) -> Vec<String> {
    artist
        .split(ARTIST_SEPARATORS)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Expand a track identity into the ordered, deduplicated set of search
/// triples. The unmodified original triple is always first; variants are
/// the cartesian product of title, artist, and album variations.
pub fn search_permutations(track: &TrackIdentity) -> Vec<SearchPermutation> {
    let titles = dedup_keep_order(vec![track.title.clone(), clean_text(&track.title)]);

    let mut artist_variants = vec![track.artist.clone(), clean_text(&track.artist)];
    artist_variants.extend(split_artists(&track.artist));
    let artists = dedup_keep_order(artist_variants);

    let albums = dedup_keep_order(vec![
        track.album.clone(),
        clean_text(&track.album),
        String::new(),
    ]);

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for title in &titles {
        for artist in &artists {
            for album in &albums {
                let perm = SearchPermutation {
                    title: title.clone(),
                    artist: artist.clone(),
                    album: album.clone(),
                };
                if seen.insert(perm.clone()) {
                    out.push(perm);
                }
            }
        }
    }
    out
}

fn dedup_keep_order(values: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_remaster_clause() {
        assert_eq!(clean_text("Song Title - 2023 Remaster"), "Song Title");
        assert_eq!(clean_text("Song Title - Live at Wembley"), "Song Title");
        assert_eq!(clean_text("Song Title - Radio Edit"), "Song Title");
    }

    #[test]
    fn test_clean_text_keeps_meaningful_dash() {
        assert_eq!(clean_text("Song - Part II"), "Song - Part II");
    }

    #[test]
    fn test_clean_text_parens_and_brackets() {
        assert_eq!(clean_text("Song (feat. Artist B)"), "Song");
        assert_eq!(clean_text("Song [Bonus Track] Here"), "Song Here");
    }

    #[test]
    fn test_clean_text_feat_clause() {
        assert_eq!(clean_text("Song feat. Somebody"), "Song");
        assert_eq!(clean_text("A ft. B"), "A");
        assert_eq!(clean_text("Shaft. Theme"), "Shaft. Theme");
    }

    #[test]
    fn test_clean_text_first_artist_token() {
        assert_eq!(clean_text("Artist A, Artist B"), "Artist A");
        assert_eq!(clean_text("Artist A & Artist B"), "Artist A");
        assert_eq!(clean_text("Artist A/Artist B"), "Artist A");
    }

    #[test]
    fn test_clean_text_idempotent() {
        for input in [
            "Song Title - 2023 Remaster",
            "Song (feat. Artist B)",
            "Artist A, Artist B",
            "Plain Title",
            "Nested (one (two)) tail",
        ] {
            let once = clean_text(input);
            assert_eq!(clean_text(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_split_artists() {
        assert_eq!(split_artists("A, B & C"), vec!["A", "B", "C"]);
        assert_eq!(split_artists("Solo"), vec!["Solo"]);
    }

    fn track(title: &str, artist: &str, album: &str) -> TrackIdentity {
        TrackIdentity {
            uri: "test:uri".into(),
            title: title.into(),
            artist: artist.into(),
            album: album.into(),
            duration_ms: 200_000,
        }
    }

    #[test]
    fn test_permutations_original_first() {
        let perms = search_permutations(&track("Foo (Live)", "A feat. B", "Album"));
        assert_eq!(
            perms[0],
            SearchPermutation {
                title: "Foo (Live)".into(),
                artist: "A feat. B".into(),
                album: "Album".into(),
            }
        );
        // Cleaned variants appear later in the set.
        assert!(perms.iter().any(|p| p.title == "Foo" && p.artist == "A"));
    }

    #[test]
    fn test_permutations_deduplicated() {
        let perms = search_permutations(&track("Clean", "One", ""));
        let mut seen = std::collections::HashSet::new();
        for p in &perms {
            assert!(seen.insert(p.clone()), "duplicate permutation {p:?}");
        }
        // Already-clean metadata with an empty album collapses to one triple.
        assert_eq!(perms.len(), 1);
    }

    #[test]
    fn test_permutations_include_split_artists_and_empty_album() {
        let perms = search_permutations(&track("T", "A, B", "Al"));
        assert!(perms.iter().any(|p| p.artist == "B"));
        assert!(perms.iter().any(|p| p.album.is_empty()));
    }
}
