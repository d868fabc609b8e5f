//! Artist/album acceptance rules and compound-title fallbacks.
//!
//! `Matcher::match_target` returns every candidate that passes an artist rule
//! and the album gate, in discovery order. When none pass, the fallbacks are
//! tried in order and the first unique hit is returned on its own.

use rustc_hash::FxHashSet;

use crate::config::MatchConfig;
use crate::index::CandidateIndex;
use crate::models::{ArtistRule, CandidateAlbum, Fallback, MatchPath, MatchResult, TargetEntry, YearBucket};
use crate::normalize::{has_collaboration_marker, normalize, normalize_artist, NormalizedText};
use crate::scoring::{
    ratio, token_set_ratio, token_sort_ratio, ALBUM_NO_SPACE_FLOOR, ARTIST_SET_GATE, ARTIST_SORT_GATE,
    FALLBACK_GATE, FALLBACK_SCORE, FALLBACK_YEAR_SCORE, SELF_TITLED_NO_SPACE, STRONG_ALBUM_SCORE,
};

/// Target-only artist tokens tolerated by the alias rule
/// ("Darryl Way's Wolf" → "Darryl Way").
pub const ALIAS_EXTRAS: &[&str] = &[
    "paraphernalia", "pepo", "mtoto", "wolf",
    "group", "band", "ensemble", "combination", "combo", "collective", "project",
    "orchestra", "quartet", "quintet", "sextet", "trio", "duo", "company",
    "and", "with", "feat", "featuring",
    "whole", "world",
];

/// Candidate-only album tokens tolerated for self-titled targets.
pub const GENERIC_ALBUM_EXTRAS: &[&str] = &[
    "deluxe", "remaster", "remastered", "edition", "expanded", "mono", "stereo",
    "complete", "collection", "anthology",
];

/// Normalized view of a target, computed once per `match_target` call.
#[derive(Debug, Clone)]
pub struct TargetKeys {
    pub artist: NormalizedText,
    pub album: NormalizedText,
    /// Raw artist names several acts ("A & B")
    pub multi_artist: bool,
    /// Album equals artist after normalization
    pub self_titled: bool,
}

impl TargetKeys {
    pub fn of(target: &TargetEntry) -> Self {
        let artist = normalize_artist(&target.artist);
        let album = normalize(&target.album);
        let self_titled = !album.is_empty() && album == artist;
        Self {
            multi_artist: has_collaboration_marker(&target.artist),
            artist,
            album,
            self_titled,
        }
    }
}

/// All component scores for one target/candidate pair, plus the verdict.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub artist_set: f64,
    pub artist_sort: f64,
    pub album_set: f64,
    pub album_ns: f64,
    pub album_score: f64,
    pub label_score: f64,
    pub rule: Option<ArtistRule>,
    pub album_ok: bool,
}

impl Evaluation {
    pub fn accepted(&self) -> bool {
        self.rule.is_some() && self.album_ok
    }
}

fn tokens(text: &NormalizedText) -> FxHashSet<&str> {
    text.tokens().iter().map(String::as_str).collect()
}

fn is_generic_album_token(tok: &str) -> bool {
    GENERIC_ALBUM_EXTRAS.contains(&tok) || tok.chars().all(|c| c.is_ascii_digit())
}

pub struct Matcher {
    config: MatchConfig,
}

impl Matcher {
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    fn strong_album_floor(&self) -> f64 {
        self.config.cutoff().max(STRONG_ALBUM_SCORE)
    }

    fn fallback_score(&self, base: f64) -> f64 {
        base.max(self.config.cutoff())
    }

    // ========================================================================
    // Per-candidate evaluation
    // ========================================================================

    /// Score one candidate and run the artist rules and album gate.
    pub fn evaluate(&self, target: &TargetKeys, c_artist: &NormalizedText, c_artist_raw: &str, c_album: &NormalizedText) -> Evaluation {
        let t_artist = target.artist.as_string();
        let t_album = target.album.as_string();
        let c_artist_s = c_artist.as_string();
        let c_album_s = c_album.as_string();

        let artist_set = token_set_ratio(&t_artist, &c_artist_s);
        let artist_sort = token_sort_ratio(&t_artist, &c_artist_s);
        let album_set = token_set_ratio(&t_album, &c_album_s);
        let album_ns = ratio(&target.album.no_space(), &c_album.no_space());
        let album_score = album_set.max(album_ns);
        let label_score = token_set_ratio(
            &format!("{} {}", t_artist, t_album),
            &format!("{} {}", c_artist_s, c_album_s),
        );

        let mut eval = Evaluation {
            artist_set,
            artist_sort,
            album_set,
            album_ns,
            album_score,
            label_score,
            rule: None,
            album_ok: false,
        };
        eval.rule = self.artist_rule(target, c_artist, c_artist_raw, c_album, &eval);
        eval.album_ok = self.album_ok(target, c_album, &eval);
        eval
    }

    /// First artist rule that accepts, in priority order.
    fn artist_rule(
        &self,
        target: &TargetKeys,
        c_artist: &NormalizedText,
        c_artist_raw: &str,
        c_album: &NormalizedText,
        s: &Evaluation,
    ) -> Option<ArtistRule> {
        let t_tokens = tokens(&target.artist);
        let c_tokens = tokens(c_artist);
        if c_tokens.is_empty() {
            return None;
        }

        // Single-word targets never match a wider artist ("alice" vs "alice cooper")
        // unless the candidate is strictly self-titled too.
        let single_token_superset =
            t_tokens.len() == 1 && c_tokens != t_tokens && t_tokens.is_subset(&c_tokens);
        if single_token_superset {
            let self_titled = target.self_titled && c_album == c_artist && s.album_ns >= SELF_TITLED_NO_SPACE;
            return self_titled.then_some(ArtistRule::SelfTitledSuperset);
        }

        let strong_album = s.album_score >= self.strong_album_floor();

        if s.artist_set >= ARTIST_SET_GATE && s.artist_sort >= ARTIST_SORT_GATE {
            return Some(ArtistRule::StrongGate);
        }

        let extras: Vec<&str> = t_tokens
            .difference(&c_tokens)
            .copied()
            .filter(|tok| *tok != "s")
            .collect();
        if c_tokens.is_subset(&t_tokens)
            && c_tokens.len() >= 2
            && !extras.is_empty()
            && extras.iter().all(|tok| ALIAS_EXTRAS.contains(tok))
            && strong_album
        {
            return Some(ArtistRule::Alias);
        }

        if t_tokens.is_subset(&c_tokens)
            && t_tokens.len() >= 2
            && strong_album
            && s.artist_set >= ARTIST_SET_GATE
            && (has_collaboration_marker(c_artist_raw) || c_tokens.len() <= t_tokens.len() + 2)
        {
            return Some(ArtistRule::Collaboration);
        }

        if target.multi_artist
            && c_tokens.is_subset(&t_tokens)
            && c_tokens.len() >= 2
            && strong_album
            && s.artist_set >= ARTIST_SET_GATE
        {
            return Some(ArtistRule::DuoSubset);
        }

        None
    }

    fn album_ok(&self, target: &TargetKeys, c_album: &NormalizedText, s: &Evaluation) -> bool {
        let cutoff = self.config.cutoff();
        if s.album_set < cutoff || s.album_ns < ALBUM_NO_SPACE_FLOOR.max(cutoff - 5.0) {
            return false;
        }
        if target.self_titled {
            let t_album = tokens(&target.album);
            return tokens(c_album)
                .difference(&t_album)
                .all(|tok| is_generic_album_token(tok));
        }
        true
    }

    // ========================================================================
    // Matching
    // ========================================================================

    /// Accepted candidates for `target`, in discovery order.
    pub fn match_target<'a>(&self, target: &'a TargetEntry, index: &'a CandidateIndex) -> Vec<MatchResult<'a>> {
        let keys = TargetKeys::of(target);
        if keys.album.is_empty() || keys.artist.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<(usize, MatchResult<'a>)> = Vec::new();
        for folder in index.artists() {
            for &idx in &folder.albums {
                let c = index.keys(idx);
                let eval = self.evaluate(&keys, &c.artist, &folder.name, &c.album);
                if !eval.accepted() {
                    continue;
                }
                let candidate = index.album(idx);
                let Some(rule) = eval.rule else { continue };
                hits.push((idx, standard_result(target, candidate, &eval, rule)));
            }
        }

        if !hits.is_empty() {
            hits.sort_by_key(|(idx, _)| *idx);
            return hits.into_iter().map(|(_, r)| r).collect();
        }

        match self.fallback(target, &keys, index) {
            Some(result) => {
                tracing::debug!("{} matched via {}", target, result.via);
                vec![result]
            }
            None => Vec::new(),
        }
    }

    // ========================================================================
    // Compound-title fallbacks
    // ========================================================================

    fn artist_passes_fallback_gate(&self, target: &TargetKeys, c_artist: &NormalizedText) -> (bool, f64) {
        self.artist_passes(target, c_artist, FALLBACK_GATE, FALLBACK_GATE)
    }

    fn artist_passes(&self, target: &TargetKeys, c_artist: &NormalizedText, set_gate: f64, sort_gate: f64) -> (bool, f64) {
        let t = target.artist.as_string();
        let c = c_artist.as_string();
        let set = token_set_ratio(&t, &c);
        let sort = token_sort_ratio(&t, &c);
        (set >= set_gate && sort >= sort_gate, set)
    }

    fn fallback<'a>(&self, target: &'a TargetEntry, keys: &TargetKeys, index: &'a CandidateIndex) -> Option<MatchResult<'a>> {
        self.prefix_fallback(target, keys, index)
            .or_else(|| self.segment_fallback(target, keys, index))
            .or_else(|| self.contains_fallback(target, keys, index))
    }

    /// Candidate album starts with the whole target album followed by "and".
    fn prefix_fallback<'a>(&self, target: &'a TargetEntry, keys: &TargetKeys, index: &'a CandidateIndex) -> Option<MatchResult<'a>> {
        let t_album = keys.album.tokens();
        let t_album_s = keys.album.as_string();
        let mut found = Vec::new();

        for idx in 0..index.len() {
            let c = index.keys(idx);
            let c_album = c.album.tokens();
            if c_album.len() <= t_album.len() || &c_album[..t_album.len()] != t_album || c_album[t_album.len()] != "and" {
                continue;
            }
            let (artist_ok, artist_set) = self.artist_passes_fallback_gate(keys, &c.artist);
            let album_set = token_set_ratio(&t_album_s, &c.album.as_string());
            if artist_ok && album_set >= FALLBACK_GATE {
                found.push((idx, artist_set, album_set));
            }
        }

        match found.as_slice() {
            [(idx, artist_set, album_set)] => Some(fallback_result(
                target,
                index.album(*idx),
                *artist_set,
                *album_set,
                self.fallback_score(FALLBACK_SCORE),
                Fallback::Prefix,
            )),
            _ => None,
        }
    }

    /// Candidate album is "X and Y" and one segment is (or starts with) the target album.
    fn segment_fallback<'a>(&self, target: &'a TargetEntry, keys: &TargetKeys, index: &'a CandidateIndex) -> Option<MatchResult<'a>> {
        let t_album = keys.album.tokens();
        let t_album_s = keys.album.as_string();
        let segment_matches = |segment: &[String]| {
            let without_numbers: Vec<&String> = segment
                .iter()
                .filter(|tok| !tok.chars().all(|c| c.is_ascii_digit()))
                .collect();
            let equal = without_numbers.len() == t_album.len()
                && without_numbers.iter().zip(t_album).all(|(a, b)| *a == b);
            equal || segment.starts_with(t_album)
        };

        let mut found: Vec<(usize, f64, f64)> = Vec::new();
        for idx in 0..index.len() {
            let c = index.keys(idx);
            let c_album = c.album.tokens();
            let Some(and_at) = c_album.iter().position(|tok| tok == "and") else {
                continue;
            };
            let (left, right) = (&c_album[..and_at], &c_album[and_at + 1..]);
            if !segment_matches(left) && !segment_matches(right) {
                continue;
            }
            let (artist_ok, artist_set) = self.artist_passes_fallback_gate(keys, &c.artist);
            if artist_ok {
                found.push((idx, artist_set, token_set_ratio(&t_album_s, &c.album.as_string())));
            }
        }

        let year_literal = target.year.map(|y| y.to_string());
        let carries_year = |idx: usize| {
            year_literal
                .as_deref()
                .is_some_and(|y| index.album(idx).album_raw.contains(y))
        };

        let (idx, artist_set, album_set) = match found.as_slice() {
            [single] => *single,
            [] => return None,
            many => {
                let with_year: Vec<_> = many.iter().filter(|(idx, _, _)| carries_year(*idx)).collect();
                match with_year.as_slice() {
                    [single] => **single,
                    _ => return None,
                }
            }
        };
        let score = if carries_year(idx) {
            self.fallback_score(FALLBACK_YEAR_SCORE)
        } else {
            self.fallback_score(FALLBACK_SCORE)
        };
        Some(fallback_result(target, index.album(idx), artist_set, album_set, score, Fallback::Segment))
    }

    /// Exactly one candidate album contains the target album as a substring.
    fn contains_fallback<'a>(&self, target: &'a TargetEntry, keys: &TargetKeys, index: &'a CandidateIndex) -> Option<MatchResult<'a>> {
        let t_album_s = keys.album.as_string();
        let mut found = Vec::new();

        for idx in 0..index.len() {
            let c = index.keys(idx);
            let c_album_s = c.album.as_string();
            if c_album_s.is_empty() || !c_album_s.contains(&t_album_s) {
                continue;
            }
            let (artist_ok, artist_set) = self.artist_passes(keys, &c.artist, ARTIST_SET_GATE, ARTIST_SORT_GATE);
            if artist_ok {
                found.push((idx, artist_set, token_set_ratio(&t_album_s, &c_album_s)));
            }
        }

        match found.as_slice() {
            [(idx, artist_set, album_set)] => Some(fallback_result(
                target,
                index.album(*idx),
                *artist_set,
                *album_set,
                self.fallback_score(FALLBACK_SCORE),
                Fallback::UniqueContains,
            )),
            _ => None,
        }
    }
}

fn standard_result<'a>(target: &'a TargetEntry, candidate: &'a CandidateAlbum, eval: &Evaluation, rule: ArtistRule) -> MatchResult<'a> {
    let year_bucket = YearBucket::classify(target.year, &candidate.years);
    let score = (eval.label_score.max(eval.album_score) + year_bucket.bonus()).clamp(0.0, 100.0);
    MatchResult {
        target,
        candidate,
        artist_score: eval.artist_set,
        album_score: eval.album_score,
        score,
        year_bucket,
        via: MatchPath::Standard(rule),
    }
}

fn fallback_result<'a>(
    target: &'a TargetEntry,
    candidate: &'a CandidateAlbum,
    artist_score: f64,
    album_score: f64,
    score: f64,
    kind: Fallback,
) -> MatchResult<'a> {
    MatchResult {
        target,
        candidate,
        artist_score,
        album_score,
        score,
        year_bucket: YearBucket::classify(target.year, &candidate.years),
        via: MatchPath::Fallback(kind),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LibraryTier;
    use std::path::PathBuf;

    fn album(artist: &str, album: &str, years: &[i32]) -> CandidateAlbum {
        CandidateAlbum {
            root: PathBuf::from(format!("/lib/{}/{}", artist, album)),
            artist_raw: artist.to_string(),
            album_raw: album.to_string(),
            years: years.to_vec(),
            has_cue: false,
            track_paths: vec![],
        }
    }

    fn index(albums: Vec<CandidateAlbum>) -> CandidateIndex {
        CandidateIndex::new(LibraryTier::Primary, albums)
    }

    fn matcher() -> Matcher {
        Matcher::new(MatchConfig::default())
    }

    #[test]
    fn test_exact_match_uses_strong_gate() {
        let idx = index(vec![album("Camel", "Mirage", &[1974]), album("Camel", "Moonmadness", &[1976])]);
        let target = TargetEntry::new("Camel", "Mirage", Some(1974));
        let results = matcher().match_target(&target, &idx);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].candidate.album_raw, "Mirage");
        assert_eq!(results[0].via, MatchPath::Standard(ArtistRule::StrongGate));
        assert_eq!(results[0].year_bucket, YearBucket::Exact);
        assert_eq!(results[0].score, 100.0);
    }

    #[test]
    fn test_unique_contains_fallback() {
        let idx = index(vec![album("Arkus", "1914 Revisited", &[2013]), album("Arkus", "Odyssey", &[])]);
        let target = TargetEntry::new("Arkus", "1914", Some(1981));
        let results = matcher().match_target(&target, &idx);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].candidate.album_raw, "1914 Revisited");
        assert_eq!(results[0].via, MatchPath::Fallback(Fallback::UniqueContains));
        assert_eq!(results[0].score, 90.0);
    }

    #[test]
    fn test_contains_fallback_requires_uniqueness() {
        let idx = index(vec![album("Arkus", "1914 Revisited", &[]), album("Arkus", "1914 Live", &[])]);
        let target = TargetEntry::new("Arkus", "1914", None);
        assert!(matcher().match_target(&target, &idx).is_empty());
    }

    #[test]
    fn test_contains_fallback_uses_strong_artist_gate() {
        let idx = index(vec![album("Arkus Band", "1914 Revisited", &[])]);
        let target = TargetEntry::new("Arkus", "1914", None);
        assert!(matcher().match_target(&target, &idx).is_empty());

        let idx = index(vec![album("Arkus", "1914 Revisited", &[])]);
        let results = matcher().match_target(&target, &idx);
        assert_eq!(results[0].via, MatchPath::Fallback(Fallback::UniqueContains));
    }

    #[test]
    fn test_alias_rule_band_variant() {
        let idx = index(vec![album("Darryl Way", "Saturation Point", &[1973])]);
        let target = TargetEntry::new("Darryl Way's Wolf", "Saturation Point", Some(1973));
        let results = matcher().match_target(&target, &idx);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].via, MatchPath::Standard(ArtistRule::Alias));
    }

    #[test]
    fn test_alias_rule_rejects_one_word_candidate() {
        let idx = index(vec![album("Egg", "Good Morning", &[])]);
        let target = TargetEntry::new("Flied Egg", "Good Morning", None);
        assert!(matcher().match_target(&target, &idx).is_empty());
    }

    #[test]
    fn test_collaboration_rule() {
        let idx = index(vec![album("Mirror + Lethe + Guest", "Dreams", &[])]);
        let target = TargetEntry::new("Mirror Lethe", "Dreams", None);
        let results = matcher().match_target(&target, &idx);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].via, MatchPath::Standard(ArtistRule::Collaboration));
    }

    #[test]
    fn test_duo_subset_rule() {
        let idx = index(vec![album("Barbara Thompson", "Mother Earth", &[])]);
        let target = TargetEntry::new("Barbara Thompson & Jon Hiseman", "Mother Earth", None);
        let results = matcher().match_target(&target, &idx);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].via, MatchPath::Standard(ArtistRule::DuoSubset));
    }

    #[test]
    fn test_single_token_superset_guard() {
        let idx = index(vec![album("Alice Cooper", "Alice", &[])]);
        let target = TargetEntry::new("Alice", "Alice", None);
        assert!(matcher().match_target(&target, &idx).is_empty());
    }

    #[test]
    fn test_self_titled_rejects_non_generic_extras() {
        let idx = index(vec![
            album("Mahavishnu", "Mahavishnu X", &[]),
            album("Mahavishnu", "Mahavishnu 2", &[]),
        ]);
        let target = TargetEntry::new("Mahavishnu", "Mahavishnu", None);
        let results = matcher().match_target(&target, &idx);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].candidate.album_raw, "Mahavishnu 2");
    }

    #[test]
    fn test_articles_do_not_block_album_match() {
        let idx = index(vec![album("Congreso", "El Congreso", &[])]);
        let target = TargetEntry::new("Congreso", "Congreso", None);
        assert_eq!(matcher().match_target(&target, &idx).len(), 1);
    }

    #[test]
    fn test_prefix_fallback() {
        let idx = index(vec![album("Anglagard", "Hybris and Epilog", &[])]);
        let target = TargetEntry::new("Anglagard", "Hybris", None);
        let results = matcher().match_target(&target, &idx);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].via, MatchPath::Fallback(Fallback::Prefix));
    }

    #[test]
    fn test_segment_fallback_prefers_year_literal() {
        let idx = index(vec![
            album("Caravan", "Live 1974 and Waterloo Lily", &[]),
            album("Caravan", "Live 1980 and Waterloo Lily", &[]),
        ]);
        let target = TargetEntry::new("Caravan", "Waterloo Lily", Some(1974));
        let results = matcher().match_target(&target, &idx);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].via, MatchPath::Fallback(Fallback::Segment));
        assert_eq!(results[0].candidate.album_raw, "Live 1974 and Waterloo Lily");
        assert_eq!(results[0].score, 92.0);
    }

    #[test]
    fn test_results_in_discovery_order() {
        let idx = index(vec![
            album("Genesis", "Foxtrot", &[1972]),
            album("Peter Gabriel", "Car", &[]),
            album("Genesis", "Foxtrot", &[2008]),
        ]);
        let target = TargetEntry::new("Genesis", "Foxtrot", None);
        let results = matcher().match_target(&target, &idx);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].candidate.years, vec![1972]);
        assert_eq!(results[1].candidate.years, vec![2008]);
    }
}
