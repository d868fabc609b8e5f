//! Winner selection among accepted candidates.

use std::cmp::Ordering;

use crate::models::MatchResult;

/// Order results by year bucket, then by score (highest first). Stable, so
/// equal keys keep discovery order.
pub fn rank(results: &mut [MatchResult<'_>]) {
    results.sort_by(|a, b| {
        a.year_bucket
            .cmp(&b.year_bucket)
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
    });
}

fn qualifies(result: &MatchResult<'_>, cutoff: f64) -> bool {
    result.score >= cutoff || result.via.is_fallback()
}

/// Second qualifying result of an already ranked slice.
pub fn runner_up<'r, 'a>(ranked: &'r [MatchResult<'a>], cutoff: f64) -> Option<&'r MatchResult<'a>> {
    ranked.iter().filter(|r| qualifies(r, cutoff)).nth(1)
}

/// Pick the winner: the first ranked result at or above the cutoff, or one
/// that came through a compound-title fallback.
pub fn select(mut results: Vec<MatchResult<'_>>, cutoff: f64) -> Option<MatchResult<'_>> {
    rank(&mut results);

    if let Some(second) = runner_up(&results, cutoff) {
        let qualifying = results.iter().filter(|r| qualifies(r, cutoff)).count();
        tracing::debug!(
            "{}: {} qualifying candidates, runner-up {} ({:.1}, {:?})",
            second.target,
            qualifying,
            second.candidate.root.display(),
            second.score,
            second.year_bucket
        );
    }

    results.into_iter().find(|r| qualifies(r, cutoff))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArtistRule, CandidateAlbum, Fallback, MatchPath, TargetEntry, YearBucket};
    use std::path::PathBuf;

    fn album(name: &str, years: &[i32]) -> CandidateAlbum {
        CandidateAlbum {
            root: PathBuf::from(format!("/lib/Rush/{}", name)),
            artist_raw: "Rush".to_string(),
            album_raw: name.to_string(),
            years: years.to_vec(),
            has_cue: false,
            track_paths: vec![],
        }
    }

    fn result<'a>(target: &'a TargetEntry, candidate: &'a CandidateAlbum, base: f64, via: MatchPath) -> MatchResult<'a> {
        let year_bucket = YearBucket::classify(target.year, &candidate.years);
        MatchResult {
            target,
            candidate,
            artist_score: 100.0,
            album_score: base,
            score: (base + year_bucket.bonus()).min(100.0),
            year_bucket,
            via,
        }
    }

    #[test]
    fn test_year_tie_break_prefers_exact_year() {
        let target = TargetEntry::new("Rush", "Moving Pictures", Some(1981));
        let reissue = album("Moving Pictures", &[1980]);
        let original = album("Moving Pictures", &[1981]);
        let via = MatchPath::Standard(ArtistRule::StrongGate);
        let results = vec![result(&target, &reissue, 100.0, via), result(&target, &original, 100.0, via)];

        let winner = select(results, 85.0).unwrap();
        assert_eq!(winner.candidate.years, vec![1981]);
        assert_eq!(winner.year_bucket, YearBucket::Exact);
    }

    #[test]
    fn test_bucket_beats_raw_score() {
        let target = TargetEntry::new("Rush", "Signals", Some(1982));
        let close = album("Signals (Remaster)", &[1982]);
        let far = album("Signals", &[2015]);
        let via = MatchPath::Standard(ArtistRule::StrongGate);
        let results = vec![result(&target, &far, 100.0, via), result(&target, &close, 86.0, via)];

        let winner = select(results, 85.0).unwrap();
        assert_eq!(winner.candidate.album_raw, "Signals (Remaster)");
    }

    #[test]
    fn test_equal_keys_keep_discovery_order() {
        let target = TargetEntry::new("Rush", "Hemispheres", None);
        let first = album("Hemispheres", &[]);
        let second = album("Hemispheres ", &[]);
        let via = MatchPath::Standard(ArtistRule::StrongGate);
        let results = vec![result(&target, &first, 100.0, via), result(&target, &second, 100.0, via)];
        assert_eq!(select(results, 85.0).unwrap().candidate.album_raw, "Hemispheres");
    }

    #[test]
    fn test_runner_up_skips_non_qualifying() {
        let target = TargetEntry::new("Rush", "Moving Pictures", Some(1981));
        let best = album("Moving Pictures", &[1981]);
        let weak = album("Moving Pictures Live", &[1981]);
        let other = album("Moving Pictures (2011)", &[2011]);
        let via = MatchPath::Standard(ArtistRule::StrongGate);
        let mut results = vec![
            result(&target, &other, 90.0, via),
            result(&target, &weak, 60.0, via),
            result(&target, &best, 95.0, via),
        ];
        rank(&mut results);
        assert_eq!(results[1].candidate.album_raw, "Moving Pictures Live");

        let second = runner_up(&results, 85.0).unwrap();
        assert_eq!(second.candidate.album_raw, "Moving Pictures (2011)");
        assert!(runner_up(&results[..2], 85.0).is_none());
    }

    #[test]
    fn test_below_cutoff_is_unmatched() {
        let target = TargetEntry::new("Rush", "Caress of Steel", None);
        let c = album("Caress", &[]);
        let results = vec![result(&target, &c, 80.0, MatchPath::Standard(ArtistRule::StrongGate))];
        assert!(select(results, 85.0).is_none());
    }

    #[test]
    fn test_fallback_bypasses_cutoff() {
        let target = TargetEntry::new("Rush", "2112", None);
        let c = album("2112 Deluxe", &[]);
        let results = vec![result(&target, &c, 90.0, MatchPath::Fallback(Fallback::UniqueContains))];
        assert!(select(results, 95.0).is_some());
        assert!(select(Vec::new(), 85.0).is_none());
    }
}
