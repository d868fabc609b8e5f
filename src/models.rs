//! Core data models for album resolution.
//!
//! This module contains the struct definitions and enums shared by the
//! index, matcher, selector and resolver.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Target Entries
// ============================================================================

/// One parsed `Artist - Album (Year)` request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetEntry {
    pub artist: String,
    pub album: String,
    pub year: Option<i32>,
}

impl TargetEntry {
    pub fn new(artist: impl Into<String>, album: impl Into<String>, year: Option<i32>) -> Self {
        Self {
            artist: artist.into(),
            album: album.into(),
            year,
        }
    }

    /// Year as shown in logs, "?" when absent.
    pub fn year_label(&self) -> String {
        self.year.map_or_else(|| "?".to_string(), |y| y.to_string())
    }
}

impl fmt::Display for TargetEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist, self.album)?;
        if let Some(year) = self.year {
            write!(f, " ({})", year)?;
        }
        Ok(())
    }
}

// ============================================================================
// Library Candidates
// ============================================================================

/// One qualifying album folder discovered under a library root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateAlbum {
    /// The album folder; unique per candidate
    pub root: PathBuf,
    /// Parent folder name
    pub artist_raw: String,
    /// Folder name with leading year groups stripped
    pub album_raw: String,
    /// Original year first, then reissue (0–2 entries)
    pub years: Vec<i32>,
    pub has_cue: bool,
    /// `.cue` files only when `has_cue`, otherwise audio files
    pub track_paths: Vec<PathBuf>,
}

/// Which library tier a candidate index was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryTier {
    Primary,
    Secondary,
}

impl fmt::Display for LibraryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryTier::Primary => f.write_str("primary"),
            LibraryTier::Secondary => f.write_str("secondary"),
        }
    }
}

// ============================================================================
// Year Buckets
// ============================================================================

/// Year proximity between a target and a candidate. Lower sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum YearBucket {
    Exact,
    Adjacent,
    Other,
}

impl YearBucket {
    /// Bucket from the smallest distance between the target year and any candidate year.
    pub fn classify(target_year: Option<i32>, candidate_years: &[i32]) -> Self {
        let Some(target) = target_year else {
            return YearBucket::Other;
        };
        match candidate_years.iter().map(|y| (y - target).abs()).min() {
            Some(0) => YearBucket::Exact,
            Some(1) => YearBucket::Adjacent,
            _ => YearBucket::Other,
        }
    }

    pub fn bonus(self) -> f64 {
        match self {
            YearBucket::Exact => 10.0,
            YearBucket::Adjacent => 5.0,
            YearBucket::Other => 0.0,
        }
    }
}

// ============================================================================
// Match Results
// ============================================================================

/// Artist acceptance rule, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtistRule {
    StrongGate,
    Alias,
    Collaboration,
    DuoSubset,
    SelfTitledSuperset,
}

/// Compound-title fallback that accepted a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    Prefix,
    Segment,
    UniqueContains,
}

/// How a candidate got accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPath {
    Standard(ArtistRule),
    Fallback(Fallback),
}

impl MatchPath {
    pub fn is_fallback(self) -> bool {
        matches!(self, MatchPath::Fallback(_))
    }
}

impl fmt::Display for MatchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchPath::Standard(rule) => write!(f, "{:?}", rule),
            MatchPath::Fallback(kind) => write!(f, "fallback:{:?}", kind),
        }
    }
}

/// A candidate accepted for a target, with its scores.
#[derive(Debug, Clone)]
pub struct MatchResult<'a> {
    pub target: &'a TargetEntry,
    pub candidate: &'a CandidateAlbum,
    pub artist_score: f64,
    pub album_score: f64,
    /// Ranking score with the year bonus applied, capped at 100
    pub score: f64,
    pub year_bucket: YearBucket,
    pub via: MatchPath,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_bucket_classify() {
        assert_eq!(YearBucket::classify(Some(1981), &[1981]), YearBucket::Exact);
        assert_eq!(YearBucket::classify(Some(1981), &[1980]), YearBucket::Adjacent);
        assert_eq!(YearBucket::classify(Some(1981), &[1973, 1982]), YearBucket::Adjacent);
        assert_eq!(YearBucket::classify(Some(1981), &[1973, 2004]), YearBucket::Other);
        assert_eq!(YearBucket::classify(Some(1981), &[]), YearBucket::Other);
        assert_eq!(YearBucket::classify(None, &[1981]), YearBucket::Other);
    }

    #[test]
    fn test_year_bucket_ordering() {
        assert!(YearBucket::Exact < YearBucket::Adjacent);
        assert!(YearBucket::Adjacent < YearBucket::Other);
        assert_eq!(YearBucket::Exact.bonus(), 10.0);
        assert_eq!(YearBucket::Other.bonus(), 0.0);
    }

    #[test]
    fn test_target_entry_display() {
        let entry = TargetEntry::new("The Enid", "Enid", Some(1976));
        assert_eq!(entry.to_string(), "The Enid - Enid (1976)");
        let no_year = TargetEntry::new("Arkus", "1914", None);
        assert_eq!(no_year.to_string(), "Arkus - 1914");
        assert_eq!(no_year.year_label(), "?");
    }
}
