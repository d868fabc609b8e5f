//! Track collection for a winning album folder.

use rustc_hash::FxHashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::CandidateAlbum;

/// Audio file extensions that make a folder qualify (lowercase, no dot).
pub const AUDIO_EXTENSIONS: &[&str] = &["flac", "mp3", "m4a", "wav", "ape", "ogg"];

/// Cue sheet extension.
pub const CUE_EXTENSION: &str = "cue";

pub fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

pub fn is_audio_file(path: &Path) -> bool {
    extension_of(path).is_some_and(|e| AUDIO_EXTENSIONS.contains(&e.as_str()))
}

pub fn is_cue_file(path: &Path) -> bool {
    extension_of(path).is_some_and(|e| e == CUE_EXTENSION)
}

/// Absolute form of a path for identity checks. Falls back to the path as
/// given when it cannot be canonicalized (e.g. an unreachable share).
pub fn resolved(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Drop repeated paths (by resolved form) keeping the first occurrence.
pub fn unique_paths<I>(paths: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut seen = FxHashSet::default();
    paths
        .into_iter()
        .filter(|p| seen.insert(resolved(p)))
        .collect()
}

/// Ordered track list for a winning candidate.
///
/// The cue-only override is already applied by the index; this re-applies
/// de-duplication and, when asked, a sort by full path so merged disc
/// sub-folders stay contiguous.
pub fn collect(candidate: &CandidateAlbum, sort: bool) -> Vec<PathBuf> {
    let mut tracks = unique_paths(candidate.track_paths.iter().cloned());
    if sort {
        tracks.sort();
    }
    tracks
}
