//! Run configuration consumed by the library.
//!
//! The binaries build these from their clap arguments.

use std::path::{Path, PathBuf};

use crate::scoring::DEFAULT_SCORE_CUTOFF;

/// Folder names containing any of these (case-insensitive) are never indexed.
pub const DEFAULT_EXCLUDE_MARKERS: &[&str] = &["#recycle"];

/// Matching thresholds.
#[derive(Debug, Clone, Copy)]
pub struct MatchConfig {
    pub score_cutoff: i32,
}

impl MatchConfig {
    pub fn cutoff(&self) -> f64 {
        f64::from(self.score_cutoff)
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            score_cutoff: DEFAULT_SCORE_CUTOFF,
        }
    }
}

/// Everything a playlist run needs beyond the target list.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub matching: MatchConfig,
    pub sort_tracks: bool,
    pub primary: PathBuf,
    pub secondary: Option<PathBuf>,
    pub exclude_markers: Vec<String>,
}

impl RunConfig {
    pub fn new(primary: impl Into<PathBuf>) -> Self {
        Self {
            matching: MatchConfig::default(),
            sort_tracks: false,
            primary: primary.into(),
            secondary: None,
            exclude_markers: DEFAULT_EXCLUDE_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Strip stray quotes and whitespace left over from shell quoting.
pub fn sanitize_path_arg(raw: &Path) -> PathBuf {
    let text = raw.to_string_lossy();
    PathBuf::from(text.trim().trim_matches('"').trim_matches('\''))
}

/// Output file names derived from the playlist path ("list.m3u8" → "list-log.txt").
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub playlist: PathBuf,
    pub not_found: PathBuf,
    pub found: PathBuf,
    pub duplicates: PathBuf,
    pub log: PathBuf,
    pub exceptions: PathBuf,
    /// Scan cache, shared by every list in the same folder
    pub cache: PathBuf,
}

impl OutputPaths {
    pub fn derive(playlist: &Path) -> Self {
        let dir = match playlist.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let stem = playlist
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "playlist".to_string());
        let sibling = |suffix: &str| dir.join(format!("{}-{}", stem, suffix));

        Self {
            playlist: playlist.to_path_buf(),
            not_found: sibling("not-found-log.txt"),
            found: sibling("found-log.txt"),
            duplicates: sibling("duplicates.txt"),
            log: sibling("log.txt"),
            exceptions: sibling("exceptions.txt"),
            cache: dir.join("album-playlist-cache.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_paths_derive() {
        let paths = OutputPaths::derive(Path::new("/music/lists/prog.m3u8"));
        assert_eq!(paths.not_found, PathBuf::from("/music/lists/prog-not-found-log.txt"));
        assert_eq!(paths.exceptions, PathBuf::from("/music/lists/prog-exceptions.txt"));
        assert_eq!(paths.duplicates, PathBuf::from("/music/lists/prog-duplicates.txt"));
        assert_eq!(paths.cache, PathBuf::from("/music/lists/album-playlist-cache.json"));
    }

    #[test]
    fn test_output_paths_bare_name() {
        let paths = OutputPaths::derive(Path::new("playlist.m3u8"));
        assert_eq!(paths.log, PathBuf::from("./playlist-log.txt"));
    }

    #[test]
    fn test_sanitize_path_arg() {
        assert_eq!(sanitize_path_arg(Path::new(" \"/mnt/music\" ")), PathBuf::from("/mnt/music"));
        assert_eq!(sanitize_path_arg(Path::new("'/mnt/music'")), PathBuf::from("/mnt/music"));
    }
}
