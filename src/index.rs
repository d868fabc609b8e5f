//! Candidate index: walks library roots and builds album-folder records.
//!
//! A folder qualifies when it directly holds at least one audio or cue file.
//! Artist is the parent folder name; album is the folder name with leading
//! year groups stripped. Disc sub-folders ("CD1", "Disc 2") are folded into
//! their album folder.

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::cache::{ChangeSignature, ScanCache};
use crate::config::DEFAULT_EXCLUDE_MARKERS;
use crate::error::LibraryError;
use crate::models::{CandidateAlbum, LibraryTier};
use crate::normalize::{normalize, normalize_artist, NormalizedText};
use crate::progress::WalkProgress;
use crate::tracks::{is_audio_file, is_cue_file, unique_paths};

// ============================================================================
// Folder Name Parsing
// ============================================================================

/// Four-digit years in the 1900s/2000s.
pub static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").unwrap());

/// Characters allowed next to years inside a leading year group: "[1973 (2004)]", "[1971, 1974]".
pub static YEAR_GROUP_FILLER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\s,;/&\-–\[\]()]*$").unwrap());

/// Bare year prefix with a dash separator: "1973 - Title".
pub static DASHED_YEAR_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^((?:19|20)\d{2})\s+[-–]\s+(.+)$").unwrap());

/// Trailing year suffix: "Foxtrot (1972)", "Foxtrot [1972]".
pub static TRAILING_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[\(\[]((?:19|20)\d{2})[\)\]]\s*$").unwrap());

/// Disc / side sub-folders that belong to their parent album.
pub static DISC_FOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:cd|disc|disk|lp|side|bonus|extra|extras|vinyl|cassette|tape)(?:\s*[\-_]?(?:\d+|[a-z]))?$")
        .unwrap()
});

const MAX_YEARS: usize = 2;

/// Split a leading bracket group, honouring nesting: "[1973 (2004)] X" → ("1973 (2004)", " X").
fn split_leading_group(s: &str) -> Option<(&str, &str)> {
    let first = s.chars().next()?;
    if first != '[' && first != '(' {
        return None;
    }
    let mut depth = 0usize;
    for (idx, c) in s.char_indices() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some((&s[1..idx], &s[idx + c.len_utf8()..]));
                }
            }
            _ => {}
        }
    }
    None
}

fn push_years(text: &str, years: &mut Vec<i32>) {
    for cap in YEAR.captures_iter(text) {
        if let Ok(year) = cap[1].parse::<i32>() {
            if !years.contains(&year) && years.len() < MAX_YEARS {
                years.push(year);
            }
        }
    }
}

/// Parse an album folder name into its title and years (original first, then reissue).
///
/// Only leading year groups, a dashed leading year or a trailing `(YYYY)` are
/// treated as years; a title that merely starts with digits ("1914 Revisited")
/// is left alone.
pub fn parse_album_folder(name: &str) -> (String, Vec<i32>) {
    let mut years = Vec::new();
    let mut rest = name.trim();

    while let Some((inner, after)) = split_leading_group(rest) {
        let filler = YEAR.replace_all(inner, "");
        if !YEAR.is_match(inner) || !YEAR_GROUP_FILLER.is_match(&filler) {
            break;
        }
        push_years(inner, &mut years);
        rest = after.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '–' | '.' | '_'));
    }

    let mut album = rest.to_string();
    if years.is_empty() {
        if let Some(caps) = DASHED_YEAR_PREFIX.captures(rest) {
            push_years(&caps[1], &mut years);
            album = caps[2].to_string();
        } else if let Some(caps) = TRAILING_YEAR.captures(rest) {
            push_years(&caps[1], &mut years);
            album = rest[..caps.get(0).map_or(rest.len(), |m| m.start())].to_string();
        }
    }

    let album = album.trim().to_string();
    if album.is_empty() {
        return (name.trim().to_string(), years);
    }
    (album, years)
}

pub fn is_disc_folder(name: &str) -> bool {
    DISC_FOLDER.is_match(name.trim())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ============================================================================
// Candidate Index
// ============================================================================

/// Normalized forms of one candidate, computed once per index.
#[derive(Debug, Clone)]
pub struct AlbumKeys {
    pub artist: NormalizedText,
    pub album: NormalizedText,
}

/// Albums grouped under one artist folder name.
#[derive(Debug, Clone)]
pub struct ArtistFolder {
    pub name: String,
    pub albums: Vec<usize>,
}

/// In-memory table of candidates in discovery order, indexed by artist folder.
#[derive(Debug, Clone)]
pub struct CandidateIndex {
    pub tier: LibraryTier,
    albums: Vec<CandidateAlbum>,
    keys: Vec<AlbumKeys>,
    artists: Vec<ArtistFolder>,
}

impl CandidateIndex {
    pub fn new(tier: LibraryTier, albums: Vec<CandidateAlbum>) -> Self {
        let keys = albums
            .iter()
            .map(|a| AlbumKeys {
                artist: normalize_artist(&a.artist_raw),
                album: normalize(&a.album_raw),
            })
            .collect();

        let mut artists: Vec<ArtistFolder> = Vec::new();
        let mut by_name: FxHashMap<&str, usize> = FxHashMap::default();
        for (idx, album) in albums.iter().enumerate() {
            let slot = *by_name.entry(album.artist_raw.as_str()).or_insert_with(|| {
                artists.push(ArtistFolder {
                    name: album.artist_raw.clone(),
                    albums: Vec::new(),
                });
                artists.len() - 1
            });
            artists[slot].albums.push(idx);
        }

        Self {
            tier,
            albums,
            keys,
            artists,
        }
    }

    pub fn albums(&self) -> &[CandidateAlbum] {
        &self.albums
    }

    pub fn album(&self, idx: usize) -> &CandidateAlbum {
        &self.albums[idx]
    }

    pub fn keys(&self, idx: usize) -> &AlbumKeys {
        &self.keys[idx]
    }

    pub fn artists(&self) -> &[ArtistFolder] {
        &self.artists
    }

    pub fn len(&self) -> usize {
        self.albums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.albums.is_empty()
    }
}

// ============================================================================
// Library Scanner
// ============================================================================

/// Audio and cue files gathered for one album folder (possibly from disc sub-folders).
#[derive(Debug)]
struct PendingAlbum {
    root: PathBuf,
    artist_raw: String,
    folder_name: String,
    audio: Vec<PathBuf>,
    cues: Vec<PathBuf>,
}

impl PendingAlbum {
    fn new(root: &Path) -> Self {
        let artist_raw = root.parent().map(file_name_of).unwrap_or_default();
        Self {
            root: root.to_path_buf(),
            artist_raw,
            folder_name: file_name_of(root),
            audio: Vec::new(),
            cues: Vec::new(),
        }
    }

    fn finish(self) -> CandidateAlbum {
        let (album_raw, years) = parse_album_folder(&self.folder_name);
        let has_cue = !self.cues.is_empty();
        let track_paths = if has_cue {
            unique_paths(self.cues)
        } else {
            unique_paths(self.audio)
        };
        CandidateAlbum {
            root: self.root,
            artist_raw: self.artist_raw,
            album_raw,
            years,
            has_cue,
            track_paths,
        }
    }
}

/// Walks library roots depth-first and produces candidate records.
#[derive(Debug, Clone)]
pub struct LibraryScanner {
    exclude_markers: Vec<String>,
}

impl Default for LibraryScanner {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDE_MARKERS.iter().map(|m| m.to_string()).collect())
    }
}

impl LibraryScanner {
    pub fn new(exclude_markers: Vec<String>) -> Self {
        Self {
            exclude_markers: exclude_markers.into_iter().map(|m| m.to_lowercase()).collect(),
        }
    }

    pub fn is_excluded_name(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.exclude_markers.iter().any(|m| lower.contains(m.as_str()))
    }

    fn should_descend(&self, entry: &DirEntry) -> bool {
        entry.depth() == 0 || !self.is_excluded_name(&entry.file_name().to_string_lossy())
    }

    pub fn check_root(root: &Path) -> Result<(), LibraryError> {
        if !root.exists() {
            return Err(LibraryError::RootNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(LibraryError::NotADirectory(root.to_path_buf()));
        }
        fs::read_dir(root)
            .map(|_| ())
            .map_err(|e| LibraryError::Unreadable(root.to_path_buf(), e.to_string()))
    }

    /// Scan roots in order, reusing cached records whose signature still matches.
    pub fn scan(
        &self,
        roots: &[PathBuf],
        tier: LibraryTier,
        cache: &mut ScanCache,
    ) -> Result<CandidateIndex, LibraryError> {
        for root in roots {
            Self::check_root(root)?;
        }

        let mut albums = Vec::new();
        for root in roots {
            let signature = ChangeSignature::of(root, &self.exclude_markers);
            if let Some(cached) = signature.and_then(|sig| cache.get(root, sig)) {
                tracing::info!(
                    "Loaded {} index from cache: {} ({} folders)",
                    tier,
                    root.display(),
                    cached.len()
                );
                albums.extend_from_slice(cached);
                continue;
            }

            tracing::info!("Indexing {} library: {}", tier, root.display());
            let found = self.scan_root(root)?;
            if let Some(sig) = signature {
                cache.insert(root, sig, found.clone());
            }
            albums.extend(found);
        }

        tracing::info!("Indexed {} candidate album folders ({})", albums.len(), tier);
        Ok(CandidateIndex::new(tier, albums))
    }

    /// Walk one root. Unreadable folders are logged and skipped.
    pub fn scan_root(&self, root: &Path) -> Result<Vec<CandidateAlbum>, LibraryError> {
        Self::check_root(root)?;
        let mut progress = WalkProgress::new(root);

        let mut pending: Vec<PendingAlbum> = Vec::new();
        let mut slots: FxHashMap<PathBuf, usize> = FxHashMap::default();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| self.should_descend(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }

            let (audio, cues) = match list_media_files(entry.path()) {
                Ok(files) => files,
                Err(e) => {
                    tracing::warn!("Skipping folder {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            if audio.is_empty() && cues.is_empty() {
                continue;
            }

            // Disc folders two or more levels below the root fold into their parent album.
            let album_root = match entry.path().parent() {
                Some(parent) if entry.depth() >= 2 && is_disc_folder(&entry.file_name().to_string_lossy()) => {
                    parent.to_path_buf()
                }
                _ => entry.path().to_path_buf(),
            };

            let slot = *slots.entry(album_root.clone()).or_insert_with(|| {
                pending.push(PendingAlbum::new(&album_root));
                pending.len() - 1
            });
            pending[slot].audio.extend(audio);
            pending[slot].cues.extend(cues);
            progress.set_folders(pending.len());
        }

        progress.finish();
        Ok(pending.into_iter().map(PendingAlbum::finish).collect())
    }

    /// Collect every track below `folder` (recursively) as one album record.
    /// Used for exception overrides, which may point at multi-disc parents.
    pub fn collect_folder(&self, folder: &Path) -> CandidateAlbum {
        let mut album = PendingAlbum::new(folder);
        let walker = WalkDir::new(folder)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| self.should_descend(e));

        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    let path = entry.into_path();
                    if is_cue_file(&path) {
                        album.cues.push(path);
                    } else if is_audio_file(&path) {
                        album.audio.push(path);
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Skipping unreadable entry: {}", e),
            }
        }
        album.finish()
    }
}

/// Audio and cue files directly inside `dir`, sorted by name.
fn list_media_files(dir: &Path) -> std::io::Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .collect();
    files.sort();

    let (cues, rest): (Vec<PathBuf>, Vec<PathBuf>) = files.into_iter().partition(|p| is_cue_file(p));
    let audio = rest.into_iter().filter(|p| is_audio_file(p)).collect();
    Ok((audio, cues))
}

// ============================================================================
// TESTS
// ============================================================================
