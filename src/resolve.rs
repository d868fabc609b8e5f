//! Resolution pipeline: exceptions, primary library, then secondary library.
//!
//! Every target ends up either resolved to one album folder or unmatched.
//! Roots that win for more than one target are reported as duplicates but
//! never blocked.

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::ScanCache;
use crate::config::RunConfig;
use crate::error::LibraryError;
use crate::index::{CandidateIndex, LibraryScanner};
use crate::input::ExceptionTable;
use crate::matcher::Matcher;
use crate::models::{LibraryTier, MatchPath, TargetEntry};
use crate::normalize::normalize;
use crate::progress::ResolveProgress;
use crate::selector::select;
use crate::tracks;

static SPACED_HYPHEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*-\s*").unwrap());

/// Where a winning folder came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    Exception,
    Primary,
    Secondary,
}

impl From<LibraryTier> for MatchSource {
    fn from(tier: LibraryTier) -> Self {
        match tier {
            LibraryTier::Primary => MatchSource::Primary,
            LibraryTier::Secondary => MatchSource::Secondary,
        }
    }
}

impl fmt::Display for MatchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchSource::Exception => f.write_str("exceptions"),
            MatchSource::Primary => f.write_str("primary"),
            MatchSource::Secondary => f.write_str("secondary"),
        }
    }
}

/// One target resolved to a folder.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Position in the entry list (0-based)
    pub position: usize,
    pub target: TargetEntry,
    pub root: PathBuf,
    /// Album as the library names it (the target's album for exceptions)
    pub album_title: String,
    pub source: MatchSource,
    /// Ranking score; `None` for exception overrides
    pub score: Option<f64>,
    pub via: Option<MatchPath>,
    pub tracks: Vec<PathBuf>,
}

/// A folder that won for several targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateRoot {
    pub root: PathBuf,
    pub count: usize,
}

/// Outcome of a whole run, in entry order.
#[derive(Debug, Clone, Default)]
pub struct ResolveReport {
    pub resolved: Vec<Resolution>,
    pub not_found: Vec<TargetEntry>,
    pub duplicates: Vec<DuplicateRoot>,
}

impl Resolution {
    /// Found-log label: target artist, library album title, target year.
    pub fn label(&self) -> String {
        TargetEntry::new(self.target.artist.clone(), self.album_title.clone(), self.target.year).to_string()
    }
}

impl ResolveReport {
    /// Merged playlist tracks, de-duplicated, in entry order.
    pub fn tracks(&self) -> Vec<PathBuf> {
        tracks::unique_paths(self.resolved.iter().flat_map(|r| r.tracks.iter().cloned()))
    }

    pub fn matched(&self) -> usize {
        self.resolved.len()
    }
}

// ============================================================================
// Exception Folders
// ============================================================================

/// Locate an exception folder, tolerating dash/space drift in its last segment.
///
/// Tries the path as given, then dash variants ("A – B", "A-B", "A - B"),
/// then a sibling whose normalized name matches.
pub fn locate_exception_folder(path: &Path) -> Option<PathBuf> {
    if path.is_dir() {
        return Some(path.to_path_buf());
    }
    let name = path.file_name()?.to_string_lossy().into_owned();
    let parent = path.parent()?;

    let variants = [
        name.replace(" – ", " - "),
        name.replace('—', "-").replace(" – ", " - "),
        SPACED_HYPHEN.replace_all(&name, "-").into_owned(),
        name.replace('-', " - "),
    ];
    if let Some(found) = variants.iter().map(|v| parent.join(v)).find(|p| p.is_dir()) {
        return Some(found);
    }

    let wanted = normalize(&name);
    fs::read_dir(parent)
        .ok()?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .find(|e| normalize(&e.file_name().to_string_lossy()) == wanted)
        .map(|e| e.path())
}

// ============================================================================
// Resolver
// ============================================================================

pub struct Resolver {
    config: RunConfig,
    scanner: LibraryScanner,
    matcher: Matcher,
    exceptions: ExceptionTable,
}

impl Resolver {
    pub fn new(config: RunConfig, exceptions: ExceptionTable) -> Self {
        let scanner = LibraryScanner::new(config.exclude_markers.clone());
        let matcher = Matcher::new(config.matching);
        Self {
            config,
            scanner,
            matcher,
            exceptions,
        }
    }

    /// Fail fast on unusable library roots, before any matching.
    pub fn check_roots(&self) -> Result<(), LibraryError> {
        LibraryScanner::check_root(&self.config.primary)?;
        if let Some(secondary) = &self.config.secondary {
            LibraryScanner::check_root(secondary)?;
        }
        Ok(())
    }

    pub fn resolve(&self, entries: &[TargetEntry], cache: &mut ScanCache) -> Result<ResolveReport, LibraryError> {
        self.check_roots()?;

        let primary = self
            .scanner
            .scan(std::slice::from_ref(&self.config.primary), LibraryTier::Primary, cache)?;

        let mut progress = ResolveProgress::new(entries.len());
        let mut resolved = Vec::new();
        let mut remaining = Vec::new();
        for (position, entry) in entries.iter().enumerate() {
            let resolution = self
                .resolve_exception(position, entry)
                .or_else(|| self.resolve_in(position, entry, &primary));
            progress.record(entry, resolution.is_some());
            match resolution {
                Some(resolution) => resolved.push(resolution),
                None => remaining.push(position),
            }
        }
        progress.finish();

        if let (Some(secondary_root), false) = (&self.config.secondary, remaining.is_empty()) {
            tracing::info!("{} entries unmatched in primary, trying secondary", remaining.len());
            let secondary = self
                .scanner
                .scan(std::slice::from_ref(secondary_root), LibraryTier::Secondary, cache)?;
            remaining.retain(|&position| match self.resolve_in(position, &entries[position], &secondary) {
                Some(resolution) => {
                    resolved.push(resolution);
                    false
                }
                None => true,
            });
        }

        let not_found: Vec<TargetEntry> = remaining
            .iter()
            .map(|&position| {
                let entry = &entries[position];
                tracing::warn!("No match: {}. {} - {} ({})", position + 1, entry.artist, entry.album, entry.year_label());
                entry.clone()
            })
            .collect();

        resolved.sort_by_key(|r| r.position);
        let duplicates = count_duplicates(&resolved);
        for dup in &duplicates {
            tracing::warn!("Folder matched {} times: {}", dup.count, dup.root.display());
        }

        Ok(ResolveReport {
            resolved,
            not_found,
            duplicates,
        })
    }

    fn resolve_exception(&self, position: usize, entry: &TargetEntry) -> Option<Resolution> {
        let exception = self.exceptions.lookup(entry)?;
        let Some(folder) = locate_exception_folder(&exception.folder) else {
            tracing::warn!(
                "Exceptions path not found: {} (for {} - {} ({}))",
                exception.folder.display(),
                entry.artist,
                entry.album,
                entry.year_label()
            );
            return None;
        };

        let album = self.scanner.collect_folder(&folder);
        let tracks = tracks::collect(&album, self.config.sort_tracks);
        tracing::info!(
            "Match (exceptions): {}. {} - {} ({}) -> {} ({} files)",
            position + 1,
            entry.artist,
            entry.album,
            entry.year_label(),
            folder.display(),
            tracks.len()
        );
        Some(Resolution {
            position,
            target: entry.clone(),
            root: folder,
            album_title: entry.album.clone(),
            source: MatchSource::Exception,
            score: None,
            via: None,
            tracks,
        })
    }

    fn resolve_in(&self, position: usize, entry: &TargetEntry, index: &CandidateIndex) -> Option<Resolution> {
        let results = self.matcher.match_target(entry, index);
        let winner = select(results, self.config.matching.cutoff())?;
        let source = MatchSource::from(index.tier);
        tracing::info!(
            "Match ({}): {}. {} - {} ({}) -> {} (score {:.0}, {})",
            source,
            position + 1,
            entry.artist,
            entry.album,
            entry.year_label(),
            winner.candidate.root.display(),
            winner.score,
            winner.via
        );
        Some(Resolution {
            position,
            target: entry.clone(),
            root: winner.candidate.root.clone(),
            album_title: winner.candidate.album_raw.clone(),
            source,
            score: Some(winner.score),
            via: Some(winner.via),
            tracks: tracks::collect(winner.candidate, self.config.sort_tracks),
        })
    }
}

/// Roots won more than once, in first-win order.
fn count_duplicates(resolved: &[Resolution]) -> Vec<DuplicateRoot> {
    let mut order: Vec<PathBuf> = Vec::new();
    let mut counts: FxHashMap<PathBuf, usize> = FxHashMap::default();
    for r in resolved {
        let key = tracks::resolved(&r.root);
        let count = counts.entry(key.clone()).or_insert(0);
        if *count == 0 {
            order.push(key);
        }
        *count += 1;
    }
    order
        .into_iter()
        .filter_map(|root| {
            let count = counts.get(&root).copied().unwrap_or(0);
            (count > 1).then_some(DuplicateRoot { root, count })
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
