//! Target list and exceptions parsing.
//!
//! Lines look like `Artist - Album (Year)`. The last `" - "` separates artist
//! from album so hyphenated artists survive ("Jean Cohen - Solal - Captain
//! Tarthopom (1973)"). Text lists make the year optional; forum HTML requires it.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use scraper::{Html, Selector};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::TargetEntry;
use crate::normalize::{entry_key, normalize, normalize_artist, resolve_self_titled, ENUMERATION_PREFIX};
use crate::scoring::token_set_ratio;

// ============================================================================
// Line Parsing
// ============================================================================

/// Trailing `(YYYY)` on an entry line.
pub static TRAILING_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((\d{4})\)\s*$").unwrap());

/// Forum noise: quote headers, reply metadata, bare links.
pub static NOISE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(On\s+\w+\s+\d{1,2},\s+\d{4}|Quote|Originally\s+posted|http|https|www\.)").unwrap()
});

/// Separator between the entry and the folder in the exceptions file.
pub static EXCEPTION_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\t|\s{2,}").unwrap());

/// Forum post containers, tried in order.
const POST_SELECTORS: &[&str] = &[
    "div[id^=post_body_]",
    "td[class*=postdiv], td[class*=msgBody]",
    "div[class*=post], div[class*=msgBody]",
];

/// Lines shorter than this in forum HTML are never entries.
const MIN_HTML_LINE: usize = 6;

/// Near-duplicate threshold for albums of the same artist.
pub const NEAR_DUPLICATE_SCORE: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("no ' - ' separator")]
    MissingSeparator,
    #[error("no trailing (year)")]
    MissingYear,
    #[error("empty artist or album")]
    EmptyField,
}

/// An input line that looked like an entry but could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedLine {
    pub line_no: usize,
    pub text: String,
    pub reason: RejectReason,
}

/// Parsed unique entries plus everything that was skipped.
#[derive(Debug, Clone, Default)]
pub struct ParsedList {
    pub entries: Vec<TargetEntry>,
    pub rejected: Vec<RejectedLine>,
    /// Exact duplicates dropped by normalized key
    pub duplicates: usize,
}

/// Peel a trailing `(YYYY)` off a line.
fn split_year(line: &str) -> (&str, Option<i32>) {
    match TRAILING_YEAR.captures(line) {
        Some(caps) => {
            let year = caps[1].parse().ok();
            let start = caps.get(0).map_or(line.len(), |m| m.start());
            (line[..start].trim_end(), year)
        }
        None => (line, None),
    }
}

/// Split `Artist - Album` on the last separator and resolve "s/t".
fn split_entry(line: &str, year: Option<i32>) -> Result<TargetEntry, RejectReason> {
    let (artist, album) = line.rsplit_once(" - ").ok_or(RejectReason::MissingSeparator)?;
    let artist = artist.trim();
    let album = resolve_self_titled(album.trim(), artist);
    if artist.is_empty() || album.trim().is_empty() {
        return Err(RejectReason::EmptyField);
    }
    Ok(TargetEntry::new(artist, album, year))
}

/// Parse one list line. Numbering like "1) " or "12. " is dropped.
pub fn parse_line(line: &str) -> Result<TargetEntry, RejectReason> {
    let line = ENUMERATION_PREFIX.replace(line.trim(), "");
    let (body, year) = split_year(&line);
    split_entry(body, year)
}

/// Keep the first entry per normalized (artist, album) key.
fn dedupe_exact(entries: Vec<TargetEntry>) -> (Vec<TargetEntry>, usize) {
    let mut seen = FxHashSet::default();
    let before = entries.len();
    let unique: Vec<TargetEntry> = entries
        .into_iter()
        .filter(|e| seen.insert(entry_key(&e.artist, &e.album)))
        .collect();
    let dropped = before - unique.len();
    (unique, dropped)
}

/// Parse a plain-text list. Blank lines and `#` comments are ignored.
pub fn parse_text_list(text: &str) -> ParsedList {
    let mut entries = Vec::new();
    let mut rejected = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_line(line) {
            Ok(entry) => entries.push(entry),
            Err(reason) => rejected.push(RejectedLine {
                line_no: idx + 1,
                text: line.to_string(),
                reason,
            }),
        }
    }

    let (entries, duplicates) = dedupe_exact(entries);
    ParsedList {
        entries,
        rejected,
        duplicates,
    }
}

fn is_noise(line: &str) -> bool {
    let line = line.trim();
    line.chars().count() < MIN_HTML_LINE || NOISE_LINE.is_match(line)
}

/// Text of the forum posts in a saved page, or the whole page when no post
/// container is found.
fn html_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut chunks: Vec<String> = Vec::new();
    for sel in POST_SELECTORS {
        if let Ok(selector) = Selector::parse(sel) {
            for el in document.select(&selector) {
                chunks.push(el.text().collect::<Vec<_>>().join("\n"));
            }
        }
    }
    if chunks.is_empty() {
        chunks.push(document.root_element().text().collect::<Vec<_>>().join("\n"));
    }
    chunks.join("\n")
}

/// Parse forum HTML. Only lines ending in `(YYYY)` are considered entries.
pub fn parse_html_list(html: &str) -> ParsedList {
    let text = html_text(html);
    let mut entries = Vec::new();
    let mut rejected = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        if is_noise(raw) {
            continue;
        }
        let line = raw.trim();
        let (body, year) = split_year(line);
        let parsed = match year {
            Some(_) => split_entry(body, year),
            None if body.contains(" - ") => Err(RejectReason::MissingYear),
            None => continue,
        };
        match parsed {
            Ok(entry) => entries.push(entry),
            Err(reason) => rejected.push(RejectedLine {
                line_no: idx + 1,
                text: line.to_string(),
                reason,
            }),
        }
    }

    let (entries, duplicates) = dedupe_exact(entries);
    ParsedList {
        entries,
        rejected,
        duplicates,
    }
}

// ============================================================================
// Entry Post-processing
// ============================================================================

/// Drop later albums of the same artist that score `token_set ≥ 90` against a
/// kept one ("Strangewings" vs "Strange Wings"). A dropped entry's year fills
/// a missing year on the kept entry. Output is grouped by artist in first-seen
/// order.
pub fn merge_near_duplicates(entries: Vec<TargetEntry>) -> Vec<TargetEntry> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: FxHashMap<String, Vec<(TargetEntry, String)>> = FxHashMap::default();

    for entry in entries {
        let artist_key = normalize_artist(&entry.artist).as_string();
        let album_key = normalize(&entry.album).as_string();
        let kept = groups.entry(artist_key.clone()).or_insert_with(|| {
            order.push(artist_key);
            Vec::new()
        });

        match kept
            .iter_mut()
            .find(|(_, k)| token_set_ratio(&album_key, k) >= NEAR_DUPLICATE_SCORE)
        {
            Some((existing, _)) => {
                tracing::debug!("Merged near-duplicate entry {} into {}", entry, existing);
                if existing.year.is_none() {
                    existing.year = entry.year;
                }
            }
            None => kept.push((entry, album_key)),
        }
    }

    order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .flat_map(|group| group.into_iter().map(|(entry, _)| entry))
        .collect()
}

/// Sort by normalized (artist, album).
pub fn sort_entries(entries: &mut [TargetEntry]) {
    entries.sort_by_cached_key(|e| entry_key(&e.artist, &e.album));
}

// ============================================================================
// Exceptions
// ============================================================================

/// A manual `entry → folder` override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exception {
    pub artist: String,
    pub album: String,
    pub year: Option<i32>,
    pub folder: PathBuf,
}

/// Overrides keyed by normalized (artist, album).
#[derive(Debug, Clone, Default)]
pub struct ExceptionTable {
    entries: FxHashMap<(String, String), Exception>,
}

impl ExceptionTable {
    pub fn insert(&mut self, exception: Exception) {
        let key = entry_key(&exception.artist, &exception.album);
        self.entries.insert(key, exception);
    }

    /// Override for `target`. When both sides carry a year they must agree.
    pub fn lookup(&self, target: &TargetEntry) -> Option<&Exception> {
        self.entries
            .get(&entry_key(&target.artist, &target.album))
            .filter(|ex| match (ex.year, target.year) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse `Artist - Album (Year)<TAB or 2+ spaces><folder>` lines.
pub fn parse_exceptions(text: &str) -> ExceptionTable {
    let mut table = ExceptionTable::default();
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(sep) = EXCEPTION_SEPARATOR.find(line) else {
            tracing::warn!("Ignoring exceptions line without folder: {}", line);
            continue;
        };
        let (left, folder) = (line[..sep.start()].trim(), line[sep.end()..].trim());
        if folder.is_empty() {
            continue;
        }
        match parse_line(left) {
            Ok(entry) => table.insert(Exception {
                artist: entry.artist,
                album: entry.album,
                year: entry.year,
                folder: PathBuf::from(folder),
            }),
            Err(reason) => tracing::warn!("Ignoring exceptions line ({}): {}", reason, line),
        }
    }
    table
}

/// Load the exceptions file. A missing file is an empty table.
pub fn load_exceptions(path: &Path) -> Result<ExceptionTable> {
    if !path.exists() {
        return Ok(ExceptionTable::default());
    }
    let raw = fs::read(path).with_context(|| format!("Failed to read exceptions {}", path.display()))?;
    let table = parse_exceptions(&String::from_utf8_lossy(&raw));
    tracing::info!("Loaded exceptions: {} entries from {}", table.len(), path.display());
    Ok(table)
}

/// Read a list or HTML file, tolerating invalid UTF-8.
pub fn read_lossy(path: &Path) -> Result<String> {
    let raw = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_line_variants() {
        assert_eq!(
            parse_line("1) The Enid - s/t (1976)").unwrap(),
            TargetEntry::new("The Enid", "The Enid", Some(1976))
        );
        assert_eq!(
            parse_line("Jean Cohen - Solal - Captain Tarthopom (1973)").unwrap(),
            TargetEntry::new("Jean Cohen - Solal", "Captain Tarthopom", Some(1973))
        );
        assert_eq!(parse_line("Arkus - 1914").unwrap(), TargetEntry::new("Arkus", "1914", None));
        assert_eq!(parse_line("Just a title (1970)").unwrap_err(), RejectReason::MissingSeparator);
        assert_eq!(split_entry(" - Album", None).unwrap_err(), RejectReason::EmptyField);
    }

    #[test]
    fn test_parse_text_list_dedupes_and_reports() {
        let text = "# my list\n\
                    1) Camel - Mirage (1974)\n\
                    2. CAMEL - mirage (1974)\n\
                    \n\
                    not an entry\n\
                    Caravan - In the Land of Grey and Pink (1971)\n";
        let parsed = parse_text_list(text);
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.duplicates, 1);
        assert_eq!(parsed.rejected.len(), 1);
        assert_eq!(parsed.rejected[0].line_no, 5);
        assert_eq!(parsed.rejected[0].reason, RejectReason::MissingSeparator);
    }

    #[test]
    fn test_parse_html_list() {
        let html = r#"<html><body>
            <div id="post_body_1">
              Quote from someone
              <br>Gracious! - Gracious! (1970)
              <br>Spring - Spring (1971)
              <br>no year here - nope
              <br>http://example.com/x (1999)
            </div>
            <div class="sidebar">Ignored - Sidebar (1980)</div>
        </body></html>"#;
        let parsed = parse_html_list(html);
        let names: Vec<String> = parsed.entries.iter().map(|e| e.to_string()).collect();
        assert_eq!(names, vec!["Gracious! - Gracious! (1970)", "Spring - Spring (1971)"]);
        assert_eq!(parsed.rejected.len(), 1);
        assert_eq!(parsed.rejected[0].reason, RejectReason::MissingYear);
    }

    #[test]
    fn test_parse_html_without_posts_uses_page_text() {
        let html = "<html><body><p>Fantasy - Paint a Picture (1973)</p></body></html>";
        let parsed = parse_html_list(html);
        assert_eq!(parsed.entries, vec![TargetEntry::new("Fantasy", "Paint a Picture", Some(1973))]);
    }

    #[test]
    fn test_merge_near_duplicates_fills_year() {
        let entries = vec![
            TargetEntry::new("Strangewings", "Strange Wings", None),
            TargetEntry::new("Camel", "Mirage", Some(1974)),
            TargetEntry::new("Strangewings", "Strangewings", Some(1979)),
        ];
        let merged = merge_near_duplicates(entries);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], TargetEntry::new("Strangewings", "Strange Wings", Some(1979)));
        assert_eq!(merged[1].artist, "Camel");
    }

    #[test]
    fn test_sort_entries() {
        let mut entries = vec![
            TargetEntry::new("Yes", "Fragile", None),
            TargetEntry::new("The Enid", "Aerie Faerie Nonsense", None),
            TargetEntry::new("Camel", "Mirage", None),
        ];
        sort_entries(&mut entries);
        let artists: Vec<&str> = entries.iter().map(|e| e.artist.as_str()).collect();
        assert_eq!(artists, vec!["Camel", "The Enid", "Yes"]);
    }

    #[test]
    fn test_parse_exceptions() {
        let text = "# overrides\n\
                    The Enid - s/t (1976)\t/music/Enid/[1976] In the Region\n\
                    Ποα - Ποα (Poa)  /music/Poa/Poa\n\
                    broken line\n";
        let table = parse_exceptions(text);
        assert_eq!(table.len(), 2);
        let hit = table.lookup(&TargetEntry::new("Enid", "Enid", Some(1976))).unwrap();
        assert_eq!(hit.folder, PathBuf::from("/music/Enid/[1976] In the Region"));
        assert!(table.lookup(&TargetEntry::new("The Enid", "The Enid", Some(1980))).is_none());
        assert!(table.lookup(&TargetEntry::new("The Enid", "The Enid", None)).is_some());
    }

    #[test]
    fn test_load_exceptions_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let table = load_exceptions(&dir.path().join("nope-exceptions.txt")).unwrap();
        assert!(table.is_empty());
    }
}
