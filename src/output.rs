//! Playlist and log file writers.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::models::TargetEntry;
use crate::resolve::{DuplicateRoot, Resolution};

fn create(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create folder {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn write_lines<I, S>(path: &Path, header: Option<&str>, lines: I) -> Result<usize>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = create(path)?;
    if let Some(header) = header {
        writeln!(out, "{}", header)?;
    }
    let mut count = 0;
    for line in lines {
        writeln!(out, "{}", line.as_ref())?;
        count += 1;
    }
    out.flush().with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(count)
}

/// M3U8 playlist: `#EXTM3U` header then one path per line.
pub fn write_m3u8(path: &Path, tracks: &[PathBuf]) -> Result<()> {
    let count = write_lines(path, Some("#EXTM3U"), tracks.iter().map(|t| t.to_string_lossy()))?;
    tracing::info!("Wrote playlist: {} ({} lines)", path.display(), count);
    Ok(())
}

/// `Artist - Album (Year)` per unmatched entry.
pub fn write_not_found(path: &Path, entries: &[TargetEntry]) -> Result<()> {
    let count = write_lines(path, None, entries.iter().map(|e| e.to_string()))?;
    tracing::info!("Wrote not-found log: {} ({} entries)", path.display(), count);
    Ok(())
}

/// `Artist - Album (Year)<TAB><folder>` per resolved entry, with the album as
/// the library names it.
pub fn write_found(path: &Path, resolved: &[Resolution]) -> Result<()> {
    let lines = resolved
        .iter()
        .map(|r| format!("{}\t{}", r.label(), r.root.display()));
    let count = write_lines(path, None, lines)?;
    tracing::info!("Wrote found log: {} ({} entries)", path.display(), count);
    Ok(())
}

/// `<folder><TAB><count>` per folder that won more than once.
pub fn write_duplicates(path: &Path, duplicates: &[DuplicateRoot]) -> Result<()> {
    let lines = duplicates
        .iter()
        .map(|d| format!("{}\t{}", d.root.display(), d.count));
    let count = write_lines(path, None, lines)?;
    tracing::info!("Wrote duplicates: {} ({} folders)", path.display(), count);
    Ok(())
}

/// The parsed entry list, one `Artist - Album (Year)` per line.
pub fn write_entry_list(path: &Path, entries: &[TargetEntry]) -> Result<()> {
    let count = write_lines(path, None, entries.iter().map(|e| e.to_string()))?;
    tracing::info!("Wrote entries list: {} ({} lines)", path.display(), count);
    Ok(())
}

/// Remove a previous run's file; missing files are fine.
pub fn remove_stale(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!("Removed stale {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::debug!("Cleanup warning for {}: {}", path.display(), e),
    }
}
