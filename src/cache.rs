//! JSON scan cache.
//!
//! Stores the candidate records of each library root together with a cheap
//! change signature so unchanged trees are not walked again. The cache is an
//! explicit object handed to the scanner; tests inject a fresh one.

use anyhow::{Context, Result};
use rustc_hash::{FxHashMap, FxHasher};
use serde::{Deserialize, Serialize};
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::models::CandidateAlbum;

/// Bumped whenever the cached record layout or scan rules change.
const CACHE_VERSION: u32 = 1;

// ============================================================================
// Change Signature
// ============================================================================

/// Hash of the scan settings plus the modification times of a root, its
/// artist folders and their album folders.
///
/// Adding an album touches the artist folder's mtime and adding files to an
/// album touches the album folder's mtime. Changes inside disc sub-folders
/// one level deeper are not seen; `--no-cache` forces a full walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSignature(pub u64);

impl ChangeSignature {
    /// Compute the signature, or `None` when the root metadata is unreadable.
    ///
    /// The exclusion markers are part of the key: a walk with different
    /// markers prunes a different tree.
    pub fn of(root: &Path, exclude_markers: &[String]) -> Option<Self> {
        let mut hasher = FxHasher::default();

        let mut markers: Vec<String> = exclude_markers.iter().map(|m| m.to_lowercase()).collect();
        markers.sort();
        markers.dedup();
        markers.hash(&mut hasher);

        mtime_nanos(root)?.hash(&mut hasher);
        for (name, nanos) in sub_folder_mtimes(root) {
            (&name, nanos).hash(&mut hasher);
            sub_folder_mtimes(&root.join(&name)).hash(&mut hasher);
        }

        Some(ChangeSignature(hasher.finish()))
    }
}

/// `(name, mtime)` of each immediate sub-folder, sorted by name.
fn sub_folder_mtimes(dir: &Path) -> Vec<(String, u128)> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut children: Vec<(String, u128)> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|e| {
            let nanos = mtime_nanos(&e.path())?;
            Some((e.file_name().to_string_lossy().into_owned(), nanos))
        })
        .collect();
    children.sort();
    children
}

fn mtime_nanos(path: &Path) -> Option<u128> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    Some(modified.duration_since(UNIX_EPOCH).ok()?.as_nanos())
}

// ============================================================================
// Cache Store
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    signature: ChangeSignature,
    candidates: Vec<CandidateAlbum>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    roots: Vec<(PathBuf, CacheEntry)>,
}

/// Root-keyed candidate cache, optionally backed by a JSON file.
#[derive(Debug, Default)]
pub struct ScanCache {
    path: Option<PathBuf>,
    entries: FxHashMap<PathBuf, CacheEntry>,
    dirty: bool,
}

impl ScanCache {
    /// Cache that lives only for this process.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the cache file. A missing, corrupt or outdated file yields an empty cache.
    pub fn load(path: &Path) -> Self {
        let mut cache = Self {
            path: Some(path.to_path_buf()),
            ..Self::default()
        };
        if !path.exists() {
            return cache;
        }

        let parsed = fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|raw| serde_json::from_str::<CacheFile>(&raw).map_err(anyhow::Error::from));
        match parsed {
            Ok(file) if file.version == CACHE_VERSION => {
                cache.entries = file.roots.into_iter().collect();
                tracing::debug!("Loaded scan cache {} ({} roots)", path.display(), cache.entries.len());
            }
            Ok(file) => {
                tracing::info!(
                    "Ignoring scan cache {} (version {} != {})",
                    path.display(),
                    file.version,
                    CACHE_VERSION
                );
            }
            Err(e) => {
                tracing::warn!("Failed to load cache {}: {}", path.display(), e);
            }
        }
        cache
    }

    /// Cached candidates for `root`, only if the stored signature still matches.
    pub fn get(&self, root: &Path, signature: ChangeSignature) -> Option<&[CandidateAlbum]> {
        self.entries
            .get(root)
            .filter(|entry| entry.signature == signature)
            .map(|entry| entry.candidates.as_slice())
    }

    pub fn insert(&mut self, root: &Path, signature: ChangeSignature, candidates: Vec<CandidateAlbum>) {
        self.entries.insert(
            root.to_path_buf(),
            CacheEntry {
                signature,
                candidates,
            },
        );
        self.dirty = true;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the cache back to its file if anything changed.
    pub fn save(&mut self) -> Result<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }

        let mut roots: Vec<(PathBuf, CacheEntry)> = self
            .entries
            .iter()
            .map(|(root, entry)| (root.clone(), entry.clone()))
            .collect();
        roots.sort_by(|a, b| a.0.cmp(&b.0));

        let file = CacheFile {
            version: CACHE_VERSION,
            roots,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create cache folder {}", parent.display()))?;
        }
        let json = serde_json::to_string(&file)?;
        fs::write(path, json).with_context(|| format!("Failed to write cache {}", path.display()))?;
        self.dirty = false;
        tracing::debug!("Saved scan cache {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample(root: &Path) -> CandidateAlbum {
        CandidateAlbum {
            root: root.join("Enid").join("[1976] Enid"),
            artist_raw: "Enid".to_string(),
            album_raw: "Enid".to_string(),
            years: vec![1976],
            has_cue: false,
            track_paths: vec![root.join("Enid").join("[1976] Enid").join("01.flac")],
        }
    }

    #[test]
    fn test_signature_mismatch_is_a_miss() {
        let mut cache = ScanCache::in_memory();
        let root = Path::new("/library");
        cache.insert(root, ChangeSignature(1), vec![sample(root)]);
        assert!(cache.get(root, ChangeSignature(1)).is_some());
        assert!(cache.get(root, ChangeSignature(2)).is_none());
        assert!(cache.get(Path::new("/other"), ChangeSignature(1)).is_none());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let cache_path = dir.path().join("scan-cache.json");
        let root = dir.path().join("library");

        let mut cache = ScanCache::load(&cache_path);
        assert!(cache.is_empty());
        cache.insert(&root, ChangeSignature(42), vec![sample(&root)]);
        cache.save().unwrap();

        let reloaded = ScanCache::load(&cache_path);
        assert_eq!(reloaded.len(), 1);
        let hit = reloaded.get(&root, ChangeSignature(42)).unwrap();
        assert_eq!(hit[0].years, vec![1976]);
    }

    #[test]
    fn test_corrupt_cache_is_ignored() {
        let dir = TempDir::new().unwrap();
        let cache_path = dir.path().join("scan-cache.json");
        fs::write(&cache_path, "{not json").unwrap();
        let cache = ScanCache::load(&cache_path);
        assert!(cache.is_empty());
    }

    fn markers() -> Vec<String> {
        vec!["#recycle".to_string()]
    }

    #[test]
    fn test_signature_changes_when_artist_folder_added() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("Camel")).unwrap();
        let before = ChangeSignature::of(dir.path(), &markers()).unwrap();
        fs::create_dir(dir.path().join("Caravan")).unwrap();
        let after = ChangeSignature::of(dir.path(), &markers()).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn test_signature_changes_when_album_gains_cue() {
        let dir = TempDir::new().unwrap();
        let album = dir.path().join("Camel").join("Mirage");
        fs::create_dir_all(&album).unwrap();
        fs::write(album.join("01.flac"), b"").unwrap();
        let before = ChangeSignature::of(dir.path(), &markers()).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(20));
        fs::write(album.join("Mirage.cue"), b"").unwrap();
        let after = ChangeSignature::of(dir.path(), &markers()).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn test_signature_depends_on_exclusion_markers() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("Camel")).unwrap();
        let plain = ChangeSignature::of(dir.path(), &markers()).unwrap();
        let strict = ChangeSignature::of(dir.path(), &["#recycle".to_string(), "_bootlegs".to_string()]).unwrap();
        let reordered = ChangeSignature::of(dir.path(), &["_Bootlegs".to_string(), "#recycle".to_string()]).unwrap();
        assert_ne!(plain, strict);
        assert_eq!(strict, reordered);
    }
}
