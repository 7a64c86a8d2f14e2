//! Deduplicating store of downloaded Solidity sources.
//!
//! Entries are keyed by [`RepoIdentity`]. Writes for the same identity are
//! serialized through a per-key lock; writes for distinct identities only
//! contend on the index update. The index is persisted next to the blobs so
//! the cache survives across runs, and an entry becomes visible only after
//! the index holding it is on disk.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use tracing::{debug, warn};

use super::{BlobStore, CacheError, Digest, Result, SolidityCacheEntry};
use crate::domain::RepoIdentity;

const INDEX_FILE: &str = "index.json";

pub struct SolidityCache {
    store: Arc<dyn BlobStore>,
    entries: RwLock<BTreeMap<RepoIdentity, SolidityCacheEntry>>,
    key_locks: Mutex<HashMap<RepoIdentity, Arc<Mutex<()>>>>,
    index_lock: Mutex<()>,
}

/// Result of writing one blob, before the index is updated.
enum Staged {
    Unchanged(PathBuf),
    Written(SolidityCacheEntry),
}

impl SolidityCache {
    /// Open the cache over `store`, loading a previously persisted index.
    pub fn open(store: Arc<dyn BlobStore>) -> Result<Self> {
        store.check_writable()?;

        let index_path = Path::new(INDEX_FILE);
        let entries = if store.exists(index_path) {
            let raw = store.read(index_path)?;
            let list: Vec<SolidityCacheEntry> = serde_json::from_slice(&raw)?;
            list.into_iter()
                .map(|e| (e.repo_identity.clone(), e))
                .collect()
        } else {
            BTreeMap::new()
        };
        debug!(entries = entries.len(), "solidity cache opened");

        Ok(Self {
            store,
            entries: RwLock::new(entries),
            key_locks: Mutex::new(HashMap::new()),
            index_lock: Mutex::new(()),
        })
    }

    /// Store `data` under `id` and return where it lives.
    ///
    /// Unchanged content for a known identity is a no-op returning the
    /// existing path. Changed content overwrites in place.
    pub fn put(&self, id: &RepoIdentity, data: &[u8]) -> Result<PathBuf> {
        let key_lock = self.key_lock(id);
        let _guard = key_lock.lock().unwrap_or_else(|e| e.into_inner());

        match self.stage(id, data, self.get(id))? {
            Staged::Unchanged(path) => Ok(path),
            Staged::Written(entry) => {
                let path = entry.local_path.clone();
                self.commit(vec![entry])?;
                Ok(path)
            }
        }
    }

    /// Store a batch with a single index write. Paths follow `items`.
    ///
    /// When an identity repeats inside the batch its last payload wins.
    pub fn put_many(&self, items: &[(RepoIdentity, Vec<u8>)]) -> Result<Vec<PathBuf>> {
        let mut ids: Vec<&RepoIdentity> = items.iter().map(|(id, _)| id).collect();
        ids.sort();
        ids.dedup();
        // Sorted acquisition keeps overlapping batches from deadlocking.
        let locks: Vec<Arc<Mutex<()>>> = ids.iter().map(|id| self.key_lock(id)).collect();
        let _guards: Vec<_> = locks
            .iter()
            .map(|l| l.lock().unwrap_or_else(|e| e.into_inner()))
            .collect();

        let mut paths = Vec::with_capacity(items.len());
        let mut written: BTreeMap<RepoIdentity, SolidityCacheEntry> = BTreeMap::new();
        for (id, data) in items {
            let current = written.get(id).cloned().or_else(|| self.get(id));
            match self.stage(id, data, current)? {
                Staged::Unchanged(path) => paths.push(path),
                Staged::Written(entry) => {
                    paths.push(entry.local_path.clone());
                    written.insert(id.clone(), entry);
                }
            }
        }
        self.commit(written.into_values().collect())?;
        Ok(paths)
    }

    pub fn get(&self, id: &RepoIdentity) -> Option<SolidityCacheEntry> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    /// All entries, ordered by identity.
    pub fn list(&self) -> Vec<SolidityCacheEntry> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the cached bytes for `entry`.
    pub fn read(&self, entry: &SolidityCacheEntry) -> Result<Vec<u8>> {
        self.store.read(&blob_path(&entry.repo_identity))
    }

    /// Read a cached source as text, replacing invalid UTF-8.
    pub fn read_text(&self, entry: &SolidityCacheEntry) -> Result<String> {
        let bytes = self.read(entry)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn key_lock(&self, id: &RepoIdentity) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(id.clone()).or_default())
    }

    /// Write the blob for `id` unless `current` already holds `data`.
    /// Caller holds the key lock.
    fn stage(&self, id: &RepoIdentity, data: &[u8], current: Option<SolidityCacheEntry>) -> Result<Staged> {
        let hash = Digest::compute(data);
        if let Some(existing) = current {
            if existing.content_hash == hash {
                debug!(identity = %id, "cache hit, content unchanged");
                return Ok(Staged::Unchanged(existing.local_path));
            }
        }

        let rel = blob_path(id);
        self.store.write(&rel, data)?;
        debug!(identity = %id, hash = %hash, "cached solidity source");
        Ok(Staged::Written(SolidityCacheEntry {
            repo_identity: id.clone(),
            local_path: self.store.locate(&rel),
            content_hash: hash,
            size_bytes: data.len() as u64,
            updated_at: Utc::now(),
        }))
    }

    /// Persist the index with `staged` applied, then publish it in memory.
    ///
    /// On failure the staged identities are dropped from memory: their blobs
    /// may already hold the new bytes, so the next put must rewrite them.
    fn commit(&self, staged: Vec<SolidityCacheEntry>) -> Result<()> {
        if staged.is_empty() {
            return Ok(());
        }
        let _guard = self.index_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut next = self.entries.read().unwrap_or_else(|e| e.into_inner()).clone();
        for entry in &staged {
            next.insert(entry.repo_identity.clone(), entry.clone());
        }
        let persisted = serde_json::to_vec_pretty(&next.values().collect::<Vec<_>>())
            .map_err(CacheError::Index)
            .and_then(|raw| self.store.write(Path::new(INDEX_FILE), &raw));

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        match persisted {
            Ok(()) => {
                *entries = next;
                Ok(())
            }
            Err(err) => {
                warn!(files = staged.len(), error = %err, "cache index not persisted");
                for entry in &staged {
                    entries.remove(&entry.repo_identity);
                }
                Err(err)
            }
        }
    }
}

/// Relative blob path for an identity:
/// `<repository>/<identity digest>/<file name>`.
///
/// Readable parts are reduced to safe file names; the digest of the full
/// identity string keeps distinct identities apart.
fn blob_path(id: &RepoIdentity) -> PathBuf {
    let key = Digest::compute(format!("{}\0{}", id.repository(), id.path()).as_bytes()).to_hex();
    let mut path: PathBuf = id
        .repository()
        .split('/')
        .filter(|seg| !seg.is_empty())
        .map(sanitize_segment)
        .collect();
    path.push(key);
    path.push(sanitize_segment(id.file_name()));
    path
}

fn sanitize_segment(segment: &str) -> String {
    if segment.is_empty() || segment == "." || segment == ".." {
        return "_".repeat(segment.len().max(1));
    }
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(120)
        .collect()
}
