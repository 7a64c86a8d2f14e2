use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tempfile::NamedTempFile;

use super::{BlobStore, CacheError, Result};

/// Filesystem-backed blob store rooted at a directory.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl BlobStore for FsBlobStore {
    fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let target = self.root.join(path);
        let dir = target.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;

        // Atomic write: temp file in the same directory, then rename.
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(data)?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let target = self.root.join(path);
        fs::read(&target).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CacheError::NotFound(target)
            } else {
                CacheError::Io(e)
            }
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.root.join(path).exists()
    }

    fn locate(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    fn check_writable(&self) -> Result<()> {
        NamedTempFile::new_in(&self.root)?;
        Ok(())
    }
}

/// In-memory blob store with a write counter.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<PathBuf, Vec<u8>>>,
    writes: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `write` calls observed so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Stored paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let blobs = self.blobs.lock().unwrap_or_else(|e| e.into_inner());
        let mut paths: Vec<PathBuf> = blobs.keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl BlobStore for MemoryBlobStore {
    fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut blobs = self.blobs.lock().unwrap_or_else(|e| e.into_inner());
        blobs.insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let blobs = self.blobs.lock().unwrap_or_else(|e| e.into_inner());
        blobs
            .get(path)
            .cloned()
            .ok_or_else(|| CacheError::NotFound(path.to_path_buf()))
    }

    fn exists(&self, path: &Path) -> bool {
        let blobs = self.blobs.lock().unwrap_or_else(|e| e.into_inner());
        blobs.contains_key(path)
    }

    fn locate(&self, path: &Path) -> PathBuf {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> (tempfile::TempDir, FsBlobStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn blob_roundtrip_creates_parents() {
        let (dir, store) = make_store();
        let rel = Path::new("owner/repo/contracts/A.sol");
        store.write(rel, b"contract A {}").unwrap();
        assert_eq!(store.read(rel).unwrap(), b"contract A {}");
        assert!(dir.path().join(rel).is_file());
        assert_eq!(store.locate(rel), dir.path().join(rel));
    }

    #[test]
    fn overwrite_replaces_content() {
        let (_dir, store) = make_store();
        let rel = Path::new("a.json");
        store.write(rel, b"one").unwrap();
        store.write(rel, b"two").unwrap();
        assert_eq!(store.read(rel).unwrap(), b"two");
    }

    #[test]
    fn read_missing_returns_not_found() {
        let (_dir, store) = make_store();
        match store.read(Path::new("nope.sol")) {
            Err(CacheError::NotFound(p)) => assert!(p.ends_with("nope.sol")),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn empty_blob() {
        let (_dir, store) = make_store();
        store.write(Path::new("empty"), b"").unwrap();
        assert!(store.exists(Path::new("empty")));
        assert_eq!(store.read(Path::new("empty")).unwrap(), b"");
    }

    #[test]
    fn writable_probe_succeeds_on_tempdir() {
        let (_dir, store) = make_store();
        store.check_writable().unwrap();
    }

    #[test]
    fn memory_store_counts_writes() {
        let store = MemoryBlobStore::new();
        store.write(Path::new("x"), b"1").unwrap();
        store.write(Path::new("x"), b"2").unwrap();
        assert_eq!(store.write_count(), 2);
        assert_eq!(store.read(Path::new("x")).unwrap(), b"2");
        assert_eq!(store.paths(), vec![PathBuf::from("x")]);
    }
}
