//! File-based backing store.

use crate::error::StorageResult;
use crate::store::BackingStore;
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A file-based backing store.
///
/// # Durability
///
/// - `write_at()` hands data to the OS
/// - `sync()` calls `File::sync_all()` to ensure data is on disk
///
/// Temporary stores created with [`FileStore::temporary_in`] are unlinked
/// files: they have no path and vanish when the store is dropped.
///
/// # Example
///
/// ```no_run
/// use mpool_storage::{BackingStore, FileStore};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("pages.db")).unwrap();
/// store.write_at(4096, &[0u8; 4096]).unwrap();
/// store.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: Option<PathBuf>,
    file: RwLock<File>,
    size: RwLock<u64>,
}

impl FileStore {
    /// Opens or creates a file store at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        Self::from_file(file, Some(path.to_path_buf()))
    }

    /// Opens or creates a file store, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or file cannot be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Creates an anonymous temporary store inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be created.
    pub fn temporary_in(dir: &Path) -> StorageResult<Self> {
        let file = tempfile::tempfile_in(dir)?;
        Self::from_file(file, None)
    }

    /// Creates an anonymous temporary store in the OS temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be created.
    pub fn temporary() -> StorageResult<Self> {
        let file = tempfile::tempfile()?;
        Self::from_file(file, None)
    }

    fn from_file(file: File, path: Option<PathBuf>) -> StorageResult<Self> {
        let size = file.metadata()?.len();
        Ok(Self {
            path,
            file: RwLock::new(file),
            size: RwLock::new(size),
        })
    }

    /// Returns the path to the underlying file, `None` for temporary stores.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl BackingStore for FileStore {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> StorageResult<usize> {
        let size = *self.size.read();
        if offset >= size || buf.is_empty() {
            return Ok(0);
        }

        let available = usize::try_from(size - offset).unwrap_or(usize::MAX);
        let n = buf.len().min(available);

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf[..n])?;

        Ok(n)
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> StorageResult<usize> {
        if data.is_empty() {
            return Ok(0);
        }

        let mut file = self.file.write();
        let mut size = self.size.write();

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        *size = (*size).max(offset + data.len() as u64);

        Ok(data.len())
    }

    fn sync(&self) -> StorageResult<()> {
        let file = self.file.write();
        file.sync_all()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(*self.size.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_create_new() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pages.db");

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.size().unwrap(), 0);
        assert!(path.exists());
        assert_eq!(store.path(), Some(path.as_path()));
    }

    #[test]
    fn file_write_and_read() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(&dir.path().join("pages.db")).unwrap();

        assert_eq!(store.write_at(0, b"hello").unwrap(), 5);
        assert_eq!(store.write_at(5, b" world").unwrap(), 6);
        assert_eq!(store.size().unwrap(), 11);

        let mut buf = [0u8; 11];
        assert_eq!(store.read_at(0, &mut buf).unwrap(), 11);
        assert_eq!(&buf, b"hello world");
    }

    #[test]
    fn file_write_with_gap() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(&dir.path().join("pages.db")).unwrap();

        store.write_at(8192, &[7u8; 16]).unwrap();
        assert_eq!(store.size().unwrap(), 8192 + 16);

        let mut buf = [1u8; 4];
        assert_eq!(store.read_at(0, &mut buf).unwrap(), 4);
        assert_eq!(buf, [0u8; 4]);
    }

    #[test]
    fn file_read_past_end_is_short() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(&dir.path().join("pages.db")).unwrap();
        store.write_at(0, b"hello").unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(store.read_at(3, &mut buf).unwrap(), 2);
        assert_eq!(store.read_at(10, &mut buf).unwrap(), 0);
    }

    #[test]
    fn file_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pages.db");

        {
            let store = FileStore::open(&path).unwrap();
            store.write_at(0, b"persistent data").unwrap();
            store.sync().unwrap();
        }

        {
            let store = FileStore::open(&path).unwrap();
            assert_eq!(store.size().unwrap(), 15);

            let mut buf = [0u8; 15];
            store.read_at(0, &mut buf).unwrap();
            assert_eq!(&buf, b"persistent data");
        }
    }

    #[test]
    fn file_create_with_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("path").join("pages.db");

        let store = FileStore::open_with_create_dirs(&path).unwrap();
        assert_eq!(store.size().unwrap(), 0);
        assert!(path.exists());
    }

    #[test]
    fn temporary_store_has_no_path() {
        let dir = tempdir().unwrap();
        let store = FileStore::temporary_in(dir.path()).unwrap();
        assert!(store.path().is_none());

        store.write_at(0, b"scratch").unwrap();
        store.sync().unwrap();
        assert_eq!(store.size().unwrap(), 7);
    }
}
