//! Test fixtures for media and stores.
//!
//! Provides memory and temporary-file media with known content, and
//! helpers for running code against an open store.

use mediumstore_core::{Medium, MediumAccess, MediumConfig, Store};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A test medium with automatic cleanup of its backing file.
pub struct TestMedium {
    /// The medium instance.
    pub medium: Medium,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestMedium {
    /// Creates a writable memory medium with default configuration.
    pub fn memory(content: Vec<u8>) -> Self {
        Self::memory_with_config(content, MediumConfig::default())
    }

    /// Creates a writable memory medium.
    pub fn memory_with_config(content: Vec<u8>, config: MediumConfig) -> Self {
        Self {
            medium: Medium::memory(content, MediumAccess::ReadWrite, config)
                .expect("Failed to create memory medium"),
            _temp_dir: None,
        }
    }

    /// Creates a writable file medium with default configuration.
    pub fn file(content: &[u8]) -> Self {
        Self::file_with_config(content, MediumAccess::ReadWrite, MediumConfig::default())
    }

    /// Creates a file medium in a temporary directory.
    pub fn file_with_config(content: &[u8], access: MediumAccess, config: MediumConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("medium.bin");
        std::fs::write(&path, content).expect("Failed to write medium file");

        Self {
            medium: Medium::file(&path, access, config).expect("Failed to create file medium"),
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the backing file path if file-based, None otherwise.
    pub fn path(&self) -> Option<PathBuf> {
        self.medium.path().map(Path::to_path_buf)
    }

    /// Returns the current content of the medium.
    pub fn content(&self) -> Vec<u8> {
        match self.medium.content() {
            Some(content) => content,
            None => std::fs::read(self.path().expect("Medium has no content source"))
                .expect("Failed to read medium file"),
        }
    }

    /// Creates and opens a store over the medium.
    pub fn open_store(&self) -> Store {
        let mut store = Store::new(self.medium.clone());
        store.open().expect("Failed to open store");
        store
    }
}

impl std::ops::Deref for TestMedium {
    type Target = Medium;

    fn deref(&self) -> &Self::Target {
        &self.medium
    }
}

/// Returns `len` bytes whose values cycle through a prime-length pattern, so
/// that shifted ranges never look identical to unshifted ones.
pub fn patterned_content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Runs a test with an open store over a memory medium.
///
/// # Example
///
/// ```rust,ignore
/// use mediumstore_testkit::with_memory_store;
///
/// #[test]
/// fn my_test() {
///     with_memory_store(b"abc".to_vec(), |store| {
///         let at = store.create_medium_offset(0).unwrap();
///         assert_eq!(store.get_data(at, 3).unwrap().as_ref(), b"abc");
///     });
/// }
/// ```
pub fn with_memory_store<F, R>(content: Vec<u8>, f: F) -> R
where
    F: FnOnce(&mut Store) -> R,
{
    let fixture = TestMedium::memory(content);
    let mut store = fixture.open_store();
    f(&mut store)
}

/// Runs a test with an open store over a temporary file.
pub fn with_file_store<F, R>(content: &[u8], f: F) -> R
where
    F: FnOnce(&mut Store, &Path) -> R,
{
    let fixture = TestMedium::file(content);
    let path = fixture.path().expect("File medium has a path");
    let mut store = fixture.open_store();
    f(&mut store, &path)
}
