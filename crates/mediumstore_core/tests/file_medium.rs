//! Stores over files: locking, write-back and cleanup.

use mediumstore_core::{Medium, MediumAccess, MediumConfig, Store, StoreError};
use std::path::Path;
use tempfile::tempdir;

fn file_store(path: &Path, access: MediumAccess, config: MediumConfig) -> Store {
    Store::new(Medium::file(path, access, config).unwrap())
}

#[test]
fn second_writer_is_locked_out() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("locked.bin");
    std::fs::write(&path, b"content").unwrap();

    let mut first = file_store(&path, MediumAccess::ReadWrite, MediumConfig::default());
    first.open().unwrap();

    let mut second = file_store(&path, MediumAccess::ReadWrite, MediumConfig::default());
    assert!(matches!(
        second.open(),
        Err(StoreError::MediumAccess { .. })
    ));
    assert!(!second.is_opened());

    first.close().unwrap();
    second.open().unwrap();
}

#[test]
fn dropping_store_releases_lock() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dropped.bin");
    std::fs::write(&path, b"content").unwrap();

    {
        let mut store = file_store(&path, MediumAccess::ReadWrite, MediumConfig::default());
        store.open().unwrap();
    }

    let mut again = file_store(&path, MediumAccess::ReadWrite, MediumConfig::default());
    again.open().unwrap();
}

#[test]
fn missing_file_cannot_open() {
    let dir = tempdir().unwrap();
    let mut store = file_store(
        &dir.path().join("missing.bin"),
        MediumAccess::ReadOnly,
        MediumConfig::default(),
    );
    assert!(matches!(
        store.open(),
        Err(StoreError::MediumAccess { .. })
    ));
}

#[test]
fn flush_rewrites_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("edit.bin");
    let original: Vec<u8> = (0u8..100).collect();
    std::fs::write(&path, &original).unwrap();

    let config = MediumConfig::new().max_read_write_block_size(16);
    let mut store = file_store(&path, MediumAccess::ReadWrite, config);
    store.open().unwrap();

    let head = store.create_medium_offset(0).unwrap();
    store.cache(head, 100).unwrap();
    store
        .replace_data(store.create_medium_offset(10).unwrap(), 5, vec![0xAA; 2])
        .unwrap();
    store
        .remove_data(store.create_medium_offset(50).unwrap(), 30)
        .unwrap();
    store
        .insert_data(store.create_medium_offset(100).unwrap(), vec![0xBB; 3])
        .unwrap();
    store.flush().unwrap();

    let mut expected = original[..10].to_vec();
    expected.extend_from_slice(&[0xAA; 2]);
    expected.extend_from_slice(&original[15..50]);
    expected.extend_from_slice(&original[80..]);
    expected.extend_from_slice(&[0xBB; 3]);

    assert_eq!(store.get_data(head, expected.len()).unwrap().as_ref(), expected.as_slice());
    store.close().unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), expected);
}

#[test]
fn read_only_file_store() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ro.bin");
    std::fs::write(&path, b"read only").unwrap();

    let mut reader = file_store(&path, MediumAccess::ReadOnly, MediumConfig::default());
    reader.open().unwrap();
    let at = reader.create_medium_offset(5).unwrap();

    assert_eq!(reader.get_data(at, 4).unwrap().as_ref(), b"only");
    assert!(matches!(
        reader.remove_data(at, 1),
        Err(StoreError::ReadOnly { .. })
    ));
    assert!(reader.is_at_end_of_medium(reader.create_medium_offset(9).unwrap()).unwrap());
}
