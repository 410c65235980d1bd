//! End-to-end read, edit and flush scenarios over memory media.

use mediumstore_core::{
    Medium, MediumAccess, MediumConfig, MediumOffset, Store, StoreError,
};

fn open_store(content: &[u8], config: MediumConfig) -> (Medium, Store) {
    let medium = Medium::memory(content.to_vec(), MediumAccess::ReadWrite, config).unwrap();
    let mut store = Store::new(medium.clone());
    store.open().unwrap();
    (medium, store)
}

fn thirty_bytes() -> Vec<u8> {
    (b'A'..=b'Z').chain(b'0'..=b'3').collect()
}

#[test]
fn empty_medium_read_hits_end() {
    let (_, mut store) = open_store(b"", MediumConfig::default());
    let at = store.create_medium_offset(0).unwrap();

    let err = store.get_data(at, 1).unwrap_err();
    let eom = err.as_end_of_medium().unwrap();
    assert_eq!(eom.offset, store.resolve_offset(at).unwrap());
    assert_eq!(eom.requested, 1);
    assert_eq!(eom.read, 0);
    assert!(store.is_at_end_of_medium(at).unwrap());
}

#[test]
fn chunked_read_caches_everything() {
    let config = MediumConfig::new().max_read_write_block_size(4);
    let (_, mut store) = open_store(b"HELLOWORLD", config);
    let at = store.create_medium_offset(0).unwrap();

    assert_eq!(store.get_data(at, 10).unwrap().as_ref(), b"HELLOWORLD");

    let stats = store.stats();
    assert_eq!(stats.reads, 3);
    assert_eq!(stats.bytes_read, 10);
    assert_eq!(store.get_cached_byte_count_at(at).unwrap(), 10);
    let sizes: Vec<u64> = store.cached_regions().iter().map(|r| r.size()).collect();
    assert_eq!(sizes, vec![4, 4, 2]);
}

#[test]
fn insert_and_remove_then_flush() {
    let original = thirty_bytes();
    let (medium, mut store) = open_store(&original, MediumConfig::default());

    let five = store.create_medium_offset(5).unwrap();
    let twenty = store.create_medium_offset(20).unwrap();
    let tail = store.create_medium_offset(25).unwrap();
    let head = store.create_medium_offset(2).unwrap();
    let plain_tail = MediumOffset::new(medium.id(), 25);
    let tracked_tail = store.track_offset(plain_tail).unwrap();

    let insert = store.insert_data(five, b"XYZ".to_vec()).unwrap();
    let remove = store.remove_data(twenty, 3).unwrap();
    assert!(insert.is_pending());
    assert!(remove.is_pending());
    store.flush().unwrap();

    let mut expected = original[..5].to_vec();
    expected.extend_from_slice(b"XYZ");
    expected.extend_from_slice(&original[5..20]);
    expected.extend_from_slice(&original[23..]);

    let start = store.create_medium_offset(0).unwrap();
    assert_eq!(store.get_data(start, 30).unwrap().as_ref(), expected.as_slice());
    assert_eq!(medium.content().unwrap(), expected);
    assert!(!insert.is_pending());
    assert!(!remove.is_pending());

    // +3 for the insert, -3 for the removal
    assert_eq!(store.resolve_offset(tail).unwrap().position(), 25);
    assert_eq!(store.resolve_offset(tracked_tail).unwrap().position(), 25);
    assert_eq!(store.resolve_offset(head).unwrap().position(), 2);
    assert_eq!(store.get_data(tail, 1).unwrap().as_ref(), &original[25..26]);
    assert_eq!(store.get_data(head, 1).unwrap().as_ref(), &original[2..3]);
    // the insert point itself moves behind the inserted bytes
    assert_eq!(store.resolve_offset(five).unwrap().position(), 8);
}

#[test]
fn insert_moves_created_offsets() {
    let original = thirty_bytes();
    let (_, mut store) = open_store(&original, MediumConfig::default());

    let tail = store.create_medium_offset(25).unwrap();
    let plain = MediumOffset::new(store.medium().id(), 25);
    store
        .insert_data(store.create_medium_offset(5).unwrap(), b"XYZ".to_vec())
        .unwrap();
    store.flush().unwrap();

    assert_eq!(store.resolve_offset(tail).unwrap().position(), 28);
    assert_eq!(store.get_data(tail, 1).unwrap().as_ref(), &original[25..26]);
    // a plain value keeps its number and now names another byte
    assert_eq!(store.get_data(plain, 1).unwrap().as_ref(), &original[22..23]);
}

#[test]
fn undone_insert_leaves_content_unchanged() {
    let original = thirty_bytes();
    let (medium, mut store) = open_store(&original, MediumConfig::default());

    let ten = store.create_medium_offset(10).unwrap();
    let insert = store.insert_data(ten, b"AB".to_vec()).unwrap();
    store.undo(&insert).unwrap();
    assert!(!insert.is_pending());
    store.flush().unwrap();

    assert_eq!(medium.content().unwrap(), original);
    assert!(matches!(
        store.undo(&insert),
        Err(StoreError::ActionNotPending { .. })
    ));
}

#[test]
fn second_flush_does_no_io() {
    let (_, mut store) = open_store(&thirty_bytes(), MediumConfig::default());
    let at = store.create_medium_offset(3).unwrap();
    store.replace_data(at, 4, b"----".to_vec()).unwrap();

    store.flush().unwrap();
    let after_first = store.stats();
    store.flush().unwrap();
    assert_eq!(store.stats(), after_first);
}

#[test]
fn flushed_action_cannot_be_undone() {
    let (_, mut store) = open_store(&thirty_bytes(), MediumConfig::default());
    let action = store
        .remove_data(store.create_medium_offset(0).unwrap(), 1)
        .unwrap();
    store.flush().unwrap();

    assert!(matches!(
        store.undo(&action),
        Err(StoreError::ActionNotPending { .. })
    ));
}

#[test]
fn flush_in_small_blocks() {
    let original = thirty_bytes();
    let config = MediumConfig::new().max_read_write_block_size(3);
    let (medium, mut store) = open_store(&original, config);

    store
        .insert_data(store.create_medium_offset(0).unwrap(), b"<<".to_vec())
        .unwrap();
    store
        .remove_data(store.create_medium_offset(10).unwrap(), 10)
        .unwrap();
    store
        .replace_data(store.create_medium_offset(28).unwrap(), 2, b"!!!!!!!".to_vec())
        .unwrap();
    store.flush().unwrap();

    let mut expected = b"<<".to_vec();
    expected.extend_from_slice(&original[..10]);
    expected.extend_from_slice(&original[20..28]);
    expected.extend_from_slice(b"!!!!!!!");
    assert_eq!(medium.content().unwrap(), expected);

    let stats = store.stats();
    assert!(stats.writes > 0);
    assert!(stats.bytes_written >= 9);
}

#[test]
fn cache_warms_without_returning_data() {
    let config = MediumConfig::new().max_cache_size(8).max_cache_region_size(4);
    let (_, mut store) = open_store(&thirty_bytes(), config);

    let at = store.create_medium_offset(0).unwrap();
    store.cache(at, 20).unwrap();

    // only the trailing eight bytes fit
    let kept = store.create_medium_offset(12).unwrap();
    assert_eq!(store.get_cached_byte_count_at(kept).unwrap(), 8);
    assert_eq!(store.get_cached_byte_count_at(at).unwrap(), 0);
}

#[test]
fn partial_read_keeps_collected_bytes() {
    let config = MediumConfig::new().max_read_write_block_size(4);
    let (_, mut store) = open_store(b"0123456789", config);

    store.cache(store.create_medium_offset(0).unwrap(), 4).unwrap();
    let at = store.create_medium_offset(2).unwrap();
    let err = store.get_data(at, 20).unwrap_err();

    let eom = err.as_end_of_medium().unwrap();
    assert_eq!(eom.offset, store.resolve_offset(at).unwrap());
    assert_eq!(eom.requested, 20);
    assert_eq!(eom.read, 8);
    assert_eq!(eom.bytes.as_ref(), b"23456789");
    assert_eq!(store.get_cached_byte_count_at(at).unwrap(), 8);
}

#[test]
fn offsets_of_other_media_rejected() {
    let (_, mut store) = open_store(b"abc", MediumConfig::default());
    let other = Medium::memory(vec![0; 3], MediumAccess::ReadWrite, MediumConfig::default())
        .unwrap();
    let foreign = MediumOffset::new(other.id(), 0);

    assert!(matches!(
        store.insert_data(foreign, b"x".to_vec()),
        Err(StoreError::InvalidArgument { .. })
    ));
    assert!(store.is_at_end_of_medium(foreign).is_err());
}
