//! Recovery tests
//!
//! A store rebuilt from the journal must match the store that wrote it:
//! same objects, same states, and new ids above every replayed id.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use journalstore::codec::RecordCodec;
use journalstore::journal::{list_segments, DurableLog, FileJournal, FrameKind, JournalFrame, MemoryJournal};
use journalstore::store::COMMITTED_STATE_RECORD;
use journalstore::{JournalConfig, RecoverableStore, StateCodec, StoreConfig, StoreError, Uid};
use tempfile::TempDir;

fn config_for(dir: &Path) -> StoreConfig {
    StoreConfig::with_store_dir(dir.join("store"))
}

fn open(config: &StoreConfig) -> RecoverableStore<FileJournal> {
    let mut store = RecoverableStore::open(config).expect("open failed");
    store.start().expect("start failed");
    store
}

fn segments(config: &StoreConfig) -> Vec<std::path::PathBuf> {
    list_segments(&config.store_dir, &config.journal.file_prefix, &config.journal.file_extension)
        .unwrap()
        .into_iter()
        .map(|(_, path)| path)
        .collect()
}

#[test]
fn test_file_journal_restart_restores_every_object() {
    let temp = TempDir::new().unwrap();
    let config = config_for(temp.path());
    let (kept, updated, removed) = (Uid::new(), Uid::new(), Uid::new());

    {
        let mut store = open(&config);
        store.write_committed(&kept, "T", b"kept").unwrap();
        store.write_committed(&updated, "T", b"v1").unwrap();
        store.write_committed(&updated, "T", b"v2").unwrap();
        store.write_committed(&removed, "U", b"gone").unwrap();
        assert!(store.remove_committed(&removed, "U").unwrap());
        store.stop().unwrap();
    }

    let mut store = RecoverableStore::open(&config).unwrap();
    let report = store.start().unwrap();
    assert_eq!(report.records_recovered, 2);
    assert_eq!(report.types, vec!["T".to_string()]);
    assert_eq!(report.max_id, 3);

    assert_eq!(store.read_committed(&kept, "T").unwrap().unwrap().state, b"kept");
    assert_eq!(store.read_committed(&updated, "T").unwrap().unwrap().state, b"v2");
    assert!(!store.contains(&removed, "U").unwrap());
    assert_eq!(store.metrics().records_recovered, 2);
}

#[test]
fn test_memory_journal_restart_restores_every_object() {
    let journal = MemoryJournal::new();
    let uid = Uid::new();
    {
        let mut store = RecoverableStore::new(journal.clone(), StateCodec, true, true);
        store.start().unwrap();
        store.write_committed(&uid, "T", &[1, 2, 3]).unwrap();
        store.write_committed(&uid, "T", &[9]).unwrap();
        store.stop().unwrap();
    }

    let mut store = RecoverableStore::new(journal.reopen(), StateCodec, true, true);
    store.start().unwrap();
    assert_eq!(store.read_committed(&uid, "T").unwrap().unwrap().state, vec![9]);
    assert_eq!(store.get_id(&uid, "T").unwrap(), 1);
}

#[test]
fn test_ids_after_recovery_exceed_replayed_ids() {
    let temp = TempDir::new().unwrap();
    let config = config_for(temp.path());
    let last = Uid::new();

    {
        let mut store = open(&config);
        store.write_committed(&Uid::new(), "T", b"a").unwrap();
        store.write_committed(&Uid::new(), "T", b"b").unwrap();
        store.write_committed(&last, "T", b"c").unwrap();
        assert!(store.remove_committed(&last, "T").unwrap());
        store.stop().unwrap();
    }

    let store = open(&config);
    assert_eq!(store.get_id(&Uid::new(), "T").unwrap(), 4);
}

#[test]
fn test_unsynced_writes_durable_after_stop() {
    let temp = TempDir::new().unwrap();
    let mut config = config_for(temp.path());
    config.sync_writes = false;
    config.sync_deletes = false;
    let uid = Uid::new();

    {
        let mut store = open(&config);
        store.write_committed(&uid, "T", b"buffered").unwrap();
        store.stop().unwrap();
    }

    let store = open(&config);
    assert_eq!(store.read_committed(&uid, "T").unwrap().unwrap().state, b"buffered");
}

#[test]
fn test_segment_rollover_preserves_replay() {
    let temp = TempDir::new().unwrap();
    let mut config = config_for(temp.path());
    config.journal = JournalConfig {
        file_size: 512,
        buffer_size: 128,
        ..JournalConfig::default()
    };
    let uids: Vec<Uid> = (0..40).map(|_| Uid::new()).collect();

    {
        let mut store = open(&config);
        for (i, uid) in uids.iter().enumerate() {
            store.write_committed(uid, "T", &[i as u8; 32]).unwrap();
        }
        store.stop().unwrap();
    }
    assert!(segments(&config).len() > 1);

    let store = open(&config);
    for (i, uid) in uids.iter().enumerate() {
        assert_eq!(store.read_committed(uid, "T").unwrap().unwrap().state, vec![i as u8; 32]);
    }
}

#[test]
fn test_torn_tail_is_discarded() {
    let temp = TempDir::new().unwrap();
    let config = config_for(temp.path());
    let (before, after) = (Uid::new(), Uid::new());

    {
        let mut store = open(&config);
        store.write_committed(&before, "T", b"intact").unwrap();
        store.stop().unwrap();
    }

    // a frame header whose length runs past the end of the file
    let last = segments(&config).pop().unwrap();
    let intact_len = fs::metadata(&last).unwrap().len();
    let mut file = OpenOptions::new().append(true).open(&last).unwrap();
    file.write_all(&[200, 0, 0, 0, 0, 1, 2]).unwrap();
    drop(file);

    {
        let mut store = open(&config);
        assert_eq!(fs::metadata(&last).unwrap().len(), intact_len);
        assert!(store.contains(&before, "T").unwrap());
        store.write_committed(&after, "T", b"later").unwrap();
        store.stop().unwrap();
    }

    let store = open(&config);
    assert_eq!(store.read_committed(&before, "T").unwrap().unwrap().state, b"intact");
    assert_eq!(store.read_committed(&after, "T").unwrap().unwrap().state, b"later");
}

/// Appends `garbage` to the last segment of a store holding one record,
/// restarts, and checks the garbage was cut off.
fn assert_tail_discarded(garbage: &[u8]) {
    let temp = TempDir::new().unwrap();
    let config = config_for(temp.path());
    let (before, after) = (Uid::new(), Uid::new());

    {
        let mut store = open(&config);
        store.write_committed(&before, "T", b"intact").unwrap();
        store.stop().unwrap();
    }

    let last = segments(&config).pop().unwrap();
    let intact_len = fs::metadata(&last).unwrap().len();
    let mut file = OpenOptions::new().append(true).open(&last).unwrap();
    file.write_all(garbage).unwrap();
    drop(file);

    {
        let mut store = open(&config);
        assert_eq!(fs::metadata(&last).unwrap().len(), intact_len);
        assert!(store.contains(&before, "T").unwrap());
        store.write_committed(&after, "T", b"later").unwrap();
        store.stop().unwrap();
    }

    let store = open(&config);
    assert_eq!(store.read_committed(&before, "T").unwrap().unwrap().state, b"intact");
    assert_eq!(store.read_committed(&after, "T").unwrap().unwrap().state, b"later");
}

#[test]
fn test_zero_filled_tail_is_discarded() {
    // file length extended, data never written
    assert_tail_discarded(&[0u8; 64]);
}

#[test]
fn test_header_without_data_is_discarded() {
    // a complete header whose data and checksum never reached the disk
    let mut frame = JournalFrame::plain(FrameKind::Add, 2, COMMITTED_STATE_RECORD, vec![7; 40])
        .serialize()
        .unwrap();
    let header = 26;
    for byte in &mut frame[header..] {
        *byte = 0;
    }
    assert_tail_discarded(&frame);
}

#[test]
fn test_checksum_corruption_fails_start() {
    let temp = TempDir::new().unwrap();
    let config = config_for(temp.path());

    {
        let mut store = open(&config);
        store.write_committed(&Uid::new(), "T", b"first record").unwrap();
        store.write_committed(&Uid::new(), "T", b"second record").unwrap();
        store.stop().unwrap();
    }

    let path = segments(&config).pop().unwrap();
    let mut bytes = fs::read(&path).unwrap();
    // inside the first frame's data section
    bytes[28] ^= 0xFF;
    fs::write(&path, bytes).unwrap();

    let mut store = RecoverableStore::open(&config).unwrap();
    let err = store.start().unwrap_err();
    assert!(matches!(err, StoreError::Corruption(_)));
    assert!(err.is_fatal());
    assert!(!store.is_running());
}

#[test]
fn test_restart_without_stop_keeps_synced_writes() {
    let temp = TempDir::new().unwrap();
    let config = config_for(temp.path());
    assert!(config.sync_writes);
    let (kept, updated, removed) = (Uid::new(), Uid::new(), Uid::new());

    {
        let mut store = open(&config);
        store.write_committed(&kept, "T", b"kept").unwrap();
        store.write_committed(&updated, "T", b"v1").unwrap();
        store.write_committed(&updated, "T", b"v2").unwrap();
        store.write_committed(&removed, "U", b"gone").unwrap();
        assert!(store.remove_committed(&removed, "U").unwrap());
        // dropped without stop
    }

    let mut store = RecoverableStore::open(&config).unwrap();
    let report = store.start().unwrap();
    assert_eq!(report.records_recovered, 2);
    assert_eq!(store.read_committed(&kept, "T").unwrap().unwrap().state, b"kept");
    assert_eq!(store.read_committed(&updated, "T").unwrap().unwrap().state, b"v2");
    assert!(!store.contains(&removed, "U").unwrap());
    assert_eq!(store.get_id(&Uid::new(), "T").unwrap(), 4);
}

#[test]
fn test_prepared_transactions_reported_not_indexed() {
    let temp = TempDir::new().unwrap();
    let config = config_for(temp.path());
    let committed = Uid::new();
    let in_doubt = Uid::new();
    let codec = StateCodec;

    {
        let mut journal = FileJournal::new(&config.store_dir, config.journal.clone());
        journal.start().unwrap();
        let payload = codec.encode(&committed, "T", b"committed").unwrap();
        journal.append_add(1, COMMITTED_STATE_RECORD, &payload, true).unwrap();

        let payload = codec.encode(&in_doubt, "T", b"in doubt").unwrap();
        journal
            .append_add_transactional(10, 2, COMMITTED_STATE_RECORD, &payload)
            .unwrap();
        journal.append_prepare(10).unwrap();

        let payload = codec.encode(&Uid::new(), "T", b"never prepared").unwrap();
        journal
            .append_add_transactional(11, 3, COMMITTED_STATE_RECORD, &payload)
            .unwrap();
        journal.stop().unwrap();
    }

    let mut store = RecoverableStore::open(&config).unwrap();
    let report = store.start().unwrap();
    assert_eq!(report.records_recovered, 1);
    assert_eq!(report.prepared_transactions, vec![10]);
    assert_eq!(report.prepared_records, 1);
    assert_eq!(report.failed_transactions, 1);
    assert_eq!(report.max_id, 11);

    assert!(store.contains(&committed, "T").unwrap());
    assert!(!store.contains(&in_doubt, "T").unwrap());
    assert!(store.get_id(&Uid::new(), "T").unwrap() > 11);
}

#[test]
fn test_store_name_uses_canonical_dir() {
    let temp = TempDir::new().unwrap();
    let config = config_for(temp.path());
    let store = open(&config);

    let canonical = fs::canonicalize(&config.store_dir).unwrap();
    assert_eq!(store.store_name(), format!("RecoverableStore:{}", canonical.display()));
}
