// ABOUTME: Multi-handle tests for the flat-file store: many writers on one file never collide.
// ABOUTME: Each thread opens its own handle, standing in for independently launched processes.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Barrier};
use std::thread;

use intray_core::{Filter, NewNotification};
use intray_store::{Store, StoreOptions, TsvStore};
use tempfile::TempDir;

const WRITERS: usize = 8;
const ADDS_PER_WRITER: usize = 10;

fn store_path(dir: &TempDir) -> PathBuf {
    dir.path().join("state").join("notifications.tsv")
}

#[test]
fn concurrent_adds_get_unique_ids() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    let barrier = Arc::new(Barrier::new(WRITERS));

    let handles: Vec<_> = (0..WRITERS)
        .map(|w| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let store = TsvStore::open(&path, StoreOptions::default()).unwrap();
                barrier.wait();
                (0..ADDS_PER_WRITER)
                    .map(|i| store.add(NewNotification::new(format!("w{w} n{i}"))).unwrap())
                    .collect::<Vec<u64>>()
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(ids.insert(id), "id {id} allocated twice");
        }
    }
    assert_eq!(ids.len(), WRITERS * ADDS_PER_WRITER);

    let store = TsvStore::open(&path, StoreOptions::default()).unwrap();
    let all = store.list(&Filter::new()).unwrap();
    assert_eq!(all.len(), WRITERS * ADDS_PER_WRITER);
    assert_eq!(
        ids,
        (1..=(WRITERS * ADDS_PER_WRITER) as u64).collect::<HashSet<_>>()
    );
}

#[test]
fn readers_see_complete_snapshots_during_writes() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    let writer = TsvStore::open(&path, StoreOptions::default()).unwrap();
    writer.add(NewNotification::new("seed")).unwrap();

    let reader_path = path.clone();
    let reader = thread::spawn(move || {
        let store = TsvStore::open(&reader_path, StoreOptions::default()).unwrap();
        let mut last = 0;
        for _ in 0..50 {
            let n = store.list(&Filter::new()).unwrap().len();
            assert!(n >= last, "snapshot went backwards: {n} < {last}");
            last = n;
        }
    });

    for i in 0..30 {
        writer.add(NewNotification::new(format!("msg {i}"))).unwrap();
    }
    reader.join().unwrap();
    assert_eq!(writer.active_count().unwrap(), 31);
}

#[test]
fn mixed_mutations_from_many_handles_stay_consistent() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    let setup = TsvStore::open(&path, StoreOptions::default()).unwrap();
    for i in 0..20 {
        setup.add(NewNotification::new(format!("n{i}"))).unwrap();
    }

    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let path = path.clone();
            thread::spawn(move || {
                let store = TsvStore::open(&path, StoreOptions::default()).unwrap();
                for id in (1..=20).filter(|id| id % 4 == t) {
                    store.mark_read(id).unwrap();
                    store.dismiss(id).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let all = setup.list_all().unwrap();
    assert_eq!(all.len(), 20);
    assert!(all.iter().all(|n| !n.is_active() && n.is_read()));
}
