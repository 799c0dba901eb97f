//! End-to-end transaction tests: locking, commit, abort and scans through a
//! shared buffer pool.

use heapdb::{
    BufferPool, BufferPoolConfig, Error, Field, HeapFile, LockManager, LockMode, PageId, TableId,
    TransactionId, Tuple, TupleDesc, Type,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

fn int_desc(fields: usize) -> Arc<TupleDesc> {
    Arc::new(TupleDesc::new(&vec![Type::Int; fields]))
}

fn setup(
    desc: Arc<TupleDesc>,
    capacity: usize,
    page_size: usize,
) -> (Arc<BufferPool>, Arc<HeapFile>, TempDir) {
    let dir = tempdir().unwrap();
    let file = Arc::new(
        HeapFile::open_with(dir.path().join("table.dat"), desc, TableId(1), page_size).unwrap(),
    );
    let config = BufferPoolConfig::new(capacity)
        .with_page_size(page_size)
        .with_lock_timeout(Some(Duration::from_millis(30)));
    let pool = Arc::new(BufferPool::new(config, Arc::new(LockManager::new())));
    pool.register_file(file.clone()).unwrap();
    (pool, file, dir)
}

fn int_tuple(desc: &Arc<TupleDesc>, values: &[i32]) -> Tuple {
    Tuple::new(desc.clone(), values.iter().map(|&v| Field::Int(v)).collect()).unwrap()
}

fn first_int(t: &Tuple) -> i32 {
    match t.field(0) {
        Some(Field::Int(v)) => *v,
        other => panic!("expected int, got {:?}", other),
    }
}

// ============================================================================
// Scans
// ============================================================================

/// With 5-byte pages every page holds exactly one Int tuple, so N inserts
/// produce N pages and a scan returns the tuples in page order.
#[test]
fn test_one_tuple_pages_scan_in_order() {
    let desc = int_desc(1);
    let (pool, file, _dir) = setup(desc.clone(), 8, 5);
    let tid = TransactionId::new();

    for v in 0..6 {
        pool.insert_tuple(tid, file.id(), &mut int_tuple(&desc, &[v * 10]))
            .unwrap();
    }
    pool.transaction_complete(tid, true).unwrap();

    assert_eq!(file.num_pages().unwrap(), 6);

    let tid = TransactionId::new();
    let scanned: Vec<Tuple> = file.iter(&pool, tid).map(|t| t.unwrap()).collect();
    let values: Vec<i32> = scanned.iter().map(first_int).collect();
    assert_eq!(values, vec![0, 10, 20, 30, 40, 50]);

    for (page_no, t) in scanned.iter().enumerate() {
        let rid = t.record_id().unwrap();
        assert_eq!(rid.page_id, PageId::new(TableId(1), page_no as u32));
        assert_eq!(rid.slot, 0);
    }
}

/// A scan through a pool smaller than the table evicts as it goes.
#[test]
fn test_scan_larger_than_pool() {
    let desc = int_desc(1);
    let (pool, file, _dir) = setup(desc.clone(), 2, 5);

    for v in 0..8 {
        let tid = TransactionId::new();
        pool.insert_tuple(tid, file.id(), &mut int_tuple(&desc, &[v]))
            .unwrap();
        pool.transaction_complete(tid, true).unwrap();
    }

    let tid = TransactionId::new();
    let values: Vec<i32> = file
        .iter(&pool, tid)
        .map(|t| first_int(&t.unwrap()))
        .collect();
    assert_eq!(values, (0..8).collect::<Vec<_>>());
    assert!(pool.page_count() <= 2);
}

// ============================================================================
// Locking
// ============================================================================

/// Two readers share a page; an upgrade waits for the other reader to leave.
#[test]
fn test_shared_then_upgrade() {
    let desc = int_desc(2);
    let (pool, file, _dir) = setup(desc.clone(), 4, 4096);
    let setup_tid = TransactionId::new();
    pool.insert_tuple(setup_tid, file.id(), &mut int_tuple(&desc, &[1, 2]))
        .unwrap();
    pool.transaction_complete(setup_tid, true).unwrap();

    let p0 = PageId::new(TableId(1), 0);
    let (t1, t2) = (TransactionId::new(), TransactionId::new());

    drop(pool.fetch_page_read(t1, p0).unwrap());
    drop(pool.fetch_page_read(t2, p0).unwrap());
    assert!(pool.holds_lock(t1, p0));
    assert!(pool.holds_lock(t2, p0));

    assert!(matches!(
        pool.fetch_page_write(t1, p0),
        Err(Error::LockTimeout { tid, .. }) if tid == t1
    ));

    pool.release_lock(t2, p0);
    assert!(pool.fetch_page_write(t1, p0).is_ok());
    assert_eq!(
        pool.lock_manager().lock_mode(t1, p0),
        Some(LockMode::Exclusive)
    );
}

/// Writers block readers until they complete.
#[test]
fn test_exclusive_blocks_readers_until_commit() {
    let desc = int_desc(1);
    let (pool, file, _dir) = setup(desc.clone(), 4, 4096);
    let (t1, t2) = (TransactionId::new(), TransactionId::new());

    pool.insert_tuple(t1, file.id(), &mut int_tuple(&desc, &[5]))
        .unwrap();

    let p0 = PageId::new(TableId(1), 0);
    assert!(matches!(
        pool.fetch_page_read(t2, p0),
        Err(Error::LockTimeout { .. })
    ));

    pool.transaction_complete(t1, true).unwrap();

    let page = pool.fetch_page_read(t2, p0).unwrap();
    assert_eq!(page.iter().count(), 1);
}

// ============================================================================
// Commit and abort
// ============================================================================

/// An aborted update is rolled back to the last committed value.
#[test]
fn test_abort_restores_committed_value() {
    let desc = int_desc(2);
    let (pool, file, _dir) = setup(desc.clone(), 4, 4096);

    let t1 = TransactionId::new();
    let mut t = int_tuple(&desc, &[1, 10]);
    pool.insert_tuple(t1, file.id(), &mut t).unwrap();
    pool.transaction_complete(t1, true).unwrap();

    let t2 = TransactionId::new();
    t.set_field(1, Field::Int(99)).unwrap();
    pool.update_tuple(t2, &t).unwrap();
    {
        let seen: Vec<Tuple> = file.iter(&pool, t2).map(|r| r.unwrap()).collect();
        assert_eq!(seen[0].field(1), Some(&Field::Int(99)));
    }
    pool.transaction_complete(t2, false).unwrap();

    let t3 = TransactionId::new();
    let seen: Vec<Tuple> = file.iter(&pool, t3).map(|r| r.unwrap()).collect();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].field(1), Some(&Field::Int(10)));
}

/// Aborting the insert that created a page leaves that page empty.
#[test]
fn test_abort_of_new_page_insert() {
    let desc = int_desc(1);
    let (pool, file, _dir) = setup(desc.clone(), 4, 4096);

    let tid = TransactionId::new();
    pool.insert_tuple(tid, file.id(), &mut int_tuple(&desc, &[1]))
        .unwrap();
    pool.transaction_complete(tid, false).unwrap();

    assert_eq!(file.num_pages().unwrap(), 1);
    let tid = TransactionId::new();
    assert_eq!(file.iter(&pool, tid).count(), 0);
}

/// Deleting the same tuple twice is rejected the second time.
#[test]
fn test_double_delete() {
    let desc = int_desc(1);
    let (pool, file, _dir) = setup(desc.clone(), 4, 4096);
    let tid = TransactionId::new();

    let mut t = int_tuple(&desc, &[7]);
    pool.insert_tuple(tid, file.id(), &mut t).unwrap();
    let mut copy = t.clone();

    pool.delete_tuple(tid, &mut t).unwrap();
    assert!(t.record_id().is_none());

    assert!(matches!(
        pool.delete_tuple(tid, &mut copy),
        Err(Error::InvalidRecord(_))
    ));
    assert!(matches!(
        pool.delete_tuple(tid, &mut t),
        Err(Error::InvalidRecord(_))
    ));
}

/// Insert into a table the pool does not know.
#[test]
fn test_insert_unknown_table() {
    let desc = int_desc(1);
    let (pool, _file, _dir) = setup(desc.clone(), 4, 4096);

    assert!(matches!(
        pool.insert_tuple(TransactionId::new(), TableId(77), &mut int_tuple(&desc, &[1])),
        Err(Error::UnknownTable(TableId(77)))
    ));
}

// ============================================================================
// Eviction order
// ============================================================================

/// Capacity 2: touching p0, p1, p0 then p2 evicts p1, and reading p1 again
/// goes back to disk.
#[test]
fn test_lru_eviction_reloads_from_disk() {
    let desc = int_desc(1);
    let (pool, file, _dir) = setup(desc.clone(), 2, 5);
    for v in 0..3 {
        let tid = TransactionId::new();
        pool.insert_tuple(tid, file.id(), &mut int_tuple(&desc, &[v]))
            .unwrap();
        pool.transaction_complete(tid, true).unwrap();
    }
    for page_no in 0..3 {
        pool.discard_page(PageId::new(TableId(1), page_no)).unwrap();
    }
    pool.stats().reset();

    let tid = TransactionId::new();
    let pid = |n| PageId::new(TableId(1), n);
    for n in [0, 1, 0, 2] {
        drop(pool.fetch_page_read(tid, pid(n)).unwrap());
    }
    assert!(pool.is_resident(pid(0)));
    assert!(!pool.is_resident(pid(1)));
    assert_eq!(pool.stats().snapshot().pages_read, 3);

    let page = pool.fetch_page_read(tid, pid(1)).unwrap();
    assert_eq!(first_int(page.iter().next().unwrap()), 1);
    assert_eq!(pool.stats().snapshot().pages_read, 4);
}

/// Capacity 2: reading p0, p1 then p2 evicts p0, the least recently used.
#[test]
fn test_lru_evicts_oldest_of_three() {
    let desc = int_desc(1);
    let (pool, file, _dir) = setup(desc.clone(), 2, 5);
    for v in 0..3 {
        let tid = TransactionId::new();
        pool.insert_tuple(tid, file.id(), &mut int_tuple(&desc, &[v]))
            .unwrap();
        pool.transaction_complete(tid, true).unwrap();
    }
    for page_no in 0..3 {
        pool.discard_page(PageId::new(TableId(1), page_no)).unwrap();
    }
    pool.stats().reset();

    let tid = TransactionId::new();
    let pid = |n| PageId::new(TableId(1), n);
    for n in [0, 1, 2] {
        drop(pool.fetch_page_read(tid, pid(n)).unwrap());
    }
    assert!(!pool.is_resident(pid(0)));
    assert!(pool.is_resident(pid(1)));
    assert!(pool.is_resident(pid(2)));
    assert_eq!(pool.stats().snapshot().evictions, 1);
    assert_eq!(pool.stats().snapshot().pages_read, 3);

    let page = pool.fetch_page_read(tid, pid(0)).unwrap();
    assert_eq!(first_int(page.iter().next().unwrap()), 0);
    assert_eq!(pool.stats().snapshot().pages_read, 4);
    assert!(!pool.is_resident(pid(1)));
}
