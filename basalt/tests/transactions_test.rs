use basalt::buffer_pool::Permissions;
use basalt::error::DbError;
use basalt::page::{HeapPage, PageId};
use basalt::transaction::TransactionId;
use serial_test::serial;

mod common;

#[test]
#[serial]
fn commit_forces_dirty_pages_to_disk() {
    let s = common::setup(10);
    let pid = PageId::new(s.table_id, 0);
    let file = s.catalog.file(s.table_id).unwrap();

    let tid = TransactionId::new();
    s.pool
        .insert_tuple(tid, s.table_id, common::int_pair(1, 10))
        .unwrap();

    // The mutation lives only in the cache until commit.
    assert_eq!(file.read_page(pid).unwrap().iter().count(), 0);

    s.pool.transaction_complete(tid, true);

    assert_eq!(file.read_page(pid).unwrap().iter().count(), 1);
    assert!(!s.pool.holds_lock(tid, pid));

    // The cached copy came out of the flush clean.
    let reader = TransactionId::new();
    let page = s.pool.get_page(reader, pid, Permissions::ReadOnly).unwrap();
    assert!(page.read().unwrap().dirtier().is_none());
    s.pool.transaction_complete(reader, true);
}

#[test]
#[serial]
fn abort_restores_the_on_disk_image() {
    let s = common::setup(10);
    let pid = PageId::new(s.table_id, 0);
    let file = s.catalog.file(s.table_id).unwrap();

    let t0 = TransactionId::new();
    s.pool
        .insert_tuple(t0, s.table_id, common::int_pair(1, 10))
        .unwrap();
    s.pool.transaction_complete(t0, true);
    let before = file.read_page(pid).unwrap().page_data();

    let t1 = TransactionId::new();
    s.pool
        .insert_tuple(t1, s.table_id, common::int_pair(2, 20))
        .unwrap();
    s.pool.transaction_complete(t1, false);

    // Disk bytes are untouched and the rolled-back page is clean in cache.
    assert_eq!(file.read_page(pid).unwrap().page_data(), before);
    assert!(!s.pool.holds_lock(t1, pid));

    let reader = TransactionId::new();
    let page = s.pool.get_page(reader, pid, Permissions::ReadOnly).unwrap();
    assert_eq!(page.read().unwrap().iter().count(), 1);
    assert!(page.read().unwrap().dirtier().is_none());
    s.pool.transaction_complete(reader, true);
}

#[test]
#[serial]
fn eviction_refuses_when_every_page_is_dirty() {
    let s = common::setup(2);
    let file = s.catalog.file(s.table_id).unwrap();
    let schema = file.schema().clone();
    for n in 0..3 {
        file.write_page(&HeapPage::empty(PageId::new(s.table_id, n), schema.clone()))
            .unwrap();
    }

    let t1 = TransactionId::new();
    for n in 0..2 {
        let pid = PageId::new(s.table_id, n);
        let page = s.pool.get_page(t1, pid, Permissions::ReadWrite).unwrap();
        let mut guard = page.write().unwrap();
        guard.insert_tuple(common::int_pair(n as i32, 0)).unwrap();
        guard.mark_dirty(Some(t1));
    }

    let t2 = TransactionId::new();
    let third = s
        .pool
        .get_page(t2, PageId::new(s.table_id, 2), Permissions::ReadOnly);
    assert!(matches!(third, Err(DbError::Db(_))));

    // Neither dirty page was stolen.
    assert!(s.pool.contains_page(PageId::new(s.table_id, 0)));
    assert!(s.pool.contains_page(PageId::new(s.table_id, 1)));

    s.pool.transaction_complete(t2, false);
    s.pool.transaction_complete(t1, false);
}

#[test]
#[serial]
fn eviction_takes_a_clean_page_and_spares_the_dirty_one() {
    let s = common::setup(2);
    let file = s.catalog.file(s.table_id).unwrap();
    let schema = file.schema().clone();
    for n in 0..3 {
        file.write_page(&HeapPage::empty(PageId::new(s.table_id, n), schema.clone()))
            .unwrap();
    }

    let t1 = TransactionId::new();
    let dirty_pid = PageId::new(s.table_id, 0);
    let page = s
        .pool
        .get_page(t1, dirty_pid, Permissions::ReadWrite)
        .unwrap();
    page.write().unwrap().mark_dirty(Some(t1));

    let t2 = TransactionId::new();
    let clean_pid = PageId::new(s.table_id, 1);
    s.pool
        .get_page(t2, clean_pid, Permissions::ReadOnly)
        .unwrap();

    // Fetching a third page must evict the clean page, not the dirty one.
    s.pool
        .get_page(t2, PageId::new(s.table_id, 2), Permissions::ReadOnly)
        .unwrap();
    assert!(s.pool.contains_page(dirty_pid));
    assert!(!s.pool.contains_page(clean_pid));
    assert!(s.pool.contains_page(PageId::new(s.table_id, 2)));

    s.pool.transaction_complete(t1, false);
    s.pool.transaction_complete(t2, true);
}

#[test]
#[serial]
fn flush_pages_clears_stamps_without_releasing_locks() {
    let s = common::setup(10);
    let pid = PageId::new(s.table_id, 0);
    let file = s.catalog.file(s.table_id).unwrap();

    let tid = TransactionId::new();
    s.pool
        .insert_tuple(tid, s.table_id, common::int_pair(1, 10))
        .unwrap();
    s.pool.flush_pages(tid).unwrap();

    assert_eq!(file.read_page(pid).unwrap().iter().count(), 1);
    assert!(s.pool.holds_lock(tid, pid));
    let page = s.pool.get_page(tid, pid, Permissions::ReadWrite).unwrap();
    assert!(page.read().unwrap().dirtier().is_none());

    s.pool.transaction_complete(tid, true);
    assert!(!s.pool.holds_lock(tid, pid));
}

#[test]
#[serial]
fn delete_writes_through_before_commit() {
    let s = common::setup(10);
    let pid = PageId::new(s.table_id, 0);
    let file = s.catalog.file(s.table_id).unwrap();

    let t0 = TransactionId::new();
    s.pool
        .insert_tuple(t0, s.table_id, common::int_pair(1, 10))
        .unwrap();
    s.pool.transaction_complete(t0, true);

    let t1 = TransactionId::new();
    let stored = {
        let page = s.pool.get_page(t1, pid, Permissions::ReadOnly).unwrap();
        let guard = page.read().unwrap();
        let tuple = guard.iter().next().unwrap().clone();
        tuple
    };
    s.pool.delete_tuple(t1, &stored).unwrap();

    // The delete reached disk before the transaction decided anything.
    assert_eq!(file.read_page(pid).unwrap().iter().count(), 0);

    // Abort reloads the on-disk image, which already carries the delete.
    s.pool.transaction_complete(t1, false);
    let reader = TransactionId::new();
    let page = s.pool.get_page(reader, pid, Permissions::ReadOnly).unwrap();
    assert_eq!(page.read().unwrap().iter().count(), 0);
    assert!(page.read().unwrap().dirtier().is_none());
    s.pool.transaction_complete(reader, true);
}

#[test]
#[serial]
fn delete_requires_a_record_id() {
    let s = common::setup(10);
    let tid = TransactionId::new();
    let unstored = common::int_pair(1, 1);
    assert!(matches!(
        s.pool.delete_tuple(tid, &unstored),
        Err(DbError::Db(_))
    ));
    s.pool.transaction_complete(tid, false);
}

#[test]
#[serial]
fn discard_page_drops_only_the_cache_entry() {
    let s = common::setup(10);
    let pid = PageId::new(s.table_id, 0);

    let tid = TransactionId::new();
    s.pool
        .insert_tuple(tid, s.table_id, common::int_pair(1, 10))
        .unwrap();
    assert!(s.pool.contains_page(pid));

    s.pool.discard_page(pid);
    assert!(!s.pool.contains_page(pid));
    // The lock survives the discard.
    assert!(s.pool.holds_lock(tid, pid));
    s.pool.transaction_complete(tid, false);
}

#[test]
#[serial]
fn small_pages_spill_inserts_across_pages() {
    basalt::set_page_size(256);

    let s = common::setup(10);
    let file = s.catalog.file(s.table_id).unwrap();
    let slots = HeapPage::slots_per_page(file.schema());
    assert!(slots < 40);

    let tid = TransactionId::new();
    for i in 0..40 {
        s.pool
            .insert_tuple(tid, s.table_id, common::int_pair(i, i))
            .unwrap();
    }
    s.pool.transaction_complete(tid, true);
    assert_eq!(file.num_pages().unwrap(), 40_usize.div_ceil(slots));

    basalt::reset_page_size();
}
