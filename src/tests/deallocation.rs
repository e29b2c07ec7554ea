// Deallocation and stale handle rejection tests
// 释放和过期 handle 拒绝的测试

use super::payload;
use crate::HandleTable;

#[test]
fn test_basic_deallocation() {
    let mut table: HandleTable = HandleTable::new();
    let handle = table.allocate().unwrap();

    assert!(table.deallocate(handle));
    assert_eq!(table.len(), 0);
    assert!(table.is_empty());
}

#[test]
fn test_double_deallocation_fails() {
    let mut table: HandleTable = HandleTable::new();
    let handle = table.allocate().unwrap();

    assert!(table.deallocate(handle));
    assert!(!table.deallocate(handle));
    assert_eq!(table.len(), 0);
}

#[test]
fn test_use_after_free_rejected() {
    let mut table: HandleTable = HandleTable::new();
    let handle = table.allocate().unwrap();
    table.set(handle, payload(1));

    table.deallocate(handle);

    assert_eq!(table.get(handle), None);
    assert!(!table.set(handle, payload(2)));
    assert!(!table.deallocate(handle));
    assert!(!table.contains(handle));
}

#[test]
fn test_stale_handle_rejected_after_slot_reuse() {
    let mut table: HandleTable = HandleTable::new();
    let old = table.allocate().unwrap();
    table.deallocate(old);

    let new = table.allocate().unwrap();
    table.set(new, payload(77));
    assert_eq!(old.decode().0, new.decode().0);

    // The old handle must not reach the new occupant
    // 旧 handle 不能访问新的占用者
    assert_eq!(table.get(old), None);
    assert!(!table.set(old, payload(1)));
    assert!(!table.deallocate(old));
    assert_eq!(table.get(new), Some(payload(77)));
    assert_eq!(table.len(), 1);
}

#[test]
fn test_free_list_tail_cannot_be_freed_twice() {
    let mut table: HandleTable<u8, 2> = HandleTable::new();
    let handles: Vec<_> = (0..4).map(|_| table.allocate().unwrap()).collect();

    // Free list is empty, so the freed slot becomes both head and tail
    // 空闲列表为空，因此释放的 slot 同时是头和尾
    assert!(table.deallocate(handles[0]));

    // A handle carrying the slot's new generation must still be rejected
    // 携带 slot 新代数的 handle 也必须被拒绝
    let (index, generation) = handles[0].decode();
    let forged = crate::Handle::encode(index, generation.wrapping_add(1));
    assert!(!table.deallocate(forged));
    assert_eq!(table.get(forged), None);
    assert_eq!(table.len(), 3);

    // Free list stays intact: one reuse, then a new page
    // 空闲列表保持完整：复用一次，然后分配新页
    assert_eq!(table.allocate().unwrap(), forged);
    assert_eq!(table.allocate().unwrap().decode().0, 4);
}

#[test]
fn test_remove_returns_payload() {
    let mut table: HandleTable = HandleTable::new();
    let handle = table.allocate().unwrap();
    table.set(handle, payload(42));

    assert_eq!(table.remove(handle), Some(payload(42)));
    assert_eq!(table.remove(handle), None);
    assert!(table.is_empty());
}

#[test]
fn test_remove_recycles_slot() {
    let mut table: HandleTable = HandleTable::new();
    let keep = table.allocate().unwrap();
    let handle = table.allocate().unwrap();
    table.set(handle, payload(5));

    assert_eq!(table.remove(handle), Some(payload(5)));
    assert_eq!(table.len(), 1);
    assert!(!table.deallocate(handle));

    // The removed slot is the free-list head, with the next generation
    // 被移除的 slot 成为空闲列表头，代数加一
    let (index, generation) = handle.decode();
    let reused = table.allocate().unwrap();
    assert_eq!(reused.decode(), (index, generation.wrapping_add(1)));
    assert!(table.contains(keep));
    assert_eq!(table.len(), 2);
}

#[test]
fn test_deallocate_in_any_order() {
    let mut table: HandleTable<u8, 3> = HandleTable::new();
    let handles: Vec<_> = (0..20).map(|_| table.allocate().unwrap()).collect();

    for &i in &[7, 0, 19, 3, 11, 8, 1, 2, 18, 4, 5, 6, 9, 10, 12, 13, 14, 15, 16, 17] {
        assert!(table.deallocate(handles[i]));
    }
    assert!(table.is_empty());

    for &handle in &handles {
        assert!(!table.contains(handle));
    }
}

#[test]
fn test_clear_invalidates_all_handles() {
    let mut table: HandleTable<u8, 2> = HandleTable::new();
    let handles: Vec<_> = (0..6).map(|_| table.allocate().unwrap()).collect();
    table.deallocate(handles[1]);

    table.clear();
    assert!(table.is_empty());
    assert_eq!(table.capacity(), 8);
    for &handle in &handles {
        assert!(!table.contains(handle));
    }

    // Slots come back in index order and no old handle revives
    // slot 按 index 顺序返回，旧 handle 不会复活
    let fresh: Vec<_> = (0..8).map(|_| table.allocate().unwrap()).collect();
    let indices: Vec<u32> = fresh.iter().map(|h| h.decode().0).collect();
    assert_eq!(indices, (0..8).collect::<Vec<u32>>());
    for handle in &handles {
        assert!(!fresh.contains(handle));
    }
    assert_eq!(table.capacity(), 8);
}

#[test]
fn test_clear_empty_table() {
    let mut table: HandleTable = HandleTable::new();
    table.clear();

    assert!(table.is_empty());
    assert_eq!(table.capacity(), 0);
    assert!(table.allocate().is_ok());
}
