use super::*;

// ============================================================================
// Single slot tests
// ============================================================================

#[test]
fn test_new_is_empty() {
    let slots: SlotArray<u32, 4> = SlotArray::new();
    assert_eq!(slots.capacity(), 4);
    assert_eq!(slots.bound_count(), 0);
    assert_eq!(slots.highest_bound(), None);
    assert!(slots.get(0).is_none());
}

#[test]
fn test_set_and_get() {
    let mut slots: SlotArray<u32, 4> = SlotArray::new();
    slots.set(2, Some(42)).unwrap();
    assert_eq!(slots.get(2), Some(&42));
    assert!(slots.is_bound(2));
    assert!(!slots.is_bound(1));
    assert_eq!(slots.highest_bound(), Some(2));
}

#[test]
fn test_set_out_of_range_fails() {
    let mut slots: SlotArray<u32, 4> = SlotArray::new();
    let result = slots.set(4, Some(1));
    assert!(matches!(result, Err(Error::CapacityExceeded(_))));
}

#[test]
fn test_get_out_of_range_is_none() {
    let slots: SlotArray<u32, 4> = SlotArray::new();
    assert!(slots.get(100).is_none());
}

// ============================================================================
// Range tests
// ============================================================================

#[test]
fn test_set_range_replaces_only_window() {
    let mut slots: SlotArray<u32, 8> = SlotArray::new();
    slots.set_range(0, &[Some(1), Some(2), Some(3), Some(4)]).unwrap();
    slots.set_range(1, &[None, Some(20)]).unwrap();

    assert_eq!(slots.get(0), Some(&1));
    assert_eq!(slots.get(1), None);
    assert_eq!(slots.get(2), Some(&20));
    assert_eq!(slots.get(3), Some(&4));
}

#[test]
fn test_set_range_overflow_leaves_table_unchanged() {
    let mut slots: SlotArray<u32, 4> = SlotArray::new();
    slots.set(3, Some(9)).unwrap();

    let result = slots.set_range(2, &[Some(1), Some(2), Some(3)]);
    assert!(matches!(result, Err(Error::CapacityExceeded(_))));
    assert_eq!(slots.get(2), None);
    assert_eq!(slots.get(3), Some(&9));
}

#[test]
fn test_set_range_huge_start_does_not_overflow() {
    let mut slots: SlotArray<u32, 4> = SlotArray::new();
    let result = slots.set_range(usize::MAX, &[Some(1)]);
    assert!(matches!(result, Err(Error::CapacityExceeded(_))));
}

#[test]
fn test_set_range_empty_at_capacity_is_ok() {
    let mut slots: SlotArray<u32, 4> = SlotArray::new();
    assert!(slots.set_range(4, &[]).is_ok());
}

#[test]
fn test_clear_range_clamped() {
    let mut slots: SlotArray<u32, 4> = SlotArray::new();
    slots.set_range(0, &[Some(1), Some(2), Some(3), Some(4)]).unwrap();
    slots.clear_range_clamped(2, 100);

    assert_eq!(slots.bound_count(), 2);
    assert_eq!(slots.highest_bound(), Some(1));
}

#[test]
fn test_clear_range_clamped_start_past_end() {
    let mut slots: SlotArray<u32, 4> = SlotArray::new();
    slots.set(0, Some(1)).unwrap();
    slots.clear_range_clamped(10, 2);
    assert_eq!(slots.bound_count(), 1);
}

// ============================================================================
// Bulk tests
// ============================================================================

#[test]
fn test_clear_matching() {
    let mut slots: SlotArray<u32, 4> = SlotArray::new();
    slots.set_range(0, &[Some(7), Some(8), Some(7), None]).unwrap();

    let cleared = slots.clear_matching(|value| *value == 7);
    assert_eq!(cleared, 2);
    assert_eq!(slots.get(1), Some(&8));
    assert_eq!(slots.bound_count(), 1);
}

#[test]
fn test_iter_bound_in_slot_order() {
    let mut slots: SlotArray<u32, 6> = SlotArray::new();
    slots.set(4, Some(40)).unwrap();
    slots.set(1, Some(10)).unwrap();

    let bound: Vec<(usize, u32)> = slots.iter_bound().map(|(i, v)| (i, *v)).collect();
    assert_eq!(bound, vec![(1, 10), (4, 40)]);
}

#[test]
fn test_clear() {
    let mut slots: SlotArray<u32, 3> = SlotArray::default();
    slots.set_range(0, &[Some(1), Some(2), Some(3)]).unwrap();
    slots.clear();
    assert_eq!(slots.bound_count(), 0);
}
