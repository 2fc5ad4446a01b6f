use super::*;
use crate::device::MockVisibilityDevice;

#[test]
fn test_threshold_boundaries() {
    assert!(threshold_test(0, 0, 0));
    assert!(threshold_test(3, 4, 12));
    assert!(!threshold_test(3, 5, 12));
    assert!(threshold_test(1, 256, 256));
    assert!(!threshold_test(usize::MAX, 2, u32::MAX));
}

#[test]
fn test_ensure_capacity_allocates_and_binds() {
    let mut device = MockVisibilityDevice::new();
    let mut allocator = BufferAllocator::new(16);
    assert_eq!(allocator.allocated_capacity(), None);

    assert!(allocator.ensure_capacity(&mut device).unwrap());
    assert_eq!(allocator.allocated_capacity(), Some(16));
    assert_eq!(allocator.cells().len(), 16);
    assert_eq!(device.write_target(), Some((RESULT_BUFFER_SLOT, 16)));

    // Same capacity: nothing to do
    assert!(!allocator.ensure_capacity(&mut device).unwrap());
    assert_eq!(device.created_buffer_count(), 1);
}

#[test]
fn test_set_capacity_is_deferred() {
    let mut device = MockVisibilityDevice::new();
    let mut allocator = BufferAllocator::new(8);
    allocator.ensure_capacity(&mut device).unwrap();

    allocator.set_capacity(32);
    assert!(allocator.is_resize_pending());
    assert_eq!(allocator.capacity(), 32);
    assert_eq!(allocator.allocated_capacity(), Some(8));

    assert!(allocator.ensure_capacity(&mut device).unwrap());
    assert!(!allocator.is_resize_pending());
    assert_eq!(allocator.allocated_capacity(), Some(32));
    assert_eq!(device.live_buffer_count(), 1);
}

#[test]
fn test_set_same_capacity_is_not_a_resize() {
    let mut allocator = BufferAllocator::new(8);
    allocator.set_capacity(8);
    assert!(!allocator.is_resize_pending());
}

#[test]
fn test_zero_capacity_is_rejected() {
    let mut device = MockVisibilityDevice::new();
    let mut allocator = BufferAllocator::new(0);
    assert!(matches!(
        allocator.ensure_capacity(&mut device),
        Err(Error::InitializationFailed(_))
    ));
    assert_eq!(device.created_buffer_count(), 0);
}

#[test]
fn test_creation_failure_leaves_no_buffer() {
    let mut device = MockVisibilityDevice::new();
    device.set_fail_buffer_creation(true);
    let mut allocator = BufferAllocator::new(4);
    assert!(allocator.ensure_capacity(&mut device).is_err());
    assert!(allocator.buffer().is_none());
}

#[test]
fn test_reset_zeroes_gpu_and_cpu() {
    let mut device = MockVisibilityDevice::new();
    let mut allocator = BufferAllocator::new(4);
    allocator.ensure_capacity(&mut device).unwrap();

    device.write_cell(2, 1).unwrap();
    allocator.cells_mut()[1] = 5;
    allocator.reset().unwrap();

    assert_eq!(allocator.cells(), &[0, 0, 0, 0]);
    assert_eq!(device.write_target_cells().unwrap(), vec![0, 0, 0, 0]);
}

#[test]
fn test_release_drops_buffer() {
    let mut device = MockVisibilityDevice::new();
    let mut allocator = BufferAllocator::new(4);
    allocator.ensure_capacity(&mut device).unwrap();

    allocator.release();
    device.clear_write_targets();
    assert!(allocator.buffer().is_none());
    assert!(allocator.cells().is_empty());
    assert_eq!(device.live_buffer_count(), 0);
}
