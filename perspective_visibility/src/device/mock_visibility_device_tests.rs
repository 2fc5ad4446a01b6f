use super::*;

fn desc(cells: u32) -> ResultBufferDesc {
    ResultBufferDesc { cells, name: "results".to_string() }
}

fn read_cells(buffer: &Arc<dyn ResultBuffer>) -> Vec<i32> {
    let mut cells = vec![0i32; buffer.len() as usize];
    buffer.read(bytemuck::cast_slice_mut(cells.as_mut_slice())).unwrap();
    cells
}

// ============================================================================
// Buffers
// ============================================================================

#[test]
fn test_created_buffer_is_zeroed() {
    let mut device = MockVisibilityDevice::new();
    let buffer = device.create_result_buffer(&desc(8)).unwrap();
    assert_eq!(buffer.len(), 8);
    assert!(!buffer.is_empty());
    assert_eq!(read_cells(&buffer), vec![0; 8]);
    assert_eq!(device.blocking_reads(), 1);
}

#[test]
fn test_update_writes_cells() {
    let mut device = MockVisibilityDevice::new();
    let buffer = device.create_result_buffer(&desc(4)).unwrap();
    buffer.update(CELL_SIZE, bytemuck::cast_slice(&[7i32, 9])).unwrap();
    assert_eq!(read_cells(&buffer), vec![0, 7, 9, 0]);
    assert_eq!(device.uploads(), 1);
}

#[test]
fn test_update_rejects_overflow_and_misalignment() {
    let mut device = MockVisibilityDevice::new();
    let buffer = device.create_result_buffer(&desc(2)).unwrap();
    assert!(buffer.update(4, bytemuck::cast_slice(&[1i32, 2])).is_err());
    assert!(buffer.update(1, bytemuck::cast_slice(&[1i32])).is_err());
}

#[test]
fn test_buffer_creation_failure() {
    let mut device = MockVisibilityDevice::new();
    device.set_fail_buffer_creation(true);
    assert!(device.create_result_buffer(&desc(2)).is_err());
    assert_eq!(device.created_buffer_count(), 0);
}

#[test]
fn test_live_buffer_count_follows_drops() {
    let mut device = MockVisibilityDevice::new();
    let a = device.create_result_buffer(&desc(2)).unwrap();
    let _b = device.create_result_buffer(&desc(2)).unwrap();
    assert_eq!(device.live_buffer_count(), 2);
    drop(a);
    assert_eq!(device.live_buffer_count(), 1);
    assert_eq!(device.created_buffer_count(), 2);
}

// ============================================================================
// Asynchronous readback script
// ============================================================================

#[test]
fn test_poll_without_request_fails() {
    let mut device = MockVisibilityDevice::new();
    let buffer = device.create_result_buffer(&desc(2)).unwrap();
    let mut dst = vec![0u8; 8];
    assert_eq!(buffer.poll_readback(&mut dst), ReadbackStatus::Failed);
}

#[test]
fn test_zero_latency_request_succeeds_on_first_poll() {
    let mut device = MockVisibilityDevice::new();
    let buffer = device.create_result_buffer(&desc(2)).unwrap();
    buffer.update(0, bytemuck::cast_slice(&[3i32, 4])).unwrap();
    buffer.request_readback().unwrap();

    let mut dst = vec![0i32; 2];
    assert_eq!(buffer.poll_readback(bytemuck::cast_slice_mut(dst.as_mut_slice())), ReadbackStatus::Succeeded);
    assert_eq!(dst, vec![3, 4]);
    // Request consumed
    assert_eq!(buffer.poll_readback(bytemuck::cast_slice_mut(dst.as_mut_slice())), ReadbackStatus::Failed);
}

#[test]
fn test_latency_reports_pending_first() {
    let mut device = MockVisibilityDevice::new();
    device.set_readback_latency(2);
    let buffer = device.create_result_buffer(&desc(1)).unwrap();
    buffer.request_readback().unwrap();

    let mut dst = vec![0u8; 4];
    assert_eq!(buffer.poll_readback(&mut dst), ReadbackStatus::Pending);
    assert_eq!(buffer.poll_readback(&mut dst), ReadbackStatus::Pending);
    assert_eq!(buffer.poll_readback(&mut dst), ReadbackStatus::Succeeded);
    assert_eq!(device.readback_requests(), 1);
    assert_eq!(device.readback_polls(), 3);
}

#[test]
fn test_injected_failures_keep_request_alive() {
    let mut device = MockVisibilityDevice::new();
    let buffer = device.create_result_buffer(&desc(1)).unwrap();
    buffer.request_readback().unwrap();
    device.fail_next_polls(2);

    let mut dst = vec![0u8; 4];
    assert_eq!(buffer.poll_readback(&mut dst), ReadbackStatus::Failed);
    assert_eq!(buffer.poll_readback(&mut dst), ReadbackStatus::Failed);
    assert_eq!(buffer.poll_readback(&mut dst), ReadbackStatus::Succeeded);
}

// ============================================================================
// Shader parameters and emulation
// ============================================================================

#[test]
fn test_global_and_instance_ints_are_recorded() {
    let mut device = MockVisibilityDevice::new();
    let target = RenderTargetHandle(5);

    device.set_global_int(SHADER_VIEWPOINT_ACTIVE, 1);
    device.set_global_int(SHADER_ROW_OFFSET, 3);
    device.set_instance_int(target, SHADER_OBJECT_INDEX, 2);

    assert_eq!(device.global_int(SHADER_VIEWPOINT_ACTIVE), Some(1));
    assert_eq!(device.global_int(SHADER_ROW_OFFSET), Some(3));
    assert_eq!(device.instance_int(target, SHADER_OBJECT_INDEX), Some(2));
    assert_eq!(device.global_int_writes().len(), 2);

    device.clear_instance_params(target);
    assert_eq!(device.instance_int(target, SHADER_OBJECT_INDEX), None);
}

#[test]
fn test_bind_foreign_buffer_is_rejected() {
    let mut other = MockVisibilityDevice::new();
    let foreign = other.create_result_buffer(&desc(1)).unwrap();

    let mut device = MockVisibilityDevice::new();
    assert!(device.bind_write_target(4, &foreign).is_err());
    assert!(device.write_target().is_none());
}

#[test]
fn test_draw_visible_writes_row_cell() {
    let mut device = MockVisibilityDevice::new();
    let buffer = device.create_result_buffer(&desc(6)).unwrap();
    device.bind_write_target(4, &buffer).unwrap();
    assert_eq!(device.write_target(), Some((4, 6)));

    let target = RenderTargetHandle(1);
    device.set_instance_int(target, SHADER_OBJECT_INDEX, 1);

    // Inactive: nothing written
    assert!(!device.draw_visible(target).unwrap());

    device.set_global_int(SHADER_VIEWPOINT_ACTIVE, 1);
    device.set_global_int(SHADER_ROW_OFFSET, 3);
    assert!(device.draw_visible(target).unwrap());
    assert_eq!(device.write_target_cells().unwrap(), vec![0, 0, 0, 0, 1, 0]);

    // Target without an index is ignored
    assert!(!device.draw_visible(RenderTargetHandle(99)).unwrap());
}

#[test]
fn test_write_cell_without_target_fails() {
    let mut device = MockVisibilityDevice::synchronous_only();
    assert!(device.capabilities().is_empty());
    assert!(device.write_cell(0, 1).is_err());
}

#[test]
fn test_clear_write_targets_releases_binding() {
    let mut device = MockVisibilityDevice::new();
    let buffer = device.create_result_buffer(&desc(1)).unwrap();
    device.bind_write_target(4, &buffer).unwrap();
    drop(buffer);
    assert_eq!(device.live_buffer_count(), 1);

    device.clear_write_targets();
    assert_eq!(device.live_buffer_count(), 0);
}
