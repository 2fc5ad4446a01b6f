use super::*;
use crate::device::{MockVisibilityDevice, ResultBufferDesc, VisibilityDevice};

fn buffer(device: &mut MockVisibilityDevice, cells: u32) -> Arc<dyn ResultBuffer> {
    let buffer = device
        .create_result_buffer(&ResultBufferDesc { cells, name: "test".to_string() })
        .unwrap();
    device.bind_write_target(4, &buffer).unwrap();
    buffer
}

#[test]
fn test_synchronous_fetch_reads_every_frame() {
    let mut device = MockVisibilityDevice::synchronous_only();
    let buffer = buffer(&mut device, 3);
    device.write_cell(1, 1).unwrap();

    let mut pipeline = ReadbackPipeline::new(ReadbackStrategy::Synchronous, false, 10);
    pipeline.prime(&buffer).unwrap();
    assert_eq!(pipeline.state(), ReadbackState::Idle);

    let mut cells = vec![0; 3];
    assert!(pipeline.fetch(&buffer, &mut cells).unwrap());
    assert_eq!(cells, vec![0, 1, 0]);
    assert_eq!(pipeline.state(), ReadbackState::Processed);

    pipeline.finish(&buffer).unwrap();
    assert_eq!(pipeline.state(), ReadbackState::Idle);
    assert_eq!(device.blocking_reads(), 1);
    assert_eq!(device.readback_requests(), 0);
}

#[test]
fn test_asynchronous_prime_requests() {
    let mut device = MockVisibilityDevice::new();
    let buffer = buffer(&mut device, 2);
    let mut pipeline = ReadbackPipeline::new(ReadbackStrategy::Asynchronous, false, 10);

    pipeline.prime(&buffer).unwrap();
    assert_eq!(pipeline.state(), ReadbackState::Requested);
    assert_eq!(device.readback_requests(), 1);
}

#[test]
fn test_asynchronous_pending_skips_frame() {
    let mut device = MockVisibilityDevice::new();
    device.set_readback_latency(1);
    let buffer = buffer(&mut device, 2);
    let mut pipeline = ReadbackPipeline::new(ReadbackStrategy::Asynchronous, false, 10);
    pipeline.prime(&buffer).unwrap();
    device.write_cell(0, 1).unwrap();

    let mut cells = vec![0; 2];
    assert!(!pipeline.fetch(&buffer, &mut cells).unwrap());
    assert_eq!(pipeline.consecutive_misses(), 1);
    assert_eq!(pipeline.state(), ReadbackState::Requested);

    assert!(pipeline.fetch(&buffer, &mut cells).unwrap());
    assert_eq!(cells, vec![1, 0]);
    assert_eq!(pipeline.consecutive_misses(), 0);
}

#[test]
fn test_asynchronous_failure_keeps_request() {
    let mut device = MockVisibilityDevice::new();
    let buffer = buffer(&mut device, 1);
    let mut pipeline = ReadbackPipeline::new(ReadbackStrategy::Asynchronous, false, 10);
    pipeline.prime(&buffer).unwrap();
    device.fail_next_polls(3);

    let mut cells = vec![0; 1];
    for _ in 0..3 {
        assert!(!pipeline.fetch(&buffer, &mut cells).unwrap());
    }
    assert_eq!(pipeline.consecutive_misses(), 3);
    assert!(pipeline.fetch(&buffer, &mut cells).unwrap());
    assert_eq!(device.readback_requests(), 1);
}

#[test]
fn test_finish_issues_next_request() {
    let mut device = MockVisibilityDevice::new();
    let buffer = buffer(&mut device, 1);
    let mut pipeline = ReadbackPipeline::new(ReadbackStrategy::Asynchronous, false, 10);
    pipeline.prime(&buffer).unwrap();

    let mut cells = vec![0; 1];
    assert!(pipeline.fetch(&buffer, &mut cells).unwrap());
    pipeline.finish(&buffer).unwrap();
    assert_eq!(pipeline.state(), ReadbackState::Requested);
    assert_eq!(device.readback_requests(), 2);
}

#[test]
fn test_eager_completion_drops_copy_and_rerequests() {
    let mut device = MockVisibilityDevice::new();
    let buffer = buffer(&mut device, 2);
    let mut pipeline = ReadbackPipeline::new(ReadbackStrategy::Asynchronous, true, 10);
    pipeline.prime(&buffer).unwrap();

    device.write_cell(0, 1).unwrap();
    let mut cells = vec![0; 2];
    assert!(pipeline.fetch(&buffer, &mut cells).unwrap());
    assert_eq!(cells, vec![1, 0]);

    buffer.update(0, bytemuck::cast_slice(&[0i32, 0])).unwrap();
    pipeline.finish(&buffer).unwrap();
    assert_eq!(pipeline.state(), ReadbackState::Requested);
    // prime, finish, and the replacement for the request the eager poll completed
    assert_eq!(device.readback_requests(), 3);

    // Next frame: only the new draw shows up, nothing from the previous frame
    device.write_cell(1, 1).unwrap();
    assert!(pipeline.fetch(&buffer, &mut cells).unwrap());
    assert_eq!(cells, vec![0, 1]);
}

#[test]
fn test_eager_poll_advances_pending_request() {
    let mut device = MockVisibilityDevice::new();
    device.set_readback_latency(1);
    let buffer = buffer(&mut device, 1);
    let mut pipeline = ReadbackPipeline::new(ReadbackStrategy::Asynchronous, true, 10);
    pipeline.prime(&buffer).unwrap();

    let mut cells = vec![0; 1];
    assert!(!pipeline.fetch(&buffer, &mut cells).unwrap());
    assert!(pipeline.fetch(&buffer, &mut cells).unwrap());
    pipeline.finish(&buffer).unwrap();
    assert_eq!(device.readback_requests(), 2);

    // The eager poll consumed the single pending poll of the new request
    device.write_cell(0, 1).unwrap();
    assert!(pipeline.fetch(&buffer, &mut cells).unwrap());
    assert_eq!(cells, vec![1]);
}

#[test]
fn test_fetch_without_request_issues_one() {
    let mut device = MockVisibilityDevice::new();
    let buffer = buffer(&mut device, 1);
    let mut pipeline = ReadbackPipeline::new(ReadbackStrategy::Asynchronous, false, 10);

    let mut cells = vec![0; 1];
    assert!(!pipeline.fetch(&buffer, &mut cells).unwrap());
    assert_eq!(device.readback_requests(), 1);
    assert!(pipeline.fetch(&buffer, &mut cells).unwrap());
}

#[test]
fn test_abandon_resets_state() {
    let mut device = MockVisibilityDevice::new();
    let buffer = buffer(&mut device, 1);
    let mut pipeline = ReadbackPipeline::new(ReadbackStrategy::Asynchronous, false, 10);
    pipeline.prime(&buffer).unwrap();
    device.fail_next_polls(1);
    let mut cells = vec![0; 1];
    pipeline.fetch(&buffer, &mut cells).unwrap();

    pipeline.abandon();
    assert_eq!(pipeline.state(), ReadbackState::Idle);
    assert_eq!(pipeline.consecutive_misses(), 0);
}
