//! Integration tests for engine diagnostics
//!
//! Capacity problems must name the entity and the exact counts, readback
//! stalls must warn once per stall. Every test swaps the process-wide logger
//! and therefore runs under `#[serial]`.
//!
//! Run with: cargo test --test logging_integration_tests

use perspective_visibility::perspective::log::{reset_logger, set_logger, LogEntry, LogSeverity, Logger};
use perspective_visibility::perspective::{
    MockVisibilityDevice, ObservableObjectDesc, ReadbackMode, RenderHandle, RenderTargetHandle,
    UpdateOutcome, ViewpointDesc, VisibilityConfig, VisibilityEngine,
};
use serial_test::serial;
use std::sync::{Arc, Mutex};

// ============================================================================
// HELPERS
// ============================================================================

/// Installed as the process logger for the lifetime of one test
struct Diagnostics {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

struct Recorder(Arc<Mutex<Vec<LogEntry>>>);

impl Logger for Recorder {
    fn log(&self, entry: &LogEntry) {
        self.0.lock().unwrap().push(entry.clone());
    }
}

impl Diagnostics {
    fn install() -> Self {
        let entries = Arc::new(Mutex::new(Vec::new()));
        set_logger(Recorder(entries.clone()));
        Self { entries }
    }

    fn matching(&self, keep: impl Fn(&LogEntry) -> bool) -> Vec<LogEntry> {
        self.entries.lock().unwrap().iter().filter(|e| keep(e)).cloned().collect()
    }

    fn at(&self, severity: LogSeverity) -> Vec<LogEntry> {
        self.matching(|e| e.severity == severity)
    }
}

impl Drop for Diagnostics {
    fn drop(&mut self) {
        reset_logger();
    }
}

fn enabled(device: MockVisibilityDevice, config: VisibilityConfig) -> (VisibilityEngine, Arc<Mutex<MockVisibilityDevice>>) {
    let device = Arc::new(Mutex::new(device));
    let mut engine = VisibilityEngine::new(device.clone(), config);
    engine.enable().unwrap();
    (engine, device)
}

fn with_capacity(capacity: u32) -> VisibilityConfig {
    VisibilityConfig { capacity, ..Default::default() }
}

// ============================================================================
// CAPACITY
// ============================================================================

#[test]
#[serial]
fn test_integration_registration_rejection_is_logged() {
    let diagnostics = Diagnostics::install();

    let (mut engine, _device) = enabled(MockVisibilityDevice::new(), with_capacity(2));
    engine.create_viewpoint(ViewpointDesc::new("main_camera", RenderHandle(1)));
    engine.update();
    for (name, target) in [("barrel", 1), ("crate", 2), ("lamp", 3)] {
        engine.create_object(ObservableObjectDesc::new(name, RenderTargetHandle(target)));
    }
    engine.update();

    let errors = diagnostics.at(LogSeverity::Error);
    assert_eq!(errors.len(), 1);
    let message = &errors[0].message;
    for expected in ["\"lamp\"", "objects (3)", "viewpoints (1)", "capacity (2)"] {
        assert!(message.contains(expected), "{} missing from {}", expected, message);
    }
    assert!(errors[0].file.is_some());
    assert!(engine.is_enabled());
    assert_eq!(engine.stats().rejected_registrations, 1);
}

#[test]
#[serial]
fn test_integration_lowered_capacity_is_logged() {
    let diagnostics = Diagnostics::install();

    let (mut engine, _device) = enabled(MockVisibilityDevice::synchronous_only(), with_capacity(256));
    engine.create_viewpoint(ViewpointDesc::new("main_camera", RenderHandle(1)));
    engine.create_viewpoint(ViewpointDesc::new("mirror", RenderHandle(2)));
    engine.create_object(ObservableObjectDesc::new("barrel", RenderTargetHandle(1)));
    engine.create_object(ObservableObjectDesc::new("crate", RenderTargetHandle(2)));
    engine.update();

    engine.set_capacity(3);
    assert_eq!(engine.update(), UpdateOutcome::Disabled);

    let errors = diagnostics.at(LogSeverity::Error);
    assert_eq!(errors.len(), 1);
    let message = &errors[0].message;
    for expected in ["lowered", "objects (2)", "viewpoints (2)", "capacity (3)"] {
        assert!(message.contains(expected), "{} missing from {}", expected, message);
    }
    assert!(diagnostics.at(LogSeverity::Info).iter().any(|e| e.message == "Disabled"));
}

// ============================================================================
// READBACK
// ============================================================================

#[test]
#[serial]
fn test_integration_readback_stall_warns_once() {
    let diagnostics = Diagnostics::install();

    let config = VisibilityConfig { readback_stall_warning: 2, ..Default::default() };
    let (mut engine, device) = enabled(MockVisibilityDevice::new(), config);
    device.lock().unwrap().fail_next_polls(6);
    for _ in 0..6 {
        assert_eq!(engine.update(), UpdateOutcome::Skipped);
    }

    let stalls = diagnostics
        .matching(|e| e.severity == LogSeverity::Warn && e.source == "perspective::Readback");
    assert_eq!(stalls.len(), 1);
    assert!(stalls[0].message.contains("2 consecutive frames"));
    assert!(engine.is_enabled());
}

#[test]
#[serial]
fn test_integration_downgraded_readback_is_warned() {
    let diagnostics = Diagnostics::install();

    let config = VisibilityConfig { readback: ReadbackMode::Asynchronous, ..Default::default() };
    let (engine, _device) = enabled(MockVisibilityDevice::synchronous_only(), config);

    assert!(diagnostics.at(LogSeverity::Warn).iter().any(|e| e.message.contains("not supported")));
    assert!(engine.is_enabled());
}

// ============================================================================
// CAMERAS
// ============================================================================

#[test]
#[serial]
fn test_integration_camera_takeover_is_warned() {
    let diagnostics = Diagnostics::install();

    let (mut engine, _device) = enabled(MockVisibilityDevice::new(), with_capacity(16));
    let first = engine.create_viewpoint(ViewpointDesc::new("main_camera", RenderHandle(1)));
    engine.update();
    let second = engine.create_viewpoint(ViewpointDesc::new("photo_mode", RenderHandle(1)));
    engine.update();

    let takeovers = diagnostics.matching(|e| e.severity == LogSeverity::Warn && e.message.contains("takes over"));
    assert_eq!(takeovers.len(), 1);
    assert!(takeovers[0].message.contains("photo_mode"));

    engine.deregister_viewpoint(second);
    engine.update();
    assert_eq!(engine.live_viewpoints(), &[first]);
    assert!(diagnostics.at(LogSeverity::Debug).iter().any(|e| e.message.contains("falls back")));
}
