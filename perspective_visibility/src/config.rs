/// Visibility engine configuration

use crate::device::DeviceCapabilities;

/// Default result buffer capacity, in cells
pub const DEFAULT_CAPACITY: u32 = 256;

/// Default number of consecutive unsuccessful polls before a stall warning
pub const DEFAULT_READBACK_STALL_WARNING: u32 = 120;

/// How the result buffer is brought back to the CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadbackMode {
    /// Asynchronous when the device supports it, synchronous otherwise
    #[default]
    Auto,
    /// Always use the blocking copy
    Synchronous,
    /// Request/poll readback; falls back to synchronous on devices without support
    Asynchronous,
}

/// Concrete readback strategy in use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadbackStrategy {
    /// Blocking copy every frame
    Synchronous,
    /// Pipelined request/poll
    Asynchronous,
}

impl ReadbackMode {
    /// Pick the strategy for a device. Returns the strategy and whether the
    /// requested mode had to be downgraded.
    pub fn resolve(self, capabilities: DeviceCapabilities) -> (ReadbackStrategy, bool) {
        let async_supported = capabilities.contains(DeviceCapabilities::ASYNC_READBACK);
        match self {
            ReadbackMode::Synchronous => (ReadbackStrategy::Synchronous, false),
            ReadbackMode::Auto if async_supported => (ReadbackStrategy::Asynchronous, false),
            ReadbackMode::Auto => (ReadbackStrategy::Synchronous, false),
            ReadbackMode::Asynchronous if async_supported => (ReadbackStrategy::Asynchronous, false),
            ReadbackMode::Asynchronous => (ReadbackStrategy::Synchronous, true),
        }
    }
}

/// What a commit does with the rest of a registration queue once one entry
/// is rejected for exceeding the capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistrationPolicy {
    /// Reject only the offending entity and keep processing the queue
    #[default]
    SkipRejected,
    /// Drop the offending entity and every entity queued after it in the
    /// same queue for this cycle
    AbortRemaining,
}

/// Visibility engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityConfig {
    /// Result buffer size in cells; must cover `viewpoints * objects`
    pub capacity: u32,
    /// Readback strategy selection
    pub readback: ReadbackMode,
    /// After a successful asynchronous readback, poll the new request once
    /// right away. The copy it returns is dropped; the poll only moves the
    /// request along so the next frame's data tends to be ready a frame
    /// earlier on slow devices.
    pub eager_retrieve: bool,
    /// Handling of capacity rejections during a commit
    pub registration_policy: RegistrationPolicy,
    /// Consecutive unsuccessful asynchronous polls before a warning is logged
    pub readback_stall_warning: u32,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            readback: ReadbackMode::Auto,
            eager_retrieve: false,
            registration_policy: RegistrationPolicy::SkipRejected,
            readback_stall_warning: DEFAULT_READBACK_STALL_WARNING,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
