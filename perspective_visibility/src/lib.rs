/*!
# Perspective Visibility

GPU-driven visibility resolution for a set of observable objects seen from a
set of viewpoints.

Every registered object carries a dense index, every registered viewpoint a
dense row index. While a viewpoint's camera renders, the occlusion shader
writes a positive value into cell `object_index + row * object_count` of a
shared result buffer for every fragment that passes the depth test. Once per
frame the buffer is read back (blocking or asynchronously) and resolved into
per-(object, viewpoint) visibility.

## Architecture

- **VisibilityEngine**: per-frame driver; owns entities, registrations and the result buffer
- **VisibilityDevice**: renderer collaborator trait (buffers, write target, shader parameters)
- **ResultBuffer**: result buffer resource trait with blocking and request/poll readback
- **MockVisibilityDevice**: headless device emulating the occlusion shader

Registration changes are deferred to commit points, which only occur right
after a completed readback has been resolved.
*/

// Internal modules
mod error;
mod engine;
mod config;
pub mod log;
pub mod device;
pub mod visibility;

// Main perspective namespace module
pub mod perspective {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine
    pub use crate::engine::{EngineStats, UpdateOutcome, VisibilityEngine};

    // Configuration
    pub use crate::config::{
        ReadbackMode, ReadbackStrategy, RegistrationPolicy, VisibilityConfig,
        DEFAULT_CAPACITY, DEFAULT_READBACK_STALL_WARNING,
    };

    // Entities
    pub use crate::visibility::{
        ObjectKey, ObservableObject, ObservableObjectDesc, Viewpoint, ViewpointDesc,
        ViewpointKey, VisibilitySnapshot, ReadbackState,
    };

    // Device abstraction
    pub use crate::device::{
        DeviceCapabilities, MockResultBuffer, MockVisibilityDevice, ReadbackStatus,
        RenderHandle, RenderTargetHandle, ResultBuffer, ResultBufferDesc, VisibilityDevice,
        CELL_SIZE, RESULT_BUFFER_SLOT, SHADER_OBJECT_INDEX, SHADER_ROW_OFFSET,
        SHADER_VIEWPOINT_ACTIVE,
    };

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger, set_logger, reset_logger};
    }
}
