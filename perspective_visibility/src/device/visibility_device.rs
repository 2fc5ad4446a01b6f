/// Visibility device trait - what the engine needs from the renderer
///
/// A `VisibilityDevice` owns result buffers, binds the active one as the
/// occlusion shader's write target, and exposes the shader parameters the
/// engine publishes (per-instance object index, global viewpoint state).

use std::sync::Arc;
use bitflags::bitflags;
use crate::error::Result;
use super::result_buffer::{ResultBuffer, ResultBufferDesc};

// ===== SHADER CONTRACT =====

/// Per-instance integer: dense index of the object drawn by this render target
pub const SHADER_OBJECT_INDEX: &str = "perspective_object_index";

/// Global integer: 1 while a live, non-frozen viewpoint is rendering, 0 otherwise
pub const SHADER_VIEWPOINT_ACTIVE: &str = "perspective_viewpoint_active";

/// Global integer: first cell of the active viewpoint's row (`viewpoint_index * object_count`)
pub const SHADER_ROW_OFFSET: &str = "perspective_row_offset";

/// Random-write slot the result buffer is bound to
pub const RESULT_BUFFER_SLOT: u32 = 4;

// ===== HANDLES =====

/// Opaque handle to a renderer-side draw target (one mesh renderer, one child renderer, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderTargetHandle(pub u64);

/// Opaque handle to a renderer-side camera, as passed to the pre-render hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderHandle(pub u64);

// ===== CAPABILITIES =====

bitflags! {
    /// Optional features a device backend supports
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DeviceCapabilities: u32 {
        /// Non-blocking request/poll readback of result buffers
        const ASYNC_READBACK = 1 << 0;
    }
}

// ===== DEVICE TRAIT =====

/// Rendering collaborator interface
///
/// Implemented by backends (and by `MockVisibilityDevice` for headless use).
pub trait VisibilityDevice: Send + Sync {
    /// Features supported by this backend
    fn capabilities(&self) -> DeviceCapabilities;

    /// Create a zero-initialized result buffer
    fn create_result_buffer(&mut self, desc: &ResultBufferDesc) -> Result<Arc<dyn ResultBuffer>>;

    /// Bind a result buffer as the random-write target at `slot`
    fn bind_write_target(&mut self, slot: u32, buffer: &Arc<dyn ResultBuffer>) -> Result<()>;

    /// Unbind every random-write target
    fn clear_write_targets(&mut self);

    /// Set a global shader integer
    fn set_global_int(&mut self, name: &str, value: i32);

    /// Set a per-instance shader integer on one render target
    fn set_instance_int(&mut self, target: RenderTargetHandle, name: &str, value: i32);

    /// Drop every per-instance shader parameter of a render target
    fn clear_instance_params(&mut self, target: RenderTargetHandle);
}
