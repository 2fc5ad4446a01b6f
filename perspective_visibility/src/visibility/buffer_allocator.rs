/// Result buffer allocation
///
/// Owns the GPU result buffer and its CPU mirror. Capacity changes are
/// recorded immediately but only applied at the next commit point.

use std::sync::Arc;
use crate::device::{
    ResultBuffer, ResultBufferDesc, VisibilityDevice, RESULT_BUFFER_SLOT,
};
use crate::error::{Error, Result};
use crate::engine_err;

const SOURCE: &str = "perspective::BufferAllocator";

/// Whether `viewpoints * objects` cells fit in `capacity`
pub fn threshold_test(viewpoints: usize, objects: usize, capacity: u32) -> bool {
    (viewpoints as u64).saturating_mul(objects as u64) <= capacity as u64
}

pub struct BufferAllocator {
    buffer: Option<Arc<dyn ResultBuffer>>,
    cells: Vec<i32>,
    capacity: u32,
    resize_pending: bool,
}

impl BufferAllocator {
    pub fn new(capacity: u32) -> Self {
        Self {
            buffer: None,
            cells: Vec::new(),
            capacity,
            resize_pending: false,
        }
    }

    /// Requested capacity, in cells
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Capacity of the buffer currently allocated
    pub fn allocated_capacity(&self) -> Option<u32> {
        self.buffer.as_ref().map(|buffer| buffer.len())
    }

    /// Request a new capacity, applied at the next commit point
    pub fn set_capacity(&mut self, capacity: u32) {
        self.resize_pending = capacity != self.capacity || self.resize_pending;
        self.capacity = capacity;
    }

    pub fn is_resize_pending(&self) -> bool {
        self.resize_pending
    }

    pub fn buffer(&self) -> Option<&Arc<dyn ResultBuffer>> {
        self.buffer.as_ref()
    }

    /// CPU copy of the last readback
    pub fn cells(&self) -> &[i32] {
        &self.cells
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [i32] {
        &mut self.cells
    }

    /// Make sure a buffer of the requested capacity exists and is bound as
    /// the shader write target. Returns true if a new buffer was created.
    pub fn ensure_capacity(&mut self, device: &mut dyn VisibilityDevice) -> Result<bool> {
        if self.allocated_capacity() == Some(self.capacity) {
            self.resize_pending = false;
            return Ok(false);
        }
        if self.capacity == 0 {
            return Err(Error::InitializationFailed(
                "Result buffer capacity must be at least one cell".to_string(),
            ));
        }

        // Old buffer goes first so the device never holds both
        self.buffer = None;
        device.clear_write_targets();

        let buffer = device.create_result_buffer(&ResultBufferDesc {
            cells: self.capacity,
            name: "perspective_results".to_string(),
        })?;
        if buffer.len() != self.capacity {
            return Err(engine_err!(
                SOURCE,
                "Device returned a result buffer of {} cells, {} requested",
                buffer.len(),
                self.capacity
            ));
        }
        device.bind_write_target(RESULT_BUFFER_SLOT, &buffer)?;

        self.cells = vec![0; self.capacity as usize];
        self.buffer = Some(buffer);
        self.resize_pending = false;
        crate::engine_debug!(SOURCE, "Allocated result buffer of {} cells", self.capacity);
        Ok(true)
    }

    /// Zero the GPU buffer and the CPU mirror
    pub fn reset(&mut self) -> Result<()> {
        self.cells.fill(0);
        if let Some(buffer) = &self.buffer {
            buffer.update(0, bytemuck::cast_slice(self.cells.as_slice()))?;
        }
        Ok(())
    }

    /// Drop the buffer. The caller unbinds it from the device.
    pub fn release(&mut self) {
        self.buffer = None;
        self.cells = Vec::new();
    }
}

#[cfg(test)]
#[path = "buffer_allocator_tests.rs"]
mod tests;
