/// Result buffer trait and descriptor
///
/// The result buffer is the flat `i32` grid the occlusion shader writes to:
/// one row per viewpoint, one cell per object.

use crate::error::Result;

/// Size in bytes of one result cell
pub const CELL_SIZE: u64 = std::mem::size_of::<i32>() as u64;

/// Descriptor for creating a result buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultBufferDesc {
    /// Number of `i32` cells
    pub cells: u32,
    /// Debug name
    pub name: String,
}

/// Status of an asynchronous readback request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadbackStatus {
    /// The copy has not completed yet
    Pending,
    /// The copy completed and the destination holds the buffer contents
    Succeeded,
    /// The copy failed for this cycle
    Failed,
}

/// Result buffer resource trait
///
/// Implemented by backend-specific buffer types. The GPU resource is
/// released when the last reference is dropped.
pub trait ResultBuffer: Send + Sync {
    /// Number of `i32` cells
    fn len(&self) -> u32;

    /// Whether the buffer holds no cells
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Upload data into the buffer
    ///
    /// # Arguments
    ///
    /// * `offset` - Offset into the buffer in bytes
    /// * `data` - Data to write
    fn update(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Blocking copy of the whole buffer into `dst`
    ///
    /// Stalls the calling thread until the GPU has finished writing.
    fn read(&self, dst: &mut [u8]) -> Result<()>;

    /// Queue an asynchronous GPU to CPU copy of the whole buffer
    fn request_readback(&self) -> Result<()>;

    /// Poll the outstanding request, copying into `dst` when it has completed
    fn poll_readback(&self, dst: &mut [u8]) -> ReadbackStatus;
}
