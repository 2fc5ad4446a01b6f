/// Mock visibility device (no GPU required)
///
/// Records every shader parameter the engine publishes, keeps result buffers
/// in CPU memory, and emulates the occlusion shader through `draw_visible`.
/// Readback latency and failures are scriptable so both readback strategies
/// can be driven deterministically from tests and headless tools.

use std::sync::{Arc, Mutex, Weak};
use std::sync::atomic::{AtomicU32, Ordering};
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::engine_bail;
use super::result_buffer::{ReadbackStatus, ResultBuffer, ResultBufferDesc, CELL_SIZE};
use super::visibility_device::{
    DeviceCapabilities, RenderTargetHandle, VisibilityDevice,
    SHADER_OBJECT_INDEX, SHADER_ROW_OFFSET, SHADER_VIEWPOINT_ACTIVE,
};

// ============================================================================
// Shared scripting / counters
// ============================================================================

#[derive(Debug, Default)]
struct ReadbackScript {
    /// Polls returning Pending after each request before the copy completes
    latency: u32,
    /// Upcoming polls forced to Failed
    failing_polls: u32,
}

#[derive(Debug, Default)]
struct Counters {
    blocking_reads: AtomicU32,
    readback_requests: AtomicU32,
    readback_polls: AtomicU32,
    uploads: AtomicU32,
}

// ============================================================================
// Mock ResultBuffer
// ============================================================================

/// CPU-backed result buffer
#[derive(Debug)]
pub struct MockResultBuffer {
    name: String,
    cells: Mutex<Vec<i32>>,
    /// Remaining Pending polls of the outstanding request, None when idle
    request: Mutex<Option<u32>>,
    script: Arc<Mutex<ReadbackScript>>,
    counters: Arc<Counters>,
}

impl MockResultBuffer {
    fn new(desc: &ResultBufferDesc, script: Arc<Mutex<ReadbackScript>>, counters: Arc<Counters>) -> Self {
        Self {
            name: desc.name.clone(),
            cells: Mutex::new(vec![0; desc.cells as usize]),
            request: Mutex::new(None),
            script,
            counters,
        }
    }

    /// Debug name given at creation
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the cells, without counting as a readback
    pub fn cells(&self) -> Vec<i32> {
        self.cells.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Write one cell, as the occlusion shader would
    pub fn write_cell(&self, index: u32, value: i32) -> Result<()> {
        let mut cells = self.lock_cells()?;
        match cells.get_mut(index as usize) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(Error::InvalidResource(format!(
                "cell {} out of range for buffer '{}' ({} cells)",
                index, self.name, cells.len()
            ))),
        }
    }

    fn lock_cells(&self) -> Result<std::sync::MutexGuard<'_, Vec<i32>>> {
        self.cells.lock()
            .map_err(|_| Error::BackendError(format!("buffer '{}' lock poisoned", self.name)))
    }

    fn copy_into(&self, dst: &mut [u8]) -> Result<()> {
        let cells = self.lock_cells()?;
        let src: &[u8] = bytemuck::cast_slice(cells.as_slice());
        if dst.len() != src.len() {
            engine_bail!("perspective::mock",
                "readback size mismatch for '{}': {} bytes requested, {} available",
                self.name, dst.len(), src.len());
        }
        dst.copy_from_slice(src);
        Ok(())
    }
}

impl ResultBuffer for MockResultBuffer {
    fn len(&self) -> u32 {
        self.cells.lock().map(|c| c.len() as u32).unwrap_or(0)
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        if offset % CELL_SIZE != 0 || data.len() as u64 % CELL_SIZE != 0 {
            engine_bail!("perspective::mock",
                "unaligned upload to '{}' (offset {}, {} bytes)", self.name, offset, data.len());
        }
        let mut cells = self.lock_cells()?;
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(cells.as_mut_slice());
        let start = offset as usize;
        let end = start + data.len();
        if end > bytes.len() {
            engine_bail!("perspective::mock",
                "upload overflows '{}' ({} > {} bytes)", self.name, end, bytes.len());
        }
        bytes[start..end].copy_from_slice(data);
        self.counters.uploads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn read(&self, dst: &mut [u8]) -> Result<()> {
        self.counters.blocking_reads.fetch_add(1, Ordering::Relaxed);
        self.copy_into(dst)
    }

    fn request_readback(&self) -> Result<()> {
        let latency = self.script.lock()
            .map_err(|_| Error::BackendError("readback script lock poisoned".to_string()))?
            .latency;
        let mut request = self.request.lock()
            .map_err(|_| Error::BackendError(format!("buffer '{}' lock poisoned", self.name)))?;
        *request = Some(latency);
        self.counters.readback_requests.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn poll_readback(&self, dst: &mut [u8]) -> ReadbackStatus {
        self.counters.readback_polls.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut script) = self.script.lock() {
            if script.failing_polls > 0 {
                script.failing_polls -= 1;
                return ReadbackStatus::Failed;
            }
        }

        let Ok(mut request) = self.request.lock() else {
            return ReadbackStatus::Failed;
        };
        match *request {
            None => ReadbackStatus::Failed,
            Some(0) => {
                *request = None;
                match self.copy_into(dst) {
                    Ok(()) => ReadbackStatus::Succeeded,
                    Err(_) => ReadbackStatus::Failed,
                }
            }
            Some(remaining) => {
                *request = Some(remaining - 1);
                ReadbackStatus::Pending
            }
        }
    }
}

// ============================================================================
// Mock VisibilityDevice
// ============================================================================

/// Headless device that tracks everything the engine publishes
pub struct MockVisibilityDevice {
    capabilities: DeviceCapabilities,
    script: Arc<Mutex<ReadbackScript>>,
    counters: Arc<Counters>,
    created_buffers: Vec<Weak<MockResultBuffer>>,
    write_target: Option<(u32, Arc<MockResultBuffer>)>,
    global_ints: FxHashMap<String, i32>,
    global_int_writes: Vec<(String, i32)>,
    instance_ints: FxHashMap<(RenderTargetHandle, String), i32>,
    fail_buffer_creation: bool,
}

impl MockVisibilityDevice {
    /// Create a mock device supporting asynchronous readback (zero latency)
    pub fn new() -> Self {
        Self::with_capabilities(DeviceCapabilities::ASYNC_READBACK)
    }

    /// Create a mock device that only supports blocking readback
    pub fn synchronous_only() -> Self {
        Self::with_capabilities(DeviceCapabilities::empty())
    }

    /// Create a mock device advertising the given capabilities
    pub fn with_capabilities(capabilities: DeviceCapabilities) -> Self {
        Self {
            capabilities,
            script: Arc::new(Mutex::new(ReadbackScript::default())),
            counters: Arc::new(Counters::default()),
            created_buffers: Vec::new(),
            write_target: None,
            global_ints: FxHashMap::default(),
            global_int_writes: Vec::new(),
            instance_ints: FxHashMap::default(),
            fail_buffer_creation: false,
        }
    }

    // ===== SCRIPTING =====

    /// Number of Pending polls after each readback request
    pub fn set_readback_latency(&mut self, polls: u32) {
        if let Ok(mut script) = self.script.lock() {
            script.latency = polls;
        }
    }

    /// Force the next `polls` readback polls to report Failed
    pub fn fail_next_polls(&mut self, polls: u32) {
        if let Ok(mut script) = self.script.lock() {
            script.failing_polls = polls;
        }
    }

    /// Make subsequent `create_result_buffer` calls fail
    pub fn set_fail_buffer_creation(&mut self, fail: bool) {
        self.fail_buffer_creation = fail;
    }

    // ===== SHADER EMULATION =====

    /// Emulate the occlusion shader passing for one draw target
    ///
    /// Writes `1` into `row_offset + object_index` of the bound buffer when a
    /// viewpoint is active and the target carries an object index. Returns
    /// whether a cell was written.
    pub fn draw_visible(&mut self, target: RenderTargetHandle) -> Result<bool> {
        if self.global_int(SHADER_VIEWPOINT_ACTIVE) != Some(1) {
            return Ok(false);
        }
        let Some(object_index) = self.instance_int(target, SHADER_OBJECT_INDEX) else {
            return Ok(false);
        };
        let row_offset = self.global_int(SHADER_ROW_OFFSET).unwrap_or(0);
        let cell = u32::try_from(row_offset + object_index)
            .map_err(|_| Error::InvalidResource(format!("negative cell index for {:?}", target)))?;
        self.write_cell(cell, 1)?;
        Ok(true)
    }

    /// Write one cell of the bound write target
    pub fn write_cell(&mut self, index: u32, value: i32) -> Result<()> {
        match &self.write_target {
            Some((_, buffer)) => buffer.write_cell(index, value),
            None => Err(Error::InvalidResource("no write target bound".to_string())),
        }
    }

    // ===== INSPECTION =====

    /// Current value of a global shader integer
    pub fn global_int(&self, name: &str) -> Option<i32> {
        self.global_ints.get(name).copied()
    }

    /// Every global integer write, in order
    pub fn global_int_writes(&self) -> &[(String, i32)] {
        &self.global_int_writes
    }

    /// Current value of a per-instance shader integer
    pub fn instance_int(&self, target: RenderTargetHandle, name: &str) -> Option<i32> {
        self.instance_ints.get(&(target, name.to_string())).copied()
    }

    /// Slot and cell count of the bound write target
    pub fn write_target(&self) -> Option<(u32, u32)> {
        self.write_target.as_ref().map(|(slot, buffer)| (*slot, buffer.len()))
    }

    /// Cells of the bound write target (not counted as a readback)
    pub fn write_target_cells(&self) -> Option<Vec<i32>> {
        self.write_target.as_ref().map(|(_, buffer)| buffer.cells())
    }

    /// Number of result buffers created so far
    pub fn created_buffer_count(&self) -> usize {
        self.created_buffers.len()
    }

    /// Number of result buffers still alive
    pub fn live_buffer_count(&self) -> usize {
        self.created_buffers.iter().filter(|b| b.strong_count() > 0).count()
    }

    /// Blocking reads issued across all buffers
    pub fn blocking_reads(&self) -> u32 {
        self.counters.blocking_reads.load(Ordering::Relaxed)
    }

    /// Asynchronous readback requests issued across all buffers
    pub fn readback_requests(&self) -> u32 {
        self.counters.readback_requests.load(Ordering::Relaxed)
    }

    /// Asynchronous readback polls issued across all buffers
    pub fn readback_polls(&self) -> u32 {
        self.counters.readback_polls.load(Ordering::Relaxed)
    }

    /// Uploads issued across all buffers
    pub fn uploads(&self) -> u32 {
        self.counters.uploads.load(Ordering::Relaxed)
    }
}

impl Default for MockVisibilityDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl VisibilityDevice for MockVisibilityDevice {
    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    fn create_result_buffer(&mut self, desc: &ResultBufferDesc) -> Result<Arc<dyn ResultBuffer>> {
        if self.fail_buffer_creation {
            engine_bail!("perspective::mock", "buffer creation disabled ('{}')", desc.name);
        }
        let buffer = Arc::new(MockResultBuffer::new(desc, self.script.clone(), self.counters.clone()));
        self.created_buffers.push(Arc::downgrade(&buffer));
        Ok(buffer as Arc<dyn ResultBuffer>)
    }

    fn bind_write_target(&mut self, slot: u32, buffer: &Arc<dyn ResultBuffer>) -> Result<()> {
        let target = Arc::as_ptr(buffer) as *const ();
        let found = self.created_buffers.iter()
            .filter_map(Weak::upgrade)
            .find(|candidate| Arc::as_ptr(candidate) as *const () == target);
        match found {
            Some(mock) => {
                self.write_target = Some((slot, mock));
                Ok(())
            }
            None => Err(Error::InvalidResource(
                "write target was not created by this device".to_string(),
            )),
        }
    }

    fn clear_write_targets(&mut self) {
        self.write_target = None;
    }

    fn set_global_int(&mut self, name: &str, value: i32) {
        self.global_ints.insert(name.to_string(), value);
        self.global_int_writes.push((name.to_string(), value));
    }

    fn set_instance_int(&mut self, target: RenderTargetHandle, name: &str, value: i32) {
        self.instance_ints.insert((target, name.to_string()), value);
    }

    fn clear_instance_params(&mut self, target: RenderTargetHandle) {
        self.instance_ints.retain(|(handle, _), _| *handle != target);
    }
}

#[cfg(test)]
#[path = "mock_visibility_device_tests.rs"]
mod tests;
