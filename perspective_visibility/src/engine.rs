/// Visibility engine - per-frame driver of the visibility pipeline
///
/// Owns the entity registry, the registration queues, the result buffer and
/// the readback pipeline, and talks to the renderer through a shared
/// `VisibilityDevice`. The host calls `on_pre_render` before each camera
/// renders and `update` once per frame after rendering.

use std::sync::{Arc, Mutex, MutexGuard};
use crate::config::{ReadbackStrategy, VisibilityConfig};
use crate::device::{RenderHandle, VisibilityDevice};
use crate::error::{Error, Result};
use crate::visibility::{
    resolve, threshold_test, ActivationBroadcaster, BufferAllocator, ObjectKey,
    ObservableObject, ObservableObjectDesc, PendingRegistrations, ReadbackPipeline,
    ReadbackState, Viewpoint, ViewpointDesc, ViewpointKey, VisibilityRegistry,
    VisibilitySnapshot,
};

const SOURCE: &str = "perspective::VisibilityEngine";

/// What a call to `VisibilityEngine::update` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The engine is disabled; nothing happened
    Disabled,
    /// No readback was available this frame; visibility is unchanged
    Skipped,
    /// Buffer contents were resolved and the cycle was closed
    Processed,
}

/// Frame counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Frames whose readback was resolved
    pub processed_frames: u64,
    /// Frames skipped while waiting for a readback
    pub skipped_frames: u64,
    /// Registration commits applied
    pub commits: u64,
    /// Registrations refused because they did not fit the capacity
    pub rejected_registrations: u64,
    /// Registrations dropped unchecked under `RegistrationPolicy::AbortRemaining`
    pub discarded_registrations: u64,
}

/// Resolves per-(object, viewpoint) visibility from GPU writes
///
/// # Example
///
/// ```
/// use std::sync::{Arc, Mutex};
/// use perspective_visibility::perspective::{
///     MockVisibilityDevice, ObservableObjectDesc, RenderHandle, RenderTargetHandle,
///     VisibilityConfig, VisibilityEngine, ViewpointDesc,
/// };
///
/// let device = Arc::new(Mutex::new(MockVisibilityDevice::new()));
/// let mut engine = VisibilityEngine::new(device, VisibilityConfig::default());
/// engine.enable()?;
///
/// let camera = engine.create_viewpoint(ViewpointDesc::new("camera", RenderHandle(1)));
/// let cube = engine.create_object(ObservableObjectDesc::new("cube", RenderTargetHandle(7)));
///
/// // Registrations become live at the next commit point
/// engine.update();
/// assert!(engine.live_objects().contains(&cube));
/// assert!(!engine.is_visible(cube, camera));
/// # Ok::<(), perspective_visibility::perspective::Error>(())
/// ```
pub struct VisibilityEngine {
    device: Arc<Mutex<dyn VisibilityDevice>>,
    config: VisibilityConfig,
    registry: VisibilityRegistry,
    pending: PendingRegistrations,
    allocator: BufferAllocator,
    readback: ReadbackPipeline,
    broadcaster: ActivationBroadcaster,
    enabled: bool,
    stats: EngineStats,
}

impl VisibilityEngine {
    /// Create a disabled engine. Nothing is allocated until `enable`.
    pub fn new(device: Arc<Mutex<dyn VisibilityDevice>>, config: VisibilityConfig) -> Self {
        let allocator = BufferAllocator::new(config.capacity);
        let readback = ReadbackPipeline::new(
            ReadbackStrategy::Synchronous,
            config.eager_retrieve,
            config.readback_stall_warning,
        );
        Self {
            device,
            config,
            registry: VisibilityRegistry::new(),
            pending: PendingRegistrations::new(),
            allocator,
            readback,
            broadcaster: ActivationBroadcaster::new(),
            enabled: false,
            stats: EngineStats::default(),
        }
    }

    /// Log an error before handing it back
    fn log_and_return_error(error: Error) -> Error {
        match &error {
            Error::CapacityLowered { .. } | Error::CapacityExceeded { .. } => {
                crate::engine_error!(SOURCE, "{}", error);
            }
            _ => {
                crate::engine_error!(SOURCE, "Engine error: {}", error);
            }
        }
        error
    }

    fn lock_device(device: &Arc<Mutex<dyn VisibilityDevice>>) -> Result<MutexGuard<'_, dyn VisibilityDevice + 'static>> {
        device.lock().map_err(|_| Error::BackendError("Visibility device lock poisoned".to_string()))
    }

    // ===== LIFECYCLE =====

    /// Allocate the result buffer, bind it and start the readback pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the live sets no longer fit the configured
    /// capacity, or if the device fails to create or bind the buffer. The
    /// engine stays disabled in both cases.
    pub fn enable(&mut self) -> Result<()> {
        if self.enabled {
            return Ok(());
        }

        let device = Arc::clone(&self.device);
        let mut device = Self::lock_device(&device).map_err(Self::log_and_return_error)?;

        let (strategy, downgraded) = self.config.readback.resolve(device.capabilities());
        if downgraded {
            crate::engine_warn!(
                SOURCE,
                "Asynchronous readback is not supported by this device, using synchronous readback"
            );
        }

        let capacity = self.allocator.capacity();
        let (viewpoints, objects) = (self.registry.live_viewpoints().len(), self.registry.live_objects().len());
        if !threshold_test(viewpoints, objects, capacity) {
            return Err(Self::log_and_return_error(Error::CapacityLowered {
                viewpoints: viewpoints as u32,
                objects: objects as u32,
                capacity,
            }));
        }

        let started = self.start_buffer(&mut *device, strategy);
        if let Err(error) = started {
            self.allocator.release();
            device.clear_write_targets();
            return Err(Self::log_and_return_error(error));
        }

        self.broadcaster.reset();
        self.enabled = true;
        crate::engine_info!(
            SOURCE,
            "Enabled with {} cells, {:?} readback",
            capacity,
            strategy
        );
        Ok(())
    }

    fn start_buffer(&mut self, device: &mut dyn VisibilityDevice, strategy: ReadbackStrategy) -> Result<()> {
        self.allocator.ensure_capacity(device)?;
        self.readback = ReadbackPipeline::new(
            strategy,
            self.config.eager_retrieve,
            self.config.readback_stall_warning,
        );
        let buffer = self
            .allocator
            .buffer()
            .cloned()
            .ok_or_else(|| Error::InvalidResource("Result buffer missing after allocation".to_string()))?;
        self.readback.prime(&buffer)
    }

    /// Release the result buffer and unbind it. Entities and registrations
    /// are kept; visibility freezes at its last resolved state.
    pub fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        self.enabled = false;
        self.allocator.release();
        self.readback.abandon();
        self.broadcaster.reset();

        match self.device.lock() {
            Ok(mut device) => device.clear_write_targets(),
            Err(_) => crate::engine_error!(SOURCE, "Visibility device lock poisoned, write target left bound"),
        }
        crate::engine_info!(SOURCE, "Disabled");
    }

    /// Disable and clear the shader parameters of every object
    pub fn destroy(mut self) {
        self.disable();
        match self.device.lock() {
            Ok(mut device) => {
                for (_, object) in self.registry.objects.iter() {
                    for target in object.all_targets() {
                        device.clear_instance_params(target);
                    }
                }
            }
            Err(_) => crate::engine_error!(SOURCE, "Visibility device lock poisoned, instance parameters left set"),
        }
        crate::engine_info!(SOURCE, "Destroyed");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    // ===== CAPACITY =====

    /// Request a new result buffer capacity, in cells.
    ///
    /// Takes effect at the next commit point. If the live sets do not fit
    /// the new capacity at that point, the engine disables itself.
    pub fn set_capacity(&mut self, capacity: u32) {
        self.config.capacity = capacity;
        self.allocator.set_capacity(capacity);
        crate::engine_debug!(SOURCE, "Capacity change to {} cells requested", capacity);
    }

    /// Requested capacity, in cells
    pub fn capacity(&self) -> u32 {
        self.allocator.capacity()
    }

    /// Capacity of the buffer currently allocated
    pub fn allocated_capacity(&self) -> Option<u32> {
        self.allocator.allocated_capacity()
    }

    // ===== ENTITIES =====

    /// Create an object and queue it for registration
    pub fn create_object(&mut self, desc: ObservableObjectDesc) -> ObjectKey {
        let key = self.registry.create_object(desc);
        self.pending.register_object(key);
        key
    }

    /// Destroy an object: clear its shader parameters and queue its
    /// deregistration. Returns false if the key is unknown.
    pub fn destroy_object(&mut self, key: ObjectKey) -> bool {
        let Some(object) = self.registry.destroy_object(key) else {
            return false;
        };
        match self.device.lock() {
            Ok(mut device) => {
                for target in object.all_targets() {
                    device.clear_instance_params(target);
                }
            }
            Err(_) => crate::engine_error!(SOURCE, "Visibility device lock poisoned, parameters of \"{}\" left set", object.name()),
        }
        self.pending.deregister_object(key);
        true
    }

    /// Queue an object for registration at the next commit point
    pub fn register_object(&mut self, key: ObjectKey) -> bool {
        self.registry.object(key).is_some() && self.pending.register_object(key)
    }

    /// Queue an object for deregistration at the next commit point
    pub fn deregister_object(&mut self, key: ObjectKey) -> bool {
        self.registry.object(key).is_some() && self.pending.deregister_object(key)
    }

    /// Create a viewpoint and queue it for registration
    pub fn create_viewpoint(&mut self, desc: ViewpointDesc) -> ViewpointKey {
        let key = self.registry.create_viewpoint(desc);
        self.pending.register_viewpoint(key);
        key
    }

    /// Destroy a viewpoint and queue its deregistration
    pub fn destroy_viewpoint(&mut self, key: ViewpointKey) -> bool {
        if self.registry.destroy_viewpoint(key).is_none() {
            return false;
        }
        self.pending.deregister_viewpoint(key);
        true
    }

    pub fn register_viewpoint(&mut self, key: ViewpointKey) -> bool {
        self.registry.viewpoint(key).is_some() && self.pending.register_viewpoint(key)
    }

    pub fn deregister_viewpoint(&mut self, key: ViewpointKey) -> bool {
        self.registry.viewpoint(key).is_some() && self.pending.deregister_viewpoint(key)
    }

    /// Freeze or unfreeze a viewpoint. A frozen viewpoint keeps reporting what
    /// it saw when frozen and never activates the shader.
    pub fn set_frozen(&mut self, key: ViewpointKey, frozen: bool) -> bool {
        match self.registry.viewpoint_mut(key) {
            Some(viewpoint) => {
                viewpoint.set_frozen(frozen);
                true
            }
            None => false,
        }
    }

    /// Toggle publication of the object index to child draw targets.
    /// Applied at the next commit point.
    pub fn set_include_children(&mut self, key: ObjectKey, include: bool) -> bool {
        let Some(object) = self.registry.object_mut(key) else {
            return false;
        };
        if object.include_children() != include {
            object.set_include_children(include);
            if !include {
                let children: Vec<_> = object.children().to_vec();
                match self.device.lock() {
                    Ok(mut device) => {
                        for child in children {
                            device.clear_instance_params(child);
                        }
                    }
                    Err(_) => crate::engine_error!(SOURCE, "Visibility device lock poisoned, child parameters left set"),
                }
            }
            self.pending.mark_dirty();
        }
        true
    }

    // ===== FRAME =====

    /// Publish the shader globals for the camera about to render.
    ///
    /// Ignored while disabled.
    pub fn on_pre_render(&mut self, handle: RenderHandle) {
        if !self.enabled {
            return;
        }
        let row = self.registry.active_row(handle);
        let object_count = self.registry.live_objects().len();
        match self.device.lock() {
            Ok(mut device) => self.broadcaster.broadcast(row, object_count, &mut *device),
            Err(_) => crate::engine_error!(SOURCE, "Visibility device lock poisoned, camera {:?} not broadcast", handle),
        }
    }

    /// Run one frame of the pipeline: fetch the readback, resolve it, apply a
    /// pending resize and pending registrations, then reset the buffer.
    ///
    /// Never fails: an internal error is logged and disables the engine.
    pub fn update(&mut self) -> UpdateOutcome {
        if !self.enabled {
            return UpdateOutcome::Disabled;
        }
        match self.try_update() {
            Ok(outcome) => outcome,
            Err(error) => {
                Self::log_and_return_error(error);
                crate::engine_warn!(SOURCE, "Visibility engine disabled after a failed frame");
                self.disable();
                UpdateOutcome::Disabled
            }
        }
    }

    fn try_update(&mut self) -> Result<UpdateOutcome> {
        let device = Arc::clone(&self.device);
        let mut device = Self::lock_device(&device)?;

        let buffer = self
            .allocator
            .buffer()
            .cloned()
            .ok_or_else(|| Error::InvalidResource("No result buffer while enabled".to_string()))?;

        if !self.readback.fetch(&buffer, self.allocator.cells_mut())? {
            self.stats.skipped_frames += 1;
            return Ok(UpdateOutcome::Skipped);
        }
        resolve(self.allocator.cells(), &mut self.registry);

        if self.allocator.is_resize_pending() {
            self.apply_resize(&mut *device)?;
        }
        if self.pending.is_dirty() {
            self.commit(&mut *device);
        }

        let buffer = self
            .allocator
            .buffer()
            .cloned()
            .ok_or_else(|| Error::InvalidResource("Result buffer lost during commit".to_string()))?;
        self.allocator.reset()?;
        self.readback.finish(&buffer)?;

        self.stats.processed_frames += 1;
        Ok(UpdateOutcome::Processed)
    }

    fn apply_resize(&mut self, device: &mut dyn VisibilityDevice) -> Result<()> {
        let capacity = self.allocator.capacity();
        let (viewpoints, objects) = (self.registry.live_viewpoints().len(), self.registry.live_objects().len());
        if !threshold_test(viewpoints, objects, capacity) {
            return Err(Error::CapacityLowered {
                viewpoints: viewpoints as u32,
                objects: objects as u32,
                capacity,
            });
        }
        if self.allocator.ensure_capacity(device)? {
            crate::engine_info!(SOURCE, "Result buffer resized to {} cells", capacity);
        }
        Ok(())
    }

    fn commit(&mut self, device: &mut dyn VisibilityDevice) {
        let report = self.registry.commit(
            &mut self.pending,
            self.allocator.capacity(),
            self.config.registration_policy,
            device,
        );
        self.stats.commits += 1;
        self.stats.rejected_registrations += report.rejected.len() as u64;
        self.stats.discarded_registrations += u64::from(report.discarded);
    }

    // ===== QUERIES =====

    /// Whether `viewpoint` saw `object` during the last resolved frame.
    /// False for unknown or unregistered keys.
    pub fn is_visible(&self, object: ObjectKey, viewpoint: ViewpointKey) -> bool {
        self.registry.is_visible(object, viewpoint)
    }

    /// Whether any viewpoint saw `object` during the last resolved frame
    pub fn is_object_visible(&self, object: ObjectKey) -> bool {
        self.registry.object(object).is_some_and(|o| o.visible())
    }

    /// Live objects seen by `viewpoint`
    pub fn visible_objects(&self, viewpoint: ViewpointKey) -> Vec<ObjectKey> {
        self.registry.visible_objects(viewpoint)
    }

    pub fn snapshot(&self, viewpoint: ViewpointKey) -> Option<VisibilitySnapshot> {
        self.registry.snapshot(viewpoint)
    }

    pub fn object(&self, key: ObjectKey) -> Option<&ObservableObject> {
        self.registry.object(key)
    }

    pub fn viewpoint(&self, key: ViewpointKey) -> Option<&Viewpoint> {
        self.registry.viewpoint(key)
    }

    /// Registered objects, in index order
    pub fn live_objects(&self) -> &[ObjectKey] {
        self.registry.live_objects()
    }

    /// Registered viewpoints, in index order
    pub fn live_viewpoints(&self) -> &[ViewpointKey] {
        self.registry.live_viewpoints()
    }

    /// Registration changes are waiting for the next commit point
    pub fn has_pending_commit(&self) -> bool {
        self.pending.is_dirty()
    }

    pub fn readback_strategy(&self) -> ReadbackStrategy {
        self.readback.strategy()
    }

    pub fn readback_state(&self) -> ReadbackState {
        self.readback.state()
    }

    /// Asynchronous polls in a row that did not succeed
    pub fn consecutive_readback_misses(&self) -> u32 {
        self.readback.consecutive_misses()
    }

    pub fn config(&self) -> &VisibilityConfig {
        &self.config
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
