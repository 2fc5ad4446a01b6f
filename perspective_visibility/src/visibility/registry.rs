/// Entity storage and live sets
///
/// Objects and viewpoints are owned by slot maps; the live sets hold the keys
/// registered at the last commit, in registration order. The live order is
/// what dense indices are assigned from.

use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use crate::device::RenderHandle;
use super::observable_object::{ObjectKey, ObservableObject, ObservableObjectDesc};
use super::viewpoint::{Viewpoint, ViewpointDesc, ViewpointKey, VisibilitySnapshot};

#[derive(Debug, Default)]
pub struct VisibilityRegistry {
    pub(crate) objects: SlotMap<ObjectKey, ObservableObject>,
    pub(crate) viewpoints: SlotMap<ViewpointKey, Viewpoint>,
    pub(crate) live_objects: Vec<ObjectKey>,
    pub(crate) live_viewpoints: Vec<ViewpointKey>,
    pub(crate) viewpoints_by_handle: FxHashMap<RenderHandle, ViewpointKey>,
}

impl VisibilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== STORAGE =====

    pub fn create_object(&mut self, desc: ObservableObjectDesc) -> ObjectKey {
        self.objects.insert(ObservableObject::from_desc(desc))
    }

    /// Remove an object from storage. Its key stays in the live set until the
    /// next commit purges it.
    pub fn destroy_object(&mut self, key: ObjectKey) -> Option<ObservableObject> {
        self.objects.remove(key)
    }

    pub fn create_viewpoint(&mut self, desc: ViewpointDesc) -> ViewpointKey {
        self.viewpoints.insert(Viewpoint::from_desc(desc))
    }

    pub fn destroy_viewpoint(&mut self, key: ViewpointKey) -> Option<Viewpoint> {
        self.viewpoints.remove(key)
    }

    pub fn object(&self, key: ObjectKey) -> Option<&ObservableObject> {
        self.objects.get(key)
    }

    pub fn viewpoint(&self, key: ViewpointKey) -> Option<&Viewpoint> {
        self.viewpoints.get(key)
    }

    pub(crate) fn object_mut(&mut self, key: ObjectKey) -> Option<&mut ObservableObject> {
        self.objects.get_mut(key)
    }

    pub(crate) fn viewpoint_mut(&mut self, key: ViewpointKey) -> Option<&mut Viewpoint> {
        self.viewpoints.get_mut(key)
    }

    // ===== LIVE SETS =====

    /// Registered objects, in index order
    pub fn live_objects(&self) -> &[ObjectKey] {
        &self.live_objects
    }

    /// Registered viewpoints, in index order
    pub fn live_viewpoints(&self) -> &[ViewpointKey] {
        &self.live_viewpoints
    }

    pub fn is_object_live(&self, key: ObjectKey) -> bool {
        self.live_objects.contains(&key)
    }

    pub fn is_viewpoint_live(&self, key: ViewpointKey) -> bool {
        self.live_viewpoints.contains(&key)
    }

    /// Viewpoint registered for a camera handle
    pub fn viewpoint_for_handle(&self, handle: RenderHandle) -> Option<ViewpointKey> {
        self.viewpoints_by_handle.get(&handle).copied()
    }

    /// Row index the shader should write to for `handle`, if the camera
    /// belongs to a live, non-frozen viewpoint
    pub fn active_row(&self, handle: RenderHandle) -> Option<u32> {
        let key = self.viewpoint_for_handle(handle)?;
        let viewpoint = self.viewpoints.get(key)?;
        if viewpoint.frozen() {
            return None;
        }
        viewpoint.index()
    }

    // ===== QUERIES =====

    /// Whether `viewpoint` saw `object` during the last resolved cycle
    pub fn is_visible(&self, object: ObjectKey, viewpoint: ViewpointKey) -> bool {
        let Some(index) = self.objects.get(object).and_then(|o| o.index()) else {
            return false;
        };
        self.viewpoints.get(viewpoint).is_some_and(|v| v.sees(index))
    }

    /// Live objects seen by `viewpoint`, in index order
    pub fn visible_objects(&self, viewpoint: ViewpointKey) -> Vec<ObjectKey> {
        let Some(viewpoint) = self.viewpoints.get(viewpoint) else {
            return Vec::new();
        };
        self.live_objects
            .iter()
            .copied()
            .filter(|key| {
                self.objects
                    .get(*key)
                    .and_then(|o| o.index())
                    .is_some_and(|index| viewpoint.sees(index))
            })
            .collect()
    }

    pub fn snapshot(&self, key: ViewpointKey) -> Option<VisibilitySnapshot> {
        let viewpoint = self.viewpoints.get(key)?;
        Some(VisibilitySnapshot {
            viewpoint: key,
            frozen: viewpoint.frozen(),
            visible_objects: self.visible_objects(key),
        })
    }
}
