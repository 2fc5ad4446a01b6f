/// Viewpoints, the cameras visibility is evaluated from

use slotmap::new_key_type;
use crate::device::RenderHandle;
use super::observable_object::ObjectKey;

new_key_type! {
    /// Stable key for a Viewpoint owned by a VisibilityEngine.
    pub struct ViewpointKey;
}

/// Descriptor for creating a Viewpoint
#[derive(Debug, Clone)]
pub struct ViewpointDesc {
    /// Name used in diagnostics
    pub name: String,
    /// Camera handle the renderer passes to the pre-render hook
    pub render_handle: RenderHandle,
    /// Start frozen
    pub frozen: bool,
}

impl ViewpointDesc {
    /// Descriptor for an unfrozen viewpoint
    pub fn new(name: impl Into<String>, render_handle: RenderHandle) -> Self {
        Self {
            name: name.into(),
            render_handle,
            frozen: false,
        }
    }
}

/// A camera from which visibility is evaluated
///
/// The visibility map is stored densely, aligned with the live object order
/// of the last commit (`visibility[object.index()]`).
#[derive(Debug, Clone)]
pub struct Viewpoint {
    name: String,
    render_handle: RenderHandle,
    frozen: bool,
    index: Option<u32>,
    visibility: Vec<bool>,
}

impl Viewpoint {
    pub(crate) fn from_desc(desc: ViewpointDesc) -> Self {
        Self {
            name: desc.name,
            render_handle: desc.render_handle,
            frozen: desc.frozen,
            index: None,
            visibility: Vec::new(),
        }
    }

    /// Name used in diagnostics
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Camera handle
    pub fn render_handle(&self) -> RenderHandle {
        self.render_handle
    }

    /// Frozen viewpoints keep their visibility map and never go active
    pub fn frozen(&self) -> bool {
        self.frozen
    }

    /// Row index assigned at the last commit; None while not live
    pub fn index(&self) -> Option<u32> {
        self.index
    }

    /// Visibility of the object at `object_index`; false when unknown
    pub fn sees(&self, object_index: u32) -> bool {
        self.visibility.get(object_index as usize).copied().unwrap_or(false)
    }

    /// Dense visibility map, indexed by object index
    pub fn visibility(&self) -> &[bool] {
        &self.visibility
    }

    pub(crate) fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    pub(crate) fn set_index(&mut self, index: Option<u32>) {
        self.index = index;
    }

    pub(crate) fn set_sees(&mut self, object_index: u32, seen: bool) {
        if let Some(entry) = self.visibility.get_mut(object_index as usize) {
            *entry = seen;
        }
    }

    pub(crate) fn replace_visibility(&mut self, visibility: Vec<bool>) -> Vec<bool> {
        std::mem::replace(&mut self.visibility, visibility)
    }
}

/// Point-in-time copy of what a viewpoint sees
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilitySnapshot {
    /// Viewpoint the snapshot was taken from
    pub viewpoint: ViewpointKey,
    /// Whether the viewpoint was frozen at capture time
    pub frozen: bool,
    /// Objects visible from the viewpoint, in live order
    pub visible_objects: Vec<ObjectKey>,
}
