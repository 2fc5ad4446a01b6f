/// Observable objects whose visibility is tracked

use slotmap::new_key_type;
use crate::device::RenderTargetHandle;

new_key_type! {
    /// Stable key for an ObservableObject owned by a VisibilityEngine.
    ///
    /// The key outlives registration: an object can be registered,
    /// deregistered and registered again under the same key.
    pub struct ObjectKey;
}

/// Descriptor for creating an ObservableObject
#[derive(Debug, Clone)]
pub struct ObservableObjectDesc {
    /// Name used in diagnostics
    pub name: String,
    /// Primary draw target; receives the object index
    pub render_target: RenderTargetHandle,
    /// Direct children draw targets (one level only)
    pub children: Vec<RenderTargetHandle>,
    /// Publish the object index to `children` as well
    pub include_children: bool,
}

impl ObservableObjectDesc {
    /// Descriptor for a single draw target without children
    pub fn new(name: impl Into<String>, render_target: RenderTargetHandle) -> Self {
        Self {
            name: name.into(),
            render_target,
            children: Vec::new(),
            include_children: false,
        }
    }
}

/// An entity whose visibility from viewpoints is tracked
#[derive(Debug, Clone)]
pub struct ObservableObject {
    name: String,
    render_target: RenderTargetHandle,
    children: Vec<RenderTargetHandle>,
    include_children: bool,
    visible: bool,
    index: Option<u32>,
}

impl ObservableObject {
    pub(crate) fn from_desc(desc: ObservableObjectDesc) -> Self {
        Self {
            name: desc.name,
            render_target: desc.render_target,
            children: desc.children,
            include_children: desc.include_children,
            visible: false,
            index: None,
        }
    }

    /// Name used in diagnostics
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Primary draw target
    pub fn render_target(&self) -> RenderTargetHandle {
        self.render_target
    }

    /// Child draw targets, whether or not they are included
    pub fn children(&self) -> &[RenderTargetHandle] {
        &self.children
    }

    /// Whether children carry the object index
    pub fn include_children(&self) -> bool {
        self.include_children
    }

    /// Visible from at least one viewpoint during the last resolved cycle
    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Dense index assigned at the last commit; None while not live.
    ///
    /// Reassigned on every commit: do not cache across frames.
    pub fn index(&self) -> Option<u32> {
        self.index
    }

    /// Draw targets that receive the object index
    pub fn indexed_targets(&self) -> impl Iterator<Item = RenderTargetHandle> + '_ {
        let children: &[RenderTargetHandle] = if self.include_children { &self.children } else { &[] };
        std::iter::once(self.render_target).chain(children.iter().copied())
    }

    /// Every draw target, included or not
    pub fn all_targets(&self) -> impl Iterator<Item = RenderTargetHandle> + '_ {
        std::iter::once(self.render_target).chain(self.children.iter().copied())
    }

    pub(crate) fn set_include_children(&mut self, include: bool) {
        self.include_children = include;
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub(crate) fn set_index(&mut self, index: Option<u32>) {
        self.index = index;
    }
}
