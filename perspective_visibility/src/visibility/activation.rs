/// Viewpoint activation broadcast
///
/// Before each camera renders, the shader is told whether it should write
/// and, if so, where its row starts.

use crate::device::{VisibilityDevice, SHADER_ROW_OFFSET, SHADER_VIEWPOINT_ACTIVE};

#[derive(Debug, Default)]
pub struct ActivationBroadcaster {
    active: bool,
}

impl ActivationBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the active flag was last published as 1
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Publish the shader globals for the camera about to render.
    ///
    /// `row` is the row index of a live, non-frozen viewpoint, or None for
    /// any other camera. The active flag is only written on a transition to
    /// active; the row offset is written every time.
    pub fn broadcast(&mut self, row: Option<u32>, object_count: usize, device: &mut dyn VisibilityDevice) {
        match row {
            Some(row) => {
                if !self.active {
                    device.set_global_int(SHADER_VIEWPOINT_ACTIVE, 1);
                    self.active = true;
                }
                let offset = row as u64 * object_count as u64;
                device.set_global_int(SHADER_ROW_OFFSET, i32::try_from(offset).unwrap_or(i32::MAX));
            }
            None => {
                device.set_global_int(SHADER_VIEWPOINT_ACTIVE, 0);
                self.active = false;
            }
        }
    }

    /// Forget the published state; the next live camera republishes the flag
    pub fn reset(&mut self) {
        self.active = false;
    }
}

#[cfg(test)]
#[path = "activation_tests.rs"]
mod tests;
