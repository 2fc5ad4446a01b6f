/// Device module - the rendering collaborator seen from the visibility engine
///
/// The engine never talks to a graphics API directly. Backends implement
/// `VisibilityDevice` and `ResultBuffer`; the mock implementation runs headless.

pub mod visibility_device;
pub mod result_buffer;
pub mod mock_visibility_device;

pub use visibility_device::*;
pub use result_buffer::*;
pub use mock_visibility_device::{MockVisibilityDevice, MockResultBuffer};
