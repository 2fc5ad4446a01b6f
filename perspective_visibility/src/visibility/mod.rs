//! Visibility resolution
//!
//! Entity storage, the deferred registration protocol, dense index assignment,
//! result buffer management, readback strategies and the resolver that turns
//! buffer cells into per-object visibility.

mod observable_object;
mod viewpoint;
mod registration;
mod registry;
mod commit;
mod buffer_allocator;
mod readback;
mod resolver;
mod activation;

pub use observable_object::{ObjectKey, ObservableObject, ObservableObjectDesc};
pub use viewpoint::{Viewpoint, ViewpointDesc, ViewpointKey, VisibilitySnapshot};
pub use registration::{PendingRegistrations, RegistrationQueue};
pub use registry::VisibilityRegistry;
pub use commit::CommitReport;
pub use buffer_allocator::{threshold_test, BufferAllocator};
pub use readback::{ReadbackPipeline, ReadbackState};
pub use resolver::resolve;
pub use activation::ActivationBroadcaster;
