//! Error types for the Perspective visibility engine
//!
//! This module defines the error types used throughout the engine,
//! including capacity enforcement, readback and device failures.

use std::fmt;

/// Result type for Perspective engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Perspective engine errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A single registration would push `viewpoints * objects` over the buffer capacity.
    ///
    /// The registration is discarded; the engine keeps running.
    CapacityExceeded {
        /// Viewpoint count including the rejected entity
        viewpoints: u32,
        /// Object count including the rejected entity
        objects: u32,
        /// Buffer capacity in cells
        capacity: u32,
        /// Name of the entity whose registration was aborted
        entity: String,
    },

    /// The capacity was lowered below the current `viewpoints * objects` product.
    ///
    /// Fatal until the capacity is raised (or entities removed) and the engine re-enabled.
    CapacityLowered {
        /// Live viewpoint count
        viewpoints: u32,
        /// Live object count
        objects: u32,
        /// Requested buffer capacity in cells
        capacity: u32,
    },

    /// Asynchronous readback reported failure for this cycle
    ReadbackFailed,

    /// Backend-specific error (device, buffer, shader binding)
    BackendError(String),

    /// Invalid resource (unknown key, destroyed entity, wrong buffer size)
    InvalidResource(String),

    /// Initialization failed (buffer allocation, enable)
    InitializationFailed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::CapacityExceeded { viewpoints, objects, capacity, entity } => write!(
                f,
                "Buffer capacity exceeded during the attempt to register \"{}\" which was aborted. \
                 The product of objects ({}) and viewpoints ({}) must not exceed the capacity ({})",
                entity, objects, viewpoints, capacity
            ),
            Error::CapacityLowered { viewpoints, objects, capacity } => write!(
                f,
                "Buffer capacity exceeded after being lowered at runtime. \
                 The product of objects ({}) and viewpoints ({}) must not exceed the capacity ({})",
                objects, viewpoints, capacity
            ),
            Error::ReadbackFailed => write!(f, "Readback failed"),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// Log an error message and build an [`Error::BackendError`] from it
///
/// # Example
///
/// ```no_run
/// # use perspective_visibility::engine_err;
/// let err = engine_err!("perspective::Device", "buffer {} is not mapped", 3);
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::perspective::Error::BackendError(message)
    }};
}

/// Log an error message and return early with an [`Error::BackendError`]
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
