//! Profiling support via Tracy.
//!
//! Enable the `profiling` feature to send spans and frame marks to Tracy:
//!
//! ```toml
//! [dependencies]
//! redlilium-scene = { version = "0.1", features = ["profiling"] }
//! ```
//!
//! Without the feature every macro expands to nothing.
//!
//! ```ignore
//! use redlilium_scene::{frame_mark, profile_scope};
//!
//! fn submit_everything() {
//!     profile_scope!("submit_everything");
//!     // ...
//!     frame_mark!();
//! }
//! ```

#[cfg(feature = "profiling")]
pub use tracy_client::{self, frame_mark as tracy_frame_mark, span};

/// Mark the end of a frame for Tracy's frame analysis.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! frame_mark {
    () => {
        $crate::profiling::tracy_frame_mark()
    };
}

/// Mark the end of a frame (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! frame_mark {
    () => {};
}

/// Create a profiling span for the current scope.
///
/// The span ends when the scope exits.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

/// Create a profiling span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}
