//! Common value types shared across the scene system.
//!
//! This module contains extents, formats, layouts, clear values and the
//! stage flags used by passes, barriers and submissions.

mod common;
mod flags;
mod texture;

pub use common::{ClearValue, Extent2d, LoadOp, StoreOp};
pub use flags::{PipelineStages, ShaderStageFlags};
pub use texture::{ImageLayout, TextureFormat};
