//! # RedLilium Scene
//!
//! Render-graph orchestration for RedLilium: passes are declared once, recorded
//! once into independently submitted command streams, and re-submitted every
//! frame with caller-supplied synchronization.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`Scene`] - Registration, recording, per-frame submission and resize
//! - [`graph`] - Render, compute, ray-tracing and transfer passes, renderers and meshes
//! - [`scheduler`] - Command streams and the wait edges between them
//! - [`descriptor`] - Descriptor bindings and descriptor pool sizing
//! - [`GpuBackend`] - Trait for the device layer, with a [`DummyBackend`] for testing
//!
//! ## Example
//!
//! ```ignore
//! use redlilium_scene::{RenderPassDescriptor, Scene, SceneConfig};
//!
//! let mut scene = Scene::new(backend, SceneConfig::default(), images)?;
//! scene.add_render_pass(RenderPassDescriptor::swapchain("main"))?;
//! scene.record()?;
//! scene.frame(graphics, compute, image_index, Some(acquired), &[], &[])?;
//! ```

pub mod backend;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod graph;
pub mod profiling;
pub mod scene;
pub mod scheduler;
pub mod swapchain;
pub mod types;

// Re-export main types for convenience
pub use backend::{
    AttachmentDescriptor, CommandEncoder, DummyBackend, GpuBackend, GpuBuffer, GpuImage, GpuQueue,
    GpuSemaphore, ShaderStageDescriptor,
};
pub use config::{SceneConfig, SwapchainMode};
pub use descriptor::{DescriptorBinding, DescriptorKind, DescriptorLayoutEntry, DescriptorPoolSizes};
pub use error::SceneError;
pub use graph::{
    ComputePassDescriptor, ComputePassId, InstanceTemplate, MeshDescriptor, MeshId, PassHooks,
    RayTracingPassDescriptor, RayTracingPassId, RenderPassDescriptor, RenderPassId,
    RendererDescriptor, RendererId, TransferDescriptor, TransferId, VertexBufferBinding,
    VertexTemplate,
};
pub use scene::Scene;
pub use scheduler::{CommandStreamDescriptor, StreamId, StreamKind, StreamTarget, WaitEdge};
pub use swapchain::{PresentQueue, Presenter, SwapchainImages};
pub use types::{ClearValue, Extent2d, ImageLayout, LoadOp, StoreOp, TextureFormat};

/// Scene library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the scene subsystem.
pub fn init() {
    log::info!("RedLilium Scene v{} initialized", VERSION);
}
