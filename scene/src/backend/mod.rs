//! GPU backend abstraction layer.
//!
//! The scene never talks to a graphics API directly. Device selection, queue
//! acquisition, pipeline-state construction and the low-level resource
//! wrappers live in the device layer, which implements [`GpuBackend`]. The
//! scene only creates, records, submits and destroys through this trait.
//!
//! # Available Backends
//!
//! - [`DummyBackend`]: in-memory backend that records every call, used by tests
//!   and benchmarks.
//!
//! # Architecture
//!
//! Every GPU object is an opaque `Copy` handle minted by the backend. The
//! backend keeps the real objects and interprets the handles:
//!
//! - Semaphores and command buffers for the [command streams](crate::scheduler)
//! - Render pass objects, one per replica of a scene render pass
//! - The descriptor pool and the descriptor sets allocated from it
//! - Graphics, compute and ray-tracing pipelines
//! - Queue submission, image acquisition and presentation

pub mod dummy;
mod encoder;

pub use dummy::{DummyBackend, LiveObjects, PresentRecord, SubmitRecord};
pub use encoder::CommandEncoder;

use crate::descriptor::{DescriptorBinding, DescriptorLayoutEntry, DescriptorPoolSizes};
use crate::error::SceneError;
use crate::graph::VertexLayout;
use crate::types::{
    ClearValue, Extent2d, ImageLayout, LoadOp, PipelineStages, StoreOp, TextureFormat,
};

// ============================================================================
// Handles
// ============================================================================

macro_rules! gpu_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw backend id.
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// The raw backend id.
            pub const fn raw(&self) -> u64 {
                self.0
            }
        }
    };
}

gpu_handle!(
    /// Handle to an image owned by the device layer.
    GpuImage
);
gpu_handle!(
    /// Handle to a buffer owned by the device layer.
    GpuBuffer
);
gpu_handle!(
    /// Handle to a sampler owned by the device layer.
    GpuSampler
);
gpu_handle!(
    /// Handle to a ray-tracing acceleration structure.
    GpuAccelerationStructure
);
gpu_handle!(
    /// Handle to a hardware queue.
    GpuQueue
);
gpu_handle!(
    /// Handle to a GPU-GPU semaphore.
    GpuSemaphore
);
gpu_handle!(
    /// Handle to a primary command buffer.
    GpuCommandBuffer
);
gpu_handle!(
    /// Handle to a render pass object together with its framebuffer.
    GpuRenderPass
);
gpu_handle!(
    /// Handle to a pipeline state object.
    GpuPipeline
);
gpu_handle!(
    /// Handle to a pipeline layout.
    GpuPipelineLayout
);
gpu_handle!(
    /// Handle to a descriptor pool.
    GpuDescriptorPool
);
gpu_handle!(
    /// Handle to a descriptor set.
    GpuDescriptorSet
);

/// Queue family a command buffer is allocated for and submitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueClass {
    /// Graphics-capable queue (also runs ray tracing and transfers).
    Graphics,
    /// Compute-only queue.
    Compute,
}

/// A pipeline together with the layout its descriptor sets bind against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineObjects {
    /// The pipeline state object.
    pub pipeline: GpuPipeline,
    /// The pipeline layout.
    pub layout: GpuPipelineLayout,
}

// ============================================================================
// Object descriptors
// ============================================================================

/// How an attachment is used by a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AttachmentUsage {
    /// Color attachment.
    #[default]
    Color,
    /// Depth/stencil attachment.
    DepthStencil,
}

/// Description of one render pass attachment.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentDescriptor {
    /// Attachment format.
    pub format: TextureFormat,
    /// Attachment extent. Zero means "inherit the swap-chain extent".
    pub extent: Extent2d,
    /// Sample count.
    pub samples: u32,
    /// Color or depth/stencil.
    pub usage: AttachmentUsage,
    /// Load operation, including the clear value.
    pub load_op: LoadOp,
    /// Store operation.
    pub store_op: StoreOp,
    /// Layout the attachment is left in at the end of the pass.
    pub final_layout: ImageLayout,
    /// Existing image to render into. The backend creates one when absent.
    pub image: Option<GpuImage>,
}

impl AttachmentDescriptor {
    /// Create a single-sampled color attachment.
    pub fn color(format: TextureFormat, extent: Extent2d) -> Self {
        Self {
            format,
            extent,
            samples: 1,
            usage: AttachmentUsage::Color,
            load_op: LoadOp::default(),
            store_op: StoreOp::Store,
            final_layout: ImageLayout::ShaderReadOnly,
            image: None,
        }
    }

    /// Create a single-sampled depth attachment.
    pub fn depth(format: TextureFormat, extent: Extent2d) -> Self {
        Self {
            format,
            extent,
            samples: 1,
            usage: AttachmentUsage::DepthStencil,
            load_op: LoadOp::clear_depth(1.0),
            store_op: StoreOp::DontCare,
            final_layout: ImageLayout::DepthStencilAttachment,
            image: None,
        }
    }

    /// Set the load operation.
    pub fn with_load_op(mut self, load_op: LoadOp) -> Self {
        self.load_op = load_op;
        self
    }

    /// Set the store operation.
    pub fn with_store_op(mut self, store_op: StoreOp) -> Self {
        self.store_op = store_op;
        self
    }

    /// Set the final layout.
    pub fn with_final_layout(mut self, layout: ImageLayout) -> Self {
        self.final_layout = layout;
        self
    }

    /// Set the sample count.
    pub fn with_samples(mut self, samples: u32) -> Self {
        self.samples = samples;
        self
    }

    /// Render into an existing image.
    pub fn with_image(mut self, image: GpuImage) -> Self {
        self.image = Some(image);
        self
    }
}

/// Everything needed to create one render pass object.
#[derive(Debug, Clone, Copy)]
pub struct RenderPassObjectDescriptor<'a> {
    /// Debug label of the owning scene pass.
    pub label: &'a str,
    /// Attachments, with extents already resolved.
    pub attachments: &'a [AttachmentDescriptor],
    /// Framebuffer extent.
    pub extent: Extent2d,
    /// Presentable image the color output targets, for swap-chain replicas.
    pub swapchain_image: Option<GpuImage>,
}

/// A shader stage of a pipeline, loaded by the device layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderStageDescriptor {
    /// Path of the compiled shader.
    pub path: String,
    /// Entry point name.
    pub entry_point: String,
}

impl ShaderStageDescriptor {
    /// Create a shader stage with the `main` entry point.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            entry_point: "main".to_string(),
        }
    }

    /// Set the entry point.
    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = entry_point.into();
        self
    }
}

/// Everything needed to create a graphics pipeline.
#[derive(Debug, Clone, Copy)]
pub struct GraphicsPipelineObjectDescriptor<'a> {
    /// Debug label.
    pub label: &'a str,
    /// Vertex shader.
    pub vertex: &'a ShaderStageDescriptor,
    /// Fragment shader, if any.
    pub fragment: Option<&'a ShaderStageDescriptor>,
    /// Resolved vertex input layout.
    pub vertex_layout: &'a VertexLayout,
    /// Layout of descriptor set 0.
    pub descriptor_layout: &'a [DescriptorLayoutEntry],
    /// Viewport extent.
    pub extent: Extent2d,
    /// Whether alpha blending is enabled.
    pub alpha_blending: bool,
    /// Render pass object the pipeline is compatible with.
    pub render_pass: GpuRenderPass,
}

/// Everything needed to create a compute pipeline.
#[derive(Debug, Clone, Copy)]
pub struct ComputePipelineObjectDescriptor<'a> {
    /// Debug label.
    pub label: &'a str,
    /// Compute shader.
    pub shader: &'a ShaderStageDescriptor,
    /// Layout of descriptor set 0.
    pub descriptor_layout: &'a [DescriptorLayoutEntry],
}

/// Everything needed to create a ray-tracing pipeline.
#[derive(Debug, Clone, Copy)]
pub struct RayTracingPipelineObjectDescriptor<'a> {
    /// Debug label.
    pub label: &'a str,
    /// Ray generation shader.
    pub raygen: &'a ShaderStageDescriptor,
    /// Miss shaders.
    pub miss: &'a [ShaderStageDescriptor],
    /// Closest-hit shaders.
    pub closest_hit: &'a [ShaderStageDescriptor],
    /// Layout of descriptor set 0.
    pub descriptor_layout: &'a [DescriptorLayoutEntry],
}

// ============================================================================
// Commands and submissions
// ============================================================================

/// Bind point of a pipeline or descriptor set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineBindPoint {
    /// Graphics pipeline.
    Graphics,
    /// Compute pipeline.
    Compute,
    /// Ray-tracing pipeline.
    RayTracing,
}

/// Index buffer element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexFormat {
    /// 16-bit indices.
    Uint16,
    /// 32-bit indices.
    #[default]
    Uint32,
}

/// An image layout transition with its execution dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageBarrier {
    /// Image to transition.
    pub image: GpuImage,
    /// Layout before the barrier.
    pub old_layout: ImageLayout,
    /// Layout after the barrier.
    pub new_layout: ImageLayout,
    /// Stages that must complete before the transition.
    pub src_stage: PipelineStages,
    /// Stages that wait for the transition.
    pub dst_stage: PipelineStages,
}

/// A command recorded into a command buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    /// Begin a render pass object.
    BeginRenderPass {
        render_pass: GpuRenderPass,
        extent: Extent2d,
        clear_values: Vec<ClearValue>,
    },
    /// End the current render pass.
    EndRenderPass,
    /// Bind a pipeline.
    BindPipeline {
        bind_point: PipelineBindPoint,
        pipeline: GpuPipeline,
    },
    /// Bind a vertex buffer at a binding slot.
    BindVertexBuffer { binding: u32, buffer: GpuBuffer },
    /// Bind an index buffer.
    BindIndexBuffer {
        buffer: GpuBuffer,
        format: IndexFormat,
    },
    /// Bind a descriptor set at set index 0.
    BindDescriptorSet {
        bind_point: PipelineBindPoint,
        layout: GpuPipelineLayout,
        set: GpuDescriptorSet,
    },
    /// Indexed draw.
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
    },
    /// Compute dispatch.
    Dispatch { x: u32, y: u32, z: u32 },
    /// Ray-tracing launch.
    TraceRays { width: u32, height: u32, depth: u32 },
    /// Image layout transition.
    ImageBarrier(ImageBarrier),
    /// Copy a whole image. `src` is in `TransferSrc`, `dst` in `TransferDst`.
    CopyImage {
        src: GpuImage,
        dst: GpuImage,
        extent: Extent2d,
    },
    /// Linear-filtered blit. `src` is in `TransferSrc`, `dst` in `TransferDst`.
    BlitImage {
        src: GpuImage,
        src_extent: Extent2d,
        dst: GpuImage,
        dst_extent: Extent2d,
    },
}

/// A semaphore a submission waits on, and the stages that wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SemaphoreWait {
    /// Semaphore to wait on.
    pub semaphore: GpuSemaphore,
    /// Stages blocked until the semaphore is signaled.
    pub stage: PipelineStages,
}

/// One command buffer submission.
#[derive(Debug, Clone, Copy)]
pub struct SubmitInfo<'a> {
    /// Debug label of the submitted stream.
    pub label: &'a str,
    /// The recorded command buffer.
    pub command_buffer: GpuCommandBuffer,
    /// Semaphores to wait on.
    pub waits: &'a [SemaphoreWait],
    /// Semaphores to signal on completion.
    pub signals: &'a [GpuSemaphore],
}

// ============================================================================
// Backend trait
// ============================================================================

/// Interface to the device layer.
///
/// Implementations must be usable from the thread that owns the scene; the
/// `Send + Sync` bound lets one backend be shared by several scenes (for
/// example a loading scene and a main scene).
pub trait GpuBackend: Send + Sync + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Create a binary semaphore.
    fn create_semaphore(&self) -> Result<GpuSemaphore, SceneError>;

    /// Destroy a semaphore.
    fn destroy_semaphore(&self, semaphore: GpuSemaphore);

    /// Allocate a primary command buffer from the pool of `queue`.
    fn allocate_command_buffer(&self, queue: QueueClass) -> Result<GpuCommandBuffer, SceneError>;

    /// Free a command buffer.
    fn free_command_buffer(&self, command_buffer: GpuCommandBuffer);

    /// Begin recording.
    fn begin_command_buffer(&self, command_buffer: GpuCommandBuffer) -> Result<(), SceneError>;

    /// End recording.
    fn end_command_buffer(&self, command_buffer: GpuCommandBuffer) -> Result<(), SceneError>;

    /// Record one command.
    fn encode(&self, command_buffer: GpuCommandBuffer, command: GpuCommand);

    /// Create a render pass object and its framebuffer.
    fn create_render_pass(
        &self,
        descriptor: &RenderPassObjectDescriptor<'_>,
    ) -> Result<GpuRenderPass, SceneError>;

    /// Destroy a render pass object.
    fn destroy_render_pass(&self, render_pass: GpuRenderPass);

    /// Create a descriptor pool. Sets must be individually freeable.
    fn create_descriptor_pool(
        &self,
        sizes: &DescriptorPoolSizes,
    ) -> Result<GpuDescriptorPool, SceneError>;

    /// Destroy a descriptor pool and every set allocated from it.
    fn destroy_descriptor_pool(&self, pool: GpuDescriptorPool);

    /// Allocate a descriptor set and write `bindings` into it.
    fn allocate_descriptor_set(
        &self,
        pool: GpuDescriptorPool,
        bindings: &[DescriptorBinding],
    ) -> Result<GpuDescriptorSet, SceneError>;

    /// Return a descriptor set to its pool.
    fn free_descriptor_set(&self, pool: GpuDescriptorPool, set: GpuDescriptorSet);

    /// Create a graphics pipeline.
    fn create_graphics_pipeline(
        &self,
        descriptor: &GraphicsPipelineObjectDescriptor<'_>,
    ) -> Result<PipelineObjects, SceneError>;

    /// Create a compute pipeline.
    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineObjectDescriptor<'_>,
    ) -> Result<PipelineObjects, SceneError>;

    /// Create a ray-tracing pipeline.
    fn create_ray_tracing_pipeline(
        &self,
        descriptor: &RayTracingPipelineObjectDescriptor<'_>,
    ) -> Result<PipelineObjects, SceneError>;

    /// Destroy a pipeline and its layout.
    fn destroy_pipeline(&self, pipeline: PipelineObjects);

    /// Submit a recorded command buffer.
    fn submit(&self, queue: GpuQueue, submit: &SubmitInfo<'_>) -> Result<(), SceneError>;

    /// Acquire the next presentable image, signaling `signal` when it is ready.
    ///
    /// Returns [`SceneError::SurfaceOutdated`] when the surface went stale.
    fn acquire_next_image(&self, signal: GpuSemaphore) -> Result<u32, SceneError>;

    /// Present an image once `wait` is signaled.
    fn present(&self, queue: GpuQueue, image_index: u32, wait: GpuSemaphore)
    -> Result<(), SceneError>;

    /// Block until `queue` is idle.
    fn queue_wait_idle(&self, queue: GpuQueue) -> Result<(), SceneError>;

    /// Block until the whole device is idle.
    fn device_wait_idle(&self) -> Result<(), SceneError>;
}
