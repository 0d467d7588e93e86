//! Pass descriptors and the records the registry keeps for them.
//!
//! Every pass kind comes as a pair: a `*Descriptor` the caller fills in and a
//! record the scene builds from it once extents, attachments and replicas are
//! resolved against the presentable images.

use crate::backend::{
    AttachmentDescriptor, AttachmentUsage, GpuDescriptorSet, GpuImage, GpuRenderPass,
    PipelineObjects, ShaderStageDescriptor,
};
use crate::config::SceneConfig;
use crate::descriptor::{DescriptorBinding, DescriptorLayoutEntry, layout_of};
use crate::error::SceneError;
use crate::scheduler::StreamTarget;
use crate::swapchain::SwapchainImages;
use crate::types::{ClearValue, Extent2d, ImageLayout, LoadOp, ShaderStageFlags, StoreOp};

use super::{PassHooks, RenderPassId, Renderer};

/// Where a pass writes its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputTarget {
    /// The presentable images. The pass is replicated once per image.
    #[default]
    Swapchain,
    /// Caller-provided images. The pass exists once.
    Offscreen,
}

impl OutputTarget {
    /// Returns true for [`OutputTarget::Swapchain`].
    pub fn is_swapchain(&self) -> bool {
        matches!(self, Self::Swapchain)
    }
}

// ============================================================================
// Render passes
// ============================================================================

/// Descriptor for a render pass.
#[derive(Debug, Clone, Default)]
pub struct RenderPassDescriptor {
    /// Debug label.
    pub label: String,
    /// Stream the pass is recorded into.
    pub stream: StreamTarget,
    /// Output target.
    pub output: OutputTarget,
    /// Offscreen attachments. Ignored for swap-chain output, whose depth and
    /// color attachments are derived from the scene configuration.
    pub outputs: Vec<AttachmentDescriptor>,
    /// Framebuffer extent of an offscreen pass. Zero takes the first output's.
    pub extent: Extent2d,
    /// Record hooks.
    pub hooks: PassHooks,
    pub(crate) force_id: Option<RenderPassId>,
}

impl RenderPassDescriptor {
    /// A pass drawing into the presentable images.
    pub fn swapchain(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    /// A pass drawing into `outputs`.
    pub fn offscreen(label: impl Into<String>, outputs: Vec<AttachmentDescriptor>) -> Self {
        Self {
            label: label.into(),
            output: OutputTarget::Offscreen,
            outputs,
            ..Default::default()
        }
    }

    /// Set the stream the pass is recorded into.
    pub fn with_stream(mut self, stream: impl Into<StreamTarget>) -> Self {
        self.stream = stream.into();
        self
    }

    /// Set the framebuffer extent.
    pub fn with_extent(mut self, extent: Extent2d) -> Self {
        self.extent = extent;
        self
    }

    /// Set the record hooks.
    pub fn with_hooks(mut self, hooks: PassHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub(crate) fn with_force_id(mut self, id: RenderPassId) -> Self {
        self.force_id = Some(id);
        self
    }
}

/// A registered render pass.
#[derive(Debug)]
pub struct RenderPass {
    pub(crate) descriptor: RenderPassDescriptor,
    pub(crate) attachments: Vec<AttachmentDescriptor>,
    pub(crate) extent: Extent2d,
    pub(crate) objects: Vec<GpuRenderPass>,
    pub(crate) renderers: Vec<Renderer>,
}

impl RenderPass {
    pub(crate) fn new(
        descriptor: RenderPassDescriptor,
        attachments: Vec<AttachmentDescriptor>,
        extent: Extent2d,
    ) -> Self {
        Self {
            descriptor,
            attachments,
            extent,
            objects: Vec::new(),
            renderers: Vec::new(),
        }
    }

    /// Debug label.
    pub fn label(&self) -> &str {
        &self.descriptor.label
    }

    /// Stream the pass is recorded into.
    pub fn stream(&self) -> StreamTarget {
        self.descriptor.stream
    }

    /// Output target.
    pub fn output(&self) -> OutputTarget {
        self.descriptor.output
    }

    /// Returns true if the pass renders into the presentable images.
    pub fn is_swapchain_bound(&self) -> bool {
        self.descriptor.output.is_swapchain()
    }

    /// Resolved framebuffer extent.
    pub fn extent(&self) -> Extent2d {
        self.extent
    }

    /// Resolved attachments.
    pub fn attachments(&self) -> &[AttachmentDescriptor] {
        &self.attachments
    }

    /// Render pass objects: one per presentable image for swap-chain output,
    /// one otherwise.
    pub fn objects(&self) -> &[GpuRenderPass] {
        &self.objects
    }

    /// Attached renderers, in draw order.
    pub fn renderers(&self) -> &[Renderer] {
        &self.renderers
    }

    /// Record hooks.
    pub fn hooks(&self) -> &PassHooks {
        &self.descriptor.hooks
    }

    /// Object to begin when recording for presentable image `image_index`.
    pub(crate) fn object_for_image(&self, image_index: usize) -> Option<GpuRenderPass> {
        if self.is_swapchain_bound() {
            self.objects.get(image_index).copied()
        } else {
            self.objects.first().copied()
        }
    }

    /// Clear values of the attachments that clear on load, in attachment order.
    pub(crate) fn clear_values(&self) -> Vec<ClearValue> {
        self.attachments
            .iter()
            .filter_map(|attachment| attachment.load_op.clear_value())
            .collect()
    }
}

/// Resolve the attachments and extent of a render pass.
///
/// Swap-chain output gets a depth attachment cleared every frame and a color
/// attachment that is stored and left presentable (or transfer-readable when
/// a mirror copies it). Offscreen attachments with a zero extent inherit the
/// swap-chain extent.
pub(crate) fn resolve_render_pass(
    descriptor: &RenderPassDescriptor,
    config: &SceneConfig,
    swapchain: &SwapchainImages,
    mirrored: bool,
) -> Result<(Vec<AttachmentDescriptor>, Extent2d), SceneError> {
    let swapchain_extent = swapchain.extent();

    if descriptor.output.is_swapchain() {
        let color_layout = if mirrored {
            ImageLayout::TransferSrc
        } else {
            ImageLayout::PresentSrc
        };
        let attachments = vec![
            AttachmentDescriptor::depth(config.depth_format, swapchain_extent)
                .with_load_op(LoadOp::clear_depth(config.depth_clear))
                .with_store_op(StoreOp::DontCare)
                .with_final_layout(ImageLayout::DepthStencilAttachment),
            AttachmentDescriptor::color(swapchain.format(), swapchain_extent)
                .with_load_op(LoadOp::Clear(config.clear_color))
                .with_store_op(StoreOp::Store)
                .with_final_layout(color_layout),
        ];
        return Ok((attachments, swapchain_extent));
    }

    if descriptor.outputs.is_empty() && descriptor.extent.is_zero() {
        log::error!(
            "Render pass '{}' must declare an output or an extent",
            descriptor.label
        );
        return Err(SceneError::MissingOutput {
            label: descriptor.label.clone(),
        });
    }

    let attachments: Vec<AttachmentDescriptor> = descriptor
        .outputs
        .iter()
        .cloned()
        .map(|mut attachment| {
            attachment.extent = attachment.extent.or(swapchain_extent);
            attachment
        })
        .collect();

    let extent = match attachments.first() {
        Some(first) => descriptor.extent.or(first.extent),
        None => descriptor.extent,
    };
    if extent.is_zero() {
        log::error!(
            "Render pass '{}' has no extent and the swapchain extent is zero",
            descriptor.label
        );
        return Err(SceneError::MissingExtent {
            label: descriptor.label.clone(),
        });
    }

    if !attachments
        .iter()
        .any(|attachment| attachment.usage == AttachmentUsage::DepthStencil)
    {
        log::debug!("Render pass '{}' has no depth attachment", descriptor.label);
    }

    Ok((attachments, extent))
}

// ============================================================================
// Compute and ray-tracing passes
// ============================================================================

/// Local work-group size of a compute shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchGroups {
    /// Invocations per group along the width.
    pub x: u32,
    /// Invocations per group along the height.
    pub y: u32,
    /// Group count along depth, dispatched as is.
    pub z: u32,
}

impl DispatchGroups {
    /// Create a work-group size.
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Work groups covering `extent`: `(ceil(w / x), ceil(h / y), z)`.
    pub fn dispatch_for(&self, extent: Extent2d) -> (u32, u32, u32) {
        (
            extent.width.div_ceil(self.x.max(1)),
            extent.height.div_ceil(self.y.max(1)),
            self.z,
        )
    }
}

impl Default for DispatchGroups {
    fn default() -> Self {
        Self::new(16, 16, 1)
    }
}

/// One instance of a compute or ray-tracing pass.
///
/// Swap-chain-bound passes get one replica per presentable image, each with a
/// storage-image binding pointing at its image.
#[derive(Debug, Clone, PartialEq)]
pub struct PassReplica {
    /// Bindings written into the replica's descriptor set.
    pub bindings: Vec<DescriptorBinding>,
    /// Presentable image the replica writes, for swap-chain-bound passes.
    pub target: Option<GpuImage>,
    pub(crate) descriptor_set: Option<GpuDescriptorSet>,
}

impl PassReplica {
    /// Descriptor set allocated for the replica, once recorded.
    pub fn descriptor_set(&self) -> Option<GpuDescriptorSet> {
        self.descriptor_set
    }

    /// Returns true if the replica needs a descriptor set.
    pub fn needs_descriptor_set(&self) -> bool {
        !self.bindings.is_empty()
    }
}

/// Build the replicas of a pass.
pub(crate) fn build_replicas(
    bindings: &[DescriptorBinding],
    output: OutputTarget,
    output_binding: u32,
    output_stages: ShaderStageFlags,
    swapchain: &SwapchainImages,
) -> Vec<PassReplica> {
    match output {
        OutputTarget::Offscreen => vec![PassReplica {
            bindings: bindings.to_vec(),
            target: None,
            descriptor_set: None,
        }],
        OutputTarget::Swapchain => swapchain
            .images()
            .iter()
            .map(|image| {
                let mut replica_bindings = bindings.to_vec();
                replica_bindings.push(
                    DescriptorBinding::storage_image(output_binding, *image)
                        .with_stages(output_stages),
                );
                PassReplica {
                    bindings: replica_bindings,
                    target: Some(*image),
                    descriptor_set: None,
                }
            })
            .collect(),
    }
}

/// Descriptor for a compute pass.
#[derive(Debug, Clone)]
pub struct ComputePassDescriptor {
    /// Debug label.
    pub label: String,
    /// Stream the pass is recorded into.
    pub stream: StreamTarget,
    /// Output target.
    pub output: OutputTarget,
    /// Compute shader.
    pub shader: ShaderStageDescriptor,
    /// Bindings of the pass's descriptor set.
    pub bindings: Vec<DescriptorBinding>,
    /// Binding of the presentable image, for swap-chain output.
    pub output_binding: u32,
    /// Dispatch domain of an offscreen pass.
    pub extent: Extent2d,
    /// Local work-group size.
    pub dispatch_groups: DispatchGroups,
    /// Record hooks.
    pub hooks: PassHooks,
}

impl ComputePassDescriptor {
    /// A compute pass writing the presentable images.
    pub fn new(label: impl Into<String>, shader: ShaderStageDescriptor) -> Self {
        Self {
            label: label.into(),
            stream: StreamTarget::Swapchain,
            output: OutputTarget::Swapchain,
            shader,
            bindings: Vec::new(),
            output_binding: 0,
            extent: Extent2d::default(),
            dispatch_groups: DispatchGroups::default(),
            hooks: PassHooks::default(),
        }
    }

    /// Make the pass offscreen, dispatched over `extent`.
    pub fn offscreen(mut self, extent: Extent2d) -> Self {
        self.output = OutputTarget::Offscreen;
        self.extent = extent;
        self
    }

    /// Set the stream the pass is recorded into.
    pub fn with_stream(mut self, stream: impl Into<StreamTarget>) -> Self {
        self.stream = stream.into();
        self
    }

    /// Add a binding.
    pub fn with_binding(mut self, binding: DescriptorBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Set the binding of the presentable image.
    pub fn with_output_binding(mut self, binding: u32) -> Self {
        self.output_binding = binding;
        self
    }

    /// Set the local work-group size.
    pub fn with_dispatch_groups(mut self, groups: DispatchGroups) -> Self {
        self.dispatch_groups = groups;
        self
    }

    /// Set the record hooks.
    pub fn with_hooks(mut self, hooks: PassHooks) -> Self {
        self.hooks = hooks;
        self
    }
}

/// A registered compute pass.
#[derive(Debug)]
pub struct ComputePass {
    pub(crate) descriptor: ComputePassDescriptor,
    pub(crate) extent: Extent2d,
    pub(crate) replicas: Vec<PassReplica>,
    pub(crate) pipeline: Option<PipelineObjects>,
}

impl ComputePass {
    /// Debug label.
    pub fn label(&self) -> &str {
        &self.descriptor.label
    }

    /// Stream the pass is recorded into.
    pub fn stream(&self) -> StreamTarget {
        self.descriptor.stream
    }

    /// Returns true if the pass writes the presentable images.
    pub fn is_swapchain_bound(&self) -> bool {
        self.descriptor.output.is_swapchain()
    }

    /// Dispatch domain.
    pub fn extent(&self) -> Extent2d {
        self.extent
    }

    /// Local work-group size.
    pub fn dispatch_groups(&self) -> DispatchGroups {
        self.descriptor.dispatch_groups
    }

    /// Replicas, one per presentable image for swap-chain output.
    pub fn replicas(&self) -> &[PassReplica] {
        &self.replicas
    }

    /// Pipeline, once recorded.
    pub fn pipeline(&self) -> Option<PipelineObjects> {
        self.pipeline
    }

    /// Record hooks.
    pub fn hooks(&self) -> &PassHooks {
        &self.descriptor.hooks
    }

    pub(crate) fn layout(&self) -> Vec<DescriptorLayoutEntry> {
        self.replicas
            .first()
            .map(|replica| layout_of(&replica.bindings))
            .unwrap_or_default()
    }
}

/// Descriptor for a ray-tracing pass.
#[derive(Debug, Clone)]
pub struct RayTracingPassDescriptor {
    /// Debug label.
    pub label: String,
    /// Stream the pass is recorded into.
    pub stream: StreamTarget,
    /// Output target.
    pub output: OutputTarget,
    /// Ray generation shader.
    pub raygen: ShaderStageDescriptor,
    /// Miss shaders.
    pub miss: Vec<ShaderStageDescriptor>,
    /// Closest-hit shaders.
    pub closest_hit: Vec<ShaderStageDescriptor>,
    /// Bindings of the pass's descriptor set.
    pub bindings: Vec<DescriptorBinding>,
    /// Binding of the presentable image, for swap-chain output.
    pub output_binding: u32,
    /// Launch size of an offscreen pass.
    pub extent: Extent2d,
    /// Record hooks.
    pub hooks: PassHooks,
}

impl RayTracingPassDescriptor {
    /// A ray-tracing pass writing the presentable images.
    pub fn new(label: impl Into<String>, raygen: ShaderStageDescriptor) -> Self {
        Self {
            label: label.into(),
            stream: StreamTarget::Swapchain,
            output: OutputTarget::Swapchain,
            raygen,
            miss: Vec::new(),
            closest_hit: Vec::new(),
            bindings: Vec::new(),
            output_binding: 0,
            extent: Extent2d::default(),
            hooks: PassHooks::default(),
        }
    }

    /// Make the pass offscreen, launched over `extent`.
    pub fn offscreen(mut self, extent: Extent2d) -> Self {
        self.output = OutputTarget::Offscreen;
        self.extent = extent;
        self
    }

    /// Set the stream the pass is recorded into.
    pub fn with_stream(mut self, stream: impl Into<StreamTarget>) -> Self {
        self.stream = stream.into();
        self
    }

    /// Add a miss shader.
    pub fn with_miss(mut self, shader: ShaderStageDescriptor) -> Self {
        self.miss.push(shader);
        self
    }

    /// Add a closest-hit shader.
    pub fn with_closest_hit(mut self, shader: ShaderStageDescriptor) -> Self {
        self.closest_hit.push(shader);
        self
    }

    /// Add a binding.
    pub fn with_binding(mut self, binding: DescriptorBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Set the binding of the presentable image.
    pub fn with_output_binding(mut self, binding: u32) -> Self {
        self.output_binding = binding;
        self
    }

    /// Set the record hooks.
    pub fn with_hooks(mut self, hooks: PassHooks) -> Self {
        self.hooks = hooks;
        self
    }
}

/// A registered ray-tracing pass.
#[derive(Debug)]
pub struct RayTracingPass {
    pub(crate) descriptor: RayTracingPassDescriptor,
    pub(crate) extent: Extent2d,
    pub(crate) replicas: Vec<PassReplica>,
    pub(crate) pipeline: Option<PipelineObjects>,
}

impl RayTracingPass {
    /// Debug label.
    pub fn label(&self) -> &str {
        &self.descriptor.label
    }

    /// Stream the pass is recorded into.
    pub fn stream(&self) -> StreamTarget {
        self.descriptor.stream
    }

    /// Returns true if the pass writes the presentable images.
    pub fn is_swapchain_bound(&self) -> bool {
        self.descriptor.output.is_swapchain()
    }

    /// Launch size.
    pub fn extent(&self) -> Extent2d {
        self.extent
    }

    /// Replicas, one per presentable image for swap-chain output.
    pub fn replicas(&self) -> &[PassReplica] {
        &self.replicas
    }

    /// Pipeline, once recorded.
    pub fn pipeline(&self) -> Option<PipelineObjects> {
        self.pipeline
    }

    /// Record hooks.
    pub fn hooks(&self) -> &PassHooks {
        &self.descriptor.hooks
    }

    pub(crate) fn layout(&self) -> Vec<DescriptorLayoutEntry> {
        self.replicas
            .first()
            .map(|replica| layout_of(&replica.bindings))
            .unwrap_or_default()
    }
}

// ============================================================================
// Transfers
// ============================================================================

/// Destination of an auxiliary-stream transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferDestination {
    /// Image written by the copy.
    pub image: GpuImage,
    /// Layout the image is in before and after the transfer.
    pub layout: ImageLayout,
}

/// Descriptor for an image-to-image transfer.
///
/// The origin must be in [`ImageLayout::TransferSrc`]. On the swap-chain
/// stream the destination is the presentable image being recorded.
#[derive(Debug, Clone)]
pub struct TransferDescriptor {
    /// Debug label.
    pub label: String,
    /// Stream the transfer is recorded into.
    pub stream: StreamTarget,
    /// Image copied from.
    pub origin: GpuImage,
    /// Extent of the origin. Zero inherits the swap-chain extent.
    pub origin_extent: Extent2d,
    /// Destination, for auxiliary streams.
    pub destination: Option<TransferDestination>,
    /// Record hooks.
    pub hooks: PassHooks,
}

impl TransferDescriptor {
    /// A transfer copying `origin` into the presentable images.
    pub fn new(label: impl Into<String>, origin: GpuImage) -> Self {
        Self {
            label: label.into(),
            stream: StreamTarget::Swapchain,
            origin,
            origin_extent: Extent2d::default(),
            destination: None,
            hooks: PassHooks::default(),
        }
    }

    /// Set the stream the transfer is recorded into.
    pub fn with_stream(mut self, stream: impl Into<StreamTarget>) -> Self {
        self.stream = stream.into();
        self
    }

    /// Set the origin extent.
    pub fn with_origin_extent(mut self, extent: Extent2d) -> Self {
        self.origin_extent = extent;
        self
    }

    /// Copy into `image`, which sits in `layout` around the transfer.
    pub fn with_destination(mut self, image: GpuImage, layout: ImageLayout) -> Self {
        self.destination = Some(TransferDestination { image, layout });
        self
    }

    /// Set the record hooks.
    pub fn with_hooks(mut self, hooks: PassHooks) -> Self {
        self.hooks = hooks;
        self
    }
}

/// A registered transfer.
#[derive(Debug)]
pub struct Transfer {
    pub(crate) descriptor: TransferDescriptor,
    pub(crate) origin_extent: Extent2d,
}

impl Transfer {
    /// Debug label.
    pub fn label(&self) -> &str {
        &self.descriptor.label
    }

    /// Stream the transfer is recorded into.
    pub fn stream(&self) -> StreamTarget {
        self.descriptor.stream
    }

    /// Image copied from.
    pub fn origin(&self) -> GpuImage {
        self.descriptor.origin
    }

    /// Resolved origin extent.
    pub fn origin_extent(&self) -> Extent2d {
        self.origin_extent
    }

    /// Destination, for auxiliary streams.
    pub fn destination(&self) -> Option<TransferDestination> {
        self.descriptor.destination
    }

    /// Record hooks.
    pub fn hooks(&self) -> &PassHooks {
        &self.descriptor.hooks
    }
}
