//! The scene: registration, recording, submission and resize.
//!
//! A [`Scene`] is bound to a set of presentable images and goes through three
//! phases:
//!
//! 1. **Setup**: command streams, passes, renderers and meshes are registered.
//!    Each registration returns a stable handle and accumulates descriptor
//!    demand.
//! 2. **Record**: [`Scene::record`] allocates the descriptor pool, creates
//!    every pipeline and descriptor set, and records every command stream once.
//! 3. **Frames**: [`Scene::frame`] re-submits the recorded streams each frame
//!    with the caller's wait edges. [`Scene::resize`] rebuilds the swap-chain
//!    bound state and records again.
//!
//! # Example
//!
//! ```ignore
//! let mut scene = Scene::new(backend.clone(), SceneConfig::default(), images)?;
//!
//! let main = scene.add_render_pass(RenderPassDescriptor::swapchain("main"))?;
//! let sprites = scene.add_renderer(RendererDescriptor::new("sprites", main, vertex_shader))?;
//! scene.add_mesh(MeshDescriptor::new(main, sprites, quad))?;
//! scene.record()?;
//!
//! loop {
//!     let index = presenter.acquire(image_available)?;
//!     scene.frame(graphics, compute, index, Some(image_available), &[], &[])?;
//!     scene.present(&presenter, index)?;
//! }
//! ```

mod frame;
mod pool;
mod recorder;
mod resize;

use std::sync::Arc;

use crate::backend::{GpuBackend, GpuDescriptorPool, GpuRenderPass, RenderPassObjectDescriptor};
use crate::config::{SceneConfig, SwapchainMode};
use crate::descriptor::DescriptorPoolSizes;
use crate::error::SceneError;
use crate::graph::{
    ComputePass, ComputePassDescriptor, ComputePassId, MeshBinding, MeshDescriptor, MeshId,
    PassRegistry, RayTracingPass, RayTracingPassDescriptor, RayTracingPassId, RenderPass,
    RenderPassDescriptor, RenderPassId, Renderer, RendererDescriptor, RendererId, Transfer,
    TransferDescriptor, TransferId, VertexBufferBinding, build_replicas, resolve_render_pass,
};
use crate::scheduler::{CommandStreamDescriptor, CommandStreamSet, StreamId, StreamTarget};
use crate::swapchain::SwapchainImages;
use crate::types::{Extent2d, ShaderStageFlags};

use pool::ScenePool;

/// Render-graph orchestrator bound to a set of presentable images.
pub struct Scene {
    backend: Arc<dyn GpuBackend>,
    config: SceneConfig,
    swapchain: SwapchainImages,
    mirror: Option<SwapchainImages>,
    registry: PassRegistry,
    pool: ScenePool,
    streams: CommandStreamSet,
    recorded: bool,
}

impl Scene {
    /// Create a scene rendering into `swapchain`.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        config: SceneConfig,
        swapchain: SwapchainImages,
    ) -> Result<Self, SceneError> {
        let streams = CommandStreamSet::new(backend.as_ref())?;
        log::info!(
            "Created scene '{}' ({:?} mode, {} images of {}x{}, backend: {})",
            config.label,
            config.mode,
            swapchain.len(),
            swapchain.extent().width,
            swapchain.extent().height,
            backend.name()
        );
        Ok(Self {
            backend,
            config,
            swapchain,
            mirror: None,
            registry: PassRegistry::new(),
            pool: ScenePool::default(),
            streams,
            recorded: false,
        })
    }

    /// Create a scene whose swap-chain output is also blitted into `mirror`.
    pub fn with_mirror(
        backend: Arc<dyn GpuBackend>,
        config: SceneConfig,
        swapchain: SwapchainImages,
        mirror: SwapchainImages,
    ) -> Result<Self, SceneError> {
        if mirror.len() != swapchain.len() {
            log::warn!(
                "Mirror has {} images for {} presentable images",
                mirror.len(),
                swapchain.len()
            );
        }
        let mut scene = Self::new(backend, config, swapchain)?;
        scene.mirror = Some(mirror);
        Ok(scene)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The backend.
    pub fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }

    /// The configuration.
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Swap-chain submission mode.
    pub fn mode(&self) -> SwapchainMode {
        self.config.mode
    }

    /// Presentable images.
    pub fn swapchain(&self) -> &SwapchainImages {
        &self.swapchain
    }

    /// Mirror images, if any.
    pub fn mirror(&self) -> Option<&SwapchainImages> {
        self.mirror.as_ref()
    }

    /// Registered passes.
    pub fn registry(&self) -> &PassRegistry {
        &self.registry
    }

    /// Command streams.
    pub fn streams(&self) -> &CommandStreamSet {
        &self.streams
    }

    /// Descriptor demand accumulated so far.
    pub fn descriptor_demand(&self) -> DescriptorPoolSizes {
        self.pool.demand()
    }

    /// The allocated descriptor pool, once recorded.
    pub fn descriptor_pool(&self) -> Option<GpuDescriptorPool> {
        self.pool.pool()
    }

    /// Capacity of the allocated descriptor pool.
    pub fn descriptor_pool_capacity(&self) -> Option<DescriptorPoolSizes> {
        self.pool.capacity()
    }

    /// Returns true once [`record`](Self::record) succeeded.
    pub fn is_recorded(&self) -> bool {
        self.recorded
    }

    /// Look up a render pass.
    pub fn render_pass(&self, id: RenderPassId) -> Result<&RenderPass, SceneError> {
        self.registry.render_pass(id)
    }

    /// Look up a renderer.
    pub fn renderer(
        &self,
        render_pass: RenderPassId,
        renderer: RendererId,
    ) -> Result<&Renderer, SceneError> {
        self.registry.renderer(render_pass, renderer)
    }

    /// Look up a compute pass.
    pub fn compute_pass(&self, id: ComputePassId) -> Option<&ComputePass> {
        self.registry.compute_passes().get(id.index())
    }

    /// Look up a ray-tracing pass.
    pub fn ray_tracing_pass(&self, id: RayTracingPassId) -> Option<&RayTracingPass> {
        self.registry.ray_tracing_passes().get(id.index())
    }

    /// Look up a transfer.
    pub fn transfer(&self, id: TransferId) -> Option<&Transfer> {
        self.registry.transfers().get(id.index())
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Declare an auxiliary command stream.
    pub fn add_command_stream(
        &mut self,
        descriptor: CommandStreamDescriptor,
    ) -> Result<StreamId, SceneError> {
        self.streams.add(self.backend.as_ref(), descriptor)
    }

    fn check_stream(&self, stream: StreamTarget, label: &str) -> Result<(), SceneError> {
        if let StreamTarget::Stream(id) = stream
            && !self.streams.contains(id)
        {
            log::error!(
                "'{}' targets command stream {} but only {} exist",
                label,
                id.index(),
                self.streams.len()
            );
            return Err(SceneError::InvalidStream {
                id: id.index() as u32,
                count: self.streams.len() as u32,
            });
        }
        Ok(())
    }

    /// Register a render pass and create its render pass objects.
    ///
    /// Swap-chain output creates one object per presentable image, offscreen
    /// output exactly one.
    pub fn add_render_pass(
        &mut self,
        descriptor: RenderPassDescriptor,
    ) -> Result<RenderPassId, SceneError> {
        self.check_stream(descriptor.stream, &descriptor.label)?;
        if let Some(id) = descriptor.force_id {
            self.registry.render_pass(id)?;
        }

        let mirrored = self.mirror.is_some();
        let (attachments, extent) =
            resolve_render_pass(&descriptor, &self.config, &self.swapchain, mirrored)?;

        let force_id = descriptor.force_id;
        let mut pass = RenderPass::new(
            RenderPassDescriptor {
                force_id: None,
                ..descriptor
            },
            attachments,
            extent,
        );
        pass.objects = self.create_render_pass_objects(&pass)?;

        log::debug!(
            "Added render pass '{}' ({}x{}, {} objects)",
            pass.label(),
            extent.width,
            extent.height,
            pass.objects.len()
        );
        Ok(self.registry.insert_render_pass(pass, force_id))
    }

    fn create_render_pass_objects(
        &self,
        pass: &RenderPass,
    ) -> Result<Vec<GpuRenderPass>, SceneError> {
        if pass.extent().is_zero() {
            log::warn!(
                "Render pass '{}' has a zero extent, no pass object created",
                pass.label()
            );
            return Ok(Vec::new());
        }

        let targets: Vec<_> = if pass.is_swapchain_bound() {
            self.swapchain.images().iter().copied().map(Some).collect()
        } else {
            vec![None]
        };

        let mut objects = Vec::with_capacity(targets.len());
        for swapchain_image in targets {
            let descriptor = RenderPassObjectDescriptor {
                label: pass.label(),
                attachments: pass.attachments(),
                extent: pass.extent(),
                swapchain_image,
            };
            match self.backend.create_render_pass(&descriptor) {
                Ok(object) => objects.push(object),
                Err(e) => {
                    for object in objects {
                        self.backend.destroy_render_pass(object);
                    }
                    return Err(e);
                }
            }
        }
        Ok(objects)
    }

    /// Attach a renderer to a render pass.
    ///
    /// With [`RendererDescriptor::with_forced_id`] the renderer replaces an
    /// existing one, releasing its pipeline and meshes. On a recorded scene
    /// this waits for the device and drops the recorded command buffers, so
    /// the scene must be recorded again before the next frame.
    pub fn add_renderer(
        &mut self,
        descriptor: RendererDescriptor,
    ) -> Result<RendererId, SceneError> {
        let render_pass = descriptor.render_pass;
        let force_id = descriptor.force_id;
        let renderer = Renderer::new(descriptor, self.swapchain.extent());

        if let Some(id) = force_id {
            let backend = self.backend.clone();
            self.registry.renderer_mut(render_pass, id)?;
            if self.recorded {
                backend.device_wait_idle()?;
                self.streams.release_command_buffers(backend.as_ref());
                self.recorded = false;
                log::debug!(
                    "Scene '{}' must be recorded again after replacing renderer {}",
                    self.config.label,
                    id.index()
                );
            }
            let old = self.registry.renderer_mut(render_pass, id)?;
            let old = std::mem::replace(old, renderer);
            release_renderer(backend.as_ref(), &self.pool, &old);
            for mesh in old.meshes() {
                self.pool.unreserve(&mesh.descriptor().bindings);
            }
            log::debug!(
                "Replaced renderer {} of render pass {}",
                id.index(),
                render_pass.index()
            );
            return Ok(id);
        }

        let pass = self.registry.render_pass_mut(render_pass)?;
        pass.renderers.push(renderer);
        let id = RendererId::new(pass.renderers.len() as u32 - 1);
        log::debug!(
            "Added renderer {} to render pass '{}'",
            id.index(),
            pass.label()
        );
        Ok(id)
    }

    /// Attach a mesh to a renderer, reserving its descriptor set.
    pub fn add_mesh(&mut self, descriptor: MeshDescriptor) -> Result<MeshId, SceneError> {
        let renderer = self
            .registry
            .renderer_mut(descriptor.render_pass, descriptor.renderer)?;
        self.pool.reserve(&renderer.descriptor.label, &descriptor.bindings)?;
        renderer.meshes.push(MeshBinding::new(descriptor));
        Ok(MeshId::new(renderer.meshes.len() as u32 - 1))
    }

    /// Swap the geometry of a mesh. Takes effect at the next record.
    pub fn update_vertex_buffer(
        &mut self,
        render_pass: RenderPassId,
        renderer: RendererId,
        mesh: MeshId,
        geometry: VertexBufferBinding,
    ) -> Result<(), SceneError> {
        let mesh = self.registry.mesh_mut(render_pass, renderer, mesh)?;
        mesh.descriptor.geometry = geometry;
        Ok(())
    }

    /// Register a compute pass.
    ///
    /// A swap-chain-bound pass is replicated per presentable image, each
    /// replica binding its image as a storage image at `output_binding`, and
    /// dispatched over the swap-chain extent.
    pub fn add_compute_pass(
        &mut self,
        descriptor: ComputePassDescriptor,
    ) -> Result<ComputePassId, SceneError> {
        self.check_stream(descriptor.stream, &descriptor.label)?;
        let extent = self.pass_extent(
            descriptor.output.is_swapchain(),
            descriptor.extent,
            &descriptor.label,
        )?;
        let replicas = build_replicas(
            &descriptor.bindings,
            descriptor.output,
            descriptor.output_binding,
            ShaderStageFlags::COMPUTE,
            &self.swapchain,
        );
        self.pool.reserve_replicas(&descriptor.label, &replicas)?;

        log::debug!(
            "Added compute pass '{}' ({} replicas)",
            descriptor.label,
            replicas.len()
        );
        Ok(self.registry.push_compute_pass(ComputePass {
            descriptor,
            extent,
            replicas,
            pipeline: None,
        }))
    }

    /// Register a ray-tracing pass. Replicated like compute passes.
    pub fn add_ray_tracing_pass(
        &mut self,
        descriptor: RayTracingPassDescriptor,
    ) -> Result<RayTracingPassId, SceneError> {
        self.check_stream(descriptor.stream, &descriptor.label)?;
        let extent = self.pass_extent(
            descriptor.output.is_swapchain(),
            descriptor.extent,
            &descriptor.label,
        )?;
        let replicas = build_replicas(
            &descriptor.bindings,
            descriptor.output,
            descriptor.output_binding,
            ShaderStageFlags::RAYGEN,
            &self.swapchain,
        );
        self.pool.reserve_replicas(&descriptor.label, &replicas)?;

        log::debug!(
            "Added ray tracing pass '{}' ({} replicas)",
            descriptor.label,
            replicas.len()
        );
        Ok(self.registry.push_ray_tracing_pass(RayTracingPass {
            descriptor,
            extent,
            replicas,
            pipeline: None,
        }))
    }

    fn pass_extent(
        &self,
        swapchain_bound: bool,
        extent: Extent2d,
        label: &str,
    ) -> Result<Extent2d, SceneError> {
        if swapchain_bound {
            return Ok(self.swapchain.extent());
        }
        if extent.is_zero() {
            log::error!("Offscreen pass '{}' has no extent", label);
            return Err(SceneError::MissingExtent {
                label: label.to_string(),
            });
        }
        Ok(extent)
    }

    /// Register an image-to-image transfer.
    pub fn add_transfer(&mut self, descriptor: TransferDescriptor) -> Result<TransferId, SceneError> {
        self.check_stream(descriptor.stream, &descriptor.label)?;
        if !descriptor.stream.is_swapchain() && descriptor.destination.is_none() {
            log::error!(
                "Transfer '{}' on {} has no destination",
                descriptor.label,
                descriptor.stream
            );
            return Err(SceneError::MissingOutput {
                label: descriptor.label,
            });
        }
        let origin_extent = descriptor.origin_extent.or(self.swapchain.extent());
        Ok(self.registry.push_transfer(Transfer {
            descriptor,
            origin_extent,
        }))
    }
}

/// Release the pipeline and descriptor sets of a renderer.
fn release_renderer(backend: &dyn GpuBackend, pool: &ScenePool, renderer: &Renderer) {
    if let Some(pipeline) = renderer.pipeline {
        backend.destroy_pipeline(pipeline);
    }
    for mesh in &renderer.meshes {
        if let Some(set) = mesh.owned_set {
            pool.free(backend, set);
        }
    }
}

impl Drop for Scene {
    fn drop(&mut self) {
        if let Err(e) = self.backend.device_wait_idle() {
            log::error!("Scene '{}': wait idle failed on drop: {}", self.config.label, e);
        }
        let backend = self.backend.as_ref();

        for pass in &mut self.registry.render_passes {
            for renderer in &pass.renderers {
                if let Some(pipeline) = renderer.pipeline {
                    backend.destroy_pipeline(pipeline);
                }
            }
            for object in pass.objects.drain(..) {
                backend.destroy_render_pass(object);
            }
        }
        let compute = self.registry.compute_passes.iter().map(|pass| pass.pipeline);
        let ray_tracing = self
            .registry
            .ray_tracing_passes
            .iter()
            .map(|pass| pass.pipeline);
        for pipeline in compute.chain(ray_tracing).flatten() {
            backend.destroy_pipeline(pipeline);
        }

        self.streams.destroy(backend);
        self.pool.destroy(backend);
        log::debug!("Dropped scene '{}'", self.config.label);
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("label", &self.config.label)
            .field("mode", &self.config.mode)
            .field("backend", &self.backend.name())
            .field("images", &self.swapchain.len())
            .field("streams", &self.streams.len())
            .field("passes", &self.registry.len())
            .field("recorded", &self.recorded)
            .finish()
    }
}

static_assertions::assert_impl_all!(Scene: Send, Sync);
