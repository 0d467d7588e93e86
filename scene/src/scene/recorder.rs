//! Command stream recording.
//!
//! Recording happens once after setup and again after every resize. It
//! allocates whatever the registry still lacks (descriptor sets, pipelines),
//! then fills one command buffer per presentable image and one per auxiliary
//! stream. Frames only re-submit what was recorded here.

use crate::backend::{
    CommandEncoder, ComputePipelineObjectDescriptor, GpuBackend, GpuImage,
    GraphicsPipelineObjectDescriptor, IndexFormat, PipelineBindPoint, PipelineObjects,
    RayTracingPipelineObjectDescriptor,
};
use crate::config::SwapchainMode;
use crate::error::SceneError;
use crate::graph::{PassHooks, PassReplica, RenderPass, Renderer};
use crate::scheduler::{StreamId, StreamTarget};
use crate::types::{Extent2d, ImageLayout, PipelineStages};

use super::Scene;
use super::pool::ScenePool;

impl Scene {
    /// Allocate the descriptor pool and every pipeline and descriptor set,
    /// then record all command streams.
    ///
    /// After this call the descriptor pool is frozen: registering anything
    /// that needs a descriptor set fails with
    /// [`SceneError::DescriptorPoolFrozen`].
    pub fn record(&mut self) -> Result<(), SceneError> {
        crate::profile_scope!("scene_record");
        let backend = self.backend.clone();
        let backend = backend.as_ref();

        self.pool.ensure(backend)?;
        self.instantiate(backend)?;
        self.streams.allocate_command_buffers(
            backend,
            self.swapchain.len(),
            self.config.mode.queue_class(),
        )?;

        self.warn_ignored_passes();

        for (image_index, command_buffer) in self
            .streams
            .swapchain_command_buffers()
            .iter()
            .copied()
            .enumerate()
        {
            backend.begin_command_buffer(command_buffer)?;
            let mut encoder = CommandEncoder::new(backend, command_buffer);
            self.record_swapchain_image(&mut encoder, image_index);
            backend.end_command_buffer(command_buffer)?;
        }

        for id in self.streams.ids() {
            let Some(command_buffer) = self.streams.command_buffer(id) else {
                continue;
            };
            backend.begin_command_buffer(command_buffer)?;
            let mut encoder = CommandEncoder::new(backend, command_buffer);
            self.record_stream(&mut encoder, id);
            backend.end_command_buffer(command_buffer)?;
        }

        self.recorded = true;
        log::info!(
            "Recorded scene '{}': {} swapchain command buffers, {} streams, {} passes",
            self.config.label,
            self.swapchain.len(),
            self.streams.len(),
            self.registry.len()
        );
        Ok(())
    }

    // ========================================================================
    // Instantiation
    // ========================================================================

    fn instantiate(&mut self, backend: &dyn GpuBackend) -> Result<(), SceneError> {
        for pass in &mut self.registry.render_passes {
            instantiate_render_pass(backend, &self.pool, pass)?;
        }

        for pass in &mut self.registry.compute_passes {
            if pass.pipeline.is_none() {
                let layout = pass.layout();
                pass.pipeline = Some(backend.create_compute_pipeline(
                    &ComputePipelineObjectDescriptor {
                        label: &pass.descriptor.label,
                        shader: &pass.descriptor.shader,
                        descriptor_layout: &layout,
                    },
                )?);
            }
            allocate_replica_sets(
                backend,
                &self.pool,
                &pass.descriptor.label,
                &mut pass.replicas,
            )?;
        }

        for pass in &mut self.registry.ray_tracing_passes {
            if pass.pipeline.is_none() {
                let layout = pass.layout();
                pass.pipeline = Some(backend.create_ray_tracing_pipeline(
                    &RayTracingPipelineObjectDescriptor {
                        label: &pass.descriptor.label,
                        raygen: &pass.descriptor.raygen,
                        miss: &pass.descriptor.miss,
                        closest_hit: &pass.descriptor.closest_hit,
                        descriptor_layout: &layout,
                    },
                )?);
            }
            allocate_replica_sets(
                backend,
                &self.pool,
                &pass.descriptor.label,
                &mut pass.replicas,
            )?;
        }
        Ok(())
    }

    fn warn_ignored_passes(&self) {
        let swapchain = StreamTarget::Swapchain;
        let ignored = match self.config.mode {
            SwapchainMode::Graphics => {
                self.registry.compute_passes_in(swapchain).count()
                    + self.registry.ray_tracing_passes_in(swapchain).count()
                    + self.registry.transfers_in(swapchain).count()
            }
            SwapchainMode::Compute => {
                self.registry.render_passes_in(swapchain).count()
                    + self.registry.ray_tracing_passes_in(swapchain).count()
                    + self.registry.transfers_in(swapchain).count()
            }
            SwapchainMode::RayTracing => {
                self.registry.render_passes_in(swapchain).count()
                    + self.registry.compute_passes_in(swapchain).count()
                    + self.registry.transfers_in(swapchain).count()
            }
            SwapchainMode::Transfer => {
                self.registry.render_passes_in(swapchain).count()
                    + self.registry.compute_passes_in(swapchain).count()
                    + self.registry.ray_tracing_passes_in(swapchain).count()
            }
        };
        if ignored > 0 {
            log::warn!(
                "{} swapchain-stream passes are not recorded in {:?} mode",
                ignored,
                self.config.mode
            );
        }
    }

    // ========================================================================
    // Swap-chain stream
    // ========================================================================

    fn record_swapchain_image(&self, encoder: &mut CommandEncoder<'_>, image_index: usize) {
        let Some(image) = self.swapchain.image(image_index) else {
            return;
        };
        let swapchain = StreamTarget::Swapchain;
        let extent = self.swapchain.extent();

        match self.config.mode {
            SwapchainMode::Graphics => {
                for pass in self.registry.render_passes_in(swapchain) {
                    record_render_pass(encoder, pass, image_index);
                    if !pass.is_swapchain_bound() || pass.objects.is_empty() {
                        continue;
                    }
                    self.record_mirror_blit(
                        encoder,
                        image_index,
                        image,
                        extent,
                        ImageLayout::TransferSrc,
                    );
                }
            }
            SwapchainMode::Compute => {
                for pass in self.registry.compute_passes_in(swapchain) {
                    let Some(pipeline) = pass.pipeline else {
                        continue;
                    };
                    pass.hooks().run_before(encoder);
                    let (replica, target) = if pass.is_swapchain_bound() {
                        (pass.replicas.get(image_index), Some(image))
                    } else {
                        (pass.replicas.first(), None)
                    };
                    let (x, y, z) = pass.dispatch_groups().dispatch_for(pass.extent());
                    dispatch_replica(
                        encoder,
                        PipelineBindPoint::Compute,
                        PipelineStages::COMPUTE_SHADER,
                        pipeline,
                        replica,
                        target,
                        |encoder| encoder.dispatch(x, y, z),
                    );
                    pass.hooks().run_after(encoder);
                }
            }
            SwapchainMode::RayTracing => {
                for pass in self.registry.ray_tracing_passes_in(swapchain) {
                    let Some(pipeline) = pass.pipeline else {
                        continue;
                    };
                    pass.hooks().run_before(encoder);
                    let (replica, target) = if pass.is_swapchain_bound() {
                        (pass.replicas.get(image_index), Some(image))
                    } else {
                        (pass.replicas.first(), None)
                    };
                    let launch = pass.extent();
                    dispatch_replica(
                        encoder,
                        PipelineBindPoint::RayTracing,
                        PipelineStages::RAY_TRACING_SHADER,
                        pipeline,
                        replica,
                        target,
                        |encoder| encoder.trace_rays(launch.width, launch.height, 1),
                    );
                    pass.hooks().run_after(encoder);
                }
            }
            SwapchainMode::Transfer => {
                for transfer in self.registry.transfers_in(swapchain) {
                    transfer.hooks().run_before(encoder);
                    encoder.transition(
                        image,
                        ImageLayout::PresentSrc,
                        ImageLayout::TransferDst,
                        PipelineStages::TOP_OF_PIPE,
                        PipelineStages::TRANSFER,
                    );
                    encoder.copy_image(transfer.origin(), image, extent);
                    encoder.transition(
                        image,
                        ImageLayout::TransferDst,
                        ImageLayout::PresentSrc,
                        PipelineStages::TRANSFER,
                        PipelineStages::BOTTOM_OF_PIPE,
                    );
                    self.record_mirror_blit(
                        encoder,
                        image_index,
                        transfer.origin(),
                        transfer.origin_extent(),
                        ImageLayout::TransferSrc,
                    );
                    transfer.hooks().run_after(encoder);
                }
            }
        }
    }

    /// Blit `src` into the mirror image of `image_index`, if mirroring.
    ///
    /// A presentable `src` left in `TransferSrc` by its render pass is moved
    /// back to `PresentSrc` afterwards.
    fn record_mirror_blit(
        &self,
        encoder: &mut CommandEncoder<'_>,
        image_index: usize,
        src: GpuImage,
        src_extent: Extent2d,
        src_layout: ImageLayout,
    ) {
        let Some(mirror) = &self.mirror else {
            return;
        };
        let Some(dst) = mirror.image(image_index) else {
            log::warn!("No mirror image for presentable image {}", image_index);
            return;
        };

        encoder.transition(
            dst,
            ImageLayout::PresentSrc,
            ImageLayout::TransferDst,
            PipelineStages::TOP_OF_PIPE,
            PipelineStages::TRANSFER,
        );
        encoder.blit_image(src, src_extent, dst, mirror.extent());
        encoder.transition(
            dst,
            ImageLayout::TransferDst,
            ImageLayout::PresentSrc,
            PipelineStages::TRANSFER,
            PipelineStages::BOTTOM_OF_PIPE,
        );

        if self.swapchain.image(image_index) == Some(src) {
            encoder.transition(
                src,
                src_layout,
                ImageLayout::PresentSrc,
                PipelineStages::TRANSFER,
                PipelineStages::BOTTOM_OF_PIPE,
            );
        }
    }

    // ========================================================================
    // Auxiliary streams
    // ========================================================================

    fn record_stream(&self, encoder: &mut CommandEncoder<'_>, id: StreamId) {
        let stream = StreamTarget::Stream(id);

        for pass in self.registry.render_passes_in(stream) {
            record_render_pass(encoder, pass, 0);
        }

        for pass in self.registry.compute_passes_in(stream) {
            let Some(pipeline) = pass.pipeline else {
                continue;
            };
            let (x, y, z) = pass.dispatch_groups().dispatch_for(pass.extent());
            record_all_replicas(
                encoder,
                pass.hooks(),
                &pass.replicas,
                PipelineBindPoint::Compute,
                PipelineStages::COMPUTE_SHADER,
                pipeline,
                |encoder| encoder.dispatch(x, y, z),
            );
        }

        for pass in self.registry.ray_tracing_passes_in(stream) {
            let Some(pipeline) = pass.pipeline else {
                continue;
            };
            let launch = pass.extent();
            record_all_replicas(
                encoder,
                pass.hooks(),
                &pass.replicas,
                PipelineBindPoint::RayTracing,
                PipelineStages::RAY_TRACING_SHADER,
                pipeline,
                |encoder| encoder.trace_rays(launch.width, launch.height, 1),
            );
        }

        for transfer in self.registry.transfers_in(stream) {
            let Some(destination) = transfer.destination() else {
                continue;
            };
            transfer.hooks().run_before(encoder);
            encoder.transition(
                destination.image,
                destination.layout,
                ImageLayout::TransferDst,
                PipelineStages::TOP_OF_PIPE,
                PipelineStages::TRANSFER,
            );
            encoder.copy_image(
                transfer.origin(),
                destination.image,
                transfer.origin_extent(),
            );
            encoder.transition(
                destination.image,
                ImageLayout::TransferDst,
                destination.layout,
                PipelineStages::TRANSFER,
                PipelineStages::BOTTOM_OF_PIPE,
            );
            transfer.hooks().run_after(encoder);
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn instantiate_render_pass(
    backend: &dyn GpuBackend,
    pool: &ScenePool,
    pass: &mut RenderPass,
) -> Result<(), SceneError> {
    let Some(object) = pass.objects.first().copied() else {
        if !pass.renderers.is_empty() {
            log::warn!(
                "Render pass '{}' has no pass object, its renderers are skipped",
                pass.descriptor.label
            );
        }
        return Ok(());
    };

    for renderer in &mut pass.renderers {
        if renderer.pipeline.is_none() {
            let descriptor = &renderer.descriptor;
            renderer.pipeline = Some(backend.create_graphics_pipeline(
                &GraphicsPipelineObjectDescriptor {
                    label: &descriptor.label,
                    vertex: &descriptor.vertex_shader,
                    fragment: descriptor.fragment_shader.as_ref(),
                    vertex_layout: &renderer.vertex_layout,
                    descriptor_layout: &descriptor.descriptor_layout,
                    extent: renderer.extent,
                    alpha_blending: descriptor.alpha_blending,
                    render_pass: object,
                },
            )?);
        }

        for mesh in &mut renderer.meshes {
            if mesh.needs_descriptor_set() && mesh.owned_set.is_none() {
                mesh.owned_set = Some(pool.allocate(
                    backend,
                    &renderer.descriptor.label,
                    &mesh.descriptor.bindings,
                )?);
            }
        }
    }
    Ok(())
}

fn allocate_replica_sets(
    backend: &dyn GpuBackend,
    pool: &ScenePool,
    label: &str,
    replicas: &mut [PassReplica],
) -> Result<(), SceneError> {
    for replica in replicas {
        if replica.needs_descriptor_set() && replica.descriptor_set.is_none() {
            replica.descriptor_set = Some(pool.allocate(backend, label, &replica.bindings)?);
        }
    }
    Ok(())
}

fn record_render_pass(encoder: &mut CommandEncoder<'_>, pass: &RenderPass, image_index: usize) {
    let Some(object) = pass.object_for_image(image_index) else {
        return;
    };

    pass.hooks().run_before(encoder);
    encoder.begin_render_pass(object, pass.extent(), pass.clear_values());
    for renderer in pass.renderers() {
        record_renderer(encoder, renderer);
    }
    encoder.end_render_pass();
    pass.hooks().run_after(encoder);
}

fn record_renderer(encoder: &mut CommandEncoder<'_>, renderer: &Renderer) {
    let Some(pipeline) = renderer.pipeline else {
        return;
    };
    encoder.bind_pipeline(PipelineBindPoint::Graphics, pipeline.pipeline);

    for mesh in renderer.meshes() {
        let draw = mesh.draw();
        encoder.bind_vertex_buffer(0, draw.vertex_buffer);
        encoder.bind_index_buffer(draw.index_buffer, IndexFormat::Uint32);
        if let Some(instances) = draw.instances {
            encoder.bind_vertex_buffer(1, instances.buffer);
        }
        if let Some(set) = draw.descriptor_set {
            encoder.bind_descriptor_set(PipelineBindPoint::Graphics, pipeline.layout, set);
        }
        encoder.draw_indexed(draw.index_count, draw.instance_count());
    }
}

/// Bind and launch one replica, moving `target` to `General` and back to
/// `PresentSrc` around the launch when it is a presentable image.
fn dispatch_replica(
    encoder: &mut CommandEncoder<'_>,
    bind_point: PipelineBindPoint,
    stage: PipelineStages,
    pipeline: PipelineObjects,
    replica: Option<&PassReplica>,
    target: Option<GpuImage>,
    launch: impl FnOnce(&mut CommandEncoder<'_>),
) {
    if let Some(image) = target {
        encoder.transition(
            image,
            ImageLayout::PresentSrc,
            ImageLayout::General,
            PipelineStages::TOP_OF_PIPE,
            stage,
        );
    }

    encoder.bind_pipeline(bind_point, pipeline.pipeline);
    if let Some(set) = replica.and_then(PassReplica::descriptor_set) {
        encoder.bind_descriptor_set(bind_point, pipeline.layout, set);
    }
    launch(encoder);

    if let Some(image) = target {
        encoder.transition(
            image,
            ImageLayout::General,
            ImageLayout::PresentSrc,
            stage,
            PipelineStages::BOTTOM_OF_PIPE,
        );
    }
}

/// Record every replica of a pass into an auxiliary stream.
fn record_all_replicas(
    encoder: &mut CommandEncoder<'_>,
    hooks: &PassHooks,
    replicas: &[PassReplica],
    bind_point: PipelineBindPoint,
    stage: PipelineStages,
    pipeline: PipelineObjects,
    launch: impl Fn(&mut CommandEncoder<'_>),
) {
    hooks.run_before(encoder);
    for replica in replicas {
        dispatch_replica(
            encoder,
            bind_point,
            stage,
            pipeline,
            Some(replica),
            replica.target,
            &launch,
        );
    }
    hooks.run_after(encoder);
}
