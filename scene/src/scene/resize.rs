//! Rebuilding swap-chain-bound state after the surface changed.
//!
//! Only what depends on the presentable images is rebuilt:
//!
//! - swap-chain-bound render passes get new pass objects, their renderers
//!   new pipelines and their meshes new descriptor sets, keeping every handle
//!   and the draw order
//! - swap-chain-bound compute and ray-tracing passes get one replica per new
//!   image
//! - every command buffer is re-recorded
//!
//! Offscreen passes, their renderers and all semaphores survive untouched.

use crate::backend::GpuBackend;
use crate::descriptor::{DescriptorBinding, DescriptorPoolSizes};
use crate::error::SceneError;
use crate::graph::{MeshBinding, OutputTarget, PassReplica, RenderPassId, Renderer, build_replicas};
use crate::swapchain::SwapchainImages;
use crate::types::ShaderStageFlags;

use super::pool::ScenePool;
use super::{Scene, release_renderer};

impl Scene {
    /// Rebuild against new presentable images and record again.
    ///
    /// Mirror images, if any, are kept.
    pub fn resize(&mut self, images: SwapchainImages) -> Result<(), SceneError> {
        let mirror = self.mirror.take();
        self.rebuild(images, mirror)
    }

    /// Rebuild against new presentable and mirror images and record again.
    pub fn resize_with_mirror(
        &mut self,
        images: SwapchainImages,
        mirror: SwapchainImages,
    ) -> Result<(), SceneError> {
        self.rebuild(images, Some(mirror))
    }

    fn rebuild(
        &mut self,
        images: SwapchainImages,
        mirror: Option<SwapchainImages>,
    ) -> Result<(), SceneError> {
        crate::profile_scope!("scene_resize");
        log::info!(
            "Resizing scene '{}' to {}x{} ({} images)",
            self.config.label,
            images.extent().width,
            images.extent().height,
            images.len()
        );

        let backend = self.backend.clone();
        let backend = backend.as_ref();
        backend.device_wait_idle()?;

        self.streams.release_command_buffers(backend);
        self.recorded = false;
        self.swapchain = images;
        self.mirror = mirror;
        let extent = self.swapchain.extent();

        // Replicas of swap-chain-bound compute and ray-tracing passes.
        let mut demand = self.pool.demand();
        let compute_replicas: Vec<_> = self
            .registry
            .compute_passes
            .iter()
            .map(|pass| {
                pass.is_swapchain_bound().then(|| {
                    self.replace_replicas(
                        &mut demand,
                        pass.label(),
                        &pass.replicas,
                        &pass.descriptor.bindings,
                        pass.descriptor.output,
                        pass.descriptor.output_binding,
                        ShaderStageFlags::COMPUTE,
                    )
                })
            })
            .collect();
        let ray_tracing_replicas: Vec<_> = self
            .registry
            .ray_tracing_passes
            .iter()
            .map(|pass| {
                pass.is_swapchain_bound().then(|| {
                    self.replace_replicas(
                        &mut demand,
                        pass.label(),
                        &pass.replicas,
                        &pass.descriptor.bindings,
                        pass.descriptor.output,
                        pass.descriptor.output_binding,
                        ShaderStageFlags::RAYGEN,
                    )
                })
            })
            .collect();

        if self
            .pool
            .capacity()
            .is_some_and(|capacity| !demand.fits_in(&capacity))
        {
            log::info!("Descriptor demand outgrew the pool, reallocating it");
            self.pool.destroy(backend);
            self.clear_descriptor_sets();
        }

        for (pass, replicas) in self
            .registry
            .compute_passes
            .iter_mut()
            .zip(compute_replicas)
        {
            if let Some(replicas) = replicas {
                free_replica_sets(backend, &self.pool, &pass.replicas);
                pass.replicas = replicas;
                pass.extent = extent;
            }
        }
        for (pass, replicas) in self
            .registry
            .ray_tracing_passes
            .iter_mut()
            .zip(ray_tracing_replicas)
        {
            if let Some(replicas) = replicas {
                free_replica_sets(backend, &self.pool, &pass.replicas);
                pass.replicas = replicas;
                pass.extent = extent;
            }
        }
        self.pool.set_demand(demand);

        let bound: Vec<RenderPassId> = self
            .registry
            .render_passes()
            .iter()
            .enumerate()
            .filter(|(_, pass)| pass.is_swapchain_bound())
            .map(|(index, _)| RenderPassId::new(index as u32))
            .collect();
        for id in bound {
            self.rebuild_render_pass(id)?;
        }

        for transfer in &mut self.registry.transfers {
            transfer.origin_extent = transfer.descriptor.origin_extent.or(extent);
        }

        self.record()
    }

    /// New replicas for the current images, moving the pool demand from the
    /// old replicas to the new ones.
    #[allow(clippy::too_many_arguments)]
    fn replace_replicas(
        &self,
        demand: &mut DescriptorPoolSizes,
        label: &str,
        old: &[PassReplica],
        bindings: &[DescriptorBinding],
        output: OutputTarget,
        output_binding: u32,
        stages: ShaderStageFlags,
    ) -> Vec<PassReplica> {
        let replicas = build_replicas(bindings, output, output_binding, stages, &self.swapchain);
        for replica in old.iter().filter(|replica| replica.needs_descriptor_set()) {
            demand.remove_set(&replica.bindings);
        }
        for replica in replicas.iter().filter(|replica| replica.needs_descriptor_set()) {
            demand.add_set(label, &replica.bindings);
        }
        replicas
    }

    /// Forget every scene-allocated descriptor set after the pool was destroyed.
    fn clear_descriptor_sets(&mut self) {
        for pass in &mut self.registry.render_passes {
            for renderer in &mut pass.renderers {
                for mesh in &mut renderer.meshes {
                    mesh.owned_set = None;
                }
            }
        }
        let compute = self
            .registry
            .compute_passes
            .iter_mut()
            .flat_map(|pass| pass.replicas.iter_mut());
        let ray_tracing = self
            .registry
            .ray_tracing_passes
            .iter_mut()
            .flat_map(|pass| pass.replicas.iter_mut());
        for replica in compute.chain(ray_tracing) {
            replica.descriptor_set = None;
        }
    }

    /// Recreate a swap-chain-bound render pass in place, re-attaching its
    /// renderers and meshes in their original order.
    fn rebuild_render_pass(&mut self, id: RenderPassId) -> Result<(), SceneError> {
        let backend = self.backend.clone();
        let pass = self.registry.render_pass_mut(id)?;
        let descriptor = pass.descriptor.clone();
        let renderers = std::mem::take(&mut pass.renderers);
        let objects = std::mem::take(&mut pass.objects);

        for renderer in &renderers {
            release_renderer(backend.as_ref(), &self.pool, renderer);
        }
        for object in objects {
            backend.destroy_render_pass(object);
        }

        self.add_render_pass(descriptor.with_force_id(id))?;

        let extent = self.swapchain.extent();
        let pass = self.registry.render_pass_mut(id)?;
        for old in renderers {
            let mut renderer = Renderer::new(old.descriptor, extent);
            renderer.meshes = old
                .meshes
                .into_iter()
                .map(|mesh| MeshBinding::new(mesh.descriptor))
                .collect();
            pass.renderers.push(renderer);
        }
        log::debug!(
            "Rebuilt render pass '{}' with {} renderers",
            pass.label(),
            pass.renderers.len()
        );
        Ok(())
    }
}

fn free_replica_sets(
    backend: &dyn GpuBackend,
    pool: &ScenePool,
    replicas: &[PassReplica],
) {
    for set in replicas.iter().filter_map(PassReplica::descriptor_set) {
        pool.free(backend, set);
    }
}
