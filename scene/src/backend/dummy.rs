//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't perform actual GPU operations. It hands out handles,
//! tracks which objects are alive, and keeps every recorded command and every
//! submission so tests can inspect exactly what the scene asked for.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::descriptor::{DescriptorBinding, DescriptorPoolSizes};
use crate::error::SceneError;
use crate::types::Extent2d;

use super::{
    ComputePipelineObjectDescriptor, GpuBackend, GpuCommand, GpuCommandBuffer, GpuDescriptorPool,
    GpuDescriptorSet, GpuImage, GpuPipeline, GpuPipelineLayout, GpuQueue, GpuRenderPass,
    GpuSemaphore, GraphicsPipelineObjectDescriptor, PipelineObjects, QueueClass,
    RayTracingPipelineObjectDescriptor, RenderPassObjectDescriptor, SemaphoreWait, SubmitInfo,
};

/// A submission seen by the dummy backend.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRecord {
    /// Queue the work was submitted to.
    pub queue: GpuQueue,
    /// Label of the submitted stream.
    pub label: String,
    /// Submitted command buffer.
    pub command_buffer: GpuCommandBuffer,
    /// Semaphores waited on.
    pub waits: Vec<SemaphoreWait>,
    /// Semaphores signaled.
    pub signals: Vec<GpuSemaphore>,
}

impl SubmitRecord {
    /// Returns true if the submission waits on `semaphore`.
    pub fn waits_on(&self, semaphore: GpuSemaphore) -> bool {
        self.waits.iter().any(|wait| wait.semaphore == semaphore)
    }
}

/// A present call seen by the dummy backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentRecord {
    /// Presentation queue.
    pub queue: GpuQueue,
    /// Presented image.
    pub image_index: u32,
    /// Semaphore the presentation waited on.
    pub wait: GpuSemaphore,
}

/// Number of live objects of each kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LiveObjects {
    pub semaphores: usize,
    pub command_buffers: usize,
    pub render_passes: usize,
    pub descriptor_pools: usize,
    pub descriptor_sets: usize,
    pub pipelines: usize,
}

#[derive(Debug)]
struct DummyRenderPass {
    label: String,
    extent: Extent2d,
    swapchain_image: Option<GpuImage>,
}

#[derive(Debug, Default)]
struct DummyState {
    next_id: u64,
    semaphores: HashSet<GpuSemaphore>,
    command_buffers: HashMap<GpuCommandBuffer, QueueClass>,
    commands: HashMap<GpuCommandBuffer, Vec<GpuCommand>>,
    render_passes: HashMap<GpuRenderPass, DummyRenderPass>,
    pools: HashMap<GpuDescriptorPool, DescriptorPoolSizes>,
    sets: HashMap<GpuDescriptorSet, (GpuDescriptorPool, Vec<DescriptorBinding>)>,
    pipelines: HashSet<GpuPipeline>,
    submissions: Vec<SubmitRecord>,
    presents: Vec<PresentRecord>,
    next_image: u32,
    surface_outdated: bool,
    fail_object_creation: bool,
    queue_idle_waits: usize,
    device_idle_waits: usize,
    invalid_releases: usize,
}

impl DummyState {
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_creation(&self, what: &str) -> Result<(), SceneError> {
        if self.fail_object_creation {
            Err(SceneError::ObjectCreationFailed(format!(
                "DummyBackend: {what} creation disabled"
            )))
        } else {
            Ok(())
        }
    }

    fn release(&mut self, what: &str, existed: bool) {
        if !existed {
            log::warn!("DummyBackend: releasing unknown {what}");
            self.invalid_releases += 1;
        }
    }
}

/// Dummy GPU backend.
#[derive(Debug)]
pub struct DummyBackend {
    image_count: u32,
    state: Mutex<DummyState>,
}

impl DummyBackend {
    /// Create a new dummy backend presenting three images.
    pub fn new() -> Self {
        Self::with_image_count(3)
    }

    /// Create a dummy backend whose acquisition rotates over `image_count` images.
    pub fn with_image_count(image_count: u32) -> Self {
        Self {
            image_count: image_count.max(1),
            state: Mutex::new(DummyState::default()),
        }
    }

    /// Commands recorded into `command_buffer` since it last began recording.
    pub fn commands(&self, command_buffer: GpuCommandBuffer) -> Vec<GpuCommand> {
        self.state
            .lock()
            .commands
            .get(&command_buffer)
            .cloned()
            .unwrap_or_default()
    }

    /// Queue class a live command buffer was allocated for.
    pub fn command_buffer_queue(&self, command_buffer: GpuCommandBuffer) -> Option<QueueClass> {
        self.state
            .lock()
            .command_buffers
            .get(&command_buffer)
            .copied()
    }

    /// Every submission so far, in order.
    pub fn submissions(&self) -> Vec<SubmitRecord> {
        self.state.lock().submissions.clone()
    }

    /// Every present call so far, in order.
    pub fn presents(&self) -> Vec<PresentRecord> {
        self.state.lock().presents.clone()
    }

    /// Forget recorded submissions and presents.
    pub fn clear_submissions(&self) {
        let mut state = self.state.lock();
        state.submissions.clear();
        state.presents.clear();
    }

    /// Number of live objects of each kind.
    pub fn live(&self) -> LiveObjects {
        let state = self.state.lock();
        LiveObjects {
            semaphores: state.semaphores.len(),
            command_buffers: state.command_buffers.len(),
            render_passes: state.render_passes.len(),
            descriptor_pools: state.pools.len(),
            descriptor_sets: state.sets.len(),
            pipelines: state.pipelines.len(),
        }
    }

    /// Returns true if `render_pass` has been created and not destroyed.
    pub fn is_live_render_pass(&self, render_pass: GpuRenderPass) -> bool {
        self.state.lock().render_passes.contains_key(&render_pass)
    }

    /// Presentable image a live render pass object targets.
    pub fn render_pass_image(&self, render_pass: GpuRenderPass) -> Option<GpuImage> {
        self.state
            .lock()
            .render_passes
            .get(&render_pass)
            .and_then(|pass| pass.swapchain_image)
    }

    /// Framebuffer extent of a live render pass object.
    pub fn render_pass_extent(&self, render_pass: GpuRenderPass) -> Option<Extent2d> {
        self.state
            .lock()
            .render_passes
            .get(&render_pass)
            .map(|pass| pass.extent)
    }

    /// Capacity a live descriptor pool was created with.
    pub fn descriptor_pool_sizes(&self, pool: GpuDescriptorPool) -> Option<DescriptorPoolSizes> {
        self.state.lock().pools.get(&pool).copied()
    }

    /// Bindings written into a live descriptor set.
    pub fn descriptor_set_bindings(&self, set: GpuDescriptorSet) -> Option<Vec<DescriptorBinding>> {
        self.state
            .lock()
            .sets
            .get(&set)
            .map(|(_, bindings)| bindings.clone())
    }

    /// Make acquisition report a stale surface until cleared.
    pub fn set_surface_outdated(&self, outdated: bool) {
        self.state.lock().surface_outdated = outdated;
    }

    /// Make every object creation fail until cleared.
    pub fn set_fail_object_creation(&self, fail: bool) {
        self.state.lock().fail_object_creation = fail;
    }

    /// Number of `queue_wait_idle` calls so far.
    pub fn queue_idle_waits(&self) -> usize {
        self.state.lock().queue_idle_waits
    }

    /// Number of `device_wait_idle` calls so far.
    pub fn device_idle_waits(&self) -> usize {
        self.state.lock().device_idle_waits
    }

    /// Number of destroy/free calls on objects that were not alive.
    pub fn invalid_releases(&self) -> usize {
        self.state.lock().invalid_releases
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy"
    }

    fn create_semaphore(&self) -> Result<GpuSemaphore, SceneError> {
        let mut state = self.state.lock();
        state.check_creation("semaphore")?;
        let semaphore = GpuSemaphore::from_raw(state.next());
        state.semaphores.insert(semaphore);
        log::trace!("DummyBackend: created semaphore {}", semaphore.raw());
        Ok(semaphore)
    }

    fn destroy_semaphore(&self, semaphore: GpuSemaphore) {
        let mut state = self.state.lock();
        let existed = state.semaphores.remove(&semaphore);
        state.release("semaphore", existed);
    }

    fn allocate_command_buffer(&self, queue: QueueClass) -> Result<GpuCommandBuffer, SceneError> {
        let mut state = self.state.lock();
        state.check_creation("command buffer")?;
        let command_buffer = GpuCommandBuffer::from_raw(state.next());
        state.command_buffers.insert(command_buffer, queue);
        log::trace!(
            "DummyBackend: allocated {:?} command buffer {}",
            queue,
            command_buffer.raw()
        );
        Ok(command_buffer)
    }

    fn free_command_buffer(&self, command_buffer: GpuCommandBuffer) {
        let mut state = self.state.lock();
        let existed = state.command_buffers.remove(&command_buffer).is_some();
        state.commands.remove(&command_buffer);
        state.release("command buffer", existed);
    }

    fn begin_command_buffer(&self, command_buffer: GpuCommandBuffer) -> Result<(), SceneError> {
        let mut state = self.state.lock();
        if !state.command_buffers.contains_key(&command_buffer) {
            return Err(SceneError::ObjectCreationFailed(format!(
                "DummyBackend: unknown command buffer {}",
                command_buffer.raw()
            )));
        }
        state.commands.insert(command_buffer, Vec::new());
        Ok(())
    }

    fn end_command_buffer(&self, command_buffer: GpuCommandBuffer) -> Result<(), SceneError> {
        log::trace!(
            "DummyBackend: ended command buffer {} ({} commands)",
            command_buffer.raw(),
            self.state
                .lock()
                .commands
                .get(&command_buffer)
                .map_or(0, Vec::len)
        );
        Ok(())
    }

    fn encode(&self, command_buffer: GpuCommandBuffer, command: GpuCommand) {
        let mut state = self.state.lock();
        match state.commands.get_mut(&command_buffer) {
            Some(commands) => commands.push(command),
            None => log::warn!(
                "DummyBackend: encoding into command buffer {} which is not recording",
                command_buffer.raw()
            ),
        }
    }

    fn create_render_pass(
        &self,
        descriptor: &RenderPassObjectDescriptor<'_>,
    ) -> Result<GpuRenderPass, SceneError> {
        let mut state = self.state.lock();
        state.check_creation("render pass")?;
        let render_pass = GpuRenderPass::from_raw(state.next());
        log::trace!(
            "DummyBackend: created render pass '{}' ({}x{}, {} attachments)",
            descriptor.label,
            descriptor.extent.width,
            descriptor.extent.height,
            descriptor.attachments.len()
        );
        state.render_passes.insert(
            render_pass,
            DummyRenderPass {
                label: descriptor.label.to_string(),
                extent: descriptor.extent,
                swapchain_image: descriptor.swapchain_image,
            },
        );
        Ok(render_pass)
    }

    fn destroy_render_pass(&self, render_pass: GpuRenderPass) {
        let mut state = self.state.lock();
        let removed = state.render_passes.remove(&render_pass);
        if let Some(pass) = &removed {
            log::trace!("DummyBackend: destroyed render pass '{}'", pass.label);
        }
        state.release("render pass", removed.is_some());
    }

    fn create_descriptor_pool(
        &self,
        sizes: &DescriptorPoolSizes,
    ) -> Result<GpuDescriptorPool, SceneError> {
        let mut state = self.state.lock();
        state.check_creation("descriptor pool")?;
        let pool = GpuDescriptorPool::from_raw(state.next());
        log::trace!(
            "DummyBackend: created descriptor pool {} (max sets: {})",
            pool.raw(),
            sizes.max_sets()
        );
        state.pools.insert(pool, *sizes);
        Ok(pool)
    }

    fn destroy_descriptor_pool(&self, pool: GpuDescriptorPool) {
        let mut state = self.state.lock();
        let existed = state.pools.remove(&pool).is_some();
        state.sets.retain(|_, (owner, _)| *owner != pool);
        state.release("descriptor pool", existed);
    }

    fn allocate_descriptor_set(
        &self,
        pool: GpuDescriptorPool,
        bindings: &[DescriptorBinding],
    ) -> Result<GpuDescriptorSet, SceneError> {
        let mut state = self.state.lock();
        state.check_creation("descriptor set")?;
        let Some(capacity) = state.pools.get(&pool).copied() else {
            return Err(SceneError::ObjectCreationFailed(format!(
                "DummyBackend: unknown descriptor pool {}",
                pool.raw()
            )));
        };

        let mut in_use = DescriptorPoolSizes::new();
        for (owner, set_bindings) in state.sets.values() {
            if *owner == pool {
                in_use.add_set("dummy", set_bindings);
            }
        }
        in_use.add_set("dummy", bindings);
        if !in_use.fits_in(&capacity) {
            return Err(SceneError::OutOfMemory);
        }

        let set = GpuDescriptorSet::from_raw(state.next());
        state.sets.insert(set, (pool, bindings.to_vec()));
        Ok(set)
    }

    fn free_descriptor_set(&self, pool: GpuDescriptorPool, set: GpuDescriptorSet) {
        let mut state = self.state.lock();
        let owned = state
            .sets
            .get(&set)
            .is_some_and(|(owner, _)| *owner == pool);
        if owned {
            state.sets.remove(&set);
        }
        state.release("descriptor set", owned);
    }

    fn create_graphics_pipeline(
        &self,
        descriptor: &GraphicsPipelineObjectDescriptor<'_>,
    ) -> Result<PipelineObjects, SceneError> {
        let mut state = self.state.lock();
        state.check_creation("graphics pipeline")?;
        if !state.render_passes.contains_key(&descriptor.render_pass) {
            return Err(SceneError::ObjectCreationFailed(format!(
                "DummyBackend: pipeline '{}' targets an unknown render pass",
                descriptor.label
            )));
        }
        let pipeline = GpuPipeline::from_raw(state.next());
        let layout = GpuPipelineLayout::from_raw(state.next());
        state.pipelines.insert(pipeline);
        log::trace!(
            "DummyBackend: created graphics pipeline '{}' ({})",
            descriptor.label,
            descriptor.vertex.path
        );
        Ok(PipelineObjects { pipeline, layout })
    }

    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineObjectDescriptor<'_>,
    ) -> Result<PipelineObjects, SceneError> {
        let mut state = self.state.lock();
        state.check_creation("compute pipeline")?;
        let pipeline = GpuPipeline::from_raw(state.next());
        let layout = GpuPipelineLayout::from_raw(state.next());
        state.pipelines.insert(pipeline);
        log::trace!(
            "DummyBackend: created compute pipeline '{}' ({})",
            descriptor.label,
            descriptor.shader.path
        );
        Ok(PipelineObjects { pipeline, layout })
    }

    fn create_ray_tracing_pipeline(
        &self,
        descriptor: &RayTracingPipelineObjectDescriptor<'_>,
    ) -> Result<PipelineObjects, SceneError> {
        let mut state = self.state.lock();
        state.check_creation("ray tracing pipeline")?;
        let pipeline = GpuPipeline::from_raw(state.next());
        let layout = GpuPipelineLayout::from_raw(state.next());
        state.pipelines.insert(pipeline);
        log::trace!(
            "DummyBackend: created ray tracing pipeline '{}' ({})",
            descriptor.label,
            descriptor.raygen.path
        );
        Ok(PipelineObjects { pipeline, layout })
    }

    fn destroy_pipeline(&self, pipeline: PipelineObjects) {
        let mut state = self.state.lock();
        let existed = state.pipelines.remove(&pipeline.pipeline);
        state.release("pipeline", existed);
    }

    fn submit(&self, queue: GpuQueue, submit: &SubmitInfo<'_>) -> Result<(), SceneError> {
        let mut state = self.state.lock();
        if !state.command_buffers.contains_key(&submit.command_buffer) {
            return Err(SceneError::SubmissionFailed(format!(
                "DummyBackend: '{}' submits unknown command buffer {}",
                submit.label,
                submit.command_buffer.raw()
            )));
        }
        log::trace!(
            "DummyBackend: submit '{}' to queue {}: waits={}, signals={}",
            submit.label,
            queue.raw(),
            submit.waits.len(),
            submit.signals.len()
        );
        state.submissions.push(SubmitRecord {
            queue,
            label: submit.label.to_string(),
            command_buffer: submit.command_buffer,
            waits: submit.waits.to_vec(),
            signals: submit.signals.to_vec(),
        });
        Ok(())
    }

    fn acquire_next_image(&self, signal: GpuSemaphore) -> Result<u32, SceneError> {
        let mut state = self.state.lock();
        if state.surface_outdated {
            return Err(SceneError::SurfaceOutdated);
        }
        if !state.semaphores.contains(&signal) {
            return Err(SceneError::AcquireFailed(format!(
                "DummyBackend: unknown semaphore {}",
                signal.raw()
            )));
        }
        let index = state.next_image;
        state.next_image = (index + 1) % self.image_count;
        Ok(index)
    }

    fn present(
        &self,
        queue: GpuQueue,
        image_index: u32,
        wait: GpuSemaphore,
    ) -> Result<(), SceneError> {
        let mut state = self.state.lock();
        if state.surface_outdated {
            return Err(SceneError::SurfaceOutdated);
        }
        state.presents.push(PresentRecord {
            queue,
            image_index,
            wait,
        });
        Ok(())
    }

    fn queue_wait_idle(&self, queue: GpuQueue) -> Result<(), SceneError> {
        log::trace!("DummyBackend: queue {} idle", queue.raw());
        self.state.lock().queue_idle_waits += 1;
        Ok(())
    }

    fn device_wait_idle(&self) -> Result<(), SceneError> {
        self.state.lock().device_idle_waits += 1;
        Ok(())
    }
}

static_assertions::assert_impl_all!(DummyBackend: Send, Sync);
