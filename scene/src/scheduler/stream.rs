//! The set of command streams owned by a scene.

use crate::backend::{GpuBackend, GpuCommandBuffer, QueueClass};
use crate::error::SceneError;
use crate::types::PipelineStages;

use super::{CommandStreamDescriptor, Semaphore, StreamId, StreamKind};

#[derive(Debug)]
struct AuxStream {
    descriptor: CommandStreamDescriptor,
    completion: Semaphore,
    command_buffer: Option<GpuCommandBuffer>,
}

/// The swap-chain stream plus every auxiliary stream.
///
/// Semaphores live as long as the set. Command buffers are allocated by
/// [`allocate_command_buffers`](Self::allocate_command_buffers) at record time
/// and released before every re-record.
#[derive(Debug)]
pub struct CommandStreamSet {
    swapchain_buffers: Vec<GpuCommandBuffer>,
    swapchain_complete: Semaphore,
    streams: Vec<AuxStream>,
}

impl CommandStreamSet {
    /// Create an empty set with the swap-chain completion semaphore.
    pub(crate) fn new(backend: &dyn GpuBackend) -> Result<Self, SceneError> {
        let semaphore = backend.create_semaphore()?;
        Ok(Self {
            swapchain_buffers: Vec::new(),
            swapchain_complete: Semaphore::new(semaphore, PipelineStages::BOTTOM_OF_PIPE),
            streams: Vec::new(),
        })
    }

    /// Declare an auxiliary stream and create its completion semaphore.
    pub(crate) fn add(
        &mut self,
        backend: &dyn GpuBackend,
        descriptor: CommandStreamDescriptor,
    ) -> Result<StreamId, SceneError> {
        let semaphore = backend.create_semaphore()?;
        let id = StreamId::new(self.streams.len() as u32);
        log::debug!(
            "Added {:?} command stream '{}' as {}",
            descriptor.kind,
            descriptor.label,
            id.index()
        );
        self.streams.push(AuxStream {
            completion: Semaphore::new(semaphore, descriptor.final_stage),
            descriptor,
            command_buffer: None,
        });
        Ok(id)
    }

    /// Number of auxiliary streams.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Returns true if no auxiliary stream was declared.
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Returns true if `id` names a declared stream.
    pub fn contains(&self, id: StreamId) -> bool {
        id.index() < self.streams.len()
    }

    /// Iterate over the declared streams.
    pub fn ids(&self) -> impl Iterator<Item = StreamId> + '_ {
        (0..self.streams.len() as u32).map(StreamId::new)
    }

    /// Label of a stream.
    pub fn label(&self, id: StreamId) -> Option<&str> {
        self.streams
            .get(id.index())
            .map(|stream| stream.descriptor.label.as_str())
    }

    /// Kind of a stream.
    pub fn kind(&self, id: StreamId) -> Option<StreamKind> {
        self.streams.get(id.index()).map(|stream| stream.descriptor.kind)
    }

    /// Completion semaphore of a stream.
    pub fn completion(&self, id: StreamId) -> Option<Semaphore> {
        self.streams.get(id.index()).map(|stream| stream.completion)
    }

    /// Recorded command buffer of a stream.
    pub fn command_buffer(&self, id: StreamId) -> Option<GpuCommandBuffer> {
        self.streams
            .get(id.index())
            .and_then(|stream| stream.command_buffer)
    }

    /// Recorded swap-chain command buffers, indexed by presentable image.
    pub fn swapchain_command_buffers(&self) -> &[GpuCommandBuffer] {
        &self.swapchain_buffers
    }

    /// Semaphore signaled when the swap-chain stream completes.
    pub fn swapchain_complete(&self) -> Semaphore {
        self.swapchain_complete
    }

    /// Total number of live command buffers.
    pub fn command_buffer_count(&self) -> usize {
        self.swapchain_buffers.len()
            + self
                .streams
                .iter()
                .filter(|stream| stream.command_buffer.is_some())
                .count()
    }

    /// Allocate one command buffer per presentable image and one per stream.
    pub(crate) fn allocate_command_buffers(
        &mut self,
        backend: &dyn GpuBackend,
        image_count: usize,
        swapchain_queue: QueueClass,
    ) -> Result<(), SceneError> {
        self.release_command_buffers(backend);
        for _ in 0..image_count {
            self.swapchain_buffers
                .push(backend.allocate_command_buffer(swapchain_queue)?);
        }
        for stream in &mut self.streams {
            stream.command_buffer =
                Some(backend.allocate_command_buffer(stream.descriptor.kind.queue_class())?);
        }
        Ok(())
    }

    /// Free every command buffer. Semaphores are kept.
    pub(crate) fn release_command_buffers(&mut self, backend: &dyn GpuBackend) {
        for command_buffer in self.swapchain_buffers.drain(..) {
            backend.free_command_buffer(command_buffer);
        }
        for stream in &mut self.streams {
            if let Some(command_buffer) = stream.command_buffer.take() {
                backend.free_command_buffer(command_buffer);
            }
        }
    }

    /// Free every command buffer and destroy every semaphore.
    pub(crate) fn destroy(&mut self, backend: &dyn GpuBackend) {
        self.release_command_buffers(backend);
        for stream in self.streams.drain(..) {
            backend.destroy_semaphore(stream.completion.handle());
        }
        backend.destroy_semaphore(self.swapchain_complete.handle());
    }
}
