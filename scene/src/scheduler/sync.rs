//! GPU synchronization primitives.

use crate::backend::{GpuSemaphore, SemaphoreWait};
use crate::types::PipelineStages;

/// GPU semaphore signaled when a command stream completes.
///
/// Semaphores are used for GPU-GPU synchronization only: one submission
/// signals it, the next submissions that list it in their waits start the
/// `wait_stage` of their work once it is signaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Semaphore {
    handle: GpuSemaphore,
    wait_stage: PipelineStages,
}

impl Semaphore {
    pub(crate) fn new(handle: GpuSemaphore, wait_stage: PipelineStages) -> Self {
        Self { handle, wait_stage }
    }

    /// The backend semaphore.
    pub fn handle(&self) -> GpuSemaphore {
        self.handle
    }

    /// Stage at which consumers wait for this semaphore.
    pub fn wait_stage(&self) -> PipelineStages {
        self.wait_stage
    }

    /// Wait entry for a submission consuming this semaphore.
    pub fn as_wait(&self) -> SemaphoreWait {
        SemaphoreWait {
            semaphore: self.handle,
            stage: self.wait_stage,
        }
    }
}
