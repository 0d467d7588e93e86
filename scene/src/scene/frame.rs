//! Per-frame submission and presentation.

use crate::backend::{GpuQueue, GpuSemaphore, QueueClass, SemaphoreWait, SubmitInfo};
use crate::error::SceneError;
use crate::scheduler::{StreamTarget, WaitEdge, producers_of, valid_edges};
use crate::swapchain::Presenter;

use super::Scene;

impl Scene {
    /// Submit the recorded streams for one frame.
    ///
    /// Every auxiliary stream in `streams` is submitted first, waiting on the
    /// completion of the producers `edges` name for it and signaling its own
    /// completion. The swap-chain stream of `image_index` is submitted last,
    /// waiting on `image_acquired` and on the producers of edges whose
    /// consumer is [`StreamTarget::Swapchain`]. It signals the swap-chain
    /// completion semaphore only when `image_acquired` is supplied.
    ///
    /// The swap-chain sentinel in `streams` is skipped. Edges that wait on
    /// the swap-chain stream or name unknown streams are reported and ignored.
    pub fn frame(
        &self,
        graphics_queue: GpuQueue,
        compute_queue: GpuQueue,
        image_index: u32,
        image_acquired: Option<GpuSemaphore>,
        streams: &[StreamTarget],
        edges: &[WaitEdge],
    ) -> Result<(), SceneError> {
        crate::profile_scope!("scene_frame");

        if !self.recorded {
            log::error!("Scene '{}': frame() before record()", self.config.label);
            return Err(SceneError::NotRecorded);
        }
        let swapchain_buffers = self.streams.swapchain_command_buffers();
        let Some(swapchain_buffer) = swapchain_buffers.get(image_index as usize).copied() else {
            log::error!(
                "Scene '{}': image index {} out of range ({} images)",
                self.config.label,
                image_index,
                swapchain_buffers.len()
            );
            return Err(SceneError::InvalidImageIndex {
                index: image_index,
                count: swapchain_buffers.len() as u32,
            });
        };

        let edges = valid_edges(edges, self.streams.len());
        let queue_for = |class: QueueClass| match class {
            QueueClass::Graphics => graphics_queue,
            QueueClass::Compute => compute_queue,
        };

        for target in streams {
            let Some(id) = target.stream() else {
                continue;
            };
            let (Some(kind), Some(command_buffer), Some(completion)) = (
                self.streams.kind(id),
                self.streams.command_buffer(id),
                self.streams.completion(id),
            ) else {
                log::error!(
                    "Scene '{}': {} is not a recorded stream, not submitted",
                    self.config.label,
                    target
                );
                continue;
            };

            let waits = self.producer_waits(&edges, *target);
            let label = self.streams.label(id).unwrap_or_default();
            self.submit(
                queue_for(kind.queue_class()),
                &SubmitInfo {
                    label,
                    command_buffer,
                    waits: &waits,
                    signals: &[completion.handle()],
                },
            )?;
        }

        let mut waits = Vec::new();
        if let Some(semaphore) = image_acquired {
            waits.push(SemaphoreWait {
                semaphore,
                stage: self.config.mode.acquire_wait_stage(),
            });
        }
        waits.extend(self.producer_waits(&edges, StreamTarget::Swapchain));

        let complete = self.streams.swapchain_complete().handle();
        let signals: &[GpuSemaphore] = if image_acquired.is_some() {
            std::slice::from_ref(&complete)
        } else {
            &[]
        };

        self.submit(
            queue_for(self.config.mode.queue_class()),
            &SubmitInfo {
                label: &self.config.label,
                command_buffer: swapchain_buffer,
                waits: &waits,
                signals,
            },
        )
    }

    /// Present `image_index` once the swap-chain stream completed, then mark
    /// the end of the frame.
    pub fn present(&self, presenter: &Presenter, image_index: u32) -> Result<(), SceneError> {
        presenter.present(image_index, self.streams.swapchain_complete().handle())?;
        crate::frame_mark!();
        Ok(())
    }

    fn producer_waits(&self, edges: &[WaitEdge], consumer: StreamTarget) -> Vec<SemaphoreWait> {
        producers_of(edges, consumer)
            .into_iter()
            .filter_map(|producer| self.streams.completion(producer))
            .map(|completion| completion.as_wait())
            .collect()
    }

    fn submit(&self, queue: GpuQueue, submit: &SubmitInfo<'_>) -> Result<(), SceneError> {
        log::trace!(
            "Submitting '{}' ({} waits, {} signals)",
            submit.label,
            submit.waits.len(),
            submit.signals.len()
        );
        self.backend.submit(queue, submit)
    }
}
