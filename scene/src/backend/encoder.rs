//! Typed command recording on top of [`GpuBackend::encode`].

use super::{
    GpuBackend, GpuBuffer, GpuCommand, GpuCommandBuffer, GpuDescriptorSet, GpuImage, GpuPipeline,
    GpuPipelineLayout, GpuRenderPass, ImageBarrier, IndexFormat, PipelineBindPoint,
};
use crate::types::{ClearValue, Extent2d, ImageLayout, PipelineStages};

/// Records commands into one command buffer.
///
/// The recorder uses an encoder for every stream it fills, and record hooks
/// receive the same encoder so their commands land in order with the scene's.
pub struct CommandEncoder<'a> {
    backend: &'a dyn GpuBackend,
    command_buffer: GpuCommandBuffer,
}

impl<'a> CommandEncoder<'a> {
    /// Create an encoder for a command buffer that is in the recording state.
    pub fn new(backend: &'a dyn GpuBackend, command_buffer: GpuCommandBuffer) -> Self {
        Self {
            backend,
            command_buffer,
        }
    }

    /// The command buffer being recorded.
    pub fn command_buffer(&self) -> GpuCommandBuffer {
        self.command_buffer
    }

    /// Record a raw command.
    pub fn encode(&mut self, command: GpuCommand) {
        self.backend.encode(self.command_buffer, command);
    }

    pub fn begin_render_pass(
        &mut self,
        render_pass: GpuRenderPass,
        extent: Extent2d,
        clear_values: Vec<ClearValue>,
    ) {
        self.encode(GpuCommand::BeginRenderPass {
            render_pass,
            extent,
            clear_values,
        });
    }

    pub fn end_render_pass(&mut self) {
        self.encode(GpuCommand::EndRenderPass);
    }

    pub fn bind_pipeline(&mut self, bind_point: PipelineBindPoint, pipeline: GpuPipeline) {
        self.encode(GpuCommand::BindPipeline {
            bind_point,
            pipeline,
        });
    }

    pub fn bind_vertex_buffer(&mut self, binding: u32, buffer: GpuBuffer) {
        self.encode(GpuCommand::BindVertexBuffer { binding, buffer });
    }

    pub fn bind_index_buffer(&mut self, buffer: GpuBuffer, format: IndexFormat) {
        self.encode(GpuCommand::BindIndexBuffer { buffer, format });
    }

    pub fn bind_descriptor_set(
        &mut self,
        bind_point: PipelineBindPoint,
        layout: GpuPipelineLayout,
        set: GpuDescriptorSet,
    ) {
        self.encode(GpuCommand::BindDescriptorSet {
            bind_point,
            layout,
            set,
        });
    }

    pub fn draw_indexed(&mut self, index_count: u32, instance_count: u32) {
        self.encode(GpuCommand::DrawIndexed {
            index_count,
            instance_count,
        });
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.encode(GpuCommand::Dispatch { x, y, z });
    }

    pub fn trace_rays(&mut self, width: u32, height: u32, depth: u32) {
        self.encode(GpuCommand::TraceRays {
            width,
            height,
            depth,
        });
    }

    /// Transition `image` between layouts.
    pub fn transition(
        &mut self,
        image: GpuImage,
        old_layout: ImageLayout,
        new_layout: ImageLayout,
        src_stage: PipelineStages,
        dst_stage: PipelineStages,
    ) {
        self.encode(GpuCommand::ImageBarrier(ImageBarrier {
            image,
            old_layout,
            new_layout,
            src_stage,
            dst_stage,
        }));
    }

    pub fn copy_image(&mut self, src: GpuImage, dst: GpuImage, extent: Extent2d) {
        self.encode(GpuCommand::CopyImage { src, dst, extent });
    }

    pub fn blit_image(
        &mut self,
        src: GpuImage,
        src_extent: Extent2d,
        dst: GpuImage,
        dst_extent: Extent2d,
    ) {
        self.encode(GpuCommand::BlitImage {
            src,
            src_extent,
            dst,
            dst_extent,
        });
    }
}

impl std::fmt::Debug for CommandEncoder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandEncoder")
            .field("backend", &self.backend.name())
            .field("command_buffer", &self.command_buffer)
            .finish()
    }
}
