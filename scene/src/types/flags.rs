//! Pipeline stage and shader stage flags.

use bitflags::bitflags;

bitflags! {
    /// Pipeline stages used for barriers and semaphore waits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStages: u32 {
        /// Start of the pipeline.
        const TOP_OF_PIPE = 1 << 0;
        /// Vertex input assembly.
        const VERTEX_INPUT = 1 << 1;
        /// Vertex shading.
        const VERTEX_SHADER = 1 << 2;
        /// Fragment shading.
        const FRAGMENT_SHADER = 1 << 3;
        /// Color attachment writes.
        const COLOR_ATTACHMENT_OUTPUT = 1 << 4;
        /// Compute shading.
        const COMPUTE_SHADER = 1 << 5;
        /// Copies and blits.
        const TRANSFER = 1 << 6;
        /// Ray-tracing shading.
        const RAY_TRACING_SHADER = 1 << 7;
        /// End of the pipeline.
        const BOTTOM_OF_PIPE = 1 << 8;
        /// Every command.
        const ALL_COMMANDS = 1 << 9;
    }
}

impl Default for PipelineStages {
    fn default() -> Self {
        Self::ALL_COMMANDS
    }
}

bitflags! {
    /// Shader stages that can access a binding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        /// Vertex shader stage.
        const VERTEX = 1 << 0;
        /// Fragment shader stage.
        const FRAGMENT = 1 << 1;
        /// Compute shader stage.
        const COMPUTE = 1 << 2;
        /// Ray generation stage.
        const RAYGEN = 1 << 3;
        /// Miss stage.
        const MISS = 1 << 4;
        /// Closest-hit stage.
        const CLOSEST_HIT = 1 << 5;
    }
}

impl Default for ShaderStageFlags {
    fn default() -> Self {
        Self::VERTEX | Self::FRAGMENT
    }
}
