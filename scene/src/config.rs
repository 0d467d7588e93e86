//! Scene configuration.

use crate::backend::QueueClass;
use crate::types::{ClearValue, PipelineStages, TextureFormat};

/// What the swap-chain stream does with each presentable image.
///
/// A scene has exactly one mode, fixed at construction. It decides which
/// swap-chain-stream passes the recorder emits per image and which queue the
/// swap-chain stream is submitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SwapchainMode {
    /// Render passes draw into the presentable images.
    #[default]
    Graphics,
    /// Compute passes write the presentable images as storage images.
    Compute,
    /// Ray-tracing passes write the presentable images as storage images.
    RayTracing,
    /// Transfers copy an origin image into the presentable images.
    Transfer,
}

impl SwapchainMode {
    /// Queue class the swap-chain command buffers are allocated for.
    pub fn queue_class(&self) -> QueueClass {
        match self {
            Self::Graphics | Self::Transfer => QueueClass::Graphics,
            Self::Compute | Self::RayTracing => QueueClass::Compute,
        }
    }

    /// Stage of the swap-chain stream that waits for image acquisition.
    pub fn acquire_wait_stage(&self) -> PipelineStages {
        match self {
            Self::Graphics => PipelineStages::COLOR_ATTACHMENT_OUTPUT,
            Self::Compute => PipelineStages::COMPUTE_SHADER,
            Self::RayTracing => PipelineStages::RAY_TRACING_SHADER,
            Self::Transfer => PipelineStages::TRANSFER,
        }
    }
}

/// Configuration for a [`Scene`](crate::Scene).
#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    /// Debug label.
    pub label: String,
    /// Swap-chain submission mode.
    pub mode: SwapchainMode,
    /// Format of the depth attachment derived for swap-chain render passes.
    pub depth_format: TextureFormat,
    /// Clear color of the color attachment derived for swap-chain render passes.
    pub clear_color: ClearValue,
    /// Clear depth of the derived depth attachment.
    pub depth_clear: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            label: "scene".to_string(),
            mode: SwapchainMode::default(),
            depth_format: TextureFormat::Depth32Float,
            clear_color: ClearValue::color(0.0, 0.0, 0.0, 1.0),
            depth_clear: 1.0,
        }
    }
}

impl SceneConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the swap-chain submission mode.
    pub fn with_mode(mut self, mode: SwapchainMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the derived depth attachment format.
    pub fn with_depth_format(mut self, format: TextureFormat) -> Self {
        self.depth_format = format;
        self
    }

    /// Set the derived color attachment clear color.
    pub fn with_clear_color(mut self, r: f32, g: f32, b: f32, a: f32) -> Self {
        self.clear_color = ClearValue::color(r, g, b, a);
        self
    }

    /// Set the derived depth attachment clear value.
    pub fn with_depth_clear(mut self, depth: f32) -> Self {
        self.depth_clear = depth;
        self
    }
}
