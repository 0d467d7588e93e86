//! Common utilities for scene integration tests.
//!
//! Every test runs against the [`DummyBackend`], which records each command,
//! submission and live object so the tests can check exactly what the scene
//! asked the device layer for.

use std::sync::Arc;

use redlilium_scene::backend::GpuCommand;
use redlilium_scene::{
    DummyBackend, Extent2d, GpuBuffer, GpuImage, GpuQueue, GpuSemaphore, GpuBackend, Scene,
    SceneConfig, ShaderStageDescriptor, SwapchainImages, TextureFormat, VertexBufferBinding,
};

/// Graphics queue handed to `Scene::frame`.
pub const GRAPHICS_QUEUE: GpuQueue = GpuQueue::from_raw(1);
/// Compute queue handed to `Scene::frame`.
pub const COMPUTE_QUEUE: GpuQueue = GpuQueue::from_raw(2);

/// Install a test logger once. Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `count` presentable images of `width`x`height`, with raw ids starting at `first`.
pub fn swapchain_images(first: u64, count: u64, width: u32, height: u32) -> SwapchainImages {
    SwapchainImages::new(
        (first..first + count).map(GpuImage::from_raw).collect(),
        TextureFormat::Bgra8UnormSrgb,
        Extent2d::new(width, height),
    )
}

/// A scene over `image_count` 1280x720 presentable images.
pub struct TestContext {
    pub backend: Arc<DummyBackend>,
    pub scene: Scene,
}

impl TestContext {
    pub fn new(image_count: u64) -> Self {
        Self::with_config(image_count, SceneConfig::default())
    }

    pub fn with_config(image_count: u64, config: SceneConfig) -> Self {
        init_logging();
        let backend = Arc::new(DummyBackend::with_image_count(image_count as u32));
        let scene = Scene::new(
            backend.clone(),
            config,
            swapchain_images(100, image_count, 1280, 720),
        )
        .expect("scene creation");
        Self { backend, scene }
    }

    /// Commands recorded for presentable image `index`.
    pub fn swapchain_commands(&self, index: usize) -> Vec<GpuCommand> {
        let command_buffer = self.scene.streams().swapchain_command_buffers()[index];
        self.backend.commands(command_buffer)
    }

    /// Create a semaphore the way a presenter's owner would.
    pub fn semaphore(&self) -> GpuSemaphore {
        self.backend.create_semaphore().expect("semaphore")
    }
}

/// A quad: 4 vertices, 6 indices.
pub fn quad() -> VertexBufferBinding {
    VertexBufferBinding::new(GpuBuffer::from_raw(10), GpuBuffer::from_raw(11), 4, 6)
}

pub fn vertex_shader() -> ShaderStageDescriptor {
    ShaderStageDescriptor::new("shaders/basic.vert.spv")
}

pub fn fragment_shader() -> ShaderStageDescriptor {
    ShaderStageDescriptor::new("shaders/basic.frag.spv")
}

pub fn compute_shader() -> ShaderStageDescriptor {
    ShaderStageDescriptor::new("shaders/tonemap.comp.spv")
}

/// Count the commands matching `predicate`.
pub fn count_commands(commands: &[GpuCommand], predicate: impl Fn(&GpuCommand) -> bool) -> usize {
    commands.iter().filter(|command| predicate(command)).count()
}
