//! Scene error types.

use std::fmt;

/// Errors that can occur while building, recording or submitting a scene.
///
/// Variants fall into three groups:
///
/// | Group | Variants | Handling |
/// |-------|----------|----------|
/// | Configuration | `Invalid*`, `Missing*`, `DescriptorPoolFrozen`, `NotRecorded` | logged, offending item skipped |
/// | GPU API | `ObjectCreationFailed`, `SubmissionFailed`, `AcquireFailed`, `PresentFailed`, `OutOfMemory`, `DeviceLost` | fatal for the operation |
/// | Surface | `SurfaceOutdated` | returned to the caller, answered with `resize()` |
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// A render pass handle does not reference a registered render pass.
    InvalidRenderPass { id: u32, count: u32 },
    /// A renderer handle does not reference a renderer of the given render pass.
    InvalidRenderer {
        render_pass: u32,
        renderer: u32,
        count: u32,
    },
    /// A mesh handle does not reference a mesh of the given renderer.
    InvalidMesh {
        render_pass: u32,
        renderer: u32,
        mesh: u32,
        count: u32,
    },
    /// A command stream handle does not reference a declared stream.
    InvalidStream { id: u32, count: u32 },
    /// An offscreen render pass has no outputs and no extent.
    MissingOutput { label: String },
    /// An attachment has no extent and none can be inferred.
    MissingExtent { label: String },
    /// A descriptor-consuming registration after the pool was allocated.
    DescriptorPoolFrozen { label: String },
    /// A presentable image index is out of range.
    InvalidImageIndex { index: u32, count: u32 },
    /// `frame()` was called before `record()`.
    NotRecorded,
    /// The backend failed to create a GPU object.
    ObjectCreationFailed(String),
    /// The backend failed to submit work to a queue.
    SubmissionFailed(String),
    /// Acquiring the next presentable image failed.
    AcquireFailed(String),
    /// Presentation failed.
    PresentFailed(String),
    /// Out of GPU memory.
    OutOfMemory,
    /// The GPU device was lost.
    DeviceLost,
    /// The surface is outdated and the scene needs to be resized.
    SurfaceOutdated,
}

impl SceneError {
    /// Returns true for caller configuration errors.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidRenderPass { .. }
                | Self::InvalidRenderer { .. }
                | Self::InvalidMesh { .. }
                | Self::InvalidStream { .. }
                | Self::MissingOutput { .. }
                | Self::MissingExtent { .. }
                | Self::DescriptorPoolFrozen { .. }
                | Self::InvalidImageIndex { .. }
                | Self::NotRecorded
        )
    }

    /// Returns true if the surface went stale and a resize is required.
    pub fn is_surface_outdated(&self) -> bool {
        matches!(self, Self::SurfaceOutdated)
    }
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRenderPass { id, count } => {
                write!(f, "invalid render pass id {id} ({count} render passes registered)")
            }
            Self::InvalidRenderer {
                render_pass,
                renderer,
                count,
            } => write!(
                f,
                "invalid renderer id {renderer} for render pass {render_pass} ({count} renderers)"
            ),
            Self::InvalidMesh {
                render_pass,
                renderer,
                mesh,
                count,
            } => write!(
                f,
                "invalid mesh id {mesh} for renderer {renderer} of render pass {render_pass} ({count} meshes)"
            ),
            Self::InvalidStream { id, count } => {
                write!(f, "invalid command stream id {id} ({count} streams declared)")
            }
            Self::MissingOutput { label } => {
                write!(f, "render pass '{label}' must include an output")
            }
            Self::MissingExtent { label } => {
                write!(f, "'{label}' has an attachment without extent")
            }
            Self::DescriptorPoolFrozen { label } => write!(
                f,
                "'{label}' needs descriptors but the descriptor pool is already allocated"
            ),
            Self::InvalidImageIndex { index, count } => {
                write!(f, "invalid presentable image index {index} ({count} images)")
            }
            Self::NotRecorded => write!(f, "scene has not been recorded"),
            Self::ObjectCreationFailed(msg) => write!(f, "GPU object creation failed: {msg}"),
            Self::SubmissionFailed(msg) => write!(f, "queue submission failed: {msg}"),
            Self::AcquireFailed(msg) => write!(f, "image acquisition failed: {msg}"),
            Self::PresentFailed(msg) => write!(f, "presentation failed: {msg}"),
            Self::OutOfMemory => write!(f, "out of GPU memory"),
            Self::DeviceLost => write!(f, "GPU device lost"),
            Self::SurfaceOutdated => write!(f, "surface outdated, needs resize"),
        }
    }
}

impl std::error::Error for SceneError {}
