//! Pass registry.
//!
//! The registry holds everything a scene records, in four independent ordered
//! collections:
//!
//! | Collection | Handle | Children |
//! |------------|--------|----------|
//! | render passes | [`RenderPassId`] | [`Renderer`]s ([`RendererId`]), each with [`MeshBinding`]s ([`MeshId`]) |
//! | compute passes | [`ComputePassId`] | one [`PassReplica`] per presentable image, or one |
//! | ray-tracing passes | [`RayTracingPassId`] | one [`PassReplica`] per presentable image, or one |
//! | transfers | [`TransferId`] | none |
//!
//! Handles are plain indices: the Nth pass of a kind has index N, and keeps it
//! until a resize rebuilds the pass in place. Children refer to their parents
//! by handle, never by reference.
//!
//! # Example
//!
//! ```ignore
//! let main = scene.add_render_pass(RenderPassDescriptor::swapchain("main"))?;
//! let terrain = scene.add_renderer(
//!     RendererDescriptor::new("terrain", main, ShaderStageDescriptor::new("terrain.vert.spv"))
//!         .with_fragment_shader(ShaderStageDescriptor::new("terrain.frag.spv"))
//!         .with_vertex_template(VertexTemplate::Full3dMaterial),
//! )?;
//! scene.add_mesh(MeshDescriptor::new(main, terrain, geometry))?;
//! ```

mod hook;
mod pass;
mod renderer;
mod vertex;

pub use hook::{PassHooks, RecordHook};
pub use pass::{
    ComputePass, ComputePassDescriptor, DispatchGroups, OutputTarget, PassReplica, RayTracingPass,
    RayTracingPassDescriptor, RenderPass, RenderPassDescriptor, Transfer, TransferDescriptor,
    TransferDestination,
};
pub use renderer::{
    InstanceBinding, MeshBinding, MeshDescriptor, MeshDraw, Renderer, RendererDescriptor,
    VertexBufferBinding,
};
pub use vertex::{
    InstanceTemplate, VertexAttribute, VertexAttributeFormat, VertexBufferLayout, VertexLayout,
    VertexStepMode, VertexTemplate,
};

pub(crate) use pass::{build_replicas, resolve_render_pass};

use crate::error::SceneError;
use crate::scheduler::StreamTarget;

macro_rules! scene_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Create a handle from a raw index.
            pub const fn new(index: u32) -> Self {
                Self(index)
            }

            /// Get the raw index.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

scene_handle!(
    /// Handle to a render pass.
    RenderPassId
);
scene_handle!(
    /// Handle to a compute pass.
    ComputePassId
);
scene_handle!(
    /// Handle to a ray-tracing pass.
    RayTracingPassId
);
scene_handle!(
    /// Handle to a transfer.
    TransferId
);
scene_handle!(
    /// Handle to a renderer, relative to its render pass.
    RendererId
);
scene_handle!(
    /// Handle to a mesh binding, relative to its renderer.
    MeshId
);

/// The passes registered in a scene.
#[derive(Debug, Default)]
pub struct PassRegistry {
    pub(crate) render_passes: Vec<RenderPass>,
    pub(crate) compute_passes: Vec<ComputePass>,
    pub(crate) ray_tracing_passes: Vec<RayTracingPass>,
    pub(crate) transfers: Vec<Transfer>,
}

impl PassRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered render passes, by handle.
    pub fn render_passes(&self) -> &[RenderPass] {
        &self.render_passes
    }

    /// Registered compute passes, by handle.
    pub fn compute_passes(&self) -> &[ComputePass] {
        &self.compute_passes
    }

    /// Registered ray-tracing passes, by handle.
    pub fn ray_tracing_passes(&self) -> &[RayTracingPass] {
        &self.ray_tracing_passes
    }

    /// Registered transfers, by handle.
    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    /// Look up a render pass, reporting an invalid handle.
    pub fn render_pass(&self, id: RenderPassId) -> Result<&RenderPass, SceneError> {
        let count = self.render_passes.len();
        self.render_passes
            .get(id.index())
            .ok_or_else(|| invalid_render_pass(id, count))
    }

    /// Look up a renderer, reporting an invalid handle.
    pub fn renderer(
        &self,
        render_pass: RenderPassId,
        renderer: RendererId,
    ) -> Result<&Renderer, SceneError> {
        let pass = self.render_pass(render_pass)?;
        pass.renderers
            .get(renderer.index())
            .ok_or_else(|| invalid_renderer(render_pass, renderer, pass.renderers.len()))
    }

    pub(crate) fn render_pass_mut(
        &mut self,
        id: RenderPassId,
    ) -> Result<&mut RenderPass, SceneError> {
        let count = self.render_passes.len();
        self.render_passes
            .get_mut(id.index())
            .ok_or_else(|| invalid_render_pass(id, count))
    }

    pub(crate) fn renderer_mut(
        &mut self,
        render_pass: RenderPassId,
        renderer: RendererId,
    ) -> Result<&mut Renderer, SceneError> {
        let pass = self.render_pass_mut(render_pass)?;
        let count = pass.renderers.len();
        pass.renderers
            .get_mut(renderer.index())
            .ok_or_else(|| invalid_renderer(render_pass, renderer, count))
    }

    pub(crate) fn mesh_mut(
        &mut self,
        render_pass: RenderPassId,
        renderer: RendererId,
        mesh: MeshId,
    ) -> Result<&mut MeshBinding, SceneError> {
        let meshes = &mut self.renderer_mut(render_pass, renderer)?.meshes;
        let count = meshes.len();
        meshes.get_mut(mesh.index()).ok_or_else(|| {
            log::error!(
                "Invalid mesh {} for renderer {} of render pass {} ({} meshes)",
                mesh.index(),
                renderer.index(),
                render_pass.index(),
                count
            );
            SceneError::InvalidMesh {
                render_pass: render_pass.index() as u32,
                renderer: renderer.index() as u32,
                mesh: mesh.index() as u32,
                count: count as u32,
            }
        })
    }

    /// Store a render pass, replacing `force_id` when given.
    pub(crate) fn insert_render_pass(
        &mut self,
        pass: RenderPass,
        force_id: Option<RenderPassId>,
    ) -> RenderPassId {
        match force_id {
            Some(id) if id.index() < self.render_passes.len() => {
                self.render_passes[id.index()] = pass;
                id
            }
            _ => {
                self.render_passes.push(pass);
                RenderPassId::new(self.render_passes.len() as u32 - 1)
            }
        }
    }

    pub(crate) fn push_compute_pass(&mut self, pass: ComputePass) -> ComputePassId {
        self.compute_passes.push(pass);
        ComputePassId::new(self.compute_passes.len() as u32 - 1)
    }

    pub(crate) fn push_ray_tracing_pass(&mut self, pass: RayTracingPass) -> RayTracingPassId {
        self.ray_tracing_passes.push(pass);
        RayTracingPassId::new(self.ray_tracing_passes.len() as u32 - 1)
    }

    pub(crate) fn push_transfer(&mut self, transfer: Transfer) -> TransferId {
        self.transfers.push(transfer);
        TransferId::new(self.transfers.len() as u32 - 1)
    }

    /// Render passes recorded into `stream`, in registration order.
    pub fn render_passes_in(&self, stream: StreamTarget) -> impl Iterator<Item = &RenderPass> {
        self.render_passes
            .iter()
            .filter(move |pass| pass.stream() == stream)
    }

    /// Compute passes recorded into `stream`, in registration order.
    pub fn compute_passes_in(&self, stream: StreamTarget) -> impl Iterator<Item = &ComputePass> {
        self.compute_passes
            .iter()
            .filter(move |pass| pass.stream() == stream)
    }

    /// Ray-tracing passes recorded into `stream`, in registration order.
    pub fn ray_tracing_passes_in(
        &self,
        stream: StreamTarget,
    ) -> impl Iterator<Item = &RayTracingPass> {
        self.ray_tracing_passes
            .iter()
            .filter(move |pass| pass.stream() == stream)
    }

    /// Transfers recorded into `stream`, in registration order.
    pub fn transfers_in(&self, stream: StreamTarget) -> impl Iterator<Item = &Transfer> {
        self.transfers
            .iter()
            .filter(move |transfer| transfer.stream() == stream)
    }

    /// Total number of registered passes of every kind.
    pub fn len(&self) -> usize {
        self.render_passes.len()
            + self.compute_passes.len()
            + self.ray_tracing_passes.len()
            + self.transfers.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn invalid_render_pass(id: RenderPassId, count: usize) -> SceneError {
    log::error!(
        "Invalid render pass {} ({} render passes registered)",
        id.index(),
        count
    );
    SceneError::InvalidRenderPass {
        id: id.index() as u32,
        count: count as u32,
    }
}

fn invalid_renderer(render_pass: RenderPassId, renderer: RendererId, count: usize) -> SceneError {
    log::error!(
        "Invalid renderer {} for render pass {} ({} renderers)",
        renderer.index(),
        render_pass.index(),
        count
    );
    SceneError::InvalidRenderer {
        render_pass: render_pass.index() as u32,
        renderer: renderer.index() as u32,
        count: count as u32,
    }
}
