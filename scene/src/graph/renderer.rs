//! Renderers and the meshes they draw.
//!
//! A [`Renderer`] owns one graphics pipeline inside a render pass and an
//! ordered list of [`MeshBinding`]s. Insertion order is draw order and is kept
//! across resizes.

use crate::backend::{GpuBuffer, GpuDescriptorSet, PipelineObjects, ShaderStageDescriptor};
use crate::descriptor::{DescriptorBinding, DescriptorLayoutEntry};
use crate::types::Extent2d;

use super::{InstanceTemplate, RenderPassId, RendererId, VertexLayout, VertexTemplate};

/// Descriptor for a renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererDescriptor {
    /// Debug label.
    pub label: String,
    /// Render pass the renderer draws in.
    pub render_pass: RenderPassId,
    /// Vertex shader.
    pub vertex_shader: ShaderStageDescriptor,
    /// Fragment shader.
    pub fragment_shader: Option<ShaderStageDescriptor>,
    /// Vertex structure of the meshes.
    pub vertex_template: VertexTemplate,
    /// Per-instance structure of the meshes.
    pub instance_template: InstanceTemplate,
    /// Layout of the per-mesh descriptor set.
    pub descriptor_layout: Vec<DescriptorLayoutEntry>,
    /// Viewport extent. Zero inherits the swap-chain extent.
    pub extent: Extent2d,
    /// Whether alpha blending is enabled.
    pub alpha_blending: bool,
    pub(crate) force_id: Option<RendererId>,
}

impl RendererDescriptor {
    /// Create a renderer descriptor with no vertex input and no descriptor set.
    pub fn new(
        label: impl Into<String>,
        render_pass: RenderPassId,
        vertex_shader: ShaderStageDescriptor,
    ) -> Self {
        Self {
            label: label.into(),
            render_pass,
            vertex_shader,
            fragment_shader: None,
            vertex_template: VertexTemplate::None,
            instance_template: InstanceTemplate::None,
            descriptor_layout: Vec::new(),
            extent: Extent2d::default(),
            alpha_blending: false,
            force_id: None,
        }
    }

    /// Set the fragment shader.
    pub fn with_fragment_shader(mut self, shader: ShaderStageDescriptor) -> Self {
        self.fragment_shader = Some(shader);
        self
    }

    /// Set the vertex template.
    pub fn with_vertex_template(mut self, template: VertexTemplate) -> Self {
        self.vertex_template = template;
        self
    }

    /// Set the instance template.
    pub fn with_instance_template(mut self, template: InstanceTemplate) -> Self {
        self.instance_template = template;
        self
    }

    /// Add a slot to the per-mesh descriptor set layout.
    pub fn with_descriptor(mut self, entry: DescriptorLayoutEntry) -> Self {
        self.descriptor_layout.push(entry);
        self
    }

    /// Set the viewport extent.
    pub fn with_extent(mut self, extent: Extent2d) -> Self {
        self.extent = extent;
        self
    }

    /// Enable or disable alpha blending.
    pub fn with_alpha_blending(mut self, enabled: bool) -> Self {
        self.alpha_blending = enabled;
        self
    }

    /// Replace the renderer `id` instead of appending a new one.
    pub fn with_forced_id(mut self, id: RendererId) -> Self {
        self.force_id = Some(id);
        self
    }
}

/// Vertex and index buffers of a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexBufferBinding {
    /// Vertex buffer, bound at binding 0.
    pub vertex_buffer: GpuBuffer,
    /// Index buffer of 32-bit indices.
    pub index_buffer: GpuBuffer,
    /// Number of vertices.
    pub vertex_count: u32,
    /// Number of indices drawn.
    pub index_count: u32,
}

impl VertexBufferBinding {
    /// Create a geometry binding.
    pub fn new(
        vertex_buffer: GpuBuffer,
        index_buffer: GpuBuffer,
        vertex_count: u32,
        index_count: u32,
    ) -> Self {
        Self {
            vertex_buffer,
            index_buffer,
            vertex_count,
            index_count,
        }
    }
}

/// Per-instance buffer of a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceBinding {
    /// Instance buffer, bound at binding 1.
    pub buffer: GpuBuffer,
    /// Number of instances drawn.
    pub count: u32,
}

/// Descriptor for a mesh attached to a renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshDescriptor {
    /// Render pass of the renderer.
    pub render_pass: RenderPassId,
    /// Renderer drawing the mesh.
    pub renderer: RendererId,
    /// Geometry.
    pub geometry: VertexBufferBinding,
    /// Instancing, if any.
    pub instances: Option<InstanceBinding>,
    /// A descriptor set the caller allocated and owns.
    pub descriptor_set: Option<GpuDescriptorSet>,
    /// Bindings of a descriptor set the scene allocates at record time.
    pub bindings: Vec<DescriptorBinding>,
}

impl MeshDescriptor {
    /// Create a mesh drawn without instancing or descriptor set.
    pub fn new(
        render_pass: RenderPassId,
        renderer: RendererId,
        geometry: VertexBufferBinding,
    ) -> Self {
        Self {
            render_pass,
            renderer,
            geometry,
            instances: None,
            descriptor_set: None,
            bindings: Vec::new(),
        }
    }

    /// Draw `count` instances from `buffer`.
    pub fn with_instances(mut self, buffer: GpuBuffer, count: u32) -> Self {
        self.instances = Some(InstanceBinding { buffer, count });
        self
    }

    /// Bind a caller-owned descriptor set.
    pub fn with_descriptor_set(mut self, set: GpuDescriptorSet) -> Self {
        self.descriptor_set = Some(set);
        self
    }

    /// Add a binding to the scene-allocated descriptor set.
    pub fn with_binding(mut self, binding: DescriptorBinding) -> Self {
        self.bindings.push(binding);
        self
    }
}

/// A mesh attached to a renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshBinding {
    pub(crate) descriptor: MeshDescriptor,
    pub(crate) owned_set: Option<GpuDescriptorSet>,
}

impl MeshBinding {
    pub(crate) fn new(descriptor: MeshDescriptor) -> Self {
        Self {
            descriptor,
            owned_set: None,
        }
    }

    /// The mesh descriptor.
    pub fn descriptor(&self) -> &MeshDescriptor {
        &self.descriptor
    }

    /// Returns true if the scene allocates a descriptor set for the mesh.
    pub fn needs_descriptor_set(&self) -> bool {
        !self.descriptor.bindings.is_empty()
    }

    /// What the recorder emits for this mesh.
    pub fn draw(&self) -> MeshDraw {
        MeshDraw {
            vertex_buffer: self.descriptor.geometry.vertex_buffer,
            index_buffer: self.descriptor.geometry.index_buffer,
            index_count: self.descriptor.geometry.index_count,
            instances: self.descriptor.instances.filter(|instances| instances.count > 0),
            descriptor_set: self.owned_set.or(self.descriptor.descriptor_set),
        }
    }
}

/// Everything needed to draw one mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshDraw {
    /// Vertex buffer.
    pub vertex_buffer: GpuBuffer,
    /// Index buffer.
    pub index_buffer: GpuBuffer,
    /// Indices drawn.
    pub index_count: u32,
    /// Instance buffer, present only when at least one instance is drawn.
    pub instances: Option<InstanceBinding>,
    /// Descriptor set to bind.
    pub descriptor_set: Option<GpuDescriptorSet>,
}

impl MeshDraw {
    /// Returns true if an instance buffer is bound.
    pub fn has_instancing(&self) -> bool {
        self.instances.is_some()
    }

    /// Returns true if a descriptor set is bound.
    pub fn has_descriptor_set(&self) -> bool {
        self.descriptor_set.is_some()
    }

    /// Instances drawn: the instance buffer's count, or 1.
    pub fn instance_count(&self) -> u32 {
        self.instances.map_or(1, |instances| instances.count)
    }
}

/// A renderer attached to a render pass.
#[derive(Debug)]
pub struct Renderer {
    pub(crate) descriptor: RendererDescriptor,
    pub(crate) extent: Extent2d,
    pub(crate) vertex_layout: VertexLayout,
    pub(crate) pipeline: Option<PipelineObjects>,
    pub(crate) meshes: Vec<MeshBinding>,
}

impl Renderer {
    pub(crate) fn new(descriptor: RendererDescriptor, swapchain_extent: Extent2d) -> Self {
        let extent = descriptor.extent.or(swapchain_extent);
        let vertex_layout =
            VertexLayout::from_templates(descriptor.vertex_template, descriptor.instance_template);
        Self {
            descriptor: RendererDescriptor {
                force_id: None,
                ..descriptor
            },
            extent,
            vertex_layout,
            pipeline: None,
            meshes: Vec::new(),
        }
    }

    /// Debug label.
    pub fn label(&self) -> &str {
        &self.descriptor.label
    }

    /// The descriptor as supplied by the caller.
    pub fn descriptor(&self) -> &RendererDescriptor {
        &self.descriptor
    }

    /// Resolved viewport extent.
    pub fn extent(&self) -> Extent2d {
        self.extent
    }

    /// Vertex input layout.
    pub fn vertex_layout(&self) -> &VertexLayout {
        &self.vertex_layout
    }

    /// Pipeline, once recorded.
    pub fn pipeline(&self) -> Option<PipelineObjects> {
        self.pipeline
    }

    /// Attached meshes, in draw order.
    pub fn meshes(&self) -> &[MeshBinding] {
        &self.meshes
    }
}
