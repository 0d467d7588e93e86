//! Vertex input layouts for renderer pipelines.
//!
//! A renderer does not spell out its vertex input by hand: it picks a
//! [`VertexTemplate`] matching the vertex structure of its meshes and,
//! optionally, an [`InstanceTemplate`] for per-instance data. The templates
//! expand into a [`VertexLayout`] the backend turns into pipeline state.
//!
//! # Buffer Slots
//!
//! | Slot | Content | Step |
//! |------|---------|------|
//! | 0 | vertex data from the template | per vertex |
//! | 1 | instance data from the instance template | per instance |
//!
//! Attribute locations are assigned consecutively: vertex attributes first,
//! then instance attributes.

/// Format of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttributeFormat {
    /// Two 32-bit floats.
    Float2,
    /// Three 32-bit floats.
    Float3,
    /// Four 32-bit floats.
    Float4,
    /// Single 32-bit unsigned integer.
    Uint,
}

impl VertexAttributeFormat {
    /// Get the size in bytes of this format.
    pub fn size(&self) -> u32 {
        match self {
            Self::Float2 => 8,
            Self::Float3 => 12,
            Self::Float4 => 16,
            Self::Uint => 4,
        }
    }
}

/// How the vertex buffer advances: per-vertex or per-instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexStepMode {
    /// Buffer advances once per vertex (default).
    #[default]
    Vertex,
    /// Buffer advances once per instance (for instanced rendering).
    Instance,
}

/// Describes a single vertex buffer binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexBufferLayout {
    /// Binding slot.
    pub binding: u32,
    /// Stride in bytes between consecutive elements.
    pub stride: u32,
    /// How the buffer advances.
    pub step_mode: VertexStepMode,
}

/// A single vertex attribute description.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Shader input location.
    pub location: u32,
    /// Binding slot the attribute reads from.
    pub binding: u32,
    /// Data format.
    pub format: VertexAttributeFormat,
    /// Byte offset within one element of the buffer.
    pub offset: u32,
}

/// Vertex input of a pipeline across one or more buffers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexLayout {
    /// Buffer bindings.
    pub buffers: Vec<VertexBufferLayout>,
    /// Attributes, each referencing a buffer by binding slot.
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Create an empty layout (no vertex input).
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the layout for a vertex template and an instance template.
    pub fn from_templates(vertex: VertexTemplate, instance: InstanceTemplate) -> Self {
        let mut layout = Self::new();
        layout.push_buffer(0, VertexStepMode::Vertex, vertex.formats());
        layout.push_buffer(1, VertexStepMode::Instance, instance.formats());
        layout
    }

    /// Returns true if the layout declares no buffers.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Stride of the buffer bound at `binding`, if any.
    pub fn stride(&self, binding: u32) -> Option<u32> {
        self.buffers
            .iter()
            .find(|buffer| buffer.binding == binding)
            .map(|buffer| buffer.stride)
    }

    fn push_buffer(
        &mut self,
        binding: u32,
        step_mode: VertexStepMode,
        formats: &[VertexAttributeFormat],
    ) {
        if formats.is_empty() {
            return;
        }
        let mut offset = 0;
        for format in formats {
            self.attributes.push(VertexAttribute {
                location: self.attributes.len() as u32,
                binding,
                format: *format,
                offset,
            });
            offset += format.size();
        }
        self.buffers.push(VertexBufferLayout {
            binding,
            stride: offset,
            step_mode,
        });
    }
}

/// Vertex structures meshes can be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexTemplate {
    /// No vertex input (full-screen passes generating vertices in the shader).
    #[default]
    None,
    /// 2D position.
    Position2d,
    /// 2D position and texture coordinates.
    PositionTexCoord2d,
    /// 2D position, texture coordinates and a material id.
    PositionTexCoordId2d,
    /// 3D position, normal, tangent, texture coordinates and a material id.
    Full3dMaterial,
}

impl VertexTemplate {
    fn formats(&self) -> &'static [VertexAttributeFormat] {
        use VertexAttributeFormat::*;
        match self {
            Self::None => &[],
            Self::Position2d => &[Float2],
            Self::PositionTexCoord2d => &[Float2, Float2],
            Self::PositionTexCoordId2d => &[Float2, Float2, Uint],
            Self::Full3dMaterial => &[Float3, Float3, Float3, Float2, Uint],
        }
    }
}

/// Per-instance structures meshes can be instanced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InstanceTemplate {
    /// No instance buffer.
    #[default]
    None,
    /// A single `u32` id per instance.
    SingleId,
}

impl InstanceTemplate {
    fn formats(&self) -> &'static [VertexAttributeFormat] {
        match self {
            Self::None => &[],
            Self::SingleId => &[VertexAttributeFormat::Uint],
        }
    }
}
