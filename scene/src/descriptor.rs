//! Descriptor bindings and descriptor pool sizing.
//!
//! Every pass and mesh binding that needs shader-visible resources declares
//! them as a list of [`DescriptorBinding`]s. When such a pass is registered the
//! scene feeds its bindings into a [`DescriptorPoolSizes`] accumulator. The
//! scene's single descriptor pool is allocated at the accumulated size right
//! before recording.
//!
//! | Kind | Tracked |
//! |------|---------|
//! | uniform / storage buffer | yes |
//! | sampled / storage image | yes |
//! | combined image sampler, sampler | yes |
//! | acceleration structure | yes |
//! | input attachment, texel buffers | no, reported as unsupported |

use crate::backend::{GpuAccelerationStructure, GpuBuffer, GpuImage, GpuSampler};
use crate::types::ShaderStageFlags;

/// Kind of a descriptor binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    /// Uniform buffer.
    UniformBuffer,
    /// Storage buffer.
    StorageBuffer,
    /// Sampled image (no sampler).
    SampledImage,
    /// Storage image.
    StorageImage,
    /// Image combined with a sampler.
    CombinedImageSampler,
    /// Standalone sampler.
    Sampler,
    /// Ray-tracing acceleration structure.
    AccelerationStructure,
    /// Input attachment. Not supported by the pool.
    InputAttachment,
    /// Uniform texel buffer. Not supported by the pool.
    UniformTexelBuffer,
    /// Storage texel buffer. Not supported by the pool.
    StorageTexelBuffer,
}

impl DescriptorKind {
    /// Kinds the descriptor pool reserves slots for.
    pub const POOLED: [DescriptorKind; 7] = [
        Self::UniformBuffer,
        Self::StorageBuffer,
        Self::SampledImage,
        Self::StorageImage,
        Self::CombinedImageSampler,
        Self::Sampler,
        Self::AccelerationStructure,
    ];

    fn pool_slot(&self) -> Option<usize> {
        match self {
            Self::UniformBuffer => Some(0),
            Self::StorageBuffer => Some(1),
            Self::SampledImage => Some(2),
            Self::StorageImage => Some(3),
            Self::CombinedImageSampler => Some(4),
            Self::Sampler => Some(5),
            Self::AccelerationStructure => Some(6),
            Self::InputAttachment | Self::UniformTexelBuffer | Self::StorageTexelBuffer => None,
        }
    }
}

/// A resource written into a descriptor slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorResource {
    /// A buffer.
    Buffer(GpuBuffer),
    /// An image.
    Image(GpuImage),
    /// A sampler.
    Sampler(GpuSampler),
    /// An image and the sampler used to read it.
    CombinedImageSampler(GpuImage, GpuSampler),
    /// An acceleration structure.
    AccelerationStructure(GpuAccelerationStructure),
}

/// One binding slot of a descriptor set, with the resources bound to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorBinding {
    /// Binding index within the set.
    pub binding: u32,
    /// Kind of descriptor at this binding.
    pub kind: DescriptorKind,
    /// Shader stages that read this binding.
    pub stages: ShaderStageFlags,
    /// Bound resources. The array size of the binding is the resource count.
    pub resources: Vec<DescriptorResource>,
}

impl DescriptorBinding {
    /// Create a binding with a single resource.
    pub fn new(binding: u32, kind: DescriptorKind, resource: DescriptorResource) -> Self {
        Self {
            binding,
            kind,
            stages: ShaderStageFlags::default(),
            resources: vec![resource],
        }
    }

    /// Create a uniform buffer binding.
    pub fn uniform_buffer(binding: u32, buffer: GpuBuffer) -> Self {
        Self::new(
            binding,
            DescriptorKind::UniformBuffer,
            DescriptorResource::Buffer(buffer),
        )
    }

    /// Create a storage buffer binding.
    pub fn storage_buffer(binding: u32, buffer: GpuBuffer) -> Self {
        Self::new(
            binding,
            DescriptorKind::StorageBuffer,
            DescriptorResource::Buffer(buffer),
        )
    }

    /// Create a storage image binding.
    pub fn storage_image(binding: u32, image: GpuImage) -> Self {
        Self::new(
            binding,
            DescriptorKind::StorageImage,
            DescriptorResource::Image(image),
        )
    }

    /// Create a sampled image binding.
    pub fn sampled_image(binding: u32, image: GpuImage) -> Self {
        Self::new(
            binding,
            DescriptorKind::SampledImage,
            DescriptorResource::Image(image),
        )
    }

    /// Create a combined image sampler binding.
    pub fn combined_image_sampler(binding: u32, image: GpuImage, sampler: GpuSampler) -> Self {
        Self::new(
            binding,
            DescriptorKind::CombinedImageSampler,
            DescriptorResource::CombinedImageSampler(image, sampler),
        )
    }

    /// Create a sampler binding.
    pub fn sampler(binding: u32, sampler: GpuSampler) -> Self {
        Self::new(
            binding,
            DescriptorKind::Sampler,
            DescriptorResource::Sampler(sampler),
        )
    }

    /// Create an acceleration structure binding.
    pub fn acceleration_structure(binding: u32, tlas: GpuAccelerationStructure) -> Self {
        Self::new(
            binding,
            DescriptorKind::AccelerationStructure,
            DescriptorResource::AccelerationStructure(tlas),
        )
    }

    /// Set the shader stage visibility.
    pub fn with_stages(mut self, stages: ShaderStageFlags) -> Self {
        self.stages = stages;
        self
    }

    /// Append another resource, growing the binding into an array.
    pub fn with_resource(mut self, resource: DescriptorResource) -> Self {
        self.resources.push(resource);
        self
    }

    /// Number of descriptors this binding consumes.
    pub fn count(&self) -> u32 {
        self.resources.len() as u32
    }

    /// The layout slot this binding fills.
    pub fn layout(&self) -> DescriptorLayoutEntry {
        DescriptorLayoutEntry {
            binding: self.binding,
            kind: self.kind,
            stages: self.stages,
            count: self.count(),
        }
    }
}

/// One slot of a descriptor set layout, without resources.
///
/// Renderers declare their layout up front, before any mesh provides the
/// resources; compute and ray-tracing layouts are derived from their bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorLayoutEntry {
    /// Binding index within the set.
    pub binding: u32,
    /// Kind of descriptor at this binding.
    pub kind: DescriptorKind,
    /// Shader stages that read this binding.
    pub stages: ShaderStageFlags,
    /// Array size.
    pub count: u32,
}

impl DescriptorLayoutEntry {
    /// Create a single-descriptor slot.
    pub fn new(binding: u32, kind: DescriptorKind, stages: ShaderStageFlags) -> Self {
        Self {
            binding,
            kind,
            stages,
            count: 1,
        }
    }

    /// Set the array size.
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }
}

/// Layout of a set made of `bindings`.
pub fn layout_of(bindings: &[DescriptorBinding]) -> Vec<DescriptorLayoutEntry> {
    bindings.iter().map(DescriptorBinding::layout).collect()
}

// ============================================================================
// Pool sizing
// ============================================================================

/// Accumulated descriptor demand, per kind, plus the number of sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DescriptorPoolSizes {
    counts: [u32; 7],
    max_sets: u32,
}

impl DescriptorPoolSizes {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of descriptors of `kind`. Always zero for unsupported kinds.
    pub fn count(&self, kind: DescriptorKind) -> u32 {
        kind.pool_slot().map_or(0, |slot| self.counts[slot])
    }

    /// Number of descriptor sets the pool must hold.
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }

    /// Reserve `count` descriptors of `kind`.
    ///
    /// Returns false, leaving the accumulator unchanged, if the kind is not
    /// supported by the pool.
    pub fn add(&mut self, kind: DescriptorKind, count: u32) -> bool {
        match kind.pool_slot() {
            Some(slot) => {
                self.counts[slot] += count;
                true
            }
            None => false,
        }
    }

    /// Release `count` descriptors of `kind`, saturating at zero.
    pub fn remove(&mut self, kind: DescriptorKind, count: u32) {
        if let Some(slot) = kind.pool_slot() {
            self.counts[slot] = self.counts[slot].saturating_sub(count);
        }
    }

    /// Reserve one descriptor set made of `bindings`.
    ///
    /// Unsupported kinds are reported on the diagnostic channel and skipped.
    pub fn add_set(&mut self, owner: &str, bindings: &[DescriptorBinding]) {
        for binding in bindings {
            if !self.add(binding.kind, binding.count()) {
                log::warn!(
                    "'{}': unsupported descriptor kind {:?} at binding {}",
                    owner,
                    binding.kind,
                    binding.binding
                );
            }
        }
        self.max_sets += 1;
    }

    /// Release one descriptor set made of `bindings`.
    pub fn remove_set(&mut self, bindings: &[DescriptorBinding]) {
        for binding in bindings {
            self.remove(binding.kind, binding.count());
        }
        self.max_sets = self.max_sets.saturating_sub(1);
    }

    /// Returns true if every count of `self` fits in `capacity`.
    pub fn fits_in(&self, capacity: &DescriptorPoolSizes) -> bool {
        self.max_sets <= capacity.max_sets
            && self
                .counts
                .iter()
                .zip(capacity.counts.iter())
                .all(|(needed, available)| needed <= available)
    }

    /// Iterate over the pooled kinds with a non-zero count.
    pub fn iter(&self) -> impl Iterator<Item = (DescriptorKind, u32)> + '_ {
        DescriptorKind::POOLED
            .iter()
            .map(|kind| (*kind, self.count(*kind)))
            .filter(|(_, count)| *count > 0)
    }

    /// Returns true if nothing has been reserved.
    pub fn is_empty(&self) -> bool {
        self.max_sets == 0 && self.counts.iter().all(|count| *count == 0)
    }
}
